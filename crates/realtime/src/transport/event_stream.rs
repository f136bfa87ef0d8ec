//! Server-sent events over HTTP.
//!
//! Inbound frames are read from `GET {url}/events`. A named SSE event
//! (`event: task_updated`) carries its payload in `data`; an unnamed one
//! carries a whole `{"event", "payload"}` frame. Outbound frames are POSTed
//! as JSON to the same path.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use super::{ChannelTransport, Frame, FrameSink, Link};
use crate::error::{ChannelError, Result};

fn auth_headers(credential: &str, accept: &'static str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    let value = HeaderValue::from_str(&format!("Bearer {}", credential))
        .map_err(|_| ChannelError::transport("Invalid access token format"))?;
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

#[derive(Debug, Clone)]
pub struct EventStreamTransport {
    client: reqwest::Client,
    url: String,
}

impl EventStreamTransport {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/events", url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ChannelTransport for EventStreamTransport {
    async fn open(&self, credential: &str) -> Result<Link> {
        debug!("Opening event stream: {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .headers(auth_headers(credential, "text/event-stream")?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::transport(format!(
                "event stream refused with status {}",
                status
            )));
        }
        info!("Event stream established: {}", self.url);

        let bytes = response.bytes_stream().boxed();
        let inbound = stream::unfold(
            (bytes, SseDecoder::new(), VecDeque::<Frame>::new()),
            |(mut bytes, mut decoder, mut ready)| async move {
                loop {
                    if let Some(frame) = ready.pop_front() {
                        return Some((frame, (bytes, decoder, ready)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            for decoded in decoder.push(&chunk) {
                                match decoded {
                                    Ok(frame) => ready.push_back(frame),
                                    Err(err) => warn!("Dropping event stream frame: {}", err),
                                }
                            }
                        }
                        Some(Err(err)) => {
                            warn!("Event stream read failed: {}", err);
                            return None;
                        }
                        None => return None,
                    }
                }
            },
        )
        .boxed();

        Ok(Link {
            inbound,
            outbound: Box::new(EventStreamSink {
                client: self.client.clone(),
                url: self.url.clone(),
                credential: credential.to_string(),
            }),
        })
    }
}

struct EventStreamSink {
    client: reqwest::Client,
    url: String,
    credential: String,
}

#[async_trait]
impl FrameSink for EventStreamSink {
    async fn send(&self, frame: Frame) -> Result<()> {
        let mut headers = auth_headers(&self.credential, "application/json")?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let response = self
            .client
            .post(&self.url)
            .headers(headers)
            .json(&frame)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChannelError::transport(format!(
                "`{}` rejected with status {}",
                frame.event,
                response.status()
            )));
        }
        Ok(())
    }
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence; only
/// complete lines are interpreted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Frame>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }

    fn dispatch(&mut self) -> Option<Result<Frame>> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");

        let decoded = match event.filter(|name| name != "message") {
            Some(name) => {
                let payload = serde_json::from_str::<Value>(&data)
                    .unwrap_or_else(|_| Value::String(data.clone()));
                Ok(Frame::new(name, payload))
            }
            None => serde_json::from_str::<Frame>(&data).map_err(|err| {
                ChannelError::decode(format!("{} in {:?}", err, data))
            }),
        };
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frames(decoder: &mut SseDecoder, chunk: &str) -> Vec<Frame> {
        decoder
            .push(chunk.as_bytes())
            .into_iter()
            .map(|frame| frame.expect("frame"))
            .collect()
    }

    #[test]
    fn named_events_carry_their_payload_in_data() {
        let mut decoder = SseDecoder::new();
        let decoded = frames(
            &mut decoder,
            "event: task_updated\ndata: {\"id\":\"t1\",\"position\":0}\n\n",
        );
        assert_eq!(
            decoded,
            vec![Frame::new("task_updated", json!({"id": "t1", "position": 0}))]
        );
    }

    #[test]
    fn unnamed_events_carry_a_whole_frame() {
        let mut decoder = SseDecoder::new();
        let decoded = frames(
            &mut decoder,
            "data: {\"event\":\"notification_deleted\",\"payload\":\"n1\"}\r\n\r\n",
        );
        assert_eq!(decoded, vec![Frame::new("notification_deleted", json!("n1"))]);
    }

    #[test]
    fn chunks_split_mid_line_and_mid_character() {
        let mut decoder = SseDecoder::new();
        let text = "event: card_updated\ndata: {\"name\":\"Café\"}\n\n".as_bytes();
        let split = text
            .iter()
            .position(|byte| *byte == 0xC3)
            .expect("multibyte char")
            + 1;

        assert!(decoder.push(&text[..split]).is_empty());
        let decoded = decoder.push(&text[split..]);

        assert_eq!(decoded.len(), 1);
        let frame = decoded.into_iter().next().expect("one").expect("frame");
        assert_eq!(frame.payload, json!({"name": "Café"}));
    }

    #[test]
    fn comments_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let decoded = frames(
            &mut decoder,
            ": keepalive\n\nevent: board_updated\ndata: {\"id\":\ndata: \"b1\"}\n\n",
        );
        assert_eq!(decoded, vec![Frame::new("board_updated", json!({"id": "b1"}))]);
    }

    #[test]
    fn malformed_unnamed_data_is_a_decode_error() {
        let mut decoder = SseDecoder::new();
        let decoded = decoder.push(b"data: not json\n\n");
        assert!(matches!(decoded.as_slice(), [Err(ChannelError::Decode(_))]));

        let recovered = frames(&mut decoder, "event: ping\ndata: 1\n\n");
        assert_eq!(recovered, vec![Frame::new("ping", json!(1))]);
    }
}
