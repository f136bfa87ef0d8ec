//! Real-time event taxonomy and payload decoding.
//!
//! Payloads arrive in two shapes: the entity itself, or a wrapper such as
//! `{"boardId": "...", "task": {...}}`. Both decode to the same
//! [`PushEvent`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::models::{
    Attachment, BoardPatch, CardPatch, InvitationPatch, NotificationPatch, Patch, TaskPatch,
};
use crate::positions::Slot;
use crate::reconcile::{Change, EntityPatch, RefetchScope};
use crate::store::{EntityKind, EntityRef};

/// Event names on the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    BoardCreated,
    BoardUpdated,
    BoardDeleted,
    MemberJoined,
    MemberRemoved,
    RemovedFromBoard,
    BoardInvitation,
    CardCreated,
    CardUpdated,
    CardDeleted,
    CardMoved,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskStatusChanged,
    TaskAssigned,
    TasksReordered,
    CardsReordered,
    NewNotification,
    NotificationUpdated,
    NotificationMarkedRead,
    NotificationDeleted,
    GithubAttachmentAdded,
    GithubAttachmentRemoved,
}

impl EventName {
    pub const ALL: [EventName; 24] = [
        EventName::BoardCreated,
        EventName::BoardUpdated,
        EventName::BoardDeleted,
        EventName::MemberJoined,
        EventName::MemberRemoved,
        EventName::RemovedFromBoard,
        EventName::BoardInvitation,
        EventName::CardCreated,
        EventName::CardUpdated,
        EventName::CardDeleted,
        EventName::CardMoved,
        EventName::TaskCreated,
        EventName::TaskUpdated,
        EventName::TaskDeleted,
        EventName::TaskStatusChanged,
        EventName::TaskAssigned,
        EventName::TasksReordered,
        EventName::CardsReordered,
        EventName::NewNotification,
        EventName::NotificationUpdated,
        EventName::NotificationMarkedRead,
        EventName::NotificationDeleted,
        EventName::GithubAttachmentAdded,
        EventName::GithubAttachmentRemoved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventName::BoardCreated => "board_created",
            EventName::BoardUpdated => "board_updated",
            EventName::BoardDeleted => "board_deleted",
            EventName::MemberJoined => "member_joined",
            EventName::MemberRemoved => "member_removed",
            EventName::RemovedFromBoard => "removed_from_board",
            EventName::BoardInvitation => "board_invitation",
            EventName::CardCreated => "card_created",
            EventName::CardUpdated => "card_updated",
            EventName::CardDeleted => "card_deleted",
            EventName::CardMoved => "card_moved",
            EventName::TaskCreated => "task_created",
            EventName::TaskUpdated => "task_updated",
            EventName::TaskDeleted => "task_deleted",
            EventName::TaskStatusChanged => "task_status_changed",
            EventName::TaskAssigned => "task_assigned",
            EventName::TasksReordered => "tasks_reordered",
            EventName::CardsReordered => "cards_reordered",
            EventName::NewNotification => "new_notification",
            EventName::NotificationUpdated => "notification_updated",
            EventName::NotificationMarkedRead => "notification_marked_read",
            EventName::NotificationDeleted => "notification_deleted",
            EventName::GithubAttachmentAdded => "github_attachment_added",
            EventName::GithubAttachmentRemoved => "github_attachment_removed",
        }
    }

    pub fn parse(name: &str) -> Option<EventName> {
        EventName::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == name)
    }

    /// Events addressed to the user rather than to a board room. These are
    /// applied whichever board is open.
    pub fn is_user_scoped(self) -> bool {
        matches!(
            self,
            EventName::BoardCreated
                | EventName::BoardDeleted
                | EventName::RemovedFromBoard
                | EventName::BoardInvitation
                | EventName::NewNotification
                | EventName::NotificationUpdated
                | EventName::NotificationMarkedRead
                | EventName::NotificationDeleted
        )
    }

    /// Board-level events that change what a board list shows. On a board
    /// other than the open one they call for a reload of the list.
    pub fn lists_boards(self) -> bool {
        matches!(
            self,
            EventName::BoardUpdated | EventName::MemberJoined | EventName::MemberRemoved
        )
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    BoardCreated(BoardPatch),
    BoardUpdated(BoardPatch),
    BoardDeleted {
        board_id: String,
    },
    MemberJoined {
        board_id: String,
        member_id: Option<String>,
    },
    MemberRemoved {
        board_id: String,
        member_id: Option<String>,
    },
    RemovedFromBoard {
        board_id: String,
    },
    BoardInvitation(InvitationPatch),
    CardCreated(CardPatch),
    CardUpdated(CardPatch),
    CardDeleted {
        board_id: Option<String>,
        card_id: String,
    },
    CardMoved(CardPatch),
    TaskCreated(TaskPatch),
    TaskUpdated(TaskPatch),
    TaskDeleted {
        board_id: Option<String>,
        task_id: Option<String>,
    },
    /// The service only says "something about tasks on this board changed".
    TasksTouched {
        name: EventName,
        board_id: String,
    },
    TasksReordered {
        board_id: Option<String>,
        card_id: String,
        positions: Option<Vec<Slot>>,
    },
    CardsReordered {
        board_id: String,
        positions: Option<Vec<Slot>>,
    },
    NotificationCreated(NotificationPatch),
    NotificationUpdated(NotificationPatch),
    NotificationDeleted {
        notification_id: String,
    },
    AttachmentAdded {
        board_id: Option<String>,
        task_id: String,
        attachment: Attachment,
    },
    AttachmentRemoved {
        board_id: Option<String>,
        task_id: String,
        attachment_id: String,
    },
}

/// What the store should do about a push event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    Apply(Change),
    Refetch(RefetchScope),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskPosition {
    #[serde(alias = "id")]
    task_id: String,
    position: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardPosition {
    #[serde(alias = "id")]
    card_id: String,
    position: i64,
}

fn object<'a>(name: EventName, payload: &'a Value) -> Result<&'a serde_json::Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| Error::invalid_payload(name.as_str(), "expected a JSON object"))
}

/// The wrapped entity under `key`, or the payload itself.
fn entity_body<'a>(payload: &'a Value, key: &str) -> &'a Value {
    match payload.get(key) {
        Some(inner) if inner.is_object() => inner,
        _ => payload,
    }
}

fn decode_body<T: DeserializeOwned>(name: EventName, body: &Value) -> Result<T> {
    T::deserialize(body).map_err(|err| Error::invalid_payload(name.as_str(), err.to_string()))
}

/// First string found under any of `keys`.
fn text(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn require_text(name: EventName, payload: &Value, keys: &[&str]) -> Result<String> {
    text(payload, keys).ok_or_else(|| {
        Error::invalid_payload(name.as_str(), format!("missing `{}`", keys.join("` or `")))
    })
}

fn outer_board(payload: &Value) -> Option<String> {
    text(payload, &["boardId"])
}

fn decode_board(name: EventName, payload: &Value) -> Result<BoardPatch> {
    decode_body(name, entity_body(payload, "board"))
}

fn decode_card(name: EventName, payload: &Value) -> Result<CardPatch> {
    let mut patch: CardPatch = decode_body(name, entity_body(payload, "card"))?;
    if patch.board_id.is_none() {
        patch.board_id = outer_board(payload);
    }
    Ok(patch)
}

fn decode_task(name: EventName, payload: &Value) -> Result<TaskPatch> {
    let mut patch: TaskPatch = match payload.get("updates") {
        // `{taskId, updates, boardId}` as relayed from a peer client.
        Some(updates) if updates.is_object() => {
            let task_id = require_text(name, payload, &["taskId"])?;
            let mut body = updates.clone();
            if let Some(map) = body.as_object_mut() {
                map.insert("id".into(), Value::String(task_id));
            }
            decode_body(name, &body)?
        }
        _ => decode_body(name, entity_body(payload, "task"))?,
    };
    if patch.board_id.is_none() {
        patch.board_id = outer_board(payload);
    }
    if patch.card_id.is_none() && payload.get("task").is_some() {
        patch.card_id = text(payload, &["cardId"]);
    }
    Ok(patch)
}

fn decode_notification(name: EventName, payload: &Value) -> Result<NotificationPatch> {
    decode_body(name, entity_body(payload, "notification"))
}

impl PushEvent {
    pub fn decode(raw_name: &str, payload: &Value) -> Result<PushEvent> {
        let name =
            EventName::parse(raw_name).ok_or_else(|| Error::UnknownEvent(raw_name.to_string()))?;
        // Notification ids may arrive as a bare string.
        if !matches!(
            name,
            EventName::NotificationDeleted | EventName::NotificationMarkedRead
        ) {
            object(name, payload)?;
        }

        let event = match name {
            EventName::BoardCreated => PushEvent::BoardCreated(decode_board(name, payload)?),
            EventName::BoardUpdated => PushEvent::BoardUpdated(decode_board(name, payload)?),
            EventName::BoardDeleted => PushEvent::BoardDeleted {
                board_id: require_text(name, payload, &["boardId", "id"])?,
            },
            EventName::MemberJoined => PushEvent::MemberJoined {
                board_id: require_text(name, payload, &["boardId"])?,
                member_id: text(payload, &["memberId", "userId"]),
            },
            EventName::MemberRemoved => PushEvent::MemberRemoved {
                board_id: require_text(name, payload, &["boardId"])?,
                member_id: text(payload, &["memberId", "userId"]),
            },
            EventName::RemovedFromBoard => PushEvent::RemovedFromBoard {
                board_id: require_text(name, payload, &["boardId", "id"])?,
            },
            EventName::BoardInvitation => {
                let mut patch: InvitationPatch =
                    decode_body(name, entity_body(payload, "invitation"))?;
                if patch.board_id.is_none() {
                    patch.board_id = outer_board(payload);
                }
                PushEvent::BoardInvitation(patch)
            }
            EventName::CardCreated => PushEvent::CardCreated(decode_card(name, payload)?),
            EventName::CardUpdated => PushEvent::CardUpdated(decode_card(name, payload)?),
            EventName::CardMoved => PushEvent::CardMoved(decode_card(name, payload)?),
            EventName::CardDeleted => PushEvent::CardDeleted {
                board_id: outer_board(payload),
                card_id: require_text(name, payload, &["cardId", "id"])?,
            },
            EventName::TaskCreated => PushEvent::TaskCreated(decode_task(name, payload)?),
            EventName::TaskUpdated => PushEvent::TaskUpdated(decode_task(name, payload)?),
            EventName::TaskDeleted => PushEvent::TaskDeleted {
                board_id: outer_board(payload),
                task_id: text(payload, &["taskId", "id"]),
            },
            EventName::TaskStatusChanged | EventName::TaskAssigned => PushEvent::TasksTouched {
                name,
                board_id: require_text(name, payload, &["boardId"])?,
            },
            EventName::TasksReordered => {
                let positions = match payload.get("taskPositions") {
                    Some(list) => Some(
                        decode_body::<Vec<TaskPosition>>(name, list)?
                            .into_iter()
                            .map(|slot| Slot::new(slot.task_id, slot.position))
                            .collect(),
                    ),
                    None => None,
                };
                PushEvent::TasksReordered {
                    board_id: outer_board(payload),
                    card_id: require_text(name, payload, &["cardId"])?,
                    positions,
                }
            }
            EventName::CardsReordered => {
                let positions = match payload.get("cardPositions") {
                    Some(list) => Some(
                        decode_body::<Vec<CardPosition>>(name, list)?
                            .into_iter()
                            .map(|slot| Slot::new(slot.card_id, slot.position))
                            .collect(),
                    ),
                    None => None,
                };
                PushEvent::CardsReordered {
                    board_id: require_text(name, payload, &["boardId"])?,
                    positions,
                }
            }
            EventName::NewNotification => {
                PushEvent::NotificationCreated(decode_notification(name, payload)?)
            }
            EventName::NotificationUpdated => {
                PushEvent::NotificationUpdated(decode_notification(name, payload)?)
            }
            EventName::NotificationMarkedRead => {
                let id = match payload {
                    Value::String(id) => id.clone(),
                    _ => require_text(name, entity_body(payload, "notification"), &["id"])
                        .or_else(|_| require_text(name, payload, &["notificationId"]))?,
                };
                let mut patch = NotificationPatch::new(id);
                patch.read = Some(true);
                PushEvent::NotificationUpdated(patch)
            }
            EventName::NotificationDeleted => PushEvent::NotificationDeleted {
                notification_id: match payload {
                    Value::String(id) => id.clone(),
                    _ => require_text(name, payload, &["notificationId", "id"])?,
                },
            },
            EventName::GithubAttachmentAdded => PushEvent::AttachmentAdded {
                board_id: outer_board(payload),
                task_id: require_text(name, payload, &["taskId"])?,
                attachment: decode_body(
                    name,
                    payload.get("attachment").ok_or_else(|| {
                        Error::invalid_payload(name.as_str(), "missing `attachment`")
                    })?,
                )?,
            },
            EventName::GithubAttachmentRemoved => PushEvent::AttachmentRemoved {
                board_id: outer_board(payload),
                task_id: require_text(name, payload, &["taskId"])?,
                attachment_id: require_text(name, payload, &["attachmentId"])?,
            },
        };
        Ok(event)
    }

    pub fn name(&self) -> EventName {
        match self {
            PushEvent::BoardCreated(_) => EventName::BoardCreated,
            PushEvent::BoardUpdated(_) => EventName::BoardUpdated,
            PushEvent::BoardDeleted { .. } => EventName::BoardDeleted,
            PushEvent::MemberJoined { .. } => EventName::MemberJoined,
            PushEvent::MemberRemoved { .. } => EventName::MemberRemoved,
            PushEvent::RemovedFromBoard { .. } => EventName::RemovedFromBoard,
            PushEvent::BoardInvitation(_) => EventName::BoardInvitation,
            PushEvent::CardCreated(_) => EventName::CardCreated,
            PushEvent::CardUpdated(_) => EventName::CardUpdated,
            PushEvent::CardDeleted { .. } => EventName::CardDeleted,
            PushEvent::CardMoved(_) => EventName::CardMoved,
            PushEvent::TaskCreated(_) => EventName::TaskCreated,
            PushEvent::TaskUpdated(_) => EventName::TaskUpdated,
            PushEvent::TaskDeleted { .. } => EventName::TaskDeleted,
            PushEvent::TasksTouched { name, .. } => *name,
            PushEvent::TasksReordered { .. } => EventName::TasksReordered,
            PushEvent::CardsReordered { .. } => EventName::CardsReordered,
            PushEvent::NotificationCreated(_) => EventName::NewNotification,
            PushEvent::NotificationUpdated(_) => EventName::NotificationUpdated,
            PushEvent::NotificationDeleted { .. } => EventName::NotificationDeleted,
            PushEvent::AttachmentAdded { .. } => EventName::GithubAttachmentAdded,
            PushEvent::AttachmentRemoved { .. } => EventName::GithubAttachmentRemoved,
        }
    }

    /// Board the event concerns, when the payload says.
    pub fn board_id(&self) -> Option<&str> {
        match self {
            PushEvent::BoardCreated(patch) | PushEvent::BoardUpdated(patch) => Some(patch.id()),
            PushEvent::BoardDeleted { board_id }
            | PushEvent::MemberJoined { board_id, .. }
            | PushEvent::MemberRemoved { board_id, .. }
            | PushEvent::RemovedFromBoard { board_id }
            | PushEvent::TasksTouched { board_id, .. }
            | PushEvent::CardsReordered { board_id, .. } => Some(board_id),
            PushEvent::BoardInvitation(patch) => patch.board_id.as_deref(),
            PushEvent::CardCreated(patch)
            | PushEvent::CardUpdated(patch)
            | PushEvent::CardMoved(patch) => patch.board_id.as_deref(),
            PushEvent::TaskCreated(patch) | PushEvent::TaskUpdated(patch) => {
                patch.board_id.as_deref()
            }
            PushEvent::CardDeleted { board_id, .. }
            | PushEvent::TaskDeleted { board_id, .. }
            | PushEvent::TasksReordered { board_id, .. }
            | PushEvent::AttachmentAdded { board_id, .. }
            | PushEvent::AttachmentRemoved { board_id, .. } => board_id.as_deref(),
            PushEvent::NotificationCreated(_)
            | PushEvent::NotificationUpdated(_)
            | PushEvent::NotificationDeleted { .. } => None,
        }
    }

    pub fn is_user_scoped(&self) -> bool {
        self.name().is_user_scoped()
    }

    /// Turns the event into a store change, or into a refetch when the
    /// payload is too thin to apply.
    pub fn into_reaction(self) -> Reaction {
        match self {
            PushEvent::BoardCreated(patch) | PushEvent::BoardUpdated(patch) => {
                Reaction::Apply(Change::Upsert(EntityPatch::Board(patch)))
            }
            PushEvent::BoardDeleted { board_id } | PushEvent::RemovedFromBoard { board_id } => {
                Reaction::Apply(Change::Remove(EntityRef::board(board_id)))
            }
            PushEvent::MemberJoined {
                board_id,
                member_id,
            } => Reaction::Apply(Change::Membership {
                board_id,
                member_id,
                joined: true,
            }),
            PushEvent::MemberRemoved {
                board_id,
                member_id,
            } => Reaction::Apply(Change::Membership {
                board_id,
                member_id,
                joined: false,
            }),
            PushEvent::BoardInvitation(patch) => {
                Reaction::Apply(Change::Upsert(EntityPatch::Invitation(patch)))
            }
            PushEvent::CardCreated(patch)
            | PushEvent::CardUpdated(patch)
            | PushEvent::CardMoved(patch) => {
                Reaction::Apply(Change::Upsert(EntityPatch::Card(patch)))
            }
            PushEvent::CardDeleted { card_id, .. } => {
                Reaction::Apply(Change::Remove(EntityRef::card(card_id)))
            }
            PushEvent::TaskCreated(patch) | PushEvent::TaskUpdated(patch) => {
                Reaction::Apply(Change::Upsert(EntityPatch::Task(patch)))
            }
            PushEvent::TaskDeleted {
                task_id: Some(task_id),
                ..
            } => Reaction::Apply(Change::Remove(EntityRef::task(task_id))),
            PushEvent::TaskDeleted {
                board_id: Some(board_id),
                task_id: None,
            }
            | PushEvent::TasksTouched { board_id, .. }
            | PushEvent::CardsReordered {
                board_id,
                positions: None,
            } => Reaction::Refetch(RefetchScope::board(board_id)),
            PushEvent::TaskDeleted {
                board_id: None,
                task_id: None,
            } => Reaction::Refetch(RefetchScope::Boards),
            PushEvent::TasksReordered {
                card_id,
                positions: Some(positions),
                ..
            } => Reaction::Apply(Change::Reposition {
                kind: EntityKind::Task,
                parent_id: card_id,
                positions,
            }),
            PushEvent::TasksReordered {
                board_id,
                card_id,
                positions: None,
            } => match board_id {
                Some(board_id) => Reaction::Refetch(RefetchScope::card_tasks(board_id, card_id)),
                None => Reaction::Refetch(RefetchScope::Boards),
            },
            PushEvent::CardsReordered {
                board_id,
                positions: Some(positions),
            } => Reaction::Apply(Change::Reposition {
                kind: EntityKind::Card,
                parent_id: board_id,
                positions,
            }),
            PushEvent::NotificationCreated(patch) | PushEvent::NotificationUpdated(patch) => {
                Reaction::Apply(Change::Upsert(EntityPatch::Notification(patch)))
            }
            PushEvent::NotificationDeleted { notification_id } => Reaction::Apply(
                Change::Remove(EntityRef::notification(notification_id)),
            ),
            PushEvent::AttachmentAdded {
                task_id,
                attachment,
                ..
            } => Reaction::Apply(Change::AttachmentAdded {
                task_id,
                attachment,
            }),
            PushEvent::AttachmentRemoved {
                task_id,
                attachment_id,
                ..
            } => Reaction::Apply(Change::AttachmentRemoved {
                task_id,
                attachment_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_names_match_channel_contract() {
        let actual = EventName::ALL
            .iter()
            .map(|name| serde_json::to_string(name).expect("serialize event name"))
            .collect::<Vec<_>>();
        let expected = EventName::ALL
            .iter()
            .map(|name| format!("\"{}\"", name.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(actual, expected);
        assert_eq!(EventName::parse("tasks_reordered"), Some(EventName::TasksReordered));
        assert_eq!(EventName::parse("task_comment_added"), None);
    }

    #[test]
    fn wrapped_and_bare_task_payloads_decode_alike() {
        let wrapped = PushEvent::decode(
            "task_updated",
            &json!({"boardId": "b1", "task": {"id": "t1", "cardId": "c2", "position": 0}}),
        )
        .expect("wrapped");
        let bare = PushEvent::decode(
            "task_updated",
            &json!({"id": "t1", "boardId": "b1", "cardId": "c2", "position": 0}),
        )
        .expect("bare");
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.board_id(), Some("b1"));
    }

    #[test]
    fn relayed_task_updates_decode_as_delta() {
        let event = PushEvent::decode(
            "task_updated",
            &json!({"taskId": "t1", "boardId": "b1", "updates": {"title": "Renamed"}}),
        )
        .expect("relayed");
        let PushEvent::TaskUpdated(patch) = event else {
            panic!("expected a task update");
        };
        assert_eq!(patch.id, "t1");
        assert_eq!(patch.title.as_deref(), Some("Renamed"));
        assert_eq!(patch.touched_fields(), vec!["boardId", "title"]);
    }

    #[test]
    fn reorder_without_positions_refetches() {
        let event = PushEvent::decode("cards_reordered", &json!({"boardId": "b1"})).unwrap();
        assert_eq!(
            event.into_reaction(),
            Reaction::Refetch(RefetchScope::board("b1"))
        );

        let event = PushEvent::decode(
            "tasks_reordered",
            &json!({"boardId": "b1", "cardId": "c1",
                    "taskPositions": [{"taskId": "t2", "position": 0}, {"taskId": "t1", "position": 1}]}),
        )
        .unwrap();
        assert_eq!(
            event.into_reaction(),
            Reaction::Apply(Change::Reposition {
                kind: EntityKind::Task,
                parent_id: "c1".into(),
                positions: vec![Slot::new("t2", 0), Slot::new("t1", 1)],
            })
        );
    }

    #[test]
    fn notification_marked_read_accepts_a_bare_id() {
        let event = PushEvent::decode("notification_marked_read", &json!("n7")).unwrap();
        let Reaction::Apply(Change::Upsert(EntityPatch::Notification(patch))) =
            event.into_reaction()
        else {
            panic!("expected a notification upsert");
        };
        assert_eq!(patch.id, "n7");
        assert_eq!(patch.read, Some(true));
    }

    #[test]
    fn unknown_and_malformed_events_are_errors() {
        assert!(matches!(
            PushEvent::decode("user_joined", &json!({})),
            Err(Error::UnknownEvent(_))
        ));
        assert!(matches!(
            PushEvent::decode("card_deleted", &json!({"boardId": "b1"})),
            Err(Error::InvalidPayload { .. })
        ));
        assert!(matches!(
            PushEvent::decode("task_created", &json!([1, 2])),
            Err(Error::InvalidPayload { .. })
        ));
    }

    #[test]
    fn user_scoped_events_are_flagged() {
        assert!(EventName::BoardInvitation.is_user_scoped());
        assert!(EventName::NewNotification.is_user_scoped());
        assert!(!EventName::CardUpdated.is_user_scoped());
        assert!(EventName::MemberJoined.lists_boards());
        assert!(!EventName::MemberJoined.is_user_scoped());
    }
}
