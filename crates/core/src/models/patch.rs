//! Partial-entity plumbing shared by every patch type.
//!
//! A patch carries an `id` plus one `Option` per entity field. `None` means
//! "absent, keep what the store holds"; `Some(v)` overwrites. Nullable entity
//! fields are `Option<T>` themselves, so their patch slot is
//! `Option<Option<T>>` and an explicit JSON `null` arrives as `Some(None)`.

use serde::{Deserialize, Deserializer};

/// A partial entity: an identifier plus any subset of fields.
pub trait Patch: Clone + std::fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Wire names of the fields present in this patch.
    fn touched_fields(&self) -> Vec<&'static str>;

    /// Drops every present field for which `keep` returns false.
    fn retain_fields(&mut self, keep: &dyn Fn(&str) -> bool);

    fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }
}

/// An entity that can absorb a patch of itself.
pub trait Mergeable: Clone + Sized {
    type Patch: Patch;

    /// Fields present in `patch` overwrite, absent fields are preserved.
    fn merge(&self, patch: &Self::Patch) -> Self;

    /// A patch with every field present.
    fn to_patch(&self) -> Self::Patch;
}

/// Keeps an explicit `null` distinct from an absent field.
///
/// Use together with `#[serde(default)]` so absence still yields `None`.
pub(crate) fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Implements [`Patch`] for a patch struct and [`Mergeable`] for its entity.
///
/// The patch struct must contain `id: String` plus exactly the listed fields,
/// each typed `Option<EntityFieldType>`.
macro_rules! impl_patch {
    ($entity:ty, $patch:ident { $($field:ident => $name:literal),* $(,)? }) => {
        impl $crate::models::Patch for $patch {
            fn id(&self) -> &str {
                &self.id
            }

            fn touched_fields(&self) -> Vec<&'static str> {
                let mut fields = Vec::new();
                $(
                    if self.$field.is_some() {
                        fields.push($name);
                    }
                )*
                fields
            }

            fn retain_fields(&mut self, keep: &dyn Fn(&str) -> bool) {
                $(
                    if self.$field.is_some() && !keep($name) {
                        self.$field = None;
                    }
                )*
            }
        }

        impl $crate::models::Mergeable for $entity {
            type Patch = $patch;

            fn merge(&self, patch: &$patch) -> Self {
                let mut merged = self.clone();
                $(
                    if let Some(value) = &patch.$field {
                        merged.$field = value.clone();
                    }
                )*
                merged
            }

            fn to_patch(&self) -> $patch {
                $patch {
                    id: self.id.clone(),
                    $( $field: Some(self.$field.clone()), )*
                }
            }
        }
    };
}

pub(crate) use impl_patch;

/// Pulls a required field out of a patch when inserting a new entity.
pub(crate) fn require<T>(
    value: Option<T>,
    kind: crate::store::EntityKind,
    id: &str,
    field: &'static str,
) -> Result<T, crate::errors::Error> {
    value.ok_or_else(|| crate::errors::Error::IncompleteEntity {
        kind,
        id: id.to_string(),
        field,
    })
}
