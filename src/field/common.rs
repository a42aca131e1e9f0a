use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::field::FieldType;

/// Row slot shared by a key field and its dependent fields.
pub type Row = usize;

/// Stable identity of a field within its database.
///
/// Ids are never reused, so ACL entries that outlive a deleted field can never
/// attach to a newer field that happens to reuse its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(u64);

impl FieldId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unguessable token the registry requires before it unregisters a field.
///
/// It never leaves the crate: only the cascading delete logic reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeleteToken(Uuid);

impl DeleteToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Common interface for all fields.
pub trait Field {
    fn id(&self) -> FieldId;

    fn name(&self) -> &str;

    fn field_type(&self) -> FieldType;

    /// Number of row slots currently allocated.
    fn depth(&self) -> usize;
}

/// Attributes every field variant carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCommon {
    pub(crate) id: FieldId,
    pub(crate) name: String,
    /// Regenerated whenever a field is loaded from a snapshot.
    #[serde(skip, default = "DeleteToken::generate")]
    pub(crate) delete_token: DeleteToken,
}

impl FieldCommon {
    pub(crate) fn new(id: FieldId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            delete_token: DeleteToken::generate(),
        }
    }
}

/// Implements the identity half of [`Field`] for a struct holding a
/// `FieldCommon` in `inner`. The implementor supplies `depth`.
macro_rules! impl_field {
    ($t:ty, $field_type:expr) => {
        impl $crate::field::Field for $t {
            fn id(&self) -> $crate::field::FieldId {
                self.inner.id
            }

            fn name(&self) -> &str {
                &self.inner.name
            }

            fn field_type(&self) -> $crate::field::FieldType {
                $field_type
            }

            fn depth(&self) -> usize {
                self.current_depth()
            }
        }

        impl $t {
            pub(crate) fn delete_token(&self) -> $crate::field::common::DeleteToken {
                self.inner.delete_token
            }
        }
    };
}

pub(crate) use impl_field;

/// Read-only description of a field, handed out by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub id: FieldId,
    pub name: String,
    pub field_type: FieldType,
    pub depth: usize,
    /// Owning key field (items and foreign keys).
    pub owner: Option<String>,
    /// Target key field (foreign keys that have not been detached).
    pub target: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_tokens_are_unique() {
        let a = FieldCommon::new(FieldId::new(1), "a");
        let b = FieldCommon::new(FieldId::new(1), "a");
        assert_ne!(a.delete_token, b.delete_token);
    }

    #[test]
    fn field_id_roundtrips_as_plain_number() {
        let json = serde_json::to_string(&FieldId::new(12)).unwrap();
        assert_eq!(json, "12");
    }
}
