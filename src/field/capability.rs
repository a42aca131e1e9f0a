use serde::{Deserialize, Serialize};
use std::fmt;

use crate::acl::FieldAction;
use crate::field::ValueKind;

/// Variant tag of a field, along with its static capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Key,
    Item,
    ForeignKey,
}

/// Row-level operations a field may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOperation {
    Insert,
    Delete,
    Get,
    Put,
    Find,
    Next,
    Prev,
    Resize,
}

impl FieldType {
    /// Owned by a key field (depth mirrors the owner).
    pub fn has_owner(&self) -> bool {
        matches!(self, Self::Item | Self::ForeignKey)
    }

    /// References rows of another key field.
    pub fn has_target(&self) -> bool {
        matches!(self, Self::ForeignKey)
    }

    /// Value kinds a field of this type may be declared with. Keys never
    /// hold `Null` or row references; items may hold anything but `Null`.
    pub fn accepts_kind(&self, kind: ValueKind) -> bool {
        match self {
            Self::Key => matches!(kind, ValueKind::Boolean | ValueKind::Integer | ValueKind::Text),
            Self::Item => kind != ValueKind::Null,
            Self::ForeignKey => kind == ValueKind::Row,
        }
    }

    /// The capability matrix. Every dispatch consults this one table before
    /// touching a field.
    pub fn supports(&self, operation: FieldOperation) -> bool {
        use FieldOperation::*;
        match self {
            Self::Key => !matches!(operation, Put),
            Self::Item | Self::ForeignKey => matches!(operation, Get | Put),
        }
    }
}

impl FieldOperation {
    /// The ACL action a caller needs before this operation is attempted.
    pub fn required_action(&self) -> FieldAction {
        match self {
            Self::Insert => FieldAction::Insert,
            Self::Delete => FieldAction::Delete,
            Self::Get => FieldAction::Get,
            Self::Put => FieldAction::Put,
            Self::Find => FieldAction::Find,
            Self::Next | Self::Prev => FieldAction::Iterate,
            Self::Resize => FieldAction::ResizeField,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key => write!(f, "Key"),
            Self::Item => write!(f, "Item"),
            Self::ForeignKey => write!(f, "Foreign Key"),
        }
    }
}

impl fmt::Display for FieldOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "Insert",
            Self::Delete => "Delete",
            Self::Get => "Get",
            Self::Put => "Put",
            Self::Find => "Find",
            Self::Next => "Next",
            Self::Prev => "Prev",
            Self::Resize => "Resize",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FieldOperation::*;

    const ALL_OPS: [FieldOperation; 8] = [Insert, Delete, Get, Put, Find, Next, Prev, Resize];

    fn supported(field_type: FieldType) -> Vec<FieldOperation> {
        ALL_OPS
            .iter()
            .copied()
            .filter(|op| field_type.supports(*op))
            .collect()
    }

    #[test]
    fn key_supports_everything_but_put() {
        assert_eq!(
            supported(FieldType::Key),
            vec![Insert, Delete, Get, Find, Next, Prev, Resize]
        );
    }

    #[test]
    fn dependents_only_get_and_put() {
        assert_eq!(supported(FieldType::Item), vec![Get, Put]);
        assert_eq!(supported(FieldType::ForeignKey), vec![Get, Put]);
    }

    #[test]
    fn traversal_maps_to_iterate() {
        assert_eq!(Next.required_action(), FieldAction::Iterate);
        assert_eq!(Prev.required_action(), FieldAction::Iterate);
        assert_eq!(Resize.required_action(), FieldAction::ResizeField);
    }

    #[test]
    fn declared_kinds() {
        let kinds = [
            ValueKind::Null,
            ValueKind::Boolean,
            ValueKind::Integer,
            ValueKind::Text,
            ValueKind::Row,
        ];
        let accepted = |field_type: FieldType| -> Vec<ValueKind> {
            kinds.iter().copied().filter(|k| field_type.accepts_kind(*k)).collect()
        };
        assert_eq!(
            accepted(FieldType::Key),
            vec![ValueKind::Boolean, ValueKind::Integer, ValueKind::Text]
        );
        assert_eq!(accepted(FieldType::Item), kinds[1..].to_vec());
        assert_eq!(accepted(FieldType::ForeignKey), vec![ValueKind::Row]);
    }

    #[test]
    fn ownership_flags() {
        assert!(!FieldType::Key.has_owner());
        assert!(FieldType::Item.has_owner());
        assert!(!FieldType::Item.has_target());
        assert!(FieldType::ForeignKey.has_target());
    }
}
