use serde::{Deserialize, Serialize};

use crate::field::common::DeleteToken;
use crate::field::{ChildField, Field, FieldId, FieldType, ForeignKeyField, ItemField, KeyField};

/// Enumeration over all field variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "field_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldVariant {
    Key(KeyField),
    Item(ItemField),
    ForeignKey(ForeignKeyField),
}

impl Field for FieldVariant {
    fn id(&self) -> FieldId {
        match self {
            Self::Key(f) => f.id(),
            Self::Item(f) => f.id(),
            Self::ForeignKey(f) => f.id(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Key(f) => f.name(),
            Self::Item(f) => f.name(),
            Self::ForeignKey(f) => f.name(),
        }
    }

    fn field_type(&self) -> FieldType {
        match self {
            Self::Key(_) => FieldType::Key,
            Self::Item(_) => FieldType::Item,
            Self::ForeignKey(_) => FieldType::ForeignKey,
        }
    }

    fn depth(&self) -> usize {
        match self {
            Self::Key(f) => f.depth(),
            Self::Item(f) => f.depth(),
            Self::ForeignKey(f) => f.depth(),
        }
    }
}

impl FieldVariant {
    pub fn as_key(&self) -> Option<&KeyField> {
        match self {
            Self::Key(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_key_mut(&mut self) -> Option<&mut KeyField> {
        match self {
            Self::Key(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&ItemField> {
        match self {
            Self::Item(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_item_mut(&mut self) -> Option<&mut ItemField> {
        match self {
            Self::Item(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_foreign_key(&self) -> Option<&ForeignKeyField> {
        match self {
            Self::ForeignKey(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_foreign_key_mut(&mut self) -> Option<&mut ForeignKeyField> {
        match self {
            Self::ForeignKey(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_child_mut(&mut self) -> Option<&mut dyn ChildField> {
        match self {
            Self::Key(_) => None,
            Self::Item(f) => Some(f),
            Self::ForeignKey(f) => Some(f),
        }
    }

    /// Key field owning this field, if any.
    pub fn owner(&self) -> Option<FieldId> {
        match self {
            Self::Key(_) => None,
            Self::Item(f) => Some(f.owner()),
            Self::ForeignKey(f) => Some(f.owner()),
        }
    }

    /// Key field this field references, if any.
    pub fn target(&self) -> Option<FieldId> {
        match self {
            Self::ForeignKey(f) => f.target(),
            _ => None,
        }
    }

    pub(crate) fn delete_token(&self) -> DeleteToken {
        match self {
            Self::Key(f) => f.delete_token(),
            Self::Item(f) => f.delete_token(),
            Self::ForeignKey(f) => f.delete_token(),
        }
    }
}
