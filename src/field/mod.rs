//! Field storage engine.
//!
//! A database is a set of named fields. Key fields are unique ordered indexes
//! that allocate rows; item fields and foreign key fields are columns owned by
//! a key field and share its row space. What each variant may do is decided by
//! the single capability table in [`FieldType::supports`].

pub mod capability;
pub mod common;
pub mod foreign_key_field;
pub mod item_field;
pub mod key_field;
pub mod key_index;
pub mod relations;
pub mod value;
pub mod variant;

pub use capability::{FieldOperation, FieldType};
pub use common::{Field, FieldCommon, FieldId, FieldInfo, Row};
pub use foreign_key_field::ForeignKeyField;
pub use item_field::{ItemColumn, ItemField};
pub use key_field::KeyField;
pub use key_index::KeyIndex;
pub use relations::{ChildField, PointableField};
pub use value::{FieldValue, ValueKind};
pub use variant::FieldVariant;
