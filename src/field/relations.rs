use crate::field::{Field, FieldId, Row};

/// A field whose rows can be referenced by foreign keys.
pub trait PointableField: Field {
    /// True when `row` currently holds a value.
    fn is_valid_row(&self, row: Row) -> bool;
}

/// A field owned by a key field. Its depth mirrors the owner's and only the
/// owner may drive it.
pub trait ChildField: Field {
    fn owner(&self) -> FieldId;

    /// Grows storage to `parent_depth`. Never shrinks.
    fn resize_to(&mut self, parent_depth: usize);

    /// Forgets whatever the child stored at `row` after the owner freed it.
    fn clear_row(&mut self, row: Row);
}
