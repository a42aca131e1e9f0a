use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{FieldDbError, FieldDbResult};
use crate::field::common::impl_field;
use crate::field::key_index::{IndexError, KeyIndex};
use crate::field::{FieldCommon, FieldId, FieldType, FieldValue, PointableField, Row, ValueKind};

/// Field where each entry is unique, searchable and ordered.
///
/// A key field owns the row space: its dependent item and foreign key fields
/// (`children`) mirror its depth, and foreign keys elsewhere (`pointers`)
/// reference its rows. Both sets hold ids resolved through the database's
/// registry and are rebuilt from owner/target references when a snapshot is
/// loaded, so they are not serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyField {
    pub(crate) inner: FieldCommon,
    kind: ValueKind,
    index: KeyIndex<FieldValue>,
    #[serde(skip)]
    children: BTreeSet<FieldId>,
    #[serde(skip)]
    pointers: BTreeSet<FieldId>,
}

impl_field!(KeyField, FieldType::Key);

impl KeyField {
    pub(crate) fn new(inner: FieldCommon, kind: ValueKind, depth: usize) -> Self {
        Self {
            inner,
            kind,
            index: KeyIndex::with_depth(depth),
            children: BTreeSet::new(),
            pointers: BTreeSet::new(),
        }
    }

    fn current_depth(&self) -> usize {
        self.index.depth()
    }

    /// Kind every value in this field has.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn free_rows(&self) -> usize {
        self.index.free_count()
    }

    pub fn insert(&mut self, value: FieldValue) -> FieldDbResult<Row> {
        self.check_kind(&value)?;
        let row = self.index.insert(value).map_err(|e| self.index_error(e))?;
        debug!("Inserted into key field {} at row {}", self.inner.name, row);
        Ok(row)
    }

    /// Removes `value` and returns the freed row.
    pub fn delete(&mut self, value: &FieldValue) -> FieldDbResult<Row> {
        self.check_kind(value)?;
        let row = self.index.delete(value).map_err(|e| self.index_error(e))?;
        debug!("Deleted row {} from key field {}", row, self.inner.name);
        Ok(row)
    }

    pub fn get(&self, row: Row) -> FieldDbResult<&FieldValue> {
        self.index.get(row).map_err(|e| self.index_error(e))
    }

    pub fn find(&self, value: &FieldValue) -> FieldDbResult<Row> {
        self.check_kind(value)?;
        self.index.find(value).map_err(|e| self.index_error(e))
    }

    pub fn next(&self, start: Option<Row>) -> FieldDbResult<Row> {
        self.index.next(start).map_err(|e| self.index_error(e))
    }

    pub fn prev(&self, start: Option<Row>) -> FieldDbResult<Row> {
        self.index.prev(start).map_err(|e| self.index_error(e))
    }

    /// Adds `amount` rows to the free pool and returns the new depth. The
    /// caller is responsible for resizing the children to match.
    pub(crate) fn resize(&mut self, amount: i64) -> FieldDbResult<usize> {
        self.index.resize(amount).map_err(|e| self.index_error(e))
    }

    /// Values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = &FieldValue> + '_ {
        self.index
            .rows_by_value()
            .filter_map(move |row| self.index.get(row).ok())
    }

    pub fn children(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.children.iter().copied()
    }

    pub fn pointers(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.pointers.iter().copied()
    }

    pub(crate) fn add_child(&mut self, child: FieldId) {
        self.children.insert(child);
    }

    pub(crate) fn remove_child(&mut self, child: FieldId) -> bool {
        self.children.remove(&child)
    }

    pub(crate) fn add_pointer(&mut self, pointer: FieldId) {
        self.pointers.insert(pointer);
    }

    pub(crate) fn remove_pointer(&mut self, pointer: FieldId) -> bool {
        self.pointers.remove(&pointer)
    }

    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if !FieldType::Key.accepts_kind(self.kind) {
            return Err(format!("a key cannot hold {} values", self.kind));
        }
        self.index.check_invariants()?;
        if let Some((row, value)) = self.index.entries().find(|(_, v)| v.kind() != self.kind) {
            return Err(format!(
                "row {row} holds a {} value in a {} key",
                value.kind(),
                self.kind
            ));
        }
        Ok(())
    }

    fn check_kind(&self, value: &FieldValue) -> FieldDbResult<()> {
        if value.kind() != self.kind {
            return Err(FieldDbError::TypeMismatch {
                field: self.inner.name.clone(),
                expected: self.kind,
                found: value.kind(),
            });
        }
        Ok(())
    }

    fn index_error(&self, error: IndexError) -> FieldDbError {
        let field = self.inner.name.clone();
        match error {
            IndexError::Full => FieldDbError::OutOfSpace {
                field,
                depth: self.index.depth(),
            },
            IndexError::Duplicate => FieldDbError::DuplicateValue { field },
            IndexError::NotFound => FieldDbError::DataNotFound { field },
            IndexError::BadRow(row) => FieldDbError::BadRow {
                field,
                row,
                depth: self.index.depth(),
            },
            IndexError::EndOfList => FieldDbError::EndOfList { field },
            IndexError::InvalidResize(amount) => FieldDbError::InvalidResize { field, amount },
        }
    }
}

impl PointableField for KeyField {
    fn is_valid_row(&self, row: Row) -> bool {
        self.index.contains_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::field::Field;

    fn key(depth: usize) -> KeyField {
        KeyField::new(
            FieldCommon::new(FieldId::new(1), "Id"),
            ValueKind::Integer,
            depth,
        )
    }

    #[test]
    fn insert_reports_field_context() {
        let mut field = key(1);
        field.insert(FieldValue::from(1)).unwrap();
        let err = field.insert(FieldValue::from(2)).unwrap_err();
        assert!(matches!(err, FieldDbError::OutOfSpace { ref field, depth: 1 } if field == "Id"));
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn wrong_kind_is_rejected_without_mutation() {
        let mut field = key(2);
        let err = field.insert(FieldValue::from("text")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(field.free_rows(), 2);
        assert!(field.insert(FieldValue::Null).is_err());
    }

    #[test]
    fn valid_rows_track_inserts_and_deletes() {
        let mut field = key(2);
        let row = field.insert(FieldValue::from(10)).unwrap();
        assert!(field.is_valid_row(row));
        assert!(!field.is_valid_row(1));
        field.delete(&FieldValue::from(10)).unwrap();
        assert!(!field.is_valid_row(row));
    }

    #[test]
    fn values_iterate_in_order() {
        let mut field = key(3);
        for v in [3, 1, 2] {
            field.insert(FieldValue::from(v)).unwrap();
        }
        let values: Vec<i64> = field.values().filter_map(FieldValue::as_integer).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(field.depth(), 3);
    }
}
