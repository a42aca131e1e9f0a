use serde::{Deserialize, Serialize};

use crate::error::{FieldDbError, FieldDbResult};
use crate::field::common::impl_field;
use crate::field::item_field::ItemColumn;
use crate::field::{ChildField, FieldCommon, FieldId, FieldType, PointableField, Row};

/// Field owned by a key that "points" to rows of another key.
///
/// Each slot is either unset (`None`) or a row that is in use in the target.
/// The reference is validated when it is written; the target resets slots that
/// reference a row it frees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyField {
    pub(crate) inner: FieldCommon,
    owner: FieldId,
    /// `None` once the target was deleted under the detach policy.
    target: Option<FieldId>,
    column: ItemColumn<Row>,
}

impl_field!(ForeignKeyField, FieldType::ForeignKey);

impl ForeignKeyField {
    pub(crate) fn new(inner: FieldCommon, owner: FieldId, target: FieldId, depth: usize) -> Self {
        Self {
            inner,
            owner,
            target: Some(target),
            column: ItemColumn::with_depth(depth),
        }
    }

    fn current_depth(&self) -> usize {
        self.column.depth()
    }

    pub fn target(&self) -> Option<FieldId> {
        self.target
    }

    /// Referenced row at `row`, `None` when unset.
    pub fn get(&self, row: Row) -> FieldDbResult<Option<Row>> {
        match self.column.get(row) {
            Some(slot) => Ok(slot.copied()),
            None => Err(self.bad_row(row)),
        }
    }

    /// Checks a write without performing it. `target` must be the field this
    /// foreign key points at (`None` if it was detached).
    pub fn validate_put(
        &self,
        row: Row,
        target_row: Option<Row>,
        target: Option<&dyn PointableField>,
    ) -> FieldDbResult<()> {
        if row >= self.column.depth() {
            return Err(self.bad_row(row));
        }
        if let Some(target_row) = target_row {
            let valid = target.is_some_and(|t| t.is_valid_row(target_row));
            if !valid {
                return Err(FieldDbError::InvalidReference {
                    field: self.inner.name.clone(),
                    target_row,
                });
            }
        }
        Ok(())
    }

    /// Writes a reference previously accepted by [`Self::validate_put`].
    pub(crate) fn store(&mut self, row: Row, target_row: Option<Row>) {
        self.column.put(row, target_row);
    }

    /// Resets every slot that references `target_row`.
    pub(crate) fn release_target_row(&mut self, target_row: Row) -> usize {
        self.column.clear_where(|r| *r == target_row)
    }

    /// Drops the target and every stored reference.
    pub(crate) fn detach(&mut self) {
        self.target = None;
        self.column.clear_where(|_| true);
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = (Row, Row)> + '_ {
        self.column.occupied().map(|(row, target_row)| (row, *target_row))
    }

    fn bad_row(&self, row: Row) -> FieldDbError {
        FieldDbError::BadRow {
            field: self.inner.name.clone(),
            row,
            depth: self.column.depth(),
        }
    }
}

impl ChildField for ForeignKeyField {
    fn owner(&self) -> FieldId {
        self.owner
    }

    fn resize_to(&mut self, parent_depth: usize) {
        self.column.resize_to(parent_depth);
    }

    fn clear_row(&mut self, row: Row) {
        self.column.clear(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::field::{Field, FieldValue, KeyField, ValueKind};

    fn target_with_row() -> KeyField {
        let mut key = KeyField::new(
            FieldCommon::new(FieldId::new(1), "Dept"),
            ValueKind::Text,
            2,
        );
        key.insert(FieldValue::from("sales")).unwrap();
        key
    }

    fn fk() -> ForeignKeyField {
        ForeignKeyField::new(
            FieldCommon::new(FieldId::new(3), "DeptRef"),
            FieldId::new(2),
            FieldId::new(1),
            3,
        )
    }

    #[test]
    fn accepts_rows_in_use_and_unset() {
        let target = target_with_row();
        let mut field = fk();
        field.validate_put(0, Some(0), Some(&target)).unwrap();
        field.store(0, Some(0));
        assert_eq!(field.get(0).unwrap(), Some(0));
        field.validate_put(0, None, Some(&target)).unwrap();
    }

    #[test]
    fn rejects_free_target_rows() {
        let target = target_with_row();
        let field = fk();
        let err = field.validate_put(0, Some(1), Some(&target)).unwrap_err();
        assert!(matches!(err, FieldDbError::InvalidReference { target_row: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn row_check_comes_first() {
        let target = target_with_row();
        let field = fk();
        let err = field.validate_put(9, Some(5), Some(&target)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn detached_field_only_accepts_unset() {
        let mut field = fk();
        field.store(1, Some(0));
        field.detach();
        assert_eq!(field.target(), None);
        assert_eq!(field.get(1).unwrap(), None);
        assert!(field.validate_put(1, Some(0), None).is_err());
        field.validate_put(1, None, None).unwrap();
        assert_eq!(field.depth(), 3);
    }

    #[test]
    fn release_resets_matching_slots() {
        let mut field = fk();
        field.store(0, Some(0));
        field.store(1, Some(1));
        field.store(2, Some(0));
        assert_eq!(field.release_target_row(0), 2);
        assert_eq!(field.references().collect::<Vec<_>>(), vec![(1, 1)]);
    }
}
