use serde::{Deserialize, Serialize};

use crate::error::{FieldDbError, FieldDbResult};
use crate::field::common::impl_field;
use crate::field::{ChildField, FieldCommon, FieldId, FieldType, FieldValue, Row, ValueKind};

/// Dense per-row storage mirroring an owner's row space.
///
/// A slot may legitimately be empty: there is no independent in-use tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemColumn<T> {
    slots: Vec<Option<T>>,
}

impl<T> ItemColumn<T> {
    pub fn with_depth(depth: usize) -> Self {
        let mut slots = Vec::with_capacity(depth);
        slots.resize_with(depth, || None);
        Self { slots }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// `None` when the row is beyond the depth, `Some(None)` for an empty slot.
    pub fn get(&self, row: Row) -> Option<Option<&T>> {
        self.slots.get(row).map(Option::as_ref)
    }

    /// Replaces the slot at `row`. Returns false (and stores nothing) when the
    /// row is beyond the depth.
    pub fn put(&mut self, row: Row, value: Option<T>) -> bool {
        match self.slots.get_mut(row) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn resize_to(&mut self, depth: usize) {
        if depth > self.slots.len() {
            self.slots.resize_with(depth, || None);
        }
    }

    pub fn clear(&mut self, row: Row) {
        if let Some(slot) = self.slots.get_mut(row) {
            *slot = None;
        }
    }

    /// Empties every slot matching `predicate`, returning how many were cleared.
    pub fn clear_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut cleared = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(&mut predicate) {
                *slot = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Non-empty `(row, value)` pairs.
    pub fn occupied(&self) -> impl Iterator<Item = (Row, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(row, slot)| slot.as_ref().map(|v| (row, v)))
    }
}

/// Represents an "item" in the database: a column owned by a key field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemField {
    pub(crate) inner: FieldCommon,
    owner: FieldId,
    kind: ValueKind,
    column: ItemColumn<FieldValue>,
}

impl_field!(ItemField, FieldType::Item);

impl ItemField {
    /// Depth is taken from the owner at construction.
    pub(crate) fn new(inner: FieldCommon, owner: FieldId, kind: ValueKind, depth: usize) -> Self {
        Self {
            inner,
            owner,
            kind,
            column: ItemColumn::with_depth(depth),
        }
    }

    fn current_depth(&self) -> usize {
        self.column.depth()
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Value at `row`; an empty slot reads as [`FieldValue::Null`].
    pub fn get(&self, row: Row) -> FieldDbResult<FieldValue> {
        match self.column.get(row) {
            Some(slot) => Ok(slot.cloned().unwrap_or(FieldValue::Null)),
            None => Err(self.bad_row(row)),
        }
    }

    /// Stores `value` at `row`. `Null` empties the slot.
    pub fn put(&mut self, row: Row, value: FieldValue) -> FieldDbResult<()> {
        if row >= self.column.depth() {
            return Err(self.bad_row(row));
        }
        if !value.is_null() && value.kind() != self.kind {
            return Err(FieldDbError::TypeMismatch {
                field: self.inner.name.clone(),
                expected: self.kind,
                found: value.kind(),
            });
        }
        let slot = if value.is_null() { None } else { Some(value) };
        self.column.put(row, slot);
        Ok(())
    }

    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if !FieldType::Item.accepts_kind(self.kind) {
            return Err(format!("an item cannot hold {} values", self.kind));
        }
        match self.column.occupied().find(|(_, v)| v.kind() != self.kind) {
            Some((row, value)) => Err(format!(
                "row {row} holds a {} value in a {} item",
                value.kind(),
                self.kind
            )),
            None => Ok(()),
        }
    }

    fn bad_row(&self, row: Row) -> FieldDbError {
        FieldDbError::BadRow {
            field: self.inner.name.clone(),
            row,
            depth: self.column.depth(),
        }
    }
}

impl ChildField for ItemField {
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
