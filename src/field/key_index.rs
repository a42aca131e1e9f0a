//! Unique, ordered, row-allocating index.
//!
//! `KeyIndex` is the storage engine behind every key field. It keeps two maps
//! that are inverses of each other over the rows in use, plus a stack of the
//! rows that are free:
//!
//! * every row in `[0, depth)` is either in `by_row` or in `free_rows`, never both;
//! * `by_row[r] == v` exactly when `by_value[v] == r`;
//! * values are unique.
//!
//! Rows are reused LIFO. Traversal follows the value order and ignores row
//! numbering entirely.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound::{Excluded, Unbounded};

use crate::field::Row;

/// Failure of a [`KeyIndex`] operation. The key field wrapping the index adds
/// the field name when turning these into crate errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    Full,
    Duplicate,
    NotFound,
    BadRow(Row),
    EndOfList,
    InvalidResize(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "KeyIndexRepr<T>",
    try_from = "KeyIndexRepr<T>",
    bound(
        serialize = "T: Serialize + Ord + Clone",
        deserialize = "T: Deserialize<'de> + Ord + Clone"
    )
)]
pub struct KeyIndex<T> {
    depth: usize,
    by_row: BTreeMap<Row, T>,
    by_value: BTreeMap<T, Row>,
    free_rows: Vec<Row>,
}

impl<T: Ord + Clone> KeyIndex<T> {
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth,
            by_row: BTreeMap::new(),
            by_value: BTreeMap::new(),
            // Reversed so the lowest row is popped first.
            free_rows: (0..depth).rev().collect(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of rows holding a value.
    pub fn len(&self) -> usize {
        self.by_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_row.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free_rows.len()
    }

    pub fn insert(&mut self, value: T) -> Result<Row, IndexError> {
        if self.by_value.contains_key(&value) {
            return Err(IndexError::Duplicate);
        }
        let row = self.free_rows.pop().ok_or(IndexError::Full)?;
        self.by_value.insert(value.clone(), row);
        self.by_row.insert(row, value);
        Ok(row)
    }

    /// Removes `value` and returns the row it occupied to the free pool.
    pub fn delete(&mut self, value: &T) -> Result<Row, IndexError> {
        let row = self.by_value.remove(value).ok_or(IndexError::NotFound)?;
        self.by_row.remove(&row);
        self.free_rows.push(row);
        Ok(row)
    }

    pub fn get(&self, row: Row) -> Result<&T, IndexError> {
        self.by_row.get(&row).ok_or(IndexError::BadRow(row))
    }

    pub fn find(&self, value: &T) -> Result<Row, IndexError> {
        self.by_value.get(value).copied().ok_or(IndexError::NotFound)
    }

    pub fn contains_row(&self, row: Row) -> bool {
        self.by_row.contains_key(&row)
    }

    /// Row holding the value that follows the value at `start`, or the smallest
    /// value when `start` is `None`.
    pub fn next(&self, start: Option<Row>) -> Result<Row, IndexError> {
        let found = match start {
            None => self.by_value.iter().next(),
            Some(row) => {
                let value = self.get(row)?;
                self.by_value.range((Excluded(value), Unbounded)).next()
            }
        };
        found.map(|(_, row)| *row).ok_or(IndexError::EndOfList)
    }

    /// Row holding the value that precedes the value at `start`, or the largest
    /// value when `start` is `None`.
    pub fn prev(&self, start: Option<Row>) -> Result<Row, IndexError> {
        let found = match start {
            None => self.by_value.iter().next_back(),
            Some(row) => {
                let value = self.get(row)?;
                self.by_value.range((Unbounded, Excluded(value))).next_back()
            }
        };
        found.map(|(_, row)| *row).ok_or(IndexError::EndOfList)
    }

    /// Grows the index by `amount` free rows and returns the new depth.
    pub fn resize(&mut self, amount: i64) -> Result<usize, IndexError> {
        if amount <= 0 {
            return Err(IndexError::InvalidResize(amount));
        }
        let amount = usize::try_from(amount).map_err(|_| IndexError::InvalidResize(amount))?;
        let new_depth = self
            .depth
            .checked_add(amount)
            .ok_or(IndexError::InvalidResize(amount as i64))?;
        self.free_rows.extend((self.depth..new_depth).rev());
        self.depth = new_depth;
        Ok(new_depth)
    }

    /// In-use `(row, value)` pairs in row order.
    pub fn entries(&self) -> impl Iterator<Item = (Row, &T)> {
        self.by_row.iter().map(|(row, value)| (*row, value))
    }

    /// In-use rows in value order.
    pub fn rows_by_value(&self) -> impl Iterator<Item = Row> + '_ {
        self.by_value.values().copied()
    }

    /// Verifies the structural invariants, describing the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.by_row.len() != self.by_value.len() {
            return Err(format!(
                "{} rows in use but {} distinct values",
                self.by_row.len(),
                self.by_value.len()
            ));
        }
        for (row, value) in &self.by_row {
            if *row >= self.depth {
                return Err(format!("row {row} is beyond depth {}", self.depth));
            }
            if self.by_value.get(value) != Some(row) {
                return Err(format!("row {row} is not the inverse of its value"));
            }
        }
        let mut seen = HashSet::with_capacity(self.free_rows.len());
        for row in &self.free_rows {
            if *row >= self.depth {
                return Err(format!("free row {row} is beyond depth {}", self.depth));
            }
            if self.by_row.contains_key(row) {
                return Err(format!("row {row} is both free and in use"));
            }
            if !seen.insert(*row) {
                return Err(format!("row {row} is free twice"));
            }
        }
        if self.free_rows.len() + self.by_row.len() != self.depth {
            return Err(format!(
                "{} free and {} used rows do not cover depth {}",
                self.free_rows.len(),
                self.by_row.len(),
                self.depth
            ));
        }
        Ok(())
    }
}

/// On-disk shape: only the depth and the row→value entries. The reverse map and
/// the free pool are rebuilt, so a snapshot can never carry an inconsistent
/// free list.
#[derive(Serialize, Deserialize)]
struct KeyIndexRepr<T> {
    depth: usize,
    entries: Vec<(Row, T)>,
}

impl<T: Ord + Clone> From<KeyIndex<T>> for KeyIndexRepr<T> {
    fn from(index: KeyIndex<T>) -> Self {
        Self {
            depth: index.depth,
            entries: index.by_row.into_iter().collect(),
        }
    }
}

impl<T: Ord + Clone> TryFrom<KeyIndexRepr<T>> for KeyIndex<T> {
    type Error = String;

    fn try_from(repr: KeyIndexRepr<T>) -> Result<Self, Self::Error> {
        let mut by_row = BTreeMap::new();
        let mut by_value = BTreeMap::new();
        for (row, value) in repr.entries {
            if row >= repr.depth {
                return Err(format!("row {row} is beyond depth {}", repr.depth));
            }
            if by_value.insert(value.clone(), row).is_some() {
                return Err(format!("duplicate value at row {row}"));
            }
            if by_row.insert(row, value).is_some() {
                return Err(format!("row {row} appears twice"));
            }
        }
        let free_rows = (0..repr.depth)
            .rev()
            .filter(|row| !by_row.contains_key(row))
            .collect();
        Ok(Self {
            depth: repr.depth,
            by_row,
            by_value,
            free_rows,
        })
    }
}
