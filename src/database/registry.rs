use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use crate::config::PointerDeletePolicy;
use crate::error::{FieldDbError, FieldDbResult};
use crate::field::common::DeleteToken;
use crate::field::{
    Field, FieldCommon, FieldId, FieldInfo, FieldType, FieldValue, FieldVariant, ForeignKeyField,
    ItemField, KeyField, PointableField, Row, ValueKind,
};

/// Identifier pattern every field name must match.
static FIELD_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

pub fn is_valid_field_name(name: &str) -> bool {
    FIELD_NAME.as_ref().is_some_and(|re| re.is_match(name))
}

/// Owns every field of a database and the owner/target graph between them.
///
/// Fields refer to each other by [`FieldId`]; this registry is the only place
/// that resolves those ids, keeps the children and pointer sets of key fields
/// in sync, and unregisters fields.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: BTreeMap<FieldId, FieldVariant>,
    names: HashMap<String, FieldId>,
    next_id: u64,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: FieldId) -> Option<&FieldVariant> {
        self.fields.get(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<FieldId> {
        self.names.get(name).copied()
    }

    pub fn lookup(&self, name: &str) -> FieldDbResult<&FieldVariant> {
        self.id_of(name)
            .and_then(|id| self.fields.get(&id))
            .ok_or_else(|| FieldDbError::FieldNotFound(name.to_string()))
    }

    /// Fields in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldVariant> + '_ {
        self.fields.values()
    }

    pub fn info(&self, id: FieldId) -> Option<FieldInfo> {
        let field = self.fields.get(&id)?;
        let name_of = |id: Option<FieldId>| {
            id.and_then(|id| self.fields.get(&id))
                .map(|f| f.name().to_string())
        };
        Some(FieldInfo {
            id,
            name: field.name().to_string(),
            field_type: field.field_type(),
            depth: field.depth(),
            owner: name_of(field.owner()),
            target: name_of(field.target()),
        })
    }

    pub fn key(&self, id: FieldId) -> FieldDbResult<&KeyField> {
        let field = self.resolve(id)?;
        field.as_key().ok_or_else(|| wrong_type(field, FieldType::Key))
    }

    pub(crate) fn key_mut(&mut self, id: FieldId) -> FieldDbResult<&mut KeyField> {
        let field = self
            .fields
            .get_mut(&id)
            .ok_or_else(|| FieldDbError::FieldNotFound(id.to_string()))?;
        let found = field.field_type();
        let name = field.name().to_string();
        field.as_key_mut().ok_or(FieldDbError::WrongFieldType {
            field: name,
            expected: FieldType::Key,
            found,
        })
    }

    pub fn register_key(&mut self, name: &str, kind: ValueKind, depth: usize) -> FieldDbResult<FieldId> {
        self.check_new_name(name)?;
        check_kind(name, FieldType::Key, kind)?;
        let id = self.allocate_id()?;
        let field = KeyField::new(FieldCommon::new(id, name), kind, depth);
        self.insert_field(FieldVariant::Key(field));
        info!("Created key field {} ({}) with depth {}", name, id, depth);
        Ok(id)
    }

    pub fn register_item(&mut self, name: &str, owner: FieldId, kind: ValueKind) -> FieldDbResult<FieldId> {
        self.check_new_name(name)?;
        check_kind(name, FieldType::Item, kind)?;
        let depth = self.key(owner)?.depth();
        let id = self.allocate_id()?;
        let field = ItemField::new(FieldCommon::new(id, name), owner, kind, depth);
        self.insert_field(FieldVariant::Item(field));
        self.key_mut(owner)?.add_child(id);
        info!("Created item field {} ({}) owned by {}", name, id, owner);
        Ok(id)
    }

    pub fn register_foreign_key(
        &mut self,
        name: &str,
        owner: FieldId,
        target: FieldId,
    ) -> FieldDbResult<FieldId> {
        self.check_new_name(name)?;
        let depth = self.key(owner)?.depth();
        self.key(target)?;
        let id = self.allocate_id()?;
        let field = ForeignKeyField::new(FieldCommon::new(id, name), owner, target, depth);
        self.insert_field(FieldVariant::ForeignKey(field));
        self.key_mut(owner)?.add_child(id);
        self.key_mut(target)?.add_pointer(id);
        info!(
            "Created foreign key field {} ({}) owned by {} targeting {}",
            name, id, owner, target
        );
        Ok(id)
    }

    /// Removes a single field and its graph memberships. Only succeeds with
    /// the field's own delete token.
    pub(crate) fn unregister(&mut self, id: FieldId, token: DeleteToken) -> FieldDbResult<FieldVariant> {
        let field = self.resolve(id)?;
        if field.delete_token() != token {
            return Err(FieldDbError::InvalidDeleteToken(field.name().to_string()));
        }
        let field = self
            .fields
            .remove(&id)
            .ok_or_else(|| FieldDbError::FieldNotFound(id.to_string()))?;
        self.names.remove(field.name());
        if let Some(key) = field.owner().and_then(|owner| self.key_entry(owner)) {
            key.remove_child(id);
        }
        if let Some(key) = field.target().and_then(|target| self.key_entry(target)) {
            key.remove_pointer(id);
        }
        debug!("Unregistered field {} ({})", field.name(), id);
        Ok(field)
    }

    /// Deletes a field and everything that depends on it. Returns the removed
    /// fields in removal order.
    pub fn delete_field(
        &mut self,
        id: FieldId,
        policy: PointerDeletePolicy,
    ) -> FieldDbResult<Vec<FieldVariant>> {
        self.resolve(id)?;
        let mut removed = Vec::new();
        self.cascade(id, policy, &mut removed)?;
        info!("Deleted field {} and {} dependent field(s)", id, removed.len() - 1);
        Ok(removed)
    }

    fn cascade(
        &mut self,
        id: FieldId,
        policy: PointerDeletePolicy,
        removed: &mut Vec<FieldVariant>,
    ) -> FieldDbResult<()> {
        // Reachable through two relations (e.g. owned by and targeting the
        // same key): already gone.
        let Some(field) = self.fields.get(&id) else {
            return Ok(());
        };
        let token = field.delete_token();
        if let Some(key) = field.as_key() {
            let children: Vec<FieldId> = key.children().collect();
            let pointers: Vec<FieldId> = key.pointers().collect();
            for child in children {
                debug!("Cascading delete of {} to child {}", id, child);
                self.cascade(child, policy, removed)?;
            }
            for pointer in pointers {
                match policy {
                    PointerDeletePolicy::Cascade => {
                        debug!("Cascading delete of {} to pointer {}", id, pointer);
                        self.cascade(pointer, policy, removed)?;
                    }
                    PointerDeletePolicy::Detach => self.detach_pointer(pointer, id),
                }
            }
        }
        removed.push(self.unregister(id, token)?);
        Ok(())
    }

    fn detach_pointer(&mut self, pointer: FieldId, target: FieldId) {
        if let Some(fk) = self
            .fields
            .get_mut(&pointer)
            .and_then(FieldVariant::as_foreign_key_mut)
        {
            debug!("Detaching foreign key {} from {}", pointer, target);
            fk.detach();
        }
        if let Some(key) = self.key_entry(target) {
            key.remove_pointer(pointer);
        }
    }

    /// Deletes `value` from a key field, then clears the freed row in its
    /// children and resets foreign keys that referenced it.
    pub fn delete_key_value(&mut self, id: FieldId, value: &FieldValue) -> FieldDbResult<Row> {
        let key = self.key_mut(id)?;
        let row = key.delete(value)?;
        let children: Vec<FieldId> = key.children().collect();
        let pointers: Vec<FieldId> = key.pointers().collect();

        for child in children {
            if let Some(child) = self.fields.get_mut(&child).and_then(FieldVariant::as_child_mut) {
                child.clear_row(row);
            }
        }
        for pointer in pointers {
            if let Some(fk) = self
                .fields
                .get_mut(&pointer)
                .and_then(FieldVariant::as_foreign_key_mut)
            {
                let released = fk.release_target_row(row);
                if released > 0 {
                    debug!("Reset {} reference(s) to row {} in {}", released, row, pointer);
                }
            }
        }
        Ok(row)
    }

    /// Grows a key field and every child to the new depth.
    pub fn resize_key(&mut self, id: FieldId, amount: i64) -> FieldDbResult<usize> {
        let key = self.key_mut(id)?;
        let depth = key.resize(amount)?;
        let children: Vec<FieldId> = key.children().collect();
        for child in children {
            if let Some(child) = self.fields.get_mut(&child).and_then(FieldVariant::as_child_mut) {
                child.resize_to(depth);
            }
        }
        debug!("Resized key field {} to depth {}", id, depth);
        Ok(depth)
    }

    pub fn put_item(&mut self, id: FieldId, row: Row, value: FieldValue) -> FieldDbResult<()> {
        let field = self
            .fields
            .get_mut(&id)
            .ok_or_else(|| FieldDbError::FieldNotFound(id.to_string()))?;
        let found = field.field_type();
        let name = field.name().to_string();
        let item = field.as_item_mut().ok_or(FieldDbError::WrongFieldType {
            field: name,
            expected: FieldType::Item,
            found,
        })?;
        item.put(row, value)
    }

    /// Validates against the target, then stores. `None` unsets the slot.
    pub fn put_foreign_key(&mut self, id: FieldId, row: Row, target_row: Option<Row>) -> FieldDbResult<()> {
        let field = self.resolve(id)?;
        let fk = field
            .as_foreign_key()
            .ok_or_else(|| wrong_type(field, FieldType::ForeignKey))?;
        let target = fk
            .target()
            .and_then(|target| self.fields.get(&target))
            .and_then(FieldVariant::as_key);
        fk.validate_put(row, target_row, target.map(|t| t as &dyn PointableField))?;

        if let Some(fk) = self
            .fields
            .get_mut(&id)
            .and_then(FieldVariant::as_foreign_key_mut)
        {
            fk.store(row, target_row);
        }
        Ok(())
    }

    /// Rebuilds a registry from snapshot fields, deriving the children and
    /// pointer sets and checking every structural invariant.
    pub(crate) fn from_fields(fields: Vec<FieldVariant>, next_id: u64) -> Result<Self, String> {
        if next_id == u64::MAX {
            return Err("field id counter is exhausted".to_string());
        }
        let mut registry = Self {
            fields: BTreeMap::new(),
            names: HashMap::new(),
            next_id,
        };
        for field in fields {
            let id = field.id();
            if id.as_u64() >= next_id {
                return Err(format!("field id {id} is not below the id counter {next_id}"));
            }
            if !is_valid_field_name(field.name()) {
                return Err(format!("invalid field name '{}'", field.name()));
            }
            if registry.names.contains_key(field.name()) {
                return Err(format!("duplicate field name '{}'", field.name()));
            }
            if registry.fields.contains_key(&id) {
                return Err(format!("duplicate field id {id}"));
            }
            registry.insert_field(field);
        }

        let ids: Vec<FieldId> = registry.fields.keys().copied().collect();
        for id in ids {
            registry.link_loaded(id)?;
        }
        Ok(registry)
    }

    fn link_loaded(&mut self, id: FieldId) -> Result<(), String> {
        let field = self
            .fields
            .get(&id)
            .ok_or_else(|| format!("field {id} vanished"))?;
        let name = field.name().to_string();
        match field {
            FieldVariant::Key(key) => key
                .check_invariants()
                .map_err(|e| format!("key field '{name}': {e}"))?,
            FieldVariant::Item(item) => item
                .check_invariants()
                .map_err(|e| format!("item field '{name}': {e}"))?,
            FieldVariant::ForeignKey(_) => {}
        }

        if let Some(owner) = field.owner() {
            let owner_key = self
                .fields
                .get(&owner)
                .and_then(FieldVariant::as_key)
                .ok_or_else(|| format!("field '{name}' is owned by {owner}, which is not a key field"))?;
            if owner_key.depth() != field.depth() {
                return Err(format!(
                    "field '{name}' has depth {} but its owner has depth {}",
                    field.depth(),
                    owner_key.depth()
                ));
            }
        }

        if let Some(fk) = field.as_foreign_key() {
            match fk.target() {
                Some(target) => {
                    let target_key = self
                        .fields
                        .get(&target)
                        .and_then(FieldVariant::as_key)
                        .ok_or_else(|| format!("field '{name}' targets {target}, which is not a key field"))?;
                    if let Some((row, target_row)) = fk
                        .references()
                        .find(|(_, target_row)| !target_key.is_valid_row(*target_row))
                    {
                        return Err(format!(
                            "field '{name}' row {row} references free row {target_row} of its target"
                        ));
                    }
                }
                None => {
                    if fk.references().next().is_some() {
                        return Err(format!("detached field '{name}' still holds references"));
                    }
                }
            }
        }

        let owner = field.owner();
        let target = field.target();
        if let Some(key) = owner.and_then(|owner| self.key_entry(owner)) {
            key.add_child(id);
        }
        if let Some(key) = target.and_then(|target| self.key_entry(target)) {
            key.add_pointer(id);
        }
        Ok(())
    }

    pub(crate) fn check_new_name(&self, name: &str) -> FieldDbResult<()> {
        if !is_valid_field_name(name) {
            return Err(FieldDbError::InvalidFieldName(name.to_string()));
        }
        if self.names.contains_key(name) {
            return Err(FieldDbError::DuplicateFieldName(name.to_string()));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> FieldDbResult<FieldId> {
        let id = FieldId::new(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(FieldDbError::FieldIdsExhausted)?;
        Ok(id)
    }

    fn insert_field(&mut self, field: FieldVariant) {
        self.names.insert(field.name().to_string(), field.id());
        self.fields.insert(field.id(), field);
    }

    fn resolve(&self, id: FieldId) -> FieldDbResult<&FieldVariant> {
        self.fields
            .get(&id)
            .ok_or_else(|| FieldDbError::FieldNotFound(id.to_string()))
    }

    fn key_entry(&mut self, id: FieldId) -> Option<&mut KeyField> {
        self.fields.get_mut(&id).and_then(FieldVariant::as_key_mut)
    }
}

fn check_kind(name: &str, field_type: FieldType, kind: ValueKind) -> FieldDbResult<()> {
    if field_type.accepts_kind(kind) {
        return Ok(());
    }
    Err(FieldDbError::InvalidValueKind {
        field: name.to_string(),
        field_type,
        kind,
    })
}

fn wrong_type(field: &FieldVariant, expected: FieldType) -> FieldDbError {
    FieldDbError::WrongFieldType {
        field: field.name().to_string(),
        expected,
        found: field.field_type(),
    }
}
