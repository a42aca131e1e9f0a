//! The database session layer.
//!
//! A [`Database`] owns a field registry and a user table, and tracks which
//! user is logged in. Every public operation is checked against that user's
//! [`AccessControlList`] before anything else happens:
//!
//! 1. the field is looked up by name,
//! 2. the session user's ACL must allow the matching [`FieldAction`],
//! 3. the field's type must support the operation,
//! 4. then the operation validates its own arguments.
//!
//! Failures never leave partial changes behind.

pub mod catalog;
pub mod registry;
pub mod snapshot;
pub mod user;

pub use catalog::DatabaseCatalog;
pub use registry::{is_valid_field_name, FieldRegistry};
pub use snapshot::{DatabaseSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use user::User;

use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::acl::{
    AccessControlList, AclEditor, DatabaseAction, FieldAction, PermissionTarget, PermissionType,
};
use crate::config::DatabaseConfig;
use crate::error::{FieldDbError, FieldDbResult};
use crate::field::{
    Field, FieldId, FieldInfo, FieldOperation, FieldType, FieldValue, FieldVariant, KeyField, Row,
    ValueKind,
};

pub struct Database {
    name: String,
    config: DatabaseConfig,
    registry: FieldRegistry,
    users: BTreeMap<String, User>,
    current_user: String,
}

impl Database {
    /// Creates an empty database whose only user is `root_user`, logged in.
    pub fn new(name: impl Into<String>, root_user: &str, root_password: &str) -> Self {
        Self::with_config(name, root_user, root_password, DatabaseConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        root_user: &str,
        root_password: &str,
        config: DatabaseConfig,
    ) -> Self {
        let name = name.into();
        let mut users = BTreeMap::new();
        users.insert(root_user.to_string(), User::root(root_user, root_password));
        info!("Created database {} with root user {}", name, root_user);
        Self {
            name,
            config,
            registry: FieldRegistry::new(),
            users,
            current_user: root_user.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    // ============ Field factory ============

    pub fn create_key_field(&mut self, name: &str, kind: ValueKind, depth: usize) -> FieldDbResult<FieldInfo> {
        self.require_database(DatabaseAction::CreateField)?;
        let id = self.registry.register_key(name, kind, depth)?;
        self.info_of(id)
    }

    pub fn create_item_field(&mut self, name: &str, owner: &str, kind: ValueKind) -> FieldDbResult<FieldInfo> {
        self.require_database(DatabaseAction::CreateField)?;
        self.registry.check_new_name(name)?;
        let owner = self.registry.lookup(owner)?.id();
        let id = self.registry.register_item(name, owner, kind)?;
        self.info_of(id)
    }

    pub fn create_foreign_key_field(&mut self, name: &str, owner: &str, target: &str) -> FieldDbResult<FieldInfo> {
        self.require_database(DatabaseAction::CreateField)?;
        self.registry.check_new_name(name)?;
        let owner = self.registry.lookup(owner)?.id();
        let target = self.registry.lookup(target)?.id();
        let id = self.registry.register_foreign_key(name, owner, target)?;
        self.info_of(id)
    }

    // ============ Field registry ============

    pub fn field(&self, name: &str) -> FieldDbResult<FieldInfo> {
        let field = self.registry.lookup(name)?;
        self.require_field(field, FieldAction::SeeField)?;
        self.info_of(field.id())
    }

    /// Fields the session user may see, in creation order.
    pub fn all_fields(&self) -> FieldDbResult<Vec<FieldInfo>> {
        let acl = self.session_acl()?;
        Ok(self
            .registry
            .iter()
            .filter(|field| acl.can_do_field(field.id(), FieldAction::SeeField))
            .filter_map(|field| self.registry.info(field.id()))
            .collect())
    }

    /// Deletes `name` and, recursively, the fields that depend on it. Returns
    /// the names of every removed field, dependents first.
    pub fn delete_field(&mut self, name: &str) -> FieldDbResult<Vec<String>> {
        let field = self.registry.lookup(name)?;
        self.require_field(field, FieldAction::DeleteField)?;
        let id = field.id();

        let removed = self.registry.delete_field(id, self.config.pointer_policy)?;
        for user in self.users.values_mut() {
            for field in &removed {
                user.acl.forget_field(field.id());
            }
        }
        info!("{} deleted field {} ({} removed)", self.current_user, name, removed.len());
        Ok(removed.iter().map(|f| f.name().to_string()).collect())
    }

    // ============ Row operations ============

    pub fn insert(&mut self, field: &str, value: impl Into<FieldValue>) -> FieldDbResult<Row> {
        let id = self.authorize(field, FieldOperation::Insert)?.id();
        self.registry.key_mut(id)?.insert(value.into())
    }

    /// Removes `value` from a key field and returns its freed row. Dependent
    /// columns lose whatever they stored at that row.
    pub fn delete(&mut self, field: &str, value: impl Into<FieldValue>) -> FieldDbResult<Row> {
        let id = self.authorize(field, FieldOperation::Delete)?.id();
        self.registry.delete_key_value(id, &value.into())
    }

    /// Value at `row`. Foreign keys yield [`FieldValue::Row`] or `Null`.
    pub fn get(&self, field: &str, row: Row) -> FieldDbResult<FieldValue> {
        match self.authorize(field, FieldOperation::Get)? {
            FieldVariant::Key(key) => key.get(row).cloned(),
            FieldVariant::Item(item) => item.get(row),
            FieldVariant::ForeignKey(fk) => fk.get(row).map(FieldValue::from),
        }
    }

    /// Writes an item slot or a foreign key reference. `Null` clears it.
    pub fn put(&mut self, field: &str, row: Row, value: impl Into<FieldValue>) -> FieldDbResult<()> {
        let value = value.into();
        let target = self.authorize(field, FieldOperation::Put)?;
        let (id, field_type) = (target.id(), target.field_type());
        match field_type {
            FieldType::Item => self.registry.put_item(id, row, value),
            FieldType::ForeignKey => {
                let target_row = match value {
                    FieldValue::Null => None,
                    FieldValue::Row(r) => Some(r),
                    other => {
                        return Err(FieldDbError::TypeMismatch {
                            field: field.to_string(),
                            expected: ValueKind::Row,
                            found: other.kind(),
                        })
                    }
                };
                self.registry.put_foreign_key(id, row, target_row)
            }
            FieldType::Key => Err(unsupported(field, field_type, FieldOperation::Put)),
        }
    }

    pub fn find(&self, field: &str, value: impl Into<FieldValue>) -> FieldDbResult<Row> {
        let key = self.authorize_key(field, FieldOperation::Find)?;
        key.find(&value.into())
    }

    /// Row holding the next larger value after `start`, or the smallest
    /// value when `start` is `None`.
    pub fn next(&self, field: &str, start: Option<Row>) -> FieldDbResult<Row> {
        self.authorize_key(field, FieldOperation::Next)?.next(start)
    }

    /// Row holding the next smaller value before `start`, or the largest
    /// value when `start` is `None`.
    pub fn prev(&self, field: &str, start: Option<Row>) -> FieldDbResult<Row> {
        self.authorize_key(field, FieldOperation::Prev)?.prev(start)
    }

    /// Adds `amount` rows to a key field and its dependents. Returns the new
    /// depth.
    pub fn resize(&mut self, field: &str, amount: i64) -> FieldDbResult<usize> {
        let id = self.authorize(field, FieldOperation::Resize)?.id();
        self.registry.resize_key(id, amount)
    }

    // ============ Users ============

    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    pub fn acl(&self) -> FieldDbResult<&AccessControlList> {
        self.session_acl()
    }

    /// Users the session user may see: everyone with View Users, otherwise
    /// only the users it created.
    pub fn all_users(&self) -> FieldDbResult<Vec<String>> {
        let view_all = self.session_acl()?.can_do_database(DatabaseAction::ViewUsers);
        Ok(self
            .users
            .values()
            .filter(|user| view_all || user.creator() == Some(self.current_user.as_str()))
            .map(|user| user.username().to_string())
            .collect())
    }

    /// Permissions of a user visible to the session user (or of itself).
    pub fn user_acl(&self, username: &str) -> FieldDbResult<&AccessControlList> {
        if username == self.current_user {
            return self.session_acl();
        }
        Ok(self.visible_user(username)?.acl())
    }

    pub fn add_user(&mut self, username: &str, password: &str) -> FieldDbResult<()> {
        self.require_database(DatabaseAction::AddUser)?;
        if self.users.contains_key(username) {
            return Err(FieldDbError::DuplicateUser(username.to_string()));
        }
        let user = User::new(username, password, self.current_user.clone());
        self.users.insert(username.to_string(), user);
        info!("{} added user {}", self.current_user, username);
        Ok(())
    }

    pub fn delete_user(&mut self, username: &str) -> FieldDbResult<()> {
        self.require_database(DatabaseAction::DeleteUser)?;
        let user = self.visible_user(username)?;
        if user.username() == self.current_user {
            return Err(FieldDbError::UserCannotDeleteItself(username.to_string()));
        }
        if user.is_root() {
            warn!("{} tried to delete the root user", self.current_user);
            return Err(FieldDbError::DatabaseActionDenied {
                user: self.current_user.clone(),
                action: DatabaseAction::DeleteUser,
            });
        }
        self.users.remove(username);
        info!("{} deleted user {}", self.current_user, username);
        Ok(())
    }

    /// Switches the session to `username`. Anyone but root needs Login.
    pub fn login(&mut self, username: &str, password: &str) -> FieldDbResult<()> {
        let user = self
            .users
            .get(username)
            .filter(|user| user.validate_password(password))
            .ok_or_else(|| {
                warn!("Failed login for {} on database {}", username, self.name);
                FieldDbError::InvalidLogin
            })?;
        if !user.acl().can_do_database(DatabaseAction::Login) {
            return Err(FieldDbError::DatabaseActionDenied {
                user: username.to_string(),
                action: DatabaseAction::Login,
            });
        }
        self.current_user = username.to_string();
        info!("{} logged in to database {}", username, self.name);
        Ok(())
    }

    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> FieldDbResult<()> {
        let user = self
            .users
            .get_mut(&self.current_user)
            .ok_or_else(|| FieldDbError::UserNotFound(self.current_user.clone()))?;
        if !user.update_password(old_password, new_password) {
            return Err(FieldDbError::InvalidLogin);
        }
        info!("{} changed their password", self.current_user);
        Ok(())
    }

    /// Sets one entry of `username`'s ACL on behalf of the session user.
    pub fn set_permission(
        &mut self,
        username: &str,
        target: PermissionTarget,
        permission: PermissionType,
    ) -> FieldDbResult<()> {
        let editor = AclEditor::new(self.current_user.clone(), self.session_acl()?);
        let field = match &target {
            PermissionTarget::Field(name, _) => Some(self.registry.lookup(name)?.id()),
            _ => None,
        };
        let user = self
            .users
            .get_mut(username)
            .ok_or_else(|| FieldDbError::UserNotFound(username.to_string()))?;
        match (target, field) {
            (PermissionTarget::Database(action), _) => {
                user.acl.set_database_permission(&editor, action, permission)
            }
            (PermissionTarget::GlobalField(action), _) => {
                user.acl.set_global_permission(&editor, action, permission)
            }
            (PermissionTarget::Field(name, _), None) => Err(FieldDbError::FieldNotFound(name)),
            (PermissionTarget::Field(_, action), Some(id)) => {
                user.acl.set_field_permission(&editor, id, action, permission)
            }
        }
    }

    // ============ Checks ============

    fn session_acl(&self) -> FieldDbResult<&AccessControlList> {
        self.users
            .get(&self.current_user)
            .map(User::acl)
            .ok_or_else(|| FieldDbError::UserNotFound(self.current_user.clone()))
    }

    fn require_database(&self, action: DatabaseAction) -> FieldDbResult<()> {
        if self.session_acl()?.can_do_database(action) {
            return Ok(());
        }
        debug!("{} denied {} on database {}", self.current_user, action, self.name);
        Err(FieldDbError::DatabaseActionDenied {
            user: self.current_user.clone(),
            action,
        })
    }

    fn require_field(&self, field: &FieldVariant, action: FieldAction) -> FieldDbResult<()> {
        if self.session_acl()?.can_do_field(field.id(), action) {
            return Ok(());
        }
        debug!("{} denied {} on field {}", self.current_user, action, field.name());
        Err(FieldDbError::FieldActionDenied {
            user: self.current_user.clone(),
            field: field.name().to_string(),
            action,
        })
    }

    /// Lookup, then ACL, then capability.
    fn authorize(&self, name: &str, operation: FieldOperation) -> FieldDbResult<&FieldVariant> {
        let field = self.registry.lookup(name)?;
        self.require_field(field, operation.required_action())?;
        if !field.field_type().supports(operation) {
            return Err(unsupported(name, field.field_type(), operation));
        }
        Ok(field)
    }

    fn authorize_key(&self, name: &str, operation: FieldOperation) -> FieldDbResult<&KeyField> {
        let field = self.authorize(name, operation)?;
        field
            .as_key()
            .ok_or_else(|| unsupported(name, field.field_type(), operation))
    }

    fn visible_user(&self, username: &str) -> FieldDbResult<&User> {
        let view_all = self.session_acl()?.can_do_database(DatabaseAction::ViewUsers);
        self.users
            .get(username)
            .filter(|user| view_all || user.creator() == Some(self.current_user.as_str()))
            .ok_or_else(|| FieldDbError::UserNotFound(username.to_string()))
    }

    fn info_of(&self, id: FieldId) -> FieldDbResult<FieldInfo> {
        self.registry
            .info(id)
            .ok_or_else(|| FieldDbError::FieldNotFound(id.to_string()))
    }
}

fn unsupported(field: &str, field_type: FieldType, operation: FieldOperation) -> FieldDbError {
    FieldDbError::UnsupportedFieldOperation {
        field: field.to_string(),
        field_type,
        operation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn db() -> Database {
        let mut db = Database::new("company", "root", "secret");
        db.create_key_field("Id", ValueKind::Integer, 2).unwrap();
        db.create_item_field("Name", "Id", ValueKind::Text).unwrap();
        db
    }

    #[test]
    fn capability_is_checked_after_acl() {
        let mut db = db();
        db.add_user("bob", "pw").unwrap();
        db.set_permission("bob", PermissionTarget::Database(DatabaseAction::Login), PermissionType::Allow)
            .unwrap();
        db.login("bob", "pw").unwrap();

        // No Insert permission: the ACL error wins over the capability error.
        let err = db.insert("Name", "x").unwrap_err();
        assert!(matches!(err, FieldDbError::FieldActionDenied { .. }));

        db.login("root", "secret").unwrap();
        let err = db.insert("Name", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn key_put_is_unsupported() {
        let mut db = db();
        let err = db.put("Id", 0, 5).unwrap_err();
        assert!(matches!(
            err,
            FieldDbError::UnsupportedFieldOperation { operation: FieldOperation::Put, .. }
        ));
    }

    #[test]
    fn item_resize_is_unsupported() {
        let mut db = db();
        let err = db.resize("Name", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(db.field("Name").unwrap().depth, 2);
    }

    #[test]
    fn foreign_key_put_needs_a_row_value() {
        let mut db = db();
        db.create_foreign_key_field("Boss", "Id", "Id").unwrap();
        let err = db.put("Boss", 0, "alice").unwrap_err();
        assert!(matches!(err, FieldDbError::TypeMismatch { expected: ValueKind::Row, .. }));
        db.insert("Id", 1).unwrap();
        db.put("Boss", 1, Some(0)).unwrap();
        assert_eq!(db.get("Boss", 1).unwrap(), FieldValue::Row(0));
        db.put("Boss", 1, FieldValue::Null).unwrap();
        assert_eq!(db.get("Boss", 1).unwrap(), FieldValue::Null);
    }

    #[test]
    fn factory_rejects_bad_owner() {
        let mut db = db();
        let err = db.create_item_field("Age", "Missing", ValueKind::Integer).unwrap_err();
        assert!(matches!(err, FieldDbError::FieldNotFound(_)));
        let err = db.create_item_field("Age", "Name", ValueKind::Integer).unwrap_err();
        assert!(matches!(err, FieldDbError::WrongFieldType { .. }));
        let err = db.create_item_field("9lives", "Id", ValueKind::Integer).unwrap_err();
        assert!(matches!(err, FieldDbError::InvalidFieldName(_)));
    }

    #[test]
    fn deleted_fields_leave_no_acl_entries() {
        let mut db = db();
        db.add_user("bob", "pw").unwrap();
        db.set_permission(
            "bob",
            PermissionTarget::Field("Name".to_string(), FieldAction::Get),
            PermissionType::Allow,
        )
        .unwrap();
        assert_eq!(db.user_acl("bob").unwrap().referenced_fields().count(), 1);
        db.delete_field("Id").unwrap();
        assert_eq!(db.user_acl("bob").unwrap().referenced_fields().count(), 0);
    }

    #[test]
    fn change_password_checks_old_password() {
        let mut db = db();
        let err = db.change_password("nope", "new").unwrap_err();
        assert!(matches!(err, FieldDbError::InvalidLogin));
        db.change_password("secret", "new").unwrap();
        assert!(db.login("root", "secret").is_err());
        db.login("root", "new").unwrap();
    }
}
