use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::acl::types::{DatabaseAction, FieldAction, PermissionType};
use crate::error::{FieldDbError, FieldDbResult};
use crate::field::FieldId;

/// Resolves a database action entry. Database actions are default-deny: only an
/// explicit `Allow` grants them.
pub fn resolve_database_permission(entry: Option<PermissionType>) -> bool {
    entry == Some(PermissionType::Allow)
}

/// Resolves a field action from its global and field specific entries.
///
/// A missing or `None` global entry counts as `Deny`. A field specific entry
/// overrides the global one unless it is missing or `None`, in which case the
/// global entry applies. The action is allowed unless the effective entry is
/// `Deny`.
pub fn resolve_field_permission(
    global: Option<PermissionType>,
    local: Option<PermissionType>,
) -> bool {
    let global = match global {
        None | Some(PermissionType::None) => PermissionType::Deny,
        Some(p) => p,
    };
    let effective = match local {
        Some(p) if p != PermissionType::None => p,
        _ => global,
    };
    effective != PermissionType::Deny
}

/// Authority of the session user editing an ACL, captured before the edit so
/// that a user can edit its own list.
#[derive(Debug, Clone)]
pub struct AclEditor {
    user: String,
    may_edit: bool,
}

impl AclEditor {
    pub fn new(user: impl Into<String>, acting_acl: &AccessControlList) -> Self {
        Self {
            user: user.into(),
            may_edit: acting_acl.can_do_database(DatabaseAction::EditPermissions),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

/// Access-Control-List for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    /// Set for the root user, whose list grants everything and is immutable.
    root: bool,
    database: BTreeMap<DatabaseAction, PermissionType>,
    global: BTreeMap<FieldAction, PermissionType>,
    field: BTreeMap<FieldId, BTreeMap<FieldAction, PermissionType>>,
}

impl AccessControlList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root() -> Self {
        Self {
            root: true,
            ..Self::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Test if the owner can perform a given database action.
    pub fn can_do_database(&self, action: DatabaseAction) -> bool {
        if self.root {
            return true;
        }
        resolve_database_permission(self.database.get(&action).copied())
    }

    /// Test if the owner can perform a given action on `field`.
    pub fn can_do_field(&self, field: FieldId, action: FieldAction) -> bool {
        if self.root {
            return true;
        }
        let global = self.global.get(&action).copied();
        let local = self
            .field
            .get(&field)
            .and_then(|actions| actions.get(&action))
            .copied();
        resolve_field_permission(global, local)
    }

    pub fn database_permission(&self, action: DatabaseAction) -> Option<PermissionType> {
        self.database.get(&action).copied()
    }

    pub fn global_permission(&self, action: FieldAction) -> Option<PermissionType> {
        self.global.get(&action).copied()
    }

    pub fn field_permission(&self, field: FieldId, action: FieldAction) -> Option<PermissionType> {
        self.field.get(&field)?.get(&action).copied()
    }

    pub fn set_database_permission(
        &mut self,
        editor: &AclEditor,
        action: DatabaseAction,
        permission: PermissionType,
    ) -> FieldDbResult<()> {
        self.check_editable(editor)?;
        debug!("{} set database permission {} = {}", editor.user, action, permission);
        self.database.insert(action, permission);
        Ok(())
    }

    pub fn set_global_permission(
        &mut self,
        editor: &AclEditor,
        action: FieldAction,
        permission: PermissionType,
    ) -> FieldDbResult<()> {
        self.check_editable(editor)?;
        debug!("{} set global field permission {} = {}", editor.user, action, permission);
        self.global.insert(action, permission);
        Ok(())
    }

    pub fn set_field_permission(
        &mut self,
        editor: &AclEditor,
        field: FieldId,
        action: FieldAction,
        permission: PermissionType,
    ) -> FieldDbResult<()> {
        self.check_editable(editor)?;
        debug!(
            "{} set permission {} = {} on field {}",
            editor.user, action, permission, field
        );
        self.field.entry(field).or_default().insert(action, permission);
        Ok(())
    }

    /// Drops the field specific entries of a deleted field.
    pub(crate) fn forget_field(&mut self, field: FieldId) {
        self.field.remove(&field);
    }

    /// Fields that have field specific entries.
    pub(crate) fn referenced_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.field.keys().copied()
    }

    fn check_editable(&self, editor: &AclEditor) -> FieldDbResult<()> {
        if self.root {
            warn!("{} tried to edit the root user's permissions", editor.user);
            return Err(FieldDbError::AclEditDenied {
                user: editor.user.clone(),
                reason: "Root user cannot modify its permissions".to_string(),
            });
        }
        if !editor.may_edit {
            warn!("{} tried to edit permissions without Edit Permissions", editor.user);
            return Err(FieldDbError::AclEditDenied {
                user: editor.user.clone(),
                reason: format!("missing {}", DatabaseAction::EditPermissions),
            });
        }
        Ok(())
    }
}
