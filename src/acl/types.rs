use serde::{Deserialize, Serialize};
use std::fmt;

/// Actions a user may perform against a database as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatabaseAction {
    Login,
    Save,
    Restore,
    Drop,
    CreateField,
    ViewUsers,
    AddUser,
    DeleteUser,
    EditPermissions,
}

impl DatabaseAction {
    pub const ALL: [DatabaseAction; 9] = [
        Self::Login,
        Self::Save,
        Self::Restore,
        Self::Drop,
        Self::CreateField,
        Self::ViewUsers,
        Self::AddUser,
        Self::DeleteUser,
        Self::EditPermissions,
    ];

    /// Human readable name, e.g. `Edit Permissions`.
    pub fn action_name(&self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Save => "Save",
            Self::Restore => "Restore",
            Self::Drop => "Drop",
            Self::CreateField => "Create Field",
            Self::ViewUsers => "View Users",
            Self::AddUser => "Add User",
            Self::DeleteUser => "Delete User",
            Self::EditPermissions => "Edit Permissions",
        }
    }
}

impl fmt::Display for DatabaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action_name())
    }
}

/// Actions a user may perform against a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldAction {
    Insert,
    Delete,
    Get,
    Put,
    Find,
    /// Covers both `next` and `prev`.
    Iterate,
    /// Looking the field up by name or listing it.
    SeeField,
    DeleteField,
    ResizeField,
}

impl FieldAction {
    pub const ALL: [FieldAction; 9] = [
        Self::Insert,
        Self::Delete,
        Self::Get,
        Self::Put,
        Self::Find,
        Self::Iterate,
        Self::SeeField,
        Self::DeleteField,
        Self::ResizeField,
    ];

    pub fn action_name(&self) -> &'static str {
        match self {
            Self::Insert => "Insert",
            Self::Delete => "Delete",
            Self::Get => "Get",
            Self::Put => "Put",
            Self::Find => "Find",
            Self::Iterate => "Iterate",
            Self::SeeField => "See Field",
            Self::DeleteField => "Delete Field",
            Self::ResizeField => "Resize Field",
        }
    }
}

impl fmt::Display for FieldAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action_name())
    }
}

/// Value stored in an ACL table entry.
///
/// `None` means "no opinion": for field specific entries it falls back to the
/// global entry, everywhere else it behaves like an absent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    Allow,
    Deny,
    None,
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "Allow"),
            Self::Deny => write!(f, "Deny"),
            Self::None => write!(f, "None"),
        }
    }
}

/// Which entry of an ACL a permission change addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionTarget {
    Database(DatabaseAction),
    /// Applies to every field without a field specific entry.
    GlobalField(FieldAction),
    /// Field specific override, by field name.
    Field(String, FieldAction),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_are_spaced() {
        assert_eq!(DatabaseAction::EditPermissions.to_string(), "Edit Permissions");
        assert_eq!(FieldAction::SeeField.to_string(), "See Field");
        assert_eq!(FieldAction::Iterate.to_string(), "Iterate");
    }

    #[test]
    fn actions_serialize_as_screaming_snake_case() {
        let json = serde_json::to_string(&FieldAction::DeleteField).unwrap();
        assert_eq!(json, "\"DELETE_FIELD\"");
        let back: DatabaseAction = serde_json::from_str("\"CREATE_FIELD\"").unwrap();
        assert_eq!(back, DatabaseAction::CreateField);
    }
}
