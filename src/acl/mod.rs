//! Access control.
//!
//! Every user owns an [`AccessControlList`] with three tables: database
//! actions, global field actions and field specific overrides. The resolution
//! policy lives in two pure functions, [`resolve_database_permission`] and
//! [`resolve_field_permission`], so call sites never re-implement it.

pub mod access_list;
pub mod types;

pub use access_list::{
    resolve_database_permission, resolve_field_permission, AccessControlList, AclEditor,
};
pub use types::{DatabaseAction, FieldAction, PermissionTarget, PermissionType};
