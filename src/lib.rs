//! # fielddb
//!
//! An in-memory database kernel organised as named fields instead of tables.
//!
//! ## Core Components
//!
//! * `acl` - Per-user access control lists and their resolution rules
//! * `field` - Key, item and foreign key fields plus the capability matrix
//! * `database` - Field registry, cascading deletion, users, snapshots and the catalog
//! * `config` - TOML configuration (pointer delete policy, snapshot format, logging)
//! * `logging` - `env_logger` installation driven by [`LogConfig`]
//! * `error` - Error types and handling
//!
//! ## Architecture
//!
//! A key field is a unique, ordered index that hands out rows. Item fields and
//! foreign key fields are columns owned by a key field and share its row space;
//! a foreign key additionally references rows of another key field. Deleting a
//! key field deletes everything that depends on it.
//!
//! Every operation goes through a [`Database`] session, which checks the
//! logged-in user's [`AccessControlList`] before it touches a field.

pub mod acl;
pub mod config;
pub mod database;
pub mod error;
pub mod field;
pub mod logging;

// Re-export main types for convenience
pub use acl::{AccessControlList, DatabaseAction, FieldAction, PermissionTarget, PermissionType};
pub use config::{DatabaseConfig, PointerDeletePolicy};
pub use database::catalog::DatabaseHandle;
pub use database::{Database, DatabaseCatalog, DatabaseSnapshot, User};
pub use error::{ErrorKind, FieldDbError, FieldDbResult};
pub use field::{FieldId, FieldInfo, FieldOperation, FieldType, FieldValue, Row, ValueKind};
pub use logging::{LogConfig, LoggingError, LoggingSystem};
