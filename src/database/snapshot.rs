//! Whole-database snapshots.
//!
//! A snapshot is one JSON document holding every field (with its rows) and
//! every user (with its credentials and ACL). Loading re-derives everything
//! that can be derived and validates the rest; a snapshot that fails any check
//! is rejected as a whole.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::acl::DatabaseAction;
use crate::config::DatabaseConfig;
use crate::database::{Database, FieldRegistry, User};
use crate::error::{FieldDbError, FieldDbResult};
use crate::field::FieldVariant;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub format_version: u32,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    /// Next field id to hand out; ids are never reused.
    pub next_field_id: u64,
    pub fields: Vec<FieldVariant>,
    pub users: Vec<User>,
}

/// Checked contents of a snapshot, ready to be swapped into a database.
struct RestoredState {
    registry: FieldRegistry,
    users: BTreeMap<String, User>,
}

impl DatabaseSnapshot {
    /// Reads and decodes a snapshot. Decoding failures, including index
    /// entries that cannot form a valid key index, are `CorruptSnapshot`.
    pub fn read_from(path: &Path) -> FieldDbResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| rejected(path, corrupt(format!("cannot decode: {e}"))))
    }

    fn into_state(self) -> FieldDbResult<RestoredState> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {})",
                self.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        let registry = FieldRegistry::from_fields(self.fields, self.next_field_id).map_err(corrupt)?;

        let mut users = BTreeMap::new();
        for user in self.users {
            user.check_credentials().map_err(corrupt)?;
            if user.is_root() != user.acl().is_root() {
                return Err(corrupt(format!(
                    "user '{}' has a root flag that does not match its creator",
                    user.username()
                )));
            }
            if let Some(field) = user
                .acl()
                .referenced_fields()
                .find(|id| registry.get(*id).is_none())
            {
                return Err(corrupt(format!(
                    "user '{}' has permissions on unknown field {}",
                    user.username(),
                    field
                )));
            }
            let username = user.username().to_string();
            if users.insert(username.clone(), user).is_some() {
                return Err(corrupt(format!("duplicate user '{username}'")));
            }
        }
        let roots = users.values().filter(|u| u.is_root()).count();
        if roots != 1 {
            return Err(corrupt(format!("expected exactly one root user, found {roots}")));
        }
        Ok(RestoredState { registry, users })
    }
}

impl Database {
    fn snapshot(&self) -> DatabaseSnapshot {
        DatabaseSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            name: self.name.clone(),
            saved_at: Utc::now(),
            next_field_id: self.registry.next_id(),
            fields: self.registry.iter().cloned().collect(),
            users: self.users.values().cloned().collect(),
        }
    }

    /// Writes every field and user to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> FieldDbResult<()> {
        self.require_database(DatabaseAction::Save)?;
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let json = if self.config.pretty_snapshots {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        info!(
            "{} saved database {} ({} fields, {} users) to {}",
            self.current_user,
            self.name,
            snapshot.fields.len(),
            snapshot.users.len(),
            path.display()
        );
        Ok(())
    }

    /// Replaces fields and users with those of the snapshot at `path`. The
    /// session user must exist in the snapshot.
    pub fn restore(&mut self, path: impl AsRef<Path>) -> FieldDbResult<()> {
        self.require_database(DatabaseAction::Restore)?;
        let path = path.as_ref();
        let state = DatabaseSnapshot::read_from(path)?
            .into_state()
            .map_err(|e| rejected(path, e))?;
        if !state.users.contains_key(&self.current_user) {
            return Err(corrupt(format!(
                "session user '{}' is not part of the snapshot",
                self.current_user
            )));
        }
        self.registry = state.registry;
        self.users = state.users;
        info!("{} restored database {} from {}", self.current_user, self.name, path.display());
        Ok(())
    }

    /// Builds a database from a snapshot and logs `username` in.
    pub fn load(path: impl AsRef<Path>, username: &str, password: &str) -> FieldDbResult<Self> {
        Self::load_with_config(path, username, password, DatabaseConfig::default())
    }

    pub fn load_with_config(
        path: impl AsRef<Path>,
        username: &str,
        password: &str,
        config: DatabaseConfig,
    ) -> FieldDbResult<Self> {
        let path = path.as_ref();
        let snapshot = DatabaseSnapshot::read_from(path)?;
        let name = snapshot.name.clone();
        let state = snapshot
            .into_state()
            .map_err(|e| rejected(path, e))?;
        let mut db = Database {
            name,
            config,
            registry: state.registry,
            users: state.users,
            current_user: String::new(),
        };
        db.login(username, password)?;
        info!("Loaded database {} from {}", db.name, path.display());
        Ok(db)
    }
}

fn rejected(path: &Path, error: FieldDbError) -> FieldDbError {
    warn!("Rejected snapshot {}: {}", path.display(), error);
    error
}

fn corrupt(reason: impl Into<String>) -> FieldDbError {
    FieldDbError::CorruptSnapshot(reason.into())
}
