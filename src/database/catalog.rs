use log::info;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::acl::DatabaseAction;
use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::error::{FieldDbError, FieldDbResult};

/// Shared handle to one database. Every operation takes the lock.
pub type DatabaseHandle = Arc<Mutex<Database>>;

/// The set of named databases known to the process.
///
/// Each database sits behind its own exclusive lock; the catalog's own lock
/// only guards the name table.
pub struct DatabaseCatalog {
    databases: Mutex<HashMap<String, DatabaseHandle>>,
    config: DatabaseConfig,
}

impl Default for DatabaseCatalog {
    fn default() -> Self {
        Self::new(DatabaseConfig::default())
    }
}

impl DatabaseCatalog {
    /// Databases created or loaded through this catalog use `config`.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Creates a database with `root_user` logged in.
    pub fn create(&self, name: &str, root_user: &str, root_password: &str) -> FieldDbResult<DatabaseHandle> {
        let mut databases = self.databases()?;
        if databases.contains_key(name) {
            return Err(FieldDbError::DuplicateDatabase(name.to_string()));
        }
        let db = Database::with_config(name, root_user, root_password, self.config.clone());
        let handle = Arc::new(Mutex::new(db));
        databases.insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Logs `username` in to an existing database and returns it.
    pub fn open(&self, name: &str, username: &str, password: &str) -> FieldDbResult<DatabaseHandle> {
        let handle = self
            .databases()?
            .get(name)
            .cloned()
            .ok_or_else(|| FieldDbError::DatabaseNotFound(name.to_string()))?;
        lock(&handle)?.login(username, password)?;
        Ok(handle)
    }

    /// Removes a database. Its session user needs Drop.
    pub fn drop_database(&self, name: &str) -> FieldDbResult<()> {
        let mut databases = self.databases()?;
        let handle = databases
            .get(name)
            .ok_or_else(|| FieldDbError::DatabaseNotFound(name.to_string()))?;
        {
            let db = lock(handle)?;
            if !db.acl()?.can_do_database(DatabaseAction::Drop) {
                return Err(FieldDbError::DatabaseActionDenied {
                    user: db.current_user().to_string(),
                    action: DatabaseAction::Drop,
                });
            }
            info!("{} dropped database {}", db.current_user(), name);
        }
        databases.remove(name);
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> FieldDbResult<Vec<String>> {
        let mut names: Vec<String> = self.databases()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Loads a snapshot and registers it under the name stored in it.
    pub fn load(&self, path: impl AsRef<Path>, username: &str, password: &str) -> FieldDbResult<DatabaseHandle> {
        let db = Database::load_with_config(path, username, password, self.config.clone())?;
        let mut databases = self.databases()?;
        if databases.contains_key(db.name()) {
            return Err(FieldDbError::DuplicateDatabase(db.name().to_string()));
        }
        let name = db.name().to_string();
        let handle = Arc::new(Mutex::new(db));
        databases.insert(name, Arc::clone(&handle));
        Ok(handle)
    }

    fn databases(&self) -> FieldDbResult<MutexGuard<'_, HashMap<String, DatabaseHandle>>> {
        self.databases
            .lock()
            .map_err(|_| FieldDbError::Poisoned("Failed to acquire catalog lock".to_string()))
    }
}

/// Locks a database handle, mapping a poisoned lock to an error.
pub fn lock(handle: &DatabaseHandle) -> FieldDbResult<MutexGuard<'_, Database>> {
    handle
        .lock()
        .map_err(|_| FieldDbError::Poisoned("Failed to acquire database lock".to_string()))
}
