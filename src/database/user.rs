use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::acl::AccessControlList;

const SALT_LEN: usize = 16;

/// A database account. The root user is the one without a creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    username: String,
    /// Hex encoded random salt, regenerated on every password change.
    salt: String,
    /// Hex encoded SHA-256 of `salt || password`.
    password_hash: String,
    creator: Option<String>,
    pub(crate) acl: AccessControlList,
}

impl User {
    pub fn root(username: impl Into<String>, password: &str) -> Self {
        Self::with_acl(username.into(), password, None, AccessControlList::root())
    }

    /// New user with an empty (deny everything) list.
    pub fn new(username: impl Into<String>, password: &str, creator: impl Into<String>) -> Self {
        Self::with_acl(
            username.into(),
            password,
            Some(creator.into()),
            AccessControlList::new(),
        )
    }

    fn with_acl(
        username: String,
        password: &str,
        creator: Option<String>,
        acl: AccessControlList,
    ) -> Self {
        let salt = generate_salt();
        let password_hash = hash_password(&salt, password);
        Self {
            username,
            salt,
            password_hash,
            creator,
            acl,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.creator.is_none()
    }

    pub fn acl(&self) -> &AccessControlList {
        &self.acl
    }

    pub fn validate_password(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.password_hash
    }

    /// Replaces the password if `old_password` is correct. Returns whether it
    /// was replaced.
    pub fn update_password(&mut self, old_password: &str, new_password: &str) -> bool {
        if !self.validate_password(old_password) {
            return false;
        }
        self.salt = generate_salt();
        self.password_hash = hash_password(&self.salt, new_password);
        true
    }

    /// Stored credential fields are well formed hex of the right length.
    pub(crate) fn check_credentials(&self) -> Result<(), String> {
        let salt_ok = hex::decode(&self.salt).is_ok_and(|s| s.len() == SALT_LEN);
        let hash_ok = hex::decode(&self.password_hash).is_ok_and(|h| h.len() == 32);
        if salt_ok && hash_ok {
            Ok(())
        } else {
            Err(format!("user '{}' has malformed credentials", self.username))
        }
    }
}

fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
