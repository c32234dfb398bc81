//! User directory seam and password hashing.
//!
//! The relational user repository is an external collaborator; only the
//! lookup needed by the login flow is modeled. Passwords are stored and
//! verified as Argon2 PHC strings.

use std::collections::HashMap;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};

use super::principal::UserSnapshot;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: UserSnapshot,
    pub password_hash: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Option<UserRecord>;
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| anyhow::anyhow!("entropy source failed: {e}"))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow::anyhow!("salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hash: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(phc: &str, password: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// In-process directory for the server binary and tests. Lookup is
/// case-insensitive on email.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        password: &str,
    ) -> anyhow::Result<()> {
        let record = UserRecord {
            user: UserSnapshot {
                id: id.to_string(),
                name: Some(name.to_string()),
                email: Some(email.to_string()),
            },
            password_hash: hash_password(password)?,
        };
        self.users.write().insert(email.to_lowercase(), record);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users.read().get(&email.to_lowercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let phc = hash_password("hunter2").unwrap();
        assert!(verify_password(&phc, "hunter2"));
        assert!(!verify_password(&phc, "hunter3"));
    }

    #[test]
    fn verify_rejects_invalid_phc() {
        assert!(!verify_password("not a phc string", "pw"));
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let dir = MemoryUserDirectory::new();
        dir.add_user("u1", "Ada", "Ada@Example.com", "pw").unwrap();
        let found = dir.find_by_email("ada@example.com").await.unwrap();
        assert_eq!(found.user.id, "u1");
        assert!(dir.find_by_email("nobody@example.com").await.is_none());
    }
}
