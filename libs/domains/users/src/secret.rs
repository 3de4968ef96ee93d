use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::fmt::Debug;

use crate::error::{UserError, UserResult};

/// Turns a plaintext password into the stored credential and back
#[cfg_attr(test, mockall::automock)]
pub trait SecretDeriver: Send + Sync + Debug {
    fn derive(&self, password: &str) -> UserResult<String>;

    fn verify(&self, password: &str, passwd_hash: &str) -> UserResult<bool>;
}

/// Argon2id with a random salt, encoded as a PHC string
#[derive(Debug, Clone, Default)]
pub struct Argon2SecretDeriver {
    argon2: Argon2<'static>,
}

impl Argon2SecretDeriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretDeriver for Argon2SecretDeriver {
    fn derive(&self, password: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserError::PasswordHash(e.to_string()))
    }

    fn verify(&self, password: &str, passwd_hash: &str) -> UserResult<bool> {
        let parsed_hash =
            PasswordHash::new(passwd_hash).map_err(|e| UserError::PasswordHash(e.to_string()))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
