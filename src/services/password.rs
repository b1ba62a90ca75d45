// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Salted, deliberately slow password hashing (argon2id).

use anyhow::Context;
use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with a configurable work factor.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// Build a hasher with `memory_kib` of memory and `iterations` passes.
    pub fn new(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password on the current thread.
    ///
    /// Every call draws a fresh salt, so equal inputs produce different hashes.
    pub fn hash_blocking(&self, plaintext: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2::PasswordHasher::hash_password(
            &self.argon2(),
            plaintext.as_bytes(),
            &salt,
        )
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash on the current thread.
    ///
    /// A mismatch is `Ok(false)`; only a malformed hash is an error.
    pub fn verify_blocking(&self, plaintext: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("malformed password hash: {e}"))?;

        // The cost parameters embedded in the stored hash are used, so
        // raising the configured cost does not lock out older accounts.
        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow::anyhow!("password verification failed: {e}")),
        }
    }

    /// Hash off the async runtime.
    pub async fn hash(&self, plaintext: &str) -> anyhow::Result<String> {
        let hasher = self.clone();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&plaintext))
            .await
            .context("password hashing task panicked")?
    }

    /// Verify off the async runtime.
    pub async fn verify(&self, plaintext: &str, hash: &str) -> anyhow::Result<bool> {
        let hasher = self.clone();
        let plaintext = plaintext.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&plaintext, &hash))
            .await
            .context("password verification task panicked")?
    }
}
