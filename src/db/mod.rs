// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, or an in-memory store for tests/local dev).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{SavedActivity, TokenSetUpdate, User};
use async_trait::async_trait;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{de::DeserializeOwned, Serialize};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email uniqueness index (document ID is the URL-encoded email)
    pub const USER_EMAILS: &str = "user_emails";
    pub const ACTIVITIES: &str = "activities";
}

/// Random 24-hex-digit document ID.
pub fn new_document_id() -> Result<String, AppError> {
    let mut bytes = [0u8; 12];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("random source failure")))?;
    Ok(hex::encode(bytes))
}

/// A document type with a fixed collection and its own ID.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn doc_id(&self) -> &str;
}

impl Document for SavedActivity {
    const COLLECTION: &'static str = collections::ACTIVITIES;

    fn doc_id(&self) -> &str {
        &self.doc_id
    }
}

/// Plain CRUD over one collection.
#[async_trait]
pub trait Repository<T: Document>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<T>, AppError>;

    /// All documents whose top-level string `field` equals `value`.
    async fn find_by(&self, field: &'static str, value: &str) -> Result<Vec<T>, AppError>;

    async fn create(&self, doc: &T) -> Result<(), AppError>;

    async fn update(&self, doc: &T) -> Result<(), AppError>;

    /// Returns whether a document was deleted.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;
}

/// Credential store: user records and their refresh-token sets.
///
/// Token-set mutations are atomic conditional updates: the check that the
/// presented token is held and the write of the new set happen as one
/// step, so two requests presenting the same token cannot both succeed.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Insert a new user. Fails with `Conflict` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<(), AppError>;

    /// Append a freshly issued refresh token. Returns `false` if the user is gone.
    async fn push_refresh_token(&self, user_id: &str, token: &str) -> Result<bool, AppError>;

    /// Replace `presented` with `replacement`, or clear the set if `presented`
    /// is not held.
    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        presented: &str,
        replacement: &str,
    ) -> Result<TokenSetUpdate, AppError>;

    /// Remove `presented`, or clear the set if it is not held.
    async fn revoke_refresh_token(
        &self,
        user_id: &str,
        presented: &str,
    ) -> Result<TokenSetUpdate, AppError>;

    /// Append to the user's saved list unless already present.
    /// Returns `false` if the user is gone.
    async fn add_saved_activity(&self, user_id: &str, doc_id: &str) -> Result<bool, AppError>;

    /// Returns whether the ID was in the user's saved list.
    async fn remove_saved_activity(&self, user_id: &str, doc_id: &str) -> Result<bool, AppError>;
}
