//! User model for storage and API.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// User record stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Random hex identifier (also used as document ID)
    pub id: String,
    /// Unique, compared exactly as stored
    pub email: String,
    pub username: String,
    /// argon2id PHC string
    pub password_hash: String,
    /// Refresh tokens that are still allowed to be exchanged, oldest first
    #[serde(default)]
    pub refresh_tokens: Vec<String>,
    /// Profile picture URL
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub liked_posts: Vec<String>,
    /// Saved activity document IDs, in the order they were saved
    #[serde(default)]
    pub saved_activities: Vec<String>,
    /// When the account was created (RFC 3339)
    pub created_at: String,
}

/// Outcome of an atomic update to a user's refresh-token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSetUpdate {
    /// The presented token was in the set and has been replaced or removed.
    Applied,
    /// The presented token was not in the set; every token has been revoked.
    ReuseDetected,
    /// No user with that ID.
    UserMissing,
}

impl User {
    /// Whether `token` is currently in the refresh-token set.
    pub fn holds_refresh_token(&self, token: &str) -> bool {
        self.refresh_tokens
            .iter()
            .any(|held| bool::from(held.as_bytes().ct_eq(token.as_bytes())))
    }

    /// Exchange `presented` for `replacement`.
    ///
    /// If `presented` is not held, the whole set is cleared instead.
    pub fn rotate_refresh_token(&mut self, presented: &str, replacement: String) -> TokenSetUpdate {
        if !self.holds_refresh_token(presented) {
            self.refresh_tokens.clear();
            return TokenSetUpdate::ReuseDetected;
        }

        self.drop_refresh_token(presented);
        self.refresh_tokens.push(replacement);
        TokenSetUpdate::Applied
    }

    /// Remove exactly `presented`; clears the whole set if it is not held.
    pub fn revoke_refresh_token(&mut self, presented: &str) -> TokenSetUpdate {
        if !self.holds_refresh_token(presented) {
            self.refresh_tokens.clear();
            return TokenSetUpdate::ReuseDetected;
        }

        self.drop_refresh_token(presented);
        TokenSetUpdate::Applied
    }

    fn drop_refresh_token(&mut self, presented: &str) {
        self.refresh_tokens
            .retain(|held| !bool::from(held.as_bytes().ct_eq(presented.as_bytes())));
    }
}
