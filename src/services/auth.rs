// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account registration and session lifecycle.
//!
//! A session is a refresh token held in the user's token set. Login appends
//! one, refresh exchanges one for a new one, logout removes one. Presenting
//! a refresh token that verifies but is no longer held is treated as token
//! theft: the store clears the whole set in the same atomic update.

use crate::db::{new_document_id, UserStore};
use crate::error::{AppError, Result};
use crate::models::{TokenSetUpdate, User};
use crate::services::avatar::AvatarStore;
use crate::services::google_oidc::IdentityVerifier;
use crate::services::password::PasswordHasher;
use crate::services::tokens::{TokenKind, TokenPair, TokenService};
use crate::time_utils::format_utc_rfc3339;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

const LOGIN_FAILED: &str = "invalid email or password";

/// Tokens handed to a client after login or refresh.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub tokens: TokenPair,
}

/// Registration input. `username` defaults to the email's local part.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
}

/// Orchestrates the credential store, password hasher, token service and
/// Google identity verification.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    hasher: PasswordHasher,
    identity: Arc<dyn IdentityVerifier>,
    avatars: AvatarStore,
    rng: SystemRandom,
    /// Verified against when the email is unknown, so both login failure
    /// paths spend the same time in argon2.
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: TokenService,
        hasher: PasswordHasher,
        identity: Arc<dyn IdentityVerifier>,
        avatars: AvatarStore,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash_blocking("no-such-user")?;

        Ok(Self {
            users,
            tokens,
            hasher,
            identity,
            avatars,
            rng: SystemRandom::new(),
            dummy_hash: dummy_hash.into(),
        })
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an account with an empty token set. Returns the new user ID.
    pub async fn register(&self, account: NewAccount) -> Result<String> {
        let (Some(email), Some(password)) = (
            non_empty(account.email.as_deref()),
            non_empty(account.password.as_deref()),
        ) else {
            return Err(AppError::BadRequest(
                "email and password are required".to_string(),
            ));
        };

        if self.users.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("user already exists".to_string()));
        }

        let username = non_empty(account.username.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| default_username(email));

        let password_hash = self.hasher.hash(password).await?;
        let user = self.new_user(email, username, password_hash, None)?;

        // create_user re-checks uniqueness atomically; a racing registration
        // for the same email surfaces as Conflict here.
        self.users.create_user(&user).await?;
        tracing::info!(user_id = %user.id, "User registered");

        Ok(user.id)
    }

    /// Password login. Unknown email and wrong password fail identically.
    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> Result<Session> {
        let (Some(email), Some(password)) = (non_empty(email), non_empty(password)) else {
            return Err(AppError::BadRequest(
                "email and password are required".to_string(),
            ));
        };

        let Some(user) = self.users.find_by_email(email).await? else {
            let _ = self.hasher.verify(password, &self.dummy_hash).await;
            tracing::info!("Login failed: unknown email");
            return Err(AppError::BadRequest(LOGIN_FAILED.to_string()));
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            tracing::info!(user_id = %user.id, "Login failed: password mismatch");
            return Err(AppError::BadRequest(LOGIN_FAILED.to_string()));
        }

        self.start_session(&user.id).await
    }

    /// Login with a Google ID token, creating the local user on first use.
    pub async fn login_with_google(&self, credential: Option<&str>) -> Result<Session> {
        let credential = non_empty(credential)
            .ok_or_else(|| AppError::BadRequest("credential is required".to_string()))?;

        let identity = self.identity.verify(credential).await?;

        let user = match self.users.find_by_email(&identity.email).await? {
            Some(user) => user,
            None => {
                let image_url = match identity.picture.as_deref() {
                    Some(picture) => match self.avatars.save_remote(picture).await {
                        Ok(url) => Some(url),
                        Err(e) => {
                            tracing::warn!(error = %e, "Avatar copy failed; continuing without image");
                            None
                        }
                    },
                    None => None,
                };

                let username = identity
                    .name
                    .clone()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| default_username(&identity.email));

                // Nobody knows this password, so the account can only sign
                // in through Google until a reset sets a real one.
                let placeholder = self.hasher.hash(&self.random_hex(32)?).await?;
                let user = self.new_user(&identity.email, username, placeholder, image_url)?;

                match self.users.create_user(&user).await {
                    Ok(()) => {
                        tracing::info!(user_id = %user.id, "User created from Google sign-in");
                        user
                    }
                    // Lost a race with a concurrent first sign-in.
                    Err(AppError::Conflict(_)) => self
                        .users
                        .find_by_email(&identity.email)
                        .await?
                        .ok_or_else(|| AppError::Conflict("user already exists".to_string()))?,
                    Err(e) => return Err(e),
                }
            }
        };

        self.start_session(&user.id).await
    }

    /// Exchange a refresh token for a new pair. The presented token stops
    /// being valid.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<Session> {
        let presented = non_empty(refresh_token)
            .ok_or_else(|| AppError::BadRequest("refresh token is required".to_string()))?;

        let user_id = self.verify_refresh_token(presented)?;
        let tokens = self.tokens.issue(&user_id)?;

        match self
            .users
            .rotate_refresh_token(&user_id, presented, &tokens.refresh_token)
            .await?
        {
            TokenSetUpdate::Applied => {
                tracing::debug!(user_id = %user_id, "Refresh token rotated");
                Ok(Session { user_id, tokens })
            }
            TokenSetUpdate::ReuseDetected => {
                tracing::warn!(user_id = %user_id, "Refresh token reuse detected; all sessions revoked");
                Err(AppError::InvalidToken)
            }
            TokenSetUpdate::UserMissing => {
                tracing::info!(user_id = %user_id, "Refresh for unknown user");
                Err(AppError::InvalidToken)
            }
        }
    }

    /// Revoke one refresh token.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<()> {
        let presented = non_empty(refresh_token)
            .ok_or_else(|| AppError::BadRequest("refresh token is required".to_string()))?;

        let user_id = self.verify_refresh_token(presented)?;

        match self.users.revoke_refresh_token(&user_id, presented).await? {
            TokenSetUpdate::Applied => {
                tracing::info!(user_id = %user_id, "User logged out");
                Ok(())
            }
            TokenSetUpdate::ReuseDetected => {
                tracing::warn!(user_id = %user_id, "Logout with revoked token; all sessions revoked");
                Err(AppError::InvalidToken)
            }
            TokenSetUpdate::UserMissing => Err(AppError::InvalidToken),
        }
    }

    fn verify_refresh_token(&self, token: &str) -> Result<String> {
        let claims = self.tokens.verify(token, TokenKind::Refresh).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token rejected");
            AppError::InvalidToken
        })?;
        Ok(claims.sub)
    }

    async fn start_session(&self, user_id: &str) -> Result<Session> {
        let tokens = self.tokens.issue(user_id)?;

        if !self
            .users
            .push_refresh_token(user_id, &tokens.refresh_token)
            .await?
        {
            return Err(AppError::NotFound("user".to_string()));
        }

        tracing::info!(user_id = %user_id, "Session started");
        Ok(Session {
            user_id: user_id.to_string(),
            tokens,
        })
    }

    fn new_user(
        &self,
        email: &str,
        username: String,
        password_hash: String,
        image_url: Option<String>,
    ) -> Result<User> {
        Ok(User {
            id: new_document_id()?,
            email: email.to_string(),
            username,
            password_hash,
            refresh_tokens: vec![],
            image_url,
            liked_posts: vec![],
            saved_activities: vec![],
            created_at: format_utc_rfc3339(chrono::Utc::now()),
        })
    }

    fn random_hex(&self, len: usize) -> Result<String> {
        let mut bytes = vec![0u8; len];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("random source failure"))?;
        Ok(hex::encode(bytes))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_username(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_username_is_local_part() {
        assert_eq!(default_username("alice@example.com"), "alice");
        assert_eq!(default_username("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn blank_values_count_as_missing() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" pass word ")), Some(" pass word "));
    }
}
