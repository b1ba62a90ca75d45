// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed, expiring access/refresh token pairs.
//!
//! Both kinds are HS256 JWTs carrying `{sub, nonce, iat, exp}`. Each kind
//! has its own secret, so an access token never verifies as a refresh
//! token (or the reverse).

use crate::error::AppError;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const NONCE_BYTES: usize = 16;

/// Which secret a token is signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Owning user ID
    pub sub: String,
    /// Random hex value so two tokens issued in the same second differ
    pub nonce: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature or structure is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("random source failure")]
    Entropy,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSignature | TokenError::Expired => AppError::InvalidToken,
            TokenError::Entropy | TokenError::Encoding(_) => {
                AppError::Internal(anyhow::anyhow!("token issuance failed: {err}"))
            }
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    access: std::sync::Arc<KeyPair>,
    refresh: std::sync::Arc<KeyPair>,
    rng: SystemRandom,
}

impl TokenService {
    pub fn new(
        access_secret: &[u8],
        access_ttl_secs: u64,
        refresh_secret: &[u8],
        refresh_ttl_secs: u64,
    ) -> Self {
        let keys = |secret: &[u8], ttl_secs| {
            std::sync::Arc::new(KeyPair {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                ttl_secs,
            })
        };

        Self {
            access: keys(access_secret, access_ttl_secs),
            refresh: keys(refresh_secret, refresh_ttl_secs),
            rng: SystemRandom::new(),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of tokens of this kind, in seconds.
    pub fn ttl_secs(&self, kind: TokenKind) -> u64 {
        self.keys(kind).ttl_secs
    }

    /// Issue a new access/refresh pair for `user_id`.
    pub fn issue(&self, user_id: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(user_id, TokenKind::Access)?,
            refresh_token: self.sign(user_id, TokenKind::Refresh)?,
        })
    }

    fn sign(&self, user_id: &str, kind: TokenKind) -> Result<String, TokenError> {
        let now = now_unix_secs();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            nonce: self.nonce()?,
            iat: now,
            exp: now + self.ttl_secs(kind),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn nonce(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; NONCE_BYTES];
        self.rng.fill(&mut bytes).map_err(|_| TokenError::Entropy)?;
        Ok(hex::encode(bytes))
    }

    /// Verify a token of the given kind and return its claims.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;

        let claims = decode::<TokenClaims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidSignature,
            })?
            .claims;

        // A token is expired from its `exp` second onwards; a zero TTL
        // therefore yields a token that never verifies.
        if claims.exp <= now_unix_secs() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
