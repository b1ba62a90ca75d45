// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Sign-In ID token verification.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Unknown kids cannot force a refetch more often than this.
const DEFAULT_REFETCH_COOLDOWN: Duration = Duration::from_secs(10);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    /// Remote avatar URL
    pub picture: Option<String>,
}

/// Identity verification error categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OidcError {
    /// The credential is malformed, forged, expired, for another audience,
    /// or lacks a required claim.
    #[error("identity assertion rejected: {0}")]
    Rejected(String),
    /// Google's key endpoint could not be reached or returned garbage.
    #[error("identity provider unavailable: {0}")]
    Transient(String),
}

impl From<OidcError> for AppError {
    fn from(err: OidcError) -> Self {
        match err {
            OidcError::Rejected(msg) => {
                tracing::warn!(reason = %msg, "Google credential rejected");
                AppError::BadRequest("invalid Google credential".to_string())
            }
            OidcError::Transient(msg) => AppError::Upstream(msg),
        }
    }
}

/// Verifies a third-party identity assertion.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, OidcError>;
}

#[derive(Clone)]
enum KeySource {
    /// Fetch Google's published keys from a JWKS endpoint.
    Remote { jwks_url: String },
    /// One fixed key, for tests.
    Static {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Verifier for Google-issued ID tokens (RS256).
pub struct GoogleOidcVerifier {
    http_client: reqwest::Client,
    client_id: String,
    source: KeySource,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
    refetch_cooldown: Duration,
}

impl GoogleOidcVerifier {
    /// Verifier that fetches and caches keys from `GOOGLE_JWKS_URL`.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        tracing::info!(
            client_id = %config.google_client_id,
            jwks_url = %config.google_jwks_url,
            "Initialized Google ID token verifier"
        );

        Self::with_source(
            config,
            KeySource::Remote {
                jwks_url: config.google_jwks_url.clone(),
            },
        )
    }

    /// Verifier that trusts exactly one RSA public key.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key ID must not be empty");
        }

        Self::with_source(
            config,
            KeySource::Static {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn with_source(config: &Config, source: KeySource) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        Ok(Self {
            http_client,
            client_id: config.google_client_id.clone(),
            source,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refetch_cooldown: DEFAULT_REFETCH_COOLDOWN,
        })
    }

    /// Minimum age of the cached JWKS before an unknown kid may refetch it.
    pub fn with_refetch_cooldown(mut self, cooldown: Duration) -> Self {
        self.refetch_cooldown = cooldown;
        self
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        let jwks_url = match &self.source {
            KeySource::Static {
                kid: static_kid,
                decoding_key,
            } => {
                return if kid == static_kid {
                    Ok(decoding_key.clone())
                } else {
                    Err(OidcError::Rejected(format!("unknown key ID: {kid}")))
                };
            }
            KeySource::Remote { jwks_url } => jwks_url,
        };

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // Google rotates keys; an unknown kid forces one refetch even if the
        // cache has not yet expired, unless the cache was only just fetched.
        for force_refresh in [false, true] {
            self.refresh_jwks(jwks_url, force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(OidcError::Rejected(format!(
            "key ID not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, jwks_url: &str, force_refresh: bool) -> Result<(), OidcError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(entry) = self.jwks_cache.read().await.as_ref() {
            if entry.expires_at > Instant::now() {
                if !force_refresh {
                    return Ok(());
                }
                if entry.fetched_at.elapsed() < self.refetch_cooldown {
                    tracing::debug!("JWKS fetched recently; not refetching for unknown kid");
                    return Ok(());
                }
            }
        }

        tracing::debug!(jwks_url = %jwks_url, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OidcError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid: HashMap<String, Arc<DecodingKey>> = jwks
            .keys
            .into_iter()
            .filter(Jwk::is_rs256_signing_key)
            .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => Some((jwk.kid, Arc::new(key))),
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                    None
                }
            })
            .collect();

        if keys_by_kid.is_empty() {
            return Err(OidcError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let fetched_at = Instant::now();
        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            fetched_at,
            expires_at: fetched_at + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }
}

#[async_trait]
impl IdentityVerifier for GoogleOidcVerifier {
    async fn verify(&self, credential: &str) -> Result<GoogleIdentity, OidcError> {
        let header = decode_header(credential)
            .map_err(|e| OidcError::Rejected(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| OidcError::Rejected("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS[..]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<GoogleIdTokenClaims>(credential, decoding_key.as_ref(), &validation)
            .map_err(|e| OidcError::Rejected(format!("JWT validation failed: {e}")))?
            .claims;

        let email = claims
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| OidcError::Rejected("missing email claim".to_string()))?;

        if claims.email_verified == Some(false) {
            return Err(OidcError::Rejected("email_verified claim is false".to_string()));
        }

        tracing::debug!(subject = %claims.sub, "Google ID token verified");

        Ok(GoogleIdentity {
            subject: claims.sub,
            email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

impl Jwk {
    fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && !self.kid.trim().is_empty()
            && self.alg.as_deref().is_none_or(|alg| alg == "RS256")
            && self.use_.as_deref().is_none_or(|use_| use_ == "sig")
    }
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse::<u64>().ok())
}
