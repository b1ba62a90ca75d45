// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup and handed to the services that need
//! them; nothing reads the environment after `main` has built the state.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Which credential/document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    /// Process-local store, for local development and tests.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Server port
    pub port: u16,
    /// Frontend origin (CORS, cookie `Secure` flag)
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    pub store_backend: StoreBackend,

    // --- Session tokens ---
    /// HS256 secret for access tokens (raw bytes)
    pub access_token_secret: Vec<u8>,
    /// HS256 secret for refresh tokens; must differ from the access secret
    pub refresh_token_secret: Vec<u8>,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,

    // --- Password hashing (argon2id work factor) ---
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,

    // --- Google sign-in ---
    /// OAuth client ID; the required audience of Google ID tokens
    pub google_client_id: String,
    pub google_jwks_url: String,

    // --- Upstream APIs ---
    pub geocoder_url: String,
    pub geocoder_language: String,
    pub amadeus_client_id: String,
    pub amadeus_client_secret: String,
    pub amadeus_base_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Minimum spacing between rate-limited upstream calls
    pub upstream_min_interval_ms: u64,

    // --- Activity matching ---
    pub match_max_candidates: usize,
    pub match_batch_size: usize,
    pub match_search_radius_km: f64,

    // --- Uploaded files ---
    pub uploads_dir: PathBuf,
    pub public_base_url: String,
}

impl Config {
    /// Deterministic configuration for tests.
    ///
    /// Uses the in-memory store and a cheap argon2 cost so tests stay fast.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            store_backend: StoreBackend::Memory,
            access_token_secret: b"test_access_secret_32_bytes_min!!".to_vec(),
            refresh_token_secret: b"test_refresh_secret_32_bytes_min!".to_vec(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604_800,
            password_hash_memory_kib: 8,
            password_hash_iterations: 1,
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            google_jwks_url: "http://127.0.0.1:9/certs".to_string(),
            geocoder_url: "http://127.0.0.1:9/search".to_string(),
            geocoder_language: "en".to_string(),
            amadeus_client_id: "test_amadeus_id".to_string(),
            amadeus_client_secret: "test_amadeus_secret".to_string(),
            amadeus_base_url: "http://127.0.0.1:9".to_string(),
            gemini_api_key: "test_gemini_key".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: "http://127.0.0.1:9/v1beta".to_string(),
            upstream_min_interval_ms: 0,
            match_max_candidates: 200,
            match_batch_size: 50,
            match_search_radius_km: 1.0,
            uploads_dir: env::temp_dir().join("tripdude-test-uploads"),
            public_base_url: "http://localhost:8080".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let access_token_secret = required("ACCESS_TOKEN_SECRET")?.into_bytes();
        let refresh_token_secret = required("REFRESH_TOKEN_SECRET")?.into_bytes();
        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::Invalid("REFRESH_TOKEN_SECRET"));
        }

        let match_batch_size: usize = parsed("MATCH_BATCH_SIZE", 50)?;
        if match_batch_size == 0 {
            return Err(ConfigError::Invalid("MATCH_BATCH_SIZE"));
        }

        Ok(Self {
            port: parsed("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store_backend: parsed("STORE_BACKEND", StoreBackend::Firestore)?,

            access_token_secret,
            refresh_token_secret,
            access_token_ttl_secs: parsed("ACCESS_TOKEN_TTL_SECS", 900)?,
            refresh_token_ttl_secs: parsed("REFRESH_TOKEN_TTL_SECS", 604_800)?,

            password_hash_memory_kib: parsed("PASSWORD_HASH_MEMORY_KIB", 19_456)?,
            password_hash_iterations: parsed("PASSWORD_HASH_ITERATIONS", 2)?,

            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_jwks_url: env::var("GOOGLE_JWKS_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/oauth2/v3/certs".to_string()),

            geocoder_url: env::var("GEOCODER_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".to_string()),
            geocoder_language: env::var("GEOCODER_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            amadeus_client_id: required("AMADEUS_CLIENT_ID")?,
            amadeus_client_secret: required("AMADEUS_CLIENT_SECRET")?,
            amadeus_base_url: env::var("AMADEUS_BASE_URL")
                .unwrap_or_else(|_| "https://test.api.amadeus.com".to_string()),
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            upstream_min_interval_ms: parsed("UPSTREAM_MIN_INTERVAL_MS", 100)?,

            match_max_candidates: parsed("MATCH_MAX_CANDIDATES", 200)?,
            match_batch_size,
            match_search_radius_km: parsed("MATCH_SEARCH_RADIUS_KM", 1.0)?,

            uploads_dir: env::var("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        })
    }

    /// Whether cookies must carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
