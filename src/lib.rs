// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TripDude: a social travel backend.
//!
//! This crate provides the session-token authentication API (password and
//! Google sign-in with rotating refresh tokens) and the activity search
//! that filters nearby activities against a free-text description.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{Repository, UserStore};
use models::SavedActivity;
use services::{
    ActivityMatcher, ActivitySource, AmadeusClient, AuthService, AvatarStore, GeminiClient,
    Geocoder, GoogleOidcVerifier, IdentityVerifier, MatchSettings, NominatimClient,
    PasswordHasher, RateLimiter, TextClassifier, TokenService,
};
use std::sync::Arc;
use std::time::Duration;

/// Third-party services the backend talks to.
pub struct Upstreams {
    pub identity: Arc<dyn IdentityVerifier>,
    pub geocoder: Arc<dyn Geocoder>,
    pub activities: Arc<dyn ActivitySource>,
    pub classifier: Arc<dyn TextClassifier>,
}

impl Upstreams {
    /// The production clients (Google, Nominatim, Amadeus, Gemini).
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            identity: Arc::new(GoogleOidcVerifier::new(config)?),
            geocoder: Arc::new(NominatimClient::new(config)?),
            activities: Arc::new(AmadeusClient::new(config)?),
            classifier: Arc::new(GeminiClient::new(config)?),
        })
    }
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub saved_activities: Arc<dyn Repository<SavedActivity>>,
    pub auth: AuthService,
    pub matcher: ActivityMatcher,
}

impl AppState {
    /// Wire every service from `config`, one store and the upstream clients.
    pub fn new<S>(config: Config, store: S, upstreams: Upstreams) -> anyhow::Result<Self>
    where
        S: UserStore + Repository<SavedActivity> + Clone + 'static,
    {
        let users: Arc<dyn UserStore> = Arc::new(store.clone());
        let saved_activities: Arc<dyn Repository<SavedActivity>> = Arc::new(store);

        let tokens = TokenService::new(
            &config.access_token_secret,
            config.access_token_ttl_secs,
            &config.refresh_token_secret,
            config.refresh_token_ttl_secs,
        );
        let hasher = PasswordHasher::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
        )?;

        let auth = AuthService::new(
            users.clone(),
            tokens,
            hasher,
            upstreams.identity,
            AvatarStore::new(&config)?,
        )?;

        // One limiter for every rate-limited upstream call.
        let limiter = RateLimiter::new(Duration::from_millis(config.upstream_min_interval_ms));
        let matcher = ActivityMatcher::new(
            upstreams.geocoder,
            upstreams.activities,
            upstreams.classifier,
            limiter,
            MatchSettings::from_config(&config),
        );

        Ok(Self {
            config,
            users,
            saved_activities,
            auth,
            matcher,
        })
    }
}
