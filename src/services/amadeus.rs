// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activities API client (Amadeus Tours and Activities).

use crate::config::Config;
use crate::error::AppError;
use crate::models::Activity;
use crate::services::upstream::check_response_json;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
/// Refresh the client-credentials token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Source of activity candidates near a point.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn activities_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Activity>, AppError>;
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct AmadeusClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ActivitiesResponse {
    #[serde(default)]
    data: Vec<Activity>,
}

impl AmadeusClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building activities HTTP client")?;

        Ok(Self {
            http,
            base_url: config.amadeus_base_url.trim_end_matches('/').to_string(),
            client_id: config.amadeus_client_id.clone(),
            client_secret: config.amadeus_client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    /// Current access token, fetching a new one when missing or about to
    /// expire. The lock is held across the fetch so concurrent callers
    /// share a single token request.
    async fn access_token(&self) -> Result<String, AppError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/security/oauth2/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Activities token request failed: {e}")))?;

        let token: TokenResponse = check_response_json("Activities auth", response).await?;
        tracing::debug!(expires_in = token.expires_in, "Activities API token refreshed");

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        Ok(access_token)
    }
}

#[async_trait]
impl ActivitySource for AmadeusClient {
    async fn activities_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<Activity>, AppError> {
        let access_token = self.access_token().await?;

        let response = self
            .http
            .get(format!("{}/v1/shopping/activities", self.base_url))
            .bearer_auth(access_token)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("radius", radius_km.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Activities request failed: {e}")))?;

        let body: ActivitiesResponse = check_response_json("Activities", response).await?;

        tracing::debug!(count = body.data.len(), "Fetched activity candidates");
        Ok(body.data)
    }
}
