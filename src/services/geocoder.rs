// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Free-text place search (Nominatim).

use crate::config::Config;
use crate::error::AppError;
use crate::models::Place;
use crate::services::upstream::check_response_json;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const RESULT_LIMIT: &str = "5";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves a place name to administrative places, best match first.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Place>, AppError>;
}

/// Client for a Nominatim `/search` endpoint.
pub struct NominatimClient {
    http_client: reqwest::Client,
    search_url: String,
    language: String,
}

impl NominatimClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        // Nominatim's usage policy requires an identifying User-Agent.
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("tripdude-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed building geocoder HTTP client")?;

        Ok(Self {
            http_client,
            search_url: config.geocoder_url.clone(),
            language: config.geocoder_language.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn search(&self, query: &str) -> Result<Vec<Place>, AppError> {
        let response = self
            .http_client
            .get(&self.search_url)
            .query(&[
                ("q", query),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", RESULT_LIMIT),
                ("accept-language", self.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Geocoder request failed: {e}")))?;

        let results: Vec<NominatimPlace> = check_response_json("Geocoder", response).await?;

        let places: Vec<Place> = results
            .into_iter()
            .filter(NominatimPlace::is_administrative_boundary)
            .filter_map(NominatimPlace::into_place)
            .collect();

        tracing::debug!(count = places.len(), "Geocoder results");
        Ok(places)
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    /// `class` in the `json` format, `category` in `jsonv2`
    #[serde(default, alias = "class")]
    category: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    addresstype: Option<String>,
    #[serde(default)]
    boundingbox: Option<Vec<String>>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    country: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl NominatimPlace {
    fn is_administrative_boundary(&self) -> bool {
        self.category.as_deref() == Some("boundary")
            && self.kind.as_deref() == Some("administrative")
    }

    /// `None` if the coordinates are not numbers.
    fn into_place(self) -> Option<Place> {
        let latitude = self.lat.parse().ok()?;
        let longitude = self.lon.parse().ok()?;

        let bounding_box = self.boundingbox.and_then(|raw| {
            let parsed: Vec<f64> = raw.iter().filter_map(|v| v.parse().ok()).collect();
            <[f64; 4]>::try_from(parsed).ok()
        });

        let address = self.address;
        Some(Place {
            latitude,
            longitude,
            display_name: self.display_name,
            country: address.country,
            city: address.city.or(address.town).or(address.village),
            place_type: self.addresstype,
            bounding_box,
        })
    }
}
