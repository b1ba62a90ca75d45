// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity matching pipeline.
//!
//! location → geocoder → activity source → batches → classifier per batch
//! → candidates whose IDs the classifier returned.
//!
//! Upstream calls after geocoding are best-effort: a failed activity fetch
//! yields no candidates and a failed batch yields no matches, but neither
//! fails the request.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Activity;
use crate::services::amadeus::ActivitySource;
use crate::services::gemini::TextClassifier;
use crate::services::geocoder::Geocoder;
use crate::services::rate_limit::RateLimiter;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Tunables for one matching run.
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    pub max_candidates: usize,
    pub batch_size: usize,
    pub radius_km: f64,
}

impl MatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_candidates: config.match_max_candidates,
            batch_size: config.match_batch_size,
            radius_km: config.match_search_radius_km,
        }
    }
}

#[derive(Clone)]
pub struct ActivityMatcher {
    geocoder: Arc<dyn Geocoder>,
    source: Arc<dyn ActivitySource>,
    classifier: Arc<dyn TextClassifier>,
    limiter: RateLimiter,
    settings: MatchSettings,
}

impl ActivityMatcher {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        source: Arc<dyn ActivitySource>,
        classifier: Arc<dyn TextClassifier>,
        limiter: RateLimiter,
        settings: MatchSettings,
    ) -> Self {
        Self {
            geocoder,
            source,
            classifier,
            limiter,
            settings,
        }
    }

    /// Activities near `location` that the classifier judges to match
    /// `description`, in candidate order.
    pub async fn match_activities(&self, location: &str, description: &str) -> Result<Vec<Activity>> {
        let places = self.geocoder.search(location).await?;
        let Some(place) = places.first() else {
            return Err(AppError::Upstream(format!(
                "geocoder found no places for {location:?}"
            )));
        };

        let mut candidates = self.fetch_candidates(place.latitude, place.longitude).await;
        candidates.truncate(self.settings.max_candidates);

        let batches = split_into_batches(candidates, self.settings.batch_size);
        tracing::info!(
            latitude = place.latitude,
            longitude = place.longitude,
            batches = batches.len(),
            "Classifying activity candidates"
        );

        let results = join_all(
            batches
                .iter()
                .enumerate()
                .map(|(index, batch)| self.classify_batch(index, description, batch)),
        )
        .await;

        let matches: Vec<Activity> = results.into_iter().flatten().collect();
        tracing::info!(matches = matches.len(), "Activity matching complete");
        Ok(matches)
    }

    /// Suggestion labels for a partial place name, deduplicated in order.
    pub async fn place_names(&self, query: &str) -> Result<Vec<String>> {
        let places = self.geocoder.search(query).await?;

        let mut seen = HashSet::new();
        Ok(places
            .iter()
            .map(|place| place.label())
            .filter(|label| seen.insert(label.clone()))
            .collect())
    }

    /// Candidates from every source; failed sources contribute nothing.
    async fn fetch_candidates(&self, latitude: f64, longitude: f64) -> Vec<Activity> {
        let sources = [self.limiter.schedule(self.source.activities_near(
            latitude,
            longitude,
            self.settings.radius_km,
        ))];

        join_all(sources)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(activities) => Some(activities),
                Err(e) => {
                    tracing::warn!(error = %e, "Activity fetch failed; continuing without it");
                    None
                }
            })
            .flatten()
            .collect()
    }

    /// Matching subset of one batch; empty if the classifier call fails.
    async fn classify_batch(
        &self,
        index: usize,
        description: &str,
        batch: &[Activity],
    ) -> Vec<Activity> {
        let prompt = build_classifier_prompt(description, batch);

        match self.limiter.schedule(self.classifier.complete(&prompt)).await {
            Ok(response) => {
                let ids = parse_matching_ids(&response);
                let selected = select_matching(batch, &ids);
                tracing::debug!(
                    batch = index,
                    candidates = batch.len(),
                    matches = selected.len(),
                    "Batch classified"
                );
                selected
            }
            Err(e) => {
                tracing::warn!(batch = index, error = %e, "Classifier call failed; dropping batch");
                Vec::new()
            }
        }
    }
}

/// Split into consecutive, non-overlapping batches of at most `batch_size`.
pub fn split_into_batches(candidates: Vec<Activity>, batch_size: usize) -> Vec<Vec<Activity>> {
    candidates
        .chunks(batch_size.max(1))
        .map(<[Activity]>::to_vec)
        .collect()
}

/// The fields of a candidate the classifier gets to see.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateSummary<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    minimum_duration: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<&'a str>,
}

impl<'a> CandidateSummary<'a> {
    fn of(activity: &'a Activity) -> Option<Self> {
        let price = activity.price.as_ref().and_then(|p| {
            let parts: Vec<&str> = [p.amount.as_deref(), p.currency_code.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        });

        Some(Self {
            id: activity.id.as_deref()?,
            name: activity.name.as_deref(),
            description: activity
                .description
                .as_deref()
                .or(activity.short_description.as_deref()),
            minimum_duration: activity.minimum_duration.as_deref(),
            price,
            rating: activity.rating.as_deref(),
        })
    }
}

/// Prompt asking for the IDs of the candidates that match `description`.
///
/// Candidates without an ID are left out; they could never be selected.
pub fn build_classifier_prompt(description: &str, batch: &[Activity]) -> String {
    let listing: Vec<String> = batch
        .iter()
        .filter_map(CandidateSummary::of)
        .filter_map(|summary| serde_json::to_string(&summary).ok())
        .collect();

    format!(
        "This is an API for activities around the world.\n\
         Here is a description of a desired activity: {description}\n\
         Return the ids of only the activities below that strictly match the description.\n\
         The response must contain only the ids, separated by commas, with no other text.\n\
         Activities (one JSON object per line):\n\
         {}\n",
        listing.join("\n")
    )
}

/// IDs from a classifier answer, split on commas and newlines.
pub fn parse_matching_ids(response: &str) -> HashSet<String> {
    response
        .split([',', '\n'])
        .map(|id| id.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Members of `batch` whose ID is in `ids`, in batch order.
fn select_matching(batch: &[Activity], ids: &HashSet<String>) -> Vec<Activity> {
    batch
        .iter()
        .filter(|activity| activity.id.as_ref().is_some_and(|id| ids.contains(id)))
        .cloned()
        .collect()
}
