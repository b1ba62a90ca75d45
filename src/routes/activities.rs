// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity search and saved activities.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::new_document_id;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{Activity, SavedActivity};
use crate::routes::auth::CreatedResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", get(match_activities).post(save_activity))
        .route("/activities/location", get(place_names))
        .route("/activities/saved", get(saved_activities))
        .route(
            "/activities/{id}",
            get(get_activity).delete(remove_saved_activity),
        )
}

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    location: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceNameParams {
    name: Option<String>,
}

fn required_param(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing query parameter: {name}")))
}

/// Nearby activities matching a free-text description.
async fn match_activities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MatchParams>,
) -> Result<Json<Vec<Activity>>> {
    let location = required_param(params.location, "location")?;
    let description = required_param(params.description, "description")?;

    let activities = state
        .matcher
        .match_activities(&location, &description)
        .await?;

    Ok(Json(activities))
}

/// Place-name suggestions for a partial name.
async fn place_names(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlaceNameParams>,
) -> Result<Json<Vec<String>>> {
    let name = required_param(params.name, "name")?;
    Ok(Json(state.matcher.place_names(&name).await?))
}

/// The caller's saved activities, in the order they were saved.
async fn saved_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<SavedActivity>>> {
    let account = state
        .users
        .find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_string()))?;

    let mut saved = Vec::with_capacity(account.saved_activities.len());
    for doc_id in &account.saved_activities {
        match state.saved_activities.get(doc_id).await? {
            Some(activity) => saved.push(activity),
            None => tracing::warn!(doc_id = %doc_id, "Saved activity document missing"),
        }
    }

    Ok(Json(saved))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SavedActivity>> {
    state
        .saved_activities
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("activity {id}")))
}

/// Save an activity for the caller.
///
/// Documents are shared between users: an activity whose upstream ID is
/// already stored reuses that document.
async fn save_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(activity): Json<Activity>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let existing = match activity.id.as_deref() {
        Some(upstream_id) => state
            .saved_activities
            .find_by("id", upstream_id)
            .await?
            .into_iter()
            .next(),
        None => None,
    };

    let new_id = match existing {
        Some(doc) => doc.doc_id,
        None => {
            let doc = SavedActivity {
                doc_id: new_document_id()?,
                activity,
            };
            state.saved_activities.create(&doc).await?;
            doc.doc_id
        }
    };

    if !state
        .users
        .add_saved_activity(&user.user_id, &new_id)
        .await?
    {
        return Err(AppError::NotFound("user".to_string()));
    }

    tracing::info!(user_id = %user.user_id, doc_id = %new_id, "Activity saved");
    Ok((StatusCode::CREATED, Json(CreatedResponse { new_id })))
}

/// Remove an activity from the caller's saved list.
async fn remove_saved_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state
        .users
        .remove_saved_activity(&user.user_id, &id)
        .await?
    {
        return Err(AppError::NotFound(format!("saved activity {id}")));
    }

    tracing::info!(user_id = %user.user_id, doc_id = %id, "Saved activity removed");
    Ok(StatusCode::OK)
}
