// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, login and session token routes.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{presented_token, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::services::{NewAccount, Session, TokenKind};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google-login", post(google_login))
        .route("/auth/refreshToken", post(refresh_token))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    /// Google ID token from the Sign-In button
    credential: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreatedResponse {
    pub new_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    body.validate()
        .map_err(|_| AppError::BadRequest("invalid email address".to_string()))?;

    let new_id = state
        .auth
        .register(NewAccount {
            email: body.email,
            password: body.password,
            username: body.username,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { new_id })))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let session = state
        .auth
        .login(body.email.as_deref(), body.password.as_deref())
        .await?;

    Ok(session_response(&state, jar, session))
}

async fn google_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<GoogleLoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let session = state
        .auth
        .login_with_google(body.credential.as_deref())
        .await?;

    Ok(session_response(&state, jar, session))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let presented = presented_token(&headers, &jar, REFRESH_TOKEN_COOKIE);
    let session = state.auth.refresh(presented.as_deref()).await?;

    Ok(session_response(&state, jar, session))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<CookieJar> {
    let presented = presented_token(&headers, &jar, REFRESH_TOKEN_COOKIE);
    state.auth.logout(presented.as_deref()).await?;

    Ok(jar
        .add(cleared_cookie(ACCESS_TOKEN_COOKIE))
        .add(cleared_cookie(REFRESH_TOKEN_COOKIE)))
}

/// JSON body plus the cookie pair carrying the same tokens.
fn session_response(
    state: &AppState,
    jar: CookieJar,
    session: Session,
) -> (CookieJar, Json<SessionResponse>) {
    let secure = state.config.secure_cookies();
    let tokens = state.auth.tokens();

    let jar = jar
        .add(token_cookie(
            ACCESS_TOKEN_COOKIE,
            session.tokens.access_token.clone(),
            tokens.ttl_secs(TokenKind::Access),
            secure,
        ))
        .add(token_cookie(
            REFRESH_TOKEN_COOKIE,
            session.tokens.refresh_token.clone(),
            tokens.ttl_secs(TokenKind::Refresh),
            secure,
        ));

    (
        jar,
        Json(SessionResponse {
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            user_id: session.user_id,
        }),
    )
}

/// Same-site cookie readable by the frontend, living as long as its token.
fn token_cookie(name: &'static str, value: String, ttl_secs: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .same_site(SameSite::Strict)
        .http_only(false)
        .secure(secure)
        .max_age(time::Duration::seconds(
            i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        ))
        .build()
}

/// Expired, empty cookie. Sent whether or not the client presented the
/// cookie, since the token may have come from the header.
fn cleared_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").build();
    cookie.make_removal();
    cookie
}
