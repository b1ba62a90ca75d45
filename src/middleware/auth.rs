// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access-token authentication middleware.

use crate::error::AppError;
use crate::services::TokenKind;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Authenticated user extracted from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Credential from the `Authorization` header (its second word, so both
/// `Bearer <token>` and `JWT <token>` work), falling back to `cookie`.
pub fn presented_token(headers: &HeaderMap, jar: &CookieJar, cookie: &str) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split_whitespace().nth(1))
        .map(str::to_string)
        .or_else(|| jar.get(cookie).map(|c| c.value().to_string()))
        .filter(|token| !token.is_empty())
}

/// Middleware that requires a valid access token.
///
/// No token is 401; a token that fails verification is 403.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = presented_token(request.headers(), &jar, ACCESS_TOKEN_COOKIE)
        .ok_or(AppError::Unauthorized)?;

    let claims = state
        .auth
        .tokens()
        .verify(&token, TokenKind::Access)
        .map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AppError::InvalidToken
        })?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
    });

    Ok(next.run(request).await)
}
