// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response handling shared by the third-party API clients.

use crate::error::AppError;
use serde::de::DeserializeOwned;

const LOGGED_BODY_CHARS: usize = 200;

/// Check response status and parse the JSON body.
///
/// Non-2xx bodies go to the log (truncated), never into the error itself,
/// so upstream detail cannot leak into a client response.
pub(crate) async fn check_response_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!(service, "Upstream rate limit hit (429)");
        } else {
            tracing::warn!(
                service,
                status = %status,
                body = %truncate(&body, LOGGED_BODY_CHARS),
                "Upstream error response"
            );
        }

        return Err(AppError::Upstream(format!("{service} returned {status}")));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("{service} JSON parse error: {e}")))
}

pub(crate) fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
