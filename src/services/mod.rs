// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod amadeus;
pub mod auth;
pub mod avatar;
pub mod gemini;
pub mod geocoder;
pub mod google_oidc;
pub mod matching;
pub mod password;
pub mod rate_limit;
pub mod tokens;
mod upstream;

pub use amadeus::{ActivitySource, AmadeusClient};
pub use auth::{AuthService, NewAccount, Session};
pub use avatar::AvatarStore;
pub use gemini::{GeminiClient, TextClassifier};
pub use geocoder::{Geocoder, NominatimClient};
pub use google_oidc::{GoogleIdentity, GoogleOidcVerifier, IdentityVerifier, OidcError};
pub use matching::{ActivityMatcher, MatchSettings};
pub use password::PasswordHasher;
pub use rate_limit::RateLimiter;
pub use tokens::{TokenClaims, TokenError, TokenKind, TokenPair, TokenService};
