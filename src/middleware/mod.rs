// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules.

pub mod auth;
pub mod security;

pub use auth::{require_auth, AuthUser};
pub use security::add_security_headers;
