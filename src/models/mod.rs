// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod place;
pub mod user;

pub use activity::{Activity, GeoCode, Price, SavedActivity};
pub use place::Place;
pub use user::{TokenSetUpdate, User};
