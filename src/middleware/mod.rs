// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (API token guard, response headers).

pub mod auth;
pub mod security;

pub use auth::require_api_token;
