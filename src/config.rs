// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured for local development.

use crate::models::view::ViewConfig;
use crate::services::remote::Addressing;
use std::env;
use std::time::Duration;

/// Category value that matches every view filter.
pub const DEFAULT_SHOW_ALL_CATEGORY: &str = "Activities";

/// Default "due soon" window, in hours.
pub const DEFAULT_SOON_HOURS: i64 = 24;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Remote service ---
    /// Base URL of the remote activity service
    pub remote_url: String,
    /// Bearer token presented to the remote service
    pub remote_token: String,
    /// How the remote addresses activities for entity-scoped operations
    pub addressing: Addressing,

    // --- Local API ---
    /// Server port
    pub port: u16,
    /// Bearer token required on `/api/*`
    pub api_token: String,
    /// Path secret for the push webhook
    pub webhook_token: String,

    // --- View defaults ---
    /// Category filter applied when a request does not pick one
    pub category: Option<String>,
    /// Sentinel category that passes every category filter
    pub show_all_category: String,
    /// Only show overdue activities
    pub due_only: bool,
    /// Hours before due at which an activity counts as "due soon"
    pub soon_hours: i64,

    /// Polling fallback; `None` relies on push notifications alone
    pub poll_interval: Option<Duration>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            remote_url: "http://localhost:8123".to_string(),
            remote_token: "test_remote_token".to_string(),
            addressing: Addressing::EntityLookup,
            port: 8080,
            api_token: "test_api_token".to_string(),
            webhook_token: "test_webhook_token".to_string(),
            category: None,
            show_all_category: DEFAULT_SHOW_ALL_CATEGORY.to_string(),
            due_only: false,
            soon_hours: DEFAULT_SOON_HOURS,
            poll_interval: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let addressing = match env::var("ACTIVITY_MANAGER_ADDRESSING") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "ACTIVITY_MANAGER_ADDRESSING",
                value: raw,
            })?,
            Err(_) => Addressing::EntityLookup,
        };

        let soon_hours = parse_or("ACTIVITY_MANAGER_SOON_HOURS", DEFAULT_SOON_HOURS)?;
        if soon_hours < 0 {
            return Err(ConfigError::Invalid {
                var: "ACTIVITY_MANAGER_SOON_HOURS",
                value: soon_hours.to_string(),
            });
        }

        let poll_secs: u64 = parse_or("ACTIVITY_MANAGER_POLL_SECS", 0)?;

        Ok(Self {
            remote_url: required("ACTIVITY_MANAGER_REMOTE_URL")?
                .trim_end_matches('/')
                .to_string(),
            remote_token: required("ACTIVITY_MANAGER_REMOTE_TOKEN")?,
            addressing,
            port: parse_or("PORT", 8080)?,
            api_token: required("ACTIVITY_MANAGER_API_TOKEN")?,
            webhook_token: required("ACTIVITY_MANAGER_WEBHOOK_TOKEN")?,
            category: env::var("ACTIVITY_MANAGER_CATEGORY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            show_all_category: env::var("ACTIVITY_MANAGER_SHOW_ALL_CATEGORY")
                .unwrap_or_else(|_| DEFAULT_SHOW_ALL_CATEGORY.to_string()),
            due_only: parse_or("ACTIVITY_MANAGER_DUE_ONLY", false)?,
            soon_hours,
            poll_interval: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
        })
    }

    /// View configuration built from the configured defaults.
    pub fn view_config(&self) -> ViewConfig {
        ViewConfig::new(self.category.clone(), &self.show_all_category)
            .with_due_only(self.due_only)
            .with_soon_hours(self.soon_hours)
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(var))
}

fn parse_or<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}
