// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! View configuration and the annotated records handed to consumers.

use crate::config::{DEFAULT_SHOW_ALL_CATEGORY, DEFAULT_SOON_HOURS};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_ICON: &str = "mdi:format-list-checkbox";

/// How the activity list should be filtered and labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Only this category (plus the show-all category) when set
    pub category: Option<String>,
    /// Category value that passes every category filter
    pub show_all_category: String,
    /// Only overdue activities
    pub due_only: bool,
    /// Window before due in which an activity is "due soon"
    pub soon_threshold: Duration,
    /// Display header
    pub header: String,
    /// Display icon
    pub icon: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::new(None, DEFAULT_SHOW_ALL_CATEGORY)
    }
}

impl ViewConfig {
    pub fn new(category: Option<String>, show_all_category: &str) -> Self {
        let header = category
            .clone()
            .unwrap_or_else(|| DEFAULT_SHOW_ALL_CATEGORY.to_string());
        Self {
            category,
            show_all_category: show_all_category.to_string(),
            due_only: false,
            soon_threshold: Duration::hours(DEFAULT_SOON_HOURS),
            header,
            icon: DEFAULT_ICON.to_string(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.header = category.clone();
        self.category = Some(category);
        self
    }

    pub fn with_due_only(mut self, due_only: bool) -> Self {
        self.due_only = due_only;
        self
    }

    pub fn with_soon_hours(mut self, hours: i64) -> Self {
        self.soon_threshold = Duration::hours(hours.max(0));
        self
    }

    pub fn with_soon_threshold(mut self, threshold: Duration) -> Self {
        self.soon_threshold = threshold;
        self
    }
}

/// Presentation label derived from time remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum DueClass {
    Overdue,
    DueSoon,
    Upcoming,
}

impl DueClass {
    /// `Overdue` below zero, `DueSoon` in `[0, soon_threshold)`, else `Upcoming`.
    pub fn classify(time_remaining: Duration, soon_threshold: Duration) -> Self {
        if time_remaining < Duration::zero() {
            DueClass::Overdue
        } else if time_remaining < soon_threshold {
            DueClass::DueSoon
        } else {
            DueClass::Upcoming
        }
    }
}

/// An activity plus its derived due information, as shown to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AnnotatedActivity {
    pub id: String,
    pub category: String,
    /// Active display name
    pub name: String,
    pub names: Vec<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub current_name_index: usize,
    pub icon: Option<String>,
    pub last_completed: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub frequency_ms: i64,
    pub due: DateTime<Utc>,
    /// Signed; negative means overdue
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub time_remaining_ms: i64,
    pub status: DueClass,
    /// Human-readable due time, e.g. "in 2 days"
    pub due_in: String,
    /// True while a local change awaits remote confirmation
    pub provisional: bool,
}

impl AnnotatedActivity {
    pub fn time_remaining(&self) -> Duration {
        Duration::milliseconds(self.time_remaining_ms)
    }

    pub fn is_overdue(&self) -> bool {
        self.status == DueClass::Overdue
    }
}
