// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity model: the wire shape received from the remote service and the
//! canonical shape used everywhere else.

use crate::error::{AppError, Result};
use crate::services::due;
use crate::services::names::NameRotator;
use crate::time_utils::parse_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Longest recurrence interval accepted for a new activity.
pub const MAX_FREQUENCY_DAYS: i64 = 36_525;

/// Canonical, locally mirrored activity.
///
/// Built only through [`RawActivity::normalize`] or [`NewActivity::provisional`],
/// so `names` is never empty and `frequency` is never negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// Opaque identifier, unique within the collection
    pub id: String,
    /// Free-text grouping label
    pub category: String,
    /// Display names in rotation order
    pub names: NameRotator,
    /// Most recent completion
    pub last_completed: DateTime<Utc>,
    /// Recurrence interval
    pub frequency: Duration,
    /// Symbolic icon reference (e.g. "mdi:broom")
    pub icon: Option<String>,
}

impl Activity {
    /// The currently active display name.
    pub fn name(&self) -> &str {
        self.names.active_name()
    }

    /// Record a completion: move `last_completed` and hand off to the next name.
    pub fn complete_at(&mut self, at: DateTime<Utc>) {
        self.last_completed = at;
        self.names.advance();
    }
}

/// Activity record as the remote service returns it.
///
/// Older records carry a single `name` and no `names`/`current_name_index`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawActivity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub current_name_index: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub last_completed: Option<String>,
    #[serde(default)]
    pub frequency_ms: Option<i64>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl RawActivity {
    /// Convert to the canonical shape, or explain what is missing.
    pub fn normalize(self) -> Result<Activity> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::MalformedResponse("activity without id".to_string()))?;

        let names = match self.names.filter(|n| !n.is_empty()) {
            Some(names) => names,
            None => self.name.map(|n| vec![n]).ok_or_else(|| {
                AppError::MalformedResponse(format!("activity {} has no name", id))
            })?,
        };
        let index = self.current_name_index.unwrap_or(0).max(0) as usize;
        // `names` is non-empty here, so from_parts cannot fail.
        let names = NameRotator::from_parts(names, index).ok_or_else(|| {
            AppError::MalformedResponse(format!("activity {} has no name", id))
        })?;

        let raw_completed = self.last_completed.ok_or_else(|| {
            AppError::MalformedResponse(format!("activity {} has no last_completed", id))
        })?;
        let last_completed = parse_utc_rfc3339(&raw_completed).ok_or_else(|| {
            AppError::MalformedResponse(format!(
                "activity {} has invalid last_completed {:?}",
                id, raw_completed
            ))
        })?;

        let frequency_ms = self.frequency_ms.ok_or_else(|| {
            AppError::MalformedResponse(format!("activity {} has no frequency_ms", id))
        })?;
        if frequency_ms < 0 {
            return Err(AppError::MalformedResponse(format!(
                "activity {} has negative frequency",
                id
            )));
        }
        let frequency = Duration::try_milliseconds(frequency_ms)
            .filter(|f| due::checked_due(last_completed, *f).is_some())
            .ok_or_else(|| {
                AppError::MalformedResponse(format!(
                    "activity {} has out-of-range frequency {}",
                    id, frequency_ms
                ))
            })?;

        Ok(Activity {
            id,
            category: self.category.unwrap_or_default(),
            names,
            last_completed,
            frequency,
            icon: self.icon.filter(|i| !i.is_empty()),
        })
    }
}

/// Recurrence interval as entered: separate day/hour/minute/second fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Frequency {
    #[serde(default)]
    pub days: i64,
    #[serde(default)]
    pub hours: i64,
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub seconds: i64,
}

impl Frequency {
    pub fn days(days: i64) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    /// Collapse the components into one duration.
    pub fn to_duration(&self) -> Result<Duration> {
        let parts = [self.days, self.hours, self.minutes, self.seconds];
        if parts.iter().any(|p| *p < 0) {
            return Err(AppError::InvalidOperation(
                "Frequency components must not be negative".to_string(),
            ));
        }

        let overflow = || AppError::InvalidOperation("Frequency is too large".to_string());
        let total = Duration::try_days(self.days)
            .and_then(|d| d.checked_add(&Duration::try_hours(self.hours)?))
            .and_then(|d| d.checked_add(&Duration::try_minutes(self.minutes)?))
            .and_then(|d| d.checked_add(&Duration::try_seconds(self.seconds)?))
            .filter(|d| *d <= Duration::days(MAX_FREQUENCY_DAYS))
            .ok_or_else(overflow)?;
        Ok(total)
    }
}

/// Client-supplied fields for creating an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub names: Vec<String>,
    pub category: String,
    pub frequency: Frequency,
    pub icon: Option<String>,
    pub last_completed: Option<DateTime<Utc>>,
}

impl NewActivity {
    /// Build from a single name field; a comma-separated value yields several
    /// names in the order given.
    pub fn from_name_input(
        input: &str,
        category: impl Into<String>,
        frequency: Frequency,
    ) -> Self {
        let names = if input.contains(',') {
            input
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect()
        } else {
            let trimmed = input.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        };

        Self {
            names,
            category: category.into(),
            frequency,
            icon: None,
            last_completed: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_last_completed(mut self, at: DateTime<Utc>) -> Self {
        self.last_completed = Some(at);
        self
    }

    /// Local checks run before anything is sent to the remote.
    pub fn validate(&self) -> Result<Duration> {
        if self.names.is_empty() {
            return Err(AppError::InvalidOperation(
                "An activity needs at least one name".to_string(),
            ));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::InvalidOperation(
                "An activity needs a category".to_string(),
            ));
        }
        self.frequency.to_duration()
    }

    /// The local stand-in shown until the remote assigns a real id.
    pub fn provisional(&self, id: String, now: DateTime<Utc>) -> Result<Activity> {
        let frequency = self.validate()?;
        let names = NameRotator::from_parts(self.names.clone(), 0).ok_or_else(|| {
            AppError::InvalidOperation("An activity needs at least one name".to_string())
        })?;
        let last_completed = self.last_completed.unwrap_or(now);
        if due::checked_due(last_completed, frequency).is_none() {
            return Err(AppError::InvalidOperation(
                "Next due date is out of range".to_string(),
            ));
        }
        Ok(Activity {
            id,
            category: self.category.clone(),
            names,
            last_completed,
            frequency,
            icon: self.icon.clone(),
        })
    }
}
