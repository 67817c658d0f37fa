// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 timestamp (any offset) into UTC.
pub fn parse_utc_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Unit boundaries for relative formatting: each amount is how many of the
/// current unit make up the next one.
const DIVISIONS: [(f64, &str); 7] = [
    (60.0, "second"),
    (60.0, "minute"),
    (24.0, "hour"),
    (7.0, "day"),
    (4.34524, "week"),
    (12.0, "month"),
    (f64::INFINITY, "year"),
];

/// Render `target` relative to `now`, e.g. "in 3 days" or "2 hours ago".
pub fn format_relative(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mut amount = (target - now).num_milliseconds() as f64 / 1000.0;

    for (size, unit) in DIVISIONS {
        if amount.abs() < size {
            let rounded = amount.round() as i64;
            return match rounded {
                0 => "now".to_string(),
                n if n > 0 => format!("in {} {}", n, pluralize(unit, n)),
                n => format!("{} {} ago", -n, pluralize(unit, -n)),
            };
        }
        amount /= size;
    }

    // Unreachable: the last division is unbounded.
    "now".to_string()
}

fn pluralize(unit: &str, n: i64) -> String {
    if n == 1 {
        unit.to_string()
    } else {
        format!("{}s", unit)
    }
}
