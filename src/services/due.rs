// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Due-date arithmetic.
//!
//! Everything here is a pure function of its arguments. `now` is always
//! passed in, so results must be recomputed for every view.

use chrono::{DateTime, Duration, Utc};

/// Derived due information for one activity at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueDate {
    /// `last_completed + frequency`
    pub due: DateTime<Utc>,
    /// `due - now`; negative once overdue
    pub time_remaining: Duration,
}

impl DueDate {
    pub fn is_overdue(&self) -> bool {
        self.time_remaining < Duration::zero()
    }
}

/// `last_completed + frequency`, or `None` past the representable date range.
pub fn checked_due(last_completed: DateTime<Utc>, frequency: Duration) -> Option<DateTime<Utc>> {
    last_completed.checked_add_signed(frequency)
}

/// Compute due time and signed time remaining.
///
/// Records are range-checked when they enter the mirror; a due time past the
/// end of the calendar still saturates instead of panicking.
pub fn compute(
    last_completed: DateTime<Utc>,
    frequency: Duration,
    now: DateTime<Utc>,
) -> DueDate {
    let due = checked_due(last_completed, frequency).unwrap_or(DateTime::<Utc>::MAX_UTC);
    DueDate {
        due,
        time_remaining: due.signed_duration_since(now),
    }
}
