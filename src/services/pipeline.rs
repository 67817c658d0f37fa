// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Filter/sort pipeline: raw mirror records in, ordered annotated view out.
//!
//! Steps, in order:
//! 1. Category filter (configured category or the show-all category)
//! 2. Due-only filter
//! 3. Annotation and classification
//! 4. Sort: overdue first, then ascending time remaining

use crate::models::{Activity, AnnotatedActivity, DueClass, ViewConfig};
use crate::services::due;
use crate::time_utils::format_relative;
use chrono::{DateTime, Utc};

/// Run the whole pipeline at instant `now`.
///
/// `is_provisional` marks records that still have a mutation in flight.
pub fn run<F>(
    activities: &[Activity],
    config: &ViewConfig,
    now: DateTime<Utc>,
    is_provisional: F,
) -> Vec<AnnotatedActivity>
where
    F: Fn(&str) -> bool,
{
    let mut view: Vec<AnnotatedActivity> = activities
        .iter()
        .filter(|a| matches_category(a, config))
        .map(|a| annotate(a, config, now, is_provisional(&a.id)))
        .filter(|a| !config.due_only || a.is_overdue())
        .collect();

    sort_by_due(&mut view);
    view
}

/// Keep when no category is configured, the category matches, or the
/// activity belongs to the show-all category.
pub fn matches_category(activity: &Activity, config: &ViewConfig) -> bool {
    match &config.category {
        None => true,
        Some(category) => {
            activity.category == *category || activity.category == config.show_all_category
        }
    }
}

/// Attach due time, remaining time and classification.
pub fn annotate(
    activity: &Activity,
    config: &ViewConfig,
    now: DateTime<Utc>,
    provisional: bool,
) -> AnnotatedActivity {
    let due = due::compute(activity.last_completed, activity.frequency, now);

    AnnotatedActivity {
        id: activity.id.clone(),
        category: activity.category.clone(),
        name: activity.name().to_string(),
        names: activity.names.names().to_vec(),
        current_name_index: activity.names.current_index(),
        icon: activity.icon.clone(),
        last_completed: activity.last_completed,
        frequency_ms: activity.frequency.num_milliseconds(),
        due: due.due,
        time_remaining_ms: due.time_remaining.num_milliseconds(),
        status: DueClass::classify(due.time_remaining, config.soon_threshold),
        due_in: format_relative(due.due, now),
        provisional,
    }
}

/// Overdue before everything else; soonest due first within each group.
/// Stable, so ties keep snapshot order.
pub fn sort_by_due(view: &mut [AnnotatedActivity]) {
    view.sort_by_key(|a| (!a.is_overdue(), a.time_remaining_ms));
}
