// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rotating display names for an activity.
//!
//! Each activity carries an ordered, never-empty list of names and the index
//! of the one currently shown. Completing the activity hands it to the next
//! name in the list.

use crate::error::{AppError, Result};
use serde::Serialize;

/// Ordered display names plus the active index.
///
/// Invariant: `names` is non-empty and `current_name_index < names.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameRotator {
    names: Vec<String>,
    current_name_index: usize,
}

impl NameRotator {
    /// A rotator with a single name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            current_name_index: 0,
        }
    }

    /// Build from stored parts, clamping an out-of-range index.
    ///
    /// Returns `None` when `names` is empty.
    pub fn from_parts(names: Vec<String>, current_name_index: usize) -> Option<Self> {
        if names.is_empty() {
            return None;
        }
        let current_name_index = current_name_index.min(names.len() - 1);
        Some(Self {
            names,
            current_name_index,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn current_index(&self) -> usize {
        self.current_name_index
    }

    /// Number of names (always at least one).
    pub fn count(&self) -> usize {
        self.names.len()
    }

    /// The name currently shown for the activity.
    pub fn active_name(&self) -> &str {
        &self.names[self.current_name_index]
    }

    /// Move to the next name, wrapping around. No-op for a single name.
    pub fn advance(&mut self) {
        if self.names.len() > 1 {
            self.current_name_index = (self.current_name_index + 1) % self.names.len();
        }
    }

    /// Append a name. The active name does not change.
    pub fn add_name(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Check that `index` could be removed, without removing it.
    pub fn check_removable(&self, index: usize) -> Result<()> {
        if self.names.len() <= 1 {
            return Err(AppError::InvalidOperation(
                "Cannot remove the last name!".to_string(),
            ));
        }
        if index >= self.names.len() {
            return Err(AppError::InvalidOperation(format!(
                "Name index {} is out of range (activity has {} names)",
                index,
                self.names.len()
            )));
        }
        Ok(())
    }

    /// Remove the name at `index` and re-clamp the active index.
    ///
    /// Removing before the active name shifts the index down so the same name
    /// stays active. Removing the active name keeps the index, which then
    /// points at the following name, or at the new last name if the removed
    /// one was last.
    pub fn remove_name(&mut self, index: usize) -> Result<String> {
        self.check_removable(index)?;

        let removed = self.names.remove(index);
        if index < self.current_name_index {
            self.current_name_index -= 1;
        } else if index == self.current_name_index && self.current_name_index == self.names.len()
        {
            self.current_name_index = self.names.len() - 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotator(names: &[&str], current: usize) -> NameRotator {
        NameRotator::from_parts(names.iter().map(|s| s.to_string()).collect(), current).unwrap()
    }

    #[test]
    fn test_from_parts_rejects_empty() {
        assert!(NameRotator::from_parts(vec![], 0).is_none());
    }

    #[test]
    fn test_from_parts_clamps_index() {
        let r = rotator(&["Alice", "Bob"], 7);
        assert_eq!(r.current_index(), 1);
        assert_eq!(r.active_name(), "Bob");
    }

    #[test]
    fn test_advance_single_name_is_noop() {
        let mut r = NameRotator::new("Vacuum");
        r.advance();
        r.advance();
        assert_eq!(r.current_index(), 0);
        assert_eq!(r.active_name(), "Vacuum");
    }

    #[test]
    fn test_advance_cycles_through_every_name() {
        let mut r = rotator(&["Alice", "Bob", "Carol"], 0);
        let mut seen = vec![r.active_name().to_string()];
        for _ in 0..2 {
            r.advance();
            seen.push(r.active_name().to_string());
        }
        assert_eq!(seen, vec!["Alice", "Bob", "Carol"]);

        r.advance();
        assert_eq!(r.active_name(), "Alice");
    }

    #[test]
    fn test_add_name_keeps_active_index() {
        let mut r = rotator(&["Alice", "Bob"], 1);
        r.add_name("Carol");
        assert_eq!(r.count(), 3);
        assert_eq!(r.active_name(), "Bob");
    }

    #[test]
    fn test_remove_last_remaining_name_fails_for_any_index() {
        let mut r = NameRotator::new("Only");
        for idx in [0, 1, 5, usize::MAX] {
            let err = r.remove_name(idx).unwrap_err();
            assert!(matches!(err, AppError::InvalidOperation(_)));
        }
        assert_eq!(r.names(), ["Only"]);
    }

    #[test]
    fn test_remove_out_of_range_fails() {
        let mut r = rotator(&["Alice", "Bob"], 0);
        assert!(matches!(
            r.remove_name(2),
            Err(AppError::InvalidOperation(_))
        ));
        assert_eq!(r.count(), 2);
    }

    #[test]
    fn test_remove_before_active_shifts_index() {
        let mut r = rotator(&["Alice", "Bob", "Carol"], 2);
        assert_eq!(r.remove_name(0).unwrap(), "Alice");
        assert_eq!(r.current_index(), 1);
        assert_eq!(r.active_name(), "Carol");
    }

    #[test]
    fn test_remove_after_active_leaves_index() {
        let mut r = rotator(&["Alice", "Bob", "Carol"], 0);
        r.remove_name(2).unwrap();
        assert_eq!(r.current_index(), 0);
        assert_eq!(r.active_name(), "Alice");
    }

    #[test]
    fn test_remove_active_still_in_range_needs_no_adjustment() {
        let mut r = rotator(&["Alice", "Bob", "Carol"], 1);
        r.remove_name(1).unwrap();
        assert_eq!(r.current_index(), 1);
        assert_eq!(r.active_name(), "Carol");
    }

    #[test]
    fn test_remove_active_at_end_clamps_to_new_last() {
        let mut r = rotator(&["Alice", "Bob", "Carol"], 2);
        r.remove_name(2).unwrap();
        assert_eq!(r.current_index(), 1);
        assert_eq!(r.active_name(), "Bob");
    }

    #[test]
    fn test_remove_never_leaves_index_out_of_range() {
        for len in 2..6usize {
            for current in 0..len {
                for idx in 0..len {
                    let names: Vec<String> = (0..len).map(|i| format!("n{}", i)).collect();
                    let mut r = NameRotator::from_parts(names, current).unwrap();
                    r.remove_name(idx).unwrap();
                    assert!(
                        r.current_index() < r.count(),
                        "len={} current={} idx={}",
                        len,
                        current,
                        idx
                    );
                }
            }
        }
    }
}
