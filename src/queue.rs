// src/queue.rs

use crate::models::{Exercise, ExerciseId, ReviewState};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Picks the states whose review time has arrived, most overdue first.
///
/// Ordering is total: `next_review` ascending, then exercise id, then user id,
/// so the same input always yields the same batch and an item that has been
/// overdue longest is never displaced by a more recent one.
pub fn select_due<'a>(
    states: &'a [ReviewState],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<&'a ReviewState> {
    if limit == 0 {
        return Vec::new();
    }

    let mut due: Vec<&ReviewState> = states.iter().filter(|s| s.is_due(now)).collect();
    due.sort_by(|a, b| {
        a.next_review
            .cmp(&b.next_review)
            .then_with(|| a.exercise_id.cmp(&b.exercise_id))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    due.truncate(limit);
    due
}

/// Catalog items the user has no review state for, in catalog order.
///
/// Filters and truncates only. An identifier repeated in the catalog is
/// emitted once.
pub fn select_new<'a>(
    seen: &HashSet<ExerciseId>,
    catalog: &'a [Exercise],
    limit: usize,
) -> Vec<&'a Exercise> {
    let mut emitted: HashSet<&str> = HashSet::new();
    catalog
        .iter()
        .filter(|e| !seen.contains(&e.id))
        .filter(|e| emitted.insert(e.id.as_str()))
        .take(limit)
        .collect()
}
