// src/scheduler.rs

//! Review-state transition function.
//!
//! `advance` is pure: the result depends only on the snapshot, the rating and
//! `now`. Difficulty drifts by `(5 - rating) * 0.1` before any branching; the
//! rating then selects a lifecycle transition, an interval and a stability
//! multiplier. Intervals are always computed from the *prior* stability.

use crate::constants::*;
use crate::models::{ExerciseId, LifecycleState, Rating, ReviewState, UserId};
use chrono::{DateTime, TimeDelta, Utc};

/// Computes the successor of `state` after a review rated `rating` at `now`.
pub fn advance(state: &ReviewState, rating: Rating, now: DateTime<Utc>) -> ReviewState {
    let difficulty = next_difficulty(state.difficulty, rating);
    let prior = state.lifecycle_state;

    let (lifecycle_state, scheduled_days, multiplier) = match rating {
        Rating::Again => (
            LifecycleState::Learning,
            INTERVAL_AGAIN,
            STABILITY_MULTIPLIER_AGAIN,
        ),
        Rating::Hard => (
            LifecycleState::Learning,
            INTERVAL_HARD,
            STABILITY_MULTIPLIER_HARD,
        ),
        Rating::Good => match prior {
            LifecycleState::New => (
                LifecycleState::Learning,
                INTERVAL_NEW_GOOD,
                STABILITY_MULTIPLIER_GOOD,
            ),
            LifecycleState::Learning | LifecycleState::Review => (
                LifecycleState::Review,
                stability_interval(state.stability * INTERVAL_STABILITY_FACTOR),
                STABILITY_MULTIPLIER_GOOD,
            ),
        },
        Rating::Easy => match prior {
            LifecycleState::New => (
                LifecycleState::Review,
                INTERVAL_NEW_EASY,
                STABILITY_MULTIPLIER_EASY,
            ),
            LifecycleState::Learning | LifecycleState::Review => (
                LifecycleState::Review,
                stability_interval(
                    state.stability * INTERVAL_STABILITY_FACTOR * INTERVAL_EASY_BONUS,
                ),
                STABILITY_MULTIPLIER_EASY,
            ),
        },
    };

    let (reps, lapses) = match rating {
        Rating::Again => (0, state.lapses.saturating_add(1)),
        _ => (state.reps.saturating_add(1), state.lapses),
    };

    ReviewState {
        user_id: state.user_id.clone(),
        exercise_id: state.exercise_id.clone(),
        stability: state.stability * multiplier,
        difficulty,
        elapsed_days: 0,
        scheduled_days,
        reps,
        lapses,
        lifecycle_state,
        last_review: Some(now),
        next_review: Some(add_days(now, scheduled_days)),
    }
}

/// Advances an existing state, or a fresh one when the pair has none yet.
pub fn advance_or_init(
    state: Option<&ReviewState>,
    user_id: &str,
    exercise_id: &str,
    rating: Rating,
    now: DateTime<Utc>,
) -> ReviewState {
    match state {
        Some(existing) => advance(existing, rating, now),
        None => {
            let fresh = ReviewState::fresh(UserId::from(user_id), ExerciseId::from(exercise_id));
            advance(&fresh, rating, now)
        }
    }
}

/// Whole days from the last review to `now`; 0 if never reviewed or if
/// `now` precedes the last review.
pub fn elapsed_days_at(state: &ReviewState, now: DateTime<Utc>) -> u32 {
    match state.last_review {
        Some(last) => {
            let days = (now - last).num_days().max(0);
            u32::try_from(days).unwrap_or(u32::MAX)
        }
        None => 0,
    }
}

fn next_difficulty(difficulty: f64, rating: Rating) -> f64 {
    let drift = (DIFFICULTY_PIVOT - rating.value() as f64) * DIFFICULTY_STEP;
    (difficulty + drift).clamp(DIFFICULTY_MIN, DIFFICULTY_MAX)
}

// `as` saturates for out-of-range floats and maps NaN to 0.
fn stability_interval(raw_days: f64) -> u32 {
    (raw_days.floor() as u32).max(INTERVAL_MIN)
}

// Saturates at the last representable instant instead of overflowing.
fn add_days(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    TimeDelta::try_days(days as i64)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
