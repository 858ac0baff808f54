// src/repository.rs

use crate::error::{Result, SchedulerError};
use crate::models::{Exercise, ExerciseId, LifecycleState, ReviewState, StoredReviewState, UserStats};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

const REVIEW_STATE_COLUMNS: &str = "user_id, exercise_id, stability, difficulty, elapsed_days, scheduled_days, reps, lapses, state, last_review_ts, next_review_ts, version";

fn ts_to_datetime(idx: usize, ts: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match ts {
        None => Ok(None),
        Some(secs) => DateTime::<Utc>::from_timestamp(secs, 0).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Integer,
                format!("timestamp out of range: {secs}").into(),
            )
        }),
    }
}

fn row_to_stored_state(row: &Row) -> rusqlite::Result<StoredReviewState> {
    let state_text: String = row.get(8)?;
    let lifecycle_state = state_text
        .parse::<LifecycleState>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(StoredReviewState {
        state: ReviewState {
            user_id: row.get(0)?,
            exercise_id: row.get(1)?,
            stability: row.get(2)?,
            difficulty: row.get(3)?,
            elapsed_days: row.get(4)?,
            scheduled_days: row.get(5)?,
            reps: row.get(6)?,
            lapses: row.get(7)?,
            lifecycle_state,
            last_review: ts_to_datetime(9, row.get(9)?)?,
            next_review: ts_to_datetime(10, row.get(10)?)?,
        },
        version: row.get(11)?,
    })
}

fn row_to_exercise(row: &Row) -> rusqlite::Result<Exercise> {
    let hints_text: String = row.get(7)?;
    let hints: Vec<String> = serde_json::from_str(&hints_text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Exercise {
        id: row.get(0)?,
        lesson: row.get(1)?,
        position: row.get(2)?,
        exercise_type: row.get(3)?,
        question: row.get(4)?,
        correct_answer: row.get(5)?,
        difficulty: row.get(6)?,
        hints,
    })
}

// --- Catalog ---

pub fn get_exercise(conn: &Connection, exercise_id: &str) -> rusqlite::Result<Option<Exercise>> {
    conn.query_row(
        "SELECT id, lesson, position, exercise_type, question, correct_answer, difficulty, hints
         FROM exercises WHERE id = ?",
        [exercise_id],
        row_to_exercise,
    )
    .optional()
}

/// Full catalog in introduction order.
pub fn get_catalog(conn: &Connection) -> rusqlite::Result<Vec<Exercise>> {
    let mut stmt = conn.prepare(
        "SELECT id, lesson, position, exercise_type, question, correct_answer, difficulty, hints
         FROM exercises ORDER BY position ASC, id ASC",
    )?;
    let rows = stmt.query_map([], row_to_exercise)?;
    rows.collect()
}

// --- Users ---

pub fn ensure_user(conn: &Connection, user_id: &str) -> rusqlite::Result<()> {
    conn.execute("INSERT OR IGNORE INTO users (id) VALUES (?)", [user_id])?;
    Ok(())
}

pub fn add_experience(conn: &Connection, user_id: &str, xp: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET xp = xp + ? WHERE id = ?",
        params![xp, user_id],
    )?;
    Ok(())
}

pub fn get_user_stats(conn: &Connection, user_id: &str, now: DateTime<Utc>) -> rusqlite::Result<UserStats> {
    let xp: i64 = conn
        .query_row("SELECT xp FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?
        .unwrap_or(0);

    let (tracked, due, lapses): (i64, i64, i64) = conn.query_row(
        "SELECT count(*),
                coalesce(sum(CASE WHEN next_review_ts <= ?2 THEN 1 ELSE 0 END), 0),
                coalesce(sum(lapses), 0)
         FROM review_state WHERE user_id = ?1",
        params![user_id, now.timestamp()],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;

    Ok(UserStats {
        user_id: user_id.to_string(),
        xp,
        tracked,
        due,
        lapses,
    })
}

// --- Review State ---

pub fn get_review_state(
    conn: &Connection,
    user_id: &str,
    exercise_id: &str,
) -> rusqlite::Result<Option<StoredReviewState>> {
    let sql = format!(
        "SELECT {} FROM review_state WHERE user_id = ? AND exercise_id = ?",
        REVIEW_STATE_COLUMNS
    );
    conn.query_row(&sql, [user_id, exercise_id], row_to_stored_state)
        .optional()
}

pub fn get_review_states_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<ReviewState>> {
    let sql = format!(
        "SELECT {} FROM review_state WHERE user_id = ?",
        REVIEW_STATE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([user_id], |row| row_to_stored_state(row).map(|s| s.state))?;
    rows.collect()
}

pub fn get_seen_exercise_ids(conn: &Connection, user_id: &str) -> rusqlite::Result<HashSet<ExerciseId>> {
    let mut stmt = conn.prepare("SELECT exercise_id FROM review_state WHERE user_id = ?")?;
    let rows = stmt.query_map([user_id], |row| row.get(0))?;
    rows.collect()
}

/// Commits `state` if the stored row is still at `expected_version`
/// (`None`: no row exists yet). Returns the new version.
///
/// Losing the race yields `StaleSnapshot`; the caller must re-read and
/// recompute rather than retry this write.
pub fn save_review_state(
    conn: &Connection,
    state: &ReviewState,
    expected_version: Option<i64>,
) -> Result<i64> {
    let last_ts = state.last_review.map(|t| t.timestamp());
    let next_ts = state.next_review.map(|t| t.timestamp());

    let (changed, version) = match expected_version {
        None => {
            let changed = conn.execute(
                "INSERT INTO review_state (user_id, exercise_id, stability, difficulty, elapsed_days, scheduled_days, reps, lapses, state, last_review_ts, next_review_ts, version)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
                 ON CONFLICT(user_id, exercise_id) DO NOTHING",
                params![
                    state.user_id,
                    state.exercise_id,
                    state.stability,
                    state.difficulty,
                    state.elapsed_days,
                    state.scheduled_days,
                    state.reps,
                    state.lapses,
                    state.lifecycle_state.as_str(),
                    last_ts,
                    next_ts
                ],
            )?;
            (changed, 0)
        }
        Some(expected) => {
            let changed = conn.execute(
                "UPDATE review_state SET
                    stability = ?, difficulty = ?, elapsed_days = ?, scheduled_days = ?,
                    reps = ?, lapses = ?, state = ?, last_review_ts = ?, next_review_ts = ?,
                    version = version + 1
                 WHERE user_id = ? AND exercise_id = ? AND version = ?",
                params![
                    state.stability,
                    state.difficulty,
                    state.elapsed_days,
                    state.scheduled_days,
                    state.reps,
                    state.lapses,
                    state.lifecycle_state.as_str(),
                    last_ts,
                    next_ts,
                    state.user_id,
                    state.exercise_id,
                    expected
                ],
            )?;
            (changed, expected + 1)
        }
    };

    if changed == 0 {
        debug!(
            "[DB] Version conflict on ({}, {}), expected {:?}",
            state.user_id, state.exercise_id, expected_version
        );
        return Err(SchedulerError::StaleSnapshot {
            user_id: state.user_id.clone(),
            exercise_id: state.exercise_id.clone(),
        });
    }

    Ok(version)
}

/// Records a raw answer submission.
pub fn log_answer(
    conn: &Connection,
    user_id: &str,
    exercise_id: &str,
    answer: &str,
    is_correct: bool,
    response_time_ms: Option<i64>,
    timestamp: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO answers (user_id, exercise_id, answer, is_correct, response_time_ms, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
        params![user_id, exercise_id, answer, is_correct, response_time_ms, timestamp],
    )?;
    Ok(())
}
