// src/database.rs

use crate::error::Result;
use crate::models::JsonLesson;
use log::{debug, info};
use rusqlite::{params, Connection};

const CATALOG_JSON: &str = include_str!("data/exercises.json");

pub fn init_db(conn: &Connection) -> Result<()> {
    debug!("init_db: Checking database schema...");

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS exercises (
            id TEXT PRIMARY KEY,
            lesson TEXT NOT NULL,
            position INTEGER NOT NULL,
            exercise_type TEXT NOT NULL,
            question TEXT NOT NULL,
            correct_answer TEXT NOT NULL,
            difficulty INTEGER NOT NULL DEFAULT 1 CHECK (difficulty BETWEEN 1 AND 5),
            hints TEXT NOT NULL DEFAULT '[]'
        );
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            xp INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS review_state (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            exercise_id TEXT NOT NULL REFERENCES exercises(id) ON DELETE CASCADE,
            stability REAL NOT NULL,
            difficulty REAL NOT NULL,
            elapsed_days INTEGER NOT NULL DEFAULT 0,
            scheduled_days INTEGER NOT NULL DEFAULT 1,
            reps INTEGER NOT NULL DEFAULT 0,
            lapses INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL CHECK (state IN ('new','learning','review')),
            last_review_ts INTEGER,
            next_review_ts INTEGER,
            version INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, exercise_id)
        );
        CREATE INDEX IF NOT EXISTS review_state_due
            ON review_state (user_id, next_review_ts);
        CREATE TABLE IF NOT EXISTS answers (
            id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            exercise_id TEXT NOT NULL REFERENCES exercises(id) ON DELETE CASCADE,
            answer TEXT NOT NULL,
            is_correct INTEGER NOT NULL,
            response_time_ms INTEGER,
            timestamp INTEGER NOT NULL
        );
        ",
    )?;

    let count: i64 = conn.query_row("SELECT count(*) FROM exercises", [], |row| row.get(0))?;
    if count == 0 {
        info!("init_db: Catalog empty. Seeding exercises...");
        seed_catalog(conn, CATALOG_JSON)?;
    }

    Ok(())
}

/// Loads a lesson-ordered JSON catalog. Positions follow file order across
/// lessons, which is the order new items are introduced in.
pub fn seed_catalog(conn: &Connection, json: &str) -> Result<usize> {
    let lessons: Vec<JsonLesson> = serde_json::from_str(json)?;

    // Upsert, not REPLACE: a REPLACE deletes the row and cascades into review_state.
    let mut stmt = conn.prepare(
        "INSERT INTO exercises (id, lesson, position, exercise_type, question, correct_answer, difficulty, hints)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            lesson = excluded.lesson,
            position = excluded.position,
            exercise_type = excluded.exercise_type,
            question = excluded.question,
            correct_answer = excluded.correct_answer,
            difficulty = excluded.difficulty,
            hints = excluded.hints",
    )?;

    let mut position: i64 = 0;
    for lesson in &lessons {
        for e in &lesson.exercises {
            position += 1;
            let hints = serde_json::to_string(&e.hints)?;
            stmt.execute(params![
                e.id,
                lesson.title,
                position,
                e.exercise_type,
                e.question,
                e.correct_answer,
                e.difficulty,
                hints
            ])?;
        }
    }

    info!(
        "Seeded {} exercises across {} lessons",
        position,
        lessons.len()
    );
    Ok(position as usize)
}
