// src/error.rs

/// Errors surfaced by the scheduler and the storage glue around it.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A rating outside Again(1)..=Easy(4). Rejected, never clamped.
    #[error("invalid rating: {0} (expected 1-4)")]
    InvalidRating(i64),

    /// Persisted lifecycle text that is not `new`, `learning` or `review`.
    #[error("invalid lifecycle state: {0:?}")]
    InvalidLifecycle(String),

    /// The stored review state changed between read and commit.
    /// The advance must be recomputed from a fresh read, not merged.
    #[error("stale review state for user {user_id}, exercise {exercise_id}")]
    StaleSnapshot {
        user_id: String,
        exercise_id: String,
    },

    #[error("exercise not found: {0}")]
    ExerciseNotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
