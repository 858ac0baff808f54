// src/lib.rs

//! Spaced-repetition scheduling for per-user exercise review.
//!
//! The pure core is [`scheduler::advance`] together with the selectors in
//! [`queue`] and the grader in [`evaluator`]. They take snapshots as plain
//! arguments and never touch storage. [`pedagogy`], [`repository`] and
//! [`database`] are the SQLite-backed caller that persists their results.

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod pedagogy;
pub mod queue;
pub mod repository;
pub mod scheduler;

pub use config::{ConfigOverrides, StudyConfig};
pub use error::{Result, SchedulerError};
pub use evaluator::evaluate;
pub use models::{
    Evaluation, Exercise, ExerciseId, ExerciseView, LifecycleState, QueueSource, Rating,
    ReviewState, StoredReviewState, StudySession, SubmissionOutcome, UserId, UserStats,
};
pub use queue::{select_due, select_new};
pub use scheduler::{advance, advance_or_init, elapsed_days_at};
