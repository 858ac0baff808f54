// src/models.rs

use crate::constants::*;
use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type UserId = String;
pub type ExerciseId = String;

// --- Scheduler Inputs ---

/// How the learner performed on a single review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
#[repr(u8)]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

impl TryFrom<i64> for Rating {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(SchedulerError::InvalidRating(other)),
        }
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> i64 {
        rating.value() as i64
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse memory phase of a (user, exercise) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    New,
    Learning,
    Review,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::New => "new",
            LifecycleState::Learning => "learning",
            LifecycleState::Review => "review",
        }
    }
}

impl FromStr for LifecycleState {
    type Err = SchedulerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LifecycleState::New),
            "learning" => Ok(LifecycleState::Learning),
            "review" => Ok(LifecycleState::Review),
            other => Err(SchedulerError::InvalidLifecycle(other.to_string())),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Review State ---

/// Memory record for one (user, exercise) pair.
///
/// The scheduler never mutates a state in place: `scheduler::advance` takes a
/// snapshot and returns the successor. Persisting it is the caller's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub user_id: UserId,
    pub exercise_id: ExerciseId,
    pub stability: f64,
    pub difficulty: f64,
    pub elapsed_days: u32,
    pub scheduled_days: u32,
    pub reps: u32,
    pub lapses: u32,
    pub lifecycle_state: LifecycleState,
    pub last_review: Option<DateTime<Utc>>,
    pub next_review: Option<DateTime<Utc>>,
}

impl ReviewState {
    /// State for a pair that has never been answered.
    pub fn fresh(user_id: impl Into<UserId>, exercise_id: impl Into<ExerciseId>) -> Self {
        ReviewState {
            user_id: user_id.into(),
            exercise_id: exercise_id.into(),
            stability: INITIAL_STABILITY,
            difficulty: INITIAL_DIFFICULTY,
            elapsed_days: 0,
            scheduled_days: INITIAL_SCHEDULED_DAYS,
            reps: 0,
            lapses: 0,
            lifecycle_state: LifecycleState::New,
            last_review: None,
            next_review: None,
        }
    }

    /// A state without `next_review` has never been scheduled and is never due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review.is_some_and(|t| t <= now)
    }
}

/// A review state together with the storage version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReviewState {
    pub state: ReviewState,
    pub version: i64,
}

// --- Catalog ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: ExerciseId,
    pub lesson: String,
    pub position: i64,
    pub exercise_type: String,
    pub question: String,
    pub correct_answer: String,
    /// 1 (easiest) to 5.
    pub difficulty: i64,
    #[serde(default)]
    pub hints: Vec<String>,
}

// Used for seeding
#[derive(Deserialize)]
pub struct JsonLesson {
    pub title: String,
    pub exercises: Vec<JsonExercise>,
}

#[derive(Deserialize)]
pub struct JsonExercise {
    pub id: String,
    #[serde(default = "default_exercise_type")]
    pub exercise_type: String,
    pub question: String,
    pub correct_answer: String,
    #[serde(default = "default_exercise_difficulty")]
    pub difficulty: i64,
    #[serde(default)]
    pub hints: Vec<String>,
}

fn default_exercise_type() -> String {
    "translation".to_string()
}

fn default_exercise_difficulty() -> i64 {
    1
}

// --- Evaluation & Views ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub is_correct: bool,
    pub rating: Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueSource {
    Review,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseView {
    pub id: ExerciseId,
    pub lesson: String,
    pub exercise_type: String,
    pub question: String,
    pub difficulty: i64,
    pub hints: Vec<String>,
    pub source: QueueSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<LifecycleState>,
    /// Rounded to 2 decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review: Option<DateTime<Utc>>,
}

impl ExerciseView {
    pub fn new_item(exercise: &Exercise) -> Self {
        ExerciseView {
            id: exercise.id.clone(),
            lesson: exercise.lesson.clone(),
            exercise_type: exercise.exercise_type.clone(),
            question: exercise.question.clone(),
            difficulty: exercise.difficulty,
            hints: exercise.hints.clone(),
            source: QueueSource::New,
            lifecycle_state: None,
            stability: None,
            next_review: None,
        }
    }

    pub fn review_item(exercise: &Exercise, state: &ReviewState) -> Self {
        ExerciseView {
            source: QueueSource::Review,
            lifecycle_state: Some(state.lifecycle_state),
            stability: Some((state.stability * 100.0).round() / 100.0),
            next_review: state.next_review,
            ..ExerciseView::new_item(exercise)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySession {
    pub reviews: Vec<ExerciseView>,
    pub new: Vec<ExerciseView>,
}

impl StudySession {
    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty() && self.new.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub is_correct: bool,
    pub rating: Rating,
    pub xp_gained: i64,
    pub correct_answer: String,
    pub lifecycle_state: LifecycleState,
    pub scheduled_days: u32,
    pub next_review: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub xp: i64,
    pub tracked: i64,
    pub due: i64,
    pub lapses: i64,
}
