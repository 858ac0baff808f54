// src/pedagogy.rs

use crate::config::StudyConfig;
use crate::constants::*;
use crate::error::{Result, SchedulerError};
use crate::evaluator::evaluate;
use crate::models::{
    Exercise, ExerciseId, ExerciseView, Rating, ReviewState, StudySession,
    SubmissionOutcome,
};
use crate::queue::{select_due, select_new};
use crate::repository;
use crate::scheduler::{advance, elapsed_days_at};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

// --- Public Interface ---

/// Single next item: a due review if any (memory protection), else a new one.
pub fn next_exercise(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<ExerciseView>> {
    debug!("Requesting next exercise for user {}...", user_id);

    if let Some(view) = due_reviews(conn, user_id, now, 1)?.into_iter().next() {
        info!("Serving Due Review: {} (user {})", view.id, user_id);
        return Ok(Some(view));
    }

    if let Some(view) = new_items(conn, user_id, 1)?.into_iter().next() {
        info!("Serving New Exercise: {} (user {})", view.id, user_id);
        return Ok(Some(view));
    }

    info!("Nothing to study for user {}.", user_id);
    Ok(None)
}

/// Due reviews and new items for one sitting, each bounded by the config.
pub fn build_session(
    conn: &Connection,
    config: &StudyConfig,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<StudySession> {
    let session = StudySession {
        reviews: due_reviews(conn, user_id, now, config.review_batch_size)?,
        new: new_items(conn, user_id, config.new_batch_size)?,
    };
    info!(
        "Session for user {}: {} reviews, {} new",
        user_id,
        session.reviews.len(),
        session.new.len()
    );
    Ok(session)
}

/// Grades a free-text answer and schedules the pair accordingly.
pub fn submit_answer(
    conn: &Connection,
    config: &StudyConfig,
    user_id: &str,
    exercise_id: &str,
    answer: &str,
    response_time_ms: Option<i64>,
    now: DateTime<Utc>,
) -> Result<SubmissionOutcome> {
    info!("Processing answer for exercise {} (user {})", exercise_id, user_id);

    let exercise = find_exercise(conn, exercise_id)?;
    let evaluation = evaluate(answer, &exercise.correct_answer);
    let xp_gained = experience_for(&exercise, evaluation.is_correct);
    debug!(
        "[Evaluator] Correct: {}, Rating: {}, XP: {}",
        evaluation.is_correct, evaluation.rating, xp_gained
    );

    let submission = Submission {
        answer: Some(answer),
        is_correct: evaluation.is_correct,
        response_time_ms,
        xp_gained,
    };
    let state = commit_with_retry(config, user_id, &exercise.id, || {
        commit_review(conn, user_id, &exercise, evaluation.rating, &submission, now)
    })?;

    Ok(SubmissionOutcome {
        is_correct: evaluation.is_correct,
        rating: evaluation.rating,
        xp_gained,
        correct_answer: exercise.correct_answer,
        lifecycle_state: state.lifecycle_state,
        scheduled_days: state.scheduled_days,
        next_review: state.next_review,
    })
}

/// Schedules a pair from an explicit self-assessment instead of a graded
/// answer. Nothing is logged to the answer history and no experience is awarded.
pub fn record_rating(
    conn: &Connection,
    config: &StudyConfig,
    user_id: &str,
    exercise_id: &str,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<ReviewState> {
    info!(
        "Recording self-assessed {} for exercise {} (user {})",
        rating, exercise_id, user_id
    );
    let exercise = find_exercise(conn, exercise_id)?;
    let submission = Submission {
        answer: None,
        is_correct: rating != Rating::Again,
        response_time_ms: None,
        xp_gained: 0,
    };
    commit_with_retry(config, user_id, &exercise.id, || {
        commit_review(conn, user_id, &exercise, rating, &submission, now)
    })
}

/// Experience for one answer: `10 + difficulty * 5` when correct, else 0.
pub fn experience_for(exercise: &Exercise, is_correct: bool) -> i64 {
    if is_correct {
        XP_BASE + exercise.difficulty * XP_PER_DIFFICULTY
    } else {
        0
    }
}

// --- Internal Logic ---

struct Submission<'a> {
    answer: Option<&'a str>,
    is_correct: bool,
    response_time_ms: Option<i64>,
    xp_gained: i64,
}

fn find_exercise(conn: &Connection, exercise_id: &str) -> Result<Exercise> {
    repository::get_exercise(conn, exercise_id)?
        .ok_or_else(|| SchedulerError::ExerciseNotFound(exercise_id.to_string()))
}

fn due_reviews(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<ExerciseView>> {
    let states = repository::get_review_states_for_user(conn, user_id)?;
    let due = select_due(&states, now, limit);
    if due.is_empty() {
        return Ok(Vec::new());
    }

    let catalog = repository::get_catalog(conn)?;
    let by_id: HashMap<&str, &Exercise> = catalog.iter().map(|e| (e.id.as_str(), e)).collect();

    let views = due
        .into_iter()
        .filter_map(|s| {
            let view = by_id
                .get(s.exercise_id.as_str())
                .map(|e| ExerciseView::review_item(e, s));
            if view.is_none() {
                warn!("Review state for unknown exercise {} skipped", s.exercise_id);
            }
            view
        })
        .collect();
    Ok(views)
}

fn new_items(conn: &Connection, user_id: &str, limit: usize) -> Result<Vec<ExerciseView>> {
    let seen: HashSet<ExerciseId> = repository::get_seen_exercise_ids(conn, user_id)?;
    let catalog = repository::get_catalog(conn)?;
    debug!("User {} has seen {} of {} exercises", user_id, seen.len(), catalog.len());

    Ok(select_new(&seen, &catalog, limit)
        .into_iter()
        .map(ExerciseView::new_item)
        .collect())
}

/// Runs `attempt` until it commits, re-running it on every lost version race
/// (each run re-reads the stored state); never merges.
fn commit_with_retry<F>(
    config: &StudyConfig,
    user_id: &str,
    exercise_id: &str,
    mut attempt: F,
) -> Result<ReviewState>
where
    F: FnMut() -> Result<ReviewState>,
{
    let mut tries: u32 = 0;
    loop {
        tries += 1;
        match attempt() {
            Err(SchedulerError::StaleSnapshot { .. }) if tries < config.max_commit_attempts => {
                warn!(
                    "Stale review state for ({}, {}), recomputing (attempt {}/{})",
                    user_id, exercise_id, tries, config.max_commit_attempts
                );
            }
            result => return result,
        }
    }
}

fn commit_review(
    conn: &Connection,
    user_id: &str,
    exercise: &Exercise,
    rating: Rating,
    submission: &Submission,
    now: DateTime<Utc>,
) -> Result<ReviewState> {
    let tx = conn.unchecked_transaction()?;
    repository::ensure_user(&tx, user_id)?;

    let (mut snapshot, version) = match repository::get_review_state(&tx, user_id, &exercise.id)? {
        Some(stored) => (stored.state, Some(stored.version)),
        None => (ReviewState::fresh(user_id, exercise.id.as_str()), None),
    };
    snapshot.elapsed_days = elapsed_days_at(&snapshot, now);

    debug!(
        "[FSRS Input] State: {}, Rating: {}, Elapsed: {}d, Reps: {}, Lapses: {}",
        snapshot.lifecycle_state, rating, snapshot.elapsed_days, snapshot.reps, snapshot.lapses
    );

    let next = advance(&snapshot, rating, now);
    repository::save_review_state(&tx, &next, version)?;

    if let Some(answer) = submission.answer {
        repository::log_answer(
            &tx,
            user_id,
            &exercise.id,
            answer,
            submission.is_correct,
            submission.response_time_ms,
            now.timestamp(),
        )?;
    }
    if submission.xp_gained > 0 {
        repository::add_experience(&tx, user_id, submission.xp_gained)?;
    }
    tx.commit()?;

    info!(
        "[FSRS Result] Exercise {}: {} -> {}, Stability {:.2} -> {:.2}, Difficulty {:.1} -> {:.1}, Interval {}d",
        exercise.id,
        snapshot.lifecycle_state,
        next.lifecycle_state,
        snapshot.stability,
        next.stability,
        snapshot.difficulty,
        next.difficulty,
        next.scheduled_days
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use crate::models::{LifecycleState, QueueSource};
    use chrono::{Duration, TimeZone};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 7, 0, 0).unwrap()
    }

    #[test]
    fn test_correct_answer_schedules_and_awards_xp() {
        let conn = setup();
        let config = StudyConfig::default();

        let outcome =
            submit_answer(&conn, &config, "ana", "greetings-how-are-you", " como você está? ", Some(3200), now())
                .unwrap();

        assert!(outcome.is_correct);
        assert_eq!(outcome.rating, Rating::Easy);
        // difficulty 2: 10 + 2 * 5
        assert_eq!(outcome.xp_gained, 20);
        assert_eq!(outcome.lifecycle_state, LifecycleState::Review);
        assert_eq!(outcome.scheduled_days, 4);
        assert_eq!(outcome.next_review, Some(now() + Duration::days(4)));

        let stats = repository::get_user_stats(&conn, "ana", now()).unwrap();
        assert_eq!(stats.xp, 20);
        assert_eq!(stats.tracked, 1);
    }

    #[test]
    fn test_wrong_answer_is_a_lapse_without_xp() {
        let conn = setup();
        let config = StudyConfig::default();

        let outcome = submit_answer(&conn, &config, "ana", "numbers-one", "dois", None, now()).unwrap();
        assert!(!outcome.is_correct);
        assert_eq!(outcome.rating, Rating::Again);
        assert_eq!(outcome.xp_gained, 0);
        assert_eq!(outcome.correct_answer, "um");

        let stored = repository::get_review_state(&conn, "ana", "numbers-one").unwrap().unwrap();
        assert_eq!(stored.state.lapses, 1);
        assert_eq!(stored.state.reps, 0);
        assert_eq!(stored.state.lifecycle_state, LifecycleState::Learning);

        let logged: i64 = conn
            .query_row("SELECT count(*) FROM answers WHERE user_id = 'ana' AND is_correct = 0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(logged, 1);
    }

    #[test]
    fn test_repeat_submission_advances_stored_state() {
        let conn = setup();
        let config = StudyConfig::default();

        submit_answer(&conn, &config, "ana", "numbers-two", "dois", None, now()).unwrap();
        let later = now() + Duration::days(4);
        let outcome = submit_answer(&conn, &config, "ana", "numbers-two", "dois", None, later).unwrap();

        // Review + Easy: floor(2.36 * 9.2 * 1.3) = 28
        assert_eq!(outcome.scheduled_days, 28);
        let stored = repository::get_review_state(&conn, "ana", "numbers-two").unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.state.reps, 2);
        assert_eq!(stored.state.elapsed_days, 0);
    }

    #[test]
    fn test_unknown_exercise() {
        let conn = setup();
        let err = submit_answer(&conn, &StudyConfig::default(), "ana", "nope", "x", None, now()).unwrap_err();
        assert!(matches!(err, SchedulerError::ExerciseNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_record_rating_reaches_good_and_hard() {
        let conn = setup();
        let config = StudyConfig::default();

        let state = record_rating(&conn, &config, "ana", "numbers-ten", Rating::Good, now()).unwrap();
        assert_eq!(state.lifecycle_state, LifecycleState::Learning);
        assert_eq!(state.scheduled_days, 3);

        let state = record_rating(&conn, &config, "ana", "numbers-ten", Rating::Hard, now()).unwrap();
        assert_eq!(state.lifecycle_state, LifecycleState::Learning);
        assert_eq!(state.scheduled_days, 1);

        let stats = repository::get_user_stats(&conn, "ana", now()).unwrap();
        assert_eq!(stats.xp, 0);
    }

    #[test]
    fn test_next_exercise_prefers_due_reviews() {
        let conn = setup();
        let config = StudyConfig::default();

        let first = next_exercise(&conn, "ana", now()).unwrap().unwrap();
        assert_eq!(first.id, "greetings-hello");
        assert_eq!(first.source, QueueSource::New);

        submit_answer(&conn, &config, "ana", "numbers-ten", "wrong", None, now()).unwrap();

        let tomorrow = now() + Duration::days(1);
        let next = next_exercise(&conn, "ana", tomorrow).unwrap().unwrap();
        assert_eq!(next.id, "numbers-ten");
        assert_eq!(next.source, QueueSource::Review);
        assert_eq!(next.lifecycle_state, Some(LifecycleState::Learning));
        // New + Again: 1.0 * 0.36
        assert_eq!(next.stability, Some(0.36));
        assert_eq!(next.hints, vec!["Half of twenty".to_string()]);
    }

    #[test]
    fn test_session_respects_batch_sizes() {
        let conn = setup();
        let config = StudyConfig {
            review_batch_size: 2,
            new_batch_size: 3,
            ..StudyConfig::default()
        };

        for id in ["greetings-hello", "numbers-one", "numbers-two"] {
            submit_answer(&conn, &config, "ana", id, "?", None, now()).unwrap();
        }

        let session = build_session(&conn, &config, "ana", now() + Duration::days(2)).unwrap();
        assert_eq!(session.reviews.len(), 2);
        assert_eq!(session.new.len(), 3);
        assert!(session.new.iter().all(|v| v.source == QueueSource::New));
        assert!(!session.new.iter().any(|v| v.id == "greetings-hello"));
        assert_eq!(session.new[0].id, "greetings-good-morning");
    }

    #[test]
    fn test_empty_session_once_everything_is_scheduled_ahead() {
        let conn = setup();
        let config = StudyConfig::default();
        let catalog = repository::get_catalog(&conn).unwrap();
        for e in &catalog {
            submit_answer(&conn, &config, "ana", &e.id, &e.correct_answer, None, now()).unwrap();
        }

        let session = build_session(&conn, &config, "ana", now()).unwrap();
        assert!(session.is_empty());
        assert!(next_exercise(&conn, "ana", now()).unwrap().is_none());
    }

    #[test]
    fn test_lost_race_recomputes_from_the_winning_state() {
        let conn = setup();
        let config = StudyConfig::default();
        let exercise = repository::get_exercise(&conn, "numbers-three").unwrap().unwrap();
        let silent = Submission {
            answer: None,
            is_correct: true,
            response_time_ms: None,
            xp_gained: 0,
        };

        // New + Easy: reps 1, lapses 0, version 0.
        record_rating(&conn, &config, "ana", "numbers-three", Rating::Easy, now()).unwrap();
        let snapshot = repository::get_review_state(&conn, "ana", "numbers-three").unwrap().unwrap();

        let later = now() + Duration::days(4);
        let mut runs = 0;
        let state = commit_with_retry(&config, "ana", "numbers-three", || {
            runs += 1;
            if runs == 1 {
                // Another writer fails the item first and wins the version.
                commit_review(&conn, "ana", &exercise, Rating::Again, &silent, later)?;
                let ours = advance(&snapshot.state, Rating::Easy, later);
                return repository::save_review_state(&conn, &ours, Some(snapshot.version)).map(|_| ours);
            }
            commit_review(&conn, "ana", &exercise, Rating::Easy, &silent, later)
        })
        .unwrap();

        assert_eq!(runs, 2);
        // Easy on top of the winner's lapse, not on top of the stale snapshot
        // (which would give reps 2, lapses 0).
        assert_eq!(state.reps, 1);
        assert_eq!(state.lapses, 1);
        assert_eq!(state.lifecycle_state, LifecycleState::Review);
        // floor(2.36 * 0.36 * 9.2 * 1.3) = 10
        assert_eq!(state.scheduled_days, 10);

        let stored = repository::get_review_state(&conn, "ana", "numbers-three").unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.state, state);
    }

    #[test]
    fn test_retry_budget_exhaustion_surfaces_stale_snapshot() {
        let config = StudyConfig {
            max_commit_attempts: 2,
            ..StudyConfig::default()
        };

        let mut runs = 0;
        let err = commit_with_retry(&config, "ana", "numbers-one", || {
            runs += 1;
            Err(SchedulerError::StaleSnapshot {
                user_id: "ana".to_string(),
                exercise_id: "numbers-one".to_string(),
            })
        })
        .unwrap_err();

        assert_eq!(runs, 2);
        assert!(matches!(err, SchedulerError::StaleSnapshot { exercise_id, .. } if exercise_id == "numbers-one"));
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let mut runs = 0;
        let err = commit_with_retry(&StudyConfig::default(), "ana", "nope", || {
            runs += 1;
            Err(SchedulerError::ExerciseNotFound("nope".to_string()))
        })
        .unwrap_err();

        assert_eq!(runs, 1);
        assert!(matches!(err, SchedulerError::ExerciseNotFound(_)));
    }

    #[test]
    fn test_experience_formula() {
        let conn = setup();
        let hard = repository::get_exercise(&conn, "numbers-ten").unwrap().unwrap();
        assert_eq!(experience_for(&hard, true), 20);
        assert_eq!(experience_for(&hard, false), 0);
    }
}
