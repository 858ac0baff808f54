// src/evaluator.rs

use crate::models::{Evaluation, Rating};

/// Grades a free-text answer: case-insensitive, whitespace-trimmed exact match.
///
/// Only two ratings are produced. A correct answer drives the scheduler with
/// `Easy`, anything else with `Again`; `Hard` and `Good` are reachable only
/// through an explicit self-assessment passed straight to `scheduler::advance`.
pub fn evaluate(submitted: &str, canonical: &str) -> Evaluation {
    let is_correct = normalize(submitted) == normalize(canonical);
    Evaluation {
        is_correct,
        rating: if is_correct { Rating::Easy } else { Rating::Again },
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
