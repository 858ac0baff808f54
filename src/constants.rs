// src/constants.rs

// --- Review State Defaults ---
pub const INITIAL_STABILITY: f64 = 1.0;
pub const INITIAL_DIFFICULTY: f64 = 5.0;
pub const INITIAL_SCHEDULED_DAYS: u32 = 1;

// --- Difficulty Drift ---
pub const DIFFICULTY_MIN: f64 = 1.0;
pub const DIFFICULTY_MAX: f64 = 10.0;
pub const DIFFICULTY_PIVOT: f64 = 5.0; // d' = d + (PIVOT - rating) * STEP
pub const DIFFICULTY_STEP: f64 = 0.1;

// --- Stability Multipliers ---
pub const STABILITY_MULTIPLIER_AGAIN: f64 = 0.36;
pub const STABILITY_MULTIPLIER_HARD: f64 = 0.54;
pub const STABILITY_MULTIPLIER_GOOD: f64 = 2.18;
pub const STABILITY_MULTIPLIER_EASY: f64 = 2.36;

// --- Intervals (days) ---
pub const INTERVAL_MIN: u32 = 1;
pub const INTERVAL_AGAIN: u32 = 1;
pub const INTERVAL_HARD: u32 = 1;
pub const INTERVAL_NEW_GOOD: u32 = 3;
pub const INTERVAL_NEW_EASY: u32 = 4;
pub const INTERVAL_STABILITY_FACTOR: f64 = 9.2; // days per unit of stability
pub const INTERVAL_EASY_BONUS: f64 = 1.3;

// --- Session Defaults ---
pub const DEFAULT_REVIEW_BATCH_SIZE: usize = 10;
pub const DEFAULT_NEW_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

// --- Experience ---
pub const XP_BASE: i64 = 10;
pub const XP_PER_DIFFICULTY: i64 = 5;
