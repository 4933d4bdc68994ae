//! Core types and rules for the ondo peer-evaluation system.
//!
//! This crate provides:
//! - The evaluation data model (items, rounds, scores, reputation state)
//! - The round status state machine
//! - The default evaluation item catalog
//! - The damped online update rule for reputation temperature
//! - Prometheus metrics helpers
//! - Shared error types

pub mod catalog;
mod error;
pub mod metrics;
pub mod model;
pub mod temperature;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Temperature assigned to a user who has never been rated.
pub const DEFAULT_TEMPERATURE: f64 = 36.5;

/// Lower bound of the temperature scale.
pub const MIN_TEMPERATURE: f64 = 0.0;

/// Upper bound of the temperature scale.
pub const MAX_TEMPERATURE: f64 = 100.0;

/// Virtual prior weight that slows early reputation swings.
pub const DAMPING_CONSTANT: f64 = 10.0;

/// Multiplier from a mean item score (1-5 scale) to the 0-100 scale.
pub const SCORE_SCALE_FACTOR: f64 = 10.0;

/// Item value used for default submissions and auto-filled pairs.
pub const NEUTRAL_SCORE: i32 = 3;

pub use error::{Error, Result};
pub use model::{
    EvaluationItem, EvaluationRound, ItemId, ItemScore, ReputationState, RoundId, RoundStatus,
    Score, TeamId, UserId,
};
pub use temperature::{damping_alpha, mean_item_score, next_temperature};
