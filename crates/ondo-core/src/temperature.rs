//! Reputation temperature update rule.
//!
//! A single rating moves the target's temperature toward the observed value.
//! The size of the move shrinks as more distinct evaluators have weighed in:
//!
//! ```text
//! scaled = mean_item_score * 10
//! n      = prior_distinct_evaluators + 1
//! alpha  = 1 / (n + 10)
//! next   = current + alpha * (scaled - current)
//! ```
//!
//! The result is clamped to `[0, 100]` and rounded half-up to one decimal.

use crate::{DAMPING_CONSTANT, MAX_TEMPERATURE, MIN_TEMPERATURE, SCORE_SCALE_FACTOR};

/// Step weight for the `n`-th distinct evaluator (`n >= 1`).
pub fn damping_alpha(evaluator_count: u64) -> f64 {
    1.0 / (evaluator_count as f64 + DAMPING_CONSTANT)
}

/// Map a mean item score onto the 0-100 temperature scale.
pub fn scaled_rating(mean_item_score: f64) -> f64 {
    mean_item_score * SCORE_SCALE_FACTOR
}

/// Mean of a set of item values, `None` if empty.
pub fn mean_item_score(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    Some(sum as f64 / values.len() as f64)
}

/// Compute the temperature after applying one rating.
///
/// # Arguments
///
/// * `current` - The target's temperature before this rating
/// * `mean_item_score` - Mean of the item values in the rating
/// * `prior_evaluators` - Distinct evaluators who rated the target before this one
pub fn next_temperature(current: f64, mean_item_score: f64, prior_evaluators: u64) -> f64 {
    let n = prior_evaluators + 1;
    let alpha = damping_alpha(n);
    let raw = current + alpha * (scaled_rating(mean_item_score) - current);
    round_half_up(raw.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE))
}

/// Round to one decimal place, halves away from zero.
///
/// Only called on clamped (non-negative) values. The tenths value is snapped
/// to nine decimals first so that a decimal half stored as `x.4999...` still
/// rounds up.
fn round_half_up(value: f64) -> f64 {
    let tenths = value * 10.0;
    let tenths = (tenths * ROUNDING_SNAP).round() / ROUNDING_SNAP;
    (tenths + 0.5).floor() / 10.0
}

const ROUNDING_SNAP: f64 = 1e9;
