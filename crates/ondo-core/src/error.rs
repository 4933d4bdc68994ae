//! Error types for the ondo domain model.

use thiserror::Error;

use crate::model::RoundStatus;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the pure domain rules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A stored status string does not name a known round status.
    #[error("unknown round status '{0}'")]
    UnknownStatus(String),

    /// The round state machine does not allow this transition.
    #[error("invalid round transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: RoundStatus,
        /// Requested status.
        to: RoundStatus,
    },

    /// An evaluation item declares an empty or inverted range.
    #[error("invalid scale for item '{code}': [{min}, {max}]")]
    InvalidScale {
        /// Item code.
        code: String,
        /// Declared minimum.
        min: i32,
        /// Declared maximum.
        max: i32,
    },
}
