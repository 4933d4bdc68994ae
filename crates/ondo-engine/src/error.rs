//! Error types for the evaluation engine.

use ondo_core::{ItemId, RoundId, TeamId, UserId};
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`] for callers deciding how to respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: out-of-range score, unknown or repeated item.
    Validation,
    /// The request conflicts with round or ledger state.
    State,
    /// An unknown round.
    NotFound,
    /// Reputation update retries were exhausted.
    Concurrency,
    /// Storage, configuration or collaborator failure.
    Internal,
}

/// Errors that can occur in the evaluation engine.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Domain rule violation from the core crate.
    #[error(transparent)]
    Core(#[from] ondo_core::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background task panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(String),

    /// The team membership provider failed.
    #[error("membership lookup failed: {0}")]
    Membership(String),

    #[error("round {0} not found")]
    RoundNotFound(RoundId),

    /// The round is closed or canceled.
    #[error("round {0} is not open")]
    RoundClosed(RoundId),

    #[error("members cannot evaluate themselves")]
    SelfEvaluationNotAllowed,

    /// The evaluator (or viewer) is not a member of the round's team.
    #[error("user {user_id} is not a member of team {team_id}")]
    Forbidden { user_id: UserId, team_id: TeamId },

    #[error("target {user_id} is not a member of team {team_id}")]
    TargetNotMember { user_id: UserId, team_id: TeamId },

    /// One submission per (round, evaluator, target); re-submission is not merged.
    #[error("user {evaluator} already evaluated user {target} in round {round_id}")]
    AlreadySubmitted {
        round_id: RoundId,
        evaluator: UserId,
        target: UserId,
    },

    #[error("unknown evaluation item {0}")]
    UnknownItem(ItemId),

    #[error("evaluation item {0} scored more than once")]
    DuplicateItem(ItemId),

    #[error("score {value} for item {item_id} is outside [{min}, {max}]")]
    ScoreOutOfRange {
        item_id: ItemId,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("round window is empty: opens at {opened_at}, closes at {closes_at}")]
    InvalidRoundWindow { opened_at: i64, closes_at: i64 },

    /// Every compare-and-swap attempt on the reputation row lost a race.
    #[error("reputation update for user {user_id} gave up after {attempts} attempts")]
    ConcurrencyExhausted { user_id: UserId, attempts: u32 },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownItem(_)
            | Self::DuplicateItem(_)
            | Self::ScoreOutOfRange { .. }
            | Self::InvalidRoundWindow { .. } => ErrorKind::Validation,
            Self::RoundClosed(_)
            | Self::SelfEvaluationNotAllowed
            | Self::Forbidden { .. }
            | Self::TargetNotMember { .. }
            | Self::AlreadySubmitted { .. }
            | Self::Core(ondo_core::Error::InvalidTransition { .. }) => ErrorKind::State,
            Self::RoundNotFound(_) => ErrorKind::NotFound,
            Self::ConcurrencyExhausted { .. } => ErrorKind::Concurrency,
            Self::Database(_)
            | Self::Io(_)
            | Self::Core(_)
            | Self::Config(_)
            | Self::Task(_)
            | Self::Membership(_) => ErrorKind::Internal,
        }
    }

    /// Stable snake_case label, used as the `reason` metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Core(_) => "domain",
            Self::Config(_) => "config",
            Self::Task(_) => "task",
            Self::Membership(_) => "membership",
            Self::RoundNotFound(_) => "round_not_found",
            Self::RoundClosed(_) => "round_closed",
            Self::SelfEvaluationNotAllowed => "self_evaluation",
            Self::Forbidden { .. } => "forbidden",
            Self::TargetNotMember { .. } => "target_not_member",
            Self::AlreadySubmitted { .. } => "already_submitted",
            Self::UnknownItem(_) => "unknown_item",
            Self::DuplicateItem(_) => "duplicate_item",
            Self::ScoreOutOfRange { .. } => "score_out_of_range",
            Self::InvalidRoundWindow { .. } => "invalid_round_window",
            Self::ConcurrencyExhausted { .. } => "concurrency_exhausted",
        }
    }
}
