//! Ondo evaluation engine.
//!
//! This crate runs team evaluation rounds and keeps every member's reputation
//! temperature up to date.
//!
//! # Modules
//!
//! - [`engine`] - The [`Engine`] facade and round administration
//! - [`submission`] - Score submission service
//! - [`closer`] - Auto-fill sweep over expired rounds
//! - [`view`] - Per-member read model of a round
//! - [`scheduler`] - Single-flight daily trigger for the sweep
//! - [`membership`] - Team membership provider seam
//!
//! # Flow
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │   submit()   │───▶│ score ledger │───▶│ reputation (CAS) │
//! └──────────────┘    └──────────────┘    └──────────────────┘
//!                            ▲                      ▲
//! ┌──────────────┐    ┌──────┴───────┐              │
//! │SweepScheduler│───▶│ auto-fill    │──────────────┘
//! └──────────────┘    │ closer       │
//!                     └──────────────┘
//! ```
//!
//! Everything is stored in one SQLite database; the only external
//! collaborator is the [`MembershipProvider`].

pub mod closer;
pub mod config;
pub mod db;
pub mod engine;
mod error;
pub mod membership;
pub mod reputation;
pub mod scheduler;
pub mod submission;
pub mod view;

#[cfg(test)]
mod test_support;

pub use closer::SweepReport;
pub use config::EngineConfig;
pub use db::Database;
pub use engine::{Engine, EngineSettings, EvaluatorScope};
pub use error::{Error, ErrorKind, Result};
pub use membership::{MembershipProvider, SqliteMembership, StaticMembership, TeamMember};
pub use reputation::ReputationAggregator;
pub use scheduler::{JobGuard, JobRegistry, ScheduleConfig, SweepScheduler, TriggerOutcome};
pub use submission::{SubmissionRequest, SubmissionResult};
pub use view::{ItemScoreView, MemberEvaluation, RoundView};
