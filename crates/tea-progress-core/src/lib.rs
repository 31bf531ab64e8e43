//! # TEA Progress Core Library
//!
//! Core logic for an adaptive learning engine for children on the autism
//! spectrum. Every operation is available through the standalone
//! `tea-progress` CLI, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Tracker**: per-category difficulty targeting from recent attempts
//! - **Scoring**: explainable multi-term ranking of catalog activities
//! - **Planner**: first-fit packing of ranked activities into a session
//! - **Progression**: forward-only lifetime tier gate and daily streak
//! - **Achievements**: medal catalog and unlock evaluation
//! - **Storage**: SQLite store for the catalog, attempt log and aggregates,
//!   plus TOML configuration
//!
//! The algorithm modules are pure and take an explicit `now`; the
//! [`ProgressionEngine`] loads state from the [`Database`], runs them and
//! writes results back inside a single transaction.

pub mod achievements;
pub mod activity;
pub mod catalog;
pub mod child;
pub mod engine;
pub mod error;
pub mod planner;
pub mod progression;
pub mod scoring;
pub mod storage;
pub mod tier;
pub mod tracker;

pub use achievements::{Medal, MedalKey, MedalKind};
pub use activity::{
    Activity, ActivityContent, ActivityId, Attempt, AttemptQuery, Category, ChildId, NewActivity,
    NewAttempt,
};
pub use catalog::{default_catalog, seed_default_catalog};
pub use child::{CategoryProgress, Child, CompletionStage, OverallLevel};
pub use engine::{
    CategoryOverview, Completion, CompletionOutcome, ProgressOverview, ProgressionEngine,
    ProgressionStats, RankingEntry,
};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use planner::{PlanItem, PlannerConfig, SessionPlan, SessionPlanBuilder};
pub use scoring::{ActivityScorer, LearnerHistory, Rationale, Recommendation, ScoringWeights};
pub use storage::{Config, Database};
pub use tier::{Tier, TierCriteria, TIER_CRITERIA};
pub use tracker::{DifficultyTracker, Performance, TrackerConfig, Trend};
