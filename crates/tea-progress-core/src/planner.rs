//! Session plan builder.
//!
//! Packs ranked activities into a time-boxed session:
//! - Walks the categories present in the catalog, in catalog order
//! - Takes the top-N recommendations of each category
//! - Appends an activity only while the running total stays within the target
//! - Leaves a category at its first activity that does not fit
//! - Stops as soon as the target is reached
//!
//! This is first-fit greedy packing; it is deterministic for a given ranking
//! but not optimal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activity::{Activity, ActivityId, Category};
use crate::error::ValidationError;
use crate::scoring::{ActivityScorer, LearnerHistory, Rationale};
use crate::tier::Tier;

/// Planner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Session length used when the caller gives none (minutes)
    #[serde(default = "default_duration")]
    pub default_duration_minutes: u32,
    /// Recommendations considered per category
    #[serde(default = "default_per_category")]
    pub activities_per_category: usize,
    /// Longest session accepted (minutes)
    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: u32,
    /// Recommendation list length when the caller gives none
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

fn default_duration() -> u32 {
    15
}
fn default_per_category() -> usize {
    2
}
fn default_max_duration() -> u32 {
    240
}
fn default_limit() -> usize {
    5
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_duration_minutes: default_duration(),
            activities_per_category: default_per_category(),
            max_duration_minutes: default_max_duration(),
            default_limit: default_limit(),
        }
    }
}

/// One entry of a session plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    /// 1-based position in the session
    pub order: usize,
    pub activity_id: ActivityId,
    pub title: String,
    pub category: Category,
    pub estimated_minutes: u32,
    pub target_tier: Tier,
    pub score: f64,
    pub rationale: Rationale,
}

/// Ephemeral plan; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub items: Vec<PlanItem>,
    pub total_time: u32,
    pub count: usize,
    pub target_minutes: u32,
    pub generated_at: DateTime<Utc>,
}

pub struct SessionPlanBuilder<'a> {
    config: &'a PlannerConfig,
}

impl<'a> SessionPlanBuilder<'a> {
    pub fn new(config: &'a PlannerConfig) -> Self {
        Self { config }
    }

    /// Reject durations the planner will not pack.
    pub fn validate_duration(&self, duration_minutes: u32) -> Result<(), ValidationError> {
        if duration_minutes > self.config.max_duration_minutes {
            return Err(ValidationError::invalid_value(
                "duration_minutes",
                format!(
                    "{duration_minutes} exceeds the maximum session of {} minutes",
                    self.config.max_duration_minutes
                ),
            ));
        }
        Ok(())
    }

    /// Build a plan whose summed estimates never exceed `duration_minutes`.
    pub fn build(
        &self,
        scorer: &ActivityScorer<'_>,
        history: &LearnerHistory,
        catalog: &[Activity],
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<SessionPlan, ValidationError> {
        self.validate_duration(duration_minutes)?;

        let mut items = Vec::new();
        let mut total_time = 0u32;

        if duration_minutes > 0 {
            'categories: for category in categories_in_catalog_order(catalog) {
                let ranked = scorer.rank(
                    history,
                    catalog,
                    Some(category),
                    self.config.activities_per_category,
                    now,
                );

                for rec in ranked {
                    let minutes = rec.activity.estimated_minutes;
                    if total_time + minutes > duration_minutes {
                        debug!(
                            category = %category,
                            activity = rec.activity.id,
                            minutes,
                            total_time,
                            "activity does not fit; moving to next category"
                        );
                        break;
                    }
                    total_time += minutes;
                    items.push(PlanItem {
                        order: items.len() + 1,
                        activity_id: rec.activity.id,
                        title: rec.activity.title.clone(),
                        category,
                        estimated_minutes: minutes,
                        target_tier: rec.target_tier,
                        score: rec.score,
                        rationale: rec.rationale,
                    });
                }

                if total_time >= duration_minutes {
                    break 'categories;
                }
            }
        }

        Ok(SessionPlan {
            count: items.len(),
            items,
            total_time,
            target_minutes: duration_minutes,
            generated_at: now,
        })
    }
}

/// Distinct categories of the active catalog, first appearance first.
fn categories_in_catalog_order(catalog: &[Activity]) -> Vec<Category> {
    let mut seen = Vec::new();
    for activity in catalog.iter().filter(|a| a.active) {
        if !seen.contains(&activity.category) {
            seen.push(activity.category);
        }
    }
    seen
}
