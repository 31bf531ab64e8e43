//! Recommendation, planning and completion commands for CLI.

use clap::Subcommand;
use tea_progress_core::{Category, Completion};

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Rank activities for a child
    Recommend {
        /// Child ID
        child: i64,
        /// Only this category
        #[arg(long)]
        category: Option<Category>,
        /// Maximum number of activities (default from config)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Build a time-boxed session plan
    Plan {
        /// Child ID
        child: i64,
        /// Session length in minutes (default from config)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Record a finished activity
    Complete {
        /// Child ID
        child: i64,
        /// Activity ID
        activity: i64,
        /// Points earned
        #[arg(long, default_value = "0")]
        points: u32,
        /// Seconds spent on the activity
        #[arg(long, default_value = "60")]
        secs: u32,
        /// Mark the attempt as not completed successfully
        #[arg(long)]
        failed: bool,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;

    match action {
        SessionAction::Recommend {
            child,
            category,
            limit,
        } => {
            let limit = limit.unwrap_or(engine.config().planner.default_limit);
            let recs = engine.recommend_activities(child, category, limit)?;
            print_json(&recs)?;
        }
        SessionAction::Plan { child, minutes } => {
            let minutes = minutes.unwrap_or(engine.config().planner.default_duration_minutes);
            let plan = engine.build_session_plan(child, minutes)?;
            print_json(&plan)?;
        }
        SessionAction::Complete {
            child,
            activity,
            points,
            secs,
            failed,
        } => {
            let outcome = engine.record_completion(&Completion {
                child_id: child,
                activity_id: activity,
                points,
                success: !failed,
                time_spent_secs: secs,
            })?;
            print_json(&outcome)?;
        }
    }
    Ok(())
}
