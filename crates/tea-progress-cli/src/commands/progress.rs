//! Progression, medal and overview commands for CLI.

use clap::Subcommand;
use tea_progress_core::{Category, Tier};

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Lifetime tier, counters and next-tier requirements
    Stats {
        /// Child ID
        child: i64,
    },
    /// Set the starting tier (only before the first completion)
    SetTier {
        /// Child ID
        child: i64,
        /// Tier key, e.g. basico_2
        tier: Tier,
    },
    /// Unlocked medals, newest first
    Medals {
        /// Child ID
        child: i64,
    },
    /// Per-category progress
    Overview {
        /// Child ID
        child: i64,
    },
    /// Children ordered by highest tier reached
    Ranking {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Start a category over
    Reset {
        /// Child ID
        child: i64,
        /// Category to reset
        category: Category,
    },
}

pub fn run(action: ProgressAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;

    match action {
        ProgressAction::Stats { child } => {
            print_json(&engine.get_progression_stats(child)?)?;
        }
        ProgressAction::SetTier { child, tier } => {
            engine.configure_initial_tier(child, tier)?;
            println!("initial tier set to {tier}");
        }
        ProgressAction::Medals { child } => {
            print_json(&engine.list_medals(child)?)?;
        }
        ProgressAction::Overview { child } => {
            print_json(&engine.category_overview(child)?)?;
        }
        ProgressAction::Ranking { limit } => {
            print_json(&engine.tier_ranking(limit)?)?;
        }
        ProgressAction::Reset { child, category } => {
            if engine.reset_category(child, category)? {
                println!("{category} progress reset");
            } else {
                println!("no active progress in {category}");
            }
        }
    }
    Ok(())
}
