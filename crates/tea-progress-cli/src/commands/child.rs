//! Child profile commands for CLI.

use clap::Subcommand;
use tea_progress_core::CoreError;

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum ChildAction {
    /// Register a new child
    Create {
        /// Display name
        name: String,
    },
    /// Show a child's profile
    Show {
        /// Child ID
        id: i64,
    },
    /// List children
    List {
        /// Include deactivated profiles
        #[arg(long)]
        all: bool,
    },
}

pub fn run(action: ChildAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;

    match action {
        ChildAction::Create { name } => {
            let child = engine.create_child(&name)?;
            print_json(&child)?;
        }
        ChildAction::Show { id } => {
            let child = engine
                .db()
                .get_child(id)?
                .ok_or_else(|| CoreError::child_not_found(id))?;
            print_json(&child)?;
        }
        ChildAction::List { all } => {
            let children = engine.db().list_children(!all)?;
            print_json(&children)?;
        }
    }
    Ok(())
}
