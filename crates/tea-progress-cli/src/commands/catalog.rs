//! Activity catalog commands for CLI.

use clap::Subcommand;
use tea_progress_core::{seed_default_catalog, Category, CoreError};

use super::{open_engine, print_json};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// Load the built-in activities into an empty catalog
    Seed,
    /// List activities
    List {
        /// Only this category (lenguaje, numeros, colores, animales)
        #[arg(long)]
        category: Option<Category>,
        /// Include retired activities
        #[arg(long)]
        all: bool,
    },
    /// Retire an activity so it is no longer recommended
    Retire {
        /// Activity ID
        id: i64,
    },
    /// Make a retired activity available again
    Restore {
        /// Activity ID
        id: i64,
    },
}

pub fn run(action: CatalogAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;

    match action {
        CatalogAction::Seed => {
            let inserted = seed_default_catalog(engine.db())?;
            if inserted == 0 {
                println!("catalog already populated");
            } else {
                println!("seeded {inserted} activities");
            }
        }
        CatalogAction::List { category, all } => {
            let activities = engine.db().list_activities(category, !all)?;
            print_json(&activities)?;
        }
        CatalogAction::Retire { id } => {
            if !engine.db().set_activity_active(id, false)? {
                return Err(CoreError::activity_not_found(id).into());
            }
            println!("activity {id} retired");
        }
        CatalogAction::Restore { id } => {
            if !engine.db().set_activity_active(id, true)? {
                return Err(CoreError::activity_not_found(id).into());
            }
            println!("activity {id} restored");
        }
    }
    Ok(())
}
