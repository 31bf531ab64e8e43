//! Child profile and per-category progress aggregates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityId, Category, ChildId};
use crate::error::ValidationError;
use crate::tier::Tier;

/// A child's lifetime progression state.
///
/// `current_tier` and `max_tier` only ever move forward; the lifetime
/// counters only ever grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub name: String,
    pub initial_tier: Tier,
    pub current_tier: Tier,
    pub max_tier: Tier,
    pub total_points: u32,
    pub activities_completed: u32,
    pub streak_days: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    /// Set once an educator has chosen the starting tier; it cannot be
    /// chosen again.
    #[serde(default)]
    pub initial_tier_configured: bool,
}

impl Child {
    /// Fresh profile at the bottom of the ladder.
    pub fn new(id: ChildId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            initial_tier: Tier::LOWEST,
            current_tier: Tier::LOWEST,
            max_tier: Tier::LOWEST,
            total_points: 0,
            activities_completed: 0,
            streak_days: 0,
            last_activity_at: None,
            created_at,
            active: true,
            initial_tier_configured: false,
        }
    }

    pub fn has_started(&self) -> bool {
        self.activities_completed > 0
    }
}

/// Coarse label derived from the share of a category's catalog completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStage {
    Inicial,
    Basico,
    Intermedio,
    Avanzado,
    Completo,
}

impl CompletionStage {
    pub fn from_percent(pct: f64) -> Self {
        if pct >= 100.0 {
            CompletionStage::Completo
        } else if pct >= 80.0 {
            CompletionStage::Avanzado
        } else if pct >= 60.0 {
            CompletionStage::Intermedio
        } else if pct >= 30.0 {
            CompletionStage::Basico
        } else {
            CompletionStage::Inicial
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompletionStage::Inicial => "inicial",
            CompletionStage::Basico => "basico",
            CompletionStage::Intermedio => "intermedio",
            CompletionStage::Avanzado => "avanzado",
            CompletionStage::Completo => "completo",
        }
    }
}

impl fmt::Display for CompletionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionStage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inicial" => Ok(CompletionStage::Inicial),
            "basico" => Ok(CompletionStage::Basico),
            "intermedio" => Ok(CompletionStage::Intermedio),
            "avanzado" => Ok(CompletionStage::Avanzado),
            "completo" => Ok(CompletionStage::Completo),
            other => Err(ValidationError::invalid_value("stage", format!("unknown stage '{other}'"))),
        }
    }
}

/// Overall label across all categories, from the mean completion percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallLevel {
    Inicial,
    Basico,
    Intermedio,
    Avanzado,
    Experto,
}

impl OverallLevel {
    pub fn from_mean_percent(mean: f64) -> Self {
        if mean >= 90.0 {
            OverallLevel::Experto
        } else if mean >= 70.0 {
            OverallLevel::Avanzado
        } else if mean >= 50.0 {
            OverallLevel::Intermedio
        } else if mean >= 20.0 {
            OverallLevel::Basico
        } else {
            OverallLevel::Inicial
        }
    }
}

/// Per (child, category) aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub child_id: ChildId,
    pub category: Category,
    /// Difficulty tier the tracker currently targets for this category.
    pub tier: Tier,
    pub stage: CompletionStage,
    /// Distinct activities completed successfully.
    pub completed_count: u32,
    /// Active catalog entries in the category.
    pub total_available: u32,
    pub points: u32,
    pub last_activity_id: Option<ActivityId>,
    pub last_activity_at: Option<DateTime<Utc>>,
    /// When the row was created or last reactivated; completions before it
    /// do not count toward `completed_count`.
    pub started_at: Option<DateTime<Utc>>,
    pub active: bool,
    /// When the row last moved up a rung; `None` while still on the tier it
    /// started on.
    #[serde(default)]
    pub tier_since: Option<DateTime<Utc>>,
}

impl CategoryProgress {
    pub fn new(child_id: ChildId, category: Category, tier: Tier, total_available: u32) -> Self {
        Self {
            child_id,
            category,
            tier,
            stage: CompletionStage::Inicial,
            completed_count: 0,
            total_available,
            points: 0,
            last_activity_id: None,
            last_activity_at: None,
            started_at: None,
            active: true,
            tier_since: None,
        }
    }

    /// Start over after a reset: counters cleared, row active again.
    pub fn restart(&mut self, tier: Tier, total_available: u32, now: DateTime<Utc>) {
        *self = Self {
            started_at: Some(now),
            ..Self::new(self.child_id, self.category, tier, total_available)
        };
    }

    /// Whether an attempt at `at` belongs to the row's current rung.
    ///
    /// Attempts before the row started, and the attempts that earned the
    /// last rung, do not count again.
    pub fn in_current_rung(&self, at: DateTime<Utc>) -> bool {
        self.started_at.map_or(true, |start| at >= start)
            && self.tier_since.map_or(true, |since| at > since)
    }

    /// Share of the category completed, 0 when the catalog is empty.
    pub fn completion_percent(&self) -> f64 {
        if self.total_available == 0 {
            return 0.0;
        }
        (self.completed_count as f64 / self.total_available as f64 * 100.0).min(100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.total_available > 0 && self.completed_count >= self.total_available
    }

    pub fn refresh_stage(&mut self) {
        self.stage = CompletionStage::from_percent(self.completion_percent());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_thresholds() {
        assert_eq!(CompletionStage::from_percent(0.0), CompletionStage::Inicial);
        assert_eq!(CompletionStage::from_percent(30.0), CompletionStage::Basico);
        assert_eq!(CompletionStage::from_percent(65.0), CompletionStage::Intermedio);
        assert_eq!(CompletionStage::from_percent(80.0), CompletionStage::Avanzado);
        assert_eq!(CompletionStage::from_percent(100.0), CompletionStage::Completo);
    }

    #[test]
    fn empty_category_is_never_complete() {
        let progress = CategoryProgress::new(1, Category::Colores, Tier::Inicial, 0);
        assert_eq!(progress.completion_percent(), 0.0);
        assert!(!progress.is_complete());
    }

    #[test]
    fn refresh_stage_tracks_percent() {
        let mut progress = CategoryProgress::new(1, Category::Animales, Tier::Inicial, 3);
        progress.completed_count = 3;
        progress.refresh_stage();
        assert_eq!(progress.stage, CompletionStage::Completo);
        assert!(progress.is_complete());
    }

    #[test]
    fn overall_level_from_mean() {
        assert_eq!(OverallLevel::from_mean_percent(10.0), OverallLevel::Inicial);
        assert_eq!(OverallLevel::from_mean_percent(55.0), OverallLevel::Intermedio);
        assert_eq!(OverallLevel::from_mean_percent(95.0), OverallLevel::Experto);
    }

    #[test]
    fn restart_clears_counters() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap();
        let mut progress = CategoryProgress::new(1, Category::Numeros, Tier::Basico2, 4);
        progress.completed_count = 4;
        progress.points = 80;
        progress.active = false;
        progress.refresh_stage();

        progress.restart(Tier::Inicial, 5, now);
        assert!(progress.active);
        assert_eq!(progress.completed_count, 0);
        assert_eq!(progress.points, 0);
        assert_eq!(progress.total_available, 5);
        assert_eq!(progress.stage, CompletionStage::Inicial);
        assert_eq!(progress.started_at, Some(now));
        assert_eq!(progress.tier_since, None);
    }

    #[test]
    fn current_rung_excludes_attempts_that_earned_it() {
        use chrono::{Duration, TimeZone};
        let start = Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap();
        let mut progress = CategoryProgress::new(1, Category::Lenguaje, Tier::Basico1, 11);
        progress.started_at = Some(start);
        assert!(progress.in_current_rung(start));
        assert!(!progress.in_current_rung(start - Duration::minutes(1)));

        let promoted = start + Duration::hours(1);
        progress.tier_since = Some(promoted);
        assert!(!progress.in_current_rung(promoted));
        assert!(progress.in_current_rung(promoted + Duration::seconds(1)));
    }
}
