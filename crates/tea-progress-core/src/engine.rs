//! Caller-facing progression engine.
//!
//! Loads a child's history from the store, runs the pure algorithms and
//! writes results back. Every mutation runs inside one immediate
//! transaction so concurrent completions for the same child serialise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::achievements::{self, AchievementStats, Medal};
use crate::activity::{ActivityId, Attempt, AttemptQuery, Category, ChildId, NewAttempt};
use crate::child::{CategoryProgress, Child, CompletionStage, OverallLevel};
use crate::error::{CoreError, Result, ValidationError};
use crate::planner::{SessionPlan, SessionPlanBuilder};
use crate::progression::{self, GateOutcome};
use crate::scoring::{ActivityScorer, LearnerHistory, Recommendation};
use crate::storage::{Config, Database};
use crate::tier::{Tier, TierCriteria};
use crate::tracker::DifficultyTracker;

/// One finished (or abandoned) activity as reported by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub child_id: ChildId,
    pub activity_id: ActivityId,
    pub points: u32,
    /// Whether the child completed the activity successfully.
    pub success: bool,
    pub time_spent_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOutcome {
    pub attempt: Attempt,
    pub new_achievements: Vec<Medal>,
    pub tier_advanced: bool,
    pub new_tier: Option<Tier>,
    pub current_tier: Tier,
    pub streak_days: u32,
    /// Tier the attempt's category has reached.
    pub category_tier: Tier,
}

/// Lifetime progression summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionStats {
    pub child_id: ChildId,
    pub initial_tier: Tier,
    pub current_tier: Tier,
    pub max_tier: Tier,
    pub total_points: u32,
    pub activities_completed: u32,
    pub streak_days: u32,
    /// Percent of completed attempts that earned 70 % of the reward;
    /// `None` before any completion.
    pub success_rate: Option<f64>,
    pub next_tier: Option<Tier>,
    pub next_tier_requirements: Option<TierCriteria>,
    pub next_tier_progress_pct: f64,
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryOverview {
    pub category: Category,
    pub tier: Tier,
    pub stage: CompletionStage,
    pub completed_count: u32,
    pub total_available: u32,
    pub completion_pct: f64,
    pub points: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
    /// False when the child has no active progress in the category.
    pub started: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressOverview {
    pub child_id: ChildId,
    pub categories: Vec<CategoryOverview>,
    pub total_points: u32,
    pub activities_completed: u32,
    pub medals: usize,
    pub mean_completion_pct: f64,
    pub overall_level: OverallLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub position: usize,
    pub child_id: ChildId,
    pub name: String,
    pub max_tier: Tier,
    pub current_tier: Tier,
    pub total_points: u32,
    pub activities_completed: u32,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn validate_limit(limit: usize) -> Result<(), ValidationError> {
    if limit == 0 {
        return Err(ValidationError::invalid_value("limit", "must be at least 1"));
    }
    Ok(())
}

pub struct ProgressionEngine {
    db: Database,
    config: Config,
}

impl ProgressionEngine {
    pub fn new(db: Database, config: Config) -> Self {
        Self { db, config }
    }

    /// Open the store named by `config.database`.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open_with(&config.database)?;
        Ok(Self::new(db, config))
    }

    /// Engine over a fresh in-memory store with default configuration.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_memory()?, Config::default()))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn create_child(&self, name: &str) -> Result<Child> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::invalid_value("name", "must not be empty").into());
        }
        let child = self.db.create_child(name, Utc::now())?;
        info!(child = child.id, "child created");
        Ok(child)
    }

    fn history(&self, child: &Child) -> Result<LearnerHistory> {
        Ok(LearnerHistory {
            starting_tier: child.initial_tier,
            attempts: self.db.query_attempts(child.id, &AttemptQuery::all())?,
            progress: self.db.list_progress(child.id, false)?,
        })
    }

    // === Recommendations and plans ===

    /// Best-scoring activities for the child, optionally within one category.
    pub fn recommend_activities(
        &self,
        child_id: ChildId,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<Recommendation>> {
        self.recommend_activities_at(child_id, category, limit, Utc::now())
    }

    pub fn recommend_activities_at(
        &self,
        child_id: ChildId,
        category: Option<Category>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        validate_limit(limit)?;
        let child = self.db.require_child(child_id)?;
        let history = self.history(&child)?;
        let catalog = self.db.list_activities(category, true)?;

        let scorer = ActivityScorer::new(
            DifficultyTracker::new(&self.config.tracker),
            self.config.scoring,
        );
        let ranked = scorer.rank(&history, &catalog, category, limit, now);
        debug!(
            child = child_id,
            category = ?category,
            candidates = catalog.len(),
            returned = ranked.len(),
            "recommendations ranked"
        );
        Ok(ranked)
    }

    /// Time-boxed session of recommended activities.
    pub fn build_session_plan(&self, child_id: ChildId, duration_minutes: u32) -> Result<SessionPlan> {
        self.build_session_plan_at(child_id, duration_minutes, Utc::now())
    }

    pub fn build_session_plan_at(
        &self,
        child_id: ChildId,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<SessionPlan> {
        let builder = SessionPlanBuilder::new(&self.config.planner);
        builder.validate_duration(duration_minutes)?;

        let child = self.db.require_child(child_id)?;
        let history = self.history(&child)?;
        let catalog = self.db.list_activities(None, true)?;
        let scorer = ActivityScorer::new(
            DifficultyTracker::new(&self.config.tracker),
            self.config.scoring,
        );
        let plan = builder.build(&scorer, &history, &catalog, duration_minutes, now)?;
        debug!(
            child = child_id,
            items = plan.count,
            total_time = plan.total_time,
            target = duration_minutes,
            "session plan built"
        );
        Ok(plan)
    }

    // === Completions ===

    /// Record a completion and apply every consequence of it atomically.
    pub fn record_completion(&self, completion: &Completion) -> Result<CompletionOutcome> {
        self.record_completion_at(completion, Utc::now())
    }

    pub fn record_completion_at(
        &self,
        completion: &Completion,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        self.db.immediate(|db| {
            let mut child = db.require_child(completion.child_id)?;
            let activity = db
                .get_activity(completion.activity_id)?
                .ok_or_else(|| CoreError::activity_not_found(completion.activity_id))?;
            if !activity.active {
                warn!(activity = activity.id, "completion recorded for a retired activity");
            }

            let attempt = db.record_attempt(&NewAttempt {
                child_id: child.id,
                activity_id: activity.id,
                completed: completion.success,
                time_spent_secs: completion.time_spent_secs,
                points: completion.points,
                completed_at: now,
            })?;

            let progress = self.update_category(db, &child, &attempt, now)?;
            let gate = self.apply_gate(db, &mut child, completion.points, now)?;
            db.apply_child_completion(&child, completion.points)?;

            let new_achievements = self.unlock_medals(db, &child, &gate, now)?;

            Ok(CompletionOutcome {
                attempt,
                new_achievements,
                tier_advanced: gate.tier_advanced(),
                new_tier: gate.advanced_to,
                current_tier: child.current_tier,
                streak_days: gate.streak_days,
                category_tier: progress.tier,
            })
        })
    }

    /// Create, reactivate or update the category row; advance its tier on mastery.
    fn update_category(
        &self,
        db: &Database,
        child: &Child,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<CategoryProgress> {
        let category = attempt.category;
        let total_available = db.count_active_in_category(category)?;

        let mut progress = match db.get_progress(child.id, category)? {
            Some(p) if p.active => p,
            Some(mut p) => {
                info!(child = child.id, category = %category, "category progress reactivated");
                p.restart(child.initial_tier, total_available, now);
                p
            }
            None => {
                let mut p = CategoryProgress::new(child.id, category, child.initial_tier, total_available);
                p.started_at = Some(now);
                p
            }
        };

        progress.total_available = total_available;
        progress.points = progress.points.saturating_add(attempt.points);
        progress.last_activity_id = Some(attempt.activity_id);
        progress.last_activity_at = Some(now);
        progress.completed_count =
            db.distinct_completed_activities(child.id, category, progress.started_at)?;
        progress.refresh_stage();

        let tier_activities: Vec<ActivityId> = db
            .list_activities(Some(category), true)?
            .iter()
            .filter(|a| a.tier == progress.tier)
            .map(|a| a.id)
            .collect();
        let lookback = now - chrono::Duration::days(self.config.tracker.activity_lookback_days);
        let window = AttemptQuery::all()
            .category(category)
            .since(progress.started_at.map_or(lookback, |started| started.max(lookback)));
        let recent = db.query_attempts(child.id, &window)?;
        let tracker = DifficultyTracker::new(&self.config.tracker);
        let next = tracker.mastery_tier(progress.tier, &tier_activities, &recent, now);
        if next != progress.tier {
            info!(
                child = child.id,
                category = %category,
                from = %progress.tier,
                to = %next,
                "category tier mastered"
            );
            progress.tier = next;
            progress.tier_since = Some(now);
        }

        db.upsert_progress(&progress)?;
        Ok(progress)
    }

    fn apply_gate(
        &self,
        db: &Database,
        child: &mut Child,
        points: u32,
        now: DateTime<Utc>,
    ) -> Result<GateOutcome> {
        let child_id = child.id;
        let mut load_error = None;
        let outcome = progression::apply_completion(child, points, now, || {
            let loaded = db
                .query_attempts(child_id, &AttemptQuery::all())
                .and_then(|attempts| Ok((attempts, db.list_activities(None, false)?)));
            match loaded {
                Ok((attempts, catalog)) => progression::lifetime_success_rate(&attempts, &catalog),
                Err(e) => {
                    load_error = Some(e);
                    None
                }
            }
        });
        match load_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    fn unlock_medals(
        &self,
        db: &Database,
        child: &Child,
        gate: &GateOutcome,
        now: DateTime<Utc>,
    ) -> Result<Vec<Medal>> {
        let progress = db.list_progress(child.id, true)?;
        let stats = AchievementStats {
            activities_completed: child.activities_completed,
            total_points: child.total_points,
            streak_days: child.streak_days,
            // any attempt starts a category, successful or not
            started_categories: progress.iter().map(|p| p.category).collect(),
            completed_categories: progress
                .iter()
                .filter(|p| p.is_complete())
                .map(|p| p.category)
                .collect(),
            reached_tier: gate.advanced_to,
        };

        let held = db.unlocked_keys(child.id)?;
        let mut unlocked = Vec::new();
        for key in achievements::evaluate(&stats, &held) {
            if let Some(medal) = db.insert_medal(child.id, key, now)? {
                info!(child = child.id, medal = %medal.kind, category = ?medal.category, "medal unlocked");
                unlocked.push(medal);
            }
        }
        Ok(unlocked)
    }

    // === Progression ===

    pub fn get_progression_stats(&self, child_id: ChildId) -> Result<ProgressionStats> {
        let child = self.db.require_child(child_id)?;
        let success_rate = if child.has_started() {
            let attempts = self.db.query_attempts(child_id, &AttemptQuery::all())?;
            let catalog = self.db.list_activities(None, false)?;
            progression::lifetime_success_rate(&attempts, &catalog).map(round1)
        } else {
            None
        };
        let next_tier = child.current_tier.successor();

        Ok(ProgressionStats {
            child_id,
            initial_tier: child.initial_tier,
            current_tier: child.current_tier,
            max_tier: child.max_tier,
            total_points: child.total_points,
            activities_completed: child.activities_completed,
            streak_days: child.streak_days,
            success_rate,
            next_tier,
            next_tier_requirements: next_tier.map(|t| *t.criteria()),
            next_tier_progress_pct: progression::next_tier_progress(&child),
            last_activity_at: child.last_activity_at,
        })
    }

    /// Set the starting tier; allowed once, before the first completion.
    pub fn configure_initial_tier(&self, child_id: ChildId, tier: Tier) -> Result<()> {
        self.db.immediate(|db| {
            let mut child = db.require_child(child_id)?;
            progression::set_initial_tier(&mut child, tier)?;
            db.save_child_tiers(&child)?;
            info!(child = child_id, tier = %tier, "initial tier configured");
            Ok(())
        })
    }

    // === Overview, medals, ranking ===

    pub fn category_overview(&self, child_id: ChildId) -> Result<ProgressOverview> {
        let child = self.db.require_child(child_id)?;
        let rows = self.db.list_progress(child_id, true)?;

        let mut categories = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let total_available = self.db.count_active_in_category(category)?;
            let mut progress = rows
                .iter()
                .find(|p| p.category == category)
                .cloned()
                .unwrap_or_else(|| CategoryProgress::new(child_id, category, child.initial_tier, total_available));
            let started = progress.started_at.is_some() && progress.active;
            progress.total_available = total_available;
            progress.refresh_stage();
            categories.push(CategoryOverview {
                category,
                tier: progress.tier,
                stage: progress.stage,
                completed_count: progress.completed_count,
                total_available,
                completion_pct: round1(progress.completion_percent()),
                points: progress.points,
                last_activity_at: progress.last_activity_at,
                started,
            });
        }

        let mean_completion_pct = round1(
            categories.iter().map(|c| c.completion_pct).sum::<f64>() / categories.len() as f64,
        );
        let medals = self.db.list_medals(child_id)?.len();

        Ok(ProgressOverview {
            child_id,
            categories,
            total_points: child.total_points,
            activities_completed: child.activities_completed,
            medals,
            mean_completion_pct,
            overall_level: OverallLevel::from_mean_percent(mean_completion_pct),
        })
    }

    /// Unlocked medals, newest first.
    pub fn list_medals(&self, child_id: ChildId) -> Result<Vec<Medal>> {
        self.db.require_child(child_id)?;
        self.db.list_medals(child_id)
    }

    /// Active children who have started, by highest tier then points.
    pub fn tier_ranking(&self, limit: usize) -> Result<Vec<RankingEntry>> {
        validate_limit(limit)?;
        let mut children: Vec<Child> = self
            .db
            .list_children(true)?
            .into_iter()
            .filter(Child::has_started)
            .collect();
        children.sort_by(|a, b| {
            b.max_tier
                .cmp(&a.max_tier)
                .then(b.total_points.cmp(&a.total_points))
                .then(a.id.cmp(&b.id))
        });

        Ok(children
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, c)| RankingEntry {
                position: i + 1,
                child_id: c.id,
                name: c.name,
                max_tier: c.max_tier,
                current_tier: c.current_tier,
                total_points: c.total_points,
                activities_completed: c.activities_completed,
            })
            .collect())
    }

    /// Deactivate a category's progress; the next attempt there starts over.
    ///
    /// Returns false when the category had no active progress.
    pub fn reset_category(&self, child_id: ChildId, category: Category) -> Result<bool> {
        self.db.immediate(|db| {
            db.require_child(child_id)?;
            let reset = db.deactivate_progress(child_id, category)?;
            if reset {
                info!(child = child_id, category = %category, "category progress reset");
            }
            Ok(reset)
        })
    }
}
