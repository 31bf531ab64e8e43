//! Difficulty progression tracker.
//!
//! Turns a child's recent attempts into a per-activity performance record
//! and a per-category skill analysis, and from those picks the next
//! difficulty tier for the category.
//!
//! ```text
//! performance = 0.7 * success_rate + 0.3 * (1 - min(avg_secs / 300, 1))
//! confidence  = min(category_points / 100, 1)
//! ```
//!
//! | Trend      | Confidence | Result      |
//! |------------|------------|-------------|
//! | Improving  | > 0.7      | tier + 1    |
//! | Struggling | any        | tier - 1    |
//! | any        | < 0.4      | tier - 1    |
//! | otherwise  |            | unchanged   |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityId, Attempt, Category};
use crate::child::CategoryProgress;
use crate::tier::Tier;

/// Seconds at which the speed term bottoms out.
pub const SLOW_ATTEMPT_SECS: f64 = 300.0;

/// Performance reported when there is nothing to measure.
pub const NEUTRAL_PERFORMANCE: f64 = 0.5;

/// Tracker tuning. Defaults mirror the reference behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_activity_lookback")]
    pub activity_lookback_days: i64,
    #[serde(default = "default_category_lookback")]
    pub category_lookback_days: i64,
    #[serde(default = "default_escalate")]
    pub escalate_confidence: f64,
    #[serde(default = "default_deescalate")]
    pub deescalate_confidence: f64,
    #[serde(default = "default_struggle_ratio")]
    pub struggle_ratio: f64,
    #[serde(default = "default_confidence_scale")]
    pub confidence_points_scale: f64,
    #[serde(default = "default_no_record_confidence")]
    pub no_record_confidence: f64,
    #[serde(default = "default_min_trend_attempts")]
    pub min_trend_attempts: usize,
    /// Equal earliest/latest scores at or above this count as improving.
    #[serde(default = "default_mastery_score")]
    pub mastery_score: f64,
    /// Share of the attempted activities at a category's tier that must be
    /// ready before the category moves up.
    #[serde(default = "default_mastery_share")]
    pub mastery_share: f64,
    #[serde(default)]
    pub readiness: ReadinessCriteria,
}

/// Per-activity "ready to move on" thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessCriteria {
    #[serde(default = "default_ready_points")]
    pub min_points: u32,
    #[serde(default = "default_ready_success")]
    pub min_success_rate: f64,
    #[serde(default = "default_ready_attempts")]
    pub min_attempts: u32,
    #[serde(default = "default_ready_secs")]
    pub max_avg_secs: f64,
}

fn default_activity_lookback() -> i64 {
    7
}
fn default_category_lookback() -> i64 {
    14
}
fn default_escalate() -> f64 {
    0.7
}
fn default_deescalate() -> f64 {
    0.4
}
fn default_struggle_ratio() -> f64 {
    0.8
}
fn default_confidence_scale() -> f64 {
    100.0
}
fn default_no_record_confidence() -> f64 {
    0.3
}
fn default_min_trend_attempts() -> usize {
    3
}
fn default_mastery_score() -> f64 {
    0.8
}
fn default_mastery_share() -> f64 {
    0.7
}
fn default_ready_points() -> u32 {
    50
}
fn default_ready_success() -> f64 {
    0.8
}
fn default_ready_attempts() -> u32 {
    5
}
fn default_ready_secs() -> f64 {
    300.0
}

impl Default for ReadinessCriteria {
    fn default() -> Self {
        Self {
            min_points: default_ready_points(),
            min_success_rate: default_ready_success(),
            min_attempts: default_ready_attempts(),
            max_avg_secs: default_ready_secs(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            activity_lookback_days: default_activity_lookback(),
            category_lookback_days: default_category_lookback(),
            escalate_confidence: default_escalate(),
            deescalate_confidence: default_deescalate(),
            struggle_ratio: default_struggle_ratio(),
            confidence_points_scale: default_confidence_scale(),
            no_record_confidence: default_no_record_confidence(),
            min_trend_attempts: default_min_trend_attempts(),
            mastery_score: default_mastery_score(),
            mastery_share: default_mastery_share(),
            readiness: ReadinessCriteria::default(),
        }
    }
}

/// Measured performance on one activity inside the lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub attempts: u32,
    pub successes: u32,
    pub points: u32,
    pub success_rate: f64,
    pub avg_time_secs: f64,
    pub score: f64,
}

/// Either a real measurement or an explicit "never played in the window".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Performance {
    NoData,
    Measured(PerformanceRecord),
}

impl Performance {
    /// Composite score, neutral for `NoData`.
    pub fn score(&self) -> f64 {
        match self {
            Performance::NoData => NEUTRAL_PERFORMANCE,
            Performance::Measured(record) => record.score,
        }
    }

    pub fn record(&self) -> Option<&PerformanceRecord> {
        match self {
            Performance::NoData => None,
            Performance::Measured(record) => Some(record),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.record().map_or(0, |r| r.attempts)
    }
}

/// Direction of recent results in a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Struggling,
}

/// Category-level view the tier decision is made from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAnalysis {
    pub category: Category,
    pub current_tier: Tier,
    pub points: u32,
    pub trend: Trend,
    pub confidence: f64,
    /// False when no progress row exists yet.
    pub has_record: bool,
}

/// Composite score of a single attempt.
pub fn attempt_score(completed: bool, time_spent_secs: u32) -> f64 {
    composite_score(if completed { 1.0 } else { 0.0 }, time_spent_secs as f64)
}

fn composite_score(success_rate: f64, avg_time_secs: f64) -> f64 {
    0.7 * success_rate + 0.3 * (1.0 - (avg_time_secs / SLOW_ATTEMPT_SECS).min(1.0))
}

pub struct DifficultyTracker<'a> {
    config: &'a TrackerConfig,
}

impl<'a> DifficultyTracker<'a> {
    pub fn new(config: &'a TrackerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackerConfig {
        self.config
    }

    /// Performance on `activity_id` over the activity lookback window.
    pub fn analyze_activity(
        &self,
        attempts: &[Attempt],
        activity_id: ActivityId,
        now: DateTime<Utc>,
    ) -> Performance {
        let since = now - Duration::days(self.config.activity_lookback_days);
        let recent: Vec<&Attempt> = attempts
            .iter()
            .filter(|a| a.activity_id == activity_id && a.completed_at >= since)
            .collect();

        if recent.is_empty() {
            return Performance::NoData;
        }

        let total = recent.len() as u32;
        let successes = recent.iter().filter(|a| a.completed).count() as u32;
        let points = recent.iter().map(|a| a.points).sum();
        let avg_time_secs =
            recent.iter().map(|a| a.time_spent_secs as f64).sum::<f64>() / total as f64;
        let success_rate = successes as f64 / total as f64;

        Performance::Measured(PerformanceRecord {
            attempts: total,
            successes,
            points,
            success_rate,
            avg_time_secs,
            score: composite_score(success_rate, avg_time_secs),
        })
    }

    /// Trend from the earliest vs latest attempt in the category window.
    pub fn trend(&self, attempts: &[Attempt], category: Category, now: DateTime<Utc>) -> Trend {
        let since = now - Duration::days(self.config.category_lookback_days);
        let mut recent: Vec<&Attempt> = attempts
            .iter()
            .filter(|a| a.category == category && a.completed_at >= since)
            .collect();

        if recent.len() < self.config.min_trend_attempts {
            return Trend::Stable;
        }

        recent.sort_by_key(|a| (a.completed_at, a.id));
        let (first, last) = match (recent.first(), recent.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Trend::Stable,
        };
        let earliest = attempt_score(first.completed, first.time_spent_secs);
        let latest = attempt_score(last.completed, last.time_spent_secs);

        if latest < earliest * self.config.struggle_ratio {
            Trend::Struggling
        } else if latest > earliest
            || (latest >= earliest && latest >= self.config.mastery_score)
        {
            Trend::Improving
        } else {
            Trend::Stable
        }
    }

    /// Skill analysis for a category.
    ///
    /// `fallback_tier` is used when no progress row exists; callers pass the
    /// child's configured starting tier.
    pub fn analyze_skill(
        &self,
        progress: Option<&CategoryProgress>,
        attempts: &[Attempt],
        category: Category,
        fallback_tier: Tier,
        now: DateTime<Utc>,
    ) -> SkillAnalysis {
        match progress.filter(|p| p.active) {
            None => SkillAnalysis {
                category,
                current_tier: fallback_tier,
                points: 0,
                trend: Trend::Stable,
                confidence: self.config.no_record_confidence,
                has_record: false,
            },
            Some(progress) => {
                let rung: Vec<Attempt> = attempts
                    .iter()
                    .filter(|a| progress.in_current_rung(a.completed_at))
                    .cloned()
                    .collect();
                SkillAnalysis {
                    category,
                    current_tier: progress.tier,
                    points: progress.points,
                    trend: self.trend(&rung, category, now),
                    confidence: (progress.points as f64 / self.config.confidence_points_scale)
                        .min(1.0),
                    has_record: true,
                }
            }
        }
    }

    /// Next tier for the category.
    pub fn optimal_tier(&self, analysis: &SkillAnalysis) -> Tier {
        let tier = analysis.current_tier;
        if analysis.trend == Trend::Improving
            && analysis.confidence > self.config.escalate_confidence
        {
            tier.step(1)
        } else if analysis.trend == Trend::Struggling
            || analysis.confidence < self.config.deescalate_confidence
        {
            tier.step(-1)
        } else {
            tier
        }
    }

    /// Tier a category settles on after an attempt.
    ///
    /// Moves one rung up once enough of the activities the child has tried at
    /// `current` are ready to advance; otherwise holds. Never moves down.
    pub fn mastery_tier(
        &self,
        current: Tier,
        tier_activities: &[ActivityId],
        attempts: &[Attempt],
        now: DateTime<Utc>,
    ) -> Tier {
        let tried: Vec<Performance> = tier_activities
            .iter()
            .map(|&id| self.analyze_activity(attempts, id, now))
            .filter(|p| p.attempts() > 0)
            .collect();
        if tried.is_empty() {
            return current;
        }
        let ready = tried.iter().filter(|p| self.ready_to_advance(p)).count();
        if ready as f64 / tried.len() as f64 >= self.config.mastery_share {
            current.step(1)
        } else {
            current
        }
    }

    /// Whether the child has mastered an activity well enough to move past it.
    pub fn ready_to_advance(&self, performance: &Performance) -> bool {
        let criteria = &self.config.readiness;
        match performance.record() {
            None => false,
            Some(r) => {
                r.points >= criteria.min_points
                    && r.success_rate >= criteria.min_success_rate
                    && r.attempts >= criteria.min_attempts
                    && r.avg_time_secs <= criteria.max_avg_secs
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn attempt(id: i64, activity_id: i64, completed: bool, secs: u32, days_ago: i64) -> Attempt {
        Attempt {
            id,
            child_id: 1,
            activity_id,
            category: Category::Lenguaje,
            completed,
            attempt_number: id as u32,
            time_spent_secs: secs,
            points: if completed { 20 } else { 0 },
            completed_at: now() - Duration::days(days_ago) + Duration::minutes(id),
        }
    }

    fn progress(tier: Tier, points: u32) -> CategoryProgress {
        let mut p = CategoryProgress::new(1, Category::Lenguaje, tier, 10);
        p.points = points;
        p
    }

    #[test]
    fn no_attempts_is_neutral() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let perf = tracker.analyze_activity(&[], 7, now());
        assert_eq!(perf, Performance::NoData);
        assert_eq!(perf.score(), 0.5);
    }

    #[test]
    fn composite_score_rewards_speed_and_caps_slowness() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let attempts = vec![attempt(1, 7, true, 60, 1), attempt(2, 7, false, 60, 1)];
        let perf = tracker.analyze_activity(&attempts, 7, now());
        let record = perf.record().unwrap();
        assert_eq!(record.success_rate, 0.5);
        assert!((record.score - (0.35 + 0.3 * 0.8)).abs() < 1e-9);

        let slow = vec![attempt(1, 7, false, 10_000, 1)];
        assert_eq!(tracker.analyze_activity(&slow, 7, now()).score(), 0.0);
    }

    #[test]
    fn attempts_outside_window_are_ignored() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let attempts = vec![attempt(1, 7, true, 60, 8)];
        assert_eq!(tracker.analyze_activity(&attempts, 7, now()), Performance::NoData);
    }

    #[test]
    fn fewer_than_three_attempts_is_stable() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let attempts = vec![attempt(1, 7, false, 200, 2), attempt(2, 7, true, 30, 1)];
        assert_eq!(tracker.trend(&attempts, Category::Lenguaje, now()), Trend::Stable);
    }

    #[test]
    fn trend_compares_earliest_and_latest() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);

        let improving = vec![
            attempt(1, 7, false, 200, 3),
            attempt(2, 7, false, 100, 2),
            attempt(3, 7, true, 120, 1),
        ];
        assert_eq!(tracker.trend(&improving, Category::Lenguaje, now()), Trend::Improving);

        let struggling = vec![
            attempt(1, 7, true, 60, 3),
            attempt(2, 7, true, 60, 2),
            attempt(3, 7, false, 120, 1),
        ];
        assert_eq!(tracker.trend(&struggling, Category::Lenguaje, now()), Trend::Struggling);

        let flat_low = vec![
            attempt(1, 7, false, 100, 3),
            attempt(2, 7, false, 100, 2),
            attempt(3, 7, false, 100, 1),
        ];
        assert_eq!(tracker.trend(&flat_low, Category::Lenguaje, now()), Trend::Stable);
    }

    #[test]
    fn repeated_high_scores_escalate() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let attempts: Vec<Attempt> = (1..=5).map(|i| attempt(i, 7, true, 60, 5 - i)).collect();
        let p = progress(Tier::Basico1, 100);
        let analysis =
            tracker.analyze_skill(Some(&p), &attempts, Category::Lenguaje, Tier::Inicial, now());
        assert_eq!(analysis.trend, Trend::Improving);
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(tracker.optimal_tier(&analysis), Tier::Basico2);
    }

    #[test]
    fn promotion_resets_the_trend_window() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let attempts: Vec<Attempt> = (1..=5).map(|i| attempt(i, 7, true, 60, 5 - i)).collect();
        let mut p = progress(Tier::Basico2, 100);
        p.tier_since = attempts.last().map(|a| a.completed_at);

        let analysis =
            tracker.analyze_skill(Some(&p), &attempts, Category::Lenguaje, Tier::Inicial, now());
        assert_eq!(analysis.trend, Trend::Stable);
        assert_eq!(tracker.optimal_tier(&analysis), Tier::Basico2);
    }

    #[test]
    fn low_confidence_steps_down_and_clamps() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let p = progress(Tier::Basico2, 10);
        let analysis = tracker.analyze_skill(Some(&p), &[], Category::Lenguaje, Tier::Inicial, now());
        assert_eq!(tracker.optimal_tier(&analysis), Tier::Basico1);

        let bottom = progress(Tier::Inicial, 0);
        let analysis =
            tracker.analyze_skill(Some(&bottom), &[], Category::Lenguaje, Tier::Inicial, now());
        assert_eq!(tracker.optimal_tier(&analysis), Tier::Inicial);
    }

    #[test]
    fn middle_confidence_with_stable_trend_holds() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let p = progress(Tier::Basico3, 55);
        let analysis = tracker.analyze_skill(Some(&p), &[], Category::Lenguaje, Tier::Inicial, now());
        assert_eq!(analysis.trend, Trend::Stable);
        assert_eq!(tracker.optimal_tier(&analysis), Tier::Basico3);
    }

    #[test]
    fn missing_record_uses_fallback_tier() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let analysis = tracker.analyze_skill(None, &[], Category::Numeros, Tier::Inicial, now());
        assert!(!analysis.has_record);
        assert_eq!(analysis.confidence, 0.3);
        assert_eq!(tracker.optimal_tier(&analysis), Tier::Inicial);
    }

    #[test]
    fn readiness_requires_every_criterion() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        let ready = Performance::Measured(PerformanceRecord {
            attempts: 5,
            successes: 5,
            points: 50,
            success_rate: 1.0,
            avg_time_secs: 90.0,
            score: 0.9,
        });
        assert!(tracker.ready_to_advance(&ready));

        let few = Performance::Measured(PerformanceRecord {
            attempts: 4,
            ..ready.record().cloned().unwrap()
        });
        assert!(!tracker.ready_to_advance(&few));
        assert!(!tracker.ready_to_advance(&Performance::NoData));
    }

    #[test]
    fn mastery_moves_category_up_one_rung() {
        let config = TrackerConfig::default();
        let tracker = DifficultyTracker::new(&config);
        // five fast successes at 20 points each on activity 7
        let mastered: Vec<Attempt> = (1..=5).map(|i| attempt(i, 7, true, 60, 1)).collect();
        assert_eq!(
            tracker.mastery_tier(Tier::Basico1, &[7, 8], &mastered, now()),
            Tier::Basico2
        );

        // one of two tried activities is not ready: 50 % < 70 %
        let mut mixed = mastered.clone();
        mixed.push(attempt(6, 8, false, 200, 1));
        assert_eq!(tracker.mastery_tier(Tier::Basico1, &[7, 8], &mixed, now()), Tier::Basico1);

        assert_eq!(tracker.mastery_tier(Tier::Basico1, &[7], &[], now()), Tier::Basico1);
        assert_eq!(tracker.mastery_tier(Tier::Experto, &[7], &mastered, now()), Tier::Experto);
    }
}
