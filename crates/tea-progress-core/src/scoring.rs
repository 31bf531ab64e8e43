//! Multi-objective activity scoring.
//!
//! Candidate activities are ranked by a weighted sum of explainable terms,
//! each normalised to 0.0..=1.0:
//!
//! | Term           | Full credit                         | Partial credit                       |
//! |----------------|-------------------------------------|--------------------------------------|
//! | difficulty_fit | tier equals the recommended tier    | 0.5 below (reinforce), 0.25 above    |
//! | performance    | ready to move past the activity     | 2/3 success > 0.6, 1/3 > 0.4, else 1/6 |
//! | novelty        | never attempted                     | days since last attempt / 3          |
//! | time_fit       | mean time <= 3 min                  | 0.5 for <= 5 min                     |
//!
//! Ranking is a stable descending sort, so equal scores keep catalog order.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activity::{Activity, ActivityId, Attempt, Category};
use crate::child::CategoryProgress;
use crate::tier::Tier;
use crate::tracker::{DifficultyTracker, Performance, SkillAnalysis, Trend};

/// Days after which a revisit earns full novelty credit.
pub const NOVELTY_SATURATION_DAYS: f64 = 3.0;

/// Individual objective term with weight and score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveTerm {
    /// Term name
    pub name: String,
    /// Weight for this term (0.0 to 1.0)
    pub weight: f64,
    /// Raw score (0.0 to 1.0, higher is better)
    pub score: f64,
    /// Weighted contribution
    pub contribution: f64,
}

impl ObjectiveTerm {
    pub fn new(name: impl Into<String>, weight: f64, score: f64) -> Self {
        let weight = weight.clamp(0.0, 1.0);
        let score = score.clamp(0.0, 1.0);
        Self {
            name: name.into(),
            weight,
            score,
            contribution: weight * score,
        }
    }
}

/// Complete scoring breakdown for explainability
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub terms: Vec<ObjectiveTerm>,
    pub total_score: f64,
}

impl ScoreBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, term: ObjectiveTerm) {
        self.total_score += term.contribution;
        self.terms.push(term);
    }

    /// Get the top contributing term
    pub fn top_term(&self) -> Option<&ObjectiveTerm> {
        self.terms.iter().max_by(|a, b| {
            a.contribution
                .partial_cmp(&b.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    pub fn term(&self, name: &str) -> Option<&ObjectiveTerm> {
        self.terms.iter().find(|t| t.name == name)
    }
}

/// Weights for each objective term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub difficulty_fit: f64,
    pub performance: f64,
    pub novelty: f64,
    pub time_fit: f64,
}

impl ScoringWeights {
    /// Four-term weighting with the short-session bonus.
    pub fn progressive() -> Self {
        Self {
            difficulty_fit: 0.4,
            performance: 0.3,
            novelty: 0.2,
            time_fit: 0.1,
        }
    }

    /// Heavier novelty, no time term.
    pub fn adaptive() -> Self {
        Self {
            difficulty_fit: 0.4,
            performance: 0.3,
            novelty: 0.3,
            time_fit: 0.0,
        }
    }

    /// Normalize weights to sum to 1.0
    pub fn normalize(&mut self) {
        let sum = self.difficulty_fit + self.performance + self.novelty + self.time_fit;
        if sum > 0.0 {
            self.difficulty_fit /= sum;
            self.performance /= sum;
            self.novelty /= sum;
            self.time_fit /= sum;
        }
    }

    /// Validate that all weights are in [0.0, 1.0]
    pub fn validate(&self) -> Result<(), String> {
        let weights = [
            ("difficulty_fit", self.difficulty_fit),
            ("performance", self.performance),
            ("novelty", self.novelty),
            ("time_fit", self.time_fit),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(format!("weight '{name}' must be within 0.0..=1.0, got {weight}"));
            }
        }
        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::progressive()
    }
}

/// Fixed set of explanations attached to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rationale {
    ReadyForChallenge,
    NeedsPractice,
    KeepImproving,
    NewActivity,
    PerfectForLevel,
}

impl Rationale {
    pub fn message(self) -> &'static str {
        match self {
            Rationale::ReadyForChallenge => "Doing great! Ready for a new challenge",
            Rationale::NeedsPractice => "Let's practise a bit more to improve",
            Rationale::KeepImproving => "You keep getting better, carry on!",
            Rationale::NewActivity => "A new activity for your level",
            Rationale::PerfectForLevel => "Perfect for your current level",
        }
    }
}

impl fmt::Display for Rationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Everything the scorer knows about one child.
#[derive(Debug, Clone, Default)]
pub struct LearnerHistory {
    /// Tier assumed for categories without a progress row.
    pub starting_tier: Tier,
    pub attempts: Vec<Attempt>,
    pub progress: Vec<CategoryProgress>,
}

impl LearnerHistory {
    pub fn progress_for(&self, category: Category) -> Option<&CategoryProgress> {
        self.progress.iter().find(|p| p.category == category)
    }

    pub fn last_attempt_at(&self, activity_id: ActivityId) -> Option<DateTime<Utc>> {
        self.attempts
            .iter()
            .filter(|a| a.activity_id == activity_id)
            .map(|a| a.completed_at)
            .max()
    }
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub activity: Activity,
    pub score: f64,
    pub target_tier: Tier,
    pub rationale: Rationale,
    pub performance: Performance,
    pub trend: Trend,
    pub breakdown: ScoreBreakdown,
}

/// Ranks catalog activities for one child.
pub struct ActivityScorer<'a> {
    tracker: DifficultyTracker<'a>,
    weights: ScoringWeights,
}

impl<'a> ActivityScorer<'a> {
    pub fn new(tracker: DifficultyTracker<'a>, weights: ScoringWeights) -> Self {
        Self { tracker, weights }
    }

    pub fn tracker(&self) -> &DifficultyTracker<'a> {
        &self.tracker
    }

    /// Skill analysis plus the tier the tracker recommends.
    pub fn category_target(
        &self,
        history: &LearnerHistory,
        category: Category,
        now: DateTime<Utc>,
    ) -> (SkillAnalysis, Tier) {
        let analysis = self.tracker.analyze_skill(
            history.progress_for(category),
            &history.attempts,
            category,
            history.starting_tier,
            now,
        );
        let tier = self.tracker.optimal_tier(&analysis);
        (analysis, tier)
    }

    /// Descending-ranked recommendations, at most `limit`.
    ///
    /// `catalog` order is the tie-break order.
    pub fn rank(
        &self,
        history: &LearnerHistory,
        catalog: &[Activity],
        category: Option<Category>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let active: Vec<&Activity> = catalog
            .iter()
            .filter(|a| a.active && category.map_or(true, |c| a.category == c))
            .collect();

        let mut targets: HashMap<Category, (SkillAnalysis, Tier, bool)> = HashMap::new();
        for activity in &active {
            if targets.contains_key(&activity.category) {
                continue;
            }
            let (analysis, tier) = self.category_target(history, activity.category, now);
            let has_exact = active
                .iter()
                .any(|a| a.category == activity.category && a.tier == tier);
            debug!(
                category = %activity.category,
                current = %analysis.current_tier,
                target = %tier,
                trend = ?analysis.trend,
                confidence = analysis.confidence,
                fallback = !has_exact,
                "category target"
            );
            targets.insert(activity.category, (analysis, tier, has_exact));
        }

        let mut scored: Vec<Recommendation> = active
            .into_iter()
            .filter_map(|activity| {
                let (analysis, target, has_exact) = targets.get(&activity.category)?;
                if *has_exact && activity.tier != *target {
                    return None;
                }
                Some(self.score_activity(history, activity, analysis, *target, now))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }

    /// Score one activity against the category's target tier.
    pub fn score_activity(
        &self,
        history: &LearnerHistory,
        activity: &Activity,
        analysis: &SkillAnalysis,
        target: Tier,
        now: DateTime<Utc>,
    ) -> Recommendation {
        let performance = self.tracker.analyze_activity(&history.attempts, activity.id, now);
        let ready = self.tracker.ready_to_advance(&performance);
        let last = history.last_attempt_at(activity.id);

        let mut breakdown = ScoreBreakdown::new();
        breakdown.add_term(ObjectiveTerm::new(
            "difficulty_fit",
            self.weights.difficulty_fit,
            difficulty_fit_score(activity.tier, target),
        ));
        breakdown.add_term(ObjectiveTerm::new(
            "performance",
            self.weights.performance,
            performance_score(&performance, ready),
        ));
        breakdown.add_term(ObjectiveTerm::new(
            "novelty",
            self.weights.novelty,
            novelty_score(last, now),
        ));
        breakdown.add_term(ObjectiveTerm::new(
            "time_fit",
            self.weights.time_fit,
            time_fit_score(&performance),
        ));

        let rationale = choose_rationale(&performance, ready, last.is_none(), analysis.trend);

        Recommendation {
            activity: activity.clone(),
            score: breakdown.total_score,
            target_tier: target,
            rationale,
            performance,
            trend: analysis.trend,
            breakdown,
        }
    }
}

/// Full credit on target, half below, a quarter above.
pub fn difficulty_fit_score(activity_tier: Tier, target: Tier) -> f64 {
    match activity_tier.cmp(&target) {
        std::cmp::Ordering::Equal => 1.0,
        std::cmp::Ordering::Less => 0.5,
        std::cmp::Ordering::Greater => 0.25,
    }
}

pub fn performance_score(performance: &Performance, ready: bool) -> f64 {
    match performance.record() {
        None => 0.0,
        Some(_) if ready => 1.0,
        Some(r) if r.success_rate > 0.6 => 2.0 / 3.0,
        Some(r) if r.success_rate > 0.4 => 1.0 / 3.0,
        Some(_) => 1.0 / 6.0,
    }
}

pub fn novelty_score(last_attempt: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_attempt {
        None => 1.0,
        Some(at) => {
            let days = (now - at).num_days().max(0) as f64;
            (days / NOVELTY_SATURATION_DAYS).min(1.0)
        }
    }
}

pub fn time_fit_score(performance: &Performance) -> f64 {
    match performance.record() {
        Some(r) if r.avg_time_secs > 0.0 && r.avg_time_secs <= 180.0 => 1.0,
        Some(r) if r.avg_time_secs > 0.0 && r.avg_time_secs <= 300.0 => 0.5,
        _ => 0.0,
    }
}

fn choose_rationale(performance: &Performance, ready: bool, never_attempted: bool, trend: Trend) -> Rationale {
    if never_attempted {
        return Rationale::NewActivity;
    }
    let score = performance.score();
    if ready || score > 0.8 {
        Rationale::ReadyForChallenge
    } else if score < 0.4 {
        Rationale::NeedsPractice
    } else if trend == Trend::Improving {
        Rationale::KeepImproving
    } else {
        Rationale::PerfectForLevel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityContent;
    use crate::tracker::TrackerConfig;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn activity(id: i64, category: Category, tier: Tier) -> Activity {
        Activity {
            id,
            title: format!("Actividad {id}"),
            description: String::new(),
            category,
            tier,
            reward_points: 10,
            estimated_minutes: 5,
            active: true,
            content: ActivityContent::Construccion {
                elementos: vec!["a".into()],
                instrucciones: "Construye".into(),
            },
        }
    }

    fn attempt(id: i64, activity_id: i64, category: Category, completed: bool, days_ago: i64) -> Attempt {
        Attempt {
            id,
            child_id: 1,
            activity_id,
            category,
            completed,
            attempt_number: 1,
            time_spent_secs: 90,
            points: 10,
            completed_at: now() - Duration::days(days_ago),
        }
    }

    fn catalog() -> Vec<Activity> {
        vec![
            activity(1, Category::Numeros, Tier::Inicial),
            activity(2, Category::Numeros, Tier::Basico1),
            activity(3, Category::Numeros, Tier::Inicial),
            activity(4, Category::Colores, Tier::Inicial),
        ]
    }

    #[test]
    fn empty_history_recommends_lowest_tier_in_catalog_order() {
        let config = TrackerConfig::default();
        let scorer = ActivityScorer::new(DifficultyTracker::new(&config), ScoringWeights::default());
        let history = LearnerHistory::default();
        let recs = scorer.rank(&history, &catalog(), Some(Category::Numeros), 10, now());

        let ids: Vec<i64> = recs.iter().map(|r| r.activity.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(recs.iter().all(|r| r.target_tier == Tier::Inicial));
        assert!(recs.iter().all(|r| r.rationale == Rationale::NewActivity));
        // 0.4 fit + 0.2 novelty, nothing measured yet
        assert!((recs[0].score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn falls_back_to_whole_category_when_target_tier_missing() {
        let config = TrackerConfig::default();
        let scorer = ActivityScorer::new(DifficultyTracker::new(&config), ScoringWeights::default());
        let history = LearnerHistory {
            starting_tier: Tier::Basico3,
            ..Default::default()
        };
        // low confidence steps Basico3 down to Basico2; no numeros activity there
        let recs = scorer.rank(&history, &catalog(), Some(Category::Numeros), 10, now());
        assert_eq!(recs.len(), 3);
        assert!(recs.iter().all(|r| r.target_tier == Tier::Basico2));
        // below-target activities get reinforcement credit
        assert_eq!(recs[0].breakdown.term("difficulty_fit").unwrap().score, 0.5);
    }

    #[test]
    fn recently_played_activity_ranks_below_fresh_one() {
        let config = TrackerConfig::default();
        let scorer = ActivityScorer::new(DifficultyTracker::new(&config), ScoringWeights::default());
        let history = LearnerHistory {
            attempts: vec![attempt(1, 1, Category::Numeros, false, 0)],
            ..Default::default()
        };
        let recs = scorer.rank(&history, &catalog(), Some(Category::Numeros), 10, now());
        assert_eq!(recs[0].activity.id, 3);
        assert_eq!(recs[1].activity.id, 1);
        assert_eq!(recs[1].rationale, Rationale::NeedsPractice);
    }

    #[test]
    fn limit_and_ordering_across_categories() {
        let config = TrackerConfig::default();
        let scorer = ActivityScorer::new(DifficultyTracker::new(&config), ScoringWeights::default());
        let history = LearnerHistory::default();
        let recs = scorer.rank(&history, &catalog(), None, 2, now());
        assert_eq!(recs.len(), 2);
        for pair in recs.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let again = scorer.rank(&history, &catalog(), None, 2, now());
        assert_eq!(recs, again);
    }

    #[test]
    fn term_scores() {
        assert_eq!(difficulty_fit_score(Tier::Basico1, Tier::Basico1), 1.0);
        assert_eq!(difficulty_fit_score(Tier::Inicial, Tier::Basico1), 0.5);
        assert_eq!(difficulty_fit_score(Tier::Basico2, Tier::Basico1), 0.25);

        assert_eq!(novelty_score(None, now()), 1.0);
        assert_eq!(novelty_score(Some(now() - Duration::days(1)), now()), 1.0 / 3.0);
        assert_eq!(novelty_score(Some(now() - Duration::days(10)), now()), 1.0);

        assert_eq!(performance_score(&Performance::NoData, false), 0.0);
        assert_eq!(time_fit_score(&Performance::NoData), 0.0);
    }

    #[test]
    fn adaptive_weights_drop_time_term() {
        let w = ScoringWeights::adaptive();
        assert_eq!(w.time_fit, 0.0);
        assert!(w.validate().is_ok());
        let mut bad = ScoringWeights::progressive();
        bad.novelty = 1.5;
        assert!(bad.validate().is_err());
        bad.normalize();
        let sum = bad.difficulty_fit + bad.performance + bad.novelty + bad.time_fit;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
