//! Permanent progression gate.
//!
//! A forward-only state machine over [`Tier`]. After every completed
//! activity the lifetime counters grow, the daily streak is recomputed and
//! the next rung's thresholds are checked. `current_tier` and `max_tier`
//! never decrease.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::activity::{Activity, ActivityId, Attempt};
use crate::child::Child;
use crate::error::ValidationError;
use crate::tier::Tier;

/// Share of an activity's reward points that counts as a success.
pub const SUCCESS_POINTS_RATIO: f64 = 0.7;

/// Result of feeding one completion through the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub previous_tier: Tier,
    pub advanced_to: Option<Tier>,
    pub streak_days: u32,
}

impl GateOutcome {
    pub fn tier_advanced(&self) -> bool {
        self.advanced_to.is_some()
    }
}

/// Streak after an activity at `now`, given the previous activity time.
///
/// Calendar days are compared in UTC.
pub fn update_streak(current: u32, previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    let Some(previous) = previous else {
        return 1;
    };
    let gap = (now.date_naive() - previous.date_naive()).num_days();
    match gap {
        1 => current.saturating_add(1),
        g if g > 1 => 1,
        // same day, or a clock that went backwards
        _ => current.max(1),
    }
}

/// Lifetime success rate in percent, `None` when nothing was completed.
///
/// Only completed attempts count; one is a success when it earned at least
/// 70 % of the activity's reward points.
pub fn lifetime_success_rate(attempts: &[Attempt], catalog: &[Activity]) -> Option<f64> {
    let rewards: HashMap<ActivityId, u32> =
        catalog.iter().map(|a| (a.id, a.reward_points)).collect();

    let completed: Vec<&Attempt> = attempts.iter().filter(|a| a.completed).collect();
    if completed.is_empty() {
        return None;
    }

    let successes = completed
        .iter()
        .filter(|a| {
            rewards
                .get(&a.activity_id)
                .is_some_and(|&max| a.points as f64 >= max as f64 * SUCCESS_POINTS_RATIO)
        })
        .count();

    Some(successes as f64 / completed.len() as f64 * 100.0)
}

/// Next tier when every threshold of it is met.
pub fn evaluate_advance(child: &Child, success_rate_pct: f64) -> Option<Tier> {
    let next = child.current_tier.successor()?;
    let criteria = next.criteria();
    let meets = child.total_points >= criteria.min_points
        && child.activities_completed >= criteria.min_activities
        && success_rate_pct >= criteria.min_success_pct;
    meets.then_some(next)
}

/// Apply one completion to the child's lifetime state.
///
/// `success_rate_of` is evaluated after the counters are updated and only
/// when the points and activity thresholds already pass.
pub fn apply_completion(
    child: &mut Child,
    points: u32,
    now: DateTime<Utc>,
    success_rate_of: impl FnOnce() -> Option<f64>,
) -> GateOutcome {
    let previous_tier = child.current_tier;

    child.total_points = child.total_points.saturating_add(points);
    child.activities_completed = child.activities_completed.saturating_add(1);
    child.streak_days = update_streak(child.streak_days, child.last_activity_at, now);
    child.last_activity_at = Some(now);

    let advanced_to = child.current_tier.successor().and_then(|next| {
        let criteria = next.criteria();
        if child.total_points < criteria.min_points
            || child.activities_completed < criteria.min_activities
        {
            return None;
        }
        let rate = success_rate_of().unwrap_or(0.0);
        evaluate_advance(child, rate)
    });

    if let Some(next) = advanced_to {
        child.current_tier = next;
        child.max_tier = child.max_tier.max(next);
        info!(
            child = child.id,
            from = %previous_tier,
            to = %next,
            points = child.total_points,
            activities = child.activities_completed,
            "tier advanced"
        );
    }

    GateOutcome {
        previous_tier,
        advanced_to,
        streak_days: child.streak_days,
    }
}

/// Starting tier may be set once, and only before the first completion.
pub fn validate_initial_tier(child: &Child) -> Result<(), ValidationError> {
    if child.has_started() {
        return Err(ValidationError::InitialTierLocked {
            completed: child.activities_completed,
        });
    }
    if child.initial_tier_configured {
        return Err(ValidationError::InitialTierAlreadyConfigured(child.initial_tier));
    }
    Ok(())
}

/// Apply a validated starting tier.
pub fn set_initial_tier(child: &mut Child, tier: Tier) -> Result<(), ValidationError> {
    validate_initial_tier(child)?;
    child.initial_tier = tier;
    child.current_tier = child.current_tier.max(tier);
    child.max_tier = child.max_tier.max(tier);
    child.initial_tier_configured = true;
    Ok(())
}

/// Mean of the capped point and activity percentages toward the next tier.
pub fn next_tier_progress(child: &Child) -> f64 {
    let Some(next) = child.current_tier.successor() else {
        return 100.0;
    };
    let criteria = next.criteria();
    let pct = |have: u32, need: u32| {
        if need == 0 {
            100.0
        } else {
            (have as f64 / need as f64 * 100.0).min(100.0)
        }
    };
    let progress = (pct(child.total_points, criteria.min_points)
        + pct(child.activities_completed, criteria.min_activities))
        / 2.0;
    (progress * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityContent, Category};
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 9, 30, 0).unwrap()
    }

    fn child() -> Child {
        Child::new(1, "Ana", day(1))
    }

    #[test]
    fn streak_rules() {
        assert_eq!(update_streak(0, None, day(5)), 1);
        assert_eq!(update_streak(3, Some(day(4)), day(5)), 4);
        assert_eq!(update_streak(3, Some(day(5)), day(5) + Duration::hours(5)), 3);
        assert_eq!(update_streak(6, Some(day(1)), day(5)), 1);
    }

    #[test]
    fn streak_counts_calendar_days_not_hours() {
        let late = Utc.with_ymd_and_hms(2026, 3, 4, 23, 50, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 3, 5, 0, 10, 0).unwrap();
        assert_eq!(update_streak(2, Some(late), early), 3);
    }

    #[test]
    fn success_rate_uses_seventy_percent_of_reward() {
        let catalog = vec![Activity {
            id: 9,
            title: "Contar".into(),
            description: String::new(),
            category: Category::Numeros,
            tier: Tier::Inicial,
            reward_points: 10,
            estimated_minutes: 3,
            active: true,
            content: ActivityContent::Operacion {
                operaciones: vec!["1+1".into()],
                instrucciones: "Suma".into(),
            },
        }];
        let make = |points, completed| Attempt {
            id: 0,
            child_id: 1,
            activity_id: 9,
            category: Category::Numeros,
            completed,
            attempt_number: 1,
            time_spent_secs: 60,
            points,
            completed_at: day(2),
        };
        let attempts = vec![make(7, true), make(6, true), make(10, false)];
        assert_eq!(lifetime_success_rate(&attempts, &catalog), Some(50.0));
        assert_eq!(lifetime_success_rate(&[], &catalog), None);
    }

    #[test]
    fn advances_when_all_thresholds_met() {
        let mut c = child();
        c.total_points = 40;
        c.activities_completed = 4;
        let outcome = apply_completion(&mut c, 10, day(2), || Some(80.0));
        assert_eq!(outcome.advanced_to, Some(Tier::Basico1));
        assert_eq!(c.current_tier, Tier::Basico1);
        assert_eq!(c.max_tier, Tier::Basico1);
    }

    #[test]
    fn low_success_rate_blocks_advance() {
        let mut c = child();
        c.total_points = 40;
        c.activities_completed = 4;
        let outcome = apply_completion(&mut c, 10, day(2), || Some(59.9));
        assert!(!outcome.tier_advanced());
        assert_eq!(c.current_tier, Tier::Inicial);
    }

    #[test]
    fn success_rate_not_computed_below_counters() {
        let mut c = child();
        let outcome = apply_completion(&mut c, 5, day(2), || panic!("should not be asked"));
        assert!(!outcome.tier_advanced());
        assert_eq!(c.total_points, 5);
        assert_eq!(c.activities_completed, 1);
        assert_eq!(c.streak_days, 1);
    }

    #[test]
    fn terminal_tier_never_moves() {
        let mut c = child();
        c.current_tier = Tier::Experto;
        c.max_tier = Tier::Experto;
        c.total_points = 10_000;
        c.activities_completed = 1_000;
        let outcome = apply_completion(&mut c, 10, day(2), || Some(100.0));
        assert!(!outcome.tier_advanced());
        assert_eq!(c.current_tier, Tier::Experto);
        assert_eq!(next_tier_progress(&c), 100.0);
    }

    #[test]
    fn initial_tier_locked_after_first_completion() {
        let mut c = child();
        set_initial_tier(&mut c, Tier::Basico2).unwrap();
        assert_eq!(c.current_tier, Tier::Basico2);
        assert_eq!(c.max_tier, Tier::Basico2);

        c.activities_completed = 1;
        let err = set_initial_tier(&mut c, Tier::Inicial).unwrap_err();
        assert_eq!(err, ValidationError::InitialTierLocked { completed: 1 });
        assert_eq!(c.current_tier, Tier::Basico2);
    }

    #[test]
    fn initial_tier_is_configured_only_once() {
        let mut c = child();
        set_initial_tier(&mut c, Tier::Intermedio1).unwrap();
        assert!(c.initial_tier_configured);

        let err = set_initial_tier(&mut c, Tier::Inicial).unwrap_err();
        assert_eq!(err, ValidationError::InitialTierAlreadyConfigured(Tier::Intermedio1));
        assert_eq!(c.initial_tier, Tier::Intermedio1);
        assert_eq!(c.current_tier, Tier::Intermedio1);
        assert_eq!(c.max_tier, Tier::Intermedio1);
    }

    #[test]
    fn progress_toward_next_tier() {
        let mut c = child();
        c.total_points = 25;
        c.activities_completed = 5;
        // basico_1 needs 50 points and 5 activities: (50 + 100) / 2
        assert_eq!(next_tier_progress(&c), 75.0);
    }
}
