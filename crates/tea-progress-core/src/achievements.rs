//! Medal catalog and unlock evaluation.
//!
//! Evaluation is pure: it compares the child's aggregate stats against the
//! fixed catalog and returns the keys that are satisfied but not yet held.
//! Persisting is the store's job, which also refuses duplicates.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{Category, ChildId};
use crate::error::ValidationError;
use crate::tier::Tier;

/// Unlock criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedalKind {
    PrimeraActividad,
    CategoriaIniciada,
    CategoriaCompleta,
    DiasConsecutivos3,
    DiasConsecutivos7,
    Puntos100,
    Puntos500,
    NivelAlcanzado(Tier),
}

impl MedalKind {
    /// Storage key, e.g. `puntos_100` or `nivel_basico_1`.
    pub fn key(&self) -> String {
        match self {
            MedalKind::PrimeraActividad => "primera_actividad".into(),
            MedalKind::CategoriaIniciada => "categoria_iniciada".into(),
            MedalKind::CategoriaCompleta => "categoria_completa".into(),
            MedalKind::DiasConsecutivos3 => "dias_consecutivos_3".into(),
            MedalKind::DiasConsecutivos7 => "dias_consecutivos_7".into(),
            MedalKind::Puntos100 => "puntos_100".into(),
            MedalKind::Puntos500 => "puntos_500".into(),
            MedalKind::NivelAlcanzado(tier) => format!("nivel_{tier}"),
        }
    }

    pub fn info(&self) -> MedalInfo {
        match self {
            MedalKind::PrimeraActividad => MedalInfo::fixed("Primer Paso", "¡Completaste tu primera actividad!", "🌟"),
            MedalKind::CategoriaIniciada => MedalInfo::fixed("Explorador", "¡Empezaste una nueva categoría!", "🗺️"),
            MedalKind::CategoriaCompleta => MedalInfo::fixed("Maestro", "¡Completaste toda una categoría!", "👑"),
            MedalKind::DiasConsecutivos3 => MedalInfo::fixed("Constante", "¡3 días seguidos aprendiendo!", "🔥"),
            MedalKind::DiasConsecutivos7 => MedalInfo::fixed("Dedicado", "¡7 días seguidos aprendiendo!", "💎"),
            MedalKind::Puntos100 => MedalInfo::fixed("Acumulador", "¡Acumulaste 100 puntos!", "💯"),
            MedalKind::Puntos500 => MedalInfo::fixed("Experto", "¡Acumulaste 500 puntos!", "🏆"),
            MedalKind::NivelAlcanzado(tier) => MedalInfo {
                title: format!("Nivel {}", tier.display_name()),
                description: format!("¡Has alcanzado el nivel {}!", tier.display_name()),
                icon: "🏅".into(),
            },
        }
    }
}

impl fmt::Display for MedalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for MedalKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "primera_actividad" => MedalKind::PrimeraActividad,
            "categoria_iniciada" => MedalKind::CategoriaIniciada,
            "categoria_completa" => MedalKind::CategoriaCompleta,
            "dias_consecutivos_3" => MedalKind::DiasConsecutivos3,
            "dias_consecutivos_7" => MedalKind::DiasConsecutivos7,
            "puntos_100" => MedalKind::Puntos100,
            "puntos_500" => MedalKind::Puntos500,
            other => match other.strip_prefix("nivel_") {
                Some(tier) => MedalKind::NivelAlcanzado(tier.parse()?),
                None => {
                    return Err(ValidationError::invalid_value(
                        "medal",
                        format!("unknown medal '{other}'"),
                    ))
                }
            },
        };
        Ok(kind)
    }
}

/// Display data for a medal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedalInfo {
    pub title: String,
    pub description: String,
    pub icon: String,
}

impl MedalInfo {
    fn fixed(title: &str, description: &str, icon: &str) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            icon: icon.into(),
        }
    }
}

/// (kind, category) pair identifying one unlock per child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MedalKey {
    pub kind: MedalKind,
    pub category: Option<Category>,
}

impl MedalKey {
    pub fn global(kind: MedalKind) -> Self {
        Self { kind, category: None }
    }

    pub fn in_category(kind: MedalKind, category: Category) -> Self {
        Self {
            kind,
            category: Some(category),
        }
    }
}

/// Persisted unlock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medal {
    pub id: i64,
    pub child_id: ChildId,
    pub kind: MedalKind,
    pub category: Option<Category>,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Aggregates the criteria are checked against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AchievementStats {
    pub activities_completed: u32,
    pub total_points: u32,
    pub streak_days: u32,
    /// Categories with at least one recorded attempt.
    pub started_categories: Vec<Category>,
    /// Categories whose whole active catalog has been completed.
    pub completed_categories: Vec<Category>,
    /// Tier reached by this completion, if any.
    pub reached_tier: Option<Tier>,
}

const STREAK_MEDALS: [(u32, MedalKind); 2] = [
    (3, MedalKind::DiasConsecutivos3),
    (7, MedalKind::DiasConsecutivos7),
];

const POINT_MEDALS: [(u32, MedalKind); 2] = [(100, MedalKind::Puntos100), (500, MedalKind::Puntos500)];

/// Newly satisfied medals, in catalog order.
pub fn evaluate(stats: &AchievementStats, unlocked: &HashSet<MedalKey>) -> Vec<MedalKey> {
    let mut due = Vec::new();

    if stats.activities_completed >= 1 {
        due.push(MedalKey::global(MedalKind::PrimeraActividad));
    }
    for &category in &stats.started_categories {
        due.push(MedalKey::in_category(MedalKind::CategoriaIniciada, category));
    }
    for &category in &stats.completed_categories {
        due.push(MedalKey::in_category(MedalKind::CategoriaCompleta, category));
    }
    for (days, kind) in STREAK_MEDALS {
        if stats.streak_days >= days {
            due.push(MedalKey::global(kind));
        }
    }
    for (points, kind) in POINT_MEDALS {
        if stats.total_points >= points {
            due.push(MedalKey::global(kind));
        }
    }
    if let Some(tier) = stats.reached_tier {
        due.push(MedalKey::global(MedalKind::NivelAlcanzado(tier)));
    }

    due.retain(|key| !unlocked.contains(key));
    due
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_unlocks_first_steps() {
        let stats = AchievementStats {
            activities_completed: 1,
            total_points: 10,
            streak_days: 1,
            started_categories: vec![Category::Colores],
            ..Default::default()
        };
        let due = evaluate(&stats, &HashSet::new());
        assert_eq!(
            due,
            vec![
                MedalKey::global(MedalKind::PrimeraActividad),
                MedalKey::in_category(MedalKind::CategoriaIniciada, Category::Colores),
            ]
        );
    }

    #[test]
    fn held_medals_are_not_returned_again() {
        let stats = AchievementStats {
            activities_completed: 20,
            total_points: 600,
            streak_days: 8,
            ..Default::default()
        };
        let first = evaluate(&stats, &HashSet::new());
        assert!(first.contains(&MedalKey::global(MedalKind::Puntos100)));
        assert!(first.contains(&MedalKey::global(MedalKind::Puntos500)));
        assert!(first.contains(&MedalKey::global(MedalKind::DiasConsecutivos7)));

        let held: HashSet<MedalKey> = first.into_iter().collect();
        assert!(evaluate(&stats, &held).is_empty());
    }

    #[test]
    fn category_medals_are_scoped() {
        let held: HashSet<MedalKey> =
            [MedalKey::in_category(MedalKind::CategoriaIniciada, Category::Lenguaje)].into();
        let stats = AchievementStats {
            started_categories: vec![Category::Lenguaje, Category::Numeros],
            ..Default::default()
        };
        assert_eq!(
            evaluate(&stats, &held),
            vec![MedalKey::in_category(MedalKind::CategoriaIniciada, Category::Numeros)]
        );
    }

    #[test]
    fn tier_medal_key_roundtrips() {
        let kind = MedalKind::NivelAlcanzado(Tier::Basico1);
        assert_eq!(kind.key(), "nivel_basico_1");
        assert_eq!("nivel_basico_1".parse::<MedalKind>().unwrap(), kind);
        assert_eq!(kind.info().title, "Nivel Basico 1");
        assert!("medalla_rara".parse::<MedalKind>().is_err());
    }
}
