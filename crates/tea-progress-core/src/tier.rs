//! The difficulty / progression ladder.
//!
//! A single totally ordered enumeration is shared by activity difficulty and
//! by a child's permanent level. The advance thresholds for each rung are a
//! fixed table compiled into the binary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One rung of the ladder, from `inicial` to the terminal `experto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Inicial,
    #[serde(rename = "basico_1")]
    Basico1,
    #[serde(rename = "basico_2")]
    Basico2,
    #[serde(rename = "basico_3")]
    Basico3,
    #[serde(rename = "intermedio_1")]
    Intermedio1,
    #[serde(rename = "intermedio_2")]
    Intermedio2,
    #[serde(rename = "intermedio_3")]
    Intermedio3,
    #[serde(rename = "avanzado_1")]
    Avanzado1,
    #[serde(rename = "avanzado_2")]
    Avanzado2,
    #[serde(rename = "avanzado_3")]
    Avanzado3,
    Experto,
}

impl Tier {
    pub const ALL: [Tier; 11] = [
        Tier::Inicial,
        Tier::Basico1,
        Tier::Basico2,
        Tier::Basico3,
        Tier::Intermedio1,
        Tier::Intermedio2,
        Tier::Intermedio3,
        Tier::Avanzado1,
        Tier::Avanzado2,
        Tier::Avanzado3,
        Tier::Experto,
    ];

    pub const LOWEST: Tier = Tier::Inicial;
    pub const HIGHEST: Tier = Tier::Experto;

    /// Zero-based position on the ladder.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Tier> {
        Self::ALL.get(ordinal).copied()
    }

    /// Next rung, `None` at the terminal tier.
    pub fn successor(self) -> Option<Tier> {
        Self::from_ordinal(self.ordinal() + 1)
    }

    pub fn predecessor(self) -> Option<Tier> {
        self.ordinal().checked_sub(1).and_then(Self::from_ordinal)
    }

    /// Move `delta` rungs, clamped to the ladder.
    pub fn step(self, delta: i32) -> Tier {
        let target = self.ordinal() as i64 + delta as i64;
        let clamped = target.clamp(0, (Self::ALL.len() - 1) as i64) as usize;
        Self::ALL[clamped]
    }

    pub fn is_terminal(self) -> bool {
        self == Self::HIGHEST
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Inicial => "inicial",
            Tier::Basico1 => "basico_1",
            Tier::Basico2 => "basico_2",
            Tier::Basico3 => "basico_3",
            Tier::Intermedio1 => "intermedio_1",
            Tier::Intermedio2 => "intermedio_2",
            Tier::Intermedio3 => "intermedio_3",
            Tier::Avanzado1 => "avanzado_1",
            Tier::Avanzado2 => "avanzado_2",
            Tier::Avanzado3 => "avanzado_3",
            Tier::Experto => "experto",
        }
    }

    /// Human label, e.g. "Basico 1".
    pub fn display_name(self) -> String {
        self.as_str()
            .split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Thresholds a child must meet to reach this tier.
    pub fn criteria(self) -> &'static TierCriteria {
        &TIER_CRITERIA[self.ordinal()]
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::LOWEST
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .iter()
            .copied()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidTier(s.to_string()))
    }
}

/// Lifetime thresholds for entering a tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCriteria {
    pub tier: Tier,
    pub min_points: u32,
    pub min_activities: u32,
    /// Minimum lifetime success rate, in percent.
    pub min_success_pct: f64,
}

const fn criteria(tier: Tier, min_points: u32, min_activities: u32, min_success_pct: f64) -> TierCriteria {
    TierCriteria {
        tier,
        min_points,
        min_activities,
        min_success_pct,
    }
}

/// Indexed by [`Tier::ordinal`].
pub const TIER_CRITERIA: [TierCriteria; 11] = [
    criteria(Tier::Inicial, 0, 0, 0.0),
    criteria(Tier::Basico1, 50, 5, 60.0),
    criteria(Tier::Basico2, 100, 10, 65.0),
    criteria(Tier::Basico3, 150, 15, 70.0),
    criteria(Tier::Intermedio1, 250, 25, 75.0),
    criteria(Tier::Intermedio2, 350, 35, 80.0),
    criteria(Tier::Intermedio3, 450, 45, 85.0),
    criteria(Tier::Avanzado1, 600, 60, 90.0),
    criteria(Tier::Avanzado2, 750, 75, 92.0),
    criteria(Tier::Avanzado3, 900, 90, 95.0),
    criteria(Tier::Experto, 1200, 120, 98.0),
];
