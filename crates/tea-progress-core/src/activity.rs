//! Catalog entries and the attempt log.
//!
//! Activities are read-only reference data; attempts are append-only and
//! are the only input to every derived statistic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tier::Tier;

pub type ChildId = i64;
pub type ActivityId = i64;
pub type AttemptId = i64;

/// Skill domain tracked independently per child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Lenguaje,
    Numeros,
    Colores,
    Animales,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Lenguaje,
        Category::Numeros,
        Category::Colores,
        Category::Animales,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Lenguaje => "lenguaje",
            Category::Numeros => "numeros",
            Category::Colores => "colores",
            Category::Animales => "animales",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidCategory(s.to_string()))
    }
}

/// A question/answer pair used by comprehension and conversation activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub pregunta: String,
    pub respuesta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalSound {
    pub nombre: String,
    pub sonido: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    pub objeto: String,
    pub descripcion: String,
}

/// Activity payload, one variant per activity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "snake_case")]
pub enum ActivityContent {
    /// Repeat words or short phrases.
    Imitacion {
        #[serde(default)]
        palabras: Vec<String>,
        #[serde(default)]
        frases: Vec<String>,
        instrucciones: String,
        #[serde(default)]
        tiempo_por_palabra: Option<u32>,
    },
    /// Point at / name the requested item.
    Reconocimiento {
        #[serde(default)]
        colores: Vec<String>,
        #[serde(default)]
        numeros: Vec<u32>,
        #[serde(default)]
        objetos: Vec<String>,
        #[serde(default)]
        animales: Vec<AnimalSound>,
        instrucciones: String,
    },
    /// Match pairs of items.
    Asociacion {
        pares: Vec<(String, String)>,
        instrucciones: String,
    },
    /// Build a sequence or phrase from parts.
    Construccion {
        elementos: Vec<String>,
        instrucciones: String,
    },
    Comprension {
        preguntas: Vec<Prompt>,
        instrucciones: String,
    },
    /// Simple arithmetic.
    Operacion {
        operaciones: Vec<String>,
        instrucciones: String,
    },
    Clasificacion {
        grupos: Vec<String>,
        elementos: Vec<String>,
        instrucciones: String,
    },
    Narrativa {
        historias: Vec<String>,
        instrucciones: String,
    },
    Conversacion {
        conversaciones: Vec<Prompt>,
        instrucciones: String,
    },
    Descripcion {
        objetos: Vec<ObjectDescription>,
        instrucciones: String,
    },
    Creatividad {
        elementos: Vec<String>,
        instrucciones: String,
    },
    ResolucionProblemas {
        problemas: Vec<Prompt>,
        instrucciones: String,
    },
}

impl ActivityContent {
    /// Type tag as stored alongside the activity.
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityContent::Imitacion { .. } => "imitacion",
            ActivityContent::Reconocimiento { .. } => "reconocimiento",
            ActivityContent::Asociacion { .. } => "asociacion",
            ActivityContent::Construccion { .. } => "construccion",
            ActivityContent::Comprension { .. } => "comprension",
            ActivityContent::Operacion { .. } => "operacion",
            ActivityContent::Clasificacion { .. } => "clasificacion",
            ActivityContent::Narrativa { .. } => "narrativa",
            ActivityContent::Conversacion { .. } => "conversacion",
            ActivityContent::Descripcion { .. } => "descripcion",
            ActivityContent::Creatividad { .. } => "creatividad",
            ActivityContent::ResolucionProblemas { .. } => "resolucion_problemas",
        }
    }

    pub fn instructions(&self) -> &str {
        match self {
            ActivityContent::Imitacion { instrucciones, .. }
            | ActivityContent::Reconocimiento { instrucciones, .. }
            | ActivityContent::Asociacion { instrucciones, .. }
            | ActivityContent::Construccion { instrucciones, .. }
            | ActivityContent::Comprension { instrucciones, .. }
            | ActivityContent::Operacion { instrucciones, .. }
            | ActivityContent::Clasificacion { instrucciones, .. }
            | ActivityContent::Narrativa { instrucciones, .. }
            | ActivityContent::Conversacion { instrucciones, .. }
            | ActivityContent::Descripcion { instrucciones, .. }
            | ActivityContent::Creatividad { instrucciones, .. }
            | ActivityContent::ResolucionProblemas { instrucciones, .. } => instrucciones,
        }
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tier: Tier,
    pub reward_points: u32,
    pub estimated_minutes: u32,
    pub active: bool,
    pub content: ActivityContent,
}

/// Catalog entry before it has been assigned an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tier: Tier,
    pub reward_points: u32,
    pub estimated_minutes: u32,
    pub content: ActivityContent,
}

/// One recorded interaction between a child and an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub child_id: ChildId,
    pub activity_id: ActivityId,
    pub category: Category,
    /// Whether the child finished the activity successfully.
    pub completed: bool,
    /// 1-based count of attempts at this activity by this child.
    pub attempt_number: u32,
    pub time_spent_secs: u32,
    pub points: u32,
    pub completed_at: DateTime<Utc>,
}

/// Attempt before insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub child_id: ChildId,
    pub activity_id: ActivityId,
    pub completed: bool,
    pub time_spent_secs: u32,
    pub points: u32,
    pub completed_at: DateTime<Utc>,
}

/// Filter for [`crate::storage::Database::query_attempts`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptQuery {
    pub activity_id: Option<ActivityId>,
    pub category: Option<Category>,
    pub since: Option<DateTime<Utc>>,
}

impl AttemptQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn activity(mut self, activity_id: ActivityId) -> Self {
        self.activity_id = Some(activity_id);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Apply the filter to an in-memory attempt.
    pub fn matches(&self, attempt: &Attempt) -> bool {
        self.activity_id.map_or(true, |id| attempt.activity_id == id)
            && self.category.map_or(true, |c| attempt.category == c)
            && self.since.map_or(true, |t| attempt.completed_at >= t)
    }
}
