//! Built-in progressive activity catalog.
//!
//! Lenguaje and números climb the full tier ladder; colores and animales
//! have three rungs each.

use tracing::info;

use crate::activity::{
    ActivityContent, AnimalSound, Category, NewActivity, ObjectDescription, Prompt,
};
use crate::error::Result;
use crate::storage::Database;
use crate::tier::Tier;

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn prompts(items: &[(&str, &str)]) -> Vec<Prompt> {
    items
        .iter()
        .map(|(pregunta, respuesta)| Prompt {
            pregunta: (*pregunta).into(),
            respuesta: (*respuesta).into(),
        })
        .collect()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(a, b)| ((*a).to_string(), (*b).to_string()))
        .collect()
}

fn imitacion(palabras: &[&str], segundos: u32) -> ActivityContent {
    ActivityContent::Imitacion {
        palabras: words(palabras),
        frases: Vec::new(),
        instrucciones: "Repite la palabra que escuches".into(),
        tiempo_por_palabra: Some(segundos),
    }
}

fn conteo(hasta: u32, objetos: &[&str], instrucciones: &str) -> ActivityContent {
    ActivityContent::Reconocimiento {
        colores: Vec::new(),
        numeros: (1..=hasta).collect(),
        objetos: words(objetos),
        animales: Vec::new(),
        instrucciones: instrucciones.into(),
    }
}

struct Entry {
    title: &'static str,
    description: &'static str,
    tier: Tier,
    reward_points: u32,
    estimated_minutes: u32,
    content: ActivityContent,
}

impl Entry {
    fn into_new(self, category: Category) -> NewActivity {
        NewActivity {
            title: self.title.into(),
            description: self.description.into(),
            category,
            tier: self.tier,
            reward_points: self.reward_points,
            estimated_minutes: self.estimated_minutes,
            content: self.content,
        }
    }
}

fn lenguaje() -> Vec<Entry> {
    vec![
        Entry {
            title: "Primeras Palabras",
            description: "Aprende tus primeras palabras básicas",
            tier: Tier::Inicial,
            reward_points: 5,
            estimated_minutes: 3,
            content: imitacion(&["mamá", "papá"], 5),
        },
        Entry {
            title: "Palabras Familiares",
            description: "Aprende palabras de la familia",
            tier: Tier::Basico1,
            reward_points: 8,
            estimated_minutes: 4,
            content: imitacion(&["mamá", "papá", "hermano", "hermana"], 4),
        },
        Entry {
            title: "Palabras de Casa",
            description: "Aprende palabras de objetos de casa",
            tier: Tier::Basico2,
            reward_points: 10,
            estimated_minutes: 5,
            content: imitacion(&["casa", "mesa", "silla", "cama", "puerta"], 3),
        },
        Entry {
            title: "Palabras de Comida",
            description: "Aprende palabras de alimentos básicos",
            tier: Tier::Basico3,
            reward_points: 12,
            estimated_minutes: 6,
            content: imitacion(&["agua", "leche", "pan", "manzana", "plátano"], 3),
        },
        Entry {
            title: "Frases de 2 Palabras",
            description: "Construye frases simples de 2 palabras",
            tier: Tier::Intermedio1,
            reward_points: 15,
            estimated_minutes: 8,
            content: ActivityContent::Construccion {
                elementos: words(&["mamá come", "papá juega", "agua fría", "casa grande"]),
                instrucciones: "Arma la frase con las palabras que veas".into(),
            },
        },
        Entry {
            title: "Frases de 3 Palabras",
            description: "Construye frases de 3 palabras",
            tier: Tier::Intermedio2,
            reward_points: 18,
            estimated_minutes: 10,
            content: ActivityContent::Construccion {
                elementos: words(&[
                    "mamá come pan",
                    "papá juega fútbol",
                    "agua está fría",
                    "casa es grande",
                ]),
                instrucciones: "Arma la frase con las palabras que veas".into(),
            },
        },
        Entry {
            title: "Preguntas Simples",
            description: "Responde preguntas básicas",
            tier: Tier::Intermedio3,
            reward_points: 20,
            estimated_minutes: 12,
            content: ActivityContent::Comprension {
                preguntas: prompts(&[
                    ("¿Cómo te llamas?", "Ana"),
                    ("¿Qué color es el sol?", "amarillo"),
                    ("¿Cuántos ojos tienes?", "dos"),
                ]),
                instrucciones: "Responde la pregunta que escuches".into(),
            },
        },
        Entry {
            title: "Historias Cortas",
            description: "Cuenta historias de 3-4 oraciones",
            tier: Tier::Avanzado1,
            reward_points: 25,
            estimated_minutes: 15,
            content: ActivityContent::Narrativa {
                historias: words(&[
                    "El perro corre en el parque",
                    "La niña come una manzana roja",
                    "El gato duerme en la cama",
                ]),
                instrucciones: "Cuenta la historia que veas en las imágenes".into(),
            },
        },
        Entry {
            title: "Conversaciones",
            description: "Mantén una conversación simple",
            tier: Tier::Avanzado2,
            reward_points: 30,
            estimated_minutes: 18,
            content: ActivityContent::Conversacion {
                conversaciones: prompts(&[
                    ("¿Qué hiciste hoy?", "Jugué con mis juguetes"),
                    ("¿Qué te gusta comer?", "Me gusta la pizza"),
                    ("¿Dónde vives?", "Vivo en una casa"),
                ]),
                instrucciones: "Responde como si estuvieras hablando con alguien".into(),
            },
        },
        Entry {
            title: "Descripciones Detalladas",
            description: "Describe objetos con detalles",
            tier: Tier::Avanzado3,
            reward_points: 35,
            estimated_minutes: 20,
            content: ActivityContent::Descripcion {
                objetos: [
                    ("manzana", "Es roja, dulce y redonda"),
                    ("perro", "Es peludo, grande y amigable"),
                    ("casa", "Es grande, blanca y tiene ventanas"),
                ]
                .iter()
                .map(|(objeto, descripcion)| ObjectDescription {
                    objeto: (*objeto).into(),
                    descripcion: (*descripcion).into(),
                })
                .collect(),
                instrucciones: "Describe el objeto con muchos detalles".into(),
            },
        },
        Entry {
            title: "Historias Creativas",
            description: "Crea tus propias historias",
            tier: Tier::Experto,
            reward_points: 50,
            estimated_minutes: 25,
            content: ActivityContent::Creatividad {
                elementos: words(&["un dragón", "un castillo", "una princesa", "una varita mágica"]),
                instrucciones: "Crea una historia usando estos elementos".into(),
            },
        },
    ]
}

fn numeros() -> Vec<Entry> {
    vec![
        Entry {
            title: "Números 1 y 2",
            description: "Aprende los primeros números",
            tier: Tier::Inicial,
            reward_points: 5,
            estimated_minutes: 3,
            content: conteo(2, &["manzanas", "pelotas"], "Cuenta los objetos que veas"),
        },
        Entry {
            title: "Números del 1 al 3",
            description: "Aprende a contar hasta 3",
            tier: Tier::Basico1,
            reward_points: 8,
            estimated_minutes: 4,
            content: conteo(3, &["cubos", "flores", "estrellas"], "Cuenta los objetos que veas"),
        },
        Entry {
            title: "Números del 1 al 5",
            description: "Aprende a contar hasta 5",
            tier: Tier::Basico2,
            reward_points: 10,
            estimated_minutes: 5,
            content: conteo(
                5,
                &["manzanas", "pelotas", "cubos", "flores", "estrellas"],
                "Cuenta los objetos que veas",
            ),
        },
        Entry {
            title: "Números con Dedos",
            description: "Muestra números con los dedos",
            tier: Tier::Basico3,
            reward_points: 12,
            estimated_minutes: 6,
            content: ActivityContent::Imitacion {
                palabras: words(&["1", "2", "3", "4", "5"]),
                frases: Vec::new(),
                instrucciones: "Muestra con los dedos el número que veas".into(),
                tiempo_por_palabra: None,
            },
        },
        Entry {
            title: "Números del 1 al 10",
            description: "Aprende a contar hasta 10",
            tier: Tier::Intermedio1,
            reward_points: 15,
            estimated_minutes: 8,
            content: conteo(
                10,
                &["estrellas", "flores", "coches", "puntos"],
                "Cuenta todos los objetos",
            ),
        },
        Entry {
            title: "Sumas Simples",
            description: "Resuelve sumas básicas",
            tier: Tier::Intermedio2,
            reward_points: 18,
            estimated_minutes: 10,
            content: ActivityContent::Operacion {
                operaciones: words(&["2 + 1", "1 + 2", "3 + 1", "2 + 2"]),
                instrucciones: "Resuelve la suma que veas".into(),
            },
        },
        Entry {
            title: "Restas Simples",
            description: "Resuelve restas básicas",
            tier: Tier::Intermedio3,
            reward_points: 20,
            estimated_minutes: 12,
            content: ActivityContent::Operacion {
                operaciones: words(&["3 - 1", "4 - 2", "5 - 1", "3 - 2"]),
                instrucciones: "Resuelve la resta que veas".into(),
            },
        },
        Entry {
            title: "Números del 1 al 20",
            description: "Aprende a contar hasta 20",
            tier: Tier::Avanzado1,
            reward_points: 25,
            estimated_minutes: 15,
            content: conteo(
                20,
                &["puntos", "líneas", "círculos", "cuadrados"],
                "Cuenta todos los elementos",
            ),
        },
        Entry {
            title: "Sumas y Restas Mixtas",
            description: "Resuelve operaciones mixtas",
            tier: Tier::Avanzado2,
            reward_points: 30,
            estimated_minutes: 18,
            content: ActivityContent::Operacion {
                operaciones: words(&["5 + 3", "7 - 2", "4 + 4", "9 - 3"]),
                instrucciones: "Resuelve la operación que veas".into(),
            },
        },
        Entry {
            title: "Problemas de Palabras",
            description: "Resuelve problemas matemáticos simples",
            tier: Tier::Avanzado3,
            reward_points: 35,
            estimated_minutes: 20,
            content: ActivityContent::ResolucionProblemas {
                problemas: prompts(&[
                    ("Ana tiene 3 manzanas y come 1. ¿Cuántas le quedan?", "2"),
                    ("Pedro tiene 2 pelotas y compra 3 más. ¿Cuántas tiene en total?", "5"),
                ]),
                instrucciones: "Resuelve el problema que escuches".into(),
            },
        },
        Entry {
            title: "Números del 1 al 100",
            description: "Domina el conteo hasta 100",
            tier: Tier::Experto,
            reward_points: 50,
            estimated_minutes: 25,
            content: conteo(
                100,
                &["puntos", "números", "objetos variados"],
                "Cuenta todos los elementos hasta 100",
            ),
        },
    ]
}

fn colores() -> Vec<Entry> {
    vec![
        Entry {
            title: "Colores Básicos",
            description: "Reconoce los colores principales",
            tier: Tier::Inicial,
            reward_points: 10,
            estimated_minutes: 5,
            content: ActivityContent::Asociacion {
                pares: pairs(&[
                    ("rojo", "manzana"),
                    ("azul", "cielo"),
                    ("amarillo", "sol"),
                    ("verde", "hierba"),
                ]),
                instrucciones: "Señala el color que te pida".into(),
            },
        },
        Entry {
            title: "Colores Secundarios",
            description: "Aprende colores como naranja, morado, rosa",
            tier: Tier::Basico2,
            reward_points: 15,
            estimated_minutes: 8,
            content: ActivityContent::Asociacion {
                pares: pairs(&[
                    ("naranja", "naranja"),
                    ("morado", "uva"),
                    ("rosa", "flor"),
                    ("marrón", "tierra"),
                ]),
                instrucciones: "Identifica el color correcto".into(),
            },
        },
        Entry {
            title: "Mezcla de Colores",
            description: "Entiende cómo se forman los colores",
            tier: Tier::Intermedio1,
            reward_points: 25,
            estimated_minutes: 12,
            content: ActivityContent::Comprension {
                preguntas: prompts(&[
                    ("rojo + azul", "morado"),
                    ("amarillo + azul", "verde"),
                    ("rojo + amarillo", "naranja"),
                ]),
                instrucciones: "¿Qué color se forma al mezclar estos dos?".into(),
            },
        },
    ]
}

fn animales() -> Vec<Entry> {
    vec![
        Entry {
            title: "Sonidos de Animales",
            description: "Asocia animales con sus sonidos",
            tier: Tier::Inicial,
            reward_points: 12,
            estimated_minutes: 6,
            content: ActivityContent::Reconocimiento {
                colores: Vec::new(),
                numeros: Vec::new(),
                objetos: Vec::new(),
                animales: [
                    ("perro", "guau guau"),
                    ("gato", "miau"),
                    ("vaca", "muu"),
                    ("pollo", "pío pío"),
                ]
                .iter()
                .map(|(nombre, sonido)| AnimalSound {
                    nombre: (*nombre).into(),
                    sonido: (*sonido).into(),
                })
                .collect(),
                instrucciones: "Escucha el sonido y di qué animal es".into(),
            },
        },
        Entry {
            title: "Hábitats de Animales",
            description: "Asocia animales con sus hogares",
            tier: Tier::Basico2,
            reward_points: 18,
            estimated_minutes: 10,
            content: ActivityContent::Asociacion {
                pares: pairs(&[("pez", "agua"), ("pájaro", "aire"), ("conejo", "tierra")]),
                instrucciones: "¿Dónde vive este animal?".into(),
            },
        },
        Entry {
            title: "Características de Animales",
            description: "Clasifica animales por sus características",
            tier: Tier::Intermedio1,
            reward_points: 25,
            estimated_minutes: 12,
            content: ActivityContent::Clasificacion {
                grupos: words(&["mamíferos", "aves", "peces"]),
                elementos: words(&[
                    "perro", "gato", "vaca", "pollo", "pato", "águila", "pez dorado", "tiburón",
                    "salmón",
                ]),
                instrucciones: "Agrupa los animales por su tipo".into(),
            },
        },
    ]
}

/// The full built-in catalog, category by category, in ladder order.
pub fn default_catalog() -> Vec<NewActivity> {
    let sections = [
        (Category::Lenguaje, lenguaje()),
        (Category::Numeros, numeros()),
        (Category::Colores, colores()),
        (Category::Animales, animales()),
    ];
    sections
        .into_iter()
        .flat_map(|(category, entries)| entries.into_iter().map(move |e| e.into_new(category)))
        .collect()
}

/// Insert the built-in catalog into an empty store.
///
/// Returns the number of activities inserted; 0 when the catalog already
/// has entries.
pub fn seed_default_catalog(db: &Database) -> Result<usize> {
    db.immediate(|db| {
        if db.count_activities()? > 0 {
            return Ok(0);
        }
        let catalog = default_catalog();
        for activity in &catalog {
            db.insert_activity(activity)?;
        }
        info!(count = catalog.len(), "default catalog seeded");
        Ok(catalog.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_category() {
        let catalog = default_catalog();
        let count = |c: Category| catalog.iter().filter(|a| a.category == c).count();
        assert_eq!(count(Category::Lenguaje), 11);
        assert_eq!(count(Category::Numeros), 11);
        assert_eq!(count(Category::Colores), 3);
        assert_eq!(count(Category::Animales), 3);
    }

    #[test]
    fn each_category_starts_at_the_lowest_tier_and_climbs() {
        let catalog = default_catalog();
        for category in Category::ALL {
            let tiers: Vec<Tier> = catalog
                .iter()
                .filter(|a| a.category == category)
                .map(|a| a.tier)
                .collect();
            assert_eq!(tiers.first(), Some(&Tier::Inicial), "{category}");
            assert!(tiers.windows(2).all(|w| w[0] < w[1]), "{category}");
        }
    }

    #[test]
    fn seeding_is_idempotent() {
        let db = Database::open_memory().unwrap();
        assert_eq!(seed_default_catalog(&db).unwrap(), 28);
        assert_eq!(seed_default_catalog(&db).unwrap(), 0);
        assert_eq!(db.list_activities(None, true).unwrap().len(), 28);
    }
}
