use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content: String,
    pub category: ExperienceCategory,
    pub difficulty: Difficulty,
    pub duration: String,
    /// Per-person price in minor units.
    pub price: i64,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperienceCategory {
    Iniciacion,
    Formacion,
    Expedicion,
}

impl ExperienceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceCategory::Iniciacion => "INICIACION",
            ExperienceCategory::Formacion => "FORMACION",
            ExperienceCategory::Expedicion => "EXPEDICION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INICIACION" => Some(ExperienceCategory::Iniciacion),
            "FORMACION" => Some(ExperienceCategory::Formacion),
            "EXPEDICION" => Some(ExperienceCategory::Expedicion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Principiante,
    Intermedio,
    Avanzado,
    Experto,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Principiante => "PRINCIPIANTE",
            Difficulty::Intermedio => "INTERMEDIO",
            Difficulty::Avanzado => "AVANZADO",
            Difficulty::Experto => "EXPERTO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRINCIPIANTE" => Some(Difficulty::Principiante),
            "INTERMEDIO" => Some(Difficulty::Intermedio),
            "AVANZADO" => Some(Difficulty::Avanzado),
            "EXPERTO" => Some(Difficulty::Experto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDate {
    pub id: String,
    pub experience_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_attendees: i64,
    /// Overrides the experience price when set.
    pub price: Option<i64>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl ExperienceDate {
    pub fn price_per_person(&self, experience: &Experience) -> i64 {
        self.price.unwrap_or(experience.price)
    }
}

/// Date annotated with live capacity for the public listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateWithAvailability {
    #[serde(flatten)]
    pub date: ExperienceDate,
    pub available_spots: i64,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: String,
    pub experience_id: Option<String>,
    pub name: String,
    pub content: String,
    pub rating: i64,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}
