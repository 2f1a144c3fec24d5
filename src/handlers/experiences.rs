use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries::{experiences, testimonials};
use crate::errors::AppError;
use crate::models::{
    DateWithAvailability, Difficulty, Experience, ExperienceCategory, ExperienceDate, Testimonial,
};
use crate::services::availability;
use crate::state::AppState;

fn parse_category(s: &str) -> Result<ExperienceCategory, AppError> {
    ExperienceCategory::parse(s).ok_or_else(|| AppError::BadRequest(format!("invalid category: {s}")))
}

fn parse_difficulty(s: &str) -> Result<Difficulty, AppError> {
    Difficulty::parse(s).ok_or_else(|| AppError::BadRequest(format!("invalid difficulty: {s}")))
}

// GET /api/experiences
#[derive(Deserialize)]
pub struct ExperiencesQuery {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceListItem {
    #[serde(flatten)]
    pub experience: Experience,
    pub dates: Vec<ExperienceDate>,
    pub testimonial_count: i64,
}

pub async fn list_experiences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExperiencesQuery>,
) -> Result<Json<Vec<ExperienceListItem>>, AppError> {
    let category = query.category.as_deref().map(parse_category).transpose()?;
    let difficulty = query.difficulty.as_deref().map(parse_difficulty).transpose()?;
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let db = state.db()?;
    let items = experiences::list_active_experiences(&db, category, difficulty, limit, offset)?
        .into_iter()
        .map(|experience| {
            Ok(ExperienceListItem {
                dates: experiences::upcoming_dates(&db, &experience.id, None)?,
                testimonial_count: experiences::count_active_testimonials(&db, &experience.id)?,
                experience,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(items))
}

// GET /api/experiences/:slug
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDetail {
    #[serde(flatten)]
    pub experience: Experience,
    pub dates: Vec<DateWithAvailability>,
    pub testimonials: Vec<Testimonial>,
}

pub async fn get_experience(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ExperienceDetail>, AppError> {
    let db = state.db()?;
    let experience = experiences::get_experience_by_slug(&db, &slug)?
        .ok_or_else(|| AppError::NotFound("experience not found".to_string()))?;

    let mut dates = vec![];
    for date in experiences::upcoming_dates(&db, &experience.id, None)? {
        let (available_spots, is_available) = availability::date_availability(&db, &date)?;
        dates.push(DateWithAvailability {
            date,
            available_spots,
            is_available,
        });
    }
    let testimonials = testimonials::active_for_experience(&db, &experience.id, 10)?;

    Ok(Json(ExperienceDetail {
        experience,
        dates,
        testimonials,
    }))
}

// GET /api/experiences/category/:category
pub async fn list_by_category(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> Result<Json<Vec<ExperienceListItem>>, AppError> {
    let category = parse_category(&category)?;

    let db = state.db()?;
    let items = experiences::list_active_experiences(&db, Some(category), None, 100, 0)?
        .into_iter()
        .map(|experience| {
            Ok(ExperienceListItem {
                dates: experiences::upcoming_dates(&db, &experience.id, Some(3))?,
                testimonial_count: experiences::count_active_testimonials(&db, &experience.id)?,
                experience,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(items))
}
