use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::extract::{AdminUser, ValidJson};
use crate::db::queries::dashboard::{self, DashboardStats};
use crate::db::queries::{blog, experiences, testimonials};
use crate::errors::AppError;
use crate::models::{
    Category, Difficulty, Experience, ExperienceCategory, ExperienceDate, Post, Testimonial,
};
use crate::services::availability;
use crate::state::AppState;

fn not_found(what: &str) -> AppError {
    AppError::NotFound(format!("{what} not found"))
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let ok = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("slug").with_message("slug must be lowercase letters, digits and dashes".into()))
    }
}

fn default_true() -> bool {
    true
}

// ── Experiences ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminExperience {
    #[serde(flatten)]
    pub experience: Experience,
    pub dates: Vec<ExperienceDate>,
    pub booking_count: i64,
    pub testimonial_count: i64,
}

// GET /api/admin/experiences
pub async fn list_experiences(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<AdminExperience>>, AppError> {
    let db = state.db()?;
    let items = experiences::list_all_experiences(&db)?
        .into_iter()
        .map(|experience| {
            Ok(AdminExperience {
                dates: experiences::all_dates(&db, &experience.id)?,
                booking_count: experiences::count_bookings(&db, &experience.id)?,
                testimonial_count: experiences::count_testimonials(&db, &experience.id)?,
                experience,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(items))
}

// POST /api/admin/experiences
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExperienceRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    pub category: ExperienceCategory,
    pub difficulty: Difficulty,
    #[validate(length(min = 1, message = "duration is required"))]
    pub duration: String,
    #[validate(range(min = 1, message = "price must be positive"))]
    pub price: i64,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(url(message = "videoUrl must be a URL"))]
    pub video_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

pub async fn create_experience(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    ValidJson(req): ValidJson<CreateExperienceRequest>,
) -> Result<(StatusCode, Json<Experience>), AppError> {
    let now = Utc::now().naive_utc();
    let experience = Experience {
        id: Uuid::new_v4().to_string(),
        title: req.title,
        slug: req.slug,
        description: req.description,
        content: req.content,
        category: req.category,
        difficulty: req.difficulty,
        duration: req.duration,
        price: req.price,
        includes: req.includes,
        excludes: req.excludes,
        images: req.images,
        video_url: req.video_url,
        is_active: req.is_active,
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db()?;
        experiences::create_experience(&db, &experience)
            .map_err(|e| AppError::from_unique(e, "slug already in use"))?;
    }
    tracing::info!(experience_id = %experience.id, slug = %experience.slug, admin_id = %admin.id, "experience created");

    Ok((StatusCode::CREATED, Json(experience)))
}

// PUT /api/admin/experiences/:id
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateExperienceRequest {
    #[validate(length(min = 1, message = "title cannot be empty"))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,
    #[validate(length(min = 1, message = "description cannot be empty"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "content cannot be empty"))]
    pub content: Option<String>,
    pub category: Option<ExperienceCategory>,
    pub difficulty: Option<Difficulty>,
    #[validate(length(min = 1, message = "duration cannot be empty"))]
    pub duration: Option<String>,
    #[validate(range(min = 1, message = "price must be positive"))]
    pub price: Option<i64>,
    pub includes: Option<Vec<String>>,
    pub excludes: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    #[validate(url(message = "videoUrl must be a URL"))]
    pub video_url: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn update_experience(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateExperienceRequest>,
) -> Result<Json<Experience>, AppError> {
    let db = state.db()?;
    let mut exp = experiences::get_experience(&db, &id)?.ok_or_else(|| not_found("experience"))?;

    if let Some(v) = req.title {
        exp.title = v;
    }
    if let Some(v) = req.slug {
        exp.slug = v;
    }
    if let Some(v) = req.description {
        exp.description = v;
    }
    if let Some(v) = req.content {
        exp.content = v;
    }
    if let Some(v) = req.category {
        exp.category = v;
    }
    if let Some(v) = req.difficulty {
        exp.difficulty = v;
    }
    if let Some(v) = req.duration {
        exp.duration = v;
    }
    if let Some(v) = req.price {
        exp.price = v;
    }
    if let Some(v) = req.includes {
        exp.includes = v;
    }
    if let Some(v) = req.excludes {
        exp.excludes = v;
    }
    if let Some(v) = req.images {
        exp.images = v;
    }
    if req.video_url.is_some() {
        exp.video_url = req.video_url;
    }
    if let Some(v) = req.is_active {
        exp.is_active = v;
    }

    experiences::update_experience(&db, &exp)
        .map_err(|e| AppError::from_unique(e, "slug already in use"))?;
    let updated = experiences::get_experience(&db, &id)?.ok_or_else(|| not_found("experience"))?;
    Ok(Json(updated))
}

// DELETE /api/admin/experiences/:id
pub async fn delete_experience(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = {
        let db = state.db()?;
        if experiences::count_bookings(&db, &id)? > 0 {
            return Err(AppError::BadRequest(
                "experience has bookings; deactivate it instead".to_string(),
            ));
        }
        experiences::delete_experience(&db, &id)?
    };
    if !deleted {
        return Err(not_found("experience"));
    }
    tracing::info!(experience_id = %id, admin_id = %admin.id, "experience deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Experience Dates ──

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDateRequest {
    #[validate(length(min = 1, message = "experienceId is required"))]
    pub experience_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 1, message = "maxAttendees must be positive"))]
    pub max_attendees: i64,
    #[validate(range(min = 1, message = "price must be positive"))]
    pub price: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::BadRequest("endDate cannot be before startDate".to_string()));
    }
    Ok(())
}

// POST /api/admin/experience-dates
pub async fn create_date(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidJson(req): ValidJson<CreateDateRequest>,
) -> Result<(StatusCode, Json<ExperienceDate>), AppError> {
    check_range(req.start_date, req.end_date)?;

    let date = ExperienceDate {
        id: Uuid::new_v4().to_string(),
        experience_id: req.experience_id,
        start_date: req.start_date,
        end_date: req.end_date,
        max_attendees: req.max_attendees,
        price: req.price,
        is_active: req.is_active,
        created_at: Utc::now().naive_utc(),
    };

    let db = state.db()?;
    if experiences::get_experience(&db, &date.experience_id)?.is_none() {
        return Err(not_found("experience"));
    }
    experiences::create_date(&db, &date)?;
    tracing::info!(date_id = %date.id, experience_id = %date.experience_id, "experience date created");

    Ok((StatusCode::CREATED, Json(date)))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateDateRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[validate(range(min = 1, message = "maxAttendees must be positive"))]
    pub max_attendees: Option<i64>,
    #[validate(range(min = 1, message = "price must be positive"))]
    pub price: Option<i64>,
    pub is_active: Option<bool>,
}

// PUT /api/admin/experience-dates/:id
pub async fn update_date(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateDateRequest>,
) -> Result<Json<ExperienceDate>, AppError> {
    let db = state.db()?;
    let mut date = experiences::get_date(&db, &id)?.ok_or_else(|| not_found("experience date"))?;

    if let Some(v) = req.start_date {
        date.start_date = v;
    }
    if let Some(v) = req.end_date {
        date.end_date = v;
    }
    if let Some(v) = req.price {
        date.price = Some(v);
    }
    if let Some(v) = req.is_active {
        date.is_active = v;
    }
    check_range(date.start_date, date.end_date)?;

    if let Some(max) = req.max_attendees {
        let confirmed = availability::capacity_of(&db, &date)?.confirmed;
        if max < confirmed {
            return Err(AppError::BadRequest(format!(
                "maxAttendees cannot drop below the {confirmed} confirmed attendees"
            )));
        }
        date.max_attendees = max;
    }

    experiences::update_date(&db, &date)?;
    Ok(Json(date))
}

// DELETE /api/admin/experience-dates/:id
pub async fn delete_date(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = state.db()?;
    if experiences::count_date_bookings(&db, &id)? > 0 {
        return Err(AppError::BadRequest(
            "date has bookings; deactivate it instead".to_string(),
        ));
    }
    if !experiences::delete_date(&db, &id)? {
        return Err(not_found("experience date"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Posts ──

// GET /api/admin/posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<Post>>, AppError> {
    let db = state.db()?;
    let (posts, _) = blog::list_posts(&db, None, None, -1, 0)?;
    Ok(Json(posts))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[validate(length(min = 1, message = "excerpt is required"))]
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

fn check_category(conn: &rusqlite::Connection, category_id: Option<&str>) -> Result<(), AppError> {
    if let Some(id) = category_id {
        if !blog::category_exists(conn, id)? {
            return Err(AppError::BadRequest("category does not exist".to_string()));
        }
    }
    Ok(())
}

// POST /api/admin/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidJson(req): ValidJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let now = Utc::now().naive_utc();
    let id = Uuid::new_v4().to_string();
    let post = Post {
        id: id.clone(),
        title: req.title,
        slug: req.slug,
        content: req.content,
        excerpt: req.excerpt,
        cover_image: req.cover_image,
        category_id: req.category_id,
        is_published: req.is_published,
        category: None,
        created_at: now,
        updated_at: now,
    };

    let db = state.db()?;
    check_category(&db, post.category_id.as_deref())?;
    blog::create_post(&db, &post).map_err(|e| AppError::from_unique(e, "slug already in use"))?;
    let created = blog::get_post(&db, &id)?.ok_or_else(|| not_found("post"))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, message = "title cannot be empty"))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,
    #[validate(length(min = 1, message = "content cannot be empty"))]
    pub content: Option<String>,
    #[validate(length(min = 1, message = "excerpt cannot be empty"))]
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub category_id: Option<String>,
    pub is_published: Option<bool>,
}

// PUT /api/admin/posts/:id
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let db = state.db()?;
    let mut post = blog::get_post(&db, &id)?.ok_or_else(|| not_found("post"))?;

    check_category(&db, req.category_id.as_deref())?;
    if let Some(v) = req.title {
        post.title = v;
    }
    if let Some(v) = req.slug {
        post.slug = v;
    }
    if let Some(v) = req.content {
        post.content = v;
    }
    if let Some(v) = req.excerpt {
        post.excerpt = v;
    }
    if req.cover_image.is_some() {
        post.cover_image = req.cover_image;
    }
    if req.category_id.is_some() {
        post.category_id = req.category_id;
    }
    if let Some(v) = req.is_published {
        post.is_published = v;
    }

    blog::update_post(&db, &post).map_err(|e| AppError::from_unique(e, "slug already in use"))?;
    let updated = blog::get_post(&db, &id)?.ok_or_else(|| not_found("post"))?;
    Ok(Json(updated))
}

// DELETE /api/admin/posts/:id
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = state.db()?;
    if !blog::delete_post(&db, &id)? {
        return Err(not_found("post"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/admin/categories
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidJson(req): ValidJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = Category {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        slug: req.slug,
    };
    let db = state.db()?;
    blog::create_category(&db, &category)
        .map_err(|e| AppError::from_unique(e, "category name or slug already in use"))?;
    Ok((StatusCode::CREATED, Json(category)))
}

// ── Testimonials ──

// GET /api/admin/testimonials
pub async fn list_testimonials(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<Testimonial>>, AppError> {
    let db = state.db()?;
    Ok(Json(testimonials::list_testimonials(&db)?))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestimonialRequest {
    pub experience_id: Option<String>,
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i64,
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn check_experience(conn: &rusqlite::Connection, experience_id: Option<&str>) -> Result<(), AppError> {
    if let Some(id) = experience_id {
        if experiences::get_experience(conn, id)?.is_none() {
            return Err(AppError::BadRequest("experience does not exist".to_string()));
        }
    }
    Ok(())
}

// POST /api/admin/testimonials
pub async fn create_testimonial(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidJson(req): ValidJson<CreateTestimonialRequest>,
) -> Result<(StatusCode, Json<Testimonial>), AppError> {
    let testimonial = Testimonial {
        id: Uuid::new_v4().to_string(),
        experience_id: req.experience_id,
        name: req.name,
        content: req.content,
        rating: req.rating,
        image_url: req.image_url,
        is_active: req.is_active,
        created_at: Utc::now().naive_utc(),
    };

    let db = state.db()?;
    check_experience(&db, testimonial.experience_id.as_deref())?;
    testimonials::create_testimonial(&db, &testimonial)?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTestimonialRequest {
    pub experience_id: Option<String>,
    #[validate(length(min = 1, message = "name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "content cannot be empty"))]
    pub content: Option<String>,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: Option<i64>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

// PUT /api/admin/testimonials/:id
pub async fn update_testimonial(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateTestimonialRequest>,
) -> Result<Json<Testimonial>, AppError> {
    let db = state.db()?;
    let mut t = testimonials::get_testimonial(&db, &id)?.ok_or_else(|| not_found("testimonial"))?;

    check_experience(&db, req.experience_id.as_deref())?;
    if req.experience_id.is_some() {
        t.experience_id = req.experience_id;
    }
    if let Some(v) = req.name {
        t.name = v;
    }
    if let Some(v) = req.content {
        t.content = v;
    }
    if let Some(v) = req.rating {
        t.rating = v;
    }
    if req.image_url.is_some() {
        t.image_url = req.image_url;
    }
    if let Some(v) = req.is_active {
        t.is_active = v;
    }

    testimonials::update_testimonial(&db, &t)?;
    Ok(Json(t))
}

// DELETE /api/admin/testimonials/:id
pub async fn delete_testimonial(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let db = state.db()?;
    if !testimonials::delete_testimonial(&db, &id)? {
        return Err(not_found("testimonial"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/admin/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<DashboardStats>, AppError> {
    let db = state.db()?;
    Ok(Json(dashboard::get_dashboard_stats(&db)?))
}
