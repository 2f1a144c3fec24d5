use axum::Json;
use chrono::Utc;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
