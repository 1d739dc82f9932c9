use axum::Json;

use crate::models::HealthResponse;

/// `GET /actuator/health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".into(),
        version: warden_core::version().into(),
    })
}
