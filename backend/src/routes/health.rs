use axum::{extract::State, http::StatusCode, Json};
use diesel_async::RunQueryDsl;
use shared::HealthResponse;
use std::sync::Arc;

use crate::AppState;

/// Liveness plus a `SELECT 1` round trip; 503 when the database is unreachable.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match state.pool.get().await {
        Ok(mut conn) => diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .is_ok(),
        Err(e) => {
            tracing::warn!("Health check could not get a connection: {e}");
            false
        }
    };

    if database_ok {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: "ok".to_string(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".to_string(),
                database: "unavailable".to_string(),
            }),
        )
    }
}
