use super::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.config.environment.as_str(),
        "db_initialized": state.gate.is_ready(),
        "db_type": state.config.database.kind(),
        "db_error": state.gate.last_error().map(|e| e.to_string()),
    }))
}

pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Route not found"})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_returns_404() {
        let (status, Json(body)) = not_found().await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route not found");
    }
}
