use super::AppState;
use crate::error::AppError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Block until the database is ready, then hand it to the handler as an
/// `Extension<Arc<Database>>`.
pub async fn require_database(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let db = state.gate.ready().await?;
    request.extensions_mut().insert(db);
    Ok(next.run(request).await)
}
