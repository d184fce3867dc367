pub mod sync;
pub mod webhook;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;

use crate::auth::ApiSession;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesRequest {
    developer_ids: Vec<i64>,
}

/// Replace the favorite developer set with exactly the submitted ids.
pub async fn save_favorites(
    _session: ApiSession,
    State(state): State<Arc<AppState>>,
    body: Result<Json<FavoritesRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) =
        body.map_err(|e| ApiError::bad_request(format!("Invalid request: {}", e.body_text())))?;

    let count = state
        .store
        .replace_favorite_developers(&request.developer_ids)
        .await?;

    Ok(Json(serde_json::json!({"success": true, "count": count})))
}
