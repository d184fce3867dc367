use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use adsdash_common::{CampaignSpend, DateRange};

use crate::auth;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Weekly spend snapshot pushed by the Google Ads script.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub campaigns: Vec<CampaignSpend>,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
}

#[derive(Deserialize)]
pub struct SecretQuery {
    secret: Option<String>,
}

/// Parse and validate a snapshot body.
pub fn parse_payload(body: &[u8]) -> Result<WebhookPayload, String> {
    let payload: WebhookPayload =
        serde_json::from_slice(body).map_err(|e| format!("Invalid payload: {e}"))?;
    if payload.week_start > payload.week_end {
        return Err(format!(
            "weekStart {} is after weekEnd {}",
            payload.week_start, payload.week_end
        ));
    }
    Ok(payload)
}

pub async fn status() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Replace the stored spend snapshot for the payload's week.
pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    if !auth::webhook_secret_matches(
        &headers,
        query.secret.as_deref(),
        state.config.webhook_secret.as_deref(),
    ) {
        warn!("Webhook rejected: bad or missing secret");
        return Err(ApiError::Unauthorized);
    }

    let payload = parse_payload(&body).map_err(|msg| {
        warn!(error = %msg, "Webhook rejected: malformed payload");
        ApiError::BadRequest(msg)
    })?;

    let range = DateRange::new(payload.week_start, payload.week_end);
    let rows = state.store.replace_ad_spend(range, &payload.campaigns).await?;

    info!(
        week_start = %range.start,
        week_end = %range.end,
        campaigns = payload.campaigns.len(),
        rows,
        "Ad spend snapshot saved"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!(
            "Saved {} campaigns for week {} - {}",
            payload.campaigns.len(),
            range.start,
            range.end
        ),
    })))
}
