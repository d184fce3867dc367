use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use adsdash_common::{week, DateRange, WeekInfo};

use crate::auth::{self, ApiSession};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{self, HISTORY_WEEK_DELAY};
use crate::AppState;

/// Leads requested by the connectivity probe.
const PROBE_LIMIT: u32 = 3;

fn require_cron(headers: &HeaderMap, state: &AppState) -> ApiResult<()> {
    if auth::bearer_matches(headers, state.config.cron_secret.as_deref()) {
        Ok(())
    } else {
        warn!("Cron request rejected: bad or missing bearer token");
        Err(ApiError::Unauthorized)
    }
}

// --- Scheduled (bearer token) ---

/// Sync the current week's leads.
pub async fn cron_sync(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    require_cron(&headers, &state)?;
    let week = WeekInfo::current();
    info!(week_start = %week.start_date, "Cron: syncing current week");
    let report = jobs::sync_period(&state.crm, &state.store, week.range()).await?;
    Ok(Json(report))
}

/// Re-sync the previous weeks and refresh their rollups.
pub async fn cron_update_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    require_cron(&headers, &state)?;
    let weeks = week::previous_weeks(state.config.history_weeks);
    let report = jobs::refresh_history(&state.crm, &state.store, &weeks, HISTORY_WEEK_DELAY).await;
    Ok(Json(report))
}

// --- Manual (signed-in users) ---

pub async fn sync_now(
    _session: ApiSession,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let week = WeekInfo::current();
    let report = jobs::sync_period(&state.crm, &state.store, week.range()).await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
pub struct SyncWeekQuery {
    start: Option<String>,
    end: Option<String>,
}

/// Explicit `start`/`end` range, or the current week when both are absent.
pub fn parse_sync_range(start: Option<&str>, end: Option<&str>) -> Result<DateRange, String> {
    let parse = |name: &str, value: &str| {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|_| format!("{name} must be a YYYY-MM-DD date, got {value:?}"))
    };

    match (start, end) {
        (None, None) => Ok(WeekInfo::current().range()),
        (Some(s), Some(e)) => {
            let range = DateRange::new(parse("start", s)?, parse("end", e)?);
            if range.start > range.end {
                return Err(format!("start {} is after end {}", range.start, range.end));
            }
            Ok(range)
        }
        _ => Err("start and end must be given together".to_string()),
    }
}

pub async fn sync_week(
    _session: ApiSession,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SyncWeekQuery>,
) -> ApiResult<impl IntoResponse> {
    let range = parse_sync_range(params.start.as_deref(), params.end.as_deref())
        .map_err(ApiError::BadRequest)?;
    let report = jobs::sync_period(&state.crm, &state.store, range).await?;
    Ok(Json(report))
}

// --- Diagnostics ---

/// CRM connectivity check: configuration summary plus account and leads probes.
pub async fn debug_crm(_session: ApiSession, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let crm = &state.config.crm;
    let config = serde_json::json!({
        "domain": crm.domain.as_deref().unwrap_or("NOT SET"),
        "token_length": crm.access_token.as_ref().map(|t| t.len()).unwrap_or(0),
        "qualified_tag": crm.qualified_tag,
    });

    let mut tests = Vec::new();
    match state.crm.account().await {
        Ok(account) => tests.push(serde_json::json!({
            "name": "Account API",
            "status": "PASS",
            "data": { "id": account.id, "name": account.name },
        })),
        Err(e) => tests.push(serde_json::json!({
            "name": "Account API",
            "status": "FAIL",
            "error": e.to_string(),
        })),
    }
    match state.crm.sample_leads(PROBE_LIMIT).await {
        Ok(count) => tests.push(serde_json::json!({
            "name": "Leads API",
            "status": "PASS",
            "count": count,
        })),
        Err(e) => tests.push(serde_json::json!({
            "name": "Leads API",
            "status": "FAIL",
            "error": e.to_string(),
        })),
    }

    Json(serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config,
        "tests": tests,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_range() {
        let range = parse_sync_range(Some("2026-01-03"), Some("2026-01-09")).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 1, 3).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());
    }

    #[test]
    fn defaults_to_current_week() {
        assert_eq!(parse_sync_range(None, None).unwrap(), WeekInfo::current().range());
    }

    #[test]
    fn rejects_partial_inverted_or_malformed_ranges() {
        assert!(parse_sync_range(Some("2026-01-03"), None).is_err());
        assert!(parse_sync_range(Some("2026-01-09"), Some("2026-01-03")).is_err());
        assert!(parse_sync_range(Some("yesterday"), Some("2026-01-03")).is_err());
    }
}
