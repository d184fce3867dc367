use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use adsdash_common::report::{self, LeadIndex, ProjectStats};
use adsdash_common::{week, Developer, LeadTotals, WeekInfo};

use crate::auth::{self, Session};
use crate::templates::{render_ads, render_developers, render_login, AdsView, DevelopersView};
use crate::AppState;

/// Rollups shown under the report.
const HISTORY_ROWS: i64 = 10;

/// Furthest week back the report navigates to (about a century).
pub const MAX_WEEK_OFFSET: u32 = 5200;

/// Developers shown in the selector when no favorites are saved.
const DEFAULT_DEVELOPER_COUNT: usize = 20;

// --- Auth pages (no Session required) ---

#[derive(Deserialize)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
}

pub async fn login_page() -> impl IntoResponse {
    Html(render_login(None))
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    axum::Form(form): axum::Form<LoginForm>,
) -> Response {
    let login = form.login.trim();

    if !auth::check_credentials(&state.config, login, &form.password) {
        warn!(login, "Failed login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Html(render_login(Some("Invalid login or password."))),
        )
            .into_response();
    }

    info!(login, "User signed in");
    let cookie = auth::session_cookie(login, &state.config.session_secret);
    redirect_with_cookie("/ads", cookie)
}

pub async fn logout() -> Response {
    redirect_with_cookie("/login", auth::clear_session_cookie())
}

fn redirect_with_cookie(location: &'static str, cookie: String) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_string()), (header::SET_COOKIE, cookie)],
    )
        .into_response()
}

// --- Report ---

#[derive(Deserialize)]
pub struct AdsQuery {
    week: Option<String>,
}

/// `?week=N` counts weeks back from the current one, capped at [`MAX_WEEK_OFFSET`].
/// Anything unparseable means the current week.
pub fn parse_week_offset(raw: Option<&str>) -> u32 {
    raw.and_then(|w| w.trim().parse::<u32>().ok())
        .map_or(0, |offset| offset.min(MAX_WEEK_OFFSET))
}

pub async fn ads_page(
    session: Session,
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdsQuery>,
) -> impl IntoResponse {
    let offset = parse_week_offset(params.week.as_deref());
    let week: WeekInfo = week::week_at_offset(week::today(), offset);
    let range = week.range();

    let loaded = tokio::try_join!(
        state.store.ad_spend(range),
        state.store.lead_counts(range),
        state.store.tilda_totals(range),
        state.store.recent_weeks(HISTORY_ROWS),
    );

    let (spend, leads, tilda, history, error) = match loaded {
        Ok((spend, leads, tilda, history)) => (spend, leads, tilda, history, None),
        Err(e) => {
            warn!(week_start = %range.start, error = %e, "Failed to load report data");
            (
                Vec::new(),
                Vec::new(),
                LeadTotals::default(),
                Vec::new(),
                Some(e.to_string()),
            )
        }
    };

    let campaigns = report::build_campaigns(&spend, &LeadIndex::from_rows(&leads));
    let totals = report::totals(&campaigns);

    Html(render_ads(&AdsView {
        user: &session.login,
        week: &week,
        offset,
        campaigns: &campaigns,
        totals,
        tilda,
        history: &history,
        error: error.as_deref(),
    }))
}

// --- Developers ---

#[derive(Deserialize)]
pub struct DevelopersQuery {
    developer: Option<String>,
    filter: Option<String>,
}

/// Selector contents: favorites in directory order, or the first developers when none are saved.
pub fn selector_developers(all: &[Developer], favorites: &[i64]) -> Vec<Developer> {
    if favorites.is_empty() {
        all.iter().take(DEFAULT_DEVELOPER_COUNT).cloned().collect()
    } else {
        all.iter()
            .filter(|d| favorites.contains(&d.id))
            .cloned()
            .collect()
    }
}

pub async fn developers_page(
    session: Session,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DevelopersQuery>,
) -> impl IntoResponse {
    let only_with_units = params.filter.as_deref() == Some("with_units");

    let loaded = tokio::try_join!(
        state.inventory.developers(),
        state.store.favorite_developers(),
        state.store.campaign_names(),
    );
    let (all, favorites, campaign_names) = match loaded {
        Ok(data) => data,
        Err(e) => {
            warn!(error = %e, "Failed to load developers");
            return Html(render_developers(&DevelopersView {
                user: &session.login,
                developers: &[],
                all_developers: &[],
                favorites: &[],
                selected: None,
                only_with_units,
                rows: &[],
                stats: ProjectStats::default(),
                error: Some(&e.to_string()),
            }));
        }
    };

    let developers = selector_developers(&all, &favorites);
    let selected = params
        .developer
        .as_deref()
        .and_then(|d| d.trim().parse::<i64>().ok())
        .or_else(|| developers.first().map(|d| d.id));

    let mut error = None;
    let (rows, stats) = match selected {
        Some(id) => match state.inventory.projects_by_developer(id).await {
            Ok(projects) => report::project_rows(projects, &campaign_names, only_with_units),
            Err(e) => {
                warn!(developer_id = id, error = %e, "Failed to load projects");
                error = Some(e.to_string());
                (Vec::new(), ProjectStats::default())
            }
        },
        None => (Vec::new(), ProjectStats::default()),
    };

    Html(render_developers(&DevelopersView {
        user: &session.login,
        developers: &developers,
        all_developers: &all,
        favorites: &favorites,
        selected,
        only_with_units,
        rows: &rows,
        stats,
        error: error.as_deref(),
    }))
}
