//! HTTP server for the ads spend / CRM lead dashboard.

pub mod auth;
pub mod error;
pub mod jobs;
pub mod pages;
pub mod rest;
pub mod templates;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    response::Redirect,
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use adsdash_common::Config;
use adsdash_store::{DashboardStore, InventoryReader};
use amocrm_client::CrmClient;

pub struct AppState {
    pub config: Config,
    pub store: DashboardStore,
    pub inventory: InventoryReader,
    pub crm: CrmClient,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // Auth
        .route("/login", get(pages::login_page).post(pages::login_submit))
        .route("/logout", post(pages::logout))
        // Pages
        .route("/", get(|| async { Redirect::to("/ads") }))
        .route("/ads", get(pages::ads_page))
        .route("/developers", get(pages::developers_page))
        // API
        .route("/api/developers/favorites", post(rest::save_favorites))
        .route(
            "/api/webhook/google-ads",
            get(rest::webhook::status).post(rest::webhook::receive),
        )
        .route("/api/cron/sync-amocrm", get(rest::sync::cron_sync))
        .route("/api/cron/update-history", get(rest::sync::cron_update_history))
        .route("/api/sync-now", get(rest::sync::sync_now))
        .route("/api/sync-week", get(rest::sync::sync_week))
        .route("/api/debug/amocrm", get(rest::sync::debug_crm))
        .with_state(state)
        // Internal data: never cache
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        // Logging layer: method + path only (query strings may carry the webhook secret)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
