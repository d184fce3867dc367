//! CRM → store synchronisation and weekly history rollups.
//!
//! Used by the cron endpoints, the manual sync endpoints and the optional
//! in-process interval loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use adsdash_common::{report, DateRange, WeekHistory, WeekInfo};
use adsdash_store::{BatchOutcome, DashboardStore, LeadTable, StoreError};
use amocrm_client::CrmClient;

use crate::AppState;

/// Pause between weeks in a history refresh, to stay under the CRM rate limit.
pub const HISTORY_WEEK_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrmStatus {
    Ok,
    Unavailable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketReport {
    pub fetched: usize,
    pub saved: usize,
    pub errors: usize,
}

impl BucketReport {
    fn new(fetched: usize, outcome: BatchOutcome) -> Self {
        Self {
            fetched,
            saved: outcome.saved,
            errors: outcome.errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Result of one sync run. An unreachable CRM is reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub period: Period,
    pub crm_status: CrmStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crm_error: Option<String>,
    pub utm: BucketReport,
    pub tilda: BucketReport,
}

/// Pull leads created inside `range` from the CRM and upsert both buckets.
///
/// Only storage failures are errors; a CRM failure yields `crm_status: unavailable`
/// with nothing written.
pub async fn sync_period(
    crm: &CrmClient,
    store: &DashboardStore,
    range: DateRange,
) -> Result<SyncReport, StoreError> {
    let period = Period {
        start: range.start,
        end: range.end,
    };

    let leads = match crm.fetch_classified(range.start, range.end).await {
        Ok(leads) => leads,
        Err(e) => {
            warn!(start = %range.start, end = %range.end, error = %e, "CRM unavailable, nothing synced");
            return Ok(SyncReport {
                success: true,
                period,
                crm_status: CrmStatus::Unavailable,
                crm_error: Some(e.to_string()),
                utm: BucketReport::default(),
                tilda: BucketReport::default(),
            });
        }
    };

    let utm = store.upsert_leads(LeadTable::Utm, &leads.utm).await?;
    let tilda = store.upsert_leads(LeadTable::Tilda, &leads.tilda).await?;

    info!(
        start = %range.start,
        end = %range.end,
        utm_saved = utm.saved,
        utm_errors = utm.errors,
        tilda_saved = tilda.saved,
        tilda_errors = tilda.errors,
        "Lead sync complete"
    );

    Ok(SyncReport {
        success: true,
        period,
        crm_status: CrmStatus::Ok,
        crm_error: None,
        utm: BucketReport::new(leads.utm.len(), utm),
        tilda: BucketReport::new(leads.tilda.len(), tilda),
    })
}

/// One week of a history refresh. `error` is set when the week failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekRefresh {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub display_range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup: Option<WeekHistory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReport {
    pub success: bool,
    pub weeks: Vec<WeekRefresh>,
}

/// Sync and roll up each week in order, pausing `delay` between weeks.
/// A failing week is logged and recorded; the remaining weeks still run.
pub async fn refresh_history(
    crm: &CrmClient,
    store: &DashboardStore,
    weeks: &[WeekInfo],
    delay: Duration,
) -> HistoryReport {
    info!(weeks = weeks.len(), "Refreshing week history");

    let mut results = Vec::with_capacity(weeks.len());
    for (i, week) in weeks.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut refresh = WeekRefresh {
            week_start: week.start_date,
            week_end: week.end_date,
            display_range: week.display_range.clone(),
            sync: None,
            rollup: None,
            error: None,
        };

        match refresh_week(crm, store, week.range()).await {
            Ok((sync, rollup)) => {
                info!(
                    week_start = %week.start_date,
                    total_cost = rollup.total_cost,
                    total_leads = rollup.total_leads,
                    total_qualified = rollup.total_qualified,
                    "Week history updated"
                );
                refresh.sync = Some(sync);
                refresh.rollup = Some(rollup);
            }
            Err(e) => {
                error!(week_start = %week.start_date, error = %e, "Week history refresh failed");
                refresh.error = Some(e.to_string());
            }
        }
        results.push(refresh);
    }

    HistoryReport {
        success: true,
        weeks: results,
    }
}

async fn refresh_week(
    crm: &CrmClient,
    store: &DashboardStore,
    range: DateRange,
) -> Result<(SyncReport, WeekHistory), StoreError> {
    let sync = sync_period(crm, store, range).await?;

    let spend = store.ad_spend(range).await?;
    let leads = store.lead_counts(range).await?;
    let (total_cost, total_leads, total_qualified) = report::rollup(&spend, &leads);

    let rollup = WeekHistory {
        week_start: range.start,
        week_end: range.end,
        total_cost,
        total_leads,
        total_qualified,
    };
    store.upsert_week_history(&rollup).await?;

    Ok((sync, rollup))
}

/// Run the current-week sync every `every`, starting one period from now.
pub fn start_sync_interval(state: Arc<AppState>, every: Duration) {
    info!(interval_secs = every.as_secs(), "Starting lead sync interval loop");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let week = WeekInfo::current();
            match sync_period(&state.crm, &state.store, week.range()).await {
                Ok(report) => info!(
                    week_start = %week.start_date,
                    crm_status = ?report.crm_status,
                    utm_saved = report.utm.saved,
                    tilda_saved = report.tilda.saved,
                    "Scheduled sync finished"
                ),
                Err(e) => error!(week_start = %week.start_date, error = %e, "Scheduled sync failed"),
            }
        }
    });
}
