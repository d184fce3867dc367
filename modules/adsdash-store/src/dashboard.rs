// Postgres persistence for ad spend, CRM leads, weekly history and favorites.

use adsdash_common::{
    AdSpendRow, CampaignSpend, DateRange, LeadCountRow, LeadTotals, WeekHistory,
};
use amocrm_client::ClassifiedLead;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::Result;

/// Which lead table a batch goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadTable {
    Utm,
    Tilda,
}

impl LeadTable {
    fn name(self) -> &'static str {
        match self {
            LeadTable::Utm => "amocrm_leads",
            LeadTable::Tilda => "tilda_leads",
        }
    }
}

/// Outcome of a batch upsert. Per-row failures are counted, not raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub saved: usize,
    pub errors: usize,
}

#[derive(Debug, sqlx::FromRow)]
struct SpendRecord {
    campaign_id: String,
    campaign_name: String,
    adgroup_id: Option<String>,
    adgroup_name: Option<String>,
    language: Option<String>,
    cost: f64,
    impressions: i64,
    clicks: i64,
}

impl From<SpendRecord> for AdSpendRow {
    fn from(r: SpendRecord) -> Self {
        AdSpendRow {
            campaign_id: r.campaign_id,
            campaign_name: r.campaign_name,
            adgroup_id: r.adgroup_id,
            adgroup_name: r.adgroup_name,
            language: r.language,
            cost: r.cost,
            impressions: r.impressions,
            clicks: r.clicks,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRecord {
    week_start: NaiveDate,
    week_end: NaiveDate,
    total_cost: f64,
    total_leads: i64,
    total_qualified: i64,
}

#[derive(Clone)]
pub struct DashboardStore {
    pool: PgPool,
}

impl DashboardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // --- Ad spend ---

    /// Spend summed per (campaign, ad group) over the range, ordered by campaign then ad group name.
    pub async fn ad_spend(&self, range: DateRange) -> Result<Vec<AdSpendRow>> {
        let rows = sqlx::query_as::<_, SpendRecord>(
            r#"
            SELECT campaign_id,
                   MAX(campaign_name)               AS campaign_name,
                   adgroup_id,
                   MAX(adgroup_name)                AS adgroup_name,
                   MAX(language)                    AS language,
                   SUM(cost)::DOUBLE PRECISION      AS cost,
                   SUM(impressions)::BIGINT         AS impressions,
                   SUM(clicks)::BIGINT              AS clicks
            FROM google_ads_daily
            WHERE date BETWEEN $1 AND $2
            GROUP BY campaign_id, adgroup_id
            ORDER BY MAX(campaign_name), campaign_id, MAX(adgroup_name) NULLS FIRST
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AdSpendRow::from).collect())
    }

    /// Replace every spend row dated inside the range with the snapshot, atomically.
    ///
    /// Each ad group becomes one row dated at the range start; a campaign without ad
    /// groups becomes a single campaign-level row. Returns the number of rows written.
    pub async fn replace_ad_spend(&self, range: DateRange, campaigns: &[CampaignSpend]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM google_ads_daily WHERE date BETWEEN $1 AND $2")
            .bind(range.start)
            .bind(range.end)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut written = 0usize;
        for campaign in campaigns {
            let groups = campaign.ad_groups();
            if groups.is_empty() {
                insert_spend(
                    &mut tx,
                    range.start,
                    campaign,
                    None,
                    campaign.cost,
                    campaign.impressions,
                    campaign.clicks,
                )
                .await?;
                written += 1;
                continue;
            }
            for group in groups {
                insert_spend(
                    &mut tx,
                    range.start,
                    campaign,
                    Some((group.id.as_str(), group.name.as_str())),
                    group.cost,
                    group.impressions,
                    group.clicks,
                )
                .await?;
                written += 1;
            }
        }

        tx.commit().await?;
        info!(start = %range.start, end = %range.end, deleted, written, "Replaced ad spend snapshot");
        Ok(written)
    }

    /// Distinct campaign names, lowercased.
    pub async fn campaign_names(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT LOWER(campaign_name) FROM google_ads_daily ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    // --- Leads ---

    /// Insert or refresh a batch of leads. An existing lead only has its qualification updated.
    ///
    /// Runs on one pooled connection. A failed row is logged and counted; the rest continue.
    pub async fn upsert_leads(&self, table: LeadTable, leads: &[ClassifiedLead]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if leads.is_empty() {
            return Ok(outcome);
        }

        let sql = format!(
            r#"
            INSERT INTO {table}
                (lead_id, created_date, utm_source, utm_medium, utm_campaign,
                 utm_content, utm_term, campaign_id, adgroup_id, is_qualified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (lead_id) DO UPDATE SET is_qualified = EXCLUDED.is_qualified
            "#,
            table = table.name()
        );

        let mut conn = self.pool.acquire().await?;
        for lead in leads {
            let result = sqlx::query(&sql)
                .bind(&lead.lead_id)
                .bind(lead.created_date)
                .bind(&lead.utm.utm_source)
                .bind(&lead.utm.utm_medium)
                .bind(&lead.utm.utm_campaign)
                .bind(&lead.utm.utm_content)
                .bind(&lead.utm.utm_term)
                .bind(&lead.campaign_id)
                .bind(&lead.adgroup_id)
                .bind(lead.is_qualified)
                .execute(&mut *conn)
                .await;

            match result {
                Ok(_) => outcome.saved += 1,
                Err(e) => {
                    warn!(table = table.name(), lead_id = %lead.lead_id, error = %e, "Failed to save lead");
                    outcome.errors += 1;
                }
            }
        }

        info!(table = table.name(), saved = outcome.saved, errors = outcome.errors, "Saved lead batch");
        Ok(outcome)
    }

    /// UTM lead counts per (campaign id, ad group id) created inside the range.
    /// Leads with no parseable ids appear under a `(NULL, NULL)` key.
    pub async fn lead_counts(&self, range: DateRange) -> Result<Vec<LeadCountRow>> {
        let rows = sqlx::query_as::<_, (Option<String>, Option<String>, i64, i64)>(
            r#"
            SELECT campaign_id,
                   adgroup_id,
                   COUNT(*)                                 AS total_leads,
                   COUNT(*) FILTER (WHERE is_qualified)     AS qualified_leads
            FROM amocrm_leads
            WHERE created_date BETWEEN $1 AND $2
            GROUP BY campaign_id, adgroup_id
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(campaign_id, adgroup_id, total_leads, qualified_leads)| LeadCountRow {
                campaign_id,
                adgroup_id,
                total_leads,
                qualified_leads,
            })
            .collect())
    }

    pub async fn tilda_totals(&self, range: DateRange) -> Result<LeadTotals> {
        let (total_leads, qualified_leads) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE is_qualified)
            FROM tilda_leads
            WHERE created_date BETWEEN $1 AND $2
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        Ok(LeadTotals {
            total_leads,
            qualified_leads,
        })
    }

    // --- Weekly history ---

    pub async fn upsert_week_history(&self, week: &WeekHistory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO weeks_history (week_start, week_end, total_cost, total_leads, total_qualified)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (week_start, week_end) DO UPDATE SET
                total_cost = EXCLUDED.total_cost,
                total_leads = EXCLUDED.total_leads,
                total_qualified = EXCLUDED.total_qualified,
                updated_at = now()
            "#,
        )
        .bind(week.week_start)
        .bind(week.week_end)
        .bind(week.total_cost)
        .bind(week.total_leads)
        .bind(week.total_qualified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent weeks first.
    pub async fn recent_weeks(&self, limit: i64) -> Result<Vec<WeekHistory>> {
        let rows = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT week_start, week_end, total_cost, total_leads, total_qualified
            FROM weeks_history
            ORDER BY week_start DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| WeekHistory {
                week_start: r.week_start,
                week_end: r.week_end,
                total_cost: r.total_cost,
                total_leads: r.total_leads,
                total_qualified: r.total_qualified,
            })
            .collect())
    }

    // --- Favorite developers ---

    pub async fn favorite_developers(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT developer_id FROM favorite_developers ORDER BY created_at, developer_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Make the favorites set exactly `ids`. Only the difference is written, in one transaction.
    /// Returns the size of the resulting set.
    pub async fn replace_favorite_developers(&self, ids: &[i64]) -> Result<usize> {
        let mut unique: Vec<i64> = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM favorite_developers WHERE NOT (developer_id = ANY($1))")
            .bind(&unique)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let added = sqlx::query(
            r#"
            INSERT INTO favorite_developers (developer_id)
            SELECT UNNEST($1::BIGINT[])
            ON CONFLICT (developer_id) DO NOTHING
            "#,
        )
        .bind(&unique)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        info!(count = unique.len(), added, removed, "Updated favorite developers");
        Ok(unique.len())
    }
}

async fn insert_spend(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    date: NaiveDate,
    campaign: &CampaignSpend,
    group: Option<(&str, &str)>,
    cost: Option<f64>,
    impressions: Option<i64>,
    clicks: Option<i64>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO google_ads_daily
            (date, campaign_id, campaign_name, adgroup_id, adgroup_name,
             language, cost, impressions, clicks)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT ON CONSTRAINT google_ads_daily_key DO UPDATE SET
            cost = google_ads_daily.cost + EXCLUDED.cost,
            impressions = google_ads_daily.impressions + EXCLUDED.impressions,
            clicks = google_ads_daily.clicks + EXCLUDED.clicks
        "#,
    )
    .bind(date)
    .bind(&campaign.id)
    .bind(&campaign.name)
    .bind(group.map(|(id, _)| id))
    .bind(group.map(|(_, name)| name))
    .bind(&campaign.language)
    .bind(cost.unwrap_or(0.0))
    .bind(impressions.unwrap_or(0))
    .bind(clicks.unwrap_or(0))
    .execute(&mut **tx)
    .await?;
    Ok(())
}
