pub mod error;
pub mod types;
pub mod utm;

pub use error::{CrmError, Result};
pub use types::{
    Account, ClassifiedLead, ClassifiedLeads, LeadBucket, RawLead, UtmFields,
};
pub use utm::{classify_lead, classify_leads, parse_adgroup_id, parse_campaign_id};

use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use types::LeadsPage;

/// Leads requested per page; a shorter page means the last page.
pub const PAGE_SIZE: u32 = 250;

/// Hard cap on pages per call to bound latency and API cost.
pub const MAX_PAGES: u32 = 100;

/// Pause between pages to stay under the CRM rate limit.
pub const PAGE_DELAY: Duration = Duration::from_millis(200);

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CrmSettings {
    /// e.g. `https://example.amocrm.ru/api/v4`. `None` when no domain is configured.
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub qualified_tag: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay: Duration,
    pub timeout: Duration,
}

impl CrmSettings {
    pub fn new(domain: Option<&str>, access_token: Option<&str>, qualified_tag: &str) -> Self {
        Self {
            base_url: domain.map(|d| format!("https://{}/api/v4", d.trim_end_matches('/'))),
            access_token: access_token.map(str::to_string),
            qualified_tag: qualified_tag.to_string(),
            page_size: PAGE_SIZE,
            max_pages: MAX_PAGES,
            page_delay: PAGE_DELAY,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

pub struct CrmClient {
    client: reqwest::Client,
    settings: CrmSettings,
}

impl CrmClient {
    pub fn new(settings: CrmSettings) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &CrmSettings {
        &self.settings
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.settings.base_url, &self.settings.access_token) {
            (Some(base), Some(token)) => Ok((base.as_str(), token.as_str())),
            _ => Err(CrmError::NotConfigured),
        }
    }

    /// Fetch every lead created between local start-of-day `start` and 23:59:59 on `end`.
    ///
    /// Any request failure aborts the whole call; partial pages are never returned.
    pub async fn fetch_leads(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawLead>> {
        let (base, token) = self.credentials()?;
        let (from, to) = query_window(start, end);
        let url = format!("{base}/leads");

        let mut leads = Vec::new();
        let mut page: u32 = 1;

        loop {
            let resp = self
                .client
                .get(&url)
                .bearer_auth(token)
                .query(&[
                    ("page", page.to_string()),
                    ("limit", self.settings.page_size.to_string()),
                    ("filter[created_at][from]", from.to_string()),
                    ("filter[created_at][to]", to.to_string()),
                    ("with", "contacts,source".to_string()),
                ])
                .send()
                .await?;

            let status = resp.status();
            if status == StatusCode::NO_CONTENT {
                break;
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(CrmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let body = resp.text().await?;
            let parsed: LeadsPage = serde_json::from_str(&body)?;
            let Some(embedded) = parsed.embedded else {
                break;
            };

            let page_len = embedded.leads.len();
            for value in embedded.leads {
                match serde_json::from_value::<RawLead>(value) {
                    Ok(lead) => leads.push(lead),
                    Err(e) => warn!(page, error = %e, "Skipping lead with unexpected shape"),
                }
            }
            debug!(page, page_len, total = leads.len(), "Fetched leads page");

            if page_len < self.settings.page_size as usize {
                break;
            }

            page += 1;
            if page > self.settings.max_pages {
                warn!(max_pages = self.settings.max_pages, "Lead page cap reached, stopping early");
                break;
            }

            tokio::time::sleep(self.settings.page_delay).await;
        }

        info!(%start, %end, count = leads.len(), "Fetched leads from CRM");
        Ok(leads)
    }

    /// Fetch leads for the range and split them into UTM and Tilda buckets.
    pub async fn fetch_classified(&self, start: NaiveDate, end: NaiveDate) -> Result<ClassifiedLeads> {
        let raw = self.fetch_leads(start, end).await?;
        let classified = classify_leads(&raw, &self.settings.qualified_tag);
        info!(
            %start,
            %end,
            raw = raw.len(),
            utm = classified.utm.len(),
            tilda = classified.tilda.len(),
            "Classified CRM leads"
        );
        Ok(classified)
    }

    /// Size of one unfiltered page of at most `limit` leads, for connectivity diagnostics.
    pub async fn sample_leads(&self, limit: u32) -> Result<usize> {
        let (base, token) = self.credentials()?;
        let resp = self
            .client
            .get(format!("{base}/leads"))
            .bearer_auth(token)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(0);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let parsed: LeadsPage = serde_json::from_str(&body)?;
        Ok(parsed.embedded.map(|e| e.leads.len()).unwrap_or(0))
    }

    /// `GET /account`, for connectivity diagnostics.
    pub async fn account(&self) -> Result<Account> {
        let (base, token) = self.credentials()?;
        let resp = self
            .client
            .get(format!("{base}/account"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CrmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// `filter[created_at]` bounds: local 00:00:00 on `start` through local 23:59:59 on `end`.
fn query_window(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
    let from = local_timestamp(start.and_time(NaiveTime::MIN));
    let to = local_timestamp(end.and_time(
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
    ));
    (from, to)
}

/// Unix seconds for a local wall-clock time. Times skipped by a DST jump fall back to UTC.
fn local_timestamp(at: NaiveDateTime) -> i64 {
    Local
        .from_local_datetime(&at)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| at.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn local_timestamp_uses_local_wall_clock() {
        let at = date(2026, 1, 3).and_hms_opt(0, 0, 0).unwrap();
        let expected = Local.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap().timestamp();
        assert_eq!(local_timestamp(at), expected);
    }

    #[test]
    fn query_window_spans_whole_local_days() {
        let (from, to) = query_window(date(2026, 1, 3), date(2026, 1, 9));
        assert_eq!(from, Local.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap().timestamp());
        assert_eq!(to, Local.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap().timestamp());
        assert_eq!(to - from, 7 * 86_400 - 1);
    }

    #[test]
    fn single_day_window() {
        let day = date(2026, 1, 7);
        let (from, to) = query_window(day, day);
        assert_eq!(to - from, 86_399);
    }
}
