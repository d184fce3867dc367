use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// Ad spend summed over a date range for one campaign, or one ad group of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdSpendRow {
    pub campaign_id: String,
    pub campaign_name: String,
    pub adgroup_id: Option<String>,
    pub adgroup_name: Option<String>,
    pub language: Option<String>,
    pub cost: f64,
    pub impressions: i64,
    pub clicks: i64,
}

/// Lead counts for one attribution key over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadCountRow {
    pub campaign_id: Option<String>,
    pub adgroup_id: Option<String>,
    pub total_leads: i64,
    pub qualified_leads: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeadTotals {
    pub total_leads: i64,
    pub qualified_leads: i64,
}

impl LeadTotals {
    pub fn is_empty(&self) -> bool {
        self.total_leads == 0 && self.qualified_leads == 0
    }
}

/// Precomputed weekly summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekHistory {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_cost: f64,
    pub total_leads: i64,
    pub total_qualified: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Developer {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub developer_id: i64,
    pub status: Option<String>,
    /// Units currently available or for sale.
    pub units_count: i64,
}

/// One campaign in a webhook snapshot. Ad groups, when present, replace the campaign row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSpend {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub impressions: Option<i64>,
    #[serde(default)]
    pub clicks: Option<i64>,
    #[serde(default)]
    pub ad_groups: Option<Vec<AdGroupSpend>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdGroupSpend {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub impressions: Option<i64>,
    #[serde(default)]
    pub clicks: Option<i64>,
}

impl CampaignSpend {
    pub fn ad_groups(&self) -> &[AdGroupSpend] {
        self.ad_groups.as_deref().unwrap_or(&[])
    }
}

/// Ad platform ids arrive as JSON strings or numbers.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    match Id::deserialize(deserializer)? {
        Id::Text(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Id::Text(_) => Err(serde::de::Error::custom("id must not be empty")),
        Id::Number(n) => Ok(n.to_string()),
    }
}
