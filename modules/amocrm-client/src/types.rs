use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Wire shapes ---

/// One page of `GET /leads`. Leads stay untyped here so a single malformed
/// lead can be logged and skipped without losing the page.
#[derive(Debug, Deserialize)]
pub(crate) struct LeadsPage {
    #[serde(rename = "_embedded")]
    pub embedded: Option<LeadsEmbedded>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeadsEmbedded {
    #[serde(default)]
    pub leads: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLead {
    pub id: i64,
    pub created_at: i64,
    #[serde(default)]
    pub custom_fields_values: Option<Vec<CustomField>>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<LeadEmbedded>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<FieldValue>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldValue {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadEmbedded {
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    #[serde(default)]
    pub source: Option<LeadSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadSource {
    #[serde(default)]
    pub name: Option<String>,
}

/// Subset of `GET /account`, used for connectivity checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub subdomain: Option<String>,
}

// --- Normalised output ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UtmFields {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
}

impl UtmFields {
    /// Attribution counts when source, campaign or content is present.
    pub fn has_attribution(&self) -> bool {
        self.utm_source.is_some() || self.utm_campaign.is_some() || self.utm_content.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadBucket {
    /// Has UTM attribution, whatever its source.
    Utm,
    /// Came from Tilda with no UTM fields at all.
    Tilda,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedLead {
    pub lead_id: String,
    pub created_date: NaiveDate,
    #[serde(flatten)]
    pub utm: UtmFields,
    pub campaign_id: Option<String>,
    pub adgroup_id: Option<String>,
    pub is_qualified: bool,
}

/// Leads split by bucket, each in CRM order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedLeads {
    pub utm: Vec<ClassifiedLead>,
    pub tilda: Vec<ClassifiedLead>,
}
