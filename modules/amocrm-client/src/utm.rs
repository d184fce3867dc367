//! UTM extraction and lead classification.

use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::types::{ClassifiedLead, ClassifiedLeads, LeadBucket, RawLead, UtmFields};

static CAMPAIGN_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^cid\W*(\d+)").unwrap());
static ADGROUP_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bgid\W*(\d+)").unwrap());

#[derive(Debug, Clone, Copy)]
enum UtmKey {
    Source,
    Medium,
    Campaign,
    Content,
    Term,
}

/// Custom field names that carry each UTM value, matched as case-insensitive substrings.
const UTM_ALIASES: &[(UtmKey, &[&str])] = &[
    (UtmKey::Source, &["utm_source", "utm source", "источник"]),
    (UtmKey::Medium, &["utm_medium", "utm medium"]),
    (UtmKey::Campaign, &["utm_campaign", "utm campaign", "кампания"]),
    (UtmKey::Content, &["utm_content", "utm content"]),
    (UtmKey::Term, &["utm_term", "utm term"]),
];

impl UtmFields {
    fn slot(&mut self, key: UtmKey) -> &mut Option<String> {
        match key {
            UtmKey::Source => &mut self.utm_source,
            UtmKey::Medium => &mut self.utm_medium,
            UtmKey::Campaign => &mut self.utm_campaign,
            UtmKey::Content => &mut self.utm_content,
            UtmKey::Term => &mut self.utm_term,
        }
    }
}

/// Pull UTM values out of a lead's custom fields. The first matching field wins per key.
pub fn extract_utm(lead: &RawLead) -> UtmFields {
    let mut utm = UtmFields::default();
    let Some(fields) = &lead.custom_fields_values else {
        return utm;
    };

    for field in fields {
        let Some(name) = field.field_name.as_deref() else {
            continue;
        };
        let name = name.to_lowercase();
        let Some(value) = field
            .values
            .as_ref()
            .and_then(|vs| vs.first())
            .and_then(|v| value_to_string(&v.value))
        else {
            continue;
        };

        for (key, aliases) in UTM_ALIASES {
            if aliases.iter().any(|alias| name.contains(alias)) {
                let slot = utm.slot(*key);
                if slot.is_none() {
                    *slot = Some(value.clone());
                }
            }
        }
    }

    utm
}

/// CRM field values arrive as strings, numbers or booleans. Blank strings count as absent.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// True when the lead carries a tag equal to `qualified_tag`, ignoring case.
pub fn is_qualified(lead: &RawLead, qualified_tag: &str) -> bool {
    let wanted = qualified_tag.to_lowercase();
    lead.embedded
        .as_ref()
        .and_then(|e| e.tags.as_ref())
        .is_some_and(|tags| {
            tags.iter()
                .filter_map(|t| t.name.as_deref())
                .any(|name| name.to_lowercase() == wanted)
        })
}

/// True when the lead's source name mentions Tilda.
pub fn is_tilda_source(lead: &RawLead) -> bool {
    lead.embedded
        .as_ref()
        .and_then(|e| e.source.as_ref())
        .and_then(|s| s.name.as_deref())
        .is_some_and(|name| name.to_lowercase().contains("tilda"))
}

/// `cid|12345|search` → `12345`; a purely numeric value is taken verbatim.
pub fn parse_campaign_id(utm_campaign: Option<&str>) -> Option<String> {
    let value = utm_campaign?;
    if let Some(caps) = CAMPAIGN_ID_RE.captures(value) {
        return Some(caps[1].to_string());
    }
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return Some(value.to_string());
    }
    None
}

/// `gid|555|aid|1` → `555`.
pub fn parse_adgroup_id(utm_content: Option<&str>) -> Option<String> {
    ADGROUP_ID_RE
        .captures(utm_content?)
        .map(|caps| caps[1].to_string())
}

pub fn bucket_for(utm: &UtmFields, tilda_source: bool) -> Option<LeadBucket> {
    if utm.has_attribution() {
        Some(LeadBucket::Utm)
    } else if tilda_source {
        Some(LeadBucket::Tilda)
    } else {
        None
    }
}

/// Normalise one lead. Returns `None` for leads that belong to neither bucket.
pub fn classify_lead(lead: &RawLead, qualified_tag: &str) -> Option<(LeadBucket, ClassifiedLead)> {
    let utm = extract_utm(lead);
    let bucket = bucket_for(&utm, is_tilda_source(lead))?;

    let Some(created) = DateTime::from_timestamp(lead.created_at, 0) else {
        warn!(lead_id = lead.id, created_at = lead.created_at, "Lead has invalid creation timestamp, skipping");
        return None;
    };

    let campaign_id = parse_campaign_id(utm.utm_campaign.as_deref());
    let adgroup_id = parse_adgroup_id(utm.utm_content.as_deref());

    Some((
        bucket,
        ClassifiedLead {
            lead_id: lead.id.to_string(),
            created_date: created.date_naive(),
            utm,
            campaign_id,
            adgroup_id,
            is_qualified: is_qualified(lead, qualified_tag),
        },
    ))
}

pub fn classify_leads(leads: &[RawLead], qualified_tag: &str) -> ClassifiedLeads {
    let mut out = ClassifiedLeads::default();
    for lead in leads {
        match classify_lead(lead, qualified_tag) {
            Some((LeadBucket::Utm, l)) => out.utm.push(l),
            Some((LeadBucket::Tilda, l)) => out.tilda.push(l),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn lead(value: Value) -> RawLead {
        serde_json::from_value(value).unwrap()
    }

    fn lead_with(fields: Value, source: Option<&str>, tags: &[&str]) -> RawLead {
        let tags: Vec<Value> = tags.iter().map(|t| json!({ "name": t })).collect();
        lead(json!({
            "id": 42,
            "created_at": 1767787200, // 2026-01-07T12:00:00Z
            "custom_fields_values": fields,
            "_embedded": {
                "tags": tags,
                "source": source.map(|s| json!({ "name": s })),
            }
        }))
    }

    #[test]
    fn campaign_id_extraction() {
        assert_eq!(parse_campaign_id(Some("cid|12345|search")), Some("12345".into()));
        assert_eq!(parse_campaign_id(Some("98765")), Some("98765".into()));
        assert_eq!(parse_campaign_id(Some("brand-campaign")), None);
        assert_eq!(parse_campaign_id(Some("")), None);
        assert_eq!(parse_campaign_id(None), None);
    }

    #[test]
    fn adgroup_id_extraction() {
        assert_eq!(parse_adgroup_id(Some("gid|555|aid|1")), Some("555".into()));
        assert_eq!(parse_adgroup_id(Some("no-gid-here")), None);
        assert_eq!(parse_adgroup_id(None), None);
    }

    #[test]
    fn id_markers_are_case_insensitive_and_not_matched_inside_words() {
        assert_eq!(parse_campaign_id(Some("CID|777|display")), Some("777".into()));
        assert_eq!(parse_campaign_id(Some("acidic 9")), None);
        assert_eq!(parse_campaign_id(Some("brand|cid|12")), None);
        assert_eq!(parse_adgroup_id(Some("aid|1|GID|42")), Some("42".into()));
        assert_eq!(parse_adgroup_id(Some("rigid 5")), None);
    }

    #[test]
    fn extracts_utm_by_alias_case_insensitively() {
        let l = lead_with(
            json!([
                { "field_name": "UTM_SOURCE", "values": [{ "value": "google" }] },
                { "field_name": "utm_medium", "values": [{ "value": "cpc" }] },
                { "field_name": "Кампания", "values": [{ "value": "cid|77|search" }] },
                { "field_name": "utm_content", "values": [{ "value": "gid|88|aid|1" }] },
                { "field_name": "UTM Term", "values": [{ "value": 123 }] },
            ]),
            None,
            &[],
        );
        let utm = extract_utm(&l);
        assert_eq!(utm.utm_source.as_deref(), Some("google"));
        assert_eq!(utm.utm_medium.as_deref(), Some("cpc"));
        assert_eq!(utm.utm_campaign.as_deref(), Some("cid|77|search"));
        assert_eq!(utm.utm_content.as_deref(), Some("gid|88|aid|1"));
        assert_eq!(utm.utm_term.as_deref(), Some("123"));
    }

    #[test]
    fn first_matching_field_wins() {
        let l = lead_with(
            json!([
                { "field_name": "utm_source", "values": [{ "value": "first" }, { "value": "ignored" }] },
                { "field_name": "UTM Source (copy)", "values": [{ "value": "second" }] },
            ]),
            None,
            &[],
        );
        assert_eq!(extract_utm(&l).utm_source.as_deref(), Some("first"));
    }

    #[test]
    fn blank_values_do_not_count() {
        let l = lead_with(
            json!([
                { "field_name": "utm_source", "values": [{ "value": "  " }] },
                { "field_name": "utm_campaign", "values": [] },
                { "field_name": "utm_content", "values": null },
            ]),
            None,
            &[],
        );
        assert_eq!(extract_utm(&l), UtmFields::default());
    }

    #[test]
    fn utm_lead_goes_to_utm_bucket_even_from_tilda() {
        let l = lead_with(
            json!([{ "field_name": "utm_campaign", "values": [{ "value": "cid|1|x" }] }]),
            Some("Tilda form"),
            &[],
        );
        let (bucket, classified) = classify_lead(&l, "Qualified").unwrap();
        assert_eq!(bucket, LeadBucket::Utm);
        assert_eq!(classified.campaign_id.as_deref(), Some("1"));
    }

    #[test]
    fn tilda_without_utm_goes_to_tilda_bucket() {
        let l = lead_with(json!([]), Some("TILDA landing"), &[]);
        let (bucket, classified) = classify_lead(&l, "Qualified").unwrap();
        assert_eq!(bucket, LeadBucket::Tilda);
        assert_eq!(classified.campaign_id, None);
        assert_eq!(classified.adgroup_id, None);
    }

    #[test]
    fn medium_and_term_alone_are_not_attribution() {
        let l = lead_with(
            json!([
                { "field_name": "utm_medium", "values": [{ "value": "cpc" }] },
                { "field_name": "utm_term", "values": [{ "value": "villa" }] },
            ]),
            None,
            &[],
        );
        assert!(classify_lead(&l, "Qualified").is_none());
    }

    #[test]
    fn leads_with_neither_are_dropped() {
        let l = lead_with(json!([]), Some("Phone call"), &[]);
        assert!(classify_lead(&l, "Qualified").is_none());

        let bare = lead(json!({ "id": 1, "created_at": 1767787200 }));
        assert!(classify_lead(&bare, "Qualified").is_none());
    }

    #[test]
    fn qualification_tag_matches_ignoring_case() {
        let l = lead_with(json!([]), Some("tilda"), &["hot", "КВАЛИФИЦИРОВАН"]);
        assert!(is_qualified(&l, "Квалифицирован"));
        assert!(!is_qualified(&l, "Qualified"));
    }

    #[test]
    fn created_date_is_utc_date() {
        let l = lead_with(json!([{ "field_name": "utm_source", "values": [{ "value": "g" }] }]), None, &[]);
        let (_, classified) = classify_lead(&l, "q").unwrap();
        assert_eq!(classified.created_date, NaiveDate::from_ymd_opt(2026, 1, 7).unwrap());
        assert_eq!(classified.lead_id, "42");
    }

    #[test]
    fn classify_leads_splits_and_keeps_order() {
        let mut a = lead_with(json!([{ "field_name": "utm_source", "values": [{ "value": "a" }] }]), None, &[]);
        a.id = 1;
        let mut b = lead_with(json!([]), Some("tilda"), &[]);
        b.id = 2;
        let mut c = lead_with(json!([]), None, &[]);
        c.id = 3;
        let mut d = lead_with(json!([{ "field_name": "utm_content", "values": [{ "value": "gid|9" }] }]), None, &[]);
        d.id = 4;

        let out = classify_leads(&[a, b, c, d], "q");
        let utm_ids: Vec<_> = out.utm.iter().map(|l| l.lead_id.as_str()).collect();
        let tilda_ids: Vec<_> = out.tilda.iter().map(|l| l.lead_id.as_str()).collect();
        assert_eq!(utm_ids, vec!["1", "4"]);
        assert_eq!(tilda_ids, vec!["2"]);
        assert_eq!(out.utm[1].adgroup_id.as_deref(), Some("9"));
    }
}
