//! Campaign → ad group aggregation for the spend/lead report.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{AdSpendRow, LeadCountRow, Project};

pub const CURRENCY: &str = "AED";

/// Shown wherever a ratio has a zero denominator or a value is missing.
pub const EMPTY_CELL: &str = "—";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeadCounts {
    pub leads: i64,
    pub qualified: i64,
}

impl LeadCounts {
    fn add(&mut self, leads: i64, qualified: i64) {
        self.leads += leads;
        self.qualified += qualified;
    }
}

/// Lead counts keyed by campaign id and, independently, by ad group id.
#[derive(Debug, Clone, Default)]
pub struct LeadIndex {
    by_campaign: HashMap<String, LeadCounts>,
    by_adgroup: HashMap<String, LeadCounts>,
}

impl LeadIndex {
    pub fn from_rows(rows: &[LeadCountRow]) -> Self {
        let mut index = Self::default();
        for row in rows {
            if let Some(cid) = &row.campaign_id {
                index
                    .by_campaign
                    .entry(cid.clone())
                    .or_default()
                    .add(row.total_leads, row.qualified_leads);
            }
            if let Some(gid) = &row.adgroup_id {
                index
                    .by_adgroup
                    .entry(gid.clone())
                    .or_default()
                    .add(row.total_leads, row.qualified_leads);
            }
        }
        index
    }

    pub fn campaign(&self, campaign_id: &str) -> LeadCounts {
        self.by_campaign.get(campaign_id).copied().unwrap_or_default()
    }

    pub fn adgroup(&self, adgroup_id: &str) -> LeadCounts {
        self.by_adgroup.get(adgroup_id).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdGroupReport {
    pub id: String,
    pub name: String,
    pub cost: f64,
    pub leads: i64,
    pub qualified_leads: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignReport {
    pub id: String,
    pub name: String,
    pub language: Option<String>,
    pub cost: f64,
    pub leads: i64,
    pub qualified_leads: i64,
    pub ad_groups: Vec<AdGroupReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReportTotals {
    pub cost: f64,
    pub leads: i64,
    pub qualified_leads: i64,
}

/// Build the campaign tree from spend rows, in first-seen campaign order.
///
/// Ad group cost folds into the parent campaign; rows without an ad group add to the
/// campaign directly. Lead counts come from `leads` and are never summed from ad groups.
pub fn build_campaigns(rows: &[AdSpendRow], leads: &LeadIndex) -> Vec<CampaignReport> {
    let mut order: Vec<String> = Vec::new();
    let mut campaigns: HashMap<String, CampaignReport> = HashMap::new();

    for row in rows {
        let campaign = campaigns.entry(row.campaign_id.clone()).or_insert_with(|| {
            order.push(row.campaign_id.clone());
            let counts = leads.campaign(&row.campaign_id);
            CampaignReport {
                id: row.campaign_id.clone(),
                name: row.campaign_name.clone(),
                language: None,
                cost: 0.0,
                leads: counts.leads,
                qualified_leads: counts.qualified,
                ad_groups: Vec::new(),
            }
        });

        if campaign.language.is_none() {
            campaign.language = row.language.clone().filter(|l| !l.is_empty());
        }
        campaign.cost += row.cost;

        if let Some(gid) = &row.adgroup_id {
            match campaign.ad_groups.iter_mut().find(|g| &g.id == gid) {
                Some(group) => group.cost += row.cost,
                None => {
                    let counts = leads.adgroup(gid);
                    campaign.ad_groups.push(AdGroupReport {
                        id: gid.clone(),
                        name: row.adgroup_name.clone().unwrap_or_else(|| gid.clone()),
                        cost: row.cost,
                        leads: counts.leads,
                        qualified_leads: counts.qualified,
                    });
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| campaigns.remove(&id))
        .collect()
}

/// Totals across top-level campaigns only; ad group cost is already inside its campaign.
pub fn totals(campaigns: &[CampaignReport]) -> ReportTotals {
    campaigns.iter().fold(ReportTotals::default(), |acc, c| ReportTotals {
        cost: acc.cost + c.cost,
        leads: acc.leads + c.leads,
        qualified_leads: acc.qualified_leads + c.qualified_leads,
    })
}

/// Weekly rollup values: (total cost, total leads, total qualified).
pub fn rollup(spend: &[AdSpendRow], leads: &[LeadCountRow]) -> (f64, i64, i64) {
    let cost = spend.iter().map(|r| r.cost).sum();
    let total = leads.iter().map(|r| r.total_leads).sum();
    let qualified = leads.iter().map(|r| r.qualified_leads).sum();
    (cost, total, qualified)
}

pub fn format_money(amount: f64) -> String {
    format!("{amount:.2} {CURRENCY}")
}

/// Cost per lead (or per qualified lead); `—` when there are none.
pub fn format_cost_per(cost: f64, count: i64) -> String {
    if count > 0 {
        format_money(cost / count as f64)
    } else {
        EMPTY_CELL.to_string()
    }
}

/// A project is advertised when any known campaign name contains its name, case-insensitively.
pub fn has_advertising(project_name: &str, campaign_names: &[String]) -> bool {
    let needle = project_name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    campaign_names
        .iter()
        .any(|c| c.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRow {
    pub project: Project,
    pub has_ads: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total: usize,
    pub with_units: usize,
    pub with_ads: usize,
}

/// Tag projects with advertising status and optionally keep only those with units for sale.
pub fn project_rows(
    projects: Vec<Project>,
    campaign_names: &[String],
    only_with_units: bool,
) -> (Vec<ProjectRow>, ProjectStats) {
    let rows: Vec<ProjectRow> = projects
        .into_iter()
        .map(|project| {
            let has_ads = has_advertising(&project.name, campaign_names);
            ProjectRow { project, has_ads }
        })
        .filter(|row| !only_with_units || row.project.units_count > 0)
        .collect();

    let stats = ProjectStats {
        total: rows.len(),
        with_units: rows.iter().filter(|r| r.project.units_count > 0).count(),
        with_ads: rows.iter().filter(|r| r.has_ads).count(),
    };
    (rows, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend(cid: &str, gid: Option<&str>, cost: f64) -> AdSpendRow {
        AdSpendRow {
            campaign_id: cid.to_string(),
            campaign_name: format!("Campaign {cid}"),
            adgroup_id: gid.map(str::to_string),
            adgroup_name: gid.map(|g| format!("Group {g}")),
            language: Some("en".to_string()),
            cost,
            impressions: 0,
            clicks: 0,
        }
    }

    fn lead_row(cid: Option<&str>, gid: Option<&str>, total: i64, qualified: i64) -> LeadCountRow {
        LeadCountRow {
            campaign_id: cid.map(str::to_string),
            adgroup_id: gid.map(str::to_string),
            total_leads: total,
            qualified_leads: qualified,
        }
    }

    #[test]
    fn ad_group_costs_fold_into_campaign() {
        let rows = vec![spend("C", Some("G1"), 10.0), spend("C", Some("G2"), 20.0)];
        let campaigns = build_campaigns(&rows, &LeadIndex::default());

        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].cost, 30.0);
        assert_eq!(campaigns[0].ad_groups.len(), 2);
        assert_eq!(campaigns[0].ad_groups[0].cost, 10.0);
        assert_eq!(campaigns[0].ad_groups[1].cost, 20.0);
    }

    #[test]
    fn campaign_level_rows_add_without_creating_groups() {
        let rows = vec![spend("A", None, 5.5), spend("A", None, 4.5)];
        let campaigns = build_campaigns(&rows, &LeadIndex::default());
        assert_eq!(campaigns[0].cost, 10.0);
        assert!(campaigns[0].ad_groups.is_empty());
    }

    #[test]
    fn campaigns_keep_first_seen_order() {
        let rows = vec![
            spend("B", None, 1.0),
            spend("A", Some("G"), 2.0),
            spend("B", None, 3.0),
        ];
        let campaigns = build_campaigns(&rows, &LeadIndex::default());
        let ids: Vec<_> = campaigns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn leads_attach_by_campaign_and_adgroup_id() {
        let rows = vec![spend("C", Some("G1"), 10.0), spend("C", Some("G2"), 20.0)];
        let index = LeadIndex::from_rows(&[
            lead_row(Some("C"), Some("G1"), 3, 1),
            lead_row(Some("C"), None, 2, 0),
            lead_row(None, Some("G2"), 4, 2),
        ]);
        let campaigns = build_campaigns(&rows, &index);
        let c = &campaigns[0];

        // Campaign counts come from the campaign key, not from summing groups.
        assert_eq!(c.leads, 5);
        assert_eq!(c.qualified_leads, 1);
        assert_eq!(c.ad_groups[0].leads, 3);
        assert_eq!(c.ad_groups[1].leads, 4);
        assert_eq!(c.ad_groups[1].qualified_leads, 2);
    }

    #[test]
    fn totals_do_not_double_count_groups() {
        let rows = vec![
            spend("C", Some("G1"), 10.0),
            spend("C", Some("G2"), 20.0),
            spend("D", None, 5.0),
        ];
        let index = LeadIndex::from_rows(&[
            lead_row(Some("C"), Some("G1"), 2, 1),
            lead_row(Some("D"), None, 1, 0),
        ]);
        let t = totals(&build_campaigns(&rows, &index));
        assert_eq!(t.cost, 35.0);
        assert_eq!(t.leads, 3);
        assert_eq!(t.qualified_leads, 1);
    }

    #[test]
    fn cost_per_lead_formatting() {
        assert_eq!(format_cost_per(100.0, 0), "—");
        assert_eq!(format_cost_per(100.0, 5), "20.00 AED");
        assert_eq!(format_cost_per(10.0, 3), "3.33 AED");
        assert_eq!(format_money(0.0), "0.00 AED");
    }

    #[test]
    fn rollup_sums_everything() {
        let (cost, leads, qualified) = rollup(
            &[spend("C", Some("G1"), 10.0), spend("D", None, 2.5)],
            &[lead_row(Some("C"), Some("G1"), 4, 2), lead_row(Some("X"), None, 1, 1)],
        );
        assert_eq!(cost, 12.5);
        assert_eq!(leads, 5);
        assert_eq!(qualified, 3);
    }

    #[test]
    fn advertising_is_substring_match() {
        let names = vec!["search | marina heights | en".to_string()];
        assert!(has_advertising("Marina Heights", &names));
        assert!(!has_advertising("Palm Tower", &names));
        assert!(!has_advertising("  ", &names));
    }

    #[test]
    fn project_rows_filter_and_stats() {
        let projects = vec![
            Project { id: 1, name: "Alpha".into(), developer_id: 9, status: None, units_count: 3 },
            Project { id: 2, name: "Beta".into(), developer_id: 9, status: None, units_count: 0 },
            Project { id: 3, name: "Gamma".into(), developer_id: 9, status: None, units_count: 1 },
        ];
        let names = vec!["alpha launch".to_string(), "beta retarget".to_string()];

        let (all, stats) = project_rows(projects.clone(), &names, false);
        assert_eq!(all.len(), 3);
        assert_eq!(stats, ProjectStats { total: 3, with_units: 2, with_ads: 2 });

        let (with_units, stats) = project_rows(projects, &names, true);
        let ids: Vec<_> = with_units.iter().map(|r| r.project.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(stats, ProjectStats { total: 2, with_units: 2, with_ads: 1 });
    }
}
