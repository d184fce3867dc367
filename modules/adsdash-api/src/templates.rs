use adsdash_common::report::{
    format_cost_per, format_money, CampaignReport, ProjectRow, ProjectStats, ReportTotals,
    EMPTY_CELL,
};
use adsdash_common::week::format_week_range;
use adsdash_common::{Developer, LeadTotals, WeekHistory, WeekInfo};

/// Everything the spend/lead report page shows.
pub struct AdsView<'a> {
    pub user: &'a str,
    pub week: &'a WeekInfo,
    pub offset: u32,
    pub campaigns: &'a [CampaignReport],
    pub totals: ReportTotals,
    pub tilda: LeadTotals,
    pub history: &'a [WeekHistory],
    pub error: Option<&'a str>,
}

pub struct DevelopersView<'a> {
    pub user: &'a str,
    /// Developers offered in the selector.
    pub developers: &'a [Developer],
    /// Every developer, for the favorites dialog.
    pub all_developers: &'a [Developer],
    pub favorites: &'a [i64],
    pub selected: Option<i64>,
    pub only_with_units: bool,
    pub rows: &'a [ProjectRow],
    pub stats: ProjectStats,
    pub error: Option<&'a str>,
}

// --- Login ---

pub fn render_login(error: Option<&str>) -> String {
    let error_html = match error {
        Some(e) => format!(r#"<div class="error-banner">{}</div>"#, html_escape(e)),
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Sign in — Ads Dashboard</title>
<style>{STYLE}</style>
</head>
<body class="login-body">
<div class="login-card">
    <h2>Ads Dashboard</h2>
    {error_html}
    <form method="POST" action="/login">
        <label for="login">Login</label>
        <input type="text" name="login" id="login" required autofocus autocomplete="username">
        <label for="password">Password</label>
        <input type="password" name="password" id="password" required autocomplete="current-password">
        <button type="submit" class="btn-primary">Sign in</button>
    </form>
</div>
</body>
</html>"#
    )
}

// --- Ads report ---

pub fn render_ads(view: &AdsView<'_>) -> String {
    let prev = format!(
        r#"<a class="week-nav" href="/ads?week={}">&larr; Previous</a>"#,
        view.offset.saturating_add(1)
    );
    let next = if view.offset > 0 {
        format!(
            r#"<a class="week-nav" href="/ads?week={}">Next &rarr;</a>"#,
            view.offset - 1
        )
    } else {
        String::new()
    };

    let error_html = match view.error {
        Some(e) => format!(
            r#"<div class="error-banner"><strong>Database error:</strong> {}<br><small>Try reloading the page in a few minutes.</small></div>"#,
            html_escape(e)
        ),
        None => String::new(),
    };

    let has_tilda = !view.tilda.is_empty();
    let mut body = String::new();

    if view.campaigns.is_empty() && !has_tilda {
        let msg = if view.error.is_some() {
            "Data is temporarily unavailable."
        } else {
            "No data yet. Configure the Google Ads script to send spend data."
        };
        body.push_str(&format!(
            r#"<tr><td colspan="8" class="empty">{msg}</td></tr>"#
        ));
    }

    for campaign in view.campaigns {
        body.push_str(&campaign_rows(campaign));
    }

    if has_tilda {
        body.push_str(&format!(
            r#"<tr class="tilda-row"><td><strong>Tilda (no UTM)</strong></td><td class="group-col">{e}</td><td>{e}</td><td class="number">{e}</td><td class="number">{leads}</td><td class="number">{qualified}</td><td class="number">{e}</td><td class="number">{e}</td></tr>"#,
            e = EMPTY_CELL,
            leads = view.tilda.total_leads,
            qualified = view.tilda.qualified_leads,
        ));
    }

    let footer = if view.campaigns.is_empty() {
        String::new()
    } else {
        let t = &view.totals;
        format!(
            r#"<tfoot><tr class="total-row"><td>Total</td><td class="group-col"></td><td></td><td class="number">{cost}</td><td class="number">{leads}</td><td class="number">{qualified}</td><td class="number">{cpl}</td><td class="number">{cpql}</td></tr></tfoot>"#,
            cost = format_money(t.cost),
            leads = t.leads,
            qualified = t.qualified_leads,
            cpl = format_cost_per(t.cost, t.leads),
            cpql = format_cost_per(t.cost, t.qualified_leads),
        )
    };

    let content = format!(
        r#"<div class="container">
<div class="page-header">
    <h1>Google Ads + CRM leads</h1>
    <div class="week-selector">{prev}<span class="week-current">{range}</span>{next}</div>
</div>
{error_html}
<div class="view-toggle">
    <button type="button" data-mode="all" class="active" onclick="setView('all')">All</button>
    <button type="button" data-mode="campaigns" onclick="setView('campaigns')">Campaigns only</button>
    <span id="expand-controls">
        <button type="button" class="toggle-btn" onclick="setAll(true)">Expand all</button>
        <button type="button" class="toggle-btn" onclick="setAll(false)">Collapse all</button>
    </span>
</div>
<div class="table-container">
<table class="data-table" id="report" data-view="all">
    <thead><tr>
        <th>Campaign</th><th class="group-col">Ad group</th><th>Language</th>
        <th class="number">Cost</th><th class="number">Leads</th><th class="number">Qualified</th>
        <th class="number">CPL</th><th class="number">CPQL</th>
    </tr></thead>
    <tbody>{body}</tbody>
    {footer}
</table>
</div>
{history}
</div>
<script>{REPORT_SCRIPT}</script>"#,
        range = html_escape(&view.week.display_range),
        history = history_section(view.history),
    );

    build_page("Google Ads", "ads", view.user, &content)
}

fn campaign_rows(c: &CampaignReport) -> String {
    let id = html_escape(&c.id);
    let language = c.language.as_deref().map(html_escape).unwrap_or_else(|| EMPTY_CELL.to_string());

    let (toggle, group_cell) = if c.ad_groups.is_empty() {
        (String::new(), EMPTY_CELL.to_string())
    } else {
        let n = c.ad_groups.len();
        let s = if n != 1 { "s" } else { "" };
        (
            format!(
                r#"<button type="button" class="expand-btn" data-campaign="{id}" data-open="1" onclick="toggleCampaign(this.dataset.campaign)">&#9660;</button>"#
            ),
            format!("{n} ad group{s}"),
        )
    };

    let mut html = format!(
        r#"<tr class="campaign-row"><td>{toggle}<span class="campaign-name">{name}</span></td><td class="group-col">{group_cell}</td><td>{language}</td><td class="number">{cost}</td><td class="number">{leads}</td><td class="number">{qualified}</td><td class="number">{cpl}</td><td class="number">{cpql}</td></tr>"#,
        name = html_escape(&c.name),
        cost = format_money(c.cost),
        leads = c.leads,
        qualified = c.qualified_leads,
        cpl = format_cost_per(c.cost, c.leads),
        cpql = format_cost_per(c.cost, c.qualified_leads),
    );

    for g in &c.ad_groups {
        html.push_str(&format!(
            r#"<tr class="adgroup-row" data-parent="{id}"><td></td><td class="group-col">{name}</td><td></td><td class="number">{cost}</td><td class="number">{leads}</td><td class="number">{qualified}</td><td class="number">{cpl}</td><td class="number">{cpql}</td></tr>"#,
            name = html_escape(&g.name),
            cost = format_money(g.cost),
            leads = g.leads,
            qualified = g.qualified_leads,
            cpl = format_cost_per(g.cost, g.leads),
            cpql = format_cost_per(g.cost, g.qualified_leads),
        ));
    }
    html
}

fn history_section(history: &[WeekHistory]) -> String {
    let items = if history.is_empty() {
        r#"<div class="history-item muted">No history yet.</div>"#.to_string()
    } else {
        history
            .iter()
            .map(|w| {
                format!(
                    r#"<div class="history-item"><span class="history-week">{range}</span><span class="history-stats">{cost} | {leads} leads | {qualified} qualified</span></div>"#,
                    range = html_escape(&format_week_range(w.week_start, w.week_end)),
                    cost = format_money(w.total_cost),
                    leads = w.total_leads,
                    qualified = w.total_qualified,
                )
            })
            .collect::<Vec<_>>()
            .join("")
    };

    format!(
        r#"<div class="history-section"><details><summary class="history-toggle">Week history</summary><div class="history-list">{items}</div></details></div>"#
    )
}

// --- Developers ---

pub fn render_developers(view: &DevelopersView<'_>) -> String {
    let error_html = match view.error {
        Some(e) => format!(
            r#"<div class="error-banner"><strong>Database error:</strong> {}</div>"#,
            html_escape(e)
        ),
        None => String::new(),
    };

    let options: String = view
        .developers
        .iter()
        .map(|d| {
            let selected = if view.selected == Some(d.id) { " selected" } else { "" };
            format!(
                r#"<option value="{}"{selected}>{}</option>"#,
                d.id,
                html_escape(&d.name)
            )
        })
        .collect();

    let (all_checked, units_checked) = if view.only_with_units {
        ("", " checked")
    } else {
        (" checked", "")
    };

    let mut rows = String::new();
    if view.rows.is_empty() {
        let msg = if view.selected.is_none() {
            "Choose a developer."
        } else if view.only_with_units {
            "This developer has no projects with units for sale."
        } else {
            "This developer has no projects."
        };
        rows.push_str(&format!(r#"<tr><td colspan="4" class="empty">{msg}</td></tr>"#));
    }
    for row in view.rows {
        let p = &row.project;
        let ads = if row.has_ads {
            r#"<span class="badge badge-ads">Advertised</span>"#
        } else {
            r#"<span class="muted">—</span>"#
        };
        let units_class = if p.units_count > 0 { "number" } else { "number muted" };
        rows.push_str(&format!(
            r#"<tr><td>{name}</td><td>{status}</td><td class="{units_class}">{units}</td><td>{ads}</td></tr>"#,
            name = html_escape(&p.name),
            status = p.status.as_deref().map(html_escape).unwrap_or_else(|| EMPTY_CELL.to_string()),
            units = p.units_count,
        ));
    }

    let favorites_list: String = view
        .all_developers
        .iter()
        .map(|d| {
            let checked = if view.favorites.contains(&d.id) { " checked" } else { "" };
            format!(
                r#"<label data-name="{search}"><input type="checkbox" value="{id}"{checked}> {name}</label>"#,
                search = html_escape(&d.name.to_lowercase()),
                id = d.id,
                name = html_escape(&d.name),
            )
        })
        .collect();

    let content = format!(
        r#"<div class="container">
<div class="page-header">
    <h1>Developers</h1>
    <button type="button" class="btn-secondary" onclick="openFavorites()">Edit favorites</button>
</div>
{error_html}
<form method="get" action="/developers" class="filters">
    <select name="developer" onchange="this.form.submit()">{options}</select>
    <label><input type="radio" name="filter" value=""{all_checked} onchange="this.form.submit()"> All projects</label>
    <label><input type="radio" name="filter" value="with_units"{units_checked} onchange="this.form.submit()"> With units for sale</label>
</form>
<div class="table-container">
<table class="data-table">
    <thead><tr><th>Project</th><th>Status</th><th class="number">Units</th><th>Ads</th></tr></thead>
    <tbody>{rows}</tbody>
</table>
</div>
<div class="summary">
    <span class="summary-item">Projects: <strong>{total}</strong></span>
    <span class="summary-item">With units: <strong>{with_units}</strong></span>
    <span class="summary-item">Advertised: <strong>{with_ads}</strong></span>
</div>
<dialog id="fav-dialog">
    <h3>Favorite developers</h3>
    <input type="search" placeholder="Search developers" oninput="filterDevelopers(this.value)">
    <div id="fav-list">{favorites_list}</div>
    <div class="dialog-actions">
        <button type="button" class="btn-secondary" onclick="document.getElementById('fav-dialog').close()">Cancel</button>
        <button type="button" class="btn-primary" onclick="saveFavorites()">Save</button>
    </div>
</dialog>
</div>
<script>{FAVORITES_SCRIPT}</script>"#,
        total = view.stats.total,
        with_units = view.stats.with_units,
        with_ads = view.stats.with_ads,
    );

    build_page("Developers", "developers", view.user, &content)
}

// --- Layout ---

const NAV_ITEMS: &[(&str, &str, &str)] = &[
    ("ads", "Google Ads", "/ads"),
    ("developers", "Developers", "/developers"),
];

fn build_page(title: &str, active: &str, user: &str, content: &str) -> String {
    let nav: String = NAV_ITEMS
        .iter()
        .map(|(key, label, href)| {
            let class = if *key == active { r#" class="active""# } else { "" };
            format!(r#"<a href="{href}"{class}>{label}</a>"#)
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} — Ads Dashboard</title>
<style>{STYLE}</style>
</head>
<body>
<div class="header">
    <nav>{nav}</nav>
    <div class="user">
        <span>{user}</span>
        <form method="POST" action="/logout"><button type="submit" class="link-btn">Log out</button></form>
    </div>
</div>
{content}
</body>
</html>"#,
        title = html_escape(title),
        user = html_escape(user),
    )
}

const STYLE: &str = r#"
*{margin:0;padding:0;box-sizing:border-box;}
body{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;background:#fafafa;}
.header{background:#1a1a1a;color:#fff;padding:12px 24px;display:flex;align-items:center;justify-content:space-between;}
.header nav a{color:#ccc;text-decoration:none;margin-right:20px;font-size:14px;}
.header nav a.active,.header nav a:hover{color:#fff;}
.header .user{display:flex;gap:12px;align-items:center;font-size:13px;color:#ccc;}
.link-btn{background:none;border:none;color:#ccc;cursor:pointer;font-size:13px;}
.container{max-width:1200px;margin:0 auto;padding:24px;}
.page-header{display:flex;justify-content:space-between;align-items:center;margin-bottom:16px;}
.page-header h1{font-size:22px;}
.week-nav{color:#1a73e8;text-decoration:none;margin:0 10px;}
.week-current{font-weight:600;}
.error-banner{background:#fef2f2;border:1px solid #fecaca;border-radius:8px;padding:16px;margin-bottom:20px;color:#991b1b;}
.view-toggle{margin-bottom:12px;display:flex;gap:6px;}
.view-toggle button{padding:6px 12px;border:1px solid #ddd;background:#fff;border-radius:4px;cursor:pointer;font-size:13px;}
.view-toggle button.active{background:#1a73e8;color:#fff;border-color:#1a73e8;}
.table-container{background:#fff;border:1px solid #e0e0e0;border-radius:8px;overflow-x:auto;}
.data-table{width:100%;border-collapse:collapse;font-size:13px;}
.data-table th,.data-table td{padding:8px 12px;border-bottom:1px solid #eee;text-align:left;}
.data-table th{background:#f5f5f5;font-weight:600;}
.data-table .number{text-align:right;white-space:nowrap;}
.data-table .empty{text-align:center;color:#5f6368;padding:40px;}
.campaign-row{font-weight:600;}
.adgroup-row td{color:#444;}
.tilda-row{background:#fffbeb;}
.total-row td{font-weight:700;background:#f5f5f5;}
.expand-btn{background:none;border:none;cursor:pointer;margin-right:6px;font-size:11px;}
#report[data-view=campaigns] .adgroup-row,#report[data-view=campaigns] .group-col{display:none;}
.history-section{margin-top:24px;}
.history-toggle{cursor:pointer;font-weight:600;}
.history-item{display:flex;justify-content:space-between;padding:6px 0;border-bottom:1px solid #eee;font-size:13px;}
.muted{color:#888;}
.filters{display:flex;gap:16px;align-items:center;margin-bottom:16px;font-size:14px;}
.filters select{padding:6px;min-width:260px;}
.summary{margin-top:12px;display:flex;gap:20px;font-size:13px;}
.badge{display:inline-block;padding:2px 8px;border-radius:12px;font-size:11px;font-weight:600;}
.badge-ads{background:#e8f5e9;color:#2e7d32;}
.btn-primary{padding:8px 16px;background:#1a73e8;color:#fff;border:none;border-radius:4px;cursor:pointer;}
.btn-secondary{padding:8px 16px;background:#fff;border:1px solid #ccc;border-radius:4px;cursor:pointer;}
dialog{border:1px solid #ddd;border-radius:8px;padding:20px;width:420px;}
dialog input[type=search]{width:100%;padding:6px;margin:12px 0;}
#fav-list{max-height:360px;overflow-y:auto;display:flex;flex-direction:column;gap:4px;font-size:13px;}
.dialog-actions{margin-top:12px;display:flex;justify-content:flex-end;gap:8px;}
.login-body{display:flex;align-items:center;justify-content:center;min-height:100vh;}
.login-card{background:#fff;border:1px solid #e0e0e0;border-radius:8px;padding:32px;width:320px;}
.login-card h2{margin-bottom:16px;}
.login-card label{display:block;font-size:13px;color:#666;margin:8px 0 4px;}
.login-card input{width:100%;padding:8px;border:1px solid #ccc;border-radius:4px;}
.login-card button{width:100%;margin-top:16px;}
"#;

const REPORT_SCRIPT: &str = r#"
function setView(mode) {
    document.getElementById('report').dataset.view = mode;
    document.querySelectorAll('.view-toggle [data-mode]').forEach(b => b.classList.toggle('active', b.dataset.mode === mode));
    document.getElementById('expand-controls').style.display = mode === 'all' ? '' : 'none';
}
function toggleCampaign(id) {
    const btn = document.querySelector('button[data-campaign="' + CSS.escape(id) + '"]');
    const open = btn.dataset.open !== '1';
    document.querySelectorAll('tr[data-parent="' + CSS.escape(id) + '"]').forEach(r => r.hidden = !open);
    btn.dataset.open = open ? '1' : '0';
    btn.innerHTML = open ? '&#9660;' : '&#9654;';
}
function setAll(open) {
    document.querySelectorAll('button[data-campaign]').forEach(b => {
        if ((b.dataset.open === '1') !== open) toggleCampaign(b.dataset.campaign);
    });
}
"#;

const FAVORITES_SCRIPT: &str = r#"
function openFavorites() {
    document.getElementById('fav-dialog').showModal();
}
function filterDevelopers(q) {
    q = q.trim().toLowerCase();
    document.querySelectorAll('#fav-list label').forEach(l => l.hidden = !l.dataset.name.includes(q));
}
async function saveFavorites() {
    const ids = [...document.querySelectorAll('#fav-list input:checked')].map(i => Number(i.value));
    const res = await fetch('/api/developers/favorites', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ developerIds: ids }),
    });
    if (res.ok) {
        location.href = '/developers';
    } else {
        const body = await res.json().catch(() => ({}));
        alert(body.error || 'Failed to save favorites');
    }
}
"#;

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
