//! Output formatting for the CLI
//!
//! Every renderer returns the text instead of printing it; `--json` switches
//! to a serialized view of the same data.

use std::collections::BTreeMap;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tabled::{
    builder::Builder,
    settings::{
        object::{Columns, Object, Rows},
        Color, Modify, Padding, Style, Width,
    },
    Table, Tabled,
};

use crate::plugin::api::PluginSummary;
use crate::record::api::{App, AppState, RATING_UNSET, SIZE_MISSING, SIZE_UNKNOWN};

const PLUGIN_COLUMN_WIDTH: usize = 16;
const SUMMARY_COLUMN_WIDTH: usize = 48;
const TABLE_SEPARATOR: char = '-';

#[derive(Tabled)]
struct AppRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

#[derive(Tabled)]
struct PluginRow {
    #[tabled(rename = "Plugin")]
    plugin: String,
    #[tabled(rename = "Capabilities / Description")]
    content: String,
}

/// Serializable snapshot of a record
#[derive(Debug, Serialize)]
pub struct AppView {
    pub id: String,
    pub kind: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licence: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_details: Option<String>,
    pub update_severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_plugin: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub urls: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub menu_path: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addons: Vec<String>,
}

impl From<&App> for AppView {
    fn from(app: &App) -> Self {
        let size = app.size();
        let rating = app.rating();
        Self {
            id: app.id().to_string(),
            kind: app.kind().to_string(),
            state: app.state().to_string(),
            name: app.name(),
            summary: app.summary(),
            description: app.description(),
            licence: app.licence(),
            version: app.version(),
            update_version: app.update_version(),
            update_details: app.update_details(),
            update_severity: app.update_severity().to_string(),
            origin: app.origin(),
            management_plugin: app.management_plugin(),
            sources: app.sources(),
            size: (size != SIZE_UNKNOWN && size != SIZE_MISSING).then_some(size),
            rating: (rating != RATING_UNSET).then_some(rating),
            urls: app
                .urls()
                .into_iter()
                .map(|(kind, url)| (kind.to_string(), url))
                .collect(),
            categories: app.categories(),
            menu_path: app.menu_path(),
            addons: app.addons(),
        }
    }
}

fn state_label(state: AppState, use_color: bool) -> String {
    let label = state.to_string();
    if !use_color {
        return label;
    }
    match state {
        AppState::Installed => label.green().to_string(),
        AppState::Updatable => label.yellow().to_string(),
        AppState::Unavailable => label.red().to_string(),
        _ => label,
    }
}

/// Borderless table text with a rule under the header and no trailing blanks
fn finish(mut table: Table, header: bool, use_color: bool) -> String {
    table.with(Style::empty()).with(Padding::new(0, 2, 0, 0));
    if header && use_color {
        table.with(Modify::new(Rows::one(0)).with(Color::FG_CYAN));
    }

    let width = table.total_width().saturating_sub(2);
    let rendered = table.to_string();
    let mut lines: Vec<String> = rendered.lines().map(|l| l.trim_end().to_string()).collect();
    if header && !lines.is_empty() {
        lines.insert(1, TABLE_SEPARATOR.to_string().repeat(width));
    }
    lines.join("\n")
}

/// One row per record: name, state, version and summary
pub fn render_app_list(apps: &[Arc<App>], json: bool, use_color: bool) -> serde_json::Result<String> {
    if json {
        let views: Vec<AppView> = apps.iter().map(|app| AppView::from(app.as_ref())).collect();
        return serde_json::to_string_pretty(&views);
    }
    if apps.is_empty() {
        return Ok("No applications found.".to_string());
    }

    let rows = apps.iter().map(|app| AppRow {
        name: app.name().unwrap_or_else(|| app.id().to_string()),
        state: state_label(app.state(), use_color),
        version: app.update_version().or_else(|| app.version()).unwrap_or_default(),
        summary: app.summary().unwrap_or_default(),
    });
    let mut table = Table::new(rows);
    table.with(Modify::new(Columns::one(3)).with(Width::wrap(SUMMARY_COLUMN_WIDTH)));
    if use_color {
        table.with(Modify::new(Columns::one(0).not(Rows::one(0))).with(Color::FG_BLUE));
    }
    Ok(finish(table, true, use_color))
}

/// Every populated field of one record
pub fn render_details(app: &App, json: bool, use_color: bool) -> serde_json::Result<String> {
    let view = AppView::from(app);
    if json {
        return serde_json::to_string_pretty(&view);
    }

    let mut rows: Vec<(&str, String)> = vec![
        ("Id", view.id.clone()),
        ("Kind", view.kind.clone()),
        ("State", view.state.clone()),
    ];
    let optional = [
        ("Name", &view.name),
        ("Summary", &view.summary),
        ("Licence", &view.licence),
        ("Version", &view.version),
        ("Update", &view.update_version),
        ("Origin", &view.origin),
        ("Managed by", &view.management_plugin),
    ];
    rows.extend(
        optional
            .into_iter()
            .filter_map(|(label, value)| value.clone().map(|v| (label, v))),
    );
    if let Some(size) = view.size {
        rows.push(("Size", format!("{} bytes", size)));
    }
    if let Some(rating) = view.rating {
        rows.push(("Rating", format!("{}%", rating)));
    }
    if !view.sources.is_empty() {
        rows.push(("Sources", view.sources.join(", ")));
    }
    if !view.categories.is_empty() {
        rows.push(("Categories", view.categories.join(", ")));
    }
    if !view.menu_path.is_empty() {
        rows.push(("Menu", view.menu_path.join(" → ")));
    }
    for (kind, url) in &view.urls {
        rows.push(("Url", format!("{} ({})", url, kind)));
    }
    if !view.addons.is_empty() {
        rows.push(("Addons", view.addons.join(", ")));
    }

    let mut builder = Builder::default();
    for (label, value) in rows {
        builder.push_record([format!("{}:", label), value]);
    }
    let mut table = builder.build();
    if use_color {
        table.with(Modify::new(Columns::one(0)).with(Color::FG_CYAN));
    }

    let mut out = finish(table, false, use_color);
    if let Some(description) = view.description.as_ref().or(view.update_details.as_ref()) {
        out.push_str("\n\n");
        out.push_str(description);
    }
    Ok(out)
}

/// Plugins in execution order: capabilities on one row, description below
pub fn render_plugins(plugins: &[PluginSummary], json: bool, use_color: bool) -> serde_json::Result<String> {
    if json {
        return serde_json::to_string_pretty(plugins);
    }
    if plugins.is_empty() {
        return Ok("No plugins loaded.".to_string());
    }

    let mut rows = Vec::with_capacity(plugins.len() * 2);
    for plugin in plugins {
        let capabilities: Vec<String> = plugin.capabilities.iter().map(|c| c.to_string()).collect();
        let status = if plugin.enabled { "" } else { " (disabled)" };
        let name = match (use_color, plugin.enabled) {
            (true, true) => plugin.name.blue().to_string(),
            (true, false) => plugin.name.dimmed().to_string(),
            (false, _) => plugin.name.clone(),
        };
        rows.push(PluginRow {
            plugin: name,
            content: format!("{}{}", capabilities.join(", "), status),
        });
        rows.push(PluginRow {
            plugin: String::new(),
            content: plugin.description.clone(),
        });
    }
    let mut table = Table::new(rows);
    table.with(Modify::new(Columns::one(0)).with(Width::wrap(PLUGIN_COLUMN_WIDTH)));
    Ok(finish(table, true, use_color))
}
