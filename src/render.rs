use std::collections::BTreeMap;

use clap::ValueEnum;

use crate::error::BiolinksError;
use crate::links::{LinkBundle, UnifiedLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Html,
    Tsv,
    Json,
}

pub fn render(bundles: &[LinkBundle], format: OutputFormat) -> Result<String, BiolinksError> {
    match format {
        OutputFormat::Html => Ok(render_html(bundles)),
        OutputFormat::Tsv => Ok(render_tsv(bundles)),
        OutputFormat::Json => render_json(bundles),
    }
}

pub fn render_html(bundles: &[LinkBundle]) -> String {
    let mut out = String::new();
    for bundle in bundles {
        let rows = sorted_rows(bundle, UnifiedLink::html_rows);
        out.push_str("<table style=\"font-size: 0.8rem;\">");
        out.push_str("<thead style=\"text-align: left;\">");
        out.push_str("<tr><th>Database</th><th>ID</th><th>Description</th></tr></thead>");
        out.push_str("<tbody>");
        out.push_str(&rows.join("\n"));
        out.push_str("</tbody></table>");
    }
    out
}

pub fn render_tsv(bundles: &[LinkBundle]) -> String {
    let mut out = String::new();
    for bundle in bundles {
        let rows = sorted_rows(bundle, UnifiedLink::tsv_rows);
        out.push_str(&rows.join("\n"));
        out.push_str("\n//\n");
    }
    out
}

pub fn render_json(bundles: &[LinkBundle]) -> Result<String, BiolinksError> {
    let mut map: BTreeMap<&str, &[UnifiedLink]> = BTreeMap::new();
    for bundle in bundles {
        map.insert(&bundle.id, &bundle.links);
    }
    serde_json::to_string_pretty(&map).map_err(|err| BiolinksError::Json(err.to_string()))
}

fn sorted_rows(bundle: &LinkBundle, rows_for: fn(&UnifiedLink) -> Vec<String>) -> Vec<String> {
    let mut rows: Vec<String> = bundle.links.iter().flat_map(rows_for).collect();
    rows.sort();
    rows.dedup();
    rows
}
