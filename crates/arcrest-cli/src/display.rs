//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting services, run configuration and extraction reports.

use arcrest_core::{
    ExtractionOptions, ExtractionReport, ExtractionRequest, LayerStatus, ServiceDescriptor,
};
use tabled::{Table, Tabled};

const RULE_WIDTH: usize = 70;

/// Table row representation for displaying a service layer.
#[derive(Tabled)]
pub struct LayerRow {
    /// Layer id within the service.
    #[tabled(rename = "ID")]
    pub id: i64,
    /// Display name of the layer.
    #[tabled(rename = "Name")]
    pub name: String,
    /// Geometry type reported by the layer metadata.
    #[tabled(rename = "Geometry")]
    pub geometry: String,
}

/// Table row representation for displaying the outcome of one layer.
#[derive(Tabled)]
pub struct OutcomeRow {
    /// Layer id within the service.
    #[tabled(rename = "ID")]
    pub id: i64,
    /// Display name of the layer.
    #[tabled(rename = "Layer")]
    pub layer: String,
    /// Table the layer was written to.
    #[tabled(rename = "Table")]
    pub table: String,
    /// `OK` or `FAILED`.
    #[tabled(rename = "Status")]
    pub status: String,
    /// Feature count on success, failure message otherwise.
    #[tabled(rename = "Details")]
    pub details: String,
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Builds the layer table rows of a service.
#[must_use]
pub fn layer_rows(service: &ServiceDescriptor) -> Vec<LayerRow> {
    service
        .layers
        .iter()
        .map(|layer| LayerRow {
            id: layer.id,
            name: layer.name.clone(),
            geometry: layer.geometry_kind.to_string(),
        })
        .collect()
}

/// Builds the outcome table rows of a report.
#[must_use]
pub fn outcome_rows(report: &ExtractionReport) -> Vec<OutcomeRow> {
    report
        .outcomes()
        .iter()
        .map(|outcome| {
            let (status, details) = match &outcome.status {
                LayerStatus::Succeeded {
                    feature_count,
                    geometry_kind,
                } => (
                    "OK".to_string(),
                    format!("{feature_count} feature(s), {geometry_kind}"),
                ),
                LayerStatus::Failed { message } => ("FAILED".to_string(), message.clone()),
            };
            OutcomeRow {
                id: outcome.layer_id,
                layer: outcome.layer_name.clone(),
                table: outcome.table_name.clone(),
                status,
                details,
            }
        })
        .collect()
}

/// Formats the configuration summary shown before a run.
#[must_use]
pub fn format_configuration(request: &ExtractionRequest, options: &ExtractionOptions) -> String {
    let layers = match request.layer_ids() {
        Some(ids) => format!(
            "Layer IDs: {}",
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        None => "Extracting: All layers".to_string(),
    };
    let out_sr = options
        .out_sr
        .map_or_else(|| "service default".to_string(), |sr| sr.to_string());

    [
        rule(),
        "CONFIGURATION SUMMARY".to_string(),
        rule(),
        format!("Service URL: {}", request.base_url()),
        format!("Output GeoPackage: {}", request.destination().display()),
        layers,
        format!("Output spatial reference: {out_sr}"),
        rule(),
    ]
    .join("\n")
}

/// Formats the final summary of a run.
///
/// The failure line is only present when a layer failed.
#[must_use]
pub fn format_summary(report: &ExtractionReport) -> String {
    let mut lines = vec![
        rule(),
        "EXTRACTION COMPLETE!".to_string(),
        rule(),
        format!("Successfully extracted: {} layer(s)", report.succeeded()),
    ];
    if report.failed() > 0 {
        lines.push(format!("Failed: {} layer(s)", report.failed()));
    }
    lines.push(format!(
        "Output location: {}",
        report.destination().display()
    ));
    lines.push(rule());
    lines.join("\n")
}

/// Prints the service name and its layer table.
pub fn display_service(service: &ServiceDescriptor) {
    println!("\nService: {}", service.map_name);
    if service.layers.is_empty() {
        println!("No layers found.");
        return;
    }

    println!("\nLayers ({} total):\n", service.layers.len());
    let table = Table::new(layer_rows(service)).to_string();
    println!("{table}");
}

/// Prints the per-layer outcome table followed by the summary.
pub fn display_report(report: &ExtractionReport) {
    if !report.outcomes().is_empty() {
        println!();
        let table = Table::new(outcome_rows(report)).to_string();
        println!("{table}");
    }
    println!("\n{}", format_summary(report));
}
