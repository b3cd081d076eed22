//! Stage plot export command.
//!
//! Usage: `stageplot-export <request.json>`
//!
//! The request file carries the plot record, its stage size and the
//! elements and inputs to print:
//!
//! ```json
//! {
//!   "plot": { "id": 7, "title": "Club Night", "snapshot_filename": null },
//!   "stage_dimensions": { "width_feet": 30, "depth_feet": 20 },
//!   "elements": [{ "name": "Amp", "x": 100, "y": 100, "width": 120, "height": 80 }],
//!   "inputs": [{ "number": 1, "label": "Kick" }]
//! }
//! ```
//!
//! A JSON summary is printed on stdout; logs go to stderr.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `STAGEPLOT_CONTENT_DIR`: content root, snapshots live in `snapshots/` (default: content)
//! - `STAGEPLOT_TMP_DIR`: output directory for documents
//! - `STAGEPLOT_THUMBNAIL_WIDTH`: snapshot width in pixels (default: 300)
//! - `STAGEPLOT_AUTO_PRINT`: open the print dialog when the PDF is opened
//! - `STAGEPLOT_LOG_FORMAT`: `json` for JSON logs
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use stageplot_export::{
    config::ExportConfig,
    model::{Input, PlacedElement, Plot, ReportRequest, StageDimensions, StageRef},
    report::{ReportAssembler, ReportOptions},
    repository::InMemoryRepository,
    telemetry,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ExportInput {
    plot: Plot,
    #[serde(default, alias = "stageDimensions", alias = "stage")]
    stage_dimensions: Option<StageDimensions>,
    #[serde(default)]
    elements: Vec<PlacedElement>,
    #[serde(default)]
    inputs: Vec<Input>,
    #[serde(default)]
    auto_print: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ExportSummary {
    document_path: PathBuf,
    document_filename: String,
    snapshot_filename: Option<String>,
    page_count: usize,
}

fn main() -> Result<()> {
    telemetry::init_tracing();

    let path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: stageplot-export <request.json>"),
    };

    let config = ExportConfig::from_env();
    info!(
        content_dir = %config.content_dir.display(),
        tmp_dir = %config.tmp_dir.display(),
        thumbnail_width = config.thumbnail_width,
        auto_print = config.auto_print,
        "Configuration loaded"
    );

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let input: ExportInput = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    // Records arrive inline, so the stage is keyed under the plot's own id.
    let stage = StageRef::Venue(input.plot.id);
    let mut repository = InMemoryRepository::new();
    if let Some(dimensions) = input.stage_dimensions {
        repository.insert_stage(stage, dimensions);
    }
    let plot_id = input.plot.id;
    repository.insert_plot(input.plot);

    let request = ReportRequest {
        plot_id,
        stage: Some(stage),
        elements: input.elements,
        inputs: input.inputs,
        auto_print: input.auto_print,
    };

    let assembler = ReportAssembler::new(&repository, config.snapshot_store()).with_options(
        ReportOptions {
            thumbnail_width: config.thumbnail_width,
            auto_print: config.auto_print,
            ..Default::default()
        },
    );

    let started = Instant::now();
    let (outcome, document_path) = assembler
        .export(&request, &config.tmp_dir)
        .context("Failed to export stage plot")?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    telemetry::record_report_telemetry(&outcome, duration_ms);

    let summary = ExportSummary {
        document_path,
        document_filename: outcome.document.filename.clone(),
        snapshot_filename: outcome.new_snapshot_filename().map(str::to_string),
        page_count: outcome.document.page_count,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
