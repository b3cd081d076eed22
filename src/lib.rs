//! Stage plot export.
//!
//! Turns a stage plot (placed equipment, an input list and event metadata)
//! into a PNG thumbnail of the stage and a printable multi-page PDF report.
//!
//! ## Module Overview
//!
//! - `geometry`: maps the 900×700 design canvas onto thumbnail pixels
//! - `snapshot`: rasterizes the stage thumbnail with resvg
//! - `store`: snapshot and document files on disk
//! - `repository`: plot and stage lookups
//! - `report`: report layout, PDF writing and the `ReportAssembler`
//! - `config`, `telemetry`: environment configuration and structured logging
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use stageplot_export::{
//!     model::{PlacedElement, Plot},
//!     report::ReportAssembler,
//!     repository::InMemoryRepository,
//!     store::SnapshotStore,
//! };
//!
//! let assembler = ReportAssembler::new(
//!     InMemoryRepository::new(),
//!     SnapshotStore::in_content_dir("content"),
//! );
//! let elements = vec![PlacedElement::new("Amp", 100.0, 100.0, 120.0, 80.0)];
//! let outcome = assembler.assemble(&Plot::new(1, "Club Night"), &elements, &[], None);
//! assert_eq!(outcome.document.filename, "stage_plot_Club_Night.pdf");
//! ```

pub mod bitmap_font;
pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod report;
pub mod repository;
pub mod snapshot;
pub mod store;
pub mod telemetry;
