//! Report assembly: cover page with the stage snapshot, equipment list and
//! input list, written out as a multi-page PDF.

pub mod layout;
pub mod metrics;
pub mod pdf;

use crate::error::{ExportError, Result};
use crate::geometry::DEFAULT_THUMBNAIL_WIDTH;
use crate::model::{
    Input, PlacedElement, Plot, RenderedSnapshot, ReportDocument, ReportRequest,
    StageDimensions, StageRef,
};
use crate::repository::PlotRepository;
use crate::snapshot::{decode_png, SnapshotRenderer};
use crate::store::{DocumentStore, SnapshotStore};
use layout::{EmbeddedImage, ReportLayout};
use pdf::{PdfOptions, LETTER};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What the cover page should show, decided before any I/O beyond an
/// existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverPlan {
    /// Embed the stored snapshot with this name.
    Reuse(String),
    /// Render and store a new snapshot.
    Regenerate,
    /// Print a "no image" cell.
    Placeholder,
}

/// Chooses the cover image source.
///
/// A referenced snapshot that exists wins. Otherwise a snapshot is rendered
/// when there is anything to draw, and the placeholder is used when there
/// is not.
pub fn plan_cover_image(
    snapshot_filename: Option<&str>,
    snapshot_exists: bool,
    has_elements: bool,
) -> CoverPlan {
    match snapshot_filename {
        Some(name) if snapshot_exists => CoverPlan::Reuse(name.to_string()),
        _ if has_elements => CoverPlan::Regenerate,
        _ => CoverPlan::Placeholder,
    }
}

/// Where the cover image of a finished report came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverImageSource {
    Stored(String),
    Generated(String),
    Placeholder,
}

impl fmt::Display for CoverImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverImageSource::Stored(_) => write!(f, "stored"),
            CoverImageSource::Generated(_) => write!(f, "generated"),
            CoverImageSource::Placeholder => write!(f, "placeholder"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Width in pixels of regenerated snapshots.
    pub thumbnail_width: u32,
    /// Default for requests that do not set `auto_print` themselves.
    pub auto_print: bool,
    pub page: pdf::PageSetup,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            auto_print: false,
            page: LETTER,
        }
    }
}

/// A finished report and what happened while producing it.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub plot_id: i64,
    pub document: ReportDocument,
    pub layout: ReportLayout,
    pub cover: CoverImageSource,
    /// Set when a new snapshot was stored; the caller should persist its
    /// filename against the plot.
    pub snapshot: Option<RenderedSnapshot>,
    pub element_count: usize,
    pub input_count: usize,
}

impl ReportOutcome {
    pub fn new_snapshot_filename(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|s| s.filename.as_str())
    }
}

/// Builds stage plot reports.
///
/// Plot metadata and stage dimensions come from the injected repository;
/// snapshots are read from and written to the [`SnapshotStore`].
pub struct ReportAssembler<R> {
    repository: R,
    snapshots: SnapshotStore,
    renderer: SnapshotRenderer,
    documents: DocumentStore,
    options: ReportOptions,
}

impl<R: PlotRepository> ReportAssembler<R> {
    pub fn new(repository: R, snapshots: SnapshotStore) -> Self {
        Self {
            repository,
            snapshots,
            renderer: SnapshotRenderer::new(),
            documents: DocumentStore::new(),
            options: ReportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_renderer(mut self, renderer: SnapshotRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Loads the plot named by `request` and assembles its report.
    ///
    /// # Errors
    ///
    /// - [`ExportError::PlotNotFound`] if the repository has no such plot
    /// - repository failures while loading the plot
    pub fn generate(&self, request: &ReportRequest) -> Result<ReportOutcome> {
        let plot = self
            .repository
            .get_plot(request.plot_id)?
            .ok_or(ExportError::PlotNotFound(request.plot_id))?;
        let dimensions = self.stage_dimensions(request.stage);

        let auto_print = request.auto_print.unwrap_or(self.options.auto_print);
        Ok(self.assemble_with(
            &plot,
            &request.elements,
            &request.inputs,
            dimensions.as_ref(),
            auto_print,
        ))
    }

    /// Generates the report and writes it into `directory`.
    ///
    /// Returns the outcome and the path of the written file.
    pub fn export(
        &self,
        request: &ReportRequest,
        directory: &Path,
    ) -> Result<(ReportOutcome, PathBuf)> {
        let outcome = self.generate(request)?;
        let path = self.documents.save(
            &outcome.document.bytes,
            &outcome.document.filename,
            directory,
        )?;
        Ok((outcome, path))
    }

    /// Stage dimensions for `stage`, or `None` when unknown.
    ///
    /// Lookup failures are logged and treated as unknown.
    pub fn stage_dimensions(&self, stage: Option<StageRef>) -> Option<StageDimensions> {
        let stage = stage?;
        match self.repository.get_stage_dimensions(stage) {
            Ok(dimensions) => dimensions,
            Err(e) => {
                warn!(stage = %stage, error = %e, "Stage dimension lookup failed; using default ratio");
                None
            }
        }
    }

    /// Assembles a report from already-loaded data.
    pub fn assemble(
        &self,
        plot: &Plot,
        elements: &[PlacedElement],
        inputs: &[Input],
        dimensions: Option<&StageDimensions>,
    ) -> ReportOutcome {
        self.assemble_with(plot, elements, inputs, dimensions, self.options.auto_print)
    }

    fn assemble_with(
        &self,
        plot: &Plot,
        elements: &[PlacedElement],
        inputs: &[Input],
        dimensions: Option<&StageDimensions>,
        auto_print: bool,
    ) -> ReportOutcome {
        let (image, cover, snapshot) = self.resolve_cover(plot, elements, dimensions);

        let report = ReportLayout {
            title: layout::display_title(plot),
            sections: vec![
                layout::cover_section(plot, image),
                layout::element_section(elements),
                layout::input_section(inputs),
            ],
        };

        let rendered = pdf::write_pdf(
            &report,
            &PdfOptions {
                page: self.options.page,
                auto_print,
            },
        );
        let document = ReportDocument {
            filename: layout::document_filename(layout::filename_title(plot)),
            bytes: rendered.bytes,
            page_count: rendered.page_count,
        };

        info!(
            plot_id = plot.id,
            filename = %document.filename,
            pages = document.page_count,
            cover = %cover,
            "Report assembled"
        );

        ReportOutcome {
            plot_id: plot.id,
            document,
            layout: report,
            cover,
            snapshot,
            element_count: elements.len(),
            input_count: inputs.len(),
        }
    }

    /// Renders and stores a fresh snapshot for `plot_id`.
    ///
    /// Returns `None` if rendering or storing fails.
    pub fn regenerate_snapshot(
        &self,
        plot_id: i64,
        elements: &[PlacedElement],
        dimensions: Option<&StageDimensions>,
    ) -> Option<RenderedSnapshot> {
        let bytes = self
            .renderer
            .render_stage(self.options.thumbnail_width, dimensions, elements)?;

        match self.snapshots.save(plot_id, &bytes) {
            Ok(filename) => Some(RenderedSnapshot { filename, bytes }),
            Err(e) => {
                warn!(plot_id = plot_id, error = %e, "Failed to store snapshot");
                None
            }
        }
    }

    fn resolve_cover(
        &self,
        plot: &Plot,
        elements: &[PlacedElement],
        dimensions: Option<&StageDimensions>,
    ) -> (Option<EmbeddedImage>, CoverImageSource, Option<RenderedSnapshot>) {
        let referenced = plot.snapshot_filename.as_deref().filter(|n| !n.trim().is_empty());
        let has_elements = !elements.is_empty();
        let exists = referenced.is_some_and(|name| self.snapshots.exists(name));

        let plan = match plan_cover_image(referenced, exists, has_elements) {
            CoverPlan::Reuse(filename) => match self.load_stored(&filename) {
                Some(image) => return (Some(image), CoverImageSource::Stored(filename), None),
                None => plan_cover_image(referenced, false, has_elements),
            },
            other => {
                if let Some(name) = referenced {
                    info!(plot_id = plot.id, filename = %name, "Referenced snapshot missing");
                }
                other
            }
        };

        if plan != CoverPlan::Regenerate {
            return (None, CoverImageSource::Placeholder, None);
        }

        let Some(snapshot) = self.regenerate_snapshot(plot.id, elements, dimensions) else {
            return (None, CoverImageSource::Placeholder, None);
        };
        match decode_png(&snapshot.bytes) {
            Ok(pixels) => {
                let image = EmbeddedImage {
                    png: snapshot.bytes.clone(),
                    pixels,
                };
                let source = CoverImageSource::Generated(snapshot.filename.clone());
                (Some(image), source, Some(snapshot))
            }
            Err(e) => {
                warn!(plot_id = plot.id, error = %e, "Fresh snapshot could not be decoded");
                (None, CoverImageSource::Placeholder, Some(snapshot))
            }
        }
    }

    fn load_stored(&self, filename: &str) -> Option<EmbeddedImage> {
        let png = match self.snapshots.load(filename) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(filename = %filename, error = %e, "Stored snapshot unreadable; regenerating");
                return None;
            }
        };
        match decode_png(&png) {
            Ok(pixels) => Some(EmbeddedImage { png, pixels }),
            Err(e) => {
                warn!(filename = %filename, error = %e, "Stored snapshot is not a valid PNG; regenerating");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockPlotRepository;
    use crate::snapshot::SnapshotStyle;
    use layout::{Block, NO_ELEMENTS, NO_IMAGE};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn elements() -> Vec<PlacedElement> {
        vec![
            PlacedElement::new("Amp", 100.0, 100.0, 120.0, 80.0).with_label("GTR"),
            PlacedElement::new("Amp", 400.0, 100.0, 120.0, 80.0),
            PlacedElement::new("Mic", 300.0, 500.0, 30.0, 30.0).with_notes("boom stand"),
        ]
    }

    fn assembler(dir: &TempDir) -> ReportAssembler<MockPlotRepository> {
        ReportAssembler::new(MockPlotRepository::new(), SnapshotStore::new(dir.path()))
    }

    fn snapshot_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn cover_image(outcome: &ReportOutcome) -> Option<&EmbeddedImage> {
        outcome.layout.sections[0].blocks.iter().find_map(|b| match b {
            Block::Image(image) => Some(image),
            _ => None,
        })
    }

    #[test]
    fn test_plan_cover_image_branches() {
        assert_eq!(
            plan_cover_image(Some("plot_1_5.png"), true, true),
            CoverPlan::Reuse("plot_1_5.png".to_string())
        );
        assert_eq!(
            plan_cover_image(Some("plot_1_5.png"), true, false),
            CoverPlan::Reuse("plot_1_5.png".to_string())
        );
        assert_eq!(plan_cover_image(Some("plot_1_5.png"), false, true), CoverPlan::Regenerate);
        assert_eq!(plan_cover_image(None, false, true), CoverPlan::Regenerate);
        assert_eq!(plan_cover_image(Some("plot_1_5.png"), false, false), CoverPlan::Placeholder);
        assert_eq!(plan_cover_image(None, false, false), CoverPlan::Placeholder);
    }

    #[test]
    fn test_existing_snapshot_is_embedded_without_regeneration() {
        let dir = tempdir().unwrap();
        let assembler = assembler(&dir);
        let stored = SnapshotRenderer::new().render_stage(300, None, &elements()).unwrap();
        let name = assembler.snapshots().save_at(9, 1_000, &stored).unwrap();

        let mut plot = Plot::new(9, "Club Night");
        plot.snapshot_filename = Some(name.clone());
        let outcome = assembler.assemble(&plot, &elements(), &[], None);

        assert_eq!(outcome.cover, CoverImageSource::Stored(name.clone()));
        assert!(outcome.snapshot.is_none());
        assert_eq!(cover_image(&outcome).unwrap().png, stored);
        assert_eq!(snapshot_files(&dir), vec![name]);
    }

    #[test]
    fn test_stale_reference_triggers_new_snapshot() {
        let dir = tempdir().unwrap();
        let assembler = assembler(&dir);
        let mut plot = Plot::new(9, "Club Night");
        plot.snapshot_filename = Some("plot_9_1.png".to_string());

        let outcome = assembler.assemble(&plot, &elements(), &[], None);

        let fresh = outcome.new_snapshot_filename().unwrap().to_string();
        assert_ne!(fresh, "plot_9_1.png");
        assert!(fresh.starts_with("plot_9_"));
        assert_eq!(outcome.cover, CoverImageSource::Generated(fresh.clone()));
        assert!(assembler.snapshots().exists(&fresh));
        assert_eq!(
            cover_image(&outcome).unwrap().png,
            fs::read(dir.path().join(&fresh)).unwrap()
        );
    }

    #[test]
    fn test_corrupt_snapshot_is_regenerated() {
        let dir = tempdir().unwrap();
        let assembler = assembler(&dir);
        fs::write(dir.path().join("plot_4_10.png"), b"truncated").unwrap();
        let mut plot = Plot::new(4, "Corrupt");
        plot.snapshot_filename = Some("plot_4_10.png".to_string());

        let outcome = assembler.assemble(&plot, &elements(), &[], None);

        assert!(matches!(outcome.cover, CoverImageSource::Generated(_)));
        assert!(cover_image(&outcome).is_some());
    }

    #[test]
    fn test_custom_renderer_style_reaches_snapshot() {
        let dir = tempdir().unwrap();
        let style = SnapshotStyle {
            background: "#ff0000",
            ..Default::default()
        };
        let assembler = assembler(&dir).with_renderer(SnapshotRenderer::with_style(style));

        let outcome = assembler.assemble(&Plot::new(5, "Red"), &elements(), &[], None);

        let pixels = &cover_image(&outcome).unwrap().pixels;
        let offset = ((5 * pixels.width + 5) * 3) as usize;
        assert_eq!(&pixels.pixels[offset..offset + 3], &[255, 0, 0]);
    }

    #[test]
    fn test_no_elements_and_no_snapshot_uses_placeholder() {
        let dir = tempdir().unwrap();
        let assembler = assembler(&dir);

        let outcome = assembler.assemble(&Plot::new(2, "Empty"), &[], &[], None);

        assert_eq!(outcome.cover, CoverImageSource::Placeholder);
        assert_eq!(outcome.layout.sections[0].placeholder(), Some(NO_IMAGE));
        assert_eq!(outcome.layout.sections[1].placeholder(), Some(NO_ELEMENTS));
        assert!(snapshot_files(&dir).is_empty());
        assert_eq!(outcome.document.page_count, 3);
    }

    #[test]
    fn test_unwritable_snapshot_dir_degrades_to_placeholder() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("snapshots");
        fs::write(&blocker, b"file in the way").unwrap();
        let assembler =
            ReportAssembler::new(MockPlotRepository::new(), SnapshotStore::new(&blocker));

        let outcome = assembler.assemble(&Plot::new(3, "Blocked"), &elements(), &[], None);

        assert_eq!(outcome.cover, CoverImageSource::Placeholder);
        assert!(outcome.snapshot.is_none());
        assert!(outcome.document.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_generate_loads_plot_and_stage() {
        let dir = tempdir().unwrap();
        let mut repo = MockPlotRepository::new();
        repo.expect_get_plot()
            .with(eq(7))
            .times(1)
            .returning(|id| Ok(Some(Plot::new(id, "Rock Show! 2024"))));
        repo.expect_get_stage_dimensions()
            .with(eq(StageRef::UserVenue(3)))
            .times(1)
            .returning(|_| Ok(Some(StageDimensions::new(30.0, 30.0))));
        let assembler = ReportAssembler::new(repo, SnapshotStore::new(dir.path()));

        let request = ReportRequest {
            plot_id: 7,
            stage: Some(StageRef::UserVenue(3)),
            elements: elements(),
            inputs: vec![Input::new(1, "Kick")],
            auto_print: Some(true),
        };
        let outcome = assembler.generate(&request).unwrap();

        assert_eq!(outcome.document.filename, "stage_plot_Rock_Show__2024.pdf");
        let image = cover_image(&outcome).unwrap();
        assert_eq!((image.pixels.width, image.pixels.height), (300, 300));
        assert_eq!(outcome.element_count, 3);
        assert_eq!(outcome.input_count, 1);
        let names: Vec<&str> = outcome.layout.sections[1]
            .table_rows()
            .iter()
            .map(|row| row[1].as_str())
            .collect();
        assert_eq!(names, vec!["Amp 1", "Amp 2", "Mic"]);
    }

    #[test]
    fn test_generate_without_stage_skips_dimension_lookup() {
        let dir = tempdir().unwrap();
        let mut repo = MockPlotRepository::new();
        repo.expect_get_plot()
            .returning(|id| Ok(Some(Plot::new(id, "Default Ratio"))));
        repo.expect_get_stage_dimensions().never();
        let assembler = ReportAssembler::new(repo, SnapshotStore::new(dir.path()));

        let request = ReportRequest {
            plot_id: 1,
            elements: elements(),
            ..Default::default()
        };
        let outcome = assembler.generate(&request).unwrap();

        let image = cover_image(&outcome).unwrap();
        assert_eq!((image.pixels.width, image.pixels.height), (300, 180));
    }

    #[test]
    fn test_stage_lookup_failure_uses_default_ratio() {
        let mut repo = MockPlotRepository::new();
        repo.expect_get_stage_dimensions()
            .returning(|_| Err(ExportError::Repository("connection reset".to_string())));
        let dir = tempdir().unwrap();
        let assembler = ReportAssembler::new(repo, SnapshotStore::new(dir.path()));

        assert_eq!(assembler.stage_dimensions(Some(StageRef::Venue(1))), None);
    }

    #[test]
    fn test_missing_plot_is_an_error() {
        let dir = tempdir().unwrap();
        let mut repo = MockPlotRepository::new();
        repo.expect_get_plot().returning(|_| Ok(None));
        let assembler = ReportAssembler::new(repo, SnapshotStore::new(dir.path()));

        let err = assembler
            .generate(&ReportRequest { plot_id: 404, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, ExportError::PlotNotFound(404)));
    }

    #[test]
    fn test_export_writes_document() {
        let dir = tempdir().unwrap();
        let mut repo = MockPlotRepository::new();
        repo.expect_get_plot()
            .returning(|id| Ok(Some(Plot::new(id, "Out"))));
        let assembler = ReportAssembler::new(repo, SnapshotStore::new(dir.path().join("snaps")));

        let out = dir.path().join("tmp");
        let (outcome, path) = assembler
            .export(&ReportRequest { plot_id: 1, ..Default::default() }, &out)
            .unwrap();

        assert_eq!(path, out.join("stage_plot_Out.pdf"));
        assert_eq!(fs::read(&path).unwrap(), outcome.document.bytes);
    }
}
