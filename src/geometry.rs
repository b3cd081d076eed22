//! Mapping from the design canvas into thumbnail pixel space.

use crate::model::{PlacedElement, StageDimensions};

/// Width of the design canvas elements are authored on.
pub const DESIGN_WIDTH: f64 = 900.0;
/// Height of the design canvas elements are authored on.
pub const DESIGN_HEIGHT: f64 = 700.0;

/// Thumbnail width used when the caller does not ask for another one.
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 300;
/// Canvases are never shorter than this.
pub const MIN_CANVAS_HEIGHT: u32 = 120;
/// Depth/width ratio used when stage dimensions are unknown (300x180).
pub const DEFAULT_ASPECT_RATIO: f64 = 180.0 / 300.0;

/// Pixel size of a thumbnail canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    /// Derives the canvas for `width` pixels and a depth/width `ratio`.
    ///
    /// The height is `round(width * ratio)`, raised to [`MIN_CANVAS_HEIGHT`].
    pub fn for_ratio(width: u32, ratio: f64) -> Self {
        let ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            DEFAULT_ASPECT_RATIO
        };
        let height = (f64::from(width) * ratio).round();
        let height = if height >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            height as u32
        };

        Self {
            width,
            height: height.max(MIN_CANVAS_HEIGHT),
        }
    }

    /// Derives the canvas from optional stage dimensions.
    pub fn for_stage(width: u32, dimensions: Option<&StageDimensions>) -> Self {
        Self::for_ratio(width, aspect_ratio(dimensions))
    }
}

/// Depth/width ratio of the stage, or [`DEFAULT_ASPECT_RATIO`].
pub fn aspect_ratio(dimensions: Option<&StageDimensions>) -> f64 {
    dimensions
        .and_then(StageDimensions::aspect_ratio)
        .unwrap_or(DEFAULT_ASPECT_RATIO)
}

/// An axis-aligned box in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MappedBox {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// An element ready to draw: its box plus the label to print inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedElement {
    pub bounds: MappedBox,
    pub label: Option<String>,
}

/// Scales design-canvas geometry onto a [`CanvasSize`].
///
/// Rotation is not applied; every mapped box stays axis-aligned.
#[derive(Debug, Clone, Copy)]
pub struct GeometryMapper {
    canvas: CanvasSize,
    scale_x: f64,
    scale_y: f64,
}

impl GeometryMapper {
    pub fn new(canvas: CanvasSize) -> Self {
        Self {
            canvas,
            scale_x: f64::from(canvas.width) / DESIGN_WIDTH,
            scale_y: f64::from(canvas.height) / DESIGN_HEIGHT,
        }
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    pub fn map_box(&self, element: &PlacedElement) -> MappedBox {
        MappedBox {
            x: element.x * self.scale_x,
            y: element.y * self.scale_y,
            width: element.width * self.scale_x,
            height: element.height * self.scale_y,
        }
    }

    pub fn map(&self, element: &PlacedElement) -> MappedElement {
        MappedElement {
            bounds: self.map_box(element),
            label: element.display_label().map(str::to_string),
        }
    }

    pub fn map_all(&self, elements: &[PlacedElement]) -> Vec<MappedElement> {
        elements.iter().map(|e| self.map(e)).collect()
    }
}
