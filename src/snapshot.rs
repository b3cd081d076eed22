//! Stage thumbnail rendering.
//!
//! A snapshot is described as an SVG scene (background, border, caption,
//! element boxes, labels), rasterized with resvg and encoded as PNG. Text is
//! drawn with the fixed bitmap font as pixel-aligned squares so the output
//! does not depend on any installed fonts.

use crate::bitmap_font::{self, CELL_HEIGHT, CELL_WIDTH};
use crate::error::{ExportError, Result};
use crate::geometry::{CanvasSize, GeometryMapper, MappedBox, MappedElement};
use crate::model::{PlacedElement, StageDimensions};
use png::{BitDepth, ColorType, Compression, Encoder, FilterType};
use resvg::tiny_skia;
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Caption printed along the bottom edge of every snapshot.
pub const CAPTION: &str = "FRONT OF STAGE";

/// Labels are only drawn inside boxes larger than this (width, height).
const LABEL_MIN_BOX: (f64, f64) = (20.0, 10.0);
/// Gap between text and the edge it is anchored to.
const TEXT_INSET: u32 = 2;

/// Colors used by the renderer, as `#rrggbb`.
#[derive(Debug, Clone)]
pub struct SnapshotStyle {
    pub background: &'static str,
    pub border: &'static str,
    pub caption: &'static str,
    pub element_fill: &'static str,
    pub element_outline: &'static str,
    pub label: &'static str,
}

impl Default for SnapshotStyle {
    fn default() -> Self {
        Self {
            background: "#f0f0f0",
            border: "#333333",
            caption: "#555555",
            element_fill: "#4682b4",
            element_outline: "#1e3c5a",
            label: "#ffffff",
        }
    }
}

/// Renders mapped elements into PNG thumbnails.
///
/// Output is a pure function of the canvas size and element list; rendering
/// the same input twice yields identical bytes.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRenderer {
    style: SnapshotStyle,
}

impl SnapshotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(style: SnapshotStyle) -> Self {
        Self { style }
    }

    /// Maps `elements` onto a canvas `width` pixels wide and renders them.
    ///
    /// Returns `None` if rasterization or encoding fails.
    pub fn render_stage(
        &self,
        width: u32,
        dimensions: Option<&StageDimensions>,
        elements: &[PlacedElement],
    ) -> Option<Vec<u8>> {
        let mapper = GeometryMapper::new(CanvasSize::for_stage(width, dimensions));
        self.render(mapper.canvas(), &mapper.map_all(elements))
    }

    /// Renders already-mapped elements, logging and discarding any failure.
    pub fn render(&self, canvas: CanvasSize, elements: &[MappedElement]) -> Option<Vec<u8>> {
        match self.try_render(canvas, elements) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(
                    width = canvas.width,
                    height = canvas.height,
                    error = %e,
                    "Snapshot rendering failed"
                );
                None
            }
        }
    }

    /// Renders already-mapped elements to PNG bytes.
    pub fn try_render(&self, canvas: CanvasSize, elements: &[MappedElement]) -> Result<Vec<u8>> {
        let svg = self.build_scene(canvas, elements);

        let tree = usvg::Tree::from_str(&svg, &usvg::Options::default())
            .map_err(|e| ExportError::Scene(e.to_string()))?;

        let mut pixmap =
            tiny_skia::Pixmap::new(canvas.width, canvas.height).ok_or(ExportError::Canvas {
                width: canvas.width,
                height: canvas.height,
            })?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        let png = encode_png(&pixmap)?;
        debug!(
            width = canvas.width,
            height = canvas.height,
            elements = elements.len(),
            bytes = png.len(),
            "Snapshot rendered"
        );
        Ok(png)
    }

    /// Builds the SVG scene in draw order: background and border, caption,
    /// then each element box followed by its label.
    pub fn build_scene(&self, canvas: CanvasSize, elements: &[MappedElement]) -> String {
        let style = &self.style;
        let (w, h) = (canvas.width, canvas.height);
        let mut svg = String::with_capacity(1024 + elements.len() * 256);

        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" shape-rendering="crispEdges">"#
        );
        let _ = write!(
            svg,
            r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{}"/>"#,
            style.background
        );
        let _ = write!(
            svg,
            r#"<rect x="0.5" y="0.5" width="{}" height="{}" fill="none" stroke="{}" stroke-width="1"/>"#,
            w.saturating_sub(1),
            h.saturating_sub(1),
            style.border
        );

        let caption_x = w.saturating_sub(bitmap_font::text_width(CAPTION)) / 2;
        let caption_y = h.saturating_sub(CELL_HEIGHT + TEXT_INSET);
        push_text(&mut svg, CAPTION, i64::from(caption_x), i64::from(caption_y), style.caption);

        for element in elements {
            let b = element.bounds;
            if !is_drawable(&b) {
                continue;
            }
            let _ = write!(
                svg,
                r#"<rect x="{:.3}" y="{:.3}" width="{:.3}" height="{:.3}" fill="{}" stroke="{}" stroke-width="1"/>"#,
                b.x, b.y, b.width, b.height, style.element_fill, style.element_outline
            );

            if let Some((text, x, y)) = label_placement(element) {
                if text_visible(canvas, &text, x, y) {
                    push_text(&mut svg, &text, x, y, style.label);
                }
            }
        }

        svg.push_str("</svg>");
        svg
    }
}

fn is_drawable(b: &MappedBox) -> bool {
    [b.x, b.y, b.width, b.height].iter().all(|v| v.is_finite()) && b.width > 0.0 && b.height > 0.0
}

/// Where the label of `element` goes, truncated to the box width.
///
/// `None` when there is no label or the box is too small. The origin may lie
/// outside the canvas; pixels that fall off it are clipped.
fn label_placement(element: &MappedElement) -> Option<(String, i64, i64)> {
    let label = element.label.as_deref()?;
    let b = element.bounds;
    if b.width <= LABEL_MIN_BOX.0 || b.height <= LABEL_MIN_BOX.1 {
        return None;
    }

    let room = (b.width - f64::from(TEXT_INSET * 2)).max(0.0);
    let max_chars = (room / f64::from(CELL_WIDTH)).floor() as usize;
    let text: String = label.chars().take(max_chars).collect();
    if text.is_empty() {
        return None;
    }

    // `as` saturates, so far-off boxes stay far off instead of wrapping.
    let x = (b.x.floor() as i64).saturating_add(i64::from(TEXT_INSET));
    let y = (b.bottom().floor() as i64).saturating_sub(i64::from(CELL_HEIGHT + TEXT_INSET));
    Some((text, x, y))
}

/// Whether any cell of `text` drawn at (`x`, `y`) overlaps the canvas.
fn text_visible(canvas: CanvasSize, text: &str, x: i64, y: i64) -> bool {
    let width = i64::from(bitmap_font::text_width(text));
    x < i64::from(canvas.width)
        && y < i64::from(canvas.height)
        && x.saturating_add(width) > 0
        && y.saturating_add(i64::from(CELL_HEIGHT)) > 0
}

/// Appends `text` as one path of 1x1 squares, one per lit font pixel.
fn push_text(svg: &mut String, text: &str, x: i64, y: i64, fill: &str) {
    let mut data = String::new();
    let mut origin_x = x;
    for ch in text.chars() {
        for (dx, dy) in bitmap_font::lit_pixels(ch) {
            let px = origin_x.saturating_add(i64::from(dx));
            let py = y.saturating_add(i64::from(dy));
            let _ = write!(data, "M{} {}h1v1h-1z", px, py);
        }
        origin_x = origin_x.saturating_add(i64::from(CELL_WIDTH));
    }
    if data.is_empty() {
        return;
    }
    let _ = write!(svg, r#"<path d="{data}" fill="{fill}"/>"#);
}

/// Encodes a pixmap as 8-bit RGBA PNG with fixed encoder settings.
pub fn encode_png(pixmap: &tiny_skia::Pixmap) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut enc = Encoder::new(&mut out, pixmap.width(), pixmap.height());
        enc.set_color(ColorType::Rgba);
        enc.set_depth(BitDepth::Eight);
        enc.set_filter(FilterType::NoFilter);
        enc.set_compression(Compression::Default);
        let mut writer = enc.write_header()?;
        writer.write_image_data(pixmap.data())?;
        writer.finish()?;
    }
    Ok(out)
}

/// Decoded 8-bit RGB pixels, alpha composited over white.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decodes a PNG into packed RGB.
pub fn decode_png(bytes: &[u8]) -> Result<RgbImage> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != BitDepth::Eight {
        return Err(ExportError::UnsupportedImage(format!(
            "bit depth {:?}",
            info.bit_depth
        )));
    }

    let over_white = |c: u8, a: u8| -> u8 {
        let (c, a) = (u16::from(c), u16::from(a));
        ((c * a + 255 * (255 - a) + 127) / 255) as u8
    };

    let pixels = match info.color_type {
        ColorType::Rgb => buf,
        ColorType::Rgba => buf
            .chunks_exact(4)
            .flat_map(|p| [over_white(p[0], p[3]), over_white(p[1], p[3]), over_white(p[2], p[3])])
            .collect(),
        ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g]).collect(),
        ColorType::GrayscaleAlpha => buf
            .chunks_exact(2)
            .flat_map(|p| {
                let g = over_white(p[0], p[1]);
                [g, g, g]
            })
            .collect(),
        other => {
            return Err(ExportError::UnsupportedImage(format!(
                "color type {:?}",
                other
            )))
        }
    };

    Ok(RgbImage {
        width: info.width,
        height: info.height,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::DEFAULT_THUMBNAIL_WIDTH;

    fn pixel(image: &RgbImage, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * image.width + x) * 3) as usize;
        [image.pixels[i], image.pixels[i + 1], image.pixels[i + 2]]
    }

    fn sample_elements() -> Vec<PlacedElement> {
        vec![
            PlacedElement::new("Guitar Amp", 90.0, 70.0, 180.0, 140.0).with_label("GTR"),
            PlacedElement::new("Drum Riser", 360.0, 70.0, 270.0, 210.0).with_label("DR"),
            PlacedElement::new("Mic", 700.0, 400.0, 30.0, 30.0).with_label("V1"),
        ]
    }

    #[test]
    fn test_render_produces_png_of_canvas_size() {
        let renderer = SnapshotRenderer::new();
        let dims = StageDimensions::new(40.0, 20.0);
        let png = renderer
            .render_stage(DEFAULT_THUMBNAIL_WIDTH, Some(&dims), &sample_elements())
            .unwrap();

        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let image = decode_png(&png).unwrap();
        assert_eq!((image.width, image.height), (300, 150));
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = SnapshotRenderer::new();
        let first = renderer.render_stage(300, None, &sample_elements()).unwrap();
        let second = renderer.render_stage(300, None, &sample_elements()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rotation_does_not_change_pixels() {
        let renderer = SnapshotRenderer::new();
        let upright = sample_elements();
        let rotated: Vec<_> = upright.iter().cloned().map(|e| e.with_rotation(90.0)).collect();

        assert_eq!(
            renderer.render_stage(300, None, &upright),
            renderer.render_stage(300, None, &rotated)
        );
    }

    #[test]
    fn test_background_border_and_element_fill() {
        let renderer = SnapshotRenderer::new();
        let elements = vec![PlacedElement::new("Riser", 300.0, 210.0, 300.0, 210.0)];
        let image = decode_png(&renderer.render_stage(300, None, &elements).unwrap()).unwrap();

        // border, background, then the middle of the box (100..200 x 54..108)
        assert_eq!(pixel(&image, 0, 0), [0x33, 0x33, 0x33]);
        assert_eq!(pixel(&image, 10, 10), [0xf0, 0xf0, 0xf0]);
        assert_eq!(pixel(&image, 150, 70), [0x46, 0x82, 0xb4]);
    }

    #[test]
    fn test_caption_sits_above_bottom_edge() {
        let renderer = SnapshotRenderer::new();
        let scene = renderer.build_scene(CanvasSize { width: 300, height: 180 }, &[]);
        // 'F' of the caption starts at x = (300 - 84) / 2 = 108, y = 180 - 8 - 2 = 170
        assert!(scene.contains("M108 170h1v1h-1z"));

        let image = decode_png(&renderer.render_stage(300, None, &[]).unwrap()).unwrap();
        assert_eq!(pixel(&image, 108, 170), [0x55, 0x55, 0x55]);
    }

    #[test]
    fn test_label_requires_large_enough_box() {
        let small = MappedElement {
            bounds: MappedBox { x: 10.0, y: 10.0, width: 20.0, height: 30.0 },
            label: Some("V1".to_string()),
        };
        let short = MappedElement {
            bounds: MappedBox { x: 10.0, y: 10.0, width: 40.0, height: 10.0 },
            label: Some("V1".to_string()),
        };
        let large = MappedElement {
            bounds: MappedBox { x: 10.0, y: 10.0, width: 40.0, height: 30.0 },
            label: Some("V1".to_string()),
        };

        assert!(label_placement(&small).is_none());
        assert!(label_placement(&short).is_none());
        assert_eq!(label_placement(&large), Some(("V1".to_string(), 12, 30)));
    }

    #[test]
    fn test_label_truncated_to_box() {
        let element = MappedElement {
            bounds: MappedBox { x: 0.0, y: 0.0, width: 26.0, height: 20.0 },
            label: Some("KEYBOARD".to_string()),
        };
        let (text, _, _) = label_placement(&element).unwrap();
        assert_eq!(text, "KEY");
    }

    #[test]
    fn test_far_off_labelled_element_still_renders() {
        let renderer = SnapshotRenderer::new();
        let elements = [
            PlacedElement::new("Amp", 1.3e10, 100.0, 300.0, 200.0).with_label("GTR"),
            PlacedElement::new("Amp", -5000.0, 100.0, 300.0, 200.0).with_label("GTR"),
        ];

        let png = renderer.render_stage(300, None, &elements).unwrap();
        let empty = renderer.render_stage(300, None, &[]).unwrap();
        assert_eq!(decode_png(&png).unwrap(), decode_png(&empty).unwrap());
    }

    #[test]
    fn test_label_kept_when_box_overhangs_top_left() {
        let element = MappedElement {
            bounds: MappedBox { x: -10.5, y: -20.0, width: 60.0, height: 40.0 },
            label: Some("VOX".to_string()),
        };
        assert_eq!(label_placement(&element), Some(("VOX".to_string(), -9, 10)));

        let canvas = CanvasSize { width: 300, height: 180 };
        let scene = SnapshotRenderer::new().build_scene(canvas, &[element]);
        assert_eq!(scene.matches("<path").count(), 2);
        assert!(scene.contains("M-9 "));
    }

    #[test]
    fn test_labels_wholly_off_canvas_are_dropped() {
        let canvas = CanvasSize { width: 300, height: 180 };
        assert!(text_visible(canvas, "AB", -11, 0));
        assert!(!text_visible(canvas, "AB", -12, 0));
        assert!(!text_visible(canvas, "AB", 300, 0));
        assert!(!text_visible(canvas, "AB", 0, 180));
        assert!(!text_visible(canvas, "AB", 0, -8));
        assert!(!text_visible(canvas, "AB", i64::MIN, i64::MAX));
    }

    #[test]
    fn test_degenerate_boxes_are_skipped() {
        let renderer = SnapshotRenderer::new();
        let elements = [MappedElement {
            bounds: MappedBox { x: 5.0, y: 5.0, width: 0.0, height: f64::NAN },
            label: None,
        }];
        let scene = renderer.build_scene(CanvasSize { width: 300, height: 180 }, &elements);
        assert_eq!(scene.matches("<rect").count(), 2);
        assert!(renderer.render(CanvasSize { width: 300, height: 180 }, &elements).is_some());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_png(b"not a png").is_err());
    }
}
