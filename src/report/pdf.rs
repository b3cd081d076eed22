//! PDF output for a [`ReportLayout`].
//!
//! Each section starts on a new page. Tables that run past the bottom
//! margin continue on the next page with their header repeated. Text uses
//! the standard Helvetica faces, so nothing is embedded except images.
//! Images and page content streams are zlib-compressed.

use super::layout::{Block, EmbeddedImage, ReportLayout, Table};
use super::metrics::{self, FontFace};
use crate::snapshot::RgbImage;
use miniz_oxide::deflate::compress_to_vec_zlib;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use tracing::debug;

const PRODUCER: &str = concat!("stageplot-export ", env!("CARGO_PKG_VERSION"));

const TITLE_SIZE: f32 = 22.0;
const SUBTITLE_SIZE: f32 = 12.0;
const HEADING_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 10.0;
const FOOTER_SIZE: f32 = 8.0;

const LINE_HEIGHT: f32 = 13.0;
const CELL_PADDING: f32 = 4.0;
const BLOCK_GAP: f32 = 12.0;
const PLACEHOLDER_HEIGHT: f32 = 44.0;
const MAX_IMAGE_HEIGHT: f32 = 400.0;

const DEFLATE_LEVEL: u8 = 6;

/// Page size and margin in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

/// US Letter, portrait, 0.75in margins.
pub const LETTER: PageSetup = PageSetup {
    width: 612.0,
    height: 792.0,
    margin: 54.0,
};

impl PageSetup {
    fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    fn top(&self) -> f32 {
        self.height - self.margin
    }

    fn bottom(&self) -> f32 {
        self.margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfOptions {
    pub page: PageSetup,
    /// Ask the viewer to open its print dialog when the file is opened.
    pub auto_print: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            page: LETTER,
            auto_print: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Lays out `layout` and serializes it as a PDF.
pub fn write_pdf(layout: &ReportLayout, options: &PdfOptions) -> RenderedPdf {
    let mut composer = Composer::new(options.page);
    for section in &layout.sections {
        composer.new_page();
        for block in &section.blocks {
            composer.place(block);
        }
    }
    composer.finish(&layout.title, options.auto_print)
}

struct PageContent {
    content: Content,
    /// Indices into `Composer::images` drawn on this page.
    images: Vec<usize>,
}

struct Composer<'a> {
    setup: PageSetup,
    pages: Vec<PageContent>,
    images: Vec<&'a RgbImage>,
    y: f32,
}

impl<'a> Composer<'a> {
    fn new(setup: PageSetup) -> Self {
        Self {
            setup,
            pages: Vec::new(),
            images: Vec::new(),
            y: setup.top(),
        }
    }

    fn new_page(&mut self) {
        self.pages.push(PageContent {
            content: Content::new(),
            images: Vec::new(),
        });
        self.y = self.setup.top();
    }

    fn current(&mut self) -> &mut PageContent {
        if self.pages.is_empty() {
            self.new_page();
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn at_page_top(&self) -> bool {
        self.y >= self.setup.top()
    }

    /// Starts a new page unless `height` more points fit on this one.
    fn reserve(&mut self, height: f32) {
        if self.y - height < self.setup.bottom() && !self.at_page_top() {
            self.new_page();
        }
    }

    fn place(&mut self, block: &'a Block) {
        match block {
            Block::Title(text) => {
                self.reserve(TITLE_SIZE + BLOCK_GAP);
                let baseline = self.y - TITLE_SIZE;
                self.centered_text(FontFace::Bold, TITLE_SIZE, baseline, text);
                self.y -= TITLE_SIZE + BLOCK_GAP;
            }
            Block::Subtitle(text) => {
                self.reserve(SUBTITLE_SIZE + 6.0);
                let baseline = self.y - SUBTITLE_SIZE;
                self.centered_text(FontFace::Regular, SUBTITLE_SIZE, baseline, text);
                self.y -= SUBTITLE_SIZE + 6.0;
            }
            Block::Heading(text) => {
                self.reserve(HEADING_SIZE + BLOCK_GAP);
                let baseline = self.y - HEADING_SIZE;
                let (x, width) = (self.setup.margin, self.setup.content_width());
                let text = metrics::truncate_to_width(FontFace::Bold, text, HEADING_SIZE, width);
                self.text(FontFace::Bold, HEADING_SIZE, x, baseline, &text);

                let rule_y = baseline - 6.0;
                self.current()
                    .content
                    .set_stroke_gray(0.3)
                    .set_line_width(0.75)
                    .move_to(x, rule_y)
                    .line_to(x + width, rule_y)
                    .stroke();
                self.y -= HEADING_SIZE + BLOCK_GAP;
            }
            Block::Image(image) => self.image(image),
            Block::Placeholder(text) => self.placeholder(text),
            Block::Table(table) => self.table(table),
        }
    }

    fn image(&mut self, image: &'a EmbeddedImage) {
        let pixels = &image.pixels;
        if pixels.width == 0 || pixels.height == 0 {
            return;
        }

        let (px_w, px_h) = (pixels.width as f32, pixels.height as f32);
        let scale = (self.setup.content_width() / px_w).min(MAX_IMAGE_HEIGHT / px_h);
        let (w, h) = (px_w * scale, px_h * scale);

        self.reserve(BLOCK_GAP + h);
        let top = self.y - BLOCK_GAP;
        let x = self.setup.margin + (self.setup.content_width() - w) / 2.0;

        let index = self.images.len();
        self.images.push(pixels);
        let page = self.current();
        page.images.push(index);
        page.content
            .save_state()
            .transform([w, 0.0, 0.0, h, x, top - h])
            .x_object(Name(image_name(index).as_bytes()))
            .restore_state();
        page.content
            .set_stroke_gray(0.4)
            .set_line_width(0.5)
            .rect(x, top - h, w, h)
            .stroke();

        self.y = top - h;
    }

    fn placeholder(&mut self, text: &str) {
        self.reserve(BLOCK_GAP + PLACEHOLDER_HEIGHT);
        let top = self.y - BLOCK_GAP;
        let (x, width) = (self.setup.margin, self.setup.content_width());

        self.current()
            .content
            .set_stroke_gray(0.6)
            .set_line_width(0.75)
            .rect(x, top - PLACEHOLDER_HEIGHT, width, PLACEHOLDER_HEIGHT)
            .stroke();
        let baseline = top - PLACEHOLDER_HEIGHT / 2.0 - BODY_SIZE * 0.35;
        self.centered_text(FontFace::Regular, BODY_SIZE + 1.0, baseline, text);

        self.y = top - PLACEHOLDER_HEIGHT;
    }

    fn table(&mut self, table: &Table) {
        let content_width = self.setup.content_width();
        let widths: Vec<f32> = table.columns.iter().map(|c| c.share * content_width).collect();
        let header_height = LINE_HEIGHT + 2.0 * CELL_PADDING;
        let usable = self.setup.top() - self.setup.bottom() - header_height - 2.0 * CELL_PADDING;
        let max_lines = ((usable / LINE_HEIGHT).floor() as usize).max(1);

        self.reserve(BLOCK_GAP + 2.0 * header_height);
        if !self.at_page_top() {
            self.y -= BLOCK_GAP;
        }
        self.table_header(table, &widths);

        for row in &table.rows {
            let cells: Vec<Vec<String>> = row
                .iter()
                .zip(&table.columns)
                .zip(&widths)
                .map(|((text, column), &width)| {
                    fit_cell(text, column.wrap, width - 2.0 * CELL_PADDING, max_lines)
                })
                .collect();
            let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let height = lines as f32 * LINE_HEIGHT + 2.0 * CELL_PADDING;

            if self.y - height < self.setup.bottom() {
                self.new_page();
                self.table_header(table, &widths);
            }

            let top = self.y;
            let mut x = self.setup.margin;
            for (cell, &width) in cells.iter().zip(&widths) {
                self.current()
                    .content
                    .set_stroke_gray(0.6)
                    .set_line_width(0.5)
                    .rect(x, top - height, width, height)
                    .stroke();
                for (i, line) in cell.iter().enumerate() {
                    let baseline = top - CELL_PADDING - BODY_SIZE - i as f32 * LINE_HEIGHT + 1.0;
                    self.text(FontFace::Regular, BODY_SIZE, x + CELL_PADDING, baseline, line);
                }
                x += width;
            }
            self.y -= height;
        }
    }

    fn table_header(&mut self, table: &Table, widths: &[f32]) {
        let height = LINE_HEIGHT + 2.0 * CELL_PADDING;
        let top = self.y;
        let mut x = self.setup.margin;

        for (column, &width) in table.columns.iter().zip(widths) {
            self.current()
                .content
                .set_fill_gray(0.88)
                .rect(x, top - height, width, height)
                .fill_nonzero()
                .set_stroke_gray(0.6)
                .set_line_width(0.5)
                .rect(x, top - height, width, height)
                .stroke();
            let label = metrics::truncate_to_width(
                FontFace::Bold,
                column.header,
                BODY_SIZE,
                width - 2.0 * CELL_PADDING,
            );
            let baseline = top - CELL_PADDING - BODY_SIZE + 1.0;
            self.text(FontFace::Bold, BODY_SIZE, x + CELL_PADDING, baseline, &label);
            x += width;
        }
        self.y -= height;
    }

    fn text(&mut self, face: FontFace, size: f32, x: f32, baseline: f32, text: &str) {
        let encoded = metrics::to_win_ansi(text);
        self.current()
            .content
            .set_fill_gray(0.0)
            .begin_text()
            .set_font(Name(font_resource(face)), size)
            .next_line(x, baseline)
            .show(Str(&encoded))
            .end_text();
    }

    fn centered_text(&mut self, face: FontFace, size: f32, baseline: f32, text: &str) {
        let width = self.setup.content_width();
        let text = metrics::truncate_to_width(face, text, size, width);
        let x = self.setup.margin + (width - metrics::text_width(face, &text, size)) / 2.0;
        self.text(face, size, x, baseline, &text);
    }

    fn finish(mut self, title: &str, auto_print: bool) -> RenderedPdf {
        if self.pages.is_empty() {
            self.new_page();
        }

        let total = self.pages.len();
        for number in 1..=total {
            self.pages[number - 1].content.set_fill_gray(0.0);
            let footer = format!("Page {} of {}", number, total);
            let x = (self.setup.width - metrics::text_width(FontFace::Regular, &footer, FOOTER_SIZE))
                / 2.0;
            let encoded = metrics::to_win_ansi(&footer);
            self.pages[number - 1]
                .content
                .begin_text()
                .set_font(Name(font_resource(FontFace::Regular)), FOOTER_SIZE)
                .next_line(x, self.setup.margin / 2.0)
                .show(Str(&encoded))
                .end_text();
        }

        let mut alloc = Ref::new(1);
        let catalog_id = alloc.bump();
        let tree_id = alloc.bump();
        let regular_id = alloc.bump();
        let bold_id = alloc.bump();
        let info_id = alloc.bump();
        let image_ids: Vec<Ref> = self.images.iter().map(|_| alloc.bump()).collect();
        let page_ids: Vec<(Ref, Ref)> = (0..total).map(|_| (alloc.bump(), alloc.bump())).collect();

        let mut pdf = Pdf::new();
        {
            let mut catalog = pdf.catalog(catalog_id);
            catalog.pages(tree_id);
            if auto_print {
                catalog
                    .insert(Name(b"OpenAction"))
                    .dict()
                    .pair(Name(b"S"), Name(b"Named"))
                    .pair(Name(b"N"), Name(b"Print"));
            }
        }
        pdf.pages(tree_id)
            .kids(page_ids.iter().map(|(page, _)| *page))
            .count(total as i32);

        for (face, id) in [(FontFace::Regular, regular_id), (FontFace::Bold, bold_id)] {
            pdf.type1_font(id)
                .base_font(Name(face.base_font()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
        }

        pdf.document_info(info_id)
            .title(TextStr(title))
            .producer(TextStr(PRODUCER));

        for (image, &id) in self.images.iter().zip(&image_ids) {
            let compressed = compress_to_vec_zlib(&image.pixels, DEFLATE_LEVEL);
            let mut xobject = pdf.image_xobject(id, &compressed);
            xobject.filter(Filter::FlateDecode);
            xobject.width(image.width as i32);
            xobject.height(image.height as i32);
            xobject.color_space().device_rgb();
            xobject.bits_per_component(8);
            xobject.finish();
        }

        let setup = self.setup;
        for (page, &(page_id, content_id)) in self.pages.into_iter().zip(&page_ids) {
            let mut writer = pdf.page(page_id);
            writer.media_box(Rect::new(0.0, 0.0, setup.width, setup.height));
            writer.parent(tree_id);
            writer.contents(content_id);

            let mut resources = writer.resources();
            resources
                .fonts()
                .pair(Name(font_resource(FontFace::Regular)), regular_id)
                .pair(Name(font_resource(FontFace::Bold)), bold_id);
            if !page.images.is_empty() {
                let mut xobjects = resources.x_objects();
                for &index in &page.images {
                    xobjects.pair(Name(image_name(index).as_bytes()), image_ids[index]);
                }
            }
            resources.finish();
            writer.finish();

            let compressed = compress_to_vec_zlib(&page.content.finish(), DEFLATE_LEVEL);
            pdf.stream(content_id, &compressed).filter(Filter::FlateDecode);
        }

        let bytes = pdf.finish();
        debug!(pages = total, bytes = bytes.len(), "PDF serialized");
        RenderedPdf {
            bytes,
            page_count: total,
        }
    }
}

fn font_resource(face: FontFace) -> &'static [u8] {
    match face {
        FontFace::Regular => b"F1",
        FontFace::Bold => b"F2",
    }
}

fn image_name(index: usize) -> String {
    format!("Im{}", index + 1)
}

/// Cell text as printed lines: wrapped columns up to `max_lines`, all
/// others truncated to a single line.
fn fit_cell(text: &str, wrap: bool, width: f32, max_lines: usize) -> Vec<String> {
    if !wrap {
        return vec![metrics::truncate_to_width(FontFace::Regular, text, BODY_SIZE, width)];
    }

    let mut lines = metrics::wrap_text(FontFace::Regular, text, BODY_SIZE, width);
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.pop() {
            let marked = format!("{}...", last);
            lines.push(metrics::truncate_to_width(FontFace::Regular, &marked, BODY_SIZE, width));
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
