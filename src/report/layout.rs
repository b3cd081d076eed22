//! Report content, independent of the output format.
//!
//! The assembler fills a [`ReportLayout`] with sections; the PDF writer
//! places each section on a new page and paginates tables that overflow.

use crate::model::{Input, PlacedElement, Plot};
use crate::snapshot::RgbImage;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

pub const DEFAULT_TITLE: &str = "Stage Plot";
pub const NO_IMAGE: &str = "No stage plot image available";
pub const NO_ELEMENTS: &str = "No elements placed";
pub const NO_INPUTS: &str = "No inputs defined";

const ELEMENT_HEADING: &str = "Equipment List";
const INPUT_HEADING: &str = "Input List";

/// A whole report: one section per page group.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub title: String,
    pub sections: Vec<Section>,
}

/// Content that starts on a fresh page.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Large centered heading.
    Title(String),
    /// Centered single line beneath the title.
    Subtitle(String),
    /// Left-aligned section heading.
    Heading(String),
    Image(EmbeddedImage),
    /// Bordered cell with a centered message, standing in for missing content.
    Placeholder(String),
    Table(Table),
}

/// A PNG carried into the document, with its decoded pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedImage {
    pub png: Vec<u8>,
    pub pixels: RgbImage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: &'static str,
    /// Share of the content width, 0..=1.
    pub share: f32,
    /// Wrap onto several lines instead of truncating.
    pub wrap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

impl Section {
    /// Texts of every table row in this section, for inspection.
    pub fn table_rows(&self) -> Vec<&[String]> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(t) => Some(t),
                _ => None,
            })
            .flat_map(|t| t.rows.iter().map(Vec::as_slice))
            .collect()
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            Block::Placeholder(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// One printed row of the equipment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRow {
    /// 1-based position in the original element list.
    pub index: usize,
    pub name: String,
    pub label: String,
    pub notes: String,
}

/// Builds equipment rows in list order.
///
/// Names shared by several elements get a running per-name counter
/// (`Amp 1`, `Amp 2`); unique names print unchanged. Elements without a
/// name print nothing but still use up their index.
pub fn element_rows(elements: &[PlacedElement]) -> Vec<ElementRow> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for name in elements.iter().filter_map(PlacedElement::display_name) {
        *totals.entry(name).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut rows = Vec::with_capacity(elements.len());
    for (i, element) in elements.iter().enumerate() {
        let Some(name) = element.display_name() else {
            continue;
        };

        let name = if totals[name] > 1 {
            let n = seen.entry(name).or_default();
            *n += 1;
            format!("{} {}", name, n)
        } else {
            name.to_string()
        };

        rows.push(ElementRow {
            index: i + 1,
            name,
            label: element.display_label().unwrap_or_default().to_string(),
            notes: element.display_notes().unwrap_or_default().to_string(),
        });
    }
    rows
}

/// Builds `[number, description]` rows for the input list.
pub fn input_rows(inputs: &[Input]) -> Vec<[String; 2]> {
    inputs
        .iter()
        .map(|input| {
            [
                input
                    .number
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                input
                    .label
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
            ]
        })
        .collect()
}

/// The cover: title, optional dates and venue, then the image or a placeholder.
pub fn cover_section(plot: &Plot, image: Option<EmbeddedImage>) -> Section {
    let mut blocks = vec![Block::Title(display_title(plot))];

    if let Some(dates) = format_event_dates(plot.event_start.as_deref(), plot.event_end.as_deref())
    {
        blocks.push(Block::Subtitle(dates));
    }
    if let Some(venue) = plot.venue_name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        blocks.push(Block::Subtitle(format!("Venue: {}", venue)));
    }

    blocks.push(match image {
        Some(image) => Block::Image(image),
        None => Block::Placeholder(NO_IMAGE.to_string()),
    });

    Section { blocks }
}

pub fn element_section(elements: &[PlacedElement]) -> Section {
    let rows = element_rows(elements);
    let body = if rows.is_empty() {
        Block::Placeholder(NO_ELEMENTS.to_string())
    } else {
        Block::Table(Table {
            columns: vec![
                Column { header: "Index", share: 0.08, wrap: false },
                Column { header: "Element", share: 0.30, wrap: false },
                Column { header: "Label", share: 0.17, wrap: false },
                Column { header: "Notes", share: 0.45, wrap: true },
            ],
            rows: rows
                .into_iter()
                .map(|r| vec![r.index.to_string(), r.name, r.label, r.notes])
                .collect(),
        })
    };

    Section {
        blocks: vec![Block::Heading(ELEMENT_HEADING.to_string()), body],
    }
}

pub fn input_section(inputs: &[Input]) -> Section {
    let body = if inputs.is_empty() {
        Block::Placeholder(NO_INPUTS.to_string())
    } else {
        Block::Table(Table {
            columns: vec![
                Column { header: "Input #", share: 0.2, wrap: false },
                Column { header: "Description", share: 0.8, wrap: false },
            ],
            rows: input_rows(inputs).into_iter().map(Vec::from).collect(),
        })
    };

    Section {
        blocks: vec![Block::Heading(INPUT_HEADING.to_string()), body],
    }
}

/// The plot title, or [`DEFAULT_TITLE`] when blank.
pub fn display_title(plot: &Plot) -> String {
    let title = plot.title.trim();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// The title the document filename is built from. Unlike
/// [`display_title`] it is not trimmed, so surrounding spaces become `_`.
pub fn filename_title(plot: &Plot) -> &str {
    if plot.title.trim().is_empty() {
        DEFAULT_TITLE
    } else {
        &plot.title
    }
}

/// Replaces every character other than ASCII letters, digits, `_` and `-`
/// with `_`, one for one.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `stage_plot_<sanitized title>.pdf`.
///
/// The plot id is not part of the name, so plots with the same sanitized
/// title share a filename.
pub fn document_filename(title: &str) -> String {
    format!("stage_plot_{}.pdf", sanitize_title(title))
}

/// A single date, or `start – end` when both are present and differ.
pub fn format_event_dates(start: Option<&str>, end: Option<&str>) -> Option<String> {
    let clean = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(format_date);
    match (clean(start), clean(end)) {
        (Some(s), Some(e)) if s != e => Some(format!("{} \u{2013} {}", s, e)),
        (Some(s), _) => Some(s),
        (None, Some(e)) => Some(e),
        (None, None) => None,
    }
}

/// Renders a stored date as `June 1, 2024`, or returns it unchanged if it
/// is not in a recognised format.
pub fn format_date(raw: &str) -> String {
    const OUT: &str = "%B %-d, %Y";

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format(OUT).to_string();
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format(OUT).to_string();
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(OUT).to_string();
    }
    raw.to_string()
}
