//! Data models shared by the renderer, the stores and the report assembler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One piece of equipment positioned on the design canvas.
///
/// Coordinates are top-left based, in design-canvas units (900x700).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedElement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees. Stored for round-tripping only; thumbnails are drawn unrotated.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PlacedElement {
    pub fn new(name: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
            name: Some(name.into()),
            label: None,
            notes: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Equipment name, or `None` when missing or blank.
    pub fn display_name(&self) -> Option<&str> {
        non_blank(self.name.as_deref())
    }

    pub fn display_label(&self) -> Option<&str> {
        non_blank(self.label.as_deref())
    }

    pub fn display_notes(&self) -> Option<&str> {
        non_blank(self.notes.as_deref())
    }
}

/// Physical stage size in feet, used only for its aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageDimensions {
    #[serde(alias = "widthFeet", alias = "stage_width")]
    pub width_feet: f64,
    #[serde(alias = "depthFeet", alias = "stage_depth")]
    pub depth_feet: f64,
}

impl StageDimensions {
    pub fn new(width_feet: f64, depth_feet: f64) -> Self {
        Self {
            width_feet,
            depth_feet,
        }
    }

    /// Depth/width ratio, or `None` unless both sides are positive and finite.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width_feet) && valid(self.depth_feet) {
            Some(self.depth_feet / self.width_feet)
        } else {
            None
        }
    }
}

/// Which venue record supplies the stage dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRef {
    Venue(i64),
    UserVenue(i64),
}

impl fmt::Display for StageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageRef::Venue(id) => write!(f, "venue:{}", id),
            StageRef::UserVenue(id) => write!(f, "user_venue:{}", id),
        }
    }
}

/// Plot metadata as returned by the data-access layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "eventStart", alias = "event_date_start")]
    pub event_start: Option<String>,
    #[serde(default, alias = "eventEnd", alias = "event_date_end")]
    pub event_end: Option<String>,
    #[serde(default, alias = "venueName")]
    pub venue_name: Option<String>,
    #[serde(default, alias = "snapshotFilename")]
    pub snapshot_filename: Option<String>,
}

impl Plot {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Default::default()
        }
    }
}

/// An input list entry. Older records use `input_number`/`channel` and
/// `description`/`name`; both spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, alias = "input_number", alias = "channel")]
    pub number: Option<InputNumber>,
    #[serde(default, alias = "description", alias = "name")]
    pub label: Option<String>,
}

impl Input {
    pub fn new(number: i64, label: impl Into<String>) -> Self {
        Self {
            number: Some(InputNumber::Number(number)),
            label: Some(label.into()),
        }
    }
}

/// Input numbers arrive as integers or, from legacy forms, as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputNumber {
    Number(i64),
    Decimal(f64),
    Text(String),
}

impl fmt::Display for InputNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputNumber::Number(n) => write!(f, "{}", n),
            InputNumber::Decimal(n) => write!(f, "{}", n),
            InputNumber::Text(s) => write!(f, "{}", s.trim()),
        }
    }
}

/// A rendered thumbnail and the name it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSnapshot {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The finished PDF and its suggested download name.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Everything a caller supplies to produce a report for a stored plot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    pub plot_id: i64,
    #[serde(default)]
    pub stage: Option<StageRef>,
    #[serde(default)]
    pub elements: Vec<PlacedElement>,
    #[serde(default)]
    pub inputs: Vec<Input>,
    #[serde(default)]
    pub auto_print: Option<bool>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
