//! Vector ink model
//!
//! Strokes are immutable once finalized. A canvas only grows by appending
//! strokes (erasing is an eraser stroke, not a mutation); undo pops the most
//! recent stroke, and a whole-payload replace restores an earlier state.
//!
//! The stroke list is stored in a graphic note as an opaque `canvasData`
//! string (JSON). Coordinates survive the round trip bit-for-bit.

use crate::config::{DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, MIN_STROKE_WIDTH};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// A sampled input position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrokeKind {
    #[default]
    Normal,
    Highlighter,
    Eraser,
}

/// A finalized ink stroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingStroke {
    points: Vec<Point>,
    stroke_width: f64,
    color: String,
    stroke_kind: StrokeKind,
}

impl DrawingStroke {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn stroke_width(&self) -> f64 {
        self.stroke_width
    }

    /// Color as `#AARRGGBB` or `#RRGGBB`
    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn stroke_kind(&self) -> StrokeKind {
        self.stroke_kind
    }

    /// A stroke of one point is a tap
    pub fn is_dot(&self) -> bool {
        self.points.len() == 1
    }
}

/// Accumulates points while the pen is down
#[derive(Debug, Clone)]
pub struct StrokeBuilder {
    points: Vec<Point>,
    stroke_width: f64,
    color: String,
    stroke_kind: StrokeKind,
}

impl StrokeBuilder {
    pub fn new(stroke_kind: StrokeKind) -> Self {
        Self {
            points: Vec::new(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            color: DEFAULT_STROKE_COLOR.to_string(),
            stroke_kind,
        }
    }

    pub fn width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Finalize the stroke. Returns `None` if no point was captured.
    pub fn finish(self) -> Option<DrawingStroke> {
        if self.points.is_empty() {
            return None;
        }

        let stroke_width = if valid_width(self.stroke_width) {
            self.stroke_width
        } else {
            MIN_STROKE_WIDTH
        };

        Some(DrawingStroke {
            points: self.points,
            stroke_width,
            color: self.color,
            stroke_kind: self.stroke_kind,
        })
    }
}

/// Encode a stroke list into the opaque `canvasData` payload
pub fn encode_strokes(strokes: &[DrawingStroke]) -> Result<String> {
    // serde_json writes non-finite floats as null, which cannot come back
    if let Some(bad) = strokes
        .iter()
        .flat_map(|s| s.points.iter())
        .find(|p| !p.is_finite())
    {
        return Err(AppError::SerializationFailure(format!(
            "Non-finite stroke coordinate ({}, {})",
            bad.x, bad.y
        )));
    }

    Ok(serde_json::to_string(strokes)?)
}

/// Decode a `canvasData` payload. An empty payload is an empty canvas.
pub fn decode_strokes(canvas_data: &str) -> Result<Vec<DrawingStroke>> {
    if canvas_data.trim().is_empty() {
        return Ok(Vec::new());
    }

    let strokes: Vec<DrawingStroke> = serde_json::from_str(canvas_data)?;

    if let Some(index) = strokes.iter().position(|s| s.points.is_empty()) {
        return Err(AppError::SerializationFailure(format!(
            "Stroke {} has no points",
            index
        )));
    }

    if let Some((index, stroke)) = strokes
        .iter()
        .enumerate()
        .find(|(_, s)| !valid_width(s.stroke_width))
    {
        return Err(AppError::SerializationFailure(format!(
            "Stroke {} has invalid width {}",
            index, stroke.stroke_width
        )));
    }

    Ok(strokes)
}

fn valid_width(width: f64) -> bool {
    width.is_finite() && width >= MIN_STROKE_WIDTH
}

/// In-memory stroke list of the graphic note being edited
#[derive(Debug, Clone, Default)]
pub struct StrokeCanvas {
    strokes: Vec<DrawingStroke>,
    is_modified: bool,
}

impl StrokeCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a canvas over a persisted payload; starts clean
    pub fn from_canvas_data(canvas_data: &str) -> Result<Self> {
        Ok(Self {
            strokes: decode_strokes(canvas_data)?,
            is_modified: false,
        })
    }

    pub fn strokes(&self) -> &[DrawingStroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn append(&mut self, stroke: DrawingStroke) {
        self.strokes.push(stroke);
        self.is_modified = true;
    }

    /// Remove and return the most recently appended stroke
    pub fn undo(&mut self) -> Option<DrawingStroke> {
        let stroke = self.strokes.pop()?;
        self.is_modified = true;
        Some(stroke)
    }

    /// Swap in a whole stroke list (undo to an earlier snapshot)
    pub fn replace(&mut self, strokes: Vec<DrawingStroke>) {
        if strokes == self.strokes {
            return;
        }

        self.strokes = strokes;
        self.is_modified = true;
    }

    pub fn mark_saved(&mut self) {
        self.is_modified = false;
    }

    pub fn encode(&self) -> Result<String> {
        encode_strokes(&self.strokes)
    }
}
