//! Page plan – the intermediate representation between template resolution
//! and PDF rendering. This is the "frozen" structure that encodes exactly
//! what goes on one row's page.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// One resolved page, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePlan {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    /// Width of the page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of the page in PDF points.
    pub page_height_pt: f32,
    /// Text runs in paint order.
    pub runs: Vec<TextRun>,
}

/// A single line of text anchored at its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Id of the template element this run came from.
    pub element_id: String,
    pub text: String,
    /// Baseline start, relative to the page's top-left corner, in points.
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub bold: bool,
    /// Estimated advance width of `text`.
    pub measured_width: f32,
    /// The element's advisory width.
    pub box_width: f32,
    /// `measured_width` exceeds `box_width`. Informational only.
    pub overflows_width: bool,
}

impl PagePlan {
    /// A blank page.
    pub fn blank(title: impl Into<String>, page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            title: title.into(),
            page_width_pt,
            page_height_pt,
            runs: Vec::new(),
        }
    }

    /// Text of each run, in paint order.
    pub fn texts(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Run produced by element `id`, if it drew anything.
    pub fn run_for(&self, element_id: &str) -> Option<&TextRun> {
        self.runs.iter().find(|r| r.element_id == element_id)
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        serde_json::from_str(json).map_err(|e| RenderError::PlanJson(e.to_string()))
    }
}
