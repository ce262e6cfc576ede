//! Template model – an ordered list of positioned text elements plus the
//! page size and orientation.
//!
//! The JSON form uses the field names of the layout editor
//! (`type`, `content`, `style.fontSize`, `pageSize`, …) so templates saved by
//! the editor load unchanged.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// A4 in PDF points (1 pt = 1/72 inch).
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

/// Page size. A4 is the only supported size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
}

impl PageSize {
    /// `(width, height)` in points, portrait.
    pub fn dimensions_pt(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (A4_WIDTH_PT, A4_HEIGHT_PT),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Height > width (default).
    #[default]
    Portrait,
    /// Width > height.
    Landscape,
}

/// What an element's `content` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// `content` is printed literally.
    Text,
    /// `content` names a column whose value is printed.
    Field,
}

/// Stored as `"normal"` / `"bold"`. Any other stored string reads as normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl FontWeight {
    pub fn is_bold(self) -> bool {
        self == FontWeight::Bold
    }
}

impl From<String> for FontWeight {
    fn from(s: String) -> Self {
        FontWeight::from(s.as_str())
    }
}

impl From<&str> for FontWeight {
    fn from(s: &str) -> Self {
        if s == "bold" {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        }
    }
}

impl From<FontWeight> for String {
    fn from(w: FontWeight) -> Self {
        w.to_string()
    }
}

impl fmt::Display for FontWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FontWeight::Normal => "normal",
            FontWeight::Bold => "bold",
        })
    }
}

/// Position and text style of one element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStyle {
    /// Baseline origin, in points from the page's left edge.
    pub x: f32,
    /// Baseline origin, in points from the page's top edge.
    pub y: f32,
    pub font_size: u32,
    pub font_weight: FontWeight,
    /// Advisory box width; stored and shown in the editor but text is
    /// never wrapped or clipped to it.
    pub width: u32,
}

impl Default for ElementStyle {
    fn default() -> Self {
        Self {
            x: 50.0,
            y: 50.0,
            font_size: 12,
            font_weight: FontWeight::Normal,
            width: 200,
        }
    }
}

/// Partial style; `None` fields keep their prior value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StylePatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub font_size: Option<u32>,
    pub font_weight: Option<FontWeight>,
    pub width: Option<u32>,
}

impl StylePatch {
    pub fn is_empty(&self) -> bool {
        *self == StylePatch::default()
    }
}

impl ElementStyle {
    /// Merge a partial style over this one.
    pub fn merged(self, patch: &StylePatch) -> Self {
        Self {
            x: patch.x.unwrap_or(self.x),
            y: patch.y.unwrap_or(self.y),
            font_size: patch.font_size.unwrap_or(self.font_size),
            font_weight: patch.font_weight.unwrap_or(self.font_weight),
            width: patch.width.unwrap_or(self.width),
        }
    }
}

/// One positioned piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateElement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub content: String,
    pub style: ElementStyle,
}

/// Partial element update; absent parts are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementUpdate {
    #[serde(rename = "type")]
    pub kind: Option<ElementKind>,
    pub content: Option<String>,
    pub style: Option<StylePatch>,
}

impl ElementUpdate {
    pub fn style(patch: StylePatch) -> Self {
        Self {
            style: Some(patch),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

impl TemplateElement {
    /// Apply a partial update. The id never changes.
    pub fn apply(&mut self, update: &ElementUpdate) {
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(content) = &update.content {
            self.content = content.clone();
        }
        if let Some(patch) = &update.style {
            self.style = self.style.merged(patch);
        }
    }
}

/// A complete page layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Paint order: later elements draw over earlier ones.
    pub elements: Vec<TemplateElement>,
    #[serde(default)]
    pub page_size: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Template {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            elements: Vec::new(),
            page_size: PageSize::A4,
            orientation,
        }
    }

    /// Effective `(width, height)` in points after orientation.
    pub fn page_dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.page_size.dimensions_pt();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// Check the invariants rendering relies on.
    pub fn validate(&self) -> Result<(), TemplateError> {
        let mut seen = HashSet::new();
        for el in &self.elements {
            if !seen.insert(el.id.as_str()) {
                return Err(TemplateError::DuplicateId(el.id.clone()));
            }
            if el.style.font_size == 0 {
                return Err(TemplateError::ZeroFontSize(el.id.clone()));
            }
            if el.style.width == 0 {
                return Err(TemplateError::ZeroWidth(el.id.clone()));
            }
            if !el.style.x.is_finite() || !el.style.y.is_finite() {
                return Err(TemplateError::NonFiniteCoordinate {
                    id: el.id.clone(),
                    x: el.style.x,
                    y: el.style.y,
                });
            }
        }
        Ok(())
    }

    /// Column names referenced by field elements, first occurrence order.
    pub fn field_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.elements
            .iter()
            .filter(|el| el.kind == ElementKind::Field)
            .map(|el| el.content.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Field columns that `headers` does not contain. These render as blank.
    pub fn missing_columns<'a>(&'a self, headers: &[String]) -> Vec<&'a str> {
        self.field_columns()
            .into_iter()
            .filter(|c| !headers.iter().any(|h| h == c))
            .collect()
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        serde_json::from_str(json).map_err(|e| TemplateError::Json(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(id: &str, kind: ElementKind, content: &str) -> TemplateElement {
        TemplateElement {
            id: id.into(),
            kind,
            content: content.into(),
            style: ElementStyle::default(),
        }
    }

    #[test]
    fn loads_editor_json() {
        let json = r#"{
            "elements": [
                {"id": "element-1", "type": "field", "content": "Amount",
                 "style": {"x": 50, "y": 50, "fontSize": 12, "fontWeight": "normal", "width": 200}},
                {"id": "element-2", "type": "text", "content": "Total",
                 "style": {"x": 10.5, "y": 80, "fontSize": 20, "fontWeight": "600", "width": 150}}
            ],
            "pageSize": "A4",
            "orientation": "landscape"
        }"#;
        let t = Template::from_json(json).unwrap();
        assert_eq!(t.orientation, Orientation::Landscape);
        assert_eq!(t.elements[0], element("element-1", ElementKind::Field, "Amount"));
        assert_eq!(t.elements[1].style.x, 10.5);
        // Unrecognised weight strings read as normal.
        assert_eq!(t.elements[1].style.font_weight, FontWeight::Normal);
    }

    #[test]
    fn json_roundtrip_keeps_field_names() {
        let mut t = Template::new(Orientation::Portrait);
        t.elements.push(element("a", ElementKind::Text, "Hi"));
        let json = t.to_json();
        assert!(json.contains("\"fontSize\": 12"));
        assert!(json.contains("\"type\": \"text\""));
        assert!(json.contains("\"pageSize\": \"A4\""));
        assert_eq!(Template::from_json(&json).unwrap(), t);
    }

    #[test]
    fn bad_json_is_a_template_error() {
        assert!(matches!(
            Template::from_json("{\"elements\": 3}"),
            Err(TemplateError::Json(_))
        ));
    }

    #[test]
    fn style_patch_merges() {
        let base = ElementStyle::default();
        let merged = base.merged(&StylePatch {
            font_size: Some(20),
            ..StylePatch::default()
        });
        assert_eq!(merged, ElementStyle { font_size: 20, ..base });
        assert_eq!(base.merged(&StylePatch::default()), base);
    }

    #[test]
    fn landscape_swaps_dimensions() {
        assert_eq!(
            Template::new(Orientation::Portrait).page_dimensions_pt(),
            (A4_WIDTH_PT, A4_HEIGHT_PT)
        );
        assert_eq!(
            Template::new(Orientation::Landscape).page_dimensions_pt(),
            (A4_HEIGHT_PT, A4_WIDTH_PT)
        );
    }

    #[test]
    fn validate_catches_broken_elements() {
        let mut t = Template::default();
        t.elements.push(element("a", ElementKind::Text, "x"));
        t.elements.push(element("a", ElementKind::Text, "y"));
        assert_eq!(t.validate(), Err(TemplateError::DuplicateId("a".into())));

        t.elements[1].id = "b".into();
        t.elements[1].style.font_size = 0;
        assert_eq!(t.validate(), Err(TemplateError::ZeroFontSize("b".into())));

        t.elements[1].style.font_size = 9;
        t.elements[1].style.width = 0;
        assert_eq!(t.validate(), Err(TemplateError::ZeroWidth("b".into())));
        t.elements[1].style.width = 1;

        t.elements[1].style.font_size = 9;
        t.elements[1].style.y = f32::NAN;
        assert!(matches!(
            t.validate(),
            Err(TemplateError::NonFiniteCoordinate { .. })
        ));

        t.elements[1].style.y = -400.0;
        assert_eq!(t.validate(), Ok(()));
    }

    #[test]
    fn field_columns_and_missing() {
        let mut t = Template::default();
        t.elements.push(element("1", ElementKind::Field, "Name"));
        t.elements.push(element("2", ElementKind::Text, "Amount"));
        t.elements.push(element("3", ElementKind::Field, "City"));
        t.elements.push(element("4", ElementKind::Field, "Name"));
        assert_eq!(t.field_columns(), vec!["Name", "City"]);
        assert_eq!(
            t.missing_columns(&["Name".to_string(), "Amount".to_string()]),
            vec!["City"]
        );
    }
}
