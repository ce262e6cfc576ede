//! Template editor core – the state behind the drag-and-drop designer,
//! without any UI.
//!
//! The editor owns the element list, the current selection and the id
//! source. A finished layout is taken out with [`TemplateEditor::complete`].

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::template::{
    ElementKind, ElementStyle, ElementUpdate, FontWeight, Orientation, StylePatch, Template,
    TemplateElement,
};

/// Content given to a freshly added text block.
pub const NEW_TEXT_CONTENT: &str = "New Text";

const FALLBACK_FONT_SIZE: u32 = 12;
const FALLBACK_WIDTH: u32 = 100;

/// Produces `element-<n>` ids. `n` follows a millisecond clock but is bumped
/// so that it strictly increases, even for several adds within one tick.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: u128,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        self.last = now.max(self.last.saturating_add(1));
        format!("element-{}", self.last)
    }

    /// Make sure generated ids never collide with `existing`.
    ///
    /// Numbers past `u64::MAX` are ignored: the clock never reaches them, so
    /// generated ids stay below them anyway.
    fn observe(&mut self, existing: &str) {
        if let Some(n) = existing
            .strip_prefix("element-")
            .and_then(|n| n.parse::<u128>().ok())
            .filter(|n| *n <= u128::from(u64::MAX))
        {
            self.last = self.last.max(n);
        }
    }
}

/// Movement reported by a finished drag, in points. Missing components
/// count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DragDelta {
    pub dx: Option<f32>,
    pub dy: Option<f32>,
}

impl DragDelta {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self {
            dx: Some(dx),
            dy: Some(dy),
        }
    }
}

/// Outcome of a drag gesture. `delta` is `None` when the element was
/// dropped outside the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragResult {
    pub element_id: String,
    pub delta: Option<DragDelta>,
}

/// New style after moving an element by `delta`. Only x/y change.
pub fn apply_drag(style: ElementStyle, delta: DragDelta) -> ElementStyle {
    let dx = delta.dx.filter(|d| d.is_finite()).unwrap_or(0.0);
    let dy = delta.dy.filter(|d| d.is_finite()).unwrap_or(0.0);
    ElementStyle {
        x: style.x + dx,
        y: style.y + dy,
        ..style
    }
}

/// One editable field of the property panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleField {
    X,
    Y,
    FontSize,
    FontWeight,
    Width,
}

/// Turn raw property-panel input into a patch.
///
/// Numeric fields take the leading integer of the input; unparsable input
/// falls back to 0 for positions, 12 for the font size and 100 for the width.
pub fn parse_style_input(field: StyleField, input: &str) -> StylePatch {
    let int = leading_int(input);
    match field {
        StyleField::X => StylePatch {
            x: Some(int.unwrap_or(0) as f32),
            ..StylePatch::default()
        },
        StyleField::Y => StylePatch {
            y: Some(int.unwrap_or(0) as f32),
            ..StylePatch::default()
        },
        StyleField::FontSize => StylePatch {
            font_size: Some(positive_or(int, FALLBACK_FONT_SIZE)),
            ..StylePatch::default()
        },
        StyleField::Width => StylePatch {
            width: Some(positive_or(int, FALLBACK_WIDTH)),
            ..StylePatch::default()
        },
        StyleField::FontWeight => StylePatch {
            font_weight: Some(FontWeight::from(input.trim())),
            ..StylePatch::default()
        },
    }
}

fn positive_or(value: Option<i64>, fallback: u32) -> u32 {
    value
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(fallback)
}

/// Leading `[+-]digits` of `input` after whitespace, like `parseInt`.
fn leading_int(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| sign * n)
}

/// Editing state for one template.
#[derive(Debug, Clone, Default)]
pub struct TemplateEditor {
    elements: Vec<TemplateElement>,
    selected: Option<String>,
    orientation: Orientation,
    ids: IdGenerator,
}

impl TemplateEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue editing an existing template. Selection starts empty.
    pub fn from_template(template: Template) -> Self {
        let mut ids = IdGenerator::new();
        for el in &template.elements {
            ids.observe(&el.id);
        }
        Self {
            elements: template.elements,
            selected: None,
            orientation: template.orientation,
            ids,
        }
    }

    pub fn elements(&self) -> &[TemplateElement] {
        &self.elements
    }

    pub fn element(&self, id: &str) -> Option<&TemplateElement> {
        self.elements.iter().find(|el| el.id == id)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Append a new element with the default style. Returns its id.
    pub fn add_element(&mut self, kind: ElementKind, content: impl Into<String>) -> String {
        let mut id = self.ids.next_id();
        while self.element(&id).is_some() {
            id = self.ids.next_id();
        }
        self.elements.push(TemplateElement {
            id: id.clone(),
            kind,
            content: content.into(),
            style: ElementStyle::default(),
        });
        log::debug!("Added {kind:?} element {id}");
        id
    }

    /// Add a field bound to `header`.
    pub fn add_field(&mut self, header: &str) -> String {
        self.add_element(ElementKind::Field, header)
    }

    /// Add a text block with placeholder content.
    pub fn add_text_block(&mut self) -> String {
        self.add_element(ElementKind::Text, NEW_TEXT_CONTENT)
    }

    /// Merge `update` into the element with `id`. Unknown ids are ignored.
    /// Returns whether an element was found.
    pub fn update_element(&mut self, id: &str, update: &ElementUpdate) -> bool {
        match self.elements.iter_mut().find(|el| el.id == id) {
            Some(el) => {
                el.apply(update);
                true
            }
            None => false,
        }
    }

    /// Remove the element with `id`, clearing the selection if it pointed
    /// at it. Returns the removed element.
    pub fn remove_element(&mut self, id: &str) -> Option<TemplateElement> {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        let pos = self.elements.iter().position(|el| el.id == id)?;
        Some(self.elements.remove(pos))
    }

    /// Select an element. Selecting an unknown id clears the selection.
    pub fn select(&mut self, id: Option<&str>) {
        self.selected = id
            .filter(|id| self.element(id).is_some())
            .map(str::to_string);
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&TemplateElement> {
        self.selected.as_deref().and_then(|id| self.element(id))
    }

    /// Finish a drag gesture.
    pub fn end_drag(&mut self, result: &DragResult) {
        let Some(delta) = result.delta else {
            return;
        };
        let Some(el) = self.elements.iter_mut().find(|el| el.id == result.element_id) else {
            return;
        };
        el.style = apply_drag(el.style, delta);
    }

    /// Property-panel edit of the selected element's style.
    pub fn edit_selected_style(&mut self, field: StyleField, input: &str) -> bool {
        let Some(id) = self.selected.clone() else {
            return false;
        };
        self.update_element(&id, &ElementUpdate::style(parse_style_input(field, input)))
    }

    /// Property-panel edit of the selected element's content. Only text
    /// elements accept it; fields stay bound to their column.
    pub fn edit_selected_content(&mut self, content: &str) -> bool {
        match self.selected() {
            Some(el) if el.kind == ElementKind::Text => {
                let id = el.id.clone();
                self.update_element(&id, &ElementUpdate::content(content))
            }
            _ => false,
        }
    }

    /// Snapshot of the layout as a renderable template.
    pub fn complete(&self) -> Template {
        Template {
            elements: self.elements.clone(),
            orientation: self.orientation,
            ..Template::default()
        }
    }
}
