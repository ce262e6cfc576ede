//! Row renderer – resolves a [`Template`] against one [`Row`] into a
//! [`PagePlan`], then emits PDF bytes using `printpdf` (v0.8 ops-based API).

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::error::RenderError;
use crate::metrics::measure_text_width;
use crate::page_plan::{PagePlan, TextRun};
use crate::pipeline::RenderConfig;
use crate::source::Row;
use crate::template::{ElementKind, Template, TemplateElement};

/// What to do with characters the builtin fonts cannot encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappablePolicy {
    /// Print `?` in their place (default).
    #[default]
    Replace,
    /// Fail the row.
    Error,
}

/// One finished page for one input row.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    /// Zero-based index of the source row.
    pub row_index: usize,
    /// Complete PDF file.
    pub bytes: Vec<u8>,
}

impl RenderedDocument {
    /// `data:` URI suitable for an inline preview or a download link.
    pub fn to_data_uri(&self) -> String {
        format!("data:application/pdf;base64,{}", BASE64_STD.encode(&self.bytes))
    }
}

/// Text an element shows for `row`.
pub fn resolve_text(element: &TemplateElement, row: &Row) -> String {
    match element.kind {
        ElementKind::Text => element.content.clone(),
        ElementKind::Field => row.get(&element.content).to_text(),
    }
}

/// Resolve every element of `template` against `row`.
///
/// The template is assumed valid (see [`Template::validate`]). Elements whose
/// text resolves to the empty string produce no run.
pub fn plan_page(
    template: &Template,
    row: &Row,
    config: &RenderConfig,
) -> Result<PagePlan, RenderError> {
    let (page_w, page_h) = template.page_dimensions_pt();
    let mut plan = PagePlan::blank(config.title.clone(), page_w, page_h);

    for element in &template.elements {
        let text = resolve_text(element, row);
        if text.is_empty() {
            continue;
        }

        if let Some(ch) = text.chars().find(|c| winansi_byte(*c).is_none()) {
            match config.unmappable {
                UnmappablePolicy::Error => {
                    return Err(RenderError::Unencodable {
                        element_id: element.id.clone(),
                        ch,
                    });
                }
                UnmappablePolicy::Replace => {
                    log::warn!(
                        "Element {} contains {ch:?}, printed as '?'",
                        element.id
                    );
                }
            }
        }

        let style = &element.style;
        let font_size = style.font_size as f32;
        let bold = style.font_weight.is_bold();
        let measured_width = measure_text_width(&text, font_size, bold);
        let box_width = style.width as f32;
        let overflows_width = measured_width > box_width;
        if overflows_width {
            log::debug!(
                "Element {} is {measured_width:.1}pt wide, past its {box_width}pt box",
                element.id
            );
        }

        plan.runs.push(TextRun {
            element_id: element.id.clone(),
            text,
            x: style.x,
            y: style.y,
            font_size,
            bold,
            measured_width,
            box_width,
            overflows_width,
        });
    }

    Ok(plan)
}

/// Render a page plan into PDF bytes.
pub fn render_pdf(plan: &PagePlan) -> Vec<u8> {
    let page_w = Mm(plan.page_width_pt * 0.352778); // pt → mm
    let page_h = Mm(plan.page_height_pt * 0.352778);

    let mut doc = PdfDocument::new(&plan.title);

    let mut ops = Vec::new();
    for run in &plan.runs {
        render_run(&mut ops, run, plan.page_height_pt);
    }

    doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);
    doc.save(&PdfSaveOptions::default(), &mut Vec::new())
}

/// Plan and render one row.
pub fn render_row(
    template: &Template,
    row: &Row,
    row_index: usize,
    config: &RenderConfig,
) -> Result<RenderedDocument, RenderError> {
    let plan = plan_page(template, row, config)?;
    Ok(RenderedDocument {
        row_index,
        bytes: render_pdf(&plan),
    })
}

fn render_run(ops: &mut Vec<Op>, run: &TextRun, page_height: f32) {
    let font = if run.bold {
        BuiltinFont::HelveticaBold
    } else {
        BuiltinFont::Helvetica
    };

    // PDF origin is bottom-left; plan y is the baseline from the top.
    let pdf_y = page_height - run.y;

    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(run.x),
            y: Pt(pdf_y),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(run.font_size),
        font,
    });
    ops.push(Op::SetFillColor {
        col: Color::Rgb(Rgb {
            r: 0.0,
            g: 0.0,
            b: 0.0,
            icc_profile: None,
        }),
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_winlatin(&run.text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// WinAnsiEncoding byte for `c`, if the builtin fonts have a glyph for it.
fn winansi_byte(c: char) -> Option<u8> {
    let b = match c {
        '\u{20AC}' => 0x80, // euro
        '\u{201A}' => 0x82, // single low-9 quote
        '\u{0192}' => 0x83, // florin
        '\u{201E}' => 0x84, // double low-9 quote
        '\u{2026}' => 0x85, // ellipsis
        '\u{2020}' => 0x86, // dagger
        '\u{2021}' => 0x87, // double dagger
        '\u{02C6}' => 0x88, // circumflex
        '\u{2030}' => 0x89, // per mille
        '\u{0160}' => 0x8A, // S caron
        '\u{2039}' => 0x8B, // single left angle quote
        '\u{0152}' => 0x8C, // OE
        '\u{017D}' => 0x8E, // Z caron
        '\u{2018}' => 0x91, // left single quote
        '\u{2019}' => 0x92, // right single quote
        '\u{201C}' => 0x93, // left double quote
        '\u{201D}' => 0x94, // right double quote
        '\u{2022}' => 0x95, // bullet
        '\u{2013}' => 0x96, // en-dash
        '\u{2014}' => 0x97, // em-dash
        '\u{02DC}' => 0x98, // small tilde
        '\u{2122}' => 0x99, // trademark
        '\u{0161}' => 0x9A, // s caron
        '\u{203A}' => 0x9B, // single right angle quote
        '\u{0153}' => 0x9C, // oe
        '\u{017E}' => 0x9E, // z caron
        '\u{0178}' => 0x9F, // Y diaeresis
        '\u{00A0}' => 0x20, // non-breaking space -> space
        // 0x80–0x9F are C1 controls in Unicode, not glyphs.
        c if (c as u32) < 0x80 || (0xA0..0x100).contains(&(c as u32)) => c as u8,
        _ => return None,
    };
    Some(b)
}

fn winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| winansi_byte(c).unwrap_or(b'?')).collect()
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
///
/// This relies on printpdf handing builtin-font text to lopdf, whose
/// `SimpleEncoding` path copies `text.as_bytes()` verbatim. The returned
/// value must not reach any `str` operation, so it is only ever built inside
/// a `TextItem` right before the ops are saved.
fn to_winlatin(s: &str) -> String {
    let bytes = winansi_bytes(s);
    // SAFETY: intentionally non-UTF-8 for 0x80-0xFF; printpdf passes these
    // bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ElementStyle, FontWeight};

    fn el(id: &str, kind: ElementKind, content: &str) -> TemplateElement {
        TemplateElement {
            id: id.into(),
            kind,
            content: content.into(),
            style: ElementStyle::default(),
        }
    }

    #[test]
    fn render_empty_page() {
        let plan = PagePlan::blank("t", 595.28, 841.89);
        let bytes = render_pdf(&plan);
        assert!(bytes.len() > 100, "PDF should have content");
        // PDF magic number
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn field_and_text_resolution() {
        let row = Row::new().with("Name", "Alice").with("Amount", 42.0);
        assert_eq!(resolve_text(&el("1", ElementKind::Field, "Amount"), &row), "42");
        assert_eq!(resolve_text(&el("2", ElementKind::Field, "Missing"), &row), "");
        assert_eq!(resolve_text(&el("3", ElementKind::Text, "Name"), &row), "Name");
    }

    #[test]
    fn plan_carries_style() {
        let mut t = Template::default();
        let mut title = el("t", ElementKind::Text, "Invoice");
        title.style = ElementStyle {
            x: 72.0,
            y: 100.0,
            font_size: 24,
            font_weight: FontWeight::Bold,
            width: 30,
        };
        t.elements.push(title);
        t.elements.push(el("blank", ElementKind::Field, "Nope"));

        let plan = plan_page(&t, &Row::new(), &RenderConfig::default()).unwrap();
        assert_eq!(plan.runs.len(), 1);
        let run = plan.run_for("t").unwrap();
        assert_eq!((run.x, run.y, run.font_size, run.bold), (72.0, 100.0, 24.0, true));
        assert!(run.overflows_width);
        assert!(plan.run_for("blank").is_none());
    }

    #[test]
    fn unmappable_characters() {
        let mut t = Template::default();
        t.elements.push(el("n", ElementKind::Field, "Name"));
        let row = Row::new().with("Name", "Zoë 日本");

        let plan = plan_page(&t, &row, &RenderConfig::default()).unwrap();
        assert_eq!(plan.texts(), vec!["Zoë 日本"]);
        assert_eq!(winansi_bytes("Zoë 日本"), b"Zo\xEB ??");

        let strict = RenderConfig {
            unmappable: UnmappablePolicy::Error,
            ..RenderConfig::default()
        };
        assert_eq!(
            plan_page(&t, &row, &strict),
            Err(RenderError::Unencodable {
                element_id: "n".into(),
                ch: '日'
            })
        );
        let ascii = Row::new().with("Name", "Zoë – “ok” €");
        assert!(plan_page(&t, &ascii, &strict).is_ok());
    }

    #[test]
    fn data_uri_prefix() {
        let doc = RenderedDocument {
            row_index: 0,
            bytes: b"%PDF-1.7".to_vec(),
        };
        assert_eq!(doc.to_data_uri(), "data:application/pdf;base64,JVBERi0xLjc=");
    }
}
