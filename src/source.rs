//! Tabular data source – uploaded spreadsheet or delimited text → header
//! names plus one [`Row`] per data row.
//!
//! The format is detected from the content, never from a file extension:
//! a ZIP container is read as an XLSX workbook (first sheet only), the OLE
//! container of legacy `.xls` files is rejected, and anything else must be
//! UTF-8 delimited text.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::error::ParseError;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const UTF8_BOM: &str = "\u{FEFF}";

const SHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const DOC_REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Name given to a column whose header cell is blank.
pub const BLANK_HEADER: &str = "__EMPTY";

static EMPTY: CellValue = CellValue::Empty;

/// One data row: column name → cell value. Blank cells are not stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: HashMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and programmatic callers.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        let value = value.into();
        let column = column.into();
        if value.is_empty() {
            self.cells.remove(&column);
        } else {
            self.cells.insert(column, value);
        }
    }

    /// Value for `column`; absent columns read as [`CellValue::Empty`].
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Parsed upload: ordered header names and ordered rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularData {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl TabularData {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Read and parse a file. The extension is ignored.
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ParseError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", e, path.display()),
            ))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse uploaded bytes, detecting the format from the content.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let grid = if bytes.starts_with(ZIP_MAGIC) {
            read_xlsx_first_sheet(bytes)?
        } else if bytes.starts_with(OLE_MAGIC) {
            return Err(ParseError::UnsupportedXls);
        } else {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| ParseError::Unrecognised("content is not UTF-8 text".into()))?;
            if text.contains('\0') {
                return Err(ParseError::Unrecognised("content looks binary".into()));
            }
            read_delimited(text)?
        };
        let data = from_grid(grid)?;
        log::debug!(
            "Parsed {} row(s), {} column(s)",
            data.rows.len(),
            data.headers.len()
        );
        Ok(data)
    }

    /// Parse delimited text directly.
    pub fn from_delimited(text: &str) -> Result<Self, ParseError> {
        from_grid(read_delimited(text)?)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Raw cell grid, first row being the header row.
type Grid = Vec<Vec<CellValue>>;

fn from_grid(grid: Grid) -> Result<TabularData, ParseError> {
    let mut iter = grid.into_iter();
    let header_cells = iter.next().unwrap_or_default();
    let body: Vec<Vec<CellValue>> = iter
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();

    if body.is_empty() {
        return Err(ParseError::NoRows);
    }

    let width = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header_cells.len()))
        .max()
        .unwrap_or(0);

    let mut headers: Vec<String> = Vec::with_capacity(width);
    for i in 0..width {
        let raw = header_cells.get(i).map(CellValue::to_text).unwrap_or_default();
        let base = if raw.trim().is_empty() {
            BLANK_HEADER.to_string()
        } else {
            raw
        };
        headers.push(unique_name(&headers, base));
    }

    let rows = body
        .into_iter()
        .map(|cells| {
            let mut row = Row::new();
            for (header, cell) in headers.iter().zip(cells) {
                row.insert(header.clone(), cell);
            }
            row
        })
        .collect();

    Ok(TabularData { headers, rows })
}

/// `Name`, `Name_1`, `Name_2`, … – first one not already taken.
fn unique_name(taken: &[String], base: String) -> String {
    if !taken.contains(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, first_line.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        // First candidate wins ties.
        .fold(None, |best: Option<(u8, usize)>, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn read_delimited(text: &str) -> Result<Grid, ParseError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(text))
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let cells = if i == 0 {
            // Header names stay verbatim.
            record.iter().map(|s| CellValue::Text(s.to_string())).collect()
        } else {
            record.iter().map(CellValue::infer).collect()
        };
        grid.push(cells);
    }
    Ok(grid)
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn read_zip_text(zip: &mut Archive<'_>, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

fn sheet_el<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(SHEET_NS))
}

fn read_xlsx_first_sheet(bytes: &[u8]) -> Result<Grid, ParseError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;

    let sheet_path = first_sheet_path(&mut zip)?;
    let shared = read_shared_strings(&mut zip)?;

    let xml_text = read_zip_text(&mut zip, &sheet_path)
        .ok_or_else(|| ParseError::Workbook(format!("missing worksheet part {sheet_path}")))?;
    let xml = roxmltree::Document::parse(&xml_text)?;
    let sheet_data = sheet_el(xml.root_element(), "sheetData")
        .ok_or_else(|| ParseError::Workbook("worksheet has no sheetData".into()))?;

    let mut grid = Vec::new();
    for row in sheet_data.children().filter(|n| n.has_tag_name((SHEET_NS, "row"))) {
        let mut cells: Vec<CellValue> = Vec::new();
        for cell in row.children().filter(|n| n.has_tag_name((SHEET_NS, "c"))) {
            let col = match cell.attribute("r") {
                Some(reference) => column_index(reference)?,
                None => None,
            }
            .unwrap_or(cells.len());
            if cells.len() <= col {
                cells.resize(col + 1, CellValue::Empty);
            }
            cells[col] = read_cell(cell, &shared);
        }
        grid.push(cells);
    }
    Ok(grid)
}

/// Resolve the first `<sheet>` of the workbook through its relationship.
fn first_sheet_path(zip: &mut Archive<'_>) -> Result<String, ParseError> {
    const FALLBACK: &str = "xl/worksheets/sheet1.xml";

    let Some(workbook) = read_zip_text(zip, "xl/workbook.xml") else {
        return Err(ParseError::Workbook(
            "missing xl/workbook.xml (is this an XLSX file?)".into(),
        ));
    };
    let xml = roxmltree::Document::parse(&workbook)?;
    let rel_id = sheet_el(xml.root_element(), "sheets")
        .and_then(|sheets| sheets.children().find(|n| n.has_tag_name((SHEET_NS, "sheet"))))
        .and_then(|sheet| sheet.attribute((DOC_REL_NS, "id")).map(str::to_string));

    let Some(rel_id) = rel_id else {
        return Ok(FALLBACK.to_string());
    };
    let Some(rels) = read_zip_text(zip, "xl/_rels/workbook.xml.rels") else {
        return Ok(FALLBACK.to_string());
    };
    let rels = roxmltree::Document::parse(&rels)?;
    let target = rels
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == "Relationship")
        .find(|n| n.attribute("Id") == Some(rel_id.as_str()))
        .and_then(|n| n.attribute("Target"));

    Ok(match target {
        Some(t) if t.starts_with('/') => t.trim_start_matches('/').to_string(),
        Some(t) => format!("xl/{t}"),
        None => FALLBACK.to_string(),
    })
}

fn read_shared_strings(zip: &mut Archive<'_>) -> Result<Vec<String>, ParseError> {
    let Some(text) = read_zip_text(zip, "xl/sharedStrings.xml") else {
        return Ok(Vec::new());
    };
    let xml = roxmltree::Document::parse(&text)?;
    Ok(xml
        .root_element()
        .children()
        .filter(|n| n.has_tag_name((SHEET_NS, "si")))
        .map(rich_text)
        .collect())
}

/// Concatenated `<t>` runs of a string item, skipping phonetic hints.
fn rich_text(node: roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| n.has_tag_name((SHEET_NS, "t")))
        .filter(|n| {
            !n.ancestors()
                .any(|a| a.has_tag_name((SHEET_NS, "rPh")))
        })
        .filter_map(|n| n.text())
        .collect()
}

fn read_cell(cell: roxmltree::Node, shared: &[String]) -> CellValue {
    let value = sheet_el(cell, "v").and_then(|v| v.text());
    match cell.attribute("t").unwrap_or("n") {
        "s" => value
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|i| shared.get(i))
            .map(|s| CellValue::Text(s.clone()))
            .unwrap_or(CellValue::Empty),
        "b" => match value.map(str::trim) {
            Some("1") => CellValue::Bool(true),
            Some("0") => CellValue::Bool(false),
            _ => CellValue::Empty,
        },
        "inlineStr" => sheet_el(cell, "is")
            .map(rich_text)
            .map(CellValue::from)
            .unwrap_or(CellValue::Empty),
        "n" => value
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(CellValue::Number)
            .unwrap_or(CellValue::Empty),
        // "str" (formula result), "e" (error), "d" (ISO date) – keep the text.
        _ => value
            .filter(|v| !v.is_empty())
            .map(CellValue::from)
            .unwrap_or(CellValue::Empty),
    }
}

/// Columns a worksheet can hold, `A` through `XFD`.
const MAX_COLUMNS: usize = 16_384;

/// Zero-based column index of an A1-style reference (`"C7"` → 2).
///
/// `None` when the reference carries no column letters. Columns past `XFD`
/// are rejected.
fn column_index(reference: &str) -> Result<Option<usize>, ParseError> {
    let mut n = 0usize;
    for b in reference.bytes().take_while(|b| b.is_ascii_alphabetic()) {
        n = n * 26 + (b.to_ascii_uppercase() - b'A') as usize + 1;
        if n > MAX_COLUMNS {
            return Err(ParseError::Workbook(format!(
                "cell reference {reference:?} is past the last column XFD"
            )));
        }
    }
    Ok(n.checked_sub(1))
}
