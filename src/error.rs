//! Error types.
//!
//! Parse failures come from the tabular data source, template failures from
//! validating a [`Template`](crate::template::Template) before a batch starts,
//! and render failures from a single row. A batch surfaces the first render
//! failure as [`Error::Render`] together with the offending row index.

use thiserror::Error;

/// Uploaded content could not be turned into rows.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Content is neither a workbook nor UTF-8 delimited text.
    #[error("unrecognised data format: {0}")]
    Unrecognised(String),

    /// Legacy binary `.xls` workbooks are not supported.
    #[error("legacy .xls workbooks are not supported; save the file as .xlsx or .csv")]
    UnsupportedXls,

    /// The header row is present but no data row follows it.
    #[error("the data source contains no rows")]
    NoRows,

    #[error("delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid workbook: {0}")]
    Workbook(String),

    #[error("invalid workbook XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for ParseError {
    fn from(err: zip::result::ZipError) -> Self {
        ParseError::Workbook(err.to_string())
    }
}

/// A template that cannot be rendered for any row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("duplicate element id `{0}`")]
    DuplicateId(String),

    #[error("element `{0}` has a font size of zero")]
    ZeroFontSize(String),

    #[error("element `{0}` has a width of zero")]
    ZeroWidth(String),

    #[error("element `{id}` has a non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { id: String, x: f32, y: f32 },

    #[error("invalid template JSON: {0}")]
    Json(String),
}

/// Failure while resolving or encoding one row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("element `{element_id}` contains {ch:?}, which the builtin fonts cannot encode")]
    Unencodable { element_id: String, ch: char },

    #[error("invalid page plan JSON: {0}")]
    PlanJson(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Top-level error for the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The whole batch was aborted because one row failed.
    #[error("rendering row {row} failed: {source}")]
    Render {
        row: usize,
        #[source]
        source: RenderError,
    },

    #[error("cannot {action} while the session is in the {state} step")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
