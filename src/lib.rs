//! # rowforge – one PDF per spreadsheet row
//!
//! A template of positioned text elements is evaluated once per data row.
//! The pipeline stages are:
//!
//! 1. **Ingest** – CSV or XLSX bytes → headers and rows ([`source`])
//! 2. **Design** – build the layout ([`editor`], [`template`])
//! 3. **Resolve** – substitute row values into a frozen page plan ([`render`], [`page_plan`])
//! 4. **Render** – emit one PDF per row via printpdf ([`render`], [`pipeline`])
//! 5. **Export** – write `document-<n>.pdf` files ([`export`])
//!
//! [`session`] strings the stages together as an explicit state machine.

pub mod cell;
pub mod editor;
pub mod error;
pub mod export;
pub mod metrics;
pub mod page_plan;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod source;
pub mod template;

// Re-exports for convenience
pub use cell::CellValue;
pub use error::Error;
pub use pipeline::{render, BatchRenderer, RenderConfig};
pub use render::RenderedDocument;
pub use source::{Row, TabularData};
pub use template::{ElementKind, Orientation, Template, TemplateElement};
