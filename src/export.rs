//! Export – writes rendered documents to disk as `document-<n>.pdf`, where
//! `n` is the 1-based row position.

use std::fs;
use std::path::{Path, PathBuf};

use crate::render::RenderedDocument;

/// File name for the document at zero-based `index`.
pub fn document_file_name(index: usize) -> String {
    format!("document-{}.pdf", index + 1)
}

/// Write one document into `dir`, creating it if needed.
pub fn export_single(document: &RenderedDocument, dir: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(document_file_name(document.row_index));
    fs::write(&path, &document.bytes)?;
    log::debug!("Wrote {} ({} bytes)", path.display(), document.bytes.len());
    Ok(path)
}

/// Write every document into `dir`. Returns the paths in document order.
pub fn export_all(documents: &[RenderedDocument], dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let paths = documents
        .iter()
        .map(|doc| export_single(doc, dir))
        .collect::<std::io::Result<Vec<_>>>()?;
    log::info!("Wrote {} document(s) to {}", paths.len(), dir.display());
    Ok(paths)
}
