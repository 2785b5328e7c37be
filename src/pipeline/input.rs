//! Input discovery: list the PDFs a batch run will process.
//!
//! Discovery is non-recursive and sorted by path, so two runs over the same
//! directory see documents in the same order. The extension match is
//! case-insensitive (`REPORT.PDF` counts). Content is not inspected here; a
//! `.pdf` that is not a PDF is caught by [`check_pdf_magic`] when the
//! document is opened, and only that document is skipped.

use crate::error::{DocumentError, Pdf2CsvError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// List every regular file with a `.pdf` extension directly inside `dir`.
pub fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2CsvError> {
    let unreadable = |source| Pdf2CsvError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if path.is_file() && has_pdf_extension(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort();

    debug!("Discovered {} PDF(s) in {}", pdfs.len(), dir.display());
    Ok(pdfs)
}

/// Whether the path ends in `.pdf`, ignoring case.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Verify the file starts with the `%PDF` magic bytes.
pub fn check_pdf_magic(path: &Path) -> Result<(), DocumentError> {
    let read_err = |detail: String| DocumentError::Read {
        path: path.to_path_buf(),
        detail,
    };

    let mut f = std::fs::File::open(path).map_err(|e| read_err(e.to_string()))?;
    let mut magic = [0u8; 4];
    f.read_exact(&mut magic)
        .map_err(|_| read_err("file is too short to be a PDF".into()))?;
    if &magic != b"%PDF" {
        return Err(read_err(format!(
            "not a PDF (magic bytes {:02x?})",
            magic
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_is_sorted_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "A.PDF", "notes.txt", "c.Pdf"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let found = discover_pdfs(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf", "c.Pdf"]);
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_pdfs(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_pdfs(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Pdf2CsvError::InputDirUnreadable { .. }));
    }

    #[test]
    fn magic_bytes_checked() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let bad = dir.path().join("broken.pdf");
        let tiny = dir.path().join("tiny.pdf");
        std::fs::write(&good, b"%PDF-1.7\n").unwrap();
        std::fs::write(&bad, b"hello world").unwrap();
        std::fs::write(&tiny, b"%P").unwrap();

        assert!(check_pdf_magic(&good).is_ok());
        assert!(matches!(
            check_pdf_magic(&bad),
            Err(DocumentError::Read { .. })
        ));
        assert!(check_pdf_magic(&tiny).is_err());
    }
}
