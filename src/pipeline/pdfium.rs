//! Locating and binding the pdfium shared library.
//!
//! Search order, first hit wins:
//!
//! 1. `PDFIUM_LIB_PATH` (either the library file or its directory)
//! 2. the current working directory
//! 3. the directory holding the running executable
//! 4. the system library path
//!
//! [`PdfiumLibrary::locate`] runs once per batch so a missing library is a
//! fatal startup error rather than one skipped document per PDF.

use crate::error::Pdf2CsvError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an existing pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Where pdfium was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfiumLibrary {
    /// An explicit library file.
    Path(PathBuf),
    /// The platform's default library search path.
    System,
}

impl PdfiumLibrary {
    /// Probe the search order and return the first library that binds.
    pub fn locate() -> Result<Self, Pdf2CsvError> {
        let mut tried = Vec::new();

        for candidate in candidate_paths() {
            match Pdfium::bind_to_library(&candidate) {
                Ok(_) => {
                    debug!("pdfium found at {}", candidate.display());
                    return Ok(PdfiumLibrary::Path(candidate));
                }
                Err(e) => tried.push(format!("{}: {}", candidate.display(), e)),
            }
        }

        match Pdfium::bind_to_system_library() {
            Ok(_) => {
                debug!("pdfium found on the system library path");
                Ok(PdfiumLibrary::System)
            }
            Err(e) => {
                tried.push(format!("system library: {e}"));
                Err(Pdf2CsvError::PdfiumBindingFailed(tried.join("; ")))
            }
        }
    }

    /// Create a fresh pdfium instance from this location.
    pub fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match self {
            PdfiumLibrary::Path(path) => Pdfium::bind_to_library(path)?,
            PdfiumLibrary::System => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();

    if let Ok(env_path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let p = PathBuf::from(env_path);
        if p.is_dir() {
            out.push(library_in(&p));
        } else {
            out.push(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        out.push(library_in(&cwd));
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        out.push(library_in(&exe_dir));
    }

    out.retain(|p| p.is_file());
    out.dedup();
    out
}

fn library_in(dir: &Path) -> PathBuf {
    Pdfium::pdfium_platform_library_name_at_path(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_name_is_inside_directory() {
        let p = library_in(Path::new("/opt/pdfium"));
        assert_eq!(p.parent(), Some(Path::new("/opt/pdfium")));
        assert!(p.file_name().unwrap().to_string_lossy().contains("pdfium"));
    }

    #[test]
    fn candidates_only_list_existing_files() {
        assert!(candidate_paths().iter().all(|p| p.is_file()));
    }
}
