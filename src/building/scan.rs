//! Walk the building data tree.
//!
//! Layout: `<root>/<city>/<category>/<type>/<building>/تقارير/*.pdf`. Every
//! level is read in sorted order. Stray files are ignored, as are building
//! directories without a reports folder.

use crate::error::Pdf2CsvError;
use crate::pipeline::input::has_pdf_extension;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the per-building reports folder.
pub const REPORTS_DIR: &str = "تقارير";

/// One building report found in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingSource {
    pub city: String,
    /// Condition category (needs reinforcement, collapsing, ...).
    pub category: String,
    /// Usage type (residential, government, commercial, ...).
    pub building_type: String,
    /// Building directory name, usually its name or address.
    pub building_name: String,
    pub pdf_path: PathBuf,
}

/// Find every building report under `root`.
///
/// Only an unreadable `root` is an error; unreadable subdirectories are
/// logged and skipped.
pub fn scan_data_dir(root: &Path) -> Result<Vec<BuildingSource>, Pdf2CsvError> {
    let cities = subdirs(root).map_err(|source| Pdf2CsvError::InputDirUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    for (city, city_path) in cities {
        for (category, category_path) in subdirs_or_warn(&city_path) {
            for (building_type, type_path) in subdirs_or_warn(&category_path) {
                for (building_name, building_path) in subdirs_or_warn(&type_path) {
                    let reports = building_path.join(REPORTS_DIR);
                    if !reports.is_dir() {
                        continue;
                    }
                    for pdf_path in pdf_files(&reports) {
                        found.push(BuildingSource {
                            city: city.clone(),
                            category: category.clone(),
                            building_type: building_type.clone(),
                            building_name: building_name.clone(),
                            pdf_path,
                        });
                    }
                }
            }
        }
    }

    debug!("Found {} building report(s) under {}", found.len(), root.display());
    Ok(found)
}

/// Sorted `(name, path)` of the directories directly inside `dir`.
fn subdirs(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut dirs: Vec<(String, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn subdirs_or_warn(dir: &Path) -> Vec<(String, PathBuf)> {
    subdirs(dir).unwrap_or_else(|e| {
        warn!("Skipping unreadable directory {}: {}", dir.display(), e);
        Vec::new()
    })
}

fn pdf_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping unreadable directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| has_pdf_extension(p))
        .collect();
    pdfs.sort();
    pdfs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn finds_reports_at_the_expected_depth() {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        touch(&r.join("جدة/تحتاج_ترميم/سكني/عمارة_1").join(REPORTS_DIR).join("b.pdf"));
        touch(&r.join("جدة/تحتاج_ترميم/سكني/عمارة_1").join(REPORTS_DIR).join("a.PDF"));
        touch(&r.join("الرياض/آيلة_للسقوط/حكومي/مبنى_2").join(REPORTS_DIR).join("r.pdf"));
        // Wrong depth, wrong folder name, not a PDF.
        touch(&r.join("جدة/تحتاج_ترميم/loose.pdf"));
        touch(&r.join("جدة/تحتاج_ترميم/سكني/عمارة_3/other/x.pdf"));
        touch(&r.join("جدة/تحتاج_ترميم/سكني/عمارة_1").join(REPORTS_DIR).join("notes.txt"));

        let found = scan_data_dir(r).unwrap();
        assert_eq!(found.len(), 3);

        // Cities sort as strings: الرياض before جدة.
        assert_eq!(found[0].city, "الرياض");
        assert_eq!(found[0].category, "آيلة_للسقوط");
        assert_eq!(found[0].building_type, "حكومي");
        assert_eq!(found[0].building_name, "مبنى_2");

        assert_eq!(found[1].building_name, "عمارة_1");
        assert!(found[1].pdf_path.ends_with("a.PDF"));
        assert!(found[2].pdf_path.ends_with("b.pdf"));
    }

    #[test]
    fn missing_root_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let err = scan_data_dir(&root.path().join("data")).unwrap_err();
        assert!(matches!(err, Pdf2CsvError::InputDirUnreadable { .. }));
    }

    #[test]
    fn empty_root_finds_nothing() {
        let root = tempfile::tempdir().unwrap();
        assert!(scan_data_dir(root.path()).unwrap().is_empty());
    }
}
