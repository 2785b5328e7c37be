//! Progress report for building analysis, read from what is on disk.
//!
//! A directory that does not exist yet counts as empty.

use crate::config::BatchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One file in an output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFile {
    pub name: String,
    pub size_bytes: u64,
}

/// Snapshot of the building output directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingStatus {
    /// Building ids with an image directory, sorted.
    pub buildings: Vec<String>,
    /// PNG files across every building image directory.
    pub images: usize,
    pub data_files: Vec<StatusFile>,
    pub suggestion_files: Vec<StatusFile>,
}

/// Read the building image, data and suggestion directories.
pub fn building_status(config: &BatchConfig) -> BuildingStatus {
    let mut buildings = Vec::new();
    let mut images = 0;
    if let Ok(entries) = std::fs::read_dir(&config.building_images_dir) {
        for entry in entries.filter_map(Result::ok) {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            images += count_pngs(&entry.path());
            buildings.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    buildings.sort();

    BuildingStatus {
        buildings,
        images,
        data_files: list_files(&config.building_data_dir),
        suggestion_files: list_files(&config.suggestions_dir),
    }
}

fn count_pngs(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| {
                    e.path()
                        .extension()
                        .and_then(|x| x.to_str())
                        .is_some_and(|x| x.eq_ignore_ascii_case("png"))
                })
                .count()
        })
        .unwrap_or(0)
}

fn list_files(dir: &Path) -> Vec<StatusFile> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<StatusFile> = entries
        .filter_map(Result::ok)
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            meta.is_file().then(|| StatusFile {
                name: e.file_name().to_string_lossy().into_owned(),
                size_bytes: meta.len(),
            })
        })
        .collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> BatchConfig {
        BatchConfig::builder()
            .building_images_dir(root.join("building_images"))
            .building_data_dir(root.join("building_data"))
            .suggestions_dir(root.join("ai_suggestions"))
            .build()
            .unwrap()
    }

    #[test]
    fn nothing_on_disk_is_an_empty_status() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(building_status(&config(root.path())), BuildingStatus::default());
    }

    #[test]
    fn counts_buildings_images_and_files() {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        for (id, pngs) in [("bbbbbbbbbbbb", 2), ("aaaaaaaaaaaa", 1)] {
            let dir = r.join("building_images").join(id);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..pngs {
                std::fs::write(dir.join(format!("img_{i}.png")), b"png").unwrap();
            }
            std::fs::write(dir.join("notes.txt"), b"x").unwrap();
        }
        std::fs::write(r.join("building_images").join("stray.png"), b"png").unwrap();
        std::fs::create_dir_all(r.join("building_data")).unwrap();
        std::fs::write(r.join("building_data").join("buildings.csv"), b"a,b\n").unwrap();

        let status = building_status(&config(r));
        assert_eq!(status.buildings, vec!["aaaaaaaaaaaa", "bbbbbbbbbbbb"]);
        assert_eq!(status.images, 3);
        assert_eq!(
            status.data_files,
            vec![StatusFile {
                name: "buildings.csv".into(),
                size_bytes: 4
            }]
        );
        assert!(status.suggestion_files.is_empty());
    }
}
