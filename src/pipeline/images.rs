//! Persist extracted images under the images directory.
//!
//! Filenames follow `{stem}_page_{page}_img_{index}_{id}.png` where `page` and
//! `index` are 1-based and `id` is eight random alphanumerics from the run's
//! RNG. Ids are not checked for uniqueness; with 62⁸ possibilities a clash
//! within one document is not a practical concern.

use crate::error::DocumentError;
use crate::output::ImageRecord;
use crate::pipeline::extract::PageImages;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Length of the random image id.
pub const IMAGE_ID_LEN: usize = 8;

/// Images written for one document, plus per-image failures.
#[derive(Debug, Default)]
pub struct PersistedImages {
    pub images: Vec<ImageRecord>,
    pub failures: Vec<DocumentError>,
}

/// Eight random alphanumeric characters.
pub fn random_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_token(rng, IMAGE_ID_LEN)
}

/// `len` random alphanumeric characters.
pub fn random_token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

pub fn image_filename(stem: &str, page: usize, index: usize, id: &str) -> String {
    format!("{stem}_page_{page}_img_{index}_{id}.png")
}

/// Write every image of `pages` for the document at `document`.
///
/// A failed write is recorded and skipped; the remaining images are still
/// attempted. Ids are drawn before writing so the RNG sequence does not depend
/// on which writes succeed.
pub async fn persist_images<R: Rng + ?Sized>(
    document: &Path,
    pages: &[PageImages],
    images_dir: &Path,
    rng: &mut R,
) -> PersistedImages {
    let mut out = PersistedImages::default();
    if pages.iter().all(|p| p.images.is_empty()) {
        return out;
    }

    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    if let Err(e) = tokio::fs::create_dir_all(images_dir).await {
        warn!("Cannot create images directory {}: {}", images_dir.display(), e);
        for page in pages {
            for _ in &page.images {
                out.failures.push(DocumentError::ImageWrite {
                    path: images_dir.to_path_buf(),
                    detail: e.to_string(),
                });
            }
        }
        return out;
    }

    for page in pages {
        for (i, bytes) in page.images.iter().enumerate() {
            let index = i + 1;
            let id = random_id(rng);
            let path: PathBuf = images_dir.join(image_filename(&stem, page.page, index, &id));

            match tokio::fs::write(&path, bytes).await {
                Ok(()) => {
                    debug!("Wrote {}", path.display());
                    out.images.push(ImageRecord {
                        document: document.to_path_buf(),
                        page: page.page,
                        index,
                        id,
                        path,
                    });
                }
                Err(e) => {
                    warn!("Failed to write image {}: {}", path.display(), e);
                    out.failures.push(DocumentError::ImageWrite {
                        path,
                        detail: e.to_string(),
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ids_are_eight_alphanumerics() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let id = random_id(&mut rng);
            assert_eq!(id.len(), IMAGE_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn filename_layout() {
        assert_eq!(
            image_filename("report_en", 2, 1, "Ab3dE6gH"),
            "report_en_page_2_img_1_Ab3dE6gH.png"
        );
    }

    #[tokio::test]
    async fn writes_every_image_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let images_dir = dir.path().join("imgs");
        let pages = vec![
            PageImages {
                page: 1,
                images: vec![b"a".to_vec(), b"b".to_vec()],
            },
            PageImages {
                page: 2,
                images: vec![b"c".to_vec()],
            },
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let out = persist_images(Path::new("in/report.pdf"), &pages, &images_dir, &mut rng).await;

        assert!(out.failures.is_empty());
        assert_eq!(out.images.len(), 3);
        let positions: Vec<_> = out.images.iter().map(|r| (r.page, r.index)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 2), (2, 1)]);
        for record in &out.images {
            assert!(record.path.exists());
            let name = record.path.file_name().unwrap().to_string_lossy();
            assert!(name.starts_with("report_page_"));
            assert!(name.ends_with(&format!("_{}.png", record.id)));
        }
    }

    #[tokio::test]
    async fn no_images_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let images_dir = dir.path().join("imgs");
        let pages = vec![PageImages {
            page: 1,
            images: vec![],
        }];
        let mut rng = StdRng::seed_from_u64(1);
        let out = persist_images(Path::new("a.pdf"), &pages, &images_dir, &mut rng).await;
        assert!(out.images.is_empty());
        assert!(!images_dir.exists());
    }

    #[tokio::test]
    async fn unwritable_directory_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let pages = vec![PageImages {
            page: 1,
            images: vec![b"a".to_vec(), b"b".to_vec()],
        }];
        let mut rng = StdRng::seed_from_u64(1);
        let out = persist_images(Path::new("a.pdf"), &pages, &blocker.join("sub"), &mut rng).await;
        assert!(out.images.is_empty());
        assert_eq!(out.failures.len(), 2);
        assert!(out.failures.iter().all(|e| !e.is_document_fatal()));
    }
}
