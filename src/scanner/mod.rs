pub mod discovery;
pub mod hashing;
pub mod metadata;

use std::path::{Path, PathBuf};

use crate::config::ScannerConfig;
use crate::db::{Photo, PhotoSet};
use crate::error::{LibraryError, Result};
use crate::library::Library;

pub use discovery::{classify, expand_paths, Classified, FileKind};
pub use metadata::{describe_file, extract_metadata, ImageMetadata};

/// What happened to each input of an ingestion batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Uuids of the sets written to the library.
    pub committed: Vec<String>,
    /// Sets the catalog rejected as already present: (first member, key).
    pub duplicates: Vec<(PathBuf, String)>,
    /// Files or sets that could not be read or committed.
    pub failures: Vec<(PathBuf, String)>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        format!(
            "{} committed, {} duplicates, {} failed, {} skipped",
            self.committed.len(),
            self.duplicates.len(),
            self.failures.len(),
            self.skipped.len()
        )
    }
}

/// Drives ingestion: classify, extract, group, commit.
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Ingest a flat, ordered batch of files into `library`.
    ///
    /// Per-file problems are recorded in the report and the batch carries
    /// on. Only the report is returned; nothing here is fatal.
    pub fn ingest(&self, library: &Library, paths: &[PathBuf]) -> IngestReport {
        tracing::info!(count = paths.len(), "Pre-sorting files");
        let classified = classify(paths, &self.config);

        let mut report = IngestReport {
            skipped: classified.skipped.clone(),
            ..Default::default()
        };
        let sets = self.build_sets(&classified, &mut report.failures);

        tracing::info!(sets = sets.len(), "Updating catalog");
        for mut set in sets {
            let first = set
                .photos
                .first()
                .map(|p| p.path.clone())
                .unwrap_or_default();

            match library.commit(&mut set) {
                Ok(()) => report.committed.push(set.uuid.clone()),
                Err(LibraryError::Duplicate { key }) => {
                    tracing::warn!(path = %first.display(), key = %key, "Already in library");
                    report.duplicates.push((first, key));
                }
                Err(e) => {
                    tracing::warn!(path = %first.display(), error = %e, "Commit failed");
                    report.failures.push((first, e.to_string()));
                }
            }
        }

        tracing::info!("Ingestion finished: {}", report.summary());
        report
    }

    /// Turn classified files into photo sets, in commit order: one set per
    /// primary image, raws attached to their image, leftovers on their own.
    pub fn build_sets(
        &self,
        classified: &Classified,
        failures: &mut Vec<(PathBuf, String)>,
    ) -> Vec<PhotoSet> {
        let mut sets: Vec<PhotoSet> = Vec::new();

        tracing::info!(count = classified.images.len(), "Scanning images");
        for path in &classified.images {
            match extract_metadata(path) {
                Ok(meta) => {
                    let photo = photo_from(path, &meta);
                    sets.push(PhotoSet::new(meta.date, meta.gps, vec![photo]));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Extraction failed");
                    failures.push((path.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(count = classified.raws.len(), "Scanning raws");
        for path in &classified.raws {
            let (photo, date) = match self.describe(path) {
                Ok(described) => described,
                Err(e) => {
                    failures.push((path.clone(), e.to_string()));
                    continue;
                }
            };

            match find_companion(&mut sets, path) {
                Some(set) => {
                    tracing::debug!(path = %path.display(), set = %set.uuid, "Attached to image");
                    set.photos.push(photo);
                }
                None => sets.push(PhotoSet::new(date, None, vec![photo])),
            }
        }

        tracing::info!(count = classified.videos.len(), "Scanning other files");
        for path in &classified.videos {
            match self.describe(path) {
                Ok((photo, date)) => sets.push(PhotoSet::new(date, None, vec![photo])),
                Err(e) => failures.push((path.clone(), e.to_string())),
            }
        }

        sets
    }

    /// A non-image member and its mtime date.
    fn describe(&self, path: &Path) -> Result<(Photo, chrono::NaiveDateTime)> {
        let format = metadata::mime_type(path, &self.config.raw_extensions);
        let meta = describe_file(path, format).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read file");
        })?;
        Ok((photo_from(path, &meta), meta.date))
    }
}

fn photo_from(path: &Path, meta: &ImageMetadata) -> Photo {
    let mut photo = Photo::new(path.to_path_buf(), meta.hash.clone(), meta.format.clone(), meta.size);
    photo.width = meta.width;
    photo.height = meta.height;
    photo.orientation = meta.orientation;
    photo
}

/// First set, in encounter order, holding a file named like the raw's
/// companion image.
fn find_companion<'a>(sets: &'a mut [PhotoSet], raw: &Path) -> Option<&'a mut PhotoSet> {
    let wanted = discovery::companion_name(raw)?;
    sets.iter_mut().find(|set| {
        set.photos
            .iter()
            .any(|p| p.basename().to_lowercase() == wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    fn write_jpeg(path: &Path, shade: u8) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(8, 6, Rgb([shade, 0, 0]));
        img.save(path).unwrap();
    }

    fn scanner() -> Scanner {
        Scanner::new(ScannerConfig::default())
    }

    #[test]
    fn test_raw_pairs_with_jpeg() {
        let dir = tempdir().unwrap();
        let jpg = dir.path().join("shot.jpg");
        let raw = dir.path().join("shot.CR2");
        write_jpeg(&jpg, 10);
        std::fs::write(&raw, b"raw sensor data").unwrap();

        let classified = classify(&[raw.clone(), jpg.clone()], &ScannerConfig::default());
        let mut failures = Vec::new();
        let sets = scanner().build_sets(&classified, &mut failures);

        assert!(failures.is_empty());
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].photos.len(), 2);
        assert_eq!(sets[0].photos[0].path, jpg);
        assert_eq!(sets[0].photos[0].format, "image/jpeg");
        assert_eq!((sets[0].photos[0].width, sets[0].photos[0].height), (8, 6));
        assert_eq!(sets[0].photos[1].path, raw);
        assert_eq!(sets[0].photos[1].format, "image/x-canon-cr2");
        assert_eq!(sets[0].photos[1].width, 0);
    }

    #[test]
    fn test_raw_pairs_with_first_match_only() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        write_jpeg(&a.join("IMG.jpg"), 1);
        write_jpeg(&b.join("img.JPG"), 2);
        std::fs::write(dir.path().join("IMG.xmp"), b"<x/>").unwrap();

        let paths = vec![a.join("IMG.jpg"), b.join("img.JPG"), dir.path().join("IMG.xmp")];
        let classified = classify(&paths, &ScannerConfig::default());
        let sets = scanner().build_sets(&classified, &mut Vec::new());

        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].photos.len(), 2);
        assert_eq!(sets[1].photos.len(), 1);
    }

    #[test]
    fn test_unmatched_raw_and_video_stand_alone() {
        let dir = tempdir().unwrap();
        let raw = dir.path().join("lonely.nef");
        let video = dir.path().join("clip.mov");
        std::fs::write(&raw, b"nef").unwrap();
        std::fs::write(&video, b"mov").unwrap();

        let classified = classify(&[video.clone(), raw.clone()], &ScannerConfig::default());
        let sets = scanner().build_sets(&classified, &mut Vec::new());

        // Raws before videos regardless of input order
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].photos[0].path, raw);
        assert_eq!(sets[1].photos[0].path, video);
        assert_eq!(sets[1].photos[0].format, "video/quicktime");
        assert!(!sets[1].has_gps());
    }

    #[test]
    fn test_ingest_reports_each_outcome() {
        let dir = tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        std::fs::create_dir_all(&inbox).unwrap();
        let library = Library::new(dir.path().join("library"), Database::open_in_memory().unwrap()).unwrap();

        let good = inbox.join("good.jpg");
        let twin = inbox.join("twin.jpg");
        let broken = inbox.join("broken.jpg");
        let notes = inbox.join("notes.txt");
        write_jpeg(&good, 50);
        std::fs::copy(&good, &twin).unwrap();
        std::fs::write(&broken, b"not a jpeg").unwrap();
        std::fs::write(&notes, b"hello").unwrap();

        let report = scanner().ingest(&library, &[good.clone(), twin.clone(), broken.clone(), notes.clone()]);

        assert_eq!(report.committed.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].0, twin);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, broken);
        assert_eq!(report.skipped.len(), 1);

        assert!(!good.exists());
        assert!(twin.exists());
        assert_eq!(library.db().photo_count().unwrap(), 1);
    }
}
