//! The content store: ingested files relocated into a date tree.
//!
//! ```text
//! /Library/
//! └── 2018/
//!     └── 3/
//!         └── 31/
//!             ├── IMG_0001.jpg
//!             ├── IMG_0001.CR2
//!             └── IMG_0001_1.jpg
//! ```
//!
//! [`Library::commit`] is the only write path. Either every file of a set
//! ends up in the tree with its catalog rows, or nothing moved and nothing
//! was recorded.

use chrono::{Datelike, NaiveDateTime};
use rayon::prelude::*;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::db::{Database, Photo, PhotoSet, Status};
use crate::error::{LibraryError, Result};
use crate::scanner::hashing::sha256_file;

/// A completed relocation, kept so it can be reversed.
#[derive(Debug, Clone)]
struct Move {
    source: PathBuf,
    destination: PathBuf,
}

/// An original file opened for streaming to a client.
#[derive(Debug)]
pub struct RawFile {
    pub file: File,
    pub len: u64,
    pub mime: String,
    /// Suggested download name.
    pub filename: String,
}

/// Outcome of re-hashing the stored files.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub checked: usize,
    /// Files whose content no longer matches the catalogued hash.
    pub mismatched: Vec<Photo>,
    pub missing: Vec<Photo>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty()
    }
}

pub struct Library {
    root: PathBuf,
    db: Database,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>, db: Database) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, db })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Absolute location of a committed photo.
    pub fn photo_path(&self, photo: &Photo) -> PathBuf {
        self.root.join(&photo.path)
    }

    /// Move a set's files into the tree and record it in the catalog.
    ///
    /// On success every `Photo::path` is rewritten relative to the root and
    /// the set carries its database ids. On failure the files are back
    /// where they were and the set is unchanged.
    pub fn commit(&self, set: &mut PhotoSet) -> Result<()> {
        let relative_dir = date_dir(&set.date);
        let dest_dir = self.root.join(&relative_dir);
        std::fs::create_dir_all(&dest_dir)?;

        let mut moves: Vec<Move> = Vec::with_capacity(set.photos.len());
        if let Err(e) = relocate_members(&mut set.photos, &self.root, &relative_dir, &mut moves) {
            tracing::warn!(set = %set.uuid, error = %e, "Relocation failed, undoing set");
            rollback(&moves);
            restore_paths(&mut set.photos, &moves);
            return Err(e.into());
        }

        if let Err(e) = self.db.insert_photoset(set) {
            tracing::warn!(set = %set.uuid, error = %e, "Catalog insert failed, undoing moves");
            rollback(&moves);
            restore_paths(&mut set.photos, &moves);
            return Err(e);
        }

        tracing::info!(
            set = %set.uuid,
            files = set.photos.len(),
            dir = %relative_dir.display(),
            "Committed photo set"
        );
        Ok(())
    }

    /// Open a committed photo's original file for download.
    pub fn open_original(&self, photo: &Photo) -> Result<RawFile> {
        let path = self.photo_path(photo);
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LibraryError::NotFound(path.display().to_string()),
            _ => LibraryError::Io(e),
        })?;
        let len = file.metadata()?.len();
        Ok(RawFile {
            file,
            len,
            mime: photo.format.clone(),
            filename: photo.basename(),
        })
    }

    /// Re-hash every catalogued file and compare against the stored hash.
    pub fn verify(&self) -> Result<VerifyReport> {
        let photos = self.db.all_photos()?;
        tracing::info!(count = photos.len(), "Verifying library");

        let root = self.root.as_path();
        let outcomes: Vec<(Photo, Option<bool>)> = photos
            .into_par_iter()
            .map(|photo| {
                let outcome = match sha256_file(&root.join(&photo.path)) {
                    Ok(hash) => Some(hash == photo.hash),
                    Err(_) => None,
                };
                (photo, outcome)
            })
            .collect();

        let mut report = VerifyReport {
            checked: outcomes.len(),
            ..Default::default()
        };
        for (photo, outcome) in outcomes {
            match outcome {
                Some(true) => {}
                Some(false) => {
                    tracing::warn!(path = %photo.path.display(), "Hash mismatch");
                    report.mismatched.push(photo);
                }
                None => {
                    tracing::warn!(path = %photo.path.display(), "Missing file");
                    report.missing.push(photo);
                }
            }
        }
        Ok(report)
    }

    /// Correct a set's capture time. Files stay where they are.
    pub fn set_date_offset(&self, set_uuid: &str, minutes: i32) -> Result<PhotoSet> {
        self.db.set_date_offset(set_uuid, minutes)
    }

    pub fn set_status(&self, set_uuid: &str, status: Status) -> Result<PhotoSet> {
        self.db.set_status(set_uuid, status)
    }
}

/// `year/month/day` without zero padding, e.g. `2018/3/31`.
pub fn date_dir(date: &NaiveDateTime) -> PathBuf {
    PathBuf::from(date.year().to_string())
        .join(date.month().to_string())
        .join(date.day().to_string())
}

/// First free path for `name` in `dir`, inserting `_1`, `_2`, ... before the
/// extension on collision. Names are kept as raw OS strings.
fn free_destination(dir: &Path, name: &OsStr) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(name);
    let stem = as_path.file_stem().unwrap_or(name);
    let ext = as_path.extension();

    let mut n = 1u32;
    loop {
        let mut renamed = OsString::from(stem);
        renamed.push(format!("_{}", n));
        if let Some(ext) = ext {
            renamed.push(".");
            renamed.push(ext);
        }
        let candidate = dir.join(renamed);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Move each photo into `root/relative_dir`, recording every completed move.
/// Stops at the first failure; the caller undoes what `moves` holds.
fn relocate_members(
    photos: &mut [Photo],
    root: &Path,
    relative_dir: &Path,
    moves: &mut Vec<Move>,
) -> std::io::Result<()> {
    let dest_dir = root.join(relative_dir);
    for photo in photos.iter_mut() {
        let name = photo.path.file_name().map(OsStr::to_os_string).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", photo.path.display()),
            )
        })?;
        let destination = free_destination(&dest_dir, &name);
        relocate(&photo.path, &destination)?;

        tracing::debug!(
            source = %photo.path.display(),
            destination = %destination.display(),
            "Relocated"
        );
        let stored_name = destination.file_name().unwrap_or(&name).to_os_string();
        moves.push(Move {
            source: std::mem::replace(&mut photo.path, relative_dir.join(stored_name)),
            destination,
        });
    }
    Ok(())
}

/// Rename, falling back to copy + delete across filesystems.
fn relocate(source: &Path, destination: &Path) -> std::io::Result<()> {
    std::fs::rename(source, destination).or_else(|rename_err| {
        if !source.is_file() {
            return Err(rename_err);
        }
        std::fs::copy(source, destination)?;
        std::fs::remove_file(source).inspect_err(|_| {
            let _ = std::fs::remove_file(destination);
        })
    })
}

/// Reverse completed moves, most recent first.
fn rollback(moves: &[Move]) {
    for mv in moves.iter().rev() {
        if let Err(e) = relocate(&mv.destination, &mv.source) {
            tracing::error!(
                source = %mv.source.display(),
                destination = %mv.destination.display(),
                error = %e,
                "Failed to undo relocation"
            );
        }
    }
}

/// Put the in-memory paths back to the source locations.
fn restore_paths(photos: &mut [Photo], moves: &[Move]) {
    for (photo, mv) in photos.iter_mut().zip(moves) {
        photo.path = mv.source.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn shot_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 3, 31)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    fn write_photo(dir: &Path, name: &str, content: &[u8]) -> Photo {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        Photo::new(
            path.clone(),
            sha256_file(&path).unwrap(),
            "image/jpeg".to_string(),
            content.len() as u64,
        )
    }

    fn library(root: &Path) -> Library {
        Library::new(root.join("library"), Database::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_date_dir_unpadded() {
        assert_eq!(date_dir(&shot_at()), PathBuf::from("2018/3/31"));
    }

    #[test]
    fn test_commit_relocates_and_records() {
        let dir = tempdir().unwrap();
        let lib = library(dir.path());
        let photo = write_photo(dir.path(), "IMG_0001.jpg", b"one");
        let source = photo.path.clone();

        let mut set = PhotoSet::new(shot_at(), None, vec![photo]);
        lib.commit(&mut set).unwrap();

        assert!(!source.exists());
        assert_eq!(set.photos[0].path, PathBuf::from("2018/3/31/IMG_0001.jpg"));
        assert!(lib.photo_path(&set.photos[0]).exists());
        assert!(set.id.is_some());
        assert_eq!(lib.db().photo_count().unwrap(), 1);
    }

    #[test]
    fn test_same_name_gets_suffix() {
        let dir = tempdir().unwrap();
        let lib = library(dir.path());
        let first_dir = dir.path().join("a");
        let second_dir = dir.path().join("b");
        std::fs::create_dir_all(&first_dir).unwrap();
        std::fs::create_dir_all(&second_dir).unwrap();

        let mut first = PhotoSet::new(shot_at(), None, vec![write_photo(&first_dir, "IMG.jpg", b"first")]);
        let mut second = PhotoSet::new(shot_at(), None, vec![write_photo(&second_dir, "IMG.jpg", b"second")]);
        lib.commit(&mut first).unwrap();
        lib.commit(&mut second).unwrap();

        assert_eq!(first.photos[0].path, PathBuf::from("2018/3/31/IMG.jpg"));
        assert_eq!(second.photos[0].path, PathBuf::from("2018/3/31/IMG_1.jpg"));
        assert_eq!(std::fs::read(lib.photo_path(&first.photos[0])).unwrap(), b"first");
        assert_eq!(std::fs::read(lib.photo_path(&second.photos[0])).unwrap(), b"second");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_name_kept_byte_for_byte() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let lib = library(dir.path());
        let name = OsStr::from_bytes(b"caf\xe9.jpg");
        let first_dir = dir.path().join("a");
        let second_dir = dir.path().join("b");
        std::fs::create_dir_all(&first_dir).unwrap();
        std::fs::create_dir_all(&second_dir).unwrap();

        let mut sets = Vec::new();
        for (source_dir, content) in [(&first_dir, b"first"), (&second_dir, b"other")] {
            let path = source_dir.join(name);
            std::fs::write(&path, content).unwrap();
            let photo = Photo::new(path.clone(), sha256_file(&path).unwrap(), "image/jpeg".into(), 5);
            let mut set = PhotoSet::new(shot_at(), None, vec![photo]);
            lib.commit(&mut set).unwrap();
            sets.push(set);
        }

        let day = lib.root().join("2018/3/31");
        assert_eq!(std::fs::read(day.join(name)).unwrap(), b"first");
        assert_eq!(
            std::fs::read(day.join(OsStr::from_bytes(b"caf\xe9_1.jpg"))).unwrap(),
            b"other"
        );
        assert_eq!(std::fs::read_dir(&day).unwrap().count(), 2);
    }

    #[test]
    fn test_duplicate_content_rejected_and_rolled_back() {
        let dir = tempdir().unwrap();
        let lib = library(dir.path());

        let mut first = PhotoSet::new(shot_at(), None, vec![write_photo(dir.path(), "one.jpg", b"same")]);
        lib.commit(&mut first).unwrap();
        let stored = lib.photo_path(&first.photos[0]);

        let copy = write_photo(dir.path(), "copy.jpg", b"same");
        let copy_source = copy.path.clone();
        let mut second = PhotoSet::new(shot_at(), None, vec![copy]);

        let err = lib.commit(&mut second).unwrap_err();
        assert!(matches!(err, LibraryError::Duplicate { .. }));

        // First ingestion untouched, second file back at its source
        assert!(stored.exists());
        assert!(copy_source.exists());
        assert!(!lib.root().join("2018/3/31/copy.jpg").exists());
        assert_eq!(second.photos[0].path, copy_source);
        assert!(second.id.is_none());
        assert_eq!(lib.db().photoset_count().unwrap(), 1);
    }

    #[test]
    fn test_catalog_failure_restores_all_members() {
        let dir = tempdir().unwrap();
        let lib = library(dir.path());
        let jpg = write_photo(dir.path(), "shot.jpg", b"jpeg bytes");
        let raw = write_photo(dir.path(), "shot.cr2", b"raw bytes");
        // Two members with one hash: the second photo insert fails after both moved
        let mut clash = raw.clone();
        clash.hash = jpg.hash.clone();
        let sources = vec![jpg.path.clone(), clash.path.clone()];

        let mut set = PhotoSet::new(shot_at(), None, vec![jpg, clash]);
        assert!(lib.commit(&mut set).is_err());

        for source in &sources {
            assert!(source.exists());
        }
        assert_eq!(set.photos[0].path, sources[0]);
        assert_eq!(set.photos[1].path, sources[1]);
        assert_eq!(lib.db().photoset_count().unwrap(), 0);
        assert_eq!(lib.db().photo_count().unwrap(), 0);
    }

    #[test]
    fn test_relocation_failure_undoes_siblings() {
        let dir = tempdir().unwrap();
        let lib = library(dir.path());
        let present = write_photo(dir.path(), "present.jpg", b"here");
        let mut gone = write_photo(dir.path(), "gone.cr2", b"soon gone");
        std::fs::remove_file(&gone.path).unwrap();
        gone.hash = "deadbeef".to_string();
        let present_source = present.path.clone();

        let mut set = PhotoSet::new(shot_at(), None, vec![present, gone]);
        let err = lib.commit(&mut set).unwrap_err();
        assert!(matches!(err, LibraryError::Io(_)));

        assert!(present_source.exists());
        assert!(!lib.root().join("2018/3/31/present.jpg").exists());
        assert_eq!(set.photos[0].path, present_source);
        assert_eq!(lib.db().photoset_count().unwrap(), 0);
    }

    #[test]
    fn test_open_original_and_verify() {
        let dir = tempdir().unwrap();
        let lib = library(dir.path());
        let mut set = PhotoSet::new(shot_at(), None, vec![write_photo(dir.path(), "keep.jpg", b"payload")]);
        lib.commit(&mut set).unwrap();

        let raw = lib.open_original(&set.photos[0]).unwrap();
        assert_eq!(raw.len, 7);
        assert_eq!(raw.mime, "image/jpeg");
        assert_eq!(raw.filename, "keep.jpg");

        assert!(lib.verify().unwrap().is_ok());

        std::fs::write(lib.photo_path(&set.photos[0]), b"tampered").unwrap();
        let report = lib.verify().unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.mismatched.len(), 1);

        std::fs::remove_file(lib.photo_path(&set.photos[0])).unwrap();
        assert_eq!(lib.verify().unwrap().missing.len(), 1);
        assert!(matches!(
            lib.open_original(&set.photos[0]),
            Err(LibraryError::NotFound(_))
        ));
    }
}
