use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ScannerConfig;

/// Which ingestion bucket a file falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Decoded for EXIF; each one starts a photo set.
    Image,
    /// Raw or sidecar; joins a same-named image when there is one.
    Raw,
    /// Video or other; always its own set.
    Video,
}

/// A batch split into buckets, each in input order.
#[derive(Debug, Default)]
pub struct Classified {
    pub images: Vec<PathBuf>,
    pub raws: Vec<PathBuf>,
    pub videos: Vec<PathBuf>,
    /// Entries dropped before ingestion, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Lowercased extension, with `jpeg` folded into `jpg`.
fn normalized_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    if ext == "jpeg" {
        Some("jpg".to_string())
    } else {
        Some(ext)
    }
}

fn listed(ext: &str, list: &[String]) -> bool {
    list.iter().any(|e| {
        let e = e.to_lowercase();
        e == ext || (e == "jpeg" && ext == "jpg")
    })
}

pub fn kind_of(path: &Path, config: &ScannerConfig) -> Option<FileKind> {
    let ext = normalized_extension(path)?;
    if listed(&ext, &config.image_extensions) {
        Some(FileKind::Image)
    } else if listed(&ext, &config.raw_extensions) || listed(&ext, &config.sidecar_extensions) {
        Some(FileKind::Raw)
    } else if listed(&ext, &config.video_extensions) {
        Some(FileKind::Video)
    } else {
        None
    }
}

/// Bucket a flat batch of paths. Nothing here aborts the batch.
pub fn classify(paths: &[PathBuf], config: &ScannerConfig) -> Classified {
    let mut classified = Classified::default();

    for path in paths {
        let reason = if !path.is_file() {
            Some("not a regular file")
        } else if path.extension().is_none() {
            Some("no extension")
        } else {
            match kind_of(path, config) {
                Some(FileKind::Image) => {
                    classified.images.push(path.clone());
                    None
                }
                Some(FileKind::Raw) => {
                    classified.raws.push(path.clone());
                    None
                }
                Some(FileKind::Video) => {
                    classified.videos.push(path.clone());
                    None
                }
                None => Some("unknown extension"),
            }
        };

        if let Some(reason) = reason {
            tracing::warn!(path = %path.display(), reason, "Skipping");
            classified.skipped.push((path.clone(), reason.to_string()));
        }
    }

    classified
}

/// Name of the primary image a raw or sidecar belongs with: its stem,
/// lowercased, plus `.jpg`.
pub fn companion_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().to_lowercase();
    Some(format!("{}.jpg", stem))
}

/// Replace directories with the regular files beneath them, sorted.
/// Plain paths pass through unchanged.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();

    for path in paths {
        if !path.is_dir() {
            expanded.push(path.clone());
            continue;
        }

        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "Unreadable directory entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();

        // Sort by path for consistent ordering
        files.sort();
        expanded.extend(files);
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_classify_buckets_and_skips() {
        let dir = tempdir().unwrap();
        let names = [
            "a.JPG", "b.jpeg", "c.png", "c.CR2", "c.xmp", "d.nef", "e.MOV", "f.mp4", "notes.txt", "README",
        ];
        for name in names {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let mut paths: Vec<PathBuf> = names.iter().map(|n| dir.path().join(n)).collect();
        paths.push(dir.path().join("sub.jpg"));
        paths.push(dir.path().join("missing.jpg"));

        let classified = classify(&paths, &ScannerConfig::default());
        let file_names = |v: &[PathBuf]| -> Vec<String> {
            v.iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
                .collect()
        };

        assert_eq!(file_names(&classified.images), vec!["a.JPG", "b.jpeg", "c.png"]);
        assert_eq!(file_names(&classified.raws), vec!["c.CR2", "c.xmp", "d.nef"]);
        assert_eq!(file_names(&classified.videos), vec!["e.MOV", "f.mp4"]);

        let reasons: Vec<&str> = classified.skipped.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(
            reasons,
            vec!["unknown extension", "no extension", "not a regular file", "not a regular file"]
        );
    }

    #[test]
    fn test_configured_raw_list() {
        let config = ScannerConfig {
            raw_extensions: vec!["pef".to_string()],
            ..Default::default()
        };
        assert_eq!(kind_of(Path::new("x.PEF"), &config), Some(FileKind::Raw));
        assert_eq!(kind_of(Path::new("x.cr2"), &config), None);
    }

    #[test]
    fn test_companion_name() {
        assert_eq!(companion_name(Path::new("/in/Shot.CR2")).as_deref(), Some("shot.jpg"));
        assert_eq!(companion_name(Path::new("a.b.xmp")).as_deref(), Some("a.b.jpg"));
    }

    #[test]
    fn test_expand_paths() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("photo2.png")).unwrap();
        File::create(dir.path().join("photo1.jpg")).unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();
        let loose = PathBuf::from("/does/not/exist.jpg");

        let expanded = expand_paths(&[loose.clone(), dir.path().to_path_buf()]);
        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[0], loose);
        assert_eq!(expanded[1], dir.path().join("photo1.jpg"));
        assert_eq!(expanded[3], dir.path().join("subdir/photo3.jpeg"));
    }
}
