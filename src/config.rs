use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV: &str = "PHOTOLIB_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the date-partitioned content store.
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,

    /// Root for derived data. Thumbnails live under `thumbs/`.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Primary images, decoded for EXIF.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Camera raw formats, grouped with a same-named primary image.
    #[serde(default = "default_raw_extensions")]
    pub raw_extensions: Vec<String>,

    #[serde(default = "default_sidecar_extensions")]
    pub sidecar_extensions: Vec<String>,

    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_raw_extensions() -> Vec<String> {
    ["cr2", "nef", "arw", "dng", "orf", "raf", "rw2"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_sidecar_extensions() -> Vec<String> {
    vec!["xmp".to_string()]
}

fn default_video_extensions() -> Vec<String> {
    vec!["mp4".to_string(), "mov".to_string()]
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            raw_extensions: default_raw_extensions(),
            sidecar_extensions: default_sidecar_extensions(),
            video_extensions: default_video_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Generation threads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How long a request waits for its worker before giving up.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of (photo, style) failures remembered.
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(2)
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_memo_capacity() -> usize {
    4096
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            memo_capacity: default_memo_capacity(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_library_path() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photolib")
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("photolib")
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photolib")
        .join("photos.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_path: default_library_path(),
            cache_path: default_cache_path(),
            db_path: default_db_path(),
            scanner: ScannerConfig::default(),
            thumbnails: ThumbnailConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, or from `$PHOTOLIB_CONFIG` when set.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);
        Self::load_from(&path)
    }

    /// Load from an explicit path, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photolib")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_written_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.thumbnails.timeout_secs, 30);
        assert!(config.scanner.raw_extensions.contains(&"cr2".to_string()));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
library_path = "/srv/photos"

[thumbnails]
jpeg_quality = 70
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.library_path, PathBuf::from("/srv/photos"));
        assert_eq!(config.thumbnails.jpeg_quality, 70);
        assert_eq!(config.thumbnails.memo_capacity, 4096);
        assert_eq!(config.scanner.video_extensions, vec!["mp4", "mov"]);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "library_path = [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
