//! On-demand thumbnails with a failure memo.
//!
//! Thumbnails are written once to `<cache>/thumbs/<style>/<photo-uuid>.jpg`
//! and never rewritten. Photos that fail to render are remembered so they
//! are not retried until the process restarts.

pub mod worker;

use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::config::ThumbnailConfig;
use crate::db::Photo;
use crate::error::{LibraryError, Result};
use worker::{Job, WorkerPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Tiny,
    Small,
    Feed,
    Preview,
    Big,
}

impl Style {
    pub const ALL: [Style; 5] = [Style::Tiny, Style::Small, Style::Feed, Style::Preview, Style::Big];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Tiny => "tiny",
            Style::Small => "small",
            Style::Feed => "feed",
            Style::Preview => "preview",
            Style::Big => "big",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.as_str() == s)
    }

    /// (max width, max height, whether portrait sources swap the bounds)
    pub fn bounds(&self) -> (u32, u32, bool) {
        match self {
            Style::Tiny => (80, 80, false),
            Style::Small => (100, 100, false),
            Style::Feed => (250, 250, false),
            Style::Preview => (1024, 768, true),
            Style::Big => (2048, 1536, true),
        }
    }
}

/// Output dimensions for a source of `width` x `height` stored pixels.
///
/// Portrait sources swap the bounds when the style allows it. The box then
/// shrinks, keeping its aspect, until it fits inside the upright source.
pub fn target_box(style: Style, width: u32, height: u32, orientation: u8) -> (u32, u32) {
    let (mut box_w, mut box_h, swap_allowed) = style.bounds();
    let turned = orientation % 2 == 1;

    if swap_allowed && (turned || height > width) {
        std::mem::swap(&mut box_w, &mut box_h);
    }

    let (src_w, src_h) = if turned { (height, width) } else { (width, height) };
    if src_w >= box_w && src_h >= box_h {
        return (box_w, box_h);
    }

    let scale = (src_w as f64 / box_w as f64).min(src_h as f64 / box_h as f64);
    let fit = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    (fit(box_w), fit(box_h))
}

type MemoKey = (String, Style);

pub struct ThumbnailCache {
    thumbs_dir: PathBuf,
    library_root: PathBuf,
    pool: WorkerPool,
    timeout: Duration,
    quality: u8,
    failures: Mutex<LruCache<MemoKey, ()>>,
    attempts: AtomicUsize,
}

impl ThumbnailCache {
    /// `cache_root` holds the `thumbs/` tree; photo paths resolve against
    /// `library_root`.
    pub fn new(cache_root: &Path, library_root: &Path, config: &ThumbnailConfig) -> Result<Self> {
        let thumbs_dir = cache_root.join("thumbs");
        std::fs::create_dir_all(&thumbs_dir)?;

        let capacity = NonZeroUsize::new(config.memo_capacity)
            .ok_or_else(|| LibraryError::Config("thumbnails.memo_capacity must be > 0".to_string()))?;

        Ok(Self {
            thumbs_dir,
            library_root: library_root.to_path_buf(),
            pool: WorkerPool::new(config.workers)?,
            timeout: Duration::from_secs(config.timeout_secs),
            quality: config.jpeg_quality,
            failures: Mutex::new(LruCache::new(capacity)),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn thumb_path(&self, photo: &Photo, style: Style) -> PathBuf {
        self.thumbs_dir
            .join(style.as_str())
            .join(format!("{}.jpg", photo.uuid))
    }

    /// Number of generation jobs dispatched since construction.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn is_memoized(&self, key: &MemoKey) -> bool {
        self.failures
            .lock()
            .map(|memo| memo.contains(key))
            .unwrap_or(false)
    }

    fn memoize(&self, key: MemoKey) {
        if let Ok(mut memo) = self.failures.lock() {
            memo.put(key, ());
        }
    }

    /// Path to the thumbnail, rendering it first if needed. `None` means
    /// no thumbnail can be shown for this photo.
    pub fn get_or_create(&self, photo: &Photo, style: Style) -> Option<PathBuf> {
        let destination = self.thumb_path(photo, style);
        if destination.exists() {
            return Some(destination);
        }

        if !photo.has_dimensions() {
            return None;
        }

        let key = (photo.uuid.clone(), style);
        if self.is_memoized(&key) {
            tracing::debug!(photo = %photo.uuid, style = style.as_str(), "Known failure, skipping");
            return None;
        }

        match self.generate(photo, style, &destination) {
            Ok(()) => Some(destination),
            Err(reason) => {
                tracing::warn!(
                    photo = %photo.uuid,
                    style = style.as_str(),
                    reason = %reason,
                    "Thumbnail generation failed"
                );
                self.memoize(key);
                None
            }
        }
    }

    /// Thumbnail for a set: the first JPEG member, else the first member.
    pub fn get_or_create_for_set(&self, photos: &[Photo], style: Style) -> Option<PathBuf> {
        let source = photos
            .iter()
            .find(|p| p.format == "image/jpeg")
            .or_else(|| photos.first())?;
        self.get_or_create(source, style)
    }

    fn generate(&self, photo: &Photo, style: Style, destination: &Path) -> worker::JobResult {
        let (width, height) = target_box(style, photo.width, photo.height, photo.orientation);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (reply, result) = mpsc::channel();

        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.pool.submit(Job {
            source: self.library_root.join(&photo.path),
            orientation: photo.orientation,
            width,
            height,
            destination: destination.to_path_buf(),
            quality: self.quality,
            cancelled: Arc::clone(&cancelled),
            reply,
        })?;

        match result.recv_timeout(self.timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                cancelled.store(true, Ordering::SeqCst);
                Err(format!("timed out after {:?}", self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err("worker went away".to_string()),
        }
    }
}
