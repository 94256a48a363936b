//! Bounded pool of thumbnail generation threads.
//!
//! Jobs arrive on one shared channel; each job carries its own reply
//! channel and a cancel flag. A worker that finishes a cancelled job throws
//! its output away instead of publishing it.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::fs::File;
use std::io::BufWriter;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

pub type JobResult = std::result::Result<(), String>;

/// One thumbnail to render.
pub struct Job {
    pub source: PathBuf,
    /// Counter-clockwise quarter turns applied before scaling.
    pub orientation: u8,
    pub width: u32,
    pub height: u32,
    pub destination: PathBuf,
    pub quality: u8,
    pub cancelled: Arc<AtomicBool>,
    pub reply: mpsc::Sender<JobResult>,
}

impl Job {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let receiver = Arc::clone(&receiver);
            let handle = std::thread::Builder::new()
                .name(format!("thumb-{}", index))
                .spawn(move || worker_loop(receiver))?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Queue a job. Fails only when the pool is shutting down.
    pub fn submit(&self, job: Job) -> JobResult {
        match self.sender {
            Some(ref sender) => sender
                .send(job)
                .map_err(|_| "thumbnail pool is shut down".to_string()),
            None => Err("thumbnail pool is shut down".to_string()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker loop.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let Ok(guard) = receiver.lock() else {
                return;
            };
            match guard.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        if job.cancelled.load(Ordering::SeqCst) {
            continue;
        }

        let result = match catch_unwind(AssertUnwindSafe(|| render(&job))) {
            Ok(result) => result,
            Err(_) => Err(format!("panic while rendering {}", job.source.display())),
        };
        // The requester may have timed out and gone away.
        let _ = job.reply.send(result);
    }
}

/// Decode, rotate, crop-to-fill and publish via temp file + rename.
fn render(job: &Job) -> JobResult {
    let img = image::open(&job.source).map_err(|e| format!("decode failed: {}", e))?;
    let img = rotate(img, job.orientation);
    let thumb = img.resize_to_fill(job.width, job.height, FilterType::Lanczos3);

    let dir = job
        .destination
        .parent()
        .ok_or_else(|| "destination has no parent".to_string())?;
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;

    let temp = TempFile::new(dir);
    encode_jpeg(&thumb, temp.path(), job.quality)?;

    if job.cancelled.load(Ordering::SeqCst) {
        return Err("cancelled".to_string());
    }

    temp.publish(&job.destination).map_err(|e| e.to_string())
}

/// Scratch output that is removed on drop, including during unwinding,
/// unless it was renamed into place.
struct TempFile {
    path: PathBuf,
    published: bool,
}

impl TempFile {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!(".{}.tmp", uuid::Uuid::new_v4())),
            published: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn publish(mut self, destination: &Path) -> std::io::Result<()> {
        std::fs::rename(&self.path, destination)?;
        self.published = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.published {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Apply counter-clockwise quarter turns.
pub fn rotate(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        1 => img.rotate270(),
        2 => img.rotate180(),
        3 => img.rotate90(),
        _ => img,
    }
}

fn encode_jpeg(img: &DynamicImage, path: &Path, quality: u8) -> JobResult {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| format!("encode failed: {}", e))
}
