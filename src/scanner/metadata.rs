use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::hashing::sha256_file;
use crate::error::{LibraryError, Result};

/// Capture timestamp layouts found in the wild, tried in order.
const CAPTURE_DATE_FORMATS: &[&str] = &["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Everything ingestion needs to know about one file.
#[derive(Debug, Clone, Serialize)]
pub struct ImageMetadata {
    pub date: NaiveDateTime,
    /// Decimal degrees (lat, lon) when the file carries a complete GPS block.
    pub gps: Option<(f64, f64)>,
    pub width: u32,
    pub height: u32,
    pub orientation: u8,
    pub hash: String,
    pub size: u64,
    pub format: String,
}

/// Decode a primary image and collect its capture metadata.
///
/// A container that cannot be decoded is an error. Missing or malformed
/// EXIF is not: the date falls back to the file's mtime and GPS is absent.
pub fn extract_metadata(path: &Path) -> Result<ImageMetadata> {
    let extraction_error = |reason: String| LibraryError::Extraction {
        path: path.to_path_buf(),
        reason,
    };

    let (width, height) = image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| extraction_error(e.to_string()))?;

    let exif = read_exif(path);
    let date = exif
        .as_ref()
        .and_then(capture_date)
        .unwrap_or_else(|| {
            tracing::debug!(path = %path.display(), "No usable capture date, using mtime");
            file_mtime(path)
        });
    let gps = exif.as_ref().and_then(gps_coordinates);
    let orientation = exif
        .as_ref()
        .and_then(|e| e.get_field(exif::Tag::Orientation, exif::In::PRIMARY))
        .and_then(|f| f.value.get_uint(0))
        .map(orientation_code)
        .unwrap_or(0);

    let size = std::fs::metadata(path)?.len();

    Ok(ImageMetadata {
        date,
        gps,
        width,
        height,
        orientation,
        hash: sha256_file(path)?,
        size,
        format: mime_type(path, &[]),
    })
}

/// Describe a non-image member (raw, sidecar, video). It is dated by mtime
/// and carries no dimensions.
pub fn describe_file(path: &Path, format: String) -> Result<ImageMetadata> {
    let size = std::fs::metadata(path)?.len();
    Ok(ImageMetadata {
        date: file_mtime(path),
        gps: None,
        width: 0,
        height: 0,
        orientation: 0,
        hash: sha256_file(path)?,
        size,
        format,
    })
}

fn read_exif(path: &Path) -> Option<exif::Exif> {
    let file = File::open(path).ok()?;
    let mut bufreader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut bufreader) {
        Ok(exif) => Some(exif),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No EXIF data");
            None
        }
    }
}

fn ascii_field(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Ascii(ref parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string()),
        _ => None,
    }
}

fn capture_date(exif: &exif::Exif) -> Option<NaiveDateTime> {
    let candidates: Vec<String> = [
        exif::Tag::DateTimeOriginal,
        exif::Tag::DateTimeDigitized,
        exif::Tag::DateTime,
    ]
    .iter()
    .filter_map(|tag| ascii_field(exif, *tag))
    .collect();
    pick_capture_date(candidates.iter().map(String::as_str))
}

/// First candidate, in priority order, that parses as a real capture date.
pub fn pick_capture_date<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Option<NaiveDateTime> {
    candidates.into_iter().find_map(parse_capture_date)
}

/// Parse one capture timestamp. Cameras with an unset clock write an
/// all-zero year; that is treated as no date at all.
pub fn parse_capture_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('\0');
    if raw.len() < 4 || raw.as_bytes()[..4].iter().all(|b| *b == b'0') {
        return None;
    }
    CAPTURE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn gps_coordinates(exif: &exif::Exif) -> Option<(f64, f64)> {
    let field = |tag| exif.get_field(tag, exif::In::PRIMARY).map(|f| &f.value);
    decode_gps(
        field(exif::Tag::GPSLatitude),
        field(exif::Tag::GPSLatitudeRef),
        field(exif::Tag::GPSLongitude),
        field(exif::Tag::GPSLongitudeRef),
    )
}

/// Turn the four GPS fields into signed decimal degrees.
///
/// All four must be present, and each coordinate must be three rationals
/// with non-zero denominators. Anything less means no GPS.
pub fn decode_gps(
    lat: Option<&exif::Value>,
    lat_ref: Option<&exif::Value>,
    lon: Option<&exif::Value>,
    lon_ref: Option<&exif::Value>,
) -> Option<(f64, f64)> {
    let lat = sexagesimal(lat?)?;
    let lon = sexagesimal(lon?)?;
    let lat_ref = hemisphere(lat_ref?)?;
    let lon_ref = hemisphere(lon_ref?)?;

    let lat = if lat_ref == 'S' { -lat } else { lat };
    let lon = if lon_ref == 'W' { -lon } else { lon };
    Some((round8(lat), round8(lon)))
}

fn sexagesimal(value: &exif::Value) -> Option<f64> {
    let exif::Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() != 3 || parts.iter().any(|r| r.denom == 0) {
        return None;
    }
    let part = |i: usize| parts[i].num as f64 / parts[i].denom as f64;
    Some(dms_to_decimal(part(0), part(1), part(2)))
}

fn hemisphere(value: &exif::Value) -> Option<char> {
    let exif::Value::Ascii(parts) = value else {
        return None;
    };
    parts
        .first()
        .and_then(|bytes| bytes.first())
        .map(|b| (*b as char).to_ascii_uppercase())
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

/// Map an EXIF orientation value to counter-clockwise quarter turns.
pub fn orientation_code(exif_orientation: u32) -> u8 {
    match exif_orientation {
        8 => 1,
        3 => 2,
        6 => 3,
        _ => 0,
    }
}

/// Modification time as local wall-clock time, whole seconds. Never fails:
/// an unreadable mtime yields the current time.
pub fn file_mtime(path: &Path) -> NaiveDateTime {
    let date = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Local>::from(modified).naive_local(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read mtime, using current time");
            Local::now().naive_local()
        }
    };
    date.with_nanosecond(0).unwrap_or(date)
}

/// Mime type by extension. `raw_formats` lists extensions, beyond the
/// built-in table, that should be labelled as camera raws.
pub fn mime_type(path: &Path, raw_formats: &[String]) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let known = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "cr2" => "image/x-canon-cr2",
        "xmp" => "application/octet-stream-xmp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "nef" | "arw" | "dng" | "orf" | "raf" | "rw2" => return format!("image/x-{}", ext),
        _ if raw_formats.iter().any(|r| r.eq_ignore_ascii_case(&ext)) => {
            return format!("image/x-{}", ext)
        }
        _ => "application/octet-stream",
    };
    known.to_string()
}

/// Canonical extension for a stored mime type, used to name downloads.
pub fn mime_to_ext(mime: &str) -> Option<String> {
    let ext = match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "application/octet-stream-xmp" => "xmp",
        "image/x-canon-cr2" => "cr2",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        other => return other.strip_prefix("image/x-").map(str::to_string),
    };
    Some(ext.to_string())
}
