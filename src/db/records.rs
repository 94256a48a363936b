//! Catalog record types.
//!
//! These are plain values. Persistence lives on [`super::Database`]; a record
//! gets its internal `id` only once it has been inserted.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage format for timestamps. Sorts lexicographically.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Generate a new external identifier.
pub fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn format_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT).ok()
}

/// Visibility of a photo set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Private,
    Public,
    Hidden,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Private => "private",
            Status::Public => "public",
            Status::Hidden => "hidden",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Status::Private),
            "public" => Some(Status::Public),
            "hidden" => Some(Status::Hidden),
            _ => None,
        }
    }
}

/// One capture event, grouping the files shot together.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoSet {
    pub id: Option<i64>,
    pub uuid: String,
    /// Effective capture time: `date_real + date_offset` minutes.
    pub date: NaiveDateTime,
    /// Capture time as extracted at ingestion. Never changes.
    pub date_real: NaiveDateTime,
    /// Correction in minutes.
    pub date_offset: i32,
    /// Decimal degrees, 0.0 when unknown.
    pub lat: f64,
    pub lon: f64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub status: Status,
    pub photos: Vec<Photo>,
}

impl PhotoSet {
    pub fn new(date: NaiveDateTime, gps: Option<(f64, f64)>, photos: Vec<Photo>) -> Self {
        let (lat, lon) = gps.unwrap_or((0.0, 0.0));
        Self {
            id: None,
            uuid: new_uuid(),
            date,
            date_real: date,
            date_offset: 0,
            lat,
            lon,
            title: None,
            description: None,
            slug: None,
            status: Status::default(),
            photos,
        }
    }

    /// Apply a date correction, keeping `date` consistent with `date_real`.
    pub fn set_offset(&mut self, minutes: i32) {
        self.date_offset = minutes;
        self.date = self.date_real + Duration::minutes(minutes as i64);
    }

    pub fn has_gps(&self) -> bool {
        self.lat != 0.0 || self.lon != 0.0
    }
}

/// One physical file belonging to a [`PhotoSet`].
#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: Option<i64>,
    pub uuid: String,
    pub set_id: Option<i64>,
    pub size: u64,
    /// 0 when undetermined.
    pub width: u32,
    pub height: u32,
    /// Counter-clockwise quarter turns needed to display upright (0-3).
    pub orientation: u8,
    /// SHA-256 hex of the file content.
    pub hash: String,
    /// Source path during ingestion, relative to the library root once committed.
    pub path: PathBuf,
    /// Mime type.
    pub format: String,
}

impl Photo {
    pub fn new(path: PathBuf, hash: String, format: String, size: u64) -> Self {
        Self {
            id: None,
            uuid: new_uuid(),
            set_id: None,
            size,
            width: 0,
            height: 0,
            orientation: 0,
            hash,
            path,
            format,
        }
    }

    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// A named label; albums are tags with `is_album` set.
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_album: bool,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            uuid: new_uuid(),
            name: name.to_string(),
            slug: slugify(name),
            title: Some(name.to_string()),
            description: None,
            is_album: false,
        }
    }
}

/// Membership of a photo set in a tag.
#[derive(Debug, Clone, Serialize)]
pub struct TagItem {
    pub id: Option<i64>,
    pub tag_id: i64,
    pub set_id: i64,
    pub order: i64,
}

/// Lowercase, alphanumerics kept, everything else collapsed to single hyphens.
pub fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 3, 31)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_offset_recomputes_date() {
        let mut set = PhotoSet::new(date(12, 0), None, Vec::new());
        set.set_offset(90);
        assert_eq!(set.date, date(13, 30));
        assert_eq!(set.date_real, date(12, 0));

        set.set_offset(-30);
        assert_eq!(set.date, date(11, 30));
        assert_eq!(set.date_offset, -30);
    }

    #[test]
    fn test_new_records_get_distinct_uuids() {
        let a = Photo::new(PathBuf::from("a.jpg"), "x".into(), "image/jpeg".into(), 1);
        let b = Photo::new(PathBuf::from("b.jpg"), "y".into(), "image/jpeg".into(), 1);
        assert_ne!(a.uuid, b.uuid);
        assert!(a.id.is_none());
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [Status::Private, Status::Public, Status::Hidden] {
            assert_eq!(Status::from_str(status.as_str()), Some(status));
        }
        assert_eq!(Status::from_str("deleted"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Summer Trip 2018!"), "summer-trip-2018");
        assert_eq!(slugify("  a  b "), "a-b");
    }

    #[test]
    fn test_date_format() {
        let d = date(9, 5);
        assert_eq!(format_date(&d), "2018-03-31 09:05:00");
        assert_eq!(parse_date("2018-03-31 09:05:00"), Some(d));
    }
}
