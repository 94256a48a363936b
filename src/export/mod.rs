use anyhow::{bail, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::db::Database;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unknown export format: {} (expected json or csv)", other),
        }
    }
}

/// One catalogued file with the set it belongs to, flattened.
#[derive(Debug, Serialize)]
pub struct ExportedPhoto {
    pub set_uuid: String,
    pub date: String,
    pub date_real: String,
    pub date_offset: i32,
    pub lat: f64,
    pub lon: f64,
    pub status: String,
    pub title: Option<String>,
    pub uuid: String,
    pub path: String,
    pub format: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub orientation: u8,
    pub hash: String,
}

/// Write every photo in the catalog to `output_path`. Returns the row count.
pub fn export_catalog(db: &Database, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let photos = get_photos_for_export(db)?;
    let count = photos.len();

    match format {
        ExportFormat::Json => export_json(&photos, output_path)?,
        ExportFormat::Csv => export_csv(&photos, output_path)?,
    }

    tracing::info!(count, path = %output_path.display(), "Exported catalog");
    Ok(count)
}

fn get_photos_for_export(db: &Database) -> Result<Vec<ExportedPhoto>> {
    let mut stmt = db.conn().prepare(
        r#"
        SELECT
            s.uuid, s.date, s.date_real, s.date_offset, s.lat, s.lon, s.status, s.title,
            p.uuid, p.path, p.format, p.size, p.width, p.height, p.orientation, p.hash
        FROM photos p
        JOIN photosets s ON s.id = p.set_id
        ORDER BY s.date, p.id
        "#,
    )?;

    let photos = stmt
        .query_map([], |row| {
            Ok(ExportedPhoto {
                set_uuid: row.get(0)?,
                date: row.get(1)?,
                date_real: row.get(2)?,
                date_offset: row.get(3)?,
                lat: row.get(4)?,
                lon: row.get(5)?,
                status: row.get(6)?,
                title: row.get(7)?,
                uuid: row.get(8)?,
                path: row.get(9)?,
                format: row.get(10)?,
                size: row.get::<_, i64>(11)? as u64,
                width: row.get(12)?,
                height: row.get(13)?,
                orientation: row.get(14)?,
                hash: row.get(15)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(photos)
}

fn export_json(photos: &[ExportedPhoto], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(photos)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(photos: &[ExportedPhoto], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    // Header row comes from the field names
    for photo in photos {
        wtr.serialize(photo)?;
    }

    wtr.flush()?;
    Ok(())
}
