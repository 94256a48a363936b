//! Photo set and photo repository.

use rusqlite::{params, OptionalExtension};
use std::path::PathBuf;

use super::records::{format_date, Photo, PhotoSet, Status};
use super::{get_date, map_write_error, Database};
use crate::error::{LibraryError, Result};

pub(crate) const PHOTOSET_COLUMNS: &str =
    "s.id, s.uuid, s.date, s.date_real, s.date_offset, s.lat, s.lon, s.title, s.description, s.slug, s.status";

const PHOTO_COLUMNS: &str =
    "id, set_id, uuid, size, width, height, orientation, hash, path, format";

pub(crate) fn row_to_photoset(row: &rusqlite::Row) -> rusqlite::Result<PhotoSet> {
    let status: String = row.get(10)?;
    Ok(PhotoSet {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        date: get_date(row, 2)?,
        date_real: get_date(row, 3)?,
        date_offset: row.get(4)?,
        lat: row.get(5)?,
        lon: row.get(6)?,
        title: row.get(7)?,
        description: row.get(8)?,
        slug: row.get(9)?,
        status: Status::from_str(&status).unwrap_or_default(),
        photos: Vec::new(),
    })
}

fn row_to_photo(row: &rusqlite::Row) -> rusqlite::Result<Photo> {
    let path: String = row.get(8)?;
    Ok(Photo {
        id: Some(row.get(0)?),
        set_id: Some(row.get(1)?),
        uuid: row.get(2)?,
        size: row.get::<_, i64>(3)? as u64,
        width: row.get(4)?,
        height: row.get(5)?,
        orientation: row.get(6)?,
        hash: row.get(7)?,
        path: PathBuf::from(path),
        format: row.get(9)?,
    })
}

/// Stored paths always use forward slashes.
fn path_to_db(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl Database {
    // ========================================================================
    // Create
    // ========================================================================

    /// Insert a photo set and all of its photos in one transaction.
    ///
    /// On success the generated ids are written back into `set`. On failure
    /// nothing is persisted and `set` is left untouched.
    pub fn insert_photoset(&self, set: &mut PhotoSet) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO photosets (uuid, date, date_real, date_offset, lat, lon, title, description, slug, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                set.uuid,
                format_date(&set.date),
                format_date(&set.date_real),
                set.date_offset,
                set.lat,
                set.lon,
                set.title,
                set.description,
                set.slug,
                set.status.as_str(),
            ],
        )
        .map_err(|e| map_write_error(e, &set.uuid))?;
        let set_id = tx.last_insert_rowid();

        let mut photo_ids = Vec::with_capacity(set.photos.len());
        for photo in &set.photos {
            tx.execute(
                r#"
                INSERT INTO photos (set_id, uuid, size, width, height, orientation, hash, path, format)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    set_id,
                    photo.uuid,
                    photo.size as i64,
                    photo.width,
                    photo.height,
                    photo.orientation,
                    photo.hash,
                    path_to_db(&photo.path),
                    photo.format,
                ],
            )
            .map_err(|e| map_write_error(e, &photo.hash))?;
            photo_ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;

        set.id = Some(set_id);
        for (photo, id) in set.photos.iter_mut().zip(photo_ids) {
            photo.id = Some(id);
            photo.set_id = Some(set_id);
        }
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn get_photoset(&self, id: i64) -> Result<Option<PhotoSet>> {
        let sql = format!("SELECT {} FROM photosets s WHERE s.id = ?", PHOTOSET_COLUMNS);
        let set = self.conn.query_row(&sql, [id], row_to_photoset).optional()?;
        self.with_photos(set)
    }

    pub fn get_photoset_by_uuid(&self, uuid: &str) -> Result<Option<PhotoSet>> {
        let sql = format!("SELECT {} FROM photosets s WHERE s.uuid = ?", PHOTOSET_COLUMNS);
        let set = self.conn.query_row(&sql, [uuid], row_to_photoset).optional()?;
        self.with_photos(set)
    }

    fn with_photos(&self, set: Option<PhotoSet>) -> Result<Option<PhotoSet>> {
        match set {
            Some(mut set) => {
                if let Some(id) = set.id {
                    set.photos = self.photos_for_set(id)?;
                }
                Ok(Some(set))
            }
            None => Ok(None),
        }
    }

    pub fn photos_for_set(&self, set_id: i64) -> Result<Vec<Photo>> {
        let sql = format!("SELECT {} FROM photos WHERE set_id = ? ORDER BY id", PHOTO_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([set_id], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn get_photo_by_uuid(&self, uuid: &str) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photos WHERE uuid = ?", PHOTO_COLUMNS);
        Ok(self.conn.query_row(&sql, [uuid], row_to_photo).optional()?)
    }

    pub fn get_photo_by_hash(&self, hash: &str) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photos WHERE hash = ?", PHOTO_COLUMNS);
        Ok(self.conn.query_row(&sql, [hash], row_to_photo).optional()?)
    }

    pub fn all_photos(&self) -> Result<Vec<Photo>> {
        let sql = format!("SELECT {} FROM photos ORDER BY id", PHOTO_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn photo_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?)
    }

    pub fn photoset_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM photosets", [], |row| row.get(0))?)
    }

    /// Sum of all photo sizes in bytes.
    pub fn total_size(&self) -> Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(size), 0) FROM photos",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Persist the mutable fields of an existing set.
    ///
    /// `date` is always written as `date_real + date_offset`, whatever the
    /// in-memory value says.
    pub fn update_photoset(&self, set: &mut PhotoSet) -> Result<()> {
        set.set_offset(set.date_offset);
        let changed = self.conn.execute(
            r#"
            UPDATE photosets
            SET date = ?, date_offset = ?, title = ?, description = ?, slug = ?, status = ?
            WHERE uuid = ?
            "#,
            params![
                format_date(&set.date),
                set.date_offset,
                set.title,
                set.description,
                set.slug,
                set.status.as_str(),
                set.uuid,
            ],
        )?;
        if changed == 0 {
            return Err(LibraryError::NotFound(format!("photo set {}", set.uuid)));
        }
        Ok(())
    }

    /// Shift a set's effective date by `minutes` from its original date.
    pub fn set_date_offset(&self, uuid: &str, minutes: i32) -> Result<PhotoSet> {
        let mut set = self
            .get_photoset_by_uuid(uuid)?
            .ok_or_else(|| LibraryError::NotFound(format!("photo set {}", uuid)))?;
        tracing::info!(
            "Date offset for {}: {} -> {} minutes",
            uuid,
            set.date_offset,
            minutes
        );
        set.set_offset(minutes);
        self.update_photoset(&mut set)?;
        Ok(set)
    }

    pub fn set_status(&self, uuid: &str, status: Status) -> Result<PhotoSet> {
        let mut set = self
            .get_photoset_by_uuid(uuid)?
            .ok_or_else(|| LibraryError::NotFound(format!("photo set {}", uuid)))?;
        set.status = status;
        self.update_photoset(&mut set)?;
        Ok(set)
    }
}
