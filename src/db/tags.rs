//! Tags, albums and tag membership.
//!
//! Tag management itself belongs to the presentation layer; the catalog only
//! guarantees unique names and slugs, and at most one membership row per
//! (tag, set) pair.

use rusqlite::{params, OptionalExtension};

use super::records::{Tag, TagItem};
use super::{map_write_error, Database};
use crate::error::{LibraryError, Result};

const TAG_COLUMNS: &str = "id, uuid, name, slug, title, description, is_album";

fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: Some(row.get(0)?),
        uuid: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        is_album: row.get::<_, i64>(6)? != 0,
    })
}

impl Database {
    pub fn create_tag(&self, tag: &mut Tag) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO tags (uuid, name, slug, title, description, is_album) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    tag.uuid,
                    tag.name,
                    tag.slug,
                    tag.title,
                    tag.description,
                    tag.is_album as i64
                ],
            )
            .map_err(|e| map_write_error(e, &tag.name))?;
        tag.id = Some(self.conn.last_insert_rowid());
        Ok(())
    }

    pub fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        self.get_tag_where("name", name)
    }

    pub fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        self.get_tag_where("slug", slug)
    }

    pub fn get_tag_by_uuid(&self, uuid: &str) -> Result<Option<Tag>> {
        self.get_tag_where("uuid", uuid)
    }

    fn get_tag_where(&self, column: &str, value: &str) -> Result<Option<Tag>> {
        let sql = format!("SELECT {} FROM tags WHERE {} = ?", TAG_COLUMNS, column);
        Ok(self.conn.query_row(&sql, [value], row_to_tag).optional()?)
    }

    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        let sql = format!("SELECT {} FROM tags ORDER BY title, name", TAG_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let tags = stmt
            .query_map([], row_to_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// Promote a tag to an album or demote it back.
    pub fn set_tag_album(&self, uuid: &str, is_album: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE tags SET is_album = ? WHERE uuid = ?",
            params![is_album as i64, uuid],
        )?;
        if changed == 0 {
            return Err(LibraryError::NotFound(format!("tag {}", uuid)));
        }
        Ok(())
    }

    /// Attach a set to a tag. A second attach of the same pair is `Duplicate`.
    pub fn add_tag_item(&self, tag_id: i64, set_id: i64, order: i64) -> Result<TagItem> {
        self.conn
            .execute(
                r#"INSERT INTO tag_items (tag_id, set_id, "order") VALUES (?, ?, ?)"#,
                params![tag_id, set_id, order],
            )
            .map_err(|e| map_write_error(e, &format!("tag {} / set {}", tag_id, set_id)))?;
        Ok(TagItem {
            id: Some(self.conn.last_insert_rowid()),
            tag_id,
            set_id,
            order,
        })
    }

    pub fn tags_for_set(&self, set_id: i64) -> Result<Vec<Tag>> {
        let sql = format!(
            "SELECT {} FROM tags WHERE id IN (SELECT tag_id FROM tag_items WHERE set_id = ?) ORDER BY name",
            TAG_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tags = stmt
            .query_map([set_id], row_to_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::records::PhotoSet;
    use chrono::NaiveDate;

    fn stored_set(db: &Database) -> PhotoSet {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let mut set = PhotoSet::new(date, None, Vec::new());
        db.insert_photoset(&mut set).unwrap();
        set
    }

    #[test]
    fn test_tag_name_and_slug_unique() {
        let db = Database::open_in_memory().unwrap();
        let mut tag = Tag::new("Beach Day");
        db.create_tag(&mut tag).unwrap();
        assert_eq!(db.get_tag_by_slug("beach-day").unwrap().unwrap().uuid, tag.uuid);

        let mut same_name = Tag::new("Beach Day");
        assert!(matches!(
            db.create_tag(&mut same_name),
            Err(LibraryError::Duplicate { .. })
        ));

        // Different name, colliding slug
        let mut same_slug = Tag::new("beach day");
        assert!(matches!(
            db.create_tag(&mut same_slug),
            Err(LibraryError::Duplicate { .. })
        ));
        assert_eq!(db.all_tags().unwrap().len(), 1);
    }

    #[test]
    fn test_tag_item_pair_unique() {
        let db = Database::open_in_memory().unwrap();
        let set = stored_set(&db);
        let mut tag = Tag::new("family");
        db.create_tag(&mut tag).unwrap();

        let tag_id = tag.id.unwrap();
        let set_id = set.id.unwrap();
        db.add_tag_item(tag_id, set_id, 0).unwrap();
        assert!(matches!(
            db.add_tag_item(tag_id, set_id, 1),
            Err(LibraryError::Duplicate { .. })
        ));

        let tags = db.tags_for_set(set_id).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "family");
    }

    #[test]
    fn test_tag_item_for_missing_set_is_database_error() {
        let db = Database::open_in_memory().unwrap();
        let mut tag = Tag::new("orphans");
        db.create_tag(&mut tag).unwrap();

        let result = db.add_tag_item(tag.id.unwrap(), 9999, 0);
        assert!(matches!(result, Err(LibraryError::Database(_))));
        assert!(db.tags_for_set(9999).unwrap().is_empty());
    }

    #[test]
    fn test_promote_to_album() {
        let db = Database::open_in_memory().unwrap();
        let mut tag = Tag::new("Holidays");
        db.create_tag(&mut tag).unwrap();

        db.set_tag_album(&tag.uuid, true).unwrap();
        assert!(db.get_tag_by_name("Holidays").unwrap().unwrap().is_album);
        assert!(db.set_tag_album("missing", true).is_err());
    }
}
