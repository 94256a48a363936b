//! Filtered, ordered and paged reads over photo sets.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::photos::{row_to_photoset, PHOTOSET_COLUMNS};
use super::records::{format_date, PhotoSet, Status};
use super::Database;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    /// Newest first, as the feed shows them.
    #[default]
    Descending,
    Ascending,
}

/// Inclusive latitude/longitude box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// A query over photo sets. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct PhotoSetQuery {
    /// Inclusive lower bound on the effective date.
    pub date_from: Option<NaiveDateTime>,
    /// Exclusive upper bound on the effective date.
    pub date_to: Option<NaiveDateTime>,
    /// Tag uuid.
    pub tag: Option<String>,
    pub bounds: Option<GeoBounds>,
    /// Only sets with a known location.
    pub with_gps: bool,
    pub statuses: Vec<Status>,
    pub order: DateOrder,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl PhotoSetQuery {
    /// Sets shot on a single calendar day.
    pub fn for_day(day: chrono::NaiveDate) -> Self {
        let start = day.and_hms_opt(0, 0, 0).unwrap_or_default();
        Self {
            date_from: Some(start),
            date_to: Some(start + chrono::Duration::days(1)),
            order: DateOrder::Ascending,
            ..Default::default()
        }
    }

    /// Page `page` (0-based) of `page_size` sets.
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.limit = Some(page_size);
        self.offset = page.saturating_mul(page_size);
        self
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut sql = String::from(" WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref from) = self.date_from {
            sql.push_str(" AND s.date >= ?");
            params.push(Box::new(format_date(from)));
        }
        if let Some(ref to) = self.date_to {
            sql.push_str(" AND s.date < ?");
            params.push(Box::new(format_date(to)));
        }

        if let Some(ref tag) = self.tag {
            sql.push_str(
                " AND s.id IN (SELECT ti.set_id FROM tag_items ti JOIN tags t ON t.id = ti.tag_id WHERE t.uuid = ?)",
            );
            params.push(Box::new(tag.clone()));
        }

        if self.with_gps || self.bounds.is_some() {
            sql.push_str(" AND NOT (s.lat = 0 AND s.lon = 0)");
        }
        if let Some(bounds) = self.bounds {
            sql.push_str(" AND s.lat BETWEEN ? AND ? AND s.lon BETWEEN ? AND ?");
            params.push(Box::new(bounds.min_lat));
            params.push(Box::new(bounds.max_lat));
            params.push(Box::new(bounds.min_lon));
            params.push(Box::new(bounds.max_lon));
        }

        if !self.statuses.is_empty() {
            let placeholders: Vec<&str> = self.statuses.iter().map(|_| "?").collect();
            sql.push_str(&format!(" AND s.status IN ({})", placeholders.join(",")));
            for status in &self.statuses {
                params.push(Box::new(status.as_str()));
            }
        }

        (sql, params)
    }
}

/// Number of sets shot on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateGroup {
    /// `YYYY-MM-DD`
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub year: i32,
    pub month: u32,
    pub count: i64,
}

impl Database {
    /// Run a query, returning matching sets with their photos loaded.
    pub fn query_photosets(&self, query: &PhotoSetQuery) -> Result<Vec<PhotoSet>> {
        let (where_sql, params) = query.where_clause();
        let mut sql = format!("SELECT {} FROM photosets s{}", PHOTOSET_COLUMNS, where_sql);

        sql.push_str(match query.order {
            DateOrder::Descending => " ORDER BY s.date DESC, s.id DESC",
            DateOrder::Ascending => " ORDER BY s.date ASC, s.id ASC",
        });
        // SQLite needs a LIMIT before an OFFSET; -1 means unbounded.
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            query.limit.map(|l| l as i64).unwrap_or(-1),
            query.offset
        ));

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut sets = stmt
            .query_map(param_refs.as_slice(), row_to_photoset)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for set in &mut sets {
            if let Some(id) = set.id {
                set.photos = self.photos_for_set(id)?;
            }
        }
        Ok(sets)
    }

    /// Total matches for a query, ignoring its paging.
    pub fn count_photosets(&self, query: &PhotoSetQuery) -> Result<i64> {
        let (where_sql, params) = query.where_clause();
        let sql = format!("SELECT COUNT(*) FROM photosets s{}", where_sql);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Ok(self
            .conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))?)
    }

    /// Per-day set counts, newest year first, days ascending within it.
    pub fn date_groups(&self) -> Result<Vec<DateGroup>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT substr(date, 1, 10) AS day, COUNT(*)
            FROM photosets
            GROUP BY day
            ORDER BY substr(day, 1, 4) DESC, day ASC
            "#,
        )?;
        let groups = stmt
            .query_map([], |row| {
                Ok(DateGroup {
                    day: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// Per-month set counts, newest first.
    pub fn monthly_counts(&self) -> Result<Vec<MonthCount>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT CAST(substr(date, 1, 4) AS INTEGER) AS year,
                   CAST(substr(date, 6, 2) AS INTEGER) AS month,
                   COUNT(*)
            FROM photosets
            GROUP BY year, month
            ORDER BY year DESC, month DESC
            "#,
        )?;
        let months = stmt
            .query_map([], |row| {
                Ok(MonthCount {
                    year: row.get(0)?,
                    month: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::records::{Photo, Tag};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn insert(db: &Database, date: NaiveDateTime, gps: Option<(f64, f64)>, hash: &str) -> PhotoSet {
        let photo = Photo::new(PathBuf::from(format!("{}.jpg", hash)), hash.into(), "image/jpeg".into(), 10);
        let mut set = PhotoSet::new(date, gps, vec![photo]);
        db.insert_photoset(&mut set).unwrap();
        set
    }

    fn seeded() -> (Database, Vec<PhotoSet>) {
        let db = Database::open_in_memory().unwrap();
        let sets = vec![
            insert(&db, at(2018, 3, 31, 10), Some((40.0, -74.0)), "a"),
            insert(&db, at(2018, 3, 31, 12), None, "b"),
            insert(&db, at(2018, 4, 2, 9), Some((51.5, -0.1)), "c"),
            insert(&db, at(2019, 1, 1, 0), None, "d"),
        ];
        (db, sets)
    }

    #[test]
    fn test_default_query_newest_first() {
        let (db, sets) = seeded();
        let result = db.query_photosets(&PhotoSetQuery::default()).unwrap();
        let uuids: Vec<&str> = result.iter().map(|s| s.uuid.as_str()).collect();
        let expected: Vec<&str> = [3, 2, 1, 0].iter().map(|&i| sets[i].uuid.as_str()).collect();
        assert_eq!(uuids, expected);
        assert_eq!(result[0].photos.len(), 1);
    }

    #[test]
    fn test_day_filter_and_paging() {
        let (db, sets) = seeded();
        let day = PhotoSetQuery::for_day(NaiveDate::from_ymd_opt(2018, 3, 31).unwrap());
        assert_eq!(db.count_photosets(&day).unwrap(), 2);

        let first_page = db.query_photosets(&day.clone().page(0, 1)).unwrap();
        assert_eq!(first_page.len(), 1);
        assert_eq!(first_page[0].uuid, sets[0].uuid);

        let second_page = db.query_photosets(&day.page(1, 1)).unwrap();
        assert_eq!(second_page[0].uuid, sets[1].uuid);
    }

    #[test]
    fn test_page_offset_saturates() {
        let query = PhotoSetQuery::default().page(u32::MAX, 2);
        assert_eq!(query.offset, u32::MAX);
        assert_eq!(query.limit, Some(2));

        let (db, _) = seeded();
        assert!(db.query_photosets(&query).unwrap().is_empty());
    }

    #[test]
    fn test_geo_bounds_excludes_unknown_location() {
        let (db, sets) = seeded();
        let query = PhotoSetQuery {
            bounds: Some(GeoBounds {
                min_lat: 30.0,
                max_lat: 45.0,
                min_lon: -80.0,
                max_lon: -70.0,
            }),
            ..Default::default()
        };
        let result = db.query_photosets(&query).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].uuid, sets[0].uuid);

        let located = PhotoSetQuery {
            with_gps: true,
            ..Default::default()
        };
        assert_eq!(db.count_photosets(&located).unwrap(), 2);
    }

    #[test]
    fn test_tag_and_status_filters() {
        let (db, sets) = seeded();
        let mut tag = Tag::new("trip");
        db.create_tag(&mut tag).unwrap();
        db.add_tag_item(tag.id.unwrap(), sets[2].id.unwrap(), 0).unwrap();
        db.set_status(&sets[3].uuid, Status::Public).unwrap();

        let tagged = PhotoSetQuery {
            tag: Some(tag.uuid.clone()),
            ..Default::default()
        };
        let result = db.query_photosets(&tagged).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].uuid, sets[2].uuid);

        let public = PhotoSetQuery {
            statuses: vec![Status::Public],
            ..Default::default()
        };
        assert_eq!(db.count_photosets(&public).unwrap(), 1);
    }

    #[test]
    fn test_aggregates() {
        let (db, _) = seeded();
        let groups = db.date_groups().unwrap();
        assert_eq!(
            groups,
            vec![
                DateGroup { day: "2019-01-01".into(), count: 1 },
                DateGroup { day: "2018-03-31".into(), count: 2 },
                DateGroup { day: "2018-04-02".into(), count: 1 },
            ]
        );

        let months = db.monthly_counts().unwrap();
        assert_eq!(months[0], MonthCount { year: 2019, month: 1, count: 1 });
        assert_eq!(months[1], MonthCount { year: 2018, month: 4, count: 1 });
        assert_eq!(months[2], MonthCount { year: 2018, month: 3, count: 2 });
    }
}
