pub const SCHEMA: &str = r#"
-- Photo sets: one capture event
CREATE TABLE IF NOT EXISTS photosets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    date TEXT NOT NULL,          -- date_real + date_offset minutes
    date_real TEXT NOT NULL,     -- as extracted at ingestion
    date_offset INTEGER NOT NULL DEFAULT 0,
    lat REAL NOT NULL DEFAULT 0,
    lon REAL NOT NULL DEFAULT 0,
    title TEXT,
    description TEXT,
    slug TEXT,
    status TEXT NOT NULL DEFAULT 'private'  -- 'private', 'public', 'hidden'
);

CREATE INDEX IF NOT EXISTS idx_photosets_date ON photosets(date);
CREATE INDEX IF NOT EXISTS idx_photosets_status ON photosets(status);

-- Photos: one physical file in the library
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    set_id INTEGER NOT NULL,
    uuid TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL,
    width INTEGER NOT NULL DEFAULT 0,
    height INTEGER NOT NULL DEFAULT 0,
    orientation INTEGER NOT NULL DEFAULT 0,  -- quarter turns, 0-3
    hash TEXT NOT NULL UNIQUE,               -- sha256 hex, dedup key
    path TEXT NOT NULL,                      -- relative to library root
    format TEXT NOT NULL,                    -- mime type
    FOREIGN KEY (set_id) REFERENCES photosets(id)
);

CREATE INDEX IF NOT EXISTS idx_photos_set ON photos(set_id);

-- Tags and albums
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    title TEXT,
    description TEXT,
    is_album INTEGER NOT NULL DEFAULT 0
);

-- Tag to photo set mapping
CREATE TABLE IF NOT EXISTS tag_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_id INTEGER NOT NULL,
    set_id INTEGER NOT NULL,
    "order" INTEGER NOT NULL DEFAULT 0,
    UNIQUE (tag_id, set_id),
    FOREIGN KEY (tag_id) REFERENCES tags(id),
    FOREIGN KEY (set_id) REFERENCES photosets(id)
);

CREATE INDEX IF NOT EXISTS idx_tag_items_set ON tag_items(set_id);
"#;
