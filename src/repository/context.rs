//! Database context managing connections and repository access.
//!
//! Create one context per command or service, then use it to reach the
//! repositories.

use std::path::{Path, PathBuf};

use diesel::prelude::*;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};

use super::entities::EntityRepository;
use super::magazines::MagazineRepository;
use super::pool::{AsyncSqlitePool, DieselError};
use crate::schema::meta;

/// Version stamped into the `meta` table by `init_schema`.
pub const SCHEMA_VERSION: &str = "1";

/// Database context over the async SQLite pool.
#[derive(Clone)]
pub struct DbContext {
    pool: AsyncSqlitePool,
    pages_dir: PathBuf,
}

impl DbContext {
    /// Create a new database context from a file path.
    pub fn new(db_path: &Path, pages_dir: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
            pages_dir: pages_dir.to_path_buf(),
        }
    }

    /// Create a new database context from a database URL
    /// (`sqlite:path/to/db.sqlite` or a bare file path).
    pub fn from_url(database_url: &str, pages_dir: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::new(database_url),
            pages_dir: pages_dir.to_path_buf(),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    /// Root directory holding rendered page images.
    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    /// Get a magazine repository (magazines and their pages).
    pub fn magazines(&self) -> MagazineRepository {
        MagazineRepository::new(self.pool.clone())
    }

    /// Get an entity repository (entity tables, appearances, mentions).
    pub fn entities(&self) -> EntityRepository {
        EntityRepository::new(self.pool.clone())
    }

    /// Initialize the database schema.
    ///
    /// Creates all tables and indexes if they don't exist and stamps the
    /// schema version.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        conn.batch_execute(
            r#"
            -- Magazines table
            CREATE TABLE IF NOT EXISTS magazines (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                volume TEXT,
                issue_number INTEGER,
                year INTEGER,
                month INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                completeness TEXT NOT NULL DEFAULT 'metadata',
                pdf_path TEXT NOT NULL,
                pdf_sha256 TEXT NOT NULL,
                cover_image_path TEXT,
                page_count INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Rendered logical pages
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                magazine_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                image_path TEXT NOT NULL,
                image_width INTEGER NOT NULL,
                image_height INTEGER NOT NULL,
                ocr_text TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(magazine_id, page_number),
                FOREIGN KEY (magazine_id) REFERENCES magazines(id)
            );

            -- Entity tables; name is the exact get-or-create key
            CREATE TABLE IF NOT EXISTS skaters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS spots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                city TEXT,
                state TEXT,
                spot_type TEXT,
                address TEXT,
                location_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (location_id) REFERENCES locations(id)
            );

            CREATE TABLE IF NOT EXISTS photographers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS brands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                category TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tricks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                event_date TEXT,
                location TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                location_type TEXT,
                city TEXT,
                state TEXT,
                country TEXT,
                created_at TEXT NOT NULL
            );

            -- Entity sightings per magazine; one row per entity per issue
            CREATE TABLE IF NOT EXISTS appearances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                magazine_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                page_numbers TEXT NOT NULL DEFAULT '[]',
                context TEXT NOT NULL DEFAULT 'mention',
                confidence REAL NOT NULL DEFAULT 0,
                verified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(magazine_id, entity_type, entity_id),
                FOREIGN KEY (magazine_id) REFERENCES magazines(id)
            );

            -- Trick/skater/spot joins, page-scoped
            CREATE TABLE IF NOT EXISTS trick_mentions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                magazine_id TEXT NOT NULL,
                trick_id INTEGER NOT NULL,
                skater_id INTEGER,
                spot_id INTEGER,
                page_number INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (magazine_id) REFERENCES magazines(id),
                FOREIGN KEY (trick_id) REFERENCES tricks(id)
            );

            -- Key/value metadata
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_pages_magazine ON pages(magazine_id);
            CREATE INDEX IF NOT EXISTS idx_magazines_sha256 ON magazines(pdf_sha256);
            CREATE INDEX IF NOT EXISTS idx_appearances_magazine ON appearances(magazine_id);
            CREATE INDEX IF NOT EXISTS idx_appearances_entity ON appearances(entity_type, entity_id);
            CREATE INDEX IF NOT EXISTS idx_trick_mentions_magazine ON trick_mentions(magazine_id);
            CREATE INDEX IF NOT EXISTS idx_trick_mentions_trick ON trick_mentions(trick_id);
            "#,
        )
        .await?;

        diesel::insert_or_ignore_into(meta::table)
            .values((meta::key.eq("schema_version"), meta::value.eq(SCHEMA_VERSION)))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Read the stamped schema version, if the database was initialized.
    pub async fn get_schema_version(&self) -> Result<Option<String>, DieselError> {
        let mut conn = self.pool.get().await?;
        meta::table
            .filter(meta::key.eq("schema_version"))
            .select(meta::value)
            .first::<String>(&mut conn)
            .await
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"), dir.path());

        ctx.init_schema().await.unwrap();
        ctx.init_schema().await.unwrap();

        let version = ctx.get_schema_version().await.unwrap();
        assert_eq!(version.as_deref(), Some(SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn test_schema_version_absent_before_init() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("fresh.db"), dir.path());

        // meta table does not exist yet; treat as uninitialized
        assert!(ctx.get_schema_version().await.is_err());
    }
}
