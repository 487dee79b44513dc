//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! against the SQLite catalog database.

pub mod context;
pub mod entities;
pub mod magazines;
pub mod pool;
pub mod records;

pub use context::{DbContext, SCHEMA_VERSION};
pub use entities::{AppearanceDraft, EntityRepository, MergeOutcome, TrickMentionDraft};
pub use magazines::MagazineRepository;
pub use pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
