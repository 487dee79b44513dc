//! Diesel record structs for database tables.
//!
//! Records mirror table rows exactly (dates as RFC3339 TEXT, bools as
//! INTEGER, page sets as JSON TEXT) and convert to the domain models at
//! the repository boundary.

use diesel::prelude::*;
use std::path::PathBuf;

use crate::models::{
    Appearance, AppearanceContext, Completeness, EntityKind, Magazine, MagazineStatus, Page,
    TrickMention,
};
use crate::schema;

use super::parse_datetime;

/// Magazine record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::magazines)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MagazineRecord {
    pub id: String,
    pub title: String,
    pub volume: Option<String>,
    pub issue_number: Option<i32>,
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub status: String,
    pub completeness: String,
    pub pdf_path: String,
    pub pdf_sha256: String,
    pub cover_image_path: Option<String>,
    pub page_count: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl MagazineRecord {
    pub fn into_magazine(self) -> Magazine {
        Magazine {
            id: self.id,
            title: self.title,
            volume: self.volume,
            issue_number: self.issue_number,
            year: self.year,
            month: self.month,
            status: MagazineStatus::from_str(&self.status).unwrap_or(MagazineStatus::Pending),
            completeness: Completeness::from_str(&self.completeness)
                .unwrap_or(Completeness::Metadata),
            pdf_path: PathBuf::from(self.pdf_path),
            pdf_sha256: self.pdf_sha256,
            cover_image_path: self.cover_image_path,
            page_count: self.page_count,
            created_at: parse_datetime(&self.created_at),
            updated_at: parse_datetime(&self.updated_at),
        }
    }
}

/// New magazine for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::magazines)]
pub struct NewMagazine<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub volume: Option<&'a str>,
    pub issue_number: Option<i32>,
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub status: &'a str,
    pub completeness: &'a str,
    pub pdf_path: &'a str,
    pub pdf_sha256: &'a str,
    pub cover_image_path: Option<&'a str>,
    pub page_count: Option<i32>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Page record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::pages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PageRecord {
    pub id: i32,
    pub magazine_id: String,
    pub page_number: i32,
    pub image_path: String,
    pub image_width: i32,
    pub image_height: i32,
    pub ocr_text: Option<String>,
    pub created_at: String,
}

impl PageRecord {
    pub fn into_page(self) -> Page {
        Page {
            id: self.id as i64,
            magazine_id: self.magazine_id,
            page_number: self.page_number,
            image_path: self.image_path,
            image_width: self.image_width,
            image_height: self.image_height,
            ocr_text: self.ocr_text,
            created_at: parse_datetime(&self.created_at),
        }
    }
}

/// New page for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::pages)]
pub struct NewPage<'a> {
    pub magazine_id: &'a str,
    pub page_number: i32,
    pub image_path: &'a str,
    pub image_width: i32,
    pub image_height: i32,
    pub ocr_text: Option<&'a str>,
    pub created_at: &'a str,
}

/// Appearance record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::appearances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AppearanceRecord {
    pub id: i32,
    pub magazine_id: String,
    pub entity_type: String,
    pub entity_id: i32,
    pub page_numbers: String,
    pub context: String,
    pub confidence: f64,
    pub verified: i32,
    pub created_at: String,
}

impl AppearanceRecord {
    /// Convert to the domain model; `None` when the stored entity type
    /// is not a known kind.
    pub fn try_into_appearance(self) -> Option<Appearance> {
        let entity_type = EntityKind::from_str(&self.entity_type)?;
        Some(Appearance {
            id: self.id as i64,
            magazine_id: self.magazine_id,
            entity_type,
            entity_id: self.entity_id as i64,
            page_numbers: parse_page_numbers(&self.page_numbers),
            context: AppearanceContext::parse(&self.context),
            confidence: self.confidence,
            verified: self.verified != 0,
            created_at: parse_datetime(&self.created_at),
        })
    }
}

/// New appearance for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::appearances)]
pub struct NewAppearance<'a> {
    pub magazine_id: &'a str,
    pub entity_type: &'a str,
    pub entity_id: i32,
    pub page_numbers: &'a str,
    pub context: &'a str,
    pub confidence: f64,
    pub verified: i32,
    pub created_at: &'a str,
}

/// Trick mention record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::trick_mentions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TrickMentionRecord {
    pub id: i32,
    pub magazine_id: String,
    pub trick_id: i32,
    pub skater_id: Option<i32>,
    pub spot_id: Option<i32>,
    pub page_number: i32,
    pub created_at: String,
}

impl TrickMentionRecord {
    pub fn into_mention(self) -> TrickMention {
        TrickMention {
            id: self.id as i64,
            magazine_id: self.magazine_id,
            trick_id: self.trick_id as i64,
            skater_id: self.skater_id.map(|id| id as i64),
            spot_id: self.spot_id.map(|id| id as i64),
            page_number: self.page_number,
            created_at: parse_datetime(&self.created_at),
        }
    }
}

/// New trick mention for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::trick_mentions)]
pub struct NewTrickMention<'a> {
    pub magazine_id: &'a str,
    pub trick_id: i32,
    pub skater_id: Option<i32>,
    pub spot_id: Option<i32>,
    pub page_number: i32,
    pub created_at: &'a str,
}

/// Parse a stored JSON page-number array, tolerating legacy garbage.
pub fn parse_page_numbers(raw: &str) -> Vec<i32> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Serialize page numbers for storage: ascending, deduplicated JSON array.
pub fn encode_page_numbers(pages: &[i32]) -> String {
    let mut sorted: Vec<i32> = pages.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    serde_json::to_string(&sorted).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_numbers_round_trip() {
        assert_eq!(encode_page_numbers(&[3, 1, 2, 3]), "[1,2,3]");
        assert_eq!(parse_page_numbers("[1,2,3]"), vec![1, 2, 3]);
        assert_eq!(parse_page_numbers("not json"), Vec::<i32>::new());
        assert_eq!(encode_page_numbers(&[]), "[]");
    }
}
