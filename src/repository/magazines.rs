//! Magazine and page persistence.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{MagazineRecord, NewMagazine, NewPage, PageRecord};
use crate::models::{Completeness, Magazine, MagazineStatus, Page};
use crate::pdf::RenderedPage;
use crate::schema::{magazines, pages};

/// Repository for magazine catalog rows and their rendered pages.
#[derive(Clone)]
pub struct MagazineRepository {
    pool: AsyncSqlitePool,
}

impl MagazineRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Save a magazine, replacing any existing row with the same ID.
    pub async fn save(&self, magazine: &Magazine) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let pdf_path = magazine.pdf_path.display().to_string();
        let created_at = magazine.created_at.to_rfc3339();
        let updated_at = magazine.updated_at.to_rfc3339();

        let record = NewMagazine {
            id: &magazine.id,
            title: &magazine.title,
            volume: magazine.volume.as_deref(),
            issue_number: magazine.issue_number,
            year: magazine.year,
            month: magazine.month,
            status: magazine.status.as_str(),
            completeness: magazine.completeness.as_str(),
            pdf_path: &pdf_path,
            pdf_sha256: &magazine.pdf_sha256,
            cover_image_path: magazine.cover_image_path.as_deref(),
            page_count: magazine.page_count,
            created_at: &created_at,
            updated_at: &updated_at,
        };

        diesel::replace_into(magazines::table)
            .values(&record)
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Get a magazine by ID.
    pub async fn get(&self, id: &str) -> Result<Option<Magazine>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<MagazineRecord> = magazines::table
            .find(id)
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(MagazineRecord::into_magazine))
    }

    /// Find a magazine by its PDF content hash.
    pub async fn get_by_sha256(&self, sha256: &str) -> Result<Option<Magazine>, DieselError> {
        let mut conn = self.pool.get().await?;

        let record: Option<MagazineRecord> = magazines::table
            .filter(magazines::pdf_sha256.eq(sha256))
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(MagazineRecord::into_magazine))
    }

    /// List magazines, newest first, optionally filtered by status.
    pub async fn list(
        &self,
        status: Option<MagazineStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Magazine>, DieselError> {
        let mut conn = self.pool.get().await?;

        let mut query = magazines::table
            .order(magazines::created_at.desc())
            .into_boxed();

        if let Some(st) = status {
            query = query.filter(magazines::status.eq(st.as_str()));
        }
        if let Some(n) = limit {
            query = query.limit(n);
        }

        let records: Vec<MagazineRecord> = query.load(&mut conn).await?;
        Ok(records
            .into_iter()
            .map(MagazineRecord::into_magazine)
            .collect())
    }

    /// Count all magazines.
    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = magazines::table
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count as u64)
    }

    /// Update a magazine's pipeline status.
    pub async fn update_status(&self, id: &str, status: MagazineStatus) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let updated_at = Utc::now().to_rfc3339();
        diesel::update(magazines::table.find(id))
            .set((
                magazines::status.eq(status.as_str()),
                magazines::updated_at.eq(&updated_at),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Record the cover image path for a magazine.
    pub async fn set_cover_image(&self, id: &str, rel_path: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let updated_at = Utc::now().to_rfc3339();
        diesel::update(magazines::table.find(id))
            .set((
                magazines::cover_image_path.eq(rel_path),
                magazines::updated_at.eq(&updated_at),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Record the logical page count after rendering.
    ///
    /// A magazine with rendered pages is no longer metadata-only, so this
    /// also marks it fully ingested.
    pub async fn set_page_count(&self, id: &str, page_count: i32) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        let updated_at = Utc::now().to_rfc3339();
        diesel::update(magazines::table.find(id))
            .set((
                magazines::page_count.eq(page_count),
                magazines::completeness.eq(Completeness::Full.as_str()),
                magazines::updated_at.eq(&updated_at),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    // ========================================================================
    // Page Operations
    // ========================================================================

    /// Replace a magazine's page rows with a fresh render.
    ///
    /// Delete and insert happen in one transaction so a failed re-render
    /// never leaves a partial page set behind.
    pub async fn replace_pages(
        &self,
        magazine_id: &str,
        rendered: &[RenderedPage],
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = Utc::now().to_rfc3339();

        conn.transaction(|conn| {
            Box::pin(async move {
                diesel::delete(pages::table.filter(pages::magazine_id.eq(magazine_id)))
                    .execute(conn)
                    .await?;

                for page in rendered {
                    let record = NewPage {
                        magazine_id,
                        page_number: page.page_number,
                        image_path: &page.rel_path,
                        image_width: page.width as i32,
                        image_height: page.height as i32,
                        ocr_text: None,
                        created_at: &created_at,
                    };
                    diesel::insert_into(pages::table)
                        .values(&record)
                        .execute(conn)
                        .await?;
                }

                Ok(())
            })
        })
        .await
    }

    /// Get all pages of a magazine in page order.
    pub async fn get_pages(&self, magazine_id: &str) -> Result<Vec<Page>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<PageRecord> = pages::table
            .filter(pages::magazine_id.eq(magazine_id))
            .order(pages::page_number.asc())
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(PageRecord::into_page).collect())
    }

    /// Count stored pages for a magazine.
    pub async fn count_pages(&self, magazine_id: &str) -> Result<u32, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = pages::table
            .filter(pages::magazine_id.eq(magazine_id))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count as u32)
    }

    /// Store OCR output for a page.
    pub async fn set_page_ocr_text(&self, page_id: i64, text: &str) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::update(pages::table.find(page_id as i32))
            .set(pages::ocr_text.eq(text))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::context::DbContext;
    use std::path::PathBuf;
    use tempfile::tempdir;

    async fn setup_test_db() -> (AsyncSqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"), dir.path());
        ctx.init_schema().await.unwrap();
        (ctx.pool().clone(), dir)
    }

    fn sample_magazine(id: &str) -> Magazine {
        let mut mag = Magazine::new(
            id.to_string(),
            "Thrasher".to_string(),
            PathBuf::from("/archive/thrasher-04.pdf"),
            Magazine::compute_hash(id.as_bytes()),
        );
        mag.issue_number = Some(4);
        mag.year = Some(1987);
        mag
    }

    fn rendered(page_number: i32, width: u32, height: u32) -> RenderedPage {
        RenderedPage {
            page_number,
            rel_path: format!("mag-1/page-{:03}.png", page_number),
            width,
            height,
        }
    }

    #[tokio::test]
    async fn test_magazine_crud() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MagazineRepository::new(pool);

        let mag = sample_magazine("mag-1");
        repo.save(&mag).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        let fetched = repo.get("mag-1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Thrasher");
        assert_eq!(fetched.issue_number, Some(4));
        assert_eq!(fetched.status, MagazineStatus::Pending);
        assert_eq!(fetched.completeness, Completeness::Metadata);

        let by_hash = repo.get_by_sha256(&mag.pdf_sha256).await.unwrap().unwrap();
        assert_eq!(by_hash.id, "mag-1");

        assert!(repo.get("missing").await.unwrap().is_none());
        assert!(repo.get_by_sha256("0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_and_list_filter() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MagazineRepository::new(pool);

        repo.save(&sample_magazine("mag-1")).await.unwrap();
        repo.save(&sample_magazine("mag-2")).await.unwrap();

        repo.update_status("mag-1", MagazineStatus::Review)
            .await
            .unwrap();

        let in_review = repo
            .list(Some(MagazineStatus::Review), None)
            .await
            .unwrap();
        assert_eq!(in_review.len(), 1);
        assert_eq!(in_review[0].id, "mag-1");

        let all = repo.list(None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let limited = repo.list(None, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_set_page_count_marks_full() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MagazineRepository::new(pool);

        repo.save(&sample_magazine("mag-1")).await.unwrap();
        repo.set_page_count("mag-1", 96).await.unwrap();
        repo.set_cover_image("mag-1", "mag-1/page-001.png")
            .await
            .unwrap();

        let mag = repo.get("mag-1").await.unwrap().unwrap();
        assert_eq!(mag.page_count, Some(96));
        assert_eq!(mag.completeness, Completeness::Full);
        assert_eq!(mag.cover_image_path.as_deref(), Some("mag-1/page-001.png"));
    }

    #[tokio::test]
    async fn test_replace_pages_clears_previous_render() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MagazineRepository::new(pool);
        repo.save(&sample_magazine("mag-1")).await.unwrap();

        let first = vec![rendered(1, 1200, 1600), rendered(2, 1200, 1600)];
        repo.replace_pages("mag-1", &first).await.unwrap();
        assert_eq!(repo.count_pages("mag-1").await.unwrap(), 2);

        // Re-render yields a different page set; old rows must not survive
        let second = vec![
            rendered(1, 1200, 1600),
            rendered(2, 1200, 1600),
            rendered(3, 1200, 1600),
        ];
        repo.replace_pages("mag-1", &second).await.unwrap();

        let pages = repo.get_pages("mag-1").await.unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(pages.iter().all(|p| p.ocr_text.is_none()));
    }

    #[tokio::test]
    async fn test_set_page_ocr_text() {
        let (pool, _dir) = setup_test_db().await;
        let repo = MagazineRepository::new(pool);
        repo.save(&sample_magazine("mag-1")).await.unwrap();

        repo.replace_pages("mag-1", &[rendered(1, 1200, 1600)])
            .await
            .unwrap();

        let pages = repo.get_pages("mag-1").await.unwrap();
        repo.set_page_ocr_text(pages[0].id, "STREET ISSUE")
            .await
            .unwrap();

        let pages = repo.get_pages("mag-1").await.unwrap();
        assert_eq!(pages[0].ocr_text.as_deref(), Some("STREET ISSUE"));
    }
}
