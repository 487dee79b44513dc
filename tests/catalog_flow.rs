//! Catalog round-trip tests.
//!
//! Exercises the repository layer end to end over a temporary SQLite
//! database: import deduplication, page persistence, appearance rewrites,
//! and entity merges.

use std::path::PathBuf;

use tempfile::{tempdir, TempDir};

use gnarchive::dedupe::find_duplicates;
use gnarchive::models::{AppearanceContext, EntityAttrs, EntityKind, Magazine, MagazineStatus};
use gnarchive::pdf::RenderedPage;
use gnarchive::repository::{AppearanceDraft, DbContext, TrickMentionDraft, SCHEMA_VERSION};

async fn setup(dir: &TempDir) -> DbContext {
    let ctx = DbContext::new(&dir.path().join("catalog.db"), dir.path());
    ctx.init_schema().await.unwrap();
    ctx
}

fn magazine(id: &str, sha: &str) -> Magazine {
    let mut mag = Magazine::new(
        id.to_string(),
        "Thrasher".to_string(),
        PathBuf::from(format!("/scans/{}.pdf", id)),
        sha.to_string(),
    );
    mag.issue_number = Some(7);
    mag.year = Some(1988);
    mag
}

fn page(n: i32) -> RenderedPage {
    RenderedPage {
        page_number: n,
        rel_path: format!("mag-1/page-{:03}.png", n),
        width: 1275,
        height: 1650,
    }
}

#[tokio::test]
async fn test_init_stamps_schema_version() {
    let dir = tempdir().unwrap();
    let ctx = setup(&dir).await;

    let version = ctx.get_schema_version().await.unwrap();
    assert_eq!(version.as_deref(), Some(SCHEMA_VERSION));

    // Re-running init is harmless
    ctx.init_schema().await.unwrap();
    assert_eq!(ctx.magazines().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_import_dedupes_by_content_hash() {
    let dir = tempdir().unwrap();
    let ctx = setup(&dir).await;
    let magazines = ctx.magazines();

    magazines.save(&magazine("mag-1", "aabb01")).await.unwrap();

    let existing = magazines.get_by_sha256("aabb01").await.unwrap();
    assert_eq!(existing.map(|m| m.id), Some("mag-1".to_string()));
    assert!(magazines.get_by_sha256("ffff99").await.unwrap().is_none());
    assert_eq!(magazines.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_pages_and_cover_round_trip() {
    let dir = tempdir().unwrap();
    let ctx = setup(&dir).await;
    let magazines = ctx.magazines();

    magazines.save(&magazine("mag-1", "aabb02")).await.unwrap();
    let rendered = vec![page(1), page(2), page(3)];
    magazines.replace_pages("mag-1", &rendered).await.unwrap();
    magazines.set_page_count("mag-1", 3).await.unwrap();
    magazines
        .set_cover_image("mag-1", &rendered[0].rel_path)
        .await
        .unwrap();

    let mag = magazines.get("mag-1").await.unwrap().unwrap();
    assert_eq!(mag.page_count, Some(3));
    assert_eq!(mag.cover_image_path.as_deref(), Some("mag-1/page-001.png"));

    let pages = magazines.get_pages("mag-1").await.unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0].page_number, 1);
    assert_eq!(pages[2].page_number, 3);

    // A re-run replaces the previous render wholesale
    magazines
        .replace_pages("mag-1", &[page(1), page(2)])
        .await
        .unwrap();
    assert_eq!(magazines.count_pages("mag-1").await.unwrap(), 2);
}

#[tokio::test]
async fn test_extraction_persist_round_trip() {
    let dir = tempdir().unwrap();
    let ctx = setup(&dir).await;
    let magazines = ctx.magazines();
    let entities = ctx.entities();

    magazines.save(&magazine("mag-1", "aabb03")).await.unwrap();

    let skater = entities
        .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
        .await
        .unwrap();
    let spot = entities
        .get_or_create(EntityKind::Spot, "Embarcadero", &EntityAttrs::default())
        .await
        .unwrap();
    let trick = entities
        .get_or_create(EntityKind::Trick, "Wallride", &EntityAttrs::default())
        .await
        .unwrap();

    let drafts = vec![
        AppearanceDraft {
            entity_type: EntityKind::Skater,
            entity_id: skater,
            page_numbers: vec![4, 9],
            context: AppearanceContext::Photo,
            confidence: 0.7,
        },
        AppearanceDraft {
            entity_type: EntityKind::Spot,
            entity_id: spot,
            page_numbers: vec![9],
            context: AppearanceContext::Feature,
            confidence: 0.7,
        },
        AppearanceDraft {
            entity_type: EntityKind::Trick,
            entity_id: trick,
            page_numbers: vec![9],
            context: AppearanceContext::Photo,
            confidence: 0.7,
        },
    ];
    entities.replace_appearances("mag-1", &drafts).await.unwrap();
    entities
        .replace_trick_mentions(
            "mag-1",
            &[TrickMentionDraft {
                trick_id: trick,
                skater_id: Some(skater),
                spot_id: Some(spot),
                page_number: 9,
            }],
        )
        .await
        .unwrap();

    // Re-running the same persistence leaves one row per entity
    entities.replace_appearances("mag-1", &drafts).await.unwrap();

    let appearances = entities.appearances_for_magazine("mag-1").await.unwrap();
    assert_eq!(appearances.len(), 3);

    let counts = entities.appearance_counts("mag-1").await.unwrap();
    for (kind, count) in counts {
        assert_eq!(count, 1, "expected one {} appearance", kind.as_str());
    }

    let mentions = entities.mentions_for_magazine("mag-1").await.unwrap();
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].skater_id, Some(skater));
    assert_eq!(mentions[0].spot_id, Some(spot));
}

#[tokio::test]
async fn test_duplicate_scan_then_merge() {
    let dir = tempdir().unwrap();
    let ctx = setup(&dir).await;
    let magazines = ctx.magazines();
    let entities = ctx.entities();

    magazines.save(&magazine("mag-1", "aabb04")).await.unwrap();
    magazines.save(&magazine("mag-2", "aabb05")).await.unwrap();

    let winner = entities
        .get_or_create(EntityKind::Skater, "Tony Hawk", &EntityAttrs::default())
        .await
        .unwrap();
    let loser = entities
        .get_or_create(EntityKind::Skater, "tony hawk.", &EntityAttrs::default())
        .await
        .unwrap();

    entities
        .replace_appearances(
            "mag-1",
            &[AppearanceDraft {
                entity_type: EntityKind::Skater,
                entity_id: winner,
                page_numbers: vec![12],
                context: AppearanceContext::Interview,
                confidence: 0.7,
            }],
        )
        .await
        .unwrap();
    entities
        .replace_appearances(
            "mag-2",
            &[AppearanceDraft {
                entity_type: EntityKind::Skater,
                entity_id: loser,
                page_numbers: vec![30],
                context: AppearanceContext::Photo,
                confidence: 0.7,
            }],
        )
        .await
        .unwrap();

    let rows = entities.list(EntityKind::Skater).await.unwrap();
    let groups = find_duplicates(EntityKind::Skater, &rows, 0.7);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members.len(), 2);

    let outcome = entities
        .merge_entities(EntityKind::Skater, winner, &[loser])
        .await
        .unwrap();
    assert_eq!(outcome.appearances_moved, 1);
    assert_eq!(outcome.losers_deleted, 1);

    let rows = entities.list(EntityKind::Skater).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Tony Hawk");

    let moved = entities.appearances_for_magazine("mag-2").await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].entity_id, winner);
}

#[tokio::test]
async fn test_status_lifecycle() {
    let dir = tempdir().unwrap();
    let ctx = setup(&dir).await;
    let magazines = ctx.magazines();

    magazines.save(&magazine("mag-1", "aabb06")).await.unwrap();
    let mag = magazines.get("mag-1").await.unwrap().unwrap();
    assert_eq!(mag.status, MagazineStatus::Pending);

    for status in [
        MagazineStatus::Processing,
        MagazineStatus::Review,
        MagazineStatus::Published,
    ] {
        magazines.update_status("mag-1", status).await.unwrap();
        let mag = magazines.get("mag-1").await.unwrap().unwrap();
        assert_eq!(mag.status, status);
    }

    let published = magazines
        .list(Some(MagazineStatus::Published), None)
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
}
