//! Entity, appearance, and trick-mention persistence.
//!
//! The seven entity tables share a get-or-create contract keyed on the
//! exact name, so re-running extraction never duplicates an entity.
//! Appearances are unique per (magazine, entity type, entity id); the
//! merge operation folds colliding rows instead of violating that.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::pool::{to_diesel_error, AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::records::{
    encode_page_numbers, parse_page_numbers, AppearanceRecord, NewAppearance, NewTrickMention,
    TrickMentionRecord,
};
use super::parse_datetime;
use crate::models::{
    Appearance, AppearanceContext, EntityAttrs, EntityKind, EntityRow, TrickMention,
};
use crate::schema::{
    appearances, brands, events, locations, photographers, skaters, spots, trick_mentions, tricks,
};

/// An appearance produced by extraction, before it has a row ID.
#[derive(Debug, Clone)]
pub struct AppearanceDraft {
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub page_numbers: Vec<i32>,
    pub context: AppearanceContext,
    pub confidence: f64,
}

/// A trick mention produced by extraction, before it has a row ID.
#[derive(Debug, Clone)]
pub struct TrickMentionDraft {
    pub trick_id: i64,
    pub skater_id: Option<i64>,
    pub spot_id: Option<i64>,
    pub page_number: i32,
}

/// What a merge rewrote, for display.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOutcome {
    /// Appearance rows repointed at the winner.
    pub appearances_moved: usize,
    /// Appearance rows folded into an existing winner row.
    pub appearances_folded: usize,
    /// Trick mention columns repointed at the winner.
    pub mentions_rewritten: usize,
    /// Spots relinked to a winning location.
    pub spots_relinked: usize,
    /// Loser entity rows deleted.
    pub losers_deleted: usize,
}

/// Repository over the entity tables, appearances, and trick mentions.
#[derive(Clone)]
pub struct EntityRepository {
    pool: AsyncSqlitePool,
}

fn entity_row(kind: EntityKind, id: i32, name: String, attrs: EntityAttrs, created_at: String) -> EntityRow {
    EntityRow {
        id: id as i64,
        kind,
        name,
        attrs,
        created_at: parse_datetime(&created_at),
    }
}

impl EntityRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Get an entity's ID by exact name, inserting it first if absent.
    ///
    /// INSERT OR IGNORE against the unique name column followed by a
    /// SELECT, so concurrent callers converge on one row. When the entity
    /// already exists, incoming attributes fill NULL columns but never
    /// overwrite stored values.
    pub async fn get_or_create(
        &self,
        kind: EntityKind,
        name: &str,
        attrs: &EntityAttrs,
    ) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = Utc::now().to_rfc3339();

        let id: i32 = match kind {
            EntityKind::Skater => {
                diesel::insert_or_ignore_into(skaters::table)
                    .values((skaters::name.eq(name), skaters::created_at.eq(&created_at)))
                    .execute(&mut conn)
                    .await?;
                skaters::table
                    .filter(skaters::name.eq(name))
                    .select(skaters::id)
                    .first(&mut conn)
                    .await?
            }
            EntityKind::Spot => {
                diesel::insert_or_ignore_into(spots::table)
                    .values((
                        spots::name.eq(name),
                        spots::city.eq(attrs.city.as_deref()),
                        spots::state.eq(attrs.state.as_deref()),
                        spots::spot_type.eq(attrs.spot_type.as_deref()),
                        spots::address.eq(attrs.address.as_deref()),
                        spots::created_at.eq(&created_at),
                    ))
                    .execute(&mut conn)
                    .await?;
                spots::table
                    .filter(spots::name.eq(name))
                    .select(spots::id)
                    .first(&mut conn)
                    .await?
            }
            EntityKind::Photographer => {
                diesel::insert_or_ignore_into(photographers::table)
                    .values((
                        photographers::name.eq(name),
                        photographers::created_at.eq(&created_at),
                    ))
                    .execute(&mut conn)
                    .await?;
                photographers::table
                    .filter(photographers::name.eq(name))
                    .select(photographers::id)
                    .first(&mut conn)
                    .await?
            }
            EntityKind::Brand => {
                diesel::insert_or_ignore_into(brands::table)
                    .values((
                        brands::name.eq(name),
                        brands::category.eq(attrs.category.as_deref()),
                        brands::created_at.eq(&created_at),
                    ))
                    .execute(&mut conn)
                    .await?;
                brands::table
                    .filter(brands::name.eq(name))
                    .select(brands::id)
                    .first(&mut conn)
                    .await?
            }
            EntityKind::Trick => {
                diesel::insert_or_ignore_into(tricks::table)
                    .values((tricks::name.eq(name), tricks::created_at.eq(&created_at)))
                    .execute(&mut conn)
                    .await?;
                tricks::table
                    .filter(tricks::name.eq(name))
                    .select(tricks::id)
                    .first(&mut conn)
                    .await?
            }
            EntityKind::Event => {
                diesel::insert_or_ignore_into(events::table)
                    .values((
                        events::name.eq(name),
                        events::event_date.eq(attrs.event_date.as_deref()),
                        events::location.eq(attrs.event_location.as_deref()),
                        events::created_at.eq(&created_at),
                    ))
                    .execute(&mut conn)
                    .await?;
                events::table
                    .filter(events::name.eq(name))
                    .select(events::id)
                    .first(&mut conn)
                    .await?
            }
            EntityKind::Location => {
                diesel::insert_or_ignore_into(locations::table)
                    .values((
                        locations::name.eq(name),
                        locations::location_type.eq(attrs.location_type.as_deref()),
                        locations::city.eq(attrs.city.as_deref()),
                        locations::state.eq(attrs.state.as_deref()),
                        locations::country.eq(attrs.country.as_deref()),
                        locations::created_at.eq(&created_at),
                    ))
                    .execute(&mut conn)
                    .await?;
                locations::table
                    .filter(locations::name.eq(name))
                    .select(locations::id)
                    .first(&mut conn)
                    .await?
            }
        };

        if !attrs.is_empty() {
            self.fill_missing_attrs(&mut conn, kind, id, attrs).await?;
        }

        Ok(id as i64)
    }

    /// Fill NULL attribute columns on an existing row from a new sighting.
    async fn fill_missing_attrs(
        &self,
        conn: &mut AsyncSqliteConnection,
        kind: EntityKind,
        id: i32,
        incoming: &EntityAttrs,
    ) -> Result<(), DieselError> {
        match kind {
            EntityKind::Spot => {
                let (city, state, spot_type, address): (
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                ) = spots::table
                    .find(id)
                    .select((spots::city, spots::state, spots::spot_type, spots::address))
                    .first(&mut *conn)
                    .await?;

                let mut merged = EntityAttrs {
                    city,
                    state,
                    spot_type,
                    address,
                    ..Default::default()
                };
                let before = merged.clone();
                merged.fill_from(incoming);
                if merged != before {
                    diesel::update(spots::table.find(id))
                        .set((
                            spots::city.eq(merged.city.as_deref()),
                            spots::state.eq(merged.state.as_deref()),
                            spots::spot_type.eq(merged.spot_type.as_deref()),
                            spots::address.eq(merged.address.as_deref()),
                        ))
                        .execute(&mut *conn)
                        .await?;
                }
            }
            EntityKind::Brand => {
                let category: Option<String> = brands::table
                    .find(id)
                    .select(brands::category)
                    .first(&mut *conn)
                    .await?;

                if category.is_none() && incoming.category.is_some() {
                    diesel::update(brands::table.find(id))
                        .set(brands::category.eq(incoming.category.as_deref()))
                        .execute(&mut *conn)
                        .await?;
                }
            }
            EntityKind::Event => {
                let (event_date, location): (Option<String>, Option<String>) = events::table
                    .find(id)
                    .select((events::event_date, events::location))
                    .first(&mut *conn)
                    .await?;

                let mut merged = EntityAttrs {
                    event_date,
                    event_location: location,
                    ..Default::default()
                };
                let before = merged.clone();
                merged.fill_from(incoming);
                if merged != before {
                    diesel::update(events::table.find(id))
                        .set((
                            events::event_date.eq(merged.event_date.as_deref()),
                            events::location.eq(merged.event_location.as_deref()),
                        ))
                        .execute(&mut *conn)
                        .await?;
                }
            }
            EntityKind::Location => {
                let (location_type, city, state, country): (
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                ) = locations::table
                    .find(id)
                    .select((
                        locations::location_type,
                        locations::city,
                        locations::state,
                        locations::country,
                    ))
                    .first(&mut *conn)
                    .await?;

                let mut merged = EntityAttrs {
                    location_type,
                    city,
                    state,
                    country,
                    ..Default::default()
                };
                let before = merged.clone();
                merged.fill_from(incoming);
                if merged != before {
                    diesel::update(locations::table.find(id))
                        .set((
                            locations::location_type.eq(merged.location_type.as_deref()),
                            locations::city.eq(merged.city.as_deref()),
                            locations::state.eq(merged.state.as_deref()),
                            locations::country.eq(merged.country.as_deref()),
                        ))
                        .execute(&mut *conn)
                        .await?;
                }
            }
            // Name-only kinds carry no attribute columns
            EntityKind::Skater | EntityKind::Photographer | EntityKind::Trick => {}
        }

        Ok(())
    }

    /// Get one entity by ID.
    pub async fn get(&self, kind: EntityKind, id: i64) -> Result<Option<EntityRow>, DieselError> {
        let mut conn = self.pool.get().await?;
        let id = id as i32;

        let row = match kind {
            EntityKind::Skater => skaters::table
                .find(id)
                .select((skaters::id, skaters::name, skaters::created_at))
                .first::<(i32, String, String)>(&mut conn)
                .await
                .optional()?
                .map(|(id, name, created_at)| {
                    entity_row(kind, id, name, EntityAttrs::default(), created_at)
                }),
            EntityKind::Photographer => photographers::table
                .find(id)
                .select((
                    photographers::id,
                    photographers::name,
                    photographers::created_at,
                ))
                .first::<(i32, String, String)>(&mut conn)
                .await
                .optional()?
                .map(|(id, name, created_at)| {
                    entity_row(kind, id, name, EntityAttrs::default(), created_at)
                }),
            EntityKind::Trick => tricks::table
                .find(id)
                .select((tricks::id, tricks::name, tricks::created_at))
                .first::<(i32, String, String)>(&mut conn)
                .await
                .optional()?
                .map(|(id, name, created_at)| {
                    entity_row(kind, id, name, EntityAttrs::default(), created_at)
                }),
            EntityKind::Spot => spots::table
                .find(id)
                .select((
                    spots::id,
                    spots::name,
                    spots::city,
                    spots::state,
                    spots::spot_type,
                    spots::address,
                    spots::created_at,
                ))
                .first::<SpotTuple>(&mut conn)
                .await
                .optional()?
                .map(spot_tuple_to_row),
            EntityKind::Brand => brands::table
                .find(id)
                .select((brands::id, brands::name, brands::category, brands::created_at))
                .first::<BrandTuple>(&mut conn)
                .await
                .optional()?
                .map(brand_tuple_to_row),
            EntityKind::Event => events::table
                .find(id)
                .select((
                    events::id,
                    events::name,
                    events::event_date,
                    events::location,
                    events::created_at,
                ))
                .first::<EventTuple>(&mut conn)
                .await
                .optional()?
                .map(event_tuple_to_row),
            EntityKind::Location => locations::table
                .find(id)
                .select((
                    locations::id,
                    locations::name,
                    locations::location_type,
                    locations::city,
                    locations::state,
                    locations::country,
                    locations::created_at,
                ))
                .first::<LocationTuple>(&mut conn)
                .await
                .optional()?
                .map(location_tuple_to_row),
        };

        Ok(row)
    }

    /// List all entities of a kind, ordered by name.
    pub async fn list(&self, kind: EntityKind) -> Result<Vec<EntityRow>, DieselError> {
        let mut conn = self.pool.get().await?;

        let rows = match kind {
            EntityKind::Skater => skaters::table
                .order(skaters::name.asc())
                .select((skaters::id, skaters::name, skaters::created_at))
                .load::<(i32, String, String)>(&mut conn)
                .await?
                .into_iter()
                .map(|(id, name, created_at)| {
                    entity_row(kind, id, name, EntityAttrs::default(), created_at)
                })
                .collect(),
            EntityKind::Photographer => photographers::table
                .order(photographers::name.asc())
                .select((
                    photographers::id,
                    photographers::name,
                    photographers::created_at,
                ))
                .load::<(i32, String, String)>(&mut conn)
                .await?
                .into_iter()
                .map(|(id, name, created_at)| {
                    entity_row(kind, id, name, EntityAttrs::default(), created_at)
                })
                .collect(),
            EntityKind::Trick => tricks::table
                .order(tricks::name.asc())
                .select((tricks::id, tricks::name, tricks::created_at))
                .load::<(i32, String, String)>(&mut conn)
                .await?
                .into_iter()
                .map(|(id, name, created_at)| {
                    entity_row(kind, id, name, EntityAttrs::default(), created_at)
                })
                .collect(),
            EntityKind::Spot => spots::table
                .order(spots::name.asc())
                .select((
                    spots::id,
                    spots::name,
                    spots::city,
                    spots::state,
                    spots::spot_type,
                    spots::address,
                    spots::created_at,
                ))
                .load::<SpotTuple>(&mut conn)
                .await?
                .into_iter()
                .map(spot_tuple_to_row)
                .collect(),
            EntityKind::Brand => brands::table
                .order(brands::name.asc())
                .select((brands::id, brands::name, brands::category, brands::created_at))
                .load::<BrandTuple>(&mut conn)
                .await?
                .into_iter()
                .map(brand_tuple_to_row)
                .collect(),
            EntityKind::Event => events::table
                .order(events::name.asc())
                .select((
                    events::id,
                    events::name,
                    events::event_date,
                    events::location,
                    events::created_at,
                ))
                .load::<EventTuple>(&mut conn)
                .await?
                .into_iter()
                .map(event_tuple_to_row)
                .collect(),
            EntityKind::Location => locations::table
                .order(locations::name.asc())
                .select((
                    locations::id,
                    locations::name,
                    locations::location_type,
                    locations::city,
                    locations::state,
                    locations::country,
                    locations::created_at,
                ))
                .load::<LocationTuple>(&mut conn)
                .await?
                .into_iter()
                .map(location_tuple_to_row)
                .collect(),
        };

        Ok(rows)
    }

    /// Merge losers into a winner, rewriting every referencing row.
    ///
    /// Appearance rows that would collide with an existing winner row for
    /// the same magazine are folded: page-number union, max confidence,
    /// verified if either side was. Trick mention columns and
    /// `spots.location_id` are repointed, then the losers are deleted.
    /// Everything happens in one transaction.
    pub async fn merge_entities(
        &self,
        kind: EntityKind,
        winner_id: i64,
        loser_ids: &[i64],
    ) -> Result<MergeOutcome, DieselError> {
        if loser_ids.contains(&winner_id) {
            return Err(to_diesel_error("merge winner cannot be among the losers"));
        }
        if self.get(kind, winner_id).await?.is_none() {
            return Err(to_diesel_error(format!(
                "no {} with id {}",
                kind.as_str(),
                winner_id
            )));
        }

        let mut conn = self.pool.get().await?;
        let kind_str = kind.as_str();
        let winner = winner_id as i32;
        let losers: Vec<i32> = loser_ids.iter().map(|&id| id as i32).collect();

        conn.transaction(|conn| {
            Box::pin(async move {
                let mut outcome = MergeOutcome::default();

                let loser_rows: Vec<AppearanceRecord> = appearances::table
                    .filter(appearances::entity_type.eq(kind_str))
                    .filter(appearances::entity_id.eq_any(&losers))
                    .load(conn)
                    .await?;

                for loser_row in loser_rows {
                    let winner_row: Option<AppearanceRecord> = appearances::table
                        .filter(appearances::magazine_id.eq(&loser_row.magazine_id))
                        .filter(appearances::entity_type.eq(kind_str))
                        .filter(appearances::entity_id.eq(winner))
                        .first(conn)
                        .await
                        .optional()?;

                    match winner_row {
                        Some(existing) => {
                            let mut pages = parse_page_numbers(&existing.page_numbers);
                            pages.extend(parse_page_numbers(&loser_row.page_numbers));
                            let page_numbers = encode_page_numbers(&pages);
                            let confidence = existing.confidence.max(loser_row.confidence);
                            let verified =
                                i32::from(existing.verified != 0 || loser_row.verified != 0);

                            diesel::update(appearances::table.find(existing.id))
                                .set((
                                    appearances::page_numbers.eq(&page_numbers),
                                    appearances::confidence.eq(confidence),
                                    appearances::verified.eq(verified),
                                ))
                                .execute(conn)
                                .await?;
                            diesel::delete(appearances::table.find(loser_row.id))
                                .execute(conn)
                                .await?;
                            outcome.appearances_folded += 1;
                        }
                        None => {
                            diesel::update(appearances::table.find(loser_row.id))
                                .set(appearances::entity_id.eq(winner))
                                .execute(conn)
                                .await?;
                            outcome.appearances_moved += 1;
                        }
                    }
                }

                outcome.mentions_rewritten = match kind {
                    EntityKind::Trick => {
                        diesel::update(
                            trick_mentions::table.filter(trick_mentions::trick_id.eq_any(&losers)),
                        )
                        .set(trick_mentions::trick_id.eq(winner))
                        .execute(conn)
                        .await?
                    }
                    EntityKind::Skater => {
                        diesel::update(
                            trick_mentions::table
                                .filter(trick_mentions::skater_id.eq_any(&losers)),
                        )
                        .set(trick_mentions::skater_id.eq(winner))
                        .execute(conn)
                        .await?
                    }
                    EntityKind::Spot => {
                        diesel::update(
                            trick_mentions::table.filter(trick_mentions::spot_id.eq_any(&losers)),
                        )
                        .set(trick_mentions::spot_id.eq(winner))
                        .execute(conn)
                        .await?
                    }
                    _ => 0,
                };

                if kind == EntityKind::Location {
                    outcome.spots_relinked = diesel::update(
                        spots::table.filter(spots::location_id.eq_any(&losers)),
                    )
                    .set(spots::location_id.eq(winner))
                    .execute(conn)
                    .await?;
                }

                outcome.losers_deleted = match kind {
                    EntityKind::Skater => {
                        diesel::delete(skaters::table.filter(skaters::id.eq_any(&losers)))
                            .execute(conn)
                            .await?
                    }
                    EntityKind::Spot => {
                        diesel::delete(spots::table.filter(spots::id.eq_any(&losers)))
                            .execute(conn)
                            .await?
                    }
                    EntityKind::Photographer => {
                        diesel::delete(
                            photographers::table.filter(photographers::id.eq_any(&losers)),
                        )
                        .execute(conn)
                        .await?
                    }
                    EntityKind::Brand => {
                        diesel::delete(brands::table.filter(brands::id.eq_any(&losers)))
                            .execute(conn)
                            .await?
                    }
                    EntityKind::Trick => {
                        diesel::delete(tricks::table.filter(tricks::id.eq_any(&losers)))
                            .execute(conn)
                            .await?
                    }
                    EntityKind::Event => {
                        diesel::delete(events::table.filter(events::id.eq_any(&losers)))
                            .execute(conn)
                            .await?
                    }
                    EntityKind::Location => {
                        diesel::delete(locations::table.filter(locations::id.eq_any(&losers)))
                            .execute(conn)
                            .await?
                    }
                };

                Ok(outcome)
            })
        })
        .await
    }

    // ========================================================================
    // Appearances
    // ========================================================================

    /// Replace a magazine's appearances with a fresh extraction.
    ///
    /// Unverified rows are deleted and rebuilt from the drafts. A verified
    /// row whose entity shows up again keeps its context and verified flag;
    /// its page set becomes the union of old and new and its confidence the
    /// max of the two. Verified rows absent from the drafts survive
    /// untouched.
    pub async fn replace_appearances(
        &self,
        magazine_id: &str,
        drafts: &[AppearanceDraft],
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = Utc::now().to_rfc3339();

        conn.transaction(|conn| {
            Box::pin(async move {
                let existing: Vec<AppearanceRecord> = appearances::table
                    .filter(appearances::magazine_id.eq(magazine_id))
                    .load(conn)
                    .await?;

                let verified: std::collections::HashMap<(&str, i32), &AppearanceRecord> = existing
                    .iter()
                    .filter(|r| r.verified != 0)
                    .map(|r| ((r.entity_type.as_str(), r.entity_id), r))
                    .collect();

                diesel::delete(
                    appearances::table
                        .filter(appearances::magazine_id.eq(magazine_id))
                        .filter(appearances::verified.eq(0)),
                )
                .execute(conn)
                .await?;

                for draft in drafts {
                    let key = (draft.entity_type.as_str(), draft.entity_id as i32);
                    match verified.get(&key) {
                        Some(row) => {
                            let mut pages = parse_page_numbers(&row.page_numbers);
                            pages.extend_from_slice(&draft.page_numbers);
                            let page_numbers = encode_page_numbers(&pages);
                            let confidence = row.confidence.max(draft.confidence);

                            diesel::update(appearances::table.find(row.id))
                                .set((
                                    appearances::page_numbers.eq(&page_numbers),
                                    appearances::confidence.eq(confidence),
                                ))
                                .execute(conn)
                                .await?;
                        }
                        None => {
                            let page_numbers = encode_page_numbers(&draft.page_numbers);
                            let record = NewAppearance {
                                magazine_id,
                                entity_type: draft.entity_type.as_str(),
                                entity_id: draft.entity_id as i32,
                                page_numbers: &page_numbers,
                                context: draft.context.as_str(),
                                confidence: draft.confidence,
                                verified: 0,
                                created_at: &created_at,
                            };
                            diesel::insert_into(appearances::table)
                                .values(&record)
                                .execute(conn)
                                .await?;
                        }
                    }
                }

                Ok(())
            })
        })
        .await
    }

    /// Get all appearances recorded for a magazine.
    pub async fn appearances_for_magazine(
        &self,
        magazine_id: &str,
    ) -> Result<Vec<Appearance>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<AppearanceRecord> = appearances::table
            .filter(appearances::magazine_id.eq(magazine_id))
            .order((appearances::entity_type.asc(), appearances::id.asc()))
            .load(&mut conn)
            .await?;

        Ok(records
            .into_iter()
            .filter_map(AppearanceRecord::try_into_appearance)
            .collect())
    }

    /// Count appearances per entity kind for a magazine.
    pub async fn appearance_counts(
        &self,
        magazine_id: &str,
    ) -> Result<Vec<(EntityKind, u64)>, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let rows: Vec<(String, i64)> = appearances::table
            .filter(appearances::magazine_id.eq(magazine_id))
            .group_by(appearances::entity_type)
            .select((appearances::entity_type, count_star()))
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(kind, count)| {
                EntityKind::from_str(&kind).map(|k| (k, count as u64))
            })
            .collect())
    }

    /// Mark appearances reviewed. Returns how many rows changed.
    pub async fn verify_appearances(&self, ids: &[i64]) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;

        let ids: Vec<i32> = ids.iter().map(|&id| id as i32).collect();
        diesel::update(appearances::table.filter(appearances::id.eq_any(&ids)))
            .set(appearances::verified.eq(1))
            .execute(&mut conn)
            .await
    }

    // ========================================================================
    // Trick Mentions
    // ========================================================================

    /// Replace a magazine's trick mentions with a fresh extraction.
    ///
    /// Mentions are machine-generated and carry no review flag, so this is
    /// a plain delete-then-insert in one transaction.
    pub async fn replace_trick_mentions(
        &self,
        magazine_id: &str,
        drafts: &[TrickMentionDraft],
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = Utc::now().to_rfc3339();

        conn.transaction(|conn| {
            Box::pin(async move {
                diesel::delete(
                    trick_mentions::table.filter(trick_mentions::magazine_id.eq(magazine_id)),
                )
                .execute(conn)
                .await?;

                for draft in drafts {
                    let record = NewTrickMention {
                        magazine_id,
                        trick_id: draft.trick_id as i32,
                        skater_id: draft.skater_id.map(|id| id as i32),
                        spot_id: draft.spot_id.map(|id| id as i32),
                        page_number: draft.page_number,
                        created_at: &created_at,
                    };
                    diesel::insert_into(trick_mentions::table)
                        .values(&record)
                        .execute(conn)
                        .await?;
                }

                Ok(())
            })
        })
        .await
    }

    /// Get all trick mentions for a magazine in page order.
    pub async fn mentions_for_magazine(
        &self,
        magazine_id: &str,
    ) -> Result<Vec<TrickMention>, DieselError> {
        let mut conn = self.pool.get().await?;

        let records: Vec<TrickMentionRecord> = trick_mentions::table
            .filter(trick_mentions::magazine_id.eq(magazine_id))
            .order(trick_mentions::page_number.asc())
            .load(&mut conn)
            .await?;

        Ok(records
            .into_iter()
            .map(TrickMentionRecord::into_mention)
            .collect())
    }
}

type SpotTuple = (
    i32,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn spot_tuple_to_row(
    (id, name, city, state, spot_type, address, created_at): SpotTuple,
) -> EntityRow {
    let attrs = EntityAttrs {
        city,
        state,
        spot_type,
        address,
        ..Default::default()
    };
    entity_row(EntityKind::Spot, id, name, attrs, created_at)
}

type BrandTuple = (i32, String, Option<String>, String);

fn brand_tuple_to_row((id, name, category, created_at): BrandTuple) -> EntityRow {
    let attrs = EntityAttrs {
        category,
        ..Default::default()
    };
    entity_row(EntityKind::Brand, id, name, attrs, created_at)
}

type EventTuple = (i32, String, Option<String>, Option<String>, String);

fn event_tuple_to_row((id, name, event_date, location, created_at): EventTuple) -> EntityRow {
    let attrs = EntityAttrs {
        event_date,
        event_location: location,
        ..Default::default()
    };
    entity_row(EntityKind::Event, id, name, attrs, created_at)
}

type LocationTuple = (
    i32,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn location_tuple_to_row(
    (id, name, location_type, city, state, country, created_at): LocationTuple,
) -> EntityRow {
    let attrs = EntityAttrs {
        location_type,
        city,
        state,
        country,
        ..Default::default()
    };
    entity_row(EntityKind::Location, id, name, attrs, created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Magazine;
    use crate::repository::context::DbContext;
    use crate::repository::magazines::MagazineRepository;
    use std::path::PathBuf;
    use tempfile::tempdir;

    async fn setup_test_db() -> (AsyncSqlitePool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"), dir.path());
        ctx.init_schema().await.unwrap();
        (ctx.pool().clone(), dir)
    }

    async fn insert_magazine(pool: &AsyncSqlitePool, id: &str) {
        let repo = MagazineRepository::new(pool.clone());
        let mag = Magazine::new(
            id.to_string(),
            "Thrasher".to_string(),
            PathBuf::from("/archive/test.pdf"),
            Magazine::compute_hash(id.as_bytes()),
        );
        repo.save(&mag).await.unwrap();
    }

    fn draft(kind: EntityKind, entity_id: i64, pages: &[i32], confidence: f64) -> AppearanceDraft {
        AppearanceDraft {
            entity_type: kind,
            entity_id,
            page_numbers: pages.to_vec(),
            context: AppearanceContext::Photo,
            confidence,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (pool, _dir) = setup_test_db().await;
        let repo = EntityRepository::new(pool);

        let first = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();
        let second = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();
        assert_eq!(first, second);

        let other = repo
            .get_or_create(EntityKind::Skater, "Mark Gonzales", &EntityAttrs::default())
            .await
            .unwrap();
        assert_ne!(first, other);

        let all = repo.list(EntityKind::Skater).await.unwrap();
        assert_eq!(all.len(), 2);
        // Name is the exact case-sensitive key
        let cased = repo
            .get_or_create(EntityKind::Skater, "natas kaupas", &EntityAttrs::default())
            .await
            .unwrap();
        assert_ne!(first, cased);
    }

    #[tokio::test]
    async fn test_get_or_create_fills_missing_attrs() {
        let (pool, _dir) = setup_test_db().await;
        let repo = EntityRepository::new(pool);

        let id = repo
            .get_or_create(EntityKind::Spot, "EMB", &EntityAttrs::default())
            .await
            .unwrap();

        let sighting = EntityAttrs {
            city: Some("San Francisco".to_string()),
            state: Some("CA".to_string()),
            ..Default::default()
        };
        let same = repo
            .get_or_create(EntityKind::Spot, "EMB", &sighting)
            .await
            .unwrap();
        assert_eq!(id, same);

        let row = repo.get(EntityKind::Spot, id).await.unwrap().unwrap();
        assert_eq!(row.attrs.city.as_deref(), Some("San Francisco"));
        assert_eq!(row.attrs.state.as_deref(), Some("CA"));

        // A later sighting must not overwrite what is already known
        let conflicting = EntityAttrs {
            city: Some("Sacramento".to_string()),
            spot_type: Some("plaza".to_string()),
            ..Default::default()
        };
        repo.get_or_create(EntityKind::Spot, "EMB", &conflicting)
            .await
            .unwrap();

        let row = repo.get(EntityKind::Spot, id).await.unwrap().unwrap();
        assert_eq!(row.attrs.city.as_deref(), Some("San Francisco"));
        assert_eq!(row.attrs.spot_type.as_deref(), Some("plaza"));
    }

    #[tokio::test]
    async fn test_replace_appearances_never_duplicates() {
        let (pool, _dir) = setup_test_db().await;
        insert_magazine(&pool, "mag-1").await;
        let repo = EntityRepository::new(pool);

        let skater = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();

        let drafts = vec![draft(EntityKind::Skater, skater, &[3, 1, 3], 0.7)];
        repo.replace_appearances("mag-1", &drafts).await.unwrap();
        repo.replace_appearances("mag-1", &drafts).await.unwrap();

        let rows = repo.appearances_for_magazine("mag-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].page_numbers, vec![1, 3]);
        assert!(!rows[0].verified);
    }

    #[tokio::test]
    async fn test_replace_appearances_preserves_verified() {
        let (pool, _dir) = setup_test_db().await;
        insert_magazine(&pool, "mag-1").await;
        let repo = EntityRepository::new(pool);

        let natas = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();
        let gonz = repo
            .get_or_create(EntityKind::Skater, "Mark Gonzales", &EntityAttrs::default())
            .await
            .unwrap();

        repo.replace_appearances(
            "mag-1",
            &[
                draft(EntityKind::Skater, natas, &[4], 0.7),
                draft(EntityKind::Skater, gonz, &[9], 0.7),
            ],
        )
        .await
        .unwrap();

        let rows = repo.appearances_for_magazine("mag-1").await.unwrap();
        let natas_row = rows.iter().find(|r| r.entity_id == natas).unwrap();
        repo.verify_appearances(&[natas_row.id]).await.unwrap();

        // Re-extraction sees Natas on new pages and misses Gonz entirely
        repo.replace_appearances(
            "mag-1",
            &[draft(EntityKind::Skater, natas, &[4, 12], 0.85)],
        )
        .await
        .unwrap();

        let rows = repo.appearances_for_magazine("mag-1").await.unwrap();
        assert_eq!(rows.len(), 1, "unverified row for Gonz must be dropped");
        let kept = &rows[0];
        assert_eq!(kept.entity_id, natas);
        assert!(kept.verified);
        assert_eq!(kept.page_numbers, vec![4, 12]);
        assert!((kept.confidence - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_verified_row_survives_when_entity_vanishes() {
        let (pool, _dir) = setup_test_db().await;
        insert_magazine(&pool, "mag-1").await;
        let repo = EntityRepository::new(pool);

        let skater = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();

        repo.replace_appearances("mag-1", &[draft(EntityKind::Skater, skater, &[4], 0.7)])
            .await
            .unwrap();
        let rows = repo.appearances_for_magazine("mag-1").await.unwrap();
        repo.verify_appearances(&[rows[0].id]).await.unwrap();

        repo.replace_appearances("mag-1", &[]).await.unwrap();

        let rows = repo.appearances_for_magazine("mag-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].verified);
        assert_eq!(rows[0].page_numbers, vec![4]);
    }

    #[tokio::test]
    async fn test_merge_folds_colliding_appearances() {
        let (pool, _dir) = setup_test_db().await;
        insert_magazine(&pool, "mag-1").await;
        insert_magazine(&pool, "mag-2").await;
        let repo = EntityRepository::new(pool);

        let winner = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();
        let loser = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupus", &EntityAttrs::default())
            .await
            .unwrap();

        // Colliding rows in mag-1, loser-only row in mag-2
        repo.replace_appearances(
            "mag-1",
            &[
                draft(EntityKind::Skater, winner, &[4], 0.7),
                draft(EntityKind::Skater, loser, &[9], 0.9),
            ],
        )
        .await
        .unwrap();
        repo.replace_appearances("mag-2", &[draft(EntityKind::Skater, loser, &[2], 0.7)])
            .await
            .unwrap();

        let outcome = repo
            .merge_entities(EntityKind::Skater, winner, &[loser])
            .await
            .unwrap();
        assert_eq!(outcome.appearances_folded, 1);
        assert_eq!(outcome.appearances_moved, 1);
        assert_eq!(outcome.losers_deleted, 1);

        let mag1 = repo.appearances_for_magazine("mag-1").await.unwrap();
        assert_eq!(mag1.len(), 1);
        assert_eq!(mag1[0].entity_id, winner);
        assert_eq!(mag1[0].page_numbers, vec![4, 9]);
        assert!((mag1[0].confidence - 0.9).abs() < 1e-9);

        let mag2 = repo.appearances_for_magazine("mag-2").await.unwrap();
        assert_eq!(mag2.len(), 1);
        assert_eq!(mag2[0].entity_id, winner);

        assert!(repo.get(EntityKind::Skater, loser).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_rewrites_trick_mentions() {
        let (pool, _dir) = setup_test_db().await;
        insert_magazine(&pool, "mag-1").await;
        let repo = EntityRepository::new(pool);

        let trick = repo
            .get_or_create(EntityKind::Trick, "Ollie", &EntityAttrs::default())
            .await
            .unwrap();
        let winner = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();
        let loser = repo
            .get_or_create(EntityKind::Skater, "N. Kaupas", &EntityAttrs::default())
            .await
            .unwrap();

        repo.replace_trick_mentions(
            "mag-1",
            &[TrickMentionDraft {
                trick_id: trick,
                skater_id: Some(loser),
                spot_id: None,
                page_number: 12,
            }],
        )
        .await
        .unwrap();

        let outcome = repo
            .merge_entities(EntityKind::Skater, winner, &[loser])
            .await
            .unwrap();
        assert_eq!(outcome.mentions_rewritten, 1);

        let mentions = repo.mentions_for_magazine("mag-1").await.unwrap();
        assert_eq!(mentions[0].skater_id, Some(winner));
    }

    #[tokio::test]
    async fn test_merge_refuses_winner_among_losers() {
        let (pool, _dir) = setup_test_db().await;
        let repo = EntityRepository::new(pool);

        let id = repo
            .get_or_create(EntityKind::Brand, "Santa Cruz", &EntityAttrs::default())
            .await
            .unwrap();

        let result = repo.merge_entities(EntityKind::Brand, id, &[id]).await;
        assert!(result.is_err());

        // Nothing touched
        assert!(repo.get(EntityKind::Brand, id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replace_trick_mentions_is_delete_then_insert() {
        let (pool, _dir) = setup_test_db().await;
        insert_magazine(&pool, "mag-1").await;
        let repo = EntityRepository::new(pool);

        let trick = repo
            .get_or_create(EntityKind::Trick, "Kickflip", &EntityAttrs::default())
            .await
            .unwrap();

        let first = vec![
            TrickMentionDraft {
                trick_id: trick,
                skater_id: None,
                spot_id: None,
                page_number: 3,
            },
            TrickMentionDraft {
                trick_id: trick,
                skater_id: None,
                spot_id: None,
                page_number: 7,
            },
        ];
        repo.replace_trick_mentions("mag-1", &first).await.unwrap();

        let second = vec![TrickMentionDraft {
            trick_id: trick,
            skater_id: None,
            spot_id: None,
            page_number: 5,
        }];
        repo.replace_trick_mentions("mag-1", &second).await.unwrap();

        let mentions = repo.mentions_for_magazine("mag-1").await.unwrap();
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].page_number, 5);
    }

    #[tokio::test]
    async fn test_appearance_counts_by_kind() {
        let (pool, _dir) = setup_test_db().await;
        insert_magazine(&pool, "mag-1").await;
        let repo = EntityRepository::new(pool);

        let skater = repo
            .get_or_create(EntityKind::Skater, "Natas Kaupas", &EntityAttrs::default())
            .await
            .unwrap();
        let brand_a = repo
            .get_or_create(EntityKind::Brand, "Santa Cruz", &EntityAttrs::default())
            .await
            .unwrap();
        let brand_b = repo
            .get_or_create(EntityKind::Brand, "Powell", &EntityAttrs::default())
            .await
            .unwrap();

        repo.replace_appearances(
            "mag-1",
            &[
                draft(EntityKind::Skater, skater, &[1], 0.7),
                draft(EntityKind::Brand, brand_a, &[2], 0.7),
                draft(EntityKind::Brand, brand_b, &[3], 0.7),
            ],
        )
        .await
        .unwrap();

        let counts = repo.appearance_counts("mag-1").await.unwrap();
        let get = |kind: EntityKind| {
            counts
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };
        assert_eq!(get(EntityKind::Skater), 1);
        assert_eq!(get(EntityKind::Brand), 2);
        assert_eq!(get(EntityKind::Trick), 0);
    }
}
