//! Cross-page entity merging.
//!
//! The model reports entities per page; one magazine mentions the same
//! skater on many pages, often with inconsistent casing. Entities are
//! accumulated into per-kind maps keyed by the lowercase-trimmed name:
//! the first sighting wins the display name and context, later sightings
//! fill attribute gaps and union page numbers. Exact-string keys only;
//! fuzzy matching across magazines is the duplicates tool's job.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::llm::PageExtraction;
use crate::models::{AppearanceContext, EntityAttrs, EntityKind};

/// One deduplicated entity accumulated across a magazine's pages.
#[derive(Debug, Clone)]
pub struct MergedEntity {
    /// Display name from the first sighting.
    pub name: String,
    pub attrs: EntityAttrs,
    pub context: AppearanceContext,
    /// Logical page numbers the entity was seen on.
    pub pages: BTreeSet<i32>,
}

/// A trick/skater/spot join observed on one page, still by name.
///
/// Names are resolved to entity IDs at persist time.
#[derive(Debug, Clone)]
pub struct TrickSighting {
    pub trick: String,
    pub performed_by: Option<String>,
    pub location: Option<String>,
    pub page_number: i32,
}

/// Accumulates page extractions into deduplicated entities.
#[derive(Debug, Default)]
pub struct EntityAccumulator {
    entities: HashMap<EntityKind, BTreeMap<String, MergedEntity>>,
    sightings: Vec<TrickSighting>,
}

impl EntityAccumulator {
    /// Fold one page's extraction into the accumulator.
    pub fn add_page(&mut self, page_number: i32, extraction: &PageExtraction) {
        for skater in &extraction.skaters {
            self.add(
                EntityKind::Skater,
                page_number,
                &skater.name,
                parse_context(&skater.context),
                EntityAttrs::default(),
            );
        }

        for spot in &extraction.spots {
            let attrs = EntityAttrs {
                city: clean(&spot.city),
                state: clean(&spot.state),
                spot_type: clean(&spot.spot_type),
                address: clean(&spot.address),
                ..Default::default()
            };
            self.add(
                EntityKind::Spot,
                page_number,
                &spot.name,
                AppearanceContext::default(),
                attrs,
            );
        }

        for photographer in &extraction.photographers {
            self.add(
                EntityKind::Photographer,
                page_number,
                &photographer.name,
                AppearanceContext::default(),
                EntityAttrs::default(),
            );
        }

        for brand in &extraction.brands {
            let attrs = EntityAttrs {
                category: clean(&brand.category),
                ..Default::default()
            };
            self.add(
                EntityKind::Brand,
                page_number,
                &brand.name,
                parse_context(&brand.context),
                attrs,
            );
        }

        for trick in &extraction.tricks {
            self.add(
                EntityKind::Trick,
                page_number,
                &trick.name,
                AppearanceContext::default(),
                EntityAttrs::default(),
            );

            let name = trick.name.trim();
            if !name.is_empty() {
                self.sightings.push(TrickSighting {
                    trick: name.to_string(),
                    performed_by: clean(&trick.performed_by),
                    location: clean(&trick.location),
                    page_number,
                });
            }
        }

        for event in &extraction.events {
            let attrs = EntityAttrs {
                event_date: clean(&event.date),
                event_location: clean(&event.location),
                ..Default::default()
            };
            self.add(
                EntityKind::Event,
                page_number,
                &event.name,
                AppearanceContext::default(),
                attrs,
            );
        }

        for location in &extraction.locations {
            let attrs = EntityAttrs {
                location_type: clean(&location.location_type),
                city: clean(&location.city),
                state: clean(&location.state),
                country: clean(&location.country),
                ..Default::default()
            };
            self.add(
                EntityKind::Location,
                page_number,
                &location.name,
                AppearanceContext::default(),
                attrs,
            );
        }
    }

    fn add(
        &mut self,
        kind: EntityKind,
        page_number: i32,
        name: &str,
        context: AppearanceContext,
        attrs: EntityAttrs,
    ) {
        let display = name.trim();
        if display.is_empty() {
            return;
        }

        let key = display.to_lowercase();
        let by_name = self.entities.entry(kind).or_default();
        match by_name.get_mut(&key) {
            Some(existing) => {
                existing.pages.insert(page_number);
                existing.attrs.fill_from(&attrs);
            }
            None => {
                by_name.insert(
                    key,
                    MergedEntity {
                        name: display.to_string(),
                        attrs,
                        context,
                        pages: BTreeSet::from([page_number]),
                    },
                );
            }
        }
    }

    /// Merged entities of one kind, ordered by normalized name.
    pub fn entities(&self, kind: EntityKind) -> impl Iterator<Item = &MergedEntity> {
        self.entities
            .get(&kind)
            .into_iter()
            .flat_map(|by_name| by_name.values())
    }

    /// How many distinct entities of a kind were seen.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.get(&kind).map(BTreeMap::len).unwrap_or(0)
    }

    /// Distinct entities across all kinds.
    pub fn total(&self) -> usize {
        EntityKind::ALL.iter().map(|&kind| self.count(kind)).sum()
    }

    /// Trick sightings in page order of arrival.
    pub fn sightings(&self) -> &[TrickSighting] {
        &self.sightings
    }
}

/// Parse an optional context string, defaulting absent values to mention.
fn parse_context(raw: &Option<String>) -> AppearanceContext {
    match raw.as_deref() {
        Some(s) if !s.trim().is_empty() => AppearanceContext::parse(s),
        _ => AppearanceContext::default(),
    }
}

/// Trim an extracted attribute, dropping empty strings.
fn clean(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ExtractedSkater, ExtractedSpot, ExtractedTrick};

    fn page_with_skater(name: &str, context: Option<&str>) -> PageExtraction {
        PageExtraction {
            skaters: vec![ExtractedSkater {
                name: name.to_string(),
                context: context.map(str::to_string),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_case_and_whitespace_collapse() {
        let mut acc = EntityAccumulator::default();
        acc.add_page(4, &page_with_skater("Natas Kaupas", Some("feature")));
        acc.add_page(9, &page_with_skater("  NATAS KAUPAS ", None));
        acc.add_page(9, &page_with_skater("natas kaupas", None));

        assert_eq!(acc.count(EntityKind::Skater), 1);
        let merged = acc.entities(EntityKind::Skater).next().unwrap();
        assert_eq!(merged.name, "Natas Kaupas");
        assert_eq!(merged.context, AppearanceContext::Feature);
        assert_eq!(merged.pages.iter().copied().collect::<Vec<_>>(), vec![4, 9]);
    }

    #[test]
    fn test_empty_names_discarded() {
        let mut acc = EntityAccumulator::default();
        acc.add_page(1, &page_with_skater("   ", None));
        acc.add_page(1, &page_with_skater("", Some("cover")));

        assert_eq!(acc.count(EntityKind::Skater), 0);
        assert_eq!(acc.total(), 0);
    }

    #[test]
    fn test_later_pages_fill_attr_gaps() {
        let mut acc = EntityAccumulator::default();

        acc.add_page(
            2,
            &PageExtraction {
                spots: vec![ExtractedSpot {
                    name: "EMB".to_string(),
                    city: Some("San Francisco".to_string()),
                    state: None,
                    spot_type: None,
                    address: None,
                }],
                ..Default::default()
            },
        );
        acc.add_page(
            7,
            &PageExtraction {
                spots: vec![ExtractedSpot {
                    name: "emb".to_string(),
                    city: Some("Oakland".to_string()),
                    state: Some("CA".to_string()),
                    spot_type: Some("".to_string()),
                    address: None,
                }],
                ..Default::default()
            },
        );

        assert_eq!(acc.count(EntityKind::Spot), 1);
        let merged = acc.entities(EntityKind::Spot).next().unwrap();
        // First sighting wins; the later one only fills gaps
        assert_eq!(merged.attrs.city.as_deref(), Some("San Francisco"));
        assert_eq!(merged.attrs.state.as_deref(), Some("CA"));
        assert_eq!(merged.attrs.spot_type, None);
    }

    #[test]
    fn test_tricks_yield_entity_and_sighting() {
        let mut acc = EntityAccumulator::default();
        acc.add_page(
            12,
            &PageExtraction {
                tricks: vec![
                    ExtractedTrick {
                        name: "Ollie".to_string(),
                        performed_by: Some("Natas Kaupas".to_string()),
                        location: Some(" EMB ".to_string()),
                    },
                    ExtractedTrick {
                        name: "Kickflip".to_string(),
                        performed_by: Some("  ".to_string()),
                        location: None,
                    },
                ],
                ..Default::default()
            },
        );

        assert_eq!(acc.count(EntityKind::Trick), 2);
        let sightings = acc.sightings();
        assert_eq!(sightings.len(), 2);
        assert_eq!(sightings[0].performed_by.as_deref(), Some("Natas Kaupas"));
        assert_eq!(sightings[0].location.as_deref(), Some("EMB"));
        assert_eq!(sightings[1].performed_by, None);
    }

    #[test]
    fn test_unknown_context_coerces_to_other() {
        let mut acc = EntityAccumulator::default();
        acc.add_page(1, &page_with_skater("Natas Kaupas", Some("centerfold")));

        let merged = acc.entities(EntityKind::Skater).next().unwrap();
        assert_eq!(merged.context, AppearanceContext::Other);
    }
}
