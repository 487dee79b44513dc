//! Fuzzy duplicate detection across catalog entities.
//!
//! Extraction runs get-or-create by exact name, so "Tony Hawk" and
//! "tony hawk." accumulate as separate rows over time. This module finds
//! likely duplicates within one entity kind; the merge itself lives in
//! the repository layer.

use strsim::normalized_levenshtein;

use crate::models::{EntityKind, EntityRow};

/// Minimum similarity for two names to be grouped.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Similarity between two entity names in `[0.0, 1.0]`.
///
/// Both names are lowercased and trimmed first. Equal strings score 1.0,
/// one containing the other scores 0.85, anything else scores normalized
/// Levenshtein similarity.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.85;
    }

    normalized_levenshtein(&a, &b)
}

/// A cluster of entities judged to be the same real-world thing.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub kind: EntityKind,
    /// Members in input order; the first is the grouping seed.
    pub members: Vec<EntityRow>,
    /// Lowest seed similarity among the members.
    pub score: f64,
}

/// Group entities of one kind whose names score at or above `threshold`.
///
/// O(n²) greedy pass: each unclaimed entity seeds a group and claims every
/// later unclaimed entity similar enough to it. Only groups with two or
/// more members are returned.
pub fn find_duplicates(
    kind: EntityKind,
    entities: &[EntityRow],
    threshold: f64,
) -> Vec<DuplicateGroup> {
    let mut claimed = vec![false; entities.len()];
    let mut groups = Vec::new();

    for i in 0..entities.len() {
        if claimed[i] {
            continue;
        }

        let mut members = vec![entities[i].clone()];
        let mut score = 1.0f64;

        for j in (i + 1)..entities.len() {
            if claimed[j] {
                continue;
            }
            let sim = similarity(&entities[i].name, &entities[j].name);
            if sim >= threshold {
                claimed[j] = true;
                members.push(entities[j].clone());
                score = score.min(sim);
            }
        }

        if members.len() > 1 {
            claimed[i] = true;
            groups.push(DuplicateGroup {
                kind,
                members,
                score,
            });
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityAttrs;

    fn row(id: i64, name: &str) -> EntityRow {
        EntityRow {
            id,
            kind: EntityKind::Skater,
            name: name.to_string(),
            attrs: EntityAttrs::default(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_similarity_exact_after_normalization() {
        assert_eq!(similarity("Tony Hawk", "Tony Hawk "), 1.0);
        assert_eq!(similarity("TONY HAWK", "tony hawk"), 1.0);
    }

    #[test]
    fn test_similarity_containment() {
        assert_eq!(similarity("Tony Hawk", "Tony"), 0.85);
        assert_eq!(similarity("EMB", "EMB Plaza"), 0.85);
    }

    #[test]
    fn test_similarity_levenshtein() {
        // One deletion from an 8-char name
        let sim = similarity("Thrasher", "Trasher");
        assert!((sim - 0.875).abs() < 1e-9);

        assert!(similarity("Tony Hawk", "Danny Way") < 0.7);
        assert_eq!(similarity("", "Tony Hawk"), 0.0);
    }

    #[test]
    fn test_find_duplicates_groups_at_threshold() {
        let entities = vec![
            row(1, "Tony Hawk"),
            row(2, "tony hawk "),
            row(3, "Danny Way"),
            row(4, "Thrasher"),
            row(5, "Trasher"),
        ];

        let groups = find_duplicates(EntityKind::Skater, &entities, DEFAULT_THRESHOLD);
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[0].members[0].id, 1);
        assert_eq!(groups[0].members[1].id, 2);
        assert_eq!(groups[0].score, 1.0);

        assert_eq!(groups[1].members.len(), 2);
        assert!((groups[1].score - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_find_duplicates_below_threshold_stays_apart() {
        let entities = vec![row(1, "Tony Hawk"), row(2, "Danny Way")];
        let groups = find_duplicates(EntityKind::Skater, &entities, DEFAULT_THRESHOLD);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_find_duplicates_greedy_claims_once() {
        // Second group must not re-claim an entity already grouped
        let entities = vec![row(1, "Natas"), row(2, "Natas Kaupas"), row(3, "Natas ")];
        let groups = find_duplicates(EntityKind::Skater, &entities, DEFAULT_THRESHOLD);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 3);
    }
}
