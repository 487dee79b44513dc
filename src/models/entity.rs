//! Entity models: the people, places, and things extracted from pages.
//!
//! Seven entity kinds share one storage shape (a unique name plus optional
//! kind-specific attributes). Appearances join entities to magazines with
//! the page numbers they were seen on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The seven kinds of entity the extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Skater,
    Spot,
    Photographer,
    Brand,
    Trick,
    Event,
    Location,
}

impl EntityKind {
    /// All kinds, in the order extraction results are reported.
    pub const ALL: [EntityKind; 7] = [
        Self::Skater,
        Self::Spot,
        Self::Photographer,
        Self::Brand,
        Self::Trick,
        Self::Event,
        Self::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skater => "skater",
            Self::Spot => "spot",
            Self::Photographer => "photographer",
            Self::Brand => "brand",
            Self::Trick => "trick",
            Self::Event => "event",
            Self::Location => "location",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "skater" => Some(Self::Skater),
            "spot" => Some(Self::Spot),
            "photographer" => Some(Self::Photographer),
            "brand" => Some(Self::Brand),
            "trick" => Some(Self::Trick),
            "event" => Some(Self::Event),
            "location" => Some(Self::Location),
            _ => None,
        }
    }

    /// Plural table label for display.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Skater => "skaters",
            Self::Spot => "spots",
            Self::Photographer => "photographers",
            Self::Brand => "brands",
            Self::Trick => "tricks",
            Self::Event => "events",
            Self::Location => "locations",
        }
    }
}

/// Where on the page an entity appeared.
///
/// Closed set; anything the model invents outside it is coerced to
/// `Other` rather than stored as free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppearanceContext {
    Cover,
    Feature,
    Interview,
    Photo,
    Ad,
    ContestResults,
    #[default]
    Mention,
    Other,
}

impl AppearanceContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Feature => "feature",
            Self::Interview => "interview",
            Self::Photo => "photo",
            Self::Ad => "ad",
            Self::ContestResults => "contest_results",
            Self::Mention => "mention",
            Self::Other => "other",
        }
    }

    /// Parse a model/database string, coercing unknown values to `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "cover" => Self::Cover,
            "feature" => Self::Feature,
            "interview" => Self::Interview,
            "photo" => Self::Photo,
            "ad" | "advertisement" => Self::Ad,
            "contest_results" | "contest results" => Self::ContestResults,
            "mention" => Self::Mention,
            _ => Self::Other,
        }
    }
}

/// Optional kind-specific attributes captured alongside an entity name.
///
/// Flat so it maps directly onto the nullable columns of the entity
/// tables; irrelevant fields for a kind stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAttrs {
    pub city: Option<String>,
    pub state: Option<String>,
    pub spot_type: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    pub event_date: Option<String>,
    pub event_location: Option<String>,
    pub location_type: Option<String>,
    pub country: Option<String>,
}

impl EntityAttrs {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Fill `None` fields from another sighting without overwriting
    /// anything already known.
    pub fn fill_from(&mut self, other: &EntityAttrs) {
        fn fill(dst: &mut Option<String>, src: &Option<String>) {
            if dst.is_none() {
                dst.clone_from(src);
            }
        }
        fill(&mut self.city, &other.city);
        fill(&mut self.state, &other.state);
        fill(&mut self.spot_type, &other.spot_type);
        fill(&mut self.address, &other.address);
        fill(&mut self.category, &other.category);
        fill(&mut self.event_date, &other.event_date);
        fill(&mut self.event_location, &other.event_location);
        fill(&mut self.location_type, &other.location_type);
        fill(&mut self.country, &other.country);
    }
}

/// An entity row as stored, independent of kind.
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub id: i64,
    pub kind: EntityKind,
    pub name: String,
    pub attrs: EntityAttrs,
    pub created_at: DateTime<Utc>,
}

/// One entity's presence in one magazine.
#[derive(Debug, Clone)]
pub struct Appearance {
    pub id: i64,
    pub magazine_id: String,
    pub entity_type: EntityKind,
    pub entity_id: i64,
    /// Logical page numbers, ascending and deduplicated.
    pub page_numbers: Vec<i32>,
    pub context: AppearanceContext,
    pub confidence: f64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A trick performed (or credited) on a specific page.
#[derive(Debug, Clone)]
pub struct TrickMention {
    pub id: i64,
    pub magazine_id: String,
    pub trick_id: i64,
    pub skater_id: Option<i64>,
    pub spot_id: Option<i64>,
    pub page_number: i32,
    pub created_at: DateTime<Utc>,
}
