//! Data models for gnarchive.

mod entity;
mod magazine;
mod page;

pub use entity::{
    Appearance, AppearanceContext, EntityAttrs, EntityKind, EntityRow, TrickMention,
};
pub use magazine::{Completeness, Magazine, MagazineStatus};
pub use page::Page;
