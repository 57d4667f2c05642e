//! Data models for folioscrape.

mod project;

pub use project::{source_domain_of, Media, MediaKind, ProjectRecord};
