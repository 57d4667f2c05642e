//! folioscrape - design agency portfolio scraper.
//!
//! Loads agency listing pages, clicks "load more" until the listing stops
//! growing, extracts one record per project card and saves the records that
//! are not already known to a JSON file and/or a document store.

pub mod cli;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod scrapers;
pub mod sink;
