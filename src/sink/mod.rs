//! Deduplicating persistence of scraped records.
//!
//! Records are deduplicated by canonical URL against what the destination
//! already holds, then written in one batch: the JSON file is rewritten with
//! existing plus new entries, and new records are inserted into the document
//! store. A failure in one destination never blocks the other.

mod file;
mod store;
mod upload;

pub use file::{entry_url, JsonFile};
pub use store::{DocumentStore, SqliteStore, StoreConfig};
pub use upload::{json_files, record_from_entry, upload, UploadSummary};

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::ProjectRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Document store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("Invalid collection name '{0}': use letters, digits and underscores")]
    InvalidCollection(String),
}

/// Canonical URLs already present in the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownUrlSet(HashSet<String>);

impl KnownUrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing file entries (any supported URL key).
    pub fn from_entries(entries: &[Value]) -> Self {
        entries
            .iter()
            .filter_map(entry_url)
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.contains(url)
    }

    /// Returns false when the URL was already known.
    pub fn insert(&mut self, url: &str) -> bool {
        self.0.insert(url.to_string())
    }

    pub fn extend(&mut self, other: KnownUrlSet) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for KnownUrlSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of deduplicating one batch.
#[derive(Debug, Clone, Default)]
pub struct Merge {
    pub accepted: Vec<ProjectRecord>,
    pub already_known: usize,
    pub without_url: usize,
}

/// One batch with same-URL records folded into their first occurrence.
#[derive(Debug, Default)]
struct Batch {
    unique: Vec<ProjectRecord>,
    duplicates: usize,
    without_url: usize,
}

/// Fold same-URL records of one batch together, keeping every category.
///
/// A project listed under several category pages keeps the first record and
/// gains the categories of the later ones.
fn collapse(records: Vec<ProjectRecord>) -> Batch {
    let mut batch = Batch::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(url) = record.dedup_key() else {
            batch.without_url += 1;
            continue;
        };
        match positions.get(url) {
            Some(&i) => {
                let first = &mut batch.unique[i];
                for category in &record.categories {
                    first.push_category(category);
                }
                batch.duplicates += 1;
            }
            None => {
                positions.insert(url.to_string(), batch.unique.len());
                batch.unique.push(record);
            }
        }
    }

    batch
}

fn partition(batch: Batch, known: &mut KnownUrlSet) -> Merge {
    let mut merge = Merge {
        already_known: batch.duplicates,
        without_url: batch.without_url,
        ..Default::default()
    };
    for record in batch.unique {
        if record.dedup_key().is_some_and(|url| known.insert(url)) {
            merge.accepted.push(record);
        } else {
            merge.already_known += 1;
        }
    }
    merge
}

/// Split fresh records into accepted and rejected, updating `known`.
///
/// A URL seen earlier in the same batch counts as already known for later
/// duplicates, whose categories are folded into the first record.
pub fn merge(records: Vec<ProjectRecord>, known: &mut KnownUrlSet) -> Merge {
    partition(collapse(records), known)
}

/// What a sink call did.
#[derive(Debug, Default)]
pub struct SinkSummary {
    /// Records handed to the sink.
    pub found: usize,
    pub already_known: usize,
    pub newly_added: usize,
    /// Records dropped for lacking a canonical URL.
    pub without_url: usize,
    /// Entries in the JSON file after the write, when a file is configured.
    pub total_persisted: Option<usize>,
    /// Documents inserted into the store, when a store is configured.
    pub store_inserted: Option<usize>,
    pub errors: Vec<SinkError>,
}

impl SinkSummary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Destinations for one run.
#[derive(Debug, Clone, Default)]
pub struct Sink {
    pub file: Option<JsonFile>,
    pub store: Option<StoreConfig>,
}

impl Sink {
    pub fn new(file: Option<JsonFile>, store: Option<StoreConfig>) -> Self {
        Self { file, store }
    }

    /// Deduplicate `records` and persist the new ones.
    ///
    /// The store connection is opened here and dropped before returning.
    pub fn persist(&self, records: Vec<ProjectRecord>) -> SinkSummary {
        let mut summary = SinkSummary {
            found: records.len(),
            ..Default::default()
        };

        let existing = match &self.file {
            Some(file) => match file.load() {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("{}", e);
                    summary.errors.push(e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        let mut known = KnownUrlSet::from_entries(&existing);

        let mut store = match &self.store {
            Some(config) => match SqliteStore::open(config) {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("{}", e);
                    summary.errors.push(e);
                    None
                }
            },
            None => None,
        };

        // The store is deduplicated against its own contents, not the file's.
        let store_known = store.as_ref().and_then(|store| match store.known_urls() {
            Ok(urls) => Some(urls),
            Err(e) => {
                warn!("{}", e);
                summary.errors.push(e);
                None
            }
        });
        if self.file.is_none() {
            if let Some(urls) = &store_known {
                known.extend(urls.clone());
            }
        }

        let batch = collapse(records);
        let store_pending: Vec<ProjectRecord> = if store.is_some() {
            batch
                .unique
                .iter()
                .filter(|record| match (&store_known, record.dedup_key()) {
                    (Some(urls), Some(url)) => !urls.contains(url),
                    _ => true,
                })
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let merge = partition(batch, &mut known);
        summary.already_known = merge.already_known;
        summary.without_url = merge.without_url;
        summary.newly_added = merge.accepted.len();
        info!(
            "{} record(s): {} new, {} already known, {} without URL",
            summary.found, summary.newly_added, summary.already_known, summary.without_url
        );

        if let Some(file) = &self.file {
            match write_file(file, existing, &merge.accepted) {
                Ok(total) => summary.total_persisted = Some(total),
                Err(e) => {
                    warn!("{}", e);
                    summary.errors.push(e);
                }
            }
        }

        if let Some(store) = store.as_mut() {
            match store.insert_new(&store_pending) {
                Ok(n) => summary.store_inserted = Some(n),
                Err(e) => {
                    warn!("{}", e);
                    summary.errors.push(e);
                }
            }
        }

        summary
    }
}

fn write_file(
    file: &JsonFile,
    mut entries: Vec<Value>,
    accepted: &[ProjectRecord],
) -> Result<usize, SinkError> {
    for record in accepted {
        entries.push(serde_json::to_value(record)?);
    }
    file.write(&entries)?;
    Ok(entries.len())
}
