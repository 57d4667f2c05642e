//! Bulk upload of saved JSON files into the document store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{entry_url, DocumentStore, JsonFile, SinkError, SqliteStore, StoreConfig};
use crate::models::{source_domain_of, Media, ProjectRecord};

/// Outcome of one upload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub files: usize,
    pub entries: usize,
    /// Entries with no usable project URL.
    pub skipped: usize,
    pub inserted: usize,
}

/// Expand directories into their `.json` files, sorted by name.
pub fn json_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, SinkError> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let read_err = |source: std::io::Error| SinkError::Read {
            path: path.clone(),
            source,
        };
        let mut found = Vec::new();
        for entry in std::fs::read_dir(path).map_err(read_err)? {
            let entry_path = entry.map_err(read_err)?.path();
            if entry_path.is_file() && entry_path.extension().is_some_and(|ext| ext == "json") {
                found.push(entry_path);
            }
        }
        found.sort();
        debug!("{}: {} JSON file(s)", path.display(), found.len());
        files.extend(found);
    }
    Ok(files)
}

/// Read a saved entry back into a record.
///
/// Entries written by this crate deserialize directly. Older shapes keep the
/// URL under `url` or `project_page_url` and media under `video`/`image`;
/// those are mapped field by field, with the domain taken from the URL.
pub fn record_from_entry(entry: &Value, uploaded_at: DateTime<Utc>) -> Option<ProjectRecord> {
    if let Ok(record) = serde_json::from_value::<ProjectRecord>(entry.clone()) {
        return record.dedup_key().is_some().then_some(record);
    }

    let url = entry_url(entry)?;
    let parsed = Url::parse(url).ok()?;
    let text = |key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let scraped_at = text("scraped_at")
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(uploaded_at);

    let mut record = ProjectRecord::new(source_domain_of(&parsed), scraped_at);
    record.canonical_url = Some(url.to_string());
    record.title = text("title");
    record.description = text("description");
    record.media = text("video")
        .map(Media::video)
        .or_else(|| text("image").map(Media::image));

    match entry.get("categories") {
        Some(Value::Array(labels)) => labels
            .iter()
            .filter_map(Value::as_str)
            .for_each(|label| record.push_category(label)),
        _ => {
            if let Some(label) = text("category") {
                record.push_category(&label);
            }
        }
    }

    Some(record)
}

fn load_records(
    path: &Path,
    uploaded_at: DateTime<Utc>,
    summary: &mut UploadSummary,
) -> Result<Vec<ProjectRecord>, SinkError> {
    let entries = JsonFile::new(path).load()?;
    summary.files += 1;
    summary.entries += entries.len();

    let records: Vec<ProjectRecord> = entries
        .iter()
        .filter_map(|entry| record_from_entry(entry, uploaded_at))
        .collect();
    let skipped = entries.len() - records.len();
    if skipped > 0 {
        warn!("{}: {} entr(ies) without a usable URL skipped", path.display(), skipped);
    }
    summary.skipped += skipped;
    Ok(records)
}

/// Insert every entry of the given files (or directories of `.json` files)
/// that the store does not hold yet.
pub fn upload(paths: &[PathBuf], config: &StoreConfig) -> Result<UploadSummary, SinkError> {
    let files = json_files(paths)?;
    let mut store = SqliteStore::open(config)?;
    let uploaded_at = Utc::now();
    let mut summary = UploadSummary::default();

    for path in &files {
        let records = load_records(path, uploaded_at, &mut summary)?;
        summary.inserted += store.insert_new(&records)?;
    }

    info!(
        "Uploaded {} file(s): {} entries, {} inserted",
        summary.files, summary.entries, summary.inserted
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(path: &Path, entries: Value) {
        std::fs::write(path, serde_json::to_string_pretty(&entries).unwrap()).unwrap();
    }

    #[test]
    fn test_legacy_entry_is_mapped() {
        let entry = json!({
            "title": "Harbor",
            "project_page_url": "https://www.pentagram.com/work/harbor",
            "video": "https://player.vimeo.com/video/42",
            "category": "Culture"
        });
        let record = record_from_entry(&entry, Utc::now()).unwrap();

        assert_eq!(record.canonical_url.as_deref(), Some("https://www.pentagram.com/work/harbor"));
        assert_eq!(record.source_domain, "pentagram.com");
        assert_eq!(record.media, Some(Media::video("https://player.vimeo.com/video/42")));
        assert_eq!(record.categories, vec!["Culture"]);

        assert!(record_from_entry(&json!({"title": "No link"}), Utc::now()).is_none());
    }

    #[test]
    fn test_upload_directory_inserts_only_absent() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir(&data).unwrap();

        let mut saved = ProjectRecord::new("koto.studio", Utc::now());
        saved.canonical_url = Some("https://koto.studio/work/a".to_string());
        write(&data.join("koto.studio.json"), json!([saved]));
        write(
            &data.join("pentagram.com.json"),
            json!([
                {"title": "B", "url": "https://www.pentagram.com/work/b"},
                {"title": "Untitled"}
            ]),
        );
        std::fs::write(data.join("notes.txt"), "not json").unwrap();

        let config = StoreConfig::new(dir.path().join("store").display().to_string());
        let summary = upload(&[data.clone()], &config).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.inserted, 2);

        let again = upload(&[data], &config).unwrap();
        assert_eq!(again.inserted, 0);

        let store = SqliteStore::open(&config).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.known_urls().unwrap().contains("https://www.pentagram.com/work/b"));
    }

    #[test]
    fn test_single_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("agency_projects.json");
        write(&file, json!([{"canonical_url": "https://studio.example/work/c"}]));

        assert_eq!(json_files(&[file.clone()]).unwrap(), vec![file.clone()]);

        let config = StoreConfig::new(dir.path().display().to_string());
        assert_eq!(upload(&[file], &config).unwrap().inserted, 1);
    }
}
