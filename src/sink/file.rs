//! JSON array file sink.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::SinkError;

/// Keys older record shapes used for the project URL.
const URL_KEYS: &[&str] = &["canonical_url", "url", "project_page_url"];

/// Pretty-printed JSON array of records, read whole and rewritten whole.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Existing entries, verbatim.
    ///
    /// A missing or empty file is an empty list. Unparseable content or a
    /// non-array document is logged and treated as empty; it will be
    /// overwritten on the next write.
    pub fn load(&self) -> Result<Vec<Value>, SinkError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SinkError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) => {
                warn!(
                    "{} does not contain a JSON array; starting fresh",
                    self.path.display()
                );
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(
                    "{} is not valid JSON ({}); starting fresh",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Replace the file with `entries` via a temp file in the same directory.
    pub fn write(&self, entries: &[Value]) -> Result<(), SinkError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let write_err = |source: std::io::Error| SinkError::Write {
            path: self.path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(write_err)?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        serde_json::to_writer_pretty(&mut tmp, entries)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Wrote {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// Dedup key of a stored entry, whatever shape it was written in.
pub fn entry_url(entry: &Value) -> Option<&str> {
    URL_KEYS
        .iter()
        .filter_map(|key| entry.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_empty_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("projects.json"));
        assert!(file.load().unwrap().is_empty());

        std::fs::write(file.path(), "  \n").unwrap();
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("projects.json"));

        std::fs::write(file.path(), "[{\"title\": ").unwrap();
        assert!(file.load().unwrap().is_empty());

        std::fs::write(file.path(), "{\"title\": \"x\"}").unwrap();
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn test_write_is_pretty_and_reloadable() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested/projects.json"));
        let entries = vec![json!({"title": "A", "canonical_url": "https://a.com/1"})];

        file.write(&entries).unwrap();

        let raw = std::fs::read_to_string(file.path()).unwrap();
        assert!(raw.starts_with("[\n  {"));
        assert_eq!(file.load().unwrap(), entries);
    }

    #[test]
    fn test_entry_url_accepts_legacy_keys() {
        assert_eq!(
            entry_url(&json!({"canonical_url": "https://a.com/1"})),
            Some("https://a.com/1")
        );
        assert_eq!(entry_url(&json!({"url": " https://a.com/2 "})), Some("https://a.com/2"));
        assert_eq!(
            entry_url(&json!({"project_page_url": "https://a.com/3"})),
            Some("https://a.com/3")
        );
        assert_eq!(entry_url(&json!({"canonical_url": null, "title": "x"})), None);
        assert_eq!(entry_url(&json!({"canonical_url": ""})), None);
    }
}
