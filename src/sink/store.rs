//! SQLite document store.
//!
//! A connection string names a directory (optionally `sqlite:`-prefixed) or
//! an explicit `.db` file. The database name picks `<dir>/<database>.db`
//! and each collection is a table keyed by canonical URL.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{KnownUrlSet, SinkError};
use crate::models::ProjectRecord;

/// Where the document store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory or `.db` file, optionally prefixed with `sqlite:`.
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_database() -> String {
    "agency_projects".to_string()
}

fn default_collection() -> String {
    "projects".to_string()
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: default_database(),
            collection: default_collection(),
        }
    }

    /// Resolve the database file path.
    pub fn db_path(&self) -> PathBuf {
        let raw = self.url.strip_prefix("sqlite://").or_else(|| self.url.strip_prefix("sqlite:"));
        let path = Path::new(raw.unwrap_or(&self.url));
        if path.extension().is_some_and(|ext| ext == "db" || ext == "sqlite") {
            path.to_path_buf()
        } else {
            path.join(format!("{}.db", self.database))
        }
    }
}

/// Insert-if-absent document storage.
pub trait DocumentStore {
    /// Canonical URLs already stored.
    fn known_urls(&self) -> Result<KnownUrlSet, SinkError>;

    /// Insert records whose URL is not yet stored. Returns how many were inserted.
    fn insert_new(&mut self, records: &[ProjectRecord]) -> Result<usize, SinkError>;
}

/// SQLite-backed [`DocumentStore`].
pub struct SqliteStore {
    conn: Connection,
    table: String,
}

/// Collection names become table names, so only identifiers are allowed.
fn valid_collection(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl SqliteStore {
    pub fn open(config: &StoreConfig) -> Result<Self, SinkError> {
        if !valid_collection(&config.collection) {
            return Err(SinkError::InvalidCollection(config.collection.clone()));
        }

        let path = config.db_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        debug!("Opening document store {}", path.display());
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                canonical_url TEXT PRIMARY KEY,
                title TEXT,
                source_domain TEXT NOT NULL,
                document TEXT NOT NULL,
                scraped_at TEXT NOT NULL
            );
            "#,
            table = config.collection
        ))?;

        Ok(Self {
            conn,
            table: config.collection.clone(),
        })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn in_memory(collection: &str) -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&format!(
            r#"CREATE TABLE "{}" (
                canonical_url TEXT PRIMARY KEY,
                title TEXT,
                source_domain TEXT NOT NULL,
                document TEXT NOT NULL,
                scraped_at TEXT NOT NULL
            );"#,
            collection
        ))?;
        Ok(Self {
            conn,
            table: collection.to_string(),
        })
    }

    pub fn count(&self) -> Result<usize, SinkError> {
        let n: i64 = self.conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{}""#, self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

impl DocumentStore for SqliteStore {
    fn known_urls(&self) -> Result<KnownUrlSet, SinkError> {
        let mut stmt = self
            .conn
            .prepare(&format!(r#"SELECT canonical_url FROM "{}""#, self.table))?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls.into_iter().collect())
    }

    fn insert_new(&mut self, records: &[ProjectRecord]) -> Result<usize, SinkError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                r#"INSERT INTO "{}" (canonical_url, title, source_domain, document, scraped_at)
                   VALUES (?1, ?2, ?3, ?4, ?5)
                   ON CONFLICT(canonical_url) DO NOTHING"#,
                self.table
            ))?;

            for record in records {
                let Some(url) = record.dedup_key() else {
                    continue;
                };
                let document = serde_json::to_string(record)?;
                inserted += stmt.execute(params![
                    url,
                    record.title,
                    record.source_domain,
                    document,
                    record.scraped_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;

        info!("Inserted {} new document(s) into '{}'", inserted, self.table);
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(url: &str) -> ProjectRecord {
        let mut record = ProjectRecord::new("example.com", Utc::now());
        record.title = Some(url.rsplit('/').next().unwrap_or_default().to_string());
        record.canonical_url = Some(url.to_string());
        record
    }

    #[test]
    fn test_db_path_resolution() {
        let config = StoreConfig::new("sqlite:/var/lib/folio");
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/folio/agency_projects.db"));

        let config = StoreConfig::new("/tmp/projects.db");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/projects.db"));

        let config = StoreConfig {
            database: "studio".to_string(),
            ..StoreConfig::new("data")
        };
        assert_eq!(config.db_path(), PathBuf::from("data/studio.db"));
    }

    #[test]
    fn test_insert_if_absent() {
        let mut store = SqliteStore::in_memory("projects").unwrap();

        let first = store
            .insert_new(&[record("https://example.com/a"), record("https://example.com/b")])
            .unwrap();
        assert_eq!(first, 2);

        let second = store
            .insert_new(&[record("https://example.com/b"), record("https://example.com/c")])
            .unwrap();
        assert_eq!(second, 1);
        assert_eq!(store.count().unwrap(), 3);

        let known = store.known_urls().unwrap();
        assert!(known.contains("https://example.com/c"));
        assert_eq!(known.len(), 3);
    }

    #[test]
    fn test_records_without_url_are_not_stored() {
        let mut store = SqliteStore::in_memory("projects").unwrap();
        let mut no_url = record("https://example.com/a");
        no_url.canonical_url = None;
        assert_eq!(store.insert_new(&[no_url]).unwrap(), 0);
    }

    #[test]
    fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(format!("sqlite:{}", dir.path().display()));

        {
            let mut store = SqliteStore::open(&config).unwrap();
            store.insert_new(&[record("https://example.com/a")]).unwrap();
        }

        assert!(dir.path().join("agency_projects.db").exists());
        let store = SqliteStore::open(&config).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_collection_name_is_validated() {
        let config = StoreConfig {
            collection: "projects; DROP TABLE x".to_string(),
            ..StoreConfig::new("/tmp")
        };
        assert!(matches!(
            SqliteStore::open(&config),
            Err(SinkError::InvalidCollection(_))
        ));
        assert!(valid_collection("agency_projects"));
        assert!(!valid_collection("1projects"));
    }
}
