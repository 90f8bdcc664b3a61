use super::{CorpusEntry, CorpusSource};
use crate::error::{DedupError, Result};
use crate::hash::ImageHash;
use crate::record::Candidate;
use crate::similarity::Fingerprint;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CAPTIONS_TABLE: &str = "captions";

/// Corpus persisted in a SQLite database, one row per accepted record.
pub struct SqliteCorpus {
    path: PathBuf,
}

impl SqliteCorpus {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open for reading without creating anything. `None` if the database file is missing.
    fn open_existing(&self) -> Result<Option<Connection>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Some(conn))
    }

    fn has_captions_table(conn: &Connection) -> Result<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![CAPTIONS_TABLE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn initialize_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS captions (
                id INTEGER PRIMARY KEY,
                caption TEXT,
                image_hash TEXT,
                image_url TEXT,
                caption_url TEXT,
                scrape_time TEXT,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Number of persisted records, or `None` if the corpus does not exist yet.
    pub fn count(&self) -> Result<Option<i64>> {
        let Some(conn) = self.open_existing()? else {
            return Ok(None);
        };
        if !Self::has_captions_table(&conn)? {
            return Ok(None);
        }
        let count = conn.query_row("SELECT COUNT(*) FROM captions", [], |row| row.get(0))?;
        Ok(Some(count))
    }

    /// Append accepted records in a single transaction, creating the corpus if needed.
    ///
    /// Records are validated before anything is written.
    pub fn append(&self, records: &[Candidate]) -> Result<usize> {
        let hashes = records
            .iter()
            .map(|r| r.fingerprint().map(|fp| fp.hash.map(|h| h.to_hex())))
            .collect::<Result<Vec<_>>>()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&self.path)?;
        Self::initialize_schema(&conn)?;

        let created_at = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO captions
                 (caption, image_hash, image_url, caption_url, scrape_time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (record, hash) in records.iter().zip(&hashes) {
                stmt.execute(params![
                    record.caption(),
                    hash,
                    record.image_url(),
                    record.caption_url(),
                    record.scrape_time(),
                    created_at,
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "Stored {} record(s) in {}",
            records.len(),
            self.path.display()
        );
        Ok(records.len())
    }
}

impl CorpusSource for SqliteCorpus {
    fn load(&self) -> Result<Option<Vec<CorpusEntry>>> {
        let Some(conn) = self.open_existing()? else {
            debug!("No corpus database at {}", self.path.display());
            return Ok(None);
        };
        if !Self::has_captions_table(&conn)? {
            debug!("Corpus database {} has no captions table", self.path.display());
            return Ok(None);
        }

        let mut stmt = conn.prepare("SELECT id, image_hash, caption FROM captions ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, image_hash, caption) = row?;
            let hash = ImageHash::parse_field(image_hash.as_deref()).map_err(|e| {
                DedupError::MalformedCorpusRecord {
                    id,
                    reason: format!("invalid image_hash: {}", e),
                }
            })?;
            entries.push(CorpusEntry::new(id, Fingerprint::new(hash, caption)));
        }

        debug!(
            "Loaded {} corpus record(s) from {}",
            entries.len(),
            self.path.display()
        );
        Ok(Some(entries))
    }
}
