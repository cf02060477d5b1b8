use crate::errors::Result;
use crate::teaching::WeaknessSignature;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

/// Most signatures the history retains; appending past this evicts the
/// oldest entry, ring-buffer style.
pub const HISTORY_CAPACITY: usize = 50;

/// Append-only view of the persisted weakness-signature history.
///
/// The public surface is deliberately `append`/`read` only — there is no
/// delete or clear, so no caller can reset a player's learning history
/// through this interface. Administrative resets live outside the API
/// entirely. Appending an existing key overwrites it (last write wins);
/// the data is advisory coaching information, not transactionally
/// critical.
pub trait SignatureStore {
    /// Insert or overwrite the signature under its key.
    fn append(&mut self, signature: &WeaknessSignature) -> Result<()>;

    /// The top `limit` signatures by teaching priority, ranked 1..=N.
    fn read_top(&self, limit: usize) -> Result<Vec<WeaknessSignature>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Upsert key: one entry per category and game phase.
fn signature_key(signature: &WeaknessSignature) -> String {
    format!(
        "{:?}/{:?}",
        signature.category, signature.fingerprint.phase
    )
}

fn rank_by_priority(mut signatures: Vec<WeaknessSignature>, limit: usize) -> Vec<WeaknessSignature> {
    let now = Utc::now();
    signatures.sort_by(|a, b| {
        b.teaching_priority(now)
            .partial_cmp(&a.teaching_priority(now))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    signatures.truncate(limit);
    for (i, signature) in signatures.iter_mut().enumerate() {
        signature.priority_rank = i as u32 + 1;
    }
    signatures
}

/// SQLite-backed signature history for cross-session persistence.
pub struct SqliteSignatureStore {
    conn: Connection,
}

impl SqliteSignatureStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute("PRAGMA foreign_keys=ON", [])?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS signature_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL UNIQUE,
                signature BLOB NOT NULL,
                recorded_at INTEGER NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signature_recorded
             ON signature_history(recorded_at)",
            [],
        )?;
        Ok(())
    }
}

impl SignatureStore for SqliteSignatureStore {
    fn append(&mut self, signature: &WeaknessSignature) -> Result<()> {
        let blob = bincode::serialize(signature)?;
        let recorded_at = Utc::now().timestamp();

        self.conn.execute(
            "INSERT INTO signature_history (key, signature, recorded_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 signature = excluded.signature,
                 recorded_at = excluded.recorded_at",
            params![signature_key(signature), blob, recorded_at],
        )?;

        // Ring bound: drop the oldest rows past capacity
        self.conn.execute(
            "DELETE FROM signature_history WHERE id NOT IN (
                 SELECT id FROM signature_history ORDER BY id DESC LIMIT ?1
             )",
            params![HISTORY_CAPACITY as i64],
        )?;

        Ok(())
    }

    fn read_top(&self, limit: usize) -> Result<Vec<WeaknessSignature>> {
        let mut stmt = self
            .conn
            .prepare("SELECT signature FROM signature_history")?;
        let rows = stmt.query_map([], |row| {
            let blob: Vec<u8> = row.get(0)?;
            bincode::deserialize::<WeaknessSignature>(&blob).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Blob,
                    Box::new(e),
                )
            })
        })?;

        let signatures = rows.collect::<rusqlite::Result<Vec<WeaknessSignature>>>()?;
        Ok(rank_by_priority(signatures, limit))
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM signature_history", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }
}

/// In-memory signature history, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemorySignatureStore {
    entries: Vec<(String, WeaknessSignature)>,
}

impl InMemorySignatureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignatureStore for InMemorySignatureStore {
    fn append(&mut self, signature: &WeaknessSignature) -> Result<()> {
        let key = signature_key(signature);
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = signature.clone();
        } else {
            self.entries.push((key, signature.clone()));
            if self.entries.len() > HISTORY_CAPACITY {
                self.entries.remove(0);
            }
        }
        Ok(())
    }

    fn read_top(&self, limit: usize) -> Result<Vec<WeaknessSignature>> {
        let signatures = self.entries.iter().map(|(_, s)| s.clone()).collect();
        Ok(rank_by_priority(signatures, limit))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}
