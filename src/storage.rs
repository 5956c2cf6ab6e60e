// Key-value storage backends for the persisted task list

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Minimal string key-value service the store persists through
pub trait KeyValueStorage {
    /// Read the value stored under `key`, `None` when absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Validate a storage key so it is safe to use as a file name
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(eyre!("Storage key cannot be empty"));
    }
    if key.chars().count() > 64 {
        return Err(eyre!("Storage key too long: {} (max 64 chars)", key));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid storage key: {} (must be alphanumeric with _/-)", key));
    }
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

/// HashMap-backed storage; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    /// Make every subsequent `set` fail, e.g. to mimic a full quota
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(eyre!("Storage unavailable"));
        }
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(eyre!("Storage quota exceeded"));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// Directory of files
// ============================================================================

/// One `<key>.json` file per key inside a directory
///
/// Writes go through a temp file and a rename, under an exclusive lock on
/// `<key>.lock`, so readers never observe a half-written value.
#[derive(Debug)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Open or create a storage directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create storage directory")?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.lock", key))
    }

    fn lock_file(&self, key: &str) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path(key))
            .context("Failed to open lock file")
    }

    /// Lock file for readers; `None` when it neither exists nor can be created
    fn read_lock_file(&self, key: &str) -> Option<File> {
        let path = self.lock_path(key);
        if path.exists() {
            return File::open(&path).ok();
        }
        self.lock_file(key).ok()
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let path = self.value_path(key);
        if !path.exists() {
            return Ok(None);
        }

        // A read-only directory may not allow a lock file; read unlocked then
        let lock = self.read_lock_file(key);
        match &lock {
            Some(file) => FileExt::lock_shared(file).context("Failed to acquire shared lock")?,
            None => debug!(key, "No lock file available, reading without lock"),
        }

        let value = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        debug!(key, bytes = value.len(), "Read value from file storage");

        // Lock is released when `lock` is dropped
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.value_path(key);
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));

        let lock = self.lock_file(key)?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        let mut tmp = File::create(&tmp_path).context("Failed to create temp file")?;
        tmp.write_all(value.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!(key, bytes = value.len(), "Wrote value to file storage");

        Ok(())
    }
}

// ============================================================================
// SQLite
// ============================================================================

/// Key-value table in a SQLite database
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    /// Open or create a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        Self::with_connection(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(db)
    }

    fn with_connection(db: Connection) -> Result<Self> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create kv table")?;
        Ok(Self { db })
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.db.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}
