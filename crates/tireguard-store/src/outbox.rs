//! Crash-resistant FIFO queue of pending backing-store writes
//!
//! Entries live in `outbox.jsonl`, one JSON object per line. Every mutation
//! rewrites the file through a temp file + fsync + rename, so a crash leaves
//! either the old or the new queue on disk, never a torn one.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tireguard_types::{Error, Result};

const OUTBOX_FILE: &str = "outbox.jsonl";

/// A typed write that can be replayed against the backing store
pub trait OutboxCommand: Serialize + DeserializeOwned + Clone {
    /// Short operation name for logs and status output
    fn operation(&self) -> &'static str;

    /// Stable key identifying this exact write. Replaying the same key twice
    /// must leave the backing store unchanged.
    fn idempotency_key(&self) -> String;
}

/// One not-yet-delivered write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry<C> {
    pub id: Uuid,
    pub idempotency_key: String,
    pub command: C,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Persistent outbox
pub struct Outbox<C> {
    path: PathBuf,
    entries: Mutex<Vec<OutboxEntry<C>>>,
}

impl<C: OutboxCommand> Outbox<C> {
    /// Create or load the outbox in `dir`
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        let path = dir.join(OUTBOX_FILE);

        let entries = if path.exists() {
            read_entries(&path)?
        } else {
            Vec::new()
        };

        if !entries.is_empty() {
            tracing::info!("Outbox loaded with {} pending write(s)", entries.len());
        }

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutboxEntry<C>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a command. Succeeds without any network access.
    ///
    /// A command whose idempotency key is already queued is not added again;
    /// the existing entry id is returned.
    pub fn enqueue(&self, command: C) -> Result<Uuid> {
        let key = command.idempotency_key();
        let mut entries = self.lock();

        if let Some(existing) = entries.iter().find(|e| e.idempotency_key == key) {
            return Ok(existing.id);
        }

        let entry = OutboxEntry {
            id: Uuid::new_v4(),
            idempotency_key: key,
            command,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        };
        let id = entry.id;
        let operation = entry.command.operation();
        entries.push(entry);

        if let Err(e) = write_entries(&self.path, &entries) {
            entries.pop();
            return Err(e);
        }

        tracing::debug!("Queued {} ({} pending)", operation, entries.len());
        Ok(id)
    }

    /// Oldest pending entry, if any
    pub fn front(&self) -> Option<OutboxEntry<C>> {
        self.lock().first().cloned()
    }

    /// Remove an entry after its write was confirmed
    pub fn complete(&self, id: Uuid) -> Result<bool> {
        let mut entries = self.lock();
        let Some(index) = entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };

        let removed = entries.remove(index);
        if let Err(e) = write_entries(&self.path, &entries) {
            entries.insert(index, removed);
            return Err(e);
        }
        Ok(true)
    }

    /// Keep a failed entry queued and remember why it failed
    pub fn record_failure(&self, id: Uuid, error: &str) -> Result<()> {
        let mut entries = self.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
            write_entries(&self.path, &entries)?;
        }
        Ok(())
    }

    /// Snapshot of all pending entries in enqueue order
    pub fn pending(&self) -> Vec<OutboxEntry<C>> {
        self.lock().clone()
    }

    /// Most recently queued command matching `pred`
    pub fn find_latest<F>(&self, pred: F) -> Option<C>
    where
        F: Fn(&C) -> bool,
    {
        self.lock()
            .iter()
            .rev()
            .find(|e| pred(&e.command))
            .map(|e| e.command.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn read_entries<C: DeserializeOwned>(path: &Path) -> Result<Vec<OutboxEntry<C>>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry = serde_json::from_str(trimmed).map_err(|e| {
            Error::InvalidState(format!(
                "{} line {}: {}",
                path.display(),
                line_no + 1,
                e
            ))
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

fn write_entries<C: Serialize>(path: &Path, entries: &[OutboxEntry<C>]) -> Result<()> {
    let tmp_path = path.with_extension("jsonl.tmp");

    let write_result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for entry in entries {
            let line = serde_json::to_string(entry)?;
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
