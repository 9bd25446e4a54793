//! One JSON array document per table
//!
//! The file is re-read on every call so separate processes sharing a store
//! directory see each other's writes. Writes go through a temp file and a
//! rename so a crash never leaves a half-written table.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use tireguard_types::{Error, Result};

pub struct JsonTable<T> {
    dir: PathBuf,
    path: PathBuf,
    lock: Mutex<()>,
    _row: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonTable<T> {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str) -> Self {
        let dir = dir.into();
        let path = dir.join(file_name);
        Self {
            dir,
            path,
            lock: Mutex::new(()),
            _row: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows currently on disk
    pub fn load(&self) -> Result<Vec<T>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_rows()
    }

    /// Read, modify and write back the table under the table lock
    pub fn update<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> Result<R> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut rows = self.read_rows()?;
        let result = f(&mut rows);
        self.write_rows(&rows)?;
        Ok(result)
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(Error::transient(format!(
                "store directory {} is not available",
                self.dir.display()
            )))
        }
    }

    fn read_rows(&self) -> Result<Vec<T>> {
        self.ensure_reachable()?;
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::transient(e)),
        };
        let rows = serde_json::from_reader(BufReader::new(file))?;
        Ok(rows)
    }

    fn write_rows(&self, rows: &[T]) -> Result<()> {
        self.ensure_reachable()?;
        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush()?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::transient(e)
        })
    }
}
