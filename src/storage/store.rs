//! JSON file backed key/value store.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::storage::StorageError;

pub type Buckets = BTreeMap<String, BTreeMap<String, Value>>;

const STORE_FILE: &str = "node.json";

/// Bucketed storage used by every component that persists state.
pub trait PersistentStore: Send + Sync {
    fn put(&self, bucket: &str, key: &str, value: Value) -> Result<(), StorageError>;
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>, StorageError>;
    fn get_all(&self, bucket: &str) -> Result<Vec<(String, Value)>, StorageError>;
    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
    fn close(&self) -> Result<(), StorageError>;
}

/// Store persisted as a single JSON document.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    /// `None` once closed.
    buckets: Mutex<Option<Buckets>>,
}

impl JsonStore {
    /// Open (or create) the store inside `dir`.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);

        let buckets = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader(reader)?
        } else {
            Buckets::new()
        };

        tracing::info!(path = %path.display(), buckets = buckets.len(), "Storage opened");

        let store = Self {
            path,
            buckets: Mutex::new(Some(buckets)),
        };
        store.with_buckets(|b| write_file(&store.path, b))?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub(crate) fn with_buckets<T>(
        &self,
        f: impl FnOnce(&mut Buckets) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let buckets = guard.as_mut().ok_or(StorageError::Closed)?;
        f(buckets)
    }

    fn mutate(&self, f: impl FnOnce(&mut Buckets)) -> Result<(), StorageError> {
        self.with_buckets(|buckets| {
            f(buckets);
            write_file(&self.path, buckets)
        })
    }
}

impl PersistentStore for JsonStore {
    fn put(&self, bucket: &str, key: &str, value: Value) -> Result<(), StorageError> {
        self.mutate(|buckets| {
            buckets
                .entry(bucket.to_string())
                .or_default()
                .insert(key.to_string(), value);
        })
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>, StorageError> {
        self.with_buckets(|buckets| Ok(buckets.get(bucket).and_then(|b| b.get(key)).cloned()))
    }

    fn get_all(&self, bucket: &str) -> Result<Vec<(String, Value)>, StorageError> {
        self.with_buckets(|buckets| {
            Ok(buckets
                .get(bucket)
                .map(|b| b.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default())
        })
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.mutate(|buckets| {
            if let Some(b) = buckets.get_mut(bucket) {
                b.remove(key);
            }
        })
    }

    fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let buckets = guard.take().ok_or(StorageError::Closed)?;
        write_file(&self.path, &buckets)?;
        tracing::info!(path = %self.path.display(), "Storage closed");
        Ok(())
    }
}

pub(crate) fn write_file(path: &Path, buckets: &Buckets) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, buckets)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
