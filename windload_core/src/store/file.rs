//! JSON file load store
//!
//! File layout, keyed by element id:
//!
//! ```json
//! {
//!   "101": { "items": [ { "id": 1, "load_case": "DEAD", ... } ] },
//!   "102": { "items": [] }
//! }
//! ```
//!
//! The store holds an exclusive [`FileLock`] for its whole lifetime and
//! every batch is an atomic save of the whole file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{LoadError, LoadResult};
use crate::file_io::{read_json, write_json_atomic, FileLock};
use crate::model::ElementId;

use super::{LoadStore, StoreBatch, StoreSnapshot, StoredRecord};

/// One element's block in the file. Unknown keys are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ElementBlock {
    #[serde(default)]
    items: Vec<StoredRecord>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

type FileContents = BTreeMap<String, ElementBlock>;

/// Load store persisted as one JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    lock: FileLock,
}

impl JsonFileStore {
    /// Lock `path` and open it as a store. A missing file is an empty store.
    pub fn open(path: &Path, user_id: impl Into<String>) -> LoadResult<Self> {
        let lock = FileLock::acquire(path, user_id)?;
        if !path.exists() {
            write_json_atomic(&FileContents::new(), path)?;
        }
        tracing::info!(path = %path.display(), "load store opened");
        Ok(JsonFileStore {
            path: path.to_path_buf(),
            lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn locked_by(&self) -> &str {
        &self.lock.info.user_id
    }

    fn load(&self) -> LoadResult<FileContents> {
        read_json(&self.path)
    }
}

/// File keys grouped by the element they parse to, in key order
fn keys_by_element(contents: &FileContents) -> BTreeMap<ElementId, Vec<String>> {
    let mut keys: BTreeMap<ElementId, Vec<String>> = BTreeMap::new();
    for key in contents.keys() {
        match ElementId::parse(key) {
            Some(eid) => keys.entry(eid).or_default().push(key.clone()),
            None => {
                tracing::warn!(key = %key, "ignoring store entry with a non-numeric element id")
            }
        }
    }
    keys
}

impl LoadStore for JsonFileStore {
    /// Blocks whose keys parse to the same element are read as one record list.
    fn read_all(&mut self) -> LoadResult<StoreSnapshot> {
        let mut contents = self.load()?;
        let mut snapshot = StoreSnapshot::new();
        for (eid, keys) in keys_by_element(&contents) {
            if keys.len() > 1 {
                tracing::warn!(element = %eid, ?keys, "several store keys name the same element");
            }
            let records = snapshot.entry(eid).or_default();
            for key in keys {
                if let Some(block) = contents.remove(&key) {
                    records.extend(block.items);
                }
            }
        }
        Ok(snapshot)
    }

    /// Each element is written under its first existing key; alias keys are
    /// folded into it, since their records are part of the batch already.
    fn write_batch(&mut self, batch: &StoreBatch) -> LoadResult<()> {
        let store_error = |e: LoadError| LoadError::store("write_batch", e.to_string(), 0, 0);

        let mut contents = self.load().map_err(store_error)?;
        let mut keys = keys_by_element(&contents);
        for (eid, records) in batch {
            let aliases = keys.remove(eid).unwrap_or_default();
            let target = aliases.first().cloned().unwrap_or_else(|| eid.to_string());

            let mut block = contents.remove(&target).unwrap_or_default();
            for alias in aliases.iter().skip(1) {
                if let Some(extra_block) = contents.remove(alias) {
                    for (k, v) in extra_block.extra {
                        block.extra.entry(k).or_insert(v);
                    }
                }
            }
            block.items = records.clone();
            contents.insert(target, block);
        }
        write_json_atomic(&contents, &self.path).map_err(store_error)
    }
}
