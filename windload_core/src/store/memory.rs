//! In-process load store

use std::collections::BTreeMap;

use crate::errors::{LoadError, LoadResult};
use crate::model::ElementId;

use super::{LoadStore, StoreBatch, StoreSnapshot, StoredRecord};

/// Load store held in memory.
///
/// Keeps a log of every write so callers can inspect batch partitioning,
/// and can be told to fail once a number of batches have succeeded.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<ElementId, Vec<StoredRecord>>,
    fail_after: Option<usize>,
    reads: usize,
    writes: Vec<Vec<ElementId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an element's records (builder pattern)
    pub fn with_records(mut self, element: ElementId, records: Vec<StoredRecord>) -> Self {
        self.records.insert(element, records);
        self
    }

    /// Fail every write after `batches` successful ones (builder pattern)
    pub fn failing_after(mut self, batches: usize) -> Self {
        self.fail_after = Some(batches);
        self
    }

    pub fn records(&self, element: ElementId) -> &[StoredRecord] {
        self.records.get(&element).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_records(&self) -> &BTreeMap<ElementId, Vec<StoredRecord>> {
        &self.records
    }

    /// Number of `read_all` calls
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Elements of each successful write, in order
    pub fn writes(&self) -> &[Vec<ElementId>] {
        &self.writes
    }
}

impl LoadStore for MemoryStore {
    fn read_all(&mut self) -> LoadResult<StoreSnapshot> {
        self.reads += 1;
        Ok(self.records.clone())
    }

    fn write_batch(&mut self, batch: &StoreBatch) -> LoadResult<()> {
        if let Some(limit) = self.fail_after {
            if self.writes.len() >= limit {
                return Err(LoadError::store(
                    "write_batch",
                    format!("store rejected batch {}", self.writes.len() + 1),
                    0,
                    0,
                ));
            }
        }

        for (eid, records) in batch {
            self.records.insert(*eid, records.clone());
        }
        self.writes.push(batch.keys().copied().collect());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_replaces_only_listed_elements() {
        let mut store = MemoryStore::new()
            .with_records(ElementId(1), vec![StoredRecord::new(1, "DEAD")])
            .with_records(ElementId(2), vec![StoredRecord::new(1, "DEAD")]);

        let mut batch = StoreBatch::new();
        batch.insert(ElementId(1), vec![StoredRecord::new(5, "WIND")]);
        store.write_batch(&batch).unwrap();

        assert_eq!(store.records(ElementId(1))[0].id(), Some(5));
        assert_eq!(store.records(ElementId(2))[0].load_case(), Some("DEAD"));
        assert_eq!(store.writes(), &[vec![ElementId(1)]]);
    }

    #[test]
    fn test_injected_failure() {
        let mut store = MemoryStore::new().failing_after(1);
        let batch = StoreBatch::new();
        assert!(store.write_batch(&batch).is_ok());
        assert!(matches!(store.write_batch(&batch), Err(LoadError::Store { .. })));
        assert_eq!(store.writes().len(), 1);
    }
}
