//! # Load Store
//!
//! The external, mutable store that holds every beam load of the model,
//! grouped by element. The applier reads it once per apply call and writes
//! back whole per-element record sets in batches.
//!
//! Existing records are treated as opaque JSON objects: the only fields ever
//! read are `id` and `load_case`, and everything else passes through a
//! merge untouched. New records are built from [`BeamLoadItem`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{LoadError, LoadResult};
use crate::loads::{is_significant, LoadDirection};
use crate::model::ElementId;

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Every element's records, as read from a store
pub type StoreSnapshot = BTreeMap<ElementId, Vec<StoredRecord>>;

/// One write call: the complete merged record set of each listed element
pub type StoreBatch = BTreeMap<ElementId, Vec<StoredRecord>>;

/// Read/write access to the external load store.
pub trait LoadStore {
    /// Read every element's records
    fn read_all(&mut self) -> LoadResult<StoreSnapshot>;

    /// Replace the record sets of the batch's elements; other elements are untouched
    fn write_batch(&mut self, batch: &StoreBatch) -> LoadResult<()>;
}

impl<S: LoadStore + ?Sized> LoadStore for &mut S {
    fn read_all(&mut self) -> LoadResult<StoreSnapshot> {
        (**self).read_all()
    }

    fn write_batch(&mut self, batch: &StoreBatch) -> LoadResult<()> {
        (**self).write_batch(batch)
    }
}

/// An opaque load record as held by the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredRecord(pub Map<String, Value>);

/// Largest float below which every whole number is exact (2^53)
const MAX_EXACT_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

impl StoredRecord {
    /// Record with just an id and a load case
    pub fn new(id: u64, load_case: &str) -> Self {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(id));
        map.insert("load_case".to_string(), Value::from(load_case));
        StoredRecord(map)
    }

    /// Record id, from an integer or an integer-like string.
    ///
    /// Float ids count only when they are whole and exactly representable.
    pub fn id(&self) -> Option<u64> {
        match self.0.get("id")? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && (0.0..=MAX_EXACT_FLOAT_ID).contains(f))
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Trimmed load case tag
    pub fn load_case(&self) -> Option<&str> {
        self.0.get("load_case").and_then(Value::as_str).map(str::trim)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl TryFrom<&BeamLoadItem> for StoredRecord {
    type Error = LoadError;

    fn try_from(item: &BeamLoadItem) -> Result<Self, Self::Error> {
        match serde_json::to_value(item).map_err(|e| LoadError::serialization(e.to_string()))? {
            Value::Object(map) => Ok(StoredRecord(map)),
            other => Err(LoadError::Internal {
                message: format!("beam load item serialized to {}", other),
            }),
        }
    }
}

/// Eccentric application of a beam load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eccentricity {
    pub direction: LoadDirection,
    pub eccentricity_type: u8,
    pub i_end: f64,
    pub j_end: f64,
}

/// A uniform beam load record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamLoadItem {
    pub id: u64,
    pub load_case: String,
    pub load_group: String,
    pub command: String,
    pub load_type: String,
    pub direction: LoadDirection,
    pub use_projection: bool,
    /// Relative start/end positions along the element
    pub positions: [f64; 2],
    /// Load at the start/end positions
    pub magnitudes: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eccentricity: Option<Eccentricity>,
}

impl BeamLoadItem {
    /// Full-length uniform load `q`; the eccentricity block is only set when |e| > EPS
    pub fn uniform(
        id: u64,
        load_case: impl Into<String>,
        load_group: impl Into<String>,
        direction: LoadDirection,
        q: f64,
        eccentricity: f64,
    ) -> Self {
        BeamLoadItem {
            id,
            load_case: load_case.into(),
            load_group: load_group.into(),
            command: "BEAM".to_string(),
            load_type: "UNILOAD".to_string(),
            direction,
            use_projection: false,
            positions: [0.0, 1.0],
            magnitudes: [q, q],
            eccentricity: is_significant(eccentricity).then_some(Eccentricity {
                direction: LoadDirection::GlobalZ,
                eccentricity_type: 1,
                i_end: eccentricity,
                j_end: eccentricity,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_forms() {
        let r: StoredRecord = serde_json::from_str(r#"{"id": 7, "load_case": " DEAD "}"#).unwrap();
        assert_eq!(r.id(), Some(7));
        assert_eq!(r.load_case(), Some("DEAD"));

        let r: StoredRecord = serde_json::from_str(r#"{"id": "12"}"#).unwrap();
        assert_eq!(r.id(), Some(12));

        let r: StoredRecord = serde_json::from_str(r#"{"id": 3.0}"#).unwrap();
        assert_eq!(r.id(), Some(3));

        let r: StoredRecord = serde_json::from_str(r#"{"id": 1e30}"#).unwrap();
        assert_eq!(r.id(), None);

        let r: StoredRecord = serde_json::from_str(r#"{"id": "x", "load_case": 3}"#).unwrap();
        assert_eq!(r.id(), None);
        assert_eq!(r.load_case(), None);
    }

    #[test]
    fn test_uniform_item_record() {
        let item = BeamLoadItem::uniform(3, "WL_Q1", "WL_Q1", LoadDirection::LocalY, -0.2, 6.0);
        let record = StoredRecord::try_from(&item).unwrap();
        assert_eq!(record.id(), Some(3));
        assert_eq!(record.load_case(), Some("WL_Q1"));
        assert_eq!(record.get("command"), Some(&Value::from("BEAM")));
        assert_eq!(record.get("direction"), Some(&Value::from("LY")));
        assert_eq!(
            record.get("eccentricity").and_then(|e| e.get("direction")),
            Some(&Value::from("GZ"))
        );
    }

    #[test]
    fn test_no_eccentricity_block_for_zero() {
        let item = BeamLoadItem::uniform(1, "WS", "WS", LoadDirection::LocalZ, 0.1, 0.0);
        assert!(item.eccentricity.is_none());
        let record = StoredRecord::try_from(&item).unwrap();
        assert!(record.get("eccentricity").is_none());
    }

    #[test]
    fn test_unknown_fields_survive() {
        let json = r#"{"id": 1, "load_case": "DEAD", "vendor_flag": [1, 2, {"x": null}]}"#;
        let r: StoredRecord = serde_json::from_str(json).unwrap();
        let back: Value = serde_json::to_value(&r).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(json).unwrap());
    }
}
