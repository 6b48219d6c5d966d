//! # Plan Application
//!
//! Merges a load plan into a [`LoadStore`] without disturbing unrelated
//! records:
//!
//! 1. **Normalize**: trim text, drop near-zero loads, optionally sum rows
//!    that describe the same instruction.
//! 2. **Snapshot**: read the whole store once; per element, the next id is
//!    the highest existing id + 1 (or 1).
//! 3. **Merge**: with `replace_existing`, drop existing records whose load
//!    case appears in the plan; append the new records with fresh ids.
//! 4. **Batch**: group elements so each write holds at most
//!    `max_records_per_batch` merged records. An element is never split,
//!    and an element larger than the ceiling is written alone.
//! 5. **Write**: one store call per batch, in ascending element order.
//!
//! A failed write stops the run. Earlier batches stay written, and the
//! returned [`LoadError::Store`] says how many got through.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::debug::{DebugSink, NoopSink};
use crate::errors::{LoadError, LoadResult};
use crate::loads::{is_significant, LoadDirection, PlanRow, RawPlanRow};
use crate::model::ElementId;
use crate::store::{BeamLoadItem, LoadStore, StoreBatch, StoreSnapshot, StoredRecord};

/// Default ceiling on merged records per write
pub const DEFAULT_MAX_RECORDS_PER_BATCH: usize = 5000;

static NOOP_SINK: NoopSink = NoopSink;

/// Options of one apply call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyOptions {
    /// Ceiling on merged (existing + new) records per write; values below 1 act as 1
    pub max_records_per_batch: usize,
    /// Drop existing records whose load case is in the plan
    pub replace_existing: bool,
    /// Sum rows sharing (element, case, direction, group, eccentricity)
    pub aggregate: bool,
    /// Label for debug artifacts
    pub debug_label: String,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        ApplyOptions {
            max_records_per_batch: DEFAULT_MAX_RECORDS_PER_BATCH,
            replace_existing: true,
            aggregate: true,
            debug_label: "ALL_WIND".to_string(),
        }
    }
}

impl ApplyOptions {
    pub fn ceiling(&self) -> usize {
        self.max_records_per_batch.max(1)
    }
}

/// Progress of a [`PlanApplier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApplyState {
    #[default]
    Idle,
    /// Store snapshot taken
    Loaded,
    /// Per-element record sets merged
    Merged,
    /// Elements partitioned into batches
    Batched,
    /// Every batch written (or nothing to write)
    Done,
}

/// Counts reported by one apply call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub rows_in: usize,
    pub rows_after_normalize: usize,
    pub rows_near_zero: usize,
    pub rows_aggregated_away: usize,
    pub touched_cases: Vec<String>,
    pub elements_touched: usize,
    pub replaced_records: usize,
    pub new_records_sent: usize,
    pub merged_records_written: usize,
    pub batches: usize,
    /// Batches holding a single element over the ceiling
    pub overflow_batches: usize,
    pub final_state: ApplyState,
}

/// Plan rows after normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPlan {
    /// Sorted by (element_id, load_case, load_direction)
    pub rows: Vec<PlanRow>,
    pub rows_near_zero: usize,
    pub rows_aggregated_away: usize,
}

type AggregateKey = (ElementId, String, LoadDirection, String, u64);

fn aggregate_key(row: &PlanRow) -> AggregateKey {
    // -0.0 and 0.0 are the same eccentricity
    let ecc = if row.eccentricity == 0.0 { 0.0f64 } else { row.eccentricity };
    (
        row.element_id,
        row.load_case.clone(),
        row.load_direction,
        row.load_group.clone(),
        ecc.to_bits(),
    )
}

/// Validate and clean plan rows.
///
/// Text fields are trimmed and a blank load group falls back to the load
/// case. A blank load case or a non-finite line load is a validation error;
/// a non-finite eccentricity becomes 0.
pub fn normalize_rows(rows: &[PlanRow], aggregate: bool) -> LoadResult<NormalizedPlan> {
    let mut cleaned = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let load_case = row.load_case.trim().to_string();
        if load_case.is_empty() {
            return Err(LoadError::validation(
                "plan",
                Some(index),
                "load_case",
                "<blank>",
                "load case is blank",
            ));
        }
        if !row.line_load.is_finite() {
            return Err(LoadError::validation(
                "plan",
                Some(index),
                "line_load",
                row.line_load.to_string(),
                "line load must be finite",
            ));
        }
        let load_group = match row.load_group.trim() {
            "" => load_case.clone(),
            g => g.to_string(),
        };
        cleaned.push(PlanRow {
            element_id: row.element_id,
            line_load: row.line_load,
            load_case,
            load_direction: row.load_direction,
            load_group,
            group_name: row.group_name.trim().to_string(),
            eccentricity: if row.eccentricity.is_finite() { row.eccentricity } else { 0.0 },
        });
    }

    let before = cleaned.len();
    cleaned.retain(|r| is_significant(r.line_load));
    let mut rows_near_zero = before - cleaned.len();
    let mut rows_aggregated_away = 0;

    if aggregate {
        let mut index: BTreeMap<AggregateKey, usize> = BTreeMap::new();
        let mut summed: Vec<PlanRow> = Vec::with_capacity(cleaned.len());
        for row in cleaned {
            match index.get(&aggregate_key(&row)) {
                Some(&i) => {
                    summed[i].line_load += row.line_load;
                    rows_aggregated_away += 1;
                }
                None => {
                    index.insert(aggregate_key(&row), summed.len());
                    summed.push(row);
                }
            }
        }
        let before = summed.len();
        summed.retain(|r| is_significant(r.line_load));
        rows_near_zero += before - summed.len();
        cleaned = summed;
    }

    cleaned.sort_by(|x, y| {
        x.element_id
            .cmp(&y.element_id)
            .then_with(|| x.load_case.cmp(&y.load_case))
            .then_with(|| x.load_direction.cmp(&y.load_direction))
    });

    Ok(NormalizedPlan {
        rows: cleaned,
        rows_near_zero,
        rows_aggregated_away,
    })
}

/// Convert externally edited rows, failing on the first bad row
pub fn normalize_raw_rows(rows: &[RawPlanRow]) -> LoadResult<Vec<PlanRow>> {
    rows.iter().enumerate().map(|(i, raw)| raw.normalize(i)).collect()
}

/// Next free id for an element: highest existing id + 1, or 1
pub fn next_id_for(element_id: ElementId, records: &[StoredRecord]) -> LoadResult<u64> {
    match records.iter().filter_map(StoredRecord::id).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| id_overflow(element_id, max)),
    }
}

fn id_overflow(element_id: ElementId, from: u64) -> LoadError {
    LoadError::validation(
        "store",
        None,
        "id",
        from.to_string(),
        format!("no free record id left on element {}", element_id),
    )
}

/// Merged record set of one touched element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMerge {
    pub element_id: ElementId,
    pub records: Vec<StoredRecord>,
    pub new_records: usize,
    pub replaced: usize,
}

/// Merge one element's plan rows into its existing records.
///
/// Ids are allocated upward from `next_id`.
pub fn merge_element(
    element_id: ElementId,
    existing: &[StoredRecord],
    rows: &[&PlanRow],
    next_id: u64,
    touched_cases: &BTreeSet<String>,
    replace_existing: bool,
) -> LoadResult<ElementMerge> {
    let mut records: Vec<StoredRecord> = Vec::with_capacity(existing.len() + rows.len());
    let mut replaced = 0;
    for record in existing {
        let in_plan = record.load_case().map_or(false, |case| touched_cases.contains(case));
        if replace_existing && in_plan {
            replaced += 1;
        } else {
            records.push(record.clone());
        }
    }

    for (offset, row) in rows.iter().enumerate() {
        let id = u64::try_from(offset)
            .ok()
            .and_then(|offset| next_id.checked_add(offset))
            .ok_or_else(|| id_overflow(element_id, next_id))?;
        let item = BeamLoadItem::uniform(
            id,
            row.load_case.as_str(),
            row.load_group.as_str(),
            row.load_direction,
            row.line_load,
            row.eccentricity,
        );
        records.push(StoredRecord::try_from(&item)?);
    }

    Ok(ElementMerge {
        element_id,
        records,
        new_records: rows.len(),
        replaced,
    })
}

/// Split elements into ordered batches of at most `ceiling` records.
///
/// Elements are taken in the given order. An element is never split across
/// batches, and one whose size alone exceeds the ceiling gets a batch of its
/// own. Elements with no records are skipped.
pub fn partition_batches(sizes: &[(ElementId, usize)], ceiling: usize) -> Vec<Vec<ElementId>> {
    let ceiling = ceiling.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<ElementId> = Vec::new();
    let mut current_size = 0;

    for &(eid, size) in sizes {
        if size == 0 {
            continue;
        }
        if size > ceiling {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                current_size = 0;
            }
            batches.push(vec![eid]);
            continue;
        }
        if !current.is_empty() && current_size + size > ceiling {
            batches.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.push(eid);
        current_size += size;
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Applies load plans to a store.
///
/// One applier can run many apply calls, but each call owns its own store
/// snapshot. Concurrent calls against one store are not coordinated here.
pub struct PlanApplier<'s> {
    options: ApplyOptions,
    sink: &'s dyn DebugSink,
    state: ApplyState,
}

impl<'s> PlanApplier<'s> {
    pub fn new(options: ApplyOptions) -> Self {
        PlanApplier {
            options,
            sink: &NOOP_SINK,
            state: ApplyState::Idle,
        }
    }

    /// Send intermediate payloads to `sink` (builder pattern)
    pub fn with_sink(mut self, sink: &'s dyn DebugSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    pub fn state(&self) -> ApplyState {
        self.state
    }

    /// Normalize externally edited rows, then apply.
    ///
    /// Schema and validation problems are reported before the store is read.
    pub fn apply_raw<S: LoadStore + ?Sized>(
        &mut self,
        store: &mut S,
        rows: &[RawPlanRow],
    ) -> LoadResult<ApplyReport> {
        let typed = normalize_raw_rows(rows)?;
        self.apply(store, &typed)
    }

    /// Merge `rows` into `store`.
    pub fn apply<S: LoadStore + ?Sized>(
        &mut self,
        store: &mut S,
        rows: &[PlanRow],
    ) -> LoadResult<ApplyReport> {
        self.state = ApplyState::Idle;
        let label = self.options.debug_label.clone();

        let plan = normalize_rows(rows, self.options.aggregate)?;
        let mut report = ApplyReport {
            rows_in: rows.len(),
            rows_after_normalize: plan.rows.len(),
            rows_near_zero: plan.rows_near_zero,
            rows_aggregated_away: plan.rows_aggregated_away,
            ..Default::default()
        };

        if plan.rows.is_empty() {
            tracing::info!(rows_in = rows.len(), "plan has no significant loads; nothing to send");
            self.state = ApplyState::Done;
            report.final_state = self.state;
            return Ok(report);
        }

        if self.sink.enabled() {
            self.sink.record(
                &format!("plans/{}", label),
                &json!({ "label": label, "rows": plan.rows.len(), "data": plan.rows }),
            );
        }

        let touched_cases: BTreeSet<String> =
            plan.rows.iter().map(|r| r.load_case.clone()).collect();
        report.touched_cases = touched_cases.iter().cloned().collect();

        let mut rows_by_element: BTreeMap<ElementId, Vec<&PlanRow>> = BTreeMap::new();
        for row in &plan.rows {
            rows_by_element.entry(row.element_id).or_default().push(row);
        }
        report.elements_touched = rows_by_element.len();

        // Snapshot
        let mut snapshot: StoreSnapshot = store.read_all()?;
        self.state = ApplyState::Loaded;
        tracing::info!(
            elements_in_store = snapshot.len(),
            elements_touched = report.elements_touched,
            cases = touched_cases.len(),
            "store snapshot loaded"
        );

        // Merge
        let mut merged: BTreeMap<ElementId, Vec<StoredRecord>> = BTreeMap::new();
        for (eid, element_rows) in &rows_by_element {
            let existing = snapshot.remove(eid).unwrap_or_default();
            let next_id = next_id_for(*eid, &existing)?;
            let merge = merge_element(
                *eid,
                &existing,
                element_rows,
                next_id,
                &touched_cases,
                self.options.replace_existing,
            )?;
            report.replaced_records += merge.replaced;
            merged.insert(*eid, merge.records);
        }
        self.state = ApplyState::Merged;

        // Batch
        let ceiling = self.options.ceiling();
        let sizes: Vec<(ElementId, usize)> =
            merged.iter().map(|(eid, r)| (*eid, r.len())).collect();
        let batches = partition_batches(&sizes, ceiling);
        self.state = ApplyState::Batched;
        tracing::info!(batches = batches.len(), ceiling, "batches planned");

        // Write
        for (index, batch_elements) in batches.iter().enumerate() {
            let mut batch = StoreBatch::new();
            let mut new_in_batch = 0;
            for eid in batch_elements {
                if let Some(records) = merged.remove(eid) {
                    new_in_batch += rows_by_element.get(eid).map_or(0, Vec::len);
                    batch.insert(*eid, records);
                }
            }
            let records_in_batch: usize = batch.values().map(Vec::len).sum();

            if records_in_batch > ceiling {
                report.overflow_batches += 1;
                tracing::warn!(
                    element = %batch_elements[0],
                    records = records_in_batch,
                    ceiling,
                    "element exceeds batch ceiling; sending it alone"
                );
            }

            if self.sink.enabled() {
                self.sink.record(
                    &format!("batches/{}_batch_{:03}", label, index + 1),
                    &json!({
                        "label": label,
                        "batch_index": index + 1,
                        "elements": batch_elements,
                        "records": records_in_batch,
                        "data": batch,
                    }),
                );
            }

            if let Err(e) = store.write_batch(&batch) {
                let reason = match e {
                    LoadError::Store { reason, .. } => reason,
                    other => other.to_string(),
                };
                tracing::warn!(
                    batch = index + 1,
                    batches_completed = report.batches,
                    records_written = report.merged_records_written,
                    "batch write failed; earlier batches remain written"
                );
                return Err(LoadError::store(
                    "write_batch",
                    reason,
                    report.batches,
                    report.merged_records_written,
                ));
            }

            report.batches += 1;
            report.new_records_sent += new_in_batch;
            report.merged_records_written += records_in_batch;
            tracing::info!(
                batch = index + 1,
                of = batches.len(),
                elements = batch.len(),
                records = records_in_batch,
                "batch written"
            );
        }

        self.state = ApplyState::Done;
        report.final_state = self.state;
        tracing::info!(
            new_records = report.new_records_sent,
            replaced = report.replaced_records,
            batches = report.batches,
            "plan applied"
        );
        Ok(report)
    }
}
