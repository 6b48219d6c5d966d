//! Run summaries.
//!
//! Lookups that fail (no section for an element, no pressure for a
//! category) do not abort a run. They are collected here so a "successful"
//! run still shows what was left out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::apply::ApplyReport;
use crate::exposure::SkippedRow;
use crate::loads::LoadFamily;
use crate::model::ElementId;

/// A referenced entity that could not be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LookupGap {
    /// No pressure row for (group, category); the category's cases were skipped
    MissingPressure { group: String, category: String },
    /// No section, or no usable section geometry, for an element
    MissingGeometry { group: String, element_id: ElementId },
}

/// Outcome for one requested group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum GroupStatus {
    /// Rows were generated
    Planned { rows: usize },
    /// The group has no elements
    NoElements,
    /// No case produced a component
    NoComponents,
    /// Components existed but every row was dropped
    NoLoads,
}

impl GroupStatus {
    pub fn rows(&self) -> usize {
        match self {
            GroupStatus::Planned { rows } => *rows,
            _ => 0,
        }
    }
}

/// Status entry keyed by group and family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group: String,
    pub family: LoadFamily,
    pub status: GroupStatus,
}

/// Counts of one generate/apply run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub rows_generated: usize,
    pub rows_near_zero: usize,
    pub elements_missing_geometry: usize,
    pub sections_skipped: Vec<SkippedRow>,
    pub lookup_gaps: Vec<LookupGap>,
    pub rows_sent: usize,
    pub batches: usize,
    pub per_group_status: Vec<GroupReport>,
    /// Present once the plan has been applied
    pub apply: Option<ApplyReport>,
}

impl Default for RunSummary {
    fn default() -> Self {
        RunSummary::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        RunSummary {
            run_id: Uuid::new_v4(),
            rows_generated: 0,
            rows_near_zero: 0,
            elements_missing_geometry: 0,
            sections_skipped: Vec::new(),
            lookup_gaps: Vec::new(),
            rows_sent: 0,
            batches: 0,
            per_group_status: Vec::new(),
            apply: None,
        }
    }

    /// Number of groups per status name
    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for report in &self.per_group_status {
            let name = match report.status {
                GroupStatus::Planned { .. } => "planned",
                GroupStatus::NoElements => "no_elements",
                GroupStatus::NoComponents => "no_components",
                GroupStatus::NoLoads => "no_loads",
            };
            *counts.entry(name).or_insert(0) += 1;
        }
        counts
    }

    /// Record the applier's report
    pub fn record_apply(&mut self, report: ApplyReport) {
        self.rows_sent = report.new_records_sent;
        self.batches = report.batches;
        self.apply = Some(report);
    }

    /// Whether anything was skipped or unresolved
    pub fn has_gaps(&self) -> bool {
        !self.lookup_gaps.is_empty()
            || !self.sections_skipped.is_empty()
            || self.elements_missing_geometry > 0
    }
}
