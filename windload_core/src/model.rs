//! # Model Collaborators
//!
//! Read-only accessors into the structural model (elements, sections,
//! groups) and the wind pressure table. The generator never talks to a
//! concrete model database; it consumes the [`ModelSource`] and
//! [`PressureSource`] traits, and every id crosses this boundary already
//! normalized to [`ElementId`] / [`SectionId`].
//!
//! [`ModelSnapshot`] is a serde-loadable in-memory implementation of both
//! traits, used by the CLI job files and by tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::TableCell;

/// Structural element identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u32);

/// Cross-section identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u32);

impl ElementId {
    /// Parse an id from a key such as `"101"` or `" 101 "`
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(ElementId)
    }

    /// Parse an id from a table cell (integer-valued numbers or text)
    pub fn from_cell(cell: &TableCell) -> Option<Self> {
        cell.as_integer().and_then(|v| u32::try_from(v).ok()).map(ElementId)
    }
}

impl SectionId {
    pub fn from_cell(cell: &TableCell) -> Option<Self> {
        cell.as_integer().and_then(|v| u32::try_from(v).ok()).map(SectionId)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One raw row of the section property table (fixed-position cells)
pub type SectionRow = Vec<TableCell>;

/// Read accessors into the structural model.
pub trait ModelSource {
    /// Section of each requested element. Missing or malformed entries are omitted.
    fn element_sections(&self, element_ids: &[ElementId]) -> BTreeMap<ElementId, SectionId>;

    /// Every row of the section property table
    fn section_properties(&self) -> Vec<SectionRow>;

    /// Members of a named structural group (empty when the group is unknown)
    fn group_element_ids(&self, group_name: &str) -> Vec<ElementId>;
}

/// Wind pressure lookup by (group, base load category).
pub trait PressureSource {
    /// Pressure for the first matching row, if any
    fn pressure(&self, group_name: &str, category: &str) -> Option<f64>;
}

/// A row of the wind pressure table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureRow {
    pub group: String,
    pub category: String,
    pub pressure: f64,
}

/// In-memory model and pressure table, loadable from JSON.
///
/// Keys and id cells are kept raw as they arrive and normalized on lookup,
/// so one malformed entry never rejects the whole snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Element id → section id cell
    #[serde(default)]
    pub elements: BTreeMap<String, TableCell>,

    /// Section property rows
    #[serde(default)]
    pub sections: Vec<SectionRow>,

    /// Group name → member cells (numbers, or a single space-separated text cell)
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<TableCell>>,

    /// Wind pressure rows; duplicates are resolved first-match-wins
    #[serde(default)]
    pub pressures: Vec<PressureRow>,
}

impl ModelSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a section to an element (builder pattern)
    pub fn with_element(mut self, element: u32, section: u32) -> Self {
        self.elements.insert(element.to_string(), TableCell::from(section as f64));
        self
    }

    /// Add a section row with the given id and left/right/top/bottom offsets
    pub fn with_section(
        mut self,
        section: u32,
        left: f64,
        right: f64,
        top: f64,
        bottom: f64,
    ) -> Self {
        let mut row: SectionRow = vec![TableCell::Blank; 15];
        row[1] = TableCell::from(section as f64);
        row[11] = TableCell::from(left);
        row[12] = TableCell::from(right);
        row[13] = TableCell::from(top);
        row[14] = TableCell::from(bottom);
        self.sections.push(row);
        self
    }

    /// Add a structural group (builder pattern)
    pub fn with_group(mut self, name: impl Into<String>, members: &[u32]) -> Self {
        self.groups.insert(
            name.into(),
            members.iter().map(|m| TableCell::from(*m as f64)).collect(),
        );
        self
    }

    /// Add a pressure row (builder pattern)
    pub fn with_pressure(
        mut self,
        group: impl Into<String>,
        category: impl Into<String>,
        pressure: f64,
    ) -> Self {
        self.pressures.push(PressureRow {
            group: group.into(),
            category: category.into(),
            pressure,
        });
        self
    }
}

impl ModelSource for ModelSnapshot {
    fn element_sections(&self, element_ids: &[ElementId]) -> BTreeMap<ElementId, SectionId> {
        let mut by_id: BTreeMap<ElementId, SectionId> = BTreeMap::new();
        for (key, cell) in &self.elements {
            if let (Some(eid), Some(sid)) = (ElementId::parse(key), SectionId::from_cell(cell)) {
                by_id.insert(eid, sid);
            }
        }
        element_ids
            .iter()
            .filter_map(|eid| by_id.get(eid).map(|sid| (*eid, *sid)))
            .collect()
    }

    fn section_properties(&self) -> Vec<SectionRow> {
        self.sections.clone()
    }

    fn group_element_ids(&self, group_name: &str) -> Vec<ElementId> {
        let name = group_name.trim();
        if name.is_empty() {
            return Vec::new();
        }
        let Some(cells) = self.groups.get(name) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for cell in cells {
            match cell {
                TableCell::Text(text) => {
                    out.extend(text.split_whitespace().filter_map(ElementId::parse))
                }
                other => out.extend(ElementId::from_cell(other)),
            }
        }
        out
    }
}

impl PressureSource for ModelSnapshot {
    fn pressure(&self, group_name: &str, category: &str) -> Option<f64> {
        let group = group_name.trim();
        let category = category.trim();
        let mut matches = self
            .pressures
            .iter()
            .filter(|row| row.group.trim() == group && row.category.trim() == category);

        let first = matches.next()?;
        let duplicates = matches.count();
        if duplicates > 0 {
            tracing::warn!(
                group,
                category,
                duplicates,
                "duplicate pressure rows; using the first match"
            );
        }
        Some(first.pressure)
    }
}
