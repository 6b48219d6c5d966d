//! # Exposure Depths
//!
//! Exposure depth is the dimension of a cross-section that faces the wind
//! along a local axis. It is the only bridge from a wind pressure to a line
//! load (`line_load = pressure × depth`).
//!
//! Depths come from the section property table, which stores the section
//! outline offsets from the centroid at fixed positions:
//!
//! ```text
//! [.., id(1), .., left(11), right(12), top(13), bottom(14)]
//! depth_primary   (local y) = top + bottom + extra
//! depth_secondary (local z) = left + right
//! ```
//!
//! `extra` is an allowance added to the primary depth (barriers, parapets,
//! live load height). It has a default and optional per-section overrides.
//!
//! [`ExposureResolver`] caches the parsed table and the element → section
//! lookups for its own lifetime. The caches are never invalidated
//! implicitly: after the model changes, call [`ExposureResolver::clear`] or
//! build a new resolver.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::RwLock;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::errors::{LoadError, LoadResult};
use crate::model::{ElementId, ModelSource, SectionId};
use crate::table::TableCell;

/// Fixed column positions in the section property table
pub const COL_ID: usize = 1;
pub const COL_LEFT: usize = 11;
pub const COL_RIGHT: usize = 12;
pub const COL_TOP: usize = 13;
pub const COL_BOTTOM: usize = 14;

/// Local axis along which an exposure depth is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureAxis {
    /// Primary depth (top + bottom + extra), local y
    Y,
    /// Secondary depth (left + right), local z
    Z,
}

impl ExposureAxis {
    pub fn code(&self) -> &'static str {
        match self {
            ExposureAxis::Y => "y",
            ExposureAxis::Z => "z",
        }
    }
}

impl FromStr for ExposureAxis {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "y" | "primary" => Ok(ExposureAxis::Y),
            "z" | "secondary" => Ok(ExposureAxis::Z),
            _ => Err(LoadError::validation(
                "exposure",
                None,
                "axis",
                s,
                "axis must be 'y' (primary) or 'z' (secondary)",
            )),
        }
    }
}

impl std::fmt::Display for ExposureAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Allowance added to the primary depth
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureSettings {
    /// Extra primary depth for sections without an override
    pub extra_primary_default: f64,

    /// Per-section extra primary depth
    pub extra_primary_by_section: BTreeMap<SectionId, f64>,
}

impl ExposureSettings {
    pub fn extra_for(&self, section: SectionId) -> f64 {
        self.extra_primary_by_section
            .get(&section)
            .copied()
            .unwrap_or(self.extra_primary_default)
    }
}

/// Exposure depths of one section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureDepths {
    pub section_id: SectionId,
    pub depth_primary: f64,
    pub depth_secondary: f64,
}

impl ExposureDepths {
    pub fn along(&self, axis: ExposureAxis) -> f64 {
        match axis {
            ExposureAxis::Y => self.depth_primary,
            ExposureAxis::Z => self.depth_secondary,
        }
    }
}

/// Numeric fields read from one section row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedSectionRow {
    pub section_id: SectionId,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// Why a section row was left out of the exposure table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum SkipReason {
    /// Row has fewer cells than the fixed layout needs
    TooShort { len: usize },
    /// Section id cell is not an id
    BadSectionId { value: String },
    /// An offset cell is not numeric
    NonNumeric { column: String, value: String },
}

/// A skipped row and its position in the source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row: usize,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Parse the fixed-position fields of one section row
pub fn parse_row(row: &[TableCell]) -> Result<ParsedSectionRow, SkipReason> {
    if row.len() <= COL_BOTTOM {
        return Err(SkipReason::TooShort { len: row.len() });
    }

    let section_id = SectionId::from_cell(&row[COL_ID]).ok_or_else(|| SkipReason::BadSectionId {
        value: row[COL_ID].describe(),
    })?;

    let numeric = |col: usize, name: &str| -> Result<f64, SkipReason> {
        row[col].as_f64().ok_or_else(|| SkipReason::NonNumeric {
            column: name.to_string(),
            value: row[col].describe(),
        })
    };

    Ok(ParsedSectionRow {
        section_id,
        left: numeric(COL_LEFT, "left")?,
        right: numeric(COL_RIGHT, "right")?,
        top: numeric(COL_TOP, "top")?,
        bottom: numeric(COL_BOTTOM, "bottom")?,
    })
}

/// Parsed exposure table plus the rows that could not be used
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureTable {
    pub depths: BTreeMap<SectionId, ExposureDepths>,
    pub skipped: Vec<SkippedRow>,
}

impl ExposureTable {
    pub fn get(&self, section: SectionId) -> Option<&ExposureDepths> {
        self.depths.get(&section)
    }
}

/// Compute exposure depths for every usable section row.
///
/// Malformed rows are skipped and reported in [`ExposureTable::skipped`].
/// A later row for the same section id replaces an earlier one.
pub fn depths_for_sections(rows: &[Vec<TableCell>], settings: &ExposureSettings) -> ExposureTable {
    let mut table = ExposureTable::default();

    for (index, row) in rows.iter().enumerate() {
        match parse_row(row) {
            Ok(parsed) => {
                let extra = settings.extra_for(parsed.section_id);
                table.depths.insert(
                    parsed.section_id,
                    ExposureDepths {
                        section_id: parsed.section_id,
                        depth_primary: parsed.top + parsed.bottom + extra,
                        depth_secondary: parsed.left + parsed.right,
                    },
                );
            }
            Err(reason) => {
                tracing::debug!(row = index, ?reason, "skipping section row");
                table.skipped.push(SkippedRow { row: index, reason });
            }
        }
    }

    table
}

/// Depth per element along one axis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthMap {
    pub depths: BTreeMap<ElementId, f64>,
    /// Requested elements whose section or section geometry could not be resolved
    pub missing: Vec<ElementId>,
}

impl DepthMap {
    pub fn get(&self, element: ElementId) -> Option<f64> {
        self.depths.get(&element).copied()
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

/// Cached element → exposure depth resolution over a [`ModelSource`].
pub struct ExposureResolver<'a> {
    model: &'a dyn ModelSource,
    settings: ExposureSettings,
    table: OnceCell<ExposureTable>,
    sections: RwLock<BTreeMap<ElementId, Option<SectionId>>>,
    groups: RwLock<BTreeMap<String, Vec<ElementId>>>,
}

impl<'a> ExposureResolver<'a> {
    pub fn new(model: &'a dyn ModelSource, settings: ExposureSettings) -> Self {
        ExposureResolver {
            model,
            settings,
            table: OnceCell::new(),
            sections: RwLock::new(BTreeMap::new()),
            groups: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn settings(&self) -> &ExposureSettings {
        &self.settings
    }

    /// Exposure table, parsed from the model on first use
    pub fn exposure_table(&self) -> &ExposureTable {
        self.table.get_or_init(|| {
            let rows = self.model.section_properties();
            let table = depths_for_sections(&rows, &self.settings);
            tracing::info!(
                sections = table.depths.len(),
                skipped = table.skipped.len(),
                "exposure table built"
            );
            table
        })
    }

    /// Depths for explicitly supplied section rows (bypasses the cache)
    pub fn depths_for_sections(
        &self,
        rows: &[Vec<TableCell>],
    ) -> BTreeMap<SectionId, ExposureDepths> {
        depths_for_sections(rows, &self.settings).depths
    }

    /// Members of a structural group, looked up once per group name
    pub fn group_elements(&self, group_name: &str) -> Vec<ElementId> {
        let name = group_name.trim().to_string();
        if let Some(cached) = read_lock(&self.groups).get(&name) {
            return cached.clone();
        }
        let members = self.model.group_element_ids(&name);
        write_lock(&self.groups).insert(name, members.clone());
        members
    }

    /// Section of each element, consulting the model only for unseen elements
    fn sections_for(&self, element_ids: &[ElementId]) -> BTreeMap<ElementId, Option<SectionId>> {
        let unseen: Vec<ElementId> = {
            let cache = read_lock(&self.sections);
            element_ids.iter().filter(|e| !cache.contains_key(e)).copied().collect()
        };

        if !unseen.is_empty() {
            let resolved = self.model.element_sections(&unseen);
            let mut cache = write_lock(&self.sections);
            for eid in unseen {
                cache.insert(eid, resolved.get(&eid).copied());
            }
        }

        let cache = read_lock(&self.sections);
        element_ids
            .iter()
            .map(|e| (*e, cache.get(e).copied().flatten()))
            .collect()
    }

    /// Exposure depth of each element along `axis`.
    ///
    /// Elements without a section, or whose section has no usable geometry,
    /// are left out of `depths` and listed in `missing`.
    pub fn depth_map(&self, element_ids: &[ElementId], axis: ExposureAxis) -> DepthMap {
        let table = self.exposure_table();
        let mut out = DepthMap::default();

        for (eid, section) in self.sections_for(element_ids) {
            match section.and_then(|sid| table.get(sid)) {
                Some(depths) => {
                    out.depths.insert(eid, depths.along(axis));
                }
                None => out.missing.push(eid),
            }
        }

        out
    }

    /// [`depth_map`](Self::depth_map) with an axis name (`"y"` / `"z"`)
    pub fn depth_map_by_name(&self, element_ids: &[ElementId], axis: &str) -> LoadResult<DepthMap> {
        Ok(self.depth_map(element_ids, axis.parse()?))
    }

    /// Depth map for every member of a structural group
    pub fn depth_map_for_group(&self, group_name: &str, axis: ExposureAxis) -> DepthMap {
        let members = self.group_elements(group_name);
        self.depth_map(&members, axis)
    }

    /// Drop every cached table and lookup
    pub fn clear(&mut self) {
        self.table = OnceCell::new();
        write_lock(&self.sections).clear();
        write_lock(&self.groups).clear();
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelSnapshot, SectionRow};
    use std::cell::Cell;

    fn model() -> ModelSnapshot {
        ModelSnapshot::new()
            .with_element(101, 1)
            .with_element(102, 1)
            .with_element(103, 2)
            .with_element(104, 9)
            .with_section(1, 0.5, 0.5, 1.0, 2.5)
            .with_section(2, 1.0, 2.0, 0.25, 0.25)
            .with_group("Deck", &[101, 102, 103, 104, 105])
    }

    #[test]
    fn test_parse_row_layout() {
        let row = model().sections[0].clone();
        let parsed = parse_row(&row).unwrap();
        assert_eq!(parsed.section_id, SectionId(1));
        assert_eq!(parsed.left, 0.5);
        assert_eq!(parsed.bottom, 2.5);
    }

    #[test]
    fn test_parse_row_skip_reasons() {
        assert_eq!(parse_row(&vec![TableCell::Blank; 3]), Err(SkipReason::TooShort { len: 3 }));

        let mut row: SectionRow = model().sections[0].clone();
        row[COL_TOP] = TableCell::from("wide");
        assert!(matches!(
            parse_row(&row),
            Err(SkipReason::NonNumeric { ref column, .. }) if column == "top"
        ));

        row[COL_ID] = TableCell::Blank;
        assert!(matches!(parse_row(&row), Err(SkipReason::BadSectionId { .. })));
    }

    #[test]
    fn test_depth_formulas_with_extra() {
        let mut settings = ExposureSettings {
            extra_primary_default: 0.5,
            ..Default::default()
        };
        settings.extra_primary_by_section.insert(SectionId(2), 3.0);

        let table = depths_for_sections(&model().sections, &settings);
        let s1 = table.get(SectionId(1)).unwrap();
        assert!((s1.depth_primary - 4.0).abs() < 1e-12);
        assert!((s1.depth_secondary - 1.0).abs() < 1e-12);

        let s2 = table.get(SectionId(2)).unwrap();
        assert!((s2.depth_primary - 3.5).abs() < 1e-12);
        assert!((s2.depth_secondary - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_rows_are_reported() {
        let mut rows = model().sections;
        rows.push(vec![TableCell::from(1.0)]);
        let table = depths_for_sections(&rows, &ExposureSettings::default());
        assert_eq!(table.depths.len(), 2);
        assert_eq!(table.skipped.len(), 1);
        assert_eq!(table.skipped[0].row, 2);
    }

    #[test]
    fn test_depth_map_is_subset_and_shares_section_values() {
        let model = model();
        let resolver = ExposureResolver::new(&model, ExposureSettings::default());
        let ids = [ElementId(101), ElementId(102), ElementId(103), ElementId(104), ElementId(105)];

        let map = resolver.depth_map(&ids, ExposureAxis::Y);
        assert!(map.depths.keys().all(|e| ids.contains(e)));
        assert_eq!(map.get(ElementId(101)), map.get(ElementId(102)));
        assert_eq!(map.get(ElementId(103)), Some(0.5));
        assert_eq!(map.missing, vec![ElementId(104), ElementId(105)]);

        let z = resolver.depth_map(&ids, ExposureAxis::Z);
        assert_eq!(z.get(ElementId(103)), Some(3.0));
    }

    #[test]
    fn test_invalid_axis_name() {
        let model = model();
        let resolver = ExposureResolver::new(&model, ExposureSettings::default());
        let err = resolver.depth_map_by_name(&[ElementId(101)], "x").unwrap_err();
        assert!(matches!(err, LoadError::Validation { ref field, .. } if field == "axis"));
        assert!(resolver.depth_map_by_name(&[ElementId(101)], "Z").is_ok());
    }

    #[test]
    fn test_depth_map_for_group() {
        let model = model();
        let resolver = ExposureResolver::new(&model, ExposureSettings::default());
        let map = resolver.depth_map_for_group("Deck", ExposureAxis::Y);
        assert_eq!(map.len(), 3);
        assert!(resolver.depth_map_for_group("Nope", ExposureAxis::Y).is_empty());
    }

    struct CountingModel {
        inner: ModelSnapshot,
        section_reads: Cell<usize>,
        element_reads: Cell<usize>,
    }

    impl ModelSource for CountingModel {
        fn element_sections(&self, ids: &[ElementId]) -> BTreeMap<ElementId, SectionId> {
            self.element_reads.set(self.element_reads.get() + 1);
            self.inner.element_sections(ids)
        }
        fn section_properties(&self) -> Vec<SectionRow> {
            self.section_reads.set(self.section_reads.get() + 1);
            self.inner.section_properties()
        }
        fn group_element_ids(&self, name: &str) -> Vec<ElementId> {
            self.inner.group_element_ids(name)
        }
    }

    #[test]
    fn test_caches_until_cleared() {
        let counting = CountingModel {
            inner: model(),
            section_reads: Cell::new(0),
            element_reads: Cell::new(0),
        };
        let mut resolver = ExposureResolver::new(&counting, ExposureSettings::default());

        resolver.depth_map(&[ElementId(101)], ExposureAxis::Y);
        resolver.depth_map(&[ElementId(101)], ExposureAxis::Z);
        assert_eq!(counting.section_reads.get(), 1);
        assert_eq!(counting.element_reads.get(), 1);

        resolver.clear();
        resolver.depth_map(&[ElementId(101)], ExposureAxis::Y);
        assert_eq!(counting.section_reads.get(), 2);
        assert_eq!(counting.element_reads.get(), 2);
    }
}
