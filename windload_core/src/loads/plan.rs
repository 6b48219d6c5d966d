//! Load plans
//!
//! A load plan is a flat list of [`PlanRow`]s, one per (element, case,
//! direction). [`PlanBuilder`] expands signed components over a set of
//! elements:
//!
//! - [`PlanMode::Direct`]: the component magnitude is the line load.
//! - [`PlanMode::Pressure`]: the magnitude is a pressure, and
//!   `line_load = pressure × depth[element]` along the mapping's axis.
//!
//! Rows are always returned sorted by (load_case, element_id).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::{LoadError, LoadResult};
use crate::exposure::{DepthMap, ExposureAxis};
use crate::model::ElementId;
use crate::table::TableCell;

use super::components::SignedComponent;
use super::is_significant;
use super::load_types::LoadDirection;

const TABLE_NAME: &str = "plan";

/// One directional uniform-load instruction for one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub element_id: ElementId,
    /// Force per unit length (signed)
    pub line_load: f64,
    pub load_case: String,
    pub load_direction: LoadDirection,
    pub load_group: String,
    /// Structural group the row was generated for
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub eccentricity: f64,
}

impl PlanRow {
    pub fn new(
        element_id: ElementId,
        line_load: f64,
        load_case: impl Into<String>,
        load_direction: LoadDirection,
    ) -> Self {
        let load_case = load_case.into();
        PlanRow {
            element_id,
            line_load,
            load_group: load_case.clone(),
            load_case,
            load_direction,
            group_name: String::new(),
            eccentricity: 0.0,
        }
    }

    /// Set the load group (builder pattern)
    pub fn with_group(mut self, load_group: impl Into<String>) -> Self {
        self.load_group = load_group.into();
        self
    }

    /// Set the eccentricity (builder pattern)
    pub fn with_eccentricity(mut self, eccentricity: f64) -> Self {
        self.eccentricity = eccentricity;
        self
    }
}

/// A plan row from an externally edited table.
///
/// Absent fields are schema errors; unusable values are validation errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlanRow {
    #[serde(default)]
    pub element_id: Option<TableCell>,
    #[serde(default)]
    pub line_load: Option<TableCell>,
    #[serde(default)]
    pub load_case: Option<TableCell>,
    #[serde(default)]
    pub load_direction: Option<TableCell>,
    #[serde(default)]
    pub load_group: Option<TableCell>,
    #[serde(default)]
    pub group_name: Option<TableCell>,
    #[serde(default)]
    pub eccentricity: Option<TableCell>,
}

impl RawPlanRow {
    /// Convert into a typed row. `row` is the position used in error messages.
    pub fn normalize(&self, row: usize) -> LoadResult<PlanRow> {
        let element_cell = required(row, "element_id", &self.element_id)?;
        let load_cell = required(row, "line_load", &self.line_load)?;
        let case_cell = required(row, "load_case", &self.load_case)?;
        let direction_cell = required(row, "load_direction", &self.load_direction)?;
        let group_cell = required(row, "load_group", &self.load_group)?;

        let element_id = ElementId::from_cell(element_cell).ok_or_else(|| {
            LoadError::validation(
                TABLE_NAME,
                Some(row),
                "element_id",
                element_cell.describe(),
                "element id must be a whole number",
            )
        })?;
        let line_load = load_cell.as_f64().ok_or_else(|| {
            LoadError::validation(
                TABLE_NAME,
                Some(row),
                "line_load",
                load_cell.describe(),
                "line load must be numeric",
            )
        })?;

        let load_case = case_cell.as_text();
        if load_case.is_empty() {
            return Err(LoadError::validation(
                TABLE_NAME,
                Some(row),
                "load_case",
                case_cell.describe(),
                "load case is blank",
            ));
        }

        let load_direction =
            LoadDirection::parse_cell(&direction_cell.as_text(), TABLE_NAME, Some(row))?;

        Ok(PlanRow {
            element_id,
            line_load,
            load_case,
            load_direction,
            load_group: group_cell.as_text(),
            group_name: self.group_name.as_ref().map(TableCell::as_text).unwrap_or_default(),
            eccentricity: self.eccentricity.as_ref().and_then(TableCell::as_f64).unwrap_or(0.0),
        })
    }
}

impl From<&PlanRow> for RawPlanRow {
    fn from(row: &PlanRow) -> Self {
        RawPlanRow {
            element_id: Some(TableCell::from(f64::from(row.element_id.0))),
            line_load: Some(TableCell::from(row.line_load)),
            load_case: Some(TableCell::from(row.load_case.as_str())),
            load_direction: Some(TableCell::from(row.load_direction.code())),
            load_group: Some(TableCell::from(row.load_group.as_str())),
            group_name: Some(TableCell::from(row.group_name.as_str())),
            eccentricity: Some(TableCell::from(row.eccentricity)),
        }
    }
}

fn required<'a>(row: usize, field: &str, cell: &'a Option<TableCell>) -> LoadResult<&'a TableCell> {
    cell.as_ref().ok_or_else(|| LoadError::schema(TABLE_NAME, Some(row), field))
}

/// Which magnitude of a [`SignedComponent`] a mapping reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentSlot {
    A,
    B,
}

impl ComponentSlot {
    pub fn pick(&self, component: &SignedComponent) -> f64 {
        match self {
            ComponentSlot::A => component.magnitude_a,
            ComponentSlot::B => component.magnitude_b,
        }
    }
}

/// Component slot → load direction (and exposure axis in pressure mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMapping {
    pub slot: ComponentSlot,
    pub direction: LoadDirection,
    pub axis: ExposureAxis,
}

impl ComponentMapping {
    pub fn new(slot: ComponentSlot, direction: LoadDirection, axis: ExposureAxis) -> Self {
        ComponentMapping { slot, direction, axis }
    }
}

/// How component magnitudes become line loads
#[derive(Debug, Clone, Copy)]
pub enum PlanMode<'d> {
    /// Magnitudes are line loads
    Direct,
    /// Magnitudes are pressures; depths per exposure axis
    Pressure(&'d BTreeMap<ExposureAxis, DepthMap>),
}

/// Output of one [`PlanBuilder::build`] call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    /// Sorted by (load_case, element_id)
    pub rows: Vec<PlanRow>,
    /// Rows not emitted because |line_load| ≤ EPS
    pub dropped_near_zero: usize,
    /// Components skipped because the case name was blank
    pub dropped_blank_case: usize,
    /// Elements without a depth for some required axis
    pub missing_geometry: Vec<ElementId>,
}

impl PlanOutcome {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Combine outcomes, keeping rows sorted
    pub fn merge(&mut self, other: PlanOutcome) {
        self.rows.extend(other.rows);
        sort_plan_rows(&mut self.rows);
        self.dropped_near_zero += other.dropped_near_zero;
        self.dropped_blank_case += other.dropped_blank_case;
        let missing: BTreeSet<ElementId> =
            self.missing_geometry.drain(..).chain(other.missing_geometry).collect();
        self.missing_geometry = missing.into_iter().collect();
    }
}

/// Stable sort by (load_case, element_id)
pub fn sort_plan_rows(rows: &mut [PlanRow]) {
    rows.sort_by(|x, y| {
        x.load_case
            .cmp(&y.load_case)
            .then_with(|| x.element_id.cmp(&y.element_id))
    });
}

/// Expands signed components over elements.
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    group_name: String,
    eccentricity: f64,
}

impl PlanBuilder {
    pub fn new(group_name: impl Into<String>) -> Self {
        PlanBuilder {
            group_name: group_name.into(),
            eccentricity: 0.0,
        }
    }

    /// Eccentricity carried by every row (builder pattern)
    pub fn with_eccentricity(mut self, eccentricity: f64) -> Self {
        self.eccentricity = eccentricity;
        self
    }

    pub fn build(
        &self,
        components: &[SignedComponent],
        element_ids: &[ElementId],
        mappings: &[ComponentMapping],
        mode: PlanMode<'_>,
    ) -> LoadResult<PlanOutcome> {
        if let PlanMode::Pressure(depths) = mode {
            for mapping in mappings {
                if !depths.contains_key(&mapping.axis) {
                    return Err(LoadError::schema(
                        TABLE_NAME,
                        None,
                        format!("depth_by_element[{}]", mapping.axis),
                    ));
                }
            }
        }

        let elements: BTreeSet<ElementId> = element_ids.iter().copied().collect();
        let mut outcome = PlanOutcome::default();
        let mut missing: BTreeSet<ElementId> = BTreeSet::new();

        if elements.is_empty() || mappings.is_empty() {
            return Ok(outcome);
        }

        for component in components {
            let load_case = component.load_case.trim();
            if load_case.is_empty() {
                outcome.dropped_blank_case += 1;
                continue;
            }
            let load_group = match component.load_group.trim() {
                "" => load_case,
                g => g,
            };

            for mapping in mappings {
                let magnitude = mapping.slot.pick(component);

                for &eid in &elements {
                    let line_load = match mode {
                        PlanMode::Direct => magnitude,
                        PlanMode::Pressure(depths) => {
                            let depth = depths.get(&mapping.axis).and_then(|m| m.get(eid));
                            match depth {
                                Some(d) => magnitude * d,
                                None => {
                                    missing.insert(eid);
                                    continue;
                                }
                            }
                        }
                    };

                    if !is_significant(line_load) {
                        outcome.dropped_near_zero += 1;
                        continue;
                    }

                    outcome.rows.push(PlanRow {
                        element_id: eid,
                        line_load,
                        load_case: load_case.to_string(),
                        load_direction: mapping.direction,
                        load_group: load_group.to_string(),
                        group_name: self.group_name.clone(),
                        eccentricity: self.eccentricity,
                    });
                }
            }
        }

        sort_plan_rows(&mut outcome.rows);
        outcome.missing_geometry = missing.into_iter().collect();

        if !outcome.missing_geometry.is_empty() {
            tracing::warn!(
                group = %self.group_name,
                elements = outcome.missing_geometry.len(),
                "elements without exposure geometry were skipped"
            );
        }
        tracing::debug!(
            group = %self.group_name,
            rows = outcome.rows.len(),
            dropped_near_zero = outcome.dropped_near_zero,
            "plan built"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadrant::Quadrant;

    #[test]
    fn test_saved_plan_rows_normalize_back() {
        let mut deck = PlanRow::new(ElementId(101), -0.07, "WS_A15_Q3", LoadDirection::LocalY)
            .with_group("WIND")
            .with_eccentricity(6.0);
        deck.group_name = "Deck".to_string();
        let rows = vec![deck, PlanRow::new(ElementId(7), 1.25, "WL_A0", LoadDirection::LocalX)];
        let raw: Vec<RawPlanRow> = rows.iter().map(RawPlanRow::from).collect();

        let json = serde_json::to_string(&raw).unwrap();
        let loaded: Vec<RawPlanRow> = serde_json::from_str(&json).unwrap();

        for (i, (saved, original)) in loaded.iter().zip(&rows).enumerate() {
            assert_eq!(&saved.normalize(i).unwrap(), original);
        }
    }

    fn component(case: &str, a: f64, b: f64) -> SignedComponent {
        SignedComponent {
            load_case: case.to_string(),
            load_group: case.to_string(),
            category: "S3".to_string(),
            angle: 0,
            effective_angle: 0.0,
            quadrant: Quadrant::Q1,
            pressure: None,
            magnitude_a: a,
            magnitude_b: b,
        }
    }

    fn deck_mappings() -> Vec<ComponentMapping> {
        vec![
            ComponentMapping::new(ComponentSlot::A, LoadDirection::LocalY, ExposureAxis::Y),
            ComponentMapping::new(ComponentSlot::B, LoadDirection::LocalX, ExposureAxis::Y),
        ]
    }

    #[test]
    fn test_direct_mode_one_row_per_element_and_component() {
        let outcome = PlanBuilder::new("Deck")
            .with_eccentricity(6.0)
            .build(
                &[component("WL_Q1", 0.1, 0.2)],
                &[ElementId(2), ElementId(1)],
                &deck_mappings(),
                PlanMode::Direct,
            )
            .unwrap();

        assert_eq!(outcome.rows.len(), 4);
        assert_eq!(outcome.rows[0].element_id, ElementId(1));
        assert!(outcome.rows.iter().all(|r| r.eccentricity == 6.0 && r.group_name == "Deck"));
    }

    #[test]
    fn test_scenario_b_pressure_times_depth() {
        let mut y = DepthMap::default();
        y.depths.insert(ElementId(1), 3.5);
        y.depths.insert(ElementId(2), 0.0);
        let depths = BTreeMap::from([(ExposureAxis::Y, y)]);

        let outcome = PlanBuilder::new("Deck")
            .build(
                &[component("WS_Q1", 0.02, 0.0)],
                &[ElementId(1), ElementId(2), ElementId(3)],
                &deck_mappings()[..1],
                PlanMode::Pressure(&depths),
            )
            .unwrap();

        assert_eq!(outcome.rows.len(), 1);
        assert!((outcome.rows[0].line_load - 0.07).abs() < 1e-9);
        assert_eq!(outcome.dropped_near_zero, 1);
        assert_eq!(outcome.missing_geometry, vec![ElementId(3)]);
    }

    #[test]
    fn test_pressure_mode_requires_axis_depths() {
        let depths = BTreeMap::new();
        let err = PlanBuilder::new("Pier")
            .build(
                &[component("A", 1.0, 1.0)],
                &[ElementId(1)],
                &deck_mappings(),
                PlanMode::Pressure(&depths),
            )
            .unwrap_err();
        assert!(matches!(err, LoadError::Schema { .. }));
    }

    #[test]
    fn test_near_zero_and_blank_cases_dropped() {
        let outcome = PlanBuilder::new("Deck")
            .build(
                &[component("  ", 1.0, 1.0), component("B", 1e-12, 0.5)],
                &[ElementId(1)],
                &deck_mappings(),
                PlanMode::Direct,
            )
            .unwrap();
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].load_direction, LoadDirection::LocalX);
        assert_eq!(outcome.dropped_blank_case, 1);
        assert_eq!(outcome.dropped_near_zero, 1);
    }

    #[test]
    fn test_rows_sorted_by_case_then_element() {
        let outcome = PlanBuilder::new("Deck")
            .build(
                &[component("B", 1.0, 0.0), component("A", 1.0, 0.0)],
                &[ElementId(7), ElementId(3)],
                &deck_mappings()[..1],
                PlanMode::Direct,
            )
            .unwrap();
        let keys: Vec<(&str, u32)> = outcome
            .rows
            .iter()
            .map(|r| (r.load_case.as_str(), r.element_id.0))
            .collect();
        assert_eq!(keys, vec![("A", 3), ("A", 7), ("B", 3), ("B", 7)]);
    }

    #[test]
    fn test_raw_row_normalization() {
        let raw = RawPlanRow {
            element_id: Some("101".into()),
            line_load: Some(" -0.5 ".into()),
            load_case: Some(" WS_Q2 ".into()),
            load_direction: Some("ly".into()),
            load_group: Some("WS_Q2".into()),
            group_name: None,
            eccentricity: Some("n/a".into()),
        };
        let row = raw.normalize(0).unwrap();
        assert_eq!(row.element_id, ElementId(101));
        assert_eq!(row.load_case, "WS_Q2");
        assert_eq!(row.load_direction, LoadDirection::LocalY);
        assert_eq!(row.eccentricity, 0.0);

        let missing = RawPlanRow {
            load_group: None,
            ..raw.clone()
        };
        assert_eq!(
            missing.normalize(3).unwrap_err(),
            LoadError::schema("plan", Some(3), "load_group")
        );

        let bad_load = RawPlanRow {
            line_load: Some("heavy".into()),
            ..raw
        };
        assert!(matches!(bad_load.normalize(0), Err(LoadError::Validation { .. })));
    }

    #[test]
    fn test_merge_outcomes() {
        let mut first = PlanOutcome {
            rows: vec![PlanRow::new(ElementId(2), 1.0, "B", LoadDirection::LocalY)],
            missing_geometry: vec![ElementId(9)],
            ..Default::default()
        };
        first.merge(PlanOutcome {
            rows: vec![PlanRow::new(ElementId(1), 1.0, "A", LoadDirection::LocalY)],
            missing_geometry: vec![ElementId(9), ElementId(4)],
            dropped_near_zero: 2,
            ..Default::default()
        });
        assert_eq!(first.rows[0].load_case, "A");
        assert_eq!(first.missing_geometry, vec![ElementId(4), ElementId(9)]);
        assert_eq!(first.dropped_near_zero, 2);
    }
}
