//! # Wind Load Pipeline
//!
//! Orchestrates one run over a list of group targets:
//!
//! ```text
//! case table + coefficients ─► ComponentsBuilder ─► SignedComponent[]
//! group members + depths    ─► PlanBuilder       ─► PlanRow[]  (per group)
//! all groups                ─► PlanApplier       ─► load store
//! ```
//!
//! [`WindLoadGenerator::build_components`] and
//! [`WindLoadGenerator::build_plan`] never write anywhere, so a caller can
//! preview a run before [`WindLoadGenerator::generate_and_apply`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::apply::PlanApplier;
use crate::coefficients::{CoefficientTable, RawCoefficientTable};
use crate::config::WindLoadConfig;
use crate::debug::{DebugSink, NoopSink};
use crate::errors::{LoadError, LoadResult};
use crate::exposure::{DepthMap, ExposureAxis, ExposureResolver};
use crate::loads::{
    normalize_case_rows, CaseDefinition, ComponentSet, ComponentsBuilder, LoadFamily, PlanBuilder,
    PlanMode, PlanOutcome, PlanRow, RawCaseRow, TableRequirement,
};
use crate::model::{ModelSource, PressureSource};
use crate::store::LoadStore;
use crate::summary::{GroupReport, GroupStatus, LookupGap, RunSummary};

static NOOP_SINK: NoopSink = NoopSink;

/// A structural group to generate loads for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTarget {
    pub name: String,
    pub family: LoadFamily,
    /// Rotation of the group's local frame against the shared wind frame (degrees)
    #[serde(default)]
    pub angle_offset: f64,
}

impl GroupTarget {
    pub fn new(name: impl Into<String>, family: LoadFamily) -> Self {
        GroupTarget {
            name: name.into(),
            family,
            angle_offset: 0.0,
        }
    }

    /// Set the angle offset (builder pattern)
    pub fn with_angle_offset(mut self, angle_offset: f64) -> Self {
        self.angle_offset = angle_offset;
        self
    }
}

/// Case table and coefficient table of one family, as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFamilyTables {
    #[serde(default)]
    pub cases: Vec<RawCaseRow>,
    #[serde(default)]
    pub coefficients: Option<RawCoefficientTable>,
}

impl RawFamilyTables {
    pub fn validate(&self) -> LoadResult<FamilyTables> {
        Ok(FamilyTables {
            cases: normalize_case_rows(&self.cases)?,
            coefficients: self.coefficients.as_ref().map(RawCoefficientTable::build).transpose()?,
        })
    }
}

/// Validated inputs of one family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyTables {
    pub cases: Vec<CaseDefinition>,
    pub coefficients: Option<CoefficientTable>,
}

/// Validated inputs of every family used in a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindTables {
    pub families: BTreeMap<LoadFamily, FamilyTables>,
}

impl WindTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a family's tables (builder pattern)
    pub fn with_family(mut self, family: LoadFamily, tables: FamilyTables) -> Self {
        self.families.insert(family, tables);
        self
    }

    /// Validate every family's raw tables
    pub fn from_raw(raw: &BTreeMap<LoadFamily, RawFamilyTables>) -> LoadResult<Self> {
        let mut families = BTreeMap::new();
        for (family, tables) in raw {
            families.insert(*family, tables.validate()?);
        }
        Ok(WindTables { families })
    }

    pub fn get(&self, family: LoadFamily) -> Option<&FamilyTables> {
        self.families.get(&family)
    }
}

/// Plan for one group target
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    pub target: GroupTarget,
    pub status: GroupStatus,
    pub components: ComponentSet,
    pub outcome: PlanOutcome,
}

/// Combined plan of a run, plus its summary so far
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    /// Sorted by (load_case, element_id)
    pub rows: Vec<PlanRow>,
    pub groups: Vec<GroupPlan>,
    pub summary: RunSummary,
}

/// Runs the component → plan → apply pipeline over group targets.
pub struct WindLoadGenerator<'a> {
    pressures: &'a dyn PressureSource,
    config: WindLoadConfig,
    exposure: ExposureResolver<'a>,
    sink: &'a dyn DebugSink,
}

impl<'a> WindLoadGenerator<'a> {
    pub fn new(
        model: &'a dyn ModelSource,
        pressures: &'a dyn PressureSource,
        config: WindLoadConfig,
    ) -> Self {
        let config = config.normalized();
        WindLoadGenerator {
            pressures,
            exposure: ExposureResolver::new(model, config.exposure.clone()),
            config,
            sink: &NOOP_SINK,
        }
    }

    /// Send intermediate payloads to `sink` (builder pattern)
    pub fn with_sink(mut self, sink: &'a dyn DebugSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &WindLoadConfig {
        &self.config
    }

    pub fn exposure(&self) -> &ExposureResolver<'a> {
        &self.exposure
    }

    /// Drop cached model lookups (after the model was edited)
    pub fn reset_caches(&mut self) {
        self.exposure.clear();
    }

    /// Signed components of one target (no writes)
    pub fn build_components(
        &self,
        target: &GroupTarget,
        tables: &WindTables,
    ) -> LoadResult<ComponentSet> {
        let family_tables = self.tables_for(target, tables)?;
        let mut builder = ComponentsBuilder::new(target.family.rule());
        if target.family.uses_pressure() {
            builder = builder.with_pressure(self.pressures, target.name.as_str());
        }
        if target.family.supports_angle_offset() {
            builder = builder.with_angle_offset(target.angle_offset);
        }
        builder.build(&family_tables.cases, family_tables.coefficients.as_ref())
    }

    /// Components and plan rows of one target (no writes)
    pub fn build_group_plan(
        &self,
        target: &GroupTarget,
        tables: &WindTables,
    ) -> LoadResult<GroupPlan> {
        let components = self.build_components(target, tables)?;
        let elements = self.exposure.group_elements(&target.name);

        let mut plan = GroupPlan {
            target: target.clone(),
            status: GroupStatus::NoElements,
            components,
            outcome: PlanOutcome::default(),
        };

        if elements.is_empty() {
            tracing::warn!(group = %target.name, "group has no elements");
            return Ok(plan);
        }
        if plan.components.is_empty() {
            tracing::warn!(
                group = %target.name,
                family = %target.family,
                "no components for group"
            );
            plan.status = GroupStatus::NoComponents;
            return Ok(plan);
        }

        let label = format!("{}_{}", target.family.code(), target.name);
        if self.sink.enabled() {
            self.sink.record(
                &format!("components/{}", label),
                &json!({
                    "label": label,
                    "rows": plan.components.len(),
                    "data": plan.components.components,
                }),
            );
        }

        let eccentricity = match target.family {
            LoadFamily::LiveWind => self.config.live_wind_eccentricity,
            _ => 0.0,
        };
        let builder = PlanBuilder::new(target.name.as_str()).with_eccentricity(eccentricity);
        let mappings = target.family.mappings();

        let components = &plan.components.components;
        plan.outcome = if target.family.uses_pressure() {
            let depths: BTreeMap<ExposureAxis, DepthMap> = target
                .family
                .axes()
                .into_iter()
                .map(|axis| (axis, self.exposure.depth_map(&elements, axis)))
                .collect();
            builder.build(components, &elements, &mappings, PlanMode::Pressure(&depths))?
        } else {
            builder.build(components, &elements, &mappings, PlanMode::Direct)?
        };

        plan.status = if plan.outcome.is_empty() {
            GroupStatus::NoLoads
        } else {
            GroupStatus::Planned {
                rows: plan.outcome.rows.len(),
            }
        };

        if self.sink.enabled() && !plan.outcome.is_empty() {
            self.sink.record(
                &format!("plans/{}", label),
                &json!({
                    "label": label,
                    "rows": plan.outcome.rows.len(),
                    "data": plan.outcome.rows,
                }),
            );
        }
        Ok(plan)
    }

    /// Plan every target and combine the rows (no writes).
    ///
    /// All targets are checked against `tables` before any group is planned.
    pub fn build_plan(
        &self,
        targets: &[GroupTarget],
        tables: &WindTables,
    ) -> LoadResult<GeneratedPlan> {
        for target in targets {
            self.tables_for(target, tables)?;
        }

        let mut summary = RunSummary::new();
        let mut combined = PlanOutcome::default();
        let mut groups = Vec::with_capacity(targets.len());
        let mut missing_geometry = BTreeSet::new();

        for target in targets {
            let plan = self.build_group_plan(target, tables)?;

            summary.lookup_gaps.extend(plan.components.gaps.iter().cloned());
            for eid in &plan.outcome.missing_geometry {
                missing_geometry.insert(*eid);
                summary.lookup_gaps.push(LookupGap::MissingGeometry {
                    group: target.name.clone(),
                    element_id: *eid,
                });
            }
            summary.per_group_status.push(GroupReport {
                group: target.name.clone(),
                family: target.family,
                status: plan.status.clone(),
            });
            tracing::info!(
                group = %target.name,
                family = %target.family,
                status = ?plan.status,
                "group planned"
            );

            combined.merge(plan.outcome.clone());
            groups.push(plan);
        }

        summary.rows_generated = combined.rows.len();
        summary.rows_near_zero = combined.dropped_near_zero;
        summary.elements_missing_geometry = missing_geometry.len();
        if targets.iter().any(|t| t.family.uses_pressure()) {
            summary.sections_skipped = self.exposure.exposure_table().skipped.clone();
        }

        tracing::info!(
            run_id = %summary.run_id,
            rows = summary.rows_generated,
            groups = targets.len(),
            gaps = summary.lookup_gaps.len(),
            "plan built"
        );

        Ok(GeneratedPlan {
            rows: combined.rows,
            groups,
            summary,
        })
    }

    /// Plan every target and merge the result into `store`.
    pub fn generate_and_apply<S: LoadStore + ?Sized>(
        &self,
        store: &mut S,
        targets: &[GroupTarget],
        tables: &WindTables,
    ) -> LoadResult<RunSummary> {
        let plan = self.build_plan(targets, tables)?;
        let mut summary = plan.summary;

        let mut applier = PlanApplier::new(self.config.apply.clone()).with_sink(self.sink);
        let report = applier.apply(store, &plan.rows)?;
        summary.record_apply(report);

        if self.sink.enabled() {
            if let Ok(payload) = serde_json::to_value(&summary) {
                self.sink.record("summaries/run", &payload);
            }
        }
        tracing::info!(
            run_id = %summary.run_id,
            rows_sent = summary.rows_sent,
            batches = summary.batches,
            "wind loads applied"
        );
        Ok(summary)
    }

    fn tables_for<'t>(
        &self,
        target: &GroupTarget,
        tables: &'t WindTables,
    ) -> LoadResult<&'t FamilyTables> {
        if target.name.trim().is_empty() {
            return Err(LoadError::validation(
                "groups",
                None,
                "name",
                "<blank>",
                "group name is blank",
            ));
        }
        if !target.family.supports_angle_offset() && target.angle_offset != 0.0 {
            return Err(LoadError::validation(
                "groups",
                None,
                "angle_offset",
                target.angle_offset.to_string(),
                format!("{} loads do not take an angle offset", target.family.description()),
            ));
        }

        let family_tables = tables
            .get(target.family)
            .ok_or_else(|| LoadError::schema(target.family.code(), None, "cases"))?;
        if target.family.table_requirement() == TableRequirement::Required
            && family_tables.coefficients.is_none()
        {
            return Err(LoadError::schema(target.family.code(), None, "coefficients"));
        }
        Ok(family_tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::DEFAULT_CONTROL_ANGLES;
    use crate::apply::ApplyState;
    use crate::loads::LoadDirection;
    use crate::model::{ElementId, ModelSnapshot};
    use crate::store::{MemoryStore, StoredRecord};

    fn model() -> ModelSnapshot {
        ModelSnapshot::new()
            .with_element(1, 10)
            .with_element(2, 10)
            .with_element(3, 20)
            .with_element(4, 99)
            .with_section(10, 1.0, 1.0, 2.0, 1.5)
            .with_section(20, 0.5, 0.5, 1.0, 1.0)
            .with_group("Deck", &[1, 2])
            .with_group("Pier", &[3, 4])
            .with_group("Empty", &[])
            .with_pressure("Deck", "Strength III", 0.02)
            .with_pressure("Pier", "Strength III", 0.04)
    }

    fn coefficients() -> CoefficientTable {
        CoefficientTable::from_values(
            &[0, 15, 30, 45, 60],
            &[0.1, 0.2, 0.3, 0.4, 0.5],
            &[1.0, 1.1, 1.2, 1.3, 1.4],
            &DEFAULT_CONTROL_ANGLES,
        )
        .unwrap()
    }

    fn tables() -> WindTables {
        WindTables::new()
            .with_family(
                LoadFamily::LiveWind,
                FamilyTables {
                    cases: vec![CaseDefinition::new("WL", 15, "WL_A15_Q3")],
                    coefficients: Some(coefficients()),
                },
            )
            .with_family(
                LoadFamily::StructuralWind,
                FamilyTables {
                    cases: vec![
                        CaseDefinition::new("Strength III", 0, "WS_A0_Q1"),
                        CaseDefinition::new("Service I", 0, "WS_SVC_Q1"),
                    ],
                    coefficients: Some(coefficients()),
                },
            )
            .with_family(
                LoadFamily::SubstructureWind,
                FamilyTables {
                    cases: vec![CaseDefinition::new("Strength III", 90, "WS_PIER_A90_Q1")],
                    coefficients: None,
                },
            )
    }

    #[test]
    fn test_live_wind_preview() {
        let model = model();
        let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
        let plan = generator
            .build_plan(&[GroupTarget::new("Deck", LoadFamily::LiveWind)], &tables())
            .unwrap();

        assert_eq!(plan.rows.len(), 4);
        let ly = plan
            .rows
            .iter()
            .find(|r| r.element_id == ElementId(1) && r.load_direction == LoadDirection::LocalY)
            .unwrap();
        assert_eq!(ly.line_load, -0.2);
        assert_eq!(ly.eccentricity, 6.0);
        assert_eq!(plan.summary.per_group_status[0].status, GroupStatus::Planned { rows: 4 });
    }

    #[test]
    fn test_structural_wind_uses_primary_depth() {
        let model = model();
        let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
        let plan = generator
            .build_plan(&[GroupTarget::new("Deck", LoadFamily::StructuralWind)], &tables())
            .unwrap();

        // depth y = 2.0 + 1.5 = 3.5; LY = 0.02 * 0.1 * 3.5, LX = 0.02 * 1.0 * 3.5
        let e1: Vec<&PlanRow> = plan.rows.iter().filter(|r| r.element_id == ElementId(1)).collect();
        assert_eq!(e1.len(), 2);
        let lx = e1.iter().find(|r| r.load_direction == LoadDirection::LocalX).unwrap();
        assert!((lx.line_load - 0.07).abs() < 1e-9);
        let ly = e1.iter().find(|r| r.load_direction == LoadDirection::LocalY).unwrap();
        assert!((ly.line_load - 0.007).abs() < 1e-9);

        assert_eq!(
            plan.summary.lookup_gaps,
            vec![LookupGap::MissingPressure {
                group: "Deck".to_string(),
                category: "Service I".to_string()
            }]
        );
    }

    #[test]
    fn test_substructure_wind_missing_geometry() {
        let model = model();
        let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
        let plan = generator
            .build_plan(&[GroupTarget::new("Pier", LoadFamily::SubstructureWind)], &tables())
            .unwrap();

        // angle 90: all pressure in local z; depth z of section 20 = 1.0
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rows[0].load_direction, LoadDirection::LocalZ);
        assert!((plan.rows[0].line_load - 0.04).abs() < 1e-9);
        assert_eq!(plan.summary.elements_missing_geometry, 1);
        assert!(plan.summary.lookup_gaps.contains(&LookupGap::MissingGeometry {
            group: "Pier".to_string(),
            element_id: ElementId(4)
        }));
    }

    #[test]
    fn test_angle_offset_rotates_pier_frame() {
        let model = model();
        let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
        let target = GroupTarget::new("Pier", LoadFamily::SubstructureWind).with_angle_offset(90.0);
        let plan = generator.build_plan(&[target], &tables()).unwrap();
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.rows[0].load_direction, LoadDirection::LocalY);
        // depth y of section 20 = 1.0 + 1.0
        assert!((plan.rows[0].line_load - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_group_statuses() {
        let model = model();
        let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
        let mut tables = tables();
        tables.families.insert(
            LoadFamily::LiveWind,
            FamilyTables {
                cases: vec![CaseDefinition::new("WL", 20, "WL_A20")],
                coefficients: Some(coefficients()),
            },
        );
        let plan = generator
            .build_plan(
                &[
                    GroupTarget::new("Empty", LoadFamily::StructuralWind),
                    GroupTarget::new("Deck", LoadFamily::LiveWind),
                ],
                &tables,
            )
            .unwrap();
        assert_eq!(plan.summary.per_group_status[0].status, GroupStatus::NoElements);
        assert_eq!(plan.summary.per_group_status[1].status, GroupStatus::NoComponents);
        assert!(plan.rows.is_empty());
    }

    #[test]
    fn test_missing_tables_fail_before_planning() {
        let model = model();
        let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
        let only_wl = WindTables::new().with_family(
            LoadFamily::LiveWind,
            FamilyTables {
                cases: vec![],
                coefficients: None,
            },
        );
        let err = generator
            .build_plan(&[GroupTarget::new("Deck", LoadFamily::LiveWind)], &only_wl)
            .unwrap_err();
        assert_eq!(err, LoadError::schema("WL", None, "coefficients"));

        let err = generator
            .build_plan(&[GroupTarget::new("Deck", LoadFamily::StructuralWind)], &only_wl)
            .unwrap_err();
        assert!(matches!(err, LoadError::Schema { .. }));

        let offset = GroupTarget::new("Deck", LoadFamily::LiveWind).with_angle_offset(5.0);
        let err = generator.build_plan(&[offset], &tables()).unwrap_err();
        assert!(matches!(err, LoadError::Validation { ref field, .. } if field == "angle_offset"));
    }

    #[test]
    fn test_generate_and_apply() {
        let model = model();
        let generator = WindLoadGenerator::new(&model, &model, WindLoadConfig::default());
        let mut store =
            MemoryStore::new().with_records(ElementId(1), vec![StoredRecord::new(1, "DEAD")]);
        let targets = [
            GroupTarget::new("Deck", LoadFamily::LiveWind),
            GroupTarget::new("Pier", LoadFamily::SubstructureWind),
        ];

        let summary = generator.generate_and_apply(&mut store, &targets, &tables()).unwrap();
        assert_eq!(summary.rows_sent, 5);
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.apply.as_ref().map(|a| a.final_state), Some(ApplyState::Done));
        assert_eq!(store.records(ElementId(1)).len(), 3);
        assert_eq!(store.records(ElementId(1))[0].load_case(), Some("DEAD"));

        let again = generator.generate_and_apply(&mut store, &targets, &tables()).unwrap();
        assert_eq!(again.apply.unwrap().replaced_records, 5);
        assert_eq!(store.records(ElementId(1)).len(), 3);
        assert_ne!(summary.run_id, again.run_id);
    }

    #[test]
    fn test_raw_tables() {
        let raw: BTreeMap<LoadFamily, RawFamilyTables> = serde_json::from_str(
            r#"{"LiveWind": {
                "cases": [{"category": "WL", "angle": 0, "case_name": "WL_A0"}],
                "coefficients": {"angles": [0, 15, 30, 45, 60],
                                 "transverse": [0.1, 0.2, 0.3, 0.4, 0.5],
                                 "longitudinal": [1.0, 1.1, 1.2, 1.3, 1.4]}
            }}"#,
        )
        .unwrap();
        let tables = WindTables::from_raw(&raw).unwrap();
        assert_eq!(tables.get(LoadFamily::LiveWind).unwrap().cases.len(), 1);
        assert!(tables.get(LoadFamily::LiveWind).unwrap().coefficients.is_some());
    }
}
