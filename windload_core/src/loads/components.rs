//! Signed per-case components
//!
//! [`ComponentsBuilder`] is the one contract shared by every wind load
//! family. For each case definition it computes a base magnitude pair
//! (a, b), then applies the quadrant signs parsed from the case name:
//!
//! | Rule | a | b |
//! |------|---|---|
//! | `Coefficients` | T | L |
//! | `PressureScaled` | P × T | P × L |
//! | `PressureDecomposed` | P × cos(θ) | P × sin(θ) |
//!
//! where (T, L) is the coefficient pair for the case angle, P is the
//! pressure for (group, category) and θ = angle − angle_offset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coefficients::CoefficientTable;
use crate::errors::{LoadError, LoadResult};
use crate::model::PressureSource;
use crate::quadrant::{Quadrant, QuadrantSignResolver};
use crate::summary::LookupGap;

use super::cases::{normalize_case_rows, CaseDefinition, RawCaseRow};

/// How a case's base magnitudes are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagnitudeRule {
    /// The coefficient pair is the magnitude (already a line load)
    Coefficients,
    /// Pressure scaled by the coefficient pair
    PressureScaled,
    /// Pressure decomposed by the effective angle into cos/sin parts
    PressureDecomposed,
}

impl MagnitudeRule {
    pub fn needs_pressure(&self) -> bool {
        !matches!(self, MagnitudeRule::Coefficients)
    }

    pub fn needs_coefficients(&self) -> bool {
        !matches!(self, MagnitudeRule::PressureDecomposed)
    }
}

/// Magnitudes of one load case after sign application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedComponent {
    pub load_case: String,
    /// Defaults to the load case name
    pub load_group: String,
    pub category: String,
    pub angle: i32,
    /// Angle after re-referencing to the local frame
    pub effective_angle: f64,
    pub quadrant: Quadrant,
    /// Pressure used, for pressure rules
    pub pressure: Option<f64>,
    pub magnitude_a: f64,
    pub magnitude_b: f64,
}

/// Output of one [`ComponentsBuilder::build`] call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSet {
    /// Sorted by (angle, load_case)
    pub components: Vec<SignedComponent>,
    /// Cases whose angle has no coefficient row
    pub skipped_angles: usize,
    /// Unresolved pressure lookups (one per category)
    pub gaps: Vec<LookupGap>,
}

impl ComponentSet {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }
}

/// Builds [`SignedComponent`]s from case definitions.
pub struct ComponentsBuilder<'a> {
    rule: MagnitudeRule,
    signs: QuadrantSignResolver,
    pressures: Option<(&'a dyn PressureSource, String)>,
    angle_offset: f64,
}

impl<'a> ComponentsBuilder<'a> {
    pub fn new(rule: MagnitudeRule) -> Self {
        ComponentsBuilder {
            rule,
            signs: QuadrantSignResolver::new(),
            pressures: None,
            angle_offset: 0.0,
        }
    }

    /// Pressure source and the group whose pressures apply (builder pattern)
    pub fn with_pressure(
        mut self,
        source: &'a dyn PressureSource,
        group_name: impl Into<String>,
    ) -> Self {
        self.pressures = Some((source, group_name.into()));
        self
    }

    /// Offset subtracted from the design angle (builder pattern)
    pub fn with_angle_offset(mut self, angle_offset: f64) -> Self {
        self.angle_offset = angle_offset;
        self
    }

    pub fn rule(&self) -> MagnitudeRule {
        self.rule
    }

    /// Normalize a raw case table, then build.
    pub fn build_from_rows(
        &self,
        rows: &[RawCaseRow],
        table: Option<&CoefficientTable>,
    ) -> LoadResult<ComponentSet> {
        let cases = normalize_case_rows(rows)?;
        self.build(&cases, table)
    }

    /// Build one signed component per usable case.
    ///
    /// Inputs are validated in full before the first case is processed.
    /// Cases whose angle is not in `table` are skipped; cases whose pressure
    /// cannot be resolved are skipped and reported as lookup gaps.
    pub fn build(
        &self,
        cases: &[CaseDefinition],
        table: Option<&CoefficientTable>,
    ) -> LoadResult<ComponentSet> {
        self.validate(cases, table)?;

        let mut set = ComponentSet::default();
        let mut pressure_cache: BTreeMap<&str, Option<f64>> = BTreeMap::new();

        for case in cases {
            let pair = match table {
                Some(t) => match t.get(case.angle) {
                    Some(pair) => Some(pair),
                    None => {
                        tracing::debug!(
                            angle = case.angle,
                            case = %case.case_name,
                            "no coefficients for angle"
                        );
                        set.skipped_angles += 1;
                        continue;
                    }
                },
                None => None,
            };

            let pressure = match &self.pressures {
                Some((source, group)) if self.rule.needs_pressure() => {
                    let cached = *pressure_cache
                        .entry(case.category.as_str())
                        .or_insert_with(|| {
                            let found = source.pressure(group, &case.category);
                            if found.is_none() {
                                tracing::warn!(
                                    group = %group,
                                    category = %case.category,
                                    "no wind pressure defined"
                                );
                                set.gaps.push(LookupGap::MissingPressure {
                                    group: group.clone(),
                                    category: case.category.clone(),
                                });
                            }
                            found
                        });
                    match cached {
                        Some(p) => Some(p),
                        None => continue,
                    }
                }
                _ => None,
            };

            let effective_angle = f64::from(case.angle) - self.angle_offset;
            let (base_a, base_b) = match (self.rule, pair, pressure) {
                (MagnitudeRule::Coefficients, Some(pair), _) => {
                    (pair.transverse, pair.longitudinal)
                }
                (MagnitudeRule::PressureScaled, Some(pair), Some(p)) => {
                    (p * pair.transverse, p * pair.longitudinal)
                }
                (MagnitudeRule::PressureDecomposed, _, Some(p)) => {
                    let theta = effective_angle.to_radians();
                    (p * theta.cos(), p * theta.sin())
                }
                _ => {
                    return Err(LoadError::Internal {
                        message: format!("inputs for {:?} were not validated", self.rule),
                    })
                }
            };

            let quadrant = self.signs.quadrant_of(Some(&case.case_name));
            let (magnitude_a, magnitude_b) = self.signs.apply(quadrant, base_a, base_b);

            set.components.push(SignedComponent {
                load_case: case.case_name.clone(),
                load_group: case.case_name.clone(),
                category: case.category.clone(),
                angle: case.angle,
                effective_angle,
                quadrant,
                pressure,
                magnitude_a,
                magnitude_b,
            });
        }

        set.components
            .sort_by(|x, y| x.angle.cmp(&y.angle).then_with(|| x.load_case.cmp(&y.load_case)));

        tracing::debug!(
            rule = ?self.rule,
            components = set.components.len(),
            skipped_angles = set.skipped_angles,
            gaps = set.gaps.len(),
            "components built"
        );
        Ok(set)
    }

    fn validate(
        &self,
        cases: &[CaseDefinition],
        table: Option<&CoefficientTable>,
    ) -> LoadResult<()> {
        if self.rule.needs_coefficients() && table.is_none() {
            return Err(LoadError::schema("coefficients", None, "coefficient table"));
        }
        if self.rule.needs_pressure() && self.pressures.is_none() {
            return Err(LoadError::schema("pressures", None, "pressure source"));
        }
        if !self.angle_offset.is_finite() {
            return Err(LoadError::validation(
                "cases",
                None,
                "angle_offset",
                self.angle_offset.to_string(),
                "angle offset must be finite",
            ));
        }
        for (row, case) in cases.iter().enumerate() {
            if case.case_name.trim().is_empty() {
                return Err(LoadError::validation(
                    "cases",
                    Some(row),
                    "case_name",
                    "<blank>",
                    "case name is blank",
                ));
            }
            if self.rule.needs_pressure() && case.category.trim().is_empty() {
                return Err(LoadError::validation(
                    "cases",
                    Some(row),
                    "category",
                    "<blank>",
                    "category is blank",
                ));
            }
        }
        Ok(())
    }
}
