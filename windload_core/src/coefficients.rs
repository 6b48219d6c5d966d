//! # Coefficient Tables
//!
//! Fixed-angle lookup of base (transverse, longitudinal) coefficient pairs.
//!
//! Coefficient tables are typed into a grid by the engineer, one row per
//! wind-incidence angle. The set of angles is fixed (the *control angles*),
//! and rows must line up with it exactly: a table that is one row short, or
//! whose rows are shifted, would otherwise put the wrong magnitude on the
//! wrong angle without any visible failure.
//!
//! ## Example
//!
//! ```rust
//! use windload_core::coefficients::CoefficientTable;
//! use windload_core::table::TableCell;
//!
//! let angles: Vec<TableCell> = vec![0.into(), 15.into(), 30.into()];
//! let t: Vec<TableCell> = vec![0.1.into(), 0.2.into(), 0.3.into()];
//! let l: Vec<TableCell> = vec![1.0.into(), 1.1.into(), 1.2.into()];
//!
//! let table = CoefficientTable::build(&angles, &t, &l, &[0, 15, 30], true).unwrap();
//! assert_eq!(table.get(15).unwrap().transverse, 0.2);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{LoadError, LoadResult};
use crate::table::TableCell;

/// Default control angles (degrees) for skew coefficient tables
pub const DEFAULT_CONTROL_ANGLES: [i32; 5] = [0, 15, 30, 45, 60];

const TABLE_NAME: &str = "coefficients";

/// Base coefficients for one control angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientPair {
    /// Transverse coefficient (local Y for deck loads)
    pub transverse: f64,
    /// Longitudinal coefficient (local X for deck loads)
    pub longitudinal: f64,
}

impl CoefficientPair {
    pub fn new(transverse: f64, longitudinal: f64) -> Self {
        CoefficientPair {
            transverse,
            longitudinal,
        }
    }
}

/// Coefficient columns as typed by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCoefficientTable {
    pub angles: Vec<TableCell>,
    pub transverse: Vec<TableCell>,
    pub longitudinal: Vec<TableCell>,
    #[serde(default = "default_control_angles")]
    pub control_angles: Vec<i32>,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_control_angles() -> Vec<i32> {
    DEFAULT_CONTROL_ANGLES.to_vec()
}

fn default_strict() -> bool {
    true
}

impl RawCoefficientTable {
    pub fn build(&self) -> LoadResult<CoefficientTable> {
        CoefficientTable::build(
            &self.angles,
            &self.transverse,
            &self.longitudinal,
            &self.control_angles,
            self.strict,
        )
    }
}

impl From<CoefficientTable> for RawCoefficientTable {
    fn from(table: CoefficientTable) -> Self {
        let (transverse, longitudinal) = table
            .iter()
            .map(|(_, pair)| (TableCell::from(pair.transverse), TableCell::from(pair.longitudinal)))
            .unzip();
        RawCoefficientTable {
            angles: table.control_angles.iter().map(|a| TableCell::from(*a)).collect(),
            transverse,
            longitudinal,
            control_angles: table.control_angles,
            strict: true,
        }
    }
}

/// Validated angle → coefficient pair table.
///
/// Keys are always the control angles, in control order. Deserializing goes
/// through [`CoefficientTable::build`], so a stored table is validated too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoefficientTable", into = "RawCoefficientTable")]
pub struct CoefficientTable {
    control_angles: Vec<i32>,
    pairs: BTreeMap<i32, CoefficientPair>,
}

impl CoefficientTable {
    /// Validate caller columns and build the table.
    ///
    /// * every angle cell must be an integer,
    /// * with `strict`, the angles must equal `control_angles` in value and order,
    /// * all three columns must have `control_angles.len()` rows,
    /// * every coefficient cell must be numeric and non-blank.
    ///
    /// Row `i` is stored under `control_angles[i]`, never under the caller's raw value.
    pub fn build(
        angles: &[TableCell],
        transverse: &[TableCell],
        longitudinal: &[TableCell],
        control_angles: &[i32],
        strict: bool,
    ) -> LoadResult<Self> {
        validate_control_angles(control_angles)?;

        let expected = control_angles.len();
        for (field, len) in [
            ("angle", angles.len()),
            ("transverse", transverse.len()),
            ("longitudinal", longitudinal.len()),
        ] {
            if len != expected {
                return Err(LoadError::validation(
                    TABLE_NAME,
                    None,
                    field,
                    format!("{} rows", len),
                    format!("expected {} rows, one per control angle", expected),
                ));
            }
        }

        let mut parsed_angles = Vec::with_capacity(expected);
        for (row, cell) in angles.iter().enumerate() {
            let angle = cell
                .as_integer()
                .and_then(|a| i32::try_from(a).ok())
                .ok_or_else(|| {
                    LoadError::validation(
                        TABLE_NAME,
                        Some(row),
                        "angle",
                        cell.describe(),
                        "angle must be an integer",
                    )
                })?;
            parsed_angles.push(angle);
        }

        if strict {
            for (row, (given, control)) in parsed_angles.iter().zip(control_angles).enumerate() {
                if given != control {
                    return Err(LoadError::validation(
                        TABLE_NAME,
                        Some(row),
                        "angle",
                        given.to_string(),
                        format!(
                            "expected control angle {} (control set {:?})",
                            control, control_angles
                        ),
                    ));
                }
            }
        }

        let mut pairs = BTreeMap::new();
        for (row, control) in control_angles.iter().enumerate() {
            let t = coefficient_cell(&transverse[row], row, "transverse")?;
            let l = coefficient_cell(&longitudinal[row], row, "longitudinal")?;
            pairs.insert(*control, CoefficientPair::new(t, l));
        }

        Ok(CoefficientTable {
            control_angles: control_angles.to_vec(),
            pairs,
        })
    }

    /// Build from already-numeric columns (strict alignment against `control_angles`)
    pub fn from_values(
        angles: &[i32],
        transverse: &[f64],
        longitudinal: &[f64],
        control_angles: &[i32],
    ) -> LoadResult<Self> {
        let a: Vec<TableCell> = angles.iter().map(|v| TableCell::from(*v)).collect();
        let t: Vec<TableCell> = transverse.iter().map(|v| TableCell::from(*v)).collect();
        let l: Vec<TableCell> = longitudinal.iter().map(|v| TableCell::from(*v)).collect();
        Self::build(&a, &t, &l, control_angles, true)
    }

    /// Coefficient pair for an angle, if the angle is a control angle
    pub fn get(&self, angle: i32) -> Option<CoefficientPair> {
        self.pairs.get(&angle).copied()
    }

    /// Control angles in control order
    pub fn control_angles(&self) -> &[i32] {
        &self.control_angles
    }

    /// (angle, pair) entries in control order
    pub fn iter(&self) -> impl Iterator<Item = (i32, CoefficientPair)> + '_ {
        self.control_angles
            .iter()
            .filter_map(move |a| self.pairs.get(a).map(|pair| (*a, *pair)))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl TryFrom<RawCoefficientTable> for CoefficientTable {
    type Error = LoadError;

    fn try_from(raw: RawCoefficientTable) -> Result<Self, Self::Error> {
        raw.build()
    }
}

fn validate_control_angles(control_angles: &[i32]) -> LoadResult<()> {
    if control_angles.is_empty() {
        return Err(LoadError::validation(
            TABLE_NAME,
            None,
            "control_angles",
            "[]",
            "at least one control angle is required",
        ));
    }
    let mut seen = std::collections::BTreeSet::new();
    for (row, angle) in control_angles.iter().enumerate() {
        if !seen.insert(*angle) {
            return Err(LoadError::validation(
                TABLE_NAME,
                Some(row),
                "control_angles",
                angle.to_string(),
                "duplicate control angle",
            ));
        }
    }
    Ok(())
}

fn coefficient_cell(cell: &TableCell, row: usize, field: &str) -> LoadResult<f64> {
    if cell.is_blank() {
        return Err(LoadError::validation(
            TABLE_NAME,
            Some(row),
            field,
            cell.describe(),
            "coefficient is blank",
        ));
    }
    cell.as_f64().ok_or_else(|| {
        LoadError::validation(
            TABLE_NAME,
            Some(row),
            field,
            cell.describe(),
            "coefficient must be numeric",
        )
    })
}
