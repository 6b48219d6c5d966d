//! Wind load derivation: case tables, signed components and load plans
//!
//! Derivation runs in two stages that separate "varies by case" from
//! "varies by element":
//!
//! - [`ComponentsBuilder`] turns case definitions into one
//!   [`SignedComponent`] per case (magnitudes after quadrant signs).
//! - [`PlanBuilder`] expands components over elements into [`PlanRow`]s,
//!   either directly or as pressure × exposure depth.
//!
//! [`LoadFamily`] bundles the settings of the three wind load families
//! (live wind, deck structural wind, substructure wind) on top of both.
//!
//! # Example
//!
//! ```
//! use windload_core::coefficients::CoefficientTable;
//! use windload_core::loads::{CaseDefinition, ComponentsBuilder, MagnitudeRule};
//!
//! let table = CoefficientTable::from_values(
//!     &[0, 15],
//!     &[0.1, 0.2],
//!     &[1.0, 1.1],
//!     &[0, 15],
//! ).unwrap();
//!
//! let cases = vec![CaseDefinition::new("WL", 15, "WL_Q3")];
//! let set = ComponentsBuilder::new(MagnitudeRule::Coefficients)
//!     .build(&cases, Some(&table))
//!     .unwrap();
//!
//! assert_eq!(set.components[0].magnitude_a, -0.2);
//! assert_eq!(set.components[0].magnitude_b, -1.1);
//! ```

pub mod cases;
pub mod components;
pub mod family;
pub mod load_types;
pub mod plan;

pub use cases::{normalize_case_rows, CaseDefinition, RawCaseRow};
pub use components::{ComponentSet, ComponentsBuilder, MagnitudeRule, SignedComponent};
pub use family::{LoadFamily, TableRequirement};
pub use load_types::LoadDirection;
pub use plan::{
    ComponentMapping, ComponentSlot, PlanBuilder, PlanMode, PlanOutcome, PlanRow, RawPlanRow,
};

/// Magnitudes at or below this are float noise and never become loads
pub const EPS: f64 = 1e-9;

/// True when `value` is large enough to be written as a load
pub fn is_significant(value: f64) -> bool {
    value.is_finite() && value.abs() > EPS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significance_threshold() {
        assert!(is_significant(0.07));
        assert!(is_significant(-1e-6));
        assert!(!is_significant(0.0));
        assert!(!is_significant(5e-10));
        assert!(!is_significant(f64::NAN));
    }
}
