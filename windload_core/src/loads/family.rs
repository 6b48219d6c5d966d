//! Wind load families
//!
//! Each family is one configuration of the shared components/plan contract:
//!
//! | Family | Rule | Slot A | Slot B | Mode |
//! |--------|------|--------|--------|------|
//! | `LiveWind` (WL) | coefficients | LY | LX | direct |
//! | `StructuralWind` (WS deck) | P × (T, L) | LY, depth y | LX, depth y | pressure |
//! | `SubstructureWind` (WS piers) | P × (cos, sin) | LY, depth y | LZ, depth z | pressure |

use serde::{Deserialize, Serialize};

use crate::exposure::ExposureAxis;

use super::components::MagnitudeRule;
use super::load_types::LoadDirection;
use super::plan::{ComponentMapping, ComponentSlot};

/// Whether a family needs a coefficient table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableRequirement {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadFamily {
    /// WL - wind on live load, applied to the deck
    LiveWind,
    /// WS - wind on the deck superstructure
    StructuralWind,
    /// WS - wind on piers and other substructure
    SubstructureWind,
}

impl LoadFamily {
    pub const ALL: [LoadFamily; 3] = [
        LoadFamily::LiveWind,
        LoadFamily::StructuralWind,
        LoadFamily::SubstructureWind,
    ];

    /// Short code used in labels
    pub fn code(&self) -> &'static str {
        match self {
            LoadFamily::LiveWind => "WL",
            LoadFamily::StructuralWind => "WS_DECK",
            LoadFamily::SubstructureWind => "WS_SUB",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LoadFamily::LiveWind => "Wind on live load",
            LoadFamily::StructuralWind => "Wind on superstructure",
            LoadFamily::SubstructureWind => "Wind on substructure",
        }
    }

    pub fn rule(&self) -> MagnitudeRule {
        match self {
            LoadFamily::LiveWind => MagnitudeRule::Coefficients,
            LoadFamily::StructuralWind => MagnitudeRule::PressureScaled,
            LoadFamily::SubstructureWind => MagnitudeRule::PressureDecomposed,
        }
    }

    pub fn table_requirement(&self) -> TableRequirement {
        match self {
            LoadFamily::SubstructureWind => TableRequirement::Optional,
            _ => TableRequirement::Required,
        }
    }

    /// Whether magnitudes are pressures converted through exposure depth
    pub fn uses_pressure(&self) -> bool {
        self.rule().needs_pressure()
    }

    /// Whether the family accepts an angle offset (pier frames)
    pub fn supports_angle_offset(&self) -> bool {
        matches!(self, LoadFamily::SubstructureWind)
    }

    pub fn mappings(&self) -> Vec<ComponentMapping> {
        match self {
            LoadFamily::LiveWind | LoadFamily::StructuralWind => vec![
                ComponentMapping::new(ComponentSlot::A, LoadDirection::LocalY, ExposureAxis::Y),
                ComponentMapping::new(ComponentSlot::B, LoadDirection::LocalX, ExposureAxis::Y),
            ],
            LoadFamily::SubstructureWind => vec![
                ComponentMapping::new(ComponentSlot::A, LoadDirection::LocalY, ExposureAxis::Y),
                ComponentMapping::new(ComponentSlot::B, LoadDirection::LocalZ, ExposureAxis::Z),
            ],
        }
    }

    /// Exposure axes whose depth maps a pressure plan needs
    pub fn axes(&self) -> Vec<ExposureAxis> {
        let mut axes: Vec<ExposureAxis> = self.mappings().iter().map(|m| m.axis).collect();
        axes.sort();
        axes.dedup();
        axes
    }
}

impl std::fmt::Display for LoadFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
