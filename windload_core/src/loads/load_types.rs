//! Load direction definitions
//!
//! Beam loads act along one axis, either in the element's local frame
//! (`LX`, `LY`, `LZ`) or in the global frame (`GX`, `GY`, `GZ`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LoadError;

/// Axis a uniform beam load acts along
///
/// # Example
/// ```
/// use windload_core::loads::LoadDirection;
///
/// let d: LoadDirection = "ly".parse().unwrap();
/// assert_eq!(d, LoadDirection::LocalY);
/// assert_eq!(d.code(), "LY");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadDirection {
    /// LX - element local x (along the member)
    #[serde(rename = "LX")]
    LocalX,
    /// LY - element local y
    #[serde(rename = "LY")]
    LocalY,
    /// LZ - element local z
    #[serde(rename = "LZ")]
    LocalZ,
    /// GX - global x
    #[serde(rename = "GX")]
    GlobalX,
    /// GY - global y
    #[serde(rename = "GY")]
    GlobalY,
    /// GZ - global z
    #[serde(rename = "GZ")]
    GlobalZ,
}

impl LoadDirection {
    /// All directions in standard order
    pub const ALL: [LoadDirection; 6] = [
        LoadDirection::LocalX,
        LoadDirection::LocalY,
        LoadDirection::LocalZ,
        LoadDirection::GlobalX,
        LoadDirection::GlobalY,
        LoadDirection::GlobalZ,
    ];

    /// Store code (LX, LY, LZ, GX, GY, GZ)
    pub fn code(&self) -> &'static str {
        match self {
            LoadDirection::LocalX => "LX",
            LoadDirection::LocalY => "LY",
            LoadDirection::LocalZ => "LZ",
            LoadDirection::GlobalX => "GX",
            LoadDirection::GlobalY => "GY",
            LoadDirection::GlobalZ => "GZ",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            LoadDirection::LocalX => "Local x (member axis)",
            LoadDirection::LocalY => "Local y",
            LoadDirection::LocalZ => "Local z",
            LoadDirection::GlobalX => "Global X",
            LoadDirection::GlobalY => "Global Y",
            LoadDirection::GlobalZ => "Global Z",
        }
    }

    /// Whether the direction is in the element's local frame
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            LoadDirection::LocalX | LoadDirection::LocalY | LoadDirection::LocalZ
        )
    }

    /// Parse a direction code, reporting failures against a table row
    pub fn parse_cell(raw: &str, table: &str, row: Option<usize>) -> Result<Self, LoadError> {
        let code = raw.trim().to_ascii_uppercase();
        LoadDirection::ALL
            .iter()
            .copied()
            .find(|d| d.code() == code)
            .ok_or_else(|| {
                LoadError::validation(
                    table,
                    row,
                    "load_direction",
                    raw,
                    "expected one of LX, LY, LZ, GX, GY, GZ",
                )
            })
    }
}

impl FromStr for LoadDirection {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoadDirection::parse_cell(s, "load_direction", None)
    }
}

impl std::fmt::Display for LoadDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
