//! Caller table cells.
//!
//! Coefficient tables, case tables and section property rows arrive from
//! editable grids or JSON files, so a cell may hold a number, free text, or
//! nothing at all. [`TableCell`] keeps that distinction until a component
//! decides how strictly to interpret it.

use serde::{Deserialize, Serialize};

/// A single cell from a caller-supplied table.
///
/// Deserializes untagged: `1.5` → `Number`, `"1.5"` → `Text`, `null` → `Blank`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum TableCell {
    Number(f64),
    Text(String),
    #[default]
    Blank,
}

impl TableCell {
    /// True for `Blank` and for text that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            TableCell::Blank => true,
            TableCell::Text(s) => s.trim().is_empty(),
            TableCell::Number(_) => false,
        }
    }

    /// Numeric value of the cell, if it has one.
    ///
    /// Text is trimmed and parsed; NaN and infinities are rejected.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            TableCell::Number(v) => *v,
            TableCell::Text(s) => s.trim().parse::<f64>().ok()?,
            TableCell::Blank => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Integer value of the cell. Fractional numbers are rejected.
    pub fn as_integer(&self) -> Option<i64> {
        let value = self.as_f64()?;
        if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
            return None;
        }
        Some(value as i64)
    }

    /// Trimmed text form of the cell (`Blank` → empty string)
    pub fn as_text(&self) -> String {
        match self {
            TableCell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
            TableCell::Number(v) => v.to_string(),
            TableCell::Text(s) => s.trim().to_string(),
            TableCell::Blank => String::new(),
        }
    }

    /// Short rendering used in error messages
    pub fn describe(&self) -> String {
        match self {
            TableCell::Blank => "<blank>".to_string(),
            TableCell::Text(s) if s.trim().is_empty() => "<blank>".to_string(),
            other => format!("{:?}", other.as_text()),
        }
    }
}

impl From<f64> for TableCell {
    fn from(v: f64) -> Self {
        TableCell::Number(v)
    }
}

impl From<i32> for TableCell {
    fn from(v: i32) -> Self {
        TableCell::Number(v as f64)
    }
}

impl From<&str> for TableCell {
    fn from(s: &str) -> Self {
        TableCell::Text(s.to_string())
    }
}

impl From<String> for TableCell {
    fn from(s: String) -> Self {
        TableCell::Text(s)
    }
}

impl<T: Into<TableCell>> From<Option<T>> for TableCell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(TableCell::Blank)
    }
}
