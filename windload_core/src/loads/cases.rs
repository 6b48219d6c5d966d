//! Case tables
//!
//! A case table lists the load cases to generate: the base load category
//! (used for pressure lookups), the wind angle, and the final case name that
//! carries the quadrant token.

use serde::{Deserialize, Serialize};

use crate::errors::{LoadError, LoadResult};
use crate::table::TableCell;

const TABLE_NAME: &str = "cases";

/// A requested load case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDefinition {
    /// Base load category, e.g. "Strength III"
    pub category: String,
    /// Wind incidence angle in degrees
    pub angle: i32,
    /// Final case name, e.g. "WS_A15_Q2"
    pub case_name: String,
}

impl CaseDefinition {
    pub fn new(category: impl Into<String>, angle: i32, case_name: impl Into<String>) -> Self {
        CaseDefinition {
            category: category.into(),
            angle,
            case_name: case_name.into(),
        }
    }
}

/// One case-table row as typed by the user.
///
/// A field that is absent (or `null`) is a schema problem; a field that is
/// present but unusable is a validation problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCaseRow {
    #[serde(default)]
    pub category: Option<TableCell>,
    #[serde(default)]
    pub angle: Option<TableCell>,
    #[serde(default)]
    pub case_name: Option<TableCell>,
}

impl RawCaseRow {
    pub fn new(
        category: impl Into<TableCell>,
        angle: impl Into<TableCell>,
        case_name: impl Into<TableCell>,
    ) -> Self {
        RawCaseRow {
            category: Some(category.into()),
            angle: Some(angle.into()),
            case_name: Some(case_name.into()),
        }
    }
}

/// Validate and normalize a whole case table.
///
/// Every row is checked before anything is returned, so no caller ever
/// sees a partially normalized table.
pub fn normalize_case_rows(rows: &[RawCaseRow]) -> LoadResult<Vec<CaseDefinition>> {
    rows.iter()
        .enumerate()
        .map(|(row, raw)| normalize_case_row(row, raw))
        .collect()
}

fn normalize_case_row(row: usize, raw: &RawCaseRow) -> LoadResult<CaseDefinition> {
    let category = required(row, "category", &raw.category)?;
    let angle_cell = required(row, "angle", &raw.angle)?;
    let case_cell = required(row, "case_name", &raw.case_name)?;

    let angle_value = angle_cell.as_f64().ok_or_else(|| {
        LoadError::validation(
            TABLE_NAME,
            Some(row),
            "angle",
            angle_cell.describe(),
            "angle must be numeric",
        )
    })?;
    let angle = angle_cell
        .as_integer()
        .and_then(|a| i32::try_from(a).ok())
        .ok_or_else(|| {
            LoadError::validation(
                TABLE_NAME,
                Some(row),
                "angle",
                angle_value.to_string(),
                "angle must be a whole number of degrees",
            )
        })?;

    let category_text = category.as_text();
    if category_text.is_empty() {
        return Err(LoadError::validation(
            TABLE_NAME,
            Some(row),
            "category",
            category.describe(),
            "category is blank",
        ));
    }

    let case_name = case_cell.as_text();
    if case_name.is_empty() {
        return Err(LoadError::validation(
            TABLE_NAME,
            Some(row),
            "case_name",
            case_cell.describe(),
            "case name is blank",
        ));
    }

    Ok(CaseDefinition {
        category: category_text,
        angle,
        case_name,
    })
}

fn required<'a>(row: usize, field: &str, cell: &'a Option<TableCell>) -> LoadResult<&'a TableCell> {
    cell.as_ref().ok_or_else(|| LoadError::schema(TABLE_NAME, Some(row), field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_text_and_numbers() {
        let rows = vec![
            RawCaseRow::new(" Strength III ", "15", " WS_A15_Q2 "),
            RawCaseRow::new("Service I", 30.0, "WS_A30_Q1"),
        ];
        let cases = normalize_case_rows(&rows).unwrap();
        assert_eq!(cases[0], CaseDefinition::new("Strength III", 15, "WS_A15_Q2"));
        assert_eq!(cases[1].angle, 30);
    }

    #[test]
    fn test_missing_field_is_schema_error() {
        let rows = vec![
            RawCaseRow::new("S3", 0, "A"),
            RawCaseRow {
                category: Some("S3".into()),
                angle: None,
                case_name: Some("B".into()),
            },
        ];
        let err = normalize_case_rows(&rows).unwrap_err();
        assert_eq!(err, LoadError::schema("cases", Some(1), "angle"));
    }

    #[test]
    fn test_bad_angles_are_validation_errors() {
        let err = normalize_case_rows(&[RawCaseRow::new("S3", "abc", "A")]).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Validation { row: Some(0), ref field, .. } if field == "angle"
        ));

        let err = normalize_case_rows(&[RawCaseRow::new("S3", 22.5, "A")]).unwrap_err();
        assert!(err.to_string().contains("whole number"));
    }

    #[test]
    fn test_blank_names_rejected() {
        let err = normalize_case_rows(&[RawCaseRow::new("S3", 0, "  ")]).unwrap_err();
        assert!(matches!(err, LoadError::Validation { ref field, .. } if field == "case_name"));

        let err = normalize_case_rows(&[RawCaseRow::new(TableCell::Blank, 0, "A")]).unwrap_err();
        assert!(matches!(err, LoadError::Validation { ref field, .. } if field == "category"));
    }

    #[test]
    fn test_rows_from_json() {
        let rows: Vec<RawCaseRow> = serde_json::from_str(
            r#"[{"category": "S3", "angle": 45, "case_name": "WS_Q4"}, {"category": "S3"}]"#,
        )
        .unwrap();
        assert!(normalize_case_rows(&rows[..1]).is_ok());
        assert!(matches!(normalize_case_rows(&rows), Err(LoadError::Schema { .. })));
    }
}
