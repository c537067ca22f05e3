use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::error::FrameError;
use super::model::{CellValue, Dataset};

// ---------------------------------------------------------------------------
// Derived tables: every operation returns a new Dataset
// ---------------------------------------------------------------------------

fn column_index(dataset: &Dataset, column: &str) -> Result<usize, FrameError> {
    dataset
        .column_index(column)
        .ok_or_else(|| FrameError::ColumnNotFound(column.to_string()))
}

/// Rows whose value in `column` reads exactly as `value`.
///
/// Comparison is on the rendered cell, so `"3"` matches the integer `3`
/// and `"2024-01-05"` matches a date at midnight.
pub fn filter_equals(dataset: &Dataset, column: &str, value: &str) -> Result<Dataset, FrameError> {
    let idx = column_index(dataset, column)?;
    let wanted = value.trim();
    let indices: Vec<usize> = dataset
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !row[idx].is_null() && row[idx].to_string() == wanted)
        .map(|(i, _)| i)
        .collect();
    Ok(dataset.select_rows(&indices))
}

/// Rows whose value in `column` is one of `selected`.
pub fn filter_in(
    dataset: &Dataset,
    column: &str,
    selected: &BTreeSet<CellValue>,
) -> Result<Dataset, FrameError> {
    let idx = column_index(dataset, column)?;
    let indices: Vec<usize> = dataset
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| selected.contains(&row[idx]))
        .map(|(i, _)| i)
        .collect();
    Ok(dataset.select_rows(&indices))
}

/// Stable sort on one column. Nulls go last in either direction.
pub fn sort_by(dataset: &Dataset, column: &str, ascending: bool) -> Result<Dataset, FrameError> {
    let idx = column_index(dataset, column)?;
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    indices.sort_by(|&a, &b| {
        let va = &dataset.rows[a][idx];
        let vb = &dataset.rows[b][idx];
        match (va.is_null(), vb.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if ascending => va.cmp(vb),
            (false, false) => vb.cmp(va),
        }
    });
    Ok(dataset.select_rows(&indices))
}

// ---------------------------------------------------------------------------
// Group-by
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl Aggregation {
    pub const ALL: [Aggregation; 5] = [
        Aggregation::Count,
        Aggregation::Sum,
        Aggregation::Mean,
        Aggregation::Min,
        Aggregation::Max,
    ];

    fn apply(self, values: &[f64], non_null: usize) -> CellValue {
        match self {
            Aggregation::Count => CellValue::Integer(non_null as i64),
            _ if values.is_empty() => CellValue::Null,
            Aggregation::Sum => CellValue::Float(values.iter().sum()),
            Aggregation::Mean => {
                CellValue::Float(values.iter().sum::<f64>() / values.len() as f64)
            }
            Aggregation::Min => {
                CellValue::Float(values.iter().copied().fold(f64::INFINITY, f64::min))
            }
            Aggregation::Max => {
                CellValue::Float(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Count => "Count",
            Aggregation::Sum => "Sum",
            Aggregation::Mean => "Mean",
            Aggregation::Min => "Min",
            Aggregation::Max => "Max",
        };
        f.write_str(name)
    }
}

/// One row per distinct value of `key` (in sorted order) with the
/// aggregate of `value` over that group.
///
/// `Count` counts non-null cells of any type; the other aggregations need a
/// numeric `value` column.
pub fn group_by(
    dataset: &Dataset,
    key: &str,
    value: &str,
    aggregation: Aggregation,
) -> Result<Dataset, FrameError> {
    let key_idx = column_index(dataset, key)?;
    let value_idx = column_index(dataset, value)?;
    if aggregation != Aggregation::Count && !dataset.column_types[value_idx].is_numeric() {
        return Err(FrameError::NotNumeric(value.to_string()));
    }

    let mut groups: BTreeMap<&CellValue, (Vec<f64>, usize)> = BTreeMap::new();
    for row in &dataset.rows {
        let entry = groups.entry(&row[key_idx]).or_default();
        let cell = &row[value_idx];
        if !cell.is_null() {
            entry.1 += 1;
        }
        if let Some(v) = cell.as_f64() {
            entry.0.push(v);
        }
    }

    let rows: Vec<Vec<CellValue>> = groups
        .into_iter()
        .map(|(k, (values, non_null))| vec![k.clone(), aggregation.apply(&values, non_null)])
        .collect();

    let columns = vec![key.to_string(), format!("{value} ({aggregation})")];
    Ok(Dataset::from_rows(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_csv;
    use crate::data::model::ColumnType;

    fn sales() -> Dataset {
        read_csv(b"region,units,rep\nnorth,5,ann\nsouth,,bob\nnorth,7,cy\neast,1,ann\n").unwrap()
    }

    #[test]
    fn test_filter_equals_returns_copy() {
        let ds = sales();
        let before = ds.clone();
        let north = filter_equals(&ds, "region", "north").unwrap();
        assert_eq!(north.len(), 2);
        assert_eq!(ds, before);

        let units = filter_equals(&ds, "units", "7").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units.rows[0][2], CellValue::Text("cy".into()));
    }

    #[test]
    fn test_unknown_column() {
        assert_eq!(
            filter_equals(&sales(), "nope", "x").unwrap_err(),
            FrameError::ColumnNotFound("nope".into())
        );
    }

    #[test]
    fn test_filter_in() {
        let ds = sales();
        let selected: BTreeSet<CellValue> = [CellValue::Text("ann".into())].into_iter().collect();
        assert_eq!(filter_in(&ds, "rep", &selected).unwrap().len(), 2);

        // An empty selection keeps nothing.
        assert!(filter_in(&ds, "rep", &BTreeSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_sort_nulls_last() {
        let ds = sales();
        let asc = sort_by(&ds, "units", true).unwrap();
        let units: Vec<_> = asc.column(1).cloned().collect();
        assert_eq!(
            units,
            vec![
                CellValue::Integer(1),
                CellValue::Integer(5),
                CellValue::Integer(7),
                CellValue::Null
            ]
        );
        let desc = sort_by(&ds, "units", false).unwrap();
        assert_eq!(desc.rows[0][1], CellValue::Integer(7));
        assert_eq!(desc.rows[3][1], CellValue::Null);
    }

    #[test]
    fn test_group_by() {
        let ds = sales();
        let sums = group_by(&ds, "region", "units", Aggregation::Sum).unwrap();
        assert_eq!(sums.column_names, vec!["region", "units (Sum)"]);
        assert_eq!(sums.column_types[1], ColumnType::Numeric);
        assert_eq!(
            sums.rows,
            vec![
                vec![CellValue::Text("east".into()), CellValue::Float(1.0)],
                vec![CellValue::Text("north".into()), CellValue::Float(12.0)],
                vec![CellValue::Text("south".into()), CellValue::Null],
            ]
        );

        let counts = group_by(&ds, "rep", "region", Aggregation::Count).unwrap();
        assert_eq!(counts.rows[0], vec![CellValue::Text("ann".into()), CellValue::Integer(2)]);

        assert_eq!(
            group_by(&ds, "region", "rep", Aggregation::Mean).unwrap_err(),
            FrameError::NotNumeric("rep".into())
        );
    }
}
