//! High-level overview of a dataset
//!
//! Everything the "what would you like to know about the data?" section
//! shows:
//! - Dimensions and field descriptions
//! - A describe-style summary table with null counts
//! - Value counts, missing values, duplicates and unique counts

use std::collections::{BTreeMap, HashSet};
use std::mem::size_of;

use crate::data::error::FrameError;
use crate::data::model::{CellValue, ColumnType, Dataset};

/// Name and inferred type of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescription {
    pub name: String,
    pub column_type: ColumnType,
}

/// Columns with their types, ordered by type name descending (ties keep
/// source order).
pub fn field_descriptions(dataset: &Dataset) -> Vec<FieldDescription> {
    let mut fields: Vec<FieldDescription> = dataset
        .column_names
        .iter()
        .zip(&dataset.column_types)
        .map(|(name, ty)| FieldDescription {
            name: name.clone(),
            column_type: *ty,
        })
        .collect();
    fields.sort_by(|a, b| b.column_type.to_string().cmp(&a.column_type.to_string()));
    fields
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Per-column summary. Numeric fields are only filled for numeric columns,
/// `unique` / `top` / `freq` only for the others.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: ColumnType,
    /// Non-null cells
    pub count: usize,
    pub null_count: usize,
    pub unique: Option<usize>,
    /// Most frequent value
    pub top: Option<CellValue>,
    /// Frequency of `top`
    pub freq: Option<usize>,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Row labels of [`summary_table`], in order.
pub const SUMMARY_ROWS: [&str; 12] = [
    "count_null",
    "count",
    "unique",
    "top",
    "freq",
    "mean",
    "std",
    "min",
    "25%",
    "50%",
    "75%",
    "max",
];

/// Summarize every column.
pub fn describe(dataset: &Dataset) -> Vec<ColumnSummary> {
    (0..dataset.n_columns())
        .map(|c| summarize_column(dataset, c))
        .collect()
}

fn summarize_column(dataset: &Dataset, idx: usize) -> ColumnSummary {
    let column_type = dataset.column_types[idx];
    let null_count = dataset.column(idx).filter(|v| v.is_null()).count();
    let count = dataset.len() - null_count;

    let mut summary = ColumnSummary {
        name: dataset.column_names[idx].clone(),
        column_type,
        count,
        null_count,
        unique: None,
        top: None,
        freq: None,
        mean: None,
        std: None,
        min: None,
        q25: None,
        median: None,
        q75: None,
        max: None,
    };

    if column_type.is_numeric() {
        let mut values: Vec<f64> = dataset.column(idx).filter_map(CellValue::as_f64).collect();
        if values.is_empty() {
            return summary;
        }
        values.sort_by(f64::total_cmp);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        summary.mean = Some(mean);
        if values.len() > 1 {
            let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            summary.std = Some(var.sqrt());
        }
        summary.min = values.first().copied();
        summary.max = values.last().copied();
        summary.q25 = Some(percentile(&values, 0.25));
        summary.median = Some(percentile(&values, 0.5));
        summary.q75 = Some(percentile(&values, 0.75));
    } else {
        let counts = count_values(dataset, idx);
        summary.unique = Some(counts.len());
        if let Some((top, freq)) = counts.first() {
            summary.top = Some(top.clone());
            summary.freq = Some(*freq);
        }
    }
    summary
}

/// Linear-interpolated percentile of sorted, non-empty data; `p` in 0..=1.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// The summary laid out for display: one row per statistic, one column per
/// source column, numbers rounded to two decimals and blanks as nulls.
pub fn summary_table(dataset: &Dataset) -> Dataset {
    let summaries = describe(dataset);

    let mut columns = vec![String::new()];
    columns.extend(summaries.iter().map(|s| s.name.clone()));

    let float = |v: Option<f64>| {
        v.filter(|x| x.is_finite())
            .map(|x| CellValue::Float((x * 100.0).round() / 100.0))
            .unwrap_or(CellValue::Null)
    };
    let int = |v: Option<usize>| v.map(|x| CellValue::Integer(x as i64)).unwrap_or(CellValue::Null);

    let rows = SUMMARY_ROWS
        .iter()
        .map(|label| {
            let mut row = vec![CellValue::Text(label.to_string())];
            row.extend(summaries.iter().map(|s| match *label {
                "count_null" => CellValue::Integer(s.null_count as i64),
                "count" => CellValue::Integer(s.count as i64),
                "unique" => int(s.unique),
                "top" => s.top.clone().unwrap_or(CellValue::Null),
                "freq" => int(s.freq),
                "mean" => float(s.mean),
                "std" => float(s.std),
                "min" => float(s.min),
                "25%" => float(s.q25),
                "50%" => float(s.median),
                "75%" => float(s.q75),
                _ => float(s.max),
            }));
            row
        })
        .collect();

    Dataset::from_rows(columns, rows)
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Non-null values with their counts, most frequent first (ties by value).
fn count_values(dataset: &Dataset, idx: usize) -> Vec<(CellValue, usize)> {
    let mut counts: BTreeMap<&CellValue, usize> = BTreeMap::new();
    for v in dataset.column(idx).filter(|v| !v.is_null()) {
        *counts.entry(v).or_default() += 1;
    }
    let mut counts: Vec<(CellValue, usize)> =
        counts.into_iter().map(|(v, n)| (v.clone(), n)).collect();
    // Stable sort keeps the value order for equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn value_counts(
    dataset: &Dataset,
    column: &str,
) -> Result<Vec<(CellValue, usize)>, FrameError> {
    let idx = dataset
        .column_index(column)
        .ok_or_else(|| FrameError::ColumnNotFound(column.to_string()))?;
    Ok(count_values(dataset, idx))
}

/// Value counts as a two-column table (`<column>`, `Count`).
pub fn value_counts_table(dataset: &Dataset, column: &str) -> Result<Dataset, FrameError> {
    let rows = value_counts(dataset, column)?
        .into_iter()
        .map(|(v, n)| vec![v, CellValue::Integer(n as i64)])
        .collect();
    Ok(Dataset::from_rows(
        vec![column.to_string(), "Count".to_string()],
        rows,
    ))
}

/// Null cells per column.
pub fn missing_counts(dataset: &Dataset) -> Vec<(String, usize)> {
    dataset
        .column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), dataset.column(i).filter(|v| v.is_null()).count()))
        .collect()
}

/// Rows that repeat an earlier row exactly.
pub fn duplicate_rows(dataset: &Dataset) -> usize {
    let mut seen: HashSet<&Vec<CellValue>> = HashSet::with_capacity(dataset.len());
    dataset.rows.iter().filter(|row| !seen.insert(*row)).count()
}

/// Distinct non-null values per column.
pub fn unique_counts(dataset: &Dataset) -> Vec<(String, usize)> {
    dataset
        .column_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let distinct = dataset.unique_values(i);
            let n = distinct.len() - usize::from(distinct.contains(&CellValue::Null));
            (name.clone(), n)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dataset info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub non_null: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
    /// Approximate in-memory size of the cells.
    pub memory_bytes: usize,
}

pub fn info(dataset: &Dataset) -> DatasetInfo {
    let columns = dataset
        .column_names
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnInfo {
            name: name.clone(),
            column_type: dataset.column_types[i],
            non_null: dataset.column(i).filter(|v| !v.is_null()).count(),
        })
        .collect();

    let memory_bytes = dataset
        .rows
        .iter()
        .flatten()
        .map(|cell| match cell {
            CellValue::Text(s) => size_of::<CellValue>() + s.capacity(),
            _ => size_of::<CellValue>(),
        })
        .sum();

    DatasetInfo {
        rows: dataset.len(),
        columns,
        memory_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_csv;

    fn people() -> Dataset {
        read_csv(
            b"name,age,city\n\
              ann,30,paris\n\
              bob,,rome\n\
              cy,40,paris\n\
              ann,30,paris\n\
              dee,50,\n",
        )
        .unwrap()
    }

    #[test]
    fn test_field_descriptions_sorted_by_type_desc() {
        let fields = field_descriptions(&people());
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "city", "age"]);
        assert_eq!(fields[2].column_type, ColumnType::Numeric);
    }

    #[test]
    fn test_describe_numeric() {
        let summaries = describe(&people());
        let age = &summaries[1];
        assert_eq!(age.count, 4);
        assert_eq!(age.null_count, 1);
        assert!((age.mean.unwrap() - 37.5).abs() < 1e-10);
        assert!((age.std.unwrap() - 9.574271077563381).abs() < 1e-9);
        assert_eq!(age.min, Some(30.0));
        assert_eq!(age.q25, Some(30.0));
        assert_eq!(age.median, Some(35.0));
        assert!((age.q75.unwrap() - 42.5).abs() < 1e-10);
        assert_eq!(age.max, Some(50.0));
        assert_eq!(age.unique, None);
    }

    #[test]
    fn test_describe_text() {
        let summaries = describe(&people());
        let city = &summaries[2];
        assert_eq!(city.count, 4);
        assert_eq!(city.unique, Some(2));
        assert_eq!(city.top, Some(CellValue::Text("paris".into())));
        assert_eq!(city.freq, Some(3));
        assert_eq!(city.mean, None);
    }

    #[test]
    fn test_summary_table_layout() {
        let table = summary_table(&people());
        assert_eq!(table.column_names, vec!["", "name", "age", "city"]);
        assert_eq!(table.len(), SUMMARY_ROWS.len());
        assert_eq!(table.rows[0][0], CellValue::Text("count_null".into()));
        assert_eq!(table.rows[0][2], CellValue::Float(1.0));
        // std rounded to two decimals
        assert_eq!(table.rows[6][2], CellValue::Float(9.57));
    }

    #[test]
    fn test_integer_and_float_spellings_count_as_one_value() {
        let ds = read_csv(b"x,y\n1,a\n1.0,a\n2.5,b\n").unwrap();
        assert_eq!(unique_counts(&ds), vec![("x".to_string(), 2), ("y".to_string(), 2)]);
        assert_eq!(duplicate_rows(&ds), 1);
        assert_eq!(
            value_counts(&ds, "x").unwrap(),
            vec![(CellValue::Float(1.0), 2), (CellValue::Float(2.5), 1)]
        );
    }

    #[test]
    fn test_value_counts_order() {
        let counts = value_counts(&people(), "name").unwrap();
        assert_eq!(counts[0], (CellValue::Text("ann".into()), 2));
        assert_eq!(counts[1], (CellValue::Text("bob".into()), 1));
        assert_eq!(counts.len(), 4);
        assert!(value_counts(&people(), "missing").is_err());
    }

    #[test]
    fn test_missing_duplicates_unique() {
        let ds = people();
        assert_eq!(
            missing_counts(&ds),
            vec![("name".into(), 0), ("age".into(), 1), ("city".into(), 1)]
        );
        assert_eq!(duplicate_rows(&ds), 1);
        assert_eq!(
            unique_counts(&ds),
            vec![("name".into(), 4), ("age".into(), 3), ("city".into(), 2)]
        );
    }

    #[test]
    fn test_info() {
        let info = info(&people());
        assert_eq!(info.rows, 5);
        assert_eq!(info.columns[1].non_null, 4);
        assert!(info.memory_bytes >= 15 * size_of::<CellValue>());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 0.75), 7.0);
    }
}
