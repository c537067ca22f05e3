//! Statistical tests on dataset columns
//!
//! - One-way ANOVA of a numeric column across the groups of another column
//! - Independent two-sample t-test (pooled variance) between two columns
//! - Z-scores of a column (population standard deviation)
//! - Chi-square test of independence between two columns
//!
//! Reference distributions come from `statrs`.

use std::collections::{BTreeMap, BTreeSet};

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, StudentsT};
use thiserror::Error;

use crate::data::model::{CellValue, Dataset};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatsError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("column '{0}' is not numeric")]
    NotNumeric(String),

    #[error("not enough data: {0}")]
    InsufficientData(String),

    #[error("distribution error: {0}")]
    Distribution(String),
}

pub type StatsResult<T> = Result<T, StatsError>;

fn column_index(dataset: &Dataset, column: &str) -> StatsResult<usize> {
    dataset
        .column_index(column)
        .ok_or_else(|| StatsError::ColumnNotFound(column.to_string()))
}

fn numeric_index(dataset: &Dataset, column: &str) -> StatsResult<usize> {
    let idx = column_index(dataset, column)?;
    if !dataset.column_types[idx].is_numeric() {
        return Err(StatsError::NotNumeric(column.to_string()));
    }
    Ok(idx)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum of squared deviations from the mean.
fn sum_sq_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum()
}

// ---------------------------------------------------------------------------
// ANOVA
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AnovaResult {
    pub f_statistic: f64,
    pub p_value: f64,
    pub df_between: f64,
    pub df_within: f64,
    /// Number of groups with at least one value.
    pub groups: usize,
}

/// One-way ANOVA of `value` across the distinct values of `group`.
/// Rows with a null group or value are ignored.
pub fn one_way_anova(dataset: &Dataset, value: &str, group: &str) -> StatsResult<AnovaResult> {
    let vi = numeric_index(dataset, value)?;
    let gi = column_index(dataset, group)?;

    let mut groups: BTreeMap<&CellValue, Vec<f64>> = BTreeMap::new();
    for row in &dataset.rows {
        if row[gi].is_null() {
            continue;
        }
        if let Some(v) = row[vi].as_f64() {
            groups.entry(&row[gi]).or_default().push(v);
        }
    }

    let k = groups.len();
    let n: usize = groups.values().map(Vec::len).sum();
    if k < 2 {
        return Err(StatsError::InsufficientData(format!(
            "'{group}' has {k} group(s) with values, need at least 2"
        )));
    }
    if n <= k {
        return Err(StatsError::InsufficientData(
            "need more observations than groups".to_string(),
        ));
    }

    let all: Vec<f64> = groups.values().flatten().copied().collect();
    let grand_mean = mean(&all);
    let ss_between: f64 = groups
        .values()
        .map(|g| g.len() as f64 * (mean(g) - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = groups.values().map(|g| sum_sq_dev(g)).sum();

    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;
    let ms_between = ss_between / df_between;
    let ms_within = ss_within / df_within;

    let (f_statistic, p_value) = if ms_within == 0.0 {
        if ms_between == 0.0 {
            (f64::NAN, f64::NAN)
        } else {
            (f64::INFINITY, 0.0)
        }
    } else {
        let f = ms_between / ms_within;
        let dist = FisherSnedecor::new(df_between, df_within)
            .map_err(|e| StatsError::Distribution(e.to_string()))?;
        (f, dist.sf(f))
    };

    Ok(AnovaResult {
        f_statistic,
        p_value,
        df_between,
        df_within,
        groups: k,
    })
}

// ---------------------------------------------------------------------------
// t-test
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct TTestResult {
    pub statistic: f64,
    /// Two-sided.
    pub p_value: f64,
    pub df: f64,
}

/// Independent two-sample t-test with pooled variance between the non-null
/// values of two numeric columns.
pub fn t_test(dataset: &Dataset, first: &str, second: &str) -> StatsResult<TTestResult> {
    let a: Vec<f64> = dataset
        .column(numeric_index(dataset, first)?)
        .filter_map(CellValue::as_f64)
        .collect();
    let b: Vec<f64> = dataset
        .column(numeric_index(dataset, second)?)
        .filter_map(CellValue::as_f64)
        .collect();
    t_test_samples(&a, &b)
}

pub fn t_test_samples(a: &[f64], b: &[f64]) -> StatsResult<TTestResult> {
    if a.is_empty() || b.is_empty() || a.len() + b.len() < 3 {
        return Err(StatsError::InsufficientData(
            "each sample needs values and together at least 3".to_string(),
        ));
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let df = n1 + n2 - 2.0;
    let pooled_var = (sum_sq_dev(a) + sum_sq_dev(b)) / df;
    let se = (pooled_var * (1.0 / n1 + 1.0 / n2)).sqrt();
    let diff = mean(a) - mean(b);

    if se == 0.0 {
        let statistic = if diff == 0.0 {
            f64::NAN
        } else {
            diff.signum() * f64::INFINITY
        };
        let p_value = if diff == 0.0 { f64::NAN } else { 0.0 };
        return Ok(TTestResult {
            statistic,
            p_value,
            df,
        });
    }

    let statistic = diff / se;
    let dist =
        StudentsT::new(0.0, 1.0, df).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(TTestResult {
        statistic,
        p_value: (2.0 * dist.sf(statistic.abs())).min(1.0),
        df,
    })
}

// ---------------------------------------------------------------------------
// z-score
// ---------------------------------------------------------------------------

/// `(x - mean) / std` for each row of a numeric column, with the
/// population standard deviation. Null cells stay `None`.
pub fn z_scores(dataset: &Dataset, column: &str) -> StatsResult<Vec<Option<f64>>> {
    let idx = numeric_index(dataset, column)?;
    let cells = dataset.numeric_column(idx);
    let present: Vec<f64> = cells.iter().flatten().copied().collect();
    if present.is_empty() {
        return Err(StatsError::InsufficientData(format!("'{column}' has no values")));
    }
    let m = mean(&present);
    let std = (sum_sq_dev(&present) / present.len() as f64).sqrt();
    Ok(cells.into_iter().map(|c| c.map(|x| (x - m) / std)).collect())
}

// ---------------------------------------------------------------------------
// Chi-square
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    /// Categories of the first column (table rows).
    pub row_labels: Vec<String>,
    /// Categories of the second column (table columns).
    pub col_labels: Vec<String>,
    pub observed: Vec<Vec<f64>>,
    pub expected: Vec<Vec<f64>>,
    /// Yates' continuity correction is applied to 2x2 tables.
    pub corrected: bool,
}

/// Chi-square test of independence on the contingency table of two
/// columns. Rows with a null in either column are ignored.
pub fn chi_square(dataset: &Dataset, first: &str, second: &str) -> StatsResult<ChiSquareResult> {
    let ai = column_index(dataset, first)?;
    let bi = column_index(dataset, second)?;

    let mut table: BTreeMap<&CellValue, BTreeMap<&CellValue, f64>> = BTreeMap::new();
    let mut col_keys: BTreeSet<&CellValue> = BTreeSet::new();
    for row in &dataset.rows {
        let (a, b) = (&row[ai], &row[bi]);
        if a.is_null() || b.is_null() {
            continue;
        }
        *table.entry(a).or_default().entry(b).or_default() += 1.0;
        col_keys.insert(b);
    }

    if table.len() < 2 || col_keys.len() < 2 {
        return Err(StatsError::InsufficientData(
            "both columns need at least 2 categories".to_string(),
        ));
    }

    let observed: Vec<Vec<f64>> = table
        .values()
        .map(|cols| {
            col_keys
                .iter()
                .map(|k| cols.get(k).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    let row_totals: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..col_keys.len())
        .map(|j| observed.iter().map(|r| r[j]).sum())
        .collect();
    let total: f64 = row_totals.iter().sum();

    let expected: Vec<Vec<f64>> = row_totals
        .iter()
        .map(|rt| col_totals.iter().map(|ct| rt * ct / total).collect())
        .collect();

    let dof = (observed.len() - 1) * (col_keys.len() - 1);
    let corrected = dof == 1;

    let mut statistic = 0.0;
    for (obs_row, exp_row) in observed.iter().zip(&expected) {
        for (o, e) in obs_row.iter().zip(exp_row) {
            let mut diff = (o - e).abs();
            if corrected {
                diff -= diff.min(0.5);
            }
            statistic += diff * diff / e;
        }
    }

    let dist = ChiSquared::new(dof as f64).map_err(|e| StatsError::Distribution(e.to_string()))?;

    Ok(ChiSquareResult {
        statistic,
        p_value: dist.sf(statistic),
        dof,
        row_labels: table.keys().map(|k| k.to_string()).collect(),
        col_labels: col_keys.iter().map(|k| k.to_string()).collect(),
        observed,
        expected,
        corrected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_csv;

    fn csv(text: &str) -> Dataset {
        read_csv(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_t_test_textbook() {
        let ds = csv("a,b\n1,2\n2,4\n3,6\n4,8\n5,10\n");
        let r = t_test(&ds, "a", "b").unwrap();
        assert!((r.statistic - (-1.8973665961010275)).abs() < 1e-9);
        assert!((r.p_value - 0.09434977284243756).abs() < 1e-6);
        assert_eq!(r.df, 8.0);
    }

    #[test]
    fn test_t_test_rejects_text_column() {
        let ds = csv("a,b\n1,x\n2,y\n");
        assert_eq!(
            t_test(&ds, "a", "b").unwrap_err(),
            StatsError::NotNumeric("b".into())
        );
    }

    #[test]
    fn test_anova_textbook() {
        let ds = csv("g,v\nA,1\nA,2\nA,3\nB,4\nB,5\nB,6\nC,7\nC,8\nC,9\n");
        let r = one_way_anova(&ds, "v", "g").unwrap();
        assert!((r.f_statistic - 27.0).abs() < 1e-10);
        // F(2, 6) survival: (1 + 2F/6)^-3
        assert!((r.p_value - 0.001).abs() < 1e-7);
        assert_eq!(r.df_between, 2.0);
        assert_eq!(r.df_within, 6.0);
        assert_eq!(r.groups, 3);
    }

    #[test]
    fn test_anova_needs_two_groups() {
        let ds = csv("g,v\nA,1\nA,2\n");
        assert!(matches!(
            one_way_anova(&ds, "v", "g"),
            Err(StatsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_z_scores() {
        let ds = csv("x\n1\n2\n3\n4\n5\n");
        let z = z_scores(&ds, "x").unwrap();
        assert_eq!(z.len(), 5);
        assert!((z[2].unwrap() - 0.0).abs() < 1e-12);
        assert!((z[4].unwrap() - 2.0f64.sqrt()).abs() < 1e-12);

        let with_null = csv("x,y\n1,a\n,b\n3,c\n");
        let z = z_scores(&with_null, "x").unwrap();
        assert_eq!(z[1], None);
        assert!((z[0].unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_chi_square_independence() {
        let mut text = String::from("row,col\n");
        for (r, c, n) in [
            ("r1", "a", 10),
            ("r1", "b", 20),
            ("r1", "c", 30),
            ("r2", "a", 20),
            ("r2", "b", 20),
            ("r2", "c", 20),
        ] {
            for _ in 0..n {
                text.push_str(&format!("{r},{c}\n"));
            }
        }
        let r = chi_square(&csv(&text), "row", "col").unwrap();
        assert_eq!(r.dof, 2);
        assert!(!r.corrected);
        assert_eq!(r.row_labels, vec!["r1", "r2"]);
        assert_eq!(r.col_labels, vec!["a", "b", "c"]);
        assert_eq!(r.expected[0], vec![15.0, 20.0, 25.0]);
        assert!((r.statistic - 16.0 / 3.0).abs() < 1e-10);
        // chi2 with 2 dof: exp(-x / 2)
        assert!((r.p_value - (-8.0f64 / 3.0).exp()).abs() < 1e-8);
    }

    #[test]
    fn test_chi_square_two_by_two_is_corrected() {
        let ds = csv("a,b\nx,p\nx,q\ny,p\ny,q\n");
        let r = chi_square(&ds, "a", "b").unwrap();
        assert!(r.corrected);
        assert_eq!(r.statistic, 0.0);
        assert!((r.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_chi_square_needs_categories() {
        let ds = csv("a,b\nx,p\nx,q\n");
        assert!(matches!(
            chi_square(&ds, "a", "b"),
            Err(StatsError::InsufficientData(_))
        ));
    }
}
