/// Analysis layer: everything computed from a loaded Dataset for display.
///
/// * `overview`   – dimensions, field types, summary table, counts
/// * `charts`     – data preparation for each plot kind
/// * `hypothesis` – ANOVA, t-test, z-score, chi-square

pub mod charts;
pub mod hypothesis;
pub mod overview;
