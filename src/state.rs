use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::analysis::charts::PlotKind;
use crate::analysis::hypothesis::{
    self, AnovaResult, ChiSquareResult, StatsError, TTestResult,
};
use crate::config::Settings;
use crate::data::cache::{DatasetCache, FileReader, SourceReader};
use crate::data::error::{FrameError, LoadError};
use crate::data::filter::{self, Aggregation};
use crate::data::model::{CellValue, ColumnType, Dataset};
use crate::data::source::{FileContent, FileKind, SourceDescriptor};

// ---------------------------------------------------------------------------
// Selections
// ---------------------------------------------------------------------------

/// "What would you like to know about the data?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewSection {
    Dimensions,
    FieldDescriptions,
    SummaryStatistics,
    ValueCounts,
}

impl OverviewSection {
    pub const ALL: [OverviewSection; 4] = [
        OverviewSection::Dimensions,
        OverviewSection::FieldDescriptions,
        OverviewSection::SummaryStatistics,
        OverviewSection::ValueCounts,
    ];
}

impl fmt::Display for OverviewSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverviewSection::Dimensions => "Data Dimensions",
            OverviewSection::FieldDescriptions => "Field Descriptions",
            OverviewSection::SummaryStatistics => "Summary Statistics",
            OverviewSection::ValueCounts => "Value Counts of Fields",
        };
        f.write_str(name)
    }
}

/// The "Data Exploration" checkboxes.
#[derive(Debug, Clone, Default)]
pub struct ExplorationToggles {
    pub head: bool,
    pub description: bool,
    pub types: bool,
    pub missing: bool,
    pub duplicates: bool,
    pub shape: bool,
    pub info: bool,
    pub columns: bool,
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedOp {
    Filter,
    Select,
    Sort,
    Group,
}

impl DerivedOp {
    pub const ALL: [DerivedOp; 4] = [
        DerivedOp::Filter,
        DerivedOp::Select,
        DerivedOp::Sort,
        DerivedOp::Group,
    ];
}

impl fmt::Display for DerivedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivedOp::Filter => "Filter",
            DerivedOp::Select => "Pick values",
            DerivedOp::Sort => "Sort",
            DerivedOp::Group => "Group",
        };
        f.write_str(name)
    }
}

/// Inputs of the filter / sort / group panel and its last result.
///
/// The result is always a separate table; the loaded dataset is never
/// modified.
#[derive(Debug, Clone)]
pub struct DerivedForm {
    pub enabled: bool,
    pub op: DerivedOp,
    pub column: Option<String>,
    pub value: String,
    /// Values kept by [`DerivedOp::Select`].
    pub selected: BTreeSet<CellValue>,
    pub ascending: bool,
    pub group_value: Option<String>,
    pub aggregation: Aggregation,
    pub result: Option<Result<Dataset, FrameError>>,
}

impl Default for DerivedForm {
    fn default() -> Self {
        Self {
            enabled: false,
            op: DerivedOp::Filter,
            column: None,
            value: String::new(),
            selected: BTreeSet::new(),
            ascending: true,
            group_value: None,
            aggregation: Aggregation::Count,
            result: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlotForm {
    pub kind: PlotKind,
    pub x: Option<String>,
    pub y: Option<String>,
    last_failure: Option<String>,
}

impl Default for PlotForm {
    fn default() -> Self {
        Self {
            kind: PlotKind::Bar,
            x: None,
            y: None,
            last_failure: None,
        }
    }
}

impl PlotForm {
    /// Record the outcome of drawing the current plot. Returns true only
    /// for a failure that differs from the previous one.
    pub fn note_failure(&mut self, failure: Option<&str>) -> bool {
        let is_new = failure.is_some() && self.last_failure.as_deref() != failure;
        self.last_failure = failure.map(str::to_string);
        is_new
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Anova,
    TTest,
    ZScore,
    ChiSquare,
}

impl TestKind {
    pub const ALL: [TestKind; 4] = [
        TestKind::Anova,
        TestKind::TTest,
        TestKind::ZScore,
        TestKind::ChiSquare,
    ];

    /// Whether the test takes a second column.
    pub fn needs_second(self) -> bool {
        !matches!(self, TestKind::ZScore)
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestKind::Anova => "ANOVA",
            TestKind::TTest => "T-Test",
            TestKind::ZScore => "Z-Score",
            TestKind::ChiSquare => "Chi-Square",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Anova(AnovaResult),
    TTest(TTestResult),
    ZScores(Vec<Option<f64>>),
    ChiSquare(ChiSquareResult),
}

/// For ANOVA `first` is the numeric value column and `second` the grouping
/// column; for the other tests they are the two compared columns.
#[derive(Debug, Clone)]
pub struct TestForm {
    pub kind: TestKind,
    pub first: Option<String>,
    pub second: Option<String>,
    pub outcome: Option<Result<TestOutcome, StatsError>>,
}

impl Default for TestForm {
    fn default() -> Self {
        Self {
            kind: TestKind::Anova,
            first: None,
            second: None,
            outcome: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state of one session, independent of rendering.
///
/// Owns the session's dataset cache; nothing is shared between sessions.
pub struct AppState<R = FileReader> {
    pub settings: Settings,

    cache: DatasetCache<R>,

    /// Uploaded file (None until the user opens one).
    pub upload: Option<FileContent>,
    pub file_kind: FileKind,
    /// Sheets of the uploaded workbook (empty for csv). Listed once per
    /// upload and file type.
    pub sheet_names: Vec<String>,
    /// Why the sheet list could not be read, reported on every refresh.
    sheet_list_error: Option<String>,
    pub sheet: Option<String>,
    pub header_row: usize,

    /// Dataset for the current selections, shared with the cache.
    pub dataset: Option<Arc<Dataset>>,

    pub overview: OverviewSection,
    pub value_counts_column: Option<String>,
    pub exploration: ExplorationToggles,
    pub derived: DerivedForm,
    pub visualise: bool,
    pub plot: PlotForm,
    pub test: TestForm,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self::with_reader(settings, FileReader)
    }
}

impl<R: SourceReader> AppState<R> {
    /// A session whose cache reads sources through `reader`.
    pub fn with_reader(settings: Settings, reader: R) -> Self {
        Self {
            settings,
            cache: DatasetCache::new(reader),
            upload: None,
            file_kind: FileKind::Excel,
            sheet_names: Vec::new(),
            sheet_list_error: None,
            sheet: None,
            header_row: 0,
            dataset: None,
            overview: OverviewSection::Dimensions,
            value_counts_column: None,
            exploration: ExplorationToggles::default(),
            derived: DerivedForm::default(),
            visualise: false,
            plot: PlotForm::default(),
            test: TestForm::default(),
            status_message: None,
        }
    }

    /// Number of datasets held by this session's cache.
    pub fn cached_datasets(&self) -> usize {
        self.cache.len()
    }

    /// Forget every parsed dataset of this session and reload the current
    /// selection.
    pub fn clear_cache(&mut self) {
        if self.cache.is_empty() {
            return;
        }
        log::info!("Clearing {} cached datasets", self.cache.len());
        self.cache.clear();
        self.refresh();
    }

    /// Take a newly opened file and load it with the current selections.
    pub fn set_upload(&mut self, file: FileContent) {
        if file.is_empty() {
            log::warn!("'{}' is empty", file.name());
        }
        log::info!("Opened '{}' ({} bytes)", file.name(), file.len());
        self.upload = Some(file);
        self.sheet = None;
        self.header_row = 0;
        self.list_sheets();
        self.refresh();
    }

    /// Select the file type by its displayed name.
    pub fn set_declared_type(&mut self, declared: &str) {
        match FileKind::from_declared(declared) {
            Ok(kind) => self.set_file_kind(kind),
            Err(e) => self.fail(&e),
        }
    }

    pub fn set_file_kind(&mut self, kind: FileKind) {
        if self.file_kind != kind {
            self.file_kind = kind;
            self.sheet = None;
            self.list_sheets();
        }
        self.refresh();
    }

    pub fn set_sheet(&mut self, sheet: String) {
        self.sheet = Some(sheet);
        self.refresh();
    }

    pub fn set_header_row(&mut self, row: usize) {
        self.header_row = row.min(self.settings.max_header_row);
        self.refresh();
    }

    /// Read the sheet list of the current upload when it is a workbook.
    fn list_sheets(&mut self) {
        self.sheet_names.clear();
        self.sheet_list_error = None;
        if self.file_kind != FileKind::Excel {
            return;
        }
        let Some(file) = &self.upload else {
            return;
        };
        match self.cache.sheet_names(file.bytes()) {
            Ok(names) => self.sheet_names = names,
            Err(e) => {
                log::error!("{}: {e:#}", e.step());
                self.sheet_list_error = Some(format!("{}: {e}", e.step()));
            }
        }
    }

    /// Re-run the load step for the current selections.
    ///
    /// Repeated calls with unchanged selections are served by the cache
    /// and do not touch the source. On failure the dataset is cleared and
    /// the status names the failed step; the next change of selection
    /// tries again. Test and derived results are dropped whenever the
    /// dataset changes.
    pub fn refresh(&mut self) {
        let previous = self.dataset.take();
        self.status_message = None;
        self.load_current();

        let same = match (&previous, &self.dataset) {
            (Some(before), Some(now)) => Arc::ptr_eq(before, now),
            (None, None) => true,
            _ => false,
        };
        if !same {
            self.test.outcome = None;
            self.derived.result = None;
            self.derived.selected.clear();
        }
    }

    fn load_current(&mut self) {
        let Some(file) = self.upload.clone() else {
            return;
        };

        if self.file_kind == FileKind::Excel {
            if let Some(msg) = &self.sheet_list_error {
                self.status_message = Some(msg.clone());
                return;
            }
            let current_is_valid = self
                .sheet
                .as_ref()
                .is_some_and(|s| self.sheet_names.contains(s));
            if !current_is_valid {
                self.sheet = self.sheet_names.first().cloned();
            }
        }

        let sheet = self.sheet.as_deref();
        let source = SourceDescriptor::for_kind(file, self.file_kind, sheet, self.header_row);
        match self.cache.load(&source) {
            Ok(dataset) => {
                self.reconcile_selections(&dataset);
                self.dataset = Some(dataset);
            }
            Err(e) => self.fail(&e),
        }
    }

    fn fail(&mut self, err: &LoadError) {
        log::error!("{}: {err:#}", err.step());
        self.status_message = Some(format!("{}: {err}", err.step()));
        self.dataset = None;
    }

    /// Keep column selections that still exist; otherwise pick defaults.
    fn reconcile_selections(&mut self, dataset: &Dataset) {
        let numeric = dataset.numeric_columns();
        let text = dataset.columns_of_type(ColumnType::Text);
        let first_any = dataset.column_names.first().cloned();
        let first_numeric = numeric.first().cloned();
        let second_numeric = numeric.get(1).cloned().or_else(|| first_numeric.clone());
        let first_text = text.first().cloned();

        let keep = |sel: &mut Option<String>, fallback: Option<String>| {
            if !sel.as_ref().is_some_and(|s| dataset.column_index(s).is_some()) {
                *sel = fallback;
            }
        };

        keep(&mut self.value_counts_column, first_text.clone());
        keep(&mut self.derived.column, first_any.clone());
        keep(&mut self.derived.group_value, first_numeric.clone());
        keep(&mut self.plot.x, first_any.clone());
        keep(&mut self.plot.y, first_numeric.clone());
        keep(&mut self.test.first, first_numeric);
        keep(&mut self.test.second, first_text.or(second_numeric));
    }

    /// Compute the filter / sort / group table from the current form.
    pub fn apply_derived(&mut self) {
        let Some(ds) = &self.dataset else {
            return;
        };
        let form = &self.derived;
        let Some(column) = form.column.as_deref() else {
            return;
        };
        let result = match form.op {
            DerivedOp::Filter => filter::filter_equals(ds, column, &form.value),
            DerivedOp::Select => filter::filter_in(ds, column, &form.selected),
            DerivedOp::Sort => filter::sort_by(ds, column, form.ascending),
            DerivedOp::Group => match form.group_value.as_deref() {
                Some(value) => filter::group_by(ds, column, value, form.aggregation),
                None => return,
            },
        };
        if let Err(e) = &result {
            log::warn!("{} failed: {e}", form.op);
        }
        self.derived.result = Some(result);
    }

    /// Run the selected statistical test on the selected columns.
    pub fn run_test(&mut self) {
        let Some(ds) = &self.dataset else {
            return;
        };
        let Some(first) = self.test.first.as_deref() else {
            return;
        };
        let second = self.test.second.as_deref().unwrap_or_default();

        let outcome = match self.test.kind {
            TestKind::Anova => hypothesis::one_way_anova(ds, first, second).map(TestOutcome::Anova),
            TestKind::TTest => hypothesis::t_test(ds, first, second).map(TestOutcome::TTest),
            TestKind::ZScore => hypothesis::z_scores(ds, first).map(TestOutcome::ZScores),
            TestKind::ChiSquare => {
                hypothesis::chi_square(ds, first, second).map(TestOutcome::ChiSquare)
            }
        };
        if let Err(e) = &outcome {
            log::warn!("{} failed: {e}", self.test.kind);
        }
        self.test.outcome = Some(outcome);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{self, tests::xlsx};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts every time a workbook or csv buffer is opened.
    #[derive(Default, Clone)]
    struct CountingReader {
        opens: Rc<Cell<usize>>,
    }

    impl SourceReader for CountingReader {
        fn read(&self, source: &SourceDescriptor) -> Result<Dataset, LoadError> {
            self.opens.set(self.opens.get() + 1);
            loader::load(source)
        }

        fn sheet_names(&self, bytes: &[u8]) -> Result<Vec<String>, LoadError> {
            self.opens.set(self.opens.get() + 1);
            loader::sheet_names(bytes)
        }
    }

    fn regions() -> FileContent {
        let bytes = xlsx(&[
            ("North", &[&["units"], &["1"], &["2"], &["3"]]),
            ("South", &[&["units"], &["100"], &["200"], &["300"]]),
        ]);
        FileContent::new("regions.xlsx", bytes)
    }

    fn csv_upload(text: &str) -> FileContent {
        FileContent::new("upload.csv", text.as_bytes().to_vec())
    }

    fn csv_state(text: &str) -> AppState {
        let mut state: AppState = AppState::default();
        state.set_file_kind(FileKind::Csv);
        state.set_upload(csv_upload(text));
        state
    }

    #[test]
    fn test_csv_upload_loads_and_caches() {
        let mut state = csv_state("a_b,c_d\n1,2\n3,4\n5,6");
        let first = state.dataset.clone().unwrap();
        assert_eq!(first.column_names, vec!["A B", "C D"]);
        assert_eq!(state.cached_datasets(), 1);

        // Header row is ignored for csv, so this is the same cache entry.
        state.set_header_row(4);
        let second = state.dataset.clone().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(state.cached_datasets(), 1);
        assert!(state.status_message.is_none());
    }

    #[test]
    fn test_clear_cache_reloads_current() {
        let mut state = csv_state("x\n1\n");
        let before = state.dataset.clone().unwrap();
        state.clear_cache();
        let after = state.dataset.clone().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
        assert_eq!(state.cached_datasets(), 1);
    }

    #[test]
    fn test_cached_selections_do_not_reopen_workbook() {
        let reader = CountingReader::default();
        let opens = Rc::clone(&reader.opens);
        let mut state = AppState::with_reader(Settings::default(), reader);

        state.set_upload(regions());
        assert_eq!(state.sheet_names, vec!["North", "South"]);
        assert_eq!(state.sheet.as_deref(), Some("North"));
        // Sheet list plus the first sheet.
        assert_eq!(opens.get(), 2);

        state.set_header_row(1);
        assert_eq!(opens.get(), 3);
        state.set_header_row(0);
        state.refresh();
        state.set_file_kind(FileKind::Excel);
        assert_eq!(opens.get(), 3);

        state.set_sheet("South".into());
        state.set_sheet("North".into());
        assert_eq!(opens.get(), 4);
        assert!(state.status_message.is_none());
    }

    #[test]
    fn test_dataset_change_discards_results() {
        let mut state: AppState = AppState::default();
        state.set_upload(regions());
        state.test.kind = TestKind::ZScore;
        assert_eq!(state.test.first.as_deref(), Some("Units"));
        state.run_test();
        state.derived.column = Some("Units".into());
        state.derived.value = "2".into();
        state.apply_derived();
        state.derived.selected.insert(CellValue::Float(1.0));

        // Same dataset: results stay.
        state.refresh();
        assert!(state.test.outcome.is_some());
        assert!(state.derived.result.is_some());

        state.set_sheet("South".into());
        let south: Vec<_> = state.dataset.as_ref().unwrap().column(0).cloned().collect();
        assert_eq!(south[0].as_f64(), Some(100.0));
        assert!(state.test.outcome.is_none());
        assert!(state.derived.result.is_none());
        assert!(state.derived.selected.is_empty());

        state.run_test();
        match &state.test.outcome {
            Some(Ok(TestOutcome::ZScores(scores))) => {
                assert_eq!(scores.len(), 3);
                assert_eq!(scores[1], Some(0.0));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_plot_failure_noted_once_per_change() {
        let mut form = PlotForm::default();
        assert!(!form.note_failure(None));
        assert!(form.note_failure(Some("Cannot draw Box: no column")));
        assert!(!form.note_failure(Some("Cannot draw Box: no column")));
        assert!(form.note_failure(Some("Cannot draw Pie: no values")));
        assert!(!form.note_failure(None));
        assert!(form.note_failure(Some("Cannot draw Pie: no values")));
    }

    #[test]
    fn test_non_workbook_as_excel_reports_step() {
        let mut state: AppState = AppState::default();
        state.set_upload(csv_upload("a,b\n1,2\n"));
        assert!(state.dataset.is_none());
        let msg = state.status_message.clone().unwrap();
        assert!(msg.starts_with("Reading file"), "{msg}");
        assert_eq!(state.cached_datasets(), 0);

        // The session recovers on the next selection.
        state.set_file_kind(FileKind::Csv);
        assert!(state.dataset.is_some());
        assert!(state.status_message.is_none());
    }

    #[test]
    fn test_unsupported_declared_type() {
        let mut state: AppState = AppState::default();
        state.set_declared_type("parquet");
        let msg = state.status_message.clone().unwrap();
        assert!(msg.starts_with("Choosing file type"), "{msg}");
        assert_eq!(state.file_kind, FileKind::Excel);

        state.set_declared_type("csv");
        assert_eq!(state.file_kind, FileKind::Csv);
    }

    #[test]
    fn test_header_row_is_capped() {
        let mut state: AppState = AppState::default();
        state.set_header_row(1_000);
        assert_eq!(state.header_row, 100);
    }

    #[test]
    fn test_selections_default_to_matching_columns() {
        let state = csv_state("city,temp_c,rain_mm\nparis,12,3\nrome,18,1\n");
        assert_eq!(state.plot.x.as_deref(), Some("City"));
        assert_eq!(state.plot.y.as_deref(), Some("Temp C"));
        assert_eq!(state.value_counts_column.as_deref(), Some("City"));
        assert_eq!(state.test.first.as_deref(), Some("Temp C"));
        assert_eq!(state.test.second.as_deref(), Some("City"));
    }

    #[test]
    fn test_filter_produces_copy() {
        let mut state = csv_state("name,n\nx,1\ny,2\nx,3\n");
        state.derived.column = Some("Name".into());
        state.derived.value = "x".into();
        state.apply_derived();

        let filtered = state.derived.result.clone().unwrap().unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(state.dataset.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_pick_values() {
        let mut state = csv_state("name,n\nx,1\ny,2\nz,3\n");
        state.derived.op = DerivedOp::Select;
        state.derived.column = Some("Name".into());
        state.derived.selected = [CellValue::Text("y".into()), CellValue::Text("z".into())]
            .into_iter()
            .collect();
        state.apply_derived();

        let picked = state.derived.result.clone().unwrap().unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.rows[0][1], CellValue::Integer(2));
    }

    #[test]
    fn test_run_anova_from_defaults() {
        let mut state = csv_state("group,score\na,1\na,2\na,3\nb,4\nb,5\nb,6\nc,7\nc,8\nc,9\n");
        state.run_test();
        match state.test.outcome {
            Some(Ok(TestOutcome::Anova(ref r))) => assert!((r.f_statistic - 27.0).abs() < 1e-10),
            ref other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_run_chi_square_on_chosen_columns() {
        let mut state = csv_state("a,b\nx,p\nx,q\ny,p\ny,q\n");
        state.test.kind = TestKind::ChiSquare;
        state.test.first = Some("A".into());
        state.test.second = Some("B".into());
        state.run_test();
        assert!(matches!(
            state.test.outcome,
            Some(Ok(TestOutcome::ChiSquare(_)))
        ));
    }
}
