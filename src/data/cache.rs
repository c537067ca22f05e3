use std::collections::HashMap;
use std::sync::Arc;

use super::error::LoadError;
use super::loader;
use super::model::Dataset;
use super::source::SourceDescriptor;

// ---------------------------------------------------------------------------
// SourceReader – how a descriptor becomes a dataset
// ---------------------------------------------------------------------------

/// Turns a descriptor into a freshly parsed, normalized dataset.
pub trait SourceReader {
    fn read(&self, source: &SourceDescriptor) -> Result<Dataset, LoadError>;

    /// Sheet names of a workbook, in workbook order.
    fn sheet_names(&self, bytes: &[u8]) -> Result<Vec<String>, LoadError> {
        loader::sheet_names(bytes)
    }
}

/// Reads from the descriptor's bytes with the csv / workbook parsers.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileReader;

impl SourceReader for FileReader {
    fn read(&self, source: &SourceDescriptor) -> Result<Dataset, LoadError> {
        loader::load(source)
    }
}

// ---------------------------------------------------------------------------
// DatasetCache – one per session
// ---------------------------------------------------------------------------

/// Session-scoped memo of loaded datasets, keyed by [`SourceDescriptor`].
///
/// A hit returns the stored dataset without touching the source. A miss
/// parses, stores and returns. Failed loads store nothing.
pub struct DatasetCache<R = FileReader> {
    reader: R,
    entries: HashMap<SourceDescriptor, Arc<Dataset>>,
}

impl Default for DatasetCache<FileReader> {
    fn default() -> Self {
        Self::new(FileReader)
    }
}

impl<R: SourceReader> DatasetCache<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            entries: HashMap::new(),
        }
    }

    /// Return the dataset for `source`, parsing it only on the first request.
    pub fn load(&mut self, source: &SourceDescriptor) -> Result<Arc<Dataset>, LoadError> {
        if let Some(dataset) = self.entries.get(source) {
            log::debug!("Cache hit for {:?}", source);
            return Ok(Arc::clone(dataset));
        }

        log::debug!("Cache miss for {:?}", source);
        let dataset = Arc::new(self.reader.read(source)?);
        log::info!(
            "Loaded '{}' ({}): {} rows x {} columns",
            source.file().name(),
            source.kind(),
            dataset.len(),
            dataset.n_columns()
        );
        self.entries.insert(source.clone(), Arc::clone(&dataset));
        Ok(dataset)
    }

    /// List a workbook's sheets through the cache's reader. Not memoized;
    /// callers keep the list for the lifetime of an upload.
    pub fn sheet_names(&self, bytes: &[u8]) -> Result<Vec<String>, LoadError> {
        self.reader.sheet_names(bytes)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::tests::xlsx;
    use crate::data::source::FileContent;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts how often the underlying parser runs.
    #[derive(Default, Clone)]
    struct CountingReader {
        reads: Rc<Cell<usize>>,
    }

    impl SourceReader for CountingReader {
        fn read(&self, source: &SourceDescriptor) -> Result<Dataset, LoadError> {
            self.reads.set(self.reads.get() + 1);
            loader::load(source)
        }
    }

    fn counting_cache() -> (DatasetCache<CountingReader>, Rc<Cell<usize>>) {
        let reader = CountingReader::default();
        let reads = Rc::clone(&reader.reads);
        (DatasetCache::new(reader), reads)
    }

    fn csv_source(text: &str) -> SourceDescriptor {
        SourceDescriptor::csv(FileContent::new("data.csv", text.as_bytes().to_vec()))
    }

    #[test]
    fn test_repeat_load_reads_source_once() {
        let (mut cache, reads) = counting_cache();
        let source = csv_source("a_b,c_d\n1,2\n3,4\n5,6");

        let first = cache.load(&source).unwrap();
        let second = cache.load(&source).unwrap();

        assert_eq!(reads.get(), 1);
        assert_eq!(first.shape(), (3, 2));
        assert_eq!(*first, *second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_equal_descriptor_from_fresh_buffer_hits() {
        let (mut cache, reads) = counting_cache();
        cache.load(&csv_source("x\n1\n")).unwrap();
        cache.load(&csv_source("x\n1\n")).unwrap();
        assert_eq!(reads.get(), 1);

        cache.load(&csv_source("x\n2\n")).unwrap();
        assert_eq!(reads.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_sheets_are_cached_separately() {
        let bytes = xlsx(&[
            ("North", &[&["units"], &["5"]]),
            ("South", &[&["units"], &["7"], &["9"]]),
        ]);
        let file = FileContent::new("regions.xlsx", bytes);
        let (mut cache, reads) = counting_cache();

        let north = cache
            .load(&SourceDescriptor::spreadsheet(file.clone(), "North", 0))
            .unwrap();
        let south = cache
            .load(&SourceDescriptor::spreadsheet(file.clone(), "South", 0))
            .unwrap();

        assert_eq!(reads.get(), 2);
        assert_eq!(north.len(), 1);
        assert_eq!(south.len(), 2);
        assert_ne!(*north, *south);

        cache
            .load(&SourceDescriptor::spreadsheet(file, "North", 0))
            .unwrap();
        assert_eq!(reads.get(), 2);
    }

    #[test]
    fn test_failed_loads_leave_cache_unchanged() {
        let bytes = xlsx(&[("Only", &[&["a"], &["1"]])]);
        let file = FileContent::new("book.xlsx", bytes);
        let mut cache = DatasetCache::<FileReader>::default();

        let ok = SourceDescriptor::spreadsheet(file.clone(), "Only", 0);
        cache.load(&ok).unwrap();
        assert_eq!(cache.len(), 1);

        let bad_header = SourceDescriptor::spreadsheet(file.clone(), "Only", 50);
        assert!(matches!(
            cache.load(&bad_header),
            Err(LoadError::InvalidHeaderRow { .. })
        ));
        let bad_sheet = SourceDescriptor::spreadsheet(file.clone(), "Nope", 0);
        assert!(matches!(
            cache.load(&bad_sheet),
            Err(LoadError::SheetNotFound { .. })
        ));
        let wrong_kind = SourceDescriptor::csv(file);
        assert!(matches!(cache.load(&wrong_kind), Err(LoadError::Format { .. })));

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = DatasetCache::<FileReader>::default();
        cache.load(&csv_source("x\n1\n")).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
