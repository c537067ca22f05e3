use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::error::LoadError;

// ---------------------------------------------------------------------------
// FileKind – the declared format of an upload
// ---------------------------------------------------------------------------

/// Declared format of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Multi-sheet workbook (xlsx, xlsm, xlsb, xls, ods).
    Excel,
    /// Comma-delimited text.
    Csv,
}

impl FileKind {
    /// Choices offered by the file-type selector, in display order.
    pub const ALL: [FileKind; 2] = [FileKind::Excel, FileKind::Csv];

    /// Parse a declared type as shown in the selector (case-insensitive).
    pub fn from_declared(declared: &str) -> Result<FileKind, LoadError> {
        match declared.trim().to_ascii_lowercase().as_str() {
            "excel" => Ok(FileKind::Excel),
            "csv" => Ok(FileKind::Csv),
            _ => Err(LoadError::UnsupportedFileType(declared.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::Excel => "Excel",
            FileKind::Csv => "csv",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// FileContent – the bytes of one upload
// ---------------------------------------------------------------------------

/// Name and bytes of an uploaded file.
///
/// The bytes are shared, and a content fingerprint is computed once so that
/// hashing a descriptor does not rescan the file.
#[derive(Clone)]
pub struct FileContent {
    name: String,
    bytes: Arc<[u8]>,
    fingerprint: u64,
}

impl FileContent {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        FileContent {
            name: name.into(),
            bytes,
            fingerprint: hasher.finish(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for FileContent {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.name == other.name
            && (Arc::ptr_eq(&self.bytes, &other.bytes) || self.bytes == other.bytes)
    }
}

impl Eq for FileContent {}

impl Hash for FileContent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.fingerprint.hash(state);
    }
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileContent")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("fingerprint", &format_args!("{:016x}", self.fingerprint))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SourceDescriptor – the cache key
// ---------------------------------------------------------------------------

/// Everything needed to (re-)obtain a dataset: content, kind and, for
/// workbooks, the sheet and header row.
///
/// Two descriptors are equal only when every field matches. CSV descriptors
/// never carry a sheet or header row, so those cannot split the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceDescriptor {
    file: FileContent,
    kind: FileKind,
    sheet: Option<String>,
    header_row: Option<usize>,
}

impl SourceDescriptor {
    pub fn csv(file: FileContent) -> Self {
        SourceDescriptor {
            file,
            kind: FileKind::Csv,
            sheet: None,
            header_row: None,
        }
    }

    pub fn spreadsheet(file: FileContent, sheet: impl Into<String>, header_row: usize) -> Self {
        SourceDescriptor {
            file,
            kind: FileKind::Excel,
            sheet: Some(sheet.into()),
            header_row: Some(header_row),
        }
    }

    /// Build a descriptor for the declared kind. Sheet and header row are
    /// dropped for CSV. A workbook without a sheet choice gets an empty sheet
    /// name, which fails the sheet lookup.
    pub fn for_kind(
        file: FileContent,
        kind: FileKind,
        sheet: Option<&str>,
        header_row: usize,
    ) -> Self {
        match kind {
            FileKind::Csv => SourceDescriptor::csv(file),
            FileKind::Excel => {
                SourceDescriptor::spreadsheet(file, sheet.unwrap_or_default(), header_row)
            }
        }
    }

    pub fn file(&self) -> &FileContent {
        &self.file
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn sheet(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    pub fn header_row(&self) -> Option<usize> {
        self.header_row
    }
}
