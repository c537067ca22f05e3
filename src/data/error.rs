use thiserror::Error;

use super::source::FileKind;

/// Why a dataset could not be loaded.
///
/// Every variant is terminal for the current load attempt: no partial
/// dataset is produced and nothing is cached.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The bytes are not a valid file of the declared kind.
    #[error("this file could not be read as {kind}: {reason}")]
    Format { kind: FileKind, reason: String },

    /// The header row index points past the last row of the sheet.
    #[error("header row {requested} is out of range (sheet has {available} rows)")]
    InvalidHeaderRow { requested: usize, available: usize },

    /// The sheet name is not in the workbook's sheet list.
    #[error("sheet '{sheet}' not found (available: {})", available.join(", "))]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    /// The declared file type matches neither supported kind.
    #[error("unsupported file type '{0}' (expected Excel or csv)")]
    UnsupportedFileType(String),
}

impl LoadError {
    pub(crate) fn format(kind: FileKind, reason: impl ToString) -> Self {
        LoadError::Format {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Short name of the step that failed, for the status line.
    pub fn step(&self) -> &'static str {
        match self {
            LoadError::Format { .. } => "Reading file",
            LoadError::InvalidHeaderRow { .. } => "Selecting header row",
            LoadError::SheetNotFound { .. } => "Selecting sheet",
            LoadError::UnsupportedFileType(_) => "Choosing file type",
        }
    }
}

/// Errors from derived-table operations (filter / sort / group).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FrameError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("column '{0}' is not numeric")]
    NotNumeric(String),
}
