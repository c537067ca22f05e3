use std::io::Cursor;

use calamine::{Data, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::error::LoadError;
use super::model::{CellValue, ColumnType, Dataset};
use super::source::{FileKind, SourceDescriptor};

/// Strings read as missing values, on top of the empty string.
const NA_MARKERS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Parse the source described by `source` and normalize its column names.
///
/// Dispatches on the declared kind:
/// * `csv`   – comma-delimited text, first row is the header
/// * `Excel` – one sheet of a workbook, with the header on `header_row`
pub fn load(source: &SourceDescriptor) -> Result<Dataset, LoadError> {
    let bytes = source.file().bytes();
    let mut dataset = match source.kind() {
        FileKind::Csv => read_csv(bytes)?,
        FileKind::Excel => read_spreadsheet(
            bytes,
            source.sheet().unwrap_or_default(),
            source.header_row().unwrap_or(0),
        )?,
    };
    dataset.column_names = normalize_columns(&dataset.column_names);
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Column-name normalization
// ---------------------------------------------------------------------------

/// Canonical form of a column name: underscores become spaces, then the
/// name is title-cased. Applying it twice changes nothing.
pub fn normalize_column_name(name: &str) -> String {
    title_case(&name.replace('_', " "))
}

pub fn normalize_columns(names: &[String]) -> Vec<String> {
    names.iter().map(|n| normalize_column_name(n)).collect()
}

/// Upper-case the first cased character after an uncased one and
/// lower-case every other cased character.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for ch in s.chars() {
        let cased = ch.is_uppercase() || ch.is_lowercase();
        if !cased {
            out.push(ch);
        } else if prev_cased {
            out.extend(ch.to_lowercase());
        } else {
            // Multi-char uppercase forms (e.g. 'ß' -> "SS") keep only the
            // first letter upper so the result is already in title form.
            let mut upper = ch.to_uppercase();
            if let Some(first) = upper.next() {
                out.push(first);
            }
            for rest in upper {
                out.extend(rest.to_lowercase());
            }
        }
        prev_cased = cased;
    }
    out
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one record per line.
///
/// Cell types are guessed per value, then settled per column: a column
/// that ends up as text keeps the original spelling of every value.
pub fn read_csv(bytes: &[u8]) -> Result<Dataset, LoadError> {
    if bytes.contains(&0) {
        return Err(LoadError::format(FileKind::Csv, "binary content (NUL byte)"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::format(FileKind::Csv, e))?
        .iter()
        .enumerate()
        .map(|(i, h)| header_name(h.trim(), i))
        .collect();

    if headers.is_empty() {
        return Err(LoadError::format(FileKind::Csv, "no columns to parse"));
    }

    let mut raw: Vec<Vec<String>> = Vec::new();
    let mut typed: Vec<Vec<CellValue>> = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| LoadError::format(FileKind::Csv, format!("row {row_no}: {e}")))?;
        typed.push(record.iter().map(guess_cell_type).collect());
        raw.push(record.iter().map(str::to_string).collect());
    }

    for c in 0..headers.len() {
        if ColumnType::infer(typed.iter().map(|r| &r[c])) != ColumnType::Text {
            continue;
        }
        for (row, raw_row) in typed.iter_mut().zip(&raw) {
            if !row[c].is_null() {
                row[c] = CellValue::Text(raw_row[c].clone());
            }
        }
    }

    Ok(Dataset::from_rows(headers, typed))
}

fn guess_cell_type(s: &str) -> CellValue {
    let s = s.trim();
    if s.is_empty() || NA_MARKERS.contains(&s) {
        return CellValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return if f.is_nan() {
            CellValue::Null
        } else {
            CellValue::Float(f)
        };
    }
    match s {
        "true" | "True" | "TRUE" => return CellValue::Bool(true),
        "false" | "False" | "FALSE" => return CellValue::Bool(false),
        _ => {}
    }
    if let Some(dt) = parse_datetime(s) {
        return CellValue::DateTime(dt);
    }
    CellValue::Text(s.to_string())
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Blank header cells get a positional placeholder name.
fn header_name(raw: &str, idx: usize) -> String {
    if raw.is_empty() {
        format!("Unnamed: {idx}")
    } else {
        raw.to_string()
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// Sheet names of a workbook, in workbook order.
pub fn sheet_names(bytes: &[u8]) -> Result<Vec<String>, LoadError> {
    Ok(open_workbook(bytes)?.sheet_names())
}

/// Read one sheet of a workbook.
///
/// `header_row` counts from the top of the sheet, including blank leading
/// rows. Rows above the header are discarded, as are fully empty rows at
/// the bottom of the data.
pub fn read_spreadsheet(
    bytes: &[u8],
    sheet: &str,
    header_row: usize,
) -> Result<Dataset, LoadError> {
    let mut workbook = open_workbook(bytes)?;

    let available = workbook.sheet_names();
    if !available.iter().any(|s| s == sheet) {
        return Err(LoadError::SheetNotFound {
            sheet: sheet.to_string(),
            available,
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| LoadError::format(FileKind::Excel, e))?;

    // The range starts at the first used cell; pad so row indices match the sheet.
    let leading_rows = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let n_rows = if range.is_empty() { 0 } else { leading_rows + range.height() };

    if header_row >= n_rows {
        return Err(LoadError::InvalidHeaderRow {
            requested: header_row,
            available: n_rows,
        });
    }

    let width = range.width();
    let grid: Vec<Vec<CellValue>> = std::iter::repeat_with(|| vec![CellValue::Null; width])
        .take(leading_rows)
        .chain(range.rows().map(|r| r.iter().map(excel_cell).collect()))
        .collect();

    let columns: Vec<String> = grid[header_row]
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            CellValue::Null => header_name("", i),
            other => header_name(other.to_string().trim(), i),
        })
        .collect();

    let mut rows = grid[header_row + 1..].to_vec();
    while rows.last().is_some_and(|r| r.iter().all(CellValue::is_null)) {
        rows.pop();
    }
    Ok(Dataset::from_rows(columns, rows))
}

fn open_workbook(bytes: &[u8]) -> Result<Sheets<Cursor<&[u8]>>, LoadError> {
    calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| LoadError::format(FileKind::Excel, e))
}

fn excel_cell(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) if f.is_nan() => CellValue::Null,
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) if s.trim().is_empty() => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Null),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Null,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::source::FileContent;
    use rust_xlsxwriter::Workbook;

    /// Build an xlsx workbook in memory. Cells that parse as numbers are
    /// written as numbers; empty strings are left blank.
    pub(crate) fn xlsx(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        for (name, rows) in sheets {
            let sheet = workbook.add_worksheet();
            sheet.set_name(*name).unwrap();
            for (r, row) in rows.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    if value.is_empty() {
                        continue;
                    }
                    match value.parse::<f64>() {
                        Ok(n) => sheet.write_number(r as u32, c as u16, n).unwrap(),
                        Err(_) => sheet.write_string(r as u32, c as u16, *value).unwrap(),
                    };
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    fn numbers(ds: &Dataset) -> Vec<Vec<f64>> {
        ds.rows
            .iter()
            .map(|r| r.iter().map(|c| c.as_f64().unwrap_or(f64::NAN)).collect())
            .collect()
    }

    #[test]
    fn test_load_csv_normalizes_columns() {
        let file = FileContent::new("t.csv", b"a_b,c_d\n1,2\n3,4\n5,6".to_vec());
        let ds = load(&SourceDescriptor::csv(file)).unwrap();
        assert_eq!(ds.column_names, vec!["A B", "C D"]);
        assert_eq!(ds.column_types, vec![ColumnType::Numeric, ColumnType::Numeric]);
        assert_eq!(
            ds.rows,
            vec![
                vec![CellValue::Integer(1), CellValue::Integer(2)],
                vec![CellValue::Integer(3), CellValue::Integer(4)],
                vec![CellValue::Integer(5), CellValue::Integer(6)],
            ]
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let names = vec![
            "first_name".to_string(),
            "ZIP_code".to_string(),
            "1st_place".to_string(),
            "Already Title".to_string(),
            "straße".to_string(),
            "".to_string(),
        ];
        let once = normalize_columns(&names);
        assert_eq!(once[0], "First Name");
        assert_eq!(once[1], "Zip Code");
        assert_eq!(once[2], "1St Place");
        assert_eq!(normalize_columns(&once), once);
    }

    #[test]
    fn test_csv_type_guessing() {
        let csv = b"id,score,flag,when,label,mixed\n\
                    1,2.5,True,2024-01-02,x,1\n\
                    2,NA,false,2024-01-03 10:30:00,y,two\n";
        let ds = read_csv(csv).unwrap();
        assert_eq!(
            ds.column_types,
            vec![
                ColumnType::Numeric,
                ColumnType::Numeric,
                ColumnType::Boolean,
                ColumnType::DateTime,
                ColumnType::Text,
                ColumnType::Text,
            ]
        );
        assert_eq!(ds.rows[1][1], CellValue::Null);
        assert_eq!(ds.rows[0][5], CellValue::Text("1".into()));
    }

    #[test]
    fn test_text_column_keeps_original_spelling() {
        let ds = read_csv(b"code\n007\nabc\n").unwrap();
        assert_eq!(ds.rows[0][0], CellValue::Text("007".into()));
    }

    #[test]
    fn test_csv_blank_header_gets_placeholder() {
        let ds = read_csv(b",b\n1,2\n").unwrap();
        assert_eq!(ds.column_names, vec!["Unnamed: 0", "b"]);
    }

    #[test]
    fn test_csv_rejects_binary_and_bad_input() {
        assert!(matches!(
            read_csv(&[0x50, 0x4b, 0x03, 0x04, 0x00, 0x01]),
            Err(LoadError::Format { kind: FileKind::Csv, .. })
        ));
        assert!(matches!(
            read_csv(b"a,b\n\xff\xfe,1\n"),
            Err(LoadError::Format { .. })
        ));
        assert!(matches!(read_csv(b"a,b\n1,2,3\n"), Err(LoadError::Format { .. })));
        assert!(matches!(read_csv(b""), Err(LoadError::Format { .. })));
    }

    #[test]
    fn test_spreadsheet_reads_requested_sheet() {
        let bytes = xlsx(&[
            ("First", &[&["x_val", "y"], &["1", "2"]]),
            ("Second", &[&["x_val", "y"], &["10", "20"], &["30", "40"]]),
        ]);
        assert_eq!(sheet_names(&bytes).unwrap(), vec!["First", "Second"]);

        let file = FileContent::new("book.xlsx", bytes);
        let first = load(&SourceDescriptor::spreadsheet(file.clone(), "First", 0)).unwrap();
        let second = load(&SourceDescriptor::spreadsheet(file, "Second", 0)).unwrap();

        assert_eq!(first.column_names, vec!["X Val", "Y"]);
        assert_eq!(numbers(&first), vec![vec![1.0, 2.0]]);
        assert_eq!(numbers(&second), vec![vec![10.0, 20.0], vec![30.0, 40.0]]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_spreadsheet_header_row_offset() {
        let bytes = xlsx(&[(
            "Data",
            &[&["Report title", ""], &["", ""], &["name", "qty"], &["bolt", "4"]],
        )]);
        let ds = read_spreadsheet(&bytes, "Data", 2).unwrap();
        assert_eq!(ds.column_names, vec!["name", "qty"]);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.rows[0][0], CellValue::Text("bolt".into()));
        assert_eq!(ds.rows[0][1].as_f64(), Some(4.0));
    }

    #[test]
    fn test_spreadsheet_drops_empty_trailing_rows() {
        let bytes = xlsx(&[(
            "S",
            &[&["a", "b"], &["1", "x"], &["", ""], &["2", "y"], &["  ", ""], &["", " "]],
        )]);
        let ds = read_spreadsheet(&bytes, "S", 0).unwrap();
        assert_eq!(ds.len(), 3);
        assert!(ds.rows[1].iter().all(CellValue::is_null));
        assert_eq!(ds.rows[2][1], CellValue::Text("y".into()));
    }

    #[test]
    fn test_spreadsheet_blank_header_cell() {
        let bytes = xlsx(&[("S", &[&["a", ""], &["1", "2"]])]);
        let ds = read_spreadsheet(&bytes, "S", 0).unwrap();
        assert_eq!(ds.column_names, vec!["a", "Unnamed: 1"]);
    }

    #[test]
    fn test_spreadsheet_errors() {
        let bytes = xlsx(&[("S", &[&["a"], &["1"], &["2"]])]);

        assert!(matches!(
            read_spreadsheet(&bytes, "Missing", 0),
            Err(LoadError::SheetNotFound { sheet, available })
                if sheet == "Missing" && available == vec!["S".to_string()]
        ));
        assert!(matches!(
            read_spreadsheet(&bytes, "S", 3),
            Err(LoadError::InvalidHeaderRow { requested: 3, available: 3 })
        ));
        assert!(read_spreadsheet(&bytes, "S", 2).is_ok());
        assert!(matches!(
            read_spreadsheet(b"a,b\n1,2\n", "S", 0),
            Err(LoadError::Format { kind: FileKind::Excel, .. })
        ));
        assert!(matches!(
            sheet_names(b"not a workbook"),
            Err(LoadError::Format { .. })
        ));
    }
}
