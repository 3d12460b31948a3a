//! Batch upload loader.
//!
//! Uploads are decoded as delimited text first. Content that is not UTF-8
//! (a binary workbook) falls back to spreadsheet parsing of the first sheet.
//! Rows are never dropped: a malformed row fails the whole upload.

use crate::error::PipelineError;
use crate::normalizer::{normalize_row, RecordSource};
use crate::types::record::CanonicalRecord;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Declared type of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Csv,
    Xlsx,
    Xls,
}

impl ContentType {
    /// Accepted upload types, by file extension
    pub const ACCEPTED: [&'static str; 3] = ["csv", "xlsx", "xls"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(ContentType::Csv),
            "xlsx" => Some(ContentType::Xlsx),
            "xls" => Some(ContentType::Xls),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                PipelineError::parse(
                    path.display().to_string(),
                    format!("unsupported file type, expected one of {:?}", Self::ACCEPTED),
                )
            })
    }
}

/// How the upload was actually decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedAs {
    DelimitedText,
    Spreadsheet,
}

/// Non-fatal observation made while parsing an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based data row, when the observation concerns one row
    pub row: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    fn file(message: impl Into<String>) -> Self {
        Self {
            row: None,
            message: message.into(),
        }
    }

    fn row(row: usize, message: impl Into<String>) -> Self {
        Self {
            row: Some(row),
            message: message.into(),
        }
    }
}

/// A parsed upload: header, rows in file order and parse diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub diagnostics: Vec<Diagnostic>,
    pub decoded_as: DecodedAs,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.rows.iter()
    }
}

impl RecordSource for Batch {
    fn records(&self) -> Result<Vec<CanonicalRecord>, PipelineError> {
        self.rows.iter().map(normalize_row).collect()
    }
}

/// Parser for uploaded CSV and spreadsheet files
#[derive(Debug, Clone)]
pub struct BatchLoader {
    delimiter: u8,
}

impl BatchLoader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Read and parse a file from disk. The file is read exactly once.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Batch, PipelineError> {
        let path = path.as_ref();
        let declared = ContentType::from_path(path)?;
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::parse(path.display().to_string(), e))?;

        info!(path = %path.display(), bytes = bytes.len(), declared = ?declared, "Loading batch upload");
        self.load_bytes(&bytes, declared)
    }

    /// Parse uploaded bytes
    pub fn load_bytes(&self, bytes: &[u8], declared: ContentType) -> Result<Batch, PipelineError> {
        let batch = match std::str::from_utf8(bytes) {
            Ok(text) => self.parse_delimited(text)?,
            Err(utf8_err) => {
                debug!(
                    declared = ?declared,
                    valid_up_to = utf8_err.valid_up_to(),
                    "Upload is not UTF-8 text, trying spreadsheet"
                );
                let mut batch = parse_spreadsheet(bytes).map_err(|e| PipelineError::Parse {
                    context: format!("byte {}", utf8_err.valid_up_to()),
                    reason: format!(
                        "not UTF-8 delimited text ({}) and not a readable spreadsheet ({})",
                        utf8_err, e
                    ),
                })?;
                batch.diagnostics.insert(
                    0,
                    Diagnostic::file("content is not UTF-8 text; parsed as spreadsheet"),
                );
                batch
            }
        };

        for diagnostic in &batch.diagnostics {
            warn!(row = ?diagnostic.row, "{}", diagnostic.message);
        }
        info!(
            rows = batch.len(),
            columns = batch.columns.len(),
            decoded_as = ?batch.decoded_as,
            "Batch upload parsed"
        );

        Ok(batch)
    }

    fn parse_delimited(&self, text: &str) -> Result<Batch, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let header = reader
            .headers()
            .map_err(|e| PipelineError::parse(csv_context(&e, "header"), &e))?
            .clone();

        if header.is_empty() || header.iter().all(str::is_empty) {
            return Err(PipelineError::parse("header", "file has no header row"));
        }

        let mut diagnostics = Vec::new();
        let columns = unique_columns(header.iter().map(str::to_string), &mut diagnostics);

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let row_number = index + 1;
            let record = record.map_err(|e| {
                PipelineError::parse(csv_context(&e, &format!("row {}", row_number)), &e)
            })?;

            let mut row = Map::new();
            let mut empty_cells = 0;
            for (column, raw) in columns.iter().zip(record.iter()) {
                let value = infer_cell(raw);
                if value.is_null() {
                    empty_cells += 1;
                }
                row.insert(column.clone(), value);
            }
            if empty_cells > 0 {
                diagnostics.push(Diagnostic::row(
                    row_number,
                    format!("{} empty cell(s) sent as null", empty_cells),
                ));
            }
            rows.push(row);
        }

        if rows.is_empty() {
            diagnostics.push(Diagnostic::file("upload has a header but no data rows"));
        }

        Ok(Batch {
            columns,
            rows,
            diagnostics,
            decoded_as: DecodedAs::DelimitedText,
        })
    }
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn csv_context(error: &csv::Error, fallback: &str) -> String {
    error
        .position()
        .map(|pos| format!("line {}", pos.line()))
        .unwrap_or_else(|| fallback.to_string())
}

/// Type a delimited-text cell the way a dataframe reader would
fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match trimmed {
        "True" | "true" | "TRUE" => return Value::Bool(true),
        "False" | "false" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Value::from(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        // NaN and infinities have no JSON form and become null
        return Value::from(v);
    }
    Value::String(raw.to_string())
}

/// Rename repeated or blank header names so no column is silently overwritten.
///
/// A repeat of `name` becomes `name.N` with the smallest `N` that clashes
/// with neither an earlier column nor any other header of the upload.
fn unique_columns<I>(names: I, diagnostics: &mut Vec<Diagnostic>) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let names: Vec<String> = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            if name.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name
            }
        })
        .collect();

    let reserved: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut suffixes: HashMap<&str, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(names.len());

    for name in &names {
        if taken.insert(name.clone()) {
            columns.push(name.clone());
            continue;
        }

        let suffix = suffixes.entry(name.as_str()).or_insert(0);
        let unique = loop {
            *suffix += 1;
            let candidate = format!("{}.{}", name, suffix);
            if !reserved.contains(candidate.as_str()) && !taken.contains(&candidate) {
                break candidate;
            }
        };
        diagnostics.push(Diagnostic::file(format!(
            "duplicate column '{}' renamed to '{}'",
            name, unique
        )));
        taken.insert(unique.clone());
        columns.push(unique);
    }
    columns
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<Batch, PipelineError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| PipelineError::parse("workbook", e))?;

    let mut diagnostics = Vec::new();
    let sheet_names = workbook.sheet_names();
    if sheet_names.len() > 1 {
        diagnostics.push(Diagnostic::file(format!(
            "workbook has {} sheets; only '{}' was read",
            sheet_names.len(),
            sheet_names[0]
        )));
    }

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::parse("workbook", "workbook has no sheets"))?
        .map_err(|e| PipelineError::parse("sheet 0", e))?;

    let mut sheet_rows = range.rows();
    let header = sheet_rows
        .next()
        .ok_or_else(|| PipelineError::parse("sheet 0", "sheet is empty"))?;
    let columns = unique_columns(
        header.iter().map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        }),
        &mut diagnostics,
    );

    let mut rows = Vec::new();
    for (index, cells) in sheet_rows.enumerate() {
        let row_number = index + 1;
        let mut row = Map::new();
        for (column, cell) in columns.iter().zip(cells.iter()) {
            let value = match cell {
                Data::Int(v) => Value::from(*v),
                Data::Float(v) => Value::from(*v),
                Data::String(s) => infer_cell(s),
                Data::Bool(b) => Value::Bool(*b),
                Data::DateTime(dt) => Value::from(dt.as_f64()),
                Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
                Data::Error(e) => {
                    diagnostics.push(Diagnostic::row(
                        row_number,
                        format!("cell error {:?} in column '{}' sent as null", e, column),
                    ));
                    Value::Null
                }
                Data::Empty => Value::Null,
            };
            row.insert(column.clone(), value);
        }
        rows.push(row);
    }

    if rows.is_empty() {
        diagnostics.push(Diagnostic::file("upload has a header but no data rows"));
    }

    Ok(Batch {
        columns,
        rows,
        diagnostics,
        decoded_as: DecodedAs::Spreadsheet,
    })
}
