//! Tabular ingestion pipeline for weather and production uploads.
//!
//! Validates, parses (CSV / spreadsheet / PDF table extraction),
//! normalizes and type-coerces uploaded files into storage-ready records.
//! Coercion policy differs by field importance: weather's optional
//! numerics coerce unparseable values to 0; production's required
//! `energy_output_kwh` fails the whole batch on any non-numeric row;
//! production's optional numerics become null.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::services::model::FEATURE_COLUMNS;

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported file format '{0}'. Allowed formats: CSV, XLSX, XLS, PDF")]
    UnsupportedFormat(String),

    #[error("File is {size} bytes; the upload limit is {limit} bytes (20 MB)")]
    FileTooLarge { size: usize, limit: usize },

    #[error("No table found in the PDF document")]
    NoTableFound,

    #[error("Table has a header row but no data rows")]
    EmptyTable,

    #[error("Missing required columns [{}]; found columns [{}]", missing.join(", "), found.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Unparseable timestamp '{value}' in row {row}")]
    InvalidTimestamp { row: usize, value: String },

    #[error("Non-numeric {column} value '{value}' in row {row}")]
    InvalidNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("File is not a valid image: {0}")]
    InvalidImage(String),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet parse error: {0}")]
    Spreadsheet(String),

    #[error("PDF parse error: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A weather record ready for storage. Numeric fields are always concrete
/// (unparseable cells coerce to 0), timestamps canonical second-precision.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWeatherRecord {
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub cloud_cover: f64,
    pub solar_irradiance: f64,
    pub precipitation: f64,
    pub is_forecast: bool,
    pub location: Option<String>,
}

/// A production record ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProductionRecord {
    pub timestamp: NaiveDateTime,
    pub energy_output_kwh: f64,
    pub panel_id: Option<String>,
    pub system_capacity_kw: Option<f64>,
    pub efficiency: Option<f64>,
}

// ---------------------------------------------------------------------------
// Format dispatch
// ---------------------------------------------------------------------------

/// Supported upload formats, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Spreadsheet,
    Pdf,
}

impl TableFormat {
    pub fn from_filename(name: &str) -> Result<Self, IngestError> {
        let extension = name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "xlsx" | "xls" => Ok(TableFormat::Spreadsheet),
            "pdf" => Ok(TableFormat::Pdf),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A parsed table: normalized (trimmed, lowercased) headers plus string
/// cells. All formats reduce to this before schema checks.
#[derive(Debug, Clone)]
pub struct RowSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowSet {
    fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers = headers
            .into_iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        Self { headers, rows }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell<'a>(&'a self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column_index(name)
            .and_then(|idx| row.get(idx))
            .map(|s| s.trim())
    }
}

/// Parse raw upload bytes into a row set, dispatched on format.
pub fn parse_table(format: TableFormat, bytes: &[u8]) -> Result<RowSet, IngestError> {
    match format {
        TableFormat::Csv => parse_csv(bytes),
        TableFormat::Spreadsheet => parse_spreadsheet(bytes),
        TableFormat::Pdf => parse_pdf(bytes),
    }
}

fn parse_csv(bytes: &[u8]) -> Result<RowSet, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    Ok(RowSet::new(headers, rows))
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<RowSet, IngestError> {
    use calamine::{open_workbook_auto_from_rs, Data, Reader};

    fn cell_to_string(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
            Data::Float(f) => f.to_string(),
            Data::Int(i) => i.to_string(),
            Data::Bool(b) => b.to_string(),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
            Data::Error(e) => format!("{:?}", e),
        }
    }

    let cursor = std::io::Cursor::new(bytes);
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(IngestError::EmptyTable)?
        .map_err(|e| IngestError::Spreadsheet(e.to_string()))?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or(IngestError::EmptyTable)?
        .iter()
        .map(cell_to_string)
        .collect();
    let rows: Vec<Vec<String>> = rows_iter
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(RowSet::new(headers, rows))
}

/// Extract the data table from a PDF.
///
/// Policy: every page is scanned for contiguous delimiter-consistent line
/// blocks, all candidate tables are collected, and the single largest (by
/// row count) is used as the data source.
fn parse_pdf(bytes: &[u8]) -> Result<RowSet, IngestError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| IngestError::Pdf(e.to_string()))?;
    select_largest_table(&pages)
}

/// Split a text line into table cells. Comma-delimited lines win, then
/// tabs, then runs of two or more spaces. Lines with fewer than two cells
/// are not table lines.
fn split_table_line(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cells: Vec<String> = if trimmed.contains(',') {
        trimmed.split(',').map(|c| c.trim().to_string()).collect()
    } else if trimmed.contains('\t') {
        trimmed.split('\t').map(|c| c.trim().to_string()).collect()
    } else if trimmed.contains("  ") {
        trimmed
            .split("  ")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        return None;
    };

    if cells.len() >= 2 {
        Some(cells)
    } else {
        None
    }
}

/// Collect candidate tables from one page of extracted text. A candidate
/// is a contiguous run of table lines with a consistent cell count.
fn tables_in_page(page: &str) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in page.lines() {
        match split_table_line(line) {
            Some(cells) => {
                if !current.is_empty() && cells.len() != current[0].len() {
                    tables.push(std::mem::take(&mut current));
                }
                current.push(cells);
            }
            None => {
                if !current.is_empty() {
                    tables.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        tables.push(current);
    }

    tables
}

fn select_largest_table(pages: &[String]) -> Result<RowSet, IngestError> {
    let mut best: Option<Vec<Vec<String>>> = None;
    for page in pages {
        for table in tables_in_page(page) {
            let is_larger = best
                .as_ref()
                .map(|b| table.len() > b.len())
                .unwrap_or(true);
            if is_larger {
                best = Some(table);
            }
        }
    }

    let mut table = best.ok_or(IngestError::NoTableFound)?;
    if table.len() < 2 {
        return Err(IngestError::EmptyTable);
    }
    let headers = table.remove(0);
    Ok(RowSet::new(headers, table))
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Lenient timestamp parsing. Accepts RFC 3339 (offset dropped), common
/// datetime layouts, and bare dates (midnight). The result is truncated to
/// second precision — canonical ISO-8601 without a timezone.
pub fn parse_timestamp_lenient(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        let naive = dt.naive_utc();
        return Some(naive.with_nanosecond(0).unwrap_or(naive));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.with_nanosecond(0).unwrap_or(dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Coerce a cell to f64, defaulting unparseable or non-finite values to 0.
fn coerce_numeric(cell: Option<&str>) -> f64 {
    cell.and_then(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a cell to f64, yielding null for unparseable values.
fn optional_numeric(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|c| c.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_bool(cell: Option<&str>) -> bool {
    matches!(
        cell.map(|c| c.to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1") | Some("yes") | Some("t")
    )
}

fn optional_text(cell: Option<&str>) -> Option<String> {
    cell.filter(|c| !c.is_empty()).map(str::to_string)
}

// ---------------------------------------------------------------------------
// Ingestion entry points
// ---------------------------------------------------------------------------

fn preflight(filename: &str, bytes: &[u8]) -> Result<TableFormat, IngestError> {
    let format = TableFormat::from_filename(filename)?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(IngestError::FileTooLarge {
            size: bytes.len(),
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(format)
}

fn require_columns(table: &RowSet, required: &[&str]) -> Result<(), IngestError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| table.column_index(col).is_none())
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::MissingColumns {
            missing,
            found: table.headers.clone(),
        })
    }
}

/// Ingest a weather upload into storage-ready records.
///
/// `timestamp` is required and must parse in every row (no partial
/// success); the six numeric telemetry columns coerce unparseable or
/// missing values to 0.
pub fn ingest_weather(filename: &str, bytes: &[u8]) -> Result<Vec<NewWeatherRecord>, IngestError> {
    let format = preflight(filename, bytes)?;
    let table = parse_table(format, bytes)?;
    require_columns(&table, &["timestamp"])?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let raw_ts = table.cell(row, "timestamp").unwrap_or_default();
        let timestamp =
            parse_timestamp_lenient(raw_ts).ok_or_else(|| IngestError::InvalidTimestamp {
                // Row numbers are spreadsheet-style: header is row 1.
                row: i + 2,
                value: raw_ts.to_string(),
            })?;

        let mut numeric = [0.0f64; 6];
        for (slot, column) in numeric.iter_mut().zip(FEATURE_COLUMNS) {
            *slot = coerce_numeric(table.cell(row, column));
        }

        records.push(NewWeatherRecord {
            timestamp,
            temperature: numeric[0],
            humidity: numeric[1],
            wind_speed: numeric[2],
            cloud_cover: numeric[3],
            solar_irradiance: numeric[4],
            precipitation: numeric[5],
            is_forecast: parse_bool(table.cell(row, "is_forecast")),
            location: optional_text(table.cell(row, "location")),
        });
    }

    Ok(records)
}

/// Ingest a production upload into storage-ready records.
///
/// `timestamp` and `energy_output_kwh` are required; a single non-numeric
/// energy value rejects the entire batch. Optional numerics
/// (`system_capacity_kw`, `efficiency`) become null when unparseable.
pub fn ingest_production(
    filename: &str,
    bytes: &[u8],
) -> Result<Vec<NewProductionRecord>, IngestError> {
    let format = preflight(filename, bytes)?;
    let table = parse_table(format, bytes)?;
    require_columns(&table, &["timestamp", "energy_output_kwh"])?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let raw_ts = table.cell(row, "timestamp").unwrap_or_default();
        let timestamp =
            parse_timestamp_lenient(raw_ts).ok_or_else(|| IngestError::InvalidTimestamp {
                row: i + 2,
                value: raw_ts.to_string(),
            })?;

        let raw_energy = table.cell(row, "energy_output_kwh").unwrap_or_default();
        let energy_output_kwh = raw_energy
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| IngestError::InvalidNumeric {
                column: "energy_output_kwh".to_string(),
                row: i + 2,
                value: raw_energy.to_string(),
            })?;

        records.push(NewProductionRecord {
            timestamp,
            energy_output_kwh,
            panel_id: optional_text(table.cell(row, "panel_id")),
            system_capacity_kw: optional_numeric(table.cell(row, "system_capacity_kw")),
            efficiency: optional_numeric(table.cell(row, "efficiency")),
        });
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Image uploads
// ---------------------------------------------------------------------------

/// Validate and persist an uploaded panel image.
///
/// The upload must decode as a real image; it is written under `image_dir`
/// with a timestamp-prefixed filename, and the path relative to the media
/// root is returned.
pub fn save_image(image_dir: &Path, filename: &str, bytes: &[u8]) -> Result<String, IngestError> {
    image::load_from_memory(bytes).map_err(|e| IngestError::InvalidImage(e.to_string()))?;

    std::fs::create_dir_all(image_dir)?;

    // Strip any client-supplied path components.
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|b| !b.is_empty())
        .unwrap_or("upload");
    let stamped = format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), base);

    std::fs::write(image_dir.join(&stamped), bytes)?;

    Ok(format!("images/{}", stamped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weather_csv(body: &str) -> Vec<u8> {
        body.as_bytes().to_vec()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            TableFormat::from_filename("data.csv").unwrap(),
            TableFormat::Csv
        );
        assert_eq!(
            TableFormat::from_filename("DATA.XLSX").unwrap(),
            TableFormat::Spreadsheet
        );
        assert_eq!(
            TableFormat::from_filename("legacy.xls").unwrap(),
            TableFormat::Spreadsheet
        );
        assert_eq!(
            TableFormat::from_filename("report.pdf").unwrap(),
            TableFormat::Pdf
        );
        assert!(matches!(
            TableFormat::from_filename("notes.txt"),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let bytes = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            ingest_weather("big.csv", &bytes),
            Err(IngestError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_weather_timestamp_canonical_form() {
        let bytes = weather_csv("timestamp,temperature\n2024-01-01 00:00:00,21.5\n");
        let records = ingest_weather("weather.csv", &bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "2024-01-01T00:00:00"
        );
        assert_eq!(records[0].temperature, 21.5);
    }

    #[test]
    fn test_weather_non_numeric_cell_coerces_to_zero() {
        let bytes = weather_csv(
            "timestamp,temperature,humidity\n\
             2024-01-01 00:00:00,not-a-number,55\n",
        );
        let records = ingest_weather("weather.csv", &bytes).unwrap();
        assert_eq!(records[0].temperature, 0.0);
        assert_eq!(records[0].humidity, 55.0);
    }

    #[test]
    fn test_weather_missing_numeric_column_defaults_to_zero() {
        let bytes = weather_csv("timestamp\n2024-01-01 12:00:00\n");
        let records = ingest_weather("weather.csv", &bytes).unwrap();
        assert_eq!(records[0].solar_irradiance, 0.0);
        assert_eq!(records[0].precipitation, 0.0);
        assert!(!records[0].is_forecast);
    }

    #[test]
    fn test_weather_missing_timestamp_column_lists_found() {
        let bytes = weather_csv("time,temperature\n2024-01-01,20\n");
        match ingest_weather("weather.csv", &bytes) {
            Err(IngestError::MissingColumns { missing, found }) => {
                assert_eq!(missing, vec!["timestamp".to_string()]);
                assert!(found.contains(&"time".to_string()));
                assert!(found.contains(&"temperature".to_string()));
            }
            other => panic!("expected MissingColumns, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_weather_bad_timestamp_fails_whole_batch() {
        let bytes = weather_csv(
            "timestamp,temperature\n\
             2024-01-01 00:00:00,20\n\
             garbage,21\n",
        );
        match ingest_weather("weather.csv", &bytes) {
            Err(IngestError::InvalidTimestamp { row, value }) => {
                assert_eq!(row, 3);
                assert_eq!(value, "garbage");
            }
            other => panic!("expected InvalidTimestamp, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_weather_is_forecast_and_location() {
        let bytes = weather_csv(
            "timestamp,is_forecast,location\n\
             2024-01-01 00:00:00,true,Zurich\n\
             2024-01-01 01:00:00,0,\n",
        );
        let records = ingest_weather("weather.csv", &bytes).unwrap();
        assert!(records[0].is_forecast);
        assert_eq!(records[0].location.as_deref(), Some("Zurich"));
        assert!(!records[1].is_forecast);
        assert_eq!(records[1].location, None);
    }

    #[test]
    fn test_weather_header_case_insensitive() {
        let bytes = weather_csv("Timestamp,Temperature\n2024-01-01 00:00:00,18\n");
        let records = ingest_weather("weather.csv", &bytes).unwrap();
        assert_eq!(records[0].temperature, 18.0);
    }

    #[test]
    fn test_production_happy_path() {
        let bytes = weather_csv(
            "timestamp,energy_output_kwh,panel_id,system_capacity_kw,efficiency\n\
             2024-01-01 00:00:00,12.5,P-1,5.0,0.92\n",
        );
        let records = ingest_production("production.csv", &bytes).unwrap();
        assert_eq!(records[0].energy_output_kwh, 12.5);
        assert_eq!(records[0].panel_id.as_deref(), Some("P-1"));
        assert_eq!(records[0].system_capacity_kw, Some(5.0));
        assert_eq!(records[0].efficiency, Some(0.92));
    }

    #[test]
    fn test_production_non_numeric_energy_rejects_batch() {
        let bytes = weather_csv(
            "timestamp,energy_output_kwh\n\
             2024-01-01 00:00:00,12.5\n\
             2024-01-01 01:00:00,broken\n",
        );
        match ingest_production("production.csv", &bytes) {
            Err(IngestError::InvalidNumeric { column, row, value }) => {
                assert_eq!(column, "energy_output_kwh");
                assert_eq!(row, 3);
                assert_eq!(value, "broken");
            }
            other => panic!("expected InvalidNumeric, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_production_requires_energy_column() {
        let bytes = weather_csv("timestamp\n2024-01-01 00:00:00\n");
        assert!(matches!(
            ingest_production("production.csv", &bytes),
            Err(IngestError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_production_optional_numeric_becomes_null() {
        let bytes = weather_csv(
            "timestamp,energy_output_kwh,efficiency\n\
             2024-01-01 00:00:00,12.5,n/a\n",
        );
        let records = ingest_production("production.csv", &bytes).unwrap();
        assert_eq!(records[0].efficiency, None);
    }

    #[test]
    fn test_timestamp_lenient_formats() {
        for (input, expected) in [
            ("2024-01-01 00:00:00", "2024-01-01T00:00:00"),
            ("2024-01-01T06:30:00", "2024-01-01T06:30:00"),
            ("2024-01-01T06:30:00Z", "2024-01-01T06:30:00"),
            ("2024-01-01T06:30:00.123456", "2024-01-01T06:30:00"),
            ("2024-01-01", "2024-01-01T00:00:00"),
            ("01/15/2024 14:30", "2024-01-15T14:30:00"),
        ] {
            let parsed = parse_timestamp_lenient(input)
                .unwrap_or_else(|| panic!("failed to parse '{}'", input));
            assert_eq!(
                parsed.format("%Y-%m-%dT%H:%M:%S").to_string(),
                expected,
                "for input '{}'",
                input
            );
        }
        assert!(parse_timestamp_lenient("not a date").is_none());
        assert!(parse_timestamp_lenient("").is_none());
    }

    // --- PDF table selection ---

    #[test]
    fn test_pdf_largest_table_wins() {
        let pages = vec![
            "Quarterly report\n\
             site, owner\n\
             north, acme\n"
                .to_string(),
            "timestamp, energy_output_kwh\n\
             2024-01-01 00:00:00, 10.0\n\
             2024-01-01 01:00:00, 11.0\n\
             2024-01-01 02:00:00, 12.0\n"
                .to_string(),
        ];
        let table = select_largest_table(&pages).unwrap();
        assert_eq!(table.headers, vec!["timestamp", "energy_output_kwh"]);
        assert_eq!(table.rows.len(), 3);
    }

    #[test]
    fn test_pdf_whitespace_delimited_table() {
        let pages = vec![
            "timestamp  temperature  humidity\n\
             2024-01-01T00:00:00  18.5  60\n\
             2024-01-01T01:00:00  18.1  62\n"
                .to_string(),
        ];
        let table = select_largest_table(&pages).unwrap();
        assert_eq!(table.headers.len(), 3);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][1], "18.5");
    }

    #[test]
    fn test_pdf_no_table_found() {
        let pages = vec!["Just some prose.\nNothing tabular here.\n".to_string()];
        assert!(matches!(
            select_largest_table(&pages),
            Err(IngestError::NoTableFound)
        ));
    }

    #[test]
    fn test_pdf_header_only_table_is_empty() {
        let pages = vec!["timestamp, energy_output_kwh\n".to_string()];
        assert!(matches!(
            select_largest_table(&pages),
            Err(IngestError::EmptyTable)
        ));
    }

    #[test]
    fn test_pdf_inconsistent_cell_count_splits_tables() {
        let page = "a, b\n1, 2\nx, y, z\n1, 2, 3\n2, 3, 4\n".to_string();
        let tables = tables_in_page(&page);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].len(), 2);
        assert_eq!(tables[1].len(), 3);
    }

    // --- Images ---

    #[test]
    fn test_save_image_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_image(dir.path(), "panel.png", b"definitely not an image");
        assert!(matches!(result, Err(IngestError::InvalidImage(_))));
    }

    #[test]
    fn test_save_image_writes_timestamped_file() {
        use image::{ImageFormat, RgbImage};

        let mut png_bytes = Vec::new();
        RgbImage::new(2, 2)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let rel_path = save_image(dir.path(), "panels/front.png", &png_bytes).unwrap();

        assert!(rel_path.starts_with("images/"));
        assert!(rel_path.ends_with("_front.png"));
        let written = dir.path().join(rel_path.strip_prefix("images/").unwrap());
        assert_eq!(std::fs::read(written).unwrap(), png_bytes);
    }
}
