use crate::config::{ColumnsConfig, InputConfig};
use crate::dms::parse_dms;
use crate::types::{CleanOutcome, RawTankRow, TankRecord};
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use geo::Point;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

/// A cell as read from the source, before any field-specific interpretation.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Empty,
    Other,
}

struct SourceTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

struct ColumnIndex {
    station_id: usize,
    company_name: usize,
    municipality: usize,
    product: usize,
    capacity: usize,
    latitude: usize,
    longitude: usize,
}

pub fn load_and_clean(input: &InputConfig) -> Result<CleanOutcome> {
    let rows = load_raw_rows(input)?;
    let outcome = clean_rows(rows);
    info!(
        "Kept {} rows with valid coordinates, dropped {}",
        outcome.records.len(),
        outcome.dropped
    );
    Ok(outcome)
}

pub fn load_raw_rows(input: &InputConfig) -> Result<Vec<RawTankRow>> {
    info!("Loading tank records from {:?}...", input.source);

    let extension = input.source.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input file has no extension: {:?}", input.source))?;

    let table = match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook_sheet(&input.source, &input.sheet)?,
        "csv" => read_csv(&input.source)?,
        _ => return Err(anyhow!("Unsupported input format: {}", extension)),
    };

    let columns = resolve_columns(&table.headers, &input.columns, &input.source)?;
    let rows: Vec<RawTankRow> = table.rows.iter()
        .map(|cells| raw_row_from_cells(cells, &columns))
        .collect();

    info!("Read {} rows", rows.len());
    Ok(rows)
}

/// Normalize both coordinates of every row and keep the rows where both succeed.
/// Source order is preserved.
pub fn clean_rows(rows: Vec<RawTankRow>) -> CleanOutcome {
    let mut outcome = CleanOutcome::default();

    for (line, row) in rows.into_iter().enumerate() {
        let latitude = parse_dms(row.latitude.as_deref());
        let longitude = parse_dms(row.longitude.as_deref());

        match (latitude, longitude) {
            (Some(lat), Some(lon)) => outcome.records.push(TankRecord {
                station_id: row.station_id,
                company_name: row.company_name,
                municipality: row.municipality,
                product: row.product,
                capacity_m3: row.capacity_m3.unwrap_or(0.0),
                location: Point::new(lon, lat),
            }),
            _ => {
                debug!(
                    "Dropping row {} ({}): latitude {:?}, longitude {:?}",
                    line + 1,
                    row.station_id,
                    row.latitude,
                    row.longitude
                );
                outcome.dropped += 1;
            }
        }
    }

    outcome
}

fn read_workbook_sheet(path: &Path, sheet: &str) -> Result<SourceTable> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {:?}", path))?;

    let available = workbook.sheet_names();
    if !available.iter().any(|name| name == sheet) {
        return Err(anyhow!(
            "Sheet '{}' not found in {:?} (available: {})",
            sheet,
            path,
            available.join(", ")
        ));
    }

    let range = workbook.worksheet_range(sheet)
        .with_context(|| format!("Failed to read sheet '{}' from {:?}", sheet, path))?;

    let mut rows = range.rows();
    let headers = rows.next()
        .ok_or_else(|| anyhow!("Sheet '{}' in {:?} is empty", sheet, path))?
        .iter()
        .map(|d| cell_text(&cell_from_data(d)))
        .collect();

    let rows = rows.map(|r| r.iter().map(cell_from_data).collect()).collect();

    Ok(SourceTable { headers, rows })
}

fn read_csv(path: &Path) -> Result<SourceTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let mut reader = BufReader::new(file);

    let mut header_line = Vec::new();
    reader.read_until(b'\n', &mut header_line)
        .with_context(|| format!("Failed to read CSV file: {:?}", path))?;
    reader.seek(SeekFrom::Start(0))
        .with_context(|| format!("Failed to rewind CSV file: {:?}", path))?;

    let mut rdr = ReaderBuilder::new()
        .delimiter(sniff_delimiter(&header_line))
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.byte_headers()
        .with_context(|| format!("Failed to read CSV header from {:?}", path))?
        .iter()
        .map(decode_field)
        .collect();

    let mut rows = Vec::new();
    for result in rdr.byte_records() {
        let record = result.with_context(|| format!("Malformed CSV record in {:?}", path))?;
        rows.push(
            record.iter()
                .map(|field| if field.is_empty() { Cell::Empty } else { Cell::Text(decode_field(field)) })
                .collect(),
        );
    }

    Ok(SourceTable { headers, rows })
}

// Exports from spreadsheet tools are often Windows-1252 rather than UTF-8.
// Accented Portuguese letters sit in the Latin-1 range, so map bytes directly.
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

// Spreadsheet exports with decimal commas usually separate fields with ';'.
fn sniff_delimiter(header_line: &[u8]) -> u8 {
    let count = |needle: u8| header_line.iter().filter(|&&b| b == needle).count();
    if count(b';') > count(b',') {
        b';'
    } else {
        b','
    }
}

fn resolve_columns(headers: &[String], columns: &ColumnsConfig, source: &Path) -> Result<ColumnIndex> {
    let find = |name: &str| {
        headers.iter().position(|h| h == name)
            .ok_or_else(|| anyhow!("Column '{}' not found in {:?}", name, source))
    };

    Ok(ColumnIndex {
        station_id: find(&columns.station_id)?,
        company_name: find(&columns.company_name)?,
        municipality: find(&columns.municipality)?,
        product: find(&columns.product)?,
        capacity: find(&columns.capacity)?,
        latitude: find(&columns.latitude)?,
        longitude: find(&columns.longitude)?,
    })
}

fn raw_row_from_cells(cells: &[Cell], columns: &ColumnIndex) -> RawTankRow {
    let cell = |idx: usize| cells.get(idx).unwrap_or(&Cell::Empty);

    RawTankRow {
        station_id: cell_text(cell(columns.station_id)),
        company_name: cell_text(cell(columns.company_name)),
        municipality: cell_text(cell(columns.municipality)),
        product: cell_text(cell(columns.product)),
        capacity_m3: cell_number(cell(columns.capacity)),
        latitude: coordinate_text(cell(columns.latitude)),
        longitude: coordinate_text(cell(columns.longitude)),
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Empty => Cell::Empty,
        _ => Cell::Other,
    }
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        // Spreadsheets store ids like CNPJ as floats; print integral values without ".0".
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Cell::Number(n) => n.to_string(),
        Cell::Empty | Cell::Other => String::new(),
    }
}

fn cell_number(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        Cell::Empty | Cell::Other => return None,
    };
    value.is_finite().then_some(value)
}

// DMS coordinates only ever arrive as text; a numeric cell is not DMS.
fn coordinate_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) => Some(s.clone()),
        _ => None,
    }
}
