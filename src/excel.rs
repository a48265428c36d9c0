//! Price sheet parsing.
//!
//! The pricing workbook has one data sheet; row 1 is a header, and each data
//! row carries (running number, tipe, tahun, harga). Only the last three
//! columns are read.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook, Data, Reader, Xlsx};
use tracing::warn;

/// One parsed sheet row: motorcycle type name, model year and base price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    pub tipe: String,
    pub tahun: String,
    pub harga: i64,
}

const COL_TIPE: usize = 1;
const COL_TAHUN: usize = 2;
const COL_HARGA: usize = 3;

/// Read the named sheet of an xlsx workbook into the ordered record list.
/// An unopenable file or missing sheet aborts the run; malformed data rows
/// are handled per row (see [`records_from_rows`]).
pub fn read_price_sheet<P: AsRef<Path>>(path: P, sheet: &str) -> Result<Vec<PriceRecord>> {
    let path = path.as_ref();
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("failed to open workbook: {}", path.display()))?;
    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("failed to read sheet: {sheet}"))?;
    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    Ok(records_from_rows(&rows))
}

/// Map raw sheet rows to records, skipping the header row.
///
/// Harga is best-effort: an unparsable cell becomes 0 with a warning rather
/// than failing the record. Rows too short to address all three columns are
/// dropped with a warning.
pub fn records_from_rows(rows: &[Vec<Data>]) -> Vec<PriceRecord> {
    let mut records = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(1) {
        // 1-based for log readability, matching what a spreadsheet UI shows
        let row_no = idx + 1;
        if row.len() <= COL_HARGA {
            warn!(row = row_no, cells = row.len(), "row too short, skipping");
            continue;
        }
        let harga = cell_price(&row[COL_HARGA]).unwrap_or_else(|| {
            warn!(row = row_no, cell = %cell_text(&row[COL_HARGA]), "unparsable harga, defaulting to 0");
            0
        });
        records.push(PriceRecord {
            tipe: cell_text(&row[COL_TIPE]),
            tahun: cell_text(&row[COL_TAHUN]),
            harga,
        });
    }
    records
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // Years and similar labels come back as floats from xlsx number cells
        Data::Float(f) if f.fract() == 0.0 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::DateTime(_) | Data::Empty | Data::Error(_) => String::new(),
    }
}

fn cell_price(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(i) => Some(*i),
        Data::Float(f) => Some(*f as i64),
        Data::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn header() -> Vec<Data> {
        vec![s("No"), s("Tipe"), s("Tahun"), s("Harga")]
    }

    #[test]
    fn maps_rows_and_skips_header() {
        let rows = vec![
            header(),
            vec![s("1"), s("Scooter"), s("2023"), s("15000000")],
            vec![s("2"), s("Sport 150"), s("2021"), s("27500000")],
        ];
        let records = records_from_rows(&rows);
        assert_eq!(
            records,
            vec![
                PriceRecord {
                    tipe: "Scooter".into(),
                    tahun: "2023".into(),
                    harga: 15_000_000,
                },
                PriceRecord {
                    tipe: "Sport 150".into(),
                    tahun: "2021".into(),
                    harga: 27_500_000,
                },
            ]
        );
    }

    #[test]
    fn unparsable_harga_defaults_to_zero() {
        let rows = vec![
            header(),
            vec![s("1"), s("Scooter"), s("2023"), s("lima belas juta")],
            vec![s("2"), s("Scooter"), s("2022"), Data::Empty],
        ];
        let records = records_from_rows(&rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].harga, 0);
        assert_eq!(records[1].harga, 0);
    }

    #[test]
    fn numeric_cells_accepted_for_tahun_and_harga() {
        let rows = vec![
            header(),
            vec![s("1"), s("Scooter"), Data::Float(2023.0), Data::Float(15_000_000.0)],
        ];
        let records = records_from_rows(&rows);
        assert_eq!(records[0].tahun, "2023");
        assert_eq!(records[0].harga, 15_000_000);
    }

    #[test]
    fn short_rows_are_dropped() {
        let rows = vec![header(), vec![s("1"), s("Scooter")], vec![]];
        assert!(records_from_rows(&rows).is_empty());
    }

    #[test]
    fn cell_text_trims_whitespace() {
        let rows = vec![header(), vec![s("1"), s("  Scooter "), s(" 2023"), s(" 100 ")]];
        let records = records_from_rows(&rows);
        assert_eq!(records[0].tipe, "Scooter");
        assert_eq!(records[0].tahun, "2023");
        assert_eq!(records[0].harga, 100);
    }

    #[test]
    fn workbook_round_trip() {
        use rust_xlsxwriter::Workbook;

        let path = std::env::temp_dir().join(format!("cpi-prices-{}.xlsx", std::process::id()));
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Sheet1").unwrap();
        sheet.write_string(0, 0, "No").unwrap();
        sheet.write_string(0, 1, "Tipe").unwrap();
        sheet.write_string(0, 2, "Tahun").unwrap();
        sheet.write_string(0, 3, "Harga").unwrap();
        sheet.write_number(1, 0, 1).unwrap();
        sheet.write_string(1, 1, "Scooter").unwrap();
        sheet.write_string(1, 2, "2023").unwrap();
        sheet.write_number(1, 3, 15_000_000).unwrap();
        workbook.save(&path).unwrap();

        let records = read_price_sheet(&path, "Sheet1").unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(
            records,
            vec![PriceRecord {
                tipe: "Scooter".into(),
                tahun: "2023".into(),
                harga: 15_000_000,
            }]
        );
    }

    #[test]
    fn missing_sheet_is_an_error() {
        use rust_xlsxwriter::Workbook;

        let path = std::env::temp_dir().join(format!("cpi-nosheet-{}.xlsx", std::process::id()));
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Other").unwrap();
        workbook.save(&path).unwrap();

        let result = read_price_sheet(&path, "Sheet1");
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }
}
