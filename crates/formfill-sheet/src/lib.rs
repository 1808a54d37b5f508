// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, open_workbook_auto};
use formfill_app::Table;
use std::path::Path;
use time::macros::format_description;
use time::{Date, Duration, Month, PrimitiveDateTime, Time};

pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["xlsx", "xlsm", "xlsb", "xls", "ods", "csv"];

/// Read the first worksheet (or a CSV file) into a [`Table`], using the first
/// row as headers.
pub fn load_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        bail!("unable to read {}: file does not exist", path.display());
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "unable to read {}: unsupported extension {:?}; use one of {}",
            path.display(),
            extension,
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }

    let table = if extension == "csv" {
        read_csv(path)?
    } else {
        read_workbook(path)?
    };
    log::info!(
        "loaded {} rows x {} columns from {}",
        table.row_count(),
        table.column_count(),
        path.display()
    );
    Ok(table)
}

fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("unable to read {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("unable to read {}: workbook has no sheets", path.display()))?
        .with_context(|| format!("read first sheet of {}", path.display()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    let rows = rows
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();
    Ok(Table::new(headers, rows))
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("unable to read {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read header row of {}", path.display()))?
        .iter()
        .map(str::to_owned)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("read row {} of {}", index + 2, path.display()))?;
        let row: Vec<String> = record.iter().map(str::to_owned).collect();
        if row.iter().any(|cell| !cell.is_empty()) {
            rows.push(row);
        }
    }
    Ok(Table::new(headers, rows))
}

/// Display string for a spreadsheet cell. Integral numbers drop the fraction
/// and date serials render as ISO dates.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
            value.clone()
        }
        Data::Int(value) => value.to_string(),
        Data::Float(value) => format_number(*value),
        Data::Bool(value) => String::from(if *value { "TRUE" } else { "FALSE" }),
        Data::DateTime(value) => format_serial_date(value.as_f64()),
        Data::Error(error) => format!("#{error:?}"),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn format_serial_date(serial: f64) -> String {
    // 1900 date system; the epoch absorbs Excel's phantom 1900-02-29.
    let Ok(epoch) = Date::from_calendar_date(1899, Month::December, 30) else {
        return format_number(serial);
    };
    // well past 9999-12-31, the last representable date
    if !serial.is_finite() || serial.abs() > 3_000_000.0 {
        return format_number(serial);
    }
    let days = serial.floor() as i64;
    let seconds = (((serial - serial.floor()) * 86_400.0).round() as i64).min(86_399);
    let Some(moment) = epoch
        .checked_add(Duration::days(days))
        .map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT))
        .and_then(|start| start.checked_add(Duration::seconds(seconds)))
    else {
        return format_number(serial);
    };
    let formatted = if seconds == 0 {
        moment.format(&format_description!("[year]-[month]-[day]"))
    } else {
        moment.format(&format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
    };
    formatted.unwrap_or_else(|_| format_number(serial))
}

/// Index of the first row, top to bottom, with a cell equal to `needle`.
pub fn find_row(table: &Table, needle: &str) -> Option<usize> {
    table
        .rows()
        .iter()
        .position(|row| row.iter().any(|cell| cell == needle))
}

/// Non-blank values of the column named `list_term`, in sheet order.
pub fn column_values(table: &Table, list_term: &str) -> Option<Vec<String>> {
    let index = table.column_index(list_term)?;
    Some(
        table
            .rows()
            .iter()
            .filter_map(|row| row.get(index))
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .collect(),
    )
}

/// Columns from `wanted` that the table has no header for.
pub fn missing_columns<'a>(
    table: &Table,
    wanted: impl IntoIterator<Item = &'a str>,
) -> Vec<&'a str> {
    wanted
        .into_iter()
        .filter(|column| table.column_index(column).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        cell_text, column_values, find_row, format_number, format_serial_date, missing_columns,
    };
    use calamine::Data;
    use formfill_app::Table;

    fn two_column_table() -> Table {
        Table::new(
            vec!["column1".to_owned(), "column2".to_owned()],
            vec![
                vec!["value1".to_owned(), "value4".to_owned()],
                vec!["value2".to_owned(), "value5".to_owned()],
                vec!["value3".to_owned(), "value6".to_owned()],
            ],
        )
    }

    #[test]
    fn find_row_scans_every_column() {
        let table = two_column_table();
        assert_eq!(find_row(&table, "value1"), Some(0));
        assert_eq!(find_row(&table, "value5"), Some(1));
        assert_eq!(find_row(&table, "value6"), Some(2));
    }

    #[test]
    fn find_row_returns_none_for_missing_value() {
        assert_eq!(find_row(&two_column_table(), "missing_value"), None);
    }

    #[test]
    fn find_row_requires_whole_cell_match() {
        assert_eq!(find_row(&two_column_table(), "value"), None);
    }

    #[test]
    fn find_row_prefers_first_match() {
        let table = Table::new(
            vec!["name".to_owned()],
            vec![vec!["dup".to_owned()], vec!["dup".to_owned()]],
        );
        assert_eq!(find_row(&table, "dup"), Some(0));
    }

    #[test]
    fn column_values_reads_named_column() {
        let table = two_column_table();
        assert_eq!(
            column_values(&table, "column1"),
            Some(vec![
                "value1".to_owned(),
                "value2".to_owned(),
                "value3".to_owned()
            ])
        );
        assert_eq!(column_values(&table, "missing_column"), None);
    }

    #[test]
    fn column_values_skips_blank_cells() {
        let table = Table::new(
            vec!["name".to_owned()],
            vec![vec!["Acme".to_owned()], vec!["  ".to_owned()], Vec::new()],
        );
        assert_eq!(column_values(&table, "name"), Some(vec!["Acme".to_owned()]));
    }

    #[test]
    fn missing_columns_lists_unknown_headers() {
        let table = two_column_table();
        assert_eq!(
            missing_columns(&table, ["column1", "Phone", "column2", "Fax"]),
            vec!["Phone", "Fax"]
        );
    }

    #[test]
    fn cell_text_formats_numbers_like_a_spreadsheet() {
        assert_eq!(cell_text(&Data::Float(42.0)), "42");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(-7)), "-7");
        assert_eq!(cell_text(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Acme".to_owned())), "Acme");
    }

    #[test]
    fn serial_dates_render_as_iso() {
        assert_eq!(format_serial_date(45_658.0), "2025-01-01");
        assert_eq!(format_serial_date(45_658.5), "2025-01-01 12:00:00");
    }

    #[test]
    fn serial_dates_at_the_calendar_edge_do_not_overflow() {
        assert_eq!(format_serial_date(2_958_465.0), "9999-12-31");
        assert_eq!(format_serial_date(2_958_465.999_999_9), "9999-12-31 23:59:59");
        assert_eq!(format_serial_date(2_958_466.5), "2958466.5");
        assert_eq!(format_serial_date(1e12), format_number(1e12));
        assert_eq!(format_serial_date(f64::NAN), format_number(f64::NAN));
    }
}
