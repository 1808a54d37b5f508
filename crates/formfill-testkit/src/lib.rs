// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use formfill_app::{FieldMapping, FillPlan, Table};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Response, Server};

pub const COMPANY_HEADERS: [&str; 6] = [
    "Company",
    "Contact",
    "Phone",
    "Email",
    "City",
    "Employees",
];

const COMPANY_ADJECTIVES: [&str; 12] = [
    "Premier",
    "Central",
    "Reliable",
    "Bright",
    "Quality",
    "Summit",
    "Eagle",
    "Heritage",
    "Greenleaf",
    "Sparks",
    "Hartley",
    "Apex",
];

const COMPANY_TRADES: [&str; 10] = [
    "Plumbing",
    "Electric",
    "Logistics",
    "Roofing",
    "Software",
    "Printing",
    "Catering",
    "Freight",
    "Dental",
    "Textiles",
];

const COMPANY_SUFFIXES: [&str; 6] = ["Services", "Solutions", "Co", "Pros", "Works", "Group"];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];

const CITIES: [&str; 14] = [
    "Austin",
    "Seattle",
    "Denver",
    "Madison",
    "Raleigh",
    "Portland",
    "Boise",
    "Tucson",
    "Omaha",
    "Richmond",
    "Albany",
    "Fresno",
    "Tulsa",
    "Spokane",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for company contact rows shaped like [`COMPANY_HEADERS`].
#[derive(Debug, Clone)]
pub struct CompanyFaker {
    rng: DeterministicRng,
}

impl CompanyFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    fn pick<'a>(&mut self, values: &'a [&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }

    pub fn company_name(&mut self) -> String {
        format!(
            "{} {} {}",
            self.pick(&COMPANY_ADJECTIVES),
            self.pick(&COMPANY_TRADES),
            self.pick(&COMPANY_SUFFIXES)
        )
    }

    pub fn row(&mut self) -> Vec<String> {
        let company = self.company_name();
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = company
            .split_whitespace()
            .next()
            .unwrap_or("example")
            .to_ascii_lowercase();
        vec![
            company,
            format!("{first} {last}"),
            format!("555-{:04}", self.rng.int_n(10_000)),
            format!(
                "{}.{}@{domain}.example",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase()
            ),
            self.pick(&CITIES).to_owned(),
            (5 + self.rng.int_n(995)).to_string(),
        ]
    }

    /// `count` rows with unique company names.
    pub fn rows(&mut self, count: usize) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(count);
        while rows.len() < count {
            let row = self.row();
            if rows.iter().any(|existing| existing[0] == row[0]) {
                continue;
            }
            rows.push(row);
        }
        rows
    }
}

pub fn company_headers() -> Vec<String> {
    COMPANY_HEADERS.iter().map(|header| (*header).to_owned()).collect()
}

pub fn company_table(seed: u64, count: usize) -> Table {
    Table::new(company_headers(), CompanyFaker::new(seed).rows(count))
}

/// Plan that maps form ids to every company column except `Employees`.
pub fn company_plan(website: &str) -> FillPlan {
    FillPlan {
        website: website.to_owned(),
        terms: vec![
            FieldMapping::new("company_name", "Company"),
            FieldMapping::new("contact", "Contact"),
            FieldMapping::new("phone", "Phone"),
            FieldMapping::new("email", "Email"),
            FieldMapping::new("city", "City"),
        ],
        last_form: Some("notes".to_owned()),
        user: Some("gc".to_owned()),
    }
}

pub fn rows_from(values: &[&[&str]]) -> Vec<Vec<String>> {
    values
        .iter()
        .map(|row| row.iter().map(|cell| (*cell).to_owned()).collect())
        .collect()
}

/// Write one worksheet with a header row. Cells that parse as numbers are
/// stored as numbers so readers see spreadsheet-typed values.
pub fn write_xlsx(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *header)
            .context("write header cell")?;
    }
    for (row_index, row) in rows.iter().enumerate() {
        let row_number = (row_index + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let written = match value.parse::<f64>() {
                Ok(number) => sheet.write_number(row_number, col as u16, number),
                Err(_) => sheet.write_string(row_number, col as u16, value.as_str()),
            };
            written.with_context(|| format!("write cell ({row_number}, {col})"))?;
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;
    Ok(())
}

pub fn write_csv(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("create csv {}", path.display()))?;
    writer.write_record(headers).context("write csv header")?;
    for row in rows {
        writer.write_record(row).context("write csv row")?;
    }
    writer.flush().context("flush csv")?;
    Ok(())
}

pub fn temp_workbook(
    file_name: &str,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join(file_name);
    if file_name.ends_with(".csv") {
        write_csv(&path, headers, rows)?;
    } else {
        write_xlsx(&path, headers, rows)?;
    }
    Ok((dir, path))
}

/// Mock web form answering the next `requests` requests with `status`.
/// Returns the form URL and the server thread.
pub fn serve_status(status: u16, requests: usize) -> Result<(String, JoinHandle<()>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock site: {error}"))?;
    let url = format!("http://{}/form", server.server_addr());
    let handle = thread::spawn(move || {
        for _ in 0..requests {
            let Ok(request) = server.recv() else {
                return;
            };
            let mut response = Response::from_string(
                r#"<html><body><form><input id="company_name"></form></body></html>"#,
            )
            .with_status_code(status);
            if let Ok(header) = Header::from_bytes("Content-Type", "text/html") {
                response = response.with_header(header);
            }
            let _ = request.respond(response);
        }
    });
    Ok((url, handle))
}
