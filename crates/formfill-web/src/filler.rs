// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::driver::{DriverError, ElementRef, FormDriver};
use anyhow::{Context, Result};
use formfill_app::{
    DEFAULT_MAX_LENGTH, FieldMapping, FieldOutcome, FillOutcome, FillPlan, FillReport,
    NoteOutcome, TRUNCATION_PREVIEW_CHARS, Table,
};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use std::time::Duration;
use time::Date;
use time::macros::format_description;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    pub preview: String,
    pub max_length: usize,
}

/// Parse a `maxlength` attribute, falling back to [`DEFAULT_MAX_LENGTH`] when
/// it is absent or not a non-negative integer.
pub fn parse_max_length(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_LENGTH)
}

/// Cut `text` to at most `max_length` characters.
pub fn truncate_to(text: &str, max_length: usize) -> (String, Option<Truncation>) {
    if text.chars().count() <= max_length {
        return (text.to_owned(), None);
    }
    let truncation = Truncation {
        preview: text.chars().take(TRUNCATION_PREVIEW_CHARS).collect(),
        max_length,
    };
    (text.chars().take(max_length).collect(), Some(truncation))
}

/// Type `text` into `element`, honouring its `maxlength`.
pub fn input_text<D: FormDriver>(
    driver: &mut D,
    element: &ElementRef,
    text: &str,
) -> Result<Option<Truncation>, DriverError> {
    let max_length = match driver.attribute(element, "maxlength") {
        Ok(raw) => parse_max_length(raw.as_deref()),
        Err(error) if error.is_session_lost() => return Err(error),
        Err(error) => {
            log::debug!("maxlength unreadable, using default: {error}");
            DEFAULT_MAX_LENGTH
        }
    };
    let (value, truncation) = truncate_to(text, max_length);
    driver.send_keys(element, &value)?;
    Ok(truncation)
}

pub fn note_date(today: Date) -> String {
    today
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| today.to_string())
}

#[derive(Debug, Clone)]
pub struct FormFiller {
    http: HttpClient,
    detach: bool,
}

impl FormFiller {
    /// `detach` leaves the tab open after a completed fill so the user
    /// can review and submit the form.
    pub fn new(timeout: Duration, detach: bool) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, detach })
    }

    pub fn check_reachable(&self, website: &str) -> Result<StatusCode> {
        let response = self.http.get(website).send().with_context(|| {
            format!("cannot reach {website} -- check the website key and your network")
        })?;
        Ok(response.status())
    }

    /// Fill the form at `plan.website` from `row` of `table`. Per-field
    /// problems land in the report; only driver transport failures are
    /// errors.
    pub fn fill<D: FormDriver>(
        &self,
        mut driver: D,
        plan: &FillPlan,
        table: &Table,
        row: usize,
        entry: &str,
        today: Date,
    ) -> Result<FillOutcome> {
        if let Err(error) = plan.validate() {
            quit_quietly(&mut driver);
            return Err(error);
        }

        let status = match self.check_reachable(&plan.website) {
            Ok(status) => status,
            Err(error) => {
                quit_quietly(&mut driver);
                return Err(error);
            }
        };
        if !status.is_success() {
            log::warn!("{} gave a {} error code", plan.website, status.as_u16());
            quit_quietly(&mut driver);
            return Ok(FillOutcome::Unreachable {
                website: plan.website.clone(),
                status: status.as_u16(),
            });
        }

        log::info!("filling {entry:?} (row {row}) at {}", plan.website);
        let mut report = FillReport::new(entry, row, plan.terms.len());
        if let Err(error) = driver.navigate(&plan.website) {
            return halt(driver, report, error);
        }

        for mapping in &plan.terms {
            match fill_field(&mut driver, table, row, mapping) {
                Ok(outcome) => {
                    log_field(&outcome);
                    report.fields.push(outcome);
                }
                Err(error) => return halt(driver, report, error),
            }
        }

        match write_note(&mut driver, plan, today) {
            Ok(note) => {
                if let Some(message) = note.message() {
                    log::info!("{message}");
                }
                report.note = note;
            }
            Err(error) => return halt(driver, report, error),
        }

        if !self.detach {
            quit_quietly(&mut driver);
        }
        let outcome = FillOutcome::Completed(report);
        log::info!("{}", outcome.summary());
        Ok(outcome)
    }
}

fn fill_field<D: FormDriver>(
    driver: &mut D,
    table: &Table,
    row: usize,
    mapping: &FieldMapping,
) -> Result<FieldOutcome, DriverError> {
    let field_id = mapping.field_id.clone();
    let element = match driver.find_by_id(&mapping.field_id) {
        Ok(element) => element,
        Err(error) if error.is_session_lost() => return Err(error),
        Err(error) => {
            log::debug!("lookup of {field_id:?} failed: {error}");
            return Ok(FieldOutcome::FieldNotFound { field_id });
        }
    };

    let Some(text) = table.cell(row, &mapping.column) else {
        return Ok(FieldOutcome::ColumnNotFound {
            field_id,
            column: mapping.column.clone(),
        });
    };

    match input_text(driver, &element, text) {
        Ok(None) => Ok(FieldOutcome::Filled {
            field_id,
            column: mapping.column.clone(),
            chars: text.chars().count(),
        }),
        Ok(Some(truncation)) => Ok(FieldOutcome::Truncated {
            field_id,
            column: mapping.column.clone(),
            preview: truncation.preview,
            max_length: truncation.max_length,
        }),
        Err(error) if error.is_session_lost() => Err(error),
        Err(error) => Ok(FieldOutcome::WriteFailed {
            field_id,
            reason: error.to_string(),
        }),
    }
}

fn write_note<D: FormDriver>(
    driver: &mut D,
    plan: &FillPlan,
    today: Date,
) -> Result<NoteOutcome, DriverError> {
    let Some(field_id) = plan.last_form.clone() else {
        return Ok(NoteOutcome::NotConfigured);
    };
    let element = match driver.find_by_id(&field_id) {
        Ok(element) => element,
        Err(error) if error.is_session_lost() => return Err(error),
        Err(_) => return Ok(NoteOutcome::FieldNotFound { field_id }),
    };

    let written = driver
        .send_keys(&element, &format!("{}\n", note_date(today)))
        .and_then(|()| match plan.user.as_deref() {
            Some(user) => input_text(driver, &element, &format!("{user}\n")).map(|_| ()),
            None => Ok(()),
        });
    match written {
        Ok(()) => Ok(NoteOutcome::Written {
            field_id,
            with_user: plan.user.is_some(),
        }),
        Err(error) if error.is_session_lost() => Err(error),
        Err(error) => Ok(NoteOutcome::WriteFailed {
            field_id,
            reason: error.to_string(),
        }),
    }
}

/// Stop filling. A closed window keeps the partial report; anything else
/// aborts the fill.
fn halt<D: FormDriver>(
    mut driver: D,
    report: FillReport,
    error: DriverError,
) -> Result<FillOutcome> {
    quit_quietly(&mut driver);
    match error {
        DriverError::SessionClosed(reason) => {
            log::warn!("browser window was closed: {reason}");
            Ok(FillOutcome::BrowserClosed(report))
        }
        other => Err(other).context("drive browser"),
    }
}

fn quit_quietly<D: FormDriver>(driver: &mut D) {
    if let Err(error) = driver.quit() {
        log::debug!("quit session: {error}");
    }
}

fn log_field(outcome: &FieldOutcome) {
    match outcome {
        FieldOutcome::Filled { .. } => log::info!("{}", outcome.message()),
        _ => log::warn!("{}", outcome.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::{FormFiller, input_text, note_date, parse_max_length, truncate_to};
    use crate::driver::{DriverError, ElementRef, FormDriver};
    use formfill_app::{
        DEFAULT_MAX_LENGTH, FieldMapping, FieldOutcome, FillOutcome, NoteOutcome, Table,
    };
    use formfill_testkit::{company_plan, rows_from, serve_status};
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;
    use std::time::Duration;
    use time::macros::date;

    #[derive(Debug, Default)]
    struct Recorded {
        navigated: Vec<String>,
        writes: Vec<(String, String)>,
        quit: bool,
    }

    /// In-memory page: field id to optional `maxlength` attribute.
    #[derive(Debug, Clone, Default)]
    struct FakeDriver {
        fields: HashMap<String, Option<String>>,
        /// Window closes once this many writes have happened.
        close_after: Option<usize>,
        /// Field ids whose writes are rejected by the page.
        rejects: HashSet<String>,
        log: Rc<RefCell<Recorded>>,
    }

    impl FakeDriver {
        fn with_fields(fields: &[(&str, Option<&str>)]) -> Self {
            Self {
                fields: fields
                    .iter()
                    .map(|(id, max)| ((*id).to_owned(), max.map(str::to_owned)))
                    .collect(),
                ..Self::default()
            }
        }

        fn closed(&self) -> bool {
            self.close_after
                .is_some_and(|limit| self.log.borrow().writes.len() >= limit)
        }
    }

    impl FormDriver for FakeDriver {
        fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
            self.log.borrow_mut().navigated.push(url.to_owned());
            Ok(())
        }

        fn find_by_id(&mut self, field_id: &str) -> Result<ElementRef, DriverError> {
            if self.closed() {
                return Err(DriverError::SessionClosed("no such window".to_owned()));
            }
            if self.fields.contains_key(field_id) {
                Ok(ElementRef::new(field_id))
            } else {
                Err(DriverError::NoSuchElement(field_id.to_owned()))
            }
        }

        fn attribute(
            &mut self,
            element: &ElementRef,
            name: &str,
        ) -> Result<Option<String>, DriverError> {
            assert_eq!(name, "maxlength");
            Ok(self.fields.get(element.id()).cloned().flatten())
        }

        fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
            if self.rejects.contains(element.id()) {
                return Err(DriverError::Protocol("element is not editable".to_owned()));
            }
            self.log
                .borrow_mut()
                .writes
                .push((element.id().to_owned(), text.to_owned()));
            Ok(())
        }

        fn quit(&mut self) -> Result<(), DriverError> {
            self.log.borrow_mut().quit = true;
            Ok(())
        }
    }

    fn acme_table() -> Table {
        Table::new(
            ["Company", "Contact", "Phone", "Email", "City"]
                .map(str::to_owned)
                .to_vec(),
            rows_from(&[&[
                "Acme Anvils",
                "Wile E",
                "555-0100",
                "wile@acme.example",
                "Tucson",
            ]]),
        )
    }

    fn filler(detach: bool) -> FormFiller {
        FormFiller::new(Duration::from_secs(2), detach).expect("filler should initialize")
    }

    #[test]
    fn max_length_defaults_when_absent_or_unparsable() {
        assert_eq!(parse_max_length(None), DEFAULT_MAX_LENGTH);
        assert_eq!(parse_max_length(Some("abc")), DEFAULT_MAX_LENGTH);
        assert_eq!(parse_max_length(Some("-1")), DEFAULT_MAX_LENGTH);
        assert_eq!(parse_max_length(Some(" 8 ")), 8);
    }

    #[test]
    fn truncate_counts_characters_and_previews_twenty() {
        let (value, truncation) = truncate_to("abcdefghijklmnopqrstuvwxyz", 5);
        assert_eq!(value, "abcde");
        let truncation = truncation.expect("text should be truncated");
        assert_eq!(truncation.preview, "abcdefghijklmnopqrst");
        assert_eq!(truncation.max_length, 5);

        let (value, truncation) = truncate_to("héllo", 5);
        assert_eq!(value, "héllo");
        assert!(truncation.is_none());
    }

    #[test]
    fn input_text_honours_maxlength_attribute() {
        let mut driver = FakeDriver::with_fields(&[("zip", Some("5"))]);
        let element = ElementRef::new("zip");
        let truncation =
            input_text(&mut driver, &element, "85701-1234").expect("write should succeed");
        assert!(truncation.is_some());
        assert_eq!(
            driver.log.borrow().writes,
            vec![("zip".to_owned(), "85701".to_owned())]
        );
    }

    #[test]
    fn note_date_is_iso() {
        assert_eq!(note_date(date!(2026 - 03 - 07)), "2026-03-07");
    }

    #[test]
    fn not_found_status_stops_before_any_write() {
        let (website, server) = serve_status(404, 1).expect("mock site");
        let driver = FakeDriver::with_fields(&[("company_name", None)]);
        let log = Rc::clone(&driver.log);

        let outcome = filler(true)
            .fill(
                driver,
                &company_plan(&website),
                &acme_table(),
                0,
                "Acme Anvils",
                date!(2026 - 03 - 07),
            )
            .expect("fill should report, not fail");

        assert_eq!(
            outcome,
            FillOutcome::Unreachable {
                website,
                status: 404,
            }
        );
        let log = log.borrow();
        assert!(log.navigated.is_empty());
        assert!(log.writes.is_empty());
        assert!(log.quit);
        server.join().expect("server thread should join");
    }

    #[test]
    fn fills_every_field_then_notes_date_and_user() {
        let (website, server) = serve_status(200, 1).expect("mock site");
        let driver = FakeDriver::with_fields(&[
            ("company_name", None),
            ("contact", None),
            ("phone", Some("3")),
            ("email", None),
            ("city", None),
            ("notes", None),
        ]);
        let log = Rc::clone(&driver.log);

        let outcome = filler(true)
            .fill(
                driver,
                &company_plan(&website),
                &acme_table(),
                0,
                "Acme Anvils",
                date!(2026 - 03 - 07),
            )
            .expect("fill should succeed");

        let FillOutcome::Completed(report) = &outcome else {
            panic!("expected completed fill, got {outcome:?}");
        };
        assert_eq!(report.written_count(), 5);
        assert_eq!(report.truncated_count(), 1);
        assert!(matches!(
            &report.fields[2],
            FieldOutcome::Truncated { preview, max_length: 3, .. } if preview == "555-0100"
        ));
        assert_eq!(
            report.note,
            NoteOutcome::Written {
                field_id: "notes".to_owned(),
                with_user: true,
            }
        );

        let log = log.borrow();
        assert_eq!(log.navigated, vec![website]);
        assert_eq!(log.writes[2], ("phone".to_owned(), "555".to_owned()));
        assert_eq!(
            log.writes[5..],
            [
                ("notes".to_owned(), "2026-03-07\n".to_owned()),
                ("notes".to_owned(), "gc\n".to_owned()),
            ]
        );
        assert!(!log.quit, "detached sessions stay open");
        server.join().expect("server thread should join");
    }

    #[test]
    fn missing_field_and_column_are_skipped() {
        let (website, server) = serve_status(200, 1).expect("mock site");
        let driver =
            FakeDriver::with_fields(&[("company_name", None), ("fax", None), ("city", None)]);
        let log = Rc::clone(&driver.log);
        let mut plan = company_plan(&website);
        plan.terms = vec![
            FieldMapping::new("missing_id", "Company"),
            FieldMapping::new("fax", "Fax"),
            FieldMapping::new("city", "City"),
        ];
        plan.last_form = None;

        let outcome = filler(false)
            .fill(driver, &plan, &acme_table(), 0, "Acme Anvils", date!(2026 - 03 - 07))
            .expect("fill should succeed");

        let report = outcome.report().expect("completed fill has a report");
        assert_eq!(
            report.fields,
            vec![
                FieldOutcome::FieldNotFound {
                    field_id: "missing_id".to_owned(),
                },
                FieldOutcome::ColumnNotFound {
                    field_id: "fax".to_owned(),
                    column: "Fax".to_owned(),
                },
                FieldOutcome::Filled {
                    field_id: "city".to_owned(),
                    column: "City".to_owned(),
                    chars: 6,
                },
            ]
        );
        assert_eq!(report.note, NoteOutcome::NotConfigured);
        let log = log.borrow();
        assert_eq!(log.writes, vec![("city".to_owned(), "Tucson".to_owned())]);
        assert!(log.quit, "attached sessions are closed after filling");
        server.join().expect("server thread should join");
    }

    #[test]
    fn closed_window_returns_partial_report() {
        let (website, server) = serve_status(200, 1).expect("mock site");
        let mut driver = FakeDriver::with_fields(&[
            ("company_name", None),
            ("contact", None),
            ("phone", None),
            ("email", None),
            ("city", None),
        ]);
        driver.close_after = Some(2);
        let log = Rc::clone(&driver.log);

        let outcome = filler(true)
            .fill(
                driver,
                &company_plan(&website),
                &acme_table(),
                0,
                "Acme Anvils",
                date!(2026 - 03 - 07),
            )
            .expect("closed window is reported, not an error");

        let FillOutcome::BrowserClosed(report) = &outcome else {
            panic!("expected browser closed, got {outcome:?}");
        };
        assert_eq!(report.fields.len(), 2);
        assert_eq!(
            outcome.summary(),
            "browser window was closed after 2 of 5 fields"
        );
        assert!(log.borrow().quit);
        server.join().expect("server thread should join");
    }

    #[test]
    fn rejected_write_is_reported_and_later_fields_still_fill() {
        let (website, server) = serve_status(200, 1).expect("mock site");
        let mut driver = FakeDriver::with_fields(&[
            ("company_name", None),
            ("contact", None),
            ("phone", None),
            ("email", None),
            ("city", None),
            ("notes", None),
        ]);
        driver.rejects.insert("contact".to_owned());
        let log = Rc::clone(&driver.log);

        let outcome = filler(true)
            .fill(
                driver,
                &company_plan(&website),
                &acme_table(),
                0,
                "Acme Anvils",
                date!(2026 - 03 - 07),
            )
            .expect("rejected writes are reported, not errors");

        let FillOutcome::Completed(report) = &outcome else {
            panic!("expected completed fill, got {outcome:?}");
        };
        assert_eq!(
            report.fields[1],
            FieldOutcome::WriteFailed {
                field_id: "contact".to_owned(),
                reason: "browser protocol error: element is not editable".to_owned(),
            }
        );
        assert_eq!(report.written_count(), 4);
        assert!(matches!(report.note, NoteOutcome::Written { .. }));
        let written: Vec<String> = log
            .borrow()
            .writes
            .iter()
            .map(|(id, _)| id.clone())
            .collect();
        assert_eq!(written, ["company_name", "phone", "email", "city", "notes", "notes"]);
        server.join().expect("server thread should join");
    }

    #[test]
    fn note_field_missing_from_page_is_reported() {
        let (website, server) = serve_status(200, 1).expect("mock site");
        let driver = FakeDriver::with_fields(&[("company_name", None), ("city", None)]);
        let log = Rc::clone(&driver.log);
        let mut plan = company_plan(&website);
        plan.terms = vec![
            FieldMapping::new("company_name", "Company"),
            FieldMapping::new("city", "City"),
        ];

        let outcome = filler(true)
            .fill(driver, &plan, &acme_table(), 0, "Acme Anvils", date!(2026 - 03 - 07))
            .expect("fill should succeed");

        let report = outcome.report().expect("completed fill has a report");
        assert_eq!(report.written_count(), 2);
        assert_eq!(
            report.note,
            NoteOutcome::FieldNotFound {
                field_id: "notes".to_owned(),
            }
        );
        assert_eq!(
            outcome.lines().last().map(String::as_str),
            Some("id: notes not found in webpage")
        );
        assert!(log.borrow().writes.iter().all(|(id, _)| id != "notes"));
        server.join().expect("server thread should join");
    }

    #[test]
    fn rejected_note_write_keeps_the_field_report() {
        let (website, server) = serve_status(200, 1).expect("mock site");
        let mut driver = FakeDriver::with_fields(&[("company_name", None), ("notes", None)]);
        driver.rejects.insert("notes".to_owned());
        let mut plan = company_plan(&website);
        plan.terms = vec![FieldMapping::new("company_name", "Company")];

        let outcome = filler(true)
            .fill(driver, &plan, &acme_table(), 0, "Acme Anvils", date!(2026 - 03 - 07))
            .expect("fill should succeed");

        let report = outcome.report().expect("completed fill has a report");
        assert_eq!(report.written_count(), 1);
        assert_eq!(
            report.note,
            NoteOutcome::WriteFailed {
                field_id: "notes".to_owned(),
                reason: "browser protocol error: element is not editable".to_owned(),
            }
        );
        server.join().expect("server thread should join");
    }

    #[test]
    fn invalid_plan_is_rejected_and_session_closed() {
        let driver = FakeDriver::default();
        let log = Rc::clone(&driver.log);
        let mut plan = company_plan("http://127.0.0.1:1/form");
        plan.terms.clear();

        let error = filler(true)
            .fill(driver, &plan, &acme_table(), 0, "Acme Anvils", date!(2026 - 03 - 07))
            .expect_err("empty terms should fail");
        assert!(error.to_string().contains("terms"));
        assert!(log.borrow().quit);
    }
}
