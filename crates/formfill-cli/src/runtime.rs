// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use formfill_app::{FillOutcome, FillPlan, Table};
use formfill_web::{BrowserOptions, ChromeSession, FormFiller};
use time::{Date, OffsetDateTime};

pub struct FillRuntime {
    table: Table,
    plan: FillPlan,
    filler: FormFiller,
    options: BrowserOptions,
    browser: Option<ChromeSession>,
}

impl FillRuntime {
    pub fn new(table: Table, plan: FillPlan, filler: FormFiller, options: BrowserOptions) -> Self {
        Self {
            table,
            plan,
            filler,
            options,
            browser: None,
        }
    }

    /// True once a browser has been launched and is still running.
    pub fn has_browser(&self) -> bool {
        self.browser.as_ref().is_some_and(ChromeSession::is_open)
    }

    /// Launch on first use, and again after the user closed the browser.
    fn ensure_browser(&mut self) -> Result<()> {
        if !self.has_browser() {
            self.browser = None;
            self.browser = Some(ChromeSession::launch(&self.options)?);
        }
        Ok(())
    }
}

impl formfill_tui::AppRuntime for FillRuntime {
    fn fill_entry(&mut self, entry: &str) -> Result<FillOutcome> {
        let Some(row) = formfill_sheet::find_row(&self.table, entry) else {
            log::warn!("no row contains {entry:?}");
            return Ok(FillOutcome::RowNotFound {
                entry: entry.to_owned(),
            });
        };

        self.plan.validate()?;
        self.ensure_browser()?;
        let browser = self.browser.as_ref().context("browser is not running")?;
        let page = match browser.open_page() {
            Ok(page) => page,
            Err(error) => {
                if error.is_session_lost() {
                    self.browser = None;
                }
                return Err(error).context("open browser tab");
            }
        };
        self.filler.fill(page, &self.plan, &self.table, row, entry, today())
    }
}

fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}
