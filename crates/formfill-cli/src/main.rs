// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use formfill_app::{AppState, filter_entries};
use formfill_tui::AppRuntime;
use formfill_web::FormFiller;
use runtime::FillRuntime;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

fn main() {
    if let Err(error) = run() {
        log::error!("{error:#}");
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path())?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path)?.ok_or_else(|| {
        anyhow!(
            "no config found at {} -- write one with `form-filler --print-example-config`",
            options.config_path.display()
        )
    })?;
    let log_path = init_logging(&config)?;
    log::info!(
        "form-filler starting with {} (log {})",
        config.path().display(),
        log_path.display()
    );

    let list_term = config.require("list_term")?;
    let sheet_path = config.spreadsheet_path()?;
    let table = formfill_sheet::load_table(&sheet_path).with_context(|| {
        format!("load spreadsheet named by form_name in {}", config.path().display())
    })?;
    let entries = formfill_sheet::column_values(&table, list_term).ok_or_else(|| {
        anyhow!(
            "header: {list_term} not found in {} -- set list_term to one of: {}",
            sheet_path.display(),
            table.headers().join(", ")
        )
    })?;

    if options.list {
        for entry in filter_entries(&entries, "") {
            println!("{entry}");
        }
        return Ok(());
    }

    let plan = config.fill_plan();
    let browser_options = config.browser_options()?;
    let filler = FormFiller::new(browser_options.timeout, config.detach())?;

    if options.check_only {
        return check(&plan, &table, &entries, &sheet_path);
    }

    let mut runtime = FillRuntime::new(table, plan, filler, browser_options);

    if let Some(entry) = options.fill_entry {
        let outcome = runtime.fill_entry(&entry)?;
        for line in outcome.lines() {
            println!("{line}");
        }
        // the browser exits with us
        if config.detach() && runtime.has_browser() {
            println!("press Enter to close the browser");
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("read from stdin")?;
        }
        return Ok(());
    }

    let mut state = AppState::new(entries);
    formfill_tui::run_app(&mut state, &mut runtime, list_term)
}

fn check(
    plan: &formfill_app::FillPlan,
    table: &formfill_app::Table,
    entries: &[String],
    sheet_path: &Path,
) -> Result<()> {
    plan.validate()?;
    let missing = formfill_sheet::missing_columns(table, plan.columns());
    if !missing.is_empty() {
        bail!(
            "columns missing from {}: {} -- fix terms or the spreadsheet header",
            sheet_path.display(),
            missing.join(", ")
        );
    }
    println!(
        "ok: {} entries, {} terms, {}",
        entries.len(),
        plan.terms.len(),
        plan.website
    );
    Ok(())
}

/// Route `log` output to a file so it never lands on the terminal UI.
fn init_logging(config: &Config) -> Result<PathBuf> {
    let path = config.log_file()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {} -- set [log].file", path.display()))?;

    env_logger::Builder::new()
        .filter_level(config.log_level()?)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .try_init()
        .context("initialize logger")?;
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    list: bool,
    fill_entry: Option<String>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        list: false,
        fill_entry: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--list" => {
                options.list = true;
            }
            "--fill" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--fill requires a pick-list entry"))?;
                options.fill_entry = Some(value.as_ref().to_owned());
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("form-filler: fill a web form from a spreadsheet row");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config, spreadsheet, and terms");
    println!("  --list                   Print the pick-list and exit");
    println!("  --fill <entry>           Fill the form for one entry without the UI");
    println!("  --help                   Show this help");
}
