// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use formfill_app::{FieldMapping, FillPlan};
use formfill_web::BrowserOptions;
use log::LevelFilter;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "FORMFILL_CONFIG_PATH";
const EXAMPLE_WEBSITE: &str = "https://forms.example/new-contact";
const DEFAULT_BROWSER_TIMEOUT: &str = "30s";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_FILE_NAME: &str = "form-filler.log";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub website: Option<String>,
    pub list_term: Option<String>,
    pub form_name: Option<String>,
    /// One-entry tables mapping a form field id to a column name.
    pub terms: Option<Vec<BTreeMap<String, String>>>,
    pub last_form: Option<String>,
    pub user: Option<String>,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub log: Log,
    #[serde(skip)]
    path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserSettings {
    pub executable: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub headless: Option<bool>,
    pub timeout: Option<String>,
    pub detach: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub file: Option<String>,
    pub level: Option<String>,
}

impl Config {
    /// `$FORMFILL_CONFIG_PATH`, else `config.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("config.toml"),
        }
    }

    /// `Ok(None)` when the file is missing or blank.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            log::warn!("config file {} does not exist", path.display());
            return Ok(None);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        if raw.trim().is_empty() {
            log::warn!("config file {} is empty", path.display());
            return Ok(None);
        }

        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;
        config.path = path.to_path_buf();
        config.validate()?;
        Ok(Some(config))
    }

    fn validate(&self) -> Result<()> {
        let path = self.path.display();

        if let Some(terms) = &self.terms {
            for (index, term) in terms.iter().enumerate() {
                if term.is_empty() {
                    let hint = "{ field_id = \"Column\" }";
                    bail!("terms[{index}] in {path} is empty -- write it as {hint}");
                }
            }
        }

        if let Some(website) = &self.website
            && !website.trim().is_empty()
        {
            url::Url::parse(website.trim())
                .with_context(|| format!("website {website:?} in {path} is not a valid URL"))?;
        }

        if let Some(timeout) = &self.browser.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!("browser.timeout in {path} must be positive, got {timeout}");
            }
        }

        if let Some(executable) = &self.browser.executable
            && executable.trim().is_empty()
        {
            bail!("browser.executable in {path} is blank -- remove it to auto-detect Chrome");
        }

        if let Some(level) = &self.log.level {
            parse_level(level).with_context(|| format!("log.level in {path}"))?;
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A top-level string setting, or `None` with a warning when it is
    /// absent or blank.
    pub fn value(&self, key: &str) -> Option<&str> {
        let value = match key {
            "website" => self.website.as_deref(),
            "list_term" => self.list_term.as_deref(),
            "form_name" => self.form_name.as_deref(),
            "last_form" => self.last_form.as_deref(),
            "user" => self.user.as_deref(),
            _ => None,
        }
        .filter(|value| !value.trim().is_empty());

        if value.is_none() {
            log::warn!("no {key} set in {}", self.path.display());
        }
        value
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.value(key).ok_or_else(|| {
            anyhow!(
                "no {key} set in {} -- add `{key} = \"...\"`",
                self.path.display()
            )
        })
    }

    /// The spreadsheet named by `form_name`, relative to the config file.
    pub fn spreadsheet_path(&self) -> Result<PathBuf> {
        let name = PathBuf::from(self.require("form_name")?);
        if name.is_absolute() {
            return Ok(name);
        }
        let base = self.path.parent().unwrap_or_else(|| Path::new(""));
        Ok(base.join(name))
    }

    /// Terms flattened in order; multi-key tables contribute their keys
    /// sorted.
    pub fn terms(&self) -> Vec<FieldMapping> {
        self.terms
            .iter()
            .flatten()
            .flat_map(|term| {
                term.iter()
                    .map(|(field_id, column)| FieldMapping::new(field_id.as_str(), column.as_str()))
            })
            .collect()
    }

    /// The fill plan as configured. Not validated here so the pick-list can
    /// still open with an incomplete config.
    pub fn fill_plan(&self) -> FillPlan {
        FillPlan {
            website: self.value("website").unwrap_or_default().trim().to_owned(),
            terms: self.terms(),
            last_form: self.last_form.clone().filter(|id| !id.trim().is_empty()),
            user: self.user.clone().filter(|user| !user.trim().is_empty()),
        }
    }

    pub fn browser_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.browser
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_BROWSER_TIMEOUT),
        )
    }

    /// Leave each filled tab open for review. On by default.
    pub fn detach(&self) -> bool {
        self.browser.detach.unwrap_or(true)
    }

    pub fn browser_options(&self) -> Result<BrowserOptions> {
        Ok(BrowserOptions {
            executable: self
                .browser
                .executable
                .as_deref()
                .map(|path| PathBuf::from(path.trim())),
            args: self.browser.args.clone(),
            headless: self.browser.headless.unwrap_or(false),
            timeout: self.browser_timeout()?,
        })
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let state_root = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow!("cannot resolve state directory; set [log].file"))?;
        Ok(state_root.join("formfill").join(LOG_FILE_NAME))
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        parse_level(self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# form-filler config\n# Place this file at: {}\n\n\
website = \"{EXAMPLE_WEBSITE}\"\n\
# Column whose values make up the pick-list\n\
list_term = \"Company\"\n\
# Spreadsheet path, relative to this file\n\
form_name = \"contacts.xlsx\"\n\
# Form field id = spreadsheet column, filled in order\n\
terms = [\n\
  {{ company_name = \"Company\" }},\n\
  {{ contact = \"Contact\" }},\n\
  {{ phone = \"Phone\" }},\n\
]\n\
# Optional field that receives today's date and the user below\n\
last_form = \"notes\"\n\
user = \"initials\"\n\n\
[browser]\n\
# Optional. Chrome, Chromium or Edge binary; detected when unset\n\
# executable = \"/usr/bin/chromium\"\n\
args = []\n\
headless = false\n\
timeout = \"{DEFAULT_BROWSER_TIMEOUT}\"\n\
# Keep each filled tab open for review\n\
detach = true\n\n\
[log]\n\
# file = \"/absolute/path/to/{LOG_FILE_NAME}\"\n\
level = \"{DEFAULT_LOG_LEVEL}\"\n",
            path.display(),
        )
    }
}

fn parse_level(raw: &str) -> Result<LevelFilter> {
    raw.trim().parse::<LevelFilter>().map_err(|_| {
        anyhow!("invalid log level {raw:?}; use one of: off, error, warn, info, debug, trace")
    })
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}
