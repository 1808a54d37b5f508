// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::FieldMapping;

/// Everything the filler needs to push one spreadsheet row into the web form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillPlan {
    pub website: String,
    pub terms: Vec<FieldMapping>,
    pub last_form: Option<String>,
    pub user: Option<String>,
}

impl FillPlan {
    pub fn validate(&self) -> Result<()> {
        if self.website.trim().is_empty() {
            bail!("website is required -- set `website` in the config and retry");
        }
        if self.terms.is_empty() {
            bail!("terms list is empty -- map at least one field id to a column");
        }
        for mapping in &self.terms {
            if mapping.field_id.trim().is_empty() {
                bail!("terms entry for column {:?} has an empty field id", mapping.column);
            }
        }
        if let Some(last_form) = &self.last_form
            && last_form.trim().is_empty()
        {
            bail!("last_form must not be empty when set");
        }
        Ok(())
    }

    /// Columns referenced by `terms`, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|mapping| mapping.column.as_str())
    }
}
