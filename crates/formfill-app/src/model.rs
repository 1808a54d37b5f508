// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// Ceiling applied when a field declares no usable `maxlength`.
pub const DEFAULT_MAX_LENGTH: usize = 524_288;

/// Characters of the original text echoed back when a value is truncated.
pub const TRUNCATION_PREVIEW_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub field_id: String,
    pub column: String,
}

impl FieldMapping {
    pub fn new(field_id: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            column: column.into(),
        }
    }
}

/// Spreadsheet contents as display strings: one header row plus data rows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Cell at `row` under the header `column`. Ragged rows read as empty
    /// cells; `None` means the column or the row does not exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        let cells = self.rows.get(row)?;
        Some(cells.get(index).map(String::as_str).unwrap_or(""))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Filled {
        field_id: String,
        column: String,
        chars: usize,
    },
    Truncated {
        field_id: String,
        column: String,
        preview: String,
        max_length: usize,
    },
    FieldNotFound {
        field_id: String,
    },
    ColumnNotFound {
        field_id: String,
        column: String,
    },
    WriteFailed {
        field_id: String,
        reason: String,
    },
}

impl FieldOutcome {
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Filled { .. } | Self::Truncated { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::Filled {
                field_id,
                column,
                chars,
            } => format!("id: {field_id} filled from {column} ({chars} chars)"),
            Self::Truncated {
                field_id,
                preview,
                max_length,
                ..
            } => format!("truncated text: {preview} (id: {field_id}, maxlength {max_length})"),
            Self::FieldNotFound { field_id } => format!("id: {field_id} not found in webpage"),
            Self::ColumnNotFound { column, .. } => format!("header: {column} not found in form"),
            Self::WriteFailed { field_id, reason } => {
                format!("id: {field_id} could not be written: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteOutcome {
    NotConfigured,
    Written { field_id: String, with_user: bool },
    FieldNotFound { field_id: String },
    WriteFailed { field_id: String, reason: String },
}

impl NoteOutcome {
    pub fn message(&self) -> Option<String> {
        match self {
            Self::NotConfigured => None,
            Self::Written {
                field_id,
                with_user: true,
            } => Some(format!("id: {field_id} noted with date and user")),
            Self::Written { field_id, .. } => Some(format!("id: {field_id} noted with date")),
            Self::FieldNotFound { field_id } => {
                Some(format!("id: {field_id} not found in webpage"))
            }
            Self::WriteFailed { field_id, reason } => {
                Some(format!("id: {field_id} could not be noted: {reason}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillReport {
    pub entry: String,
    pub row: usize,
    /// Number of configured terms, reached or not.
    pub planned: usize,
    pub fields: Vec<FieldOutcome>,
    pub note: NoteOutcome,
}

impl FillReport {
    pub fn new(entry: impl Into<String>, row: usize, planned: usize) -> Self {
        Self {
            entry: entry.into(),
            row,
            planned,
            fields: Vec::new(),
            note: NoteOutcome::NotConfigured,
        }
    }

    pub fn written_count(&self) -> usize {
        self.fields.iter().filter(|field| field.is_written()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.fields.len() - self.written_count()
    }

    pub fn truncated_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|field| matches!(field, FieldOutcome::Truncated { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    RowNotFound { entry: String },
    Unreachable { website: String, status: u16 },
    Completed(FillReport),
    BrowserClosed(FillReport),
}

impl FillOutcome {
    pub fn report(&self) -> Option<&FillReport> {
        match self {
            Self::Completed(report) | Self::BrowserClosed(report) => Some(report),
            Self::RowNotFound { .. } | Self::Unreachable { .. } => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::RowNotFound { entry } => format!("no row contains {entry:?}; nothing filled"),
            Self::Unreachable { website, status } => {
                format!("{website} gave a {status} error code")
            }
            Self::Completed(report) => {
                let mut summary = format!(
                    "{}: filled {}/{} fields",
                    report.entry,
                    report.written_count(),
                    report.fields.len()
                );
                if report.truncated_count() > 0 {
                    summary.push_str(&format!(", {} truncated", report.truncated_count()));
                }
                if report.skipped_count() > 0 {
                    summary.push_str(&format!(", {} skipped", report.skipped_count()));
                }
                summary
            }
            Self::BrowserClosed(report) => format!(
                "browser window was closed after {} of {} fields",
                report.written_count(),
                report.planned
            ),
        }
    }

    /// One line per reported item, summary first.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.summary()];
        if let Some(report) = self.report() {
            lines.extend(report.fields.iter().map(FieldOutcome::message));
            lines.extend(report.note.message());
        }
        lines
    }
}
