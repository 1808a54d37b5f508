// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

/// Handle to an element located on the current page, keyed by field id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),

    /// The tab or the whole browser went away underneath us.
    #[error("browser session closed: {0}")]
    SessionClosed(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// True when no further commands can succeed on this page.
    pub const fn is_session_lost(&self) -> bool {
        matches!(self, Self::SessionClosed(_))
    }
}

/// The browser operations form filling needs. Implemented over the Chrome
/// DevTools Protocol by [`crate::ChromePage`].
pub trait FormDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Locate the element whose `id` attribute equals `field_id`.
    fn find_by_id(&mut self, field_id: &str) -> Result<ElementRef, DriverError>;

    fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Type `text` into the element. Does not clear existing content.
    fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<(), DriverError>;

    fn quit(&mut self) -> Result<(), DriverError>;
}
