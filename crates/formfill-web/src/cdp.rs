// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Chrome DevTools Protocol driver. chromiumoxide is async; every call is
//! driven to completion on a private current-thread runtime so callers stay
//! synchronous.

use crate::driver::{DriverError, ElementRef, FormDriver};
use anyhow::{Context, Result, anyhow};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Chrome, Chromium or Edge binary. Detected from the usual install
    /// locations when unset.
    pub executable: Option<PathBuf>,
    pub args: Vec<String>,
    pub headless: bool,
    pub timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            headless: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserOptions {
    pub fn config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .args(self.args.iter().map(String::as_str))
            .launch_timeout(self.timeout)
            .request_timeout(self.timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        builder.build().map_err(|error| {
            anyhow!("configure browser: {error} -- install Chrome or set [browser].executable")
        })
    }
}

/// A launched browser plus the task pumping its DevTools connection.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    runtime: Runtime,
}

impl ChromeSession {
    pub fn launch(options: &BrowserOptions) -> Result<Self> {
        let config = options.config()?;
        let runtime = RuntimeBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("start browser runtime")?;

        let (browser, mut handler) = runtime
            .block_on(Browser::launch(config))
            .context("launch browser -- install Chrome or set [browser].executable")?;

        // the handler must be polled for any command to complete
        let handler = runtime.spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    log::debug!("devtools event: {error}");
                }
            }
            log::info!("browser connection closed");
        });

        log::info!("browser launched");
        Ok(Self {
            browser,
            handler,
            runtime,
        })
    }

    /// False once the user has closed the browser.
    pub fn is_open(&self) -> bool {
        !self.handler.is_finished()
    }

    /// Open a blank tab to drive.
    pub fn open_page(&self) -> Result<ChromePage<'_>, DriverError> {
        let page = self
            .runtime
            .block_on(self.browser.new_page("about:blank"))
            .map_err(classify)?;
        Ok(ChromePage {
            runtime: &self.runtime,
            page: Some(page),
            elements: HashMap::new(),
        })
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// One tab of a [`ChromeSession`].
pub struct ChromePage<'a> {
    runtime: &'a Runtime,
    page: Option<Page>,
    elements: HashMap<String, Element>,
}

impl ChromePage<'_> {
    fn page(&self) -> Result<&Page, DriverError> {
        self.page
            .as_ref()
            .ok_or_else(|| DriverError::SessionClosed("page already closed".to_owned()))
    }

    fn element(&self, element: &ElementRef) -> Result<&Element, DriverError> {
        self.elements
            .get(element.id())
            .ok_or_else(|| DriverError::NoSuchElement(element.id().to_owned()))
    }
}

impl FormDriver for ChromePage<'_> {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        self.runtime.block_on(page.goto(url)).map_err(classify)?;
        self.elements.clear();
        Ok(())
    }

    fn find_by_id(&mut self, field_id: &str) -> Result<ElementRef, DriverError> {
        let page = self.page()?;
        let found = self
            .runtime
            .block_on(page.find_elements(id_selector(field_id)))
            .map_err(classify)?;
        let element = found
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::NoSuchElement(field_id.to_owned()))?;
        self.elements.insert(field_id.to_owned(), element);
        Ok(ElementRef::new(field_id))
    }

    fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let element = self.element(element)?;
        self.runtime
            .block_on(element.attribute(name))
            .map_err(classify)
    }

    fn send_keys(&mut self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        let element = self.element(element)?;
        self.runtime
            .block_on(async {
                element.focus().await?;
                page.execute(InsertTextParams::new(text)).await?;
                Ok::<(), CdpError>(())
            })
            .map_err(classify)
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        self.elements.clear();
        let Some(page) = self.page.take() else {
            return Ok(());
        };
        self.runtime.block_on(page.close()).map_err(classify)?;
        log::info!("closed form tab");
        Ok(())
    }
}

/// CSS selector matching `id` exactly, including ids that are not valid
/// CSS identifiers.
pub fn id_selector(id: &str) -> String {
    let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[id=\"{escaped}\"]")
}

/// Sort DevTools failures into "page is gone" and everything else.
pub fn classify(error: CdpError) -> DriverError {
    match error {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            DriverError::SessionClosed(error.to_string())
        }
        other => {
            let message = other.to_string();
            if target_gone(&message) {
                DriverError::SessionClosed(message)
            } else {
                DriverError::Protocol(message)
            }
        }
    }
}

fn target_gone(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["no target with given id", "target closed", "session with given id not found"]
        .iter()
        .any(|needle| message.contains(needle))
}
