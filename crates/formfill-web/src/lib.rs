// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Browser automation for filling web forms: a Chrome DevTools driver, the
//! page reachability check, and the row-to-form filler.

pub mod cdp;
pub mod driver;
pub mod filler;

pub use cdp::{BrowserOptions, ChromePage, ChromeSession, classify, id_selector};
pub use driver::{DriverError, ElementRef, FormDriver};
pub use filler::{FormFiller, Truncation, input_text, note_date, parse_max_length, truncate_to};
