//! Applies a persisted option file to the registry
//!
//! Loading is tolerant: malformed lines, unknown keys and rejected values
//! are skipped one by one and reported, never turned into errors.

use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::format::{parse_line, Line, NumericContext, TextEncoding, UTF8_BOM};
use crate::models::{OptionKind, OptionValue};
use crate::registry::RegistryState;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("No configuration file location available")]
    NoConfigPath,
    #[error("Cannot open configuration file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A value that was read but not applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadWarning {
    pub line: usize,
    pub option: String,
    pub value: String,
    pub reason: String,
}

/// Outcome of a load pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// File actually read, `None` on first run
    pub source: Option<PathBuf>,
    pub encoding_utf8: bool,
    pub applied: usize,
    /// Keys with no registered option
    pub unknown: usize,
    /// Lines that were neither comment, section nor `key=value`
    pub syntax_errors: usize,
    pub warnings: Vec<LoadWarning>,
    /// Set when reading stopped early; values read before it stay applied
    pub read_error: Option<String>,
}

impl LoadReport {
    pub fn found(&self) -> bool {
        self.source.is_some()
    }
}

/// Consume a leading BOM if present and report which decoding to use
pub fn detect_encoding<R: BufRead>(reader: &mut R) -> std::io::Result<TextEncoding> {
    let head = reader.fill_buf()?;
    let encoding = TextEncoding::detect(head);
    if encoding == TextEncoding::Utf8 {
        reader.consume(UTF8_BOM.len());
    }
    Ok(encoding)
}

/// Stream every line of `reader` into `state`.
///
/// The caller holds the registry write lock for the whole call.
pub fn apply_stream<R: BufRead>(
    reader: &mut R,
    encoding: TextEncoding,
    state: &mut RegistryState,
    numeric: &NumericContext,
    report: &mut LoadReport,
) {
    report.encoding_utf8 = encoding == TextEncoding::Utf8;

    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("Error reading configuration: {}", e);
                report.read_error = Some(e.to_string());
                break;
            }
        }
        line_no += 1;

        let text = encoding.decode(&buf);
        let (key, raw) = match parse_line(&text) {
            Line::KeyValue { key, value } => (key, value),
            Line::Invalid(line) => {
                debug!(line = line_no, "Skipping line without '=': {}", line);
                report.syntax_errors += 1;
                continue;
            }
            Line::Blank | Line::Comment(_) | Line::SectionHeader(_) => continue,
        };

        match apply_value(state, key, raw, numeric) {
            Applied::Yes => report.applied += 1,
            Applied::Ignored => {}
            Applied::Unknown => report.unknown += 1,
            Applied::Rejected(reason) => {
                warn!(option = key, value = raw, "Ignoring configuration value: {}", reason);
                report.warnings.push(LoadWarning {
                    line: line_no,
                    option: key.to_string(),
                    value: raw.to_string(),
                    reason,
                });
            }
        }
    }
}

enum Applied {
    Yes,
    /// Recognised but intentionally left untouched
    Ignored,
    Unknown,
    Rejected(String),
}

fn apply_value(
    state: &mut RegistryState,
    key: &str,
    raw: &str,
    numeric: &NumericContext,
) -> Applied {
    let Some(item) = state.find_mut(key) else {
        return Applied::Unknown;
    };

    let value = match item.kind() {
        OptionKind::Boolean | OptionKind::Integer => {
            let parsed = match numeric.parse_integer(raw) {
                Ok(v) => v,
                Err(e) => return Applied::Rejected(e.to_string()),
            };
            if !item.in_bounds(parsed) {
                let (min, max) = item.bounds().unwrap_or((i64::MIN, i64::MAX));
                return Applied::Rejected(format!("{} is outside [{}, {}]", parsed, min, max));
            }
            if item.kind() == OptionKind::Boolean {
                OptionValue::Boolean(parsed != 0)
            } else {
                OptionValue::Integer(parsed)
            }
        }
        OptionKind::Float => {
            if raw.is_empty() {
                return Applied::Ignored;
            }
            OptionValue::Float(numeric.parse_float(raw))
        }
        OptionKind::String => OptionValue::String(raw.to_string()),
    };

    item.load_value(value);
    Applied::Yes
}
