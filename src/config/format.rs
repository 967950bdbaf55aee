//! Line codec for the persisted option file
//!
//! The file is line oriented:
//!
//! ```text
//! [object_name] # Display name
//!
//! # Description (kind)
//! #name=default value
//!
//! # Description (kind)
//! name=changed value
//! ```
//!
//! Numbers are always read and written with [`NumericContext`], a fixed
//! neutral convention (`.` as decimal point, no digit grouping) that does
//! not depend on any process-wide locale state.

use thiserror::Error;

use crate::models::{ModuleDescriptor, OptionItem, OptionValue};

/// UTF-8 byte order mark written at the start of every saved file
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("empty numeric value")]
    Empty,
    #[error("invalid numeric value: {0}")]
    Invalid(String),
    #[error("numeric value out of 64-bit range: {0}")]
    Overflow(String),
}

/// One classified line of the persisted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    /// Any line starting with `#`, including commented-out default values
    Comment(&'a str),
    /// `[name]`: the text between the opening bracket and the first `]`
    SectionHeader(&'a str),
    KeyValue { key: &'a str, value: &'a str },
    /// Neither comment nor section and no `=`
    Invalid(&'a str),
}

/// Classify one line. A trailing `\n` (and a `\r` before it) is ignored.
///
/// Key and value are split at the first `=` and are not trimmed.
pub fn parse_line(line: &str) -> Line<'_> {
    let line = strip_newline(line);

    if line.is_empty() {
        return Line::Blank;
    }

    if let Some(comment) = line.strip_prefix('#') {
        return Line::Comment(comment);
    }

    if let Some(rest) = line.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => Line::SectionHeader(&rest[..end]),
            None => Line::Comment(line),
        };
    }

    match line.split_once('=') {
        Some((key, value)) => Line::KeyValue { key, value },
        None => Line::Invalid(line),
    }
}

pub fn strip_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Neutral numeric convention used for every number in the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumericContext;

impl NumericContext {
    /// Parse an integer literal with an optional sign and base prefix:
    /// `0x`/`0X` for hexadecimal, a leading `0` for octal, decimal otherwise.
    /// Leading whitespace is skipped; anything after the digits is an error.
    pub fn parse_integer(&self, text: &str) -> Result<i64, FormatError> {
        let trimmed = text.trim_start();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        if unsigned.is_empty() {
            return Err(FormatError::Empty);
        }

        let (radix, digits) = if let Some(hex) = unsigned
            .strip_prefix("0x")
            .or_else(|| unsigned.strip_prefix("0X"))
        {
            (16, hex)
        } else if unsigned.len() > 1 && unsigned.starts_with('0') {
            (8, &unsigned[1..])
        } else {
            (10, unsigned)
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return Err(FormatError::Invalid(text.to_string()));
        }

        // Accumulate in i128 so that i64::MIN parses without overflow
        let magnitude = u64::from_str_radix(digits, radix)
            .map_err(|_| FormatError::Overflow(text.to_string()))?;
        let value = if negative {
            -(magnitude as i128)
        } else {
            magnitude as i128
        };

        i64::try_from(value).map_err(|_| FormatError::Overflow(text.to_string()))
    }

    /// Permissive float parser: takes the longest leading decimal number and
    /// ignores the rest. Input without any number yields NaN.
    pub fn parse_float(&self, text: &str) -> f32 {
        let trimmed = text.trim_start();
        let mut end = trimmed.len();
        while end > 0 {
            if trimmed.is_char_boundary(end) {
                if let Ok(value) = trimmed[..end].parse::<f32>() {
                    return value;
                }
            }
            end -= 1;
        }
        f32::NAN
    }

    pub fn format_integer(&self, value: i64) -> String {
        value.to_string()
    }

    /// Shortest decimal representation that reads back to the same value
    pub fn format_float(&self, value: f32) -> String {
        value.to_string()
    }

    pub fn format_value(&self, value: &OptionValue) -> String {
        match value {
            OptionValue::Boolean(b) => self.format_integer(i64::from(*b)),
            OptionValue::Integer(i) => self.format_integer(*i),
            OptionValue::Float(f) => self.format_float(*f),
            OptionValue::String(s) => s.clone(),
        }
    }
}

/// How raw bytes of a line become text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// File started with a UTF-8 BOM: bytes are used as UTF-8
    Utf8,
    /// No BOM: UTF-8 when valid, otherwise each byte is read as Latin-1
    Legacy,
}

impl TextEncoding {
    /// Pick the encoding from the first bytes of a file
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(UTF8_BOM) {
            TextEncoding::Utf8
        } else {
            TextEncoding::Legacy
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Legacy => match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
            },
        }
    }
}

/// Banner written at the top of every saved file, BOM included
pub fn render_banner(banner: &str) -> String {
    format!(
        "\u{FEFF}###\n###  {}\n###\n\n###\n### lines beginning with a '#' character are comments\n###\n\n",
        banner
    )
}

/// `[object_name]` header with the display name as a trailing comment
pub fn render_section_header(module: &ModuleDescriptor) -> String {
    match module.display_name() {
        Some(display) => format!("[{}] # {}\n\n", module.object_name(), display),
        None => format!("[{}]\n\n", module.object_name()),
    }
}

/// Description comment followed by `name=value`, commented out when the
/// value equals the default.
pub fn render_item(item: &OptionItem, numeric: &NumericContext) -> String {
    format!(
        "# {} ({})\n{}{}={}\n\n",
        item.description().unwrap_or("?"),
        item.kind(),
        if item.is_default() { "#" } else { "" },
        item.name(),
        numeric.format_value(item.value())
    )
}
