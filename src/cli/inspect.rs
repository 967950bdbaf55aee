//! Read-only summary of a persisted option file

use serde::Serialize;
use std::io::{self, BufRead};

use crate::config::format::{parse_line, strip_newline, Line};
use crate::config::loader::detect_encoding;
use crate::config::TextEncoding;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
    /// `#key=value`: documents the default, not applied on load
    pub commented: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub name: String,
    pub display_name: Option<String>,
    pub entries: Vec<Entry>,
}

impl SectionSummary {
    pub fn active_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|entry| !entry.commented)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxIssue {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileSummary {
    pub utf8_bom: bool,
    pub sections: Vec<SectionSummary>,
    /// `key=value` lines before the first section header
    pub unsectioned: Vec<Entry>,
    pub syntax_errors: Vec<SyntaxIssue>,
}

impl FileSummary {
    pub fn section(&self, name: &str) -> Option<&SectionSummary> {
        self.sections.iter().find(|section| section.name == name)
    }
}

pub fn inspect<R: BufRead>(reader: &mut R) -> io::Result<FileSummary> {
    let encoding = detect_encoding(reader)?;
    let mut summary = FileSummary {
        utf8_bom: encoding == TextEncoding::Utf8,
        ..FileSummary::default()
    };

    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let text = encoding.decode(&buf);
        let entry = match parse_line(&text) {
            Line::SectionHeader(name) => {
                summary.sections.push(SectionSummary {
                    name: name.to_string(),
                    display_name: strip_newline(&text)
                        .split_once("] # ")
                        .map(|(_, display)| display.to_string()),
                    entries: Vec::new(),
                });
                continue;
            }
            Line::KeyValue { key, value } => Entry {
                key: key.to_string(),
                value: value.to_string(),
                commented: false,
            },
            Line::Comment(comment) => match commented_entry(comment) {
                Some(entry) => entry,
                None => continue,
            },
            Line::Invalid(line) => {
                summary.syntax_errors.push(SyntaxIssue {
                    line: line_no,
                    text: line.to_string(),
                });
                continue;
            }
            Line::Blank => continue,
        };

        match summary.sections.last_mut() {
            Some(section) => section.entries.push(entry),
            None => summary.unsectioned.push(entry),
        }
    }

    Ok(summary)
}

/// `#name=value` as written for options left at their default
fn commented_entry(comment: &str) -> Option<Entry> {
    if comment.starts_with(|c: char| c.is_whitespace() || c == '#') {
        return None;
    }
    let (key, value) = comment.split_once('=')?;
    Some(Entry {
        key: key.to_string(),
        value: value.to_string(),
        commented: true,
    })
}
