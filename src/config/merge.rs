//! Preservation of sections owned by modules that are not loaded
//!
//! Before a save rewrites the file, every section whose header does not
//! belong to a known module is copied out byte for byte so that it can be
//! appended after the freshly rendered sections.

use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};

/// How a `[section]` header is matched against known module names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionMatch {
    /// The header text only has to start with the module name, so module
    /// `abc` also owns `[abcdef]`. Matches files written by older releases.
    #[default]
    Prefix,
    /// The header text must equal the module name
    Exact,
}

impl SectionMatch {
    pub fn owns(&self, module: &str, header: &str) -> bool {
        match self {
            SectionMatch::Prefix => header.starts_with(module),
            SectionMatch::Exact => header == module,
        }
    }
}

/// Copy the lines of every foreign section out of `reader`.
///
/// Lines before the first section header belong to nobody and are dropped,
/// as are lines starting with a space, a tab or a newline.
pub fn collect_foreign_sections<R: BufRead>(
    reader: &mut R,
    known_modules: &[String],
    matching: SectionMatch,
) -> io::Result<Vec<u8>> {
    let mut backup = Vec::new();
    let mut line = Vec::new();
    let mut copying = false;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }

        if let Some(header) = section_header(&line) {
            let header = String::from_utf8_lossy(header);
            copying = !known_modules
                .iter()
                .any(|module| matching.owns(module, &header));
        }

        if copying && !matches!(line.first(), Some(b'\n' | b'\t' | b' ')) {
            backup.extend_from_slice(&line);
        }
    }

    Ok(backup)
}

fn section_header(line: &[u8]) -> Option<&[u8]> {
    let rest = line.strip_prefix(b"[")?;
    let end = rest.iter().position(|&b| b == b']')?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(content: &str, known: &[&str], matching: SectionMatch) -> String {
        let known: Vec<String> = known.iter().map(|s| s.to_string()).collect();
        let mut reader = Cursor::new(content.as_bytes().to_vec());
        let backup = collect_foreign_sections(&mut reader, &known, matching).unwrap();
        String::from_utf8(backup).unwrap()
    }

    #[test]
    fn test_unknown_section_preserved() {
        let content = "\u{FEFF}###\n### banner\n###\n\n[audio]\n\nvolume=5\n\n[unknownModule]\nfoo=bar\n";
        assert_eq!(
            collect(content, &["audio"], SectionMatch::Prefix),
            "[unknownModule]\nfoo=bar\n"
        );
    }

    #[test]
    fn test_known_sections_dropped() {
        let content = "[audio]\nvolume=5\n[video]\nwidth=3\n";
        assert_eq!(collect(content, &["audio", "video"], SectionMatch::Prefix), "");
    }

    #[test]
    fn test_blank_and_indented_lines_dropped() {
        let content = "[plugin] # Plugin\n\n# Some option (integer)\n#opt=1\n\n  indented=1\n\tTab=2\nkeep=3";
        assert_eq!(
            collect(content, &[], SectionMatch::Prefix),
            "[plugin] # Plugin\n# Some option (integer)\n#opt=1\nkeep=3"
        );
    }

    #[test]
    fn test_prefix_versus_exact_matching() {
        let content = "[abcdef]\nx=1\n";
        assert_eq!(collect(content, &["abc"], SectionMatch::Prefix), "");
        assert_eq!(
            collect(content, &["abc"], SectionMatch::Exact),
            "[abcdef]\nx=1\n"
        );
    }

    #[test]
    fn test_bracket_without_close_is_not_a_header() {
        let content = "[foreign]\n[not a header\nvalue=1\n";
        assert_eq!(
            collect(content, &["not"], SectionMatch::Prefix),
            "[foreign]\n[not a header\nvalue=1\n"
        );
    }
}
