//! Title and author from a document header or its filename.

use crate::text::prefix_chars;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

lazy_static! {
    static ref COMBINED: Regex = Regex::new(r"『(.+?)/作者[：:](.+?)』").unwrap();
    static ref TITLE_LINE: Regex = Regex::new(r"(?m)^\s*(?:书名|(?i:title))[：:]\s*(.+)$").unwrap();
    static ref AUTHOR_LINE: Regex =
        Regex::new(r"(?m)^\s*(?:作者|(?i:author))[：:]\s*(.+)$").unwrap();
    static ref LEADING_TAG: Regex = Regex::new(r"^\[.*?\]").unwrap();
    static ref DECORATIONS: Regex = Regex::new(r"【.*?】|\(.*?\)|（.*?）").unwrap();
}

/// Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: String,
    pub author: String,
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Looks for title and author in the first `header_chars` chars.
///
/// The combined `『title/作者:author』` form takes precedence over separate
/// `书名:` / `作者:` lines.
pub fn extract_book_info(text: &str, header_chars: usize) -> BookInfo {
    let header = prefix_chars(text, header_chars);

    if let Some(caps) = COMBINED.captures(header) {
        return BookInfo {
            title: caps[1].trim().to_string(),
            author: caps[2].trim().to_string(),
        };
    }

    BookInfo {
        title: capture(&TITLE_LINE, header),
        author: capture(&AUTHOR_LINE, header),
    }
}

/// Sanitized title from a filename: extension, a leading `[tag]` and bracketed
/// decorations are removed. Falls back to the bare file stem.
pub fn title_from_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    let stem = match name.len().checked_sub(4) {
        Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".txt") => {
            &name[..cut]
        }
        _ => name,
    };

    let cleaned = LEADING_TAG.replace(stem, "");
    let cleaned = DECORATIONS.replace_all(&cleaned, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        stem.trim().to_string()
    } else {
        cleaned.to_string()
    }
}
