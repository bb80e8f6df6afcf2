//! Chapter segmentation.
//!
//! A chapter is an inclusive char span `[start, end]` of the canonical text
//! that begins at a heading line. Text before the first heading (preamble)
//! belongs to no chapter.
pub mod metadata;

use crate::config::SegmentationConfig;
use crate::error::{NovelscanError, Result};
use crate::text::{char_to_byte, floor_char_boundary};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

pub use metadata::{extract_book_info, title_from_filename, BookInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    /// First char of the heading line.
    pub start: usize,
    /// Last char of the chapter, inclusive.
    pub end: usize,
}

impl Chapter {
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// The chapter's slice of `text`, the text it was segmented from.
    pub fn content<'t>(&self, text: &'t str) -> &'t str {
        let from = char_to_byte(text, self.start);
        let to = from + char_to_byte(&text[from..], self.len());
        &text[from..to]
    }
}

#[derive(Debug, Clone)]
pub struct HeadingPattern {
    pub name: String,
    pub regex: Regex,
    /// Lower runs first.
    pub priority: u32,
}

impl HeadingPattern {
    pub fn new(name: &str, pattern: &str, priority: u32) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            regex: Regex::new(pattern)?,
            priority,
        })
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

const BUILTIN: &[(&str, &str)] = &[
    ("arabic_zhang", r"^第[0-9]+章"),
    ("chinese_zhang", r"^第[零〇一二两三四五六七八九十百千万]+章"),
    ("english_chapter", r"(?i)^chapter\s+\d+"),
    ("arabic_jie", r"^第[0-9]+节"),
    ("chinese_jie", r"^第[零〇一二两三四五六七八九十百千万]+节"),
    ("arabic_hui", r"^第[0-9]+回"),
    ("chinese_hui", r"^第[零〇一二两三四五六七八九十百千万]+回"),
    ("bracket_arabic", r"^【第[0-9]+章】"),
    ("bracket_chinese", r"^【第[零〇一二两三四五六七八九十百千万]+章】"),
    (
        "volume_chapter",
        r"^卷[0-9一二三四五六七八九十]+\s+第[0-9一二三四五六七八九十百千万]+章",
    ),
    ("part", r"^第[0-9一二三四五六七八九十百千万]+部"),
    ("special", r"^(?:序章|序幕|楔子|引子|终章|尾声|番外)"),
];

lazy_static! {
    static ref BUILTIN_PATTERNS: Vec<HeadingPattern> = BUILTIN
        .iter()
        .zip(1u32..)
        .map(|(&(name, pattern), rank)| HeadingPattern {
            name: name.to_string(),
            regex: Regex::new(pattern).unwrap(),
            priority: rank * 10,
        })
        .collect();
}

/// Ordered heading patterns; the first one that matches a line wins.
#[derive(Debug, Clone)]
pub struct HeadingPatterns(Vec<HeadingPattern>);

impl Default for HeadingPatterns {
    fn default() -> Self {
        Self(BUILTIN_PATTERNS.clone())
    }
}

impl Deref for HeadingPatterns {
    type Target = [HeadingPattern];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl HeadingPatterns {
    pub fn new(mut patterns: Vec<HeadingPattern>) -> Self {
        patterns.sort_by_key(|p| p.priority);
        Self(patterns)
    }

    /// Built-in table followed by `extra`, in the given order.
    pub fn with_extra(extra: &[String]) -> Result<Self> {
        let mut patterns = BUILTIN_PATTERNS.clone();
        let base = patterns.last().map_or(0, |p| p.priority);
        for (i, source) in extra.iter().enumerate() {
            let regex = Regex::new(source).map_err(|e| {
                NovelscanError::Config(format!("invalid heading pattern '{source}': {e}"))
            })?;
            patterns.push(HeadingPattern {
                name: format!("custom_{}", i + 1),
                regex,
                priority: base + 10 * (i as u32 + 1),
            });
        }
        Ok(Self(patterns))
    }

    pub fn from_config(config: &SegmentationConfig) -> Result<Self> {
        Self::with_extra(&config.extra_patterns)
    }

    pub fn first_match(&self, line: &str) -> Option<&HeadingPattern> {
        self.0.iter().find(|p| p.is_match(line))
    }

    pub fn get(&self, name: &str) -> Option<&HeadingPattern> {
        self.0.iter().find(|p| p.name == name)
    }
}

/// Raw lines ending at `\r\n`, a lone `\r` or `\n`, terminators included.
fn raw_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let bytes = rest.as_bytes();
        let end = match memchr::memchr2(b'\r', b'\n', bytes) {
            Some(i) if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') => i + 2,
            Some(i) => i + 1,
            None => rest.len(),
        };
        let (line, tail) = rest.split_at(end);
        rest = tail;
        Some(line)
    })
}

/// Raw lines with the char offset each starts at.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    raw_lines(text).map(move |raw| {
        let at = offset;
        offset += raw.chars().count();
        (at, raw)
    })
}

fn heading_of(raw_line: &str) -> Option<&str> {
    let line = raw_line.trim_end_matches(['\r', '\n']).trim();
    (!line.is_empty()).then_some(line)
}

/// Splits `text` into chapters at lines matching any of `patterns`.
///
/// Returns an empty list when nothing matches.
pub fn segment(text: &str, patterns: &[HeadingPattern]) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = Vec::new();
    let mut total = 0;

    for (offset, raw) in lines_with_offsets(text) {
        total = offset + raw.chars().count();
        let Some(line) = heading_of(raw) else {
            continue;
        };
        if !patterns.iter().any(|p| p.is_match(line)) {
            continue;
        }
        if let Some(previous) = chapters.last_mut() {
            previous.end = offset - 1;
        }
        chapters.push(Chapter {
            index: chapters.len(),
            title: line.to_string(),
            start: offset,
            end: offset,
        });
    }

    if let Some(last) = chapters.last_mut() {
        last.end = total - 1;
    }
    chapters
}

pub fn count_matching_lines(text: &str, pattern: &HeadingPattern) -> usize {
    raw_lines(text)
        .filter_map(heading_of)
        .filter(|line| pattern.is_match(line))
        .count()
}

fn best_by_count<'p>(
    patterns: &'p [HeadingPattern],
    count: impl Fn(&HeadingPattern) -> usize,
) -> Option<(&'p HeadingPattern, usize)> {
    let mut best: Option<(&HeadingPattern, usize)> = None;
    for pattern in patterns {
        let n = count(pattern);
        if n > 0 && best.map_or(true, |(_, top)| n > top) {
            best = Some((pattern, n));
        }
    }
    best
}

/// The pattern matching the most lines in the first `sample_bytes` of `text`.
/// Earlier patterns win ties; `None` when no pattern matches anything.
pub fn detect_best_pattern<'p>(
    text: &str,
    patterns: &'p [HeadingPattern],
    sample_bytes: usize,
) -> Option<&'p HeadingPattern> {
    let sample = &text[..floor_char_boundary(text, sample_bytes)];
    best_by_count(patterns, |p| count_matching_lines(sample, p)).map(|(p, _)| p)
}

/// Head, middle and tail windows of a large text.
fn sample_windows(text: &str, window: usize) -> [&str; 3] {
    let len = text.len();
    let head_end = floor_char_boundary(text, window);
    let mid_start = floor_char_boundary(text, (len / 2).saturating_sub(window / 2));
    let mid_end = floor_char_boundary(text, mid_start + window);
    let tail_start = floor_char_boundary(text, len.saturating_sub(window));
    [
        &text[..head_end],
        &text[mid_start..mid_end],
        &text[tail_start..],
    ]
}

/// Segments `text`, narrowing large texts to their dominant heading style.
///
/// Texts above `large_text_threshold` bytes are sampled at head, middle and
/// tail; if one pattern matches at least `min_sample_matches` lines there, the
/// full scan uses that pattern alone. Otherwise every pattern is tried.
pub fn detect_chapters(
    text: &str,
    patterns: &[HeadingPattern],
    config: &SegmentationConfig,
) -> Vec<Chapter> {
    if text.len() > config.large_text_threshold {
        let windows = sample_windows(text, config.large_text_sample_bytes);
        let best = best_by_count(patterns, |p| {
            windows.iter().map(|w| count_matching_lines(w, p)).sum()
        });
        match best {
            Some((pattern, hits)) if hits >= config.min_sample_matches => {
                info!(
                    "Large text ({} bytes): segmenting with '{}' ({} sampled headings)",
                    text.len(),
                    pattern.name,
                    hits
                );
                return segment(text, std::slice::from_ref(pattern));
            }
            _ => debug!("No dominant heading style in samples, using all patterns"),
        }
    }
    segment(text, patterns)
}
