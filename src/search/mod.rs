//! Full-text search over decoded books.
pub mod context;
pub mod engine;
pub mod locator;
pub mod orchestrator;
pub mod pattern;

use crate::chapter::Chapter;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use context::{extract_context, Excerpt};
pub use engine::{ScanOutcome, SearchEngine};
pub use locator::ChapterLocator;
pub use orchestrator::{
    CancelHandle, SearchEvent, SearchOrchestrator, SearchRequest, SearchSummary, TaskId,
};
pub use pattern::Matcher;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// First hit per chapter
    #[default]
    Overview,
    /// Every hit up to the per-chapter cap
    Detailed,
    /// Counts only, busiest chapters first
    Frequency,
    /// Hits in reading order, smaller caps
    Timeline,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Overview => write!(f, "overview"),
            SearchMode::Detailed => write!(f, "detailed"),
            SearchMode::Frequency => write!(f, "frequency"),
            SearchMode::Timeline => write!(f, "timeline"),
        }
    }
}

/// How far a scan goes and how much of it is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeLimits {
    /// Chapter-attributed hits after which the scan stops.
    pub max_results: usize,
    /// Hits stored per chapter. Counting continues past it.
    pub per_chapter: usize,
}

impl SearchMode {
    pub fn limits(self, options: &SearchOptions) -> ModeLimits {
        match self {
            SearchMode::Overview => ModeLimits {
                max_results: 10_000,
                per_chapter: 1,
            },
            SearchMode::Detailed => ModeLimits {
                max_results: options.max_results,
                per_chapter: options.max_results_per_chapter,
            },
            SearchMode::Frequency => ModeLimits {
                max_results: 100_000,
                per_chapter: 0,
            },
            SearchMode::Timeline => ModeLimits {
                max_results: options.max_results.min(500),
                per_chapter: options.max_results_per_chapter.min(50),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub use_regex: bool,
    /// Chars of context on each side of a hit.
    pub context_length: usize,
    pub max_results: usize,
    pub max_results_per_chapter: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            use_regex: false,
            context_length: 60,
            max_results: 2000,
            max_results_per_chapter: 100,
        }
    }
}

impl From<&crate::config::SearchConfig> for SearchOptions {
    fn from(config: &crate::config::SearchConfig) -> Self {
        Self {
            context_length: config.context_length,
            max_results: config.max_results,
            max_results_per_chapter: config.max_results_per_chapter,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// Char offset of the hit in the book.
    pub position: usize,
    pub line_number: usize,
    pub context: String,
    /// Char offset of the hit inside `context`.
    pub match_offset: usize,
    pub match_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSearchResult {
    pub chapter_index: usize,
    pub chapter_title: String,
    /// Exact, even when `matches` was capped.
    pub count: usize,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSearchResult {
    pub book_id: String,
    pub book_title: String,
    pub total_matches: usize,
    pub total_chapters_with_matches: usize,
    pub chapters: Vec<ChapterSearchResult>,
    /// The scan stopped at the mode's result cap.
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One stored hit in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry<'r> {
    pub chapter_index: usize,
    pub chapter_title: &'r str,
    pub hit: &'r SearchMatch,
}

impl BookSearchResult {
    pub fn empty(book: &dyn Searchable) -> Self {
        Self {
            book_id: book.id().to_string(),
            book_title: book.title().to_string(),
            total_matches: 0,
            total_chapters_with_matches: 0,
            chapters: Vec::new(),
            truncated: false,
            error: None,
        }
    }

    /// Zero-match result carrying an error marker.
    pub fn failed(book: &dyn Searchable, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty(book)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Stored hits across all chapters, ordered by position.
    pub fn timeline(&self) -> Vec<TimelineEntry<'_>> {
        let mut entries: Vec<TimelineEntry<'_>> = self
            .chapters
            .iter()
            .flat_map(|chapter| {
                chapter.matches.iter().map(move |hit| TimelineEntry {
                    chapter_index: chapter.chapter_index,
                    chapter_title: &chapter.chapter_title,
                    hit,
                })
            })
            .collect();
        entries.sort_by_key(|e| e.hit.position);
        entries
    }
}

/// A document that can be searched: text plus chapter spans over it.
pub trait Searchable: Send + Sync {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn content(&self) -> &str;
    fn chapters(&self) -> &[Chapter];

    /// Length of `content` in chars.
    fn char_len(&self) -> usize {
        self.content().chars().count()
    }
}

/// A plain in-memory searchable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    pub chapters: Vec<Chapter>,
}

impl SearchDocument {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        chapters: Vec<Chapter>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            chapters,
        }
    }
}

impl Searchable for SearchDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightSegment {
    pub text: String,
    pub is_match: bool,
}

/// Splits `text` around literal occurrences of `query` for display.
pub fn highlight_matches(text: &str, query: &str, case_sensitive: bool) -> Vec<HighlightSegment> {
    let options = SearchOptions {
        case_sensitive,
        ..SearchOptions::default()
    };
    let Ok(matcher) = Matcher::compile(query, &options) else {
        return vec![HighlightSegment {
            text: text.to_string(),
            is_match: false,
        }];
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for (start, end) in matcher.find_iter(text) {
        if start > last {
            segments.push(HighlightSegment {
                text: text[last..start].to_string(),
                is_match: false,
            });
        }
        segments.push(HighlightSegment {
            text: text[start..end].to_string(),
            is_match: true,
        });
        last = end;
    }
    if last < text.len() {
        segments.push(HighlightSegment {
            text: text[last..].to_string(),
            is_match: false,
        });
    }
    segments
}
