//! Single-book scan: matches, chapter attribution, per-mode aggregation.
use super::context::excerpt_bytes;
use super::locator::ChapterLocator;
use super::pattern::Matcher;
use super::{
    BookSearchResult, ChapterSearchResult, ModeLimits, SearchMatch, SearchMode, SearchOptions,
    Searchable,
};
use crate::error::Result;
use crate::text::CharCursor;
use log::debug;
use std::collections::BTreeMap;

/// Result of scanning one book.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed(BookSearchResult),
    Cancelled,
}

/// A compiled query bound to a mode, reusable across books.
pub struct SearchEngine {
    matcher: Matcher,
    options: SearchOptions,
    mode: SearchMode,
    limits: ModeLimits,
}

impl SearchEngine {
    pub fn new(
        query: &str,
        options: SearchOptions,
        mode: SearchMode,
        size_limit: usize,
    ) -> Result<Self> {
        let matcher = Matcher::compile_with_limit(query, &options, size_limit)?;
        let limits = mode.limits(&options);
        Ok(Self {
            matcher,
            options,
            mode,
            limits,
        })
    }

    pub fn search(&self, book: &dyn Searchable) -> BookSearchResult {
        match self.search_with(book, || false, |_| {}) {
            ScanOutcome::Completed(result) => result,
            ScanOutcome::Cancelled => BookSearchResult::empty(book),
        }
    }

    /// Scans `book` once, front to back.
    ///
    /// `is_cancelled` is polled before every hit is processed. `on_progress`
    /// receives the scan position as a percentage whenever it has moved ten
    /// points since the last report, then a final 100.
    pub fn search_with<C, P>(
        &self,
        book: &dyn Searchable,
        is_cancelled: C,
        mut on_progress: P,
    ) -> ScanOutcome
    where
        C: Fn() -> bool,
        P: FnMut(u8),
    {
        let text = book.content();
        let chapters = book.chapters();
        let total_chars = book.char_len().max(1);
        let locator = ChapterLocator::new(chapters);
        let mut cursor = CharCursor::new(text);

        let mut grouped: BTreeMap<usize, ChapterSearchResult> = BTreeMap::new();
        let mut total = 0;
        let mut truncated = false;
        let mut reported = 0u8;

        for (start, end) in self.matcher.find_iter(text) {
            if is_cancelled() {
                debug!("Scan of '{}' cancelled at {} hits", book.id(), total);
                return ScanOutcome::Cancelled;
            }

            let (position, line_number) = cursor.advance_to(start);
            let Some(slot) = locator.locate(position) else {
                continue;
            };
            if total >= self.limits.max_results {
                truncated = true;
                break;
            }
            total += 1;

            let chapter = &chapters[slot];
            let entry = grouped.entry(slot).or_insert_with(|| ChapterSearchResult {
                chapter_index: chapter.index,
                chapter_title: chapter.title.clone(),
                count: 0,
                matches: Vec::new(),
            });
            entry.count += 1;

            if entry.matches.len() < self.limits.per_chapter {
                let excerpt = excerpt_bytes(text, start, end, self.options.context_length);
                entry.matches.push(SearchMatch {
                    position,
                    line_number,
                    context: excerpt.context,
                    match_offset: excerpt.match_offset,
                    match_length: text[start..end].chars().count(),
                });
            }

            let percent = (position * 100 / total_chars).min(100) as u8;
            if percent >= reported + 10 {
                on_progress(percent);
                reported = percent;
            }
        }
        on_progress(100);

        let mut chapter_results: Vec<ChapterSearchResult> = grouped.into_values().collect();
        if self.mode == SearchMode::Frequency {
            chapter_results.sort_by(|a, b| b.count.cmp(&a.count));
        }

        debug!(
            "'{}': {} hits in {} chapters{}",
            book.id(),
            total,
            chapter_results.len(),
            if truncated { " (truncated)" } else { "" }
        );

        ScanOutcome::Completed(BookSearchResult {
            book_id: book.id().to_string(),
            book_title: book.title().to_string(),
            total_matches: total,
            total_chapters_with_matches: chapter_results.len(),
            chapters: chapter_results,
            truncated,
            error: None,
        })
    }
}
