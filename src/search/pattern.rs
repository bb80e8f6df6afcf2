//! Turns a user query and options into a matcher.
use super::SearchOptions;
use crate::error::{NovelscanError, Result};
use crate::text::{has_cjk, is_cjk};
use regex::{Regex, RegexBuilder};

/// Default bound on the compiled size of a query.
pub const DEFAULT_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Whole-word check applied to each regex hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    None,
    /// No ASCII word char on either side, so Latin terms still match
    /// inside running CJK text.
    Ascii,
    /// No word char or CJK char on either side.
    Cjk,
}

impl Boundary {
    fn holds(self, text: &str, start: usize, end: usize) -> bool {
        let touches: fn(char) -> bool = match self {
            Boundary::None => return true,
            Boundary::Ascii => is_ascii_word,
            Boundary::Cjk => is_word_like,
        };
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(touches) && !after.is_some_and(touches)
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    boundary: Boundary,
}

impl Matcher {
    pub fn compile(query: &str, options: &SearchOptions) -> Result<Self> {
        Self::compile_with_limit(query, options, DEFAULT_SIZE_LIMIT)
    }

    pub fn compile_with_limit(
        query: &str,
        options: &SearchOptions,
        size_limit: usize,
    ) -> Result<Self> {
        if query.trim().is_empty() {
            return Err(NovelscanError::pattern(query, "query is empty"));
        }

        let source = if options.use_regex {
            query.to_string()
        } else {
            regex::escape(query)
        };

        let boundary = match (options.whole_word, has_cjk(query)) {
            (false, _) => Boundary::None,
            (true, false) => Boundary::Ascii,
            (true, true) => Boundary::Cjk,
        };

        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .size_limit(size_limit)
            .build()
            .map_err(|e| NovelscanError::pattern(query, e.to_string()))?;

        Ok(Self { regex, boundary })
    }

    /// Non-empty hits as byte ranges, left to right, non-overlapping.
    pub fn find_iter<'m, 't>(&'m self, text: &'t str) -> MatchIter<'m, 't> {
        MatchIter {
            matcher: self,
            text,
            pos: 0,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.find_iter(text).next().is_some()
    }
}

fn is_ascii_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_word_like(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || is_cjk(c)
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    match text[at..].chars().next() {
        Some(c) => at + c.len_utf8(),
        None => text.len() + 1,
    }
}

pub struct MatchIter<'m, 't> {
    matcher: &'m Matcher,
    text: &'t str,
    pos: usize,
}

impl Iterator for MatchIter<'_, '_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos <= self.text.len() {
            let m = self.matcher.regex.find_at(self.text, self.pos)?;
            let (start, end) = (m.start(), m.end());

            if start == end {
                self.pos = next_char_boundary(self.text, end);
                continue;
            }
            if !self.matcher.boundary.holds(self.text, start, end) {
                self.pos = next_char_boundary(self.text, start);
                continue;
            }

            self.pos = end;
            return Some((start, end));
        }
        None
    }
}
