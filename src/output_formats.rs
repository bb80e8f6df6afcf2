use crate::cli::OutputFormat;
use crate::error::Result;
use crate::ingest::{BookRecord, Preview};
use crate::search::{BookSearchResult, SearchMatch, SearchMode, SearchSummary};
use colored::*;
use serde_json::json;

/// Renders command results for the terminal or for other programs.
pub struct OutputFormatter {
    format: OutputFormat,
    include_context: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            include_context: true,
        }
    }

    pub fn with_context(mut self, include: bool) -> Self {
        self.include_context = include;
        self
    }

    pub fn format_search(
        &self,
        summary: &SearchSummary,
        query: &str,
        mode: SearchMode,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(self.search_text(summary, query, mode)),
            OutputFormat::Json => {
                let value = json!({
                    "query": query,
                    "mode": mode,
                    "taskId": summary.task_id,
                    "totalMatches": summary.total_matches,
                    "totalChaptersWithMatches": summary.total_chapters_with_matches,
                    "results": summary.results,
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Markdown => Ok(self.search_markdown(summary, query, mode)),
        }
    }

    pub fn format_book(&self, book: &BookRecord) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(book)?),
            OutputFormat::Text => {
                let mut output = String::new();
                output.push_str(&format!("{} {}\n", "Title:".green().bold(), book.title));
                if !book.author.is_empty() {
                    output.push_str(&format!("{} {}\n", "Author:".green().bold(), book.author));
                }
                output.push_str(&format!(
                    "{} {} ({:.2})\n",
                    "Encoding:".green().bold(),
                    book.metadata.encoding,
                    book.metadata.encoding_confidence
                ));
                output.push_str(&format!(
                    "{} {} chapters, {} chars, {} bytes\n",
                    "Size:".green().bold(),
                    book.metadata.total_chapters,
                    book.metadata.total_characters,
                    book.metadata.file_size
                ));
                Ok(output)
            }
            OutputFormat::Markdown => {
                let mut output = format!("# {}\n\n", book.title);
                if !book.author.is_empty() {
                    output.push_str(&format!("**Author:** {}\n", book.author));
                }
                output.push_str(&format!("**Encoding:** {}\n", book.metadata.encoding));
                output.push_str(&format!("**Chapters:** {}\n", book.metadata.total_chapters));
                output.push_str(&format!(
                    "**Characters:** {}\n",
                    book.metadata.total_characters
                ));
                Ok(output)
            }
        }
    }

    pub fn format_preview(&self, preview: &Preview) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(preview)?),
            OutputFormat::Text | OutputFormat::Markdown => {
                let mut output = String::new();
                output.push_str(&format!("Title: {}\n", preview.title));
                output.push_str(&format!("Author: {}\n", preview.author));
                output.push_str(&format!(
                    "Encoding: {} ({:.2})\n",
                    preview.encoding, preview.confidence
                ));
                output.push_str(&format!(
                    "Estimated chapters: {}\n",
                    preview.estimated_chapters
                ));
                if let Some(pattern) = &preview.best_pattern {
                    output.push_str(&format!("Heading style: {pattern}\n"));
                }
                Ok(output)
            }
        }
    }

    pub fn format_chapters(&self, book: &BookRecord) -> String {
        let mut output = String::new();
        for chapter in &book.chapters {
            output.push_str(&format!(
                "{:>5}  {:>9}..{:<9}  {}\n",
                chapter.index.to_string().dimmed(),
                chapter.start,
                chapter.end,
                chapter.title
            ));
        }
        output
    }

    fn search_text(&self, summary: &SearchSummary, query: &str, mode: SearchMode) -> String {
        let mut output = String::new();
        if summary.total_matches == 0 && summary.results.iter().all(|r| !r.is_error()) {
            output.push_str(&format!("{}\n", "No matches found".yellow()));
            return output;
        }

        output.push_str(&format!(
            "{} {} {} '{}' ({} mode)\n",
            "Found".green(),
            summary.total_matches,
            "match(es) for".green(),
            query,
            mode
        ));

        for result in &summary.results {
            output.push_str(&format!(
                "\n{} {}\n",
                "Book".green().bold(),
                result.book_title.bold()
            ));
            if let Some(error) = &result.error {
                output.push_str(&format!("  {}\n", error.red()));
                continue;
            }
            output.push_str(&format!(
                "  {} match(es) in {} chapter(s){}\n",
                result.total_matches,
                result.total_chapters_with_matches,
                if result.truncated {
                    " (stopped at the result limit)".yellow().to_string()
                } else {
                    String::new()
                }
            ));

            if mode == SearchMode::Timeline {
                for entry in result.timeline() {
                    output.push_str(&format!("  {} ", entry.chapter_title.cyan()));
                    output.push_str(&self.match_line(entry.hit));
                }
                continue;
            }

            for chapter in &result.chapters {
                output.push_str(&format!(
                    "  {} {}\n",
                    chapter.chapter_title.cyan(),
                    format!("({})", chapter.count).dimmed()
                ));
                for hit in &chapter.matches {
                    output.push_str("    ");
                    output.push_str(&self.match_line(hit));
                }
            }
        }
        output
    }

    fn match_line(&self, hit: &SearchMatch) -> String {
        if !self.include_context {
            return format!("{}\n", format!("line {}", hit.line_number).dimmed());
        }
        let (before, matched, after) = split_context(hit);
        format!(
            "{} │ {}{}{}\n",
            hit.line_number.to_string().yellow(),
            before,
            matched.yellow().bold(),
            after
        )
    }

    fn search_markdown(&self, summary: &SearchSummary, query: &str, mode: SearchMode) -> String {
        let mut output = String::new();
        output.push_str("# novelscan Search Results\n\n");
        output.push_str(&format!("**Query:** `{query}`\n"));
        output.push_str(&format!("**Mode:** {mode}\n"));
        output.push_str(&format!("**Total Matches:** {}\n\n", summary.total_matches));

        for result in &summary.results {
            output.push_str(&book_markdown(result, self.include_context));
        }
        output
    }
}

fn book_markdown(result: &BookSearchResult, include_context: bool) -> String {
    let mut output = format!("## {}\n\n", result.book_title);
    if let Some(error) = &result.error {
        output.push_str(&format!("> {error}\n\n"));
        return output;
    }
    output.push_str("| Chapter | Matches |\n|---|---|\n");
    for chapter in &result.chapters {
        output.push_str(&format!(
            "| {} | {} |\n",
            chapter.chapter_title.replace('|', "\\|"),
            chapter.count
        ));
    }
    output.push('\n');

    if include_context {
        for chapter in &result.chapters {
            for hit in &chapter.matches {
                let (before, matched, after) = split_context(hit);
                output.push_str(&format!(
                    "- {} (line {}): {}**{}**{}\n",
                    chapter.chapter_title, hit.line_number, before, matched, after
                ));
            }
        }
        output.push('\n');
    }
    output
}

/// Context split around the hit, by char offsets.
fn split_context(hit: &SearchMatch) -> (&str, &str, &str) {
    let context = hit.context.as_str();
    let start = crate::text::char_to_byte(context, hit.match_offset);
    let end = start + crate::text::char_to_byte(&context[start..], hit.match_length);
    (&context[..start], &context[start..end], &context[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::ChapterSearchResult;

    fn summary() -> SearchSummary {
        SearchSummary {
            task_id: 1,
            total_matches: 2,
            total_chapters_with_matches: 1,
            results: vec![BookSearchResult {
                book_id: "id".into(),
                book_title: "长夜".into(),
                total_matches: 2,
                total_chapters_with_matches: 1,
                chapters: vec![ChapterSearchResult {
                    chapter_index: 0,
                    chapter_title: "第1章 起".into(),
                    count: 2,
                    matches: vec![SearchMatch {
                        position: 10,
                        line_number: 2,
                        context: "...他拔出了剑。".into(),
                        match_offset: 7,
                        match_length: 1,
                    }],
                }],
                truncated: false,
                error: None,
            }],
        }
    }

    #[test]
    fn json_is_camel_case() {
        let out = OutputFormatter::new(OutputFormat::Json)
            .format_search(&summary(), "剑", SearchMode::Detailed)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["totalMatches"], 2);
        assert_eq!(value["mode"], "detailed");
        assert_eq!(value["results"][0]["chapters"][0]["chapterTitle"], "第1章 起");
    }

    #[test]
    fn markdown_bolds_the_hit() {
        let out = OutputFormatter::new(OutputFormat::Markdown)
            .format_search(&summary(), "剑", SearchMode::Detailed)
            .unwrap();
        assert!(out.contains("| 第1章 起 | 2 |"));
        assert!(out.contains("...他拔出了**剑**。"));
    }

    #[test]
    fn text_lists_books_and_chapters() {
        colored::control::set_override(false);
        let out = OutputFormatter::new(OutputFormat::Text)
            .format_search(&summary(), "剑", SearchMode::Overview)
            .unwrap();
        assert!(out.contains("Found 2 match(es) for '剑'"));
        assert!(out.contains("第1章 起 (2)"));
        assert!(out.contains("2 │ ...他拔出了剑。"));
    }

    #[test]
    fn context_can_be_left_out() {
        colored::control::set_override(false);
        let out = OutputFormatter::new(OutputFormat::Text)
            .with_context(false)
            .format_search(&summary(), "剑", SearchMode::Detailed)
            .unwrap();
        assert!(out.contains("line 2"));
        assert!(!out.contains("拔出"));
    }

    #[test]
    fn split_uses_char_offsets() {
        let summary = summary();
        let hit = &summary.results[0].chapters[0].matches[0];
        assert_eq!(split_context(hit), ("...他拔出了", "剑", "。"));
    }
}
