use crate::ingest::ParseStage;
use crate::search::SearchEvent;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub books_imported: usize,
    pub books_searched: usize,
    pub matches_found: usize,
    start_time: Instant,
}

impl ProgressStats {
    fn new() -> Self {
        Self {
            books_imported: 0,
            books_searched: 0,
            matches_found: 0,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// Terminal progress for imports and searches.
pub struct ProgressReporter {
    pub multi_progress: Arc<MultiProgress>,
    pub main_progress: ProgressBar,
    pub stats: Arc<Mutex<ProgressStats>>,
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

impl ProgressReporter {
    /// The main bar counts percent points across all `total_books`.
    pub fn new(total_books: usize) -> Self {
        let multi_progress = Arc::new(MultiProgress::new());
        let style = bar_style(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {prefix}\n{msg}",
        );

        let main_progress = multi_progress.add(ProgressBar::new(100));
        main_progress.set_style(style);
        main_progress.set_prefix(format!("{total_books} book(s)"));

        Self {
            multi_progress,
            main_progress,
            stats: Arc::new(Mutex::new(ProgressStats::new())),
        }
    }

    /// Bar that follows the ingestion stages of one file.
    pub fn create_import_bar(&self, name: &str) -> ProgressBar {
        let pb = ProgressBar::new(100);
        pb.set_style(bar_style("{prefix:.bold} {bar:30.green/white} {msg}"));
        pb.set_prefix(name.to_string());
        self.multi_progress.add(pb)
    }

    pub fn import_stage(&self, bar: &ProgressBar, stage: ParseStage, percent: u8) {
        bar.set_message(stage.to_string());
        let stage_index = stage as u64;
        bar.set_position(stage_index * 20 + u64::from(percent) / 5);
    }

    pub fn finish_import(&self, bar: &ProgressBar, summary: &str) {
        self.stats.lock().books_imported += 1;
        bar.finish_with_message(summary.to_string());
    }

    /// Updates the main bar from a search event.
    pub fn on_search_event(&self, event: &SearchEvent) {
        match event {
            SearchEvent::Progress {
                book_id, progress, ..
            } => {
                self.main_progress
                    .set_message(format!("{book_id}: {progress}%"));
            }
            SearchEvent::Partial { result, .. } => {
                self.stats.lock().matches_found += result.total_matches;
            }
            SearchEvent::BookComplete {
                overall_progress, ..
            } => {
                let mut stats = self.stats.lock();
                stats.books_searched += 1;
                self.main_progress.set_position(u64::from(*overall_progress));
                self.update_message(&stats);
            }
            _ => {}
        }
    }

    fn update_message(&self, stats: &ProgressStats) {
        self.main_progress.set_message(format!(
            "Books: {} | Matches: {}",
            stats.books_searched, stats.matches_found
        ));
    }

    pub fn finish(self) -> ProgressStats {
        let stats = self.stats.lock().clone();
        self.main_progress.finish_with_message(format!(
            "Completed in {:.2}s: {} book(s), {} match(es)",
            stats.elapsed_secs(),
            stats.books_searched,
            stats.matches_found
        ));
        stats
    }

    pub fn abandon(self, message: &str) {
        self.main_progress.abandon_with_message(message.to_string());
    }
}
