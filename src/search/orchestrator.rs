//! Runs multi-book searches on a worker thread and streams tagged events.
//!
//! Each search gets a fresh task id which becomes the orchestrator's current
//! id. Cancelling (or starting another search) swaps that id out; the worker
//! compares it before every emit and stops at the first mismatch, sending a
//! single `Cancelled` for its own id. Events are filtered by id on the
//! receiving side so a superseded task can never leak into a newer one.
use super::engine::{ScanOutcome, SearchEngine};
use super::{BookSearchResult, SearchMode, SearchOptions, Searchable};
use crate::config::Config;
use crate::error::{NovelscanError, Result};
use crate::metrics::Metrics;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type TaskId = u64;

/// Value of the current id while no search is active.
pub const NO_TASK: TaskId = 0;

const SEND_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SearchEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        task_id: TaskId,
        total_books: usize,
        mode: SearchMode,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        task_id: TaskId,
        book_id: String,
        progress: u8,
    },
    #[serde(rename_all = "camelCase")]
    Partial {
        task_id: TaskId,
        result: BookSearchResult,
        book_index: usize,
        total_books: usize,
    },
    #[serde(rename_all = "camelCase")]
    BookComplete {
        task_id: TaskId,
        book_index: usize,
        total_books: usize,
        overall_progress: u8,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        task_id: TaskId,
        results: Vec<BookSearchResult>,
        total_matches: usize,
        total_chapters_with_matches: usize,
    },
    #[serde(rename_all = "camelCase")]
    Cancelled { task_id: TaskId },
}

impl SearchEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            SearchEvent::Started { task_id, .. }
            | SearchEvent::Progress { task_id, .. }
            | SearchEvent::Partial { task_id, .. }
            | SearchEvent::BookComplete { task_id, .. }
            | SearchEvent::Complete { task_id, .. }
            | SearchEvent::Cancelled { task_id } => *task_id,
        }
    }

    /// `Complete` and `Cancelled` end a task's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchEvent::Complete { .. } | SearchEvent::Cancelled { .. }
        )
    }
}

pub struct SearchRequest {
    pub books: Vec<Arc<dyn Searchable>>,
    pub query: String,
    pub options: SearchOptions,
    pub mode: SearchMode,
}

impl SearchRequest {
    pub fn new(books: Vec<Arc<dyn Searchable>>, query: impl Into<String>) -> Self {
        Self {
            books,
            query: query.into(),
            options: SearchOptions::default(),
            mode: SearchMode::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Final outcome of a completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub task_id: TaskId,
    pub results: Vec<BookSearchResult>,
    pub total_matches: usize,
    pub total_chapters_with_matches: usize,
}

/// Cancels tasks from another thread, e.g. a signal handler.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    current: Arc<AtomicU64>,
}

impl CancelHandle {
    /// Invalidates `task_id` if it is still current. Idempotent; returns
    /// whether this call did the invalidating.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        task_id != NO_TASK
            && self
                .current
                .compare_exchange(task_id, NO_TASK, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    pub fn current(&self) -> Option<TaskId> {
        match self.current.load(Ordering::SeqCst) {
            NO_TASK => None,
            id => Some(id),
        }
    }
}

pub struct SearchOrchestrator {
    current: Arc<AtomicU64>,
    next_id: AtomicU64,
    sender: Sender<SearchEvent>,
    receiver: Receiver<SearchEvent>,
    /// Started tasks whose terminal event has not been received yet.
    live: Mutex<HashSet<TaskId>>,
    metrics: Arc<Metrics>,
    regex_size_limit: usize,
}

impl SearchOrchestrator {
    pub fn new() -> Result<Self> {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        let (sender, receiver) = bounded(config.orchestrator.channel_capacity.max(1));
        Ok(Self {
            current: Arc::new(AtomicU64::new(NO_TASK)),
            next_id: AtomicU64::new(NO_TASK + 1),
            sender,
            receiver,
            live: Mutex::new(HashSet::new()),
            metrics: Arc::new(Metrics::new()?),
            regex_size_limit: config.search.regex_size_limit,
        })
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            current: Arc::clone(&self.current),
        }
    }

    pub fn is_current(&self, task_id: TaskId) -> bool {
        task_id != NO_TASK && self.current.load(Ordering::SeqCst) == task_id
    }

    /// Starts `request` on a new worker thread. Any running task is
    /// superseded and winds down with a `Cancelled` event.
    pub fn start(&self, request: SearchRequest) -> Result<TaskId> {
        let task_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let previous = self.current.swap(task_id, Ordering::SeqCst);
        if previous != NO_TASK {
            debug!("Task {previous} superseded by task {task_id}");
        }
        self.metrics.searches_started.inc();
        info!(
            "Task {}: searching {} book(s) for '{}' ({} mode)",
            task_id,
            request.books.len(),
            request.query,
            request.mode
        );

        let worker = Worker {
            task_id,
            current: Arc::clone(&self.current),
            sender: self.sender.clone(),
            metrics: Arc::clone(&self.metrics),
            regex_size_limit: self.regex_size_limit,
            cancelled_sent: Cell::new(false),
            completed: Cell::new(false),
        };
        self.live.lock().insert(task_id);
        let spawned = thread::Builder::new()
            .name(format!("search-{task_id}"))
            .spawn(move || worker.run(request));
        if let Err(e) = spawned {
            self.live.lock().remove(&task_id);
            return Err(e.into());
        }

        Ok(task_id)
    }

    /// Fire-and-forget cancellation.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let cancelled = self.cancel_handle().cancel(task_id);
        if cancelled {
            info!("Task {task_id} cancelled");
        }
        cancelled
    }

    /// Next event of `task_id`, discarding events of any other task.
    ///
    /// Returns `None` at once for an id that was never started or whose
    /// terminal event was already received, so a stale id cannot swallow the
    /// events of a newer task. Events are consumed from a single queue: read
    /// them from one thread at a time.
    pub fn next_event(&self, task_id: TaskId) -> Option<SearchEvent> {
        loop {
            if !self.live.lock().contains(&task_id) {
                return None;
            }
            let event = self.receiver.recv().ok()?;
            if event.is_terminal() {
                self.live.lock().remove(&event.task_id());
            }
            if event.task_id() == task_id {
                return Some(event);
            }
            debug!("Discarding stale event of task {}", event.task_id());
        }
    }

    /// Events of `task_id` up to and including its terminal event. Empty for
    /// ids that are not live, see [`next_event`](Self::next_event).
    pub fn events(&self, task_id: TaskId) -> impl Iterator<Item = SearchEvent> + '_ {
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            let event = self.next_event(task_id)?;
            done = event.is_terminal();
            Some(event)
        })
    }

    /// Blocks until `task_id` completes. An id that is not live fails right
    /// away instead of blocking.
    pub fn wait(&self, task_id: TaskId) -> Result<SearchSummary> {
        for event in self.events(task_id) {
            match event {
                SearchEvent::Complete {
                    task_id,
                    results,
                    total_matches,
                    total_chapters_with_matches,
                } => {
                    return Ok(SearchSummary {
                        task_id,
                        results,
                        total_matches,
                        total_chapters_with_matches,
                    })
                }
                SearchEvent::Cancelled { task_id } => return Err(NovelscanError::Cancelled(task_id)),
                _ => {}
            }
        }
        Err(NovelscanError::Other(format!(
            "no events pending for task {task_id}"
        )))
    }

    pub fn search(&self, request: SearchRequest) -> Result<SearchSummary> {
        let task_id = self.start(request)?;
        self.wait(task_id)
    }
}

struct Worker {
    task_id: TaskId,
    current: Arc<AtomicU64>,
    sender: Sender<SearchEvent>,
    metrics: Arc<Metrics>,
    regex_size_limit: usize,
    cancelled_sent: Cell<bool>,
    completed: Cell<bool>,
}

impl Worker {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.task_id
    }

    /// Sends `event` while the task is current. Returns false, after
    /// announcing the cancellation, once it no longer is.
    fn emit(&self, mut event: SearchEvent) -> bool {
        loop {
            if !self.is_current() {
                self.send_cancelled();
                return false;
            }
            match self.sender.send_timeout(event, SEND_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => event = returned,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    fn send_cancelled(&self) {
        if self.cancelled_sent.replace(true) {
            return;
        }
        self.metrics.searches_cancelled.inc();
        debug!("Task {} stopping", self.task_id);
        let _ = self.sender.send(SearchEvent::Cancelled {
            task_id: self.task_id,
        });
    }

    fn run(self, request: SearchRequest) {
        let total_books = request.books.len();
        let started = SearchEvent::Started {
            task_id: self.task_id,
            total_books,
            mode: request.mode,
        };
        if !self.emit(started) {
            return;
        }

        let engine = SearchEngine::new(
            &request.query,
            request.options.clone(),
            request.mode,
            self.regex_size_limit,
        )
        .map_err(|e| {
            warn!("Task {}: {}", self.task_id, e);
            e.to_string()
        });

        let mut results = Vec::new();
        for (book_index, book) in request.books.iter().enumerate() {
            if !self.is_current() {
                self.send_cancelled();
                return;
            }

            let result = match &engine {
                Ok(engine) => {
                    let outcome = engine.search_with(
                        book.as_ref(),
                        || !self.is_current(),
                        |progress| {
                            self.emit(SearchEvent::Progress {
                                task_id: self.task_id,
                                book_id: book.id().to_string(),
                                progress,
                            });
                        },
                    );
                    match outcome {
                        ScanOutcome::Completed(result) => result,
                        ScanOutcome::Cancelled => {
                            self.send_cancelled();
                            return;
                        }
                    }
                }
                Err(message) => {
                    self.metrics.pattern_errors.inc();
                    BookSearchResult::failed(book.as_ref(), message.clone())
                }
            };

            self.metrics.books_searched.inc();
            self.metrics.matches_found.inc_by(result.total_matches as u64);

            if result.total_matches > 0 || result.is_error() {
                results.push(result.clone());
                let partial = SearchEvent::Partial {
                    task_id: self.task_id,
                    result,
                    book_index,
                    total_books,
                };
                if !self.emit(partial) {
                    return;
                }
            }

            let book_complete = SearchEvent::BookComplete {
                task_id: self.task_id,
                book_index,
                total_books,
                overall_progress: ((book_index + 1) * 100 / total_books) as u8,
            };
            if !self.emit(book_complete) {
                return;
            }
        }

        let total_matches = results.iter().map(|r| r.total_matches).sum();
        let total_chapters_with_matches = results.iter().map(|r| r.total_chapters_with_matches).sum();
        let complete = SearchEvent::Complete {
            task_id: self.task_id,
            results,
            total_matches,
            total_chapters_with_matches,
        };
        if self.emit(complete) {
            self.completed.set(true);
            self.metrics.searches_completed.inc();
            info!("Task {}: {} match(es)", self.task_id, total_matches);
            let _ = self.current.compare_exchange(
                self.task_id,
                NO_TASK,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }
}

/// A worker that unwinds or returns without a terminal event still ends its
/// stream with `Cancelled`.
impl Drop for Worker {
    fn drop(&mut self) {
        if self.completed.get() || self.cancelled_sent.get() {
            return;
        }
        if thread::panicking() {
            warn!("Task {}: worker panicked", self.task_id);
        }
        let _ = self.current.compare_exchange(
            self.task_id,
            NO_TASK,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.send_cancelled();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{segment, HeadingPatterns};
    use crate::search::SearchDocument;

    fn doc(id: &str, text: &str) -> Arc<dyn Searchable> {
        let chapters = segment(text, &HeadingPatterns::default());
        Arc::new(SearchDocument::new(id, id, text, chapters))
    }

    #[test]
    fn events_serialize_with_type_tags() {
        let event = SearchEvent::BookComplete {
            task_id: 3,
            book_index: 0,
            total_books: 2,
            overall_progress: 50,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "bookComplete");
        assert_eq!(json["overallProgress"], 50);
        assert_eq!(json["taskId"], 3);
    }

    #[test]
    fn task_ids_are_unique_and_nonzero() {
        let orchestrator = SearchOrchestrator::new().unwrap();
        let a = orchestrator
            .start(SearchRequest::new(vec![doc("a", "第1章\n剑")], "剑"))
            .unwrap();
        let b = orchestrator
            .start(SearchRequest::new(vec![doc("a", "第1章\n剑")], "剑"))
            .unwrap();
        assert_ne!(a, NO_TASK);
        assert_ne!(a, b);
        assert!(orchestrator.wait(b).is_ok());
    }

    #[test]
    fn zero_match_books_are_not_streamed() {
        let orchestrator = SearchOrchestrator::new().unwrap();
        let request = SearchRequest::new(
            vec![doc("hit", "第1章\n剑来"), doc("miss", "第1章\n刀来")],
            "剑",
        );
        let task = orchestrator.start(request).unwrap();
        let events: Vec<SearchEvent> = orchestrator.events(task).collect();

        let partials = events
            .iter()
            .filter(|e| matches!(e, SearchEvent::Partial { .. }))
            .count();
        let completes: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::BookComplete {
                    overall_progress, ..
                } => Some(*overall_progress),
                _ => None,
            })
            .collect();
        assert_eq!(partials, 1);
        assert_eq!(completes, vec![50, 100]);
        assert!(matches!(events.first(), Some(SearchEvent::Started { total_books: 2, .. })));
        assert!(matches!(
            events.last(),
            Some(SearchEvent::Complete { total_matches: 1, .. })
        ));
    }

    #[test]
    fn invalid_pattern_marks_every_book() {
        let orchestrator = SearchOrchestrator::new().unwrap();
        let request = SearchRequest::new(vec![doc("a", "第1章\n剑"), doc("b", "第1章\n剑")], "(")
            .with_options(SearchOptions {
                use_regex: true,
                ..SearchOptions::default()
            });
        let summary = orchestrator.search(request).unwrap();
        assert_eq!(summary.results.len(), 2);
        assert!(summary.results.iter().all(|r| r.error.is_some()));
        assert_eq!(summary.total_matches, 0);
        assert_eq!(orchestrator.metrics().pattern_errors.get(), 2);
    }

    #[test]
    fn finished_and_unknown_ids_do_not_block() {
        let orchestrator = SearchOrchestrator::new().unwrap();
        let task = orchestrator
            .start(SearchRequest::new(vec![doc("a", "第1章\n剑")], "剑"))
            .unwrap();
        assert_eq!(orchestrator.wait(task).unwrap().total_matches, 1);

        assert!(orchestrator.next_event(task).is_none());
        assert_eq!(orchestrator.events(task).count(), 0);
        assert!(orchestrator.next_event(999).is_none());
        assert!(orchestrator.next_event(NO_TASK).is_none());
        assert!(matches!(orchestrator.wait(999), Err(NovelscanError::Other(_))));
    }

    #[test]
    fn stale_id_leaves_newer_events_queued() {
        let orchestrator = SearchOrchestrator::new().unwrap();
        let first = orchestrator
            .start(SearchRequest::new(vec![doc("a", "第1章\n剑")], "剑"))
            .unwrap();
        orchestrator.wait(first).unwrap();

        let second = orchestrator
            .start(SearchRequest::new(vec![doc("b", "第1章\n剑剑")], "剑"))
            .unwrap();
        assert!(orchestrator.next_event(first).is_none());
        assert_eq!(orchestrator.wait(second).unwrap().total_matches, 2);
    }

    #[test]
    fn cancel_is_idempotent() {
        let orchestrator = SearchOrchestrator::new().unwrap();
        let handle = orchestrator.cancel_handle();
        assert!(!handle.cancel(NO_TASK));
        assert!(!orchestrator.cancel(42));
    }
}
