use crossbeam_channel::{bounded, Receiver, Sender};
use novelscan::chapter::{segment, Chapter, HeadingPatterns};
use novelscan::search::{
    SearchDocument, SearchEvent, SearchMode, SearchOrchestrator, SearchRequest, Searchable,
};
use novelscan::NovelscanError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A book whose text only becomes readable once the test opens the gate,
/// so a task can be cancelled at a known point.
struct GatedBook {
    inner: SearchDocument,
    gate: Receiver<()>,
    opened: AtomicBool,
}

impl GatedBook {
    fn new(id: &str, text: &str) -> (Arc<Self>, Sender<()>) {
        let (open, gate) = bounded(1);
        let chapters = segment(text, &HeadingPatterns::default());
        let book = GatedBook {
            inner: SearchDocument::new(id, id, text, chapters),
            gate,
            opened: AtomicBool::new(false),
        };
        (Arc::new(book), open)
    }
}

impl Searchable for GatedBook {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn title(&self) -> &str {
        &self.inner.title
    }

    fn content(&self) -> &str {
        if !self.opened.swap(true, Ordering::SeqCst) {
            let _ = self.gate.recv();
        }
        &self.inner.content
    }

    fn chapters(&self) -> &[Chapter] {
        &self.inner.chapters
    }
}

fn plain(id: &str, text: &str) -> Arc<dyn Searchable> {
    let chapters = segment(text, &HeadingPatterns::default());
    Arc::new(SearchDocument::new(id, id, text, chapters))
}

const TEXT: &str = "第1章 雨夜\n他听见了雨声。\n第2章 天明\n雨停了，他还在听雨。\n";

#[test]
fn cancelled_task_stops_without_partials() {
    let orchestrator = SearchOrchestrator::new().unwrap();
    let (gated, open) = GatedBook::new("gated", TEXT);
    let request = SearchRequest::new(vec![gated as Arc<dyn Searchable>, plain("p", TEXT)], "雨");
    let task = orchestrator.start(request).unwrap();

    assert!(matches!(
        orchestrator.next_event(task),
        Some(SearchEvent::Started { total_books: 2, .. })
    ));

    assert!(orchestrator.cancel(task));
    assert!(!orchestrator.cancel(task));
    assert!(!orchestrator.cancel_handle().cancel(task));
    assert_eq!(orchestrator.cancel_handle().current(), None);
    open.send(()).unwrap();

    let rest: Vec<SearchEvent> = std::iter::from_fn(|| orchestrator.next_event(task))
        .take_while(|e| !matches!(e, SearchEvent::Cancelled { .. }))
        .collect();
    assert!(rest.iter().all(|e| !matches!(
        e,
        SearchEvent::Partial { .. } | SearchEvent::BookComplete { .. } | SearchEvent::Complete { .. }
    )));
    assert_eq!(orchestrator.metrics().searches_cancelled.get(), 1);
    assert_eq!(orchestrator.metrics().searches_completed.get(), 0);
}

#[test]
fn wait_reports_cancellation() {
    let orchestrator = SearchOrchestrator::new().unwrap();
    let (gated, open) = GatedBook::new("gated", TEXT);
    let task = orchestrator
        .start(SearchRequest::new(vec![gated as Arc<dyn Searchable>], "雨"))
        .unwrap();
    orchestrator.cancel(task);
    open.send(()).unwrap();

    match orchestrator.wait(task) {
        Err(NovelscanError::Cancelled(id)) => assert_eq!(id, task),
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[test]
fn new_search_supersedes_the_running_one() {
    let orchestrator = SearchOrchestrator::new().unwrap();
    let (gated, open) = GatedBook::new("old", TEXT);
    let old = orchestrator
        .start(SearchRequest::new(vec![gated as Arc<dyn Searchable>], "雨"))
        .unwrap();
    let new = orchestrator
        .start(SearchRequest::new(vec![plain("new", TEXT)], "天明").with_mode(SearchMode::Detailed))
        .unwrap();
    assert!(!orchestrator.is_current(old));
    assert!(orchestrator.is_current(new));
    open.send(()).unwrap();

    let summary = orchestrator.wait(new).unwrap();
    assert_eq!(summary.task_id, new);
    assert_eq!(summary.total_matches, 1);
    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results[0].book_id, "new");
}

#[test]
fn totals_add_up_across_books() {
    let orchestrator = SearchOrchestrator::new().unwrap();
    let books = vec![
        plain("a", TEXT),
        plain("b", "第1章 晴\n万里无云。\n"),
        plain("c", "第1章 雨\n雨。\n"),
    ];
    let summary = orchestrator.search(SearchRequest::new(books, "雨")).unwrap();

    // headings count: 雨夜 in book a, 雨 in book c
    assert_eq!(summary.total_matches, 4 + 2);
    assert_eq!(summary.total_chapters_with_matches, 2 + 1);
    let ids: Vec<&str> = summary.results.iter().map(|r| r.book_id.as_str()).collect();
    assert_eq!(ids, ["a", "c"]);
    assert_eq!(orchestrator.metrics().books_searched.get(), 3);
    assert_eq!(orchestrator.metrics().matches_found.get(), 6);
}

#[test]
fn empty_request_completes() {
    let orchestrator = SearchOrchestrator::new().unwrap();
    let summary = orchestrator.search(SearchRequest::new(Vec::new(), "雨")).unwrap();
    assert!(summary.results.is_empty());
    assert_eq!(summary.total_matches, 0);
}

/// A book whose text cannot be read at all.
struct Unreadable;

impl Searchable for Unreadable {
    fn id(&self) -> &str {
        "unreadable"
    }

    fn title(&self) -> &str {
        "unreadable"
    }

    fn content(&self) -> &str {
        panic!("storage went away")
    }

    fn chapters(&self) -> &[Chapter] {
        &[]
    }
}

#[test]
fn crashed_worker_ends_with_cancelled() {
    let orchestrator = SearchOrchestrator::new().unwrap();
    let books: Vec<Arc<dyn Searchable>> = vec![plain("ok", TEXT), Arc::new(Unreadable)];
    let task = orchestrator.start(SearchRequest::new(books, "雨")).unwrap();

    let events: Vec<SearchEvent> = orchestrator.events(task).collect();
    assert!(matches!(events.last(), Some(SearchEvent::Cancelled { task_id }) if *task_id == task));
    assert!(!events.iter().any(|e| matches!(e, SearchEvent::Complete { .. })));
    assert_eq!(orchestrator.cancel_handle().current(), None);
    assert_eq!(orchestrator.metrics().searches_cancelled.get(), 1);

    // the orchestrator stays usable
    let summary = orchestrator.search(SearchRequest::new(vec![plain("again", TEXT)], "雨")).unwrap();
    assert_eq!(summary.total_matches, 4);
}
