//! Encoding-aware ingestion of plain-text novels, chapter segmentation and
//! cancellable full-text search across a library of books.
pub mod chapter;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod output_formats;
pub mod progress;
pub mod search;
pub mod text;

pub use crate::chapter::{detect_chapters, segment, Chapter, HeadingPattern, HeadingPatterns};
pub use crate::config::Config;
pub use crate::decoder::{decode, decode_auto, CanonicalText};
pub use crate::encoding::{detect_encoding, Encoding, EncodingDetector, EncodingGuess};
pub use crate::error::{NovelscanError, Result};
pub use crate::ingest::{BookRecord, Ingestor, Preview, RawDocument};
pub use crate::search::{
    extract_context, BookSearchResult, SearchEngine, SearchEvent, SearchMode, SearchOptions,
    SearchOrchestrator, SearchRequest, SearchSummary, Searchable,
};
