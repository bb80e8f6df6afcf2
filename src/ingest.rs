//! Raw bytes to a searchable book: detect, decode, extract, segment.
use crate::chapter::{
    count_matching_lines, detect_best_pattern, detect_chapters, extract_book_info,
    title_from_filename, Chapter, HeadingPatterns,
};
use crate::config::{Config, SegmentationConfig};
use crate::decoder::{decode, CanonicalText};
use crate::encoding::{utf8, Encoding, EncodingDetector};
use crate::error::{NovelscanError, Result};
use crate::search::Searchable;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Bytes inspected by [`Ingestor::preview`].
pub const PREVIEW_BYTES: usize = 100 * 1024;

/// A document as selected by the user, before decoding.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl RawDocument {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| NovelscanError::FileProcessing {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(bytes, filename))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    Reading,
    DetectingEncoding,
    Decoding,
    ExtractingInfo,
    DetectingChapters,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseStage::Reading => "reading",
            ParseStage::DetectingEncoding => "detecting_encoding",
            ParseStage::Decoding => "decoding",
            ParseStage::ExtractingInfo => "extracting_info",
            ParseStage::DetectingChapters => "detecting_chapters",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub encoding: Encoding,
    pub encoding_confidence: f64,
    pub file_size: usize,
    pub total_chapters: usize,
    pub total_characters: usize,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(skip)]
    pub content: CanonicalText,
    pub chapters: Vec<Chapter>,
    pub metadata: BookMetadata,
}

impl BookRecord {
    pub fn chapter_content(&self, index: usize) -> Option<&str> {
        self.chapters
            .get(index)
            .map(|chapter| chapter.content(self.content.as_str()))
    }
}

impl Searchable for BookRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn content(&self) -> &str {
        self.content.as_str()
    }

    fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    fn char_len(&self) -> usize {
        self.content.char_len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub title: String,
    pub author: String,
    pub encoding: Encoding,
    pub confidence: f64,
    pub estimated_chapters: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_pattern: Option<String>,
}

pub struct Ingestor {
    detector: EncodingDetector,
    patterns: HeadingPatterns,
    segmentation: SegmentationConfig,
}

impl Ingestor {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            detector: EncodingDetector::new(config.detection.clone()),
            patterns: HeadingPatterns::from_config(&config.segmentation)?,
            segmentation: config.segmentation.clone(),
        })
    }

    pub fn patterns(&self) -> &HeadingPatterns {
        &self.patterns
    }

    /// Runs the whole pipeline. `declared` overrides detection; unknown labels
    /// decode as UTF-8. Every stage reports 0 and 100 through `on_progress`.
    pub fn ingest<F>(
        &self,
        raw: &RawDocument,
        declared: Option<&str>,
        mut on_progress: F,
    ) -> BookRecord
    where
        F: FnMut(ParseStage, u8),
    {
        on_progress(ParseStage::Reading, 0);
        let file_size = raw.len();
        on_progress(ParseStage::Reading, 100);

        on_progress(ParseStage::DetectingEncoding, 0);
        let (encoding, confidence) = match declared {
            Some(label) => match Encoding::from_label(label) {
                Some(encoding) => (encoding, 1.0),
                None => {
                    warn!("Unknown encoding label '{label}', decoding as UTF-8");
                    (Encoding::Utf8, 1.0)
                }
            },
            None => {
                let guess = self.detector.detect(&raw.bytes);
                (guess.encoding, guess.confidence)
            }
        };
        debug!("{}: {} ({:.2})", raw.filename, encoding, confidence);
        on_progress(ParseStage::DetectingEncoding, 100);

        on_progress(ParseStage::Decoding, 0);
        let content = decode(&raw.bytes, encoding);
        on_progress(ParseStage::Decoding, 100);

        on_progress(ParseStage::ExtractingInfo, 0);
        let info = extract_book_info(content.as_str(), self.segmentation.header_chars);
        let title = if info.title.is_empty() {
            title_from_filename(&raw.filename)
        } else {
            info.title
        };
        on_progress(ParseStage::ExtractingInfo, 100);

        on_progress(ParseStage::DetectingChapters, 0);
        let mut chapters = detect_chapters(content.as_str(), &self.patterns, &self.segmentation);
        if chapters.is_empty() && self.segmentation.whole_document_fallback && !content.is_empty() {
            debug!("{}: no headings, using a single chapter", raw.filename);
            chapters.push(Chapter {
                index: 0,
                title: self.segmentation.fallback_title.clone(),
                start: 0,
                end: content.char_len() - 1,
            });
        }
        on_progress(ParseStage::DetectingChapters, 100);

        info!(
            "Imported '{}' ({} chapters, {} chars, {})",
            title,
            chapters.len(),
            content.char_len(),
            encoding
        );

        let metadata = BookMetadata {
            encoding,
            encoding_confidence: confidence,
            file_size,
            total_chapters: chapters.len(),
            total_characters: content.char_len(),
            imported_at: Utc::now(),
        };
        BookRecord {
            id: Uuid::new_v4().to_string(),
            title,
            author: info.author,
            content,
            chapters,
            metadata,
        }
    }

    pub fn ingest_path<F>(
        &self,
        path: &Path,
        declared: Option<&str>,
        on_progress: F,
    ) -> Result<BookRecord>
    where
        F: FnMut(ParseStage, u8),
    {
        let raw = RawDocument::read(path)?;
        Ok(self.ingest(&raw, declared, on_progress))
    }

    /// Quick look at a document from its first [`PREVIEW_BYTES`].
    ///
    /// `file_size` is the size of the whole document; when `bytes` is only its
    /// prefix, the chapter count is scaled up accordingly.
    pub fn preview(&self, bytes: &[u8], filename: &str, file_size: usize) -> Preview {
        let mut head = &bytes[..bytes.len().min(PREVIEW_BYTES)];
        let guess = self.detector.detect(head);
        if guess.encoding == Encoding::Utf8 {
            // drop a sequence cut in half by the preview boundary
            head = &head[..utf8::validate(head).complete_len];
        }
        let decoded = decode(head, guess.encoding);
        let text = decoded.as_str();

        let info = extract_book_info(text, self.segmentation.header_chars);
        let best = detect_best_pattern(
            text,
            &self.patterns,
            self.segmentation.best_pattern_sample_bytes,
        );
        let mut estimated_chapters = best.map_or(0, |pattern| count_matching_lines(text, pattern));
        if file_size > head.len() && !head.is_empty() {
            let scale = file_size as f64 / head.len() as f64;
            estimated_chapters = (estimated_chapters as f64 * scale).round() as usize;
        }

        Preview {
            title: if info.title.is_empty() {
                title_from_filename(filename)
            } else {
                info.title
            },
            author: info.author,
            encoding: guess.encoding,
            confidence: guess.confidence,
            estimated_chapters,
            best_pattern: best.map(|p| p.name.clone()),
        }
    }

    pub fn preview_path(&self, path: &Path) -> Result<Preview> {
        let raw = RawDocument::read(path)?;
        Ok(self.preview(&raw.bytes, &raw.filename, raw.len()))
    }
}
