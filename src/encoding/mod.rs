//! Source encoding inference for raw documents.
//!
//! Detection runs in two stages. A byte-order mark settles the question
//! outright; otherwise the sample is walked as strict UTF-8, and only when
//! that fails are legacy East Asian encodings trial-decoded and scored.
//! Legacy double-byte encodings overlap heavily with UTF-8 multi-byte
//! sequences, so the scoring looks at what the decode produced rather than
//! whether the decoder complained.
pub mod score;
pub mod utf8;

use crate::config::DetectionConfig;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use score::{score_decoded, DecodeStats};
pub use utf8::{validate, Utf8Report};

/// Encodings a document can be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "UTF-8")]
    Utf8,
    #[serde(rename = "UTF-16LE")]
    Utf16Le,
    #[serde(rename = "UTF-16BE")]
    Utf16Be,
    #[serde(rename = "GBK")]
    Gbk,
    #[serde(rename = "GB18030")]
    Gb18030,
    #[serde(rename = "Big5")]
    Big5,
    #[serde(rename = "Shift_JIS")]
    ShiftJis,
    #[serde(rename = "EUC-KR")]
    EucKr,
}

/// Legacy candidates, in tie-breaking order.
pub const LEGACY_CANDIDATES: [Encoding; 3] = [Encoding::Gbk, Encoding::Big5, Encoding::ShiftJis];

impl Encoding {
    pub fn label(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Gbk => "GBK",
            Encoding::Gb18030 => "GB18030",
            Encoding::Big5 => "Big5",
            Encoding::ShiftJis => "Shift_JIS",
            Encoding::EucKr => "EUC-KR",
        }
    }

    /// Resolves a user or detector supplied label.
    ///
    /// `iso-8859-1` and `windows-1252` resolve to GBK: on Chinese novels those
    /// labels are almost always a misdetection of GBK bytes.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        let encoding = match normalized.as_str() {
            "utf-8" | "utf8" | "ascii" | "us-ascii" => Encoding::Utf8,
            "utf-16le" | "utf16le" | "utf-16" => Encoding::Utf16Le,
            "utf-16be" | "utf16be" => Encoding::Utf16Be,
            "gbk" | "gb2312" | "cp936" | "windows-936" => Encoding::Gbk,
            "iso-8859-1" | "latin1" | "windows-1252" => Encoding::Gbk,
            "gb18030" => Encoding::Gb18030,
            "big5" | "big5-hkscs" => Encoding::Big5,
            "shift-jis" | "sjis" | "windows-31j" => Encoding::ShiftJis,
            "euc-kr" | "cp949" => Encoding::EucKr,
            _ => return None,
        };
        Some(encoding)
    }

    pub fn is_supported(label: &str) -> bool {
        Self::from_label(label).is_some()
    }

    pub(crate) fn codec(self) -> &'static encoding_rs::Encoding {
        match self {
            Encoding::Utf8 => encoding_rs::UTF_8,
            Encoding::Utf16Le => encoding_rs::UTF_16LE,
            Encoding::Utf16Be => encoding_rs::UTF_16BE,
            Encoding::Gbk => encoding_rs::GBK,
            Encoding::Gb18030 => encoding_rs::GB18030,
            Encoding::Big5 => encoding_rs::BIG5,
            Encoding::ShiftJis => encoding_rs::SHIFT_JIS,
            Encoding::EucKr => encoding_rs::EUC_KR,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Encoding {
    type Err = crate::error::NovelscanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
            .ok_or_else(|| crate::error::NovelscanError::Other(format!("unknown encoding: {s}")))
    }
}

/// Best guess for a document's encoding. Confidence is advisory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodingGuess {
    pub encoding: Encoding,
    pub confidence: f64,
}

impl EncodingGuess {
    fn new(encoding: Encoding, confidence: f64) -> Self {
        Self {
            encoding,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

pub fn detect_bom(bytes: &[u8]) -> Option<Encoding> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(Encoding::Utf8)
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some(Encoding::Utf16Le)
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some(Encoding::Utf16Be)
    } else {
        None
    }
}

/// Maps a score in [0, 1] onto a confidence in [0.5, 0.95], rising quickly
/// and flattening out near the top.
pub fn confidence_for_score(score: f64) -> f64 {
    const STEEPNESS: f64 = 3.0;
    let s = score.clamp(0.0, 1.0);
    let curve = (1.0 - (-STEEPNESS * s).exp()) / (1.0 - (-STEEPNESS).exp());
    0.5 + 0.45 * curve
}

pub struct EncodingDetector {
    config: DetectionConfig,
}

impl Default for EncodingDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

impl EncodingDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Guesses the encoding of a document from its leading bytes. Never fails.
    pub fn detect(&self, bytes: &[u8]) -> EncodingGuess {
        let sample = &bytes[..bytes.len().min(self.config.sample_size)];

        if let Some(encoding) = detect_bom(sample) {
            debug!("BOM found: {encoding}");
            return EncodingGuess::new(encoding, 1.0);
        }

        let report = utf8::validate(sample);
        let complete = &sample[..report.complete_len];
        let (utf8_text, _) = encoding_rs::UTF_8.decode_without_bom_handling(complete);

        if report.invalid_ratio() <= self.config.max_invalid_utf8_ratio
            && !utf8_text.contains('\u{FFFD}')
        {
            return EncodingGuess::new(Encoding::Utf8, 0.95);
        }
        debug!(
            "Sample is not clean UTF-8 ({} invalid of {} bytes), scoring legacy encodings",
            report.invalid_bytes, report.complete_len
        );

        let utf8_score = score::score_decoded(&utf8_text, &self.config);

        let mut best: Option<(Encoding, f64)> = None;
        for candidate in LEGACY_CANDIDATES {
            let (decoded, _) = candidate.codec().decode_without_bom_handling(sample);
            let candidate_score = score::score_decoded(&decoded, &self.config);
            debug!("{candidate} scored {candidate_score:.3}");
            if best.map_or(true, |(_, s)| candidate_score > s) {
                best = Some((candidate, candidate_score));
            }
        }
        debug!("UTF-8 scored {utf8_score:.3}");

        match best {
            Some((encoding, legacy_score))
                if legacy_score > self.config.legacy_floor
                    && legacy_score > utf8_score * self.config.legacy_ratio =>
            {
                EncodingGuess::new(encoding, confidence_for_score(legacy_score))
            }
            _ => EncodingGuess::new(Encoding::Utf8, confidence_for_score(utf8_score)),
        }
    }
}

/// Detects with the default thresholds.
pub fn detect_encoding(bytes: &[u8]) -> EncodingGuess {
    EncodingDetector::default().detect(bytes)
}
