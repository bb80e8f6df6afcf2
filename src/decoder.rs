use crate::encoding::{detect_encoding, Encoding, EncodingGuess};
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

/// Decoded document text. Immutable once built; every chapter span and search
/// offset refers to chars of this string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalText {
    text: String,
    encoding: Encoding,
    had_replacements: bool,
    #[serde(skip)]
    char_len: usize,
}

impl CanonicalText {
    pub fn new(text: String, encoding: Encoding, had_replacements: bool) -> Self {
        let char_len = text.chars().count();
        Self {
            text,
            encoding,
            had_replacements,
            char_len,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Whether any byte sequence had to be replaced with U+FFFD.
    pub fn had_replacements(&self) -> bool {
        self.had_replacements
    }

    /// Length in chars.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl AsRef<str> for CanonicalText {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for CanonicalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Decodes the full document. Unmappable sequences become U+FFFD and a BOM
/// belonging to `encoding` is dropped.
pub fn decode(bytes: &[u8], encoding: Encoding) -> CanonicalText {
    let (text, had_replacements) = encoding.codec().decode_with_bom_removal(bytes);
    if had_replacements {
        warn!("Lossy decode: {encoding} could not map every byte sequence");
    }
    debug!("Decoded {} bytes as {encoding}", bytes.len());
    CanonicalText::new(text.into_owned(), encoding, had_replacements)
}

/// Decodes with a user-supplied label, falling back to UTF-8 for labels that
/// are not recognised.
pub fn decode_with_label(bytes: &[u8], label: &str) -> CanonicalText {
    let encoding = Encoding::from_label(label).unwrap_or_else(|| {
        warn!("Unknown encoding label '{label}', decoding as UTF-8");
        Encoding::Utf8
    });
    decode(bytes, encoding)
}

/// Detects, then decodes.
pub fn decode_auto(bytes: &[u8]) -> (CanonicalText, EncodingGuess) {
    let guess = detect_encoding(bytes);
    (decode(bytes, guess.encoding), guess)
}
