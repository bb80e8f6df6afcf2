//! Strict UTF-8 validation that counts errors instead of stopping at the
//! first one, so a handful of stray bytes can be tolerated.

/// Outcome of walking a byte sample as UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8Report {
    /// Bytes that could not be part of any well-formed sequence.
    pub invalid_bytes: usize,
    /// Length of the prefix that ends on a sequence boundary. Shorter than
    /// the input only when the sample cuts a multi-byte sequence in half.
    pub complete_len: usize,
}

impl Utf8Report {
    pub fn invalid_ratio(&self) -> f64 {
        if self.complete_len == 0 {
            0.0
        } else {
            self.invalid_bytes as f64 / self.complete_len as f64
        }
    }
}

#[inline]
fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// Walks `bytes` with a full decoder state machine.
///
/// Overlong forms, surrogates, code points past U+10FFFF, isolated
/// continuation bytes and the lead bytes 0xC0, 0xC1 and 0xF5..=0xFF are all
/// counted as invalid. Each offending byte counts once and the walk resumes on
/// the following byte.
pub fn validate(bytes: &[u8]) -> Utf8Report {
    let len = bytes.len();
    let mut invalid = 0;
    let mut i = 0;

    while i < len {
        let lead = bytes[i];
        let (width, min, mut code_point) = match lead {
            0x00..=0x7F => {
                i += 1;
                continue;
            }
            0xC2..=0xDF => (2, 0x80, u32::from(lead & 0x1F)),
            0xE0..=0xEF => (3, 0x800, u32::from(lead & 0x0F)),
            0xF0..=0xF4 => (4, 0x1_0000, u32::from(lead & 0x07)),
            // continuation without a lead, 0xC0/0xC1, 0xF5..=0xFF
            _ => {
                invalid += 1;
                i += 1;
                continue;
            }
        };

        if i + width > len && bytes[i + 1..].iter().all(|&b| is_continuation(b)) {
            // Sample ends inside a sequence that may well be complete in the
            // full document.
            return Utf8Report {
                invalid_bytes: invalid,
                complete_len: i,
            };
        }

        let mut well_formed = true;
        for k in 1..width {
            match bytes.get(i + k) {
                Some(&b) if is_continuation(b) => {
                    code_point = (code_point << 6) | u32::from(b & 0x3F);
                }
                _ => {
                    well_formed = false;
                    break;
                }
            }
        }

        let in_range =
            code_point >= min && code_point <= 0x10_FFFF && !(0xD800..=0xDFFF).contains(&code_point);

        if well_formed && in_range {
            i += width;
        } else {
            invalid += 1;
            i += 1;
        }
    }

    Utf8Report {
        invalid_bytes: invalid,
        complete_len: len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_text() {
        let text = "第1章 开端 — naïve 🎉";
        let report = validate(text.as_bytes());
        assert_eq!(report.invalid_bytes, 0);
        assert_eq!(report.complete_len, text.len());
    }

    #[test]
    fn rejects_invalid_leads_and_isolated_continuations() {
        assert_eq!(validate(&[0xC0, 0xAF]).invalid_bytes, 2);
        assert_eq!(validate(&[0xC1, 0x81]).invalid_bytes, 2);
        assert_eq!(validate(&[b'a', 0x80, b'b']).invalid_bytes, 1);
        assert_eq!(validate(&[0xF5, 0x80, 0x80, 0x80]).invalid_bytes, 4);
        assert_eq!(validate(&[0xFF, b'x']).invalid_bytes, 1);
    }

    #[test]
    fn rejects_overlong_forms() {
        // U+0000 as three bytes
        assert_eq!(validate(&[0xE0, 0x80, 0x80]).invalid_bytes, 3);
        // U+FFFF as four bytes
        assert_eq!(validate(&[0xF0, 0x8F, 0xBF, 0xBF]).invalid_bytes, 4);
    }

    #[test]
    fn rejects_surrogates_and_out_of_range() {
        assert_eq!(validate(&[0xED, 0xA0, 0x80]).invalid_bytes, 3);
        assert_eq!(validate(&[0xF4, 0x90, 0x80, 0x80]).invalid_bytes, 4);
    }

    #[test]
    fn truncated_tail_is_not_an_error() {
        let mut bytes = "开端".as_bytes().to_vec();
        bytes.truncate(bytes.len() - 1);
        let report = validate(&bytes);
        assert_eq!(report.invalid_bytes, 0);
        assert_eq!(report.complete_len, 3);
    }

    #[test]
    fn broken_sequence_before_ascii_is_an_error() {
        let report = validate(&[0xE5, 0xBC, b'a']);
        assert_eq!(report.invalid_bytes, 2);
        assert_eq!(report.complete_len, 3);
    }
}
