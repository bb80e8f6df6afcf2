//! Small helpers for moving between byte offsets (what `str` and `regex`
//! speak) and char offsets (what chapters and search results expose).

/// Chinese, Japanese and Korean script code points.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{3040}'..='\u{309F}'
        | '\u{30A0}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

pub fn has_cjk(s: &str) -> bool {
    s.chars().any(is_cjk)
}

/// Byte index of the `char_idx`-th char, or `text.len()` past the end.
pub fn char_to_byte(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map_or(text.len(), |(byte, _)| byte)
}

/// Largest char boundary not greater than `index`.
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// The first `n` chars of `text`.
pub fn prefix_chars(text: &str, n: usize) -> &str {
    &text[..char_to_byte(text, n)]
}

/// Walks a text forward, keeping char offset and line number in step with a
/// byte position. Positions must be fed in non-decreasing order, which keeps a
/// whole search pass linear in the text length.
pub(crate) struct CharCursor<'t> {
    text: &'t str,
    byte: usize,
    chars: usize,
    line: usize,
}

impl<'t> CharCursor<'t> {
    pub(crate) fn new(text: &'t str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
            line: 1,
        }
    }

    /// Returns `(char_offset, line_number)` of `byte`.
    pub(crate) fn advance_to(&mut self, byte: usize) -> (usize, usize) {
        debug_assert!(byte >= self.byte, "cursor moved backwards");
        let segment = &self.text[self.byte..byte];
        self.chars += segment.chars().count();
        self.line += memchr::memchr_iter(b'\n', segment.as_bytes()).count();
        self.byte = byte;
        (self.chars, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_classification() {
        assert!(is_cjk('章'));
        assert!(is_cjk('か'));
        assert!(is_cjk('한'));
        assert!(!is_cjk('a'));
        assert!(!is_cjk('，'));
        assert!(has_cjk("the 猫"));
        assert!(!has_cjk("cat"));
    }

    #[test]
    fn boundaries() {
        let text = "a第b";
        assert_eq!(char_to_byte(text, 0), 0);
        assert_eq!(char_to_byte(text, 2), 4);
        assert_eq!(char_to_byte(text, 10), text.len());
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 99), text.len());
        assert_eq!(prefix_chars(text, 2), "a第");
    }

    #[test]
    fn cursor_tracks_chars_and_lines() {
        let text = "第一行\n第二行\nthird";
        let mut cursor = CharCursor::new(text);
        assert_eq!(cursor.advance_to(0), (0, 1));
        let second = text.find("第二").unwrap();
        assert_eq!(cursor.advance_to(second), (4, 2));
        let third = text.find("third").unwrap();
        assert_eq!(cursor.advance_to(third), (8, 3));
    }
}
