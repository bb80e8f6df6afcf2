//! Context windows around search hits.
use crate::text::char_to_byte;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Excerpt {
    pub context: String,
    /// Char offset of the hit inside `context`.
    pub match_offset: usize,
}

const ELLIPSIS: &str = "...";

fn is_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn too_far(moved: usize, radius: usize) -> bool {
    2 * moved > 3 * radius
}

/// Byte where the window opens, left of `start`.
fn window_start(text: &str, start: usize, radius: usize) -> usize {
    let mut chars = text[..start].char_indices().rev();
    let mut from = start;
    let mut moved = 0;
    while moved < radius {
        match chars.next() {
            Some((i, _)) => {
                from = i;
                moved += 1;
            }
            None => return 0,
        }
    }
    if moved == 0 {
        return from;
    }

    let hard_cut = from;
    for (i, c) in chars {
        if is_break(c) {
            return from;
        }
        from = i;
        moved += 1;
        if too_far(moved, radius) {
            return hard_cut;
        }
    }
    from
}

/// Byte where the window closes, right of `end`.
fn window_end(text: &str, end: usize, radius: usize) -> usize {
    let mut chars = text[end..].chars();
    let mut to = end;
    for _ in 0..radius {
        match chars.next() {
            Some(c) => to += c.len_utf8(),
            None => return text.len(),
        }
    }

    let hard_cut = to;
    let mut moved = radius;
    for c in chars {
        if is_break(c) {
            return to;
        }
        to += c.len_utf8();
        moved += 1;
        if too_far(moved, radius) {
            return hard_cut;
        }
    }
    to
}

/// Context for the hit at bytes `start..end` of `text`.
pub(crate) fn excerpt_bytes(text: &str, start: usize, end: usize, radius: usize) -> Excerpt {
    let from = window_start(text, start, radius);
    let to = window_end(text, end, radius);

    // collapse line break runs while tracking where the hit lands
    let mut body = String::with_capacity(to - from);
    let mut written = 0;
    let mut in_break = false;
    let mut hit_from = None;
    let mut hit_to = None;
    for (i, c) in text[from..to].char_indices() {
        let at = from + i;
        if at == start {
            hit_from = Some(written);
        }
        if at == end {
            hit_to = Some(written);
        }
        if is_break(c) {
            if !in_break {
                body.push(' ');
                written += 1;
                in_break = true;
            }
            continue;
        }
        in_break = false;
        body.push(c);
        written += 1;
    }
    let hit_from = hit_from.unwrap_or(written);
    let hit_to = hit_to.unwrap_or(written).max(hit_from);

    let lead = body
        .chars()
        .take(hit_from)
        .take_while(|c| c.is_whitespace())
        .count();
    let trail = body
        .chars()
        .rev()
        .take(written - hit_to)
        .take_while(|c| c.is_whitespace())
        .count();
    let kept = char_to_byte(&body, lead)..char_to_byte(&body, written - trail);

    let mut context = String::with_capacity(kept.len() + 2 * ELLIPSIS.len());
    let mut match_offset = hit_from - lead;
    if from > 0 {
        context.push_str(ELLIPSIS);
        match_offset += ELLIPSIS.len();
    }
    context.push_str(&body[kept]);
    if to < text.len() {
        context.push_str(ELLIPSIS);
    }

    Excerpt {
        context,
        match_offset,
    }
}

/// Context for a hit of `match_length` chars at char offset `match_start`.
///
/// The window reaches `radius` chars each way and stretches to the nearest
/// line break when one lies within one and a half radii. Line break runs
/// become single spaces and `...` marks a window that does not reach the end
/// of the text.
pub fn extract_context(
    text: &str,
    match_start: usize,
    match_length: usize,
    radius: usize,
) -> Excerpt {
    let start = char_to_byte(text, match_start);
    let end = start + char_to_byte(&text[start..], match_length);
    excerpt_bytes(text, start, end, radius)
}
