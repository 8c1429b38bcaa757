//! Splitting of oversized paragraphs at natural boundaries.

use std::sync::LazyLock;

use regex::Regex;

use super::{SegmenterConfig, byte_offset, char_len};

/// Boundary classes, tried in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    Sentence,
    Semicolon,
    Comma,
    Colon,
    Enumeration,
    Whitespace,
}

impl BoundaryKind {
    /// Clause boundaries end a fragment mid-sentence.
    const fn is_clause(self) -> bool {
        matches!(
            self,
            Self::Semicolon | Self::Comma | Self::Colon | Self::Enumeration
        )
    }
}

static BOUNDARIES: LazyLock<Vec<(BoundaryKind, Regex)>> = LazyLock::new(|| {
    [
        (BoundaryKind::Sentence, r"[。！？.!?]\s*"),
        (BoundaryKind::Semicolon, r"[；;]\s*"),
        (BoundaryKind::Comma, r"[，,]\s*"),
        (BoundaryKind::Colon, r"[：:]\s*"),
        (BoundaryKind::Enumeration, r"、\s*"),
        (BoundaryKind::Whitespace, r"\s+"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("boundary pattern is valid")))
    .collect()
});

const SENTENCE_MARKS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

#[derive(Debug, Clone, Copy)]
struct Boundary {
    /// Byte offset just past the boundary match.
    at: usize,
    kind: BoundaryKind,
}

/// Split a paragraph longer than the unit budget into fragments that fit.
///
/// Each round takes the rightmost boundary of the highest-priority class
/// that lies inside the budget and at or beyond the minimum split point.
/// Without such a boundary the paragraph is cut hard at the budget.
pub(super) fn split_paragraph(paragraph: &str, config: &SegmenterConfig) -> Vec<String> {
    let max = config.max_unit_chars;
    let mut fragments = Vec::new();
    let mut rest = paragraph.trim();

    while char_len(rest) > max {
        let (head, tail, needs_mark) = match find_boundary(rest, config) {
            Some(boundary) => {
                let (head, tail) = rest.split_at(boundary.at);
                (
                    head,
                    tail,
                    config.append_terminal_mark && boundary.kind.is_clause(),
                )
            }
            None => {
                let (head, tail) = rest.split_at(byte_offset(rest, max));
                (head, tail, false)
            }
        };

        let mut fragment = head.trim().to_string();
        if needs_mark && !ends_with_sentence_mark(&fragment) {
            fragment.push(terminal_mark_for(&fragment));
        }
        if !fragment.is_empty() {
            fragments.push(fragment);
        }
        rest = tail.trim_start();
    }

    if !rest.is_empty() {
        fragments.push(rest.to_string());
    }

    fragments
}

fn find_boundary(text: &str, config: &SegmenterConfig) -> Option<Boundary> {
    let max = config.max_unit_chars;
    let min_chars = (max * config.min_split_percent / 100).max(1);

    BOUNDARIES.iter().find_map(|(kind, pattern)| {
        // Clause fragments may gain a terminal mark, which must still fit.
        let reserve = usize::from(config.append_terminal_mark && kind.is_clause());
        let window_chars = max.checked_sub(reserve)?;
        let window = &text[..byte_offset(text, window_chars)];

        let end = pattern.find_iter(window).last()?.end();
        (char_len(&window[..end]) >= min_chars).then_some(Boundary { at: end, kind: *kind })
    })
}

fn ends_with_sentence_mark(fragment: &str) -> bool {
    fragment
        .chars()
        .next_back()
        .is_some_and(|c| SENTENCE_MARKS.contains(&c))
}

fn terminal_mark_for(fragment: &str) -> char {
    if fragment.chars().any(is_cjk) { '。' } else { '.' }
}

const fn is_cjk(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{30FF}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}')
}
