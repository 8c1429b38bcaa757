//! Chapter boundary detection for large documents.

use std::sync::LazyLock;

use regex::Regex;

/// Structural header patterns, highest priority first.
///
/// Each pattern matches a whole header line including its newline, anchored
/// at the start of a line so that "chapter 3" inside prose is not a boundary.
static CHAPTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?m)^[ \t]*第[一二三四五六七八九十百千零〇\d]+章[^\n]*\n",
        r"(?m)^[ \t]*第[一二三四五六七八九十百千零〇\d]+节[^\n]*\n",
        r"(?mi)^[ \t]*chapter[ \t]+\d+[^\n]*\n",
        r"(?m)^[ \t]*=+[^=\n]*=+[ \t]*\n",
        r"(?m)^[ \t]*-+[^-\n]*-+[ \t]*\n",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("chapter pattern is valid"))
    .collect()
});

/// Split `text` before each header of the first pattern that yields more
/// than one non-blank piece.
///
/// Headers stay attached to the chapter they introduce, so no text is lost.
/// Returns `None` when no pattern produces a useful split.
pub(super) fn split_chapters(text: &str) -> Option<Vec<&str>> {
    CHAPTER_PATTERNS
        .iter()
        .find_map(|pattern| split_before_headers(text, pattern))
}

fn split_before_headers<'a>(text: &'a str, pattern: &Regex) -> Option<Vec<&'a str>> {
    let mut pieces = Vec::new();
    let mut piece_start = 0;
    let mut found = false;

    for header in pattern.find_iter(text) {
        found = true;
        if header.start() > piece_start {
            pieces.push(&text[piece_start..header.start()]);
        }
        piece_start = header.start();
    }

    if !found {
        return None;
    }
    pieces.push(&text[piece_start..]);

    let pieces: Vec<&str> = pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .collect();

    (pieces.len() > 1).then_some(pieces)
}
