//! Text segmentation into synthesis units.
//!
//! Long input is broken down in stages: chapters (for very large
//! documents), then paragraphs packed up to the unit budget, then
//! oversized paragraphs split at the most natural boundary available.

mod chapters;
mod clause;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::domain::SynthesisUnit;

/// Default unit budget in characters.
pub const DEFAULT_MAX_UNIT_CHARS: usize = 300;

/// Documents longer than this are first split at chapter headers.
pub const LARGE_DOCUMENT_CHARS: usize = 50_000;

/// Upper bound on the number of units produced for a single request.
pub const MAX_UNITS: usize = 1000;

const PARAGRAPH_JOINER: &str = "\n\n";

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").expect("paragraph pattern is valid"));

/// Tunables for [`Segmenter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Maximum characters per unit.
    pub max_unit_chars: usize,
    /// Threshold above which chapter detection runs.
    pub large_document_chars: usize,
    /// Maximum number of units; beyond it neighbours are merged.
    pub max_units: usize,
    /// Boundaries earlier than this share of the budget are rejected.
    pub min_split_percent: usize,
    /// Append sentence punctuation to clause-split fragments.
    pub append_terminal_mark: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_unit_chars: DEFAULT_MAX_UNIT_CHARS,
            large_document_chars: LARGE_DOCUMENT_CHARS,
            max_units: MAX_UNITS,
            min_split_percent: 30,
            append_terminal_mark: true,
        }
    }
}

impl SegmenterConfig {
    /// Set the unit budget. Zero is raised to one.
    #[must_use]
    pub fn with_max_unit_chars(mut self, max_unit_chars: usize) -> Self {
        self.max_unit_chars = max_unit_chars.max(1);
        self
    }
}

/// Splits input text into ordered [`SynthesisUnit`]s.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub const fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment `text` into units with contiguous indices starting at 0.
    ///
    /// Empty or whitespace-only input yields no units. Input that already
    /// fits the budget yields exactly one unit.
    pub fn segment(&self, text: &str) -> Vec<SynthesisUnit> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let pieces = if char_len(trimmed) <= self.config.max_unit_chars {
            vec![trimmed.to_string()]
        } else {
            let pieces = self.split_document(trimmed, 0);
            self.enforce_unit_cap(pieces)
        };

        debug!(
            text_length = char_len(trimmed),
            units = pieces.len(),
            max_unit_chars = self.config.max_unit_chars,
            "Segmented text"
        );

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| SynthesisUnit::new(index, text))
            .collect()
    }

    fn split_document(&self, text: &str, depth: usize) -> Vec<String> {
        if depth == 0 && char_len(text) > self.config.large_document_chars {
            if let Some(chapters) = chapters::split_chapters(text) {
                debug!(chapters = chapters.len(), "Split large document at chapter headers");
                return chapters
                    .into_iter()
                    .flat_map(|chapter| self.split_document(chapter, depth + 1))
                    .collect();
            }
        }
        self.pack_paragraphs(text)
    }

    fn pack_paragraphs(&self, text: &str) -> Vec<String> {
        let max = self.config.max_unit_chars;
        let joiner_len = char_len(PARAGRAPH_JOINER);
        let mut units = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for paragraph in PARAGRAPH_BREAK.split(text).map(str::trim) {
            if paragraph.is_empty() {
                continue;
            }
            let paragraph_len = char_len(paragraph);

            if paragraph_len > max {
                flush(&mut units, &mut current, &mut current_len);
                units.extend(clause::split_paragraph(paragraph, &self.config));
                continue;
            }

            if current.is_empty() {
                current.push_str(paragraph);
                current_len = paragraph_len;
            } else if current_len + joiner_len + paragraph_len <= max {
                current.push_str(PARAGRAPH_JOINER);
                current.push_str(paragraph);
                current_len += joiner_len + paragraph_len;
            } else {
                flush(&mut units, &mut current, &mut current_len);
                current.push_str(paragraph);
                current_len = paragraph_len;
            }
        }
        flush(&mut units, &mut current, &mut current_len);

        units
    }

    /// Merge neighbouring pieces until no more than `max_units` remain.
    ///
    /// Each pass doubles the merge budget, so this terminates; nothing is
    /// dropped, at the price of units longer than the configured budget.
    fn enforce_unit_cap(&self, mut pieces: Vec<String>) -> Vec<String> {
        let mut budget = self.config.max_unit_chars;

        while pieces.len() > self.config.max_units {
            budget = budget.saturating_mul(2);
            let before = pieces.len();
            pieces = merge_adjacent(pieces, budget);
            debug!(before, after = pieces.len(), budget, "Merged units to respect unit cap");
        }

        pieces
    }
}

fn flush(units: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    if !current.is_empty() {
        units.push(std::mem::take(current));
    }
    *current_len = 0;
}

fn merge_adjacent(pieces: Vec<String>, budget: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(pieces.len() / 2 + 1);
    let mut current_len = 0;

    for piece in pieces {
        let piece_len = char_len(&piece);
        match merged.last_mut() {
            Some(last) if current_len + 1 + piece_len <= budget => {
                last.push(' ');
                last.push_str(&piece);
                current_len += 1 + piece_len;
            }
            _ => {
                current_len = piece_len;
                merged.push(piece);
            }
        }
    }

    merged
}

/// Segment `text` with the default configuration and the given budget.
pub fn segment(text: &str, max_unit_chars: usize) -> Vec<SynthesisUnit> {
    Segmenter::new(SegmenterConfig::default().with_max_unit_chars(max_unit_chars)).segment(text)
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `chars`-th character, or the end of `text`.
pub(crate) fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(at, _)| at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Every character of `original` appears in the units, in order.
    fn assert_covers(original: &str, units: &[SynthesisUnit]) {
        let joined = non_whitespace(&units.iter().map(SynthesisUnit::text).collect::<String>());
        let mut produced = joined.chars();
        for expected in non_whitespace(original).chars() {
            assert!(
                produced.any(|c| c == expected),
                "character {expected:?} missing from units"
            );
        }
    }

    #[test]
    fn short_text_is_a_single_unit() {
        let units = segment("  Hello there.  ", 300);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text(), "Hello there.");
        assert_eq!(units[0].index(), 0);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(segment("", 300).is_empty());
        assert!(segment(" \n\n\t ", 300).is_empty());
    }

    #[test]
    fn uniform_paragraph_is_hard_cut() {
        let text = "a".repeat(900);
        let units = segment(&text, 300);
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.length() == 300));
        let joined: String = units.iter().map(SynthesisUnit::text).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn packs_short_paragraphs_together() {
        let paragraph = "Short paragraph here.";
        let text = vec![paragraph; 10].join("\n\n");
        let units = segment(&text, 100);
        // 21 chars each, joiner 2: four fit in 90 chars.
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].text(), vec![paragraph; 4].join("\n\n"));
        assert!(units.iter().all(|u| u.length() <= 100));
    }

    #[test]
    fn indices_are_contiguous() {
        let text = "Sentence number one is here. ".repeat(60);
        let units = segment(&text, 120);
        for (expected, unit) in units.iter().enumerate() {
            assert_eq!(unit.index(), expected);
        }
    }

    #[test]
    fn units_respect_budget_and_cover_text() {
        let text = "The quick brown fox, being quick; jumped over: the lazy dog. \
                    Then it ran away without saying goodbye to anyone at all\n\n"
            .repeat(20);
        let units = segment(&text, 80);
        assert!(units.len() > 1);
        assert!(units.iter().all(|u| u.length() <= 80), "unit over budget");
        assert!(units.iter().all(|u| u.text() == u.text().trim()));
        assert_covers(&text, &units);
    }

    #[test]
    fn mixed_language_text_covers_input() {
        let text = "今天天气很好，我们去公园散步。然后我们吃了午饭；下午回家休息。".repeat(20);
        let units = segment(&text, 50);
        assert!(units.iter().all(|u| u.length() <= 50));
        assert!(units.iter().all(|u| u.text().ends_with('。')));
        assert_covers(&text, &units);
    }

    #[test]
    fn large_documents_split_at_chapters() {
        let body = "Words in a paragraph. ".repeat(20);
        let chapter = |n: usize| format!("Chapter {n} Title\n{body}\n\n{body}\n");
        let text: String = (1..=30).map(chapter).collect();
        let config = SegmenterConfig {
            large_document_chars: 1000,
            ..SegmenterConfig::default()
        }
        .with_max_unit_chars(2000);

        let units = Segmenter::new(config).segment(&text);
        assert_eq!(units.len(), 30);
        assert!(units[0].text().starts_with("Chapter 1 Title"));
        assert!(units[29].text().starts_with("Chapter 30 Title"));
    }

    #[test]
    fn unit_cap_merges_without_dropping() {
        let text = vec!["Tiny."; 50].join("\n\n");
        let config = SegmenterConfig {
            max_units: 10,
            ..SegmenterConfig::default()
        }
        .with_max_unit_chars(5);

        let units = Segmenter::new(config).segment(&text);
        assert!(units.len() <= 10);
        assert_eq!(
            units.iter().map(|u| u.text().matches("Tiny.").count()).sum::<usize>(),
            50
        );
    }

    #[test]
    fn zero_budget_is_clamped() {
        let units = segment("abc", 0);
        assert_eq!(units.len(), 3);
    }

    #[test]
    fn byte_offset_handles_multibyte() {
        assert_eq!(byte_offset("日本語", 1), 3);
        assert_eq!(byte_offset("日本語", 10), 9);
    }
}
