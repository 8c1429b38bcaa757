//! Synthesis units — bounded slices of input text.

use serde::{Deserialize, Serialize};

/// Prefix used to derive dispatch task ids from unit indices.
const TASK_ID_PREFIX: &str = "segment_";

/// A bounded-length slice of input text submitted as one synthesis call.
///
/// Units are immutable once created. `index` is the 0-based submission
/// order and `length` is measured in characters (Unicode scalar values),
/// which is what the backend's per-call limit counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisUnit {
    index: usize,
    text: String,
    length: usize,
}

impl SynthesisUnit {
    /// Create a unit, computing its character length.
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let length = text.chars().count();
        Self {
            index,
            text,
            length,
        }
    }

    /// 0-based position of this unit in the original text.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The text to synthesize.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Dispatch task id for this unit (`segment_<index>`).
    pub fn task_id(&self) -> String {
        task_id_for(self.index)
    }
}

/// Build the dispatch task id for a unit index.
pub fn task_id_for(index: usize) -> String {
    format!("{TASK_ID_PREFIX}{index}")
}

/// Recover the unit index from a dispatch task id.
pub fn index_from_task_id(task_id: &str) -> Option<usize> {
    task_id.strip_prefix(TASK_ID_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_counts_characters_not_bytes() {
        let unit = SynthesisUnit::new(0, "你好，世界");
        assert_eq!(unit.length(), 5);
        assert_eq!(unit.text().len(), 15);
    }

    #[test]
    fn task_id_round_trips_index() {
        let unit = SynthesisUnit::new(17, "hello");
        assert_eq!(unit.task_id(), "segment_17");
        assert_eq!(index_from_task_id(&unit.task_id()), Some(17));
    }

    #[test]
    fn foreign_task_ids_have_no_index() {
        assert_eq!(index_from_task_id("download_3"), None);
        assert_eq!(index_from_task_id("segment_x"), None);
    }
}
