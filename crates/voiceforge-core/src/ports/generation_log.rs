//! Sink for per-request generation records.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::domain::{GenerationRecord, GenerationStatus};

/// Destination for [`GenerationRecord`]s.
///
/// Recording must never fail the request, so the method has no error path.
pub trait GenerationLog: Send + Sync {
    fn record(&self, record: GenerationRecord);

    /// Most recent records, newest first. Sinks without storage return none.
    fn recent(&self, _limit: usize) -> Vec<GenerationRecord> {
        Vec::new()
    }
}

/// Emits each record as a structured tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingGenerationLog;

impl GenerationLog for TracingGenerationLog {
    fn record(&self, record: GenerationRecord) {
        match record.status {
            GenerationStatus::Success => info!(
                text_length = record.text_length,
                voice = %record.voice,
                format = %record.format,
                speed = record.speed,
                mode = %record.mode,
                duration_seconds = record.duration_seconds,
                audio_size_bytes = record.audio_size_bytes,
                note = record.error_message.as_deref().unwrap_or(""),
                "Generation finished"
            ),
            GenerationStatus::Error => warn!(
                text_length = record.text_length,
                voice = %record.voice,
                format = %record.format,
                mode = %record.mode,
                duration_seconds = record.duration_seconds,
                audio_size_bytes = record.audio_size_bytes,
                error = record.error_message.as_deref().unwrap_or(""),
                "Generation failed"
            ),
        }
    }
}

/// Bounded in-memory history that also forwards to tracing.
#[derive(Debug)]
pub struct InMemoryGenerationLog {
    capacity: usize,
    records: Mutex<VecDeque<GenerationRecord>>,
}

impl InMemoryGenerationLog {
    pub const DEFAULT_CAPACITY: usize = 200;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map_or(0, |records| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryGenerationLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl GenerationLog for InMemoryGenerationLog {
    fn record(&self, record: GenerationRecord) {
        TracingGenerationLog.record(record.clone());
        // A poisoned lock only loses history; keep serving.
        if let Ok(mut records) = self.records.lock() {
            if records.len() == self.capacity {
                records.pop_front();
            }
            records.push_back(record);
        }
    }

    fn recent(&self, limit: usize) -> Vec<GenerationRecord> {
        self.records.lock().map_or_else(
            |_| Vec::new(),
            |records| records.iter().rev().take(limit).cloned().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioFormat, GenerationMode};
    use chrono::Utc;

    fn record(text_length: usize) -> GenerationRecord {
        GenerationRecord {
            timestamp: Utc::now(),
            text_length,
            voice: "alloy".to_string(),
            format: AudioFormat::Mp3,
            speed: 1.0,
            mode: GenerationMode::Normal,
            duration_seconds: 0.5,
            audio_size_bytes: 1024,
            status: GenerationStatus::Success,
            error_message: None,
        }
    }

    #[test]
    fn recent_returns_newest_first() {
        let log = InMemoryGenerationLog::new(10);
        for len in 1..=3 {
            log.record(record(len));
        }
        let lengths: Vec<usize> = log.recent(2).iter().map(|r| r.text_length).collect();
        assert_eq!(lengths, vec![3, 2]);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let log = InMemoryGenerationLog::new(2);
        for len in 1..=5 {
            log.record(record(len));
        }
        assert_eq!(log.len(), 2);
        let lengths: Vec<usize> = log.recent(10).iter().map(|r| r.text_length).collect();
        assert_eq!(lengths, vec![5, 4]);
    }

    #[test]
    fn tracing_log_keeps_no_history() {
        TracingGenerationLog.record(record(1));
        assert!(TracingGenerationLog.recent(5).is_empty());
    }
}
