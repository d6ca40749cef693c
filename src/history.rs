//! Detection history log.
//!
//! A capped rolling log of noteworthy detections and captures, kept for display and export. The
//! log never feeds back into detection: it is read-only from the pipeline's perspective.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::perception::ModelKind;

/// Maximum number of retained entries; the oldest entries are evicted first.
pub const HISTORY_CAPACITY: usize = 50;

/// One noteworthy event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    pub kind: ModelKind,
    pub label: String,
    pub confidence: Option<f32>,
}

/// Fixed-capacity detection log with FIFO eviction.
///
/// Entries are stored newest-first. Recording beyond [`HISTORY_CAPACITY`] evicts the oldest
/// entry; entries are never re-touched or reordered.
#[derive(Debug, Default)]
pub struct DetectionHistory {
    entries: VecDeque<HistoryEntry>,
}

impl DetectionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends an entry and truncates the log to the last [`HISTORY_CAPACITY`] entries.
    pub fn record(&mut self, kind: ModelKind, label: impl Into<String>, confidence: Option<f32>) {
        self.entries.push_front(HistoryEntry {
            timestamp_ms: now_ms(),
            kind,
            label: label.into(),
            confidence,
        });
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Returns the most recently recorded entry.
    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Serializes the current log (newest first) as a JSON array.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_enforced_fifo() {
        let mut history = DetectionHistory::new();
        for i in 0..HISTORY_CAPACITY {
            history.record(ModelKind::Object, format!("label-{i}"), None);
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        // One record beyond capacity evicts the oldest entry, keeps the newest.
        history.record(ModelKind::Object, "overflow", Some(0.5));
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.newest().unwrap().label, "overflow");
        assert!(history.entries().all(|entry| entry.label != "label-0"));
        assert!(history.entries().any(|entry| entry.label == "label-1"));
    }

    #[test]
    fn newest_first_order() {
        let mut history = DetectionHistory::new();
        history.record(ModelKind::Face, "first", None);
        history.record(ModelKind::Hand, "second", None);

        let labels: Vec<_> = history.entries().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["second", "first"]);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut history = DetectionHistory::new();
        history.record(ModelKind::Pose, "x", Some(0.9));
        assert!(!history.is_empty());
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn json_export_shape() {
        let mut history = DetectionHistory::new();
        history.record(ModelKind::Object, "person", Some(0.75));

        let json = history.to_json().unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"label\":\"person\""));
        assert!(json.contains("\"kind\":\"Object\""));
    }
}
