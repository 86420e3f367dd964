use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

/// Attached to a classification when recent failures repeat on the same
/// page with the same scrubbed message. Informational only: it never alters
/// recoverability or the strategy list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternInfo {
    pub detected: bool,
    pub frequency: u32,
    pub window_ms: u64,
}

/// Aggregate view of one recurring failure key, for the statistics read model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
    pub page: String,
    pub message: String,
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

struct FailureEvent {
    page: String,
    message: String,
    at: Instant,
    timestamp: DateTime<Utc>,
}

/// Sliding-window recurrence detector over a bounded failure history.
pub struct PatternDetector {
    window_ms: u64,
    threshold: u32,
    max_history: usize,
    events: VecDeque<FailureEvent>,
    digit_runs: Regex,
    hex_runs: Regex,
}

const SCRUBBED_MESSAGE_LEN: usize = 80;

impl PatternDetector {
    pub fn new(window_ms: u64, threshold: u32, max_history: usize) -> Self {
        Self {
            window_ms,
            threshold,
            max_history,
            events: VecDeque::new(),
            // Volatile fragments (ids, counts, hashes) are collapsed so the
            // same logical failure produces the same key.
            digit_runs: Regex::new(r"\d+").expect("static regex"),
            hex_runs: Regex::new(r"\b[0-9a-f]{8,}\b").expect("static regex"),
        }
    }

    /// Normalize a raw message into a stable pattern key component.
    pub fn scrub_message(&self, message: &str) -> String {
        let lowered = message.to_lowercase();
        let no_hex = self.hex_runs.replace_all(&lowered, "#");
        let scrubbed = self.digit_runs.replace_all(&no_hex, "#");
        scrubbed.chars().take(SCRUBBED_MESSAGE_LEN).collect()
    }

    /// Record one failure and report whether its key now repeats at or above
    /// the threshold inside the window.
    pub fn record(&mut self, page: &str, raw_message: &str) -> Option<PatternInfo> {
        let message = self.scrub_message(raw_message);
        let now = Instant::now();

        self.events.push_back(FailureEvent {
            page: page.to_string(),
            message: message.clone(),
            at: now,
            timestamp: Utc::now(),
        });
        while self.events.len() > self.max_history {
            self.events.pop_front();
        }

        let frequency = self.count_in_window(page, &message, now);
        if frequency >= self.threshold {
            Some(PatternInfo {
                detected: true,
                frequency,
                window_ms: self.window_ms,
            })
        } else {
            None
        }
    }

    fn count_in_window(&self, page: &str, message: &str, now: Instant) -> u32 {
        let window = std::time::Duration::from_millis(self.window_ms);
        self.events
            .iter()
            .filter(|event| {
                now.duration_since(event.at) <= window
                    && event.page == page
                    && event.message == message
            })
            .count() as u32
    }

    pub fn recorded_count(&self) -> usize {
        self.events.len()
    }

    /// Keys currently at or above the threshold inside the window.
    pub fn active_patterns(&self) -> Vec<PatternSummary> {
        let now = Instant::now();
        let window = std::time::Duration::from_millis(self.window_ms);
        let mut summaries: Vec<PatternSummary> = Vec::new();

        for event in &self.events {
            if now.duration_since(event.at) > window {
                continue;
            }
            if let Some(existing) = summaries
                .iter_mut()
                .find(|s| s.page == event.page && s.message == event.message)
            {
                existing.count += 1;
                existing.last_seen = event.timestamp;
            } else {
                summaries.push(PatternSummary {
                    page: event.page.clone(),
                    message: event.message.clone(),
                    count: 1,
                    first_seen: event.timestamp,
                    last_seen: event.timestamp,
                });
            }
        }

        summaries.retain(|s| s.count >= self.threshold);
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubbing_collapses_volatile_fragments() {
        let detector = PatternDetector::new(300_000, 3, 1000);
        let a = detector.scrub_message("Element not found: #submit-1234");
        let b = detector.scrub_message("Element not found: #submit-9876");
        assert_eq!(a, b);
    }

    #[test]
    fn third_occurrence_trips_the_threshold() {
        let mut detector = PatternDetector::new(300_000, 3, 1000);
        assert!(detector.record("checkout", "Network request failed: GET /api/1").is_none());
        assert!(detector.record("checkout", "Network request failed: GET /api/2").is_none());
        let pattern = detector
            .record("checkout", "Network request failed: GET /api/3")
            .expect("pattern detected");
        assert!(pattern.detected);
        assert_eq!(pattern.frequency, 3);
        assert_eq!(pattern.window_ms, 300_000);
    }

    #[test]
    fn different_pages_do_not_aggregate() {
        let mut detector = PatternDetector::new(300_000, 3, 1000);
        detector.record("checkout", "Network request failed");
        detector.record("menus", "Network request failed");
        assert!(detector.record("billing", "Network request failed").is_none());
    }

    #[test]
    fn history_is_bounded() {
        let mut detector = PatternDetector::new(300_000, 3, 10);
        for i in 0..50 {
            detector.record("page", &format!("failure variant {}", i));
        }
        assert_eq!(detector.recorded_count(), 10);
    }

    #[test]
    fn active_patterns_summarize_window() {
        let mut detector = PatternDetector::new(300_000, 2, 1000);
        detector.record("checkout", "boom");
        detector.record("checkout", "boom");
        let active = detector.active_patterns();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].count, 2);
        assert_eq!(active[0].page, "checkout");
    }
}
