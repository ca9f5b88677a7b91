//! Session-scoped duplicate-error detection.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use beacon_core::CapturedException;
use sha2::{Digest, Sha256};

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Derives the identity used to detect repeat submissions of the same
/// error: exception type, message and the topmost stack frame.
pub fn fingerprint(exception: &CapturedException) -> String {
    let top_frame = exception
        .stack
        .first()
        .map(|frame| {
            format!(
                "{}:{}",
                frame.file_name.as_deref().unwrap_or("unknown"),
                frame.function
            )
        })
        .unwrap_or_else(|| "unknown".to_string());

    let components = [
        exception.type_name.as_str(),
        exception.message.as_str(),
        top_frame.as_str(),
    ];
    let content = components.join("||");

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bounded record of error fingerprints already reported in the current
/// session window.
///
/// Explicitly injected into the error-extraction plugins rather than held
/// as ambient global state; `mark` serializes all mutation so concurrent
/// pipeline runs can share one cache.
pub struct DedupCache {
    capacity: usize,
    window: Duration,
    entries: Mutex<VecDeque<(String, Instant)>>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }
}

impl DedupCache {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Registers a fingerprint. Returns true on first occurrence within the
    /// window; false for a repeat, which the caller treats as a duplicate.
    pub fn mark(&self, fingerprint: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();

        // Entries are pushed in time order, so expired ones sit at the front.
        while let Some((_, seen)) = entries.front() {
            if now.duration_since(*seen) > self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.iter().any(|(known, _)| known == fingerprint) {
            return false;
        }

        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back((fingerprint.to_string(), now));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::StackFrame;

    #[test]
    fn first_occurrence_registers_repeat_is_rejected() {
        let cache = DedupCache::default();
        assert!(cache.mark("abc"));
        assert!(!cache.mark("abc"));
        assert!(cache.mark("def"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let cache = DedupCache::new(2, DEFAULT_WINDOW);
        assert!(cache.mark("a"));
        assert!(cache.mark("b"));
        assert!(cache.mark("c"));
        // "a" was evicted, so it registers again.
        assert!(cache.mark("a"));
        assert!(!cache.mark("c"));
    }

    #[test]
    fn entries_expire_after_the_window() {
        let cache = DedupCache::new(DEFAULT_CAPACITY, Duration::from_millis(10));
        assert!(cache.mark("a"));
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.mark("a"));
    }

    #[test]
    fn fingerprint_uses_type_message_and_top_frame() {
        let one = CapturedException::new("ValueError", "boom")
            .with_stack(vec![StackFrame::at("handle", "handler.rs", 10)]);
        let same = CapturedException::new("ValueError", "boom")
            .with_stack(vec![StackFrame::at("handle", "handler.rs", 99)]);
        let different_message = CapturedException::new("ValueError", "bust")
            .with_stack(vec![StackFrame::at("handle", "handler.rs", 10)]);
        let different_frame = CapturedException::new("ValueError", "boom")
            .with_stack(vec![StackFrame::at("other", "handler.rs", 10)]);

        // Line numbers do not participate, function and file do.
        assert_eq!(fingerprint(&one), fingerprint(&same));
        assert_ne!(fingerprint(&one), fingerprint(&different_message));
        assert_ne!(fingerprint(&one), fingerprint(&different_frame));
    }

    #[test]
    fn fingerprint_handles_missing_stack() {
        let bare = CapturedException::new("Error", "no stack");
        assert_eq!(fingerprint(&bare), fingerprint(&bare));
    }
}
