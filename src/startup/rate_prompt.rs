use std::sync::atomic::{AtomicU32, Ordering};

use serde::Deserialize;

const ENABLE_LOGS: bool = false;

use crate::log_info;

const DEFAULT_THRESHOLD: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapSource {
    /// Taps inside the embedded web page.
    Web,
    Native,
}

/// Counts taps and decides when to ask the OS for a store review.
///
/// Every tap counts, but only a web tap at or past the threshold triggers the
/// prompt; the counter then starts over.
pub struct RatePrompt {
    taps: AtomicU32,
    threshold: u32,
}

impl Default for RatePrompt {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl RatePrompt {
    pub fn new(threshold: u32) -> Self {
        Self {
            taps: AtomicU32::new(0),
            threshold,
        }
    }

    /// Returns `true` when the caller should show the review prompt now.
    pub fn register_tap(&self, source: TapSource) -> bool {
        let count = self.taps.fetch_add(1, Ordering::SeqCst) + 1;
        log_info!("tap #{count} source={source:?}");

        if source != TapSource::Web || count < self.threshold {
            return false;
        }

        self.taps.store(0, Ordering::SeqCst);
        true
    }

    pub fn taps(&self) -> u32 {
        self.taps.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteenth_web_tap_requests_review_and_resets() {
        let prompt = RatePrompt::default();
        for _ in 0..14 {
            assert!(!prompt.register_tap(TapSource::Web));
        }
        assert!(prompt.register_tap(TapSource::Web));
        assert_eq!(prompt.taps(), 0);
    }

    #[test]
    fn native_taps_count_but_never_trigger() {
        let prompt = RatePrompt::default();
        for _ in 0..20 {
            assert!(!prompt.register_tap(TapSource::Native));
        }
        assert_eq!(prompt.taps(), 20);
        // Already past the threshold, so the next web tap fires.
        assert!(prompt.register_tap(TapSource::Web));
    }
}
