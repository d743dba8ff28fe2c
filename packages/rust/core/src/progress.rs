//! Progress reporting for pipeline runs.

use std::sync::Mutex;

use chrono::Utc;
use entitygraph_shared::{ProgressEvent, StageName};

/// Receives progress events for one run, in emission order.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op observer for headless/test usage.
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Wraps an observer and keeps the reported percentage non-decreasing.
pub struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    last_percent: Mutex<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            observer,
            last_percent: Mutex::new(0),
        }
    }

    /// Emit an event. `percent` is capped at 100 and raised to the last value
    /// reported if it would go backwards.
    pub fn emit(&self, stage: StageName, percent: u8, message: impl Into<String>) {
        let percent = {
            let mut last = self.last_percent.lock().unwrap_or_else(|e| e.into_inner());
            *last = percent.min(100).max(*last);
            *last
        };

        self.observer.on_progress(&ProgressEvent {
            stage,
            percent_complete: percent,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn last_percent(&self) -> u8 {
        *self.last_percent.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_never_decrease() {
        let events = Mutex::new(Vec::new());
        let observer = |e: &ProgressEvent| events.lock().unwrap().push(e.percent_complete);
        let tracker = ProgressTracker::new(&observer);

        tracker.emit(StageName::Crawling, 10, "a");
        tracker.emit(StageName::Crawling, 40, "b");
        tracker.emit(StageName::Fingerprinting, 30, "c");
        tracker.emit(StageName::Completed, 250, "d");

        assert_eq!(*events.lock().unwrap(), vec![10, 40, 40, 100]);
        assert_eq!(tracker.last_percent(), 100);
    }

    #[test]
    fn silent_progress_accepts_events() {
        let tracker = ProgressTracker::new(&SilentProgress);
        tracker.emit(StageName::Failed, 100, "done");
        assert_eq!(tracker.last_percent(), 100);
    }
}
