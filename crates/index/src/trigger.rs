//! Rebuild triggering policies.
//!
//! The watcher hands every qualifying event to a `RebuildTrigger`, which
//! decides when a `Rebuilder` runs. Both traits are synchronous: they are
//! called from the notify backend thread, never from async tasks.

use crate::types::{BuildReport, BuildStatus};
use crate::watcher::WatchEvent;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Runs one full rebuild and reports the outcome.
pub trait Rebuilder: Send + Sync {
    fn rebuild(&self) -> BuildReport;
}

/// Reacts to a qualifying directory change.
pub trait RebuildTrigger: Send + Sync {
    fn fire(&self, event: &WatchEvent);
}

fn log_report(report: &BuildReport) {
    match report.status {
        BuildStatus::Built => tracing::info!(
            version = report.version,
            documents = report.document_count,
            chunks = report.chunk_count,
            "Index rebuilt in {:.2}s",
            report.duration_secs
        ),
        BuildStatus::SkippedEmpty => {
            tracing::info!(version = report.version, "Rebuild skipped: no documents")
        }
        BuildStatus::Failed => tracing::error!(
            version = report.version,
            "Rebuild failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// One event, one synchronous rebuild on the calling thread.
pub struct ImmediateTrigger {
    rebuilder: Arc<dyn Rebuilder>,
}

impl ImmediateTrigger {
    pub fn new(rebuilder: Arc<dyn Rebuilder>) -> Self {
        Self { rebuilder }
    }
}

impl RebuildTrigger for ImmediateTrigger {
    fn fire(&self, event: &WatchEvent) {
        tracing::info!("{}; rebuilding index", event);
        log_report(&self.rebuilder.rebuild());
    }
}

/// Coalesces bursts of events into a single rebuild.
///
/// Events go to a worker thread which waits until the directory has been
/// quiet for the whole window, then rebuilds once. Dropping the trigger
/// closes the channel; the worker completes a rebuild already in progress,
/// discards events still waiting for their window, and exits.
pub struct DebouncedTrigger {
    sender: Mutex<Option<Sender<WatchEvent>>>,
    worker: Option<JoinHandle<()>>,
}

impl DebouncedTrigger {
    pub fn new(rebuilder: Arc<dyn Rebuilder>, window: Duration) -> Self {
        let (sender, receiver) = mpsc::channel::<WatchEvent>();

        let worker = std::thread::Builder::new()
            .name("courier-debounce".to_string())
            .spawn(move || {
                while let Ok(first) = receiver.recv() {
                    let mut coalesced = 1usize;
                    tracing::debug!("{}; waiting {:?} for more changes", first, window);

                    loop {
                        match receiver.recv_timeout(window) {
                            Ok(_) => coalesced += 1,
                            Err(RecvTimeoutError::Timeout) => break,
                            Err(RecvTimeoutError::Disconnected) => {
                                tracing::debug!(
                                    "Trigger closed; discarding {} pending events",
                                    coalesced
                                );
                                return;
                            }
                        }
                    }

                    tracing::info!("Rebuilding index after {} coalesced events", coalesced);
                    log_report(&rebuilder.rebuild());
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to spawn debounce worker: {}", e);
                None
            }
        };

        Self {
            sender: Mutex::new(worker.as_ref().map(|_| sender)),
            worker,
        }
    }
}

impl RebuildTrigger for DebouncedTrigger {
    fn fire(&self, event: &WatchEvent) {
        let sender = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match sender.as_ref() {
            Some(tx) => {
                if tx.send(event.clone()).is_err() {
                    tracing::warn!("Debounce worker gone; dropping {}", event);
                }
            }
            None => tracing::warn!("Debounce worker not running; dropping {}", event),
        }
    }
}

impl Drop for DebouncedTrigger {
    fn drop(&mut self) {
        let sender = match self.sender.get_mut() {
            Ok(sender) => sender.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Debounce worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct CountingRebuilder {
        calls: AtomicUsize,
    }

    impl Rebuilder for CountingRebuilder {
        fn rebuild(&self) -> BuildReport {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            BuildReport {
                status: BuildStatus::Built,
                document_count: 1,
                chunk_count: 1,
                version: n as u64,
                duration_secs: 0.0,
                error: None,
            }
        }
    }

    fn created(name: &str) -> WatchEvent {
        WatchEvent::Created(PathBuf::from(name))
    }

    fn wait_for(count: &AtomicUsize, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < expected && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_immediate_rebuilds_per_event() {
        let rebuilder = Arc::new(CountingRebuilder::default());
        let trigger = ImmediateTrigger::new(rebuilder.clone());

        trigger.fire(&created("a.pdf"));
        trigger.fire(&WatchEvent::Deleted(PathBuf::from("a.pdf")));

        assert_eq!(rebuilder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debounce_coalesces_burst() {
        let rebuilder = Arc::new(CountingRebuilder::default());
        let trigger = DebouncedTrigger::new(rebuilder.clone(), Duration::from_millis(100));

        for i in 0..5 {
            trigger.fire(&created(&format!("{}.pdf", i)));
        }

        wait_for(&rebuilder.calls, 1);
        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(rebuilder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debounce_separate_bursts() {
        let rebuilder = Arc::new(CountingRebuilder::default());
        let trigger = DebouncedTrigger::new(rebuilder.clone(), Duration::from_millis(50));

        trigger.fire(&created("a.pdf"));
        wait_for(&rebuilder.calls, 1);

        trigger.fire(&created("b.pdf"));
        wait_for(&rebuilder.calls, 2);

        assert_eq!(rebuilder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_discards_pending_and_joins() {
        let rebuilder = Arc::new(CountingRebuilder::default());
        let trigger = DebouncedTrigger::new(rebuilder.clone(), Duration::from_secs(10));

        trigger.fire(&created("a.pdf"));
        drop(trigger);

        assert_eq!(rebuilder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&rebuilder), 1);
    }
}
