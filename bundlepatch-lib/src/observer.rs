//! Notifications published by a patch session.
//!
//! Observers are called synchronously from the session task, in delivery
//! order, so implementations never need to coordinate with each other.

use crate::error::BackendError;
use crate::label::Label;
use crate::phase::Phase;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives the notifications of a patch session. Every method defaults to a no-op.
pub trait PatchObserver: Send + Sync {
    fn on_phase_changed(&self, _phase: Phase) {}

    fn on_label_size(&self, _label: &Label, _bytes: u64) {}

    fn on_total_size(&self, _bytes: u64) {}

    /// `done` labels out of `total` have finished downloading.
    fn on_downloaded_count(&self, _done: usize, _total: usize) {}

    fn on_progress(&self, _percent: f32) {}

    fn on_download_status(&self, _downloaded_bytes: u64, _total_bytes: u64) {}

    fn on_succeeded(&self) {}

    fn on_interrupted(&self) {}

    fn on_failed(&self, _error: &BackendError) {}
}

/// Every notification of [PatchObserver] as a single tagged value.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchEvent {
    PhaseChanged(Phase),
    LabelSize { label: Label, bytes: u64 },
    TotalSize(u64),
    DownloadedCount { done: usize, total: usize },
    Progress(f32),
    DownloadStatus { downloaded_bytes: u64, total_bytes: u64 },
    Succeeded,
    Interrupted,
    Failed(BackendError),
}

impl PatchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PatchEvent::Succeeded | PatchEvent::Interrupted | PatchEvent::Failed(_)
        )
    }

    /// Forwards this event to the matching method of `observer`.
    pub fn dispatch(&self, observer: &dyn PatchObserver) {
        match self {
            PatchEvent::PhaseChanged(phase) => observer.on_phase_changed(*phase),
            PatchEvent::LabelSize { label, bytes } => observer.on_label_size(label, *bytes),
            PatchEvent::TotalSize(bytes) => observer.on_total_size(*bytes),
            PatchEvent::DownloadedCount { done, total } => {
                observer.on_downloaded_count(*done, *total)
            }
            PatchEvent::Progress(percent) => observer.on_progress(*percent),
            PatchEvent::DownloadStatus {
                downloaded_bytes,
                total_bytes,
            } => observer.on_download_status(*downloaded_bytes, *total_bytes),
            PatchEvent::Succeeded => observer.on_succeeded(),
            PatchEvent::Interrupted => observer.on_interrupted(),
            PatchEvent::Failed(error) => observer.on_failed(error),
        }
    }
}

/// Forwards every notification into an unbounded channel.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<PatchEvent>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<PatchEvent>) -> Self {
        Self { sender }
    }

    /// Creates an observer together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PatchEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    fn send(&self, event: PatchEvent) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.sender.send(event);
    }
}

impl PatchObserver for ChannelObserver {
    fn on_phase_changed(&self, phase: Phase) {
        self.send(PatchEvent::PhaseChanged(phase));
    }

    fn on_label_size(&self, label: &Label, bytes: u64) {
        self.send(PatchEvent::LabelSize {
            label: label.clone(),
            bytes,
        });
    }

    fn on_total_size(&self, bytes: u64) {
        self.send(PatchEvent::TotalSize(bytes));
    }

    fn on_downloaded_count(&self, done: usize, total: usize) {
        self.send(PatchEvent::DownloadedCount { done, total });
    }

    fn on_progress(&self, percent: f32) {
        self.send(PatchEvent::Progress(percent));
    }

    fn on_download_status(&self, downloaded_bytes: u64, total_bytes: u64) {
        self.send(PatchEvent::DownloadStatus {
            downloaded_bytes,
            total_bytes,
        });
    }

    fn on_succeeded(&self) {
        self.send(PatchEvent::Succeeded);
    }

    fn on_interrupted(&self) {
        self.send(PatchEvent::Interrupted);
    }

    fn on_failed(&self, error: &BackendError) {
        self.send(PatchEvent::Failed(error.clone()));
    }
}

/// The set of observers registered for a session.
#[derive(Clone, Default)]
pub struct Observers {
    observers: Vec<Arc<dyn PatchObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn PatchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn push(&mut self, observer: Arc<dyn PatchObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn publish(&self, event: &PatchEvent) {
        for observer in &self.observers {
            event.dispatch(observer.as_ref());
        }
    }
}

impl<O: PatchObserver + 'static> From<Arc<O>> for Observers {
    fn from(observer: Arc<O>) -> Self {
        Self::new().with(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TerminalCounter {
        terminal: AtomicUsize,
    }

    impl PatchObserver for TerminalCounter {
        fn on_succeeded(&self) {
            self.terminal.fetch_add(1, Ordering::SeqCst);
        }

        fn on_failed(&self, _error: &BackendError) {
            self.terminal.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_publish_reaches_every_observer() {
        let first = Arc::new(TerminalCounter::default());
        let second = Arc::new(TerminalCounter::default());
        let observers = Observers::new().with(first.clone()).with(second.clone());

        observers.publish(&PatchEvent::Succeeded);
        observers.publish(&PatchEvent::Progress(0.5));

        assert_eq!(first.terminal.load(Ordering::SeqCst), 1);
        assert_eq!(second.terminal.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_observer_forwards_events_in_order() {
        let (observer, mut receiver) = ChannelObserver::channel();
        let observers = Observers::from(Arc::new(observer));

        observers.publish(&PatchEvent::PhaseChanged(Phase::Initialize));
        observers.publish(&PatchEvent::LabelSize {
            label: Label::from("core"),
            bytes: 10,
        });
        observers.publish(&PatchEvent::Interrupted);

        assert_eq!(
            receiver.try_recv().ok(),
            Some(PatchEvent::PhaseChanged(Phase::Initialize))
        );
        assert_eq!(
            receiver.try_recv().ok(),
            Some(PatchEvent::LabelSize {
                label: Label::from("core"),
                bytes: 10
            })
        );
        assert_eq!(receiver.try_recv().ok(), Some(PatchEvent::Interrupted));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_ignores_closed_receiver() {
        let (observer, receiver) = ChannelObserver::channel();
        drop(receiver);
        observer.on_total_size(42);
    }

    #[test]
    fn test_terminal_events() {
        assert!(PatchEvent::Succeeded.is_terminal());
        assert!(PatchEvent::Interrupted.is_terminal());
        assert!(PatchEvent::Failed(BackendError::NotInitialized).is_terminal());
        assert!(!PatchEvent::TotalSize(0).is_terminal());
    }
}
