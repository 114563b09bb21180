use crate::error::BackendError;
use crate::label::Label;
use crate::observer::{PatchEvent, PatchObserver};
use crate::phase::Phase;
use std::sync::Mutex;

/// Keeps every notification it receives, in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PatchEvent>>,
}

impl RecordingObserver {
    fn record(&self, event: PatchEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<PatchEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PatchEvent::PhaseChanged(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }

    pub fn label_sizes(&self) -> Vec<(Label, u64)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PatchEvent::LabelSize { label, bytes } => Some((label, bytes)),
                _ => None,
            })
            .collect()
    }

    pub fn downloaded_counts(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PatchEvent::DownloadedCount { done, total } => Some((done, total)),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PatchEvent::Progress(percent) => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_events(&self) -> Vec<PatchEvent> {
        self.events()
            .into_iter()
            .filter(PatchEvent::is_terminal)
            .collect()
    }
}

impl PatchObserver for RecordingObserver {
    fn on_phase_changed(&self, phase: Phase) {
        self.record(PatchEvent::PhaseChanged(phase));
    }

    fn on_label_size(&self, label: &Label, bytes: u64) {
        self.record(PatchEvent::LabelSize {
            label: label.clone(),
            bytes,
        });
    }

    fn on_total_size(&self, bytes: u64) {
        self.record(PatchEvent::TotalSize(bytes));
    }

    fn on_downloaded_count(&self, done: usize, total: usize) {
        self.record(PatchEvent::DownloadedCount { done, total });
    }

    fn on_progress(&self, percent: f32) {
        self.record(PatchEvent::Progress(percent));
    }

    fn on_download_status(&self, downloaded_bytes: u64, total_bytes: u64) {
        self.record(PatchEvent::DownloadStatus {
            downloaded_bytes,
            total_bytes,
        });
    }

    fn on_succeeded(&self) {
        self.record(PatchEvent::Succeeded);
    }

    fn on_interrupted(&self) {
        self.record(PatchEvent::Interrupted);
    }

    fn on_failed(&self, error: &BackendError) {
        self.record(PatchEvent::Failed(error.clone()));
    }
}
