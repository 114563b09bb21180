use crate::backend::{Backend, DownloadHandle, DownloadProgress};
use crate::error::BackendError;
use crate::label::Label;
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
enum Behavior {
    Ok,
    SizeError,
    DownloadError,
    Stalled,
}

#[derive(Debug, Clone)]
struct MockLabel {
    size: u64,
    behavior: Behavior,
}

/// Scripted backend: every label has a fixed size and a fixed fate.
pub struct MockBackend {
    labels: HashMap<Label, MockLabel>,
    initialize_error: bool,
    poll_steps: usize,
    initialize_calls: AtomicUsize,
    size_queries: Mutex<Vec<Label>>,
    downloads_started: Mutex<Vec<Label>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            labels: HashMap::new(),
            initialize_error: false,
            poll_steps: 2,
            initialize_calls: AtomicUsize::new(0),
            size_queries: Mutex::new(Vec::new()),
            downloads_started: Mutex::new(Vec::new()),
        }
    }

    fn with(mut self, name: &str, size: u64, behavior: Behavior) -> Self {
        self.labels
            .insert(Label::from(name), MockLabel { size, behavior });
        self
    }

    pub fn with_label(self, name: &str, size: u64) -> Self {
        self.with(name, size, Behavior::Ok)
    }

    pub fn with_size_error(self, name: &str) -> Self {
        self.with(name, 0, Behavior::SizeError)
    }

    pub fn with_download_error(self, name: &str, size: u64) -> Self {
        self.with(name, size, Behavior::DownloadError)
    }

    /// A label whose download never completes.
    pub fn with_stalled_download(self, name: &str) -> Self {
        self.with(name, 1, Behavior::Stalled)
    }

    pub fn with_initialize_error(mut self) -> Self {
        self.initialize_error = true;
        self
    }

    /// Number of progress polls before a download reports done.
    pub fn with_poll_steps(mut self, poll_steps: usize) -> Self {
        self.poll_steps = poll_steps.max(1);
        self
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn size_queries(&self) -> Vec<Label> {
        self.size_queries.lock().unwrap().clone()
    }

    pub fn downloads_started(&self) -> Vec<Label> {
        self.downloads_started.lock().unwrap().clone()
    }
}

impl Backend for MockBackend {
    type Download = MockDownload;

    async fn initialize(&self) -> Result<(), BackendError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.initialize_error {
            return Err(BackendError::Initialization(
                "mock backend unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn download_size(&self, label: &Label) -> Result<u64, BackendError> {
        self.size_queries.lock().unwrap().push(label.clone());
        let mock = self
            .labels
            .get(label)
            .ok_or_else(|| BackendError::UnknownLabel(label.clone()))?;
        match mock.behavior {
            Behavior::SizeError => Err(BackendError::download_size(
                label,
                &anyhow!("mock size query failed"),
            )),
            _ => Ok(mock.size),
        }
    }

    fn download_dependencies(&self, label: &Label) -> MockDownload {
        self.downloads_started.lock().unwrap().push(label.clone());
        let mock = self.labels.get(label).cloned().unwrap_or(MockLabel {
            size: 0,
            behavior: Behavior::DownloadError,
        });
        let steps = match mock.behavior {
            Behavior::Stalled => usize::MAX,
            _ => self.poll_steps,
        };
        let result = match mock.behavior {
            Behavior::DownloadError => Err(BackendError::download(
                label,
                &anyhow!("mock transfer failed"),
            )),
            _ => Ok(()),
        };
        MockDownload {
            total_bytes: mock.size,
            steps,
            polls: AtomicUsize::new(0),
            result,
        }
    }
}

/// Advances one step every time its progress is read.
pub struct MockDownload {
    total_bytes: u64,
    steps: usize,
    polls: AtomicUsize,
    result: Result<(), BackendError>,
}

impl DownloadHandle for MockDownload {
    fn is_done(&self) -> bool {
        self.polls.load(Ordering::SeqCst) >= self.steps
    }

    fn progress(&self) -> DownloadProgress {
        let polls = (self.polls.fetch_add(1, Ordering::SeqCst) + 1).min(self.steps);
        let downloaded = (self.total_bytes as u128 * polls as u128 / self.steps as u128) as u64;
        DownloadProgress::new(downloaded, self.total_bytes)
    }

    async fn result(self) -> Result<(), BackendError> {
        self.result
    }
}
