use crate::error::BackendError;
use crate::label::Label;
use std::time::Duration;

/// Snapshot of a running label download.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DownloadProgress {
    /// Fraction complete, in `[0, 1]`.
    pub percent: f32,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
}

impl DownloadProgress {
    pub fn new(downloaded_bytes: u64, total_bytes: u64) -> Self {
        let percent = if total_bytes == 0 {
            1.0
        } else {
            (downloaded_bytes as f64 / total_bytes as f64).clamp(0.0, 1.0) as f32
        };
        Self {
            percent,
            downloaded_bytes,
            total_bytes,
        }
    }
}

/// The delivery system the patch session talks to.
pub trait Backend: Send + Sync + 'static {
    type Download: DownloadHandle;

    /// Prepares the backend; resolves once it is usable.
    fn initialize(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Number of bytes that still have to be downloaded for `label`.
    fn download_size(&self, label: &Label)
    -> impl Future<Output = Result<u64, BackendError>> + Send;

    /// Starts transferring everything `label` depends on.
    fn download_dependencies(&self, label: &Label) -> Self::Download;
}

/// Handle to an in-flight download started by [Backend::download_dependencies].
///
/// Dropping the handle before it is done cancels the transfer.
pub trait DownloadHandle: Send {
    fn is_done(&self) -> bool;

    fn progress(&self) -> DownloadProgress;

    /// Terminal status of the transfer. Only meaningful once [Self::is_done] is true.
    fn result(self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Awaits `operation`, failing with [BackendError::Timeout] once `limit` elapses.
pub(crate) async fn bounded<T>(
    operation: &str,
    limit: Option<Duration>,
    future: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, BackendError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .unwrap_or_else(|_| Err(BackendError::timeout(operation, limit))),
        None => future.await,
    }
}
