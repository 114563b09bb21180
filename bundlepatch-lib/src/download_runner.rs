use crate::backend::{Backend, DownloadHandle, DownloadProgress};
use crate::config::PatchSettings;
use crate::error::BackendError;
use crate::label::Label;
use crate::logging::progress_bar_style;
use crate::observer::{Observers, PatchEvent};
use crate::phase::PhaseOutcome;
use tokio::time::Instant;
use tracing::{Span, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Downloads every label in order, one at a time, publishing progress while
/// each transfer runs. Stops at the first failed label.
pub async fn run<B: Backend>(
    backend: &B,
    labels: &[Label],
    observers: &Observers,
    settings: &PatchSettings,
) -> PhaseOutcome {
    let total = labels.len();
    observers.publish(&PatchEvent::DownloadedCount { done: 0, total });

    let mut completed = 0;
    let mut outcome = PhaseOutcome::Succeeded;
    for label in labels {
        if matches!(outcome, PhaseOutcome::Failed(_)) {
            break;
        }

        match download_label(backend, label, observers, settings).await {
            Ok(()) => {
                completed += 1;
                tracing::debug!("Downloaded label {} ({}/{})", label, completed, total);
            }
            Err(err) => {
                tracing::error!("{}", err);
                outcome = PhaseOutcome::Failed(err);
            }
        }
        observers.publish(&PatchEvent::DownloadedCount {
            done: completed,
            total,
        });
    }

    outcome
}

#[instrument(skip_all, fields(label = %label))]
async fn download_label<B: Backend>(
    backend: &B,
    label: &Label,
    observers: &Observers,
    settings: &PatchSettings,
) -> Result<(), BackendError> {
    let current_span = Span::current();
    if let Ok(style) = progress_bar_style() {
        current_span.pb_set_style(&style);
    }
    current_span.pb_set_message(&format!("Downloading {label}..."));
    current_span.pb_set_finish_message(&format!("Downloading {label}... Complete!"));

    let started = Instant::now();
    let handle = backend.download_dependencies(label);

    while !handle.is_done() {
        publish_progress(handle.progress(), observers, &current_span);

        if let Some(limit) = settings.operation_timeout
            && started.elapsed() >= limit
        {
            // Dropping the handle cancels the transfer.
            return Err(BackendError::timeout(format!("download {label}"), limit));
        }

        if settings.poll_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(settings.poll_interval).await;
        }
    }

    publish_progress(handle.progress(), observers, &current_span);
    handle.result().await
}

fn publish_progress(progress: DownloadProgress, observers: &Observers, span: &Span) {
    span.pb_set_length(progress.total_bytes);
    span.pb_set_position(progress.downloaded_bytes);
    observers.publish(&PatchEvent::Progress(progress.percent));
    observers.publish(&PatchEvent::DownloadStatus {
        downloaded_bytes: progress.downloaded_bytes,
        total_bytes: progress.total_bytes,
    });
}
