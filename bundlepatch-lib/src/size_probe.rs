use crate::backend::{Backend, bounded};
use crate::label::Label;
use crate::logging::spinner_style;
use crate::observer::{Observers, PatchEvent};
use crate::phase::PhaseOutcome;
use std::time::Duration;
use tracing::instrument;
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Queries the download size of every label in order and publishes the sizes
/// and their total. The first backend error fails the phase and skips the
/// remaining labels.
#[instrument(skip_all)]
pub async fn run<B: Backend>(
    backend: &B,
    labels: &[Label],
    observers: &Observers,
    operation_timeout: Option<Duration>,
) -> PhaseOutcome {
    let current_span = tracing::Span::current();
    if let Ok(style) = spinner_style("{msg} [{pos}/{len}]") {
        current_span.pb_set_style(&style);
    }
    current_span.pb_set_length(labels.len() as u64);
    current_span.pb_set_message("Checking download size...");
    current_span.pb_set_finish_message("Checking download size... Done");

    let mut total_size = 0u64;
    for label in labels {
        tracing::debug!("Checking download size of label {}", label);
        let size = match bounded(
            "download size",
            operation_timeout,
            backend.download_size(label),
        )
        .await
        {
            Ok(size) => size,
            Err(err) => {
                tracing::error!("{}", err);
                return PhaseOutcome::Failed(err);
            }
        };

        total_size += size;
        tracing::debug!("Label {} needs {} bytes", label, size);
        observers.publish(&PatchEvent::LabelSize {
            label: label.clone(),
            bytes: size,
        });
        current_span.pb_inc(1);
    }

    tracing::debug!("Total download size: {} bytes", total_size);
    observers.publish(&PatchEvent::TotalSize(total_size));
    PhaseOutcome::Succeeded
}
