//! The patch state machine.
//!
//! A session walks [Phase::SEQUENCE] in order: initialize the backend, measure
//! what has to be downloaded, wait for the operator's confirmation, then
//! download. The first interrupted or failed phase ends the session, and every
//! session ends with exactly one terminal notification.

use crate::backend::{Backend, bounded};
use crate::config::PatchSettings;
use crate::confirmation::ConfirmationGate;
use crate::download_runner;
use crate::label::Label;
use crate::observer::{Observers, PatchEvent};
use crate::phase::{ConfirmationState, Phase, PhaseOutcome, SessionOutcome};
use crate::size_probe;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Where the current (or last) session stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub phase: Phase,
    pub last_outcome: PhaseOutcome,
}

#[derive(Clone)]
struct Configuration {
    labels: Arc<[Label]>,
    observers: Observers,
}

struct Shared {
    configuration: Mutex<Option<Configuration>>,
    status: watch::Sender<SessionStatus>,
    confirmation: ConfirmationGate,
}

impl Shared {
    fn configuration(&self) -> MutexGuard<'_, Option<Configuration>> {
        self.configuration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_active(&self) -> bool {
        self.status.borrow().phase.is_active()
    }
}

/// Orchestrates patch sessions over a delivery backend.
///
/// Only one session runs at a time; [PatchSystem::start] is a no-op while one
/// is active.
pub struct PatchSystem<B: Backend> {
    backend: Arc<B>,
    settings: PatchSettings,
    shared: Arc<Shared>,
}

impl<B: Backend> PatchSystem<B> {
    pub fn new(backend: B, settings: PatchSettings) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            backend: Arc::new(backend),
            settings,
            shared: Arc::new(Shared {
                configuration: Mutex::new(None),
                status,
                confirmation: ConfirmationGate::new(),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &PatchSettings {
        &self.settings
    }

    /// Replaces the labels and observers used by the next session.
    ///
    /// Returns false, leaving the previous configuration in place, when there
    /// are no labels or a session is running.
    pub fn configure(&self, labels: impl IntoIterator<Item = Label>, observers: Observers) -> bool {
        let labels: Arc<[Label]> = labels.into_iter().collect();
        if labels.is_empty() {
            tracing::error!("Cannot configure a patch without any labels");
            return false;
        }

        let mut configuration = self.shared.configuration();
        if self.shared.is_active() {
            tracing::error!("Cannot reconfigure while a patch session is running");
            return false;
        }

        tracing::debug!(
            "Configured patch for labels: {}",
            labels
                .iter()
                .map(Label::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        *configuration = Some(Configuration { labels, observers });
        true
    }

    pub fn is_configured(&self) -> bool {
        self.shared.configuration().is_some()
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    /// Records the operator's answer. Only a session waiting in
    /// [Phase::CheckDownload] acts on it.
    pub fn set_confirmation(&self, approved: bool) {
        self.shared.confirmation.set(approved);
    }

    pub fn confirmation(&self) -> ConfirmationState {
        self.shared.confirmation.current()
    }

    /// Starts a session on the current tokio runtime.
    ///
    /// Returns `None`, without touching any running session, when the system
    /// is not configured or a session is already active.
    pub fn start(&self) -> Option<SessionHandle> {
        let configuration = self.shared.configuration();
        let Some(configuration) = configuration.clone() else {
            tracing::error!("Cannot start a patch before it has been configured");
            return None;
        };

        if self.shared.is_active() {
            tracing::error!(
                "A patch session is already running (phase: {})",
                self.status().phase
            );
            return None;
        }

        self.shared.status.send_replace(SessionStatus {
            phase: Phase::Initialize,
            last_outcome: PhaseOutcome::Pending,
        });
        self.shared.confirmation.reset();

        let session = Session {
            backend: self.backend.clone(),
            labels: configuration.labels,
            observers: configuration.observers,
            settings: self.settings.clone(),
            shared: self.shared.clone(),
            finished: AtomicBool::new(false),
        };
        Some(SessionHandle {
            task: tokio::spawn(session.run()),
        })
    }
}

/// Join handle of a running session.
pub struct SessionHandle {
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session's terminal outcome.
    pub async fn wait(self) -> Result<SessionOutcome> {
        self.task.await.context("Patch session ended abnormally")
    }
}

/// One run of the phase sequence. Owns a frozen copy of the configuration.
struct Session<B: Backend> {
    backend: Arc<B>,
    labels: Arc<[Label]>,
    observers: Observers,
    settings: PatchSettings,
    shared: Arc<Shared>,
    finished: AtomicBool,
}

impl<B: Backend> Session<B> {
    async fn run(self) -> SessionOutcome {
        tracing::info!("Starting patch for {} label(s)", self.labels.len());

        for phase in Phase::SEQUENCE {
            self.enter(phase);
            let outcome = self.run_phase(phase).await;
            self.shared
                .status
                .send_modify(|status| status.last_outcome = outcome.clone());

            if let Some(ending) = session_outcome(phase, outcome) {
                return self.finish(ending);
            }
        }

        self.finish(SessionOutcome::Succeeded)
    }

    fn enter(&self, phase: Phase) {
        self.shared.status.send_modify(|status| {
            status.phase = phase;
            status.last_outcome = PhaseOutcome::Pending;
        });
        if phase == Phase::CheckDownload {
            // Only answers given from here on count for this session.
            self.shared.confirmation.reset();
        }
        tracing::debug!("Entering phase {}", phase);
        self.observers.publish(&PatchEvent::PhaseChanged(phase));
    }

    async fn run_phase(&self, phase: Phase) -> PhaseOutcome {
        match phase {
            Phase::Initialize => self.initialize().await,
            Phase::CheckDownloadSize => {
                size_probe::run(
                    self.backend.as_ref(),
                    &self.labels,
                    &self.observers,
                    self.settings.operation_timeout,
                )
                .await
            }
            Phase::CheckDownload => {
                self.shared
                    .confirmation
                    .wait(self.settings.confirmation_timeout)
                    .await
            }
            Phase::Downloading => {
                download_runner::run(
                    self.backend.as_ref(),
                    &self.labels,
                    &self.observers,
                    &self.settings,
                )
                .await
            }
            Phase::Idle | Phase::End => PhaseOutcome::Succeeded,
        }
    }

    async fn initialize(&self) -> PhaseOutcome {
        let result = bounded(
            "initialize",
            self.settings.operation_timeout,
            self.backend.initialize(),
        )
        .await;
        if let Err(err) = &result {
            tracing::error!("{}", err);
        }
        PhaseOutcome::from_result(result)
    }

    fn finish(&self, outcome: SessionOutcome) -> SessionOutcome {
        self.finished.store(true, Ordering::SeqCst);
        self.shared
            .status
            .send_modify(|status| status.phase = Phase::End);

        match &outcome {
            SessionOutcome::Succeeded => {
                tracing::info!("Patch complete");
                self.observers.publish(&PatchEvent::Succeeded);
            }
            SessionOutcome::Interrupted => {
                tracing::info!("Patch interrupted");
                self.observers.publish(&PatchEvent::Interrupted);
            }
            SessionOutcome::Failed(err) => {
                tracing::debug!("Patch failed: {}", err);
                self.observers.publish(&PatchEvent::Failed(err.clone()));
            }
        }
        outcome
    }
}

impl<B: Backend> Drop for Session<B> {
    fn drop(&mut self) {
        // Reached when the session task unwinds before `finish`, e.g. from a
        // panicking observer.
        if !self.finished.load(Ordering::SeqCst) {
            tracing::error!("Patch session ended without an outcome");
            self.shared
                .status
                .send_modify(|status| status.phase = Phase::End);
        }
    }
}

/// How the session ends after `phase` finished with `outcome`, or `None` to
/// move on to the next phase.
fn session_outcome(phase: Phase, outcome: PhaseOutcome) -> Option<SessionOutcome> {
    match outcome {
        PhaseOutcome::Succeeded => None,
        PhaseOutcome::Interrupted => Some(SessionOutcome::Interrupted),
        PhaseOutcome::Failed(err) => Some(SessionOutcome::Failed(err)),
        PhaseOutcome::Pending => {
            tracing::error!("Phase {} finished without an outcome", phase);
            Some(SessionOutcome::Interrupted)
        }
    }
}
