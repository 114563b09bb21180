use crate::error::BackendError;
use std::fmt;

/// Stage of a patch session, in execution order.
///
/// `Idle` means no session has run yet. `End` is reached by every finished
/// session, whatever its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Phase {
    #[default]
    Idle,
    Initialize,
    CheckDownloadSize,
    CheckDownload,
    Downloading,
    End,
}

impl Phase {
    /// The runnable phases of one session, in order.
    pub const SEQUENCE: [Phase; 4] = [
        Phase::Initialize,
        Phase::CheckDownloadSize,
        Phase::CheckDownload,
        Phase::Downloading,
    ];

    /// True while a session is between `Idle` and `End`.
    pub fn is_active(self) -> bool {
        Phase::Idle < self && self < Phase::End
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Initialize => "initialize",
            Phase::CheckDownloadSize => "check-download-size",
            Phase::CheckDownload => "check-download",
            Phase::Downloading => "downloading",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single phase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PhaseOutcome {
    /// The phase has not finished yet.
    #[default]
    Pending,
    Succeeded,
    /// The operator declined to continue.
    Interrupted,
    Failed(BackendError),
}

impl PhaseOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, PhaseOutcome::Pending)
    }

    pub fn from_result(result: Result<(), BackendError>) -> Self {
        match result {
            Ok(()) => PhaseOutcome::Succeeded,
            Err(err) => PhaseOutcome::Failed(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationState {
    #[default]
    Unset,
    Approved,
    Declined,
}

impl From<bool> for ConfirmationState {
    fn from(approved: bool) -> Self {
        if approved {
            ConfirmationState::Approved
        } else {
            ConfirmationState::Declined
        }
    }
}

/// Terminal result of a whole session. Exactly one is produced per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Succeeded,
    Interrupted,
    Failed(BackendError),
}
