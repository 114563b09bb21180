use crate::phase::{ConfirmationState, PhaseOutcome};
use std::time::Duration;
use tokio::sync::watch;

/// Holds the operator's yes/no decision and lets a session wait for it.
#[derive(Debug)]
pub struct ConfirmationGate {
    state: watch::Sender<ConfirmationState>,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConfirmationState::Unset);
        Self { state }
    }

    pub fn set(&self, approved: bool) {
        self.state.send_replace(ConfirmationState::from(approved));
    }

    pub fn current(&self) -> ConfirmationState {
        *self.state.borrow()
    }

    /// Forgets any earlier decision.
    pub fn reset(&self) {
        self.state.send_replace(ConfirmationState::Unset);
    }

    /// Suspends until a decision is set. Approval succeeds; a decline, or no
    /// decision within `timeout`, interrupts.
    pub async fn wait(&self, timeout: Option<Duration>) -> PhaseOutcome {
        let mut receiver = self.state.subscribe();
        let decision = async move {
            receiver
                .wait_for(|state| *state != ConfirmationState::Unset)
                .await
                .map(|state| *state)
        };

        let decision = match timeout {
            Some(limit) => match tokio::time::timeout(limit, decision).await {
                Ok(decision) => decision,
                Err(_) => {
                    tracing::warn!("No confirmation received within {:?}", limit);
                    return PhaseOutcome::Interrupted;
                }
            },
            None => decision.await,
        };

        match decision {
            Ok(ConfirmationState::Approved) => PhaseOutcome::Succeeded,
            Ok(_) => {
                tracing::info!("Download declined");
                PhaseOutcome::Interrupted
            }
            // The gate owns the sender, so the channel cannot close while we wait.
            Err(_) => PhaseOutcome::Interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_approval_succeeds() {
        let gate = Arc::new(ConfirmationGate::new());
        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait(None).await }
        });
        tokio::task::yield_now().await;

        gate.set(true);

        assert_eq!(waiter.await.unwrap(), PhaseOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_decline_interrupts() {
        let gate = Arc::new(ConfirmationGate::new());
        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait(None).await }
        });
        tokio::task::yield_now().await;

        gate.set(false);

        assert_eq!(waiter.await.unwrap(), PhaseOutcome::Interrupted);
    }

    #[tokio::test]
    async fn test_decision_set_after_reset_is_seen() {
        let gate = ConfirmationGate::new();
        gate.reset();
        gate.set(true);
        assert_eq!(gate.wait(None).await, PhaseOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_reset_discards_stale_decision() {
        let gate = Arc::new(ConfirmationGate::new());
        gate.set(true);
        gate.reset();
        assert_eq!(gate.current(), ConfirmationState::Unset);

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait(None).await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.set(false);
        assert_eq!(waiter.await.unwrap(), PhaseOutcome::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_interrupts() {
        let gate = ConfirmationGate::new();
        let outcome = gate.wait(Some(Duration::from_secs(30))).await;
        assert_eq!(outcome, PhaseOutcome::Interrupted);
    }
}
