use crate::cli::GlobalArgs;
use crate::commands::{ConfirmationPolicy, PatchContext, SessionArgs, run_session};
use crate::ui;
use anyhow::{Context, Result};
use bundlepatch_lib::phase::SessionOutcome;
use clap::Args;

#[derive(Args)]
pub struct CheckCommand {
    #[command(flatten)]
    pub session: SessionArgs,
}

impl CheckCommand {
    pub async fn run(self, global_args: GlobalArgs) -> Result<()> {
        let context = PatchContext::load(&global_args, &self.session)?;

        // Declining at the confirmation step stops the session right after
        // the sizes are known.
        match run_session(&context, ConfirmationPolicy::Decline).await? {
            SessionOutcome::Failed(err) => Err(err).context("Size check failed"),
            SessionOutcome::Interrupted | SessionOutcome::Succeeded => {
                ui::tip("Run `bundlepatch patch` to download the missing bundles.");
                Ok(())
            }
        }
    }
}
