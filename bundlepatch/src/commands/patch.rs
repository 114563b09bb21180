use crate::cli::GlobalArgs;
use crate::commands::{ConfirmationPolicy, PatchContext, SessionArgs, run_session};
use crate::ui;
use anyhow::{Context, Result};
use bundlepatch_lib::phase::SessionOutcome;
use clap::Args;

#[derive(Args)]
pub struct PatchCommand {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Skip confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

impl PatchCommand {
    pub async fn run(self, global_args: GlobalArgs) -> Result<()> {
        let context = PatchContext::load(&global_args, &self.session)?;
        let policy = if self.yes {
            ConfirmationPolicy::Approve
        } else {
            ConfirmationPolicy::Prompt
        };

        match run_session(&context, policy).await? {
            SessionOutcome::Succeeded => {
                ui::success(&format!(
                    "Patched {} label(s) into {}",
                    context.labels.len(),
                    context.config.bundles_dir.display()
                ));
                Ok(())
            }
            SessionOutcome::Interrupted => {
                ui::warning("Patch cancelled.");
                Ok(())
            }
            SessionOutcome::Failed(err) => Err(err).context("Patch failed"),
        }
    }
}
