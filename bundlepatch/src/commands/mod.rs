pub mod cache;
pub mod check;
pub mod patch;

use crate::cli::GlobalArgs;
use crate::ui;
use anyhow::{Context, Result, bail};
use bundlepatch_lib::backend::Backend;
use bundlepatch_lib::catalog::CatalogSource;
use bundlepatch_lib::config::{Config, PatchSettings};
use bundlepatch_lib::http_backend::HttpBackend;
use bundlepatch_lib::label::Label;
use bundlepatch_lib::manifest::load_patch_manifest;
use bundlepatch_lib::observer::{ChannelObserver, PatchEvent};
use bundlepatch_lib::patch_system::PatchSystem;
use bundlepatch_lib::phase::{Phase, SessionOutcome};
use clap::Args;
use std::io::{self, Write};
use std::sync::Arc;

/// Arguments shared by every command that runs a patch session.
#[derive(Args, Clone)]
pub struct SessionArgs {
    /// Labels to process (defaults to the labels listed in bundlepatch.toml)
    pub labels: Vec<String>,

    /// Catalog URL or path, overriding the one in bundlepatch.toml
    #[arg(long)]
    pub catalog: Option<String>,
}

/// How a session answers the download confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationPolicy {
    Approve,
    Decline,
    /// Ask on the terminal, unless there is nothing to download.
    Prompt,
}

pub struct PatchContext {
    pub config: Config,
    pub catalog: CatalogSource,
    pub labels: Vec<Label>,
    pub settings: PatchSettings,
}

impl PatchContext {
    pub fn load(global_args: &GlobalArgs, args: &SessionArgs) -> Result<Self> {
        let config = Config::setup(global_args.datadir.as_deref())?;
        let working_dir = std::env::current_dir()?;
        let search_dir = global_args
            .manifest
            .clone()
            .unwrap_or_else(|| working_dir.clone());

        let manifest = match load_patch_manifest(&search_dir) {
            Ok(manifest) => Some(manifest),
            Err(err) if args.catalog.is_some() => {
                tracing::debug!("Ignoring manifest: {:#}", err);
                None
            }
            Err(err) => return Err(err),
        };

        let catalog = match (&args.catalog, &manifest) {
            (Some(location), _) => CatalogSource::parse(location, &working_dir),
            (None, Some(manifest)) => manifest.catalog.clone(),
            (None, None) => bail!("No catalog configured. Pass --catalog or add a bundlepatch.toml."),
        };

        let labels = if args.labels.is_empty() {
            manifest
                .as_ref()
                .map(|manifest| manifest.labels.clone())
                .unwrap_or_default()
        } else {
            args.labels.iter().map(|name| Label::from(name.as_str())).collect()
        };
        if labels.is_empty() {
            bail!("No labels to process. List them on the command line or in bundlepatch.toml.");
        }

        Ok(Self {
            config,
            catalog,
            labels,
            settings: manifest
                .map(|manifest| manifest.settings)
                .unwrap_or_default(),
        })
    }

    pub fn patch_system(&self) -> Result<PatchSystem<HttpBackend>> {
        let backend = HttpBackend::new(&self.config, self.catalog.clone())?;
        Ok(PatchSystem::new(backend, self.settings.clone()))
    }
}

/// Runs one session to its end, rendering its events on the terminal.
pub async fn run_session(
    context: &PatchContext,
    policy: ConfirmationPolicy,
) -> Result<SessionOutcome> {
    let system = context.patch_system()?;
    let (observer, mut events) = ChannelObserver::channel();
    if !system.configure(context.labels.clone(), Arc::new(observer).into()) {
        bail!("Failed to configure patch session");
    }

    ui::info(&format!("Using catalog {}", context.catalog));
    let handle = system
        .start()
        .context("Failed to start patch session")?;

    let mut total_size = 0;
    while let Some(event) = events.recv().await {
        match &event {
            PatchEvent::PhaseChanged(Phase::CheckDownloadSize) => {
                ui::info("Download size:");
            }
            PatchEvent::PhaseChanged(Phase::CheckDownload) => {
                let decision = match policy {
                    ConfirmationPolicy::Approve => Ok(true),
                    ConfirmationPolicy::Decline => Ok(false),
                    ConfirmationPolicy::Prompt if total_size == 0 => {
                        ui::success("Everything is up to date");
                        Ok(true)
                    }
                    ConfirmationPolicy::Prompt => prompt_download(total_size).await,
                };
                if let Err(err) = answer_confirmation(&system, decision) {
                    if let Err(join_err) = handle.wait().await {
                        tracing::debug!("{:#}", join_err);
                    }
                    return Err(err);
                }
            }
            PatchEvent::LabelSize { label, bytes } => ui::size_row(label.as_str(), *bytes),
            PatchEvent::TotalSize(bytes) => {
                total_size = *bytes;
                ui::size_row("total", *bytes);
            }
            PatchEvent::DownloadedCount { done, total } if *done > 0 => {
                ui::info(&format!("Downloaded {done}/{total} labels"));
            }
            PatchEvent::Failed(err) => ui::error(&err.to_string()),
            _ => {}
        }

        if event.is_terminal() {
            break;
        }
    }

    handle.wait().await
}

/// Hands the operator's decision to the session. A prompt that failed counts
/// as declined so the session does not keep waiting for an answer.
fn answer_confirmation<B: Backend>(system: &PatchSystem<B>, decision: Result<bool>) -> Result<()> {
    system.set_confirmation(matches!(decision, Ok(true)));
    decision.map(|_| ())
}

async fn prompt_download(total_size: u64) -> Result<bool> {
    ui::question(&format!(
        "Download {}? [y/N]: ",
        ui::bytes_str(total_size)
    ));
    io::stdout().flush()?;

    let input = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        io::stdin().read_line(&mut input).map(|_| input)
    })
    .await??;

    let confirmed = input.trim().to_lowercase();
    Ok(confirmed == "y" || confirmed == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use bundlepatch_lib::phase::ConfirmationState;

    fn patch_system(dir: &std::path::Path) -> Result<PatchSystem<HttpBackend>> {
        let config = Config::setup(Some(dir))?;
        let backend = HttpBackend::new(&config, CatalogSource::Local(dir.join("catalog.json")))?;
        Ok(PatchSystem::new(backend, PatchSettings::default()))
    }

    #[test]
    fn test_answer_confirmation_passes_decision() -> Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let system = patch_system(tmp_dir.path())?;

        answer_confirmation(&system, Ok(true))?;
        assert_eq!(system.confirmation(), ConfirmationState::Approved);

        answer_confirmation(&system, Ok(false))?;
        assert_eq!(system.confirmation(), ConfirmationState::Declined);
        Ok(())
    }

    #[test]
    fn test_failed_prompt_declines() -> Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let system = patch_system(tmp_dir.path())?;

        let result = answer_confirmation(&system, Err(anyhow!("stdin closed")));

        assert!(result.is_err());
        assert_eq!(system.confirmation(), ConfirmationState::Declined);
        Ok(())
    }
}
