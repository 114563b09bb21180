use crate::catalog::CatalogSource;
use crate::config::PatchSettings;
use crate::label::Label;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MANIFEST_FILE_NAME: &str = "bundlepatch.toml";

/// What to patch and how, as read from `bundlepatch.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchManifest {
    pub path: PathBuf,
    pub catalog: CatalogSource,
    pub labels: Vec<Label>,
    pub settings: PatchSettings,
}

/// `bundlepatch.toml` file format.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct PatchManifestToml {
    pub patch: SpecPatch,
    pub settings: Option<SpecSettings>,
}

/// `[patch]` toml section.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SpecPatch {
    pub catalog: String,
    pub labels: Option<Vec<Label>>,
}

/// `[settings]` toml section.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SpecSettings {
    pub poll_interval_ms: Option<u64>,
    pub confirmation_timeout_secs: Option<u64>,
    pub operation_timeout_secs: Option<u64>,
}

impl SpecSettings {
    fn into_settings(self) -> PatchSettings {
        let defaults = PatchSettings::default();
        PatchSettings {
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            confirmation_timeout: self.confirmation_timeout_secs.map(Duration::from_secs),
            operation_timeout: self.operation_timeout_secs.map(Duration::from_secs),
        }
    }
}

pub fn load_patch_manifest(start_path: &Path) -> Result<PatchManifest> {
    let path = find_patch_manifest(start_path).ok_or_else(|| {
        anyhow!(
            "No {} file found in {} or in parent directories.",
            MANIFEST_FILE_NAME,
            start_path.display()
        )
    })?;
    parse_patch_manifest(&path)
}

fn parse_patch_manifest(path: &Path) -> Result<PatchManifest> {
    let content = fs::read_to_string(path)?;
    let parsed = toml::from_str::<PatchManifestToml>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    Ok(PatchManifest {
        path: path.to_path_buf(),
        catalog: CatalogSource::parse(&parsed.patch.catalog, base_dir),
        labels: parsed.patch.labels.unwrap_or_default(),
        settings: parsed.settings.unwrap_or_default().into_settings(),
    })
}

/// Searches for `bundlepatch.toml` starting from `start_path` and moving
/// upwards towards the root.
fn find_patch_manifest(start_path: &Path) -> Option<PathBuf> {
    let mut current_dir = start_path.to_path_buf();

    loop {
        let manifest_path = current_dir.join(MANIFEST_FILE_NAME);
        if manifest_path.exists() {
            return Some(manifest_path);
        }

        if !current_dir.pop() {
            return None;
        }
    }
}
