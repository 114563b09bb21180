use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for bundlepatch data (cache, catalog copy, etc.)
    pub data_dir: PathBuf,

    /// Directory for everything downloaded from the delivery backend
    pub cache_dir: PathBuf,

    /// Directory where downloaded bundles are stored
    pub bundles_dir: PathBuf,

    /// Local copy of the most recently loaded catalog
    pub catalog_cache_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::new_for_path(&Self::default_data_dir())
    }
}

impl Config {
    pub fn new_for_path(data_dir: &Path) -> Self {
        let cache_dir = data_dir.join("cache");
        Self {
            data_dir: data_dir.to_path_buf(),
            bundles_dir: cache_dir.join("bundles"),
            catalog_cache_file: cache_dir.join("catalog.json"),
            cache_dir,
        }
    }

    /// Sets up a new Config for the given data directory.
    /// See also [Self::default_data_dir].
    pub fn setup(data_dir: Option<&Path>) -> Result<Self> {
        let data_dir = data_dir
            .map(|d| d.to_path_buf())
            .unwrap_or_else(Self::default_data_dir);
        let config = Self::new_for_path(&data_dir);

        // Ensure directories exist
        std::fs::create_dir_all(&config.cache_dir)?;
        std::fs::create_dir_all(&config.bundles_dir)?;

        Ok(config)
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
            .join("bundlepatch")
    }
}

/// Tunables of a patch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSettings {
    /// Delay between two progress polls while a label downloads.
    /// Zero yields to the scheduler without sleeping.
    pub poll_interval: Duration,

    /// Upper bound on the wait for a confirmation. `None` waits forever.
    pub confirmation_timeout: Option<Duration>,

    /// Upper bound on each backend operation. `None` waits forever.
    pub operation_timeout: Option<Duration>,
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: None,
            operation_timeout: None,
        }
    }
}
