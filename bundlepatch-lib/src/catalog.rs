use crate::label::Label;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Listing of every bundle the delivery server offers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct Catalog {
    pub bundles: Vec<BundleEntry>,
}

/// A single downloadable file and the labels it belongs to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BundleEntry {
    /// File name inside the bundle cache
    pub name: String,
    pub url: String,
    /// Size in bytes; a cached file of any other length is downloaded again
    pub size: u64,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Catalog {
    pub fn from_json(content: &str) -> Result<Self> {
        let catalog: Catalog =
            serde_json::from_str(content).context("Failed to parse bundle catalog")?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for bundle in &self.bundles {
            let file_name = Path::new(&bundle.name).file_name().and_then(|n| n.to_str());
            if file_name != Some(bundle.name.as_str()) {
                bail!("Bundle name '{}' is not a plain file name", bundle.name);
            }
            if !names.insert(bundle.name.as_str()) {
                bail!("Bundle '{}' is listed more than once", bundle.name);
            }
        }
        Ok(())
    }

    pub fn bundles_for<'a>(&'a self, label: &'a Label) -> impl Iterator<Item = &'a BundleEntry> {
        self.bundles
            .iter()
            .filter(move |bundle| bundle.labels.contains(label))
    }

    pub fn labels(&self) -> BTreeSet<&Label> {
        self.bundles
            .iter()
            .flat_map(|bundle| bundle.labels.iter())
            .collect()
    }
}

/// Where the catalog is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Remote(String),
    Local(PathBuf),
}

impl CatalogSource {
    /// `http(s)://` locations are remote; anything else is a path, resolved
    /// against `base_dir` when relative.
    pub fn parse(location: &str, base_dir: &Path) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            CatalogSource::Remote(location.to_string())
        } else {
            CatalogSource::Local(base_dir.join(location))
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::Remote(url) => f.write_str(url),
            CatalogSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}
