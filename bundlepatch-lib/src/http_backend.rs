use crate::backend::{Backend, DownloadHandle, DownloadProgress};
use crate::catalog::{BundleEntry, Catalog, CatalogSource};
use crate::config::Config;
use crate::error::BackendError;
use crate::label::Label;
use anyhow::{Context, Result, anyhow, bail};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

/// Delivery backend reading a JSON catalog and fetching bundles over HTTP
/// into the local bundle cache.
pub struct HttpBackend {
    config: Config,
    source: CatalogSource,
    client: Client,
    catalog: RwLock<Option<Arc<Catalog>>>,
}

impl HttpBackend {
    pub fn new(config: &Config, source: CatalogSource) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("bundlepatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(config, source, client))
    }

    pub fn with_client(config: &Config, source: CatalogSource, client: Client) -> Self {
        Self {
            config: config.clone(),
            source,
            client,
            catalog: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &CatalogSource {
        &self.source
    }

    fn catalog(&self) -> Result<Arc<Catalog>, BackendError> {
        self.catalog
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(BackendError::NotInitialized)
    }

    fn bundle_path(&self, bundle: &BundleEntry) -> PathBuf {
        self.config.bundles_dir.join(&bundle.name)
    }

    /// Bundles of `label` that are not in the cache yet.
    fn missing_bundles(
        &self,
        catalog: &Catalog,
        label: &Label,
    ) -> Result<Vec<BundleEntry>, BackendError> {
        let bundles: Vec<_> = catalog.bundles_for(label).collect();
        if bundles.is_empty() {
            return Err(BackendError::UnknownLabel(label.clone()));
        }
        Ok(bundles
            .into_iter()
            .filter(|bundle| !is_cached(&self.bundle_path(bundle), bundle.size))
            .cloned()
            .collect())
    }

    async fn load_catalog(&self) -> Result<Catalog> {
        let content = match &self.source {
            CatalogSource::Remote(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("Failed to request catalog from {url}"))?;
                if !response.status().is_success() {
                    bail!("Catalog request failed: {}", response.status());
                }
                response.text().await?
            }
            CatalogSource::Local(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read catalog {}", path.display()))?,
        };
        Catalog::from_json(&content)
    }

    fn save_catalog_copy(&self, catalog: &Catalog) -> Result<()> {
        if let Some(parent) = self.config.catalog_cache_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(catalog)?;
        std::fs::write(&self.config.catalog_cache_file, content)?;
        Ok(())
    }
}

impl Backend for HttpBackend {
    type Download = HttpDownload;

    async fn initialize(&self) -> Result<(), BackendError> {
        tracing::debug!("Loading catalog from {}", self.source);
        let catalog = self
            .load_catalog()
            .await
            .map_err(|err| BackendError::initialization(&err))?;

        if let Err(err) = self.save_catalog_copy(&catalog) {
            tracing::warn!("Failed to save catalog copy: {:#}", err);
        }

        tracing::debug!("Catalog lists {} bundles", catalog.bundles.len());
        *self
            .catalog
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(catalog));
        Ok(())
    }

    async fn download_size(&self, label: &Label) -> Result<u64, BackendError> {
        let catalog = self.catalog()?;
        let missing = self.missing_bundles(&catalog, label)?;
        Ok(missing.iter().map(|bundle| bundle.size).sum())
    }

    fn download_dependencies(&self, label: &Label) -> HttpDownload {
        let state = Arc::new(TransferState::default());
        let plan = self
            .catalog()
            .and_then(|catalog| self.missing_bundles(&catalog, label));
        if let Ok(bundles) = &plan {
            let total = bundles.iter().map(|bundle| bundle.size).sum();
            state.total.store(total, Ordering::SeqCst);
        }

        let task = tokio::spawn({
            let client = self.client.clone();
            let bundles_dir = self.config.bundles_dir.clone();
            let label = label.clone();
            let state = state.clone();
            async move {
                let result = match plan {
                    Ok(bundles) => fetch_bundles(&client, &bundles, &bundles_dir, &state)
                        .await
                        .map_err(|err| BackendError::download(&label, &err)),
                    Err(err) => Err(err),
                };
                state.done.store(true, Ordering::SeqCst);
                result
            }
        });

        HttpDownload {
            label: label.clone(),
            state,
            task: Some(task),
        }
    }
}

#[derive(Default)]
struct TransferState {
    downloaded: AtomicU64,
    total: AtomicU64,
    done: AtomicBool,
}

/// Transfer of one label's missing bundles, running on its own task.
pub struct HttpDownload {
    label: Label,
    state: Arc<TransferState>,
    task: Option<JoinHandle<Result<(), BackendError>>>,
}

impl DownloadHandle for HttpDownload {
    fn is_done(&self) -> bool {
        self.state.done.load(Ordering::SeqCst)
    }

    fn progress(&self) -> DownloadProgress {
        DownloadProgress::new(
            self.state.downloaded.load(Ordering::SeqCst),
            self.state.total.load(Ordering::SeqCst),
        )
    }

    async fn result(mut self) -> Result<(), BackendError> {
        let Some(task) = self.task.take() else {
            return Err(BackendError::download(
                &self.label,
                &anyhow!("Transfer result was already taken"),
            ));
        };
        task.await
            .unwrap_or_else(|err| Err(BackendError::download(&self.label, &anyhow!(err))))
    }
}

impl Drop for HttpDownload {
    fn drop(&mut self) {
        if let Some(task) = &self.task
            && !task.is_finished()
        {
            tracing::debug!("Cancelling download of {}", self.label);
            task.abort();
        }
    }
}

fn is_cached(path: &Path, size: u64) -> bool {
    std::fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.len() == size)
        .unwrap_or(false)
}

async fn fetch_bundles(
    client: &Client,
    bundles: &[BundleEntry],
    bundles_dir: &Path,
    state: &TransferState,
) -> Result<()> {
    tokio::fs::create_dir_all(bundles_dir).await?;
    for bundle in bundles {
        tracing::debug!("Fetching {} ({} bytes)", bundle.name, bundle.size);
        fetch_bundle(client, bundle, bundles_dir, state)
            .await
            .with_context(|| format!("Failed to fetch {}", bundle.name))?;
    }
    Ok(())
}

async fn fetch_bundle(
    client: &Client,
    bundle: &BundleEntry,
    bundles_dir: &Path,
    state: &TransferState,
) -> Result<()> {
    let response = client.get(&bundle.url).send().await?;
    if !response.status().is_success() {
        bail!("Download failed: {}", response.status());
    }

    let mut part = PartFile {
        path: bundles_dir.join(format!("{}.part", bundle.name)),
        persisted: false,
    };
    let mut file = tokio::fs::File::create(&part.path).await?;
    let mut written = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        state
            .downloaded
            .fetch_add(chunk.len() as u64, Ordering::SeqCst);
    }
    file.flush().await?;
    drop(file);

    if written != bundle.size {
        bail!(
            "Expected {} bytes but received {}",
            bundle.size,
            written
        );
    }

    tokio::fs::rename(&part.path, bundles_dir.join(&bundle.name)).await?;
    part.persisted = true;
    Ok(())
}

/// A bundle being written. Removed on drop unless it was moved into place,
/// which also covers a transfer aborted mid-stream.
struct PartFile {
    path: PathBuf,
    persisted: bool,
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.persisted
            && let Err(err) = std::fs::remove_file(&self.path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("Failed to remove {}: {}", self.path.display(), err);
        }
    }
}
