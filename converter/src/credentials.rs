//! Persistence of YouTube refresh credentials.
//!
//! A refresh credential is a single opaque string. One is kept per project index plus one
//! default credential that belongs to the top-level OAuth client used before the first rotation.

use eyre::Context;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Key under which a refresh credential is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    /// The top-level OAuth client, active until the first rotation.
    Default,
    /// The OAuth client of the project at this index.
    Project(usize),
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Project(index) => write!(f, "project {index}"),
        }
    }
}

pub trait CredentialStore: Send + Sync {
    /// Returns `Ok(None)` if nothing was ever saved for `slot`.
    fn load(
        &self,
        slot: CredentialSlot,
    ) -> impl Future<Output = eyre::Result<Option<String>>> + Send;

    fn save(
        &self,
        slot: CredentialSlot,
        refresh_token: &str,
    ) -> impl Future<Output = eyre::Result<()>> + Send;
}

/// Stores each slot as a JSON string in its own file inside one directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, slot: CredentialSlot) -> PathBuf {
        let file = match slot {
            CredentialSlot::Default => "refresh_token.json".to_string(),
            CredentialSlot::Project(index) => format!("refresh_token_project_{index}.json"),
        };
        self.dir.join(file)
    }
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self, slot: CredentialSlot) -> eyre::Result<Option<String>> {
        let path = self.path(slot);
        if !tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("check for {}", path.display()))?
        {
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let token: String = serde_json::from_str(&json)
            .with_context(|| format!("parse refresh credential in {}", path.display()))?;
        Ok(Some(token))
    }

    async fn save(&self, slot: CredentialSlot, refresh_token: &str) -> eyre::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create {}", self.dir.display()))?;

        let path = self.path(slot);
        let json = serde_json::to_string(refresh_token).context("serialize refresh credential")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("write {}", path.display()))?;

        tracing::info!(%slot, path = %path.display(), "refresh credential saved");
        Ok(())
    }
}
