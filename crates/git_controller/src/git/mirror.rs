use super::GitOps;
use crate::util::errors::{Error, Result, StdError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory under the base directory holding every mirror
pub const DATA_DIR: &str = "repos";

/// Presence of this entry inside a mirror path means the mirror has been cloned
pub const REPOSITORY_MARKER: &str = ".git";

/// Identity of one mirror: one per git volume of one workload object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MirrorKey<'a> {
    pub namespace: &'a str,
    pub kind: &'a str,
    pub name: &'a str,
    pub volume: &'a str,
}

/// Local working copies of the repositories referenced by git volumes.
///
/// Mirrors live at `<base_dir>/repos/<namespace>/<kind>/<name>/<volume>` and are
/// never removed; each sync either clones into the path or fast-forwards it.
#[derive(Clone, Debug)]
pub struct MirrorStore<G> {
    base_dir: PathBuf,
    git: G,
}

impl<G: GitOps> MirrorStore<G> {
    pub fn new(base_dir: impl Into<PathBuf>, git: G) -> Self {
        Self {
            base_dir: base_dir.into(),
            git,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn mirror_path(&self, key: &MirrorKey<'_>) -> PathBuf {
        self.base_dir
            .join(DATA_DIR)
            .join(key.namespace)
            .join(key.kind.to_lowercase())
            .join(key.name)
            .join(key.volume)
    }

    /// Make sure `path` holds an up to date working copy of `repository`.
    ///
    /// Nothing is retried here; the next poll is the retry.
    pub async fn sync(&self, repository: &str, path: &Path) -> Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o777);
        builder
            .create(path)
            .await
            .map_err(|e| Error::StdError(StdError::IoError(e)))?;

        let cloned = tokio::fs::try_exists(path.join(REPOSITORY_MARKER))
            .await
            .map_err(|e| Error::StdError(StdError::IoError(e)))?;

        if cloned {
            debug!("Pulling {} into {}", repository, path.display());
            self.git.pull(path).await
        } else {
            info!("Cloning {} into {}", repository, path.display());
            self.git.clone_repo(repository, path).await
        }
    }

    /// Newest commit in the mirror at `path` since `pinned`, or `pinned` when
    /// nothing landed after it.
    pub async fn latest_since(&self, path: &Path, pinned: &str) -> Result<String> {
        self.git.latest_commit_since(path, pinned).await
    }
}
