//! Git operations the reconciler depends on, and the implementation that
//! shells out to the system `git` binary through [`tokio::process::Command`].

use crate::util::errors::{Error, Result, StdError};
use async_trait::async_trait;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Blocking-from-the-caller's-view git operations against a local working copy.
#[async_trait]
pub trait GitOps: Send + Sync {
    /// Clone `url` into `dest`, which may already exist as an empty directory.
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Fast-forward the working copy at `dest` from its origin.
    async fn pull(&self, dest: &Path) -> Result<()>;

    /// Newest commit reachable from `HEAD` since `since`, or `since` itself when
    /// nothing has landed after it.
    ///
    /// A symbolic pin such as `master` is returned unchanged: after a pull it names
    /// `HEAD` itself, so it never advances to a commit id.
    async fn latest_commit_since(&self, dest: &Path, since: &str) -> Result<String>;
}

#[async_trait]
impl<G: GitOps + ?Sized> GitOps for Arc<G> {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        (**self).clone_repo(url, dest).await
    }

    async fn pull(&self, dest: &Path) -> Result<()> {
        (**self).pull(dest).await
    }

    async fn latest_commit_since(&self, dest: &Path, since: &str) -> Result<String> {
        (**self).latest_commit_since(dest, since).await
    }
}

#[derive(Clone, Debug)]
pub struct GitCli {
    binary: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    /// Run git with `args`, returning trimmed stdout on success.
    async fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let rendered = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning git {}", rendered);

        let output = cmd
            .output()
            .await
            .map_err(|e| Error::StdError(StdError::IoError(e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::StdError(StdError::GitError(format!(
                "git {} failed ({}): {}",
                rendered,
                output.status,
                stderr.trim()
            ))));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Arguments of `git clone`. `--` keeps a url starting with `-` from being read as an option.
fn clone_args<'a>(url: &'a str, dest: &'a Path) -> Vec<&'a OsStr> {
    vec![
        OsStr::new("clone"),
        OsStr::new("--"),
        OsStr::new(url),
        dest.as_os_str(),
    ]
}

/// Arguments of `git rev-list` for the newest commit in `range`. `--end-of-options` makes a
/// pin such as `--all` a revision, not an option.
fn rev_list_args<'a>(dest: &'a Path, range: &'a str) -> Vec<&'a OsStr> {
    vec![
        OsStr::new("-C"),
        dest.as_os_str(),
        OsStr::new("rev-list"),
        OsStr::new("-n"),
        OsStr::new("1"),
        OsStr::new("--end-of-options"),
        OsStr::new(range),
    ]
}

#[async_trait]
impl GitOps for GitCli {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.run(clone_args(url, dest)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn pull(&self, dest: &Path) -> Result<()> {
        self.run([
            OsStr::new("-C"),
            dest.as_os_str(),
            OsStr::new("pull"),
            OsStr::new("--ff-only"),
        ])
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn latest_commit_since(&self, dest: &Path, since: &str) -> Result<String> {
        if since.is_empty() {
            return self
                .run([OsStr::new("-C"), dest.as_os_str(), OsStr::new("rev-parse"), OsStr::new("HEAD")])
                .await;
        }

        let range = format!("{since}..HEAD");
        let newest = self.run(rev_list_args(dest, &range)).await?;

        if newest.is_empty() {
            Ok(since.to_string())
        } else {
            Ok(newest)
        }
    }
}
