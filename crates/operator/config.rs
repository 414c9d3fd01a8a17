use clap::Parser;
use git_controller::controllers::poller::Settings;
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Keeps git volumes of Deployments and ReplicationControllers pinned to the newest upstream commit
#[derive(Parser, Debug, Clone)]
#[command(name = "operator", version)]
pub struct Config {
    /// Namespace to watch (default: all namespaces)
    #[arg(long, env = "GITCONTROLLER_NAMESPACE")]
    pub namespace: Option<String>,

    /// Label selector restricting the workloads inspected, e.g. `app=web,tier!=db`
    #[arg(long, short = 'l', env = "GITCONTROLLER_SELECTOR")]
    pub selector: Option<String>,

    /// Seconds between two polls
    #[arg(long, default_value_t = 30, env = "GITCONTROLLER_POLL_INTERVAL")]
    pub poll_interval: u64,

    /// Directory the `repos` mirror tree lives under (default: working directory)
    #[arg(long, env = "GITCONTROLLER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Git binary used for clone and pull
    #[arg(long, default_value = "git", env = "GITCONTROLLER_GIT")]
    pub git: PathBuf,

    /// Address of the health and metrics server
    #[arg(long, default_value = "0.0.0.0:8080", env = "GITCONTROLLER_BIND")]
    pub bind: SocketAddr,

    /// Emit logs as JSON
    #[arg(long, env = "GITCONTROLLER_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// Resolve into poll loop settings. The working directory is read once here.
    pub fn settings(&self) -> std::io::Result<Settings> {
        let base_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(Settings {
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
            selector: self.selector.clone().filter(|s| !s.is_empty()),
            poll_interval: Duration::from_secs(self.poll_interval.max(1)),
            base_dir,
            git_binary: self.git.clone(),
        })
    }
}
