#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod handlers;
mod server;

use clap::Parser;
use git_controller::{controllers::poller, util::telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::parse();
    telemetry::init(config.log_json).await;

    let settings = config.settings()?;

    // Initialize poll loop state
    let state = poller::State::default();
    let git_controller = async {
        poller::run(state.clone(), settings)
            .await
            .map_err(anyhow::Error::from)
    };

    // The poll loop never returns on its own, so the first error ends the process
    tokio::try_join!(git_controller, server::start_server(state.clone(), config.bind))?;
    Ok(())
}
