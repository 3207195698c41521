mod commands;
mod logging;

use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use commands::Command;
use mock_server::{
    BackendConfig,
    MockServer,
    RewardBackend,
};
use reward_state::{
    RewardSession,
    config::{
        ClientConfig,
        ProfileEnv,
        ProfileStore,
    },
    http_client::HttpRewardApi,
    session::SessionConfig,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "activity-center",
    about = "Sign in, draw, scratch, spin and open capsules against the rewards API",
    version
)]
struct Args {
    /// Settings profile to load (local, dev or test)
    #[arg(long, default_value_t = ProfileEnv::Local)]
    profile: ProfileEnv,

    /// Override the profiles directory (defaults to ~/.activity-center/profiles)
    #[arg(long)]
    profiles_dir: Option<PathBuf>,

    /// Override the API base url
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token sent with every request
    #[arg(long)]
    token: Option<String>,

    /// Milliseconds before an action is abandoned
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip the status refresh after successful actions
    #[arg(long)]
    no_refresh: bool,

    /// Poll interval for `watch`, in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Write the resolved settings back to the profile
    #[arg(long)]
    save_profile: bool,

    /// Run against an in-process mock server instead of `base_url`
    #[arg(long)]
    mock: bool,

    /// Write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn apply_overrides(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(token) = &self.token {
            config.bearer_token = Some(token.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.action_timeout_ms = timeout_ms;
        }
        if self.no_refresh {
            config.refresh_after_success = false;
        }
        if let Some(poll_ms) = self.poll_ms {
            config.poll_interval_ms = poll_ms;
        }
        config
    }

    fn profile_store(&self) -> ProfileStore {
        match &self.profiles_dir {
            Some(dir) => ProfileStore::in_dir(dir, self.profile),
            None => ProfileStore::new(self.profile),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    logging::init(args.log_dir.as_deref())?;

    let store = args.profile_store();
    let stored = store.load_or_default().map_err(|e| eyre!("{e:#}"))?;
    let mut config = args.apply_overrides(stored);
    if args.save_profile {
        store.save(&config).map_err(|e| eyre!("{e:#}"))?;
        tracing::info!("saved {} profile to {}", args.profile, store.path().display());
    }

    let _mock = if args.mock {
        let server = MockServer::start(RewardBackend::new(BackendConfig::default()), None)
            .map_err(|e| eyre!("{e:#}"))?;
        config.base_url = server.base_url().to_string();
        Some(server)
    } else {
        None
    };

    let api = HttpRewardApi::from_config(&config)
        .map_err(|e| eyre!("{e:#}"))
        .wrap_err("creating rewards API client")?;
    tracing::info!("using rewards API at {}", api.base_url());
    let session = RewardSession::new(api, SessionConfig::from(&config));
    commands::run(&session, args.command, config.poll_interval()).await
}
