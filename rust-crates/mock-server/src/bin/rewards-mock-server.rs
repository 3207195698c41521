use clap::Parser;
use mock_server::{
    BackendConfig,
    RewardBackend,
    serve_forever,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Serves the rewards API from memory", long_about = None)]
struct Args {
    #[arg(short, long)]
    port: Option<u16>,

    /// Starting points balance.
    #[arg(short, long, default_value_t = 100)]
    balance: u64,

    #[arg(long, default_value_t = 5)]
    gacha_codes: usize,

    /// Seed for reproducible prizes and reels.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
    let args = Args::parse();
    let backend = RewardBackend::new(BackendConfig {
        balance: args.balance,
        gacha_codes: args.gacha_codes,
        seed: args.seed,
        ..BackendConfig::default()
    });
    serve_forever(backend, Some(args.port.unwrap_or(8000)))
}
