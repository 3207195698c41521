use anyhow::{
    Context,
    Result,
    ensure,
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    process::Command,
};

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Activity center helper tasks (fmt, clippy, tests, mock server)",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format the workspace, or only verify formatting with --check
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Run clippy for the entire workspace with warnings-as-errors
    Clippy,
    /// Run the workspace tests
    Test {
        /// Skip the HTTP tests that start a mock server
        #[arg(long)]
        skip_http: bool,
    },
    /// Serve the mock rewards API for manual CLI runs
    MockServer {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = repo_root()?;

    match cli.command {
        Commands::Fmt { check } => run_fmt(&root, check)?,
        Commands::Clippy => run_clippy(&root)?,
        Commands::Test { skip_http } => run_tests(&root, skip_http)?,
        Commands::MockServer { port } => run_mock_server(&root, port)?,
    }

    Ok(())
}

fn repo_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask has no parent directory")
}

fn run_fmt(root: &Path, check: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("fmt").arg("--all").current_dir(root);
    if check {
        cmd.arg("--").arg("--check");
    }
    run_command(cmd, "cargo fmt")
}

fn run_clippy(root: &Path) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("clippy")
        .arg("--workspace")
        .arg("--all-targets")
        .arg("--all-features")
        .arg("--")
        .arg("-D")
        .arg("warnings")
        .current_dir(root);
    run_command(cmd, "cargo clippy")
}

fn run_tests(root: &Path, skip_http: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("test").current_dir(root);
    if skip_http {
        cmd.arg("-p")
            .arg("reward-state")
            .arg("-p")
            .arg("activity-cli")
            .arg("--lib")
            .arg("--bins");
    } else {
        cmd.arg("--workspace");
    }
    run_command(cmd, "cargo test")
}

fn run_mock_server(root: &Path, port: u16) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("run")
        .arg("-p")
        .arg("mock-server")
        .arg("--bin")
        .arg("rewards-mock-server")
        .arg("--")
        .arg("--port")
        .arg(port.to_string())
        .current_dir(root);
    run_command(cmd, "rewards-mock-server")
}

fn run_command(mut cmd: Command, label: &str) -> Result<()> {
    println!("Running: {}", label);
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {label}"))?;
    ensure!(status.success(), "{label} failed with status {status}");
    Ok(())
}
