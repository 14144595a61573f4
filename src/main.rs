use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use coldflow::analysis::CommandAnalyzer;
use coldflow::shutdown::install_shutdown_handler;
use coldflow::{AnalyzerConfig, Coordinator, CoordinatorConfig, Services};

#[derive(Parser, Debug)]
#[command(name = "coldflow")]
#[command(version)]
#[command(about = "Asynchronous analysis-job lifecycle coordinator")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run all pipeline consumers against an in-process stack
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Local staging area for job inputs
    #[arg(long, default_value = "./work")]
    work_dir: PathBuf,

    /// Object-store bucket holding result and log blobs
    #[arg(long, default_value = "coldflow-results")]
    results_bucket: String,

    /// Analysis tool invoked per staged input
    #[arg(long, default_value = "anntools")]
    analyzer: String,

    /// Long-poll wait per queue receive, in seconds
    #[arg(long, default_value = "10")]
    poll_wait_secs: u64,

    /// Grace period before free-tier results are archived, in seconds
    #[arg(long, default_value = "300")]
    archive_grace_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Run(run_args) => run(run_args).await,
    }
}

async fn run(args: RunArgs) {
    let config = CoordinatorConfig::new(args.work_dir, args.results_bucket)
        .with_poll_wait(Duration::from_secs(args.poll_wait_secs))
        .with_archive_grace(Duration::from_secs(args.archive_grace_secs));

    let analyzer = Arc::new(CommandAnalyzer::new(AnalyzerConfig::new(
        args.analyzer,
        &config,
    )));
    let services = Services::in_memory(&config, analyzer);
    let coordinator = Coordinator::new(services, config);

    let cancel = install_shutdown_handler();
    tracing::info!("coldflow pipeline starting");
    coordinator.run(cancel).await;
    tracing::info!("coldflow pipeline stopped");
}
