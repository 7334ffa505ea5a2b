//! subrelay command-line entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use subrelay::types::SourceRoute;
use subrelay::{Config, Credentials, PassReport, RelayService, Result, routes, run_with_shutdown};
use tracing_subscriber::EnvFilter;

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(
    name = "subrelay",
    version,
    about = "Relay new media posts from subreddits to Telegram forum topics"
)]
struct Cli {
    /// Route file (`subreddit, topic_id` per line)
    #[arg(long, global = true)]
    routes: Option<PathBuf>,

    /// SQLite database holding delivered items
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Seconds to sleep between passes
    #[arg(long, global = true, value_name = "SECS")]
    interval: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

/// CLI Commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Poll forever until SIGINT/SIGTERM (default)
    Run,
    /// Run a single pass and exit
    Once,
    /// Add a subreddit route to the route file
    Add {
        /// Subreddit name, with or without `r/`
        subreddit: String,
        /// Destination topic id
        topic_id: i64,
    },
    /// Check routes and credentials without contacting any API
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal; real environment variables still apply
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, fatal = e.is_fatal(), "subrelay exited with an error");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(path) = cli.routes {
        config.routes_path = path;
    }
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    if let Some(secs) = cli.interval {
        config.poll_interval = Duration::from_secs(secs);
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let service = RelayService::open(config, Credentials::from_env()?).await?;
            run_with_shutdown(&service).await
        }
        Command::Once => {
            let service = RelayService::open(config, Credentials::from_env()?).await?;
            let report = service.run_once().await?;
            print_report(&report);
            Ok(())
        }
        Command::Add {
            subreddit,
            topic_id,
        } => {
            let route = SourceRoute::new(&subreddit, topic_id);
            routes::append(&config.routes_path, &route).await?;
            println!(
                "Added r/{} -> topic {} in {}",
                route.source,
                route.topic_id,
                config.routes_path.display()
            );
            Ok(())
        }
        Command::Validate => {
            config.validate()?;
            let loaded = routes::load(&config.routes_path).await?;
            let credentials = Credentials::from_env()?;

            println!("Routes ({}):", config.routes_path.display());
            for route in &loaded {
                println!("  r/{} -> topic {}", route.source, route.topic_id);
            }
            println!("Telegram group: {}", credentials.telegram.group_id);
            match credentials.telegram.error_topic_id {
                Some(topic) => println!("Error topic: {}", topic),
                None => println!("Error topic: disabled"),
            }
            println!("Configuration OK");
            Ok(())
        }
    }
}

fn print_report(report: &PassReport) {
    println!(
        "sources: {}  delivered: {}  already seen: {}  without media: {}",
        report.sources, report.delivered, report.skipped_seen, report.skipped_no_media
    );
    for source in &report.failed_sources {
        println!("failed source: r/{}", source);
    }
    for key in &report.failed_deliveries {
        println!("failed delivery: {}", key);
    }
}
