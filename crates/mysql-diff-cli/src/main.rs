//! mysql-diff CLI - check that two MySQL-compatible databases hold the same data.
//!
//! Prints exactly one line to stdout, `true` or `false`. Logs go to stderr.

use clap::Parser;
use mysql_diff::{
    Config, Connection, ConnectionConfig, DatabaseSelection, DiffConfig, DiffError, Differ,
    MysqlConnection,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mysql-diff")]
#[command(about = "Compare schema and data of two MySQL-compatible databases")]
#[command(version)]
struct Cli {
    /// Compare all user databases
    #[arg(short = 'A', long)]
    all_databases: bool,

    /// Comma-separated list of databases to compare
    #[arg(short = 'B', long, value_name = "LIST")]
    databases: Option<String>,

    /// First instance: user[:password]@host:port
    #[arg(long, default_value = "root@127.0.0.1:4000")]
    url1: String,

    /// Second instance: user[:password]@host:port
    #[arg(long)]
    url2: Option<String>,

    /// Log level
    #[arg(
        short = 'L',
        long,
        default_value = "info",
        value_parser = ["debug", "info", "warn", "error", "fatal"]
    )]
    log_level: String,

    /// Log format: text or json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    log_format: String,

    /// Path to YAML tuning file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override rows per chunk
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Override number of tables compared in parallel
    #[arg(long)]
    workers: Option<usize>,

    /// Compare every table instead of stopping at the first difference
    #[arg(long)]
    no_fail_fast: bool,

    /// Write the JSON report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(1);
        }
        // --help and --version
        Err(e) => e.exit(),
    };

    match run(cli).await {
        Ok(equal) => {
            println!("{}", equal);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            let code = e.exit_code();
            if code == 0 {
                println!("false");
            }
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, DiffError> {
    setup_logging(&cli.log_level, &cli.log_format);

    let config = build_config(&cli)?;
    info!(
        "Comparing {} with {} ({} workers, {} rows per chunk)",
        config.url1, config.url2, config.diff.workers, config.diff.chunk_size
    );

    let cancel_token = setup_signal_handler();

    let (left, right) = tokio::join!(
        MysqlConnection::connect("url1", &config.url1, &config.diff),
        MysqlConnection::connect("url2", &config.url2, &config.diff),
    );
    let left = Arc::new(left?);
    let right = Arc::new(right?);

    let result = Differ::new(left.clone(), right.clone(), config.diff.clone())
        .with_cancellation(cancel_token)
        .run(&config.selection)
        .await;

    tokio::join!(left.close(), right.close());
    let report = result?;

    if let Some(path) = &cli.report {
        report.write_json(path)?;
        info!("Report written to {:?}", path);
    }

    info!(
        "Finished in {:.2}s: {}",
        report.duration_ms as f64 / 1000.0,
        if report.is_equal() { "equal" } else { "not equal" }
    );
    Ok(report.is_equal())
}

/// Turn flags and the optional tuning file into a validated [`Config`].
fn build_config(cli: &Cli) -> Result<Config, DiffError> {
    let selection = match (cli.all_databases, &cli.databases) {
        (true, Some(_)) => {
            return Err(DiffError::Config(
                "--all-databases and --databases cannot be used together".into(),
            ))
        }
        (true, None) => DatabaseSelection::All,
        (false, Some(list)) => DatabaseSelection::from_list(list),
        (false, None) => DatabaseSelection::Names(Vec::new()),
    };

    let url2 = cli
        .url2
        .as_deref()
        .ok_or_else(|| DiffError::Config("--url2 is required".into()))?;

    let mut diff = match &cli.config {
        Some(path) => {
            let diff = DiffConfig::load(path)?;
            info!("Loaded tuning from {:?}", path);
            diff
        }
        None => DiffConfig::default(),
    };
    if let Some(chunk_size) = cli.chunk_size {
        diff.chunk_size = chunk_size;
    }
    if let Some(workers) = cli.workers {
        diff.workers = workers;
    }
    if cli.no_fail_fast {
        diff.fail_fast = false;
    }

    Config::new(
        ConnectionConfig::from_url(&cli.url1)?,
        ConnectionConfig::from_url(url2)?,
        selection,
        diff,
    )
}

fn setup_logging(level: &str, format: &str) {
    let level = match level {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" | "fatal" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the comparison on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Cancelling comparison...", name);
                    token.cancel();
                });
            }
            Err(e) => warn!("Cannot install {} handler: {}", name, e),
        }
    }

    cancel_token
}

/// Cancel the comparison on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Cancelling comparison...");
            token.cancel();
        }
    });

    cancel_token
}
