use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use proxy_vet::{
    config::{ConfigStore, ScanConfig, DEFAULT_CONFIG_PATH},
    proxy::{
        cancel_on, source::DEFAULT_LIST_PATH, CheckMode, ConcurrentScanner, ProxyChecker,
        ProxyListFile, ProxySource, ReqwestTransport, SourceConfig, SpeedProbe, SpeedReport,
        ValidationProbe, ValidationReport,
    },
    report::{ConsoleSink, JsonSink, PresentationSink},
    tui::ScanApp,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Concurrent proxy validator: liveness, anonymity grade and throughput
#[derive(Parser)]
#[command(name = "proxy-vet")]
#[command(about = "Concurrent proxy validator: liveness, anonymity grade and throughput")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Proxy list file path
    #[arg(short, long, global = true, default_value = DEFAULT_LIST_PATH)]
    proxies: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a fresh proxy list and save it
    Update {
        /// URL to fetch the list from
        #[arg(long)]
        source: Option<String>,
    },
    /// Check every proxy in the list
    Check {
        /// Require every configured hard check site instead of the canary page
        #[arg(long)]
        hard: bool,
        /// Run a speed test on the working proxies afterwards
        #[arg(long)]
        speed: bool,
        /// Show the live terminal view while scanning
        #[arg(long, conflicts_with = "json")]
        tui: bool,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
        /// Output file for working proxies, fastest first
        #[arg(short, long)]
        good: Option<PathBuf>,
    },
    /// Measure download speed through every proxy in the list
    Speed {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Set the number of concurrent workers
    Workers {
        /// A positive integer
        count: usize,
    },
    /// Set the hard check sites (one or two http:// or https:// URLs)
    Targets {
        #[arg(required = true, num_args = 1..=2)]
        sites: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = ConfigStore::load(&cli.config)?;
    let list = ProxyListFile::new(&cli.proxies);

    match cli.command {
        Commands::Update { source } => {
            let mut config = SourceConfig::new();
            if let Some(url) = source {
                config = config.with_url(url);
            }
            println!("Fetching proxies from {}", config.url);
            let proxies = ProxySource::with_config(config)?.fetch().await?;
            list.save(&proxies)?;
            println!("Proxies received: {}, saved to {:?}", proxies.len(), list.path());
        }
        Commands::Check {
            hard,
            speed,
            tui,
            json,
            good,
        } => {
            let config = store.snapshot();
            let proxies = load_proxies(&list)?;
            let mut sink = make_sink(json);
            let cancel = interrupt_token();

            let report =
                run_check(proxies, &config, hard, tui, cancel.clone(), sink.as_mut()).await?;
            sink.validation_report(&report)?;

            if let Some(good_path) = good {
                ProxyListFile::new(&good_path).save(&report.working_proxies())?;
                eprintln!(
                    "Saved {} working proxies to {:?}",
                    report.successes.len(),
                    good_path
                );
            }

            if speed && !report.cancelled {
                if report.successes.is_empty() {
                    eprintln!("No active proxies available for speed test.");
                } else {
                    let speed_report =
                        run_speed(report.working_proxies(), &config, cancel, sink.as_mut()).await;
                    sink.speed_report(&speed_report)?;
                }
            }
            sink.finish()?;
        }
        Commands::Speed { json } => {
            let config = store.snapshot();
            let proxies = load_proxies(&list)?;
            let mut sink = make_sink(json);
            let report = run_speed(proxies, &config, interrupt_token(), sink.as_mut()).await;
            sink.speed_report(&report)?;
            sink.finish()?;
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => print_config(&store),
            ConfigAction::Workers { count } => {
                store.set_max_workers(count)?;
                println!("Max workers set to {}.", count);
            }
            ConfigAction::Targets { sites } => {
                store.set_hard_check_targets(sites)?;
                println!(
                    "Hard check sites set to: {}.",
                    store.hard_check_targets().join(", ")
                );
            }
        },
    }

    Ok(())
}

fn make_sink(json: bool) -> Box<dyn PresentationSink> {
    if json {
        Box::new(JsonSink::new(io::stdout()))
    } else {
        Box::new(ConsoleSink::stdout())
    }
}

fn print_config(store: &ConfigStore) {
    println!("Config file: {:?}", store.path());
    println!("Max workers: {}", store.max_workers());
    println!("Hard check sites: {}", store.hard_check_targets().join(", "));
}

fn load_proxies(list: &ProxyListFile) -> Result<Vec<String>> {
    if !list.exists() {
        bail!(
            "Proxy list {:?} not found. Run `proxy-vet update` first.",
            list.path()
        );
    }
    let proxies = list.load()?;
    if proxies.is_empty() {
        bail!(
            "Proxy list {:?} is empty. Run `proxy-vet update` first.",
            list.path()
        );
    }
    Ok(proxies)
}

/// Token shared by every scan pass of one command, cancelled by Ctrl-C
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    cancel_on(token.clone(), async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler: never interrupt
            std::future::pending::<()>().await;
        }
        eprintln!("\nInterrupted. Gathering results...");
    });
    token
}

async fn run_check(
    proxies: Vec<String>,
    config: &ScanConfig,
    hard: bool,
    tui: bool,
    cancel: CancellationToken,
    sink: &mut dyn PresentationSink,
) -> Result<ValidationReport> {
    let mode = if hard {
        CheckMode::hard_from(config)
    } else {
        CheckMode::Soft
    };
    let kind = mode.kind();

    eprintln!(
        "Testing {} proxies ({} check) with {} workers",
        proxies.len(),
        kind,
        config.max_workers
    );

    let checker = ProxyChecker::new(Arc::new(ReqwestTransport::new()));
    let probe = Arc::new(ValidationProbe::new(checker, mode));
    let scanner = ConcurrentScanner::from_config(config);

    let scan = scanner.scan(proxies, probe, cancel);
    let outcome = if tui {
        ScanApp::new(scan, kind).run().await?
    } else {
        scan.collect_with_progress(|completed, total| sink.progress(completed, total))
            .await
    };

    Ok(ValidationReport::from_outcome(outcome))
}

async fn run_speed(
    proxies: Vec<String>,
    config: &ScanConfig,
    cancel: CancellationToken,
    sink: &mut dyn PresentationSink,
) -> SpeedReport {
    eprintln!("Performing speed test for {} proxies", proxies.len());

    let probe = Arc::new(SpeedProbe::new(Arc::new(ReqwestTransport::new())));
    let outcome = ConcurrentScanner::from_config(config)
        .scan(proxies, probe, cancel)
        .collect_with_progress(|completed, total| sink.progress(completed, total))
        .await;

    SpeedReport::from_outcome(outcome)
}
