use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use scanward::cli::{Cli, Commands};
use scanward::config::EngineConfig;
use scanward::http::HttpClient;
use scanward::probes::{Probe, builtin_probes};
use scanward::publish::{BroadcastPublisher, ProgressBarPublisher};
use scanward::reporter::{ConsoleReporter, HtmlExporter, JsonExporter};
use scanward::scanner::ScanCoordinator;
use scanward::server::{self, AppState};
use scanward::store::{MemoryStore, ScanStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.command.default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan {
            domain,
            timeout,
            concurrency,
            retries,
            output,
            database,
            verbose,
        } => {
            let mut config = EngineConfig::default()
                .with_probe_timeout(Duration::from_secs(timeout))
                .with_probe_retries(retries);
            if let Some(max) = concurrency {
                config = config.with_max_concurrency(max);
            }
            run_scan(&domain, config, database.as_deref(), output.as_deref(), verbose).await
        }
        Commands::Serve {
            bind,
            database,
            timeout,
            concurrency,
            ..
        } => {
            let mut config =
                EngineConfig::default().with_probe_timeout(Duration::from_secs(timeout));
            if let Some(max) = concurrency {
                config = config.with_max_concurrency(max);
            }
            run_server(&bind, &database, config).await
        }
        Commands::Report {
            input,
            format,
            output,
        } => generate_report(&input, &format, output.as_deref()),
        Commands::Probes => list_probes(),
    }
}

fn probe_set(config: &EngineConfig) -> Result<Vec<Arc<dyn Probe>>> {
    let client = HttpClient::new(config.probe_timeout, &config.user_agent)
        .context("Failed to build HTTP client")?;
    Ok(builtin_probes(Arc::new(client)))
}

async fn open_store(database: Option<&str>) -> Result<Arc<dyn ScanStore>> {
    Ok(match database {
        Some(url) => Arc::new(
            SqliteStore::connect(url)
                .await
                .with_context(|| format!("Failed to open database {}", url))?,
        ),
        None => Arc::new(MemoryStore::new()),
    })
}

async fn run_scan(
    domain: &str,
    config: EngineConfig,
    database: Option<&str>,
    output: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let probes = probe_set(&config)?;
    let store = open_store(database).await?;

    println!("{}", "Scanward".cyan().bold());
    println!("Target: {}", domain);
    println!(
        "Probes: {} (timeout {}s)\n",
        probes.len(),
        config.probe_timeout.as_secs()
    );

    let publisher = Arc::new(ProgressBarPublisher::new(verbose));
    let coordinator = Arc::new(ScanCoordinator::new(store, publisher, probes, config)?);
    let scan_id = coordinator.create_scan(domain).await?;

    let watcher = Arc::clone(&coordinator);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel(&scan_id);
        }
    });

    let outcome = coordinator.run(scan_id).await;
    interrupt.abort();
    outcome.with_context(|| format!("Scan {} failed", scan_id))?;

    let report = coordinator.get_report(&scan_id).await?;
    let reporter = ConsoleReporter::new();
    reporter.print_probes(&report);
    reporter.print_summary(&report);
    reporter.print_details(&report);

    if let Some(path) = output {
        if is_html(path) {
            HtmlExporter::export(&report, path)?;
        } else {
            JsonExporter::export(&report, path)?;
        }
        println!("\n{} {}", "Report saved to".green(), path);
    }

    Ok(())
}

async fn run_server(bind: &str, database: &str, config: EngineConfig) -> Result<()> {
    let probes = probe_set(&config)?;
    let store = open_store(Some(database)).await?;
    let events = Arc::new(BroadcastPublisher::new());
    let coordinator = Arc::new(ScanCoordinator::new(store, events.clone(), probes, config)?);

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    println!("{} http://{}", "Scanward API listening on".green(), listener.local_addr()?);

    server::serve(listener, AppState { coordinator, events }).await?;
    Ok(())
}

fn generate_report(input: &str, format: &str, output: Option<&str>) -> Result<()> {
    let report = JsonExporter::load(input)?;

    let path = match format.to_lowercase().as_str() {
        "html" => {
            let path = output.unwrap_or("report.html");
            HtmlExporter::export(&report, path)?;
            path
        }
        "json" => {
            let path = output.unwrap_or("report.json");
            JsonExporter::export(&report, path)?;
            path
        }
        other => bail!("Unknown format '{}', expected html or json", other),
    };

    ConsoleReporter::new().print_summary(&report);
    println!("{} {}", "Report saved to".green(), path);
    Ok(())
}

fn list_probes() -> Result<()> {
    let probes = probe_set(&EngineConfig::default())?;
    println!("{}", "Built-in probes".bold().underline());
    for probe in &probes {
        println!("  {:<22} {}", probe.name().cyan(), probe.task());
    }
    Ok(())
}

fn is_html(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}
