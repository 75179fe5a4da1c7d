use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deploywatch::detect::{classify_records, ClassifiedLogEvent, Severity};
use deploywatch::pipeline::{run_pass, PassOptions};
use deploywatch::platform::{PlatformClient, PlatformConfig, TimeWindow};
use deploywatch::settings::Settings;

#[derive(Parser)]
#[command(
    name = "deploywatch",
    about = "Severity triage for production deployment logs",
    version,
    long_about = None
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent deployment logs and print the ranked incident feed
    Scan {
        /// Identical 4xx records needed to surface a burst
        #[arg(long)]
        threshold: Option<usize>,

        /// Number of recent deployments to inspect
        #[arg(long)]
        deployments: Option<usize>,

        /// Maximum events fetched per deployment
        #[arg(long)]
        events: Option<usize>,

        /// Look-back window in minutes
        #[arg(long)]
        window_minutes: Option<i64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,

        /// Exit non-zero if any deployment's events could not be fetched
        #[arg(long)]
        strict: bool,
    },

    /// List recent READY deployments
    Deployments {
        #[arg(long, default_value = "8")]
        limit: usize,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Classify raw records from a JSON file without contacting the platform
    Classify {
        /// File holding an array of records, or an object with `events`/`logs`
        #[arg(long)]
        input: PathBuf,

        /// Deployment id to attach to every record
        #[arg(long, default_value = "local")]
        deployment_id: String,

        #[arg(long)]
        threshold: Option<usize>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Serve the ranked feed over HTTP
    Serve {
        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let settings = Settings::load_or_default();

    match cli.command {
        Commands::Scan {
            threshold,
            deployments,
            events,
            window_minutes,
            json,
            strict,
        } => {
            let mut pipeline = settings.pipeline.clone();
            if let Some(t) = threshold {
                pipeline.burst_threshold = t;
            }
            if let Some(d) = deployments {
                pipeline.deployment_limit = d;
            }
            if let Some(e) = events {
                pipeline.event_limit = e;
            }
            if let Some(m) = window_minutes {
                pipeline.window_minutes = m;
            }

            let options = PassOptions::from_settings(&pipeline, chrono::Utc::now());
            let client = PlatformClient::new(PlatformConfig::from_env()?)?;
            tracing::info!(?options, "Running classification pass");
            let report = run_pass(&client, &options).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\n=== deploywatch: {} deployment(s) ===", report.deployments.len());
                print_events(&report.events);
                if report.is_quiet() {
                    println!("No incidents in window.");
                }
                for failure in &report.failures {
                    println!(
                        " ! {} could not be fetched: {}",
                        failure.deployment_id, failure.error
                    );
                }
                println!();
            }

            if strict && report.is_partial() {
                anyhow::bail!(
                    "{} deployment(s) could not be fetched",
                    report.failures.len()
                );
            }
        }
        Commands::Deployments { limit, json } => {
            let client = PlatformClient::new(PlatformConfig::from_env()?)?;
            let deployments = client
                .list_deployments(Some(limit), &TimeWindow::default())
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&deployments)?);
            } else if deployments.is_empty() {
                println!("No READY deployments found.");
            } else {
                println!("{:<32} | {:<25} | {:<20} | URL", "ID", "Created", "Name");
                println!("{:-<32}-|-{:-<25}-|-{:-<20}-|-{:-<30}", "", "", "", "");
                for d in deployments {
                    println!(
                        "{:<32} | {:<25} | {:<20} | {}",
                        d.id,
                        d.created_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
                        d.name.as_deref().unwrap_or("-"),
                        d.url.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Classify {
            input,
            deployment_id,
            threshold,
            json,
        } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let document: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", input.display()))?;
            let raw = deploywatch::logs::unwrap_records(document);
            let records = deploywatch::logs::normalize_batch(&raw, &deployment_id);

            let threshold = threshold.unwrap_or(settings.pipeline.burst_threshold);
            let classification = classify_records(records, threshold);

            if json {
                println!("{}", serde_json::to_string_pretty(&classification)?);
            } else {
                print_events(&classification.events);
                let stats = classification.stats;
                println!(
                    "\n{} record(s): {} severe, {} warning ({} from bursts), {} dropped",
                    stats.total, stats.severe, stats.warning, stats.escalated, stats.dropped
                );
            }
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.server.bind.clone());
            tracing::info!(%bind, "Starting deploywatch server");
            deploywatch::serve(&bind, settings).await?;
        }
    }

    Ok(())
}

fn print_events(events: &[ClassifiedLogEvent]) {
    if events.is_empty() {
        return;
    }
    println!(
        "{:<8} | {:<20} | {:<6} | {:<6} | {:<24} | {:<16} | Message",
        "Severity", "Time", "Status", "Method", "Path", "Reason"
    );
    println!(
        "{:-<8}-|-{:-<20}-|-{:-<6}-|-{:-<6}-|-{:-<24}-|-{:-<16}-|-{:-<40}",
        "", "", "", "", "", "", ""
    );
    for e in events {
        let severity = match e.severity {
            Severity::Severe => "SEVERE",
            Severity::Warning => "WARN",
        };
        let r = &e.record;
        let message: String = r.message.chars().take(80).collect();
        println!(
            "{:<8} | {:<20} | {:<6} | {:<6} | {:<24} | {:<16} | {}",
            severity,
            r.timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".into()),
            r.status_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            r.method.as_deref().unwrap_or("-"),
            r.path.as_deref().unwrap_or("-"),
            e.reason.to_string(),
            message
        );
    }
}
