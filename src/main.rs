//! CLI entry point for the shuttle tracker.
//!
//! Provides subcommands for listing routes, taking a one-off vehicle snapshot,
//! tracking vehicles live, and decoding polylines offline.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use shuttle_tracker::{
    config::TrackerConfig,
    infra::ridesystems::client::RideSystemsClient,
    model::decode_routes,
    output::{log_frame, log_routes, print_pretty, write_json_line},
    polyline,
    poller::{self, PollerOptions},
    reconciler::{MarkerSet, reconcile},
    search::filter_routes,
    services::transit_api::TransitApi,
    summary::FeedSummary,
};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "shuttle_tracker")]
#[command(about = "Live shuttle positions and route lines", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// JSON config file; environment variables are used when omitted
    #[arg(long, global = true)]
    config: Option<String>,

    /// Vendor base URL, overrides the config
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Vendor API key, overrides the config
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch routes and decode their lines
    Routes {
        /// Only show routes whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Print decoded routes as JSON lines on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Fetch vehicle positions once
    Vehicles {
        /// Print marker descriptors as JSON lines on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Poll vehicle positions and animate markers until stopped
    Track {
        /// Poll interval in milliseconds
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,

        /// Number of polls to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        polls: u64,

        /// Drop a marker after this many polls without its vehicle
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        evict_after: Option<u32>,

        /// Print every frame as a JSON line on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Decode an encoded polyline without contacting the vendor
    Decode {
        #[arg(value_name = "POLYLINE")]
        encoded: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/shuttle_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("shuttle_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let connect = |config: &TrackerConfig| -> Result<RideSystemsClient> {
        RideSystemsClient::new(&config.base_url, config.require_api_key()?)
    };

    match cli.command {
        Commands::Decode { encoded } => decode_command(&encoded)?,
        Commands::Routes { search, json } => {
            let client = connect(&resolve_config(&cli.global)?)?;
            let routes = decode_routes(client.fetch_routes().await?);
            let shown = match search.as_deref() {
                Some(query) => filter_routes(&routes, query),
                None => routes.iter().collect(),
            };

            info!(total = routes.len(), shown = shown.len(), "Routes fetched");

            if json {
                let mut stdout = std::io::stdout().lock();
                for decoded in shown {
                    let line = RouteLine {
                        route_id: decoded.route.route_id,
                        name: &decoded.route.description,
                        color: &decoded.route.map_line_color,
                        points: decoded.line_points.as_deref().ok(),
                        error: decoded.line_points.as_ref().err().map(|e| e.to_string()),
                    };
                    write_json_line(&mut stdout, &line)?;
                }
            } else {
                log_routes(shown);
            }
        }
        Commands::Vehicles { json } => {
            let config = resolve_config(&cli.global)?;
            let client = connect(&config)?;
            let vehicles = client.fetch_vehicles().await?;
            let summary = FeedSummary::from_vehicles(&vehicles);
            let result = reconcile(MarkerSet::new(), &vehicles, &config.reconcile_options());

            info!(
                vehicles = summary.vehicles,
                delayed = summary.delayed,
                off_route = summary.off_route,
                routes = summary.per_route.len(),
                "Vehicle snapshot"
            );

            if json {
                let mut stdout = std::io::stdout().lock();
                for descriptor in result.descriptors() {
                    write_json_line(&mut stdout, &descriptor)?;
                }
            } else {
                for descriptor in result.descriptors() {
                    info!(
                        id = %descriptor.id,
                        latitude = descriptor.coordinate.latitude,
                        longitude = descriptor.coordinate.longitude,
                        heading = ?descriptor.heading,
                        "Vehicle"
                    );
                }
            }
        }
        Commands::Track {
            interval_ms,
            polls,
            evict_after,
            json,
        } => {
            let mut config = resolve_config(&cli.global)?;
            if let Some(ms) = interval_ms {
                config.poll_interval_ms = ms;
            }
            if evict_after.is_some() {
                config.evict_after_missed_polls = evict_after;
            }
            config.validate()?;
            let client = connect(&config)?;
            track(client, &config, polls, json).await?;
        }
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct RouteLine<'a> {
    route_id: i64,
    name: &'a str,
    color: &'a str,
    points: Option<&'a [polyline::GeoPoint]>,
    error: Option<String>,
}

/// Loads the config file or environment, then applies CLI overrides.
fn resolve_config(args: &GlobalArgs) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::from_env()?,
    };
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(key) = &args.api_key {
        config.api_key = Some(key.clone());
    }
    Ok(config)
}

fn decode_command(encoded: &str) -> Result<()> {
    let points = polyline::decode(encoded)?;
    info!(points = points.len(), "Polyline decoded");

    let mut stdout = std::io::stdout().lock();
    for point in &points {
        write_json_line(&mut stdout, point)?;
    }
    Ok(())
}

/// Runs the poller until Ctrl+C or until `polls` polls have completed.
#[tracing::instrument(skip(client, config), fields(interval_ms = config.poll_interval_ms))]
async fn track(
    client: RideSystemsClient,
    config: &TrackerConfig,
    polls: u64,
    json: bool,
) -> Result<()> {
    let options = PollerOptions {
        interval: config.poll_interval(),
        reconcile: config.reconcile_options(),
        max_polls: (polls > 0).then_some(polls),
    };

    if polls == 0 {
        info!("Tracking until stopped. Press Ctrl+C to stop.");
    } else {
        info!(polls, "Tracking for a fixed number of polls");
    }

    let (handle, mut frames) = poller::spawn(Arc::new(client), options);

    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    // Poller exited and dropped its sender.
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                log_frame(&frame);
                print_pretty(&frame);
                if json {
                    write_json_line(&mut std::io::stdout().lock(), &frame)?;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Stopping tracker");
                return handle.shutdown().await;
            }
        }
    }

    handle.join().await
}
