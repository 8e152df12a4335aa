//! Handwire driver - runs the ingestion service against a live tracker.
//!
//! This is the host loop the library itself deliberately does not own:
//! it loads configuration, connects the service, and ticks it at a fixed
//! rate into an in-memory bone table, logging periodic pose summaries.
//! Embedders replace this file with their own frame loop and sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use handwire::constants::{FRAME_INTERVAL, REPORT_INTERVAL};
use handwire::{BoneTable, Config, ConnectionState, IngestService};

/// Hand-tracking pose ingestion over TCP.
#[derive(Parser, Debug)]
#[command(name = "handwire", version, about)]
struct Args {
    /// Tracker address (overrides config).
    #[arg(long)]
    address: Option<String>,

    /// Tracker port (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Exit after the first decoded message (connectivity probe).
    #[arg(long)]
    once: bool,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = Config::load().context("load configuration")?;
    if let Some(address) = args.address {
        config.address = address;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    log::info!("handwire v{} -> {}:{}", env!("CARGO_PKG_VERSION"), config.address, config.port);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("install ctrl-c handler")?;
    }

    let mut service = IngestService::new(&config);
    let mut table = BoneTable::new();

    let mut last_tick = Instant::now();
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        let dt = last_tick.elapsed().as_secs_f32();
        last_tick = Instant::now();

        service.tick(dt, &mut table);

        if last_report.elapsed() >= REPORT_INTERVAL {
            last_report = Instant::now();
            report(&service, &table);
        }

        if args.once && service.stats().messages > 0 {
            log::info!("first message decoded, exiting (--once)");
            break;
        }

        std::thread::sleep(FRAME_INTERVAL);
    }

    service.close();
    Ok(())
}

/// Log a one-line session summary and, at debug level, the full table.
fn report(service: &IngestService, table: &BoneTable) {
    let stats = service.stats();
    let state = match service.state() {
        ConnectionState::Connected => "connected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Failed => "failed",
    };
    log::info!(
        "{state}: {} messages, {} bone updates, {} bones tracked",
        stats.messages,
        stats.bone_updates,
        table.len(),
    );
    for (bone, transform) in table.iter() {
        log::debug!(
            "  {bone}: ({:.2}, {:.2}, {:.2})",
            transform.position.x,
            transform.position.y,
            transform.position.z,
        );
    }
}
