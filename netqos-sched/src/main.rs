/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use netqos_sched::config::SchedulerConfigManager;
use netqos_sched::driver;
use netqos_sched::scheduler::EventScheduler;
use netqos_sched::timing::SystemClock;

// ── CLI argument definition ───────────────────────────────────────────────────

/// NETQoS event scheduler.
///
/// Example:
///   netqos-sched -c timers.yaml -p 200
#[derive(Debug, Parser)]
#[command(
    name = "netqos-sched",
    about = "NETQoS event scheduler – timed and periodic event dispatch",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scheduler configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Override the driver poll interval, in milliseconds.
    #[arg(short = 'p', long = "poll-ms")]
    poll_ms: Option<u64>,

    /// Stop each dispatch pass at the first handler failure.
    #[arg(long = "halt-on-error", default_value_t = false)]
    halt_on_error: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("netqos-sched starting up...");

    let cli = Cli::parse();

    info!(
        config        = ?cli.config,
        poll_ms       = ?cli.poll_ms,
        halt_on_error = cli.halt_on_error,
        "Configuration"
    );

    // ── Load scheduler configuration ──────────────────────────────────────────
    let mut config_manager = SchedulerConfigManager::new();

    match &cli.config {
        Some(path) => {
            if let Err(e) = config_manager.load_from_file(path) {
                error!("Failed to load scheduler configuration: {:#}", e);
                process::exit(1);
            }
        }
        None => {
            warn!("No configuration file provided, running with defaults and no timers");
        }
    }

    let mut options = config_manager.options();
    options.halt_on_error |= cli.halt_on_error;

    let poll_interval = match cli.poll_ms {
        Some(0) => {
            error!("--poll-ms must be positive");
            process::exit(1);
        }
        Some(ms) => Duration::from_millis(ms),
        None => config_manager.poll_interval(),
    };

    let mut scheduler = EventScheduler::with_options(options, config_manager.names());

    // ── Handlers: log every timer kind that is configured ─────────────────────
    let kinds: BTreeSet<_> = config_manager.timers().iter().map(|t| t.kind).collect();
    for kind in kinds {
        let name = scheduler.names().name_of(kind);
        scheduler.on(kind, move |ev, ctx| {
            info!(
                kind = %ev.kind(),
                handle = %ctx.current(),
                due = %ev.due(),
                now = %ctx.now(),
                "{name} fired"
            );
            Ok(())
        });
    }

    // ── Arm timers ────────────────────────────────────────────────────────────
    let clock = SystemClock;
    for timer in config_manager.timers() {
        match timer.to_event(&clock) {
            Ok(event) => {
                let handle = scheduler.submit(event);
                info!(timer = %timer.name, handle = %handle, "timer armed");
            }
            Err(e) => {
                error!(timer = %timer.name, code = e.code(), "cannot arm timer: {e}");
                process::exit(1);
            }
        }
    }
    scheduler.dump();

    // ── Run until Ctrl-C ──────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Cannot listen for Ctrl-C: {e}"),
        }
        let _ = shutdown_tx.send(true);
    });

    let stats = driver::run(&mut scheduler, &clock, poll_interval, shutdown_rx).await;

    let leftover = scheduler.drain();
    info!(
        passes = stats.passes,
        failures = stats.failures,
        cancelled = leftover.len(),
        "netqos-sched stopped"
    );
}
