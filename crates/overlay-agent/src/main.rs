//! # webchat-overlay
//!
//! Connects to a chat server's overlay socket and prints every rendered
//! view as one JSON line on stdout. Logs go to stderr.

#![deny(unsafe_code)]

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use overlay_client::{ClientConfig, Overlay};
use overlay_core::logging::{LogFormat, init_subscriber};
use tokio::sync::watch;

/// Webchat overlay client.
#[derive(Parser, Debug)]
#[command(name = "webchat-overlay", about = "Live chat overlay client")]
struct Cli {
    /// URL the overlay page is served from (overrides `OVERLAY_PAGE_URL`).
    #[arg(long)]
    page_url: Option<String>,

    /// Log level; `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Delay before each reconnect attempt, in milliseconds.
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// Clear/decay sweep period, in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    sweep_tick_ms: Option<u64>,

    /// Capacity until window settings arrive.
    #[arg(long)]
    default_capacity: Option<usize>,
}

impl Cli {
    fn log_format(&self) -> LogFormat {
        if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }

    /// Flags win over env and defaults.
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.page_url {
            config.page_url.clone_from(url);
        }
        if let Some(ms) = self.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.sweep_tick_ms {
            config.sweep_tick = Duration::from_millis(ms);
        }
        if let Some(capacity) = self.default_capacity {
            config.default_capacity = capacity;
        }
    }
}

async fn print_views(mut views: watch::Receiver<overlay_client::OverlayView>) {
    while views.changed().await.is_ok() {
        let line = serde_json::to_string(&*views.borrow_and_update());
        match line {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(error = %err, "failed to serialize view"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_subscriber(&args.log_level, args.log_format());

    let mut config = ClientConfig::from_env();
    args.apply(&mut config);
    tracing::info!(
        page_url = %config.page_url,
        reconnect_delay_ms = config.reconnect_delay.as_millis() as u64,
        sweep_tick_ms = config.sweep_tick.as_millis() as u64,
        "starting overlay"
    );

    let overlay = Overlay::new(config).context("Failed to set up overlay client")?;
    tracing::info!(
        ws_url = %overlay.endpoints().ws_url,
        settings_url = %overlay.endpoints().settings_url,
        "endpoints resolved"
    );

    let printer = tokio::spawn(print_views(overlay.subscribe()));
    overlay.run_until(shutdown_signal()).await;
    printer.await.context("view printer failed")?;
    Ok(())
}
