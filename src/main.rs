//! dns-is-reverse - IPv6 reverse DNS synthesizer

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use dns_is_reverse::config::Config;
use dns_is_reverse::dns_server::DnsServer;
use dns_is_reverse::handler::RequestHandler;
use dns_is_reverse::synth::SynthesisEngine;
use dns_is_reverse::upstream::{self, UdpUpstream};
use rolling_file::{RollingConditionBasic, RollingFileAppender};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Log timestamps in local time instead of UTC
struct LocalTimer;
impl fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

#[derive(Parser, Debug)]
#[command(name = "dns-is-reverse")]
#[command(about = "DNS-is-reverse - IPv6 reverse DNS synthesizer", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "/etc/dns-is-reverse.conf")]
    configfile: String,

    /// Additional listen address (can be used multiple times)
    #[arg(long)]
    listen: Vec<String>,

    /// Listen port, overrides the config file
    #[arg(long)]
    port: Option<u16>,

    /// Log every query
    #[arg(long)]
    querylog: bool,

    /// How long to wait for an upstream resolver (e.g. 2s, 500ms)
    #[arg(long, default_value = "2s")]
    upstream_timeout: String,

    /// Also write logs to this file, rotated daily
    #[arg(long)]
    log_file: Option<String>,
}

fn init_logging(log_file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            // keep the last 30 days of logs
            let appender = RollingFileAppender::new(path, RollingConditionBasic::new().daily(), 30)
                .with_context(|| format!("Failed to open log file '{}'", path))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false).with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stdout).with_timer(LocalTimer))
        .init();
    Ok(guard)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.log_file.as_deref())?;

    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cores)
        .thread_name("dns-is-reverse-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    info!("Starting dns-is-reverse version {}", env!("CARGO_PKG_VERSION"));

    let mut cfg = Config::load(&args.configfile)?;
    cfg.listen_addresses.extend(args.listen.iter().cloned());
    if let Some(port) = args.port {
        cfg.port = port;
    }
    cfg.query_log |= args.querylog;
    let upstream_timeout = upstream::parse_duration(&args.upstream_timeout)
        .with_context(|| format!("Invalid --upstream-timeout '{}'", args.upstream_timeout))?;

    if cfg.rules.is_empty() {
        warn!("No networks configured, every query will be answered with NXDOMAIN");
    }
    for rule in cfg.rules.iter() {
        match &rule.upstream {
            Some(up) => info!("Network {} resolves to {} (upstream {})", rule.prefix, rule.template(), up),
            None => info!("Network {} resolves to {}", rule.prefix, rule.template()),
        }
    }

    let engine = SynthesisEngine::new(Arc::new(cfg.rules));
    let handler = Arc::new(RequestHandler::new(engine, Arc::new(UdpUpstream), upstream_timeout, cfg.query_log));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = DnsServer::bind(&cfg.listen_addresses, cfg.port, handler, shutdown_rx).await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    server.run().await
}
