//! eBPF Connection Lifecycle Tracer - Userspace Program
//!
//! Loads the eBPF lifecycle tracer, attaches its tracepoints and writes
//! every connection and listener event as a JSON line.
//!
//! ## Usage
//!
//! ```bash
//! # Trace until interrupted, events to stdout
//! sudo ./conntrace --ebpf-object path/to/lifecycle
//!
//! # Run for 60 seconds and write events to a file
//! sudo ./conntrace --duration 60 --output events.jsonl
//!
//! # Kernels whose tracepoint records carry an extra header
//! sudo ./conntrace --ctx-extra-padding
//! ```

use anyhow::Result;
use clap::Parser;
use lifecycle_daemon::{
    collector::{CollectorSummary, EventCollector},
    events::EventProcessor,
    exporter::{EventExporter, JsonLinesExporter},
    loader::{ProbeLoader, TracepointLayout},
    types::Channel,
};
use log::info;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    signal::{
        self,
        unix::{signal as unix_signal, SignalKind},
    },
    sync::Mutex,
    time::{sleep, Instant},
};

/// TCP connection lifecycle tracer using eBPF
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Duration to run the tracer (in seconds, 0 = infinite)
    #[clap(short, long, default_value_t = 0)]
    duration: u64,

    /// Output file for events (JSON lines, stdout if omitted)
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    verbose: bool,

    /// Path to eBPF object file (if not embedded)
    #[clap(long)]
    ebpf_object: Option<PathBuf>,

    /// Progress reporting interval in seconds
    #[clap(long, default_value_t = 10)]
    progress_interval: u64,

    /// Tracepoint records start with an extra 8-byte header
    #[clap(long)]
    ctx_extra_padding: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if args.progress_interval == 0 {
        anyhow::bail!("Progress interval must be >= 1");
    }

    info!("Starting eBPF connection lifecycle tracer...");
    info!(
        "   Duration: {} seconds",
        if args.duration == 0 {
            "infinite".to_string()
        } else {
            args.duration.to_string()
        }
    );
    match &args.output {
        Some(path) => info!("   Output: {:?}", path),
        None => info!("   Output: stdout"),
    }

    let exporter: Box<dyn EventExporter + Send> = match &args.output {
        Some(path) => Box::new(JsonLinesExporter::create(path)?),
        None => Box::new(JsonLinesExporter::stdout()),
    };

    // Load eBPF program
    let layout = TracepointLayout::detect(args.ctx_extra_padding)?;
    let mut loader = ProbeLoader::load(args.ebpf_object.clone(), layout)?;

    // Attach tracepoints
    loader.attach_tracepoints()?;

    let connect_events = loader.take_perf_array(Channel::Connect)?;
    let listen_events = loader.take_perf_array(Channel::Listen)?;
    let stats = loader.take_stats()?;

    info!("Tracing connections...");

    let collector = Arc::new(Mutex::new(EventCollector::new(exporter)));
    let processor = EventProcessor::new(Arc::clone(&collector), args.verbose);

    // Spawn per-CPU event readers, one set per channel
    processor.spawn_cpu_readers(Channel::Connect, connect_events)?;
    processor.spawn_cpu_readers(Channel::Listen, listen_events)?;

    processor.spawn_progress_reporter(args.progress_interval, stats);

    // Run for specified duration or until interrupted
    let start_time = Instant::now();
    if args.duration > 0 {
        tokio::select! {
            _ = sleep(Duration::from_secs(args.duration)) => {
                info!("Duration reached, shutting down...");
            }
            reason = shutdown_signal() => {
                info!("{}, shutting down...", reason?);
            }
        }
    } else {
        info!("{}, shutting down...", shutdown_signal().await?);
    }

    let mut collector = collector.lock().await;
    collector.flush()?;
    print_summary(&collector.summary(), start_time.elapsed().as_secs());

    Ok(())
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() -> Result<&'static str> {
    let mut terminate = unix_signal(SignalKind::terminate())?;

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            Ok("Interrupted")
        }
        _ = terminate.recv() => Ok("Terminated"),
    }
}

fn print_summary(summary: &CollectorSummary, elapsed_secs: u64) {
    info!("");
    info!("============================================");
    info!("             Summary Report");
    info!("============================================");
    info!("");
    info!("  Total events:       {}", summary.total_events);
    info!("  Lost records:       {}", summary.lost_events);
    info!("  Undecodable:        {}", summary.undecodable_events);
    info!("  Export errors:      {}", summary.export_errors);
    info!("  Duration:           {} seconds", elapsed_secs);
    info!("");
    info!("  Events by kind:");
    for (kind, count) in &summary.by_kind {
        info!("    {:<18} {:>8}", kind, count);
    }
    info!("");
    info!("============================================");
}
