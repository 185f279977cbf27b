//! Event processing from eBPF perf buffers
//!
//! Handles reading lifecycle records from the per-CPU perf buffers of both
//! output channels and reporting progress.

use crate::{
    collector::EventCollector,
    stats::StatsReader,
    types::{Channel, TcpEvent},
};
use anyhow::Result;
use aya::{
    maps::{perf::AsyncPerfEventArray, MapData},
    util::online_cpus,
};
use bytes::BytesMut;
use log::{debug, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::interval};

/// Number of records read from a perf buffer per wakeup
const READ_BATCH: usize = 16;

/// Event processor that reads from perf buffers
pub struct EventProcessor {
    collector: Arc<Mutex<EventCollector>>,
    verbose: bool,
}

impl EventProcessor {
    /// Create a new event processor
    ///
    /// # Arguments
    ///
    /// * `collector` - Shared event collector
    /// * `verbose` - Log every event at debug level
    pub fn new(collector: Arc<Mutex<EventCollector>>, verbose: bool) -> Self {
        Self { collector, verbose }
    }

    /// Spawn per-CPU readers for one output channel
    ///
    /// The kernel never blocks on a full buffer; overwritten records are
    /// reported as lost and counted. Every batch is flushed to the exporter
    /// before the reader waits again.
    pub fn spawn_cpu_readers(
        &self,
        channel: Channel,
        mut perf_array: AsyncPerfEventArray<MapData>,
    ) -> Result<()> {
        let cpus = online_cpus()?;
        info!(
            "Spawning {} readers for {} CPUs",
            channel.map_name(),
            cpus.len()
        );

        for cpu_id in cpus {
            let mut buf = perf_array.open(cpu_id, None)?;
            let collector = Arc::clone(&self.collector);
            let verbose = self.verbose;

            tokio::spawn(async move {
                let mut buffers = (0..READ_BATCH)
                    .map(|_| BytesMut::with_capacity(std::mem::size_of::<TcpEvent>()))
                    .collect::<Vec<_>>();

                loop {
                    let events = match buf.read_events(&mut buffers).await {
                        Ok(events) => events,
                        Err(e) => {
                            warn!(
                                "Error reading {} on CPU {}: {}",
                                channel.map_name(),
                                cpu_id,
                                e
                            );
                            continue;
                        }
                    };

                    let mut collector = collector.lock().await;
                    if events.lost > 0 {
                        warn!(
                            "Lost {} records from {} on CPU {}",
                            events.lost,
                            channel.map_name(),
                            cpu_id
                        );
                        collector.add_lost(events.lost);
                    }

                    for event in collector.add_batch(&buffers[..events.read], channel) {
                        if verbose {
                            debug!(
                                "{} pid={} fd={} {:?} -> {:?} duration={}ns",
                                event.kind,
                                event.pid,
                                event.fd,
                                event.source,
                                event.destination,
                                event.duration_ns
                            );
                        }
                    }
                }
            });
        }

        Ok(())
    }

    /// Spawn progress reporter
    ///
    /// Periodically logs collected event counts and the kernel handler
    /// statistics.
    ///
    /// # Arguments
    ///
    /// * `interval_secs` - Reporting interval in seconds
    /// * `stats` - Reader for the kernel statistics map
    pub fn spawn_progress_reporter(&self, interval_secs: u64, stats: StatsReader) {
        let collector = Arc::clone(&self.collector);

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs));

            loop {
                ticker.tick().await;

                let summary = collector.lock().await.summary();
                info!(
                    "Progress: {} events collected ({} lost)",
                    summary.total_events, summary.lost_events
                );
                match stats.read() {
                    Ok(s) => info!(
                        "Handlers: {} calls, {} emitted, {} indexed, {} untracked, {} ignored, {} read errors",
                        s.total, s.emitted, s.indexed, s.untracked, s.ignored, s.read_errors
                    ),
                    Err(e) => warn!("Failed to read handler statistics: {:#}", e),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::JsonLinesExporter;

    #[tokio::test]
    async fn test_event_processor_creation() {
        let exporter = JsonLinesExporter::new(Vec::new());
        let collector = Arc::new(Mutex::new(EventCollector::new(Box::new(exporter))));
        let processor = EventProcessor::new(collector, false);

        assert!(!processor.verbose);
        assert_eq!(processor.collector.lock().await.event_count(), 0);
    }
}
