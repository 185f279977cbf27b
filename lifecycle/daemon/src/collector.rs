//! Event collection
//!
//! Counts decoded lifecycle events by kind and forwards them to the
//! configured exporter.

use crate::{exporter::EventExporter, types::*};
use anyhow::Result;
use log::warn;
use serde::Serialize;
use std::{collections::BTreeMap, mem::size_of};

/// Collector for decoded lifecycle events
pub struct EventCollector {
    exporter: Box<dyn EventExporter + Send>,
    /// Events by kind name
    kinds: BTreeMap<&'static str, u64>,
    /// Total number of events exported
    total_events: u64,
    /// Records the kernel dropped because a perf buffer was full
    lost_events: u64,
    /// Records with an unknown event type
    undecodable_events: u64,
    /// Events the exporter failed to write
    export_errors: u64,
}

/// Snapshot of collection counters
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CollectorSummary {
    pub total_events: u64,
    pub lost_events: u64,
    pub undecodable_events: u64,
    pub export_errors: u64,
    pub by_kind: BTreeMap<&'static str, u64>,
}

impl EventCollector {
    /// Create a new collector writing to `exporter`
    pub fn new(exporter: Box<dyn EventExporter + Send>) -> Self {
        Self {
            exporter,
            kinds: BTreeMap::new(),
            total_events: 0,
            lost_events: 0,
            undecodable_events: 0,
            export_errors: 0,
        }
    }

    /// Decode and record a raw record read from `channel`
    pub fn add_raw(&mut self, raw: &TcpEvent, channel: Channel) -> Option<LifecycleEvent> {
        match LifecycleEvent::decode(raw, channel) {
            Some(event) => {
                self.add_event(&event);
                Some(event)
            }
            None => {
                self.undecodable_events += 1;
                warn!(
                    "Dropping record with unknown event type {} from {}",
                    raw.event_type,
                    channel.map_name()
                );
                None
            }
        }
    }

    /// Decode, record and export one perf read batch, then flush the
    /// exporter so the batch is visible downstream before the next wakeup
    pub fn add_batch<B: AsRef<[u8]>>(
        &mut self,
        records: &[B],
        channel: Channel,
    ) -> Vec<LifecycleEvent> {
        let mut events = Vec::with_capacity(records.len());

        for record in records {
            let record = record.as_ref();
            if record.len() < size_of::<TcpEvent>() {
                self.undecodable_events += 1;
                warn!(
                    "Short record ({} bytes) from {}",
                    record.len(),
                    channel.map_name()
                );
                continue;
            }
            let raw = unsafe { (record.as_ptr() as *const TcpEvent).read_unaligned() };
            if let Some(event) = self.add_raw(&raw, channel) {
                events.push(event);
            }
        }

        if let Err(e) = self.exporter.flush() {
            self.export_errors += 1;
            warn!("Failed to flush events: {:#}", e);
        }

        events
    }

    /// Record and export a decoded event
    pub fn add_event(&mut self, event: &LifecycleEvent) {
        *self.kinds.entry(event.kind).or_insert(0) += 1;
        self.total_events += 1;

        if let Err(e) = self.exporter.export(event) {
            self.export_errors += 1;
            warn!("Failed to export event: {:#}", e);
        }
    }

    /// Account records lost in a perf buffer
    pub fn add_lost(&mut self, count: usize) {
        self.lost_events += count as u64;
    }

    pub fn flush(&mut self) -> Result<()> {
        self.exporter.flush()
    }

    /// Get current event count
    pub fn event_count(&self) -> u64 {
        self.total_events
    }

    pub fn summary(&self) -> CollectorSummary {
        CollectorSummary {
            total_events: self.total_events,
            lost_events: self.lost_events,
            undecodable_events: self.undecodable_events,
            export_errors: self.export_errors,
            by_kind: self.kinds.clone(),
        }
    }
}
