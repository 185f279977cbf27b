//! Kernel handler statistics
//!
//! Reads the per-CPU `STATS` array maintained by the eBPF handlers.

use crate::types::{kernel::constants::MAX_STATS, HandlerStats};
use anyhow::{Context, Result};
use aya::maps::{MapData, PerCpuArray};

/// Reader for the `STATS` per-CPU array
pub struct StatsReader {
    array: PerCpuArray<MapData, u64>,
}

impl StatsReader {
    pub fn new(array: PerCpuArray<MapData, u64>) -> Self {
        Self { array }
    }

    /// Sum every counter across CPUs
    pub fn read(&self) -> Result<HandlerStats> {
        let mut counters = [0u64; MAX_STATS as usize];
        for (index, counter) in counters.iter_mut().enumerate() {
            let values = self
                .array
                .get(&(index as u32), 0)
                .with_context(|| format!("Failed to read STATS[{}]", index))?;
            *counter = values.iter().sum();
        }
        Ok(HandlerStats::from_counters(&counters))
    }
}
