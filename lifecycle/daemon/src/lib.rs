//! Connection Lifecycle Tracer Userspace Library
//!
//! Provides reusable components for loading the eBPF lifecycle tracer and
//! draining its output channels.

pub mod collector;
pub mod events;
pub mod exporter;
pub mod loader;
pub mod stats;
pub mod types;

pub use collector::EventCollector;
pub use events::EventProcessor;
pub use exporter::{EventExporter, JsonLinesExporter};
pub use loader::{ProbeLoader, TracepointLayout};
pub use stats::StatsReader;
pub use types::*;
