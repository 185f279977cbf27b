//! Event exporters
//!
//! Writes decoded lifecycle events to their destination.

use crate::types::LifecycleEvent;
use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

/// Trait for event exporters
pub trait EventExporter {
    /// Export a single event
    fn export(&mut self, event: &LifecycleEvent) -> Result<()>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()>;
}

/// Newline-delimited JSON exporter
pub struct JsonLinesExporter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonLinesExporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("Failed to flush exporter")
    }
}

impl JsonLinesExporter<File> {
    /// Create an exporter writing to `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        Ok(Self::new(file))
    }
}

impl JsonLinesExporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> EventExporter for JsonLinesExporter<W> {
    fn export(&mut self, event: &LifecycleEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush events")
    }
}
