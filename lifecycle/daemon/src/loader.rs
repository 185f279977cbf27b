//! eBPF program loader
//!
//! Handles loading the eBPF program with the tracepoint layout of the
//! running kernel and attaching the four lifecycle tracepoints.

use crate::{stats::StatsReader, types::Channel};
use anyhow::{Context, Result};
use aya::{
    maps::{perf::AsyncPerfEventArray, MapData, PerCpuArray},
    programs::TracePoint,
    util::KernelVersion,
    Bpf, BpfLoader,
};
use log::info;
use std::path::PathBuf;

/// Tracepoints attached by the loader: (program, category, name)
pub const TRACEPOINTS: [(&str, &str, &str); 4] = [
    ("inet_sock_set_state", "sock", "inet_sock_set_state"),
    ("sys_enter_connect", "syscalls", "sys_enter_connect"),
    ("sys_exit_connect", "syscalls", "sys_exit_connect"),
    ("sys_enter_close", "syscalls", "sys_enter_close"),
];

/// Layout of the `sock:inet_sock_set_state` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracepointLayout {
    /// Record starts with an extra 8-byte header
    pub extra_padding: bool,
    /// `protocol` is a single byte (kernels before 5.6)
    pub protocol_u8: bool,
}

impl TracepointLayout {
    /// Layout for a given kernel version
    pub fn for_kernel(version: KernelVersion, extra_padding: bool) -> Self {
        Self {
            extra_padding,
            protocol_u8: version < KernelVersion::new(5, 6, 0),
        }
    }

    /// Layout for the running kernel
    pub fn detect(extra_padding: bool) -> Result<Self> {
        let version = KernelVersion::current().context("Failed to detect kernel version")?;
        info!("Kernel version: {:?}", version);
        Ok(Self::for_kernel(version, extra_padding))
    }
}

/// eBPF program loader and manager
pub struct ProbeLoader {
    ebpf: Bpf,
}

impl ProbeLoader {
    /// Load eBPF program from file or embedded bytecode
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to eBPF object file. If None, uses embedded bytecode.
    /// * `layout` - Tracepoint layout patched into the program's globals
    pub fn load(path: Option<PathBuf>, layout: TracepointLayout) -> Result<Self> {
        info!("Loading eBPF program...");

        let data = if let Some(obj_path) = path {
            info!("Loading eBPF object from: {:?}", obj_path);
            std::fs::read(&obj_path)
                .with_context(|| format!("Failed to read eBPF object file: {:?}", obj_path))?
        } else {
            #[cfg(feature = "embedded")]
            {
                info!("Loading embedded eBPF program...");
                include_bytes!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../../target/bpfel-unknown-none/release/lifecycle"
                ))
                .to_vec()
            }
            #[cfg(not(feature = "embedded"))]
            {
                anyhow::bail!(
                    "No eBPF object file provided. Use --ebpf-object or compile with 'embedded' feature"
                );
            }
        };

        let extra_padding = layout.extra_padding as u8;
        let protocol_u8 = layout.protocol_u8 as u8;
        info!(
            "Tracepoint layout: extra padding = {}, 1-byte protocol = {}",
            layout.extra_padding, layout.protocol_u8
        );

        let ebpf = BpfLoader::new()
            .set_global("CTX_EXTRA_PADDING", &extra_padding, true)
            .set_global("PROTOCOL_U8", &protocol_u8, true)
            .load(&data)
            .context("Failed to load eBPF program")?;

        info!("eBPF program loaded successfully");

        Ok(Self { ebpf })
    }

    /// Attach the lifecycle tracepoints
    ///
    /// Attaches to:
    /// - sock:inet_sock_set_state
    /// - syscalls:sys_enter_connect
    /// - syscalls:sys_exit_connect
    /// - syscalls:sys_enter_close
    pub fn attach_tracepoints(&mut self) -> Result<()> {
        info!("Attaching tracepoints...");

        for (program_name, category, name) in TRACEPOINTS {
            let program: &mut TracePoint = self
                .ebpf
                .program_mut(program_name)
                .with_context(|| format!("{} program not found in eBPF object", program_name))?
                .try_into()
                .with_context(|| format!("Failed to get {} as TracePoint", program_name))?;
            program
                .load()
                .with_context(|| format!("Failed to load {}", program_name))?;
            program
                .attach(category, name)
                .with_context(|| format!("Failed to attach {}:{} tracepoint", category, name))?;
            info!("  ✓ Attached to {}:{}", category, name);
        }

        info!("All tracepoints attached successfully");

        Ok(())
    }

    /// Take the perf event array of an output channel
    pub fn take_perf_array(&mut self, channel: Channel) -> Result<AsyncPerfEventArray<MapData>> {
        let name = channel.map_name();
        let map = self
            .ebpf
            .take_map(name)
            .with_context(|| format!("{} map not found in eBPF object", name))?;

        AsyncPerfEventArray::try_from(map)
            .with_context(|| format!("Failed to create AsyncPerfEventArray from {} map", name))
    }

    /// Take the handler statistics map
    pub fn take_stats(&mut self) -> Result<StatsReader> {
        let map = self
            .ebpf
            .take_map("STATS")
            .context("STATS map not found in eBPF object")?;

        let array = PerCpuArray::try_from(map).context("Failed to create PerCpuArray from STATS map")?;
        Ok(StatsReader::new(array))
    }

    /// Get reference to the eBPF object
    ///
    /// Useful for accessing maps or programs directly, e.g. to populate
    /// `ACTUAL_DESTINATIONS`.
    pub fn ebpf(&mut self) -> &mut Bpf {
        &mut self.ebpf
    }
}
