//! Host and process resource snapshots
//!
//! Polled on demand by the `metrics` CLI command; never invoked by the
//! coordination engine. All readings come from procfs, so this module is
//! Linux-only in practice.

use anyhow::{Context, Result};
use procfs::prelude::*;
use procfs::process::Process;
use procfs::{Meminfo, ProcError};
use serde::Serialize;
use std::collections::HashMap;

/// Point-in-time view of host resources
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub memory: MemorySnapshot,
    pub cpu: CpuSnapshot,
    /// Cumulative traffic counters per network interface
    pub network: HashMap<String, InterfaceCounters>,
    /// Cumulative I/O counters per block device
    pub storage: HashMap<String, DeviceCounters>,
    /// Seconds since boot
    pub uptime_seconds: f64,
}

/// Physical and swap memory, in bytes.
///
/// "Real" figures exclude buffers and page cache, which the kernel
/// relinquishes under pressure.
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub cached: u64,
    pub buffers: u64,
    pub real_used: u64,
    pub real_free: u64,
    pub percent: f64,
    pub real_percent: f64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub swap_free: u64,
}

/// Processor count and load
#[derive(Debug, Clone, Serialize)]
pub struct CpuSnapshot {
    pub count: usize,
    pub load_average_1m: f32,
    pub load_average_5m: f32,
    pub load_average_15m: f32,
}

/// Cumulative traffic through one network interface
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

/// Cumulative I/O through one block device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceCounters {
    pub reads_completed: u64,
    pub sectors_read: u64,
    pub writes_completed: u64,
    pub sectors_written: u64,
}

/// Point-in-time view of one process
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSnapshot {
    pub pid: i32,
    /// Resident set size in bytes
    pub resident_bytes: u64,
    /// Virtual memory size in bytes
    pub virtual_bytes: u64,
    /// CPU usage averaged over the process lifetime
    pub cpu_percent: f64,
    /// Seconds after boot at which the process started
    pub started_at_seconds: f64,
}

/// Sample host-wide memory, cpu, network, storage and uptime figures
pub fn host_snapshot() -> Result<HostSnapshot> {
    let meminfo = Meminfo::current().context("reading /proc/meminfo")?;
    let load = procfs::LoadAverage::current().context("reading /proc/loadavg")?;
    let uptime = procfs::Uptime::current().context("reading /proc/uptime")?;
    let cpu_count = procfs::CpuInfo::current()
        .context("reading /proc/cpuinfo")?
        .num_cores();

    let cached = meminfo.cached;
    let buffers = meminfo.buffers;
    let used = meminfo.mem_total.saturating_sub(meminfo.mem_free);
    let real_used = used.saturating_sub(buffers).saturating_sub(cached);
    let real_free = meminfo.mem_total.saturating_sub(real_used);
    let percent = ratio_percent(used, meminfo.mem_total);
    let real_percent = ratio_percent(real_used, meminfo.mem_total);

    let memory = MemorySnapshot {
        total: meminfo.mem_total,
        free: meminfo.mem_free,
        used,
        cached,
        buffers,
        real_used,
        real_free,
        percent,
        real_percent,
        swap_total: meminfo.swap_total,
        swap_used: meminfo.swap_total.saturating_sub(meminfo.swap_free),
        swap_free: meminfo.swap_free,
    };

    let network = procfs::net::dev_status()
        .context("reading /proc/net/dev")?
        .into_iter()
        .map(|(name, status)| {
            (
                name,
                InterfaceCounters {
                    bytes_sent: status.sent_bytes,
                    bytes_received: status.recv_bytes,
                    packets_sent: status.sent_packets,
                    packets_received: status.recv_packets,
                },
            )
        })
        .collect();

    let storage = procfs::diskstats()
        .context("reading /proc/diskstats")?
        .into_iter()
        .map(|disk| {
            (
                disk.name,
                DeviceCounters {
                    reads_completed: disk.reads,
                    sectors_read: disk.sectors_read,
                    writes_completed: disk.writes,
                    sectors_written: disk.sectors_written,
                },
            )
        })
        .collect();

    Ok(HostSnapshot {
        memory,
        cpu: CpuSnapshot {
            count: cpu_count,
            load_average_1m: load.one,
            load_average_5m: load.five,
            load_average_15m: load.fifteen,
        },
        network,
        storage,
        uptime_seconds: uptime.uptime,
    })
}

/// Sample one process; `None` if no such process exists (or it exited while
/// being sampled)
pub fn process_snapshot(pid: i32) -> Result<Option<ProcessSnapshot>> {
    let process = match Process::new(pid) {
        Ok(process) => process,
        Err(ProcError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading process {}", pid)),
    };

    let stat = match process.stat() {
        Ok(stat) => stat,
        Err(ProcError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading stat for process {}", pid)),
    };

    let uptime = procfs::Uptime::current().context("reading /proc/uptime")?;
    let ticks_per_sec = procfs::ticks_per_second();
    let page_size = procfs::page_size();

    let started_at_seconds = stat.starttime as f64 / ticks_per_sec as f64;
    let elapsed = uptime.uptime - started_at_seconds;
    let process_seconds = (stat.utime + stat.stime) as f64 / ticks_per_sec as f64;
    let cpu_percent = if elapsed > 0.0 {
        (process_seconds / elapsed) * 100.0
    } else {
        0.0
    };

    Ok(Some(ProcessSnapshot {
        pid: stat.pid,
        resident_bytes: stat.rss * page_size,
        virtual_bytes: stat.vsize,
        cpu_percent,
        started_at_seconds,
    }))
}

fn ratio_percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * (part as f64 / whole as f64)
    }
}
