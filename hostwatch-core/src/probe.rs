use crate::config::{CpuThresholds, DiskThresholds, MemoryThresholds};
use crate::error::MonitorError;
use crate::metrics::{classify, DiskIoStats, MetricReading, SystemInfo};
use crate::process::{ProcessDetail, ProcessEntry, ProcessSample, ProcessState};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use sysinfo::{Disks, Pid, Process, System};

/// Adapter over the OS metrics source. Read-only except for `kill`. Shared
/// between the poll loop and the HTTP listeners; all interior state sits
/// behind locks, so `&self` everywhere.
pub struct SystemProbe {
    system: Arc<RwLock<System>>,
    disks: Arc<RwLock<Disks>>,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Arc::new(RwLock::new(System::new())),
            disks: Arc::new(RwLock::new(Disks::new_with_refreshed_list())),
        }
    }

    pub fn refresh(&self) {
        let mut system = self.system.write();
        // Rebuild the process list from scratch each time: sysinfo does not
        // reliably evict terminated processes, so an in-place refresh
        // accumulates stale PIDs.
        use sysinfo::{CpuRefreshKind, MemoryRefreshKind, ProcessRefreshKind, RefreshKind};

        *system = System::new_with_specifics(
            RefreshKind::new()
                .with_processes(ProcessRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::everything()),
        );

        let mut disks = self.disks.write();
        disks.refresh();
    }

    /// CPU usage (and temperature, where a sensor is readable) classified
    /// against the configured thresholds.
    pub fn check_cpu(
        &self,
        cfg: &CpuThresholds,
    ) -> Result<BTreeMap<String, MetricReading>, MonitorError> {
        let system = self.system.read();
        let mut readings = BTreeMap::new();

        let usage = system.global_cpu_usage() as f64;
        let status = classify(usage, cfg.warning_threshold, cfg.critical_threshold);
        readings.insert(
            "usage".to_string(),
            MetricReading::new(usage, status, format!("CPU usage is at {usage:.1}%")),
        );

        if let Some(temp) = self.read_cpu_temperature() {
            let temp = temp as f64;
            let status = classify(temp, cfg.temperature_warning, cfg.temperature_critical);
            readings.insert(
                "temperature".to_string(),
                MetricReading::new(temp, status, format!("CPU temperature is at {temp:.1}°C")),
            );
        }

        Ok(readings)
    }

    /// RAM always; swap only when the machine has any.
    pub fn check_memory(
        &self,
        cfg: &MemoryThresholds,
    ) -> Result<BTreeMap<String, MetricReading>, MonitorError> {
        let system = self.system.read();
        let mut readings = BTreeMap::new();

        let total = system.total_memory();
        if total == 0 {
            return Err(MonitorError::ProviderUnavailable(
                "total memory reported as zero".to_string(),
            ));
        }

        let ram_percent = system.used_memory() as f64 / total as f64 * 100.0;
        let status = classify(ram_percent, cfg.warning_threshold, cfg.critical_threshold);
        readings.insert(
            "ram".to_string(),
            MetricReading::new(
                ram_percent,
                status,
                format!("Memory usage is at {ram_percent:.1}%"),
            ),
        );

        let swap_total = system.total_swap();
        if swap_total > 0 {
            let swap_percent = system.used_swap() as f64 / swap_total as f64 * 100.0;
            let status = classify(
                swap_percent,
                cfg.swap_warning_threshold,
                cfg.swap_critical_threshold,
            );
            readings.insert(
                "swap".to_string(),
                MetricReading::new(
                    swap_percent,
                    status,
                    format!("Swap usage is at {swap_percent:.1}%"),
                ),
            );
        }

        Ok(readings)
    }

    /// Percent used for every configured mount path that currently exists.
    /// Paths without a matching mount are skipped silently.
    pub fn check_disk(
        &self,
        cfg: &DiskThresholds,
    ) -> Result<BTreeMap<String, MetricReading>, MonitorError> {
        let disks = self.disks.read();
        let mut readings = BTreeMap::new();

        for path in &cfg.monitored_paths {
            let Some(disk) = disks.list().iter().find(|d| d.mount_point() == path.as_path()) else {
                continue;
            };

            let total = disk.total_space();
            if total == 0 {
                continue;
            }
            let used = total - disk.available_space();
            let percent = used as f64 / total as f64 * 100.0;
            let status = classify(percent, cfg.warning_threshold, cfg.critical_threshold);
            readings.insert(
                path.display().to_string(),
                MetricReading::new(
                    percent,
                    status,
                    format!("Disk usage for {} is at {percent:.1}%", path.display()),
                ),
            );
        }

        Ok(readings)
    }

    /// Aggregate I/O counters from /proc/diskstats, skipping loop and ram
    /// devices.
    pub fn disk_io(&self) -> Result<DiskIoStats, MonitorError> {
        let content = fs::read_to_string("/proc/diskstats")
            .map_err(|e| MonitorError::ProviderUnavailable(format!("/proc/diskstats: {e}")))?;

        let mut stats = DiskIoStats::default();
        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 14 {
                continue;
            }

            let device_name = parts[2];
            if device_name.starts_with("loop") || device_name.starts_with("ram") {
                continue;
            }

            let read_ops = parts[3].parse::<u64>().unwrap_or(0);
            let read_sectors = parts[5].parse::<u64>().unwrap_or(0);
            let write_ops = parts[7].parse::<u64>().unwrap_or(0);
            let write_sectors = parts[9].parse::<u64>().unwrap_or(0);

            stats.read_ops += read_ops;
            stats.write_ops += write_ops;
            // Sectors are 512 bytes.
            stats.read_bytes += read_sectors * 512;
            stats.write_bytes += write_sectors * 512;
        }

        Ok(stats)
    }

    pub fn system_info(&self) -> SystemInfo {
        let system = self.system.read();
        let disks = self.disks.read();

        let (disk_total, disk_free) = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .map(|d| (d.total_space(), d.available_space()))
            .unwrap_or((0, 0));

        SystemInfo {
            platform: System::name().unwrap_or_else(|| "unknown".to_string()),
            os_release: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
            architecture: System::cpu_arch().unwrap_or_else(|| "unknown".to_string()),
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            physical_cores: system.physical_core_count(),
            logical_cores: system.cpus().len(),
            memory_total: system.total_memory(),
            memory_available: system.available_memory(),
            disk_total,
            disk_used: disk_total.saturating_sub(disk_free),
            disk_free,
            boot_time: System::boot_time(),
        }
    }

    /// Ordered process listing: idle process (pid 0) excluded, CPU percent
    /// normalized by logical core count, sorted by CPU descending.
    pub fn processes(&self) -> Result<Vec<ProcessEntry>, MonitorError> {
        let system = self.system.read();
        let cores = system.cpus().len().max(1);
        let total_memory = system.total_memory().max(1);
        let real_pids = real_pid_set();

        let mut entries: Vec<ProcessEntry> = system
            .processes()
            .iter()
            .filter(|(pid, _)| {
                let pid = pid.as_u32();
                pid != 0 && real_pids.contains(&pid)
            })
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().to_string(),
                cpu_percent: normalize_cpu(process.cpu_usage(), cores),
                memory_percent: process.memory() as f32 / total_memory as f32 * 100.0,
                status: ProcessState::from(process.status()),
            })
            .collect();

        entries.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
        Ok(entries)
    }

    /// Raw usage figures for the watch-list scan: CPU percent stays per-core.
    pub fn watch_samples(&self) -> Result<Vec<ProcessSample>, MonitorError> {
        let system = self.system.read();
        let total_memory = system.total_memory().max(1);
        let real_pids = real_pid_set();

        Ok(system
            .processes()
            .iter()
            .filter(|(pid, _)| real_pids.contains(&pid.as_u32()))
            .map(|(pid, process)| ProcessSample {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().to_string(),
                cpu_percent: process.cpu_usage() as f64,
                memory_percent: process.memory() as f64 / total_memory as f64 * 100.0,
            })
            .collect())
    }

    pub fn process(&self, pid: u32) -> Result<ProcessDetail, MonitorError> {
        let system = self.system.read();
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(MonitorError::ProcessVanished(pid))?;

        Ok(self.to_detail(pid, process, &system))
    }

    fn to_detail(&self, pid: u32, process: &Process, system: &System) -> ProcessDetail {
        let cores = system.cpus().len().max(1);
        let total_memory = system.total_memory().max(1);

        ProcessDetail {
            pid,
            name: process.name().to_string_lossy().to_string(),
            status: ProcessState::from(process.status()),
            cpu_percent: normalize_cpu(process.cpu_usage(), cores),
            memory_percent: process.memory() as f32 / total_memory as f32 * 100.0,
            memory_bytes: process.memory(),
            virtual_memory_bytes: process.virtual_memory(),
            exe_path: process.exe().map(|p| p.to_path_buf()),
            command_line: process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect(),
            parent_pid: process.parent().map(|p| p.as_u32()),
            run_time_secs: process.run_time(),
        }
    }

    /// Send SIGKILL. Fails when the process is gone or the signal cannot be
    /// delivered (typically permission denied).
    pub fn kill(&self, pid: u32) -> Result<(), MonitorError> {
        let system = self.system.read();
        let process = system
            .process(Pid::from_u32(pid))
            .ok_or(MonitorError::ProcessVanished(pid))?;

        if process.kill() {
            Ok(())
        } else {
            Err(MonitorError::ProviderUnavailable(format!(
                "kill signal to pid {pid} was not delivered (permission denied?)"
            )))
        }
    }

    fn read_cpu_temperature(&self) -> Option<f32> {
        for i in 0..10 {
            let temp_path = format!("/sys/class/thermal/thermal_zone{i}/temp");
            if let Ok(temp_str) = fs::read_to_string(&temp_path) {
                if let Ok(temp) = temp_str.trim().parse::<f32>() {
                    // Millidegrees.
                    return Some(temp / 1000.0);
                }
            }
        }

        if let Ok(entries) = fs::read_dir("/sys/class/hwmon") {
            for entry in entries.flatten() {
                let temp_path = entry.path().join("temp1_input");
                if let Ok(temp_str) = fs::read_to_string(&temp_path) {
                    if let Ok(temp) = temp_str.trim().parse::<f32>() {
                        return Some(temp / 1000.0);
                    }
                }
            }
        }

        None
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn normalize_cpu(raw_percent: f32, logical_cores: usize) -> f32 {
    raw_percent / logical_cores.max(1) as f32
}

/// PIDs with a directory entry under /proc. sysinfo also reports threads,
/// which have /proc/{tid} paths but no directory listing entry; filtering
/// against the listing keeps only real processes.
fn real_pid_set() -> std::collections::HashSet<u32> {
    let mut pids = std::collections::HashSet::new();
    if let Ok(entries) = fs::read_dir("/proc") {
        for entry in entries.flatten() {
            if let Ok(file_name) = entry.file_name().into_string() {
                if let Ok(pid) = file_name.parse::<u32>() {
                    pids.insert(pid);
                }
            }
        }
    }
    pids
}
