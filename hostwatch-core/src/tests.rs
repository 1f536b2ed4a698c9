#[cfg(test)]
mod tests {
    use crate::config::{CpuThresholds, MemoryThresholds};
    use crate::metrics::MetricStatus;
    use crate::probe::SystemProbe;

    #[test]
    fn probe_produces_cpu_and_memory_readings() {
        let probe = SystemProbe::new();
        probe.refresh();
        std::thread::sleep(std::time::Duration::from_millis(200));
        probe.refresh();

        let cpu = probe.check_cpu(&CpuThresholds::default()).unwrap();
        let usage = cpu.get("usage").expect("usage reading missing");
        assert!(usage.value >= 0.0);
        assert!(matches!(
            usage.status,
            MetricStatus::Normal | MetricStatus::Warning | MetricStatus::Critical
        ));

        let memory = probe.check_memory(&MemoryThresholds::default()).unwrap();
        let ram = memory.get("ram").expect("ram reading missing");
        assert!(ram.value > 0.0 && ram.value <= 100.0);
        assert!(ram.message.contains("Memory usage"));
    }

    #[test]
    fn process_listing_is_sorted_and_excludes_idle() {
        let probe = SystemProbe::new();
        probe.refresh();
        std::thread::sleep(std::time::Duration::from_millis(200));
        probe.refresh();

        let processes = probe.processes().unwrap();
        assert!(!processes.is_empty(), "no processes reported");

        assert!(processes.iter().all(|p| p.pid != 0));
        assert!(processes
            .windows(2)
            .all(|w| w[0].cpu_percent >= w[1].cpu_percent));
    }

    #[test]
    fn system_info_reports_the_host() {
        let probe = SystemProbe::new();
        probe.refresh();

        let info = probe.system_info();
        assert!(info.logical_cores > 0);
        assert!(info.memory_total > 0);
        assert!(!info.hostname.is_empty());
    }
}
