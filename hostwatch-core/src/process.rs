use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Dead,
    Unknown,
}

impl From<sysinfo::ProcessStatus> for ProcessState {
    fn from(status: sysinfo::ProcessStatus) -> Self {
        match status {
            sysinfo::ProcessStatus::Run => ProcessState::Running,
            sysinfo::ProcessStatus::Sleep => ProcessState::Sleeping,
            sysinfo::ProcessStatus::Stop => ProcessState::Stopped,
            sysinfo::ProcessStatus::Zombie => ProcessState::Zombie,
            sysinfo::ProcessStatus::Dead => ProcessState::Dead,
            _ => ProcessState::Unknown,
        }
    }
}

/// One row in the process listing. `cpu_percent` is normalized by logical
/// core count, so a process saturating two cores on an eight-core machine
/// shows as 25%.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub status: ProcessState,
}

/// Raw per-process usage fed to the watch-list scan. CPU percent here is the
/// un-normalized per-core figure.
#[derive(Debug, Clone)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDetail {
    pub pid: u32,
    pub name: String,
    pub status: ProcessState,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_bytes: u64,
    pub virtual_memory_bytes: u64,
    pub exe_path: Option<PathBuf>,
    pub command_line: Vec<String>,
    pub parent_pid: Option<u32>,
    pub run_time_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_conversion() {
        assert_eq!(
            ProcessState::from(sysinfo::ProcessStatus::Run),
            ProcessState::Running
        );
        assert_eq!(
            ProcessState::from(sysinfo::ProcessStatus::Zombie),
            ProcessState::Zombie
        );
        assert_eq!(
            ProcessState::from(sysinfo::ProcessStatus::Idle),
            ProcessState::Unknown
        );
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ProcessState::Sleeping).unwrap(),
            "\"sleeping\""
        );
    }
}
