use std::ffi::OsString;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};

use super::platform;
use super::regions::{MappedRegion, aggregate_usage, pools_from_regions, shared_object_count};
use super::stack;
use crate::error::{Result, SnapshotError};
use crate::provider::{
    ClassLoadingCounters, MemoryPool, MemoryReadings, MemoryType, MemoryUsage, ProcessIdentity,
    RuntimeProvider, ThreadCounters, ThreadSnapshot, UNDEFINED,
};

pub const DEFAULT_SEARCH_PATH_VAR: &str = "PATH";

/// Reads a live OS process: the current one by default, or any readable pid.
pub struct HostProvider {
    pid: u32,
    sys: System,
    search_path_var: String,
}

impl HostProvider {
    pub fn current() -> Result<Self> {
        Self::for_pid(std::process::id())
    }

    pub fn for_pid(pid: u32) -> Result<Self> {
        let mut sys = System::new();
        let pids = [Pid::from_u32(pid)];
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::everything(),
        );
        if sys.process(pids[0]).is_none() {
            return Err(SnapshotError::Unavailable(format!("process {pid} not found")));
        }
        tracing::debug!(pid, "host provider attached");
        Ok(Self {
            pid,
            sys,
            search_path_var: DEFAULT_SEARCH_PATH_VAR.to_string(),
        })
    }

    /// Environment variable holding the search path list reported as `classpath`.
    pub fn with_search_path_var(mut self, name: impl Into<String>) -> Self {
        self.search_path_var = name.into();
        self
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    fn is_current_process(&self) -> bool {
        self.pid == std::process::id()
    }

    fn process(&self) -> Result<&Process> {
        self.sys
            .process(Pid::from_u32(self.pid))
            .ok_or_else(|| SnapshotError::Unavailable(format!("process {} not found", self.pid)))
    }

    fn search_path(&self, process: &Process) -> String {
        if self.is_current_process() {
            return std::env::var(&self.search_path_var).unwrap_or_default();
        }
        let prefix = format!("{}=", self.search_path_var);
        process
            .environ()
            .iter()
            .map(|entry| entry.to_string_lossy())
            .find_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .unwrap_or_default()
    }

    /// `Ok(None)` when the platform has no region listing.
    fn regions(&self) -> Result<Option<Vec<MappedRegion>>> {
        match platform::memory_regions(self.pid) {
            Ok(regions) => {
                tracing::trace!(pid = self.pid, regions = regions.len(), "memory regions read");
                Ok(Some(regions))
            }
            Err(e) if e.kind() == io::ErrorKind::Unsupported => Ok(None),
            Err(e) => Err(SnapshotError::io(
                format!("reading memory regions of process {}", self.pid),
                e,
            )),
        }
    }

    fn heap_from(&self, regions: Option<&[MappedRegion]>) -> Result<MemoryUsage> {
        match regions {
            Some(regions) => Ok(aggregate_usage(
                regions,
                MemoryType::Heap,
                platform::data_size_limit(self.pid),
            )),
            None => {
                let process = self.process()?;
                Ok(MemoryUsage {
                    init: UNDEFINED,
                    committed: bytes(process.virtual_memory()),
                    max: UNDEFINED,
                    used: bytes(process.memory()),
                })
            }
        }
    }

    fn pools_from(&self, regions: Option<&[MappedRegion]>) -> Vec<MemoryPool> {
        match regions {
            Some(regions) => pools_from_regions(regions),
            None => {
                tracing::debug!(pid = self.pid, "no memory pool detail on this platform");
                Vec::new()
            }
        }
    }
}

fn non_heap_from(regions: Option<&[MappedRegion]>) -> MemoryUsage {
    regions
        .map(|regions| aggregate_usage(regions, MemoryType::NonHeap, None))
        .unwrap_or_else(MemoryUsage::undefined)
}

fn lossy(arg: &OsString) -> String {
    arg.to_string_lossy().into_owned()
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

fn bytes(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl RuntimeProvider for HostProvider {
    fn process_identity(&self) -> Result<ProcessIdentity> {
        let process = self.process()?;
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SnapshotError::Malformed {
                what: "system clock",
                detail: e.to_string(),
            })?
            .as_millis();
        let start_time_ms = secs_to_ms(process.start_time());
        let uptime_ms = i64::try_from(now_ms)
            .unwrap_or(i64::MAX)
            .saturating_sub(start_time_ms)
            .max(0);

        Ok(ProcessIdentity {
            vm_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            vm_vendor: System::distribution_id(),
            vm_version: System::kernel_version().unwrap_or_default(),
            uptime_ms,
            start_time_ms,
            input_arguments: process.cmd().iter().skip(1).map(lossy).collect(),
            search_path: self.search_path(process),
        })
    }

    fn thread_ids(&self) -> Result<Vec<u64>> {
        platform::thread_ids(self.pid)
            .map_err(|e| SnapshotError::io(format!("listing threads of process {}", self.pid), e))
    }

    fn thread_snapshots(&self, ids: &[u64], max_depth: usize) -> Result<Vec<ThreadSnapshot>> {
        let capturing = if self.is_current_process() {
            platform::current_thread_id()
        } else {
            None
        };

        let mut snapshots = Vec::with_capacity(ids.len());
        for &tid in ids {
            let snapshot = platform::thread_snapshot(self.pid, tid).map_err(|e| {
                SnapshotError::io(format!("reading thread {tid} of process {}", self.pid), e)
            })?;
            match snapshot {
                Some(mut snapshot) => {
                    if capturing == Some(tid) {
                        snapshot.stack_trace = stack::capture_current(max_depth);
                    }
                    snapshots.push(snapshot);
                }
                None => tracing::debug!(pid = self.pid, tid, "thread exited during scan"),
            }
        }
        Ok(snapshots)
    }

    fn thread_counters(&self) -> Result<ThreadCounters> {
        let ids = self.thread_ids()?;
        let current = ids.len() as u64;
        // Only the main thread keeps a native process alive.
        let daemon = match platform::main_thread_id(self.pid) {
            Some(main) => ids.iter().filter(|&&id| id != main).count() as u64,
            None => current.saturating_sub(1),
        };
        Ok(ThreadCounters {
            current,
            daemon,
            peak: current,
            cpu_time_enabled: platform::thread_cpu_time_supported(),
            contention_monitoring_enabled: false,
        })
    }

    fn heap_usage(&self) -> Result<MemoryUsage> {
        let regions = self.regions()?;
        self.heap_from(regions.as_deref())
    }

    fn non_heap_usage(&self) -> Result<MemoryUsage> {
        Ok(non_heap_from(self.regions()?.as_deref()))
    }

    fn memory_pools(&self) -> Result<Vec<MemoryPool>> {
        Ok(self.pools_from(self.regions()?.as_deref()))
    }

    fn memory_readings(&self, include_pools: bool) -> Result<MemoryReadings> {
        let regions = self.regions()?;
        let regions = regions.as_deref();
        Ok(MemoryReadings {
            heap: self.heap_from(regions)?,
            non_heap: non_heap_from(regions),
            pools: include_pools.then(|| self.pools_from(regions)),
        })
    }

    fn class_loading(&self) -> Result<ClassLoadingCounters> {
        let regions = self.regions()?.ok_or_else(|| {
            SnapshotError::Unavailable(format!(
                "shared object listing is not supported on {}",
                std::env::consts::OS
            ))
        })?;
        let loaded = shared_object_count(&regions);
        Ok(ClassLoadingCounters {
            loaded,
            total_loaded: loaded,
            unloaded: 0,
        })
    }
}
