//! Deterministic in-memory provider for tests and benches.

use crate::error::{Result, SnapshotError};
use crate::sections::Section;

use super::{
    ClassLoadingCounters, MemoryPool, MemoryType, MemoryUsage, ProcessIdentity, RuntimeProvider,
    StackFrame, ThreadCounters, ThreadSnapshot, ThreadState, UNDEFINED,
};

/// Serves fixed values. Setting `unavailable` makes every read backing that
/// section fail with [`SnapshotError::Unavailable`].
#[derive(Debug, Clone)]
pub struct FakeProvider {
    pub identity: ProcessIdentity,
    pub threads: Vec<ThreadSnapshot>,
    pub counters: ThreadCounters,
    pub heap: MemoryUsage,
    pub non_heap: MemoryUsage,
    pub pools: Vec<MemoryPool>,
    pub class_loading: ClassLoadingCounters,
    pub separator: char,
    pub unavailable: Option<Section>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            identity: ProcessIdentity::default(),
            threads: Vec::new(),
            counters: ThreadCounters::default(),
            heap: MemoryUsage::default(),
            non_heap: MemoryUsage::default(),
            pools: Vec::new(),
            class_loading: ClassLoadingCounters::default(),
            separator: ':',
            unavailable: None,
        }
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small but complete process: two threads, three pools (one retired).
    pub fn sample() -> Self {
        let main = ThreadSnapshot {
            name: "main".to_string(),
            id: 1,
            blocked_count: 2,
            blocked_time: UNDEFINED,
            waited_count: 5,
            waited_time: UNDEFINED,
            state: ThreadState::Waiting,
            stack_trace: vec![
                frame("std::sys::pal::unix::futex", "futex_wait", None, None, false),
                frame("app::worker", "park", Some("worker.rs"), Some(42), false),
                frame("app::worker", "run", Some("worker.rs"), None, false),
                frame("<foreign>", "clone3", None, None, true),
            ],
        };
        let reaper = ThreadSnapshot {
            name: "reaper".to_string(),
            id: 7,
            blocked_count: 0,
            blocked_time: UNDEFINED,
            waited_count: 11,
            waited_time: UNDEFINED,
            state: ThreadState::TimedWaiting,
            stack_trace: vec![frame("app::reaper", "tick", Some("reaper.rs"), Some(9), false)],
        };

        Self {
            identity: ProcessIdentity {
                vm_name: "Linux".to_string(),
                vm_vendor: "debian".to_string(),
                vm_version: "6.1.0".to_string(),
                uptime_ms: 12_573,
                start_time_ms: 1_611_129_944_546,
                input_arguments: vec!["--port".to_string(), "8080".to_string()],
                search_path: "/usr/local/bin:/usr/bin".to_string(),
            },
            threads: vec![main, reaper],
            counters: ThreadCounters {
                current: 2,
                daemon: 1,
                peak: 3,
                cpu_time_enabled: true,
                contention_monitoring_enabled: false,
            },
            heap: MemoryUsage {
                init: UNDEFINED,
                committed: 8_388_608,
                max: 17_179_869_184,
                used: 4_194_304,
            },
            non_heap: MemoryUsage {
                init: UNDEFINED,
                committed: 32_374_784,
                max: UNDEFINED,
                used: 28_859_904,
            },
            pools: vec![
                pool("[heap]", MemoryType::Heap, true, 4_194_304, 8_388_608),
                pool("/usr/lib/libc.so.6", MemoryType::NonHeap, true, 1_572_864, 2_097_152),
                pool("/tmp/old.so (deleted)", MemoryType::NonHeap, false, 4096, 8192),
            ],
            class_loading: ClassLoadingCounters {
                loaded: 100,
                total_loaded: 120,
                unloaded: 20,
            },
            separator: ':',
            unavailable: None,
        }
    }

    pub fn with_threads(mut self, threads: Vec<ThreadSnapshot>) -> Self {
        self.counters.current = threads.len() as u64;
        self.counters.peak = self.counters.peak.max(self.counters.current);
        self.threads = threads;
        self
    }

    pub fn with_pools(mut self, pools: Vec<MemoryPool>) -> Self {
        self.pools = pools;
        self
    }

    pub fn with_class_loading(mut self, loaded: u64, total_loaded: u64, unloaded: u64) -> Self {
        self.class_loading = ClassLoadingCounters {
            loaded,
            total_loaded,
            unloaded,
        };
        self
    }

    pub fn unavailable(mut self, section: Section) -> Self {
        self.unavailable = Some(section);
        self
    }

    fn check(&self, section: Section) -> Result<()> {
        if self.unavailable == Some(section) {
            return Err(SnapshotError::Unavailable(format!(
                "fake provider has no {} data",
                section.key()
            )));
        }
        Ok(())
    }
}

pub fn frame(
    class_name: &str,
    method_name: &str,
    file_name: Option<&str>,
    line_number: Option<i32>,
    native: bool,
) -> StackFrame {
    StackFrame {
        class_name: class_name.to_string(),
        method_name: method_name.to_string(),
        file_name: file_name.map(str::to_string),
        line_number,
        native,
    }
}

fn pool(name: &str, memory_type: MemoryType, valid: bool, used: i64, committed: i64) -> MemoryPool {
    let usage = MemoryUsage {
        init: UNDEFINED,
        committed,
        max: UNDEFINED,
        used,
    };
    MemoryPool {
        name: name.to_string(),
        memory_type,
        valid,
        usage,
        peak_usage: usage,
    }
}

impl RuntimeProvider for FakeProvider {
    fn process_identity(&self) -> Result<ProcessIdentity> {
        self.check(Section::Runtime)?;
        Ok(self.identity.clone())
    }

    fn thread_ids(&self) -> Result<Vec<u64>> {
        self.check(Section::Thread)?;
        Ok(self.threads.iter().map(|t| t.id).collect())
    }

    fn thread_snapshots(&self, ids: &[u64], max_depth: usize) -> Result<Vec<ThreadSnapshot>> {
        self.check(Section::Thread)?;
        Ok(ids
            .iter()
            .filter_map(|id| self.threads.iter().find(|t| t.id == *id))
            .map(|t| {
                let mut snapshot = t.clone();
                snapshot.stack_trace.truncate(max_depth);
                snapshot
            })
            .collect())
    }

    fn thread_counters(&self) -> Result<ThreadCounters> {
        self.check(Section::Thread)?;
        Ok(self.counters.clone())
    }

    fn heap_usage(&self) -> Result<MemoryUsage> {
        self.check(Section::Memory)?;
        Ok(self.heap)
    }

    fn non_heap_usage(&self) -> Result<MemoryUsage> {
        self.check(Section::Memory)?;
        Ok(self.non_heap)
    }

    fn memory_pools(&self) -> Result<Vec<MemoryPool>> {
        self.check(Section::Memory)?;
        Ok(self.pools.clone())
    }

    fn class_loading(&self) -> Result<ClassLoadingCounters> {
        self.check(Section::ClassLoading)?;
        Ok(self.class_loading)
    }

    fn path_separator(&self) -> char {
        self.separator
    }
}
