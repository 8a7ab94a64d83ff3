//! Serializable section documents and the pure transformations that build
//! them from provider data.

use serde::{Deserialize, Serialize};

use crate::format::{format_frame, split_search_path};
use crate::provider::{
    ClassLoadingCounters, MemoryPool, MemoryType, MemoryUsage, ProcessIdentity, ThreadCounters,
    ThreadSnapshot, ThreadState,
};

/// Top-level keys of the snapshot document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Runtime,
    Thread,
    Memory,
    ClassLoading,
}

impl Section {
    /// Order used when every section is requested at once.
    pub const FULL_ORDER: [Section; 4] = [
        Section::Memory,
        Section::Runtime,
        Section::Thread,
        Section::ClassLoading,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Section::Runtime => "runtime",
            Section::Thread => "thread",
            Section::Memory => "memory",
            Section::ClassLoading => "class-loading",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeSection {
    pub vm_name: String,
    pub vm_vendor: String,
    pub vm_version: String,
    pub uptime: i64,
    pub start_time: i64,
    pub input_arguments: Vec<String>,
    pub classpath: Vec<String>,
}

impl RuntimeSection {
    pub fn from_identity(identity: ProcessIdentity, separator: char) -> Self {
        let classpath = split_search_path(&identity.search_path, separator);
        Self {
            vm_name: identity.vm_name,
            vm_vendor: identity.vm_vendor,
            vm_version: identity.vm_version,
            uptime: identity.uptime_ms,
            start_time: identity.start_time_ms,
            input_arguments: identity.input_arguments,
            classpath,
        }
    }
}

/// How much of each thread is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadDetail {
    /// Counters and per-thread state only.
    Summary,
    /// Adds capability flags and up to `stack_trace_depth` formatted frames.
    Extended { stack_trace_depth: usize },
}

impl ThreadDetail {
    pub fn stack_trace_depth(self) -> usize {
        match self {
            ThreadDetail::Summary => 0,
            ThreadDetail::Extended { stack_trace_depth } => stack_trace_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThreadRecord {
    pub name: String,
    pub id: u64,
    pub blocked_count: u64,
    pub blocked_time: i64,
    pub waited_count: u64,
    pub waited_time: i64,
    pub state: ThreadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<String>>,
}

impl ThreadRecord {
    pub fn from_snapshot(snapshot: ThreadSnapshot, detail: ThreadDetail) -> Self {
        let stack_trace = match detail {
            ThreadDetail::Summary => None,
            ThreadDetail::Extended { stack_trace_depth } => Some(
                snapshot
                    .stack_trace
                    .iter()
                    .take(stack_trace_depth)
                    .map(format_frame)
                    .collect(),
            ),
        };
        Self {
            name: snapshot.name,
            id: snapshot.id,
            blocked_count: snapshot.blocked_count,
            blocked_time: snapshot.blocked_time,
            waited_count: snapshot.waited_count,
            waited_time: snapshot.waited_time,
            state: snapshot.state,
            stack_trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThreadSection {
    pub current_thread_count: u64,
    pub daemon_thread_count: u64,
    pub peak_thread_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_cpu_time_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_contention_monitoring_enabled: Option<bool>,
    pub threads: Vec<ThreadRecord>,
}

impl ThreadSection {
    pub fn new(
        counters: ThreadCounters,
        snapshots: Vec<ThreadSnapshot>,
        detail: ThreadDetail,
    ) -> Self {
        let extended = matches!(detail, ThreadDetail::Extended { .. });
        Self {
            current_thread_count: counters.current,
            daemon_thread_count: counters.daemon,
            peak_thread_count: counters.peak,
            thread_cpu_time_enabled: extended.then_some(counters.cpu_time_enabled),
            thread_contention_monitoring_enabled: extended
                .then_some(counters.contention_monitoring_enabled),
            threads: snapshots
                .into_iter()
                .map(|s| ThreadRecord::from_snapshot(s, detail))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PoolRecord {
    pub name: String,
    pub usage: MemoryUsage,
    pub peak_usage: MemoryUsage,
}

impl From<MemoryPool> for PoolRecord {
    fn from(pool: MemoryPool) -> Self {
        Self {
            name: pool.name,
            usage: pool.usage,
            peak_usage: pool.peak_usage,
        }
    }
}

/// Aggregate usage with optional per-pool detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    #[serde(flatten)]
    pub usage: MemoryUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pools: Option<Vec<PoolRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MemorySection {
    pub heap: UsageRecord,
    pub non_heap: UsageRecord,
}

impl MemorySection {
    /// `pools` is `None` when pool detail was not requested. Retired pools are
    /// dropped; the rest land under heap or non-heap by their type tag.
    pub fn new(heap: MemoryUsage, non_heap: MemoryUsage, pools: Option<Vec<MemoryPool>>) -> Self {
        let (heap_pools, non_heap_pools) = match pools {
            Some(pools) => {
                let (heap_pools, non_heap_pools) = classify_pools(pools);
                (Some(heap_pools), Some(non_heap_pools))
            }
            None => (None, None),
        };
        Self {
            heap: UsageRecord {
                usage: heap,
                pools: heap_pools,
            },
            non_heap: UsageRecord {
                usage: non_heap,
                pools: non_heap_pools,
            },
        }
    }
}

pub fn classify_pools(pools: Vec<MemoryPool>) -> (Vec<PoolRecord>, Vec<PoolRecord>) {
    let mut heap = Vec::new();
    let mut non_heap = Vec::new();
    for pool in pools.into_iter().filter(|p| p.valid) {
        match pool.memory_type {
            MemoryType::Heap => heap.push(pool.into()),
            MemoryType::NonHeap => non_heap.push(pool.into()),
        }
    }
    (heap, non_heap)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClassLoadingSection {
    pub loaded_classes: u64,
    pub total_loaded_classes: u64,
    pub unloaded_classes: u64,
}

impl From<ClassLoadingCounters> for ClassLoadingSection {
    fn from(counters: ClassLoadingCounters) -> Self {
        Self {
            loaded_classes: counters.loaded,
            total_loaded_classes: counters.total_loaded,
            unloaded_classes: counters.unloaded,
        }
    }
}
