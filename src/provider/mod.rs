//! The instrumentation capability a snapshot is read from.
//!
//! [`RuntimeProvider`] is the seam between live process state and the pure
//! document transformations in [`crate::sections`]. `HostProvider` reads a
//! live OS process; [`fake::FakeProvider`] is a deterministic stand-in for
//! tests and benches.

pub mod fake;

use serde::Serialize;

use crate::error::Result;

/// Marker for a usage metric the provider cannot define (e.g. an unbounded max).
pub const UNDEFINED: i64 = -1;

/// One memory usage reading. Every field is in bytes, or [`UNDEFINED`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub init: i64,
    pub committed: i64,
    pub max: i64,
    pub used: i64,
}

impl MemoryUsage {
    pub fn undefined() -> Self {
        Self {
            init: UNDEFINED,
            committed: UNDEFINED,
            max: UNDEFINED,
            used: UNDEFINED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Heap,
    NonHeap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPool {
    pub name: String,
    pub memory_type: MemoryType,
    /// False once the provider has retired the pool.
    pub valid: bool,
    pub usage: MemoryUsage,
    pub peak_usage: MemoryUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadState {
    New,
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Terminated,
}

impl ThreadState {
    pub const ALL: [ThreadState; 6] = [
        ThreadState::New,
        ThreadState::Runnable,
        ThreadState::Blocked,
        ThreadState::Waiting,
        ThreadState::TimedWaiting,
        ThreadState::Terminated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThreadState::New => "NEW",
            ThreadState::Runnable => "RUNNABLE",
            ThreadState::Blocked => "BLOCKED",
            ThreadState::Waiting => "WAITING",
            ThreadState::TimedWaiting => "TIMED_WAITING",
            ThreadState::Terminated => "TERMINATED",
        }
    }
}

/// A single call-stack frame as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub class_name: String,
    pub method_name: String,
    pub file_name: Option<String>,
    /// Negative values mean the provider has no usable line.
    pub line_number: Option<i32>,
    pub native: bool,
}

/// Point-in-time copy of one thread's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub name: String,
    pub id: u64,
    pub blocked_count: u64,
    /// Milliseconds, or [`UNDEFINED`] when contention timing is off.
    pub blocked_time: i64,
    pub waited_count: u64,
    /// Milliseconds, or [`UNDEFINED`] when contention timing is off.
    pub waited_time: i64,
    pub state: ThreadState,
    pub stack_trace: Vec<StackFrame>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadCounters {
    pub current: u64,
    pub daemon: u64,
    pub peak: u64,
    pub cpu_time_enabled: bool,
    pub contention_monitoring_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub vm_name: String,
    pub vm_vendor: String,
    pub vm_version: String,
    pub uptime_ms: i64,
    pub start_time_ms: i64,
    pub input_arguments: Vec<String>,
    /// Unsplit path list using the host separator.
    pub search_path: String,
}

/// Memory aggregates and pools taken from one reading of the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryReadings {
    pub heap: MemoryUsage,
    pub non_heap: MemoryUsage,
    /// `None` when pools were not requested.
    pub pools: Option<Vec<MemoryPool>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassLoadingCounters {
    pub loaded: u64,
    pub total_loaded: u64,
    pub unloaded: u64,
}

/// Read access to a process's runtime instrumentation.
///
/// Every read is fallible at this boundary; the transformations applied to
/// the returned values are not.
pub trait RuntimeProvider {
    fn process_identity(&self) -> Result<ProcessIdentity>;

    /// All live thread ids, in the provider's native enumeration order.
    fn thread_ids(&self) -> Result<Vec<u64>>;

    /// Snapshots for `ids` with at most `max_depth` frames each. Threads that
    /// ended since enumeration may be missing from the result.
    fn thread_snapshots(&self, ids: &[u64], max_depth: usize) -> Result<Vec<ThreadSnapshot>>;

    fn thread_counters(&self) -> Result<ThreadCounters>;

    fn heap_usage(&self) -> Result<MemoryUsage>;

    fn non_heap_usage(&self) -> Result<MemoryUsage>;

    fn memory_pools(&self) -> Result<Vec<MemoryPool>>;

    /// Heap, non-heap and (optionally) pools together. Providers whose
    /// readings share an expensive source override this to read it once.
    fn memory_readings(&self, include_pools: bool) -> Result<MemoryReadings> {
        Ok(MemoryReadings {
            heap: self.heap_usage()?,
            non_heap: self.non_heap_usage()?,
            pools: if include_pools {
                Some(self.memory_pools()?)
            } else {
                None
            },
        })
    }

    fn class_loading(&self) -> Result<ClassLoadingCounters>;

    /// Separator used by [`ProcessIdentity::search_path`].
    fn path_separator(&self) -> char {
        crate::format::PATH_SEPARATOR
    }
}

impl<P: RuntimeProvider + ?Sized> RuntimeProvider for &P {
    fn process_identity(&self) -> Result<ProcessIdentity> {
        (**self).process_identity()
    }

    fn thread_ids(&self) -> Result<Vec<u64>> {
        (**self).thread_ids()
    }

    fn thread_snapshots(&self, ids: &[u64], max_depth: usize) -> Result<Vec<ThreadSnapshot>> {
        (**self).thread_snapshots(ids, max_depth)
    }

    fn thread_counters(&self) -> Result<ThreadCounters> {
        (**self).thread_counters()
    }

    fn heap_usage(&self) -> Result<MemoryUsage> {
        (**self).heap_usage()
    }

    fn non_heap_usage(&self) -> Result<MemoryUsage> {
        (**self).non_heap_usage()
    }

    fn memory_pools(&self) -> Result<Vec<MemoryPool>> {
        (**self).memory_pools()
    }

    fn memory_readings(&self, include_pools: bool) -> Result<MemoryReadings> {
        (**self).memory_readings(include_pools)
    }

    fn class_loading(&self) -> Result<ClassLoadingCounters> {
        (**self).class_loading()
    }

    fn path_separator(&self) -> char {
        (**self).path_separator()
    }
}
