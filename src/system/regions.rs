//! Folds a process's mapped memory regions into pools and aggregates.

use std::collections::{HashMap, HashSet};

use crate::provider::{MemoryPool, MemoryType, MemoryUsage, UNDEFINED};

pub const ANONYMOUS_POOL: &str = "[anon]";
const DELETED_SUFFIX: &str = " (deleted)";

/// One mapping as listed by the OS, sizes in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRegion {
    /// Backing path or pseudo name such as `[heap]`; empty when anonymous.
    pub name: String,
    pub size_bytes: u64,
    pub rss_bytes: u64,
}

impl MappedRegion {
    pub fn pool_name(&self) -> &str {
        if self.name.is_empty() {
            ANONYMOUS_POOL
        } else {
            &self.name
        }
    }

    pub fn memory_type(&self) -> MemoryType {
        let name = self.pool_name();
        if name == "[heap]" || name == ANONYMOUS_POOL || name.starts_with("[anon:") {
            MemoryType::Heap
        } else {
            MemoryType::NonHeap
        }
    }

    /// File mappings whose backing file has been removed.
    pub fn is_retired(&self) -> bool {
        self.name.ends_with(DELETED_SUFFIX)
    }

    pub fn is_shared_object(&self) -> bool {
        let path = self.name.trim_end_matches(DELETED_SUFFIX);
        path.starts_with('/')
            && path
                .rsplit('/')
                .next()
                .is_some_and(|file| file.ends_with(".so") || file.contains(".so."))
    }
}

/// Groups regions by pool name, preserving first-seen (address) order.
pub fn pools_from_regions(regions: &[MappedRegion]) -> Vec<MemoryPool> {
    let mut pools: Vec<MemoryPool> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for region in regions {
        let name = region.pool_name();
        let slot = *index.entry(name).or_insert_with(|| {
            pools.push(MemoryPool {
                name: name.to_string(),
                memory_type: region.memory_type(),
                valid: !region.is_retired(),
                usage: MemoryUsage {
                    init: UNDEFINED,
                    committed: 0,
                    max: UNDEFINED,
                    used: 0,
                },
                peak_usage: MemoryUsage::undefined(),
            });
            pools.len() - 1
        });
        let usage = &mut pools[slot].usage;
        usage.committed = usage.committed.saturating_add(to_i64(region.size_bytes));
        usage.used = usage.used.saturating_add(to_i64(region.rss_bytes));
    }

    pools
}

/// Sums every region of `memory_type`, retired ones included.
pub fn aggregate_usage(
    regions: &[MappedRegion],
    memory_type: MemoryType,
    max: Option<u64>,
) -> MemoryUsage {
    let (committed, used) = regions
        .iter()
        .filter(|r| r.memory_type() == memory_type)
        .fold((0i64, 0i64), |(committed, used), r| {
            (
                committed.saturating_add(to_i64(r.size_bytes)),
                used.saturating_add(to_i64(r.rss_bytes)),
            )
        });
    MemoryUsage {
        init: UNDEFINED,
        committed,
        max: max.map(to_i64).unwrap_or(UNDEFINED),
        used,
    }
}

/// Distinct shared objects currently mapped, including ones deleted on disk.
pub fn shared_object_count(regions: &[MappedRegion]) -> u64 {
    regions
        .iter()
        .filter(|r| r.is_shared_object())
        .map(|r| r.name.as_str())
        .collect::<HashSet<_>>()
        .len() as u64
}

fn to_i64(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}
