use std::io;

use super::{PlatformExtensions, unsupported};
use crate::provider::ThreadSnapshot;
use crate::system::regions::MappedRegion;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn thread_ids(_pid: u32) -> io::Result<Vec<u64>> {
        Err(unsupported("thread enumeration"))
    }

    fn thread_snapshot(_pid: u32, _tid: u64) -> io::Result<Option<ThreadSnapshot>> {
        Err(unsupported("thread snapshots"))
    }

    fn main_thread_id(_pid: u32) -> Option<u64> {
        None
    }

    fn current_thread_id() -> Option<u64> {
        None
    }

    fn thread_cpu_time_supported() -> bool {
        false
    }

    fn memory_regions(_pid: u32) -> io::Result<Vec<MappedRegion>> {
        Err(unsupported("memory region listing"))
    }

    fn data_size_limit(_pid: u32) -> Option<u64> {
        None
    }
}
