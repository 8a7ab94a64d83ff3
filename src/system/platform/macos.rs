use std::ffi::c_char;
use std::io;

use libproc::libproc::proc_pid::{ListThreads, listpidinfo, pidinfo};
use libproc::libproc::task_info::TaskInfo;
use libproc::libproc::thread_info::ThreadInfo;

use super::{PlatformExtensions, unsupported};
use crate::provider::{ThreadSnapshot, ThreadState, UNDEFINED};
use crate::system::regions::MappedRegion;

pub struct Platform;

// Mach thread run states.
const TH_STATE_RUNNING: i32 = 1;
const TH_STATE_STOPPED: i32 = 2;
const TH_STATE_WAITING: i32 = 3;
const TH_STATE_UNINTERRUPTIBLE: i32 = 4;
const TH_STATE_HALTED: i32 = 5;

impl PlatformExtensions for Platform {
    fn thread_ids(pid: u32) -> io::Result<Vec<u64>> {
        let task = pidinfo::<TaskInfo>(pid as i32, 0).map_err(io::Error::other)?;
        let max = usize::try_from(task.pti_threadnum).unwrap_or(0);
        listpidinfo::<ListThreads>(pid as i32, max).map_err(io::Error::other)
    }

    fn thread_snapshot(pid: u32, tid: u64) -> io::Result<Option<ThreadSnapshot>> {
        // libproc reports a vanished thread handle as a plain error string.
        let Ok(info) = pidinfo::<ThreadInfo>(pid as i32, tid) else {
            return Ok(None);
        };
        let name = thread_name(&info.pth_name);
        let state = match info.pth_run_state {
            TH_STATE_RUNNING => ThreadState::Runnable,
            TH_STATE_UNINTERRUPTIBLE => ThreadState::Blocked,
            TH_STATE_WAITING | TH_STATE_STOPPED => ThreadState::Waiting,
            TH_STATE_HALTED => ThreadState::Terminated,
            _ => ThreadState::Waiting,
        };
        Ok(Some(ThreadSnapshot {
            name,
            id: tid,
            blocked_count: 0,
            blocked_time: UNDEFINED,
            waited_count: 0,
            waited_time: UNDEFINED,
            state,
            stack_trace: Vec::new(),
        }))
    }

    fn main_thread_id(_pid: u32) -> Option<u64> {
        // Thread handles carry no main-thread marker.
        None
    }

    fn current_thread_id() -> Option<u64> {
        None
    }

    fn thread_cpu_time_supported() -> bool {
        true
    }

    fn memory_regions(_pid: u32) -> io::Result<Vec<MappedRegion>> {
        Err(unsupported("memory region listing"))
    }

    fn data_size_limit(_pid: u32) -> Option<u64> {
        None
    }
}

/// Decodes a NUL-terminated, UTF-8 encoded thread name.
fn thread_name(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bytes: &[u8]) -> Vec<c_char> {
        bytes.iter().map(|&b| b as c_char).chain([0, 0]).collect()
    }

    #[test]
    fn thread_name_decodes_utf8() {
        assert_eq!(thread_name(&raw("wörker-ü".as_bytes())), "wörker-ü");
        assert_eq!(thread_name(&raw(b"main")), "main");
    }

    #[test]
    fn thread_name_replaces_invalid_bytes() {
        assert_eq!(thread_name(&raw(&[b'a', 0xff, b'b'])), "a\u{fffd}b");
    }
}
