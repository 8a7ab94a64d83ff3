use std::fs;
use std::io;
use std::path::Path;

use super::PlatformExtensions;
use crate::provider::{ThreadSnapshot, ThreadState, UNDEFINED};
use crate::system::regions::MappedRegion;

pub struct Platform;

const TIMED_WAIT_CHANNELS: [&str; 3] = ["nanosleep", "hrtimer", "schedule_timeout"];

// procfs answers ESRCH when a task exits between open and read.
const ESRCH: i32 = 3;

impl PlatformExtensions for Platform {
    fn thread_ids(pid: u32) -> io::Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(format!("/proc/{pid}/task"))? {
            let entry = entry?;
            if let Some(tid) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                ids.push(tid);
            }
        }
        Ok(ids)
    }

    fn thread_snapshot(pid: u32, tid: u64) -> io::Result<Option<ThreadSnapshot>> {
        let base = format!("/proc/{pid}/task/{tid}");
        let Some(stat) = read_if_present(&format!("{base}/stat"))? else {
            return Ok(None);
        };
        let Some(status) = read_if_present(&format!("{base}/status"))? else {
            return Ok(None);
        };
        let (name, state_code) = parse_task_stat(&stat).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("unparsable {base}/stat"))
        })?;
        let wchan = fs::read_to_string(format!("{base}/wchan")).unwrap_or_default();
        let (voluntary, involuntary) = parse_context_switches(&status);

        Ok(Some(ThreadSnapshot {
            name,
            id: tid,
            blocked_count: involuntary,
            blocked_time: UNDEFINED,
            waited_count: voluntary,
            waited_time: UNDEFINED,
            state: thread_state(state_code, &wchan),
            stack_trace: Vec::new(),
        }))
    }

    fn main_thread_id(pid: u32) -> Option<u64> {
        // The thread group leader shares the process id.
        Some(u64::from(pid))
    }

    fn current_thread_id() -> Option<u64> {
        // /proc/thread-self -> "<pid>/task/<tid>"
        let link = fs::read_link("/proc/thread-self").ok()?;
        link.file_name()?.to_str()?.parse().ok()
    }

    fn thread_cpu_time_supported() -> bool {
        Path::new("/proc/thread-self/stat").exists()
    }

    fn memory_regions(pid: u32) -> io::Result<Vec<MappedRegion>> {
        let contents = fs::read_to_string(format!("/proc/{pid}/smaps"))?;
        Ok(parse_smaps(&contents))
    }

    fn data_size_limit(pid: u32) -> Option<u64> {
        let contents = fs::read_to_string(format!("/proc/{pid}/limits")).ok()?;
        parse_data_limit(&contents)
    }
}

fn read_if_present(path: &str) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if task_gone(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

fn task_gone(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(ESRCH)
}

/// Returns (comm, state letter). comm may itself contain spaces and parens.
fn parse_task_stat(contents: &str) -> Option<(String, char)> {
    let open = contents.find('(')?;
    let close = contents.rfind(')')?;
    if close < open {
        return None;
    }
    let name = contents[open + 1..close].to_string();
    let state = contents[close + 1..].split_whitespace().next()?.chars().next()?;
    Some((name, state))
}

/// Returns (voluntary, nonvoluntary) context switch counts.
fn parse_context_switches(status: &str) -> (u64, u64) {
    let mut voluntary = 0;
    let mut involuntary = 0;
    for line in status.lines() {
        if let Some(val) = line.strip_prefix("voluntary_ctxt_switches:") {
            voluntary = val.trim().parse().unwrap_or(0);
        } else if let Some(val) = line.strip_prefix("nonvoluntary_ctxt_switches:") {
            involuntary = val.trim().parse().unwrap_or(0);
        }
    }
    (voluntary, involuntary)
}

fn thread_state(code: char, wchan: &str) -> ThreadState {
    match code {
        'R' => ThreadState::Runnable,
        'D' => ThreadState::Blocked,
        'S' if TIMED_WAIT_CHANNELS.iter().any(|c| wchan.contains(c)) => {
            ThreadState::TimedWaiting
        }
        'Z' | 'X' | 'x' => ThreadState::Terminated,
        // S, I (idle), T/t (stopped/traced), W, P, K
        _ => ThreadState::Waiting,
    }
}

fn parse_smaps(contents: &str) -> Vec<MappedRegion> {
    let mut regions: Vec<MappedRegion> = Vec::new();
    for line in contents.lines() {
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else {
            continue;
        };
        if first.ends_with(':') {
            let Some(region) = regions.last_mut() else {
                continue;
            };
            let kb: u64 = tokens.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            match first {
                "Size:" => region.size_bytes = kb * 1024,
                "Rss:" => region.rss_bytes = kb * 1024,
                _ => {}
            }
        } else if first.contains('-') {
            // address perms offset dev inode [pathname]
            let name = tokens.skip(4).collect::<Vec<_>>().join(" ");
            regions.push(MappedRegion {
                name,
                size_bytes: 0,
                rss_bytes: 0,
            });
        }
    }
    regions
}

fn parse_data_limit(limits: &str) -> Option<u64> {
    let line = limits.lines().find(|l| l.starts_with("Max data size"))?;
    let soft = line.trim_start_matches("Max data size").split_whitespace().next()?;
    soft.parse().ok()
}
