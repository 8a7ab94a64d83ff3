use std::io;

use crate::provider::ThreadSnapshot;
use crate::system::regions::MappedRegion;

/// OS-specific reads behind the host provider. Operations a platform cannot
/// serve fail with [`io::ErrorKind::Unsupported`].
pub trait PlatformExtensions {
    fn thread_ids(pid: u32) -> io::Result<Vec<u64>>;
    /// `Ok(None)` when the thread ended after enumeration.
    fn thread_snapshot(pid: u32, tid: u64) -> io::Result<Option<ThreadSnapshot>>;
    fn main_thread_id(pid: u32) -> Option<u64>;
    fn current_thread_id() -> Option<u64>;
    fn thread_cpu_time_supported() -> bool;
    fn memory_regions(pid: u32) -> io::Result<Vec<MappedRegion>>;
    fn data_size_limit(pid: u32) -> Option<u64>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn thread_ids(pid: u32) -> io::Result<Vec<u64>> {
    platform_impl::Platform::thread_ids(pid)
}

pub fn thread_snapshot(pid: u32, tid: u64) -> io::Result<Option<ThreadSnapshot>> {
    platform_impl::Platform::thread_snapshot(pid, tid)
}

pub fn main_thread_id(pid: u32) -> Option<u64> {
    platform_impl::Platform::main_thread_id(pid)
}

pub fn current_thread_id() -> Option<u64> {
    platform_impl::Platform::current_thread_id()
}

pub fn thread_cpu_time_supported() -> bool {
    platform_impl::Platform::thread_cpu_time_supported()
}

pub fn memory_regions(pid: u32) -> io::Result<Vec<MappedRegion>> {
    platform_impl::Platform::memory_regions(pid)
}

pub fn data_size_limit(pid: u32) -> Option<u64> {
    platform_impl::Platform::data_size_limit(pid)
}

#[cfg(not(target_os = "linux"))]
fn unsupported(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{what} is not supported on {}", std::env::consts::OS),
    )
}
