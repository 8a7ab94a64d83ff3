//! Point-in-time runtime introspection of a process, assembled into one JSON
//! document with `runtime`, `thread`, `memory` and `class-loading` sections.

pub mod builder;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod provider;
pub mod sections;
pub mod system;
