pub mod host;
pub mod platform;
pub mod regions;
pub mod stack;
