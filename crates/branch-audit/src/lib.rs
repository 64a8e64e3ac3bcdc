pub mod access;
pub mod audits;
pub mod config;
pub mod error;
pub mod sync;
pub mod telemetry;
