// Common library shared by the worker and API binaries

pub mod config;
pub mod credential;
pub mod errors;
pub mod event;
pub mod payload;
pub mod pipeline;
pub mod provision;
pub mod queue;
pub mod storage;
pub mod telemetry;
pub mod vault;
pub mod warehouse;
