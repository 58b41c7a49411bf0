//! syncbox-transport: Replication sink implementations
//!
//! `HttpSink` speaks the `/v1/file` wire protocol to a remote agent;
//! `FsSink` writes straight to a local destination tree (the agent's write
//! backend, also usable for same-host mirroring).

pub mod http;
pub mod local;

pub use http::HttpSink;
pub use local::FsSink;
