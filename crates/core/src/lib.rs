//! syncbox-core: Change-detection engine
//!
//! Provides directory snapshots, inode-based diffing, the change poller,
//! and event dispatch to a replication sink.

pub mod config;
pub mod dispatch;
pub mod poller;
pub mod protocol;
pub mod scan;
pub mod sink;
pub mod snapshot;

pub use config::Config;
pub use dispatch::EventDispatcher;
pub use poller::ChangePoller;
pub use scan::{FileRecord, Scanner};
pub use sink::ReplicationSink;
pub use snapshot::{FileEvent, Snapshot};
