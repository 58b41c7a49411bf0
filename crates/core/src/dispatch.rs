//! Routing detected events to a replication sink

use std::path::Path;
use std::sync::Arc;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::sink::ReplicationSink;
use crate::snapshot::FileEvent;

/// Consumes filesystem events and invokes the matching sink operation,
/// with all paths rewritten relative to the configured source root.
pub struct EventDispatcher {
    sink: Arc<dyn ReplicationSink>,
    source_root: String,
}

impl EventDispatcher {
    /// Create a dispatcher for the given sink and source root.
    ///
    /// A leading `./` on the root is dropped so configured and walked paths
    /// agree on the prefix to strip.
    #[must_use]
    pub fn new(sink: Arc<dyn ReplicationSink>, source_root: &str) -> Self {
        let source_root = source_root
            .strip_prefix("./")
            .unwrap_or(source_root)
            .to_string();
        Self { sink, source_root }
    }

    /// Strip the source root from a walked path, leaving the
    /// destination-relative remainder ("/sub/a.txt"). Anything but exactly
    /// one occurrence of the root is malformed.
    fn strip_source_root(&self, path: &Path) -> Result<String> {
        let path = path.to_string_lossy();
        let parts: Vec<&str> = path.split(self.source_root.as_str()).collect();
        if parts.len() != 2 {
            return Err(eyre!("invalid trimmed path produced from {path}"));
        }
        Ok(parts[1].to_string())
    }

    /// Route one event to its sink operation.
    ///
    /// # Errors
    /// Returns an error for a malformed path (the sink is never invoked) or
    /// a failed sink call. Either way the event is spent; there is no retry.
    pub async fn dispatch(&self, event: &FileEvent) -> Result<()> {
        match event {
            FileEvent::Created { record } => {
                let path = self.strip_source_root(&record.path)?;
                self.sink
                    .create(&path, &record.contents, record.is_directory)
                    .await
            }
            FileEvent::Renamed {
                previous_path,
                record,
            } => {
                let path = self.strip_source_root(&record.path)?;
                let previous = self.strip_source_root(previous_path)?;
                self.sink.rename(&previous, &path).await
            }
            FileEvent::Modified { record } => {
                let path = self.strip_source_root(&record.path)?;
                self.sink.update(&path, &record.contents).await
            }
            FileEvent::Deleted { path } => {
                let path = self.strip_source_root(path)?;
                self.sink.delete(&path).await
            }
        }
    }

    /// Consume events from the channel until it closes or cancellation is
    /// requested. Per-event failures are logged and dropped; the in-flight
    /// event finishes before cancellation is observed.
    pub async fn run(self, mut events: mpsc::Receiver<FileEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("dispatch loop cancelled");
                    break;
                }
                maybe = events.recv() => {
                    let Some(event) = maybe else {
                        debug!("event channel closed, stopping dispatch loop");
                        break;
                    };
                    match self.dispatch(&event).await {
                        Ok(()) => {
                            info!("replicated {} {}", event.kind(), event.path().display());
                        }
                        Err(err) => {
                            error!(
                                "replicating {} {}: {err}",
                                event.kind(),
                                event.path().display()
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::FileRecord;
    use async_trait::async_trait;
    use bytes::Bytes;
    use color_eyre::eyre::eyre;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum SinkCall {
        Create {
            path: String,
            data: Vec<u8>,
            is_directory: bool,
        },
        Delete {
            path: String,
        },
        Rename {
            previous_path: String,
            path: String,
        },
        Update {
            path: String,
            data: Vec<u8>,
        },
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<SinkCall>>,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplicationSink for RecordingSink {
        async fn create(&self, path: &str, data: &[u8], is_directory: bool) -> Result<()> {
            self.calls.lock().unwrap().push(SinkCall::Create {
                path: path.to_string(),
                data: data.to_vec(),
                is_directory,
            });
            Ok(())
        }

        async fn delete(&self, path: &str) -> Result<()> {
            self.calls.lock().unwrap().push(SinkCall::Delete {
                path: path.to_string(),
            });
            Ok(())
        }

        async fn rename(&self, previous_path: &str, path: &str) -> Result<()> {
            self.calls.lock().unwrap().push(SinkCall::Rename {
                previous_path: previous_path.to_string(),
                path: path.to_string(),
            });
            Ok(())
        }

        async fn update(&self, path: &str, data: &[u8]) -> Result<()> {
            self.calls.lock().unwrap().push(SinkCall::Update {
                path: path.to_string(),
                data: data.to_vec(),
            });
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ReplicationSink for FailingSink {
        async fn create(&self, _: &str, _: &[u8], _: bool) -> Result<()> {
            Err(eyre!("sink down"))
        }
        async fn delete(&self, _: &str) -> Result<()> {
            Err(eyre!("sink down"))
        }
        async fn rename(&self, _: &str, _: &str) -> Result<()> {
            Err(eyre!("sink down"))
        }
        async fn update(&self, _: &str, _: &[u8]) -> Result<()> {
            Err(eyre!("sink down"))
        }
    }

    fn make_record(path: &str, contents: &[u8], is_directory: bool) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            inode: 1,
            is_directory,
            contents: Bytes::copy_from_slice(contents),
        }
    }

    #[tokio::test]
    async fn test_created_event_strips_source_root() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(sink.clone(), "/srv");

        let event = FileEvent::Created {
            record: make_record("/srv/a.txt", b"hi", false),
        };
        dispatcher.dispatch(&event).await.unwrap();

        assert_eq!(
            sink.calls(),
            vec![SinkCall::Create {
                path: "/a.txt".to_string(),
                data: b"hi".to_vec(),
                is_directory: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_renamed_event_strips_both_paths() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(sink.clone(), "/srv");

        let event = FileEvent::Renamed {
            previous_path: PathBuf::from("/srv/old.txt"),
            record: make_record("/srv/sub/new.txt", b"x", false),
        };
        dispatcher.dispatch(&event).await.unwrap();

        assert_eq!(
            sink.calls(),
            vec![SinkCall::Rename {
                previous_path: "/old.txt".to_string(),
                path: "/sub/new.txt".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_modified_and_deleted_events() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(sink.clone(), "/srv");

        dispatcher
            .dispatch(&FileEvent::Modified {
                record: make_record("/srv/a.txt", b"new", false),
            })
            .await
            .unwrap();
        dispatcher
            .dispatch(&FileEvent::Deleted {
                path: PathBuf::from("/srv/b.txt"),
            })
            .await
            .unwrap();

        assert_eq!(
            sink.calls(),
            vec![
                SinkCall::Update {
                    path: "/a.txt".to_string(),
                    data: b"new".to_vec(),
                },
                SinkCall::Delete {
                    path: "/b.txt".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_directory_create_passes_flag() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(sink.clone(), "/srv");

        dispatcher
            .dispatch(&FileEvent::Created {
                record: make_record("/srv/sub", b"", true),
            })
            .await
            .unwrap();

        assert_eq!(
            sink.calls(),
            vec![SinkCall::Create {
                path: "/sub".to_string(),
                data: Vec::new(),
                is_directory: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_path_outside_source_root_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(sink.clone(), "/srv");

        let event = FileEvent::Created {
            record: make_record("/elsewhere/a.txt", b"hi", false),
        };
        let err = dispatcher.dispatch(&event).await.unwrap_err();

        assert!(err.to_string().contains("invalid trimmed path"));
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dot_slash_root_is_normalized() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(sink.clone(), "./data");

        dispatcher
            .dispatch(&FileEvent::Created {
                record: make_record("./data/a.txt", b"hi", false),
            })
            .await
            .unwrap();

        assert_eq!(
            sink.calls(),
            vec![SinkCall::Create {
                path: "/a.txt".to_string(),
                data: b"hi".to_vec(),
                is_directory: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_sink_failure_propagates() {
        let dispatcher = EventDispatcher::new(Arc::new(FailingSink), "/srv");

        let event = FileEvent::Deleted {
            path: PathBuf::from("/srv/a.txt"),
        };
        assert!(dispatcher.dispatch(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_run_consumes_channel_and_survives_failures() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(sink.clone(), "/srv");

        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(dispatcher.run(rx, cancel.clone()));

        // A malformed event is dropped, later events still flow.
        tx.send(FileEvent::Deleted {
            path: PathBuf::from("/elsewhere/bad.txt"),
        })
        .await
        .unwrap();
        tx.send(FileEvent::Deleted {
            path: PathBuf::from("/srv/good.txt"),
        })
        .await
        .unwrap();
        drop(tx);

        handle.await.unwrap();
        assert_eq!(
            sink.calls(),
            vec![SinkCall::Delete {
                path: "/good.txt".to_string(),
            }]
        );
    }
}
