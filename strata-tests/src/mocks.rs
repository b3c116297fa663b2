//! Mock implementations for external collaborators
//!
//! In-memory connectors with per-stage failure injection, a recording
//! action log, and a channel-backed event subscriber.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use strata_core::{DataSource, Dataset, DeploymentTarget, Row};
use strata_runtime::{
    ActionLog, ActionRecord, ConnectorProvider, Error, EventSubscriber, PipelineEvent, Result,
    SourceConnector, TargetConnector,
};

/// In-memory source connector serving a fixed payload.
///
/// `fail_on` injects a failure into the named stage ("connect" or
/// "read").
pub struct MockSource {
    payload: Vec<u8>,
    fail_on: Option<&'static str>,
    pub connect_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
}

impl MockSource {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            fail_on: None,
            connect_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(payload: Vec<u8>, stage: &'static str) -> Self {
        Self {
            fail_on: Some(stage),
            ..Self::new(payload)
        }
    }
}

#[async_trait]
impl SourceConnector for MockSource {
    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some("connect") {
            return Err(Error::Connector("injected connect failure".to_string()));
        }
        Ok(())
    }

    async fn read(&self) -> Result<Vec<u8>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some("read") {
            return Err(Error::Connector("injected read failure".to_string()));
        }
        Ok(self.payload.clone())
    }
}

/// In-memory target connector recording written rows.
///
/// `fail_on` injects a failure into the named stage ("connect",
/// "prepare", or "write").
pub struct MockTarget {
    fail_on: Option<&'static str>,
    pub connect_calls: AtomicUsize,
    pub prepare_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    pub written: Mutex<Vec<Row>>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            connect_calls: AtomicUsize::new(0),
            prepare_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(stage: &'static str) -> Self {
        Self {
            fail_on: Some(stage),
            ..Self::new()
        }
    }

    /// Total rows written across all batches
    pub fn written_count(&self) -> usize {
        self.written.lock().unwrap().len()
    }

    /// True if no connector method was ever invoked
    pub fn untouched(&self) -> bool {
        self.connect_calls.load(Ordering::SeqCst) == 0
            && self.prepare_calls.load(Ordering::SeqCst) == 0
            && self.write_calls.load(Ordering::SeqCst) == 0
    }
}

impl Default for MockTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TargetConnector for MockTarget {
    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some("connect") {
            return Err(Error::Connector("injected connect failure".to_string()));
        }
        Ok(())
    }

    async fn prepare(&self, _dataset: &Dataset, _overwrite: bool) -> Result<()> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some("prepare") {
            return Err(Error::Connector("injected prepare failure".to_string()));
        }
        Ok(())
    }

    async fn write_batch(&self, rows: &[Row]) -> Result<u64> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some("write") {
            return Err(Error::Connector("injected write failure".to_string()));
        }
        self.written.lock().unwrap().extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}

/// Provider resolving every descriptor to fixed mock connectors
pub struct StaticProvider {
    pub source: Arc<MockSource>,
    pub target: Arc<MockTarget>,
}

impl StaticProvider {
    pub fn new(source: MockSource, target: MockTarget) -> Self {
        Self {
            source: Arc::new(source),
            target: Arc::new(target),
        }
    }

    /// Provider serving `payload` with a default target
    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self::new(MockSource::new(payload), MockTarget::new())
    }
}

impl ConnectorProvider for StaticProvider {
    fn source_for(&self, _source: &DataSource) -> Result<Arc<dyn SourceConnector>> {
        Ok(self.source.clone())
    }

    fn target_for(&self, _target: &DeploymentTarget) -> Result<Arc<dyn TargetConnector>> {
        Ok(self.target.clone())
    }
}

/// Action log recording every record, optionally failing each write
pub struct RecordingActionLog {
    fail: bool,
    pub records: Mutex<Vec<ActionRecord>>,
}

impl RecordingActionLog {
    pub fn new() -> Self {
        Self {
            fail: false,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl Default for RecordingActionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionLog for RecordingActionLog {
    async fn record(&self, record: ActionRecord) -> Result<()> {
        if self.fail {
            return Err(Error::Internal("injected action log failure".to_string()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Event subscriber forwarding every event into a channel
pub struct RecordingSubscriber {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl RecordingSubscriber {
    /// Create a subscriber plus the receiving end of its channel
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl EventSubscriber for RecordingSubscriber {
    async fn handle(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Drain every event currently buffered in a recording channel.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
