//! Lifecycle event publication
//!
//! Pipelines publish named events (`<pipeline>:started|progress|
//! completed|failed`) to an explicit publish/subscribe registry. Any
//! number of subscribers may attach, per topic or for all topics.
//! Emission is fire-and-forget: each delivery runs in its own task, so a
//! slow subscriber never stalls pipeline execution.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use strata_core::ExecutionId;

/// A lifecycle notification published by a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Event name, e.g. `ingestion:completed`
    pub name: String,

    /// Execution that published the event
    pub execution_id: ExecutionId,

    /// When the event was published
    pub timestamp: DateTime<Utc>,

    /// Pipeline-specific fields
    pub payload: serde_json::Value,
}

impl PipelineEvent {
    /// Create an event stamped now
    pub fn new(
        name: impl Into<String>,
        execution_id: ExecutionId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            execution_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Consumer of pipeline events
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Handle one event. Deliveries run concurrently on detached tasks;
    /// ordering across events is not guaranteed.
    async fn handle(&self, event: PipelineEvent);
}

#[derive(Default)]
struct Registry {
    by_topic: HashMap<String, Vec<Arc<dyn EventSubscriber>>>,
    all_topics: Vec<Arc<dyn EventSubscriber>>,
}

/// Named-topic registry of event subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<Registry>>,
}

impl EventBus {
    /// Create a new bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber to one event name
    pub fn subscribe(&self, topic: impl Into<String>, subscriber: Arc<dyn EventSubscriber>) {
        if let Ok(mut inner) = self.inner.write() {
            inner
                .by_topic
                .entry(topic.into())
                .or_default()
                .push(subscriber);
        }
    }

    /// Attach a subscriber to every event
    pub fn subscribe_all(&self, subscriber: Arc<dyn EventSubscriber>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.all_topics.push(subscriber);
        }
    }

    /// Publish an event to all matching subscribers without waiting for
    /// any of them.
    pub fn emit(&self, event: PipelineEvent) {
        let subscribers: Vec<Arc<dyn EventSubscriber>> = match self.inner.read() {
            Ok(inner) => inner
                .by_topic
                .get(&event.name)
                .into_iter()
                .flatten()
                .chain(inner.all_topics.iter())
                .cloned()
                .collect(),
            Err(_) => return,
        };

        tracing::debug!(
            event = %event.name,
            execution_id = %event.execution_id,
            subscribers = subscribers.len(),
            "Emitting pipeline event"
        );

        for subscriber in subscribers {
            let event = event.clone();
            tokio::spawn(async move {
                subscriber.handle(event).await;
            });
        }
    }
}
