//! Pipeline service facade
//!
//! Composes the four staged pipelines behind one service constructed by
//! explicit dependency injection: the dataset store, execution tracker,
//! event bus, action log, connector provider, and row-transform registry
//! are all passed in at construction. There is no process-wide state.

use std::sync::Arc;

use strata_core::{
    DataFormat, DataSource, Dataset, DatasetId, DatasetStore, DeploymentStatus, DeploymentTarget,
    PipelineExecution, TransformRule, ValidationReport, ValidationSchema,
};

use crate::audit::{ActionLog, NoopActionLog};
use crate::connector::ConnectorProvider;
use crate::deploy::{DeployOptions, DeployOutcome, DeploymentPipeline};
use crate::events::EventBus;
use crate::ingest::{IngestOptions, IngestOutcome, IngestionPipeline};
use crate::tracker::ExecutionTracker;
use crate::transform::{
    RowSetTransform, TransformOptions, TransformOutcome, TransformRegistry, TransformationPipeline,
};
use crate::validate::{ValidateOutcome, ValidationEngine};
use crate::{Error, Result};

/// Options for a composite pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineRunOptions {
    /// Raise before deployment when the validation report is invalid.
    /// With the flag unset, deployment proceeds even against invalid
    /// data.
    pub stop_on_validation_error: bool,

    /// Options forwarded to the ingestion pipeline
    pub ingest: IngestOptions,

    /// Options forwarded to the transformation pipeline
    pub transform: TransformOptions,

    /// Options forwarded to the deployment pipeline
    pub deploy: DeployOptions,
}

/// Result of a composite pipeline run
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// The dataset as it stood after transformation
    pub dataset: Dataset,

    /// The validation report
    pub validation_report: ValidationReport,

    /// The deployment status
    pub deployment_status: DeploymentStatus,
}

/// Facade over the four staged pipelines plus read accessors
#[derive(Clone)]
pub struct PipelineService {
    store: DatasetStore,
    tracker: ExecutionTracker,
    events: EventBus,
    ingestion: IngestionPipeline,
    transformation: TransformationPipeline,
    validation: ValidationEngine,
    deployment: DeploymentPipeline,
}

impl PipelineService {
    /// Create a service with default collaborators: a fresh store,
    /// tracker, and event bus, and a no-op action log.
    pub fn new(provider: Arc<dyn ConnectorProvider>) -> Self {
        Self::builder(provider).build()
    }

    /// Create a builder for overriding individual collaborators
    pub fn builder(provider: Arc<dyn ConnectorProvider>) -> PipelineServiceBuilder {
        PipelineServiceBuilder::new(provider)
    }

    /// The event bus, for attaching subscribers
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The dataset store shared by the pipelines
    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Ingest a dataset from a source
    pub async fn ingest(
        &self,
        source: DataSource,
        format: DataFormat,
        options: IngestOptions,
    ) -> Result<IngestOutcome> {
        self.ingestion.ingest(source, format, options).await
    }

    /// Apply an ordered rule chain to a dataset
    pub async fn transform(
        &self,
        dataset: Dataset,
        rules: Vec<TransformRule>,
        options: TransformOptions,
    ) -> Result<TransformOutcome> {
        self.transformation.transform(dataset, rules, options).await
    }

    /// Validate a dataset against a schema
    pub async fn validate(
        &self,
        dataset: &Dataset,
        schema: &ValidationSchema,
    ) -> Result<ValidateOutcome> {
        self.validation.validate(dataset, schema).await
    }

    /// Deploy a dataset to a target
    pub async fn deploy(
        &self,
        dataset: &Dataset,
        target: &DeploymentTarget,
        options: DeployOptions,
    ) -> Result<DeployOutcome> {
        self.deployment.deploy(dataset, target, options).await
    }

    /// Run ingest → transform → validate → deploy strictly in order.
    ///
    /// With `stop_on_validation_error` set, an invalid validation report
    /// raises before deployment runs; otherwise deployment always
    /// proceeds.
    #[tracing::instrument(
        name = "pipeline.execute",
        skip_all,
        fields(source = %source.name, location = %target.location)
    )]
    pub async fn execute_pipeline(
        &self,
        source: DataSource,
        format: DataFormat,
        rules: Vec<TransformRule>,
        schema: ValidationSchema,
        target: DeploymentTarget,
        options: PipelineRunOptions,
    ) -> Result<PipelineRunResult> {
        let ingested = self.ingest(source, format, options.ingest).await?;

        let dataset = self
            .transform(ingested.dataset, rules, options.transform)
            .await?
            .dataset;

        let validated = self.validate(&dataset, &schema).await?;
        if options.stop_on_validation_error && !validated.report.valid {
            return Err(Error::ValidationFailed(format!(
                "dataset {} failed validation with {} errors",
                dataset.id,
                validated.report.errors.len()
            )));
        }

        let deployed = self.deploy(&dataset, &target, options.deploy).await?;

        Ok(PipelineRunResult {
            dataset,
            validation_report: validated.report,
            deployment_status: deployed.status,
        })
    }

    /// Get a dataset by id
    pub fn get_dataset(&self, id: DatasetId) -> Option<Dataset> {
        self.store.get(&id)
    }

    /// List all registered datasets
    pub fn list_datasets(&self) -> Vec<Dataset> {
        self.store.list()
    }

    /// Delete a dataset, returning it
    pub fn delete_dataset(&self, id: DatasetId) -> Result<Dataset> {
        self.store
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("dataset {}", id)))
    }

    /// Snapshots of all in-flight executions. Never contains an
    /// execution whose terminal event has already fired.
    pub async fn get_active_executions(&self) -> Vec<PipelineExecution> {
        self.tracker.active().await
    }
}

/// Builder for constructing a pipeline service with a fluent API
pub struct PipelineServiceBuilder {
    provider: Arc<dyn ConnectorProvider>,
    store: DatasetStore,
    tracker: ExecutionTracker,
    events: EventBus,
    action_log: Arc<dyn ActionLog>,
    transforms: TransformRegistry,
}

impl PipelineServiceBuilder {
    /// Create a builder with default collaborators
    pub fn new(provider: Arc<dyn ConnectorProvider>) -> Self {
        Self {
            provider,
            store: DatasetStore::new(),
            tracker: ExecutionTracker::new(),
            events: EventBus::new(),
            action_log: Arc::new(NoopActionLog),
            transforms: TransformRegistry::new(),
        }
    }

    /// Use an existing dataset store
    pub fn store(mut self, store: DatasetStore) -> Self {
        self.store = store;
        self
    }

    /// Use an existing execution tracker
    pub fn tracker(mut self, tracker: ExecutionTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Use an existing event bus
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Use an action-log collaborator
    pub fn action_log(mut self, action_log: Arc<dyn ActionLog>) -> Self {
        self.action_log = action_log;
        self
    }

    /// Register a row-set transform collaborator.
    ///
    /// Keys are rule type names (`aggregate`, `join`, `pivot`) or, for
    /// custom rules, the rule's own name.
    pub fn transform(mut self, key: impl Into<String>, transform: Arc<dyn RowSetTransform>) -> Self {
        self.transforms.register(key, transform);
        self
    }

    /// Build the service
    pub fn build(self) -> PipelineService {
        let ingestion = IngestionPipeline::new(
            self.store.clone(),
            self.tracker.clone(),
            self.events.clone(),
            self.action_log.clone(),
            self.provider.clone(),
        );
        let transformation = TransformationPipeline::new(
            self.store.clone(),
            self.tracker.clone(),
            self.events.clone(),
            self.transforms.clone(),
        );
        let validation = ValidationEngine::new(self.tracker.clone(), self.events.clone());
        let deployment = DeploymentPipeline::new(
            self.tracker.clone(),
            self.events.clone(),
            self.action_log.clone(),
            self.provider.clone(),
        );

        PipelineService {
            store: self.store,
            tracker: self.tracker,
            events: self.events,
            ingestion,
            transformation,
            validation,
            deployment,
        }
    }
}
