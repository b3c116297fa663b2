//! Shared test utilities for Strata crates
//!
//! This crate provides:
//! - **Fixtures**: pre-built test data (rows, payloads, datasets)
//! - **Builders**: shorthand constructors for rules and schemas
//! - **Mocks**: in-memory connectors, action logs, and event subscribers
//!   with failure injection
//! - **Assertions**: custom assertions for common verification patterns
//!
//! # Example
//!
//! ```ignore
//! use strata_tests::{builders, fixtures, mocks};
//!
//! #[tokio::test]
//! async fn test_ingest() {
//!     let (provider, _target) = mocks::provider_with_payload(fixtures::json_payload());
//!     let service = PipelineService::new(provider);
//!     let outcome = service
//!         .ingest(fixtures::inline_source(), DataFormat::Json, Default::default())
//!         .await
//!         .unwrap();
//!     assert_eq!(outcome.dataset.metadata.row_count, 3);
//! }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use mocks::{MockSource, MockTarget, RecordingActionLog, RecordingSubscriber, StaticProvider};
