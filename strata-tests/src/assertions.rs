//! Custom assertions for common verification patterns

use strata_core::{PipelineExecution, PipelineStatus, StageStatus};
use strata_runtime::PipelineEvent;

/// Assert an execution's stages match the expected names, in order
pub fn assert_stage_names(execution: &PipelineExecution, expected: &[&str]) {
    let actual: Vec<&str> = execution.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        actual, expected,
        "stage names differ for execution {}",
        execution.id
    );
}

/// Assert every stage of an execution completed
pub fn assert_all_stages_completed(execution: &PipelineExecution) {
    for stage in &execution.stages {
        assert_eq!(
            stage.status,
            StageStatus::Completed,
            "stage '{}' of execution {} is {:?}",
            stage.name,
            execution.id,
            stage.status
        );
    }
}

/// Assert an execution completed, with a completion timestamp
pub fn assert_completed(execution: &PipelineExecution) {
    assert_eq!(execution.status, PipelineStatus::Completed);
    assert!(execution.completed_at.is_some());
    assert!(execution.error.is_none());
}

/// Assert an execution failed and recorded an error
pub fn assert_failed(execution: &PipelineExecution) {
    assert_eq!(execution.status, PipelineStatus::Failed);
    assert!(execution.completed_at.is_some());
    assert!(execution.error.is_some());
}

/// Assert the event list contains an event with the given name
pub fn assert_event_fired(events: &[PipelineEvent], name: &str) {
    assert!(
        events.iter().any(|e| e.name == name),
        "expected event '{}' among {:?}",
        name,
        events.iter().map(|e| e.name.clone()).collect::<Vec<_>>()
    );
}

/// Assert the event list contains no event with the given name
pub fn assert_event_not_fired(events: &[PipelineEvent], name: &str) {
    assert!(
        events.iter().all(|e| e.name != name),
        "unexpected event '{}'",
        name
    );
}

/// Count events with the given name
pub fn count_events(events: &[PipelineEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name == name).count()
}
