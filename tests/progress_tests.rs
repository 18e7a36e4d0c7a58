//! Tests de reconciliación de pasos sobre la API pública
//!
//! Cubren el recorrido completo de un pipeline de QC:
//! - Paso en ejecución con progreso parcial
//! - Finalización del último paso
//! - Pasos deshabilitados con la política `EnabledOnly`

use qcwatch::progress::{
    reconcile, reconcile_with, EarlierStepPolicy, ExecutionStatus, ProgressMessage, StepState,
};
use qcwatch::qc::QcCategory;

fn parse(raw: &str) -> ProgressMessage {
    ProgressMessage::from_json(raw).expect("valid progress message")
}

#[test]
fn test_first_step_running() {
    let messages =
        vec![parse(r#"{"node":{"nodeType":"CompletenessQC"},"executionStatus":"running","progress":40}"#)];
    let result = reconcile(QcCategory::Flow.steps(), &messages);

    assert_eq!(result.steps[0].state, StepState::Running);
    assert_eq!(result.steps[0].state.code(), 1);
    assert_eq!(result.steps[0].progress, 40.0);
    assert_eq!(result.current_step_index, Some(0));
    assert!(!result.is_complete);
    for step in &result.steps[1..] {
        assert_eq!(step.state, StepState::NotStarted);
    }
}

#[test]
fn test_final_step_end_completes_everything() {
    let messages = vec![
        parse(r#"{"node":{"nodeType":"CompletenessQC"},"executionStatus":"running","progress":10}"#),
        parse(r#"{"node":{"nodeType":"TimelinessQC"},"executionStatus":"running","progress":30}"#),
        parse(r#"{"node":{"nodeType":"AccuracyQC"},"executionStatus":"end"}"#),
    ];
    let result = reconcile(QcCategory::Flow.steps(), &messages);

    assert!(result.is_complete);
    assert_eq!(result.completed_count, 4);
    assert_eq!(result.total, 4);
    for step in &result.steps {
        assert_eq!(step.state, StepState::Completed);
        assert_eq!(step.state.code(), 2);
    }
}

#[test]
fn test_completion_requires_final_step() {
    let messages = vec![parse(
        r#"{"node":{"nodeType":"ConsistencyQC"},"executionStatus":"completed","progress":100}"#,
    )];
    let result = reconcile(QcCategory::Flow.steps(), &messages);

    assert!(!result.is_complete);
    assert_eq!(result.steps[0].state, StepState::Completed);
    assert_eq!(result.steps[1].state, StepState::Completed);
    assert_eq!(result.steps[2].state, StepState::Completed);
    assert_eq!(result.steps[3].state, StepState::NotStarted);
}

#[test]
fn test_disabled_steps_keep_state_when_enabled_only() {
    let messages = vec![
        ProgressMessage::new("TimelinessQC", ExecutionStatus::Running).with_enabled(false),
        ProgressMessage::new("AccuracyQC", ExecutionStatus::Running).with_progress(20.0),
    ];

    let all = reconcile_with(QcCategory::Flow.steps(), &messages, EarlierStepPolicy::AllSteps);
    assert_eq!(all.steps[1].state, StepState::Completed);

    let enabled =
        reconcile_with(QcCategory::Flow.steps(), &messages, EarlierStepPolicy::EnabledOnly);
    assert_eq!(enabled.steps[0].state, StepState::Completed);
    assert_eq!(enabled.steps[1].state, StepState::Running);
    assert_eq!(enabled.steps[2].state, StepState::Completed);
    assert_eq!(enabled.steps[3].state, StepState::Running);
}

#[test]
fn test_failed_step_is_reported() {
    let messages = vec![parse(
        r#"{"node":{"nodeType":"CompletenessQC"},"executionStatus":"failed","progress":12}"#,
    )];
    let result = reconcile(QcCategory::Completeness.steps(), &messages);

    assert!(result.has_failure());
    assert_eq!(result.steps[0].state.code(), 5);
    assert!(!result.is_complete);
}
