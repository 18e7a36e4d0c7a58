//! Folds a task's message log into step-level view state.
//!
//! The fold is pure: same descriptors and same messages always give the
//! same [`Reconciliation`]. Views recompute it from scratch on every new
//! message instead of patching previous output.

use serde::{Deserialize, Serialize};

use super::message::{ExecutionStatus, ProgressMessage};
use super::steps::{StepDescriptor, StepState, StepStatus};

/// Which steps the "a later step started, so earlier ones are done" pass
/// is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlierStepPolicy {
    /// Every step before the current one is forced to completed
    #[default]
    AllSteps,
    /// Steps the backend reported as `enabled = false` keep their state
    EnabledOnly,
}

impl EarlierStepPolicy {
    pub fn applies_to(self, step: &StepStatus) -> bool {
        match self {
            Self::AllSteps => true,
            Self::EnabledOnly => !step.is_disabled(),
        }
    }
}

/// Derived view state for one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub steps: Vec<StepStatus>,
    /// Step matched by the last recognised message
    pub current_step_index: Option<usize>,
    pub is_complete: bool,
    pub completed_count: usize,
    pub total: usize,
}

impl Reconciliation {
    pub fn current_step(&self) -> Option<&StepStatus> {
        self.current_step_index.and_then(|i| self.steps.get(i))
    }

    pub fn has_failure(&self) -> bool {
        self.steps.iter().any(|s| s.state == StepState::Failed)
    }

    /// Mean of the per-step progress values, 0-100
    pub fn overall_progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.steps.iter().map(|s| s.progress).sum();
        sum / self.steps.len() as f64
    }
}

/// Reconcile with the default [`EarlierStepPolicy::AllSteps`] policy
pub fn reconcile(steps: &[StepDescriptor], messages: &[ProgressMessage]) -> Reconciliation {
    reconcile_with(steps, messages, EarlierStepPolicy::default())
}

pub fn reconcile_with(
    steps: &[StepDescriptor],
    messages: &[ProgressMessage],
    policy: EarlierStepPolicy,
) -> Reconciliation {
    let mut statuses: Vec<StepStatus> = steps.iter().copied().map(StepStatus::new).collect();
    let mut current: Option<usize> = None;
    // furthest step that has begun, regardless of arrival order
    let mut furthest: Option<usize> = None;

    for message in messages {
        let Some(index) = find_step(steps, message) else {
            continue;
        };
        apply_message(&mut statuses[index], message);
        current = Some(index);
        furthest = furthest.max(Some(index));
    }

    if let Some(furthest) = furthest {
        complete_earlier_steps(&mut statuses, furthest, |s| policy.applies_to(s));
    }

    // Only the very last message decides completion, and only when it
    // belongs to the final step.
    let is_complete = match messages.last() {
        Some(last) => {
            last.execution_status.is_success()
                && !steps.is_empty()
                && find_step(steps, last) == Some(steps.len() - 1)
        }
        None => false,
    };

    let completed_count = statuses
        .iter()
        .filter(|s| s.state == StepState::Completed)
        .count();

    Reconciliation {
        total: statuses.len(),
        steps: statuses,
        current_step_index: current,
        is_complete,
        completed_count,
    }
}

/// Force every step strictly before `last_seen` to completed, skipping the
/// ones `applies` rejects.
pub fn complete_earlier_steps<F>(steps: &mut [StepStatus], last_seen: usize, applies: F)
where
    F: Fn(&StepStatus) -> bool,
{
    for step in steps.iter_mut().take(last_seen) {
        if applies(step) {
            mark_completed(step);
        }
    }
}

fn find_step(steps: &[StepDescriptor], message: &ProgressMessage) -> Option<usize> {
    let node_type = message.node_type()?;
    steps.iter().position(|d| d.node_type == node_type)
}

fn apply_message(step: &mut StepStatus, message: &ProgressMessage) {
    step.completed_quantity = message.completed_quantity.unwrap_or(0);
    step.total_quantity = message.table_quantity.unwrap_or(0);
    step.table = message.table.clone();
    step.table_name = message.table_name.clone();
    if message.node.enabled.is_some() {
        step.enabled = message.node.enabled;
    }
    // a completed step stays at 100
    if step.state != StepState::Completed {
        if let Some(progress) = message.progress {
            step.progress = progress.clamp(0.0, 100.0);
        }
    }

    match message.execution_status {
        // completed is sticky
        ExecutionStatus::Running if step.state != StepState::Completed => {
            step.state = StepState::Running;
        }
        ExecutionStatus::Running => {}
        ExecutionStatus::Completed | ExecutionStatus::End => mark_completed(step),
        ExecutionStatus::Error | ExecutionStatus::Failed => step.state = StepState::Failed,
        ExecutionStatus::Unknown => {}
    }
}

fn mark_completed(step: &mut StepStatus) {
    step.state = StepState::Completed;
    step.progress = 100.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOW: [StepDescriptor; 4] = [
        StepDescriptor::new(0, "Completeness", "CompletenessQC", ""),
        StepDescriptor::new(1, "Timeliness", "TimelinessQC", ""),
        StepDescriptor::new(2, "Consistency", "ConsistencyQC", ""),
        StepDescriptor::new(3, "Accuracy", "AccuracyQC", ""),
    ];

    fn msg(node_type: &str, status: ExecutionStatus) -> ProgressMessage {
        ProgressMessage::new(node_type, status)
    }

    #[test]
    fn test_empty_log() {
        let r = reconcile(&FLOW, &[]);
        assert!(r.steps.iter().all(|s| s.state == StepState::NotStarted));
        assert_eq!(r.current_step_index, None);
        assert!(!r.is_complete);
        assert_eq!(r.completed_count, 0);
        assert_eq!(r.total, 4);
    }

    #[test]
    fn test_single_running_message() {
        let messages = vec![msg("CompletenessQC", ExecutionStatus::Running).with_progress(40.0)];
        let r = reconcile(&FLOW, &messages);

        assert_eq!(r.steps[0].state, StepState::Running);
        assert_eq!(r.steps[0].progress, 40.0);
        assert_eq!(r.current_step_index, Some(0));
        assert!(!r.is_complete);
    }

    #[test]
    fn test_final_step_end_completes_everything() {
        let messages = vec![
            msg("CompletenessQC", ExecutionStatus::Running),
            msg("ConsistencyQC", ExecutionStatus::Running),
            msg("AccuracyQC", ExecutionStatus::Running),
            msg("AccuracyQC", ExecutionStatus::End),
        ];
        let r = reconcile(&FLOW, &messages);

        assert!(r.steps.iter().all(|s| s.state == StepState::Completed));
        assert_eq!(r.completed_count, 4);
        assert_eq!(r.current_step_index, Some(3));
        assert!(r.is_complete);
    }

    #[test]
    fn test_later_step_overrides_earlier_failure() {
        let messages = vec![
            msg("CompletenessQC", ExecutionStatus::Failed),
            msg("TimelinessQC", ExecutionStatus::Running),
        ];
        let r = reconcile(&FLOW, &messages);
        assert_eq!(r.steps[0].state, StepState::Completed);
        assert_eq!(r.steps[1].state, StepState::Running);
        assert_eq!(r.steps[2].state, StepState::NotStarted);
    }

    #[test]
    fn test_completed_is_not_reverted() {
        let messages = vec![
            msg("CompletenessQC", ExecutionStatus::Completed),
            msg("CompletenessQC", ExecutionStatus::Running).with_progress(10.0),
        ];
        let r = reconcile(&FLOW, &messages);
        assert_eq!(r.steps[0].state, StepState::Completed);
        assert_eq!(r.steps[0].progress, 100.0);
    }

    #[test]
    fn test_late_message_for_earlier_step_keeps_it_completed() {
        let in_order = vec![
            msg("CompletenessQC", ExecutionStatus::Running),
            msg("TimelinessQC", ExecutionStatus::Running),
        ];
        let before = reconcile(&FLOW, &in_order);
        assert_eq!(before.steps[0].state, StepState::Completed);

        let mut late = in_order.clone();
        late.push(msg("CompletenessQC", ExecutionStatus::Running).with_progress(30.0));
        let after = reconcile(&FLOW, &late);

        assert_eq!(after.steps[0].state, StepState::Completed);
        assert_eq!(after.steps[0].progress, 100.0);
        assert_eq!(after.steps[1].state, StepState::Running);
        assert_eq!(after.current_step_index, Some(0));
        assert_eq!(after.completed_count, before.completed_count);
    }

    #[test]
    fn test_terminal_message_twice_is_idempotent() {
        let once = vec![
            msg("CompletenessQC", ExecutionStatus::Running),
            msg("AccuracyQC", ExecutionStatus::End).with_quantities(8, 8),
        ];
        let mut twice = once.clone();
        twice.push(msg("AccuracyQC", ExecutionStatus::End).with_quantities(8, 8));

        assert_eq!(reconcile(&FLOW, &once), reconcile(&FLOW, &twice));
    }

    #[test]
    fn test_deterministic() {
        let messages = vec![
            msg("TimelinessQC", ExecutionStatus::Running).with_quantities(3, 9),
            msg("Unrelated", ExecutionStatus::Completed),
            msg("ConsistencyQC", ExecutionStatus::Error),
        ];
        assert_eq!(reconcile(&FLOW, &messages), reconcile(&FLOW, &messages));
    }

    #[test]
    fn test_unmatched_last_message_is_not_completion() {
        let messages = vec![
            msg("AccuracyQC", ExecutionStatus::End),
            msg("SomethingElse", ExecutionStatus::End),
        ];
        let r = reconcile(&FLOW, &messages);
        assert!(!r.is_complete);
        assert_eq!(r.current_step_index, Some(3));
    }

    #[test]
    fn test_success_on_non_final_step_is_not_completion() {
        let messages = vec![msg("ConsistencyQC", ExecutionStatus::Completed)];
        let r = reconcile(&FLOW, &messages);
        assert!(!r.is_complete);
        assert_eq!(r.completed_count, 3);
    }

    #[test]
    fn test_quantities_are_overwritten() {
        let mut m = msg("CompletenessQC", ExecutionStatus::Running).with_quantities(2, 10);
        m.table_name = Some("lab_result".to_string());
        let later = msg("CompletenessQC", ExecutionStatus::Running).with_quantities(5, 10);
        let r = reconcile(&FLOW, &[m, later]);

        assert_eq!(r.steps[0].completed_quantity, 5);
        assert_eq!(r.steps[0].total_quantity, 10);
        assert_eq!(r.steps[0].table_name, None);
    }

    #[test]
    fn test_enabled_only_policy_skips_disabled_steps() {
        let messages = vec![
            msg("TimelinessQC", ExecutionStatus::Running).with_enabled(false),
            msg("ConsistencyQC", ExecutionStatus::Running),
        ];

        let all = reconcile_with(&FLOW, &messages, EarlierStepPolicy::AllSteps);
        assert_eq!(all.steps[1].state, StepState::Completed);

        let enabled_only = reconcile_with(&FLOW, &messages, EarlierStepPolicy::EnabledOnly);
        assert_eq!(enabled_only.steps[0].state, StepState::Completed);
        assert_eq!(enabled_only.steps[1].state, StepState::Running);
    }

    #[test]
    fn test_complete_earlier_steps_with_predicate() {
        let mut steps: Vec<StepStatus> = FLOW.iter().copied().map(StepStatus::new).collect();
        complete_earlier_steps(&mut steps, 3, |s| s.descriptor.step_index != 1);

        assert_eq!(steps[0].state, StepState::Completed);
        assert_eq!(steps[1].state, StepState::NotStarted);
        assert_eq!(steps[2].state, StepState::Completed);
        assert_eq!(steps[3].state, StepState::NotStarted);
    }

    #[test]
    fn test_overall_progress() {
        let messages = vec![msg("TimelinessQC", ExecutionStatus::Running).with_progress(50.0)];
        let r = reconcile(&FLOW, &messages);
        // 100 + 50 + 0 + 0
        assert_eq!(r.overall_progress(), 37.5);
    }
}
