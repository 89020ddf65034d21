//! Downstream stage notifications.
//!
//! Invoicing and reporting live outside this engine. They learn that a visit needs
//! their attention through this hook, fired after a commit lands a visit in `Billing`
//! or `Completed`. The transition is already durable when the hook runs; a notifier
//! failure is the consumer's problem, never the workflow's.

use crate::stage::Stage;
use crate::visit::Visit;

/// Sink informed when a visit reaches a stage downstream consumers care about.
pub trait StageNotifier: Send + Sync {
    fn stage_reached(&self, visit: &Visit, stage: Stage);
}

/// Default notifier: structured log lines for downstream pollers.
#[derive(Default, Clone)]
pub struct LogNotifier;

impl StageNotifier for LogNotifier {
    fn stage_reached(&self, visit: &Visit, stage: Stage) {
        tracing::info!(
            visit_id = %visit.visit_id,
            patient_id = %visit.patient_id,
            %stage,
            "visit reached notifiable stage"
        );
    }
}
