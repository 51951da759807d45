use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info};

use crate::types::PartialRecord;

/// Which screen of the capture workflow is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    Idle,
    CapturingPhoto,
    Confirming,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStep::Idle => f.write_str("idle"),
            WorkflowStep::CapturingPhoto => f.write_str("capturing_photo"),
            WorkflowStep::Confirming => f.write_str("confirming"),
        }
    }
}

/// Workflow state; the in-progress record lives in the non-idle variants
#[derive(Debug, Clone, Default, PartialEq)]
pub enum WorkflowState {
    #[default]
    Idle,
    CapturingPhoto { record: PartialRecord },
    Confirming { record: PartialRecord },
}

impl WorkflowState {
    pub fn step(&self) -> WorkflowStep {
        match self {
            WorkflowState::Idle => WorkflowStep::Idle,
            WorkflowState::CapturingPhoto { .. } => WorkflowStep::CapturingPhoto,
            WorkflowState::Confirming { .. } => WorkflowStep::Confirming,
        }
    }

    pub fn record(&self) -> Option<&PartialRecord> {
        match self {
            WorkflowState::Idle => None,
            WorkflowState::CapturingPhoto { record } | WorkflowState::Confirming { record } => {
                Some(record)
            }
        }
    }
}

/// Events driving the workflow
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// Location and address are known for a new cycle
    Located { record: PartialRecord },
    PhotoCaptured { photo_data_url: String },
    Cancel,
    Retake,
    /// The record was persisted
    Saved,
    Reset,
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Located { .. } => "located",
            WorkflowEvent::PhotoCaptured { .. } => "photo_captured",
            WorkflowEvent::Cancel => "cancel",
            WorkflowEvent::Retake => "retake",
            WorkflowEvent::Saved => "saved",
            WorkflowEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateTransitionRecord {
    pub from: WorkflowStep,
    pub to: WorkflowStep,
    pub event: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Pure attendance state machine
///
/// `handle` is total over every (state, event) pair. Pairs without a
/// transition leave the state untouched and return `false`.
#[derive(Debug, Default)]
pub struct WorkflowMachine {
    state: WorkflowState,
    history: Vec<StateTransitionRecord>,
}

impl WorkflowMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn step(&self) -> WorkflowStep {
        self.state.step()
    }

    pub fn transitions(&self) -> &[StateTransitionRecord] {
        &self.history
    }

    pub fn handle(&mut self, event: WorkflowEvent) -> bool {
        let from = self.state.step();
        let event_name = event.name();

        let next = match (&mut self.state, event) {
            (WorkflowState::Idle, WorkflowEvent::Located { record }) => {
                Some(WorkflowState::CapturingPhoto { record })
            }

            (WorkflowState::CapturingPhoto { record }, WorkflowEvent::PhotoCaptured { photo_data_url }) => {
                let mut record = std::mem::take(record);
                record.photo_data_url = Some(photo_data_url);
                Some(WorkflowState::Confirming { record })
            }

            (WorkflowState::CapturingPhoto { .. }, WorkflowEvent::Cancel) => Some(WorkflowState::Idle),

            (WorkflowState::Confirming { record }, WorkflowEvent::Retake) => {
                let mut record = std::mem::take(record);
                record.photo_data_url = None;
                Some(WorkflowState::CapturingPhoto { record })
            }

            (WorkflowState::Confirming { .. }, WorkflowEvent::Saved) => Some(WorkflowState::Idle),

            (_, WorkflowEvent::Reset) => Some(WorkflowState::Idle),

            _ => None,
        };

        match next {
            Some(state) => {
                self.state = state;
                self.record_transition(from, event_name);
                true
            }
            None => {
                debug!(state = %from, event = event_name, "Ignoring event not valid in current state");
                false
            }
        }
    }

    fn record_transition(&mut self, from: WorkflowStep, event: &'static str) {
        let record = StateTransitionRecord {
            from,
            to: self.state.step(),
            event,
            timestamp: Utc::now(),
        };

        info!(
            from_state = %record.from,
            to_state = %record.to,
            event = record.event,
            "Attendance workflow state transition"
        );

        self.history.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinates;

    fn located() -> WorkflowEvent {
        WorkflowEvent::Located {
            record: PartialRecord::located(
                "a@b.com",
                Utc::now(),
                Coordinates::new(12.9716, 77.5946),
                "MG Road".to_string(),
            ),
        }
    }

    fn photo() -> WorkflowEvent {
        WorkflowEvent::PhotoCaptured {
            photo_data_url: "data:image/jpeg;base64,AAAA".to_string(),
        }
    }

    #[test]
    fn test_basic_workflow() {
        let mut machine = WorkflowMachine::new();
        assert_eq!(machine.step(), WorkflowStep::Idle);

        assert!(machine.handle(located()));
        assert_eq!(machine.step(), WorkflowStep::CapturingPhoto);

        assert!(machine.handle(photo()));
        assert_eq!(machine.step(), WorkflowStep::Confirming);
        let record = machine.state().record().unwrap();
        assert!(record.photo_data_url.is_some());
        assert!(record.promote().is_ok());

        assert!(machine.handle(WorkflowEvent::Saved));
        assert_eq!(machine.state(), &WorkflowState::Idle);
        assert_eq!(machine.transitions().len(), 3);
    }

    #[test]
    fn test_retake_clears_only_photo() {
        let mut machine = WorkflowMachine::new();
        machine.handle(located());
        let before = machine.state().record().cloned().unwrap();
        machine.handle(photo());

        assert!(machine.handle(WorkflowEvent::Retake));
        assert_eq!(machine.step(), WorkflowStep::CapturingPhoto);
        let after = machine.state().record().unwrap();
        assert_eq!(after, &before);
        assert!(after.photo_data_url.is_none());
    }

    #[test]
    fn test_cancel_discards_record() {
        let mut machine = WorkflowMachine::new();
        machine.handle(located());
        assert!(machine.handle(WorkflowEvent::Cancel));
        assert_eq!(machine.state(), &WorkflowState::Idle);
        assert!(machine.state().record().is_none());
    }

    #[test]
    fn test_illegal_events_are_ignored() {
        let mut machine = WorkflowMachine::new();
        assert!(!machine.handle(photo()));
        assert!(!machine.handle(WorkflowEvent::Cancel));
        assert!(!machine.handle(WorkflowEvent::Retake));
        assert!(!machine.handle(WorkflowEvent::Saved));
        assert_eq!(machine.step(), WorkflowStep::Idle);

        machine.handle(located());
        assert!(!machine.handle(located()));
        assert!(!machine.handle(WorkflowEvent::Saved));
        assert!(!machine.handle(WorkflowEvent::Retake));
        assert_eq!(machine.step(), WorkflowStep::CapturingPhoto);

        machine.handle(photo());
        assert!(!machine.handle(photo()));
        assert!(!machine.handle(WorkflowEvent::Cancel));
        assert_eq!(machine.step(), WorkflowStep::Confirming);
        assert_eq!(machine.transitions().len(), 2);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut machine = WorkflowMachine::new();
        assert!(machine.handle(WorkflowEvent::Reset));
        machine.handle(located());
        machine.handle(photo());
        assert!(machine.handle(WorkflowEvent::Reset));
        assert_eq!(machine.state(), &WorkflowState::Idle);
    }
}
