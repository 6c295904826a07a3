use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::{Item, Job};
use crate::capture::CaptureContext;
use crate::geometry::{RawPoint, Selection};
use crate::selection::{SelectionMachine, SelectionMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SessionPhase {
    AwaitingScreenshot,
    Selecting,
    Submitting,
    Polling,
    ResultsShown,
    Refining,
    Error { message: String },
    /// The poll budget ran out before the job was processed.
    TimedOut,
    Closed,
}

impl SessionPhase {
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionPhase::Closed)
    }

    /// Phases from which a refinement may be sent.
    pub fn accepts_refinement(&self) -> bool {
        matches!(self, SessionPhase::ResultsShown | SessionPhase::TimedOut)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::AwaitingScreenshot => write!(f, "awaiting screenshot"),
            SessionPhase::Selecting => write!(f, "selecting"),
            SessionPhase::Submitting => write!(f, "submitting"),
            SessionPhase::Polling => write!(f, "polling"),
            SessionPhase::ResultsShown => write!(f, "showing results"),
            SessionPhase::Refining => write!(f, "refining"),
            SessionPhase::Error { message } => write!(f, "failed ({message})"),
            SessionPhase::TimedOut => write!(f, "timed out"),
            SessionPhase::Closed => write!(f, "closed"),
        }
    }
}

/// What a rendering layer needs to draw one frame of the session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub mode: Option<SelectionMode>,
    pub overlay_visible: bool,
    pub preview_box: Option<[RawPoint; 2]>,
    pub selection: Option<Selection>,
    pub job: Option<Job>,
    pub items: Vec<Item>,
    /// Last refinement failure. Cleared when a refinement succeeds.
    pub notice: Option<String>,
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub phase: SessionPhase,
    pub machine: SelectionMachine,
    pub capture: Option<CaptureContext>,
    pub selection: Option<Selection>,
    pub job: Option<Job>,
    pub items: Vec<Item>,
    pub notice: Option<String>,
    /// Phase to fall back to when a refinement is rejected by the backend.
    pub resume_phase: Option<SessionPhase>,
    /// Bumped for every poll task; only the current one may apply results.
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::AwaitingScreenshot,
            machine: SelectionMachine::new(),
            capture: None,
            selection: None,
            job: None,
            items: Vec::new(),
            notice: None,
            resume_phase: None,
            generation: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase.clone(),
            mode: self.machine.mode(),
            overlay_visible: self.machine.overlay_visible(),
            preview_box: self.machine.preview_box().map(|(a, b)| [a, b]),
            selection: self.selection,
            job: self.job.clone(),
            items: self.items.clone(),
            notice: self.notice.clone(),
            generation: self.generation,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_awaits_screenshot() {
        let snapshot = SessionState::new().snapshot();
        assert_eq!(snapshot.phase, SessionPhase::AwaitingScreenshot);
        assert!(!snapshot.overlay_visible);
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.generation, 0);
    }

    #[test]
    fn phase_serializes_with_status_tag() {
        let json = serde_json::to_value(SessionPhase::Error {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "boom");

        let json = serde_json::to_value(SessionPhase::ResultsShown).unwrap();
        assert_eq!(json["status"], "resultsShown");
    }

    #[test]
    fn refinement_only_from_results_or_timeout() {
        assert!(SessionPhase::ResultsShown.accepts_refinement());
        assert!(SessionPhase::TimedOut.accepts_refinement());
        assert!(!SessionPhase::Polling.accepts_refinement());
        assert!(!SessionPhase::Refining.accepts_refinement());
        assert!(!SessionPhase::Closed.accepts_refinement());
    }
}
