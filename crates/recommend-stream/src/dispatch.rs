//! Session state and the pure transition functions that fold frames into it.

use crate::errors::SessionFailure;
use crate::frame::{Frame, FrameKind};

/// Lifecycle state of a streaming session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Not started.
    #[default]
    Idle,
    /// Request open; zero or more deltas applied.
    Streaming,
    /// `done` frame applied; text is final.
    Completed,
    /// Terminal failure.
    Failed(SessionFailure),
    /// Cancelled by the caller before a terminal frame.
    Cancelled,
}

impl SessionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// `Completed`, `Failed`, and `Cancelled` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

/// Read-only view of a session: state plus accumulated text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Ordered concatenation of every applied delta payload.
    pub text: String,
}

impl SessionSnapshot {
    /// Fresh snapshot for a run that has just been opened.
    pub fn streaming() -> Self {
        Self {
            state: SessionState::Streaming,
            text: String::new(),
        }
    }

    pub(crate) fn failed(failure: SessionFailure) -> Self {
        Self {
            state: SessionState::Failed(failure),
            text: String::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Human-readable failure reason. Populated for `Failed` and `Cancelled`.
    pub fn error_reason(&self) -> Option<String> {
        match &self.state {
            SessionState::Failed(failure) => Some(failure.to_string()),
            SessionState::Cancelled => Some("cancelled".to_string()),
            SessionState::Idle | SessionState::Streaming | SessionState::Completed => None,
        }
    }
}

/// Folds one frame into the snapshot. Frames are ignored unless the session
/// is `Streaming`.
pub fn apply(frame: Frame, mut snapshot: SessionSnapshot) -> SessionSnapshot {
    if !snapshot.state.is_streaming() {
        return snapshot;
    }
    match frame.kind {
        FrameKind::Delta => snapshot.text.push_str(&frame.payload),
        FrameKind::Done => snapshot.state = SessionState::Completed,
        FrameKind::Error => {
            snapshot.state = SessionState::Failed(SessionFailure::Protocol {
                message: frame.payload,
            })
        }
    }
    snapshot
}

/// Moves a streaming session to `Failed(failure)`; other states are kept.
pub fn fail(failure: SessionFailure, mut snapshot: SessionSnapshot) -> SessionSnapshot {
    if snapshot.state.is_streaming() {
        snapshot.state = SessionState::Failed(failure);
    }
    snapshot
}

/// Moves any non-terminal session to `Cancelled`.
pub fn cancel(mut snapshot: SessionSnapshot) -> SessionSnapshot {
    if !snapshot.is_terminal() {
        snapshot.state = SessionState::Cancelled;
    }
    snapshot
}
