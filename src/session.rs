//! Session state container and its transitions.
//!
//! All UI-visible state lives in [`SessionState`]. Actions are started with
//! [`SessionState::begin`], their results folded in with
//! [`SessionState::apply`], and the busy slot released with
//! [`SessionState::finish`]. None of these perform I/O, so presentation layers
//! and tests can drive them directly.

use crate::model::{Artifact, HealthStatus, Mode};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Startup,
    Convert,
    Load,
    Download,
}

impl ActionKind {
    fn slot(self) -> usize {
        match self {
            ActionKind::Startup => 0,
            ActionKind::Convert => 1,
            ActionKind::Load => 2,
            ActionKind::Download => 3,
        }
    }

    /// Startup runs beside user actions and never holds the busy slot.
    pub fn holds_busy(self) -> bool {
        !matches!(self, ActionKind::Startup)
    }
}

/// Identifies one invocation of an action. Results carrying an older
/// generation than the latest invocation of the same kind are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTicket {
    pub kind: ActionKind,
    pub generation: u64,
}

/// Everything the orchestrator needs to run an action, captured at start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    Health,
    Convert { raw_input: String, mode: Mode },
    Load { id: String },
    Download { artifact_id: String },
}

#[derive(Debug, Clone)]
pub struct Action {
    pub ticket: ActionTicket,
    pub request: ActionRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("{0:?} is still in progress")]
    Busy(ActionKind),
    #[error("raw input is empty")]
    EmptyInput,
    #[error("artifact id is empty")]
    EmptyArtifactId,
    #[error("no artifact loaded")]
    NoArtifact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub url: String,
    pub path: Option<PathBuf>,
}

/// Result of one step of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reachable(HealthStatus),
    /// Convert accepted; the follow-up fetch is still pending.
    ConvertAccepted { id: String },
    ArtifactFetched(Artifact),
    Downloaded(DownloadRecord),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub reachable: bool,
    pub brand: String,
    pub status: String,
    pub version: Option<String>,
}

impl Connection {
    pub fn label(&self) -> String {
        match (self.reachable, self.brand.is_empty()) {
            (false, _) => "NOT CONNECTED".to_string(),
            (true, true) => "OK".to_string(),
            (true, false) => format!("OK ({})", self.brand),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub connection: Connection,
    pub mode: Mode,
    pub raw_input: String,
    pub artifact_id: String,
    pub artifact: Option<Artifact>,
    pub busy: bool,
    pub error: String,
    pub last_download: Option<DownloadRecord>,
    in_flight: Option<ActionTicket>,
    generations: [u64; 4],
}

impl SessionState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn can_convert(&self) -> bool {
        !self.busy && !self.raw_input.trim().is_empty()
    }

    pub fn can_load(&self) -> bool {
        !self.busy && !self.artifact_id.trim().is_empty()
    }

    /// The download control exists only once an artifact with an id is loaded.
    pub fn download_available(&self) -> bool {
        self.artifact.as_ref().is_some_and(|a| !a.id.is_empty())
    }

    pub fn can_download(&self) -> bool {
        !self.busy && self.download_available()
    }

    pub fn is_current(&self, ticket: &ActionTicket) -> bool {
        self.generations[ticket.kind.slot()] == ticket.generation
    }

    /// Start an action: check its precondition, clear the error and take the busy slot.
    pub fn begin(&mut self, kind: ActionKind) -> Result<Action, Rejected> {
        if kind.holds_busy() {
            if let Some(active) = self.in_flight {
                return Err(Rejected::Busy(active.kind));
            }
        }

        let request = match kind {
            ActionKind::Startup => ActionRequest::Health,
            ActionKind::Convert => {
                if self.raw_input.trim().is_empty() {
                    return Err(Rejected::EmptyInput);
                }
                ActionRequest::Convert {
                    raw_input: self.raw_input.clone(),
                    mode: self.mode,
                }
            }
            ActionKind::Load => {
                let id = self.artifact_id.trim();
                if id.is_empty() {
                    return Err(Rejected::EmptyArtifactId);
                }
                ActionRequest::Load { id: id.to_string() }
            }
            ActionKind::Download => match self.artifact.as_ref() {
                Some(a) if !a.id.is_empty() => ActionRequest::Download {
                    artifact_id: a.id.clone(),
                },
                _ => return Err(Rejected::NoArtifact),
            },
        };

        let slot = kind.slot();
        self.generations[slot] += 1;
        let ticket = ActionTicket {
            kind,
            generation: self.generations[slot],
        };

        self.error.clear();
        if kind.holds_busy() {
            self.busy = true;
            self.in_flight = Some(ticket);
        }
        Ok(Action { ticket, request })
    }

    /// Fold one step's result into the state. Later results replace earlier ones wholesale.
    pub fn apply(&mut self, ticket: &ActionTicket, outcome: Outcome) -> Applied {
        if !self.is_current(ticket) {
            return Applied::Stale;
        }
        match outcome {
            // Only an "ok" status counts as connected; the brand is shown either way.
            Outcome::Reachable(h) => {
                self.connection = Connection {
                    reachable: h.status == "ok",
                    brand: h.brand.unwrap_or_default(),
                    status: h.status,
                    version: h.version,
                };
            }
            // The id is committed before the follow-up fetch; a failed fetch leaves the
            // previous artifact on screen next to the new id.
            Outcome::ConvertAccepted { id } => self.artifact_id = id,
            Outcome::ArtifactFetched(a) => self.artifact = Some(a),
            Outcome::Downloaded(record) => self.last_download = Some(record),
            Outcome::Failed(msg) => self.error = msg,
        }
        Applied::Accepted
    }

    /// Release the busy slot held by `ticket`. Always called, success or failure.
    pub fn finish(&mut self, ticket: &ActionTicket) -> Applied {
        if !self.is_current(ticket) {
            return Applied::Stale;
        }
        if self.in_flight == Some(*ticket) {
            self.in_flight = None;
            self.busy = false;
        }
        Applied::Accepted
    }
}
