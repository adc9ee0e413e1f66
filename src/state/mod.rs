pub mod game;
pub mod history;
pub mod libero;
pub mod match_state;
pub mod rotation;
pub mod scoring;
mod sse;
pub mod state_machine;
pub mod substitution;
#[cfg(test)]
pub(crate) mod test_support;
pub mod transitions;

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

use crate::config::MatchConfig;

pub use self::sse::SseHub;
use self::{
    history::HistoryEntry,
    match_state::MatchPhase,
    state_machine::{Command, MatchEngine, RuleViolation, Transition},
};

/// Application state shared across handlers.
pub type SharedState = Arc<AppState>;

/// Committed phase together with a counter bumped on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: MatchPhase,
    /// Number of applied changes since startup.
    pub version: u64,
}

/// What a command did to the shared match.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// State after the command (unchanged on rejection).
    pub snapshot: Snapshot,
    /// History entries added, newest first, or the rule that refused the command.
    pub result: Result<Vec<HistoryEntry>, RuleViolation>,
    /// Whether the stored phase was replaced.
    pub changed: bool,
}

/// Central application state: the match engine, the committed phase and the SSE hub.
pub struct AppState {
    engine: MatchEngine,
    current: RwLock<Snapshot>,
    sse: SseHub,
    transition_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The match starts in setup with the configured default lineup.
    pub fn new(config: MatchConfig) -> SharedState {
        let engine = MatchEngine::new(Arc::new(config));
        let phase = engine.initial_phase();
        Arc::new(Self {
            engine,
            current: RwLock::new(Snapshot { phase, version: 0 }),
            sse: SseHub::new(64),
            transition_gate: Mutex::new(()),
        })
    }

    /// Configuration the engine runs with.
    pub fn config(&self) -> &MatchConfig {
        self.engine.config()
    }

    /// Broadcast hub used for the match SSE stream.
    pub fn match_sse(&self) -> &SseHub {
        &self.sse
    }

    /// Clone the committed phase.
    pub async fn snapshot(&self) -> Snapshot {
        self.current.read().await.clone()
    }

    /// Run `f` against the committed phase without cloning it.
    pub async fn read_phase<R>(&self, f: impl FnOnce(&MatchPhase) -> R) -> R {
        let guard = self.current.read().await;
        f(&guard.phase)
    }

    /// Apply one command to the committed phase.
    ///
    /// Commands are serialised through the transition gate: the phase is cloned,
    /// handed to the engine and the result stored only when it changed.
    pub async fn run_command(&self, command: Command, now: OffsetDateTime) -> CommandOutcome {
        let _gate = self.transition_gate.lock().await;
        let current = self.snapshot().await;

        let Transition {
            phase,
            outcome,
            changed,
        } = self.engine.apply(current.phase, command, now);

        let snapshot = if changed {
            let mut guard = self.current.write().await;
            guard.phase = phase;
            guard.version += 1;
            guard.clone()
        } else {
            Snapshot {
                phase,
                version: current.version,
            }
        };

        CommandOutcome {
            snapshot,
            result: outcome,
            changed,
        }
    }
}
