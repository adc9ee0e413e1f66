//! Append-only audit trail of match transitions, newest entry first.

use std::{collections::VecDeque, fmt};

use time::OffsetDateTime;

use crate::state::{
    game::Slot,
    scoring::{Points, Skill},
};

/// Kind of transition recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCode {
    /// Starting lineup confirmed.
    Start,
    /// Rally won by the serving side.
    Point,
    /// Rally won by the receiving side, which gains serve and rotates.
    SideOut,
    /// Regular home substitution.
    Substitution,
    /// Opponent substitution, counted but not tracked per player.
    OpponentSubstitution,
    /// Libero replaced a back-row starter.
    LiberoIn,
    /// Libero handed the slot back to its starter.
    LiberoOut,
    /// Libero sent off automatically after rotating into the front row.
    LiberoAutoOut,
    /// Reserve libero became the active libero.
    LiberoSwapReserve,
    /// Timeout requested.
    Timeout,
    /// A set was won.
    SetEnd,
    /// The match was won.
    MatchEnd,
    /// Player statistic for a skill.
    Stat(Skill),
}

impl ActionCode {
    /// Stable code exposed to clients.
    pub fn code(self) -> &'static str {
        match self {
            ActionCode::Start => "START",
            ActionCode::Point => "POINT",
            ActionCode::SideOut => "SIDE_OUT",
            ActionCode::Substitution => "SUB",
            ActionCode::OpponentSubstitution => "SUB_OPPONENT",
            ActionCode::LiberoIn => "LIBERO_IN",
            ActionCode::LiberoOut => "LIBERO_OUT",
            ActionCode::LiberoAutoOut => "LIBERO_AUTO_OUT",
            ActionCode::LiberoSwapReserve => "LIBERO_SWAP_RESERVE",
            ActionCode::Timeout => "TIMEOUT",
            ActionCode::SetEnd => "SET_END",
            ActionCode::MatchEnd => "MATCH_END",
            ActionCode::Stat(skill) => skill.code(),
        }
    }
}

/// Score of the current set at the time an entry was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreLine {
    /// Home points.
    pub home: Points,
    /// Away points.
    pub away: Points,
}

impl fmt::Display for ScoreLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// When the transition was applied.
    pub timestamp: OffsetDateTime,
    /// Set in progress.
    pub set_number: u8,
    /// Score snapshot.
    pub score: ScoreLine,
    /// Court slot involved, if any.
    pub slot: Option<Slot>,
    /// Player (or team) the entry is about.
    pub player_name: String,
    /// What happened.
    pub action: ActionCode,
    /// Free-form outcome.
    pub result: String,
}

/// Unbounded, newest-first list of [`HistoryEntry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    /// Insert `entry` as the newest record.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
    }

    /// Iterate from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Clone the `count` newest entries, newest first.
    pub fn newest(&self, count: usize) -> Vec<HistoryEntry> {
        self.entries.iter().take(count).cloned().collect()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
