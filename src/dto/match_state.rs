//! Read-side projection of the match, shared by REST responses and SSE events.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::MatchConfig,
    dto::format_timestamp,
    state::{
        Snapshot,
        game::{Lineup, PerSide, Player, PlayerNumber, Side},
        libero::LiberoStatus,
        match_state::{LineupDraft, MatchPhase, MatchState, PendingSelection},
        scoring::{ActiveTimer, TimerKind},
    },
};

/// Publicly visible phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Starting lineup being assigned.
    Setup,
    /// Rallies being played.
    Live,
    /// A winner is known.
    Finished,
}

impl From<&MatchPhase> for VisiblePhase {
    fn from(value: &MatchPhase) -> Self {
        match value {
            MatchPhase::Setup(_) => VisiblePhase::Setup,
            MatchPhase::Live(state) if state.is_finished() => VisiblePhase::Finished,
            MatchPhase::Live(_) => VisiblePhase::Live,
        }
    }
}

/// Full state of the match as seen by a renderer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSnapshot {
    /// Coarse phase.
    pub phase: VisiblePhase,
    /// Increases with every applied change.
    pub version: u64,
    /// Present while the lineup is being assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupView>,
    /// Present once the match started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<LiveMatchView>,
}

impl MatchSnapshot {
    /// Project `snapshot` for display at time `now`.
    pub fn build(snapshot: &Snapshot, config: &MatchConfig, now: OffsetDateTime) -> Self {
        let (setup, live) = match &snapshot.phase {
            MatchPhase::Setup(draft) => (Some(SetupView::build(draft, config)), None),
            MatchPhase::Live(state) => (None, Some(LiveMatchView::build(state, config, now))),
        };
        Self {
            phase: VisiblePhase::from(&snapshot.phase),
            version: snapshot.version,
            setup,
            live,
        }
    }
}

/// Roster entry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    /// Jersey number.
    pub number: PlayerNumber,
    /// Display name.
    pub name: String,
    /// Whether this player is one of the two liberos.
    pub is_libero: bool,
}

impl PlayerView {
    fn new(player: &Player, is_libero: bool) -> Self {
        Self {
            number: player.number,
            name: player.name.clone(),
            is_libero,
        }
    }
}

/// Setup draft with the roster to choose from.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SetupView {
    /// Slot → assigned player number.
    #[schema(value_type = BTreeMap<String, u8>)]
    pub assignments: BTreeMap<u8, PlayerNumber>,
    /// Whether all six slots are filled.
    pub complete: bool,
    /// Home roster in configured order.
    pub roster: Vec<PlayerView>,
}

impl SetupView {
    fn build(draft: &LineupDraft, config: &MatchConfig) -> Self {
        Self {
            assignments: draft
                .assignments
                .iter()
                .map(|(slot, number)| (slot.get(), *number))
                .collect(),
            complete: draft.is_complete(),
            roster: config
                .roster
                .iter()
                .map(|player| PlayerView::new(player, config.is_libero(player.number)))
                .collect(),
        }
    }
}

/// Pair of per-team counters, home first.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PairView {
    /// Home value.
    pub home: u16,
    /// Away value.
    pub away: u16,
}

impl<T: Into<u16>> From<PerSide<T>> for PairView {
    fn from(value: PerSide<T>) -> Self {
        Self {
            home: value.home.into(),
            away: value.away.into(),
        }
    }
}

/// Player standing in a slot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotView {
    /// Court slot.
    pub slot: u8,
    /// Occupant.
    pub player: PlayerView,
}

/// One team's court and bench.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamView {
    /// Display name.
    pub name: String,
    /// Slots 1 to 6.
    pub formation: Vec<SlotView>,
    /// Bench in roster order.
    pub bench: Vec<PlayerView>,
    /// Timeouts used this set.
    pub timeouts_used: u8,
    /// Substitutions used this set.
    pub substitutions_used: u8,
}

/// Libero tracking for the home team.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiberoView {
    /// Libero allowed to play.
    pub active_number: PlayerNumber,
    /// Other libero.
    pub reserve_number: PlayerNumber,
    /// Whether the active libero is on court.
    pub on_court: bool,
    /// Starter waiting on the bench.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starter_replaced: Option<PlayerNumber>,
    /// Slot held by the libero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_position: Option<u8>,
    /// Whether the reserve was already activated.
    pub reserve_used: bool,
    /// Back-row slot of the usual spot starter, offered as default entry slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_slot: Option<u8>,
}

impl LiberoView {
    fn build(libero: &LiberoStatus, home: &Lineup) -> Self {
        Self {
            active_number: libero.active_number,
            reserve_number: libero.reserve_number,
            on_court: libero.on_court,
            starter_replaced: libero.starter_replaced,
            court_position: libero.court_position.map(u8::from),
            reserve_used: libero.reserve_used,
            suggested_slot: libero.suggested_slot(home).map(u8::from),
        }
    }
}

/// Dialog waiting for confirmation.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingView {
    /// Regular substitution.
    Substitution {
        /// Team substituting.
        side: Side,
        /// Selected outgoing slot.
        outgoing_slot: Option<u8>,
        /// Selected incoming player.
        incoming_number: Option<PlayerNumber>,
    },
    /// Libero in/out dialog.
    LiberoExchange,
}

impl From<&PendingSelection> for PendingView {
    fn from(value: &PendingSelection) -> Self {
        match value {
            PendingSelection::Substitution(draft) => PendingView::Substitution {
                side: draft.side,
                outgoing_slot: draft.outgoing.map(u8::from),
                incoming_number: draft.incoming,
            },
            PendingSelection::LiberoExchange => PendingView::LiberoExchange,
        }
    }
}

/// Running countdown.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimerView {
    /// Timeout or set break.
    pub kind: TimerKind,
    /// RFC 3339 end time.
    pub ends_at: String,
    /// Whole seconds left, rounded up.
    pub remaining_secs: i64,
}

impl TimerView {
    fn build(timer: &ActiveTimer, now: OffsetDateTime) -> Self {
        let remaining = timer.remaining(now);
        let mut secs = remaining.whole_seconds();
        if remaining.subsec_nanoseconds() > 0 {
            secs += 1;
        }
        Self {
            kind: timer.kind,
            ends_at: format_timestamp(timer.ends_at),
            remaining_secs: secs,
        }
    }
}

/// Running or finished match.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveMatchView {
    /// Match identifier.
    pub id: Uuid,
    /// Set in progress (or the last one played).
    pub current_set: u8,
    /// Deciding set number.
    pub deciding_set: u8,
    /// Points needed to take the current set.
    pub set_point_target: u8,
    /// Side serving the next rally.
    pub serving: Side,
    /// Current set score.
    pub score: PairView,
    /// Sets won.
    pub sets_won: PairView,
    /// Winner, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Side>,
    /// Home team.
    pub home: TeamView,
    /// Opponent mirror.
    pub away: TeamView,
    /// Libero tracking.
    pub libero: LiberoView,
    /// Open dialog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingView>,
    /// Running timeout or break.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerView>,
    /// Side-outs since the start.
    pub rotation_count: u32,
    /// RFC 3339 time of setup confirmation.
    pub started_at: String,
    /// Seconds since setup confirmation.
    pub elapsed_secs: i64,
}

impl LiveMatchView {
    fn build(state: &MatchState, config: &MatchConfig, now: OffsetDateTime) -> Self {
        Self {
            id: state.id,
            current_set: state.current_set,
            deciding_set: state.rules.deciding_set(),
            set_point_target: state.rules.threshold(state.current_set),
            serving: state.serving,
            score: state.score.into(),
            sets_won: state.sets_won.into(),
            winner: state.winner,
            home: team_view(state, Side::Home, config),
            away: team_view(state, Side::Away, config),
            libero: LiberoView::build(&state.libero, &state.home),
            pending: state.pending.as_ref().map(PendingView::from),
            timer: state
                .timer
                .as_ref()
                .filter(|timer| timer.is_running(now))
                .map(|timer| TimerView::build(timer, now)),
            rotation_count: state.rotation_count,
            started_at: format_timestamp(state.started_at),
            elapsed_secs: (now - state.started_at).whole_seconds().max(0),
        }
    }
}

fn team_view(state: &MatchState, side: Side, config: &MatchConfig) -> TeamView {
    let lineup = state.lineup(side);
    let is_libero = |number| side == Side::Home && config.is_libero(number);
    TeamView {
        name: state.team_names[side].clone(),
        formation: lineup
            .formation
            .iter()
            .map(|(slot, player)| SlotView {
                slot: slot.get(),
                player: PlayerView::new(player, is_libero(player.number)),
            })
            .collect(),
        bench: lineup
            .bench
            .iter()
            .map(|player| PlayerView::new(player, is_libero(player.number)))
            .collect(),
        timeouts_used: state.timeouts[side],
        substitutions_used: state.substitutions[side],
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::state::test_support::{KICK_OFF, config, live_match, slot};

    #[test]
    fn setup_snapshot_lists_roster_and_draft() {
        let config = config();
        let snapshot = Snapshot {
            phase: MatchPhase::Setup(LineupDraft::from_config(&config)),
            version: 0,
        };

        let view = MatchSnapshot::build(&snapshot, &config, KICK_OFF);

        assert_eq!(view.phase, VisiblePhase::Setup);
        let setup = view.setup.unwrap();
        assert!(setup.complete);
        assert_eq!(setup.roster.len(), config.roster.len());
        assert!(setup.roster.iter().any(|p| p.number == 7 && p.is_libero));
        assert!(view.live.is_none());
    }

    #[test]
    fn live_snapshot_rounds_timer_up_and_hides_expired_timer() {
        let config = config();
        let mut state = live_match();
        state.request_timeout(Side::Home, KICK_OFF).unwrap();
        let snapshot = Snapshot {
            phase: MatchPhase::Live(Box::new(state)),
            version: 3,
        };

        let view = MatchSnapshot::build(
            &snapshot,
            &config,
            KICK_OFF + Duration::milliseconds(10_500),
        );
        let live = view.live.unwrap();
        let timer = live.timer.unwrap();
        assert_eq!(timer.remaining_secs, 20);
        assert_eq!(live.elapsed_secs, 10);
        assert_eq!(live.home.timeouts_used, 1);

        let later = MatchSnapshot::build(&snapshot, &config, KICK_OFF + Duration::seconds(45));
        assert!(later.live.unwrap().timer.is_none());
    }

    #[test]
    fn live_snapshot_marks_liberos_and_suggests_slot() {
        let config = config();
        let snapshot = Snapshot {
            phase: MatchPhase::Live(Box::new(live_match())),
            version: 1,
        };

        let live = MatchSnapshot::build(&snapshot, &config, KICK_OFF).live.unwrap();

        assert!(live.home.bench.iter().any(|p| p.number == 7 && p.is_libero));
        assert!(live.away.formation.iter().all(|s| !s.player.is_libero));
        // spot starter #6 starts in slot 3, front row
        assert_eq!(live.libero.suggested_slot, None);
        assert_eq!(live.home.formation[0].slot, slot(1).get());
    }
}
