use std::{collections::BTreeMap, fmt, sync::Arc};

use thiserror::Error;
use time::OffsetDateTime;

use crate::{
    config::MatchConfig,
    state::{
        game::{PlayerNumber, Side, Slot},
        history::HistoryEntry,
        match_state::{LineupDraft, MatchPhase, MatchState},
        scoring::{Rating, Skill},
    },
};

/// Per-set counter a team can run out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    /// Timeouts.
    Timeouts,
    /// Regular substitutions.
    Substitutions,
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quota::Timeouts => f.write_str("timeout"),
            Quota::Substitutions => f.write_str("substitution"),
        }
    }
}

/// Reasons a command is refused. The match is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// The per-set counter is exhausted.
    #[error("{quota} quota exhausted for {side:?} this set")]
    QuotaExceeded {
        /// Team that asked.
        side: Side,
        /// Counter that ran out.
        quota: Quota,
    },
    /// A libero cannot take part in this move.
    #[error("libero #{0} cannot be part of this change")]
    LiberoInvolved(PlayerNumber),
    /// The starter sitting out for the libero must wait for the libero to leave.
    #[error("#{0} is replaced by the libero and cannot come back through a substitution")]
    StarterBlockedByLibero(PlayerNumber),
    /// Outgoing or incoming player missing.
    #[error("select both the outgoing and the incoming player")]
    IncompleteSelection,
    /// Slot outside `1..=6`, or not allowed for this move.
    #[error("slot {0} is not valid here")]
    InvalidSlot(u8),
    /// The reserve libero was already activated this match.
    #[error("the reserve libero was already activated")]
    ReserveAlreadyUsed,
    /// The libero is already on court.
    #[error("the libero is on court")]
    LiberoOnCourt,
    /// The libero is on the bench.
    #[error("the libero is not on court")]
    LiberoNotOnCourt,
    /// A winner was already decided.
    #[error("the match is over")]
    MatchAlreadyEnded,
    /// A timeout or set break is still running.
    #[error("a timer is already running")]
    TimerActive,
    /// The starting lineup is not confirmed (or not complete).
    #[error("the starting lineup is incomplete")]
    SetupIncomplete,
    /// Setup commands are closed once the match started.
    #[error("the starting lineup was already confirmed")]
    SetupAlreadyConfirmed,
    /// Another dialog must be confirmed or cancelled first.
    #[error("another selection is pending")]
    SelectionPending,
    /// Nothing to select into, confirm or cancel.
    #[error("no matching selection is pending")]
    NoPendingSelection,
    /// The same player was assigned twice.
    #[error("#{0} is assigned to more than one slot")]
    DuplicatePlayer(PlayerNumber),
    /// The set score cannot be counted any higher.
    #[error("{0:?} cannot score more points in this set")]
    ScoreLimitReached(Side),
    /// Reference to a player the engine does not know at that place.
    #[error("player #{0} is not where the client expects")]
    UnknownPlayer(PlayerNumber),
}

impl RuleViolation {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RuleViolation::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            RuleViolation::LiberoInvolved(_) => "LIBERO_INVOLVED",
            RuleViolation::StarterBlockedByLibero(_) => "STARTER_BLOCKED_BY_LIBERO",
            RuleViolation::IncompleteSelection => "INCOMPLETE_SELECTION",
            RuleViolation::InvalidSlot(_) => "INVALID_SLOT",
            RuleViolation::ReserveAlreadyUsed => "RESERVE_ALREADY_USED",
            RuleViolation::LiberoOnCourt => "LIBERO_ON_COURT",
            RuleViolation::LiberoNotOnCourt => "LIBERO_NOT_ON_COURT",
            RuleViolation::MatchAlreadyEnded => "MATCH_ALREADY_ENDED",
            RuleViolation::TimerActive => "TIMER_ACTIVE",
            RuleViolation::SetupIncomplete => "SETUP_INCOMPLETE",
            RuleViolation::SetupAlreadyConfirmed => "SETUP_ALREADY_CONFIRMED",
            RuleViolation::SelectionPending => "SELECTION_PENDING",
            RuleViolation::NoPendingSelection => "NO_PENDING_SELECTION",
            RuleViolation::DuplicatePlayer(_) => "DUPLICATE_PLAYER",
            RuleViolation::ScoreLimitReached(_) => "SCORE_LIMIT_REACHED",
            RuleViolation::UnknownPlayer(_) => "UNKNOWN_PLAYER",
        }
    }

    /// Client and engine disagree about the lineup: a bug, not an operator mistake.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, RuleViolation::UnknownPlayer(_))
    }
}

/// Every input the engine accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Assign (`Some`) or clear (`None`) home starting slots.
    SetupFormation(BTreeMap<Slot, Option<PlayerNumber>>),
    /// Lock the starting lineup and start the match.
    ConfirmSetup,
    /// Rally won by a side.
    AwardPoint(Side),
    /// Timeout called by a side.
    RequestTimeout(Side),
    /// Open a substitution for a side.
    InitiateSubstitution(Side),
    /// Toggle the home player leaving.
    SelectOutgoing(Slot),
    /// Toggle the home bench player entering.
    SelectIncoming(PlayerNumber),
    /// Apply the pending substitution.
    ConfirmSubstitution,
    /// Drop the pending substitution.
    CancelSubstitution,
    /// Promote the reserve libero.
    SwapLiberoReserve,
    /// Open the libero exchange dialog.
    InitiateLiberoExchange,
    /// Libero in at a back-row slot.
    ConfirmLiberoIn(Slot),
    /// Libero out.
    ConfirmLiberoOut,
    /// Close the libero exchange dialog.
    CancelLiberoExchange,
    /// Statistic for the home player in a slot.
    RecordAction {
        /// Slot of the player.
        slot: Slot,
        /// Skill used.
        skill: Skill,
        /// Outcome.
        rating: Rating,
    },
    /// Clock tick used to expire timers.
    TickTimer(OffsetDateTime),
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetupFormation(_) => "setup_formation",
            Command::ConfirmSetup => "confirm_setup",
            Command::AwardPoint(_) => "award_point",
            Command::RequestTimeout(_) => "request_timeout",
            Command::InitiateSubstitution(_) => "initiate_substitution",
            Command::SelectOutgoing(_) => "select_outgoing",
            Command::SelectIncoming(_) => "select_incoming",
            Command::ConfirmSubstitution => "confirm_substitution",
            Command::CancelSubstitution => "cancel_substitution",
            Command::SwapLiberoReserve => "swap_libero_reserve",
            Command::InitiateLiberoExchange => "initiate_libero_exchange",
            Command::ConfirmLiberoIn(_) => "confirm_libero_in",
            Command::ConfirmLiberoOut => "confirm_libero_out",
            Command::CancelLiberoExchange => "cancel_libero_exchange",
            Command::RecordAction { .. } => "record_action",
            Command::TickTimer(_) => "tick_timer",
        }
    }

    fn is_setup(&self) -> bool {
        matches!(self, Command::SetupFormation(_) | Command::ConfirmSetup)
    }

    /// Commands still meaningful once a winner is known.
    fn allowed_after_match(&self) -> bool {
        matches!(
            self,
            Command::TickTimer(_) | Command::CancelSubstitution | Command::CancelLiberoExchange
        )
    }
}

/// Result of [`MatchEngine::apply`]: the phase to keep and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Phase after the command. On rejection this is the input phase.
    pub phase: MatchPhase,
    /// History entries added by the command (newest first), or the violation.
    pub outcome: Result<Vec<HistoryEntry>, RuleViolation>,
    /// Whether `phase` differs from the input.
    pub changed: bool,
}

impl Transition {
    fn accepted(phase: MatchPhase, history: Vec<HistoryEntry>) -> Self {
        Self {
            phase,
            outcome: Ok(history),
            changed: true,
        }
    }

    fn unchanged(phase: MatchPhase) -> Self {
        Self {
            phase,
            outcome: Ok(Vec::new()),
            changed: false,
        }
    }

    fn rejected(phase: MatchPhase, violation: RuleViolation, changed: bool) -> Self {
        Self {
            phase,
            outcome: Err(violation),
            changed,
        }
    }
}

/// Pure command dispatcher.
///
/// Validation order is fixed: phase, then match over, then the command's own rules.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    config: Arc<MatchConfig>,
}

impl MatchEngine {
    /// Engine bound to a configuration.
    pub fn new(config: Arc<MatchConfig>) -> Self {
        Self { config }
    }

    /// Configuration the engine runs with.
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Setup phase pre-filled with the configured default lineup.
    pub fn initial_phase(&self) -> MatchPhase {
        MatchPhase::Setup(LineupDraft::from_config(&self.config))
    }

    /// Apply `command` to `phase` at time `now`.
    pub fn apply(&self, phase: MatchPhase, command: Command, now: OffsetDateTime) -> Transition {
        match phase {
            MatchPhase::Setup(draft) => self.apply_setup(draft, command, now),
            MatchPhase::Live(state) => self.apply_live(state, command, now),
        }
    }

    fn apply_setup(&self, draft: LineupDraft, command: Command, now: OffsetDateTime) -> Transition {
        match command {
            Command::SetupFormation(changes) => {
                let mut next = draft.clone();
                match next.assign(&changes, &self.config) {
                    Ok(()) if next == draft => Transition::unchanged(MatchPhase::Setup(draft)),
                    Ok(()) => Transition::accepted(MatchPhase::Setup(next), Vec::new()),
                    Err(violation) => {
                        Transition::rejected(MatchPhase::Setup(draft), violation, false)
                    }
                }
            }
            Command::ConfirmSetup => match MatchState::from_setup(&draft, &self.config, now) {
                Ok(state) => {
                    let history = state.history.newest(state.history.len());
                    Transition::accepted(MatchPhase::Live(Box::new(state)), history)
                }
                Err(violation) => Transition::rejected(MatchPhase::Setup(draft), violation, false),
            },
            Command::TickTimer(_) => Transition::unchanged(MatchPhase::Setup(draft)),
            _ => Transition::rejected(
                MatchPhase::Setup(draft),
                RuleViolation::SetupIncomplete,
                false,
            ),
        }
    }

    fn apply_live(
        &self,
        state: Box<MatchState>,
        command: Command,
        now: OffsetDateTime,
    ) -> Transition {
        if command.is_setup() {
            return Transition::rejected(
                MatchPhase::Live(state),
                RuleViolation::SetupAlreadyConfirmed,
                false,
            );
        }
        if state.is_finished() && !command.allowed_after_match() {
            return Transition::rejected(
                MatchPhase::Live(state),
                RuleViolation::MatchAlreadyEnded,
                false,
            );
        }

        let discards_draft = matches!(command, Command::ConfirmSubstitution);
        let history_before = state.history.len();
        let mut next = state.clone();

        let result = match command {
            Command::AwardPoint(side) => next.award_point(side, now),
            Command::RequestTimeout(side) => next.request_timeout(side, now),
            Command::InitiateSubstitution(side) => next.initiate_substitution(side, now),
            Command::SelectOutgoing(slot) => next.select_outgoing(slot),
            Command::SelectIncoming(number) => next.select_incoming(number),
            Command::ConfirmSubstitution => next.confirm_substitution(now),
            Command::CancelSubstitution => next.cancel_substitution(),
            Command::SwapLiberoReserve => next.swap_libero_reserve(now),
            Command::InitiateLiberoExchange => next.initiate_libero_exchange(now),
            Command::ConfirmLiberoIn(slot) => next.confirm_libero_in(slot, now),
            Command::ConfirmLiberoOut => next.confirm_libero_out(now),
            Command::CancelLiberoExchange => next.cancel_libero_exchange(),
            Command::RecordAction {
                slot,
                skill,
                rating,
            } => next.record_action(slot, skill, rating, now),
            Command::TickTimer(at) => {
                if !next.tick_timer(at) {
                    return Transition::unchanged(MatchPhase::Live(state));
                }
                Ok(())
            }
            Command::SetupFormation(_) | Command::ConfirmSetup => {
                Err(RuleViolation::SetupAlreadyConfirmed)
            }
        };

        match result {
            Ok(()) => {
                let added = next.history.len() - history_before;
                let history = next.history.newest(added);
                Transition::accepted(MatchPhase::Live(next), history)
            }
            Err(violation) => {
                let mut original = state;
                let had_pending = original.pending.is_some();
                if discards_draft {
                    original.discard_substitution_draft();
                }
                let changed = had_pending && original.pending.is_none();
                Transition::rejected(MatchPhase::Live(original), violation, changed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use time::Duration;

    use super::*;
    use crate::state::{
        history::ActionCode,
        match_state::PendingSelection,
        test_support::{KICK_OFF, LIBERO, config, slot},
    };

    fn engine() -> MatchEngine {
        MatchEngine::new(Arc::new(config()))
    }

    fn run(engine: &MatchEngine, phase: MatchPhase, commands: &[Command]) -> MatchPhase {
        commands.iter().fold(phase, |phase, command| {
            let transition = engine.apply(phase, command.clone(), KICK_OFF);
            assert!(
                transition.outcome.is_ok(),
                "{} rejected: {:?}",
                command.name(),
                transition.outcome
            );
            transition.phase
        })
    }

    fn live(engine: &MatchEngine) -> MatchPhase {
        run(engine, engine.initial_phase(), &[Command::ConfirmSetup])
    }

    fn state(phase: &MatchPhase) -> &MatchState {
        phase.live().expect("match is live")
    }

    fn points(side: Side, count: usize) -> Vec<Command> {
        vec![Command::AwardPoint(side); count]
    }

    #[test]
    fn live_commands_wait_for_setup() {
        let engine = engine();
        let phase = engine.initial_phase();

        let transition = engine.apply(phase.clone(), Command::AwardPoint(Side::Home), KICK_OFF);

        assert_eq!(transition.outcome, Err(RuleViolation::SetupIncomplete));
        assert_eq!(transition.phase, phase);
        assert!(!transition.changed);
    }

    #[test]
    fn confirm_setup_needs_six_slots() {
        let engine = engine();
        let cleared = BTreeMap::from([(slot(6), None)]);
        let phase = run(
            &engine,
            engine.initial_phase(),
            &[Command::SetupFormation(cleared)],
        );

        let transition = engine.apply(phase, Command::ConfirmSetup, KICK_OFF);
        assert_eq!(transition.outcome, Err(RuleViolation::SetupIncomplete));
        assert!(matches!(transition.phase, MatchPhase::Setup(_)));
    }

    #[test]
    fn confirm_setup_returns_start_entry() {
        let engine = engine();
        let transition = engine.apply(engine.initial_phase(), Command::ConfirmSetup, KICK_OFF);

        let history = transition.outcome.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, ActionCode::Start);
        assert!(transition.changed);

        let again = engine.apply(transition.phase, Command::ConfirmSetup, KICK_OFF);
        assert_eq!(again.outcome, Err(RuleViolation::SetupAlreadyConfirmed));
    }

    #[test]
    fn scenario_serve_and_side_out() {
        let engine = engine();
        let phase = live(&engine);
        let away_before = state(&phase).away.formation.clone();

        let phase = run(&engine, phase, &[Command::AwardPoint(Side::Home)]);
        let after_point = state(&phase);
        assert_eq!((after_point.score.home, after_point.score.away), (1, 0));
        assert_eq!(after_point.serving, Side::Home);
        assert_eq!(after_point.rotation_count, 0);

        let phase = run(&engine, phase, &[Command::AwardPoint(Side::Away)]);
        let after_side_out = state(&phase);
        assert_eq!((after_side_out.score.home, after_side_out.score.away), (1, 1));
        assert_eq!(after_side_out.serving, Side::Away);
        assert_eq!(after_side_out.rotation_count, 1);
        assert_eq!(
            after_side_out.away.formation,
            crate::state::rotation::rotate(&away_before)
        );
    }

    #[test]
    fn scenario_first_set_won_25_23() {
        let engine = engine();
        let mut commands = points(Side::Away, 23);
        commands.extend(points(Side::Home, 24));
        let phase = run(&engine, live(&engine), &commands);
        assert_eq!(state(&phase).current_set, 1);

        let transition = engine.apply(phase, Command::AwardPoint(Side::Home), KICK_OFF);
        let history = transition.outcome.unwrap();
        let current = state(&transition.phase);

        assert_eq!(current.sets_won.home, 1);
        assert_eq!((current.score.home, current.score.away), (0, 0));
        assert_eq!(current.current_set, 2);
        let timer = current.timer.unwrap();
        assert_eq!(timer.ends_at, KICK_OFF + Duration::seconds(180));
        assert_eq!(history[0].action, ActionCode::SetEnd);
        assert_eq!(history[0].score.to_string(), "25-23");
    }

    #[test]
    fn scenario_deciding_set_ends_match() {
        let engine = engine();
        let mut commands = Vec::new();
        for winner in [Side::Home, Side::Away, Side::Home, Side::Away] {
            commands.extend(points(winner, 25));
        }
        commands.extend(points(Side::Away, 13));
        commands.extend(points(Side::Home, 14));
        let phase = run(&engine, live(&engine), &commands);
        assert_eq!(state(&phase).current_set, 5);

        let transition = engine.apply(phase, Command::AwardPoint(Side::Home), KICK_OFF);
        let history = transition.outcome.unwrap();
        let finished = state(&transition.phase);
        assert_eq!(finished.winner, Some(Side::Home));
        assert_eq!(finished.sets_won.home, 3);
        let actions: Vec<_> = history.iter().map(|entry| entry.action).collect();
        assert_eq!(
            actions,
            vec![ActionCode::MatchEnd, ActionCode::SetEnd, ActionCode::Point]
        );

        let rejected = engine.apply(
            transition.phase.clone(),
            Command::AwardPoint(Side::Away),
            KICK_OFF,
        );
        assert_eq!(rejected.outcome, Err(RuleViolation::MatchAlreadyEnded));
        assert_eq!(rejected.phase, transition.phase);

        let tick = engine.apply(rejected.phase, Command::TickTimer(KICK_OFF), KICK_OFF);
        assert_eq!(tick.outcome, Ok(Vec::new()));
    }

    #[test]
    fn scenario_starter_blocked_while_libero_on_court() {
        let engine = engine();
        let phase = run(
            &engine,
            live(&engine),
            &[Command::InitiateLiberoExchange, Command::ConfirmLiberoIn(slot(1))],
        );
        let starter = state(&phase).libero.starter_replaced.unwrap();

        let phase = run(
            &engine,
            phase,
            &[
                Command::InitiateSubstitution(Side::Home),
                Command::SelectOutgoing(slot(3)),
                Command::SelectIncoming(starter),
            ],
        );
        let transition = engine.apply(phase, Command::ConfirmSubstitution, KICK_OFF);

        assert_eq!(
            transition.outcome,
            Err(RuleViolation::StarterBlockedByLibero(starter))
        );
        let after = state(&transition.phase);
        assert_eq!(after.pending, None);
        assert_eq!(after.substitutions.home, 0);
        assert_eq!(after.home.formation.player(slot(1)).number, LIBERO);
        assert!(transition.changed);
    }

    #[test]
    fn rejected_command_returns_input_unchanged() {
        let engine = engine();
        let phase = run(&engine, live(&engine), &[Command::SwapLiberoReserve]);

        let transition = engine.apply(phase.clone(), Command::SwapLiberoReserve, KICK_OFF);

        assert_eq!(transition.outcome, Err(RuleViolation::ReserveAlreadyUsed));
        assert_eq!(transition.phase, phase);
        assert!(!transition.changed);
    }

    #[test]
    fn failed_libero_confirm_keeps_dialog_open() {
        let engine = engine();
        let phase = run(&engine, live(&engine), &[Command::InitiateLiberoExchange]);

        let transition = engine.apply(phase, Command::ConfirmLiberoIn(slot(3)), KICK_OFF);

        assert_eq!(transition.outcome, Err(RuleViolation::InvalidSlot(3)));
        assert_eq!(
            state(&transition.phase).pending,
            Some(PendingSelection::LiberoExchange)
        );
    }

    #[test]
    fn libero_cannot_be_chosen_for_regular_substitution() {
        let engine = engine();
        let phase = run(
            &engine,
            live(&engine),
            &[
                Command::InitiateSubstitution(Side::Home),
                Command::SelectOutgoing(slot(2)),
                Command::SelectIncoming(LIBERO),
            ],
        );

        let transition = engine.apply(phase, Command::ConfirmSubstitution, KICK_OFF);
        assert_eq!(
            transition.outcome,
            Err(RuleViolation::LiberoInvolved(LIBERO))
        );
        assert_eq!(state(&transition.phase).pending, None);
    }

    #[test]
    fn tick_without_expiry_reports_no_change() {
        let engine = engine();
        let phase = run(
            &engine,
            live(&engine),
            &[Command::RequestTimeout(Side::Away)],
        );

        let early = engine.apply(
            phase,
            Command::TickTimer(KICK_OFF + Duration::seconds(5)),
            KICK_OFF,
        );
        assert!(!early.changed);

        let late = engine.apply(
            early.phase,
            Command::TickTimer(KICK_OFF + Duration::seconds(30)),
            KICK_OFF,
        );
        assert!(late.changed);
        assert_eq!(state(&late.phase).timer, None);
    }

    fn rally_strategy() -> impl Strategy<Value = Vec<Side>> {
        proptest::collection::vec(prop_oneof![Just(Side::Home), Just(Side::Away)], 1..60)
    }

    proptest! {
        #[test]
        fn forced_out_fires_once_per_front_row_arrival(
            entry in proptest::sample::select(Slot::BACK_ROW.to_vec()),
            rallies in rally_strategy(),
        ) {
            let engine = engine();
            let mut phase = run(
                &engine,
                live(&engine),
                &[Command::InitiateLiberoExchange, Command::ConfirmLiberoIn(entry)],
            );

            for side in rallies {
                let before = state(&phase).clone();
                let due = before.libero.on_court
                    && before.libero.court_position == Some(slot(5))
                    && before.serving == Side::Away
                    && side == Side::Home;

                let transition = engine.apply(phase, Command::AwardPoint(side), KICK_OFF);
                let history = transition.outcome.clone().unwrap();
                let auto_outs = history
                    .iter()
                    .filter(|entry| entry.action == ActionCode::LiberoAutoOut)
                    .count();

                prop_assert_eq!(auto_outs, usize::from(due));
                let after = state(&transition.phase);
                let libero = after.libero.active_number;
                prop_assert_ne!(after.home.formation.player(Slot::FRONT_LEFT).number, libero);
                prop_assert!(after.home.is_consistent());
                phase = transition.phase;
            }
        }

        #[test]
        fn substitution_counter_never_decreases_within_a_set(
            steps in proptest::collection::vec(0u8..4, 1..40),
        ) {
            let engine = engine();
            let mut phase = live(&engine);

            for step in steps {
                let before = state(&phase).clone();
                let command = match step {
                    0 => Command::InitiateSubstitution(Side::Away),
                    1 => Command::ConfirmSubstitution,
                    2 => Command::AwardPoint(Side::Home),
                    _ => Command::AwardPoint(Side::Away),
                };
                let transition = engine.apply(phase, command, KICK_OFF);
                let after = state(&transition.phase);

                if after.current_set == before.current_set {
                    prop_assert!(after.substitutions.away >= before.substitutions.away);
                } else {
                    prop_assert_eq!(after.substitutions.away, 0);
                }
                phase = transition.phase;
            }
        }
    }
}
