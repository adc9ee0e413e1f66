//! Match aggregate and the pre-match setup draft.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    config::{MatchConfig, MatchRules},
    state::{
        game::{Bench, Formation, Lineup, PerSide, Player, PlayerNumber, Side, Slot},
        history::{ActionCode, HistoryEntry, HistoryLog, ScoreLine},
        libero::LiberoStatus,
        scoring::{ActiveTimer, Points},
        state_machine::RuleViolation,
        substitution::SubstitutionDraft,
    },
};

/// Where the match currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPhase {
    /// Starting lineup being assigned.
    Setup(LineupDraft),
    /// Lineup confirmed; rallies can be played.
    Live(Box<MatchState>),
}

impl MatchPhase {
    /// Match state once setup is confirmed.
    pub fn live(&self) -> Option<&MatchState> {
        match self {
            MatchPhase::Setup(_) => None,
            MatchPhase::Live(state) => Some(state),
        }
    }
}

/// Home starting lineup under construction, slot → roster number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineupDraft {
    /// Current assignments; unassigned slots are absent.
    pub assignments: BTreeMap<Slot, PlayerNumber>,
}

impl LineupDraft {
    /// Draft pre-filled with the configured default lineup.
    pub fn from_config(config: &MatchConfig) -> Self {
        Self {
            assignments: config.default_lineup.clone(),
        }
    }

    /// Apply a batch of assignments; `None` clears the slot.
    ///
    /// The batch is all-or-nothing: on error the draft is left untouched.
    pub fn assign(
        &mut self,
        changes: &BTreeMap<Slot, Option<PlayerNumber>>,
        config: &MatchConfig,
    ) -> Result<(), RuleViolation> {
        let mut next = self.assignments.clone();
        for (&slot, &number) in changes {
            match number {
                None => {
                    next.remove(&slot);
                }
                Some(number) => {
                    if config.player(number).is_none() {
                        return Err(RuleViolation::UnknownPlayer(number));
                    }
                    if config.is_libero(number) {
                        return Err(RuleViolation::LiberoInvolved(number));
                    }
                    next.insert(slot, number);
                }
            }
        }

        let mut numbers: Vec<PlayerNumber> = next.values().copied().collect();
        numbers.sort_unstable();
        if let Some(pair) = numbers.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(RuleViolation::DuplicatePlayer(pair[0]));
        }

        self.assignments = next;
        Ok(())
    }

    /// Whether all six slots are filled.
    pub fn is_complete(&self) -> bool {
        Slot::ALL
            .iter()
            .all(|slot| self.assignments.contains_key(slot))
    }
}

/// Open dialog waiting for a confirm or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingSelection {
    /// Regular substitution being composed.
    Substitution(SubstitutionDraft),
    /// Libero in/out dialog.
    LiberoExchange,
}

/// Everything known about a running match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    /// Match identifier.
    pub id: Uuid,
    /// Display names.
    pub team_names: PerSide<String>,
    /// Tracked team.
    pub home: Lineup,
    /// Opponent mirror with stub players.
    pub away: Lineup,
    /// Side serving the next rally.
    pub serving: Side,
    /// Points in the current set.
    pub score: PerSide<Points>,
    /// Sets won so far.
    pub sets_won: PerSide<u8>,
    /// Set in progress, starting at 1.
    pub current_set: u8,
    /// Set once a team reached the required number of sets.
    pub winner: Option<Side>,
    /// Timeouts used in the current set.
    pub timeouts: PerSide<u8>,
    /// Substitutions used in the current set.
    pub substitutions: PerSide<u8>,
    /// Side-outs since the start of the match.
    pub rotation_count: u32,
    /// Home libero tracking.
    pub libero: LiberoStatus,
    /// Open dialog, if any.
    pub pending: Option<PendingSelection>,
    /// Running timeout or set break.
    pub timer: Option<ActiveTimer>,
    /// When the setup was confirmed.
    pub started_at: OffsetDateTime,
    /// Newest-first audit trail.
    pub history: HistoryLog,
    /// Rules the match is played under.
    pub rules: MatchRules,
}

impl MatchState {
    /// Build the live match from a complete draft and log `START`.
    pub fn from_setup(
        draft: &LineupDraft,
        config: &MatchConfig,
        now: OffsetDateTime,
    ) -> Result<Self, RuleViolation> {
        if !draft.is_complete() {
            return Err(RuleViolation::SetupIncomplete);
        }

        let mut seated = Vec::with_capacity(Slot::ALL.len());
        for (&slot, &number) in &draft.assignments {
            let player = config
                .player(number)
                .cloned()
                .ok_or(RuleViolation::UnknownPlayer(number))?;
            seated.push((slot, player));
        }
        let formation = Formation::try_from_assignments(seated)?;
        let bench: Bench = config
            .roster
            .iter()
            .filter(|player| !formation.contains(player.number))
            .cloned()
            .collect();

        let away = Lineup {
            formation: Formation::from_fn(|slot| {
                Player::new(slot.get(), format!("Adv {}", slot.get()))
            }),
            bench: Bench::default(),
        };

        let mut state = Self {
            id: Uuid::new_v4(),
            team_names: PerSide {
                home: config.home_name.clone(),
                away: config.away_name.clone(),
            },
            home: Lineup { formation, bench },
            away,
            serving: config.first_server,
            score: PerSide::default(),
            sets_won: PerSide::default(),
            current_set: 1,
            winner: None,
            timeouts: PerSide::default(),
            substitutions: PerSide::default(),
            rotation_count: 0,
            libero: LiberoStatus::new(&config.liberos),
            pending: None,
            timer: None,
            started_at: now,
            history: HistoryLog::default(),
            rules: config.rules,
        };

        let server = state.team_names[state.serving].clone();
        let home = state.team_names.home.clone();
        state.record(
            now,
            None,
            home,
            ActionCode::Start,
            format!("lineup confirmed, {server} serves"),
        );
        Ok(state)
    }

    /// Whether a winner was decided.
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Current set score as a history snapshot.
    pub fn score_line(&self) -> ScoreLine {
        ScoreLine {
            home: self.score.home,
            away: self.score.away,
        }
    }

    /// Lineup of `side`.
    pub fn lineup(&self, side: Side) -> &Lineup {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub(crate) fn lineup_mut(&mut self, side: Side) -> &mut Lineup {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }

    /// Append a history entry stamped with the current set and score.
    pub fn record(
        &mut self,
        now: OffsetDateTime,
        slot: Option<Slot>,
        player_name: String,
        action: ActionCode,
        result: String,
    ) {
        let entry = HistoryEntry {
            timestamp: now,
            set_number: self.current_set,
            score: self.score_line(),
            slot,
            player_name,
            action,
            result,
        };
        self.history.append(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{LIBERO, RESERVE, config, full_draft, slot};

    #[test]
    fn draft_rejects_liberos_and_unknown_players() {
        let config = config();
        let mut draft = LineupDraft::default();

        let libero = BTreeMap::from([(slot(1), Some(LIBERO))]);
        assert_eq!(
            draft.assign(&libero, &config),
            Err(RuleViolation::LiberoInvolved(LIBERO))
        );

        let unknown = BTreeMap::from([(slot(1), Some(99))]);
        assert_eq!(
            draft.assign(&unknown, &config),
            Err(RuleViolation::UnknownPlayer(99))
        );
        assert!(draft.assignments.is_empty());
    }

    #[test]
    fn draft_rejects_duplicates_atomically() {
        let config = config();
        let mut draft = LineupDraft::default();
        draft
            .assign(&BTreeMap::from([(slot(1), Some(3))]), &config)
            .unwrap();

        let duplicate = BTreeMap::from([(slot(2), Some(6)), (slot(4), Some(3))]);
        assert_eq!(
            draft.assign(&duplicate, &config),
            Err(RuleViolation::DuplicatePlayer(3))
        );
        assert_eq!(draft.assignments, BTreeMap::from([(slot(1), 3)]));
    }

    #[test]
    fn draft_can_move_and_clear_players() {
        let config = config();
        let mut draft = LineupDraft::default();
        draft
            .assign(&BTreeMap::from([(slot(1), Some(3))]), &config)
            .unwrap();

        let moved = BTreeMap::from([(slot(1), None), (slot(2), Some(3))]);
        draft.assign(&moved, &config).unwrap();

        assert_eq!(draft.assignments, BTreeMap::from([(slot(2), 3)]));
        assert!(!draft.is_complete());
    }

    #[test]
    fn setup_builds_bench_from_roster_remainder() {
        let config = config();
        let now = time::macros::datetime!(2024-03-09 18:00 UTC);

        let state = MatchState::from_setup(&full_draft(), &config, now).unwrap();

        assert_eq!(state.home.bench.len(), config.roster.len() - 6);
        assert!(state.home.bench.contains(LIBERO));
        assert!(state.home.bench.contains(RESERVE));
        assert!(state.home.is_consistent());
        assert_eq!(state.away.formation.player(slot(3)).name, "Adv 3");
        assert_eq!(state.current_set, 1);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history.iter().next().unwrap().action, ActionCode::Start);
    }

    #[test]
    fn setup_requires_six_players() {
        let config = config();
        let mut draft = full_draft();
        draft.assignments.remove(&slot(4));
        let now = time::macros::datetime!(2024-03-09 18:00 UTC);

        assert_eq!(
            MatchState::from_setup(&draft, &config, now),
            Err(RuleViolation::SetupIncomplete)
        );
    }
}
