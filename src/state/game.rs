use std::{
    fmt,
    ops::{Index, IndexMut},
    str::FromStr,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::state_machine::RuleViolation;

/// Jersey number, unique within a roster.
pub type PlayerNumber = u8;

/// One of the two teams on the court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The tracked team, with full roster and libero bookkeeping.
    Home,
    /// The opposing team, modeled as a simplified mirror.
    Away,
}

impl Side {
    /// Both sides, home first.
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];

    /// The other team.
    pub fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// A value tracked separately for each team (scores, counters, sets won).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerSide<T> {
    /// Value for [`Side::Home`].
    pub home: T,
    /// Value for [`Side::Away`].
    pub away: T,
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }
}

/// Validated court position in `1..=6`.
///
/// Slot 1 is the server (back-right), 2 front-right, 3 front-center,
/// 4 front-left, 5 back-left and 6 back-center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u8);

impl Slot {
    /// Every slot in numeric order.
    pub const ALL: [Slot; 6] = [Slot(1), Slot(2), Slot(3), Slot(4), Slot(5), Slot(6)];
    /// Back-row slots where a libero may enter.
    pub const BACK_ROW: [Slot; 3] = [Slot(1), Slot(5), Slot(6)];
    /// Serving position.
    pub const SERVER: Slot = Slot(1);
    /// Front-left attacking position a libero reaches by rotation.
    pub const FRONT_LEFT: Slot = Slot(4);

    /// Validate a raw slot number.
    pub fn new(value: u8) -> Result<Self, RuleViolation> {
        if (1..=6).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RuleViolation::InvalidSlot(value))
        }
    }

    /// Raw slot number.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether the slot belongs to the back row (1, 5, 6).
    pub fn is_back_row(self) -> bool {
        matches!(self.0, 1 | 5 | 6)
    }

    /// Slot a player standing here occupies after one rotation (1 → 6, 6 → 5, ... 2 → 1).
    pub fn after_rotation(self) -> Slot {
        if self.0 == 1 { Slot(6) } else { Slot(self.0 - 1) }
    }

    /// Slot whose player moves into this one on rotation (1 ← 2, ... 6 ← 1).
    pub fn filled_from(self) -> Slot {
        if self.0 == 6 { Slot(1) } else { Slot(self.0 + 1) }
    }

    fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for Slot {
    type Error = RuleViolation;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Slot::new(value)
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u8>()
            .map_err(|_| format!("slot key `{s}` is not a number"))?;
        Slot::new(value).map_err(|err| err.to_string())
    }
}

/// Roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Jersey number.
    pub number: PlayerNumber,
    /// Display name.
    pub name: String,
}

impl Player {
    /// Build a player from its number and name.
    pub fn new(number: PlayerNumber, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }
}

/// Six players indexed by [`Slot`]. Always fully occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formation {
    slots: [Player; 6],
}

impl Formation {
    /// Build a formation by asking `f` for the occupant of every slot.
    pub fn from_fn(mut f: impl FnMut(Slot) -> Player) -> Self {
        Self {
            slots: std::array::from_fn(|index| f(Slot::ALL[index])),
        }
    }

    /// Build a formation from explicit slot assignments, rejecting gaps and duplicated numbers.
    pub fn try_from_assignments(
        assignments: impl IntoIterator<Item = (Slot, Player)>,
    ) -> Result<Self, RuleViolation> {
        let mut seated: [Option<Player>; 6] = Default::default();
        for (slot, player) in assignments {
            if seated
                .iter()
                .flatten()
                .any(|existing| existing.number == player.number)
            {
                return Err(RuleViolation::DuplicatePlayer(player.number));
            }
            seated[slot.index()] = Some(player);
        }

        let players = seated
            .into_iter()
            .collect::<Option<Vec<Player>>>()
            .ok_or(RuleViolation::SetupIncomplete)?;
        let slots: [Player; 6] = players
            .try_into()
            .map_err(|_| RuleViolation::SetupIncomplete)?;
        Ok(Self { slots })
    }

    /// Player standing in `slot`.
    pub fn player(&self, slot: Slot) -> &Player {
        &self.slots[slot.index()]
    }

    /// Seat `player` in `slot`, returning the previous occupant.
    pub fn replace(&mut self, slot: Slot, player: Player) -> Player {
        std::mem::replace(&mut self.slots[slot.index()], player)
    }

    /// Slot currently held by `number`, if on court.
    pub fn slot_of(&self, number: PlayerNumber) -> Option<Slot> {
        self.iter()
            .find(|(_, player)| player.number == number)
            .map(|(slot, _)| slot)
    }

    /// Whether `number` is on court.
    pub fn contains(&self, number: PlayerNumber) -> bool {
        self.slot_of(number).is_some()
    }

    /// Iterate `(slot, player)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Player)> {
        Slot::ALL.into_iter().zip(self.slots.iter())
    }
}

/// Players available for substitution, kept in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bench {
    players: IndexMap<PlayerNumber, Player>,
}

impl Bench {
    /// Seat a player on the bench.
    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.number, player);
    }

    /// Remove a player from the bench, preserving the order of the others.
    pub fn take(&mut self, number: PlayerNumber) -> Option<Player> {
        self.players.shift_remove(&number)
    }

    /// Whether `number` sits on the bench.
    pub fn contains(&self, number: PlayerNumber) -> bool {
        self.players.contains_key(&number)
    }

    /// Iterate bench players in order.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of bench players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the bench is empty.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl FromIterator<Player> for Bench {
    fn from_iter<I: IntoIterator<Item = Player>>(iter: I) -> Self {
        let mut bench = Bench::default();
        for player in iter {
            bench.insert(player);
        }
        bench
    }
}

/// On-court formation plus bench for one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineup {
    /// Players on court.
    pub formation: Formation,
    /// Players off court.
    pub bench: Bench,
}

impl Lineup {
    /// Bring `incoming` from the bench into `slot` and send the occupant to the bench.
    ///
    /// Returns the player who left the court. An `incoming` number missing from the
    /// bench means the caller lost track of the lineup and is reported as
    /// [`RuleViolation::UnknownPlayer`].
    pub fn swap_with_bench(
        &mut self,
        slot: Slot,
        incoming: PlayerNumber,
    ) -> Result<Player, RuleViolation> {
        let entering = self
            .bench
            .take(incoming)
            .ok_or(RuleViolation::UnknownPlayer(incoming))?;
        let leaving = self.formation.replace(slot, entering);
        self.bench.insert(leaving.clone());
        Ok(leaving)
    }

    /// Formation numbers are unique and disjoint from the bench.
    pub fn is_consistent(&self) -> bool {
        let on_court: Vec<PlayerNumber> = self.formation.iter().map(|(_, p)| p.number).collect();
        let unique = on_court
            .iter()
            .enumerate()
            .all(|(i, n)| !on_court[i + 1..].contains(n));
        unique && on_court.iter().all(|n| !self.bench.contains(*n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::numbered_formation;

    #[test]
    fn slot_rejects_out_of_range_values() {
        assert_eq!(Slot::new(0), Err(RuleViolation::InvalidSlot(0)));
        assert_eq!(Slot::new(7), Err(RuleViolation::InvalidSlot(7)));
        assert_eq!(Slot::new(3).map(Slot::get), Ok(3));
    }

    #[test]
    fn slot_parses_string_keys() {
        assert_eq!("5".parse::<Slot>(), Ok(Slot(5)));
        assert_eq!(" 1 ".parse::<Slot>(), Ok(Slot(1)));
        assert!("p1".parse::<Slot>().is_err());
        assert!("9".parse::<Slot>().is_err());
    }

    #[test]
    fn rotation_mapping_is_inverse_of_fill_source() {
        for slot in Slot::ALL {
            assert_eq!(slot.filled_from().after_rotation(), slot);
        }
        assert_eq!(Slot(1).after_rotation(), Slot(6));
        assert_eq!(Slot(5).after_rotation(), Slot::FRONT_LEFT);
    }

    #[test]
    fn assignments_require_six_distinct_players() {
        let partial = Slot::ALL[..5]
            .iter()
            .map(|&slot| (slot, Player::new(slot.get(), "x")));
        assert_eq!(
            Formation::try_from_assignments(partial),
            Err(RuleViolation::SetupIncomplete)
        );

        let duplicated = Slot::ALL.iter().map(|&slot| (slot, Player::new(4, "dup")));
        assert_eq!(
            Formation::try_from_assignments(duplicated),
            Err(RuleViolation::DuplicatePlayer(4))
        );
    }

    #[test]
    fn swap_with_bench_exchanges_players() {
        let mut lineup = Lineup {
            formation: numbered_formation([1, 2, 3, 4, 5, 6]),
            bench: [Player::new(10, "Sub")].into_iter().collect(),
        };

        let leaving = lineup.swap_with_bench(Slot(3), 10).unwrap();

        assert_eq!(leaving.number, 3);
        assert_eq!(lineup.formation.player(Slot(3)).number, 10);
        assert!(lineup.bench.contains(3));
        assert!(!lineup.bench.contains(10));
        assert!(lineup.is_consistent());
    }

    #[test]
    fn swap_with_unknown_bench_player_fails_loudly() {
        let mut lineup = Lineup {
            formation: numbered_formation([1, 2, 3, 4, 5, 6]),
            bench: Bench::default(),
        };
        let before = lineup.clone();

        assert_eq!(
            lineup.swap_with_bench(Slot(1), 42),
            Err(RuleViolation::UnknownPlayer(42))
        );
        assert_eq!(lineup, before);
    }

    #[test]
    fn bench_take_preserves_order() {
        let mut bench: Bench = [7, 9, 12, 15]
            .into_iter()
            .map(|n| Player::new(n, "p"))
            .collect();
        bench.take(9);
        let order: Vec<_> = bench.iter().map(|p| p.number).collect();
        assert_eq!(order, vec![7, 12, 15]);
    }
}
