//! Shared fixtures for engine unit tests.

use time::{OffsetDateTime, macros::datetime};

use crate::{
    config::MatchConfig,
    state::{
        game::{Formation, Player, PlayerNumber, Slot},
        match_state::{LineupDraft, MatchState},
    },
};

/// Principal libero of the default roster.
pub(crate) const LIBERO: PlayerNumber = 7;
/// Reserve libero of the default roster.
pub(crate) const RESERVE: PlayerNumber = 9;

pub(crate) const KICK_OFF: OffsetDateTime = datetime!(2024-03-09 18:00 UTC);

pub(crate) fn slot(value: u8) -> Slot {
    Slot::new(value).expect("test slot in range")
}

/// Formation with `numbers[i]` in slot `i + 1`.
pub(crate) fn numbered_formation(numbers: [PlayerNumber; 6]) -> Formation {
    Formation::from_fn(|slot| {
        let number = numbers[usize::from(slot.get() - 1)];
        Player::new(number, format!("Player {number}"))
    })
}

pub(crate) fn config() -> MatchConfig {
    MatchConfig::default()
}

/// Default lineup: 1, 3, 6, 8, 11, 12 in slots 1 to 6.
pub(crate) fn full_draft() -> LineupDraft {
    LineupDraft::from_config(&config())
}

/// Match right after setup confirmation, home serving.
pub(crate) fn live_match() -> MatchState {
    MatchState::from_setup(&full_draft(), &config(), KICK_OFF).expect("default setup is valid")
}
