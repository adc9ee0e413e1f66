//! Application-level configuration loading: home roster, libero pair, default lineup and rules.

use std::{collections::BTreeMap, env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use thiserror::Error;
use time::Duration;
use tracing::{info, warn};

use crate::state::game::{Player, PlayerNumber, Side, Slot};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/match.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "VOLLEY_SCORER_CONFIG_PATH";
/// Accepted values of `sets_to_win`; keeps the deciding set number in `u8`.
const SETS_TO_WIN_RANGE: std::ops::RangeInclusive<u8> = 1..=9;

/// Immutable match configuration shared by the engine and the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Display name of the tracked team.
    pub home_name: String,
    /// Display name of the opponent.
    pub away_name: String,
    /// Every player of the home team, liberos included, in roster order.
    pub roster: Vec<Player>,
    /// Libero pair and the starter they usually replace.
    pub liberos: LiberoConfig,
    /// Side serving the first rally.
    pub first_server: Side,
    /// Lineup pre-filled in the setup draft.
    pub default_lineup: BTreeMap<Slot, PlayerNumber>,
    /// Quotas, durations and set thresholds.
    pub rules: MatchRules,
}

/// Libero numbers for the home team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiberoConfig {
    /// Libero active at kick-off.
    pub principal: PlayerNumber,
    /// Libero that can replace the principal once per match.
    pub reserve: PlayerNumber,
    /// Starter the libero usually takes over from.
    pub spot_starter: PlayerNumber,
}

/// Numeric rules of the competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRules {
    /// Timeouts allowed per team per set.
    pub max_timeouts_per_set: u8,
    /// Regular substitutions allowed per team per set.
    pub max_subs_per_set: u8,
    /// Length of a timeout.
    pub timeout_duration: Duration,
    /// Break between regular sets.
    pub short_break: Duration,
    /// Break before the deciding set.
    pub long_break: Duration,
    /// Points needed to take a regular set.
    pub points_to_win_set: u8,
    /// Points needed to take the deciding set.
    pub points_to_win_deciding_set: u8,
    /// Lead required to close a set.
    pub min_point_margin: u8,
    /// Sets needed to win the match.
    pub sets_to_win: u8,
}

impl MatchRules {
    /// Last possible set of the match.
    pub fn deciding_set(&self) -> u8 {
        self.sets_to_win * 2 - 1
    }

    /// Points needed to win `set`.
    pub fn threshold(&self, set: u8) -> u8 {
        if set == self.deciding_set() {
            self.points_to_win_deciding_set
        } else {
            self.points_to_win_set
        }
    }

    /// Break played before `next_set` starts.
    pub fn break_before(&self, next_set: u8) -> Duration {
        if next_set == self.deciding_set() {
            self.long_break
        } else {
            self.short_break
        }
    }
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            max_timeouts_per_set: 2,
            max_subs_per_set: 6,
            timeout_duration: Duration::seconds(30),
            short_break: Duration::seconds(180),
            long_break: Duration::seconds(300),
            points_to_win_set: 25,
            points_to_win_deciding_set: 15,
            min_point_margin: 2,
            sets_to_win: 3,
        }
    }
}

/// Reasons a parsed configuration is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Two roster entries share a number.
    #[error("player #{0} appears twice in the roster")]
    DuplicateRosterNumber(PlayerNumber),
    /// A libero or spot starter is not part of the roster.
    #[error("{role} #{number} is not in the roster")]
    MissingFromRoster {
        /// Role that referenced the number.
        role: &'static str,
        /// Missing number.
        number: PlayerNumber,
    },
    /// Both liberos share a number.
    #[error("principal and reserve libero must differ")]
    SameLibero,
    /// The spot starter is one of the liberos.
    #[error("spot starter #{0} cannot be a libero")]
    SpotStarterIsLibero(PlayerNumber),
    /// Not enough non-libero players to field six starters.
    #[error("roster holds {0} non-libero players, six are needed")]
    RosterTooSmall(usize),
    /// A default lineup entry is invalid.
    #[error("default lineup: {0}")]
    DefaultLineup(String),
    /// A rule value cannot produce a playable match.
    #[error("rules: {0}")]
    Rules(&'static str),
}

impl MatchConfig {
    /// Load the match configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        roster = config.roster.len(),
                        home = %config.home_name,
                        away = %config.away_name,
                        "loaded match configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to load config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        let raw = serde_json::from_str::<RawConfig>(contents)?;
        let config = Self::from(raw);
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, player) in self.roster.iter().enumerate() {
            if self.roster[index + 1..]
                .iter()
                .any(|other| other.number == player.number)
            {
                return Err(ConfigError::DuplicateRosterNumber(player.number));
            }
        }

        let LiberoConfig {
            principal,
            reserve,
            spot_starter,
        } = self.liberos;
        if principal == reserve {
            return Err(ConfigError::SameLibero);
        }
        for (role, number) in [
            ("principal libero", principal),
            ("reserve libero", reserve),
            ("spot starter", spot_starter),
        ] {
            if self.player(number).is_none() {
                return Err(ConfigError::MissingFromRoster { role, number });
            }
        }
        if spot_starter == principal || spot_starter == reserve {
            return Err(ConfigError::SpotStarterIsLibero(spot_starter));
        }

        let field_players = self
            .roster
            .iter()
            .filter(|player| !self.is_libero(player.number))
            .count();
        if field_players < Slot::ALL.len() {
            return Err(ConfigError::RosterTooSmall(field_players));
        }

        for (slot, number) in &self.default_lineup {
            if self.player(*number).is_none() {
                return Err(ConfigError::DefaultLineup(format!(
                    "slot {slot} holds unknown player #{number}"
                )));
            }
            if self.is_libero(*number) {
                return Err(ConfigError::DefaultLineup(format!(
                    "slot {slot} holds libero #{number}"
                )));
            }
        }
        let mut seen: Vec<PlayerNumber> = self.default_lineup.values().copied().collect();
        seen.sort_unstable();
        if let Some(pair) = seen.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ConfigError::DefaultLineup(format!(
                "player #{} is assigned twice",
                pair[0]
            )));
        }

        let rules = &self.rules;
        if !SETS_TO_WIN_RANGE.contains(&rules.sets_to_win) {
            return Err(ConfigError::Rules("sets_to_win must be between 1 and 9"));
        }
        if rules.points_to_win_set == 0 || rules.points_to_win_deciding_set == 0 {
            return Err(ConfigError::Rules("set thresholds must be positive"));
        }
        if rules.min_point_margin == 0 {
            return Err(ConfigError::Rules("min_point_margin must be positive"));
        }
        if rules.timeout_duration.is_negative()
            || rules.short_break.is_negative()
            || rules.long_break.is_negative()
        {
            return Err(ConfigError::Rules("durations cannot be negative"));
        }

        Ok(())
    }

    /// Roster lookup by number.
    pub fn player(&self, number: PlayerNumber) -> Option<&Player> {
        self.roster.iter().find(|player| player.number == number)
    }

    /// Whether `number` is either configured libero.
    pub fn is_libero(&self, number: PlayerNumber) -> bool {
        number == self.liberos.principal || number == self.liberos.reserve
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        let roster = default_roster();
        let default_lineup = Slot::ALL.into_iter().zip([1, 3, 6, 8, 11, 12]).collect();
        Self {
            home_name: "Home".into(),
            away_name: "Away".into(),
            roster,
            liberos: LiberoConfig {
                principal: 7,
                reserve: 9,
                spot_starter: 6,
            },
            first_server: Side::Home,
            default_lineup,
            rules: MatchRules::default(),
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default = "default_home_name")]
    home_name: String,
    #[serde(default = "default_away_name")]
    away_name: String,
    roster: Vec<RawPlayer>,
    liberos: RawLiberos,
    #[serde(default = "default_first_server")]
    first_server: Side,
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    #[serde(default)]
    default_lineup: BTreeMap<Slot, PlayerNumber>,
    #[serde(default)]
    rules: RawRules,
}

impl From<RawConfig> for MatchConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            home_name: value.home_name,
            away_name: value.away_name,
            roster: value.roster.into_iter().map(Into::into).collect(),
            liberos: LiberoConfig {
                principal: value.liberos.principal,
                reserve: value.liberos.reserve,
                spot_starter: value.liberos.spot_starter,
            },
            first_server: value.first_server,
            default_lineup: value.default_lineup,
            rules: value.rules.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a roster entry.
struct RawPlayer {
    number: PlayerNumber,
    name: String,
}

impl From<RawPlayer> for Player {
    fn from(value: RawPlayer) -> Self {
        Player::new(value.number, value.name)
    }
}

#[derive(Debug, Deserialize)]
struct RawLiberos {
    principal: PlayerNumber,
    reserve: PlayerNumber,
    spot_starter: PlayerNumber,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// Rule overrides; omitted keys keep the indoor defaults. Durations are in seconds.
struct RawRules {
    max_timeouts_per_set: u8,
    max_subs_per_set: u8,
    timeout_secs: i64,
    short_break_secs: i64,
    long_break_secs: i64,
    points_to_win_set: u8,
    points_to_win_deciding_set: u8,
    min_point_margin: u8,
    sets_to_win: u8,
}

impl Default for RawRules {
    fn default() -> Self {
        let rules = MatchRules::default();
        Self {
            max_timeouts_per_set: rules.max_timeouts_per_set,
            max_subs_per_set: rules.max_subs_per_set,
            timeout_secs: rules.timeout_duration.whole_seconds(),
            short_break_secs: rules.short_break.whole_seconds(),
            long_break_secs: rules.long_break.whole_seconds(),
            points_to_win_set: rules.points_to_win_set,
            points_to_win_deciding_set: rules.points_to_win_deciding_set,
            min_point_margin: rules.min_point_margin,
            sets_to_win: rules.sets_to_win,
        }
    }
}

impl From<RawRules> for MatchRules {
    fn from(value: RawRules) -> Self {
        Self {
            max_timeouts_per_set: value.max_timeouts_per_set,
            max_subs_per_set: value.max_subs_per_set,
            timeout_duration: Duration::seconds(value.timeout_secs),
            short_break: Duration::seconds(value.short_break_secs),
            long_break: Duration::seconds(value.long_break_secs),
            points_to_win_set: value.points_to_win_set,
            points_to_win_deciding_set: value.points_to_win_deciding_set,
            min_point_margin: value.min_point_margin,
            sets_to_win: value.sets_to_win,
        }
    }
}

fn default_home_name() -> String {
    MatchConfig::default().home_name
}

fn default_away_name() -> String {
    MatchConfig::default().away_name
}

fn default_first_server() -> Side {
    Side::Home
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in roster shipped with the binary.
fn default_roster() -> Vec<Player> {
    [
        (1, "Noah Gauthier"),
        (3, "Florent Riviere"),
        (6, "Hugo Barral"),
        (8, "Maxime Collet"),
        (9, "Kenji Sato"),
        (11, "Mehdi Zeroual"),
        (12, "Erwan Lebreton"),
        (13, "Timothee Bernard"),
        (15, "Ewan Tanguy"),
        (16, "Gaspard Roussel"),
        (7, "Mathis Vallet"),
    ]
    .into_iter()
    .map(|(number, name)| Player::new(number, name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = MatchConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.default_lineup.len(), 6);
        assert!(config.is_libero(7));
        assert!(config.is_libero(9));
    }

    #[test]
    fn deciding_set_uses_short_threshold_and_long_break() {
        let rules = MatchRules::default();
        assert_eq!(rules.deciding_set(), 5);
        assert_eq!(rules.threshold(1), 25);
        assert_eq!(rules.threshold(5), 15);
        assert_eq!(rules.break_before(2), Duration::seconds(180));
        assert_eq!(rules.break_before(5), Duration::seconds(300));
    }

    #[test]
    fn parses_string_slot_keys_and_partial_rules() {
        let json = r#"{
            "home_name": "Lions",
            "roster": [
                {"number": 2, "name": "A"}, {"number": 4, "name": "B"},
                {"number": 5, "name": "C"}, {"number": 10, "name": "D"},
                {"number": 14, "name": "E"}, {"number": 17, "name": "F"},
                {"number": 1, "name": "L1"}, {"number": 20, "name": "L2"}
            ],
            "liberos": {"principal": 1, "reserve": 20, "spot_starter": 5},
            "first_server": "away",
            "default_lineup": {"1": 2, "4": 10},
            "rules": {"sets_to_win": 2, "timeout_secs": 60}
        }"#;

        let config = MatchConfig::from_json(json).unwrap();

        assert_eq!(config.home_name, "Lions");
        assert_eq!(config.away_name, "Away");
        assert_eq!(config.first_server, Side::Away);
        assert_eq!(config.default_lineup.get(&Slot::FRONT_LEFT), Some(&10));
        assert_eq!(config.rules.deciding_set(), 3);
        assert_eq!(config.rules.timeout_duration, Duration::seconds(60));
        assert_eq!(config.rules.max_subs_per_set, 6);
    }

    #[test]
    fn rejects_libero_in_default_lineup() {
        let mut config = MatchConfig::default();
        config.default_lineup.insert(Slot::SERVER, 7);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DefaultLineup(_))
        ));
    }

    #[test]
    fn rejects_unknown_libero() {
        let mut config = MatchConfig::default();
        config.liberos.reserve = 42;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingFromRoster {
                role: "reserve libero",
                number: 42
            })
        );
    }

    #[test]
    fn rejects_out_of_range_sets_to_win() {
        for sets_to_win in [0, 10, 200] {
            let mut config = MatchConfig::default();
            config.rules.sets_to_win = sets_to_win;
            assert!(matches!(config.validate(), Err(ConfigError::Rules(_))));
        }

        let mut config = MatchConfig::default();
        config.rules.sets_to_win = 9;
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.rules.deciding_set(), 17);
    }

    #[test]
    fn rejects_invalid_slot_keys() {
        let json = r#"{
            "roster": [],
            "liberos": {"principal": 1, "reserve": 2, "spot_starter": 3},
            "default_lineup": {"7": 2}
        }"#;
        assert!(MatchConfig::from_json(json).is_err());
    }
}
