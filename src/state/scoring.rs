//! Rally scoring, side-out rotation, set and match termination, timeouts and breaks.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

use crate::state::{
    game::{PerSide, Side, Slot},
    history::ActionCode,
    match_state::MatchState,
    rotation::rotate,
    state_machine::{Quota, RuleViolation},
};

/// Rally points in a set; a deuce has no upper bound.
pub type Points = u16;

/// Player skill recorded in the statistics log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    /// Serve.
    Serve,
    /// Serve reception.
    Reception,
    /// Attack.
    Attack,
    /// Block.
    Block,
}

impl Skill {
    /// History action code.
    pub fn code(self) -> &'static str {
        match self {
            Skill::Serve => "SVC",
            Skill::Reception => "REC",
            Skill::Attack => "ATK",
            Skill::Block => "BLK",
        }
    }
}

/// Quality of a recorded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    /// Best outcome (ace, perfect pass, kill, stuff block).
    Winning,
    /// Ball stays in play.
    Neutral,
    /// Error.
    Fault,
}

impl Rating {
    /// Result string stored in history for `skill`.
    pub fn result_code(self, skill: Skill) -> &'static str {
        match (skill, self) {
            (_, Rating::Fault) => "FAULT",
            (Skill::Serve, Rating::Winning) => "ACE",
            (Skill::Reception, Rating::Winning) => "PERFECT",
            (Skill::Attack, Rating::Winning) => "KILL",
            (Skill::Block, Rating::Winning) => "POINT",
            (Skill::Attack, Rating::Neutral) => "TOOLED",
            (Skill::Block, Rating::Neutral) => "TOUCH",
            (_, Rating::Neutral) => "OK",
        }
    }

    /// Whether the action ends the rally in favor of the home team.
    pub fn wins_rally(self, skill: Skill) -> bool {
        self == Rating::Winning && skill != Skill::Reception
    }
}

/// What the running clock is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Team timeout.
    Timeout,
    /// Break between two sets.
    SetBreak,
}

/// Countdown stored as absolute timestamps; cleared by `TickTimer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTimer {
    /// Kind of pause.
    pub kind: TimerKind,
    /// When the pause started.
    pub started_at: OffsetDateTime,
    /// When the pause is over.
    pub ends_at: OffsetDateTime,
}

impl ActiveTimer {
    /// Timer of `duration` starting at `now`.
    pub fn start(kind: TimerKind, now: OffsetDateTime, duration: Duration) -> Self {
        Self {
            kind,
            started_at: now,
            ends_at: now + duration,
        }
    }

    /// Whether the countdown has not reached its end at `now`.
    pub fn is_running(&self, now: OffsetDateTime) -> bool {
        now < self.ends_at
    }

    /// Time left at `now`, never negative.
    pub fn remaining(&self, now: OffsetDateTime) -> Duration {
        (self.ends_at - now).max(Duration::ZERO)
    }
}

impl MatchState {
    /// Give the rally to `side`.
    ///
    /// A receiving side that wins takes the serve and rotates; for the home team the
    /// libero is then sent off if it reached slot 4, or its position is tracked.
    pub fn award_point(&mut self, side: Side, now: OffsetDateTime) -> Result<(), RuleViolation> {
        if self.is_finished() {
            return Err(RuleViolation::MatchAlreadyEnded);
        }

        self.score[side] = self.score[side]
            .checked_add(1)
            .ok_or(RuleViolation::ScoreLimitReached(side))?;
        let team = self.team_names[side].clone();

        if side == self.serving {
            self.record(now, None, team, ActionCode::Point, "serve kept".into());
        } else {
            self.serving = side;
            let lineup = self.lineup_mut(side);
            lineup.formation = rotate(&lineup.formation);
            self.rotation_count += 1;
            self.record(
                now,
                None,
                team,
                ActionCode::SideOut,
                format!("rotation {}", self.rotation_count),
            );

            if side == Side::Home {
                if let Some(change) = self.libero.forced_out_on_rotation(&mut self.home)? {
                    self.record_libero(change, now);
                }
                self.libero.track_position_after_rotation(&self.home);
            }
        }

        if let Some(winner) = self.set_winner() {
            self.on_set_end(winner, now);
        }
        Ok(())
    }

    /// Start a timeout for `side`.
    pub fn request_timeout(&mut self, side: Side, now: OffsetDateTime) -> Result<(), RuleViolation> {
        if self.timeouts[side] >= self.rules.max_timeouts_per_set {
            return Err(RuleViolation::QuotaExceeded {
                side,
                quota: Quota::Timeouts,
            });
        }
        self.ensure_no_timer(now)?;

        self.timeouts[side] += 1;
        self.timer = Some(ActiveTimer::start(
            TimerKind::Timeout,
            now,
            self.rules.timeout_duration,
        ));
        let team = self.team_names[side].clone();
        let result = format!("{}/{}", self.timeouts[side], self.rules.max_timeouts_per_set);
        self.record(now, None, team, ActionCode::Timeout, result);
        Ok(())
    }

    /// Refuse with [`RuleViolation::TimerActive`] while a timeout or break runs at `now`.
    pub(crate) fn ensure_no_timer(&self, now: OffsetDateTime) -> Result<(), RuleViolation> {
        if self.timer.is_some_and(|timer| timer.is_running(now)) {
            return Err(RuleViolation::TimerActive);
        }
        Ok(())
    }

    /// Clear the timer once its end is reached. Returns whether anything changed.
    pub fn tick_timer(&mut self, now: OffsetDateTime) -> bool {
        match self.timer {
            Some(timer) if !timer.is_running(now) => {
                self.timer = None;
                true
            }
            _ => false,
        }
    }

    /// Log a home player's action; rally-winning actions also score for home.
    pub fn record_action(
        &mut self,
        slot: Slot,
        skill: Skill,
        rating: Rating,
        now: OffsetDateTime,
    ) -> Result<(), RuleViolation> {
        if self.is_finished() {
            return Err(RuleViolation::MatchAlreadyEnded);
        }

        let player = self.home.formation.player(slot).clone();
        self.record(
            now,
            Some(slot),
            player.name,
            ActionCode::Stat(skill),
            rating.result_code(skill).into(),
        );

        if rating.wins_rally(skill) {
            self.award_point(Side::Home, now)?;
        }
        Ok(())
    }

    fn set_winner(&self) -> Option<Side> {
        let threshold = self.rules.threshold(self.current_set);
        Side::BOTH.into_iter().find(|&side| {
            let own = self.score[side];
            let other = self.score[side.opponent()];
            own >= Points::from(threshold)
                && own.saturating_sub(other) >= Points::from(self.rules.min_point_margin)
        })
    }

    fn on_set_end(&mut self, winner: Side, now: OffsetDateTime) {
        self.sets_won[winner] += 1;
        let team = self.team_names[winner].clone();
        self.record(
            now,
            None,
            team.clone(),
            ActionCode::SetEnd,
            format!("set {} won {}", self.current_set, self.score_line()),
        );

        if self.sets_won[winner] >= self.rules.sets_to_win {
            self.winner = Some(winner);
            self.pending = None;
            self.timer = None;
            let sets = format!("{}-{}", self.sets_won.home, self.sets_won.away);
            self.record(now, None, team, ActionCode::MatchEnd, sets);
            return;
        }

        self.current_set += 1;
        self.score = PerSide::default();
        self.timeouts = PerSide::default();
        self.substitutions = PerSide::default();
        self.pending = None;
        self.timer = Some(ActiveTimer::start(
            TimerKind::SetBreak,
            now,
            self.rules.break_before(self.current_set),
        ));
    }
}
