//! Libero bookkeeping for the home team: reserve swap, exchanges with a back-row
//! starter, and the automatic exit when rotation reaches the front row.

use time::OffsetDateTime;

use crate::{
    config::LiberoConfig,
    state::{
        game::{Lineup, Player, PlayerNumber, Slot},
        history::ActionCode,
        match_state::{MatchState, PendingSelection},
        state_machine::RuleViolation,
    },
};

/// Active/reserve libero pair and on-court tracking.
///
/// While `on_court` is true, `starter_replaced` and `court_position` are both set and
/// the active libero stands in `court_position`; otherwise both are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiberoStatus {
    /// Libero currently allowed to play.
    pub active_number: PlayerNumber,
    /// Second libero (or the retired one once the reserve was activated).
    pub reserve_number: PlayerNumber,
    /// Whether the active libero is on court.
    pub on_court: bool,
    /// Starter waiting on the bench for the libero to leave.
    pub starter_replaced: Option<PlayerNumber>,
    /// Slot held by the libero.
    pub court_position: Option<Slot>,
    /// Reserve activation is one-shot for the whole match.
    pub reserve_used: bool,
    /// Starter the libero usually replaces.
    pub spot_starter_number: PlayerNumber,
}

/// Effect of a libero transition, used to write history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiberoChange {
    /// Reserve libero promoted.
    ReserveActivated {
        /// New active libero.
        active: PlayerNumber,
        /// Libero who may not return.
        retired: PlayerNumber,
    },
    /// Libero replaced a starter.
    Entered {
        /// Slot taken.
        slot: Slot,
        /// Libero entering.
        libero: Player,
        /// Starter sent to the bench.
        starter: Player,
    },
    /// Starter took its slot back.
    Left {
        /// Slot released.
        slot: Slot,
        /// Libero leaving.
        libero: Player,
        /// Starter returning.
        starter: Player,
        /// Triggered by rotation rather than by the operator.
        forced: bool,
    },
}

impl LiberoStatus {
    /// Off-court status with the configured libero pair.
    pub fn new(config: &LiberoConfig) -> Self {
        Self {
            active_number: config.principal,
            reserve_number: config.reserve,
            on_court: false,
            starter_replaced: None,
            court_position: None,
            reserve_used: false,
            spot_starter_number: config.spot_starter,
        }
    }

    /// Whether `number` belongs to either libero.
    pub fn is_libero(&self, number: PlayerNumber) -> bool {
        number == self.active_number || number == self.reserve_number
    }

    /// Promote the reserve libero. Allowed once, with both liberos on the bench.
    pub fn swap_active_reserve(&mut self) -> Result<LiberoChange, RuleViolation> {
        if self.on_court {
            return Err(RuleViolation::LiberoOnCourt);
        }
        if self.reserve_used {
            return Err(RuleViolation::ReserveAlreadyUsed);
        }

        std::mem::swap(&mut self.active_number, &mut self.reserve_number);
        self.reserve_used = true;

        Ok(LiberoChange::ReserveActivated {
            active: self.active_number,
            retired: self.reserve_number,
        })
    }

    /// Send the active libero into back-row `slot` in place of its starter.
    pub fn libero_in(
        &mut self,
        lineup: &mut Lineup,
        slot: Slot,
    ) -> Result<LiberoChange, RuleViolation> {
        if self.on_court {
            return Err(RuleViolation::LiberoOnCourt);
        }
        if !slot.is_back_row() {
            return Err(RuleViolation::InvalidSlot(slot.get()));
        }
        let occupant = lineup.formation.player(slot).number;
        if self.is_libero(occupant) {
            return Err(RuleViolation::LiberoInvolved(occupant));
        }

        let starter = lineup.swap_with_bench(slot, self.active_number)?;
        let libero = lineup.formation.player(slot).clone();

        self.on_court = true;
        self.starter_replaced = Some(starter.number);
        self.court_position = Some(slot);

        Ok(LiberoChange::Entered {
            slot,
            libero,
            starter,
        })
    }

    /// Bring the replaced starter back; exact inverse of [`Self::libero_in`].
    pub fn libero_out(&mut self, lineup: &mut Lineup) -> Result<LiberoChange, RuleViolation> {
        self.release(lineup, false)
    }

    /// Run right after a rotation: a libero that reached slot 4 leaves automatically.
    ///
    /// Returns `None` when nothing had to happen.
    pub fn forced_out_on_rotation(
        &mut self,
        lineup: &mut Lineup,
    ) -> Result<Option<LiberoChange>, RuleViolation> {
        if !self.on_court || lineup.formation.player(Slot::FRONT_LEFT).number != self.active_number
        {
            return Ok(None);
        }

        self.court_position = Some(Slot::FRONT_LEFT);
        self.release(lineup, true).map(Some)
    }

    /// Follow the libero through a rotation it survived.
    pub fn track_position_after_rotation(&mut self, lineup: &Lineup) {
        if !self.on_court {
            return;
        }
        self.court_position = self.court_position.map(Slot::after_rotation);
        debug_assert_eq!(
            self.court_position,
            lineup.formation.slot_of(self.active_number),
            "libero tracking drifted from the formation"
        );
    }

    /// Back-row slot currently held by the usual spot starter, if any.
    pub fn suggested_slot(&self, lineup: &Lineup) -> Option<Slot> {
        if self.on_court {
            return None;
        }
        lineup
            .formation
            .slot_of(self.spot_starter_number)
            .filter(|slot| slot.is_back_row())
    }

    fn release(&mut self, lineup: &mut Lineup, forced: bool) -> Result<LiberoChange, RuleViolation> {
        if !self.on_court {
            return Err(RuleViolation::LiberoNotOnCourt);
        }
        let (Some(starter_number), Some(slot)) = (self.starter_replaced, self.court_position) else {
            return Err(RuleViolation::UnknownPlayer(self.active_number));
        };
        if lineup.formation.player(slot).number != self.active_number {
            return Err(RuleViolation::UnknownPlayer(self.active_number));
        }

        let libero = lineup.swap_with_bench(slot, starter_number)?;
        let starter = lineup.formation.player(slot).clone();

        self.on_court = false;
        self.starter_replaced = None;
        self.court_position = None;

        Ok(LiberoChange::Left {
            slot,
            libero,
            starter,
            forced,
        })
    }
}

impl MatchState {
    /// Promote the reserve libero and log it.
    pub fn swap_libero_reserve(&mut self, now: OffsetDateTime) -> Result<(), RuleViolation> {
        let change = self.libero.swap_active_reserve()?;
        self.record_libero(change, now);
        Ok(())
    }

    /// Open the libero exchange dialog. Not allowed during a timeout or set break.
    pub fn initiate_libero_exchange(&mut self, now: OffsetDateTime) -> Result<(), RuleViolation> {
        if self.pending.is_some() {
            return Err(RuleViolation::SelectionPending);
        }
        self.ensure_no_timer(now)?;
        self.pending = Some(PendingSelection::LiberoExchange);
        Ok(())
    }

    /// Libero in at `slot`, closing the exchange dialog.
    pub fn confirm_libero_in(
        &mut self,
        slot: Slot,
        now: OffsetDateTime,
    ) -> Result<(), RuleViolation> {
        self.expect_libero_exchange()?;
        let change = self.libero.libero_in(&mut self.home, slot)?;
        self.pending = None;
        self.record_libero(change, now);
        Ok(())
    }

    /// Libero out, closing the exchange dialog.
    pub fn confirm_libero_out(&mut self, now: OffsetDateTime) -> Result<(), RuleViolation> {
        self.expect_libero_exchange()?;
        let change = self.libero.libero_out(&mut self.home)?;
        self.pending = None;
        self.record_libero(change, now);
        Ok(())
    }

    /// Close the exchange dialog without changes.
    pub fn cancel_libero_exchange(&mut self) -> Result<(), RuleViolation> {
        self.expect_libero_exchange()?;
        self.pending = None;
        Ok(())
    }

    pub(crate) fn record_libero(&mut self, change: LiberoChange, now: OffsetDateTime) {
        match change {
            LiberoChange::ReserveActivated { active, retired } => self.record(
                now,
                None,
                format!("L{retired} OUT (rule)"),
                ActionCode::LiberoSwapReserve,
                format!("L{active} becomes active"),
            ),
            LiberoChange::Entered {
                slot,
                libero,
                starter,
            } => self.record(
                now,
                Some(slot),
                format!("#{} (OUT)", starter.number),
                ActionCode::LiberoIn,
                format!("IN: L{}", libero.number),
            ),
            LiberoChange::Left {
                slot,
                libero,
                starter,
                forced,
            } => {
                let action = if forced {
                    ActionCode::LiberoAutoOut
                } else {
                    ActionCode::LiberoOut
                };
                self.record(
                    now,
                    Some(slot),
                    format!("L{} (OUT)", libero.number),
                    action,
                    format!("IN: #{}", starter.number),
                )
            }
        }
    }

    fn expect_libero_exchange(&self) -> Result<(), RuleViolation> {
        match self.pending {
            Some(PendingSelection::LiberoExchange) => Ok(()),
            _ => Err(RuleViolation::NoPendingSelection),
        }
    }
}
