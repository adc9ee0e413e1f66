//! Regular (non-libero) substitutions: per-set quota, libero exclusion and the
//! two-step select/confirm flow.

use time::OffsetDateTime;

use crate::state::{
    game::{PlayerNumber, Side, Slot},
    history::ActionCode,
    match_state::{MatchState, PendingSelection},
    state_machine::{Quota, RuleViolation},
};

/// Substitution being composed for one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionDraft {
    /// Team substituting.
    pub side: Side,
    /// Slot of the player leaving.
    pub outgoing: Option<Slot>,
    /// Bench player entering.
    pub incoming: Option<PlayerNumber>,
}

impl SubstitutionDraft {
    fn new(side: Side) -> Self {
        Self {
            side,
            outgoing: None,
            incoming: None,
        }
    }

    fn toggle_outgoing(&mut self, slot: Slot) {
        self.outgoing = if self.outgoing == Some(slot) {
            None
        } else {
            Some(slot)
        };
    }

    fn toggle_incoming(&mut self, number: PlayerNumber) {
        self.incoming = if self.incoming == Some(number) {
            None
        } else {
            Some(number)
        };
    }
}

impl MatchState {
    /// Open a substitution for `side`. Not allowed during a timeout or set break.
    pub fn initiate_substitution(
        &mut self,
        side: Side,
        now: OffsetDateTime,
    ) -> Result<(), RuleViolation> {
        if self.pending.is_some() {
            return Err(RuleViolation::SelectionPending);
        }
        self.ensure_no_timer(now)?;
        if self.substitutions[side] >= self.rules.max_subs_per_set {
            return Err(RuleViolation::QuotaExceeded {
                side,
                quota: Quota::Substitutions,
            });
        }
        self.pending = Some(PendingSelection::Substitution(SubstitutionDraft::new(side)));
        Ok(())
    }

    /// Pick (or un-pick) the home player leaving from `slot`.
    pub fn select_outgoing(&mut self, slot: Slot) -> Result<(), RuleViolation> {
        self.home_draft_mut()?.toggle_outgoing(slot);
        Ok(())
    }

    /// Pick (or un-pick) the bench player entering.
    pub fn select_incoming(&mut self, number: PlayerNumber) -> Result<(), RuleViolation> {
        if !self.home.bench.contains(number) {
            return Err(RuleViolation::UnknownPlayer(number));
        }
        self.home_draft_mut()?.toggle_incoming(number);
        Ok(())
    }

    /// Apply the pending substitution and close it.
    pub fn confirm_substitution(&mut self, now: OffsetDateTime) -> Result<(), RuleViolation> {
        let Some(PendingSelection::Substitution(draft)) = self.pending.clone() else {
            return Err(RuleViolation::NoPendingSelection);
        };

        match draft.side {
            Side::Away => {
                self.pending = None;
                self.substitutions.away += 1;
                let team = self.team_names.away.clone();
                let result = format!("{}/{}", self.substitutions.away, self.rules.max_subs_per_set);
                self.record(now, None, team, ActionCode::OpponentSubstitution, result);
            }
            Side::Home => {
                let (Some(slot), Some(incoming)) = (draft.outgoing, draft.incoming) else {
                    return Err(RuleViolation::IncompleteSelection);
                };
                let outgoing = self.home.formation.player(slot).number;
                for number in [outgoing, incoming] {
                    if self.libero.is_libero(number) {
                        return Err(RuleViolation::LiberoInvolved(number));
                    }
                }
                if self.libero.on_court && self.libero.starter_replaced == Some(incoming) {
                    return Err(RuleViolation::StarterBlockedByLibero(incoming));
                }

                let leaving = self.home.swap_with_bench(slot, incoming)?;
                let entering = self.home.formation.player(slot).name.clone();
                self.pending = None;
                self.substitutions.home += 1;
                self.record(
                    now,
                    Some(slot),
                    format!("{} (OUT)", leaving.name),
                    ActionCode::Substitution,
                    format!("IN: {entering}"),
                );
            }
        }
        Ok(())
    }

    /// Drop the pending substitution without applying it.
    pub fn cancel_substitution(&mut self) -> Result<(), RuleViolation> {
        match self.pending {
            Some(PendingSelection::Substitution(_)) => {
                self.pending = None;
                Ok(())
            }
            _ => Err(RuleViolation::NoPendingSelection),
        }
    }

    /// Forget a pending substitution after a failed confirm.
    pub(crate) fn discard_substitution_draft(&mut self) {
        if matches!(self.pending, Some(PendingSelection::Substitution(_))) {
            self.pending = None;
        }
    }

    fn home_draft_mut(&mut self) -> Result<&mut SubstitutionDraft, RuleViolation> {
        match &mut self.pending {
            Some(PendingSelection::Substitution(draft)) if draft.side == Side::Home => Ok(draft),
            _ => Err(RuleViolation::NoPendingSelection),
        }
    }
}
