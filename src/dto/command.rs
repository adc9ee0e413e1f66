//! Command payloads accepted by `POST /match/commands`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{history::HistoryEntryView, match_state::MatchSnapshot, validation::validate_player_number},
    state::{
        game::{PlayerNumber, Side, Slot},
        scoring::{Rating, Skill},
        state_machine::{Command, RuleViolation},
    },
};

/// Operator command, tagged by `type`.
#[serde_as]
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandRequest {
    /// Assign or clear home starting slots. Keys are slot numbers, `null` clears.
    SetupFormation {
        /// Slot → player number.
        #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
        #[schema(value_type = BTreeMap<String, Option<u8>>)]
        assignments: BTreeMap<Slot, Option<PlayerNumber>>,
    },
    /// Lock the starting lineup.
    ConfirmSetup,
    /// Rally won by `side`.
    AwardPoint {
        /// Winner of the rally.
        side: Side,
    },
    /// Timeout for `side`.
    RequestTimeout {
        /// Team calling the timeout.
        side: Side,
    },
    /// Open a substitution for `side`.
    InitiateSubstitution {
        /// Team substituting.
        side: Side,
    },
    /// Toggle the home player leaving from `slot`.
    SelectOutgoing {
        /// Court slot.
        slot: u8,
    },
    /// Toggle the home bench player entering.
    SelectIncoming {
        /// Bench player number.
        player_number: PlayerNumber,
    },
    /// Apply the pending substitution.
    ConfirmSubstitution,
    /// Drop the pending substitution.
    CancelSubstitution,
    /// Promote the reserve libero.
    SwapLiberoReserve,
    /// Open the libero dialog.
    InitiateLiberoExchange,
    /// Libero in at a back-row `slot`.
    ConfirmLiberoIn {
        /// Back-row slot.
        slot: u8,
    },
    /// Libero out.
    ConfirmLiberoOut,
    /// Close the libero dialog.
    CancelLiberoExchange,
    /// Statistic for the home player in `slot`.
    RecordAction {
        /// Court slot.
        slot: u8,
        /// Skill used.
        skill: Skill,
        /// Outcome.
        rating: Rating,
    },
}

impl Validate for CommandRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self {
            CommandRequest::SetupFormation { assignments } => {
                for number in assignments.values().flatten() {
                    if let Err(e) = validate_player_number(*number) {
                        errors.add("assignments", e);
                    }
                }
            }
            CommandRequest::SelectIncoming { player_number } => {
                if let Err(e) = validate_player_number(*player_number) {
                    errors.add("player_number", e);
                }
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl CommandRequest {
    /// Convert into an engine command; out-of-range slots are rule violations.
    pub fn into_command(self) -> Result<Command, RuleViolation> {
        let command = match self {
            CommandRequest::SetupFormation { assignments } => Command::SetupFormation(assignments),
            CommandRequest::ConfirmSetup => Command::ConfirmSetup,
            CommandRequest::AwardPoint { side } => Command::AwardPoint(side),
            CommandRequest::RequestTimeout { side } => Command::RequestTimeout(side),
            CommandRequest::InitiateSubstitution { side } => Command::InitiateSubstitution(side),
            CommandRequest::SelectOutgoing { slot } => Command::SelectOutgoing(Slot::new(slot)?),
            CommandRequest::SelectIncoming { player_number } => {
                Command::SelectIncoming(player_number)
            }
            CommandRequest::ConfirmSubstitution => Command::ConfirmSubstitution,
            CommandRequest::CancelSubstitution => Command::CancelSubstitution,
            CommandRequest::SwapLiberoReserve => Command::SwapLiberoReserve,
            CommandRequest::InitiateLiberoExchange => Command::InitiateLiberoExchange,
            CommandRequest::ConfirmLiberoIn { slot } => Command::ConfirmLiberoIn(Slot::new(slot)?),
            CommandRequest::ConfirmLiberoOut => Command::ConfirmLiberoOut,
            CommandRequest::CancelLiberoExchange => Command::CancelLiberoExchange,
            CommandRequest::RecordAction {
                slot,
                skill,
                rating,
            } => Command::RecordAction {
                slot: Slot::new(slot)?,
                skill,
                rating,
            },
        };
        Ok(command)
    }
}

/// Result of an accepted command.
#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse {
    /// Match after the command.
    pub snapshot: MatchSnapshot,
    /// Entries the command appended, newest first.
    pub history: Vec<HistoryEntryView>,
}
