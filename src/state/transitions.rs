use time::OffsetDateTime;

use crate::{
    services::sse_events::{broadcast_history_appended, broadcast_match_updated},
    state::{CommandOutcome, SharedState, state_machine::Command},
};

/// Apply a command, then broadcast the new snapshot and any history it produced.
pub async fn run_command_with_broadcast(
    state: &SharedState,
    command: Command,
    now: OffsetDateTime,
) -> CommandOutcome {
    let outcome = state.run_command(command, now).await;
    if outcome.changed {
        broadcast_match_updated(state, &outcome.snapshot, now);
    }
    if let Ok(entries) = &outcome.result
        && !entries.is_empty()
    {
        broadcast_history_appended(state, entries);
    }
    outcome
}
