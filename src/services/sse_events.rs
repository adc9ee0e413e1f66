use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

use crate::{
    dto::{
        history::HistoryEntryView,
        match_state::MatchSnapshot,
        sse::{HistoryAppendedEvent, MatchUpdatedEvent, ServerEvent},
    },
    state::{SharedState, Snapshot, history::HistoryEntry},
};

pub(crate) const EVENT_MATCH_UPDATED: &str = "match.updated";
pub(crate) const EVENT_HISTORY_APPENDED: &str = "history.appended";
pub(crate) const EVENT_HANDSHAKE: &str = "handshake";

/// Broadcast the full match snapshot after a change.
pub fn broadcast_match_updated(state: &SharedState, snapshot: &Snapshot, now: OffsetDateTime) {
    let payload = MatchUpdatedEvent(MatchSnapshot::build(snapshot, state.config(), now));
    send_match_event(state, EVENT_MATCH_UPDATED, &payload);
}

/// Broadcast the history entries a command appended.
pub fn broadcast_history_appended(state: &SharedState, entries: &[HistoryEntry]) {
    let payload = HistoryAppendedEvent {
        entries: entries.iter().map(HistoryEntryView::from).collect(),
    };
    send_match_event(state, EVENT_HISTORY_APPENDED, &payload);
}

fn send_match_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.match_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize match SSE payload"),
    }
}
