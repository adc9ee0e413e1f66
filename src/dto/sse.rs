use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{history::HistoryEntryView, match_state::MatchSnapshot};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE `event:` name, if any.
    pub event: Option<String>,
    /// Serialised JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Current state so the client does not need a separate fetch.
    pub snapshot: MatchSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the match state changes.
pub struct MatchUpdatedEvent(pub MatchSnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a command appended history entries.
pub struct HistoryAppendedEvent {
    /// New entries, newest first.
    pub entries: Vec<HistoryEntryView>,
}
