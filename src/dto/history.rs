use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{dto::format_timestamp, state::history::HistoryEntry};

/// Default page size of `GET /match/history`.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Query string of `GET /match/history`.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct HistoryQuery {
    /// Number of newest entries to return (1 to 500, default 50).
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
}

/// One history row as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryEntryView {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Set the entry belongs to.
    pub set: u8,
    /// Set score at the time, home first.
    pub score: String,
    /// Court slot, when a player position is involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u8>,
    /// Player or team concerned.
    pub player: String,
    /// Action code such as `SIDE_OUT` or `LIBERO_AUTO_OUT`.
    pub action: String,
    /// Outcome text.
    pub result: String,
}

impl From<&HistoryEntry> for HistoryEntryView {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            timestamp: format_timestamp(entry.timestamp),
            set: entry.set_number,
            score: entry.score.to_string(),
            slot: entry.slot.map(u8::from),
            player: entry.player_name.clone(),
            action: entry.action.code().to_string(),
            result: entry.result.clone(),
        }
    }
}

/// Page of history entries, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryPage {
    /// Entries recorded since setup confirmation.
    pub total: usize,
    /// Newest entries.
    pub entries: Vec<HistoryEntryView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_must_stay_in_range() {
        assert!(HistoryQuery { limit: None }.validate().is_ok());
        assert!(HistoryQuery { limit: Some(500) }.validate().is_ok());
        assert!(HistoryQuery { limit: Some(0) }.validate().is_err());
        assert!(HistoryQuery { limit: Some(501) }.validate().is_err());
    }
}
