use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::{
    dto::{
        command::{CommandRequest, CommandResponse},
        history::{DEFAULT_HISTORY_LIMIT, HistoryEntryView, HistoryPage},
        match_state::MatchSnapshot,
    },
    error::ServiceError,
    state::{
        SharedState,
        state_machine::{Command, RuleViolation},
        transitions::run_command_with_broadcast,
    },
};

/// Apply an operator command and return the new snapshot plus the history it produced.
pub async fn dispatch(
    state: &SharedState,
    request: CommandRequest,
) -> Result<CommandResponse, ServiceError> {
    let command = request.into_command().inspect_err(|violation| {
        warn!(code = violation.code(), error = %violation, "command payload refused");
    })?;
    let now = OffsetDateTime::now_utc();
    let name = command.name();

    let outcome = run_command_with_broadcast(state, command, now).await;
    match outcome.result {
        Ok(entries) => {
            info!(
                command = name,
                version = outcome.snapshot.version,
                entries = entries.len(),
                "command applied"
            );
            Ok(CommandResponse {
                snapshot: MatchSnapshot::build(&outcome.snapshot, state.config(), now),
                history: entries.iter().map(HistoryEntryView::from).collect(),
            })
        }
        Err(violation) => {
            log_violation(name, &violation);
            Err(violation.into())
        }
    }
}

/// Current match snapshot.
pub async fn snapshot(state: &SharedState) -> MatchSnapshot {
    let snapshot = state.snapshot().await;
    MatchSnapshot::build(&snapshot, state.config(), OffsetDateTime::now_utc())
}

/// Newest `limit` history entries. Empty during setup.
pub async fn history(state: &SharedState, limit: Option<usize>) -> HistoryPage {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    state
        .read_phase(|phase| match phase.live() {
            Some(live) => HistoryPage {
                total: live.history.len(),
                entries: live
                    .history
                    .iter()
                    .take(limit)
                    .map(HistoryEntryView::from)
                    .collect(),
            },
            None => HistoryPage {
                total: 0,
                entries: Vec::new(),
            },
        })
        .await
}

/// Deliver a clock tick so expired timeouts and breaks are cleared.
pub async fn tick_timer(state: &SharedState, now: OffsetDateTime) {
    let outcome = run_command_with_broadcast(state, Command::TickTimer(now), now).await;
    match outcome.result {
        Ok(_) if outcome.changed => info!(version = outcome.snapshot.version, "timer expired"),
        Ok(_) => debug!("timer tick without change"),
        Err(violation) => log_violation("tick_timer", &violation),
    }
}

fn log_violation(command: &str, violation: &RuleViolation) {
    if violation.is_programmer_error() {
        error!(
            command,
            code = violation.code(),
            error = %violation,
            "command referenced a player the engine does not know"
        );
    } else {
        warn!(
            command,
            code = violation.code(),
            error = %violation,
            "command rejected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::MatchConfig, state::AppState};

    #[tokio::test]
    async fn dispatch_returns_snapshot_and_history_delta() {
        let state = AppState::new(MatchConfig::default());

        let response = dispatch(&state, CommandRequest::ConfirmSetup).await.unwrap();
        assert_eq!(response.history.len(), 1);
        assert_eq!(response.history[0].action, "START");
        assert!(response.snapshot.live.is_some());

        let response = dispatch(
            &state,
            CommandRequest::AwardPoint {
                side: crate::state::game::Side::Away,
            },
        )
        .await
        .unwrap();
        let actions: Vec<_> = response.history.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["SIDE_OUT"]);
    }

    #[tokio::test]
    async fn dispatch_surfaces_rule_violations() {
        let state = AppState::new(MatchConfig::default());

        let err = dispatch(&state, CommandRequest::SwapLiberoReserve)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rule(RuleViolation::SetupIncomplete)
        ));
    }

    #[tokio::test]
    async fn history_is_empty_before_setup() {
        let state = AppState::new(MatchConfig::default());
        let page = history(&state, None).await;
        assert_eq!(page.total, 0);
        assert!(page.entries.is_empty());

        dispatch(&state, CommandRequest::ConfirmSetup).await.unwrap();
        let page = history(&state, Some(1)).await;
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn tick_timer_clears_expired_timeout() {
        let state = AppState::new(MatchConfig::default());
        dispatch(&state, CommandRequest::ConfirmSetup).await.unwrap();
        dispatch(
            &state,
            CommandRequest::RequestTimeout {
                side: crate::state::game::Side::Home,
            },
        )
        .await
        .unwrap();

        tick_timer(&state, OffsetDateTime::now_utc() + time::Duration::minutes(1)).await;

        let cleared = state
            .read_phase(|phase| phase.live().is_some_and(|live| live.timer.is_none()))
            .await;
        assert!(cleared);
    }
}
