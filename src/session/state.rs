//! Loading flags, scoped error slots and the last known backend snapshot.
//!
//! Each operation class owns one flag. Ingest, clear and status share the
//! action error slot; queries report into their own slot so a failed answer
//! never hides an upload error and vice versa.

use std::fmt;

use serde::Serialize;

use super::conversation::Conversation;
use crate::backend::{IngestResponse, StatusResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpClass {
    Ingest,
    Clear,
    Query,
    Status,
}

impl fmt::Display for OpClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpClass::Ingest => write!(f, "ingest"),
            OpClass::Clear => write!(f, "clear"),
            OpClass::Query => write!(f, "query"),
            OpClass::Status => write!(f, "status"),
        }
    }
}

impl OpClass {
    pub fn error_scope(self) -> ErrorScope {
        match self {
            OpClass::Query => ErrorScope::Query,
            OpClass::Ingest | OpClass::Clear | OpClass::Status => ErrorScope::Action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Ingest, clear and status refresh.
    Action,
    Query,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadingFlags {
    pub ingesting: bool,
    pub clearing: bool,
    pub refreshing_status: bool,
    pub querying: bool,
}

impl LoadingFlags {
    pub fn get(&self, class: OpClass) -> bool {
        match class {
            OpClass::Ingest => self.ingesting,
            OpClass::Clear => self.clearing,
            OpClass::Query => self.querying,
            OpClass::Status => self.refreshing_status,
        }
    }

    fn set(&mut self, class: OpClass, value: bool) {
        let flag = match class {
            OpClass::Ingest => &mut self.ingesting,
            OpClass::Clear => &mut self.clearing,
            OpClass::Query => &mut self.querying,
            OpClass::Status => &mut self.refreshing_status,
        };
        *flag = value;
    }

    pub fn any(&self) -> bool {
        self.ingesting || self.clearing || self.refreshing_status || self.querying
    }
}

/// How the most recent call of a class resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// Last resolution per class; `None` while in flight or before the first call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Outcomes {
    pub ingest: Option<Outcome>,
    pub clear: Option<Outcome>,
    pub query: Option<Outcome>,
    pub status: Option<Outcome>,
}

impl Outcomes {
    pub fn get(&self, class: OpClass) -> Option<Outcome> {
        match class {
            OpClass::Ingest => self.ingest,
            OpClass::Clear => self.clear,
            OpClass::Query => self.query,
            OpClass::Status => self.status,
        }
    }

    fn set(&mut self, class: OpClass, value: Option<Outcome>) {
        let slot = match class {
            OpClass::Ingest => &mut self.ingest,
            OpClass::Clear => &mut self.clear,
            OpClass::Query => &mut self.query,
            OpClass::Status => &mut self.status,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub loading: LoadingFlags,
    pub outcomes: Outcomes,
    pub action_error: Option<String>,
    pub query_error: Option<String>,
    /// Last successfully fetched snapshot, replaced whole or not at all.
    pub status: Option<StatusResponse>,
    pub last_ingest: Option<IngestResponse>,
    pub conversation: Conversation,
}

impl SessionState {
    pub fn is_loading(&self, class: OpClass) -> bool {
        self.loading.get(class)
    }

    pub fn outcome(&self, class: OpClass) -> Option<Outcome> {
        self.outcomes.get(class)
    }

    /// The ingest report, but only if the latest upload produced it.
    pub fn current_ingest(&self) -> Option<&IngestResponse> {
        match self.outcome(OpClass::Ingest) {
            Some(Outcome::Succeeded) => self.last_ingest.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self, scope: ErrorScope) -> Option<&str> {
        match scope {
            ErrorScope::Action => self.action_error.as_deref(),
            ErrorScope::Query => self.query_error.as_deref(),
        }
    }

    fn error_slot(&mut self, scope: ErrorScope) -> &mut Option<String> {
        match scope {
            ErrorScope::Action => &mut self.action_error,
            ErrorScope::Query => &mut self.query_error,
        }
    }

    /// Idle -> InFlight.
    pub(crate) fn begin(&mut self, class: OpClass) {
        self.loading.set(class, true);
        self.outcomes.set(class, None);
        *self.error_slot(class.error_scope()) = None;
    }

    /// InFlight -> Idle after success.
    pub(crate) fn succeed(&mut self, class: OpClass) {
        self.loading.set(class, false);
        self.outcomes.set(class, Some(Outcome::Succeeded));
    }

    /// InFlight -> Idle after failure.
    pub(crate) fn fail(&mut self, class: OpClass, message: String) {
        self.loading.set(class, false);
        self.outcomes.set(class, Some(Outcome::Failed));
        *self.error_slot(class.error_scope()) = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_scopes() {
        assert_eq!(OpClass::Ingest.error_scope(), ErrorScope::Action);
        assert_eq!(OpClass::Clear.error_scope(), ErrorScope::Action);
        assert_eq!(OpClass::Status.error_scope(), ErrorScope::Action);
        assert_eq!(OpClass::Query.error_scope(), ErrorScope::Query);
    }

    #[test]
    fn test_begin_clears_only_own_slot() {
        let mut state = SessionState {
            action_error: Some("upload failed".into()),
            query_error: Some("no answer".into()),
            ..Default::default()
        };

        state.begin(OpClass::Query);
        assert!(state.loading.querying);
        assert!(state.query_error.is_none());
        assert_eq!(state.error(ErrorScope::Action), Some("upload failed"));
    }

    #[test]
    fn test_flags_are_independent() {
        let mut state = SessionState::default();
        state.begin(OpClass::Ingest);
        state.begin(OpClass::Query);
        state.fail(OpClass::Query, "boom".into());

        assert!(state.is_loading(OpClass::Ingest));
        assert!(!state.is_loading(OpClass::Query));
        assert!(state.action_error.is_none());
        assert_eq!(state.error(ErrorScope::Query), Some("boom"));

        state.succeed(OpClass::Ingest);
        assert!(!state.loading.any());
    }

    #[test]
    fn test_outcome_tracks_latest_call() {
        let mut state = SessionState::default();
        assert_eq!(state.outcome(OpClass::Ingest), None);

        state.begin(OpClass::Ingest);
        state.succeed(OpClass::Ingest);
        assert_eq!(state.outcome(OpClass::Ingest), Some(Outcome::Succeeded));

        state.begin(OpClass::Ingest);
        assert_eq!(state.outcome(OpClass::Ingest), None);
        state.fail(OpClass::Ingest, "boom".into());
        assert_eq!(state.outcome(OpClass::Ingest), Some(Outcome::Failed));
        assert_eq!(state.outcome(OpClass::Status), None);
    }

    #[test]
    fn test_current_ingest_hides_stale_report() {
        let report = IngestResponse {
            results: Vec::new(),
            total_chunks: 3,
        };
        let mut state = SessionState {
            last_ingest: Some(report.clone()),
            outcomes: Outcomes {
                ingest: Some(Outcome::Succeeded),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(state.current_ingest(), Some(&report));

        state.begin(OpClass::Ingest);
        state.fail(OpClass::Ingest, "backend returned HTTP 500".into());
        assert!(state.last_ingest.is_some());
        assert_eq!(state.current_ingest(), None);
    }

    #[test]
    fn test_op_class_display() {
        assert_eq!(OpClass::Ingest.to_string(), "ingest");
        assert_eq!(OpClass::Status.to_string(), "status");
    }
}
