use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::types::statement::Statement;

/// Default page size when a query does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// An immutable statement filter specification.
///
/// Constructed per request and never persisted. `authority` is not settable
/// by callers of the service surface - the access gate overwrites it when a
/// credential is narrowed to its own records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementQuery {
    #[serde(default)]
    pub actor: Option<String>,

    #[serde(default)]
    pub verb: Option<String>,

    #[serde(default)]
    pub activity: Option<String>,

    #[serde(default)]
    pub authority: Option<String>,

    /// Inclusive lower bound on the event timestamp.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,

    /// Exclusive upper bound on the event timestamp.
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,

    /// When false (the default), voided statements and the voiding
    /// statements themselves are excluded from results.
    #[serde(default)]
    pub include_voided: bool,

    #[serde(default)]
    pub order: SortOrder,

    /// Page size. Zero means unbounded at the adapter level; the service
    /// surface clamps it to the configured maximum.
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub cursor: Option<Cursor>,
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for StatementQuery {
    fn default() -> Self {
        Self {
            actor: None,
            verb: None,
            activity: None,
            authority: None,
            since: None,
            until: None,
            include_voided: false,
            order: SortOrder::default(),
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

impl StatementQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.activity = Some(activity.into());
        self
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn include_voided(mut self) -> Self {
        self.include_voided = true;
        self
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn after(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }
}

/// One page of query results plus the continuation cursor when more
/// results remain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementPage {
    pub statements: Vec<Statement>,
    pub next: Option<Cursor>,
}

impl StatementPage {
    pub fn empty() -> Self {
        Self {
            statements: Vec::new(),
            next: None,
        }
    }
}
