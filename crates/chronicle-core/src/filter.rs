//! In-memory post-filter fallback for adapters without native predicates.
//!
//! Engines that cannot evaluate field filters, the half-open time range, or
//! the voiding anti-join natively run their scans through this module
//! instead. It trades completeness-of-push-down for correctness: the
//! observable semantics are identical to a full native translation, at the
//! cost of materializing the matching set.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::cursor::Cursor;
use crate::error::Result;
use crate::traits::backend::RecordIter;
use crate::types::query::{SortOrder, StatementPage, StatementQuery};
use crate::types::statement::Statement;

/// Whether a statement passes the query's field and time filters.
///
/// Voiding exclusion is not part of this predicate - it needs the whole
/// target's voiding set and is applied in [`collect_page`].
pub fn matches_filters(stmt: &Statement, query: &StatementQuery) -> bool {
    if let Some(actor) = &query.actor {
        if stmt.actor != *actor {
            return false;
        }
    }
    if let Some(verb) = &query.verb {
        if stmt.verb != *verb {
            return false;
        }
    }
    if let Some(activity) = &query.activity {
        if stmt.object != *activity {
            return false;
        }
    }
    if let Some(authority) = &query.authority {
        if stmt.authority != *authority {
            return false;
        }
    }
    // Half-open interval [since, until)
    if let Some(since) = query.since {
        if stmt.timestamp < since {
            return false;
        }
    }
    if let Some(until) = query.until {
        if stmt.timestamp >= until {
            return false;
        }
    }
    true
}

/// Total-order comparison on the `(stored, id)` sort key.
pub fn sort_key_cmp(a: &Statement, b: &Statement) -> Ordering {
    a.stored.cmp(&b.stored).then_with(|| a.id.cmp(&b.id))
}

/// Whether a statement lies strictly after the cursor position in the
/// query's traversal direction.
pub fn after_cursor(stmt: &Statement, cursor: &Cursor, order: SortOrder) -> bool {
    let cmp = stmt
        .stored
        .cmp(&cursor.stored)
        .then_with(|| stmt.id.cmp(&cursor.id));
    match order {
        SortOrder::Ascending => cmp == Ordering::Greater,
        SortOrder::Descending => cmp == Ordering::Less,
    }
}

/// Evaluate the full query semantics over a raw scan of a target.
///
/// One pass accumulates the target-wide voiding set alongside the filter
/// matches, so voiding resolves correctly even when the voiding statement
/// itself matches none of the query's filters.
pub fn collect_page(
    mut iter: Box<dyn RecordIter>,
    query: &StatementQuery,
) -> Result<StatementPage> {
    let mut candidates = Vec::new();
    let mut voided: HashSet<String> = HashSet::new();

    while let Some(stmt) = iter.next()? {
        if let Some(target) = &stmt.void_target {
            voided.insert(target.clone());
        }
        if matches_filters(&stmt, query) {
            candidates.push(stmt);
        }
    }

    if !query.include_voided {
        candidates.retain(|s| !voided.contains(&s.id) && !s.is_voiding());
    }

    Ok(assemble_page(candidates, query))
}

/// Order, window, and paginate an already-filtered candidate set.
///
/// A `limit` of zero means an unbounded read. The continuation cursor is
/// emitted only when a further item actually exists past the page.
pub fn assemble_page(mut candidates: Vec<Statement>, query: &StatementQuery) -> StatementPage {
    candidates.sort_by(sort_key_cmp);
    if query.order == SortOrder::Descending {
        candidates.reverse();
    }

    if let Some(cursor) = &query.cursor {
        candidates.retain(|s| after_cursor(s, cursor, query.order));
    }

    let more = query.limit != 0 && candidates.len() > query.limit;
    if more {
        candidates.truncate(query.limit);
    }

    let next = if more {
        candidates
            .last()
            .map(|s| Cursor::new(s.stored, s.id.clone()))
    } else {
        None
    };

    StatementPage {
        statements: candidates,
        next,
    }
}
