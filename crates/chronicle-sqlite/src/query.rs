use chronicle_core::types::query::{SortOrder, StatementQuery};
use chronicle_core::types::statement::rfc3339_micros;
use rusqlite::types::Value;

/// A statement query translated to SQL text plus its bound parameters.
pub(crate) struct NativeQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Translate the abstract query into native SQL.
///
/// Everything pushes down: field filters, the half-open `[since, until)`
/// time range, the voiding anti-join, `(stored, id)` keyset continuation,
/// ordering, and the limit. One extra row is requested so the caller can
/// tell whether more results remain.
pub(crate) fn translate(query: &StatementQuery, table: &str) -> NativeQuery {
    let mut sql = format!("SELECT s.doc FROM {table} AS s WHERE 1=1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(actor) = &query.actor {
        sql.push_str(" AND s.actor = ?");
        params.push(Value::Text(actor.clone()));
    }
    if let Some(verb) = &query.verb {
        sql.push_str(" AND s.verb = ?");
        params.push(Value::Text(verb.clone()));
    }
    if let Some(activity) = &query.activity {
        sql.push_str(" AND s.object = ?");
        params.push(Value::Text(activity.clone()));
    }
    if let Some(authority) = &query.authority {
        sql.push_str(" AND s.authority = ?");
        params.push(Value::Text(authority.clone()));
    }
    if let Some(since) = &query.since {
        sql.push_str(" AND s.timestamp >= ?");
        params.push(Value::Text(rfc3339_micros(since)));
    }
    if let Some(until) = &query.until {
        sql.push_str(" AND s.timestamp < ?");
        params.push(Value::Text(rfc3339_micros(until)));
    }

    if !query.include_voided {
        sql.push_str(&format!(
            " AND s.void_target IS NULL \
             AND NOT EXISTS (SELECT 1 FROM {table} AS v WHERE v.void_target = s.id)"
        ));
    }

    if let Some(cursor) = &query.cursor {
        let (cmp, tie_cmp) = match query.order {
            SortOrder::Ascending => (">", ">"),
            SortOrder::Descending => ("<", "<"),
        };
        sql.push_str(&format!(
            " AND (s.stored {cmp} ? OR (s.stored = ? AND s.id {tie_cmp} ?))"
        ));
        let stored = rfc3339_micros(&cursor.stored);
        params.push(Value::Text(stored.clone()));
        params.push(Value::Text(stored));
        params.push(Value::Text(cursor.id.clone()));
    }

    let direction = match query.order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    };
    sql.push_str(&format!(" ORDER BY s.stored {direction}, s.id {direction}"));

    if query.limit > 0 {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(query.limit as i64 + 1));
    }

    NativeQuery { sql, params }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::cursor::Cursor;
    use chronicle_core::types::statement::parse_rfc3339_micros;

    #[test]
    fn default_query_excludes_voided() {
        let native = translate(&StatementQuery::new(), "statements_t");
        assert!(native.sql.contains("void_target IS NULL"));
        assert!(native.sql.contains("NOT EXISTS"));
        assert!(native.sql.contains("ORDER BY s.stored ASC, s.id ASC"));
    }

    #[test]
    fn include_voided_drops_anti_join() {
        let native = translate(&StatementQuery::new().include_voided(), "statements_t");
        assert!(!native.sql.contains("NOT EXISTS"));
    }

    #[test]
    fn cursor_becomes_keyset_predicate() {
        let stored = parse_rfc3339_micros("2024-03-01T10:00:00Z").unwrap();
        let q = StatementQuery::new()
            .descending()
            .after(Cursor::new(stored, "s1"));
        let native = translate(&q, "statements_t");
        assert!(native.sql.contains("s.stored < ?"));
        assert!(native.sql.contains("s.id < ?"));
        assert!(native.sql.contains("ORDER BY s.stored DESC, s.id DESC"));
        // actor/verb/etc. absent, so params are: stored, stored, id, limit
        assert_eq!(native.params.len(), 4);
    }
}
