//! Pagination total-order stability across every adapter.
//!
//! For a fixed query, concatenating all pages retrieved via successive
//! cursors must equal a single unbounded read, for any page size from 1 up
//! to the full result count, in both traversal directions.

use std::collections::HashMap;
use std::sync::Arc;

use chronicle::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const BACKENDS: [&str; 3] = ["sqlite", "lmdb", "jsonl"];
const CORPUS: usize = 7;

struct StaticResolver {
    users: HashMap<String, ScopeSet>,
}

impl CredentialResolver for StaticResolver {
    fn resolve(&self, credential: &str) -> Result<ScopeSet> {
        self.users
            .get(credential)
            .cloned()
            .ok_or_else(|| ChronicleError::AuthorizationDenied("invalid credentials".into()))
    }
}

fn resolver() -> Arc<StaticResolver> {
    let mut users = HashMap::new();
    users.insert(
        "writer-key".to_owned(),
        ScopeSet::new(
            "mailto:writer@example.com",
            vec![Scope::WRITE_ALL, Scope::READ_ALL],
        ),
    );
    Arc::new(StaticResolver { users })
}

fn doc(id: &str, minute: usize) -> Value {
    json!({
        "id": id,
        "actor": "u1",
        "verb": "accessed",
        "object": "course/42",
        "timestamp": format!("2024-03-01T10:{minute:02}:00Z"),
    })
}

fn seeded_service(backend: &str) -> (LrsService, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ChronicleConfig::new(dir.path().to_path_buf()).with_backend(backend);
    let service = LrsService::open(config, resolver()).unwrap();

    let batch: Vec<Value> = (0..CORPUS).map(|i| doc(&format!("s{i}"), i)).collect();
    let report = service.ingest("writer-key", batch).unwrap();
    assert!(report.fully_accepted());
    (service, dir)
}

fn page_ids(page: &StatementPage) -> Vec<String> {
    page.statements.iter().map(|s| s.id.clone()).collect()
}

/// Walk the cursor chain to exhaustion, checking page sizes on the way.
fn collect_paged(service: &LrsService, base: &StatementQuery, page_size: usize) -> Vec<String> {
    let mut collected = Vec::new();
    let mut cursor: Option<Cursor> = None;
    loop {
        let mut query = base.clone().with_limit(page_size);
        if let Some(c) = cursor.take() {
            query = query.after(c);
        }
        let page = service.query("writer-key", query).unwrap();
        assert!(page.statements.len() <= page_size);
        collected.extend(page_ids(&page));
        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    collected
}

#[test]
fn paged_reads_equal_unbounded_read_for_every_page_size() {
    for backend in BACKENDS {
        let (service, _dir) = seeded_service(backend);

        let full = page_ids(
            &service
                .query("writer-key", StatementQuery::new().with_limit(CORPUS))
                .unwrap(),
        );
        assert_eq!(full.len(), CORPUS, "backend {backend}");

        for page_size in 1..=CORPUS {
            let paged = collect_paged(&service, &StatementQuery::new(), page_size);
            assert_eq!(paged, full, "backend {backend}, page size {page_size}");
        }
    }
}

#[test]
fn descending_pages_are_the_exact_reverse() {
    for backend in BACKENDS {
        let (service, _dir) = seeded_service(backend);

        let mut expected = page_ids(
            &service
                .query("writer-key", StatementQuery::new().with_limit(CORPUS))
                .unwrap(),
        );
        expected.reverse();

        for page_size in 1..=CORPUS {
            let paged = collect_paged(
                &service,
                &StatementQuery::new().descending(),
                page_size,
            );
            assert_eq!(paged, expected, "backend {backend}, page size {page_size}");
        }
    }
}

#[test]
fn all_backends_agree_on_order() {
    let mut sequences = Vec::new();
    for backend in BACKENDS {
        let (service, _dir) = seeded_service(backend);
        sequences.push(page_ids(
            &service
                .query("writer-key", StatementQuery::new().with_limit(CORPUS))
                .unwrap(),
        ));
    }
    assert_eq!(sequences[0], sequences[1]);
    assert_eq!(sequences[1], sequences[2]);
}

#[test]
fn exact_multiple_of_page_size_has_no_ghost_page() {
    for backend in BACKENDS {
        let (service, _dir) = seeded_service(backend);

        // CORPUS statements read in one exact-sized page: no cursor.
        let page = service
            .query("writer-key", StatementQuery::new().with_limit(CORPUS))
            .unwrap();
        assert!(page.next.is_none(), "backend {backend}");
    }
}

#[test]
fn filtered_pagination_stays_stable() {
    for backend in BACKENDS {
        let dir = tempfile::tempdir().unwrap();
        let config = ChronicleConfig::new(dir.path().to_path_buf()).with_backend(backend);
        let service = LrsService::open(config, resolver()).unwrap();

        let mut batch = Vec::new();
        for i in 0..CORPUS {
            batch.push(doc(&format!("s{i}"), i));
        }
        batch.push(json!({
            "id": "other",
            "actor": "u2",
            "verb": "accessed",
            "object": "course/42",
            "timestamp": "2024-03-01T10:30:00Z",
        }));
        service.ingest("writer-key", batch).unwrap();

        let base = StatementQuery::new().with_actor("u1");
        let full = page_ids(&service.query("writer-key", base.clone().with_limit(50)).unwrap());
        assert_eq!(full.len(), CORPUS, "backend {backend}");

        for page_size in [1, 2, 3] {
            let paged = collect_paged(&service, &base, page_size);
            assert_eq!(paged, full, "backend {backend}, page size {page_size}");
        }
    }
}
