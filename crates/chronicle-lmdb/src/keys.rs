use chrono::{DateTime, Utc};

/// Encode the `(stored, id)` sort key as an LMDB record key.
///
/// Microseconds since epoch, zero-padded to fixed width, so the engine's
/// lexicographic key order is exactly the store's total order.
pub fn record_key(stored: &DateTime<Utc>, id: &str) -> Vec<u8> {
    let micros = stored.timestamp_micros().max(0) as u64;
    format!("{micros:020}|{id}").into_bytes()
}

/// Smallest key strictly greater than `key`.
pub fn key_after(key: &[u8]) -> Vec<u8> {
    let mut next = key.to_vec();
    next.push(0);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_order_matches_sort_order() {
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 1).unwrap();
        assert!(record_key(&t1, "z") < record_key(&t2, "a"));
        assert!(record_key(&t1, "a") < record_key(&t1, "b"));
        assert!(record_key(&t1, "a") < key_after(&record_key(&t1, "a")));
        assert!(key_after(&record_key(&t1, "a")) < record_key(&t1, "b"));
    }
}
