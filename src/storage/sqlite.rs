//! SQLite store implementation
//!
//! One `urls` row per crawl target, one append-only `docs` row per changed
//! fetch. The claim operation is a single UPDATE so that SQLite's write
//! serialization makes it atomic across workers and across processes sharing
//! the database file.

use crate::storage::schema::initialize_schema;
use crate::storage::{DocRecord, ProcessingUpdate, UpsertOutcome, UrlRecord};
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite-backed crawl store
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if needed) the store at the given path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(Store)` - Successfully opened/created database
    /// * `Err(PapermillError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL + busy_timeout so several worker processes can share the file
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory store (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== URL Records =====

    /// Inserts a URL record if absent; an existing record is left untouched
    ///
    /// A fresh record starts with no validators, no digest, no crawl history,
    /// `first_seen_ts = now` and `next_crawl_ts = initial_due_ts`, so it is
    /// immediately claimable once due.
    pub fn upsert_if_absent(
        &mut self,
        url: &str,
        source: &str,
        initial_due_ts: i64,
    ) -> Result<UpsertOutcome> {
        let now = super::now_ts();
        let changed = self.conn.execute(
            "INSERT INTO urls (url, source, first_seen_ts, next_crawl_ts, locked_until)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT(url) DO NOTHING",
            params![url, source, now, initial_due_ts],
        )?;

        if changed == 1 {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Exists)
        }
    }

    /// Atomically claims the next due, unlocked URL record
    ///
    /// Selects one record with `next_crawl_ts <= now` whose lease is absent
    /// or expired (`locked_until <= now`), preferring never-crawled records,
    /// then the oldest `last_crawl_ts`, then the earliest `next_crawl_ts`.
    /// The record's lease is set to `now + lease_seconds` in the same
    /// statement and the post-update record is returned.
    ///
    /// Returns `None` when nothing qualifies; the caller should idle-sleep
    /// rather than busy-poll.
    pub fn claim_next_due(&mut self, now: i64, lease_seconds: i64) -> Result<Option<UrlRecord>> {
        let mut stmt = self.conn.prepare(
            "UPDATE urls SET locked_until = ?1
             WHERE id = (
                 SELECT id FROM urls
                 WHERE next_crawl_ts <= ?2 AND locked_until <= ?2
                 ORDER BY last_crawl_ts ASC NULLS FIRST, next_crawl_ts ASC
                 LIMIT 1
             )
             RETURNING id, url, source, etag, last_modified, hash, status_code,
                       first_seen_ts, last_crawl_ts, next_crawl_ts, locked_until",
        )?;

        let record = stmt
            .query_row(params![now + lease_seconds, now], Self::url_record_from_row)
            .optional()?;

        Ok(record)
    }

    /// Applies the post-processing state transition to a claimed record
    ///
    /// Always writes `last_crawl_ts`, `next_crawl_ts` and `status_code`
    /// (`None` stores NULL) and clears the lease; validators and digest are
    /// rewritten only when the update asks for a refresh.
    pub fn update_after_processing(&mut self, id: i64, update: &ProcessingUpdate) -> Result<()> {
        if update.refresh_validators {
            self.conn.execute(
                "UPDATE urls
                 SET last_crawl_ts = ?1, next_crawl_ts = ?2, status_code = ?3,
                     etag = ?4, last_modified = ?5, hash = ?6, locked_until = 0
                 WHERE id = ?7",
                params![
                    update.last_crawl_ts,
                    update.next_crawl_ts,
                    update.status_code,
                    update.etag,
                    update.last_modified,
                    update.hash,
                    id
                ],
            )?;
        } else {
            self.conn.execute(
                "UPDATE urls
                 SET last_crawl_ts = ?1, next_crawl_ts = ?2, status_code = ?3, locked_until = 0
                 WHERE id = ?4",
                params![
                    update.last_crawl_ts,
                    update.next_crawl_ts,
                    update.status_code,
                    id
                ],
            )?;
        }
        Ok(())
    }

    /// Looks up a URL record by its canonical URL
    pub fn get_url(&self, url: &str) -> Result<Option<UrlRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, source, etag, last_modified, hash, status_code,
                    first_seen_ts, last_crawl_ts, next_crawl_ts, locked_until
             FROM urls WHERE url = ?1",
        )?;

        let record = stmt
            .query_row(params![url], Self::url_record_from_row)
            .optional()?;

        Ok(record)
    }

    fn url_record_from_row(row: &Row<'_>) -> std::result::Result<UrlRecord, rusqlite::Error> {
        Ok(UrlRecord {
            id: row.get(0)?,
            url: row.get(1)?,
            source: row.get(2)?,
            etag: row.get(3)?,
            last_modified: row.get(4)?,
            hash: row.get(5)?,
            status_code: row.get(6)?,
            first_seen_ts: row.get(7)?,
            last_crawl_ts: row.get(8)?,
            next_crawl_ts: row.get(9)?,
            locked_until: row.get(10)?,
        })
    }

    // ===== Doc Records =====

    /// Appends a new document version
    pub fn insert_doc(
        &mut self,
        url: &str,
        raw_html: &str,
        source: &str,
        crawl_ts: i64,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO docs (url, raw_html, source, crawl_ts) VALUES (?1, ?2, ?3, ?4)",
            params![url, raw_html, source, crawl_ts],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Streams the latest document version per distinct URL, ordered by URL
    ///
    /// Ties on `crawl_ts` resolve to the highest row id, so the callback sees
    /// exactly one row per URL. Rows come straight off the statement rather
    /// than through an intermediate Vec, so a large corpus never sits in
    /// memory at once. Return `false` from the callback to stop early.
    pub fn for_each_latest_doc(
        &self,
        mut f: impl FnMut(DocRecord) -> Result<bool>,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, source, raw_html, crawl_ts FROM docs d
             WHERE id = (
                 SELECT d2.id FROM docs d2 WHERE d2.url = d.url
                 ORDER BY d2.crawl_ts DESC, d2.id DESC LIMIT 1
             )
             ORDER BY url",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(DocRecord {
                id: row.get(0)?,
                url: row.get(1)?,
                source: row.get(2)?,
                raw_html: row.get(3)?,
                crawl_ts: row.get(4)?,
            })
        })?;

        for row in rows {
            if !f(row?)? {
                break;
            }
        }

        Ok(())
    }

    // ===== Statistics =====

    pub fn count_urls(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM urls", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Records that are due and claimable right now
    pub fn count_due(&self, now: i64) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE next_crawl_ts <= ?1 AND locked_until <= ?1",
            params![now],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Records currently held under a live lease
    pub fn count_leased(&self, now: i64) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE locked_until > ?1",
            params![now],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn count_never_crawled(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE last_crawl_ts IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Last observed status codes, most common first; NULL bucket included
    pub fn status_histogram(&self) -> Result<Vec<(Option<u16>, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT status_code, COUNT(*) AS n FROM urls GROUP BY status_code ORDER BY n DESC",
        )?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as u64)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// URL counts per seed source, most common first
    pub fn source_histogram(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT source, COUNT(*) AS n FROM urls GROUP BY source ORDER BY n DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn count_docs(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM docs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Doc rows written at or after the given epoch second
    pub fn count_docs_since(&self, ts: i64) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM docs WHERE crawl_ts >= ?1",
            params![ts],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn count_docs_for_url(&self, url: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM docs WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::now_ts;

    fn seeded_store(urls: &[&str]) -> Store {
        let mut store = Store::new_in_memory().unwrap();
        for url in urls {
            store.upsert_if_absent(url, "acl-anthology", 0).unwrap();
        }
        store
    }

    #[test]
    fn test_upsert_inserts_then_exists() {
        let mut store = Store::new_in_memory().unwrap();

        let first = store
            .upsert_if_absent("https://example.com/a", "acl-anthology", 100)
            .unwrap();
        let second = store
            .upsert_if_absent("https://example.com/a", "arxiv", 200)
            .unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::Exists);
        assert_eq!(store.count_urls().unwrap(), 1);

        // The original record is untouched by the second upsert
        let record = store.get_url("https://example.com/a").unwrap().unwrap();
        assert_eq!(record.source, "acl-anthology");
        assert_eq!(record.next_crawl_ts, 100);
    }

    #[test]
    fn test_fresh_record_has_empty_state() {
        let mut store = Store::new_in_memory().unwrap();
        store
            .upsert_if_absent("https://example.com/a", "arxiv", 50)
            .unwrap();

        let record = store.get_url("https://example.com/a").unwrap().unwrap();
        assert!(record.etag.is_none());
        assert!(record.last_modified.is_none());
        assert!(record.hash.is_none());
        assert!(record.status_code.is_none());
        assert!(record.last_crawl_ts.is_none());
        assert_eq!(record.locked_until, 0);
        assert!(record.first_seen_ts > 0);
    }

    #[test]
    fn test_claim_on_empty_store_returns_none() {
        let mut store = Store::new_in_memory().unwrap();
        let claimed = store.claim_next_due(now_ts(), 60).unwrap();
        assert!(claimed.is_none());
    }

    #[test]
    fn test_claim_none_due_leaves_store_unchanged() {
        let mut store = Store::new_in_memory().unwrap();
        let now = now_ts();
        store
            .upsert_if_absent("https://example.com/a", "arxiv", now + 1000)
            .unwrap();

        let claimed = store.claim_next_due(now, 60).unwrap();
        assert!(claimed.is_none());

        let record = store.get_url("https://example.com/a").unwrap().unwrap();
        assert_eq!(record.locked_until, 0);
        assert_eq!(record.next_crawl_ts, now + 1000);
    }

    #[test]
    fn test_claim_sets_lease_and_returns_post_update_record() {
        let mut store = seeded_store(&["https://example.com/a"]);
        let now = now_ts();

        let claimed = store.claim_next_due(now, 60).unwrap().unwrap();
        assert_eq!(claimed.url, "https://example.com/a");
        assert_eq!(claimed.locked_until, now + 60);
    }

    #[test]
    fn test_claimed_record_is_not_reclaimable_until_lease_expires() {
        let mut store = seeded_store(&["https://example.com/a"]);
        let now = now_ts();

        assert!(store.claim_next_due(now, 60).unwrap().is_some());
        assert!(store.claim_next_due(now, 60).unwrap().is_none());

        // Once the lease lapses the record is claimable again
        let later = now + 61;
        assert!(store.claim_next_due(later, 60).unwrap().is_some());
    }

    #[test]
    fn test_claim_prefers_never_crawled() {
        let mut store = Store::new_in_memory().unwrap();
        let now = now_ts();

        store
            .upsert_if_absent("https://example.com/crawled", "arxiv", 0)
            .unwrap();
        store
            .upsert_if_absent("https://example.com/fresh", "arxiv", 0)
            .unwrap();

        // Mark one as previously crawled, still due
        let crawled = store.get_url("https://example.com/crawled").unwrap().unwrap();
        store
            .update_after_processing(
                crawled.id,
                &ProcessingUpdate {
                    last_crawl_ts: now - 5000,
                    next_crawl_ts: now - 100,
                    status_code: Some(200),
                    ..Default::default()
                },
            )
            .unwrap();

        let first = store.claim_next_due(now, 60).unwrap().unwrap();
        assert_eq!(first.url, "https://example.com/fresh");

        let second = store.claim_next_due(now, 60).unwrap().unwrap();
        assert_eq!(second.url, "https://example.com/crawled");
    }

    #[test]
    fn test_claim_orders_by_last_crawl_then_next_crawl() {
        let mut store = Store::new_in_memory().unwrap();
        let now = now_ts();

        for (url, last, next) in [
            ("https://example.com/recent", now - 100, now - 50),
            ("https://example.com/starved", now - 9000, now - 10),
        ] {
            store.upsert_if_absent(url, "arxiv", 0).unwrap();
            let record = store.get_url(url).unwrap().unwrap();
            store
                .update_after_processing(
                    record.id,
                    &ProcessingUpdate {
                        last_crawl_ts: last,
                        next_crawl_ts: next,
                        status_code: Some(200),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        // The record not visited for longest wins even though the other
        // became due earlier
        let first = store.claim_next_due(now, 60).unwrap().unwrap();
        assert_eq!(first.url, "https://example.com/starved");
    }

    #[test]
    fn test_update_after_processing_clears_lease_and_advances_due() {
        let mut store = seeded_store(&["https://example.com/a"]);
        let now = now_ts();

        let claimed = store.claim_next_due(now, 60).unwrap().unwrap();
        store
            .update_after_processing(
                claimed.id,
                &ProcessingUpdate {
                    last_crawl_ts: now,
                    next_crawl_ts: now + 3600,
                    status_code: None,
                    ..Default::default()
                },
            )
            .unwrap();

        let record = store.get_url("https://example.com/a").unwrap().unwrap();
        assert_eq!(record.locked_until, 0);
        assert!(record.next_crawl_ts > now);
        assert_eq!(record.last_crawl_ts, Some(now));
        assert_eq!(record.status_code, None);
    }

    #[test]
    fn test_update_with_refresh_rewrites_validators() {
        let mut store = seeded_store(&["https://example.com/a"]);
        let now = now_ts();
        let record = store.get_url("https://example.com/a").unwrap().unwrap();

        store
            .update_after_processing(
                record.id,
                &ProcessingUpdate {
                    last_crawl_ts: now,
                    next_crawl_ts: now + 604800,
                    status_code: Some(200),
                    refresh_validators: true,
                    etag: Some("\"abc123\"".to_string()),
                    last_modified: Some("Tue, 01 Jan 2030 00:00:00 GMT".to_string()),
                    hash: Some("deadbeef".to_string()),
                },
            )
            .unwrap();

        let updated = store.get_url("https://example.com/a").unwrap().unwrap();
        assert_eq!(updated.etag.as_deref(), Some("\"abc123\""));
        assert_eq!(updated.hash.as_deref(), Some("deadbeef"));
        assert_eq!(updated.status_code, Some(200));
    }

    #[test]
    fn test_update_without_refresh_keeps_validators() {
        let mut store = seeded_store(&["https://example.com/a"]);
        let now = now_ts();
        let record = store.get_url("https://example.com/a").unwrap().unwrap();

        store
            .update_after_processing(
                record.id,
                &ProcessingUpdate {
                    last_crawl_ts: now,
                    next_crawl_ts: now + 604800,
                    status_code: Some(200),
                    refresh_validators: true,
                    etag: Some("\"v1\"".to_string()),
                    last_modified: None,
                    hash: Some("aaaa".to_string()),
                },
            )
            .unwrap();

        // A later failure path must not wipe the stored validators
        store
            .update_after_processing(
                record.id,
                &ProcessingUpdate {
                    last_crawl_ts: now + 10,
                    next_crawl_ts: now + 7200,
                    status_code: Some(503),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = store.get_url("https://example.com/a").unwrap().unwrap();
        assert_eq!(updated.etag.as_deref(), Some("\"v1\""));
        assert_eq!(updated.hash.as_deref(), Some("aaaa"));
        assert_eq!(updated.status_code, Some(503));
    }

    #[test]
    fn test_insert_doc_and_counts() {
        let mut store = Store::new_in_memory().unwrap();
        let now = now_ts();

        store
            .insert_doc("https://example.com/a", "<html>v1</html>", "arxiv", now)
            .unwrap();
        store
            .insert_doc("https://example.com/a", "<html>v2</html>", "arxiv", now + 10)
            .unwrap();
        store
            .insert_doc("https://example.com/b", "<html>b</html>", "arxiv", now)
            .unwrap();

        assert_eq!(store.count_docs().unwrap(), 3);
        assert_eq!(store.count_docs_for_url("https://example.com/a").unwrap(), 2);
        assert_eq!(store.count_docs_since(now + 5).unwrap(), 1);
    }

    fn collect_latest(store: &Store) -> Vec<DocRecord> {
        let mut docs = Vec::new();
        store
            .for_each_latest_doc(|doc| {
                docs.push(doc);
                Ok(true)
            })
            .unwrap();
        docs
    }

    #[test]
    fn test_for_each_latest_doc_picks_max_crawl_ts_per_url() {
        let mut store = Store::new_in_memory().unwrap();

        store
            .insert_doc("https://example.com/a", "old", "arxiv", 100)
            .unwrap();
        store
            .insert_doc("https://example.com/a", "new", "arxiv", 200)
            .unwrap();
        store
            .insert_doc("https://example.com/b", "only", "acl-anthology", 150)
            .unwrap();

        let latest = collect_latest(&store);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].url, "https://example.com/a");
        assert_eq!(latest[0].raw_html, "new");
        assert_eq!(latest[1].url, "https://example.com/b");
        assert_eq!(latest[1].raw_html, "only");
    }

    #[test]
    fn test_for_each_latest_doc_tie_resolves_to_one_row() {
        let mut store = Store::new_in_memory().unwrap();

        store
            .insert_doc("https://example.com/a", "first", "arxiv", 100)
            .unwrap();
        store
            .insert_doc("https://example.com/a", "second", "arxiv", 100)
            .unwrap();

        let latest = collect_latest(&store);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].raw_html, "second");
    }

    #[test]
    fn test_for_each_latest_doc_stops_when_callback_returns_false() {
        let mut store = Store::new_in_memory().unwrap();

        store
            .insert_doc("https://example.com/a", "a", "arxiv", 100)
            .unwrap();
        store
            .insert_doc("https://example.com/b", "b", "arxiv", 100)
            .unwrap();
        store
            .insert_doc("https://example.com/c", "c", "arxiv", 100)
            .unwrap();

        let mut seen = Vec::new();
        store
            .for_each_latest_doc(|doc| {
                seen.push(doc.url);
                Ok(seen.len() < 2)
            })
            .unwrap();

        assert_eq!(seen, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn test_monitor_counts() {
        let mut store = Store::new_in_memory().unwrap();
        let now = now_ts();

        store
            .upsert_if_absent("https://example.com/due", "arxiv", now - 10)
            .unwrap();
        store
            .upsert_if_absent("https://example.com/later", "acl-anthology", now + 1000)
            .unwrap();

        assert_eq!(store.count_urls().unwrap(), 2);
        assert_eq!(store.count_due(now).unwrap(), 1);
        assert_eq!(store.count_never_crawled().unwrap(), 2);
        assert_eq!(store.count_leased(now).unwrap(), 0);

        let claimed = store.claim_next_due(now, 60).unwrap().unwrap();
        assert_eq!(store.count_leased(now).unwrap(), 1);
        assert_eq!(store.count_due(now).unwrap(), 0);

        store
            .update_after_processing(
                claimed.id,
                &ProcessingUpdate {
                    last_crawl_ts: now,
                    next_crawl_ts: now + 604800,
                    status_code: Some(304),
                    ..Default::default()
                },
            )
            .unwrap();

        let histogram = store.status_histogram().unwrap();
        assert!(histogram.contains(&(Some(304), 1)));
        assert!(histogram.contains(&(None, 1)));

        let sources = store.source_histogram(10).unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");

        {
            let mut store = Store::new(&path).unwrap();
            store
                .upsert_if_absent("https://example.com/solo", "arxiv", 0)
                .unwrap();
        }

        let now = now_ts();
        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();

        for _ in 0..2 {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                let mut store = Store::new(&path).unwrap();
                barrier.wait();
                store.claim_next_due(now, 60).unwrap()
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_some()).count();
        assert_eq!(winners, 1);
    }
}
