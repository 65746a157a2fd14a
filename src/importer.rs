//! Transactional import of decoded archive entries into the store.
//!
//! Each entry becomes one [`MutationBatch`] committed in a single optimistic
//! transaction together with its completed-entry marker. A crash or failure
//! anywhere inside an entry leaves the store exactly as it was, so re-running
//! an import retries precisely the entries that never committed.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use crate::codec::{self, MergeConflict, StatusFact, StatusValue};
use crate::error::{Result, XvError};
use crate::model::{Delete, Item, Tweet};
use crate::pipeline::FileResult;
use crate::store::{self, Store};

/// Mutations staged for one archive entry, keyed the way the store keys them
/// so every row is read and written once per entry.
///
/// Within a batch: a full status replaces and then blocks a short row for the
/// same id, duplicate full statuses merge, and a repeated delete keeps the
/// last timestamp seen. The store-side rules applied at commit are stricter
/// still; see [`Importer`].
#[derive(Debug, Default)]
pub struct MutationBatch {
    /// (user id, lowercase screen name) -> source status ids seen under it.
    aliases: HashMap<(u64, String), BTreeSet<u64>>,
    /// lowercase screen name -> user ids that have used it.
    screen_names: HashMap<String, BTreeSet<u64>>,
    /// status id -> full fact.
    statuses: HashMap<u64, StatusValue>,
    /// status id -> author, for statuses known only by reference.
    short_statuses: HashMap<u64, u64>,
    /// (user id, status id) -> deletion timestamp, when the event carried one.
    deletes: HashMap<(u64, u64), Option<u64>>,
}

/// Two full statuses staged for the same id disagreed on an immutable field.
#[derive(Debug)]
pub struct BatchConflict {
    pub status_id: u64,
    pub conflict: MergeConflict,
}

impl MutationBatch {
    /// Stages one decoded item.
    ///
    /// # Errors
    ///
    /// Fails when the item carries a full status fact that conflicts with one
    /// already staged for the same id.
    pub fn add_item(&mut self, item: &Item) -> std::result::Result<(), BatchConflict> {
        match item {
            Item::Tweet(tweet) => self.add_tweet(tweet),
            Item::Delete(delete) => {
                self.add_delete(delete);
                Ok(())
            }
        }
    }

    /// Number of full status facts staged. This count becomes the value of
    /// the entry's completed marker.
    #[must_use]
    pub fn full_status_count(&self) -> usize {
        self.statuses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
            && self.screen_names.is_empty()
            && self.statuses.is_empty()
            && self.short_statuses.is_empty()
            && self.deletes.is_empty()
    }

    fn add_delete(&mut self, delete: &Delete) {
        self.deletes
            .insert((delete.user_id, delete.status_id), delete.timestamp_millis());
    }

    fn add_tweet(&mut self, tweet: &Tweet) -> std::result::Result<(), BatchConflict> {
        self.add_user(tweet.user_id(), tweet.screen_name(), tweet.source_status_id());

        // A retweet stores only the pointer to the wrapped status; the
        // wrapped status carries the reply, quote, and mention facts and is
        // staged by the recursion.
        if let Some(retweeted) = tweet.retweeted_status() {
            self.add_tweet(&retweeted)?;
            return self.stage_full(
                tweet.status_id(),
                StatusValue::retweet(
                    tweet.user_id(),
                    tweet.timestamp_millis(),
                    retweeted.status_id(),
                ),
            );
        }

        let reply = tweet.reply_info();
        if let Some(reply) = &reply {
            self.add_user(reply.user_id, &reply.screen_name, tweet.source_status_id());
            self.stage_short(reply.status_id, reply.user_id);
        }

        // The quote relation comes from the id field alone. A quoted object
        // without it cannot be tied back to this status, so it is dropped.
        let quoted_id = tweet.quoted_status_id();
        if let Some(quoted) = tweet.quoted_status() {
            if quoted_id.is_some() {
                self.add_tweet(&quoted)?;
            } else {
                warn!(
                    status_id = tweet.status_id(),
                    "quoted status object without quoted_status_id_str, skipping"
                );
            }
        }

        let mut mentioned = Vec::new();
        for mention in tweet.user_mentions() {
            self.add_user(mention.user_id, &mention.screen_name, tweet.source_status_id());
            mentioned.push(mention.user_id);
        }

        self.stage_full(
            tweet.status_id(),
            StatusValue::tweet(
                tweet.user_id(),
                tweet.timestamp_millis(),
                reply.as_ref().map(|r| r.status_id),
                quoted_id,
                mentioned,
            ),
        )
    }

    fn add_user(&mut self, user_id: u64, screen_name: &str, source_status_id: u64) {
        let name = screen_name.to_lowercase();
        self.screen_names
            .entry(name.clone())
            .or_default()
            .insert(user_id);
        self.aliases
            .entry((user_id, name))
            .or_default()
            .insert(source_status_id);
    }

    fn stage_full(
        &mut self,
        status_id: u64,
        value: StatusValue,
    ) -> std::result::Result<(), BatchConflict> {
        use std::collections::hash_map::Entry;

        // A full fact supersedes any short row staged for the same status.
        self.short_statuses.remove(&status_id);
        match self.statuses.entry(status_id) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                let merged = slot
                    .get()
                    .merge(&value)
                    .map_err(|conflict| BatchConflict { status_id, conflict })?;
                slot.insert(merged);
            }
        }
        Ok(())
    }

    fn stage_short(&mut self, status_id: u64, user_id: u64) {
        if self.statuses.contains_key(&status_id) {
            return;
        }
        self.short_statuses.insert(status_id, user_id);
    }
}

/// Result of importing one archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The entry's completed marker was already present; nothing was touched.
    AlreadyComplete,
    /// The entry committed. `written` counts data rows put, excluding the
    /// marker itself, so an entry whose facts were all present writes zero.
    Imported { written: u64, full_statuses: u64 },
}

/// Applies decoded entries to a store, one transaction per entry.
///
/// Store-side rules keep re-imports and out-of-order imports convergent:
/// list rows merge as sorted unions and are skipped when unchanged, a full
/// status fact replaces a short row but is never replaced by one, divergent
/// full facts merge mention lists and reject any other difference, and
/// deletion rows keep the first value ever written.
pub struct Importer<'a> {
    store: &'a Store,
    completed: HashMap<String, HashSet<String>>,
}

impl<'a> Importer<'a> {
    /// Opens an importer over `store`, loading the completed-entry markers
    /// once up front so skip checks never touch the store.
    ///
    /// # Errors
    ///
    /// Fails when the marker scan fails or a marker key is malformed.
    pub fn new(store: &'a Store) -> Result<Self> {
        let completed = store.completed_entries()?;
        let entries: usize = completed.values().map(HashSet::len).sum();
        debug!(archives = completed.len(), entries, "loaded completed-entry markers");
        Ok(Self { store, completed })
    }

    /// Whether `entry` of `archive` already carries a completed marker.
    #[must_use]
    pub fn is_complete(&self, archive: &str, entry: &str) -> bool {
        self.completed
            .get(archive)
            .is_some_and(|entries| entries.contains(entry))
    }

    /// Total completed markers known, across all archives.
    #[must_use]
    pub fn completed_entry_count(&self) -> usize {
        self.completed.values().map(HashSet::len).sum()
    }

    /// Snapshot of the entries already completed for one archive. Markers
    /// written during the current run are not reflected back; entries are
    /// processed at most once per run anyway.
    #[must_use]
    pub fn completed_entries_for(&self, archive: &str) -> HashSet<String> {
        self.completed.get(archive).cloned().unwrap_or_default()
    }

    /// Imports one decoded entry inside a single transaction and records its
    /// completed marker.
    ///
    /// # Errors
    ///
    /// Returns [`XvError::StatusMerge`] when a status fact conflicts, either
    /// within the entry or against the store, and
    /// [`XvError::TransactionConflict`] when the commit loses an optimistic
    /// race. Both leave the entry unmarked for a later retry.
    pub fn import(&mut self, archive: &str, result: &FileResult) -> Result<EntryOutcome> {
        let entry = result.path();
        if self.is_complete(archive, entry) {
            debug!(archive, entry, "entry already imported, skipping");
            return Ok(EntryOutcome::AlreadyComplete);
        }

        let mut batch = MutationBatch::default();
        for item in result.decoded() {
            batch
                .add_item(item)
                .map_err(|failure| Self::merge_error(archive, entry, failure))?;
        }

        let full_statuses = batch.full_status_count() as u64;
        let written = self.commit(archive, entry, &batch)?;
        self.completed
            .entry(archive.to_string())
            .or_default()
            .insert(entry.to_string());
        debug!(archive, entry, written, full_statuses, "entry committed");
        Ok(EntryOutcome::Imported {
            written,
            full_statuses,
        })
    }

    fn commit(&self, archive: &str, entry: &str, batch: &MutationBatch) -> Result<u64> {
        let tx = self.store.transaction();
        let mut written = 0u64;

        for ((user_id, name), sightings) in &batch.aliases {
            let key = codec::user_alias_key(*user_id, name);
            if let Some(merged) = codec::merge_u64s(tx.get(&key)?.as_deref(), sightings)? {
                tx.put(&key, merged)?;
                written += 1;
            }
        }

        for (name, user_ids) in &batch.screen_names {
            let key = codec::screen_name_key(name);
            if let Some(merged) = codec::merge_u64s(tx.get(&key)?.as_deref(), user_ids)? {
                tx.put(&key, merged)?;
                written += 1;
            }
        }

        for (&status_id, value) in &batch.statuses {
            let key = codec::status_key(status_id);
            let encoded = value.encode();
            let Some(existing) = tx.get(&key)? else {
                tx.put(&key, encoded)?;
                written += 1;
                continue;
            };
            if existing == encoded {
                continue;
            }
            match StatusFact::decode(&existing)? {
                StatusFact::Short(_) => {
                    tx.put(&key, encoded)?;
                    written += 1;
                }
                StatusFact::Full(stored) => {
                    let merged = stored.merge(value).map_err(|conflict| {
                        Self::merge_error(archive, entry, BatchConflict { status_id, conflict })
                    })?;
                    let merged_bytes = merged.encode();
                    if merged_bytes != existing {
                        warn!(status_id, "updating existing status with new facts");
                        tx.put(&key, merged_bytes)?;
                        written += 1;
                    }
                }
            }
        }

        // Short rows never replace anything already present.
        for (&status_id, &user_id) in &batch.short_statuses {
            let key = codec::status_key(status_id);
            if tx.get(&key)?.is_none() {
                tx.put(&key, StatusFact::Short(user_id).encode())?;
                written += 1;
            }
        }

        // A deletion row keeps whatever was recorded first.
        for (&(user_id, status_id), &timestamp_ms) in &batch.deletes {
            let key = codec::delete_key(user_id, status_id);
            if tx.get(&key)?.is_none() {
                tx.put(&key, codec::encode_delete_value(timestamp_ms))?;
                written += 1;
            }
        }

        tx.put(
            codec::completed_entry_key(archive, entry),
            codec::encode_completed_value(batch.full_status_count() as u64),
        )?;

        if let Err(error) = tx.commit() {
            if store::is_transaction_conflict(&error) {
                return Err(XvError::TransactionConflict {
                    archive: archive.to_string(),
                    entry: entry.to_string(),
                });
            }
            return Err(error.into());
        }
        Ok(written)
    }

    fn merge_error(archive: &str, entry: &str, failure: BatchConflict) -> XvError {
        XvError::StatusMerge {
            archive: archive.to_string(),
            entry: entry.to_string(),
            status_id: failure.status_id,
            source: failure.conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::KeyFamily;
    use crate::decode;
    use tempfile::TempDir;

    // Ids above the snowflake threshold so timestamps derive from the id.
    const BASE: u64 = 1_000_000_000_000_000_000;

    fn temp_store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();
        (dir, store)
    }

    fn make_result(path: &str, lines: &[String]) -> FileResult {
        let items = lines
            .iter()
            .map(|line| decode::decode_line(line.as_bytes()).ok())
            .collect();
        FileResult::new(path.to_string(), items)
    }

    fn tweet(id: u64, user_id: u64, screen_name: &str) -> String {
        format!(
            r#"{{"id_str":"{id}","user":{{"id_str":"{user_id}","screen_name":"{screen_name}","name":"{screen_name}"}}}}"#
        )
    }

    fn reply(id: u64, user_id: u64, screen_name: &str, to_status: u64, to_user: u64) -> String {
        format!(
            r#"{{"id_str":"{id}","user":{{"id_str":"{user_id}","screen_name":"{screen_name}","name":"{screen_name}"}},"in_reply_to_status_id_str":"{to_status}","in_reply_to_user_id_str":"{to_user}","in_reply_to_screen_name":"target"}}"#
        )
    }

    fn tweet_with_mention(id: u64, user_id: u64, mentioned: u64) -> String {
        format!(
            r#"{{"id_str":"{id}","user":{{"id_str":"{user_id}","screen_name":"author","name":"Author"}},"entities":{{"user_mentions":[{{"id_str":"{mentioned}","screen_name":"friend","name":"Friend"}}]}}}}"#
        )
    }

    fn delete(status_id: u64, user_id: u64, timestamp_ms: u64) -> String {
        format!(
            r#"{{"delete":{{"status":{{"id_str":"{status_id}","user_id_str":"{user_id}"}},"timestamp_ms":"{timestamp_ms}"}}}}"#
        )
    }

    fn import_lines(
        store: &Store,
        archive: &str,
        entry: &str,
        lines: &[String],
    ) -> Result<EntryOutcome> {
        let mut importer = Importer::new(store)?;
        importer.import(archive, &make_result(entry, lines))
    }

    #[test]
    fn fresh_entry_writes_every_family() {
        let (_dir, store) = temp_store();
        let lines = vec![
            tweet(BASE + 1, 10, "alice"),
            tweet_with_mention(BASE + 2, 11, 12),
            delete(BASE + 3, 13, 1_600_000_000_000),
        ];
        let outcome = import_lines(&store, "a.zip", "2021/01/01/00.json.bz2", &lines).unwrap();

        match outcome {
            EntryOutcome::Imported {
                written,
                full_statuses,
            } => {
                assert_eq!(full_statuses, 2);
                assert!(written > 0);
            }
            EntryOutcome::AlreadyComplete => panic!("expected an import"),
        }
        assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 2);
        assert_eq!(store.count_family(KeyFamily::Delete).unwrap(), 1);
        assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 1);
        // alice, author, friend
        assert_eq!(store.count_family(KeyFamily::ScreenName).unwrap(), 3);
        assert_eq!(store.count_family(KeyFamily::UserAlias).unwrap(), 3);

        let mentions = StatusFact::decode(
            &store.get(&codec::status_key(BASE + 2)).unwrap().unwrap(),
        )
        .unwrap();
        match mentions {
            StatusFact::Full(value) => assert_eq!(value.mentioned_ids(), &[12]),
            StatusFact::Short(_) => panic!("expected a full fact"),
        }
    }

    #[test]
    fn completed_entry_is_skipped() {
        let (_dir, store) = temp_store();
        let lines = vec![tweet(BASE + 1, 10, "alice")];

        let first = import_lines(&store, "a.zip", "entry", &lines).unwrap();
        assert!(matches!(first, EntryOutcome::Imported { .. }));

        // Fresh importer reloads markers from the store.
        let second = import_lines(&store, "a.zip", "entry", &lines).unwrap();
        assert_eq!(second, EntryOutcome::AlreadyComplete);
        assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 1);
    }

    #[test]
    fn reimport_under_new_entry_name_writes_nothing() {
        let (_dir, store) = temp_store();
        let lines = vec![tweet(BASE + 1, 10, "alice")];

        import_lines(&store, "a.zip", "entry-one", &lines).unwrap();
        let outcome = import_lines(&store, "a.zip", "entry-two", &lines).unwrap();

        // Same facts under a different entry: every row already present.
        assert_eq!(
            outcome,
            EntryOutcome::Imported {
                written: 0,
                full_statuses: 1
            }
        );
        assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 2);
    }

    #[test]
    fn full_fact_replaces_short_row() {
        let (_dir, store) = temp_store();
        let target = BASE + 100;

        // Entry one only references the target through a reply.
        import_lines(
            &store,
            "a.zip",
            "one",
            &[reply(BASE + 1, 10, "alice", target, 20)],
        )
        .unwrap();
        let stored = store.get(&codec::status_key(target)).unwrap().unwrap();
        assert!(matches!(
            StatusFact::decode(&stored).unwrap(),
            StatusFact::Short(20)
        ));

        // Entry two carries the target itself.
        import_lines(&store, "a.zip", "two", &[tweet(target, 20, "target")]).unwrap();
        let stored = store.get(&codec::status_key(target)).unwrap().unwrap();
        assert!(matches!(
            StatusFact::decode(&stored).unwrap(),
            StatusFact::Full(_)
        ));
    }

    #[test]
    fn short_row_never_replaces_full_fact() {
        let (_dir, store) = temp_store();
        let target = BASE + 100;

        import_lines(&store, "a.zip", "one", &[tweet(target, 20, "target")]).unwrap();
        let before = store.get(&codec::status_key(target)).unwrap().unwrap();

        import_lines(
            &store,
            "a.zip",
            "two",
            &[reply(BASE + 1, 10, "alice", target, 20)],
        )
        .unwrap();
        let after = store.get(&codec::status_key(target)).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn short_row_never_replaces_short_row() {
        let (_dir, store) = temp_store();
        let target = BASE + 100;

        import_lines(
            &store,
            "a.zip",
            "one",
            &[reply(BASE + 1, 10, "alice", target, 20)],
        )
        .unwrap();
        let before = store.get(&codec::status_key(target)).unwrap().unwrap();

        let outcome = import_lines(
            &store,
            "a.zip",
            "two",
            &[reply(BASE + 2, 11, "bob", target, 20)],
        )
        .unwrap();
        let after = store.get(&codec::status_key(target)).unwrap().unwrap();
        assert_eq!(before, after);
        // Entry two still writes its own tweet and user rows.
        assert!(matches!(
            outcome,
            EntryOutcome::Imported { written, .. } if written > 0
        ));
    }

    #[test]
    fn delete_row_keeps_first_timestamp() {
        let (_dir, store) = temp_store();

        import_lines(&store, "a.zip", "one", &[delete(BASE + 1, 10, 1_000)]).unwrap();
        import_lines(&store, "a.zip", "two", &[delete(BASE + 1, 10, 2_000)]).unwrap();

        let stored = store.get(&codec::delete_key(10, BASE + 1)).unwrap().unwrap();
        assert_eq!(codec::decode_delete_value(&stored).unwrap(), Some(1_000));
    }

    #[test]
    fn duplicate_status_merges_mentions() {
        let (_dir, store) = temp_store();
        let id = BASE + 1;

        import_lines(&store, "a.zip", "one", &[tweet_with_mention(id, 10, 12)]).unwrap();
        let outcome =
            import_lines(&store, "a.zip", "two", &[tweet_with_mention(id, 10, 13)]).unwrap();

        assert!(matches!(
            outcome,
            EntryOutcome::Imported { written, .. } if written > 0
        ));
        let stored = store.get(&codec::status_key(id)).unwrap().unwrap();
        match StatusFact::decode(&stored).unwrap() {
            StatusFact::Full(value) => assert_eq!(value.mentioned_ids(), &[12, 13]),
            StatusFact::Short(_) => panic!("expected a full fact"),
        }
    }

    #[test]
    fn conflicting_status_aborts_entry_unmarked() {
        let (_dir, store) = temp_store();
        let id = BASE + 1;

        // Same status id claimed by two different authors in one entry.
        let lines = vec![tweet(id, 10, "alice"), tweet(id, 11, "mallory")];
        let err = import_lines(&store, "a.zip", "entry", &lines).unwrap_err();

        assert!(matches!(err, XvError::StatusMerge { status_id, .. } if status_id == id));
        assert!(err.is_entry_scoped());
        assert_eq!(store.count_family(KeyFamily::Status).unwrap(), 0);
        assert_eq!(store.count_family(KeyFamily::CompletedEntry).unwrap(), 0);
    }

    #[test]
    fn conflict_against_store_leaves_prior_data_intact() {
        let (_dir, store) = temp_store();
        let id = BASE + 1;

        import_lines(&store, "a.zip", "one", &[tweet(id, 10, "alice")]).unwrap();
        let err = import_lines(&store, "a.zip", "two", &[tweet(id, 11, "mallory")]).unwrap_err();

        assert!(matches!(err, XvError::StatusMerge { .. }));
        let importer = Importer::new(&store).unwrap();
        assert!(importer.is_complete("a.zip", "one"));
        assert!(!importer.is_complete("a.zip", "two"));
        let stored = store.get(&codec::status_key(id)).unwrap().unwrap();
        match StatusFact::decode(&stored).unwrap() {
            StatusFact::Full(value) => assert_eq!(value.user_id, 10),
            StatusFact::Short(_) => panic!("expected a full fact"),
        }
    }

    #[test]
    fn retweet_stores_pointer_and_recurses() {
        let (_dir, store) = temp_store();
        let inner_id = BASE + 1;
        let wrapper_id = BASE + 2;

        // Wrapper mentions the original author, as the live stream does, but
        // only the wrapped status keeps mention facts.
        let line = format!(
            r#"{{"id_str":"{wrapper_id}","user":{{"id_str":"30","screen_name":"booster","name":"Booster"}},"entities":{{"user_mentions":[{{"id_str":"10","screen_name":"alice","name":"Alice"}}]}},"retweeted_status":{}}}"#,
            tweet_with_mention(inner_id, 10, 12),
        );
        import_lines(&store, "a.zip", "entry", &[line]).unwrap();

        let wrapper = store.get(&codec::status_key(wrapper_id)).unwrap().unwrap();
        match StatusFact::decode(&wrapper).unwrap() {
            StatusFact::Full(value) => {
                assert_eq!(value.tag(), 4);
                assert_eq!(value.user_id, 30);
                assert!(value.mentioned_ids().is_empty());
            }
            StatusFact::Short(_) => panic!("expected a full fact"),
        }

        let inner = store.get(&codec::status_key(inner_id)).unwrap().unwrap();
        match StatusFact::decode(&inner).unwrap() {
            StatusFact::Full(value) => {
                assert_eq!(value.user_id, 10);
                assert_eq!(value.mentioned_ids(), &[12]);
            }
            StatusFact::Short(_) => panic!("expected a full fact"),
        }

        // booster, author, friend; the wrapper's own mention row is skipped
        assert_eq!(store.count_family(KeyFamily::ScreenName).unwrap(), 3);
    }

    #[test]
    fn alias_sightings_accumulate_across_entries() {
        let (_dir, store) = temp_store();

        import_lines(&store, "a.zip", "one", &[tweet(BASE + 2, 10, "Alice")]).unwrap();
        import_lines(&store, "a.zip", "two", &[tweet(BASE + 1, 10, "alice")]).unwrap();

        let stored = store
            .get(&codec::user_alias_key(10, "alice"))
            .unwrap()
            .unwrap();
        assert_eq!(
            codec::decode_u64s(&stored).unwrap(),
            vec![BASE + 1, BASE + 2]
        );
    }

    #[test]
    fn quoted_status_without_id_keeps_citing_tweet_plain() {
        let (_dir, store) = temp_store();
        let quoted_id = BASE + 1;
        let citing_id = BASE + 2;

        let line = format!(
            r#"{{"id_str":"{citing_id}","user":{{"id_str":"10","screen_name":"alice","name":"Alice"}},"quoted_status":{}}}"#,
            tweet(quoted_id, 20, "quoted"),
        );
        import_lines(&store, "a.zip", "entry", &[line]).unwrap();

        // No quoted_status_id_str: no relation and no recursion.
        let citing = store.get(&codec::status_key(citing_id)).unwrap().unwrap();
        match StatusFact::decode(&citing).unwrap() {
            StatusFact::Full(value) => assert_eq!(value.tag(), 0),
            StatusFact::Short(_) => panic!("expected a full fact"),
        }
        assert!(store.get(&codec::status_key(quoted_id)).unwrap().is_none());
    }
}
