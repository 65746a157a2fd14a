//! Full-user-profile side table.
//!
//! A second pass over the same archives that keeps complete author profiles
//! instead of the compact facts the main importer stores. Profiles live in
//! their own store, keyed by user and capture time, so a user's profile
//! history reads back as one forward scan.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, XvError};
use crate::model::{Tweet, UserProfile};
use crate::pipeline::FileResult;
use crate::store::Store;

const PROFILE_TAG: u8 = 0;

/// Key for one profile snapshot: `[0][user_id][snapshot_ms]`, both
/// big-endian, so snapshots of a user sort by capture time.
#[must_use]
pub fn profile_key(user_id: u64, snapshot_ms: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(PROFILE_TAG);
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(&snapshot_ms.to_be_bytes());
    key
}

/// Parse a filter file of decimal user ids, one per line. Blank lines are
/// skipped.
///
/// # Errors
///
/// Fails when the file cannot be read or a line is not a decimal id.
pub fn load_filter(path: &Path) -> Result<HashSet<u64>> {
    let text =
        fs::read_to_string(path).map_err(|e| XvError::path_error("read filter file", path, e))?;
    let mut ids = HashSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = line.parse::<u64>().map_err(|_| {
            XvError::invalid_argument(format!(
                "invalid user id '{line}' in filter file {}",
                path.display()
            ))
        })?;
        ids.insert(id);
    }
    Ok(ids)
}

/// Writes profile snapshots for every tweet author an archive carries,
/// including authors of quoted and retweeted statuses.
///
/// The first snapshot seen for a (user, millisecond) pair wins; re-imports
/// and overlapping archives are no-ops for rows already present.
pub struct ProfileImporter<'a> {
    store: &'a Store,
    filter: Option<HashSet<u64>>,
    written: u64,
    already_present: u64,
    filtered: u64,
    incomplete: u64,
}

impl<'a> ProfileImporter<'a> {
    #[must_use]
    pub fn new(store: &'a Store, filter: Option<HashSet<u64>>) -> Self {
        Self {
            store,
            filter,
            written: 0,
            already_present: 0,
            filtered: 0,
            incomplete: 0,
        }
    }

    /// Profiles written so far.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Snapshots skipped because the row already existed.
    #[must_use]
    pub const fn already_present(&self) -> u64 {
        self.already_present
    }

    /// Authors skipped by the id filter.
    #[must_use]
    pub const fn filtered(&self) -> u64 {
        self.filtered
    }

    /// Tweets whose user object was missing required profile fields.
    #[must_use]
    pub const fn incomplete(&self) -> u64 {
        self.incomplete
    }

    /// Imports every author profile of one decoded entry. Each snapshot is
    /// its own small transaction, so a failure loses at most one row.
    ///
    /// # Errors
    ///
    /// Fails on store errors; malformed user objects are counted and skipped.
    pub fn import(&mut self, result: &FileResult) -> Result<()> {
        for item in result.decoded() {
            if let Some(tweet) = item.as_tweet() {
                self.import_tweet(tweet)?;
            }
        }
        debug!(
            entry = result.path(),
            written = self.written,
            already_present = self.already_present,
            "profiles imported"
        );
        Ok(())
    }

    fn import_tweet(&mut self, tweet: &Tweet) -> Result<()> {
        if self.passes_filter(tweet.user_id()) {
            // full_user already logs the skip reason.
            match tweet.full_user() {
                Some(profile) => self.store_profile(&profile)?,
                None => self.incomplete += 1,
            }
        } else {
            self.filtered += 1;
        }

        if let Some(quoted) = tweet.quoted_status() {
            self.import_tweet(&quoted)?;
        }
        if let Some(retweeted) = tweet.retweeted_status() {
            self.import_tweet(&retweeted)?;
        }
        Ok(())
    }

    fn passes_filter(&self, user_id: u64) -> bool {
        self.filter
            .as_ref()
            .is_none_or(|ids| ids.contains(&user_id))
    }

    fn store_profile(&mut self, profile: &UserProfile) -> Result<()> {
        let key = profile_key(profile.user_id, profile.snapshot_ms);
        let tx = self.store.transaction();
        if tx.get(&key)?.is_some() {
            self.already_present += 1;
            return Ok(());
        }
        tx.put(&key, serde_json::to_vec(profile)?)?;
        tx.commit()?;
        self.written += 1;
        Ok(())
    }
}
