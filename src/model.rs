//! Decoded archive records.
//!
//! An [`Item`] is one line of stream-archive content: a tweet snapshot or a
//! deletion event. Tweets keep a handle on their raw payload so the less
//! frequently needed structures (reply targets, mentions, nested statuses,
//! full profiles) are derived lazily instead of eagerly at decode time.

use chrono::{DateTime, Utc};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::decode;
use crate::twitter;

/// One decoded line of archive content.
#[derive(Debug, Clone)]
pub enum Item {
    Tweet(Tweet),
    Delete(Delete),
}

impl Item {
    /// Id of the status this item concerns.
    #[must_use]
    pub const fn status_id(&self) -> u64 {
        match self {
            Self::Tweet(tweet) => tweet.status_id,
            Self::Delete(delete) => delete.status_id,
        }
    }

    /// Id of the user this item concerns.
    #[must_use]
    pub const fn user_id(&self) -> u64 {
        match self {
            Self::Tweet(tweet) => tweet.user_id,
            Self::Delete(delete) => delete.user_id,
        }
    }

    #[must_use]
    pub const fn as_tweet(&self) -> Option<&Tweet> {
        match self {
            Self::Tweet(tweet) => Some(tweet),
            Self::Delete(_) => None,
        }
    }

    #[must_use]
    pub const fn as_delete(&self) -> Option<&Delete> {
        match self {
            Self::Delete(delete) => Some(delete),
            Self::Tweet(_) => None,
        }
    }
}

/// A deletion event from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub status_id: u64,
    pub user_id: u64,
    /// Stream-supplied deletion time; frequently absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Delete {
    #[must_use]
    pub fn timestamp_millis(&self) -> Option<u64> {
        self.timestamp.map(twitter::to_millis)
    }
}

/// A tweet snapshot from the stream, possibly nested inside another tweet as
/// a quoted or retweeted status.
#[derive(Debug, Clone)]
pub struct Tweet {
    status_id: u64,
    user_id: u64,
    source_status_id: u64,
    timestamp: DateTime<Utc>,
    snapshot: DateTime<Utc>,
    screen_name: String,
    display_name: String,
    value: Value,
    created_at: OnceCell<DateTime<Utc>>,
}

impl Tweet {
    /// Build a tweet from its already-validated header fields plus the raw
    /// payload. `source_status_id` and `snapshot` arrive from the enclosing
    /// tweet during nested decode and default to this tweet's own id and
    /// derived timestamp at the top level.
    pub(crate) fn new(
        status_id: u64,
        source_status_id: Option<u64>,
        snapshot: Option<DateTime<Utc>>,
        user_id: u64,
        screen_name: String,
        display_name: String,
        value: Value,
    ) -> Self {
        let timestamp = twitter::extract_timestamp(status_id)
            .unwrap_or_else(|| Self::parse_created_at(&value, status_id));
        Self {
            status_id,
            user_id,
            source_status_id: source_status_id.unwrap_or(status_id),
            timestamp,
            snapshot: snapshot.unwrap_or(timestamp),
            screen_name,
            display_name,
            value,
            created_at: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn status_id(&self) -> u64 {
        self.status_id
    }

    #[must_use]
    pub const fn user_id(&self) -> u64 {
        self.user_id
    }

    /// The outermost tweet's id for the capture that produced this snapshot.
    /// Equal to `status_id` for top-level tweets.
    #[must_use]
    pub const fn source_status_id(&self) -> u64 {
        self.source_status_id
    }

    /// Creation time: snowflake-derived when the id allows, otherwise the
    /// payload's `created_at`.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn timestamp_millis(&self) -> u64 {
        twitter::to_millis(self.timestamp)
    }

    /// When this snapshot was captured.
    #[must_use]
    pub const fn snapshot(&self) -> DateTime<Utc> {
        self.snapshot
    }

    #[must_use]
    pub fn snapshot_millis(&self) -> u64 {
        twitter::to_millis(self.snapshot)
    }

    #[must_use]
    pub fn screen_name(&self) -> &str {
        &self.screen_name
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The raw decoded payload.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// The author as a (user id, screen name, display name) triple.
    #[must_use]
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            user_id: self.user_id,
            screen_name: self.screen_name.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// The payload's `created_at`, parsed once on first access. Defaults to
    /// epoch 0 (with a logged warning) when missing or unparseable.
    pub fn created_at(&self) -> DateTime<Utc> {
        *self
            .created_at
            .get_or_init(|| Self::parse_created_at(&self.value, self.status_id))
    }

    fn parse_created_at(value: &Value, status_id: u64) -> DateTime<Utc> {
        decode::get_str(value, "created_at")
            .and_then(twitter::parse_date)
            .unwrap_or_else(|| {
                warn!(status_id, "missing or unparseable created_at, defaulting to epoch");
                DateTime::UNIX_EPOCH
            })
    }

    /// The reply target, when all three reply fields are present.
    #[must_use]
    pub fn reply_info(&self) -> Option<ReplyInfo> {
        Some(ReplyInfo {
            status_id: decode::get_u64(&self.value, "in_reply_to_status_id_str")?,
            user_id: decode::get_u64(&self.value, "in_reply_to_user_id_str")?,
            screen_name: decode::get_str(&self.value, "in_reply_to_screen_name")?.to_string(),
        })
    }

    /// The quoted status id, which may be present even when the quoted
    /// status object itself was not embedded.
    #[must_use]
    pub fn quoted_status_id(&self) -> Option<u64> {
        decode::get_u64(&self.value, "quoted_status_id_str")
    }

    /// Decode the embedded quoted status, threading this tweet's source id
    /// and snapshot into it.
    #[must_use]
    pub fn quoted_status(&self) -> Option<Self> {
        self.nested_status("quoted_status")
    }

    /// Decode the embedded retweeted status, threading this tweet's source
    /// id and snapshot into it.
    #[must_use]
    pub fn retweeted_status(&self) -> Option<Self> {
        self.nested_status("retweeted_status")
    }

    fn nested_status(&self, field: &'static str) -> Option<Self> {
        let nested = self.value.get(field)?;
        if !nested.is_object() {
            return None;
        }
        match decode::decode_tweet(nested, Some(self.source_status_id), Some(self.snapshot)) {
            Ok(tweet) => Some(tweet),
            Err(error) => {
                warn!(
                    status_id = self.status_id,
                    field, %error,
                    "failed to decode nested status"
                );
                None
            }
        }
    }

    /// Mentioned users, preferring the extended-tweet entity path. Malformed
    /// individual mentions are skipped; a missing entities structure yields
    /// an empty list.
    #[must_use]
    pub fn user_mentions(&self) -> Vec<UserInfo> {
        let mentions = self
            .value
            .pointer("/extended_tweet/entities/user_mentions")
            .or_else(|| self.value.pointer("/entities/user_mentions"))
            .and_then(Value::as_array);

        let Some(mentions) = mentions else {
            warn!(status_id = self.status_id, "no user mention entities");
            return Vec::new();
        };

        let mut result = Vec::with_capacity(mentions.len());
        for mention in mentions {
            let decoded = decode::get_u64(mention, "id_str").and_then(|user_id| {
                Some(UserInfo {
                    user_id,
                    screen_name: decode::get_str(mention, "screen_name")?.to_string(),
                    display_name: decode::get_str(mention, "name")?.to_string(),
                })
            });
            match decoded {
                Some(info) => result.push(info),
                None => warn!(status_id = self.status_id, "skipping malformed user mention"),
            }
        }
        result
    }

    /// Decode the author's full profile snapshot, when the payload carries
    /// every required profile field.
    #[must_use]
    pub fn full_user(&self) -> Option<UserProfile> {
        let user = self.value.get("user")?;
        let profile = UserProfile::from_user_object(user, self.snapshot);
        if profile.is_none() {
            warn!(status_id = self.status_id, "incomplete user object, skipping profile");
        }
        profile
    }
}

/// A user sighting: id plus the names in effect at capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: u64,
    pub screen_name: String,
    pub display_name: String,
}

/// The target of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyInfo {
    pub status_id: u64,
    pub user_id: u64,
    pub screen_name: String,
}

/// A full profile snapshot of a user at one capture time, stored in the
/// profile side table as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: u64,
    pub snapshot_ms: u64,
    pub screen_name: String,
    pub display_name: String,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub protected: bool,
    pub verified: bool,
    pub followers_count: u64,
    pub friends_count: u64,
    pub listed_count: u64,
    pub favourites_count: u64,
    pub statuses_count: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub profile_image_url: String,
    pub profile_banner_url: Option<String>,
    pub profile_background_image_url: Option<String>,
    pub default_profile: bool,
    pub default_profile_image: bool,
    pub withheld_in_countries: Vec<String>,
    pub time_zone: Option<String>,
    pub lang: Option<String>,
    pub geo_enabled: Option<bool>,
}

impl UserProfile {
    /// Decode a profile from a tweet's `user` object. Returns `None` when
    /// any required field is missing or mistyped.
    #[must_use]
    pub fn from_user_object(user: &Value, snapshot: DateTime<Utc>) -> Option<Self> {
        Some(Self {
            user_id: decode::get_u64(user, "id_str")?,
            snapshot_ms: twitter::to_millis(snapshot),
            screen_name: decode::get_str(user, "screen_name")?.to_string(),
            display_name: decode::get_str(user, "name")?.to_string(),
            location: decode::get_str(user, "location").map(String::from),
            url: decode::get_str(user, "url").map(String::from),
            description: decode::get_str(user, "description").map(String::from),
            protected: decode::get_bool(user, "protected")?,
            verified: decode::get_bool(user, "verified")?,
            followers_count: decode::get_u64(user, "followers_count")?,
            friends_count: decode::get_u64(user, "friends_count")?,
            listed_count: decode::get_u64(user, "listed_count")?,
            favourites_count: decode::get_u64(user, "favourites_count")?,
            statuses_count: decode::get_u64(user, "statuses_count")?,
            created_at: decode::get_str(user, "created_at").and_then(twitter::parse_date),
            profile_image_url: decode::get_str(user, "profile_image_url_https")?.to_string(),
            profile_banner_url: decode::get_str(user, "profile_banner_url").map(String::from),
            profile_background_image_url: decode::get_str(user, "profile_background_image_url_https")
                .map(String::from),
            default_profile: decode::get_bool(user, "default_profile")?,
            default_profile_image: decode::get_bool(user, "default_profile_image")?,
            withheld_in_countries: user
                .get("withheld_in_countries")
                .and_then(Value::as_array)
                .map(|countries| {
                    countries
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            time_zone: decode::get_str(user, "time_zone").map(String::from),
            lang: decode::get_str(user, "lang").map(String::from),
            geo_enabled: decode::get_bool(user, "geo_enabled"),
        })
    }
}
