//! Binary layouts for every key and value the store holds.
//!
//! Every key starts with a one-byte family tag so families stay separated
//! under lexicographic ordering, and every embedded integer is a fixed-width
//! big-endian u64 so numeric order and byte order coincide for range scans.
//! Encoding is deterministic: encode and decode are exact inverses for every
//! value shape, and decode fails loudly rather than defaulting.

use std::collections::BTreeSet;
use std::io::Cursor;

use byteorder::{BE, ReadBytesExt};
use thiserror::Error;

/// Separator between archive name and entry path in completed-entry keys.
/// Archive file names cannot contain it on any supported platform.
const COMPLETED_KEY_SEPARATOR: u8 = b'|';

// =============================================================================
// Key Families
// =============================================================================

/// Leading tag byte distinguishing the store's key families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyFamily {
    /// `[0][user_id][screen_name]` → sorted source status ids.
    UserAlias = 0,
    /// `[1][screen_name]` → sorted candidate user ids.
    ScreenName = 1,
    /// `[2][status_id]` → full `StatusValue` or 8-byte short placeholder.
    Status = 2,
    /// `[3][user_id][status_id]` → empty or 8-byte deletion timestamp.
    Delete = 3,
    /// `[16]["archive|entry"]` → 8-byte count of full facts written.
    CompletedEntry = 16,
}

impl KeyFamily {
    /// The family's tag byte.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Map a tag byte back to its family.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::UserAlias),
            1 => Some(Self::ScreenName),
            2 => Some(Self::Status),
            3 => Some(Self::Delete),
            16 => Some(Self::CompletedEntry),
            _ => None,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Failure to parse a stored key or value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes than the shape's fixed header requires.
    #[error("truncated value ({len} bytes)")]
    Truncated { len: usize },

    /// Status value tag outside the known range.
    #[error("invalid status value tag {tag}")]
    InvalidTag { tag: u8 },

    /// Byte length not divisible into whole u64s.
    #[error("invalid value length {len} (not divisible into u64s)")]
    InvalidLength { len: usize },

    /// Retweet values carry exactly one relation id and no mentions.
    #[error("invalid retweet value ({ids} trailing ids)")]
    InvalidRetweet { ids: usize },

    /// A key scanned from the store does not match its family's layout.
    #[error("unexpected key bytes {key:?}")]
    UnexpectedKey { key: Vec<u8> },
}

/// Two status facts for the same status disagree on a field that merging can
/// never reconcile. Any of these indicates corruption or a non-idempotent
/// re-import and must abort the affected entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeConflict {
    #[error("different tags: {existing}, {incoming}")]
    Tag { existing: u8, incoming: u8 },

    #[error("different user ids: {existing}, {incoming}")]
    UserId { existing: u64, incoming: u64 },

    #[error("different timestamps: {existing}, {incoming}")]
    Timestamp { existing: u64, incoming: u64 },

    #[error("different reply-to status ids: {existing}, {incoming}")]
    ReplyTo { existing: u64, incoming: u64 },

    #[error("different quoted status ids: {existing}, {incoming}")]
    Quoted { existing: u64, incoming: u64 },

    #[error("different retweeted status ids: {existing}, {incoming}")]
    Retweeted { existing: u64, incoming: u64 },
}

// =============================================================================
// Key Builders
// =============================================================================

/// Key recording that a user was seen under a screen name. The name is folded
/// to lowercase so alias history is case-insensitive.
#[must_use]
pub fn user_alias_key(user_id: u64, screen_name: &str) -> Vec<u8> {
    let name = screen_name.to_lowercase();
    let mut key = Vec::with_capacity(9 + name.len());
    key.push(KeyFamily::UserAlias.tag());
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

/// Key indexing a (lowercased) screen name to its candidate user ids.
#[must_use]
pub fn screen_name_key(screen_name: &str) -> Vec<u8> {
    let name = screen_name.to_lowercase();
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(KeyFamily::ScreenName.tag());
    key.extend_from_slice(name.as_bytes());
    key
}

/// Key holding the derived fact for one status.
#[must_use]
pub fn status_key(status_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(KeyFamily::Status.tag());
    key.extend_from_slice(&status_id.to_be_bytes());
    key
}

/// Key recording a deletion event for (user, status).
#[must_use]
pub fn delete_key(user_id: u64, status_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(KeyFamily::Delete.tag());
    key.extend_from_slice(&user_id.to_be_bytes());
    key.extend_from_slice(&status_id.to_be_bytes());
    key
}

/// Key marking one archive entry as fully imported.
#[must_use]
pub fn completed_entry_key(archive: &str, entry: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + archive.len() + entry.len());
    key.push(KeyFamily::CompletedEntry.tag());
    key.extend_from_slice(archive.as_bytes());
    key.push(COMPLETED_KEY_SEPARATOR);
    key.extend_from_slice(entry.as_bytes());
    key
}

/// Recover the (archive, entry) pair from a completed-entry key.
///
/// # Errors
///
/// Fails if the tag byte, UTF-8 content, or separator do not match the
/// family's layout.
pub fn parse_completed_entry_key(key: &[u8]) -> Result<(String, String), CodecError> {
    let unexpected = || CodecError::UnexpectedKey { key: key.to_vec() };

    match key.split_first() {
        Some((tag, rest)) if *tag == KeyFamily::CompletedEntry.tag() => {
            let text = std::str::from_utf8(rest).map_err(|_| unexpected())?;
            let (archive, entry) = text
                .split_once(COMPLETED_KEY_SEPARATOR as char)
                .ok_or_else(unexpected)?;
            Ok((archive.to_string(), entry.to_string()))
        }
        _ => Err(unexpected()),
    }
}

// =============================================================================
// List and Scalar Values
// =============================================================================

/// Decode a value holding consecutive big-endian u64s.
///
/// # Errors
///
/// Fails when the length is not a multiple of eight.
pub fn decode_u64s(bytes: &[u8]) -> Result<Vec<u64>, CodecError> {
    if bytes.len() % 8 != 0 {
        return Err(CodecError::InvalidLength { len: bytes.len() });
    }
    let count = bytes.len() / 8;
    let mut cursor = Cursor::new(bytes);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let value = cursor
            .read_u64::<BE>()
            .map_err(|_| CodecError::Truncated { len: bytes.len() })?;
        values.push(value);
    }
    Ok(values)
}

/// Encode u64s as consecutive big-endian words.
#[must_use]
pub fn encode_u64s(values: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for value in values {
        bytes.extend_from_slice(&value.to_be_bytes());
    }
    bytes
}

/// Merge additions into an existing sorted-u64-list value. Lists are
/// append-only: the result is the sorted, deduplicated union. Returns `None`
/// when every addition is already present, so unchanged rows skip the write.
///
/// # Errors
///
/// Fails when the existing value does not decode as a u64 list.
pub fn merge_u64s(
    existing: Option<&[u8]>,
    additions: &BTreeSet<u64>,
) -> Result<Option<Vec<u8>>, CodecError> {
    match existing {
        None => {
            if additions.is_empty() {
                Ok(None)
            } else {
                let values: Vec<u64> = additions.iter().copied().collect();
                Ok(Some(encode_u64s(&values)))
            }
        }
        Some(bytes) => {
            let current = decode_u64s(bytes)?;
            let mut union: Vec<u64> = current.clone();
            union.extend(additions.iter().copied());
            union.sort_unstable();
            union.dedup();
            if union == current {
                Ok(None)
            } else {
                Ok(Some(encode_u64s(&union)))
            }
        }
    }
}

/// Encode a deletion row value: empty when the client supplied no timestamp.
#[must_use]
pub fn encode_delete_value(timestamp_ms: Option<u64>) -> Vec<u8> {
    timestamp_ms.map_or_else(Vec::new, |ms| ms.to_be_bytes().to_vec())
}

/// Decode a deletion row value.
///
/// # Errors
///
/// Fails on any length other than zero or eight.
pub fn decode_delete_value(bytes: &[u8]) -> Result<Option<u64>, CodecError> {
    match bytes.len() {
        0 => Ok(None),
        8 => Ok(Some(u64::from_be_bytes(bytes.try_into().map_err(
            |_| CodecError::InvalidLength { len: bytes.len() },
        )?))),
        len => Err(CodecError::InvalidLength { len }),
    }
}

/// Encode a completed-entry marker value (count of full facts written).
#[must_use]
pub fn encode_completed_value(count: u64) -> Vec<u8> {
    count.to_be_bytes().to_vec()
}

// =============================================================================
// Status Values
// =============================================================================

/// Relationship a status carries, selecting its value shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRelation {
    Plain,
    Reply { reply_to: u64 },
    Quote { quoted: u64 },
    ReplyQuote { reply_to: u64, quoted: u64 },
    Retweet { retweeted: u64 },
}

/// The derived fact describing one status: who posted it, when, what it
/// relates to, and (for non-retweets) whom it mentions.
///
/// Wire shape: `[tag u8][user_id u64][timestamp_ms u64]`, then the relation
/// ids the tag implies (reply-to before quoted), then the sorted mention
/// list. Retweets carry exactly the retweeted id and never mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusValue {
    pub user_id: u64,
    pub timestamp_ms: u64,
    relation: StatusRelation,
    mentioned_ids: Vec<u64>,
}

impl StatusValue {
    /// Build the fact for a non-retweet status. Mentions are sorted and
    /// deduplicated here so every constructed value is canonical.
    #[must_use]
    pub fn tweet(
        user_id: u64,
        timestamp_ms: u64,
        reply_to: Option<u64>,
        quoted: Option<u64>,
        mentioned_ids: impl IntoIterator<Item = u64>,
    ) -> Self {
        let relation = match (reply_to, quoted) {
            (None, None) => StatusRelation::Plain,
            (Some(reply_to), None) => StatusRelation::Reply { reply_to },
            (None, Some(quoted)) => StatusRelation::Quote { quoted },
            (Some(reply_to), Some(quoted)) => StatusRelation::ReplyQuote { reply_to, quoted },
        };
        let mut ids: Vec<u64> = mentioned_ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self {
            user_id,
            timestamp_ms,
            relation,
            mentioned_ids: ids,
        }
    }

    /// Build the fact for a retweet.
    #[must_use]
    pub const fn retweet(user_id: u64, timestamp_ms: u64, retweeted: u64) -> Self {
        Self {
            user_id,
            timestamp_ms,
            relation: StatusRelation::Retweet { retweeted },
            mentioned_ids: Vec::new(),
        }
    }

    /// The 3-bit shape tag stored as the leading byte.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self.relation {
            StatusRelation::Plain => 0,
            StatusRelation::Reply { .. } => 1,
            StatusRelation::Quote { .. } => 2,
            StatusRelation::ReplyQuote { .. } => 3,
            StatusRelation::Retweet { .. } => 4,
        }
    }

    #[must_use]
    pub const fn relation(&self) -> StatusRelation {
        self.relation
    }

    #[must_use]
    pub fn mentioned_ids(&self) -> &[u64] {
        &self.mentioned_ids
    }

    /// Serialize to the wire shape.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(17 + 16 + self.mentioned_ids.len() * 8);
        bytes.push(self.tag());
        bytes.extend_from_slice(&self.user_id.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp_ms.to_be_bytes());

        match self.relation {
            StatusRelation::Plain => {}
            StatusRelation::Reply { reply_to } => {
                bytes.extend_from_slice(&reply_to.to_be_bytes());
            }
            StatusRelation::Quote { quoted } => {
                bytes.extend_from_slice(&quoted.to_be_bytes());
            }
            StatusRelation::ReplyQuote { reply_to, quoted } => {
                bytes.extend_from_slice(&reply_to.to_be_bytes());
                bytes.extend_from_slice(&quoted.to_be_bytes());
            }
            StatusRelation::Retweet { retweeted } => {
                bytes.extend_from_slice(&retweeted.to_be_bytes());
                return bytes;
            }
        }

        for id in &self.mentioned_ids {
            bytes.extend_from_slice(&id.to_be_bytes());
        }
        bytes
    }

    /// Parse the wire shape.
    ///
    /// # Errors
    ///
    /// Fails on fewer than 17 bytes, a tag above 4, a body not divisible
    /// into u64s, missing relation ids, or a retweet with trailing ids.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < 17 {
            return Err(CodecError::Truncated { len: bytes.len() });
        }
        let tag = bytes[0];
        if tag > 4 {
            return Err(CodecError::InvalidTag { tag });
        }
        let body = &bytes[1..];
        if body.len() % 8 != 0 {
            return Err(CodecError::InvalidLength { len: bytes.len() });
        }
        let values = decode_u64s(body)?;
        let user_id = values[0];
        let timestamp_ms = values[1];

        if tag == 4 {
            if values.len() != 3 {
                return Err(CodecError::InvalidRetweet {
                    ids: values.len() - 2,
                });
            }
            return Ok(Self::retweet(user_id, timestamp_ms, values[2]));
        }

        let relation_ids = match tag {
            0 => 0,
            1 | 2 => 1,
            _ => 2,
        };
        if values.len() < 2 + relation_ids {
            return Err(CodecError::Truncated { len: bytes.len() });
        }

        let relation = match tag {
            0 => StatusRelation::Plain,
            1 => StatusRelation::Reply {
                reply_to: values[2],
            },
            2 => StatusRelation::Quote { quoted: values[2] },
            _ => StatusRelation::ReplyQuote {
                reply_to: values[2],
                quoted: values[3],
            },
        };

        // Mentions are stored canonical (sorted, deduplicated); decode takes
        // them as-is so encode∘decode is the identity on stored bytes.
        Ok(Self {
            user_id,
            timestamp_ms,
            relation,
            mentioned_ids: values[2 + relation_ids..].to_vec(),
        })
    }

    /// Reconcile this fact with another derivation of the same status.
    ///
    /// Tag, user id, timestamp, and every relation id must agree exactly;
    /// only the mention lists may differ, and then the result carries their
    /// sorted, deduplicated union. `merge(v, v) == v`.
    ///
    /// # Errors
    ///
    /// Any disagreement outside the mention lists is a [`MergeConflict`].
    pub fn merge(&self, other: &Self) -> Result<Self, MergeConflict> {
        if self.tag() != other.tag() {
            return Err(MergeConflict::Tag {
                existing: self.tag(),
                incoming: other.tag(),
            });
        }
        if self.user_id != other.user_id {
            return Err(MergeConflict::UserId {
                existing: self.user_id,
                incoming: other.user_id,
            });
        }
        if self.timestamp_ms != other.timestamp_ms {
            return Err(MergeConflict::Timestamp {
                existing: self.timestamp_ms,
                incoming: other.timestamp_ms,
            });
        }

        match (self.relation, other.relation) {
            (
                StatusRelation::Reply { reply_to: a },
                StatusRelation::Reply { reply_to: b },
            )
            | (
                StatusRelation::ReplyQuote { reply_to: a, .. },
                StatusRelation::ReplyQuote { reply_to: b, .. },
            ) if a != b => {
                return Err(MergeConflict::ReplyTo {
                    existing: a,
                    incoming: b,
                });
            }
            _ => {}
        }
        match (self.relation, other.relation) {
            (StatusRelation::Quote { quoted: a }, StatusRelation::Quote { quoted: b })
            | (
                StatusRelation::ReplyQuote { quoted: a, .. },
                StatusRelation::ReplyQuote { quoted: b, .. },
            ) if a != b => {
                return Err(MergeConflict::Quoted {
                    existing: a,
                    incoming: b,
                });
            }
            _ => {}
        }
        if let (
            StatusRelation::Retweet { retweeted: a },
            StatusRelation::Retweet { retweeted: b },
        ) = (self.relation, other.relation)
        {
            if a != b {
                return Err(MergeConflict::Retweeted {
                    existing: a,
                    incoming: b,
                });
            }
        }

        if self.mentioned_ids == other.mentioned_ids {
            Ok(self.clone())
        } else {
            let mut union = self.mentioned_ids.clone();
            union.extend_from_slice(&other.mentioned_ids);
            union.sort_unstable();
            union.dedup();
            Ok(Self {
                user_id: self.user_id,
                timestamp_ms: self.timestamp_ms,
                relation: self.relation,
                mentioned_ids: union,
            })
        }
    }
}

/// What a status-fact row holds: a full derived fact, or an 8-byte
/// placeholder recording only the author of a status seen by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFact {
    Short(u64),
    Full(StatusValue),
}

impl StatusFact {
    /// Parse a status-fact row. Exactly eight bytes is a short placeholder;
    /// anything else must parse as a full `StatusValue`.
    ///
    /// # Errors
    ///
    /// Propagates `StatusValue` parse failures.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() == 8 {
            let user_id = u64::from_be_bytes(
                bytes
                    .try_into()
                    .map_err(|_| CodecError::InvalidLength { len: bytes.len() })?,
            );
            Ok(Self::Short(user_id))
        } else {
            StatusValue::decode(bytes).map(Self::Full)
        }
    }

    /// Serialize to the row value.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Short(user_id) => user_id.to_be_bytes().to_vec(),
            Self::Full(value) => value.encode(),
        }
    }
}
