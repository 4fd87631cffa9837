//! Core memory types
//!
//! A [`MemoryRecord`] is the unit both tiers agree on: identity, kind,
//! content and creation time are fixed once the record exists. Only the
//! embedding (filled lazily by the persistent tier) and the derived salience
//! change afterwards.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length for owner identifiers
const MAX_OWNER_ID_LEN: usize = 128;

/// Errors that can occur during owner id validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OwnerIdError {
    #[error("Owner id cannot be empty")]
    Empty,

    #[error("Owner id contains invalid characters: allowed are a-z, A-Z, 0-9, _, -")]
    InvalidChars,

    #[error("Owner id exceeds maximum length of {MAX_OWNER_ID_LEN} characters")]
    TooLong,
}

/// A validated owner identifier
///
/// Every record belongs to exactly one owner and is never visible to another.
/// The character set is restricted so owner ids can be embedded in store
/// predicates without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), OwnerIdError> {
        if s.is_empty() {
            return Err(OwnerIdError::Empty);
        }

        if s.len() > MAX_OWNER_ID_LEN {
            return Err(OwnerIdError::TooLong);
        }

        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(OwnerIdError::InvalidChars);
        }

        Ok(())
    }
}

impl TryFrom<&str> for OwnerId {
    type Error = OwnerIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::validate(value)?;
        Ok(OwnerId(value.to_string()))
    }
}

impl TryFrom<String> for OwnerId {
    type Error = OwnerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)?;
        Ok(OwnerId(value))
    }
}

impl From<OwnerId> for String {
    fn from(owner: OwnerId) -> Self {
        owner.0
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a record remembers. Decides which tier(s) the record is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryKind {
    /// A full user/assistant exchange
    Conversation,
    /// Something the user likes, dislikes or is interested in
    Preference,
    /// A declarative statement about the user
    Fact,
    /// A strong emotional signal from the user
    Emotion,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 4] = [
        MemoryKind::Conversation,
        MemoryKind::Preference,
        MemoryKind::Fact,
        MemoryKind::Emotion,
    ];

    /// Whether records of this kind are mirrored into the persistent index
    pub fn is_persistent(&self) -> bool {
        !matches!(self, MemoryKind::Conversation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Conversation => "conversation",
            MemoryKind::Preference => "preference",
            MemoryKind::Fact => "fact",
            MemoryKind::Emotion => "emotion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single remembered fact, utterance or emotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    id: Uuid,
    kind: MemoryKind,
    content: String,
    created_at: DateTime<Utc>,
    owner: OwnerId,
    /// Populated by the persistent tier on write
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    /// Derived score, recomputed whenever the record is read back
    #[serde(default)]
    salience: f32,
    /// Number of times the record was returned by a search
    #[serde(default)]
    hit_count: u32,
}

impl MemoryRecord {
    pub fn new(owner: OwnerId, kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            created_at: Utc::now(),
            owner,
            embedding: None,
            salience: 0.0,
            hit_count: 0,
        }
    }

    /// Rebuild a record from stored fields
    pub fn from_parts(
        id: Uuid,
        owner: OwnerId,
        kind: MemoryKind,
        content: String,
        created_at: DateTime<Utc>,
        hit_count: u32,
    ) -> Self {
        Self {
            id,
            kind,
            content,
            created_at,
            owner,
            embedding: None,
            salience: 0.0,
            hit_count,
        }
    }

    /// Backdate a freshly created record. Only meaningful before it is stored.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    pub fn salience(&self) -> f32 {
        self.salience
    }

    pub fn hit_count(&self) -> u32 {
        self.hit_count
    }

    pub(crate) fn set_salience(&mut self, salience: f32) {
        self.salience = salience;
    }

    pub(crate) fn record_hit(&mut self) {
        self.hit_count = self.hit_count.saturating_add(1);
    }

    /// Hash of the normalized content, used to detect duplicates across tiers
    pub fn content_hash(&self) -> u64 {
        content_hash(&self.content)
    }
}

/// Hash text after lowercasing and collapsing whitespace, so trivially
/// different renderings of the same sentence collide.
pub fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    for word in text.split_whitespace() {
        word.to_lowercase().hash(&mut hasher);
    }
    hasher.finish()
}

/// One completed user/assistant exchange held in the session buffer
///
/// A turn can only be built once both sides of the exchange exist, so an
/// abandoned turn never reaches either tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTurn {
    pub user_text: String,
    pub assistant_text: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionTurn {
    pub fn new(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Content of the Conversation record derived from this turn
    pub fn transcript(&self) -> String {
        format!("User: {}\nAssistant: {}", self.user_text, self.assistant_text)
    }

    /// Hashes of every rendering a persistent record could duplicate:
    /// the user text, the assistant text and the full transcript.
    pub fn content_hashes(&self) -> [u64; 3] {
        [
            content_hash(&self.user_text),
            content_hash(&self.assistant_text),
            content_hash(&self.transcript()),
        ]
    }
}
