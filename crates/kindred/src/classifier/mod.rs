//! Turn classification
//!
//! A classifier looks at the user's side of a turn and reports its sentiment,
//! any preferences it expresses and whether it states a fact about the user.
//! The orchestrator uses the result to decide which records to write.

mod keyword;

pub use keyword::KeywordClassifier;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Overall polarity of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the user relates to a preference topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    Likes,
    Dislikes,
    Curious,
}

/// A preference mentioned in a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedPreference {
    pub topic: String,
    pub stance: Stance,
}

impl ExtractedPreference {
    pub fn likes(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            stance: Stance::Likes,
        }
    }

    pub fn dislikes(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            stance: Stance::Dislikes,
        }
    }

    pub fn curious(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            stance: Stance::Curious,
        }
    }

    /// Third-person sentence stored as the Preference record content
    pub fn describe(&self) -> String {
        match self.stance {
            Stance::Likes => format!("User enjoys {}", self.topic),
            Stance::Dislikes => format!("User dislikes {}", self.topic),
            Stance::Curious => format!("User is interested in {}", self.topic),
        }
    }
}

/// Result of classifying one user message
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    /// Strength of the sentiment signal in `0.0..=1.0`
    pub intensity: f32,
    pub extracted_preferences: Vec<ExtractedPreference>,
    /// Message is a declarative statement about the user
    pub is_fact: bool,
}

impl Classification {
    /// Neutral, no preferences, not a fact
    pub fn neutral() -> Self {
        Self::default()
    }

    /// Whether the message carries an emotional signal at or above `threshold`
    pub fn is_strong_emotion(&self, threshold: f32) -> bool {
        self.sentiment != Sentiment::Neutral && self.intensity >= threshold
    }
}

/// Classifies user text. Implementations must be pure: the same text always
/// yields the same classification.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification>;

    /// Return the name of this classifier for logging
    fn name(&self) -> &'static str;
}
