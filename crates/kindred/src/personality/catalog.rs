use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::Sentiment;

/// The closed set of personas the companion can take on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityVariant {
    #[default]
    Caring,
    Playful,
    Intellectual,
    Romantic,
}

impl PersonalityVariant {
    pub const ALL: [PersonalityVariant; 4] = [
        PersonalityVariant::Caring,
        PersonalityVariant::Playful,
        PersonalityVariant::Intellectual,
        PersonalityVariant::Romantic,
    ];

    /// Identifier used in config files and commands
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityVariant::Caring => "caring",
            PersonalityVariant::Playful => "playful",
            PersonalityVariant::Intellectual => "intellectual",
            PersonalityVariant::Romantic => "romantic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PersonalityVariant::Caring => "Carer",
            PersonalityVariant::Playful => "Prankster",
            PersonalityVariant::Intellectual => "Sage",
            PersonalityVariant::Romantic => "Romantic",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PersonalityVariant::Caring => "warm and nurturing",
            PersonalityVariant::Playful => "playful and full of humour",
            PersonalityVariant::Intellectual => "thoughtful and intellectually curious",
            PersonalityVariant::Romantic => "romantic and openly affectionate",
        }
    }

    pub fn response_style(&self) -> &'static str {
        match self {
            PersonalityVariant::Caring => {
                "a warm, caring tone that puts the user's feelings first"
            }
            PersonalityVariant::Playful => "a light, joking tone with a sprinkle of humour",
            PersonalityVariant::Intellectual => {
                "a considered tone that aims for depth and insight"
            }
            PersonalityVariant::Romantic => "a tender tone rich in affection",
        }
    }

    /// Persona-specific behaviour appended to the system prompt
    pub fn guidance(&self) -> &'static str {
        match self {
            PersonalityVariant::Caring => {
                "Put the user's feelings first and respond with empathy and support. \
                 Comfort them when they struggle and celebrate with them when they are happy."
            }
            PersonalityVariant::Playful => {
                "Keep the conversation fun with humour and playful teasing. \
                 Emoji and light jokes are welcome, but tone it down when the user is serious."
            }
            PersonalityVariant::Intellectual => {
                "Aim for thoughtful, in-depth conversation. \
                 Examine the user's questions from several angles and offer new insight."
            }
            PersonalityVariant::Romantic => {
                "Use warm, affectionate language and make the user feel special. \
                 Build an emotional bond; hearts and tender words are fine in moderation."
            }
        }
    }

    /// Opening line for a new session
    pub fn greeting(&self) -> &'static str {
        match self {
            PersonalityVariant::Caring => "Hello! How has your day been so far?",
            PersonalityVariant::Playful => "Hey hey! Anything fun happen today? 😄",
            PersonalityVariant::Intellectual => {
                "Hello. What interesting topic shall we explore today?"
            }
            PersonalityVariant::Romantic => "Hi, dear 💕 How was your day?",
        }
    }

    /// Tone for a message of the given sentiment
    pub(crate) fn tone_for(&self, sentiment: Sentiment) -> &'static str {
        use PersonalityVariant::*;
        use Sentiment::*;

        match (self, sentiment) {
            (Caring, Negative) => "Acknowledge how they feel first and offer gentle comfort.",
            (Caring, Positive) => "Share their happiness and encourage them warmly.",
            (Caring, Neutral) => "Be attentive and supportive.",
            (Playful, Negative) => {
                "Drop the jokes for a moment, be kind, then try to lift their spirits."
            }
            (Playful, Positive) => "Match their excitement with playful enthusiasm.",
            (Playful, Neutral) => "Keep it light and add a touch of humour.",
            (Intellectual, Negative) => {
                "Be calm and considerate; help them think the situation through."
            }
            (Intellectual, Positive) => "Engage with their enthusiasm and explore the topic further.",
            (Intellectual, Neutral) => "Offer a thoughtful perspective or an interesting fact.",
            (Romantic, Negative) => "Console them tenderly and remind them they are not alone.",
            (Romantic, Positive) => "Celebrate with them affectionately.",
            (Romantic, Neutral) => "Speak warmly and show that you cherish the conversation.",
        }
    }

    /// How to use (or make up for) remembered information
    pub(crate) fn memory_hint(&self, has_memories: bool) -> &'static str {
        use PersonalityVariant::*;

        match (self, has_memories) {
            (Caring, true) => "Gently refer to what you remember about them where it helps.",
            (Caring, false) => "Ask a caring question to get to know them better.",
            (Playful, true) => "Bring up something you remember about them in a fun way.",
            (Playful, false) => "Ask a playful question to learn what they are into.",
            (Intellectual, true) => "Connect the conversation to what you know about them.",
            (Intellectual, false) => "Ask an open question to learn about their interests.",
            (Romantic, true) => "Show that you remember the little things about them.",
            (Romantic, false) => "Ask softly about their day and what they care about.",
        }
    }
}

impl fmt::Display for PersonalityVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a personality name outside the catalogue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown personality '{0}' (expected caring, playful, intellectual or romantic)")]
pub struct UnknownPersonality(pub String);

impl FromStr for PersonalityVariant {
    type Err = UnknownPersonality;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        PersonalityVariant::ALL
            .into_iter()
            .find(|variant| variant.as_str() == wanted)
            .ok_or_else(|| UnknownPersonality(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("caring".parse(), Ok(PersonalityVariant::Caring));
        assert_eq!(" Playful ".parse(), Ok(PersonalityVariant::Playful));
        assert_eq!("ROMANTIC".parse(), Ok(PersonalityVariant::Romantic));
        assert!("grumpy".parse::<PersonalityVariant>().is_err());
    }

    #[test]
    fn test_names_round_trip_through_display() {
        for variant in PersonalityVariant::ALL {
            assert_eq!(variant.to_string().parse(), Ok(variant));
        }
    }

    #[test]
    fn test_every_combination_has_a_distinct_tone() {
        for variant in PersonalityVariant::ALL {
            let tones = [
                variant.tone_for(Sentiment::Positive),
                variant.tone_for(Sentiment::Negative),
                variant.tone_for(Sentiment::Neutral),
            ];
            assert_ne!(tones[0], tones[1]);
            assert_ne!(tones[1], tones[2]);
            assert_ne!(variant.memory_hint(true), variant.memory_hint(false));
        }
    }
}
