//! Personality context adapter
//!
//! Shapes a merged [`ConversationContext`], the companion's mood and the
//! active persona into an [`InstructionEnvelope`] for the generator.
//! Building an envelope is a pure function of those inputs.

mod catalog;

pub use catalog::{PersonalityVariant, UnknownPersonality};

use serde::Serialize;

use crate::classifier::Sentiment;
use crate::config::{CompanionConfig, GenerationConfig};
use crate::index::RetrievedRecord;
use crate::memory::{ConversationContext, MemoryRecord};

const MOOD_START: f32 = 0.8;
const MOOD_FLOOR: f32 = 0.2;
const MOOD_CEILING: f32 = 1.0;
const MOOD_LIFT: f32 = 0.1;
const MOOD_DROP: f32 = 0.05;

/// The companion's running mood. Updated by the caller after each turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodState {
    level: f32,
    sentiment: Sentiment,
    interactions: u64,
}

impl Default for MoodState {
    fn default() -> Self {
        Self {
            level: MOOD_START,
            sentiment: Sentiment::Neutral,
            interactions: 0,
        }
    }
}

impl MoodState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mood level in `0.2..=1.0`
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Sentiment of the most recently observed user message
    pub fn sentiment(&self) -> Sentiment {
        self.sentiment
    }

    pub fn interactions(&self) -> u64 {
        self.interactions
    }

    /// Copy of this mood that has noticed `sentiment` without counting a
    /// completed interaction
    pub fn observing(self, sentiment: Sentiment) -> Self {
        Self { sentiment, ..self }
    }

    /// Record a completed interaction
    pub fn apply(&mut self, sentiment: Sentiment) {
        self.interactions += 1;
        self.sentiment = sentiment;
        self.level = match sentiment {
            Sentiment::Positive => (self.level + MOOD_LIFT).min(MOOD_CEILING),
            Sentiment::Negative => (self.level - MOOD_DROP).max(MOOD_FLOOR),
            Sentiment::Neutral => self.level,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message in OpenAI format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything the generator needs to produce one reply
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionEnvelope {
    pub variant: PersonalityVariant,
    pub system_prompt: String,
    pub style_directive: String,
    /// Session turns as alternating user/assistant messages, oldest first
    pub history: Vec<ChatMessage>,
    pub user_message: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Built without the persistent tier
    pub degraded: bool,
}

impl InstructionEnvelope {
    /// Full message list: system prompt with directive, history, user message
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::new(
            Role::System,
            format!("{}\n\nStyle for this reply: {}", self.system_prompt, self.style_directive),
        ));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::new(Role::User, self.user_message.clone()));
        messages
    }
}

/// Format remembered records as an XML block for the system prompt.
///
/// ```text
/// <memories>
/// <memory timestamp="2024-01-15" kind="preference">
///   User enjoys hiking
/// </memory>
/// </memories>
/// ```
pub fn format_memory_block(memories: &[RetrievedRecord]) -> String {
    if memories.is_empty() {
        return String::new();
    }

    let mut block = String::from("<memories>\n");
    for hit in memories {
        block.push_str(&format!(
            "<memory timestamp=\"{}\" kind=\"{}\">\n  {}\n</memory>\n",
            hit.record.created_at().format("%Y-%m-%d"),
            hit.record.kind(),
            hit.record.content()
        ));
    }
    block.push_str("</memories>");
    block
}

/// "User preferences" lines for the system prompt, empty when none are stored
fn format_preference_block(preferences: &[MemoryRecord]) -> String {
    if preferences.is_empty() {
        return String::new();
    }
    let mut block = String::from("\nUser preferences:\n");
    for preference in preferences {
        block.push_str("- ");
        block.push_str(preference.content());
        block.push('\n');
    }
    block
}

/// Style directive for a persona given the user's sentiment and whether
/// anything is remembered about them
pub fn style_directive(
    variant: PersonalityVariant,
    sentiment: Sentiment,
    has_memories: bool,
) -> String {
    format!(
        "{} {}",
        variant.tone_for(sentiment),
        variant.memory_hint(has_memories)
    )
}

/// Builds instruction envelopes for one companion
#[derive(Debug, Clone)]
pub struct PersonalityContextAdapter {
    companion_name: String,
    user_name: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl PersonalityContextAdapter {
    pub fn new(companion: &CompanionConfig, generation: &GenerationConfig) -> Self {
        Self {
            companion_name: companion.name.clone(),
            user_name: companion.user_name.clone(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
        }
    }

    pub fn build(
        &self,
        context: &ConversationContext,
        mood: &MoodState,
        variant: PersonalityVariant,
    ) -> InstructionEnvelope {
        let history = context
            .turns()
            .iter()
            .flat_map(|turn| {
                [
                    ChatMessage::new(Role::User, turn.user_text.clone()),
                    ChatMessage::new(Role::Assistant, turn.assistant_text.clone()),
                ]
            })
            .collect();

        InstructionEnvelope {
            variant,
            system_prompt: self.system_prompt(context, mood, variant),
            style_directive: style_directive(variant, mood.sentiment(), context.has_memories()),
            history,
            user_message: context.query().to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            degraded: context.is_degraded(),
        }
    }

    fn system_prompt(
        &self,
        context: &ConversationContext,
        mood: &MoodState,
        variant: PersonalityVariant,
    ) -> String {
        let memories = if context.has_memories() {
            format!(
                "What you remember about the user:\n{}",
                format_memory_block(context.memories())
            )
        } else {
            "No remembered information yet.".to_string()
        };
        let preferences = format_preference_block(context.preferences());

        format!(
            "You are {name}, an AI companion with the {persona} personality ({description}).\n\
             Talk in {style}.\n\
             \n\
             About the user:\n\
             - Name: {user}\n\
             - Interactions so far: {count}\n\
             - Your current mood: {mood:.1}/1.0\n\
             {preferences}\
             \n\
             {memories}\n\
             \n\
             {guidance}\n\
             \n\
             Reply naturally, taking the user's feelings and the conversation so far into account.",
            name = self.companion_name,
            persona = variant.display_name(),
            description = variant.description(),
            style = variant.response_style(),
            user = self.user_name.as_deref().unwrap_or("unknown"),
            count = mood.interactions(),
            mood = mood.level(),
            guidance = variant.guidance(),
        )
    }
}
