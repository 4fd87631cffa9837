//! Conversation driver
//!
//! Runs one full turn per user message: retrieve context, build the
//! instruction envelope, generate a reply (falling back to rule-based text
//! when the provider is down), commit the turn and update the mood.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::classifier::Sentiment;
use crate::generation::{FallbackGenerator, Generator};
use crate::memory::{OwnerId, SessionTurn};
use crate::orchestrator::{CommitResult, MemoryOrchestrator, MemoryStats};
use crate::personality::{MoodState, PersonalityContextAdapter, PersonalityVariant};

/// Which generator produced a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOrigin {
    Provider,
    Fallback,
}

impl fmt::Display for ReplyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyOrigin::Provider => f.write_str("provider"),
            ReplyOrigin::Fallback => f.write_str("fallback"),
        }
    }
}

/// Result of one conversational turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub origin: ReplyOrigin,
    /// Context was built without the persistent tier
    pub degraded: bool,
    pub commit: CommitResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanionStats {
    pub memory: MemoryStats,
    pub personality: PersonalityVariant,
    pub mood_level: f32,
    pub interactions: u64,
}

pub struct Companion {
    orchestrator: MemoryOrchestrator,
    adapter: PersonalityContextAdapter,
    generator: Arc<dyn Generator>,
    fallback: FallbackGenerator,
    variant: PersonalityVariant,
    mood: MoodState,
    owner: OwnerId,
}

impl Companion {
    pub fn new(
        orchestrator: MemoryOrchestrator,
        adapter: PersonalityContextAdapter,
        generator: Arc<dyn Generator>,
        variant: PersonalityVariant,
        owner: OwnerId,
    ) -> Self {
        info!(
            "Companion ready for owner {} with {} personality and {} generator",
            owner,
            variant,
            generator.name()
        );
        Self {
            orchestrator,
            adapter,
            generator,
            fallback: FallbackGenerator::new(),
            variant,
            mood: MoodState::new(),
            owner,
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn personality(&self) -> PersonalityVariant {
        self.variant
    }

    pub fn mood(&self) -> &MoodState {
        &self.mood
    }

    pub fn orchestrator(&self) -> &MemoryOrchestrator {
        &self.orchestrator
    }

    pub fn greeting(&self) -> &'static str {
        self.variant.greeting()
    }

    pub fn set_personality(&mut self, variant: PersonalityVariant) {
        if variant != self.variant {
            info!("Personality changed from {} to {}", self.variant, variant);
            self.variant = variant;
        }
    }

    pub fn clear_session(&mut self) {
        self.orchestrator.clear_session();
    }

    /// Run one turn for `user_text`. Never fails: provider and memory
    /// failures degrade the turn instead.
    pub async fn respond(&mut self, user_text: &str) -> TurnOutcome {
        let sentiment = match self.orchestrator.classifier().classify(user_text) {
            Ok(classification) => classification.sentiment,
            Err(e) => {
                debug!("Could not read sentiment for directive: {}", e);
                Sentiment::Neutral
            }
        };

        let context = self.orchestrator.retrieve(user_text, &self.owner).await;
        let envelope = self
            .adapter
            .build(&context, &self.mood.observing(sentiment), self.variant);

        let (reply, origin) = match self.generator.generate(&envelope).await {
            Ok(reply) => (reply, ReplyOrigin::Provider),
            Err(e) => {
                warn!("Generator {} failed, using fallback: {}", self.generator.name(), e);
                (self.fallback.reply(user_text), ReplyOrigin::Fallback)
            }
        };

        let commit = self
            .orchestrator
            .commit(SessionTurn::new(user_text, reply.clone()), &self.owner)
            .await;
        self.mood.apply(sentiment);

        debug!(
            "Turn done: origin={}, degraded={}, mood={:.2}",
            origin,
            context.is_degraded(),
            self.mood.level()
        );

        TurnOutcome {
            reply,
            origin,
            degraded: context.is_degraded(),
            commit,
        }
    }

    pub async fn stats(&self) -> CompanionStats {
        CompanionStats {
            memory: self.orchestrator.stats(&self.owner).await,
            personality: self.variant,
            mood_level: self.mood.level(),
            interactions: self.mood.interactions(),
        }
    }
}
