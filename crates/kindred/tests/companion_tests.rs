//! Integration tests for the conversation driver
//!
//! Tests verify that:
//! - Provider failures fall back to rule-based replies and still commit
//! - Remembered information reaches the generator's envelope
//! - Mood and personality changes carry across turns

use std::sync::Arc;

use kindred::classifier::{Classification, ExtractedPreference, Sentiment};
use kindred::companion::{Companion, ReplyOrigin};
use kindred::config::{CompanionConfig, GenerationConfig, MemoryConfig};
use kindred::generation::{FallbackGenerator, Generator};
use kindred::index::{InMemoryIndex, PersistentMemoryIndex};
use kindred::memory::{MemoryKind, MemoryRecord, OwnerId, SessionStore};
use kindred::orchestrator::MemoryOrchestrator;
use kindred::personality::{PersonalityContextAdapter, PersonalityVariant};
use kindred::testing::{
    KeywordEmbedder, StubClassifier, StubGenerator, UnavailableGenerator, UnavailableIndex,
};

fn companion(
    index: Arc<dyn PersistentMemoryIndex>,
    classification: Classification,
    generator: Arc<dyn Generator>,
) -> Companion {
    let orchestrator = MemoryOrchestrator::new(
        SessionStore::new(20),
        index,
        Arc::new(StubClassifier::new(classification)),
        MemoryConfig::default(),
    );
    Companion::new(
        orchestrator,
        PersonalityContextAdapter::new(&CompanionConfig::default(), &GenerationConfig::default()),
        generator,
        PersonalityVariant::Caring,
        OwnerId::try_from("jisoo").unwrap(),
    )
}

fn keyword_index() -> Arc<InMemoryIndex> {
    Arc::new(InMemoryIndex::new(Arc::new(KeywordEmbedder::new())))
}

#[tokio::test]
async fn test_provider_failure_uses_fallback_and_commits() {
    let mut companion = companion(
        keyword_index(),
        Classification::neutral(),
        Arc::new(UnavailableGenerator),
    );

    let outcome = companion.respond("hello").await;

    assert_eq!(outcome.origin, ReplyOrigin::Fallback);
    assert_eq!(outcome.reply, FallbackGenerator::new().reply("hello"));

    let turns = companion.orchestrator().session().recent(1);
    assert_eq!(turns[0].user_text, "hello");
    assert_eq!(turns[0].assistant_text, outcome.reply);
}

#[tokio::test]
async fn test_provider_reply_is_committed() {
    let generator = Arc::new(StubGenerator::new("Hi Jisoo!"));
    let mut companion = companion(keyword_index(), Classification::neutral(), generator.clone());

    let outcome = companion.respond("hey").await;

    assert_eq!(outcome.origin, ReplyOrigin::Provider);
    assert_eq!(outcome.reply, "Hi Jisoo!");
    assert!(!outcome.degraded);
    assert_eq!(generator.envelopes().len(), 1);
    assert_eq!(generator.envelopes()[0].user_message, "hey");
}

#[tokio::test]
async fn test_remembered_preference_reaches_envelope() {
    let classification = Classification {
        sentiment: Sentiment::Positive,
        intensity: 0.35,
        extracted_preferences: vec![ExtractedPreference::likes("hiking")],
        is_fact: false,
    };
    let generator = Arc::new(StubGenerator::new("Nice!"));
    let mut companion = companion(keyword_index(), classification, generator.clone());

    companion.respond("I love hiking on weekends").await;
    companion.respond("what do I enjoy?").await;

    let envelopes = generator.envelopes();
    assert!(envelopes[0].system_prompt.contains("No remembered information yet."));
    assert!(envelopes[1].system_prompt.contains("User enjoys hiking"));
    assert_eq!(envelopes[1].history.len(), 2);
}

#[tokio::test]
async fn test_every_stored_preference_reaches_prompt() {
    let index = keyword_index();
    let owner = OwnerId::try_from("jisoo").unwrap();
    let topics = ["tea", "hiking", "jazz", "cats", "rain", "chess", "sushi"];
    for topic in topics {
        index
            .add(MemoryRecord::new(
                owner.clone(),
                MemoryKind::Preference,
                format!("User enjoys {topic}"),
            ))
            .await
            .unwrap();
    }
    let generator = Arc::new(StubGenerator::new("Sure."));
    let mut companion = companion(index, Classification::neutral(), generator.clone());

    companion.respond("tell me about tea").await;

    let prompt = &generator.envelopes()[0].system_prompt;
    assert!(prompt.contains("User preferences:"));
    for topic in topics {
        assert!(prompt.contains(&format!("- User enjoys {topic}")), "missing {topic}");
    }
}

#[tokio::test]
async fn test_unavailable_memory_still_answers() {
    let generator = Arc::new(StubGenerator::new("I'm here."));
    let mut companion = companion(
        Arc::new(UnavailableIndex::new()),
        Classification::neutral(),
        generator.clone(),
    );

    let outcome = companion.respond("are you there?").await;

    assert!(outcome.degraded);
    assert!(generator.envelopes()[0].degraded);
    assert_eq!(outcome.reply, "I'm here.");
    assert_eq!(companion.orchestrator().session().len(), 1);
}

#[tokio::test]
async fn test_mood_follows_sentiment() {
    let classification = Classification {
        sentiment: Sentiment::Negative,
        intensity: 0.3,
        ..Classification::neutral()
    };
    let mut companion = companion(
        keyword_index(),
        classification,
        Arc::new(StubGenerator::new("There, there.")),
    );

    companion.respond("bad day").await;
    companion.respond("still bad").await;

    assert_eq!(companion.mood().interactions(), 2);
    assert!((companion.mood().level() - 0.7).abs() < 1e-5);
    assert_eq!(companion.mood().sentiment(), Sentiment::Negative);
}

#[tokio::test]
async fn test_personality_switch_changes_directive() {
    let generator = Arc::new(StubGenerator::new("ok"));
    let mut companion = companion(keyword_index(), Classification::neutral(), generator.clone());

    companion.respond("hi").await;
    companion.set_personality(PersonalityVariant::Intellectual);
    companion.respond("hi again").await;

    let envelopes = generator.envelopes();
    assert_eq!(envelopes[0].variant, PersonalityVariant::Caring);
    assert_eq!(envelopes[1].variant, PersonalityVariant::Intellectual);
    assert_ne!(envelopes[0].style_directive, envelopes[1].style_directive);

    let stats = companion.stats().await;
    assert_eq!(stats.personality, PersonalityVariant::Intellectual);
    assert_eq!(stats.interactions, 2);
    assert_eq!(stats.memory.session_turns, 2);
    assert_eq!(stats.memory.long_term_records, Some(0));
}
