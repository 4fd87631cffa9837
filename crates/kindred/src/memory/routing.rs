//! Write-time routing of completed turns
//!
//! Turns a finished exchange plus its classification into the set of memory
//! records it produces. Every turn yields a Conversation record; Preference,
//! Fact and Emotion records are added when the classification supports them.
//! Only those three kinds are forwarded to the persistent index.

use crate::classifier::Classification;
use crate::memory::types::{MemoryKind, MemoryRecord, OwnerId, SessionTurn};

/// Records derived from one turn, Conversation record first
#[derive(Debug, Clone)]
pub struct RoutedTurn {
    pub conversation: MemoryRecord,
    pub persistent: Vec<MemoryRecord>,
}

/// Derive records for a completed turn.
///
/// `classification` is `None` when the classifier failed; only the
/// Conversation record is produced in that case.
///
/// Routing rules:
/// - one `Preference` per extracted preference
/// - one `Fact` when the message is a declarative self-statement
/// - one `Emotion` when the sentiment is non-neutral and at least
///   `emotion_threshold` strong
pub fn route_turn(
    turn: &SessionTurn,
    owner: &OwnerId,
    classification: Option<&Classification>,
    emotion_threshold: f32,
) -> RoutedTurn {
    let conversation = MemoryRecord::new(owner.clone(), MemoryKind::Conversation, turn.transcript())
        .with_created_at(turn.timestamp);

    let Some(classification) = classification else {
        return RoutedTurn {
            conversation,
            persistent: Vec::new(),
        };
    };

    let user_text = turn.user_text.trim();
    let mut persistent = Vec::new();

    for preference in &classification.extracted_preferences {
        persistent.push(
            MemoryRecord::new(owner.clone(), MemoryKind::Preference, preference.describe())
                .with_created_at(turn.timestamp),
        );
    }

    if classification.is_fact && !user_text.is_empty() {
        persistent.push(
            MemoryRecord::new(owner.clone(), MemoryKind::Fact, user_text)
                .with_created_at(turn.timestamp),
        );
    }

    if classification.is_strong_emotion(emotion_threshold) {
        persistent.push(
            MemoryRecord::new(
                owner.clone(),
                MemoryKind::Emotion,
                format!("User felt {}: {}", classification.sentiment, user_text),
            )
            .with_created_at(turn.timestamp),
        );
    }

    RoutedTurn {
        conversation,
        persistent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ExtractedPreference, Sentiment};

    fn owner() -> OwnerId {
        OwnerId::try_from("jisoo").unwrap()
    }

    fn kinds(routed: &RoutedTurn) -> Vec<MemoryKind> {
        std::iter::once(&routed.conversation)
            .chain(&routed.persistent)
            .map(|r| r.kind())
            .collect()
    }

    #[test]
    fn test_plain_turn_yields_conversation_only() {
        let turn = SessionTurn::new("what's up", "Not much, you?");
        let routed = route_turn(&turn, &owner(), Some(&Classification::neutral()), 0.6);

        assert_eq!(kinds(&routed), vec![MemoryKind::Conversation]);
        assert_eq!(routed.conversation.content(), turn.transcript());
        assert_eq!(routed.conversation.created_at(), turn.timestamp);
    }

    #[test]
    fn test_fact_turn_yields_one_fact() {
        let turn = SessionTurn::new("  My name is Jisoo ", "Nice to meet you!");
        let classification = Classification {
            is_fact: true,
            ..Classification::neutral()
        };
        let routed = route_turn(&turn, &owner(), Some(&classification), 0.6);

        assert_eq!(routed.persistent.len(), 1);
        assert_eq!(routed.persistent[0].kind(), MemoryKind::Fact);
        assert_eq!(routed.persistent[0].content(), "My name is Jisoo");
    }

    #[test]
    fn test_preference_turn() {
        let turn = SessionTurn::new("I love hiking on weekends", "That sounds lovely!");
        let classification = Classification {
            sentiment: Sentiment::Positive,
            intensity: 0.35,
            extracted_preferences: vec![ExtractedPreference::likes("hiking")],
            is_fact: false,
        };
        let routed = route_turn(&turn, &owner(), Some(&classification), 0.6);

        assert_eq!(
            kinds(&routed),
            vec![MemoryKind::Conversation, MemoryKind::Preference]
        );
        assert_eq!(routed.persistent[0].content(), "User enjoys hiking");
    }

    #[test]
    fn test_strong_emotion_yields_emotion_record() {
        let turn = SessionTurn::new("I'm so stressed and exhausted", "I'm here for you.");
        let classification = Classification {
            sentiment: Sentiment::Negative,
            intensity: 0.85,
            ..Classification::neutral()
        };
        let routed = route_turn(&turn, &owner(), Some(&classification), 0.6);

        assert_eq!(
            kinds(&routed),
            vec![MemoryKind::Conversation, MemoryKind::Emotion]
        );
        assert_eq!(
            routed.persistent[0].content(),
            "User felt negative: I'm so stressed and exhausted"
        );
    }

    #[test]
    fn test_weak_emotion_is_not_stored() {
        let turn = SessionTurn::new("that's nice", "Glad you think so");
        let classification = Classification {
            sentiment: Sentiment::Positive,
            intensity: 0.35,
            ..Classification::neutral()
        };
        let routed = route_turn(&turn, &owner(), Some(&classification), 0.6);
        assert!(routed.persistent.is_empty());
    }

    #[test]
    fn test_failed_classification_yields_conversation_only() {
        let turn = SessionTurn::new("My name is Jisoo", "Hi Jisoo!");
        let routed = route_turn(&turn, &owner(), None, 0.6);
        assert_eq!(kinds(&routed), vec![MemoryKind::Conversation]);
    }

    #[test]
    fn test_all_records_share_owner() {
        let turn = SessionTurn::new("I hate rain", "Noted!");
        let classification = Classification {
            sentiment: Sentiment::Negative,
            intensity: 0.9,
            extracted_preferences: vec![ExtractedPreference::dislikes("rain")],
            is_fact: false,
        };
        let routed = route_turn(&turn, &owner(), Some(&classification), 0.6);
        assert_eq!(routed.persistent.len(), 2);
        assert_eq!(routed.conversation.owner(), &owner());
        assert!(routed.persistent.iter().all(|r| r.owner() == &owner()));
    }
}
