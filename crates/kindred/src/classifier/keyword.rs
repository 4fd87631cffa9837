//! Keyword-based classifier
//!
//! Counts positive and negative keywords (English words and Korean stems),
//! pulls preference topics out of "I love/like/hate X" style phrases and
//! flags short declarative self-statements as facts. Matches are heuristic
//! and misclassifications are expected.

use tracing::debug;

use crate::classifier::{Classification, Classifier, ExtractedPreference, Sentiment};
use crate::error::{KindredError, Result};

/// English stems that count towards a positive sentiment
const POSITIVE_STEMS: &[&str] = &[
    "happy", "glad", "great", "love", "awesome", "wonderful", "excit", "thank", "amazing",
    "fantastic", "enjoy", "proud", "perfect", "best", "congrat", "delight", "grateful",
];

/// English stems that count towards a negative sentiment
const NEGATIVE_STEMS: &[&str] = &[
    "sad", "depress", "tired", "exhaust", "stress", "awful", "terrible", "angry", "upset",
    "lonely", "worr", "afraid", "scared", "anxious", "hate", "miserable", "frustrat",
    "disappoint", "hurt", "cry",
];

/// Korean stems matched as substrings
const POSITIVE_STEMS_KO: &[&str] = &[
    "기쁘", "행복", "좋", "사랑", "고마워", "완벽", "최고", "성공", "축하",
];

const NEGATIVE_STEMS_KO: &[&str] = &[
    "슬프", "우울", "힘들", "괴로", "화나", "짜증", "실망", "걱정", "두렵",
];

const INTENSIFIERS: &[&str] = &["so", "very", "really", "extremely", "totally", "super"];

const NEGATORS: &[&str] = &[
    "not", "don't", "dont", "never", "can't", "cant", "doesn't", "didn't", "no",
];

const LIKE_VERBS: &[&str] = &[
    "love", "loves", "loved", "like", "likes", "enjoy", "enjoys", "adore", "prefer", "prefers",
];

const DISLIKE_VERBS: &[&str] = &["hate", "hates", "dislike", "dislikes", "detest"];

/// Words that end a preference topic
const TOPIC_STOPS: &[&str] = &[
    "on", "at", "in", "with", "because", "when", "but", "and", "so", "since", "if", "during",
    "every", "though", "while", "too", "a", "lot",
];

/// Leading words skipped before a topic starts
const TOPIC_LEADERS: &[&str] = &["the", "a", "an", "to", "my", "some"];

/// Topics that address the companion rather than describe a preference
const NON_TOPICS: &[&str] = &["you", "it", "that", "this", "them", "him", "her", "me"];

const FACT_OPENERS: &[&[&str]] = &[
    &["i", "am"],
    &["i'm"],
    &["im"],
    &["my"],
    &["i", "work"],
    &["i", "live"],
    &["i", "have"],
    &["i", "was"],
    &["i", "study"],
    &["i", "grew"],
];

const FOODS_KO: &[&str] = &["피자", "치킨", "한식", "중식", "일식", "양식"];
const ACTIVITIES_KO: &[&str] = &["영화", "음악", "독서", "운동", "게임", "여행", "요리"];

/// Hints about which companion persona the user would like
const PERSONA_HINTS_KO: &[(&str, &str)] = &[
    ("재미있", "playful"),
    ("장난", "playful"),
    ("유머", "playful"),
    ("따뜻", "caring"),
    ("돌봄", "caring"),
    ("지적", "intellectual"),
    ("똑똑", "intellectual"),
    ("로맨틱", "romantic"),
];

const PERSONA_HINTS_EN: &[(&str, &str)] = &[
    ("funny", "playful"),
    ("playful", "playful"),
    ("humor", "playful"),
    ("humour", "playful"),
    ("warm", "caring"),
    ("caring", "caring"),
    ("smart", "intellectual"),
    ("intellectual", "intellectual"),
    ("romantic", "romantic"),
];

/// Rule-based classifier for English and Korean messages
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn sentiment(&self, lowered: &str, clauses: &[Vec<String>]) -> (Sentiment, f32) {
        let mut positive = 0usize;
        let mut negative = 0usize;

        for stem in POSITIVE_STEMS {
            for clause in clauses {
                if let Some(pos) = clause.iter().position(|t| t.starts_with(stem)) {
                    if is_negated(clause, pos) {
                        negative += 1;
                    } else {
                        positive += 1;
                    }
                    break;
                }
            }
        }
        for stem in NEGATIVE_STEMS {
            if clauses.iter().flatten().any(|t| t.starts_with(stem)) {
                negative += 1;
            }
        }
        // "don't like" style phrases not already counted through a stem
        let negated_like = clauses.iter().any(|clause| {
            clause.iter().enumerate().any(|(i, t)| {
                LIKE_VERBS.contains(&t.as_str())
                    && !POSITIVE_STEMS.iter().any(|s| t.starts_with(s))
                    && is_negated(clause, i)
            })
        });
        if negated_like {
            negative += 1;
        }
        positive += POSITIVE_STEMS_KO.iter().filter(|s| lowered.contains(*s)).count();
        negative += NEGATIVE_STEMS_KO.iter().filter(|s| lowered.contains(*s)).count();

        let net = positive.abs_diff(negative);
        let sentiment = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        };
        if sentiment == Sentiment::Neutral {
            return (sentiment, 0.0);
        }

        let intensified = lowered.contains('!')
            || clauses
                .iter()
                .flatten()
                .any(|t| INTENSIFIERS.contains(&t.as_str()));
        let mut intensity = net as f32 * 0.35;
        if intensified {
            intensity += 0.15;
        }
        (sentiment, intensity.min(1.0))
    }

    fn preferences(&self, lowered: &str, clauses: &[Vec<String>]) -> Vec<ExtractedPreference> {
        let mut found = Vec::new();

        for clause in clauses {
            extract_english_preferences(clause, &mut found);
        }

        if ["좋아", "싫어", "선호"].iter().any(|w| lowered.contains(w)) {
            for food in FOODS_KO.iter().filter(|f| lowered.contains(*f)) {
                if lowered.contains("좋아") {
                    found.push(ExtractedPreference::likes(*food));
                } else if lowered.contains("싫어") {
                    found.push(ExtractedPreference::dislikes(*food));
                }
            }
        }
        if ["좋아", "취미", "관심"].iter().any(|w| lowered.contains(w)) {
            for activity in ACTIVITIES_KO.iter().filter(|a| lowered.contains(*a)) {
                found.push(ExtractedPreference::curious(*activity));
            }
        }

        if let Some(persona) = persona_hint(lowered, clauses) {
            found.push(ExtractedPreference::likes(format!("a {persona} companion")));
        }

        let mut seen = std::collections::HashSet::new();
        found.retain(|p| seen.insert((p.topic.clone(), p.stance)));
        found
    }

    fn is_fact(&self, text: &str, clauses: &[Vec<String>]) -> bool {
        if text.contains('?') {
            return false;
        }
        if ["제 이름은", "내 이름은"].iter().any(|p| text.contains(p)) {
            return true;
        }
        let trimmed = text.trim_start();
        if ["저는 ", "나는 "].iter().any(|p| trimmed.starts_with(p)) {
            return true;
        }

        let Some(first) = clauses.first() else {
            return false;
        };
        if first.len() < 3 {
            return false;
        }
        FACT_OPENERS.iter().any(|opener| {
            opener.len() <= first.len() && opener.iter().zip(first.iter()).all(|(o, t)| o == t)
        })
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Classification> {
        if text.trim().is_empty() {
            return Err(KindredError::Classification(
                "cannot classify an empty message".to_string(),
            ));
        }

        let lowered = text.to_lowercase();
        let clauses = tokenize_clauses(&lowered);

        let (sentiment, intensity) = self.sentiment(&lowered, &clauses);
        let extracted_preferences = self.preferences(&lowered, &clauses);
        let is_fact = self.is_fact(text, &clauses);

        let classification = Classification {
            sentiment,
            intensity,
            extracted_preferences,
            is_fact,
        };
        debug!(
            "Classified message: sentiment={}, intensity={:.2}, preferences={}, fact={}",
            classification.sentiment,
            classification.intensity,
            classification.extracted_preferences.len(),
            classification.is_fact
        );
        Ok(classification)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

/// Split lowercased text into clauses of word tokens. Apostrophes stay
/// inside tokens so contractions like "don't" survive.
fn tokenize_clauses(lowered: &str) -> Vec<Vec<String>> {
    let normalized = lowered.replace('’', "'");
    normalized
        .split(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '\n'))
        .map(|clause| {
            clause
                .split(|c: char| !(c.is_alphanumeric() || c == '\''))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|tokens| !tokens.is_empty())
        .collect()
}

fn is_negated(clause: &[String], pos: usize) -> bool {
    clause[pos.saturating_sub(2)..pos]
        .iter()
        .any(|t| NEGATORS.contains(&t.as_str()))
}

fn has_subject(clause: &[String], pos: usize) -> bool {
    clause[pos.saturating_sub(3)..pos]
        .iter()
        .any(|t| matches!(t.as_str(), "i" | "we"))
}

fn extract_english_preferences(clause: &[String], found: &mut Vec<ExtractedPreference>) {
    for (i, token) in clause.iter().enumerate() {
        let token = token.as_str();

        if LIKE_VERBS.contains(&token) && has_subject(clause, i) {
            if let Some(topic) = topic_after(clause, i + 1) {
                if is_negated(clause, i) {
                    found.push(ExtractedPreference::dislikes(topic));
                } else {
                    found.push(ExtractedPreference::likes(topic));
                }
            }
        } else if DISLIKE_VERBS.contains(&token) && has_subject(clause, i) {
            if let Some(topic) = topic_after(clause, i + 1) {
                found.push(ExtractedPreference::dislikes(topic));
            }
        } else if token == "stand" && i > 0 && matches!(clause[i - 1].as_str(), "can't" | "cant") {
            if let Some(topic) = topic_after(clause, i + 1) {
                found.push(ExtractedPreference::dislikes(topic));
            }
        } else if (token == "interested" && clause.get(i + 1).is_some_and(|t| t == "in"))
            || (token == "curious" && clause.get(i + 1).is_some_and(|t| t == "about"))
        {
            if let Some(topic) = topic_after(clause, i + 2) {
                found.push(ExtractedPreference::curious(topic));
            }
        } else if matches!(token, "favorite" | "favourite") {
            if let Some(is_pos) = clause[i..]
                .iter()
                .position(|t| matches!(t.as_str(), "is" | "are"))
            {
                if let Some(topic) = topic_after(clause, i + is_pos + 1) {
                    found.push(ExtractedPreference::likes(topic));
                }
            }
        } else if token == "hobby" && clause.get(i + 1).is_some_and(|t| t == "is") {
            if let Some(topic) = topic_after(clause, i + 2) {
                found.push(ExtractedPreference::likes(topic));
            }
        }
    }
}

/// Collect up to four tokens starting at `start`, stopping at a stop word
fn topic_after(clause: &[String], start: usize) -> Option<String> {
    let mut words = clause
        .get(start..)?
        .iter()
        .map(String::as_str)
        .skip_while(|t| TOPIC_LEADERS.contains(t))
        .take_while(|t| !TOPIC_STOPS.contains(t))
        .take(4)
        .peekable();

    let first = *words.peek()?;
    if NON_TOPICS.contains(&first) {
        return None;
    }
    Some(words.collect::<Vec<_>>().join(" "))
}

fn persona_hint(lowered: &str, clauses: &[Vec<String>]) -> Option<&'static str> {
    if let Some((_, persona)) = PERSONA_HINTS_KO.iter().find(|(h, _)| lowered.contains(h)) {
        return Some(*persona);
    }
    let addresses_companion = clauses.iter().flatten().any(|t| t == "you" || t == "you're");
    if !addresses_companion {
        return None;
    }
    PERSONA_HINTS_EN
        .iter()
        .find(|(h, _)| clauses.iter().flatten().any(|t| t == h))
        .map(|(_, persona)| *persona)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Stance;

    fn classify(text: &str) -> Classification {
        KeywordClassifier::new().classify(text).unwrap()
    }

    #[test]
    fn test_love_hiking_is_mild_positive_preference() {
        let c = classify("I love hiking on weekends");
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert!(c.intensity < 0.6);
        assert_eq!(c.extracted_preferences, vec![ExtractedPreference::likes("hiking")]);
        assert!(!c.is_fact);
    }

    #[test]
    fn test_strong_negative_emotion() {
        let c = classify("Everything is awful, so stressed and exhausted");
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert!(c.intensity >= 0.6);
        assert!(!c.is_fact);
    }

    #[test]
    fn test_self_statement_with_feeling_is_still_fact() {
        let c = classify("My name is Jisoo and I am happy to meet you");
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert!(c.intensity < 0.6);
        assert!(c.is_fact);
    }

    #[test]
    fn test_neutral_small_talk() {
        let c = classify("what should we talk about");
        assert_eq!(c.sentiment, Sentiment::Neutral);
        assert_eq!(c.intensity, 0.0);
        assert!(c.extracted_preferences.is_empty());
        assert!(!c.is_fact);
    }

    #[test]
    fn test_declarative_self_statements_are_facts() {
        assert!(classify("My name is Jisoo").is_fact);
        assert!(classify("I work as a nurse in Busan").is_fact);
        assert!(classify("I have a dog named Coco.").is_fact);
        assert!(classify("제 이름은 지수예요").is_fact);
    }

    #[test]
    fn test_questions_and_short_statements_are_not_facts() {
        assert!(!classify("Am I a good cook?").is_fact);
        assert!(!classify("My bad").is_fact);
        assert!(!classify("I'm fine").is_fact);
    }

    #[test]
    fn test_negated_like_is_dislike() {
        let c = classify("I don't like horror movies");
        assert_eq!(c.extracted_preferences, vec![ExtractedPreference::dislikes("horror movies")]);
        assert_eq!(c.sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_hate_and_cant_stand() {
        let c = classify("I hate the rain. I can't stand traffic jams");
        let topics: Vec<_> = c
            .extracted_preferences
            .iter()
            .map(|p| (p.topic.as_str(), p.stance))
            .collect();
        assert_eq!(
            topics,
            vec![("rain", Stance::Dislikes), ("traffic jams", Stance::Dislikes)]
        );
    }

    #[test]
    fn test_favorite_and_interest_patterns() {
        let c = classify("My favorite food is spicy ramen");
        assert_eq!(c.extracted_preferences, vec![ExtractedPreference::likes("spicy ramen")]);

        let c = classify("I'm interested in astronomy lately");
        assert_eq!(
            c.extracted_preferences,
            vec![ExtractedPreference::curious("astronomy lately")]
        );
    }

    #[test]
    fn test_love_you_is_not_a_preference() {
        let c = classify("I love you");
        assert!(c.extracted_preferences.is_empty());
        assert_eq!(c.sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_korean_sentiment_and_preferences() {
        let c = classify("피자 정말 좋아해요");
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert!(c.extracted_preferences.contains(&ExtractedPreference::likes("피자")));

        let c = classify("요즘 너무 우울하고 힘들어");
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert!(c.intensity >= 0.6);

        let c = classify("취미는 독서랑 여행이에요");
        assert!(c.extracted_preferences.contains(&ExtractedPreference::curious("독서")));
        assert!(c.extracted_preferences.contains(&ExtractedPreference::curious("여행")));
    }

    #[test]
    fn test_persona_hints() {
        let c = classify("you're so funny");
        assert!(
            c.extracted_preferences
                .contains(&ExtractedPreference::likes("a playful companion"))
        );

        let c = classify("The movie was funny");
        assert!(c.extracted_preferences.is_empty());
    }

    #[test]
    fn test_empty_message_fails() {
        let err = KeywordClassifier::new().classify("   ").unwrap_err();
        assert!(matches!(err, KindredError::Classification(_)));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let text = "I love cooking but I hate washing dishes!";
        assert_eq!(classify(text), classify(text));
    }
}
