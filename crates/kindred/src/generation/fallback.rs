use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::error::Result;
use crate::generation::Generator;
use crate::personality::InstructionEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Farewell,
    Greeting,
    Sad,
    Happy,
    Thanks,
    Question,
    Other,
}

const ENGLISH_FAREWELL: &[&str] = &["bye", "goodbye", "goodnight"];
const ENGLISH_GREETING: &[&str] = &["hello", "hi", "hey"];
const ENGLISH_SAD: &[&str] = &["sad", "depressed", "lonely", "upset", "exhausted", "miserable"];
const ENGLISH_HAPPY: &[&str] = &["happy", "glad", "great", "excited", "wonderful"];
const ENGLISH_THANKS: &[&str] = &["thanks", "thank", "thx"];
const ENGLISH_QUESTION: &[&str] = &["what", "why", "how", "when", "where", "who"];

const KOREAN_FAREWELL: &[&str] = &["안녕히", "잘가", "잘 가"];
const KOREAN_GREETING: &[&str] = &["안녕"];
const KOREAN_SAD: &[&str] = &["슬프", "우울", "힘들", "괴로"];
const KOREAN_HAPPY: &[&str] = &["기쁘", "행복", "좋"];
const KOREAN_THANKS: &[&str] = &["고마워", "감사"];
const KOREAN_QUESTION: &[&str] = &["뭐", "무엇", "왜", "어떻게"];

const ENGLISH_DEFAULTS: &[&str] = &[
    "That sounds interesting. Tell me more?",
    "I see. How did that make you feel?",
    "I'm listening. Please go on.",
    "I can't reach my usual thoughts right now, but I still want to hear from you.",
    "My replies are a bit limited at the moment, but I'm still here with you.",
];

const KOREAN_DEFAULTS: &[&str] = &[
    "흥미로운 이야기네요. 더 자세히 말씀해주세요.",
    "그런 일이 있으셨군요. 어떤 기분이셨나요?",
    "당신의 이야기를 듣고 있어요. 계속해주세요.",
    "AI 연결이 안 되어 있지만, 여전히 당신과 대화하고 싶어요.",
    "제한적이지만 당신의 동반자가 되어드리고 싶어요.",
];

/// Rule-based replies for when the generation provider is down.
///
/// Replies follow the script of the user's message (Hangul gets Korean) and
/// are a pure function of the message text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn reply(&self, user_message: &str) -> String {
        let korean = user_message.chars().any(is_hangul);
        let intent = detect_intent(user_message);

        let reply = match (intent, korean) {
            (Intent::Farewell, false) => "Goodbye! Have a lovely day, and come back soon.",
            (Intent::Farewell, true) => "안녕히 가세요! 좋은 하루 보내시고, 다음에 또 만나요!",
            (Intent::Greeting, false) => {
                "Hello! It's good to see you. I can't reach my AI service right now, \
                 but I'd still love to chat."
            }
            (Intent::Greeting, true) => {
                "안녕하세요! 만나서 반가워요. AI 서비스에 연결할 수 없지만 여전히 당신과 대화하고 싶어요."
            }
            (Intent::Sad, false) => {
                "That sounds really hard. Even without my AI service, I'm here to listen."
            }
            (Intent::Sad, true) => {
                "힘든 시간이시군요. 비록 AI 서비스가 연결되지 않았지만, 제가 여기 있어서 당신의 이야기를 들어드릴 수 있어요."
            }
            (Intent::Happy, false) => "I'm so glad to hear that! Tell me more about it.",
            (Intent::Happy, true) => "기분이 좋으시다니 저도 함께 기뻐요! 더 자세한 이야기를 들려주세요.",
            (Intent::Thanks, false) => "You're welcome! Let me know whenever you need me.",
            (Intent::Thanks, true) => "천만에요! 언제든지 도움이 필요하시면 말씀해주세요.",
            (Intent::Question, false) => {
                "Good question. I can only give limited answers until my AI service is back."
            }
            (Intent::Question, true) => {
                "궁금한 것이 있으시군요. AI 서비스가 연결되면 더 자세한 답변을 드릴 수 있을 텐데, 지금은 제한적인 응답만 가능해요."
            }
            (Intent::Other, false) => pick(ENGLISH_DEFAULTS, user_message),
            (Intent::Other, true) => pick(KOREAN_DEFAULTS, user_message),
        };
        reply.to_string()
    }
}

#[async_trait]
impl Generator for FallbackGenerator {
    async fn generate(&self, envelope: &InstructionEnvelope) -> Result<String> {
        Ok(self.reply(&envelope.user_message))
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

fn detect_intent(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();

    let has = |english: &[&str], korean: &[&str]| {
        words.iter().any(|w| english.contains(w)) || korean.iter().any(|k| lowered.contains(k))
    };

    // Farewells first: "안녕히" also contains the greeting stem
    if has(ENGLISH_FAREWELL, KOREAN_FAREWELL) {
        Intent::Farewell
    } else if has(ENGLISH_GREETING, KOREAN_GREETING) {
        Intent::Greeting
    } else if has(ENGLISH_SAD, KOREAN_SAD) {
        Intent::Sad
    } else if has(ENGLISH_HAPPY, KOREAN_HAPPY) {
        Intent::Happy
    } else if has(ENGLISH_THANKS, KOREAN_THANKS) {
        Intent::Thanks
    } else if text.contains('?') || has(ENGLISH_QUESTION, KOREAN_QUESTION) {
        Intent::Question
    } else {
        Intent::Other
    }
}

fn pick(options: &'static [&'static str], seed: &str) -> &'static str {
    let mut hasher = DefaultHasher::new();
    seed.trim().hash(&mut hasher);
    options[(hasher.finish() % options.len() as u64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents() {
        assert_eq!(detect_intent("hi there"), Intent::Greeting);
        assert_eq!(detect_intent("this is fine"), Intent::Other);
        assert_eq!(detect_intent("okay bye"), Intent::Farewell);
        assert_eq!(detect_intent("I feel so lonely"), Intent::Sad);
        assert_eq!(detect_intent("I got the job, so happy"), Intent::Happy);
        assert_eq!(detect_intent("thank you!"), Intent::Thanks);
        assert_eq!(detect_intent("is it raining?"), Intent::Question);
    }

    #[test]
    fn test_korean_intents() {
        assert_eq!(detect_intent("안녕히 계세요"), Intent::Farewell);
        assert_eq!(detect_intent("안녕하세요"), Intent::Greeting);
        assert_eq!(detect_intent("요즘 너무 힘들어"), Intent::Sad);
        assert_eq!(detect_intent("정말 고마워"), Intent::Thanks);
    }

    #[test]
    fn test_reply_follows_script() {
        let fallback = FallbackGenerator::new();
        assert!(fallback.reply("hello").starts_with("Hello!"));
        assert!(fallback.reply("안녕하세요").starts_with("안녕하세요!"));
    }

    #[test]
    fn test_default_reply_is_deterministic() {
        let fallback = FallbackGenerator::new();
        let first = fallback.reply("I repainted the kitchen today");
        assert_eq!(first, fallback.reply("I repainted the kitchen today"));
        assert!(ENGLISH_DEFAULTS.contains(&first.as_str()));
    }
}
