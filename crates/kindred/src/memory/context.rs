//! Merged per-turn context
//!
//! A [`ConversationContext`] is built once per retrieval from the recent
//! session turns, the persistent matches and the owner's stored
//! preferences, then handed read-only to the personality layer.

use std::collections::HashSet;

use crate::index::RetrievedRecord;
use crate::memory::types::{MemoryRecord, SessionTurn};

/// Session turns plus persistent matches for one user query
#[derive(Debug, Clone)]
pub struct ConversationContext {
    query: String,
    turns: Vec<SessionTurn>,
    memories: Vec<RetrievedRecord>,
    preferences: Vec<MemoryRecord>,
    degraded: bool,
}

impl ConversationContext {
    /// Merge session turns and persistent matches into a bounded context.
    ///
    /// - `turns` are chronological and always preferred over matches
    /// - matches whose content duplicates a kept turn, or an earlier match,
    ///   are dropped
    /// - at most `max_items` entries survive: matches are cut first, then the
    ///   oldest turns
    pub fn merge(
        query: impl Into<String>,
        mut turns: Vec<SessionTurn>,
        matches: Vec<RetrievedRecord>,
        max_items: usize,
        degraded: bool,
    ) -> Self {
        if turns.len() > max_items {
            let excess = turns.len() - max_items;
            turns.drain(..excess);
        }

        let mut seen: HashSet<u64> = turns.iter().flat_map(|t| t.content_hashes()).collect();
        let budget = max_items - turns.len();
        let memories = matches
            .into_iter()
            .filter(|m| seen.insert(m.record.content_hash()))
            .take(budget)
            .collect();

        Self {
            query: query.into(),
            turns,
            memories,
            preferences: Vec::new(),
            degraded,
        }
    }

    /// Attach the owner's stored preferences. They sit outside the item
    /// budget and are listed in full.
    pub fn with_preferences(mut self, preferences: Vec<MemoryRecord>) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Session turns, oldest first
    pub fn turns(&self) -> &[SessionTurn] {
        &self.turns
    }

    /// Persistent matches, most relevant first
    pub fn memories(&self) -> &[RetrievedRecord] {
        &self.memories
    }

    /// True when the persistent tier could not be consulted
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn has_memories(&self) -> bool {
        !self.memories.is_empty()
    }

    /// Stored preferences of the owner, newest first
    pub fn preferences(&self) -> &[MemoryRecord] {
        &self.preferences
    }

    pub fn len(&self) -> usize {
        self.turns.len() + self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::{MemoryKind, MemoryRecord, OwnerId};

    fn owner() -> OwnerId {
        OwnerId::try_from("u1").unwrap()
    }

    fn hit(kind: MemoryKind, content: &str, similarity: f32) -> RetrievedRecord {
        RetrievedRecord {
            record: MemoryRecord::new(owner(), kind, content),
            similarity,
        }
    }

    fn turns(n: usize) -> Vec<SessionTurn> {
        (0..n)
            .map(|i| SessionTurn::new(format!("question {i}"), format!("answer {i}")))
            .collect()
    }

    #[test]
    fn test_merge_keeps_turns_then_matches() {
        let ctx = ConversationContext::merge(
            "q",
            turns(2),
            vec![
                hit(MemoryKind::Fact, "I am a nurse", 0.9),
                hit(MemoryKind::Preference, "User enjoys hiking", 0.8),
            ],
            10,
            false,
        );

        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx.turns()[0].user_text, "question 0");
        assert_eq!(ctx.memories()[0].record.content(), "I am a nurse");
        assert!(!ctx.is_degraded());
    }

    #[test]
    fn test_duplicate_of_session_turn_is_dropped() {
        let session = vec![SessionTurn::new("My name is Jisoo", "Nice to meet you")];
        let ctx = ConversationContext::merge(
            "who am I",
            session,
            vec![
                hit(MemoryKind::Fact, "my name is  Jisoo", 0.95),
                hit(MemoryKind::Preference, "User enjoys hiking", 0.5),
            ],
            10,
            false,
        );

        assert_eq!(ctx.turns().len(), 1);
        assert_eq!(ctx.memories().len(), 1);
        assert_eq!(ctx.memories()[0].record.content(), "User enjoys hiking");
    }

    #[test]
    fn test_duplicate_matches_collapse() {
        let ctx = ConversationContext::merge(
            "q",
            Vec::new(),
            vec![
                hit(MemoryKind::Preference, "User enjoys hiking", 0.9),
                hit(MemoryKind::Preference, "User enjoys hiking", 0.9),
            ],
            10,
            false,
        );
        assert_eq!(ctx.memories().len(), 1);
    }

    #[test]
    fn test_budget_drops_matches_first() {
        let ctx = ConversationContext::merge(
            "q",
            turns(3),
            vec![
                hit(MemoryKind::Fact, "fact one", 0.9),
                hit(MemoryKind::Fact, "fact two", 0.8),
            ],
            4,
            false,
        );
        assert_eq!(ctx.turns().len(), 3);
        assert_eq!(ctx.memories().len(), 1);
        assert_eq!(ctx.memories()[0].record.content(), "fact one");
    }

    #[test]
    fn test_budget_smaller_than_window_drops_oldest_turns() {
        let ctx = ConversationContext::merge(
            "q",
            turns(5),
            vec![hit(MemoryKind::Fact, "fact", 0.9)],
            2,
            false,
        );
        assert_eq!(ctx.len(), 2);
        assert!(ctx.memories().is_empty());
        assert_eq!(ctx.turns()[0].user_text, "question 3");
        assert_eq!(ctx.turns()[1].user_text, "question 4");
    }

    #[test]
    fn test_degraded_context_keeps_turns() {
        let session = turns(2);
        let ctx = ConversationContext::merge("q", session.clone(), Vec::new(), 10, true);
        assert!(ctx.is_degraded());
        assert_eq!(ctx.turns(), session.as_slice());
        assert!(!ctx.has_memories());
        assert!(ctx.preferences().is_empty());
    }

    #[test]
    fn test_preferences_sit_outside_budget() {
        let preferences = vec![
            MemoryRecord::new(owner(), MemoryKind::Preference, "User enjoys tea"),
            MemoryRecord::new(owner(), MemoryKind::Preference, "User dislikes rain"),
        ];
        let ctx = ConversationContext::merge("q", turns(2), Vec::new(), 2, false)
            .with_preferences(preferences);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.preferences().len(), 2);
    }
}
