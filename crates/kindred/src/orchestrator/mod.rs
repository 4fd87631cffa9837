//! Memory orchestration
//!
//! The orchestrator sits between the conversation loop and both memory
//! tiers. For each turn it:
//! 1. `retrieve`: reads recent session turns, searches the persistent index
//!    and lists the owner's stored preferences, then merges them into a
//!    bounded [`ConversationContext`]
//! 2. `commit`: appends the finished turn to the session, classifies it and
//!    mirrors qualifying records into the persistent index
//!
//! The persistent tier is optional at runtime. Searches and writes run under
//! a time budget; when the tier fails or is slow the turn continues with
//! session-only context and the writes are reported as dropped.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{Classification, Classifier};
use crate::config::MemoryConfig;
use crate::error::KindredError;
use crate::index::PersistentMemoryIndex;
use crate::memory::routing::route_turn;
use crate::memory::{ConversationContext, MemoryKind, MemoryRecord, OwnerId, SessionStore, SessionTurn};

/// Where the orchestrator is within the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Retrieving,
    Merging,
    /// Context handed out, waiting for the response to be committed
    AwaitingGeneration,
    Committing,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::Retrieving => "retrieving",
            TurnState::Merging => "merging",
            TurnState::AwaitingGeneration => "awaiting-generation",
            TurnState::Committing => "committing",
        };
        f.write_str(name)
    }
}

/// A record written to the persistent index
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: Uuid,
    pub kind: MemoryKind,
}

/// A record that qualified for the persistent index but was not written
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRecord {
    pub id: Uuid,
    pub kind: MemoryKind,
    pub reason: String,
}

/// Outcome of committing one turn
#[derive(Debug, Clone)]
pub struct CommitResult {
    /// Conversation record for the turn (kept in the session tier only)
    pub conversation: MemoryRecord,
    /// `None` when classification failed
    pub classification: Option<Classification>,
    pub stored: Vec<StoredRecord>,
    pub dropped: Vec<DroppedRecord>,
}

impl CommitResult {
    /// Number of records that reached the persistent index
    pub fn durable_writes(&self) -> usize {
        self.stored.len()
    }

    pub fn classification_failed(&self) -> bool {
        self.classification.is_none()
    }
}

/// Snapshot of both tiers for the current owner
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStats {
    pub owner: OwnerId,
    pub session_turns: usize,
    pub session_capacity: usize,
    pub long_term_backend: &'static str,
    /// `None` when the persistent tier could not be counted
    pub long_term_records: Option<usize>,
}

/// Coordinates the session buffer and the persistent index for one session
pub struct MemoryOrchestrator {
    session: SessionStore,
    index: Arc<dyn PersistentMemoryIndex>,
    classifier: Arc<dyn Classifier>,
    config: MemoryConfig,
    state: TurnState,
}

impl MemoryOrchestrator {
    pub fn new(
        session: SessionStore,
        index: Arc<dyn PersistentMemoryIndex>,
        classifier: Arc<dyn Classifier>,
        config: MemoryConfig,
    ) -> Self {
        info!(
            "Memory orchestrator using {} index and {} classifier",
            index.name(),
            classifier.name()
        );
        Self {
            session,
            index,
            classifier,
            config,
            state: TurnState::Idle,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Forget the current session's turns. The persistent tier is untouched.
    pub fn clear_session(&mut self) {
        self.session.clear();
        info!("Session memory cleared");
    }

    /// Drop the in-flight turn without writing anything
    pub fn abandon_turn(&mut self) {
        if self.state != TurnState::Idle {
            debug!("Abandoning turn in state {}", self.state);
        }
        self.state = TurnState::Idle;
    }

    /// Build the context for `query`.
    ///
    /// Never fails: if the persistent tier errors or exceeds its time budget
    /// the context holds session turns only and is flagged as degraded.
    pub async fn retrieve(&mut self, query: &str, owner: &OwnerId) -> ConversationContext {
        if self.state != TurnState::Idle {
            debug!("Previous turn left in state {}, starting over", self.state);
        }
        self.state = TurnState::Retrieving;

        let recent = self.session.recent(self.config.session_window);
        let budget = self.config.store_timeout();
        let (search, profile) = tokio::join!(
            tokio::time::timeout(
                budget,
                self.index.search(query, owner, self.config.search_limit),
            ),
            tokio::time::timeout(
                budget,
                self.index
                    .list(owner, MemoryKind::Preference, self.config.profile_limit),
            ),
        );

        let (mut matches, search_failed) = match search {
            Ok(Ok(matches)) => (matches, false),
            Ok(Err(e)) => {
                warn!("Persistent search failed, using session context only: {}", e);
                (Vec::new(), true)
            }
            Err(_) => {
                warn!(
                    "Persistent search exceeded {:?}, using session context only",
                    budget
                );
                (Vec::new(), true)
            }
        };
        let (mut preferences, profile_failed) = match profile {
            Ok(Ok(preferences)) => (preferences, false),
            Ok(Err(e)) => {
                warn!("Failed to list stored preferences: {}", e);
                (Vec::new(), true)
            }
            Err(_) => {
                warn!("Listing stored preferences exceeded {:?}", budget);
                (Vec::new(), true)
            }
        };

        self.state = TurnState::Merging;
        // Owner isolation must hold even if a backend misbehaves
        matches.retain(|m| m.record.owner() == owner);
        preferences.retain(|p| p.owner() == owner);
        let context = ConversationContext::merge(
            query,
            recent,
            matches,
            self.config.max_context_items,
            search_failed || profile_failed,
        )
        .with_preferences(preferences);
        debug!(
            "Retrieved {} turns, {} memories and {} preferences (degraded: {})",
            context.turns().len(),
            context.memories().len(),
            context.preferences().len(),
            context.is_degraded()
        );

        self.state = TurnState::AwaitingGeneration;
        context
    }

    /// Record a finished turn in both tiers.
    ///
    /// The session append always happens. Classification failure limits the
    /// turn to its Conversation record; persistent write failures are logged
    /// and reported in [`CommitResult::dropped`].
    pub async fn commit(&mut self, turn: SessionTurn, owner: &OwnerId) -> CommitResult {
        self.state = TurnState::Committing;
        self.session.append(turn.clone());

        let classification = match self.classifier.classify(&turn.user_text) {
            Ok(classification) => Some(classification),
            Err(e) => {
                warn!("Classification failed, storing conversation only: {}", e);
                None
            }
        };

        let routed = route_turn(
            &turn,
            owner,
            classification.as_ref(),
            self.config.emotion_threshold,
        );

        let timeout = self.config.store_timeout();
        let writes = routed.persistent.into_iter().map(|record| {
            let index = Arc::clone(&self.index);
            async move {
                let (id, kind) = (record.id(), record.kind());
                let outcome = match tokio::time::timeout(timeout, index.add(record)).await {
                    Ok(result) => result,
                    Err(_) => Err(KindredError::MemoryUnavailable(format!(
                        "write exceeded {timeout:?}"
                    ))),
                };
                (id, kind, outcome)
            }
        });

        let mut stored = Vec::new();
        let mut dropped = Vec::new();
        for (id, kind, outcome) in join_all(writes).await {
            match outcome {
                Ok(stored_id) => stored.push(StoredRecord {
                    id: stored_id,
                    kind,
                }),
                Err(e) => {
                    warn!("Dropped {} record {}: {}", kind, id, e);
                    dropped.push(DroppedRecord {
                        id,
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            "Committed turn: {} stored, {} dropped, session size {}",
            stored.len(),
            dropped.len(),
            self.session.len()
        );
        self.state = TurnState::Idle;

        CommitResult {
            conversation: routed.conversation,
            classification,
            stored,
            dropped,
        }
    }

    pub async fn stats(&self, owner: &OwnerId) -> MemoryStats {
        let long_term_records =
            match tokio::time::timeout(self.config.store_timeout(), self.index.count(owner)).await
            {
                Ok(Ok(count)) => Some(count),
                Ok(Err(e)) => {
                    warn!("Could not count persistent memories: {}", e);
                    None
                }
                Err(_) => None,
            };

        MemoryStats {
            owner: owner.clone(),
            session_turns: self.session.len(),
            session_capacity: self.session.capacity(),
            long_term_backend: self.index.name(),
            long_term_records,
        }
    }
}
