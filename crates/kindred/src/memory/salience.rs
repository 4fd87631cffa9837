//! Salience scoring for stored memories
//!
//! Salience combines how old a record is, what kind of record it is and how
//! often it has been retrieved. It is informational: retrieval ranking does
//! not depend on it, so it can be recomputed freely on every read.

use chrono::{DateTime, Utc};

use crate::config::SalienceConfig;
use crate::memory::types::{MemoryKind, MemoryRecord};

/// Base weight of each record kind
pub fn kind_weight(kind: MemoryKind) -> f32 {
    match kind {
        MemoryKind::Preference => 1.0,
        MemoryKind::Fact => 0.9,
        MemoryKind::Emotion => 0.7,
        MemoryKind::Conversation => 0.4,
    }
}

/// Compute the salience of a record at time `now`
///
/// Formula: kind_weight * exp(-decay_rate * age_days) * (1 + hit_multiplier * ln(hits + 1))
///
/// - a never-retrieved record starts at its kind weight
/// - age decays the score exponentially
/// - hits raise it with diminishing returns
pub fn compute_salience(record: &MemoryRecord, now: DateTime<Utc>, config: &SalienceConfig) -> f32 {
    let age_days = (now - record.created_at()).num_seconds().max(0) as f32 / 86_400.0;
    let decay_factor = (-config.decay_rate * age_days).exp();
    let hit_factor = 1.0 + config.hit_multiplier * (record.hit_count() as f32 + 1.0).ln();

    kind_weight(record.kind()) * decay_factor * hit_factor
}

/// Recompute and store the salience on the record
pub fn refresh_salience(record: &mut MemoryRecord, now: DateTime<Utc>, config: &SalienceConfig) {
    let salience = compute_salience(record, now, config);
    record.set_salience(salience);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::OwnerId;
    use chrono::Duration;

    fn record(kind: MemoryKind) -> MemoryRecord {
        MemoryRecord::new(OwnerId::try_from("u1").unwrap(), kind, "content")
    }

    #[test]
    fn test_fresh_record_scores_its_kind_weight() {
        let config = SalienceConfig::default();
        let r = record(MemoryKind::Preference);
        let score = compute_salience(&r, r.created_at(), &config);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preference_outranks_conversation() {
        let config = SalienceConfig::default();
        let now = Utc::now();
        let pref = compute_salience(&record(MemoryKind::Preference), now, &config);
        let conv = compute_salience(&record(MemoryKind::Conversation), now, &config);
        assert!(pref > conv);
    }

    #[test]
    fn test_age_decays_salience() {
        let config = SalienceConfig::default();
        let r = record(MemoryKind::Fact);
        let fresh = compute_salience(&r, r.created_at(), &config);
        let month_later = compute_salience(&r, r.created_at() + Duration::days(30), &config);
        assert!(month_later < fresh);
        assert!(month_later > 0.0);
    }

    #[test]
    fn test_hits_raise_salience() {
        let config = SalienceConfig::default();
        let mut r = record(MemoryKind::Emotion);
        let now = r.created_at();
        let before = compute_salience(&r, now, &config);
        r.record_hit();
        r.record_hit();
        let after = compute_salience(&r, now, &config);
        assert!(after > before);
    }

    #[test]
    fn test_refresh_writes_score() {
        let config = SalienceConfig::default();
        let mut r = record(MemoryKind::Fact);
        let now = r.created_at();
        refresh_salience(&mut r, now, &config);
        assert!((r.salience() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_future_timestamp_does_not_inflate() {
        let config = SalienceConfig::default();
        let r = record(MemoryKind::Fact).with_created_at(Utc::now() + Duration::days(2));
        let score = compute_salience(&r, Utc::now(), &config);
        assert!(score <= 0.9 + 1e-6);
    }
}
