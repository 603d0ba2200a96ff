//! DNA self-description telemetry
//!
//! Bookkeeping counters under biological naming, carried over from the
//! service's ancestry: every handled event "mutates" the DNA by a fixed
//! weight, and accumulated fitness advances the generation. The state is
//! descriptive only and never influences dispatch.

use crate::config::{DNA_GENERATION_THRESHOLD, DNA_RECENT_CAP};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of events the DNA tracks, each with a fixed fitness weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// A command handler ran to completion
    Command,
    /// A plain-text chat (or echo) reply was sent
    ChatReply,
    /// A quiz answer was judged correct
    QuizCorrect,
    /// A quiz answer was judged wrong
    QuizWrong,
    /// A reminder fired
    ReminderFired,
    /// A handler failed
    Error,
}

impl MutationKind {
    /// Fixed lookup-table weight applied to the fitness score
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Command => 1.0,
            Self::ChatReply => 1.5,
            Self::QuizCorrect => 2.0,
            Self::QuizWrong => 0.5,
            Self::ReminderFired => 1.0,
            Self::Error => -0.5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::ChatReply => "chat_reply",
            Self::QuizCorrect => "quiz_correct",
            Self::QuizWrong => "quiz_wrong",
            Self::ReminderFired => "reminder_fired",
            Self::Error => "error",
        }
    }
}

/// One appended mutation record
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MutationRecord {
    pub kind: String,
    pub weight: f64,
    pub at: DateTime<Utc>,
}

/// Persisted DNA state
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DnaState {
    pub generation: u32,
    pub fitness_score: f64,
    /// Total mutations by kind
    pub counters: BTreeMap<String, u64>,
    /// Bounded log of recent mutations, newest last
    pub recent: Vec<MutationRecord>,
    pub born_at: DateTime<Utc>,
}

impl Default for DnaState {
    fn default() -> Self {
        Self {
            generation: 1,
            fitness_score: 0.0,
            counters: BTreeMap::new(),
            recent: Vec::new(),
            born_at: Utc::now(),
        }
    }
}

impl DnaState {
    /// Apply one mutation: bump the counter, add the weight, append to the
    /// recent log, and advance the generation when fitness crosses the
    /// per-generation threshold.
    pub fn record_mutation(&mut self, kind: MutationKind) {
        *self.counters.entry(kind.as_str().to_string()).or_insert(0) += 1;
        self.fitness_score += kind.weight();

        self.recent.push(MutationRecord {
            kind: kind.as_str().to_string(),
            weight: kind.weight(),
            at: Utc::now(),
        });
        if self.recent.len() > DNA_RECENT_CAP {
            let excess = self.recent.len() - DNA_RECENT_CAP;
            self.recent.drain(..excess);
        }

        while self.fitness_score >= f64::from(self.generation) * DNA_GENERATION_THRESHOLD {
            self.generation += 1;
        }
    }

    /// Total number of recorded mutations across all kinds
    #[must_use]
    pub fn total_mutations(&self) -> u64 {
        self.counters.values().sum()
    }

    /// Human-readable summary for the /dna command
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "🧬 DNA\nGeneration: {}\nFitness: {:.1}\nMutations: {}\nBorn: {}\n",
            self.generation,
            self.fitness_score,
            self.total_mutations(),
            self.born_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
        for (kind, count) in &self.counters {
            out.push_str(&format!("  {kind}: {count}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_applied_per_kind() {
        let mut dna = DnaState::default();
        dna.record_mutation(MutationKind::Command);
        dna.record_mutation(MutationKind::QuizCorrect);
        dna.record_mutation(MutationKind::Error);

        assert!((dna.fitness_score - 2.5).abs() < f64::EPSILON);
        assert_eq!(dna.counters.get("command"), Some(&1));
        assert_eq!(dna.counters.get("quiz_correct"), Some(&1));
        assert_eq!(dna.total_mutations(), 3);
    }

    #[test]
    fn test_generation_advances_at_threshold() {
        let mut dna = DnaState::default();
        assert_eq!(dna.generation, 1);

        // 25 quiz_correct mutations = 50.0 fitness = one generation
        for _ in 0..25 {
            dna.record_mutation(MutationKind::QuizCorrect);
        }
        assert_eq!(dna.generation, 2);

        // Another 50 points crosses the generation-2 threshold (100.0)
        for _ in 0..25 {
            dna.record_mutation(MutationKind::QuizCorrect);
        }
        assert_eq!(dna.generation, 3);
    }

    #[test]
    fn test_recent_log_is_bounded() {
        let mut dna = DnaState::default();
        for _ in 0..(DNA_RECENT_CAP + 10) {
            dna.record_mutation(MutationKind::ChatReply);
        }
        assert_eq!(dna.recent.len(), DNA_RECENT_CAP);
    }

    #[test]
    fn test_summary_mentions_generation() {
        let mut dna = DnaState::default();
        dna.record_mutation(MutationKind::Command);
        let summary = dna.summary();
        assert!(summary.contains("Generation: 1"));
        assert!(summary.contains("command: 1"));
    }
}
