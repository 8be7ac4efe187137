//! Learning updates from captured command output.
//!
//! Turns one captured output into a reward signal: the output is tokenized
//! against the vocabulary, judged for novelty against the observation log,
//! and the verdict is written back into the association map for every
//! ordered argument pair of the command that produced it.
//!
//! Tokens that are not already in the vocabulary are ignored. Vocabulary
//! growth stays with the loader and the seeder; scoring novelty while
//! inserting the very tokens being scored would reward every run once.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::assoc::AssocKey;
use crate::domain::observations::ObservationLog;
use crate::domain::similarity::judge_redundancy;
use crate::domain::vocabulary::Vocabulary;
use crate::services::config::LearningConfig;

pub struct LearningUpdater {
    vocabulary: Arc<Mutex<Vocabulary>>,
    observations: Arc<Mutex<ObservationLog>>,
    config: LearningConfig,
}

impl LearningUpdater {
    pub fn new(
        vocabulary: Arc<Mutex<Vocabulary>>,
        observations: Arc<Mutex<ObservationLog>>,
        config: LearningConfig,
    ) -> Self {
        Self {
            vocabulary,
            observations,
            config,
        }
    }

    /// Digest one captured output for the command that produced it.
    ///
    /// Returns the learning value applied to the command's argument pairs:
    /// the configured reward for novel output, the negated penalty for
    /// redundant output, and a baseline of +1 when no token of the output
    /// resolved against the vocabulary.
    ///
    /// The observation lock and the vocabulary lock are taken strictly in
    /// sequence, never nested.
    pub fn learn(&self, output: &[u8], command: &[usize]) -> i64 {
        let line = self.tokenize(output);

        let reward = if line.is_empty() {
            1
        } else {
            let mut observations = self.observations.lock().unwrap();
            let verdict =
                judge_redundancy(&line, &observations, self.config.redundancy_threshold);
            if verdict.redundant {
                debug!(
                    best_index = ?verdict.best_index,
                    best_score = verdict.best_score,
                    "observation is redundant"
                );
            }
            if !verdict.redundant || self.config.store_redundant {
                observations.push(line);
            }
            if verdict.redundant {
                -self.config.penalty
            } else {
                self.config.reward
            }
        };

        self.apply_reward(command, reward);
        reward
    }

    /// Resolve whitespace-separated output tokens to vocabulary indices,
    /// dropping tokens the vocabulary does not know.
    fn tokenize(&self, output: &[u8]) -> Vec<usize> {
        let text = String::from_utf8_lossy(output);
        let vocabulary = self.vocabulary.lock().unwrap();
        text.split_whitespace()
            .filter_map(|token| vocabulary.find(token))
            .collect()
    }

    /// Accumulate `reward` into every ordered pair of distinct argument
    /// positions of the command.
    fn apply_reward(&self, command: &[usize], reward: i64) {
        if command.is_empty() {
            return;
        }
        let mut vocabulary = self.vocabulary.lock().unwrap();
        let assoc = vocabulary.assoc_mut();
        for (a, &word_a) in command.iter().enumerate() {
            for (b, &word_b) in command.iter().enumerate() {
                if a == b {
                    continue;
                }
                assoc.add(AssocKey::new(word_a, a, word_b, b), reward);
            }
        }
    }
}
