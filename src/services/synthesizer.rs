//! Command synthesis from the learned vocabulary.
//!
//! A command is built by sampling a scoped slice of the vocabulary and then
//! greedily extending the argument list with whichever candidate carries
//! the strongest association to the arguments already chosen.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::Rng;

use crate::domain::assoc::AssocKey;
use crate::domain::settings::{SynthesisSettings, SynthesisSnapshot};
use crate::domain::vocabulary::Vocabulary;

pub struct CommandSynthesizer {
    vocabulary: Arc<Mutex<Vocabulary>>,
    settings: Arc<SynthesisSettings>,
}

impl CommandSynthesizer {
    pub fn new(vocabulary: Arc<Mutex<Vocabulary>>, settings: Arc<SynthesisSettings>) -> Self {
        Self {
            vocabulary,
            settings,
        }
    }

    /// Synthesize one command as a sequence of vocabulary indices.
    ///
    /// Holds the vocabulary lock for the whole construction so the size
    /// observed at entry stays valid throughout. Returns an empty sequence
    /// when the vocabulary is empty. The result never contains duplicates
    /// and never exceeds `min(settings.length, vocabulary size)` arguments.
    pub fn synthesize(&self, rng: &mut StdRng) -> Vec<usize> {
        let snapshot = self.settings.snapshot();
        let limits = self.settings.limits();

        let vocabulary = self.vocabulary.lock().unwrap();
        let n = vocabulary.len();
        if n == 0 {
            return Vec::new();
        }

        let want_len = snapshot
            .length
            .clamp(limits.cmd_min, limits.cmd_max)
            .min(n);
        let mut sample_size = sample_size(n, snapshot);

        // Candidate pool; a partial shuffle promotes the sampled window to
        // the front, everything past `sample_size` is ignored.
        let mut pool: Vec<usize> = (0..n).collect();
        partial_shuffle(&mut pool, sample_size, rng);

        let mut chosen = Vec::with_capacity(want_len);

        // Seed argument: uniform pick from the sample, swap-removed so it
        // cannot be chosen twice.
        let pick = rng.gen_range(0..sample_size);
        chosen.push(pool[pick]);
        pool.swap(pick, sample_size - 1);
        sample_size -= 1;

        while chosen.len() < want_len && sample_size > 0 {
            let position = chosen.len();
            let best = greedy_pick(&vocabulary, &pool[..sample_size], &chosen, position, rng);
            chosen.push(pool[best]);
            pool.swap(best, sample_size - 1);
            sample_size -= 1;
        }

        chosen
    }
}

/// Scoped sample size: `round(n * scope / 100)` clamped into `[1, n]`.
fn sample_size(n: usize, snapshot: SynthesisSnapshot) -> usize {
    let scaled = (n as f64 * f64::from(snapshot.scope) / 100.0).round() as usize;
    scaled.clamp(1, n)
}

/// Partial Fisher-Yates: after the call, `pool[..k]` holds `k` uniformly
/// chosen distinct elements.
fn partial_shuffle(pool: &mut [usize], k: usize, rng: &mut StdRng) {
    let n = pool.len();
    for i in 0..k.min(n) {
        let j = rng.gen_range(i..n);
        pool.swap(i, j);
    }
}

/// Association strength of placing `word` at `position` next to the chosen
/// prefix. Both directions are read because the map is not symmetric.
fn pair_score(vocabulary: &Vocabulary, word: usize, position: usize, chosen: &[usize]) -> i64 {
    let assoc = vocabulary.assoc();
    let mut score = 0;
    for (q, &prior) in chosen.iter().enumerate() {
        score += assoc.get(AssocKey::new(word, position, prior, q));
        score += assoc.get(AssocKey::new(prior, q, word, position));
    }
    score
}

/// Index into `candidates` of the highest-scoring pick, ties broken
/// uniformly at random.
fn greedy_pick(
    vocabulary: &Vocabulary,
    candidates: &[usize],
    chosen: &[usize],
    position: usize,
    rng: &mut StdRng,
) -> usize {
    let mut best_score = i64::MIN;
    let mut best: Vec<usize> = Vec::new();

    for (i, &word) in candidates.iter().enumerate() {
        let score = pair_score(vocabulary, word, position, chosen);
        if score > best_score {
            best_score = score;
            best.clear();
            best.push(i);
        } else if score == best_score {
            best.push(i);
        }
    }

    best[rng.gen_range(0..best.len())]
}
