//! Persistence round-trip behavior.

use std::collections::HashSet;

use tempfile::TempDir;

use forager::domain::assoc::AssocKey;
use forager::domain::observations::ObservationLog;
use forager::domain::vocabulary::Vocabulary;
use forager::infrastructure::store::{load, save, StorePaths};

fn populated_state() -> (Vocabulary, ObservationLog) {
    let mut vocab = Vocabulary::new();
    for word in ["echo", "ls", "true", "grep", "cat"] {
        vocab.append(word);
    }
    vocab.assoc_mut().add(AssocKey::new(0, 0, 1, 1), 10);
    vocab.assoc_mut().add(AssocKey::new(1, 1, 0, 0), 10);
    vocab.assoc_mut().add(AssocKey::new(2, 0, 3, 1), -4);
    vocab.assoc_mut().add(AssocKey::new(4, 2, 0, 0), 7);

    let mut obs = ObservationLog::new();
    obs.push(vec![0]);
    obs.push(vec![1, 2, 3]);
    obs.push(vec![4, 4, 0]);
    (vocab, obs)
}

#[test]
fn save_then_load_reproduces_the_state() {
    let tmp = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(tmp.path());
    let (vocab, obs) = populated_state();

    save(&vocab, &obs, &paths).unwrap();

    let mut loaded_vocab = Vocabulary::new();
    let mut loaded_obs = ObservationLog::new();
    load(&mut loaded_vocab, &mut loaded_obs, &paths).unwrap();

    // Same words, same order.
    assert_eq!(loaded_vocab.len(), vocab.len());
    assert_eq!(loaded_vocab.words(), vocab.words());

    // Same set of non-zero association entries.
    let original: HashSet<_> = vocab.assoc().iter().collect();
    let restored: HashSet<_> = loaded_vocab.assoc().iter().collect();
    assert_eq!(original, restored);

    // Same ordered observation lines.
    assert_eq!(loaded_obs.lines(), obs.lines());
}

#[test]
fn double_round_trip_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(tmp.path());
    let (vocab, obs) = populated_state();

    save(&vocab, &obs, &paths).unwrap();

    let mut mid_vocab = Vocabulary::new();
    let mut mid_obs = ObservationLog::new();
    load(&mut mid_vocab, &mut mid_obs, &paths).unwrap();

    let tmp2 = TempDir::new().unwrap();
    let paths2 = StorePaths::in_dir(tmp2.path());
    save(&mid_vocab, &mid_obs, &paths2).unwrap();

    let mut final_vocab = Vocabulary::new();
    let mut final_obs = ObservationLog::new();
    load(&mut final_vocab, &mut final_obs, &paths2).unwrap();

    assert_eq!(final_vocab.words(), vocab.words());
    assert_eq!(
        final_vocab.assoc().iter().collect::<HashSet<_>>(),
        vocab.assoc().iter().collect::<HashSet<_>>()
    );
    assert_eq!(final_obs.lines(), obs.lines());
}

#[test]
fn loading_twice_does_not_duplicate_tokens() {
    let tmp = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(tmp.path());
    let (vocab, obs) = populated_state();
    save(&vocab, &obs, &paths).unwrap();

    let mut loaded_vocab = Vocabulary::new();
    let mut loaded_obs = ObservationLog::new();
    load(&mut loaded_vocab, &mut loaded_obs, &paths).unwrap();
    let report = load(&mut loaded_vocab, &mut loaded_obs, &paths).unwrap();

    // Second pass adds no tokens (dedupe) but doubles association values.
    assert_eq!(report.tokens, 0);
    assert_eq!(loaded_vocab.len(), vocab.len());
    assert_eq!(loaded_vocab.assoc().get(AssocKey::new(0, 0, 1, 1)), 20);
}

#[test]
fn empty_state_round_trips() {
    let tmp = TempDir::new().unwrap();
    let paths = StorePaths::in_dir(tmp.path());
    let vocab = Vocabulary::new();
    let obs = ObservationLog::new();

    save(&vocab, &obs, &paths).unwrap();

    let mut loaded_vocab = Vocabulary::new();
    let mut loaded_obs = ObservationLog::new();
    let report = load(&mut loaded_vocab, &mut loaded_obs, &paths).unwrap();
    assert_eq!(report.tokens, 0);
    assert_eq!(report.associations, 0);
    assert_eq!(report.observations, 0);
    assert!(loaded_vocab.is_empty());
    assert!(loaded_obs.is_empty());
}
