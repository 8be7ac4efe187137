//! Persistence of the learned state.
//!
//! Three flat files: tokens one per line, association rows as
//! tab-separated `a a_pos b b_pos value`, observation lines as
//! space-separated indices closed by a `-1` sentinel. Missing files are
//! not an error on load; malformed rows are skipped with a warning so one
//! corrupt line cannot discard a whole run's learning.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::assoc::AssocKey;
use crate::domain::error::StoreError;
use crate::domain::observations::ObservationLog;
use crate::domain::vocabulary::Vocabulary;

/// Sentinel closing each persisted observation line.
const LINE_TERMINATOR: i64 = -1;

/// Locations of the three state files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub tokens: PathBuf,
    pub values: PathBuf,
    pub observations: PathBuf,
}

impl StorePaths {
    /// Conventional layout inside a data directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            tokens: dir.join("tokens.txt"),
            values: dir.join("values.tsv"),
            observations: dir.join("observations.txt"),
        }
    }
}

/// Row counts from a completed load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub tokens: usize,
    pub associations: usize,
    pub observations: usize,
}

/// Populate `vocabulary` and `observations` from disk.
///
/// Files that do not exist contribute nothing and are not an error.
/// Duplicate tokens are deduplicated through the vocabulary's own append.
pub fn load(
    vocabulary: &mut Vocabulary,
    observations: &mut ObservationLog,
    paths: &StorePaths,
) -> Result<LoadReport, StoreError> {
    let mut report = LoadReport::default();

    if let Some(reader) = open_if_present(&paths.tokens)? {
        for line in reader.lines() {
            let line = line.map_err(|source| StoreError::Read {
                path: paths.tokens.clone(),
                source,
            })?;
            let token = line.trim();
            if !token.is_empty() && vocabulary.append(token).is_some() {
                report.tokens += 1;
            }
        }
    }

    if let Some(reader) = open_if_present(&paths.values)? {
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| StoreError::Read {
                path: paths.values.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_assoc_row(&line) {
                Some((key, value)) => {
                    vocabulary.assoc_mut().add(key, value);
                    report.associations += 1;
                }
                None => {
                    warn!(
                        file = %paths.values.display(),
                        line = line_no + 1,
                        "skipping malformed association row"
                    );
                }
            }
        }
    }

    if let Some(reader) = open_if_present(&paths.observations)? {
        for line in reader.lines() {
            let line = line.map_err(|source| StoreError::Read {
                path: paths.observations.clone(),
                source,
            })?;
            let parsed = parse_observation_row(&line);
            if !parsed.is_empty() {
                observations.push(parsed);
                report.observations += 1;
            }
        }
    }

    debug!(
        tokens = report.tokens,
        associations = report.associations,
        observations = report.observations,
        "state loaded"
    );
    Ok(report)
}

/// Write the full state to disk, creating parent directories as needed.
pub fn save(
    vocabulary: &Vocabulary,
    observations: &ObservationLog,
    paths: &StorePaths,
) -> Result<(), StoreError> {
    write_tokens(vocabulary, &paths.tokens)?;
    write_values(vocabulary, &paths.values)?;
    write_observations(observations, &paths.observations)?;
    Ok(())
}

fn write_tokens(vocabulary: &Vocabulary, path: &Path) -> Result<(), StoreError> {
    let mut writer = create_writer(path)?;
    for word in vocabulary.words() {
        writeln!(writer, "{word}").map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    finish(writer, path)?;
    debug!(rows = vocabulary.len(), file = %path.display(), "tokens written");
    Ok(())
}

fn write_values(vocabulary: &Vocabulary, path: &Path) -> Result<(), StoreError> {
    let mut writer = create_writer(path)?;
    let mut rows = 0usize;
    for (key, value) in vocabulary.assoc().iter() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            key.a, key.a_pos, key.b, key.b_pos, value
        )
        .map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        rows += 1;
    }
    finish(writer, path)?;
    debug!(rows, file = %path.display(), "association rows written");
    Ok(())
}

fn write_observations(observations: &ObservationLog, path: &Path) -> Result<(), StoreError> {
    let mut writer = create_writer(path)?;
    for line in observations.lines() {
        let mut row = String::new();
        for &idx in line {
            row.push_str(&idx.to_string());
            row.push(' ');
        }
        row.push_str(&LINE_TERMINATOR.to_string());
        writeln!(writer, "{row}").map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    finish(writer, path)?;
    debug!(rows = observations.len(), file = %path.display(), "observations written");
    Ok(())
}

fn open_if_present(path: &Path) -> Result<Option<BufReader<File>>, StoreError> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn create_writer(path: &Path) -> Result<BufWriter<File>, StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    let file = File::create(path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufWriter::new(file))
}

fn finish(mut writer: BufWriter<File>, path: &Path) -> Result<(), StoreError> {
    writer.flush().map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_assoc_row(line: &str) -> Option<(AssocKey, i64)> {
    let mut fields = line.split('\t');
    let a = fields.next()?.trim().parse().ok()?;
    let a_pos = fields.next()?.trim().parse().ok()?;
    let b = fields.next()?.trim().parse().ok()?;
    let b_pos = fields.next()?.trim().parse().ok()?;
    let value = fields.next()?.trim().parse().ok()?;
    Some((AssocKey::new(a, a_pos, b, b_pos), value))
}

/// Parse one observation row, stopping at the `-1` sentinel. Unparseable
/// fields end the row early rather than poisoning it.
fn parse_observation_row(line: &str) -> Vec<usize> {
    let mut indices = Vec::new();
    for field in line.split_whitespace() {
        match field.parse::<i64>() {
            Ok(v) if v == LINE_TERMINATOR => break,
            Ok(v) if v >= 0 => indices.push(v as usize),
            _ => break,
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> (Vocabulary, ObservationLog) {
        let mut vocab = Vocabulary::new();
        vocab.append("echo");
        vocab.append("hi");
        vocab.append("ls");
        vocab.assoc_mut().add(AssocKey::new(0, 0, 1, 1), 10);
        vocab.assoc_mut().add(AssocKey::new(1, 1, 0, 0), -3);

        let mut obs = ObservationLog::new();
        obs.push(vec![1]);
        obs.push(vec![0, 2, 1]);
        (vocab, obs)
    }

    #[test]
    fn round_trip_preserves_everything() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        let (vocab, obs) = sample_state();

        save(&vocab, &obs, &paths).unwrap();

        let mut loaded_vocab = Vocabulary::new();
        let mut loaded_obs = ObservationLog::new();
        let report = load(&mut loaded_vocab, &mut loaded_obs, &paths).unwrap();

        assert_eq!(report.tokens, 3);
        assert_eq!(report.associations, 2);
        assert_eq!(report.observations, 2);

        assert_eq!(loaded_vocab.words(), vocab.words());
        assert_eq!(loaded_vocab.assoc().get(AssocKey::new(0, 0, 1, 1)), 10);
        assert_eq!(loaded_vocab.assoc().get(AssocKey::new(1, 1, 0, 0)), -3);
        assert_eq!(loaded_obs.lines(), obs.lines());
    }

    #[test]
    fn missing_files_load_empty() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        let mut vocab = Vocabulary::new();
        let mut obs = ObservationLog::new();
        let report = load(&mut vocab, &mut obs, &paths).unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(vocab.is_empty());
        assert!(obs.is_empty());
    }

    #[test]
    fn duplicate_tokens_are_deduplicated_on_load() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        fs::write(&paths.tokens, "echo\nhi\necho\n\nhi\n").unwrap();

        let mut vocab = Vocabulary::new();
        let mut obs = ObservationLog::new();
        load(&mut vocab, &mut obs, &paths).unwrap();
        assert_eq!(vocab.words(), &["echo", "hi"]);
    }

    #[test]
    fn malformed_association_rows_are_skipped() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        fs::write(&paths.values, "0\t0\t1\t1\t5\nnot\ta\trow\n1\t0\t0\t1\t2\n").unwrap();

        let mut vocab = Vocabulary::new();
        let mut obs = ObservationLog::new();
        let report = load(&mut vocab, &mut obs, &paths).unwrap();
        assert_eq!(report.associations, 2);
        assert_eq!(vocab.assoc().get(AssocKey::new(0, 0, 1, 1)), 5);
        assert_eq!(vocab.assoc().get(AssocKey::new(1, 0, 0, 1)), 2);
    }

    #[test]
    fn observation_rows_tolerate_missing_sentinel() {
        assert_eq!(parse_observation_row("3 1 4 -1"), vec![3, 1, 4]);
        assert_eq!(parse_observation_row("3 1 4"), vec![3, 1, 4]);
        assert_eq!(parse_observation_row("-1"), Vec::<usize>::new());
        assert_eq!(parse_observation_row(""), Vec::<usize>::new());
        assert_eq!(parse_observation_row("2 junk 5"), vec![2]);
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let paths = StorePaths::in_dir(&nested);
        let (vocab, obs) = sample_state();
        save(&vocab, &obs, &paths).unwrap();
        assert!(paths.tokens.exists());
        assert!(paths.values.exists());
        assert!(paths.observations.exists());
    }

    #[test]
    fn zero_value_rows_do_not_survive_a_round_trip() {
        let dir = tempdir().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        fs::write(&paths.values, "0\t0\t1\t1\t0\n").unwrap();

        let mut vocab = Vocabulary::new();
        let mut obs = ObservationLog::new();
        load(&mut vocab, &mut obs, &paths).unwrap();
        assert!(vocab.assoc().is_empty());
    }
}
