//! Vocabulary seeding from the executable search path.
//!
//! Walks a colon-separated directory list and appends the names of regular
//! executable files. Gives the agent its starting words on a first run;
//! afterwards the persisted vocabulary takes over.

use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::domain::vocabulary::Vocabulary;

/// Search path used when neither an override nor `PATH` is available.
pub const FALLBACK_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Cap on words added per directory (0 = unlimited).
    pub max_per_dir: usize,
    /// Give up on a directory after this long (zero = no timeout).
    pub dir_timeout: Duration,
    /// Skip symbolic links.
    pub skip_symlinks: bool,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            max_per_dir: 5000,
            dir_timeout: Duration::from_secs(8),
            skip_symlinks: true,
        }
    }
}

/// Scan the search path and append executable names to the vocabulary.
///
/// The directory list comes from `path_override` when given, otherwise the
/// `PATH` environment variable, otherwise [`FALLBACK_PATH`]. Unreadable
/// directories are skipped. Returns the number of words added.
pub fn seed_from_path(
    vocabulary: &Arc<Mutex<Vocabulary>>,
    path_override: Option<&str>,
    options: &SeedOptions,
) -> usize {
    let search = path_override
        .map(str::to_owned)
        .or_else(|| std::env::var("PATH").ok())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| FALLBACK_PATH.to_owned());

    let mut total = 0usize;
    for dir in search.split(':').filter(|d| !d.is_empty()) {
        total += seed_directory(vocabulary, dir, options);
    }

    debug!(total, "seeding complete");
    total
}

fn seed_directory(
    vocabulary: &Arc<Mutex<Vocabulary>>,
    dir: &str,
    options: &SeedOptions,
) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir, error = %e, "skipping unreadable directory");
            return 0;
        }
    };

    let started = Instant::now();
    let mut added = 0usize;

    for entry in entries.flatten() {
        if !options.dir_timeout.is_zero() && started.elapsed() >= options.dir_timeout {
            debug!(dir, added, "directory scan timed out, moving on");
            break;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.') {
            continue;
        }

        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() && options.skip_symlinks {
            continue;
        }

        // Symlinks that survive the filter are resolved to their target.
        let metadata = if file_type.is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(m) => m,
                Err(_) => continue,
            }
        } else {
            match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            }
        };

        if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
            continue;
        }

        if vocabulary.lock().unwrap().append(name).is_some() {
            added += 1;
            if options.max_per_dir > 0 && added >= options.max_per_dir {
                debug!(dir, added, "per-directory cap reached");
                break;
            }
        }
    }

    debug!(dir, added, "directory scanned");
    added
}
