//! Known-malicious digest list. Backed by a newline-delimited file of SHA-256
//! hex digests, reloaded at the start of every file scan so appended entries
//! take effect without a restart.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub struct HashRegistry {
    path: PathBuf,
    hashes: RwLock<Arc<HashSet<String>>>,
}

impl HashRegistry {
    /// Bind to a backing list file. No read happens until [`reload`](Self::reload).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hashes: RwLock::new(Arc::new(HashSet::new())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the backing file and swap the set in whole. Lines that are not
    /// exactly 64 hex characters are dropped; digests are lowercased. An
    /// absent file is an empty set, not an error. On read failure the previous
    /// set stays in place and the error is returned for the caller to report.
    pub fn reload(&self) -> Result<usize, io::Error> {
        let fresh = match std::fs::read_to_string(&self.path) {
            Ok(data) => parse_digest_lines(&data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        let count = fresh.len();
        let mut guard = self.hashes.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(fresh);
        drop(guard);
        tracing::debug!(path = %self.path.display(), count, "hash registry reloaded");
        Ok(count)
    }

    /// Cheap handle to the current set; a scan holds one snapshot for its whole
    /// run, so a concurrent reload never changes results mid-scan.
    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        let guard = self.hashes.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}

fn parse_digest_lines(data: &str) -> HashSet<String> {
    data.lines()
        .filter_map(|line| {
            let candidate = line.trim();
            if candidate.len() == 64 && candidate.chars().all(|c| c.is_ascii_hexdigit()) {
                Some(candidate.to_ascii_lowercase())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn malformed_lines_dropped_and_case_normalized() {
        let data = format!(
            "{}\nnot-a-digest\n{}\n\n{}\n",
            "a".repeat(64),
            "B".repeat(64),
            "c".repeat(63),
        );
        let set = parse_digest_lines(&data);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&"a".repeat(64)));
        assert!(set.contains(&"b".repeat(64)));
    }

    #[test]
    fn absent_file_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let registry = HashRegistry::new(dir.path().join("missing.txt"));
        assert_eq!(registry.reload().unwrap(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn reload_swaps_whole_set() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("hashes.txt");
        std::fs::write(&list, format!("{}\n", "1".repeat(64))).unwrap();

        let registry = HashRegistry::new(&list);
        registry.reload().unwrap();
        let before = registry.snapshot();
        assert!(before.contains(&"1".repeat(64)));

        let mut f = std::fs::OpenOptions::new().append(true).open(&list).unwrap();
        writeln!(f, "{}", "2".repeat(64)).unwrap();
        registry.reload().unwrap();

        // the earlier snapshot is unchanged; a fresh one sees the append
        assert!(!before.contains(&"2".repeat(64)));
        assert!(registry.snapshot().contains(&"2".repeat(64)));
    }
}
