//! Flat-file download cache mapping source URL to the downloaded file.
//!
//! One record per line, `<url>\t<filepath>`, trailing newline after every
//! record; an empty file is a valid empty store. A record is valid only
//! while the file it points at still exists, and validity is re-checked on
//! every scan, never cached. Concurrent writers are not coordinated: two
//! pipeline runs sharing one cache file can race and lose updates. That is
//! an accepted limitation of the flat-file design.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Handle to the cache's backing file.
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing file empty if it does not exist. If it does,
    /// drop every record whose target file is gone and rewrite the file
    /// with the survivors. Idempotent: a second run with no filesystem
    /// changes in between rewrites byte-identical content.
    pub fn initialize_or_prune(&self) -> Result<()> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
            return fs::write(&self.path, "").map_err(|e| self.io_err(e));
        }

        let entries = self.read_entries()?;
        let total = entries.len();
        let survivors: Vec<_> = entries
            .into_iter()
            .filter(|(_, filepath)| filepath.exists())
            .collect();

        if survivors.len() < total {
            debug!(
                pruned = total - survivors.len(),
                kept = survivors.len(),
                "pruned expired cache entries"
            );
        }
        self.write_entries(&survivors)
    }

    /// Find a cached download for `url`.
    ///
    /// Scans every record; the first record for `url` whose file still
    /// exists is the hit. Records for `url` whose file is gone are expired
    /// and get pruned on the way out. Records for other urls are kept
    /// as-is without checking their targets: lookup stays off the
    /// filesystem for unrelated entries, so only matching expired records
    /// are ever pruned here.
    pub fn lookup(&self, url: &str) -> Result<Option<PathBuf>> {
        let entries = self.read_entries()?;

        let mut hit: Option<PathBuf> = None;
        let mut found_expired = false;
        let mut survivors = Vec::with_capacity(entries.len());

        for (cached_url, filepath) in entries {
            if cached_url == url {
                if filepath.exists() {
                    if hit.is_none() {
                        hit = Some(filepath.clone());
                    }
                    survivors.push((cached_url, filepath));
                } else {
                    found_expired = true;
                }
            } else {
                survivors.push((cached_url, filepath));
            }
        }

        if found_expired {
            self.write_entries(&survivors)?;
        }

        Ok(hit)
    }

    /// Record a completed download, replacing any previous record for
    /// `url` so the store holds at most one entry per url.
    pub fn record(&self, url: &str, filepath: &Path) -> Result<()> {
        let mut entries = if self.path.exists() {
            self.read_entries()?
        } else {
            Vec::new()
        };
        entries.retain(|(cached_url, _)| cached_url != url);
        entries.push((url.to_string(), filepath.to_path_buf()));
        self.write_entries(&entries)
    }

    fn read_entries(&self) -> Result<Vec<(String, PathBuf)>> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        Ok(parse_entries(&content))
    }

    fn write_entries(&self, entries: &[(String, PathBuf)]) -> Result<()> {
        let mut out = String::new();
        for (url, filepath) in entries {
            out.push_str(url);
            out.push('\t');
            out.push_str(&filepath.to_string_lossy());
            out.push('\n');
        }
        fs::write(&self.path, out).map_err(|e| self.io_err(e))
    }

    fn io_err(&self, source: std::io::Error) -> Error {
        Error::Cache {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parse tab-delimited records, skipping blank lines. Lines without a tab
/// are malformed and dropped on the next rewrite.
fn parse_entries(content: &str) -> Vec<(String, PathBuf)> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = line.split_once('\t');
            if parsed.is_none() {
                warn!(line, "malformed cache record, skipping");
            }
            parsed.map(|(url, filepath)| (url.to_string(), PathBuf::from(filepath)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn initialize_creates_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("cache.tsv"));
        cache.initialize_or_prune().unwrap();
        assert_eq!(fs::read_to_string(cache.path()).unwrap(), "");
    }

    #[test]
    fn prune_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.mp4");
        touch(&kept);
        let cache_path = dir.path().join("cache.tsv");
        fs::write(
            &cache_path,
            format!(
                "http://x\t{}\nhttp://y\t{}\n",
                kept.display(),
                dir.path().join("missing.mp4").display()
            ),
        )
        .unwrap();

        let cache = CacheFile::new(&cache_path);
        cache.initialize_or_prune().unwrap();
        let first = fs::read_to_string(&cache_path).unwrap();
        assert_eq!(first, format!("http://x\t{}\n", kept.display()));

        cache.initialize_or_prune().unwrap();
        let second = fs::read_to_string(&cache_path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn lookup_on_empty_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheFile::new(dir.path().join("cache.tsv"));
        cache.initialize_or_prune().unwrap();
        assert!(cache.lookup("http://x").unwrap().is_none());
        assert_eq!(fs::read_to_string(cache.path()).unwrap(), "");
    }

    #[test]
    fn lookup_returns_valid_entry_and_prunes_expired_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let valid = dir.path().join("a.mp4");
        touch(&valid);
        let missing = dir.path().join("missing.mp4");
        let other_missing = dir.path().join("other-missing.mp4");

        let cache_path = dir.path().join("cache.tsv");
        fs::write(
            &cache_path,
            format!(
                "http://x\t{}\nhttp://x\t{}\nhttp://y\t{}\n",
                missing.display(),
                valid.display(),
                other_missing.display()
            ),
        )
        .unwrap();

        let cache = CacheFile::new(&cache_path);
        let hit = cache.lookup("http://x").unwrap();
        assert_eq!(hit, Some(valid.clone()));

        // The expired http://x record is gone; the valid one and the
        // http://y record survive even though http://y's file is missing.
        let content = fs::read_to_string(&cache_path).unwrap();
        assert_eq!(
            content,
            format!(
                "http://x\t{}\nhttp://y\t{}\n",
                valid.display(),
                other_missing.display()
            )
        );
    }

    #[test]
    fn lookup_without_expired_matches_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let valid = dir.path().join("a.mp4");
        touch(&valid);
        let cache_path = dir.path().join("cache.tsv");
        let original = format!(
            "http://y\t{}\nhttp://x\t{}\n",
            dir.path().join("missing.mp4").display(),
            valid.display()
        );
        fs::write(&cache_path, &original).unwrap();

        let cache = CacheFile::new(&cache_path);
        assert_eq!(cache.lookup("http://x").unwrap(), Some(valid));
        // http://y is unrelated to the query, so its expired record stays.
        assert_eq!(fs::read_to_string(&cache_path).unwrap(), original);
    }

    #[test]
    fn lookup_expired_only_returns_none_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache.tsv");
        fs::write(
            &cache_path,
            format!("http://x\t{}\n", dir.path().join("gone.mp4").display()),
        )
        .unwrap();

        let cache = CacheFile::new(&cache_path);
        assert!(cache.lookup("http://x").unwrap().is_none());
        assert_eq!(fs::read_to_string(&cache_path).unwrap(), "");
    }

    #[test]
    fn record_deduplicates_per_url() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.mp4");
        let second = dir.path().join("b.mp4");
        touch(&first);
        touch(&second);

        let cache = CacheFile::new(dir.path().join("cache.tsv"));
        cache.initialize_or_prune().unwrap();
        cache.record("http://x", &first).unwrap();
        cache.record("http://x", &second).unwrap();

        let content = fs::read_to_string(cache.path()).unwrap();
        assert_eq!(content, format!("http://x\t{}\n", second.display()));
        assert_eq!(cache.lookup("http://x").unwrap(), Some(second));
    }

    #[test]
    fn prune_then_lookup_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.mp4");
        touch(&existing);
        let cache_path = dir.path().join("cache.tsv");
        fs::write(
            &cache_path,
            format!(
                "http://x\t{}\nhttp://y\t{}\n",
                existing.display(),
                dir.path().join("missing.mp4").display()
            ),
        )
        .unwrap();

        let cache = CacheFile::new(&cache_path);
        cache.initialize_or_prune().unwrap();
        assert_eq!(
            fs::read_to_string(&cache_path).unwrap(),
            format!("http://x\t{}\n", existing.display())
        );
        assert!(cache.lookup("http://y").unwrap().is_none());
    }
}
