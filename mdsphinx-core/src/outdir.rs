//! Output job directories under a temporary root.
//!
//! Names follow `<key>.<YYYY-MM-DD>.<token>.<seq>`, e.g.
//! `guide.md.2026-10-16.3f9a1.0`. The token is a short stable digest of the
//! key; `seq` disambiguates runs on the same day.
//!
//! Naming is pure ([`next_name`], [`latest_name`]); the filesystem is reached
//! only through [`DirPort`] so the sequencing logic can be exercised without
//! touching disk. Directories are only ever created or discovered here, except
//! that `overwrite` empties the reused directory.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};

use crate::error::{alloc_io, AllocError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const TOKEN_LEN: usize = 5;
const MAX_ATTEMPTS: u32 = 1024;

// ---------------------------------------------------------------------------
// Pure naming
// ---------------------------------------------------------------------------

/// A parsed job directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDirName {
    pub key: String,
    pub date: NaiveDate,
    pub token: String,
    pub seq: u32,
}

impl JobDirName {
    /// Parse `name` as a job directory belonging to `key`.
    ///
    /// The remainder after `<key>.` must be exactly `date.token.seq`, so a
    /// key that is a prefix of another key (`a` vs `a.md`) never matches.
    pub fn parse(key: &str, name: &str) -> Option<Self> {
        let rest = name.strip_prefix(key)?.strip_prefix('.')?;
        let mut parts = rest.split('.');
        let (date, token, seq) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || token.is_empty() {
            return None;
        }
        Some(Self {
            key: key.to_string(),
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?,
            token: token.to_string(),
            seq: seq.parse().ok()?,
        })
    }
}

impl fmt::Display for JobDirName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.key,
            self.date.format(DATE_FORMAT),
            self.token,
            self.seq
        )
    }
}

/// Stable disambiguating token for `key`.
pub fn token_for(key: &str) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    digest[..TOKEN_LEN].to_string()
}

/// Next name for `key` on `date`: one past the highest sequence already used
/// for that key and date, or `0` when there is none. `None` once `u32::MAX`
/// is taken.
pub fn next_name<'a>(
    key: &str,
    date: NaiveDate,
    existing: impl IntoIterator<Item = &'a str>,
) -> Option<JobDirName> {
    let highest = existing
        .into_iter()
        .filter_map(|name| JobDirName::parse(key, name))
        .filter(|parsed| parsed.date == date)
        .map(|parsed| parsed.seq)
        .max();
    let seq = match highest {
        Some(seq) => seq.checked_add(1)?,
        None => 0,
    };
    Some(JobDirName {
        key: key.to_string(),
        date,
        token: token_for(key),
        seq,
    })
}

/// Latest existing name for `key`: greatest date, then greatest sequence.
pub fn latest_name<'a>(
    key: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> Option<JobDirName> {
    existing
        .into_iter()
        .filter_map(|name| JobDirName::parse(key, name))
        .max_by(|a, b| a.date.cmp(&b.date).then(a.seq.cmp(&b.seq)))
}

// ---------------------------------------------------------------------------
// Filesystem port
// ---------------------------------------------------------------------------

/// The directory operations the allocator needs.
pub trait DirPort {
    /// Names of the directories directly under `root`. Missing root → empty.
    fn list_dirs(&self, root: &Path) -> std::io::Result<Vec<String>>;
    /// Create `path` (and its parents, but not `path` itself if present).
    /// Must fail with [`ErrorKind::AlreadyExists`] when `path` exists.
    fn create_new(&self, path: &Path) -> std::io::Result<()>;
    /// Remove everything inside `path`, keeping `path`.
    fn clear(&self, path: &Path) -> std::io::Result<()>;
}

/// [`DirPort`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDirs;

impl DirPort for StdDirs {
    fn list_dirs(&self, root: &Path) -> std::io::Result<Vec<String>> {
        if !root.exists() {
            return Ok(vec![]);
        }
        let mut names: Vec<String> = std::fs::read_dir(root)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn create_new(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // `create_dir` is the atomic create-if-absent primitive.
        std::fs::create_dir(path)
    }

    fn clear(&self, path: &Path) -> std::io::Result<()> {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Allocate a job directory for `key` under `root` using today's UTC date.
pub fn allocate(key: &str, root: &Path, overwrite: bool) -> Result<PathBuf, AllocError> {
    allocate_with(&StdDirs, key, root, overwrite, Utc::now().date_naive())
}

/// Latest job directory for `key` under `root`.
pub fn find_latest(key: &str, root: &Path) -> Result<PathBuf, AllocError> {
    find_latest_with(&StdDirs, key, root)
}

/// [`allocate`] against an explicit port and date.
///
/// - `overwrite = false`: claim the next sequence number, retrying with the
///   following number whenever another process created it first.
/// - `overwrite = true`: reuse the latest directory for `key` (or sequence `0`
///   for `today` when none exists) and empty it.
pub fn allocate_with(
    port: &dyn DirPort,
    key: &str,
    root: &Path,
    overwrite: bool,
    today: NaiveDate,
) -> Result<PathBuf, AllocError> {
    if overwrite {
        return reuse_latest(port, key, root, today);
    }

    let existing = port.list_dirs(root).map_err(|e| alloc_io(root, e))?;
    let exhausted = || AllocError::Exhausted {
        key: key.to_string(),
        root: root.to_path_buf(),
    };
    let mut name = next_name(key, today, existing.iter().map(String::as_str)).ok_or_else(exhausted)?;
    for _ in 0..MAX_ATTEMPTS {
        let path = root.join(name.to_string());
        match port.create_new(&path) {
            Ok(()) => {
                tracing::info!(action = "allocate", key = key, path = %path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(action = "allocate", key = key, seq = name.seq, "sequence taken");
                name.seq = name.seq.checked_add(1).ok_or_else(exhausted)?;
            }
            Err(e) => return Err(alloc_io(&path, e)),
        }
    }
    Err(exhausted())
}

/// [`find_latest`] against an explicit port.
pub fn find_latest_with(port: &dyn DirPort, key: &str, root: &Path) -> Result<PathBuf, AllocError> {
    let existing = port.list_dirs(root).map_err(|e| alloc_io(root, e))?;
    latest_name(key, existing.iter().map(String::as_str))
        .map(|name| root.join(name.to_string()))
        .ok_or_else(|| AllocError::NotFound {
            key: key.to_string(),
            root: root.to_path_buf(),
        })
}

fn reuse_latest(
    port: &dyn DirPort,
    key: &str,
    root: &Path,
    today: NaiveDate,
) -> Result<PathBuf, AllocError> {
    match find_latest_with(port, key, root) {
        Ok(path) => {
            tracing::info!(action = "overwrite", key = key, path = %path.display());
            port.clear(&path).map_err(|e| alloc_io(&path, e))?;
            Ok(path)
        }
        Err(AllocError::NotFound { .. }) => {
            let name = JobDirName {
                key: key.to_string(),
                date: today,
                token: token_for(key),
                seq: 0,
            };
            let path = root.join(name.to_string());
            match port.create_new(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(alloc_io(&path, e)),
            }
            tracing::info!(action = "allocate", key = key, path = %path.display());
            Ok(path)
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::RefCell;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[rstest]
    #[case(&[], 0)]
    #[case(&["key.2026-10-16.abcde.0"], 1)]
    #[case(&["key.2026-10-16.abcde.0", "key.2026-10-16.abcde.4"], 5)]
    #[case(&["key.2026-10-15.abcde.7"], 0)]
    #[case(&["key.md.2026-10-16.abcde.3", "other.2026-10-16.abcde.9"], 0)]
    #[case(&["key.2026-10-16.abcde", "key.2026-10-16.abcde.x", "key.junk"], 0)]
    fn next_sequence(#[case] existing: &[&str], #[case] expected: u32) {
        let name = next_name("key", day("2026-10-16"), existing.iter().copied()).unwrap();
        assert_eq!(name.seq, expected);
        assert!(name.to_string().starts_with("key.2026-10-16."));
    }

    #[test]
    fn next_sequence_after_max_is_none() {
        let existing = [format!("key.2026-10-16.abcde.{}", u32::MAX)];
        assert!(next_name("key", day("2026-10-16"), existing.iter().map(String::as_str)).is_none());
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&["key.2026-10-16.abcde.0"], Some("key.2026-10-16.abcde.0"))]
    #[case(&["key.2026-10-16.abcde.0", "key.2026-10-16.abcde.1"], Some("key.2026-10-16.abcde.1"))]
    #[case(&["key.2026-10-17.abcde.0", "key.2026-10-16.abcde.9"], Some("key.2026-10-17.abcde.0"))]
    #[case(&["key.2026-10-16.abcde.2", "key.2026-10-16.abcde.10"], Some("key.2026-10-16.abcde.10"))]
    fn latest(#[case] existing: &[&str], #[case] expected: Option<&str>) {
        let found = latest_name("key", existing.iter().copied()).map(|n| n.to_string());
        assert_eq!(found.as_deref(), expected);
    }

    #[test]
    fn parse_roundtrips_display() {
        let name = "guide.md.2026-01-02.ab12c.3";
        let parsed = JobDirName::parse("guide.md", name).expect("parse");
        assert_eq!(parsed.seq, 3);
        assert_eq!(parsed.to_string(), name);
    }

    #[test]
    fn token_is_stable_and_short() {
        assert_eq!(token_for("docs"), token_for("docs"));
        assert_ne!(token_for("docs"), token_for("guide"));
        assert_eq!(token_for("docs").len(), TOKEN_LEN);
    }

    /// In-memory port; the first `collisions` creations fail as if another
    /// process won the race.
    #[derive(Default)]
    struct MemDirs {
        dirs: RefCell<Vec<String>>,
        collisions: RefCell<u32>,
        cleared: RefCell<Vec<PathBuf>>,
    }

    impl DirPort for MemDirs {
        fn list_dirs(&self, _root: &Path) -> std::io::Result<Vec<String>> {
            Ok(self.dirs.borrow().clone())
        }

        fn create_new(&self, path: &Path) -> std::io::Result<()> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            let mut collisions = self.collisions.borrow_mut();
            if *collisions > 0 || self.dirs.borrow().contains(&name) {
                *collisions = collisions.saturating_sub(1);
                self.dirs.borrow_mut().push(name);
                return Err(ErrorKind::AlreadyExists.into());
            }
            self.dirs.borrow_mut().push(name);
            Ok(())
        }

        fn clear(&self, path: &Path) -> std::io::Result<()> {
            self.cleared.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn collision_retries_with_next_sequence() {
        let port = MemDirs::default();
        *port.collisions.borrow_mut() = 2;
        let path = allocate_with(&port, "k", Path::new("/tmp/root"), false, day("2026-10-16")).unwrap();
        assert!(path.to_string_lossy().ends_with(".2"), "got {}", path.display());
    }

    #[test]
    fn overwrite_clears_latest() {
        let port = MemDirs::default();
        port.dirs.borrow_mut().push("k.2026-10-15.abcde.3".to_string());
        let path = allocate_with(&port, "k", Path::new("/r"), true, day("2026-10-16")).unwrap();
        assert_eq!(path, PathBuf::from("/r/k.2026-10-15.abcde.3"));
        assert_eq!(port.cleared.borrow().as_slice(), &[path]);
    }

    #[test]
    fn overwrite_without_existing_creates_sequence_zero() {
        let port = MemDirs::default();
        let path = allocate_with(&port, "k", Path::new("/r"), true, day("2026-10-16")).unwrap();
        let name = JobDirName::parse("k", &path.file_name().unwrap().to_string_lossy()).unwrap();
        assert_eq!(name.seq, 0);
        assert!(port.cleared.borrow().is_empty());
    }

    #[test]
    fn find_latest_missing_is_not_found() {
        let port = MemDirs::default();
        let err = find_latest_with(&port, "k", Path::new("/r")).unwrap_err();
        assert!(matches!(err, AllocError::NotFound { .. }));
    }
}
