//! Output job directory allocation against a real filesystem.

use chrono::Utc;
use mdsphinx_core::outdir::{self, JobDirName, DATE_FORMAT};
use mdsphinx_core::AllocError;
use tempfile::TempDir;

fn parse(key: &str, path: &std::path::Path) -> JobDirName {
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    JobDirName::parse(key, &name).unwrap_or_else(|| panic!("unexpected name {name}"))
}

#[test]
fn two_allocations_differ_by_one() {
    let root = TempDir::new().expect("root");
    let first = outdir::allocate("k", root.path(), false).expect("first");
    let second = outdir::allocate("k", root.path(), false).expect("second");

    assert_ne!(first, second);
    assert!(first.is_dir() && second.is_dir());

    let (a, b) = (parse("k", &first), parse("k", &second));
    assert_eq!(b.seq, a.seq + 1);
    let today = Utc::now().date_naive().format(DATE_FORMAT).to_string();
    for name in [&first, &second] {
        let name = name.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("k.{today}.")), "got {name}");
    }
}

#[test]
fn allocation_creates_missing_root() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path().join("nested").join("root");
    let path = outdir::allocate("doc.md", &root, false).expect("allocate");
    assert!(path.starts_with(&root));
    assert_eq!(parse("doc.md", &path).seq, 0);
}

#[test]
fn find_latest_with_no_directories_is_not_found() {
    let root = TempDir::new().expect("root");
    let err = outdir::find_latest("k", root.path()).unwrap_err();
    assert!(matches!(err, AllocError::NotFound { .. }), "got: {err}");
}

#[test]
fn find_latest_returns_highest_sequence() {
    let root = TempDir::new().expect("root");
    let _zero = outdir::allocate("k", root.path(), false).expect("zero");
    let one = outdir::allocate("k", root.path(), false).expect("one");
    assert_eq!(outdir::find_latest("k", root.path()).expect("latest"), one);
}

#[test]
fn overwrite_reuses_latest_and_empties_it() {
    let root = TempDir::new().expect("root");
    let latest = outdir::allocate("k", root.path(), false).expect("allocate");
    std::fs::create_dir_all(latest.join("source")).unwrap();
    std::fs::write(latest.join("source").join("a.md"), "old").unwrap();
    std::fs::write(latest.join(".gitignore"), "*\n").unwrap();

    let reused = outdir::allocate("k", root.path(), true).expect("overwrite");
    assert_eq!(reused, latest);
    assert!(reused.is_dir());
    assert_eq!(std::fs::read_dir(&reused).unwrap().count(), 0);
}

#[test]
fn allocator_never_touches_other_keys() {
    let root = TempDir::new().expect("root");
    let other = outdir::allocate("other", root.path(), false).expect("other");
    std::fs::write(other.join("keep.txt"), "keep").unwrap();

    outdir::allocate("k", root.path(), true).expect("overwrite k");
    assert!(other.join("keep.txt").exists());
}

#[test]
fn exhausted_sequence_space_is_an_error() {
    let root = TempDir::new().expect("root");
    let today = Utc::now().date_naive().format(DATE_FORMAT).to_string();
    let last = format!("k.{today}.{}.{}", outdir::token_for("k"), u32::MAX);
    std::fs::create_dir(root.path().join(&last)).expect("last dir");

    let err = outdir::allocate("k", root.path(), false).unwrap_err();

    assert!(matches!(err, AllocError::Exhausted { ref key, .. } if key == "k"), "got: {err}");
    let names: Vec<_> = std::fs::read_dir(root.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(names, [std::ffi::OsString::from(&last)]);
    // Overwrite still reuses the last directory.
    assert_eq!(outdir::allocate("k", root.path(), true).expect("overwrite"), root.path().join(&last));
}
