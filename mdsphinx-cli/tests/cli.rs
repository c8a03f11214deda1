use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use predicates::str::contains;

/// `mdsphinx` with its configuration root and home inside `tmp`.
fn mdsphinx_cmd(tmp: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mdsphinx"));
    cmd.env("MDSPHINX_CONFIG_ROOT", tmp.join("config"))
        .env("HOME", tmp.join("home"))
        .env("USERPROFILE", tmp.join("home"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .current_dir(tmp);
    cmd
}

fn job_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)
        .expect("read tmp root")
        .map(|e| e.expect("entry").path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

#[test]
fn env_add_list_and_del() {
    let tmp = TempDir::new().unwrap();
    let venv = tmp.child("venvs/docs");
    venv.create_dir_all().unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["env", "add", "--name", "docs", "--path"])
        .arg(venv.path())
        .assert()
        .success()
        .stdout(contains("Registered docs"));

    tmp.child("config/registry.yaml").assert(contains("docs"));

    mdsphinx_cmd(tmp.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(contains("docs").and(contains(venv.path().display().to_string())).and(contains("yes")));

    mdsphinx_cmd(tmp.path())
        .args(["env", "del", "--name", "docs"])
        .assert()
        .success();

    // Deleting again is a warning, not a failure.
    mdsphinx_cmd(tmp.path())
        .args(["env", "del", "--name", "docs"])
        .assert()
        .success()
        .stderr(contains("environment not found"));

    mdsphinx_cmd(tmp.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(contains("docs").not())
        .stderr(contains("no environments found"));
}

#[test]
fn env_list_marks_missing_directories() {
    let tmp = TempDir::new().unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["env", "add", "--name", "gone", "--path"])
        .arg(tmp.child("nowhere").path())
        .assert()
        .success();

    mdsphinx_cmd(tmp.path())
        .args(["env", "list"])
        .assert()
        .success()
        .stdout(contains("gone").and(contains("no")));
}

#[test]
fn env_remove_missing_environment_fails() {
    let tmp = TempDir::new().unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["env", "remove", "--name", "ghost", "--no-prompt"])
        .assert()
        .failure()
        .stderr(contains("environment 'ghost' not found"));
}

#[test]
fn prepare_renders_into_fresh_job_directory() {
    let tmp = TempDir::new().unwrap();
    tmp.child("docs/index.md").write_str("# {{ title }}\n").unwrap();
    tmp.child("context.yml").write_str("title: Handbook\n").unwrap();
    tmp.child("docs/logo.png").write_binary(b"png").unwrap();

    for _ in 0..2 {
        mdsphinx_cmd(tmp.path())
            .args(["prepare", "docs", "--tmp-root", "jobs"])
            .assert()
            .success()
            .stdout(contains("Prepared"));
    }

    let jobs = job_dirs(tmp.child("jobs").path());
    assert_eq!(jobs.len(), 2, "{jobs:?}");
    for job in &jobs {
        let name = job.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("docs."), "{name}");
        assert_eq!(fs::read_to_string(job.join("source/index.md")).unwrap(), "# Handbook\n");
        assert!(job.join("source/logo.png").is_file());
        assert_eq!(fs::read_to_string(job.join(".gitignore")).unwrap(), "*\n");
    }
}

#[test]
fn prepare_with_explicit_context_and_overwrite() {
    let tmp = TempDir::new().unwrap();
    tmp.child("docs/index.md").write_str("{{ who }}").unwrap();
    tmp.child("vars.json").write_str(r#"{"who": "world"}"#).unwrap();

    for _ in 0..2 {
        mdsphinx_cmd(tmp.path())
            .args(["prepare", "docs", "--context", "vars.json", "--tmp-root", "jobs", "--overwrite"])
            .assert()
            .success();
    }

    let jobs = job_dirs(tmp.child("jobs").path());
    assert_eq!(jobs.len(), 1, "{jobs:?}");
    assert_eq!(fs::read_to_string(jobs[0].join("source/index.md")).unwrap(), "world");
}

#[test]
fn prepare_undefined_variable_fails() {
    let tmp = TempDir::new().unwrap();
    tmp.child("docs/index.md").write_str("{{ nope }}").unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["prepare", "docs", "--tmp-root", "jobs"])
        .assert()
        .failure()
        .stderr(contains("nope"));
}

#[test]
fn prepare_missing_input_fails() {
    let tmp = TempDir::new().unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["prepare", "missing.md", "--tmp-root", "jobs"])
        .assert()
        .failure()
        .stderr(contains("not found"));

    tmp.child("jobs").assert(predicate::path::missing());
}

#[test]
fn process_single_pdf_is_rejected_before_any_work() {
    let tmp = TempDir::new().unwrap();
    tmp.child("docs/index.md").write_str("# hi").unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["process", "docs", "--to", "pdf", "--using", "single", "--tmp-root", "jobs"])
        .assert()
        .failure()
        .stderr(contains("no 'single' builder for pdf output"));

    tmp.child("jobs").assert(predicate::path::missing());
}

#[test]
fn process_unknown_format_is_a_usage_error() {
    let tmp = TempDir::new().unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["process", "docs", "--to", "docx"])
        .assert()
        .code(2)
        .stderr(contains("unknown output format 'docx'"));
}

#[test]
fn process_with_unregistered_environment_fails() {
    let tmp = TempDir::new().unwrap();
    tmp.child("docs/index.md").write_str("# hi").unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["process", "docs", "--to", "html", "--env-name", "ghost", "--tmp-root", "jobs"])
        .assert()
        .failure()
        .stderr(contains("environment 'ghost' not found in registry"));
}

#[test]
fn config_root_that_is_a_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    tmp.child("config").write_str("not a dir").unwrap();

    mdsphinx_cmd(tmp.path())
        .args(["env", "list"])
        .assert()
        .failure()
        .stderr(contains("is not a directory"));
}
