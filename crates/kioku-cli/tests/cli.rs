//! CLI integration tests. A stub analyzer script stands in for mecab: it
//! answers every input line with a single token spanning the whole line.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn kioku() -> Command {
    #[allow(deprecated)]
    let cmd = Command::cargo_bin("kioku").unwrap();
    cmd
}

fn write_stub_analyzer(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("stub-analyzer.sh");
    std::fs::write(
        &path,
        "#!/bin/sh\n\
         while IFS= read -r line; do\n\
           printf '%s\\t名詞,一般,*,*,*,*,*,*\\nEOS\\n' \"$line\"\n\
         done\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    path
}

/// Empty file: SQLite treats it as a valid empty database.
fn write_empty_dictionary(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("dictionary.sqlite");
    std::fs::File::create(&path).unwrap();
    path
}

fn build_corpus(dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("corpus.tsv");
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn build_database(dir: &TempDir, corpus_lines: &[&str]) -> PathBuf {
    let corpus = build_corpus(dir, corpus_lines);
    let stub = write_stub_analyzer(dir);
    let database = dir.path().join("sentences.sqlite");
    kioku()
        .args(["build-database", "--database"])
        .arg(&database)
        .arg("--sentence-table")
        .arg(&corpus)
        .arg("--analyzer")
        .arg(&stub)
        .assert()
        .success();
    database
}

#[test]
fn build_database_reports_counts() {
    let dir = TempDir::new().unwrap();
    let corpus = build_corpus(
        &dir,
        &[
            "tatoeba\t1\t\t\t\t猫が鳴く",
            "tatoeba\t2\t\t\t\t犬も鳴く",
        ],
    );
    let stub = write_stub_analyzer(&dir);
    let database = dir.path().join("sentences.sqlite");

    kioku()
        .args(["build-database", "--database"])
        .arg(&database)
        .arg("--sentence-table")
        .arg(&corpus)
        .arg("--analyzer")
        .arg(&stub)
        .assert()
        .success()
        .stdout(predicate::str::contains("sentences: 2 (0 skipped)"))
        .stdout(predicate::str::contains("lemma: 2 atoms"))
        .stdout(predicate::str::contains("grapheme:"));

    // Re-running the same build is a no-op: every sentence is a duplicate.
    kioku()
        .args(["build-database", "--database"])
        .arg(&database)
        .arg("--sentence-table")
        .arg(&corpus)
        .arg("--analyzer")
        .arg(&stub)
        .assert()
        .success()
        .stdout(predicate::str::contains("sentences: 0 (0 skipped)"))
        .stdout(predicate::str::contains("lemma: 2 atoms"));
}

#[test]
fn build_database_skips_malformed_lines() {
    let dir = TempDir::new().unwrap();
    let corpus = build_corpus(
        &dir,
        &["tatoeba\t1\t\t\t\t猫が鳴く", "not-enough-columns"],
    );
    let stub = write_stub_analyzer(&dir);
    let database = dir.path().join("sentences.sqlite");

    kioku()
        .args(["build-database", "--database"])
        .arg(&database)
        .arg("--sentence-table")
        .arg(&corpus)
        .arg("--analyzer")
        .arg(&stub)
        .assert()
        .success()
        .stdout(predicate::str::contains("sentences: 1 (1 skipped)"));
}

#[test]
fn build_database_fails_without_corpus() {
    let dir = TempDir::new().unwrap();
    let stub = write_stub_analyzer(&dir);
    kioku()
        .args(["build-database", "--database"])
        .arg(dir.path().join("sentences.sqlite"))
        .arg("--sentence-table")
        .arg(dir.path().join("missing.tsv"))
        .arg("--analyzer")
        .arg(&stub)
        .assert()
        .failure()
        .stderr(predicate::str::contains("sentence table"));
}

/// A zero-second budget presents nothing but still renders the summary.
#[test]
fn review_zero_budget_renders_summary() {
    let dir = TempDir::new().unwrap();
    let database = build_database(&dir, &["tatoeba\t1\t\t\t\t猫が鳴く"]);

    kioku()
        .args(["review", "--database"])
        .arg(&database)
        .args(["--review-time-seconds", "0", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("session: 0 presented, 0 remembered"))
        .stdout(predicate::str::contains("next review:"));
}

#[test]
fn review_on_empty_database() {
    let dir = TempDir::new().unwrap();
    kioku()
        .args(["review", "--database"])
        .arg(dir.path().join("fresh.sqlite"))
        .args(["--review-time-seconds", "1"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing learned yet"));
}

#[test]
fn recommend_requires_dictionary() {
    let dir = TempDir::new().unwrap();
    let database = build_database(&dir, &["tatoeba\t1\t\t\t\t猫が鳴く"]);

    kioku()
        .args(["recommend-sentence", "--database"])
        .arg(&database)
        .arg("--dictionary-database")
        .arg(dir.path().join("no-such-dictionary.sqlite"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("dictionary database missing"));
}

#[test]
fn recommend_on_empty_store_reports_empty() {
    let dir = TempDir::new().unwrap();
    let database = build_database(&dir, &[]);
    let dictionary = write_empty_dictionary(&dir);

    kioku()
        .args(["recommend-sentence", "--database"])
        .arg(&database)
        .arg("--dictionary-database")
        .arg(&dictionary)
        .assert()
        .success()
        .stdout(predicate::str::contains("no sentence to recommend"));
}

#[test]
fn recommend_emits_json() {
    let dir = TempDir::new().unwrap();
    let database = build_database(&dir, &["tatoeba\t1\t\t\t\t猫が鳴く"]);
    let dictionary = write_empty_dictionary(&dir);

    let output = kioku()
        .args(["recommend-sentence", "--json", "--database"])
        .arg(&database)
        .arg("--dictionary-database")
        .arg(&dictionary)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["sentence"]["text"], "猫が鳴く");
    assert_eq!(value["sentence"]["sourceDatabase"], "tatoeba");
    assert!(value["atoms"].as_array().unwrap().len() >= 2);
    assert_eq!(value["groupSize"], 1);
}

#[test]
fn recommend_plain_output_lists_breakdown() {
    let dir = TempDir::new().unwrap();
    let database = build_database(&dir, &["tatoeba\t1\t\t\t\t猫が鳴く"]);
    let dictionary = write_empty_dictionary(&dir);

    kioku()
        .args(["recommend-sentence", "--database"])
        .arg(&database)
        .arg("--dictionary-database")
        .arg(&dictionary)
        .assert()
        .success()
        .stdout(predicate::str::contains("猫が鳴く"))
        .stdout(predicate::str::contains("lemma"))
        .stdout(predicate::str::contains("[unseen]"));
}
