use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const BOOK: &str = "书名：长夜\n作者：无名\n\n第1章 开端\n林老师来了。\n第2章 结局\n林老师走了。\n";

struct Fixture {
    dir: TempDir,
    config: PathBuf,
    book: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "[search]\ncontext_length = 20\n").unwrap();
    let book = dir.path().join("changye.txt");
    fs::write(&book, BOOK).unwrap();
    Fixture { dir, config, book }
}

fn novelscan(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("novelscan").unwrap();
    cmd.env("NO_COLOR", "1").arg("--config").arg(config);
    cmd
}

#[test]
fn import_prints_summary() {
    let f = fixture();
    novelscan(&f.config)
        .arg("import")
        .arg(&f.book)
        .assert()
        .success()
        .stdout(predicate::str::contains("Title: 长夜"))
        .stdout(predicate::str::contains("Author: 无名"))
        .stdout(predicate::str::contains("2 chapters"));
}

#[test]
fn import_json_has_metadata() {
    let f = fixture();
    let output = novelscan(&f.config)
        .args(["import", "--format", "json"])
        .arg(&f.book)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["title"], "长夜");
    assert_eq!(value["metadata"]["encoding"], "UTF-8");
    assert_eq!(value["metadata"]["totalChapters"], 2);
    assert_eq!(value["chapters"][1]["title"], "第2章 结局");
}

#[test]
fn chapters_lists_titles() {
    let f = fixture();
    novelscan(&f.config)
        .arg("chapters")
        .arg(&f.book)
        .assert()
        .success()
        .stdout(predicate::str::contains("第1章 开端").and(predicate::str::contains("第2章 结局")));
}

#[test]
fn preview_shows_heading_style() {
    let f = fixture();
    novelscan(&f.config)
        .arg("preview")
        .arg(&f.book)
        .assert()
        .success()
        .stdout(predicate::str::contains("Estimated chapters: 2"))
        .stdout(predicate::str::contains("arabic_zhang"));
}

#[test]
fn search_json_totals() {
    let f = fixture();
    let output = novelscan(&f.config)
        .args(["search", "林老师"])
        .arg(&f.book)
        .args(["--mode", "detailed", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["mode"], "detailed");
    assert_eq!(value["totalMatches"], 2);
    assert_eq!(value["totalChaptersWithMatches"], 2);
    assert_eq!(value["results"][0]["chapters"][0]["matches"][0]["lineNumber"], 5);
}

#[test]
fn search_text_without_matches() {
    let f = fixture();
    novelscan(&f.config)
        .args(["search", "不存在的词"])
        .arg(&f.book)
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches found"));
}

#[test]
fn search_with_metrics() {
    let f = fixture();
    novelscan(&f.config)
        .args(["search", "林老师", "--metrics"])
        .arg(&f.book)
        .assert()
        .success()
        .stdout(predicate::str::contains("matches_found 2"));
}

#[test]
fn invalid_regex_is_reported_per_book() {
    let f = fixture();
    novelscan(&f.config)
        .args(["search", "林(", "--regex"])
        .arg(&f.book)
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid search pattern"));
}

#[test]
fn missing_file_fails() {
    let f = fixture();
    novelscan(&f.config)
        .arg("import")
        .arg(f.dir.path().join("nope.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.txt"));
}

#[test]
fn log_file_receives_records() {
    let f = fixture();
    let log = f.dir.path().join("logs/novelscan.log");
    novelscan(&f.config)
        .arg("--log")
        .arg(&log)
        .arg("import")
        .arg(&f.book)
        .assert()
        .success();
    let contents = fs::read_to_string(&log).unwrap();
    assert!(contents.contains("[INFO]"));
    assert!(contents.contains("Imported '长夜'"));
}

#[test]
fn completions_for_bash() {
    let f = fixture();
    novelscan(&f.config)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("novelscan"));
}

#[test]
fn search_without_context_prints_line_numbers() {
    let f = fixture();
    novelscan(&f.config)
        .args(["search", "林老师", "--no-context"])
        .arg(&f.book)
        .assert()
        .success()
        .stdout(predicate::str::contains("line "))
        .stdout(predicate::str::contains("来了").not());
}
