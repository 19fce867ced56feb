use assert_cmd::Command;
use predicates::prelude::*;

fn enrich() -> Command {
    let mut cmd = Command::cargo_bin("enrich").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_languages() {
    let mut assert = enrich().args(["translate", "--list-languages"]).assert().success();
    for code in [
        "turkish", "french", "spanish", "german", "italian", "portuguese", "russian", "chinese",
        "japanese", "korean",
    ] {
        assert = assert.stdout(predicate::str::contains(code));
    }
}

#[test]
fn test_unsupported_language_fails_before_work() {
    let dir = tempfile::tempdir().unwrap();
    enrich()
        .current_dir(dir.path())
        .args(["translate", "--language", "klingon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported language: klingon"));

    // Nothing was loaded or written
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_audit_reports_completion() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("video-data.json");
    std::fs::write(
        &input,
        r#"[{"name_video": "Intro", "mp3_content": "Speaker 0: hello\n"}, {"name_video": "Pitching"}]"#,
    )
    .unwrap();

    enrich()
        .arg("audit")
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Index 1: Pitching"))
        .stdout(predicate::str::contains("Completion percentage: 50.00%"));
}

#[test]
fn test_audit_missing_file_fails() {
    enrich()
        .args(["audit", "--input", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load data"));
}
