use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn make_home() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn write_file(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, body).expect("write file");
}

/// A Claude home with one project directory containing one session, plus the
/// decoded project directory itself so dir-name decoding resolves.
fn create_claude_fixture(home: &Path) -> PathBuf {
    let project = home.join("work").join("demo");
    fs::create_dir_all(&project).expect("create project dir");

    let encoded = project.to_string_lossy().replace('/', "-");
    let session = home
        .join(".claude")
        .join("projects")
        .join(&encoded)
        .join("cafe0001-aaaa-bbbb-cccc-000000000001.jsonl");
    let body = r#"{"type":"user","uuid":"u1","timestamp":"2026-02-14T00:00:01Z","cwd":"/work/demo","message":{"role":"user","content":"fix the login flow"}}
{"type":"assistant","uuid":"a1","parentUuid":"u1","timestamp":"2026-02-14T00:00:02Z","message":{"role":"assistant","model":"test-model","content":[{"type":"text","text":"Done, see the diff."}]}}"#;
    write_file(&session, body);
    session
}

fn run(home: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sessionhub"));
    cmd.args(args)
        .env("HOME", home)
        .env("SESSIONHUB_CLAUDE_DIR", home.join(".claude"))
        .env("SESSIONHUB_CODEX_DIR", home.join(".codex"))
        .env("NO_COLOR", "1");
    cmd.output().expect("run sessionhub")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "command failed\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn sources_lists_discovered_adapters() {
    let home = make_home();
    create_claude_fixture(home.path());

    let out = stdout(&run(home.path(), &["sources"]));
    assert!(out.contains("claude"), "{out}");
    assert!(out.contains("projects: 1"), "{out}");
}

#[test]
fn sources_json_is_machine_readable() {
    let home = make_home();
    create_claude_fixture(home.path());

    let out = stdout(&run(home.path(), &["sources", "--json"]));
    let parsed: Value = serde_json::from_str(&out).expect("valid json");
    let sources = parsed.as_array().expect("array");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["source"], "claude");
    assert_eq!(sources[0]["available"], true);
}

#[test]
fn projects_lists_the_fixture_project() {
    let home = make_home();
    create_claude_fixture(home.path());

    let out = stdout(&run(home.path(), &["projects"]));
    assert!(out.contains("demo"), "{out}");
    assert!(out.contains("1 session(s)"), "{out}");
}

#[test]
fn sessions_resolves_project_by_basename() {
    let home = make_home();
    create_claude_fixture(home.path());

    let out = stdout(&run(home.path(), &["sessions", "demo"]));
    assert!(out.contains("1 session(s)"), "{out}");
    assert!(out.contains("cafe0001"), "{out}");
    assert!(out.contains("fix the login flow"), "{out}");
}

#[test]
fn show_prints_the_transcript() {
    let home = make_home();
    create_claude_fixture(home.path());

    let out = stdout(&run(home.path(), &["show", "cafe0001", "--all"]));
    assert!(out.contains("fix the login flow"), "{out}");
    assert!(out.contains("Done, see the diff."), "{out}");
    assert!(out.contains("test-model"), "{out}");
}

#[test]
fn unknown_session_fails_with_error() {
    let home = make_home();
    create_claude_fixture(home.path());

    let output = run(home.path(), &["show", "doesnotexist"]);
    assert!(!output.status.success());
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("session not found"), "{err}");
}

#[test]
fn delete_removes_the_transcript_with_force() {
    let home = make_home();
    let session = create_claude_fixture(home.path());
    assert!(session.exists());

    stdout(&run(home.path(), &["delete", "cafe0001", "--force"]));
    assert!(!session.exists());
}
