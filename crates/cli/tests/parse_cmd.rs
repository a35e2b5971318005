//! CLI tests for `parse`, `check` and `unparse`: stdin input, custom
//! grammars, severity filtering and exit codes.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use assert_cmd::cargo;

const SAMPLE: &str = "[b]bold[/b] and [url=https://example.com/]a link[/url]\n";

const LOOSE_GRAMMAR: &str = r#"{
    // Only [x] is known; its attribute rejects everything but digits.
    "tags": { "X": { "attributes": { "n": { "filter": "uint" } } } },
    "passes": [{ "name": "bbcodes", "type": "bracket", "bbcodes": { "x": {} } }]
}"#;

fn tagweave_cmd() -> Command {
    Command::new(cargo::cargo_bin!("tagweave"))
}

fn write_temp(name: &str, content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write temp file");
    (dir, path.to_string_lossy().to_string())
}

fn run_with_stdin(args: &[&str], stdin_body: &str) -> std::process::Output {
    let mut child = tagweave_cmd()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tagweave command");

    {
        let stdin = child.stdin.as_mut().expect("stdin handle");
        stdin
            .write_all(stdin_body.as_bytes())
            .expect("write stdin body");
    }

    child.wait_with_output().expect("wait for output")
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid json ({e}): {stdout}"))
}

#[test]
fn parse_supports_stdin_dash_path() {
    let output = run_with_stdin(&["parse", "-", "--output", "json"], SAMPLE);
    assert!(
        output.status.success(),
        "parse stdin should succeed, stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = stdout_json(&output);
    let xml = json["xml"].as_str().expect("xml string");
    assert!(xml.starts_with("<rt><B><st>[b]</st>bold<et>[/b]</et></B>"), "{xml}");
    assert_eq!(json["tags"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["log"], serde_json::json!([]));
}

#[test]
fn parse_pretty_prints_xml_to_stdout() {
    let (_dir, path) = write_temp("post.txt", "[i]hi[/i]");
    let output = tagweave_cmd()
        .args(["parse", &path, "--output", "pretty"])
        .output()
        .expect("run parse");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "<rt><I><st>[i]</st>hi<et>[/i]</et></I></rt>\n"
    );
}

#[test]
fn parse_with_custom_grammar_file() {
    let (_dir, grammar) = write_temp("loose.jsonc", LOOSE_GRAMMAR);
    let output = run_with_stdin(
        &["parse", "-", "--grammar", &grammar, "--output", "json"],
        "[x n=7 /] [b]not a tag[/b]",
    );
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(
        json["xml"],
        "<rt><X n=\"7\">[x n=7 /]</X> [b]not a tag[/b]</rt>"
    );
}

#[test]
fn min_severity_filters_log_entries() {
    let text = "[b]unclosed";
    let output = run_with_stdin(&["parse", "-", "--output", "json"], text);
    assert_eq!(stdout_json(&output)["log"], serde_json::json!([]));

    let output = run_with_stdin(
        &["parse", "-", "--output", "json", "--min-severity", "debug"],
        text,
    );
    let json = stdout_json(&output);
    assert_eq!(json["log"][0]["id"], "TW3007");
    assert_eq!(json["log"][0]["pos"], text.len());
}

#[test]
fn invalid_grammar_is_reported() {
    let (_dir, grammar) = write_temp("bad.jsonc", r#"{ "tags": { "B": { "rules": { "deny": ["NOPE"] } } } }"#);
    let output = run_with_stdin(&["parse", "-", "--grammar", &grammar], "x");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid grammar"), "stderr={stderr}");
}

#[test]
fn check_exits_nonzero_on_errors() {
    let output = run_with_stdin(
        &["check", "-", "--output", "json"],
        "[color=red;x]x[/color]",
    );
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["log"][0]["id"], "TW4001");
    assert_eq!(json["log"][0]["severity"], "error");
}

#[test]
fn check_passes_clean_input() {
    let output = run_with_stdin(&["check", "-", "--output", "pretty"], SAMPLE);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("check ok"));
}

#[test]
fn lint_alias_is_available() {
    let output = tagweave_cmd()
        .args(["lint", "--help"])
        .output()
        .expect("run lint help");
    assert!(output.status.success());
}

#[test]
fn unparse_restores_parsed_text() {
    let parsed = run_with_stdin(&["parse", "-", "--output", "pretty"], SAMPLE);
    assert!(parsed.status.success());
    let xml = String::from_utf8_lossy(&parsed.stdout).to_string();

    let (_dir, path) = write_temp("post.xml", &xml);
    let output = tagweave_cmd()
        .args(["unparse", &path])
        .output()
        .expect("run unparse");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), SAMPLE);
}

#[test]
fn missing_input_file_fails() {
    let output = tagweave_cmd()
        .args(["parse", "/nonexistent/post.txt"])
        .output()
        .expect("run parse");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read"));
}
