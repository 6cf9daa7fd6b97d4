//! 命令行集成测试

use std::fs;

use assert_cmd::Command;
use tempfile::TempDir;

const SAMPLE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>گفتگو</title></head>\
<body><p>سلام دنیا، این یک متن فارسی است</p><p>Hello World from the assistant</p></body></html>";

fn ai_rtl() -> Command {
    let mut cmd = Command::cargo_bin("ai-rtl").expect("二进制应已构建");
    for name in ["AI_RTL_SENSITIVITY", "AI_RTL_FONT", "AI_RTL_CONFIG", "RUST_LOG"] {
        cmd.env_remove(name);
    }
    cmd
}

#[test]
fn test_classify_prints_language() {
    let output = ai_rtl().args(["classify", "سلام دنیا"]).output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "persian");

    let output = ai_rtl()
        .args(["classify", "Hello World", "--sensitivity", "low"])
        .output()
        .unwrap();
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "english");
}

#[test]
fn test_annotate_to_stdout() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("chat.html");
    fs::write(&input, SAMPLE).unwrap();

    let output = ai_rtl().arg("annotate").arg(&input).output().unwrap();
    assert!(output.status.success());
    let html = String::from_utf8(output.stdout).unwrap();
    assert!(html.contains("data-ai-rtl-persian-text=\"true\""));
    assert!(html.contains("data-ai-rtl-english-text=\"true\""));
    assert!(!html.contains("data-ai-rtl-engine"));
}

#[test]
fn test_annotate_to_title_path() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("chat.html");
    fs::write(&input, SAMPLE).unwrap();
    let template = dir.path().join("out").join("%title%.html");

    ai_rtl()
        .arg("annotate")
        .arg(&input)
        .arg("-o")
        .arg(&template)
        .args(["--font", "shabnam", "--url", "https://example.com/chat"])
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("out").join("گفتگو.html")).unwrap();
    assert!(written.contains("Shabnam"));
    assert!(written.contains("data-ai-rtl-persian-text"));
}

#[test]
fn test_errors_exit_with_one() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.html");

    let output = ai_rtl().arg("annotate").arg(&missing).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr).unwrap().contains("Error:"));

    let input = dir.path().join("chat.html");
    fs::write(&input, SAMPLE).unwrap();
    let output = ai_rtl()
        .arg("annotate")
        .arg(&input)
        .args(["--url", "not a url"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_rejects_unknown_sensitivity() {
    ai_rtl()
        .args(["classify", "text", "--sensitivity", "extreme"])
        .assert()
        .failure();
}
