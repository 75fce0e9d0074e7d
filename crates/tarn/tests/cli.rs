use std::path::PathBuf;
use std::process::{Command, Output};

fn tarn_bin() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_tarn") {
        return PathBuf::from(path);
    }

    let mut exe = std::env::current_exe().expect("test executable path should be known");
    exe.pop();
    if exe.file_name().and_then(|name| name.to_str()) == Some("deps") {
        exe.pop();
    }
    exe.join("tarn")
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn tarn(args: &[&str], module: &str) -> Output {
    Command::new(tarn_bin())
        .arg(args[0])
        .arg(fixture(module))
        .args(&args[1..])
        .output()
        .expect("tarn should execute")
}

#[test]
fn check_reports_mismatch_and_fails() {
    let output = tarn(&["check"], "mismatch.json");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains(
            "error[E0614]: cannot convert value of type `String` to specified type `Int`\n  --> main:1:18"
        ),
        "unexpected stdout: {stdout}"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 error(s)"), "unexpected stderr: {stderr}");
}

#[test]
fn check_clean_module_succeeds_silently() {
    let output = tarn(&["check"], "clean.json");

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn check_with_stats_and_trace_prints_json() {
    let output = tarn(&["check", "--stats", "--trace"], "clean.json");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"evaluator\""), "unexpected stdout: {stdout}");
    assert!(stdout.contains("\"solver\""), "unexpected stdout: {stdout}");
    assert!(stdout.contains("\"action\": \"generate\""), "unexpected stdout: {stdout}");
}

#[test]
fn usr_prints_symbol_reference() {
    let output = tarn(&["usr", "total"], "clean.json");

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "s:4main5totalv\n");
}

#[test]
fn usr_of_unknown_name_fails() {
    let output = tarn(&["usr", "missing"], "clean.json");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no declaration named `missing`"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn unreadable_module_is_reported() {
    let output = Command::new(tarn_bin())
        .args(["check", "does-not-exist.json"])
        .output()
        .expect("tarn should execute");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read `does-not-exist.json`"));
}
