use std::process::Command;

use conclave::{DEFAULT_CHAIRMAN_MODEL, DEFAULT_COUNCIL_MODELS};

fn conclave_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_conclave"));
    cmd.env_remove("COUNCIL_MODELS").env_remove("CHAIRMAN_MODEL");
    cmd
}

#[test]
fn help_prints_and_exits_cleanly() {
    let output = conclave_cmd().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Multi-model council deliberation CLI"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("models"));
}

#[test]
fn models_lists_env_roster_and_chairman() {
    let output = conclave_cmd()
        .arg("models")
        .env("COUNCIL_MODELS", "m/one, m/two")
        .env("CHAIRMAN_MODEL", "m/chair")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "m/one\nm/two\nchairman: m/chair\n");
}

#[test]
fn models_falls_back_to_builtin_defaults() {
    let output = conclave_cmd().arg("models").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), DEFAULT_COUNCIL_MODELS.len() + 1);
    for (line, model) in lines.iter().zip(DEFAULT_COUNCIL_MODELS) {
        assert_eq!(line, model);
    }
    assert_eq!(
        lines.last().copied().unwrap(),
        format!("chairman: {DEFAULT_CHAIRMAN_MODEL}")
    );
}

#[test]
fn run_without_a_prompt_fails_with_usage_error() {
    let output = conclave_cmd().arg("run").output().unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("run requires --prompt or --prompt-file"));
}
