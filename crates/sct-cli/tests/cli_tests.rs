//! Integration tests for the SCT CLI
//!
//! These tests invoke the actual `sct` binary and verify:
//! - Exit codes (0 = success, 1 = validation/transaction failure, 2 = error)
//! - stdout/stderr output
//! - JSON output format

use std::path::PathBuf;
use std::process::Command;

// ── Helpers ───────────────────────────────────────────────

const VAULT_ADDRESS: &str = "f9bd70e229c1d7b39feaa234d8058e74348c04f8";

fn sct_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sct"))
}

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .to_str()
        .unwrap()
        .to_string()
}

fn run_sct(args: &[&str]) -> std::process::Output {
    Command::new(sct_bin())
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute sct")
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("should be valid JSON")
}

// ── Version ───────────────────────────────────────────────

#[test]
fn test_version_command() {
    let output = run_sct(&["version"]);
    assert!(output.status.success(), "version should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sct"), "should contain 'sct'");
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")), "should contain version");
    assert!(
        stdout.contains(&format!("(sct-core {})", sct_core::VERSION)),
        "should report the core library version"
    );
}

#[test]
fn test_version_flag() {
    let output = run_sct(&["--version"]);
    assert!(output.status.success(), "--version should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")), "should contain version");
}

// ── Validate ──────────────────────────────────────────────

#[test]
fn test_validate_valid_module() {
    let output = run_sct(&["validate", &fixture("valid/counter.json")]);
    assert!(output.status.success(), "valid module should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("valid"), "should mention valid");
    assert!(stdout.contains("counter.json"), "header should name the file");
}

#[test]
fn test_validate_nondeterministic_module() {
    let output = run_sct(&["validate", &fixture("invalid/clock.json")]);
    assert_eq!(output.status.code(), Some(1), "invalid module should exit 1");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("determinism"), "should name the failed rule");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"), "should mention error");
}

#[test]
fn test_validate_undecodable_file() {
    let output = run_sct(&["validate", &fixture("invalid/garbage.txt")]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAILED"), "decode section should fail");
    assert!(stdout.contains("skipped"), "validators should be skipped");
}

#[test]
fn test_validate_nonexistent_file() {
    let output = run_sct(&["validate", "nonexistent.json"]);
    assert_eq!(output.status.code(), Some(2), "missing file should exit 2");
}

#[test]
fn test_validate_requires_files() {
    let output = run_sct(&["validate"]);
    assert!(!output.status.success());
}

#[test]
fn test_validate_json_output() {
    let output = run_sct(&["validate", "--json", &fixture("valid/counter.json")]);
    assert!(output.status.success(), "valid module --json should exit 0");
    let json = stdout_json(&output);
    assert_eq!(json["valid"], true);
    assert_eq!(json["errors"], 0);
    assert_eq!(json["files"][0]["decoded"], true);
}

#[test]
fn test_validate_json_invalid() {
    let output = run_sct(&["validate", "--json", &fixture("invalid/no-base-type.json")]);
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["valid"], false);
    let rules: Vec<&str> = json["files"][0]["format_errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["rule"].as_str().unwrap())
        .collect();
    assert!(rules.contains(&"base-type"));
    assert!(rules.contains(&"jump-target"));
}

#[test]
fn test_validate_multiple_files_reports_each() {
    let output = run_sct(&[
        "validate",
        &fixture("valid/counter.json"),
        &fixture("valid/vault.json"),
        &fixture("invalid/clock.json"),
    ]);
    assert_eq!(output.status.code(), Some(1), "one invalid file fails the run");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("counter.json"));
    assert!(stdout.contains("vault.json"));
    assert!(stdout.contains("clock.json"));
}

#[test]
fn test_validate_showbytes() {
    let output = run_sct(&["validate", "--showbytes", &fixture("valid/counter.json")]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Bytecode"), "should render bytecode section");
    assert!(stdout.contains("5343544d"), "bytes start with the module magic");
}

#[test]
fn test_validate_quiet_valid() {
    let output = run_sct(&["--quiet", "validate", &fixture("valid/counter.json")]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.is_empty(), "quiet mode should produce no stdout");
}

// ── Address ───────────────────────────────────────────────

#[test]
fn test_address_derivation() {
    let output = run_sct(&[
        "address",
        "--sender",
        "0x1111111111111111111111111111111111111111",
        "--tx",
        "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        "--nvout",
        "0",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), VAULT_ADDRESS);
}

#[test]
fn test_address_depends_on_output_index() {
    let args = |nvout: &'static str| {
        run_sct(&[
            "address",
            "--sender",
            "1111111111111111111111111111111111111111",
            "--tx",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "--nvout",
            nvout,
        ])
    };
    let first = String::from_utf8_lossy(&args("0").stdout).to_string();
    let second = String::from_utf8_lossy(&args("1").stdout).to_string();
    assert_ne!(first, second);
}

#[test]
fn test_address_rejects_bad_hex() {
    let output = run_sct(&["address", "--sender", "xyz", "--tx", "00"]);
    assert!(!output.status.success());
}

// ── Run ───────────────────────────────────────────────────

#[test]
fn test_run_block_text_output() {
    let output = run_sct(&["run", &fixture("blocks/transfer.json")]);
    assert!(output.status.success(), "block should run cleanly");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Block #42: 3 transaction(s)"));
    assert!(stdout.contains(VAULT_ADDRESS), "create should report the contract");
    assert!(stdout.contains("returned 300"), "Pay returns the remaining balance");
    assert!(stdout.contains("Total gas"));
}

#[test]
fn test_run_block_json_output() {
    let output = run_sct(&["run", "--json", &fixture("blocks/transfer.json")]);
    assert!(output.status.success());
    let json = stdout_json(&output);

    let receipts = json["receipts"].as_array().unwrap();
    assert_eq!(receipts.len(), 3);
    assert!(receipts.iter().all(|r| r["status"] == "success"));
    assert_eq!(receipts[0]["result"]["new_contract_address"], VAULT_ADDRESS);
    assert_eq!(receipts[2]["result"]["transfers"][0]["value"], 200);

    let condensing = json["condensing_transactions"].as_array().unwrap();
    assert_eq!(condensing.len(), 2, "deposit and payment each condense");
    let payment = &condensing[1]["transaction"];
    assert_eq!(payment["inputs"][0]["value"], 500);
    assert_eq!(payment["outputs"][0]["address"], "2222222222222222222222222222222222222222");
    assert_eq!(payment["outputs"][0]["value"], 200);
    assert_eq!(payment["outputs"][1]["value"], 300);

    let vault = &json["state"]["accounts"][VAULT_ADDRESS];
    assert_eq!(vault["unspent"]["value"], 300);
    assert_eq!(vault["unspent"]["hash"], condensing[1]["id"]);
    assert_eq!(vault["unspent"]["nvout"], 1);
}

#[test]
fn test_run_block_is_deterministic() {
    let path = fixture("blocks/transfer.json");
    let first = run_sct(&["run", "--json", &path]);
    for i in 0..10 {
        let output = run_sct(&["run", "--json", &path]);
        assert_eq!(first.stdout, output.stdout, "run --json determinism failure at iteration {}", i);
    }
}

#[test]
fn test_run_missing_code_exits_1() {
    let output = run_sct(&["run", "--json", &fixture("blocks/missing-code.json")]);
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["receipts"][0]["status"], "error");
    assert_eq!(json["receipts"][0]["kind"], "NoCodeAtAddress");
}

#[test]
fn test_run_nonexistent_fixture() {
    let output = run_sct(&["run", "nonexistent.json"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_run_rejects_invalid_config() {
    let output = run_sct(&[
        "run",
        "--config",
        &fixture("zero-step-config.json"),
        &fixture("blocks/transfer.json"),
    ]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("step"), "should name the bad setting");
}

#[test]
fn test_run_with_config_changes_gas() {
    let default = stdout_json(&run_sct(&["run", "--json", &fixture("blocks/transfer.json")]));
    let cheap = stdout_json(&run_sct(&[
        "run",
        "--json",
        "--config",
        &fixture("cheap-config.json"),
        &fixture("blocks/transfer.json"),
    ]));
    assert!(cheap["total_gas"].as_u64().unwrap() < default["total_gas"].as_u64().unwrap());
}

#[test]
fn test_run_quiet() {
    let output = run_sct(&["--quiet", "run", &fixture("blocks/transfer.json")]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}
