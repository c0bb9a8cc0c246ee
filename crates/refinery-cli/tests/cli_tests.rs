//! CLI integration tests.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use refinery_model::BUNDLED_DATA;
use tempfile::TempDir;

fn refinery() -> Command {
    cargo_bin_cmd!("refinery")
}

fn solve_json(args: &[&str]) -> serde_json::Value {
    let output = refinery()
        .args(["solve", "--format", "json"])
        .args(args)
        .output()
        .expect("run refinery");
    serde_json::from_slice(&output.stdout).expect("solve output is JSON")
}

#[test]
fn test_help() {
    refinery()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("solve"))
        .stdout(predicate::str::contains("formulation"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_solve_default_data() {
    refinery()
        .arg("solve")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: OPTIMAL"))
        .stdout(predicate::str::contains("Total profit: 2113"))
        .stdout(predicate::str::contains("Refinery Output"))
        .stdout(predicate::str::contains("Constraint Slack"))
        .stdout(predicate::str::contains("█"));
}

#[test]
fn test_exhausted_time_limit_fails() {
    refinery()
        .args(["solve", "--time-limit", "0.000000001"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Status: OPTIMAL").not())
        .stdout(predicate::str::contains("No optimal solution found!"));
}

#[test]
fn test_oversized_time_limit_rejected() {
    refinery()
        .args(["solve", "--time-limit", "1e20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid time limit"));
}

#[test]
fn test_solve_json() {
    let report = solve_json(&[]);

    assert_eq!(report["status"], "Optimal");
    assert!(report["profit"].as_f64().unwrap() > 0.0);
    assert!(!report["materials"].as_array().unwrap().is_empty());
}

#[test]
fn test_inverted_lube_bounds_reported_as_infeasible() {
    refinery()
        .args(["solve", "--min-lube-oil", "1500", "--max-lube-oil", "1000"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Status: INFEASIBLE"))
        .stdout(predicate::str::contains("No optimal solution found!"))
        .stdout(predicate::str::contains("LubeOil"));
}

#[test]
fn test_less_crude_never_more_profit() {
    let base = solve_json(&[])["profit"].as_f64().unwrap();
    let tight = solve_json(&["--max-crude", "CrudeOil2=10000"])["profit"]
        .as_f64()
        .unwrap();

    assert!(tight <= base + 1e-6, "tight {} > base {}", tight, base);
}

#[test]
fn test_params_file_and_flags() {
    let dir = TempDir::new().unwrap();
    let params = dir.path().join("params.toml");
    fs::write(&params, "max_distillation = 30000\nmax_cracking = 5000\n").unwrap();

    let from_file = solve_json(&["--params", params.to_str().unwrap()]);
    assert_eq!(from_file["parameters"]["maxDistillation"], 30000.0);
    assert_eq!(from_file["parameters"]["maxCracking"], 5000.0);

    let with_flag = solve_json(&["--params", params.to_str().unwrap(), "--max-cracking", "6000"]);
    assert_eq!(with_flag["parameters"]["maxDistillation"], 30000.0);
    assert_eq!(with_flag["parameters"]["maxCracking"], 6000.0);
}

#[test]
fn test_unknown_crude_flag_fails() {
    refinery()
        .args(["solve", "--max-crude", "CrudeOil9=100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown material CrudeOil9"));
}

#[test]
fn test_check_malformed_data() {
    let mut json: serde_json::Value = serde_json::from_str(BUNDLED_DATA).unwrap();
    json["productProfit"].as_object_mut().unwrap().remove("JetFuel");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("refinery.json");
    fs::write(&path, json.to_string()).unwrap();

    refinery()
        .args(["check", "--data"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing productProfit entry for JetFuel"));
}

#[test]
fn test_check_missing_file() {
    refinery()
        .args(["check", "--data", "/nonexistent/refinery.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read /nonexistent/refinery.json"));
}

#[test]
fn test_check_bundled() {
    refinery()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("36 variables"))
        .stdout(predicate::str::contains("29 constraints"));
}

#[test]
fn test_formulation_listing() {
    refinery()
        .arg("formulation")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Maximize"))
        .stdout(predicate::str::contains("octane_PremiumPetrol:"))
        .stdout(predicate::str::contains("pressure_JetFuel:"))
        .stdout(predicate::str::contains("0 <= CrudeOil1 <= 20000"));
}

#[test]
fn test_data_tables() {
    refinery()
        .arg("data")
        .assert()
        .success()
        .stdout(predicate::str::contains("Final Products & Profits"))
        .stdout(predicate::str::contains("Max Naphtha Reforming"));
}
