//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary home directory
//! so the config file and database never touch the user's data.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_tea-progress"))
        .args(args)
        .env("HOME", home)
        .env_remove("TEA_PROGRESS_ENV")
        .env_remove("TEA_PROGRESS_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "command {args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

/// Seeded catalog plus one child; returns the child id.
fn setup(home: &Path) -> i64 {
    let (_, stderr, code) = run_cli(home, &["catalog", "seed"]);
    assert_eq!(code, 0, "seed failed: {stderr}");
    let child = run_json(home, &["child", "create", "Ana"]);
    child["id"].as_i64().unwrap()
}

#[test]
fn test_catalog_seed_is_idempotent() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["catalog", "seed"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("seeded 28 activities"));

    let (stdout, _, code) = run_cli(home.path(), &["catalog", "seed"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("already populated"));

    let colores = run_json(home.path(), &["catalog", "list", "--category", "colores"]);
    assert_eq!(colores.as_array().unwrap().len(), 3);
}

#[test]
fn test_recommend_and_plan() {
    let home = TempDir::new().unwrap();
    let child = setup(home.path()).to_string();

    let recs = run_json(
        home.path(),
        &["session", "recommend", &child, "--category", "numeros", "--limit", "2"],
    );
    let recs = recs.as_array().unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["activity"]["tier"], "inicial");

    let plan = run_json(home.path(), &["session", "plan", &child, "--minutes", "10"]);
    assert!(plan["total_time"].as_u64().unwrap() <= 10);
}

#[test]
fn test_complete_then_stats() {
    let home = TempDir::new().unwrap();
    let child = setup(home.path()).to_string();
    let recs = run_json(home.path(), &["session", "recommend", &child, "--limit", "1"]);
    let activity = recs[0]["activity"]["id"].as_i64().unwrap().to_string();

    let outcome = run_json(
        home.path(),
        &["session", "complete", &child, &activity, "--points", "8"],
    );
    assert_eq!(outcome["attempt"]["attempt_number"], 1);
    assert_eq!(outcome["streak_days"], 1);
    assert!(!outcome["new_achievements"].as_array().unwrap().is_empty());

    let stats = run_json(home.path(), &["progress", "stats", &child]);
    assert_eq!(stats["total_points"], 8);
    assert_eq!(stats["activities_completed"], 1);
    assert_eq!(stats["next_tier"], "basico_1");

    let medals = run_json(home.path(), &["progress", "medals", &child]);
    assert!(!medals.as_array().unwrap().is_empty());
}

#[test]
fn test_initial_tier_locks_after_completion() {
    let home = TempDir::new().unwrap();
    let child = setup(home.path()).to_string();

    let (stdout, _, code) = run_cli(home.path(), &["progress", "set-tier", &child, "basico_2"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("basico_2"));

    let recs = run_json(home.path(), &["session", "recommend", &child, "--limit", "1"]);
    let activity = recs[0]["activity"]["id"].as_i64().unwrap().to_string();
    run_json(home.path(), &["session", "complete", &child, &activity, "--points", "3"]);

    let (_, stderr, code) = run_cli(home.path(), &["progress", "set-tier", &child, "inicial"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_unknown_child_fails() {
    let home = TempDir::new().unwrap();
    setup(home.path());
    let (_, stderr, code) = run_cli(home.path(), &["progress", "stats", "999"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("999"));
}

#[test]
fn test_invalid_arguments_are_rejected() {
    let home = TempDir::new().unwrap();
    let child = setup(home.path()).to_string();

    let (_, _, code) = run_cli(home.path(), &["session", "recommend", &child, "--limit", "0"]);
    assert_ne!(code, 0);
    let (_, _, code) = run_cli(home.path(), &["session", "plan", &child, "--minutes", "500"]);
    assert_ne!(code, 0);
    let (_, _, code) = run_cli(home.path(), &["progress", "set-tier", &child, "maestro"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_get_set() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "planner.default_limit"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "planner.default_limit", "3"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "planner.default_limit"]);
    assert_eq!(stdout.trim(), "3");

    let (_, _, code) = run_cli(home.path(), &["config", "get", "nope"]);
    assert_ne!(code, 0);
}

#[test]
fn test_overview_and_ranking() {
    let home = TempDir::new().unwrap();
    let child = setup(home.path()).to_string();

    let overview = run_json(home.path(), &["progress", "overview", &child]);
    assert_eq!(overview["categories"].as_array().unwrap().len(), 4);

    let ranking = run_json(home.path(), &["progress", "ranking"]);
    assert!(ranking.as_array().unwrap().is_empty());
}

#[test]
fn test_catalog_retire_and_restore() {
    let home = TempDir::new().unwrap();
    let child = setup(home.path()).to_string();
    let colores = run_json(home.path(), &["catalog", "list", "--category", "colores"]);
    let retired = colores[0]["id"].as_i64().unwrap();
    let id = retired.to_string();

    let (stdout, _, code) = run_cli(home.path(), &["catalog", "retire", &id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("retired"));

    let active = run_json(home.path(), &["catalog", "list", "--category", "colores"]);
    assert_eq!(active.as_array().unwrap().len(), 2);
    let all = run_json(home.path(), &["catalog", "list", "--category", "colores", "--all"]);
    assert_eq!(all.as_array().unwrap().len(), 3);

    let recs = run_json(
        home.path(),
        &["session", "recommend", &child, "--category", "colores", "--limit", "5"],
    );
    assert!(recs
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["activity"]["id"].as_i64() != Some(retired)));

    // completions of a retired activity are still accepted
    let outcome = run_json(
        home.path(),
        &["session", "complete", &child, &id, "--points", "4"],
    );
    assert_eq!(outcome["attempt"]["activity_id"], retired);

    let (stdout, _, code) = run_cli(home.path(), &["catalog", "restore", &id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("restored"));
    let active = run_json(home.path(), &["catalog", "list", "--category", "colores"]);
    assert_eq!(active.as_array().unwrap().len(), 3);

    let (_, stderr, code) = run_cli(home.path(), &["catalog", "retire", "999"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("999"));
}
