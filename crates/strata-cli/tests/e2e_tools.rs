//! E2E tests for the demo, profile, dataset, and text/JSON helper commands.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn strata_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("strata"));
    cmd.current_dir(dir);
    cmd.env("STRATA_LOG", "error");
    cmd.env("STRATA_STORAGE_DIR", dir.join("storage"));
    cmd.env_remove("STRATA_APP_NAME");
    cmd.env_remove("FORMAT");
    cmd.env_remove("DEBUG");
    cmd.arg("--config").arg(dir.join("config.toml"));
    cmd
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = strata_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("strata should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

// ---------------------------------------------------------------------------
// demo
// ---------------------------------------------------------------------------

#[test]
fn demo_is_reproducible_per_seed() {
    let dir = TempDir::new().expect("tempdir");
    let args = ["demo", "--seed", "42", "--sessions", "3", "--rounds", "5"];
    let a = run_json(dir.path(), &args);
    let b = run_json(dir.path(), &args);
    assert_eq!(a, b);
    assert_eq!(a["task_shared"], true);
    assert_eq!(a["sessions"].as_array().map(Vec::len), Some(3));
}

#[test]
fn demo_seeds_differ() {
    let dir = TempDir::new().expect("tempdir");
    let a = run_json(dir.path(), &["demo", "--seed", "1"]);
    let b = run_json(dir.path(), &["demo", "--seed", "2"]);
    assert_ne!(a["sessions"], b["sessions"]);
}

#[test]
fn demo_does_not_touch_browser_storage() {
    let dir = TempDir::new().expect("tempdir");
    strata_cmd(dir.path()).arg("demo").assert().success();
    assert!(!dir.path().join("storage").exists());
}

#[test]
fn demo_text_output_has_summary_line() {
    let dir = TempDir::new().expect("tempdir");
    strata_cmd(dir.path())
        .args(["demo", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("seed=7\trounds=3"))
        .stdout(predicate::str::contains("task_shared=true"));
}

// ---------------------------------------------------------------------------
// profile
// ---------------------------------------------------------------------------

#[test]
fn profile_is_generated_once_then_loaded() {
    let dir = TempDir::new().expect("tempdir");
    let first = run_json(dir.path(), &["profile", "show"]);
    assert_eq!(first["source"], "generated");
    let name = first["display_name"].as_str().expect("display name");
    assert!(name.contains(", "));

    let second = run_json(dir.path(), &["profile", "show"]);
    assert_eq!(second["source"], "stored");
    assert_eq!(second["entity"]["entity_id"], first["entity"]["entity_id"]);
}

#[test]
fn profile_update_renames_and_attaches_image() {
    let dir = TempDir::new().expect("tempdir");
    let image = dir.path().join("portrait.png");
    std::fs::write(&image, b"png!").expect("write image");

    let updated = run_json(
        dir.path(),
        &[
            "profile",
            "update",
            "--namespace",
            "Holmes",
            "--other-names",
            "Sherlock  Scott",
            "--image",
            image.to_str().expect("utf8 path"),
            "--credits",
            "S. Paget",
        ],
    );
    assert_eq!(updated["display_name"], "HOLMES, Sherlock Scott");
    assert_eq!(updated["entity"]["representative_image"]["data"], "cG5nIQ==");
    assert_eq!(updated["entity"]["representative_image"]["credits"], "S. Paget");
    assert!(updated.get("warning").is_none());

    let shown = run_json(dir.path(), &["profile", "show"]);
    assert_eq!(shown["entity"], updated["entity"]);
}

#[test]
fn caption_without_image_warns() {
    let dir = TempDir::new().expect("tempdir");
    run_json(dir.path(), &["profile", "random"]);
    let updated = run_json(
        dir.path(),
        &["profile", "update", "--namespace", "Watson", "--caption", "a doctor"],
    );
    assert!(
        updated["warning"]
            .as_str()
            .expect("warning")
            .contains("representative image is required")
    );
    assert!(updated["entity"]["representative_image"].is_null());
}

#[test]
fn profile_and_browser_state_coexist() {
    let dir = TempDir::new().expect("tempdir");
    run_json(dir.path(), &["profile", "show"]);
    run_json(dir.path(), &["browser", "change"]);
    let root = dir.path().join("storage").join("default");
    assert!(root.join("strata-entity-profile.json").exists());
    assert!(root.join("strata-local-state.json").exists());
}

#[test]
fn missing_image_file_fails() {
    let dir = TempDir::new().expect("tempdir");
    strata_cmd(dir.path())
        .args(["profile", "update", "--image", "nope.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn seeded_random_profiles_repeat() {
    let dir = TempDir::new().expect("tempdir");
    let a = run_json(dir.path(), &["profile", "random", "--seed", "11"]);
    let b = run_json(dir.path(), &["profile", "random", "--seed", "11"]);
    assert_eq!(a["display_name"], b["display_name"]);
}

// ---------------------------------------------------------------------------
// dataset
// ---------------------------------------------------------------------------

fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write dataset");
    path.to_str().expect("utf8 path").to_string()
}

#[test]
fn dataset_reports_shape_and_selected_row() {
    let dir = TempDir::new().expect("tempdir");
    let csv = write_file(dir.path(), "people.csv", "name,age\nHolmes,60\nWatson,58\n");
    let report = run_json(dir.path(), &["dataset", &csv, "--row", "1"]);
    assert_eq!(report["format"], "csv");
    assert_eq!(report["shape"], "Rows 2, columns 2.");
    assert_eq!(report["column_names"], serde_json::json!(["name", "age"]));
    assert_eq!(report["row"]["values"]["name"], "Watson");
    assert_eq!(report["row"]["values"]["age"], 58);
}

#[test]
fn dataset_reads_json_arrays() {
    let dir = TempDir::new().expect("tempdir");
    let json = write_file(
        dir.path(),
        "people.json",
        r#"[{"name": "Holmes", "age": 60}, {"name": "Watson", "age": 58}]"#,
    );
    strata_cmd(dir.path())
        .args(["dataset", &json, "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rows\t2\ncolumns\t2\n"));
}

#[test]
fn dataset_rejects_unsupported_extension() {
    let dir = TempDir::new().expect("tempdir");
    let txt = write_file(dir.path(), "notes.txt", "a,b\n1,2\n");
    strata_cmd(dir.path())
        .args(["dataset", &txt])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E4001]"))
        .stderr(predicate::str::contains("unsupported dataset file extension: '.txt'"));
}

#[test]
fn empty_dataset_has_no_rows() {
    let dir = TempDir::new().expect("tempdir");
    let empty = write_file(dir.path(), "empty.csv", "");
    let report = run_json(dir.path(), &["dataset", &empty]);
    assert_eq!(report["shape"], "Rows 0, columns 0.");
    assert_eq!(report["preview"], serde_json::json!([]));

    strata_cmd(dir.path())
        .args(["dataset", &empty, "--row", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E4003]"));
}

// ---------------------------------------------------------------------------
// logging
// ---------------------------------------------------------------------------

#[test]
fn verbose_flag_enables_debug_logs() {
    let dir = TempDir::new().expect("tempdir");
    strata_cmd(dir.path())
        .env_remove("STRATA_LOG")
        .args(["browser", "show", "-v"])
        .assert()
        .success()
        .stderr(predicate::str::contains("browser store opened"));
}

#[test]
fn debug_false_keeps_debug_logs_off() {
    let dir = TempDir::new().expect("tempdir");
    strata_cmd(dir.path())
        .env_remove("STRATA_LOG")
        .env("DEBUG", "false")
        .args(["browser", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("browser store opened").not());

    strata_cmd(dir.path())
        .env_remove("STRATA_LOG")
        .env("DEBUG", "1")
        .args(["browser", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("browser store opened"));
}

// ---------------------------------------------------------------------------
// transform / json-format / completions
// ---------------------------------------------------------------------------

#[test]
fn transform_uppercases_arguments() {
    let dir = TempDir::new().expect("tempdir");
    strata_cmd(dir.path())
        .args(["transform", "hello", "world", "--format", "text"])
        .assert()
        .success()
        .stdout("HELLO WORLD\n");
}

#[test]
fn transform_without_text_uses_samples() {
    let dir = TempDir::new().expect("tempdir");
    let json = run_json(dir.path(), &["transform"]);
    let rows = json.as_array().expect("array");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["output"], "HELLO, WORLD!");
    assert_eq!(rows[0]["label"], "The usual hello world.");
}

#[test]
fn json_format_prints_nested_record() {
    let dir = TempDir::new().expect("tempdir");
    let output = strata_cmd(dir.path())
        .args(["json-format", "--format", "pretty"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8");
    assert!(text.contains("\n    \"my_object\": {\n        \"name\": \"Sherlock\""));

    let value: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["text"], "Hello");
    assert_eq!(value["number"], 221);
    assert!(value["my_object"]["time"].as_f64().expect("time") > 1.0e9);
}

#[test]
fn json_format_accepts_overrides() {
    let dir = TempDir::new().expect("tempdir");
    let value = run_json(
        dir.path(),
        &["json-format", "--text", "Bye", "--number", "7", "--name", "Mycroft"],
    );
    assert_eq!(value["text"], "Bye");
    assert_eq!(value["number"], 7);
    assert_eq!(value["my_object"]["name"], "Mycroft");
}

#[test]
fn completions_mention_the_binary() {
    let dir = TempDir::new().expect("tempdir");
    strata_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strata"));
}
