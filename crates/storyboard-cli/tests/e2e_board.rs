//! E2E CLI tests for a small story board.
//!
//! Each test runs `sb` as a subprocess in an isolated temp directory and
//! checks the JSON contract of `filters`, the CSV of `export` and the error
//! codes on stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the sb binary, rooted in `dir`.
fn sb_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sb"));
    cmd.current_dir(dir);
    // Keep the user's own config and format preferences out of the run.
    cmd.env("XDG_CONFIG_HOME", dir.join(".user-config"));
    cmd.env_remove("FORMAT");
    cmd.env("STORYBOARD_LOG", "error");
    cmd
}

/// Run `sb <args> --json` and parse stdout.
fn sb_json(dir: &Path, args: &[&str]) -> Value {
    let output = sb_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("sb should not crash");
    assert!(
        output.status.success(),
        "sb {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Run a failing `sb <args> --json` and return the parsed error object.
fn sb_error(dir: &Path, args: &[&str]) -> Value {
    let output = sb_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("sb should not crash");
    assert!(!output.status.success(), "sb {args:?} should fail");
    let json: Value =
        serde_json::from_slice(&output.stderr).expect("errors should be JSON in --json mode");
    json["error"].clone()
}

/// Initialized directory with project `web`, statuses New/Done and two
/// members.
fn board() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    sb_cmd(root).arg("init").assert().success();

    sb_json(root, &["project", "create", "Web", "--slug", "web"]);
    sb_json(root, &["status", "add", "-p", "web", "New"]);
    sb_json(root, &["status", "add", "-p", "web", "Done", "--closed"]);
    for (username, full_name) in [("alice", "Alice"), ("bob", "Bob")] {
        sb_json(root, &["person", "add", username, "--full-name", full_name]);
        sb_json(root, &["member", "add", "-p", "web", username]);
    }
    dir
}

fn create_story(dir: &Path, extra: &[&str]) -> Value {
    let mut args = vec!["story", "create", "-p", "web"];
    args.extend_from_slice(extra);
    sb_json(dir, &args)
}

fn counts(list: &Value, label: &str) -> Vec<(String, u64)> {
    list.as_array()
        .expect("facet list")
        .iter()
        .map(|f| {
            (
                f[label].as_str().expect("label").to_string(),
                f["count"].as_u64().expect("count"),
            )
        })
        .collect()
}

fn pairs(items: &[(&str, u64)]) -> Vec<(String, u64)> {
    items.iter().map(|(l, c)| ((*l).to_string(), *c)).collect()
}

// ---------------------------------------------------------------------------
// Facets
// ---------------------------------------------------------------------------

#[test]
fn filters_json_counts_every_dimension() {
    let dir = board();
    let root = dir.path();
    create_story(root, &["Login", "--owner", "alice", "--assign", "alice", "--tag", "ui"]);
    create_story(root, &["Logout", "--owner", "alice", "--tag", "ui", "--tag", "bug"]);
    create_story(root, &["Search", "--owner", "bob", "--status", "Done", "--assign", "bob"]);

    let facets = sb_json(root, &["filters", "-p", "web"]);

    let keys: Vec<&str> = facets
        .as_object()
        .expect("object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 4);
    for key in ["statuses", "assigned_to", "owners", "tags"] {
        assert!(keys.contains(&key), "missing key {key}");
    }

    assert_eq!(
        counts(&facets["statuses"], "name"),
        pairs(&[("New", 2), ("Done", 1)])
    );
    assert_eq!(
        counts(&facets["assigned_to"], "full_name"),
        pairs(&[("", 1), ("Alice", 1), ("Bob", 1)])
    );
    assert_eq!(facets["assigned_to"][0]["id"], Value::Null);
    assert_eq!(
        counts(&facets["owners"], "full_name"),
        pairs(&[("Alice", 2), ("Bob", 1)])
    );
    assert_eq!(
        counts(&facets["tags"], "name"),
        pairs(&[("bug", 1), ("ui", 2)])
    );
}

#[test]
fn filters_selection_leaves_its_own_dimension_open() {
    let dir = board();
    let root = dir.path();
    create_story(root, &["Login", "--owner", "alice", "--tag", "ui"]);
    create_story(root, &["Search", "--owner", "bob", "--status", "Done"]);

    let facets = sb_json(root, &["filters", "-p", "web", "--status", "Done"]);

    // Both statuses still reported with full counts.
    assert_eq!(
        counts(&facets["statuses"], "name"),
        pairs(&[("New", 1), ("Done", 1)])
    );
    // Other dimensions only see the Done story.
    assert_eq!(counts(&facets["owners"], "full_name"), pairs(&[("Bob", 1)]));
    assert_eq!(facets["tags"].as_array().map(Vec::len), Some(0));

    let unassigned = sb_json(root, &["filters", "-p", "web", "--assigned-to", "none"]);
    assert_eq!(
        counts(&unassigned["statuses"], "name"),
        pairs(&[("New", 1), ("Done", 1)])
    );
}

#[test]
fn filters_text_output_is_tab_separated() {
    let dir = board();
    let root = dir.path();
    create_story(root, &["Login", "--tag", "ui"]);

    sb_cmd(root)
        .args(["filters", "-p", "web"])
        .env("FORMAT", "text")
        .assert()
        .success()
        .stdout(predicate::str::contains("statuses\t"))
        .stdout(predicate::str::contains("tags\t\t1\tui"));
}

#[test]
fn filters_use_the_status_catalog() {
    let dir = board();
    let root = dir.path();
    std::fs::write(
        root.join(".storyboard/config.toml"),
        "[i18n]\nlanguage = \"es\"\n\n[i18n.catalog]\nNew = \"Nueva\"\n",
    )
    .expect("write config");

    let facets = sb_json(root, &["filters", "-p", "web"]);
    assert_eq!(facets["statuses"][0]["name"], "Nueva");
    assert_eq!(facets["statuses"][1]["name"], "Done");
}

// ---------------------------------------------------------------------------
// Story services
// ---------------------------------------------------------------------------

#[test]
fn bulk_from_stdin_then_reorder() {
    let dir = board();
    let root = dir.path();

    let output = sb_cmd(root)
        .args(["story", "bulk", "-p", "web", "--owner", "bob", "--json"])
        .write_stdin("First\n\n  Second  \nThird\n")
        .output()
        .expect("bulk should not crash");
    assert!(output.status.success());
    let created: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let ids: Vec<i64> = created
        .as_array()
        .expect("array")
        .iter()
        .map(|s| s["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(created[1]["subject"], "Second");

    let pairs_arg: Vec<String> = ids
        .iter()
        .rev()
        .enumerate()
        .map(|(order, id)| format!("{id}={order}"))
        .collect();
    let mut args = vec!["story", "order", "-p", "web", "--field", "kanban"];
    args.extend(pairs_arg.iter().map(String::as_str));
    let report = sb_json(root, &args);
    assert_eq!(report["updated"], 3);
    assert_eq!(report["field"], "kanban");

    let listed = sb_json(root, &["story", "list", "-p", "web", "--sort", "kanban"]);
    let subjects: Vec<&str> = listed
        .as_array()
        .expect("array")
        .iter()
        .map(|s| s["subject"].as_str().expect("subject"))
        .collect();
    assert_eq!(subjects, ["Third", "Second", "First"]);
}

#[test]
fn closing_the_last_task_closes_the_story() {
    let dir = board();
    let root = dir.path();
    sb_json(root, &["task-status", "add", "-p", "web", "Open"]);
    sb_json(root, &["task-status", "add", "-p", "web", "Finished", "--closed"]);

    let story = create_story(root, &["Checkout"]);
    let story_id = story["id"].to_string();
    assert_eq!(story["is_closed"], false);

    let task = sb_json(
        root,
        &["task", "create", "-p", "web", "Pay", "--story", &story_id, "--status", "Open"],
    );
    let task_id = task["id"].to_string();

    sb_json(root, &["task", "status", &task_id, "Finished"]);
    let closed = sb_json(root, &["filters", "-p", "web", "--closed"]);
    assert_eq!(
        counts(&closed["statuses"], "name"),
        pairs(&[("New", 1), ("Done", 0)])
    );

    sb_json(root, &["task", "status", &task_id, "Open"]);
    let reopened = sb_json(root, &["story", "refresh", &story_id]);
    assert_eq!(reopened["is_closed"], false);
}

#[test]
fn move_and_assign_update_the_story() {
    let dir = board();
    let root = dir.path();
    let story = create_story(root, &["Checkout", "--assign", "alice"]);
    let id = story["id"].to_string();

    let moved = sb_json(root, &["story", "move", &id, "Done"]);
    assert_eq!(moved["is_closed"], true);
    assert!(moved["finish_at_us"].is_i64());

    let unassigned = sb_json(root, &["story", "assign", &id, "none"]);
    assert_eq!(unassigned["assigned_to_id"], Value::Null);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[test]
fn export_writes_header_and_rows() {
    let dir = board();
    let root = dir.path();
    sb_json(root, &["role", "add", "-p", "web", "UX", "--computable"]);
    sb_json(root, &["points", "add", "-p", "web", "5", "--value", "5"]);
    let story = create_story(root, &["Login, then logout", "--owner", "alice", "--tag", "ui"]);
    let id = story["id"].to_string();
    sb_json(root, &["story", "points", &id, "--role", "ux", "5"]);
    create_story(root, &["Search"]);

    let out = root.join("stories.csv");
    sb_cmd(root)
        .args(["export", "-p", "web", "-o"])
        .arg(&out)
        .assert()
        .success();

    let csv = std::fs::read_to_string(&out).expect("csv written");
    let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ref,subject,description,milestone,owner,"));
    assert!(lines[0].contains(",ux-points,total-points,"));
    assert!(lines[1].starts_with("1,\"Login, then logout\",,,alice,Alice,"));
    assert!(lines[1].contains(",5,5,"));
    assert!(lines[2].starts_with("2,Search,"));
}

#[test]
fn export_honours_selection_and_delimiter() {
    let dir = board();
    let root = dir.path();
    create_story(root, &["Login", "--tag", "ui"]);
    create_story(root, &["Search"]);

    sb_cmd(root)
        .args(["export", "-p", "web", "--tag", "ui", "--delimiter", ";"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ref;subject;"))
        .stdout(predicate::str::contains("1;Login;"))
        .stdout(predicate::str::contains("Search").not());
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn uninitialized_directory_reports_e1001() {
    let dir = TempDir::new().expect("tempdir");
    let err = sb_error(dir.path(), &["filters", "-p", "web"]);
    assert_eq!(err["error_code"], "E1001");
    assert!(err["suggestion"].as_str().expect("hint").contains("sb init"));
}

#[test]
fn unknown_project_reports_e2001() {
    let dir = board();
    let err = sb_error(dir.path(), &["filters", "-p", "nope"]);
    assert_eq!(err["error_code"], "E2001");
}

#[test]
fn unknown_status_in_selection_reports_e2004() {
    let dir = board();
    let err = sb_error(dir.path(), &["filters", "-p", "web", "--status", "Blocked"]);
    assert_eq!(err["error_code"], "E2004");
}

#[test]
fn blank_bulk_input_reports_e2007() {
    let dir = board();
    let output = sb_cmd(dir.path())
        .args(["story", "bulk", "-p", "web", "--json"])
        .write_stdin("\n   \n")
        .output()
        .expect("bulk should not crash");
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stderr).expect("JSON error");
    assert_eq!(json["error"]["error_code"], "E2007");
}

#[test]
fn bad_order_field_reports_e2008() {
    let dir = board();
    let story = create_story(dir.path(), &["Login"]);
    let pair = format!("{}=1", story["id"]);
    let err = sb_error(
        dir.path(),
        &["story", "order", "-p", "web", "--field", "roadmap", &pair],
    );
    assert_eq!(err["error_code"], "E2008");
}

#[test]
fn broken_config_reports_e1002() {
    let dir = board();
    std::fs::write(dir.path().join(".storyboard/config.toml"), "[export\n").expect("write");
    let err = sb_error(dir.path(), &["filters", "-p", "web"]);
    assert_eq!(err["error_code"], "E1002");
}

#[test]
fn text_errors_carry_code_prefix() {
    let dir = TempDir::new().expect("tempdir");
    sb_cmd(dir.path())
        .args(["project", "list"])
        .env("FORMAT", "text")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error[E1001]: "));
}

#[test]
fn init_twice_without_force_fails() {
    let dir = board();
    sb_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
