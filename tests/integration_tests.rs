//! Integration tests for the shopqc CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to get a shopqc command with a stable actor
fn shopqc(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shopqc").unwrap();
    cmd.current_dir(tmp.path()).env("SHOPQC_AUTHOR", "tester");
    cmd
}

/// Helper to create a test project in a temp directory
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    shopqc(&tmp).arg("init").assert().success();
    tmp
}

/// Helper to create a job, returning its job number
fn create_test_job(tmp: &TempDir, po: &str, part: &str, qty: &str) -> String {
    let output = shopqc(tmp)
        .args(["job", "new", "--po", po, "--part", part, "--qty", qty])
        .output()
        .unwrap();
    assert!(output.status.success(), "job new failed: {:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    // Output format: "✓ Created job JOB00001 (JOB-01ABC...)"
    stdout
        .split_whitespace()
        .find(|w| w.starts_with("JOB0"))
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Helper to fetch the newest full entity id from a `list -f id` command
fn last_listed_id(tmp: &TempDir, args: &[&str]) -> String {
    let output = shopqc(tmp).args(args).arg("-f").arg("id").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Helper to add a quality manager to the roster
fn add_quality_manager(tmp: &TempDir, username: &str) {
    shopqc(tmp)
        .args(["roster", "add", username, "--role", "quality_manager"])
        .assert()
        .success();
}

/// Parse a job's JSON detail via `job show -f json`
fn show_job_json(tmp: &TempDir, job: &str) -> serde_json::Value {
    let output = shopqc(tmp)
        .args(["job", "show", job, "-f", "json"])
        .output()
        .unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    let tmp = TempDir::new().unwrap();
    shopqc(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("quality-control"));
}

#[test]
fn test_version_displays() {
    let tmp = TempDir::new().unwrap();
    shopqc(&tmp)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shopqc"));
}

#[test]
fn test_unknown_command_fails() {
    let tmp = TempDir::new().unwrap();
    shopqc(&tmp)
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_command_outside_project_fails() {
    let tmp = TempDir::new().unwrap();
    shopqc(&tmp)
        .args(["job", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a shopqc project"));
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();

    shopqc(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    assert!(tmp.path().join(".shopqc/quality.db").is_file());
    assert!(tmp.path().join(".shopqc/config.yaml").is_file());
    assert!(tmp.path().join(".shopqc/roster.yaml").is_file());
    assert!(tmp.path().join(".shopqc/attachments").is_dir());
}

#[test]
fn test_init_twice_warns() {
    let tmp = setup_test_project();
    shopqc(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_init_force_keeps_data() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");

    shopqc(&tmp).args(["init", "--force"]).assert().success();
    shopqc(&tmp)
        .args(["job", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&job));
}

// ============================================================================
// Job Lifecycle Tests
// ============================================================================

#[test]
fn test_job_new_generates_sequential_numbers() {
    let tmp = setup_test_project();
    assert_eq!(create_test_job(&tmp, "PO-1", "X-1", "5"), "JOB00001");
    assert_eq!(create_test_job(&tmp, "PO-2", "X-2", "5"), "JOB00002");
}

#[test]
fn test_job_new_reuses_part_identity() {
    let tmp = setup_test_project();
    create_test_job(&tmp, "PO-1", "X-1", "5");
    create_test_job(&tmp, "PO-2", "X-1", "10");

    let a = show_job_json(&tmp, "JOB00001");
    let b = show_job_json(&tmp, "JOB00002");
    assert_eq!(a["part_id"], b["part_id"]);
}

#[test]
fn test_job_stage_complete_stamps_and_clears() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");

    shopqc(&tmp)
        .args(["job", "stage", &job, "complete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("po_receipt -> complete"));
    let detail = show_job_json(&tmp, &job);
    assert_eq!(detail["workflow_stage"], "complete");
    assert!(detail["completed_at"].is_string());

    // Rework: moving away clears the stamp
    shopqc(&tmp)
        .args(["job", "stage", &job, "exit_control"])
        .assert()
        .success();
    let detail = show_job_json(&tmp, &job);
    assert_eq!(detail["workflow_stage"], "exit_control");
    assert!(detail["completed_at"].is_null() || detail.get("completed_at").is_none());
}

#[test]
fn test_job_stage_rejects_unknown_stage() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["job", "stage", &job, "shipped"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid workflow stage"));
}

#[test]
fn test_job_verify_revision() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["job", "verify-rev", &job])
        .assert()
        .success()
        .stdout(predicate::str::contains("verified"));

    let detail = show_job_json(&tmp, &job);
    assert_eq!(detail["revision_verified"], true);
    assert_eq!(detail["revision_verified_by"], "tester");
    // Verification never changes the stage
    assert_eq!(detail["workflow_stage"], "po_receipt");
}

#[test]
fn test_job_history_records_transitions() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["job", "stage", &job, "on_hold"])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["job", "history", &job])
        .assert()
        .success()
        .stdout(predicate::str::contains("po_receipt to on_hold"));
}

#[test]
fn test_job_list_filter_by_stage() {
    let tmp = setup_test_project();
    create_test_job(&tmp, "PO-1", "X-1", "5");
    let b = create_test_job(&tmp, "PO-2", "X-2", "5");
    shopqc(&tmp)
        .args(["job", "stage", &b, "in_process"])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["job", "list", "--stage", "in_process", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1"));
}

// ============================================================================
// Dimension Tests
// ============================================================================

#[test]
fn test_dim_add_and_list() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");

    shopqc(&tmp)
        .args([
            "job", "dim-add", &job, "-N", "bore diameter", "--nominal", "10.0", "--plus", "0.1",
            "--minus", "-0.1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added dimension 1"));

    shopqc(&tmp)
        .args([
            "job", "dim-add", &job, "-N", "thread gauge", "--nominal", "0", "-u", "go/nogo",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added dimension 2"));

    shopqc(&tmp)
        .args(["job", "dims", &job])
        .assert()
        .success()
        .stdout(predicate::str::contains("bore diameter"))
        .stdout(predicate::str::contains("go/nogo"));
}

#[test]
fn test_dim_copy_replaces_target() {
    let tmp = setup_test_project();
    let source = create_test_job(&tmp, "PO-1", "X-1", "5");
    let target = create_test_job(&tmp, "PO-2", "X-1", "10");

    shopqc(&tmp)
        .args(["job", "dim-add", &source, "-N", "length", "--nominal", "50"])
        .assert()
        .success();
    shopqc(&tmp)
        .args(["job", "dim-add", &target, "-N", "old", "--nominal", "1"])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["job", "dim-copy", &target, "--from", &source])
        .assert()
        .success()
        .stdout(predicate::str::contains("Copied 1 dimension"));

    shopqc(&tmp)
        .args(["job", "dims", &target])
        .assert()
        .success()
        .stdout(predicate::str::contains("length"))
        .stdout(predicate::str::contains("old").not());
}

// ============================================================================
// Measurement Tests
// ============================================================================

#[test]
fn test_measure_pass_and_fail() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args([
            "job", "dim-add", &job, "-N", "bore", "--nominal", "10.0", "--plus", "0.1", "--minus",
            "-0.1",
        ])
        .assert()
        .success();

    // Boundary value passes
    shopqc(&tmp)
        .args(["measure", "new", &job, "1=10.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pass"));

    shopqc(&tmp)
        .args(["measure", "new", &job, "1=10.11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fail"));
}

#[test]
fn test_measure_multiple_samples_per_dimension() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args([
            "job", "dim-add", &job, "-N", "bore", "--nominal", "10.0", "--plus", "0.1", "--minus",
            "-0.1",
        ])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["measure", "new", &job, "1=10.02", "1=10.05"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 measurement(s)"));
}

#[test]
fn test_measure_rejects_unknown_dimension() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["job", "dim-add", &job, "-N", "bore", "--nominal", "10"])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["measure", "new", &job, "9=1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no dimension 9"));
}

// ============================================================================
// Material Control & Escalation Tests
// ============================================================================

#[test]
fn test_material_rejection_notifies_quality_users() {
    let tmp = setup_test_project();
    add_quality_manager(&tmp, "jsmith");
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");

    shopqc(&tmp)
        .args([
            "material", "new", &job, "-t", "6082-T6 bar stock", "-s", "Acme Metals",
        ])
        .assert()
        .success();
    let mc_id = last_listed_id(&tmp, &["material", "list", &job]);
    assert!(mc_id.starts_with("MATC-"));

    shopqc(&tmp)
        .args(["material", "status", &mc_id, "rejected"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rejected"))
        .stdout(predicate::str::contains("Notified 1 quality user(s)"));
}

#[test]
fn test_supplier_error_flips_pending_material() {
    let tmp = setup_test_project();
    add_quality_manager(&tmp, "jsmith");
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");

    shopqc(&tmp)
        .args([
            "material", "new", &job, "-t", "bar stock", "-s", "Acme Metals",
        ])
        .assert()
        .success();
    let mc_id = last_listed_id(&tmp, &["material", "list", &job]);

    shopqc(&tmp)
        .args([
            "err",
            "supplier",
            "--material",
            &mc_id,
            "-d",
            "wrong alloy delivered",
            "-S",
            "critical",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("material_supplier"))
        .stdout(predicate::str::contains("Acme Metals"));

    shopqc(&tmp)
        .args(["material", "show", &mc_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: rejected"));
}

#[test]
fn test_external_process_round_trip() {
    let tmp = setup_test_project();
    add_quality_manager(&tmp, "jsmith");
    let job = create_test_job(&tmp, "PO-1", "X-1", "25");

    shopqc(&tmp)
        .args([
            "extp", "new", &job, "-t", "anodizing", "-s", "SurfaceCo", "--qty", "25",
        ])
        .assert()
        .success();
    let ep_id = last_listed_id(&tmp, &["extp", "list", &job]);
    assert!(ep_id.starts_with("EXTP-"));

    shopqc(&tmp)
        .args(["extp", "receive", &ep_id, "--date", "2025-03-14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("25 of 25"));

    shopqc(&tmp)
        .args([
            "extp",
            "inspect",
            &ep_id,
            "rejected",
            "--notes",
            "coating thickness out of spec",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("rejected"))
        .stdout(predicate::str::contains("Notified 1 quality user(s)"));
}

#[test]
fn test_internal_error_report_flow() {
    let tmp = setup_test_project();
    add_quality_manager(&tmp, "jsmith");
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");

    shopqc(&tmp)
        .args([
            "err", "internal", &job, "-d", "bore oversize", "-S", "major", "--qty", "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created error report"))
        .stdout(predicate::str::contains("Notified 1 quality user(s)"));

    let err_id = last_listed_id(&tmp, &["err", "list"]);
    assert!(err_id.starts_with("ERR-"));

    shopqc(&tmp)
        .args(["err", "investigate", &err_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("investigating"));

    shopqc(&tmp)
        .args(["err", "resolve", &err_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("resolved"));

    // Closing with empty disposition/root cause is permitted with --yes
    shopqc(&tmp)
        .args(["err", "close", &err_id, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("closed"));

    shopqc(&tmp)
        .args(["err", "reopen", &err_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("open"));

    let output = shopqc(&tmp)
        .args(["err", "show", &err_id, "-f", "json"])
        .output()
        .unwrap();
    let detail: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(detail["status"], "open");
    assert!(detail.get("resolved_date").is_none() || detail["resolved_date"].is_null());
    assert!(detail.get("closed_date").is_none() || detail["closed_date"].is_null());
}

#[test]
fn test_error_report_illegal_transition_fails() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["err", "internal", &job, "-d", "scratch"])
        .assert()
        .success();
    let err_id = last_listed_id(&tmp, &["err", "list"]);

    shopqc(&tmp)
        .args(["err", "close", &err_id, "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid error report transition"));
}

#[test]
fn test_err_list_filters() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["err", "internal", &job, "-d", "first issue"])
        .assert()
        .success();
    shopqc(&tmp)
        .args(["err", "internal", &job, "-d", "second issue"])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["err", "list", "--status", "open", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2"));
    shopqc(&tmp)
        .args(["err", "list", "--status", "closed", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0"));
}

// ============================================================================
// Exit Control Tests
// ============================================================================

#[test]
fn test_exit_control_sampling_plan() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "25");
    shopqc(&tmp)
        .args(["job", "stage", &job, "exit_control"])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["exit", "new", &job, "-n", "25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1, 2, 3, 4, 5, 15, 25"));
}

#[test]
fn test_exit_control_all_pass_completes_job() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["job", "stage", &job, "exit_control"])
        .assert()
        .success();
    shopqc(&tmp)
        .args(["exit", "new", &job, "-n", "5"])
        .assert()
        .success();
    let exit_id = last_listed_id(&tmp, &["exit", "list", &job]);

    for position in ["1", "2", "3", "4"] {
        shopqc(&tmp)
            .args(["exit", "record", &exit_id, "-p", position])
            .assert()
            .success()
            .stdout(predicate::str::contains("still in progress"));
    }
    shopqc(&tmp)
        .args(["exit", "record", &exit_id, "-p", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lot passed"))
        .stdout(predicate::str::contains("Job moved to complete"));

    let detail = show_job_json(&tmp, &job);
    assert_eq!(detail["workflow_stage"], "complete");
    assert!(detail["completed_at"].is_string());
}

#[test]
fn test_exit_control_one_fail_fails_lot() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["job", "stage", &job, "exit_control"])
        .assert()
        .success();
    shopqc(&tmp)
        .args(["exit", "new", &job, "-n", "5"])
        .assert()
        .success();
    let exit_id = last_listed_id(&tmp, &["exit", "list", &job]);

    for position in ["1", "2", "3", "4"] {
        shopqc(&tmp)
            .args(["exit", "record", &exit_id, "-p", position])
            .assert()
            .success();
    }
    shopqc(&tmp)
        .args([
            "exit",
            "record",
            &exit_id,
            "-p",
            "5",
            "--surface-ok",
            "false",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("FAIL"))
        .stdout(predicate::str::contains("Lot failed"));

    // Job stays at exit control
    let detail = show_job_json(&tmp, &job);
    assert_eq!(detail["workflow_stage"], "exit_control");
}

#[test]
fn test_exit_complete_rejects_unrecorded_samples() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["exit", "new", &job, "-n", "5"])
        .assert()
        .success();
    let exit_id = last_listed_id(&tmp, &["exit", "list", &job]);

    shopqc(&tmp)
        .args(["exit", "complete", &exit_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecorded sample"));
}

#[test]
fn test_exit_add_samples_validates() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "12");
    shopqc(&tmp)
        .args(["exit", "new", &job, "-n", "12"])
        .assert()
        .success();
    let exit_id = last_listed_id(&tmp, &["exit", "list", &job]);

    shopqc(&tmp)
        .args(["exit", "add-samples", &exit_id, "6", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 2"));

    // Out of range
    shopqc(&tmp)
        .args(["exit", "add-samples", &exit_id, "13"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside the lot"));

    // Duplicate
    shopqc(&tmp)
        .args(["exit", "add-samples", &exit_id, "6"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already sampled"));
}

// ============================================================================
// Attachment Tests
// ============================================================================

#[test]
fn test_material_attach_stores_file() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["material", "new", &job, "-t", "bar stock"])
        .assert()
        .success();
    let mc_id = last_listed_id(&tmp, &["material", "list", &job]);

    std::fs::write(tmp.path().join("cert.pdf"), b"certificate contents").unwrap();
    shopqc(&tmp)
        .args(["material", "attach", &mc_id, "cert.pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Attached cert.pdf"));

    let stored_dir = tmp.path().join(".shopqc/attachments/material_control");
    assert!(stored_dir.read_dir().unwrap().next().is_some());
}

#[test]
fn test_attach_missing_file_fails() {
    let tmp = setup_test_project();
    let job = create_test_job(&tmp, "PO-1", "X-1", "5");
    shopqc(&tmp)
        .args(["err", "internal", &job, "-d", "scratch"])
        .assert()
        .success();
    let err_id = last_listed_id(&tmp, &["err", "list"]);

    shopqc(&tmp)
        .args(["err", "attach", &err_id, "nope.jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("source file not found"));
}

// ============================================================================
// Roster Tests
// ============================================================================

#[test]
fn test_roster_add_and_quality_listing() {
    let tmp = setup_test_project();
    add_quality_manager(&tmp, "jsmith");
    shopqc(&tmp)
        .args(["roster", "add", "op1", "--role", "operator"])
        .assert()
        .success();

    shopqc(&tmp)
        .args(["roster", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jsmith"))
        .stdout(predicate::str::contains("op1"));

    // Operators do not receive escalation notifications
    shopqc(&tmp)
        .args(["roster", "list", "--quality"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jsmith"))
        .stdout(predicate::str::contains("op1").not());
}

#[test]
fn test_roster_duplicate_rejected() {
    let tmp = setup_test_project();
    add_quality_manager(&tmp, "jsmith");
    shopqc(&tmp)
        .args(["roster", "add", "jsmith"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already on the roster"));
}
