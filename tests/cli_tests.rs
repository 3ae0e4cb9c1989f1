//! Integration tests for the kiln CLI surface.
//!
//! These exercise argument parsing and the error paths that need no cloud
//! provider behind them.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn kiln() -> Command {
    let mut cmd = Command::cargo_bin("kiln").expect("kiln binary should exist");
    cmd.env_remove("KILN_IMAGE_ID")
        .env_remove("KILN_INSTANCE_TYPE")
        .env_remove("KILN_KEY_NAME")
        .env_remove("KILN_SSH_USER")
        .env_remove("KILN_IDENTITY");
    cmd
}

fn kiln_with_home(home: &std::path::Path) -> Command {
    let mut cmd = kiln();
    cmd.env("HOME", home);
    cmd
}

// --- Help and version tests ---

#[test]
fn no_args_shows_help_and_exits_nonzero() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    kiln()
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Launch, provision, and bake single cloud instances",
        ));
}

#[test]
fn help_flag_lists_commands() {
    kiln()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("launch"))
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("converge"))
        .stdout(predicate::str::contains("bake"))
        .stdout(predicate::str::contains("snapshot"))
        .stdout(predicate::str::contains("terminate"));
}

#[test]
fn version_flag_shows_version() {
    kiln()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln 0.3.0"));
}

#[test]
fn version_command_shows_version() {
    kiln()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kiln 0.3.0"));
}

#[test]
fn version_command_json_outputs_valid_json() {
    kiln()
        .arg("version")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"version":"0.3.0"}"#));
}

// --- Argument validation tests ---

#[test]
fn launch_requires_image_id_and_key_name() {
    kiln()
        .arg("launch")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--image-id"));
}

#[test]
fn status_without_record_explains_how_to_start() {
    let home = tempfile::tempdir().expect("tempdir");
    kiln_with_home(home.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No instance on record"));
}

#[test]
fn explicit_malformed_instance_id_is_rejected() {
    let home = tempfile::tempdir().expect("tempdir");
    kiln_with_home(home.path())
        .args(["terminate", "--instance-id", "not-an-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid instance ID"));
}

#[test]
fn converge_requires_an_existing_recipe_directory() {
    let home = tempfile::tempdir().expect("tempdir");
    kiln_with_home(home.path())
        .args([
            "converge",
            "--recipes",
            "definitely/not/a/directory",
            "--instance-id",
            "i-0a1b2c3d4e5f67890",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recipe directory"));
}

#[test]
fn bake_requires_an_existing_recipe_directory() {
    let home = tempfile::tempdir().expect("tempdir");
    kiln_with_home(home.path())
        .args([
            "bake",
            "--image-id",
            "ami-0abcdef1234567890",
            "--key-name",
            "bakery",
            "--recipes",
            "definitely/not/a/directory",
            "--name",
            "web",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recipe directory"));
}
