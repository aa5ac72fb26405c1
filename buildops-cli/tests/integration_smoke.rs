//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_top_level_help_lists_commands() {
    let mut cmd = Command::cargo_bin("buildops").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("create-admin"))
        .stdout(predicate::str::contains("seed-plans"));
}

#[test]
fn test_serve_help() {
    let mut cmd = Command::cargo_bin("buildops").unwrap();
    cmd.arg("serve").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Address to bind to"))
        .stdout(predicate::str::contains("--no-migrate"));
}

#[test]
fn test_migrate_help() {
    let mut cmd = Command::cargo_bin("buildops").unwrap();
    cmd.arg("migrate").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Database URL"));
}

#[test]
fn test_create_admin_help() {
    let mut cmd = Command::cargo_bin("buildops").unwrap();
    cmd.arg("create-admin").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Email address of the admin account"))
        .stdout(predicate::str::contains("enterprise-admin"));
}

#[test]
fn test_seed_plans_help() {
    let mut cmd = Command::cargo_bin("buildops").unwrap();
    cmd.arg("seed-plans").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Redis URL"));
}

#[test]
fn test_unknown_command_fails() {
    let mut cmd = Command::cargo_bin("buildops").unwrap();
    cmd.arg("frobnicate");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_create_admin_rejects_bad_email() {
    let mut cmd = Command::cargo_bin("buildops").unwrap();
    cmd.env("HOME", std::env::temp_dir())
        .arg("create-admin")
        .arg("--email")
        .arg("not-an-email")
        .arg("--database-url")
        .arg("postgres://unused@127.0.0.1:1/none");

    cmd.assert().failure();
}
