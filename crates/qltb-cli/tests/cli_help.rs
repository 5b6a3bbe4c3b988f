use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("qltb")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("whoami"))
        .stdout(predicate::str::contains("dashboard"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_login_help_shows_flags() {
    cargo_bin_cmd!("qltb")
        .args(["login", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--email"))
        .stdout(predicate::str::contains("--password"))
        .stdout(predicate::str::contains("--wait"));
}

#[test]
fn test_register_help_shows_optional_fields() {
    cargo_bin_cmd!("qltb")
        .args(["register", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--full-name"))
        .stdout(predicate::str::contains("--confirm-password"))
        .stdout(predicate::str::contains("--student-id"))
        .stdout(predicate::str::contains("--class"));
}

#[test]
fn test_dashboard_help_shows_watch() {
    cargo_bin_cmd!("qltb")
        .args(["dashboard", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--watch"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("qltb")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
