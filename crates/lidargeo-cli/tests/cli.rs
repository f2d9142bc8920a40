use assert_cmd::Command;
use predicates::prelude::*;

fn lidargeo() -> Command {
    Command::cargo_bin("lidargeo").unwrap()
}

#[test]
fn test_help_lists_commands() {
    lidargeo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("regions"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn test_fetch_help_shows_defaults() {
    lidargeo()
        .args(["fetch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--crs"))
        .stdout(predicate::str::contains("[default: 5]"))
        .stdout(predicate::str::contains("--strict-twi"));
}

#[test]
fn test_fetch_rejects_malformed_bounds() {
    lidargeo()
        .args(["fetch", "--bounds", "([1,2],[3])", "--crs", "3857"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid bounds"))
        .stderr(predicate::str::contains("expected 4 numbers"));
}

#[test]
fn test_regions_rejects_inverted_bounds() {
    lidargeo()
        .args(["regions", "--bounds", "([10, 0], [0, 1])"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("minimum exceeds maximum"));
}

#[test]
fn test_fetch_requires_crs() {
    lidargeo()
        .args(["fetch", "--bounds", "([0, 1], [0, 1])"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--crs"));
}
