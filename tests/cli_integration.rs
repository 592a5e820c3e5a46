//! Integration tests for the CLI surface.
//!
//! These exercise argument validation and the exit-code contract
//! without requiring a Bluetooth stack. The one test that reaches for
//! the bus points `DBUS_SYSTEM_BUS_ADDRESS` at a dead socket, so it is
//! deterministic on machines with or without a real system bus.

use assert_cmd::Command;
use predicates::prelude::*;

/// Exit code for usage errors, outside the reserved 0-4 range.
const EXIT_USAGE: i32 = 64;

fn blebond() -> Command {
    Command::cargo_bin("blebond").unwrap()
}

#[test]
fn test_help() {
    blebond()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MAC"))
        .stdout(predicate::str::contains("--pin"))
        .stdout(predicate::str::contains("--check-only"))
        .stdout(predicate::str::contains("--force-repair"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_version() {
    blebond()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("blebond"));
}

#[test]
fn test_missing_mac_is_a_usage_error() {
    blebond()
        .assert()
        .failure()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("MAC"));
}

#[test]
fn test_invalid_mac_is_a_usage_error() {
    blebond()
        .arg("not-a-mac")
        .assert()
        .failure()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("expected format"));
}

#[test]
fn test_truncated_mac_is_rejected() {
    blebond()
        .arg("AA:BB:CC:DD:EE")
        .assert()
        .failure()
        .code(EXIT_USAGE);
}

#[test]
fn test_check_only_conflicts_with_force_repair() {
    blebond()
        .args(["AA:BB:CC:DD:EE:FF", "--check-only", "--force-repair"])
        .assert()
        .failure()
        .code(EXIT_USAGE)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_unreachable_bus_is_an_adapter_error() {
    blebond()
        .env(
            "DBUS_SYSTEM_BUS_ADDRESS",
            "unix:path=/nonexistent/blebond-test.sock",
        )
        .args(["AA:BB:CC:DD:EE:FF", "--check-only"])
        .assert()
        .failure()
        .code(3)
        .stdout(predicate::str::contains("Result:"))
        .stderr(predicate::str::contains("Error:"));
}
