use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

const STORAGE_KEY: &str = "timezone-data";

fn store_with_envelope(envelope: &str) -> String {
    serde_json::json!({ STORAGE_KEY: envelope }).to_string()
}

fn saved_envelope(path: &std::path::Path) -> Value {
    let text = fs::read_to_string(path).expect("read store");
    let slots: Value = serde_json::from_str(&text).expect("store json");
    let envelope = slots[STORAGE_KEY].as_str().expect("envelope slot");
    serde_json::from_str(envelope).expect("envelope json")
}

#[test]
fn once_with_empty_store_shows_placeholder() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--locale", "en-US", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("== Your Time =="))
        .stdout(predicate::str::contains(
            "Add time zones and they will be displayed here.",
        ));
    assert!(!store.exists(), "read-only run must not write the store");
}

#[test]
fn add_persists_entry_with_derived_label() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--add", "Europe/London", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Europe/London (Europe/London)"));

    let envelope = saved_envelope(&store);
    assert_eq!(envelope["timeZones"][0]["label"], "Europe/London");
    assert_eq!(envelope["timeZones"][0]["timeZone"], "Europe/London");
}

#[test]
fn default_label_only_replaces_underscores() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--add", "America/Port_of_Spain", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "America/Port of Spain (America/Port_of_Spain)",
        ));

    let envelope = saved_envelope(&store);
    assert_eq!(envelope["timeZones"][0]["label"], "America/Port of Spain");
}

#[test]
fn delete_then_add_keeps_order() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut first = cargo_bin_cmd!("worldclock");
    first
        .arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC"])
        .args(["--add", "Europe/London", "--add", "Asia/Tokyo", "--once"])
        .assert()
        .success();

    let mut second = cargo_bin_cmd!("worldclock");
    second
        .arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--delete", "0", "--rename", "0=Tokyo office"])
        .arg("--once")
        .assert()
        .success();

    let envelope = saved_envelope(&store);
    let zones = envelope["timeZones"].as_array().expect("array");
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0]["timeZone"], "Asia/Tokyo");
    // renames run before deletes, so index 0 was London when it was renamed
    assert_eq!(zones[0]["label"], "Asia/Tokyo");
}

#[test]
fn unknown_zone_is_rejected_by_add() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--add", "Not/AZone", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown time zone"));
    assert!(!store.exists());
}

#[test]
fn stored_unknown_zone_only_breaks_its_own_row() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");
    let envelope = r#"{"user":{"label":"Alice"},"timeZones":[{"label":"Good","timeZone":"UTC"},{"label":"Bad","timeZone":"Not/AZone"}]}"#;
    fs::write(&store, store_with_envelope(envelope)).expect("write store");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Good (UTC)"))
        .stdout(predicate::str::contains("[1] error: Unknown timezone: Not/AZone"));
}

#[test]
fn message_format_renders_user_label() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC"])
        .args(["--user-label", "Alice", "--message-format", "{{local.label}}"])
        .arg("--once")
        .assert()
        .success()
        .stdout(predicate::str::contains("== Message ==\n  Alice\n"));

    let envelope = saved_envelope(&store);
    assert_eq!(envelope["user"]["label"], "Alice");
    assert_eq!(envelope["message"]["format"], "{{local.label}}");
}

#[test]
fn custom_datetime_is_shown_but_not_saved() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--locale", "en-US", "--add", "Asia/Tokyo"])
        .args(["--custom-datetime", "2024-01-15T12:00:00Z", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Custom datetime: 2024-01-15T12:00:00Z"))
        .stdout(predicate::str::contains("9:00:00 PM"));

    let text = fs::read_to_string(&store).expect("read store");
    assert!(!text.contains("2024-01-15"));
}

#[test]
fn invalid_custom_datetime_is_not_fatal() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--custom-datetime", "tomorrow", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown datetime: tomorrow."));
}

#[test]
fn malformed_store_falls_back_to_defaults() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");
    fs::write(&store, store_with_envelope("{ not-valid-json ")).expect("write store");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Add time zones and they will be displayed here.",
        ));
}

#[test]
fn search_lists_matching_zones() {
    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.args(["--search", "tokyo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Asia/Tokyo"));
}

#[test]
fn ticks_flag_bounds_the_event_loop() {
    let dir = tempdir().expect("tempdir");
    let store = dir.path().join("store.json");

    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.arg("--store")
        .arg(&store)
        .args(["--time-zone", "UTC", "--interval-ms", "50", "--ticks", "2"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("== Time Zones ==").count(3));
}

#[test]
fn diagnostics_reports_tick_summary() {
    let mut cmd = cargo_bin_cmd!("worldclock");
    cmd.args(["--diagnostics", "--interval-ms", "100"])
        .timeout(std::time::Duration::from_secs(15))
        .assert()
        .success()
        .stdout(predicate::str::contains("worldclock diagnostics"))
        .stdout(predicate::str::contains("Ticks delivered"));
}
