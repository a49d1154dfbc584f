//! CLI surface checks: every rejected configuration must fail before the
//! binary talks to anything.

use assert_cmd::Command;
use predicates::prelude::*;

fn cloud_proxy() -> Command {
    let mut cmd = Command::cargo_bin("cloud-proxy").unwrap();
    cmd.env_remove("DIGITALOCEAN_TOKEN")
        .env_remove("CLOUD_PROXY_WARMUP_SECS");
    cmd
}

#[test]
fn a_token_is_required() {
    cloud_proxy()
        .args(["--key", "aa:bb:cc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("token"));
}

#[test]
fn a_key_fingerprint_is_required() {
    cloud_proxy()
        .args(["--token", "not-a-real-token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--key"));
}

#[test]
fn more_than_fifty_droplets_is_refused_without_force() {
    cloud_proxy()
        .args([
            "--token",
            "not-a-real-token",
            "--key",
            "aa:bb:cc",
            "--count",
            "51",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn a_zero_count_is_refused() {
    cloud_proxy()
        .args([
            "--token",
            "not-a-real-token",
            "--key",
            "aa:bb:cc",
            "--count",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn version_prints_and_exits() {
    cloud_proxy()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_documents_the_recognized_flags() {
    let assert = cloud_proxy().arg("--help").assert().success();
    let help = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    for flag in [
        "--token",
        "--key-location",
        "--key",
        "--count",
        "--name",
        "--region",
        "--start-tcp",
        "--force",
    ] {
        assert!(help.contains(flag), "missing {flag} in --help output");
    }
}
