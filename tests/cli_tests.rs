//! End-to-end tests of the cons3rt-kit binary

mod common;

use assert_cmd::Command;
use common::test_fixtures::DeploymentFixture;
use common::test_helpers::{http_ok, HttpStub};
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with its home redirected into `home` and no ambient deployment.
fn cons3rt_kit(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cons3rt-kit").unwrap();
    cmd.env("CONS3RT_KIT_HOME", home.path())
        .env_remove("CONS3RT_KIT_CONFIG")
        .env_remove("DEPLOYMENT_HOME")
        .env_remove("CONS3RT_ROLE_NAME")
        .env_remove("ASSET_DIR")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment helpers for CONS3RT hosts"));
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cons3rt-kit"));
}

#[cfg(unix)]
#[test]
fn test_run_echoes_output_and_creates_home() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .args(["run", "--", "echo", "hello from the host"])
        .assert()
        .success()
        .stdout(predicate::str::contains(">>> hello from the host"))
        .stdout(predicate::str::contains("exit code 0"));

    assert!(home.path().join("conf").is_dir());
    assert!(home.path().join("log").join("cons3rt-kit.log").is_file());
}

#[cfg(unix)]
#[test]
fn test_run_reports_non_zero_exit() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .args(["run", "--quiet", "--", "sh", "-c", "echo partial; exit 4"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("partial"))
        .stderr(predicate::str::contains("Command exited with code 4"));
}

#[cfg(unix)]
#[test]
fn test_run_timeout() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .args(["run", "--timeout", "0.3", "--", "sleep", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("timed out"));
}

#[test]
fn test_run_rejects_oversized_timeout() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .args(["run", "--timeout", "1e20", "--", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation error: timeout"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn test_props_get_by_exact_key_and_regex() {
    let home = TempDir::new().unwrap();
    let fixture = DeploymentFixture::new();
    let file = fixture.properties_file();

    cons3rt_kit(&home)
        .args(["props", "get", "cons3rt.deploymentRun.id", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout("4242\n");

    cons3rt_kit(&home)
        .args(["props", "get", "machine\\.db\\..*internalIp", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout("10.0.0.6\n");

    cons3rt_kit(&home)
        .args(["props", "get", "internalIp", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No single property matches"));
}

#[test]
fn test_props_list_uses_deployment_home_env() {
    let home = TempDir::new().unwrap();
    let fixture = DeploymentFixture::new();

    cons3rt_kit(&home)
        .env("DEPLOYMENT_HOME", &fixture.home)
        .args(["props", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deployment.id=77"))
        .stdout(predicate::str::contains("SLACK_CHANNEL=#deployments"));
}

#[test]
fn test_deployment_info_with_role_from_env() {
    let home = TempDir::new().unwrap();
    let fixture = DeploymentFixture::new();

    cons3rt_kit(&home)
        .env("DEPLOYMENT_HOME", &fixture.home)
        .env("CONS3RT_ROLE_NAME", "web")
        .args(["deployment", "info"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"role_name\s+web").unwrap())
        .stdout(predicate::str::contains("Nightly Build (ID: 4242)"));
}

#[test]
fn test_hosts_set_replaces_then_appends() {
    let home = TempDir::new().unwrap();
    let hosts = home.path().join("hosts");
    std::fs::write(&hosts, "127.0.0.1 localhost\n10.0.0.5 stale\n").unwrap();

    cons3rt_kit(&home)
        .args(["hosts", "set", "10.0.0.5", "web01 web01.local", "--file"])
        .arg(&hosts)
        .assert()
        .success()
        .stdout(predicate::str::contains("Replaced"));

    cons3rt_kit(&home)
        .args(["hosts", "set", "10.0.0.6", "db01", "--file"])
        .arg(&hosts)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added"));

    assert_eq!(
        std::fs::read_to_string(&hosts).unwrap(),
        "127.0.0.1 localhost\n10.0.0.5 web01 web01.local\n10.0.0.6 db01\n"
    );
}

#[test]
fn test_hosts_set_rejects_bad_ip() {
    let home = TempDir::new().unwrap();
    let hosts = home.path().join("hosts");
    std::fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();

    cons3rt_kit(&home)
        .args(["hosts", "set", "10.0.0.256", "web01", "--file"])
        .arg(&hosts)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation error"));
}

#[test]
fn test_ntp_replaces_server_lines() {
    let home = TempDir::new().unwrap();
    let conf = home.path().join("ntp.conf");
    std::fs::write(&conf, "driftfile /var/lib/ntp/drift\nserver 0.pool.ntp.org iburst\n").unwrap();

    cons3rt_kit(&home)
        .args(["ntp", "10.0.0.2", "--conf"])
        .arg(&conf)
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&conf).unwrap(),
        "driftfile /var/lib/ntp/drift\n\nserver 10.0.0.2\n"
    );
}

#[test]
fn test_hostname_rejects_whitespace() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .args(["hostname", "web 01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Validation error: hostname"));
}

#[test]
fn test_service_rejects_unknown_action() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .args(["service", "httpd", "explode", "--systemd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_service_init_flags_conflict() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .args(["service", "httpd", "start", "--systemd", "--sysv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_slack_post_requires_webhook() {
    let home = TempDir::new().unwrap();
    cons3rt_kit(&home)
        .env_remove("SLACK_WEBHOOK_URL")
        .args(["slack", "post", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No Slack webhook URL"));
}

#[test]
fn test_slack_post_sends_message() {
    let home = TempDir::new().unwrap();
    let stub = HttpStub::start(vec![http_ok(b"ok")]);

    cons3rt_kit(&home)
        .args(["slack", "post", "Install complete", "--channel", "#ops", "--webhook"])
        .arg(stub.url("/services/T1/B2/C3"))
        .args(["--attachment", "all 12 packages installed", "--color", "good"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Posted to Slack"));

    let body: serde_json::Value = serde_json::from_str(&stub.requests()[0].body).unwrap();
    assert_eq!(body["text"], "Install complete");
    assert_eq!(body["channel"], "#ops");
    assert_eq!(body["attachments"][0]["color"], "good");
}

#[test]
fn test_invalid_config_is_reported() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.yml");
    std::fs::write(&config, "log_level: loud\n").unwrap();

    cons3rt_kit(&home)
        .arg("--config")
        .arg(&config)
        .args(["props", "list", "--file", "/nonexistent"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
