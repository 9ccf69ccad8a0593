//! End-to-end tests for the `modfleet` binary.

use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .args(["-c", "user.name=Fleet Tester", "-c", "user.email=tester@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("failed to run git");
    assert!(status.success(), "git {:?} failed", args);
}

/// A committed repository at `root/name` with the given go.mod.
fn go_repo(root: &Path, name: &str, go_mod: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("go.mod"), go_mod).unwrap();
    git(&dir, &["init", "--quiet"]);
    git(&dir, &["add", "-A"]);
    git(&dir, &["commit", "--quiet", "-m", "initial"]);
}

/// a -> b -> c, created in discovery order a, b, c.
fn abc_fleet() -> TempDir {
    let fleet = TempDir::new().unwrap();
    go_repo(
        fleet.path(),
        "a",
        "module example.com/a\n\ngo 1.22\n\nrequire example.com/b v1.0.0\n",
    );
    go_repo(
        fleet.path(),
        "b",
        "module example.com/b\n\ngo 1.22\n\nrequire example.com/c v1.0.0\n",
    );
    go_repo(fleet.path(), "c", "module example.com/c\n\ngo 1.22\n");
    fleet
}

/// The binary with global config isolated from the host.
fn modfleet(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("modfleet").unwrap();
    cmd.env("HOME", home)
        .env_remove("MODFLEET_CONFIG")
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("MODFLEET_LOG")
        .env_remove("GITHUB_TOKEN");
    cmd
}

#[test]
fn list_prints_dependency_order() {
    let fleet = abc_fleet();
    let home = TempDir::new().unwrap();
    let c = fleet.path().join("c");

    modfleet(home.path())
        .arg("--dir")
        .arg(fleet.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("( 1 / 3 ) {}", c.display())))
        .stdout(predicate::str::contains("Found 3 repositories"));
}

#[test]
fn name_only_list_prints_names() {
    let fleet = abc_fleet();
    let home = TempDir::new().unwrap();

    let output = modfleet(home.path())
        .args(["--name-only", "list", "--dir"])
        .arg(fleet.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let names: Vec<&str> = stdout.lines().collect();
    assert_eq!(names, vec!["c", "b", "a"]);
}

#[test]
fn filter_narrows_the_chain() {
    let fleet = abc_fleet();
    let home = TempDir::new().unwrap();

    let output = modfleet(home.path())
        .args(["--name-only", "--filter", "example.com/b", "list", "--dir"])
        .arg(fleet.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "a");
}

#[test]
fn missing_directory_fails() {
    let home = TempDir::new().unwrap();

    modfleet(home.path())
        .args(["list", "--dir", "/definitely/not/here"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/definitely/not/here"));
}

#[test]
fn completion_generates_script() {
    let home = TempDir::new().unwrap();

    modfleet(home.path())
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("modfleet"));
}

#[test]
fn config_init_then_path() {
    let fleet = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();

    modfleet(home.path())
        .args(["config", "init", "--dir"])
        .arg(fleet.path())
        .assert()
        .success();
    assert!(fleet.path().join(".modfleet/config.toml").exists());

    modfleet(home.path())
        .args(["config", "init", "--dir"])
        .arg(fleet.path())
        .assert()
        .failure();

    modfleet(home.path())
        .args(["config", "path", "--dir"])
        .arg(fleet.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("workspace:"))
        .stdout(predicate::str::contains("(not present)").count(1));
}

#[test]
fn draft_without_pr_is_a_usage_error() {
    let home = TempDir::new().unwrap();

    modfleet(home.path())
        .args(["sync", "--draft"])
        .assert()
        .code(2);
}
