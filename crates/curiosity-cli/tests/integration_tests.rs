use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("DQN with world-model curiosity"))
        .stdout(predicate::str::contains("pretrain-vae"));
}

#[test]
fn test_cli_list() {
    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available environments:"))
        .stdout(predicate::str::contains("cartpole"))
        .stdout(predicate::str::contains("pixel-grid"));
}

#[test]
fn test_cli_config_prints_defaults() {
    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"buffer_size\": 20000"))
        .stdout(predicate::str::contains("\"eps_half\": 0.08"));
}

#[test]
fn test_cli_config_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.json");

    Command::cargo_bin("curio")
        .unwrap()
        .args(["config", "--out"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    Command::cargo_bin("curio")
        .unwrap()
        .args(["config", "--check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_cli_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{\"buffer_size\": 0}").unwrap();

    Command::cargo_bin("curio")
        .unwrap()
        .args(["config", "--check"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn test_cli_eval_random_policy() {
    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.args(["eval", "cartpole", "--episodes", "2", "--max-steps", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("episodes: 2"))
        .stdout(predicate::str::contains("mean return"));
}

#[test]
fn test_cli_unknown_env() {
    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.args(["eval", "atari"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown environment"));
}

#[test]
#[cfg(not(feature = "torch"))]
fn test_cli_train_needs_torch() {
    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.args(["train", "cartpole", "--steps", "10"])
        .assert()
        .failure();
}

#[test]
#[cfg(feature = "torch")]
fn test_cli_train_short_run() {
    let dir = tempdir().unwrap();
    let metrics = dir.path().join("metrics.json");

    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.args(["train", "cartpole", "--steps", "10", "--checkpoint-interval", "5"])
        .arg("--checkpoint-dir")
        .arg(dir.path())
        .arg("--metrics-out")
        .arg(&metrics)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"train_steps\": 10"));

    assert!(dir.path().join("checkpoint_step_00000010.bin").exists());
    assert!(metrics.exists());
}

#[test]
#[cfg(not(feature = "tensorboard"))]
fn test_cli_tensorboard_needs_feature() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("curio").unwrap();
    cmd.args(["train", "cartpole", "--steps", "10", "--tensorboard"])
        .arg(dir.path().join("tb"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("tensorboard"));
}
