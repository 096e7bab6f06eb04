use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn summary_only_prints_scene_without_assets() {
    let assets = tempdir().expect("temp asset dir");
    let mut cmd = Command::cargo_bin("shadow-scene").expect("binary exists");
    cmd.arg(assets.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Scene with 3 objects"))
        .stdout(contains(" - nanosuit (Lit, shadows: yes)"))
        .stdout(contains(" - ground (Lit, shadows: yes) at (0.00, -1.00, 0.00)"))
        .stdout(contains(" - light-cube (Emissive, shadows: no) at (0.00, 10.00, 10.00)"))
        .stdout(contains("light camera at (0.00, 7.07, 7.07)"))
        .stdout(contains("Render mode Fill, flat shading false, spot light off"));
}

#[test]
fn summary_only_does_not_touch_asset_files() {
    let mut cmd = Command::cargo_bin("shadow-scene").expect("binary exists");
    cmd.arg("--summary-only").arg("does/not/exist");
    cmd.assert()
        .success()
        .stderr(contains("nanosuit.obj").not());
}

#[test]
fn unknown_flag_fails_with_usage() {
    let mut cmd = Command::cargo_bin("shadow-scene").expect("binary exists");
    cmd.arg("--fullscreen");
    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("Unknown argument: --fullscreen"))
        .stderr(contains("Usage: shadow-scene"));
}

#[test]
fn two_asset_dirs_are_rejected() {
    let mut cmd = Command::cargo_bin("shadow-scene").expect("binary exists");
    cmd.args(["a", "b", "--summary-only"]);
    cmd.assert()
        .failure()
        .stderr(contains("Only one asset directory"));
}
