use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn scene_file() -> NamedTempFile {
    let scene = r#"<scene>
  <light>
    <orbit enabled="false"/>
  </light>
  <shadow-map>
    <width>512</width>
    <height>256</height>
  </shadow-map>
  <debug-view>false</debug-view>
</scene>
"#;
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(scene.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn summary_renders_both_passes() {
    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg("--summary-only").arg("--frames").arg("2");
    cmd.assert()
        .success()
        .stdout(contains("Shadow map 1024x1024 (complete)"))
        .stdout(contains(" - program material: linked"))
        .stdout(contains(" - program depth: linked"))
        .stdout(contains("Rendered 2 frame(s)"))
        .stdout(contains(" - depth pass 1024x1024: 3 draw(s)"))
        .stdout(contains(" - color pass 1280x720: 7 draw(s)"));
}

#[test]
fn summary_uses_scene_file() {
    let scene = scene_file();
    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg("--scene").arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Shadow map 512x256 (complete)"))
        .stdout(contains("Rendered 3 frame(s)"))
        .stdout(contains(" - depth pass 512x256: 3 draw(s)"))
        .stdout(contains(" - color pass 1280x720: 6 draw(s)"))
        .stdout(contains("Light at (-0.50, -0.50, 1.00)"));
}

#[test]
fn missing_shaders_still_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg("--shaders")
        .arg(dir.path())
        .arg("--summary-only")
        .arg("--frames")
        .arg("1");
    cmd.assert()
        .success()
        .stdout(contains(" - program material: unusable"))
        .stdout(contains("Rendered 1 frame(s)"));
}

#[test]
fn unknown_argument_fails() {
    let mut cmd = Command::cargo_bin("shadow-mapping").expect("binary exists");
    cmd.arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus").and(contains("Usage:")));
}
