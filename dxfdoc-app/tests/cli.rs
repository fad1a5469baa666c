use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn dxfdoc(workdir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dxfdoc").expect("binary built");
    cmd.current_dir(workdir.path()).env_remove("DXFDOC_CONFIG");
    cmd
}

#[test]
fn json_summary_for_model_space() {
    let dir = tempfile::tempdir().expect("temp dir");
    dxfdoc(&dir)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""layout": "Model""#))
        .stdout(predicate::str::contains(r#""entities": 8"#))
        .stdout(predicate::str::contains("PDFDEFINITION"));
}

#[test]
fn layout_flag_selects_paper_space() {
    let dir = tempfile::tempdir().expect("temp dir");
    dxfdoc(&dir)
        .args(["--layout", "Layout1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""layout": "Layout1""#))
        .stdout(predicate::str::contains("*Paper_Space"));
}

#[test]
fn unknown_layout_exits_with_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    dxfdoc(&dir)
        .args(["--layout", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nope"));
}

#[test]
fn layout_is_read_from_config_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("dxfdoc.toml");
    let mut file = std::fs::File::create(&path).expect("create config");
    writeln!(file, "[document]\nactive_layout = \"layout1\"").expect("write config");

    dxfdoc(&dir)
        .arg("--config")
        .arg(&path)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""layout": "Layout1""#));
}

#[test]
fn text_output_lists_entity_kinds() {
    let dir = tempfile::tempdir().expect("temp dir");
    dxfdoc(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("*Model_Space"))
        .stdout(predicate::str::contains("UNDERLAY: 1"));
}
