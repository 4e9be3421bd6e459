use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(path)
}

/// A `bibmark` command isolated from user config and environment overrides.
fn bibmark(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bibmark").expect("binary exists");
    cmd.current_dir(cwd)
        .env("HOME", cwd)
        .env("XDG_CONFIG_HOME", cwd.join(".config"))
        .env_remove("BIBMARK_BIB_FILE")
        .env_remove("BIBMARK_BIB_DIR")
        .env_remove("BIBMARK_CSL_FILE");
    cmd
}

#[test]
fn help_displays_usage() {
    let temp = tempfile::tempdir().unwrap();
    bibmark(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn render_writes_footnotes_to_stdout() {
    let temp = tempfile::tempdir().unwrap();
    bibmark(temp.path())
        .arg("--bib-file")
        .arg(fixture("paper.bib"))
        .arg("render")
        .arg(fixture("docs/index.md"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Book of Why [^1]"))
        .stdout(predicate::str::contains("[^2]: James D. Hamilton."));
}

#[test]
fn render_reads_stdin() {
    let temp = tempfile::tempdir().unwrap();
    bibmark(temp.path())
        .args(["render", "-", "--bib-file"])
        .arg(fixture("paper.bib"))
        .write_stdin("See [@PM18].\n\n\\bibliography\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("See [^1].\n\n[^1]: Judea Pearl"));
}

#[test]
fn render_without_sources_fails() {
    let temp = tempfile::tempdir().unwrap();
    let page = temp.path().join("page.md");
    fs::write(&page, "[@PM18]").unwrap();
    bibmark(temp.path())
        .arg("render")
        .arg(&page)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Must supply a bibtex file or directory for bibtex files",
        ));
}

#[test]
fn strict_render_rejects_unknown_keys() {
    let temp = tempfile::tempdir().unwrap();
    bibmark(temp.path())
        .args(["--strict", "render", "-", "--bib-file"])
        .arg(fixture("paper.bib"))
        .write_stdin("[@Nobody]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nobody"));
}

#[test]
fn reads_mkdocs_plugin_config() {
    let temp = tempfile::tempdir().unwrap();
    fs::create_dir_all(temp.path().join("refs")).unwrap();
    fs::copy(fixture("paper.bib"), temp.path().join("refs/paper.bib")).unwrap();
    fs::write(
        temp.path().join("mkdocs.yml"),
        "site_name: Test\nplugins:\n  - bibtex:\n      bib_dir: refs\n      bib_command: \"\\\\refs\"\n",
    )
    .unwrap();
    fs::write(temp.path().join("page.md"), "[@Hamilton]\n\n\\refs\n").unwrap();

    bibmark(temp.path())
        .args(["render", "page.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[^1]: James D. Hamilton."));
}

#[test]
fn build_writes_processed_tree() {
    let temp = tempfile::tempdir().unwrap();
    let out = temp.path().join("out");
    bibmark(temp.path())
        .arg("--bib-file")
        .arg(fixture("paper.bib"))
        .arg("build")
        .arg("--docs")
        .arg(fixture("docs"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("processed 2 page(s)"));

    let logic = fs::read_to_string(out.join("guide/logic.md")).unwrap();
    assert!(logic.contains("Incompleteness [^1], again [^2]."));
    assert!(logic.contains("[^1]: Kurt Gödel."));
    assert!(logic.contains("[@NotACitation]"));
    assert!(out.join("index.md").exists());
}

#[test]
fn check_passes_for_known_keys() {
    let temp = tempfile::tempdir().unwrap();
    bibmark(temp.path())
        .arg("--bib-file")
        .arg(fixture("paper.bib"))
        .arg("check")
        .arg("--docs")
        .arg(fixture("docs"))
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn check_reports_unknown_keys() {
    let temp = tempfile::tempdir().unwrap();
    let docs = temp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("page.md"), "fine [@PM18]\nbroken [@nope]\n").unwrap();

    bibmark(temp.path())
        .arg("--bib-file")
        .arg(fixture("paper.bib"))
        .args(["check", "--docs"])
        .arg(&docs)
        .assert()
        .failure()
        .stdout(predicate::str::contains("page.md:2: unknown citation key 'nope'"));
}

#[test]
fn keys_lists_entries_as_json() {
    let temp = tempfile::tempdir().unwrap();
    let output = bibmark(temp.path())
        .arg("--bib-file")
        .arg(fixture("paper.bib"))
        .args(["keys", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let keys: Vec<_> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, ["PM18", "Hamilton", "Godel31"]);
}

#[test]
fn completions_for_bash() {
    let temp = tempfile::tempdir().unwrap();
    bibmark(temp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bibmark"));
}
