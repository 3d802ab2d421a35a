//! CLI integration tests for keel.
//!
//! These tests drive the binary end to end: packing intermediates into a
//! library, inspecting it and unpacking its payloads.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the keel binary command, isolated from the user's global config.
fn keel(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("keel").unwrap();
    cmd.current_dir(dir).env("HOME", dir).env_remove("KEEL_COMPRESSION");
    cmd
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

const PRODUCT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<intermediate xmlns="urn:keel:intermediate" version="4.0.0.0">
  <section id="MyProduct" type="product" codepage="1252">
    <table name="Property">
      <row sourceLineNumber="product.wxs(3)"><field>ProductName</field><field>My Product</field></row>
    </table>
  </section>
</intermediate>"#;

const BINARIES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<intermediate xmlns="urn:keel:intermediate" version="4.0.0.0">
  <section type="fragment">
    <table name="Binary">
      <row sourceLineNumber="binaries.wxs(1)"><field>Logo</field><field>logo.png</field></row>
    </table>
    <table name="Property">
      <row sourceLineNumber="binaries.wxs(2)"><field>ProductName</field><field>Other</field></row>
    </table>
  </section>
</intermediate>"#;

const EN_US: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Localization xmlns="urn:keel:localization" Culture="en-us" Codepage="1252">
  <String Id="Title">Setup</String>
  <UI Dialog="Welcome" Control="Next" Width="60">Next</UI>
</Localization>"#;

/// Write a small project: two intermediates, a localization and a payload.
fn project(dir: &Path) {
    fs::create_dir_all(dir.join("obj")).unwrap();
    fs::create_dir_all(dir.join("assets")).unwrap();
    fs::write(dir.join("obj/product.wixobj"), PRODUCT).unwrap();
    fs::write(dir.join("obj/binaries.wixobj"), BINARIES).unwrap();
    fs::write(dir.join("en-us.wxl"), EN_US).unwrap();
    fs::write(dir.join("assets/logo.png"), b"not really a png").unwrap();
}

fn pack(dir: &Path) {
    keel(dir)
        .args([
            "lib",
            "obj/*.wixobj",
            "-l",
            "*.wxl",
            "-b",
            "assets",
            "-o",
            "out/product.wixlib",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Packed 2 section(s), 1 culture(s), 1 payload(s)"));
}

// ============================================================================
// keel lib
// ============================================================================

#[test]
fn test_lib_packs_intermediates() {
    let tmp = temp_dir();
    project(tmp.path());
    pack(tmp.path());

    assert!(tmp.path().join("out/product.wixlib").exists());
}

#[test]
fn test_lib_fails_on_missing_payload() {
    let tmp = temp_dir();
    project(tmp.path());
    fs::remove_file(tmp.path().join("assets/logo.png")).unwrap();

    keel(tmp.path())
        .args(["lib", "obj/*.wixobj", "-b", "assets", "-o", "a.wixlib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("logo.png"))
        .stderr(predicate::str::contains("binaries.wxs(1)"));

    assert!(!tmp.path().join("a.wixlib").exists());
}

#[test]
fn test_lib_without_payloads() {
    let tmp = temp_dir();
    project(tmp.path());
    fs::remove_file(tmp.path().join("assets/logo.png")).unwrap();

    keel(tmp.path())
        .args(["lib", "obj/*.wixobj", "--no-payloads", "-o", "a.wixlib"])
        .assert()
        .success()
        .stderr(predicate::str::contains("0 payload(s)"));
}

#[test]
fn test_lib_rejects_wrong_version() {
    let tmp = temp_dir();
    project(tmp.path());
    fs::write(
        tmp.path().join("obj/product.wixobj"),
        PRODUCT.replace("4.0.0.0", "3.0.0.0"),
    )
    .unwrap();

    keel(tmp.path())
        .args(["lib", "obj/product.wixobj", "-o", "a.wixlib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("3.0.0.0"));

    keel(tmp.path())
        .args([
            "lib",
            "obj/product.wixobj",
            "--suppress-version-check",
            "-o",
            "a.wixlib",
        ])
        .assert()
        .success();
}

#[test]
fn test_lib_uses_project_bind_paths() {
    let tmp = temp_dir();
    project(tmp.path());
    fs::create_dir_all(tmp.path().join(".keel")).unwrap();
    fs::write(
        tmp.path().join(".keel/config.toml"),
        "[library]\nbind_paths = [\"assets\"]\n",
    )
    .unwrap();

    keel(tmp.path())
        .args(["lib", "obj/*.wixobj", "-o", "a.wixlib"])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 payload(s)"));
}

#[test]
fn test_lib_warnings_as_errors() {
    let tmp = temp_dir();
    project(tmp.path());
    fs::write(
        tmp.path().join("obj/empty.wixobj"),
        r#"<intermediate xmlns="urn:keel:intermediate" version="4.0.0.0"/>"#,
    )
    .unwrap();

    keel(tmp.path())
        .args(["lib", "obj/*.wixobj", "-b", "assets", "-o", "a.wixlib"])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning[EmptyIntermediate]"));

    keel(tmp.path())
        .args([
            "lib",
            "obj/*.wixobj",
            "-b",
            "assets",
            "--warnings-as-errors",
            "-o",
            "b.wixlib",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[EmptyIntermediate]"));

    assert!(!tmp.path().join("b.wixlib").exists());
}

// ============================================================================
// keel inspect / extract / symbols
// ============================================================================

#[test]
fn test_inspect_library() {
    let tmp = temp_dir();
    project(tmp.path());
    pack(tmp.path());

    keel(tmp.path())
        .args(["inspect", "out/product.wixlib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(library)"))
        .stdout(predicate::str::contains("section product MyProduct (codepage 1252)"))
        .stdout(predicate::str::contains("culture en-us (codepage 1252): 1 string(s), 1 control(s)"))
        .stdout(predicate::str::contains("payload 0 logo.png 16 bytes"));
}

#[test]
fn test_inspect_library_cultures() {
    let tmp = temp_dir();
    project(tmp.path());
    pack(tmp.path());

    keel(tmp.path())
        .args(["inspect", "out/product.wixlib", "--culture", "de-de"])
        .assert()
        .success()
        .stdout(predicate::str::contains("culture en-us").not());

    fs::create_dir_all(tmp.path().join(".keel")).unwrap();
    fs::write(
        tmp.path().join(".keel/config.toml"),
        "[localization]\ncultures = [\"EN-US\"]\n",
    )
    .unwrap();

    keel(tmp.path())
        .args(["inspect", "out/product.wixlib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("culture en-us"));
}

#[test]
fn test_inspect_intermediate_json() {
    let tmp = temp_dir();
    project(tmp.path());

    let output = keel(tmp.path())
        .args(["inspect", "obj/binaries.wixobj", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["kind"], "intermediate");
    assert_eq!(json["sections"][0]["type"], "fragment");
    assert_eq!(json["sections"][0]["tables"][0]["name"], "Binary");
}

#[test]
fn test_inspect_rejects_foreign_file() {
    let tmp = temp_dir();
    fs::write(tmp.path().join("a.xml"), "<Wix/>").unwrap();

    keel(tmp.path())
        .args(["inspect", "a.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized document root"));
}

#[test]
fn test_extract_payloads() {
    let tmp = temp_dir();
    project(tmp.path());
    pack(tmp.path());

    keel(tmp.path())
        .args(["extract", "out/product.wixlib", "-o", "unpacked"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Extracted 0 `logo.png`"));

    assert_eq!(
        fs::read(tmp.path().join("unpacked/0")).unwrap(),
        b"not really a png"
    );
}

#[test]
fn test_symbols_reports_duplicates() {
    let tmp = temp_dir();
    project(tmp.path());

    keel(tmp.path())
        .args(["symbols", "obj/product.wixobj", "obj/binaries.wixobj", "--duplicates"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Property:ProductName [public] product:MyProduct at product.wxs(3)",
        ))
        .stdout(predicate::str::contains("duplicate [public] fragment at binaries.wxs(2)"))
        .stdout(predicate::str::contains("Binary:Logo").not());
}

// ============================================================================
// keel completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = temp_dir();

    keel(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keel"));
}

#[test]
fn test_completions_to_file() {
    let tmp = temp_dir();

    keel(tmp.path())
        .args(["completions", "zsh", "-o", "completions/_keel"])
        .assert()
        .success();

    let script = fs::read_to_string(tmp.path().join("completions/_keel")).unwrap();
    assert!(script.contains("#compdef keel"));
}
