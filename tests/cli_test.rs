//! Exit status and console output of the `jacoco-lcov` binary.

mod common;

use common::{foo_class, read_records, Workspace};
use jacoco_lcov::testkit::ExecDumpBuilder;
use lcov::Record;
use std::process::{Command, Output};

fn jacoco_lcov(ws: &Workspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jacoco-lcov"))
        .args(args)
        .current_dir(ws.root())
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn fixture() -> Workspace {
    let ws = Workspace::new();
    ws.source("src/com/example/Foo.java");
    ws.write("classes/com/example/Foo.class", foo_class());
    ws.write(
        "jacoco.exec",
        ExecDumpBuilder::new().class(&foo_class(), &[true, true]).build(),
    );
    ws.write("broken.exec", b"not execution data");
    ws
}

#[test]
fn test_successful_conversion() {
    let ws = fixture();
    let output = jacoco_lcov(
        &ws,
        &[
            "--classfiles",
            "classes",
            "--sourcepath",
            "src",
            "-o",
            "coverage.info",
            "jacoco.exec",
        ],
    );

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Coverage data written to coverage.info"), "{}", stdout);

    let records = read_records(&ws.path("coverage.info"));
    assert_eq!(
        records[0],
        Record::TestName {
            name: "coverage.info".into()
        }
    );
    assert!(records.contains(&Record::FunctionsHit { hit: 1 }));
}

#[test]
fn test_relative_source_root_reported_absolute() {
    let ws = fixture();
    let output = jacoco_lcov(
        &ws,
        &["--classfiles", "classes", "--sourcepath", "src", "-o", "out.info", "jacoco.exec"],
    );
    assert_eq!(output.status.code(), Some(0));

    let records = read_records(&ws.path("out.info"));
    let source = records.iter().find_map(|r| match r {
        Record::SourceFile { path } => Some(path.clone()),
        _ => None,
    });
    let source = source.unwrap();
    assert!(source.is_absolute());
    assert!(source.ends_with("src/com/example/Foo.java"));
}

#[test]
fn test_missing_output_is_usage_error() {
    let ws = fixture();
    let output = jacoco_lcov(&ws, &["jacoco.exec"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let ws = fixture();
    let output = jacoco_lcov(&ws, &["-o", "out.info", "--bogus"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_help_exits_cleanly() {
    let ws = fixture();
    let output = jacoco_lcov(&ws, &["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--classfiles"));
}

#[test]
fn test_broken_exec_file_lenient_continues() {
    let ws = fixture();
    let output = jacoco_lcov(
        &ws,
        &[
            "--classfiles",
            "classes",
            "--sourcepath",
            "src",
            "-o",
            "out.info",
            "broken.exec",
            "jacoco.exec",
        ],
    );

    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load execfile broken.exec"), "{}", stderr);
    assert!(ws.path("out.info").exists());
}

#[test]
fn test_broken_exec_file_strict_fails() {
    let ws = fixture();
    let output = jacoco_lcov(
        &ws,
        &[
            "--strict",
            "--classfiles",
            "classes",
            "-o",
            "out.info",
            "broken.exec",
        ],
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(!ws.path("out.info").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.matches("failed to load execfile broken.exec").count(),
        1,
        "{}",
        stderr
    );
}

#[test]
fn test_strict_from_config_file() {
    let ws = fixture();
    ws.write("jacoco-lcov.toml", "strict = true\ntest_name = \"nightly\"\n");
    let output = jacoco_lcov(
        &ws,
        &["--config", "jacoco-lcov.toml", "-o", "out.info", "broken.exec"],
    );
    assert_eq!(output.status.code(), Some(2));

    let output = jacoco_lcov(
        &ws,
        &["--config", "jacoco-lcov.toml", "-o", "out.info", "jacoco.exec"],
    );
    assert_eq!(output.status.code(), Some(0));
    assert!(ws.read("out.info").starts_with("TN:nightly\n"));
}

#[test]
fn test_invalid_config_fails() {
    let ws = fixture();
    ws.write("bad.toml", "strict = \"sometimes\"\n");
    let output = jacoco_lcov(&ws, &["--config", "bad.toml", "-o", "out.info"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("bad.toml"));
}

#[test]
fn test_missing_source_root_fails() {
    let ws = fixture();
    let output = jacoco_lcov(&ws, &["--sourcepath", "no-such-dir", "-o", "out.info"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_verbose_logs_load_counts() {
    let ws = fixture();
    let args = ["--classfiles", "classes", "-o", "out.info", "jacoco.exec"];
    let load_counts = "1 execfiles loaded and 1 classfiles loaded.";

    let quiet = jacoco_lcov(&ws, &args);
    assert_eq!(quiet.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&quiet.stderr);
    assert!(!stderr.contains(load_counts), "{}", stderr);

    let verbose_args: Vec<&str> = std::iter::once("-v").chain(args).collect();
    let verbose = jacoco_lcov(&ws, &verbose_args);
    assert_eq!(verbose.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&verbose.stderr);
    assert!(stderr.contains(load_counts), "{}", stderr);
}

#[test]
fn test_strict_mismatch_reported_once() {
    let ws = fixture();
    ws.write(
        "stale.exec",
        ExecDumpBuilder::new()
            .record(0x1234_5678, "com/example/Foo", &[true])
            .build(),
    );
    let output = jacoco_lcov(
        &ws,
        &[
            "--strict",
            "--classfiles",
            "classes",
            "--sourcepath",
            "src",
            "-o",
            "out.info",
            "stale.exec",
        ],
    );
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.matches("Mismatch in coverage data for com/example/Foo").count(),
        1,
        "{}",
        stderr
    );
}
