// Integration tests for the `pfc` command line.
//
// These tests verify the observable contract of the binary:
// - each --emit target runs the minimal pass prefix and prints that stage
// - exit codes: 0 success, 1 parse/lowering failure, 2 I/O or config failure
// - --runtime-config renames the runtime entry points in the output

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn pfc_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pfc"))
}

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn demo(name: &str) -> PathBuf {
    project_root().join("demos").join(name)
}

fn run_pfc(args: &[&str]) -> Output {
    Command::new(pfc_binary())
        .args(args)
        .output()
        .expect("failed to run pfc")
}

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pfc_it_{}_{}", test, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Default emit is the fully lowered module.
#[test]
fn default_emit_is_lowered() {
    let path = demo("single_consumer.pfir");
    let output = run_pfc(&[path.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("async func f;\nfunc g;\n"));
    assert!(stdout.contains("intrinsic alloca(16): semaphore"));
    assert!(stdout.contains("extern pf_semaphore_init(f.semaphore_0: semaphore, 0);"));
    assert!(!stdout.contains("pf_make_semaphore"));
}

/// `--emit forked` stops before acquire expansion and semaphore init.
#[test]
fn emit_forked_keeps_creation_calls() {
    let path = demo("single_consumer.pfir");
    let output = run_pfc(&["--emit", "forked", path.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("extern pf_make_semaphore(0): semaphore"));
    assert!(!stdout.contains("alloca"));
}

/// Every stage target succeeds on every demo module.
#[test]
fn all_stage_targets_succeed() {
    let demos = [
        "single_consumer.pfir",
        "two_consumers.pfir",
        "tightened_consume.pfir",
        "dead_producer.pfir",
        "nested_async.pfir",
    ];
    let stages = [
        "consume-tightened",
        "forked",
        "acquire-expanded",
        "fork-tightened",
        "lowered",
    ];
    for name in demos {
        let path = demo(name);
        for stage in stages {
            let output = run_pfc(&["--emit", stage, path.to_str().unwrap()]);
            assert!(
                output.status.success(),
                "pfc --emit {} {} failed.\nstderr: {}",
                stage,
                name,
                String::from_utf8_lossy(&output.stderr)
            );
            assert!(!output.stdout.is_empty(), "empty output for {} {}", stage, name);
        }
    }
}

/// `--emit build-info` prints provenance JSON without parsing the module.
#[test]
fn build_info_is_json() {
    let dir = scratch_dir("build_info");
    let path = dir.join("broken.pfir");
    std::fs::write(&path, "this is not IR {").unwrap();

    let output = run_pfc(&["--emit", "build-info", path.to_str().unwrap()]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["source_hash"].as_str().unwrap().len(), 64);
    assert_eq!(value["options_fingerprint"].as_str().unwrap().len(), 64);
    assert_eq!(value["compiler_version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn output_flag_writes_file() {
    let dir = scratch_dir("output_flag");
    let out = dir.join("lowered.pfir");
    let path = demo("two_consumers.pfir");
    let output = run_pfc(&[path.to_str().unwrap(), "-o", out.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("f.semaphore_1"));
}

#[test]
fn parse_error_exits_1_with_code() {
    let dir = scratch_dir("parse_error");
    let path = dir.join("bad.pfir");
    std::fs::write(&path, "async func f;\nrealize f<i32>( {\n").unwrap();

    let output = run_pfc(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0001]"), "stderr: {}", stderr);
}

#[test]
fn lowering_error_exits_1_with_code() {
    let dir = scratch_dir("lowering_error");
    let path = dir.join("unknown.pfir");
    std::fs::write(&path, "realize h<i32>() { h(0); }\n").unwrap();

    let output = run_pfc(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0100]"), "stderr: {}", stderr);
    assert!(stderr.contains("'h'"));
}

#[test]
fn missing_source_exits_2() {
    let output = run_pfc(&["/nonexistent/module.pfir"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn malformed_runtime_config_exits_2() {
    let dir = scratch_dir("bad_config");
    let config = dir.join("runtime.json");
    std::fs::write(&config, "{ not json").unwrap();
    let path = demo("single_consumer.pfir");

    let output = run_pfc(&[
        "--runtime-config",
        config.to_str().unwrap(),
        path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid runtime config"), "stderr: {}", stderr);
}

/// Overridden symbols appear in the output; the rest keep their defaults.
#[test]
fn runtime_config_renames_entry_points() {
    let dir = scratch_dir("runtime_config");
    let config = dir.join("runtime.json");
    std::fs::write(
        &config,
        r#"{ "runtime": { "semaphore_init": "rt_sema_init", "semaphore_size_bytes": 32 } }"#,
    )
    .unwrap();
    let path = demo("single_consumer.pfir");

    let output = run_pfc(&[
        "--runtime-config",
        config.to_str().unwrap(),
        path.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("extern rt_sema_init(f.semaphore_0: semaphore, 0);"));
    assert!(stdout.contains("intrinsic alloca(32): semaphore"));
    assert!(stdout.contains("extern pf_semaphore_release(f.semaphore_0: semaphore, 1);"));
}

/// `--verbose` reports per-pass timing on stderr.
#[test]
fn verbose_logs_pass_timing() {
    let path = demo("single_consumer.pfir");
    let output = Command::new(pfc_binary())
        .args(["--verbose", path.to_str().unwrap()])
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run pfc");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    for pass in [
        "tighten_consume",
        "fork_producers",
        "expand_acquires",
        "tighten_forks",
        "init_semaphores",
    ] {
        assert!(
            stderr.contains(&format!("{} complete", pass)),
            "missing timing for {}.\nstderr: {}",
            pass,
            stderr
        );
    }
}
