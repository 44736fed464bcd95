// Snapshot tests: lock the printed IR of each lowering stage.
//
// Uses the library API (parse → run_pipeline) on the modules under `demos/`
// and snapshots the Display output of the requested stage. Snapshots are
// managed by `insta` and stored under `compiler/tests/snapshots/`.
//
// Run `cargo insta review` after intentional output changes to update baselines.

use std::path::{Path, PathBuf};

use pfc::config::LowerOptions;
use pfc::pass::PassId;
use pfc::pipeline::{run_pipeline, CompilationState};

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Run parse → passes up to `terminal` and return the printed module.
fn stage_snapshot(source: &str, terminal: PassId) -> String {
    let parse_result = pfc::parser::parse(source);
    assert!(
        parse_result.errors.is_empty(),
        "parse errors: {:?}",
        parse_result.errors
    );
    let mut state = CompilationState::new(parse_result.module.unwrap());
    run_pipeline(&mut state, terminal, &LowerOptions::default(), |_, _| {})
        .unwrap_or_else(|e| panic!("{}: {:?}", e, state_diags(&state)));
    state.output_module(terminal).unwrap().to_string()
}

fn state_diags(state: &CompilationState) -> Vec<String> {
    state.diagnostics.iter().map(|d| d.to_string()).collect()
}

fn snapshot_demo(name: &str, terminal: PassId, stage: &str) {
    let path = project_root().join("demos").join(name);
    let source = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    let output = stage_snapshot(&source, terminal);
    assert!(!output.is_empty(), "empty {} output for {}", stage, name);
    let snap_name = format!("{}_{}", stage, name.replace('.', "_"));
    insta::assert_snapshot!(snap_name, output);
}

#[test]
fn snapshot_single_consumer_lowered() {
    snapshot_demo("single_consumer.pfir", PassId::InitSemaphores, "lowered");
}

#[test]
fn snapshot_two_consumers_forked() {
    snapshot_demo("two_consumers.pfir", PassId::ForkProducers, "forked");
}

#[test]
fn snapshot_two_consumers_lowered() {
    snapshot_demo("two_consumers.pfir", PassId::InitSemaphores, "lowered");
}

#[test]
fn snapshot_tightened_consume_consume_tightened() {
    snapshot_demo(
        "tightened_consume.pfir",
        PassId::TightenConsume,
        "consume_tightened",
    );
}

#[test]
fn snapshot_tightened_consume_lowered() {
    snapshot_demo("tightened_consume.pfir", PassId::InitSemaphores, "lowered");
}

#[test]
fn snapshot_dead_producer_lowered() {
    snapshot_demo("dead_producer.pfir", PassId::InitSemaphores, "lowered");
}
