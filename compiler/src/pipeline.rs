// pipeline.rs — Compilation state and pass orchestration
//
// Holds the statement tree produced by every pass and runs the minimal
// prefix of passes for a given terminal PassId.
//
// Preconditions: the module must be set before calling run_pipeline.
// Postconditions: the trees of all required passes are populated, or has_error is set.
// Failure modes: a pass raising `LowerError`; lowering cert failure.
// Side effects: calls on_pass_complete after each pass for immediate display;
//   logs per-pass timing at info level.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::acquire_scope::expand_acquire_nodes;
use crate::config::{LowerOptions, RuntimeSymbols};
use crate::consume_scope::tighten_consume_nodes;
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::env::Environment;
use crate::error::LowerError;
use crate::fork_scope::tighten_fork_nodes;
use crate::init_semaphores::initialize_semaphores;
use crate::ir::Stmt;
use crate::module::Module;
use crate::pass::{descriptor, required_passes, PassId, StageCert, ALL_PASSES};
use crate::split::split_async_producers;
use crate::verify::{verify_lowering, LoweringCert};

// ── Single pass ────────────────────────────────────────────────────────────

/// Apply one lowering pass to `input`.
pub fn run_pass(
    pass: PassId,
    input: &Stmt,
    env: &Environment,
    runtime: &RuntimeSymbols,
) -> Result<Stmt, LowerError> {
    match pass {
        PassId::TightenConsume => Ok(tighten_consume_nodes(input)),
        PassId::ForkProducers => split_async_producers(input, env, runtime),
        PassId::ExpandAcquires => Ok(expand_acquire_nodes(input)),
        PassId::TightenForks => Ok(tighten_fork_nodes(input)),
        PassId::InitSemaphores => initialize_semaphores(input, runtime),
    }
}

/// Lower every async function in `s` into forked producer/consumer tasks
/// synchronized by explicitly initialized semaphores.
pub fn fork_async_producers(
    s: &Stmt,
    env: &Environment,
    options: &LowerOptions,
) -> Result<Stmt, LowerError> {
    let mut current = s.clone();
    for pass in ALL_PASSES {
        current = run_pass(pass, &current, env, &options.runtime)?;
    }
    Ok(current)
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for hermetic builds and cache-key use.
///
/// `source_hash`: SHA-256 of the raw module text.
/// `options_fingerprint`: SHA-256 of `LowerOptions::canonical_json()`.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub options_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the options fingerprint (64 characters).
    pub fn options_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.options_fingerprint)
    }

    /// Pretty JSON for `--emit build-info`.
    pub fn to_json(&self) -> String {
        let value = serde_json::json!({
            "source_hash": self.source_hash_hex(),
            "options_fingerprint": self.options_fingerprint_hex(),
            "compiler_version": self.compiler_version,
            "passes": ALL_PASSES.iter().map(|p| descriptor(*p).name).collect::<Vec<_>>(),
        });
        format!("{value:#}\n")
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// Compute provenance from module text and lowering options.
pub fn compute_provenance(source: &str, options: &LowerOptions) -> Provenance {
    Provenance {
        source_hash: sha256(source),
        options_fingerprint: sha256(&options.canonical_json()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Statement trees left behind by each pass, in pass order.
#[derive(Debug, Default)]
pub struct Artifacts {
    pub consume_tightened: Option<Stmt>,
    pub forked: Option<Stmt>,
    pub acquire_expanded: Option<Stmt>,
    pub fork_tightened: Option<Stmt>,
    pub lowered: Option<Stmt>,
    pub cert: Option<LoweringCert>,
}

impl Artifacts {
    fn slot(&mut self, pass: PassId) -> &mut Option<Stmt> {
        match pass {
            PassId::TightenConsume => &mut self.consume_tightened,
            PassId::ForkProducers => &mut self.forked,
            PassId::ExpandAcquires => &mut self.acquire_expanded,
            PassId::TightenForks => &mut self.fork_tightened,
            PassId::InitSemaphores => &mut self.lowered,
        }
    }

    /// The tree produced by `pass`, if it ran.
    pub fn get(&self, pass: PassId) -> Option<&Stmt> {
        match pass {
            PassId::TightenConsume => self.consume_tightened.as_ref(),
            PassId::ForkProducers => self.forked.as_ref(),
            PassId::ExpandAcquires => self.acquire_expanded.as_ref(),
            PassId::TightenForks => self.fork_tightened.as_ref(),
            PassId::InitSemaphores => self.lowered.as_ref(),
        }
    }
}

/// Holds the input module, all pass outputs and accumulated diagnostics.
pub struct CompilationState {
    pub module: Module,
    pub artifacts: Artifacts,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
}

impl CompilationState {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            artifacts: Artifacts::default(),
            diagnostics: Vec::new(),
            has_error: false,
        }
    }

    /// `terminal`'s tree wrapped in the module's declarations.
    pub fn output_module(&self, terminal: PassId) -> Option<Module> {
        self.artifacts
            .get(terminal)
            .map(|body| self.module.with_body(body.clone()))
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass '{}' failed", descriptor(self.failing_pass).name)
    }
}

impl std::error::Error for PipelineError {}

// ── Per-pass bookkeeping ───────────────────────────────────────────────────

fn has_error_diags(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

/// Per-pass post-processing: callback, accumulate, timing log, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_error_diags(&diags);
    state.diagnostics.extend(diags);
    info!(
        "{} complete, {:.1}ms",
        descriptor(pass_id).name,
        elapsed.as_secs_f64() * 1000.0
    );
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

fn cert_diagnostics(cert: &LoweringCert) -> Vec<Diagnostic> {
    if cert.all_pass() {
        return Vec::new();
    }
    let mut diag = Diagnostic::error(format!(
        "lowering verification failed: {}",
        cert.failed().join(", ")
    ))
    .with_code(codes::E0600)
    .with_hint("this is a compiler bug; please report it with the input module");
    for name in &cert.unreleased {
        diag = diag.with_cause(format!("semaphore '{name}' is acquired but never released"));
    }
    vec![diag]
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → timing log → error check.
///
/// Preconditions: `state.module` is set.
/// Postconditions: trees for all passes in `required_passes(terminal)` are populated,
///   or `state.has_error` is true.
/// Failure modes: any pass raising `LowerError`; lowering cert failure.
/// Side effects: calls `on_pass_complete` after each pass for immediate diagnostic display.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    options: &LowerOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    let passes = required_passes(terminal);
    debug!(
        "running {} passes for {}",
        passes.len(),
        descriptor(terminal).output
    );

    let mut current = state.module.body.clone();
    for pass_id in passes {
        let t = Instant::now();
        let result = run_pass(pass_id, &current, &state.module.env, &options.runtime);
        let elapsed = t.elapsed();

        let mut diags = Vec::new();
        match result {
            Ok(out) => {
                if pass_id == PassId::InitSemaphores {
                    let cert = verify_lowering(&out, &options.runtime);
                    diags.extend(cert_diagnostics(&cert));
                    state.artifacts.cert = Some(cert);
                }
                *state.artifacts.slot(pass_id) = Some(out.clone());
                current = out;
            }
            Err(err) => diags.push(err.to_diagnostic()),
        }
        finish_pass(state, pass_id, diags, elapsed, &mut on_pass_complete)?;
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    const SIMPLE: &str = "async func f;
func g;
realize f<i32>([0, 10]) {
  produce f { provide f(0) = 1; }
  consume f { g(f(0)); }
}";

    #[test]
    fn orchestrator_matches_the_full_pipeline() {
        let module = parse_module(SIMPLE);
        let options = LowerOptions::default();
        let direct = fork_async_producers(&module.body, &module.env, &options).unwrap();

        let mut state = CompilationState::new(module);
        run_pipeline(&mut state, PassId::InitSemaphores, &options, |_, _| {}).unwrap();
        assert_eq!(state.artifacts.lowered.as_ref(), Some(&direct));
        assert!(state.artifacts.cert.as_ref().unwrap().all_pass());
        assert!(!state.has_error);
    }

    #[test]
    fn terminal_pass_limits_the_prefix() {
        let mut state = CompilationState::new(parse_module(SIMPLE));
        let mut seen = Vec::new();
        run_pipeline(
            &mut state,
            PassId::ForkProducers,
            &LowerOptions::default(),
            |pass, _| seen.push(pass),
        )
        .unwrap();
        assert_eq!(seen, vec![PassId::TightenConsume, PassId::ForkProducers]);
        assert!(state.artifacts.forked.is_some());
        assert!(state.artifacts.lowered.is_none());
        assert!(state.artifacts.cert.is_none());
    }

    #[test]
    fn lowering_error_stops_at_the_failing_pass() {
        let mut state = CompilationState::new(parse_module("realize h<i32>() { h(0); }"));
        let err = run_pipeline(
            &mut state,
            PassId::InitSemaphores,
            &LowerOptions::default(),
            |_, _| {},
        )
        .unwrap_err();
        assert_eq!(err.failing_pass, PassId::ForkProducers);
        assert!(state.has_error);
        assert_eq!(state.diagnostics.len(), 1);
        assert_eq!(state.diagnostics[0].code, Some(codes::E0100));
        assert!(state.artifacts.acquire_expanded.is_none());
        assert_eq!(err.to_string(), "pass 'fork_producers' failed");
    }

    #[test]
    fn output_module_keeps_declarations() {
        let mut state = CompilationState::new(parse_module(SIMPLE));
        run_pipeline(
            &mut state,
            PassId::TightenConsume,
            &LowerOptions::default(),
            |_, _| {},
        )
        .unwrap();
        let out = state.output_module(PassId::TightenConsume).unwrap();
        assert!(out.to_string().starts_with("async func f;\nfunc g;\n"));
        assert!(state.output_module(PassId::ForkProducers).is_none());
    }

    #[test]
    fn failed_cert_becomes_e0600() {
        let cert = LoweringCert {
            a1_no_semaphore_creation_calls: true,
            a2_sync_acquires_released: false,
            unreleased: vec!["f.semaphore_0".to_string()],
        };
        let diags = cert_diagnostics(&cert);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some(codes::E0600));
        assert!(diags[0].message.contains("A2_sync_acquires_released"));
        assert_eq!(diags[0].causes.len(), 1);
    }

    #[test]
    fn provenance_is_deterministic() {
        let options = LowerOptions::default();
        let p1 = compute_provenance(SIMPLE, &options);
        let p2 = compute_provenance(SIMPLE, &options);
        assert_eq!(p1.source_hash, p2.source_hash);
        assert_eq!(p1.options_fingerprint, p2.options_fingerprint);
        assert_eq!(p1.source_hash_hex().len(), 64);

        let mut other = options.clone();
        other.runtime.semaphore_size_bytes = 64;
        let p3 = compute_provenance(SIMPLE, &other);
        assert_ne!(p1.options_fingerprint, p3.options_fingerprint);
    }

    #[test]
    fn provenance_json_lists_fields() {
        let json = compute_provenance("", &LowerOptions::default()).to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["compiler_version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["passes"].as_array().unwrap().len(), 5);
        assert_eq!(
            value["source_hash"],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
