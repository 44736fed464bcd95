use clap::Parser;
use std::path::PathBuf;

use pfc::config::LowerOptions;
use pfc::pass::PassId;
use pfc::pipeline::{compute_provenance, run_pipeline, CompilationState};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    ConsumeTightened,
    Forked,
    AcquireExpanded,
    ForkTightened,
    Lowered,
    BuildInfo,
}

impl EmitStage {
    fn terminal(self) -> Option<PassId> {
        match self {
            EmitStage::ConsumeTightened => Some(PassId::TightenConsume),
            EmitStage::Forked => Some(PassId::ForkProducers),
            EmitStage::AcquireExpanded => Some(PassId::ExpandAcquires),
            EmitStage::ForkTightened => Some(PassId::TightenForks),
            EmitStage::Lowered => Some(PassId::InitSemaphores),
            EmitStage::BuildInfo => None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pfc",
    version,
    about = "Pixelflow compiler middle-end: lowers async producers into forked, semaphore-synchronized tasks"
)]
struct Cli {
    /// Input textual IR module
    source: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Lowered)]
    emit: EmitStage,

    /// JSON file overriding the runtime symbol names
    #[arg(long)]
    runtime_config: Option<PathBuf>,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    log::info!("source = {}", cli.source.display());
    log::info!("emit   = {:?}", cli.emit);

    // ── Load runtime config ──
    let options = match &cli.runtime_config {
        Some(path) => match LowerOptions::load(path) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("pfc: error: {}", e);
                std::process::exit(2);
            }
        },
        None => LowerOptions::default(),
    };

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("pfc: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    let provenance = compute_provenance(&source, &options);
    log::debug!("source hash {}", provenance.source_hash_hex());

    let Some(terminal) = cli.emit.terminal() else {
        write_output(&cli.output, &provenance.to_json());
        return;
    };

    let parse_result = pfc::parser::parse(&source);
    if !parse_result.errors.is_empty() {
        for diag in parse_result.diagnostics() {
            eprintln!("pfc: {}", diag);
        }
        std::process::exit(1);
    }
    let module = match parse_result.module {
        Some(m) => m,
        None => {
            eprintln!("pfc: parse failed with no output");
            std::process::exit(1);
        }
    };
    log::info!(
        "parsed {} function declarations, {} async",
        module.env.len(),
        module.env.async_count()
    );

    // ── Lowering passes ──
    let mut state = CompilationState::new(module);
    let result = run_pipeline(&mut state, terminal, &options, |_, diags| {
        for diag in diags {
            eprintln!("pfc: {}", diag);
        }
    });
    if let Err(e) = result {
        log::debug!("{}", e);
        std::process::exit(1);
    }

    match state.output_module(terminal) {
        Some(out) => write_output(&cli.output, &out.to_string()),
        None => {
            eprintln!("pfc: pipeline produced no output");
            std::process::exit(1);
        }
    }
}

fn write_output(path: &Option<PathBuf>, text: &str) {
    match path {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("pfc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", text),
    }
}
