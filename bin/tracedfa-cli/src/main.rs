use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{filter, prelude::*};

use tracedfa::prelude::*;

/// Learn the smallest DFA consistent with a directory of classified
/// traces and evaluate it on a second directory.
///
/// Trace files hold one trace per line, labels separated by whitespace;
/// a file whose name contains `OK` contributes accepted traces, any other
/// file rejected ones.
#[derive(Debug, Clone, clap::Parser)]
struct Args {
    /// Directory of training trace files.
    train_dir: PathBuf,
    /// Directory of testing trace files.
    test_dir: PathBuf,

    /// SAT solver executable. It must accept a DIMACS file as its only
    /// argument and answer in the SAT competition output format.
    #[clap(long, default_value = "cadical")]
    solver: String,
    /// Timeout for a single solver invocation, in seconds.
    #[clap(long, default_value_t = 3600)]
    timeout: u64,
    /// Give up when no DFA with fewer states exists.
    #[clap(long, default_value_t = 100)]
    k_max: usize,
    /// Emit only the minimal sufficient clause set. The learned DFA may
    /// then lack transitions for unobserved labels.
    #[clap(long)]
    minimal: bool,
    /// Write the learned DFA as a graphviz file to this path.
    #[clap(long)]
    dot: Option<PathBuf>,
    /// Log verbosity.
    #[clap(short, long, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    verbosity: String,
}

fn setup_logging(verbosity: &str) {
    let level = match verbosity {
        "error" => filter::LevelFilter::ERROR,
        "warn" => filter::LevelFilter::WARN,
        "debug" => filter::LevelFilter::DEBUG,
        "trace" => filter::LevelFilter::TRACE,
        _ => filter::LevelFilter::INFO,
    };

    let stdout_log = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(stdout_log.with_filter(level))
        .init();
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let training = TraceSample::from_dir(&args.train_dir)?;
    info!(
        "training on {} traces from {}",
        training.len(),
        args.train_dir.display()
    );
    let apta = training.to_apta();

    let scratch = std::env::temp_dir().join("tracedfa").join("encoding.cnf");
    let oracle = ExternalSolver::new(
        &args.solver,
        Duration::from_secs(args.timeout),
        scratch,
    );
    let options = IdentifyOptions {
        k_max: args.k_max,
        redundant_clauses: !args.minimal,
    };

    let dfa = identify_dfa(&apta, &oracle, &options)?;
    info!("learned a DFA with {} states", dfa.size());

    if let Some(path) = &args.dot {
        std::fs::write(path, dfa.dot_representation())?;
        info!("wrote {}", path.display());
    }

    let testing = TraceSample::from_dir(&args.test_dir)?;
    let consistency = testing.consistency(&dfa)?;
    info!(
        "consistent on {:.1}% of {} test traces",
        consistency * 100.0,
        testing.len()
    );
    println!("{consistency}");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(&args.verbosity);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
