//! Bridge to the external SAT oracle and reconstruction of a DFA from a
//! satisfying model.
//!
//! The oracle is a pure function over a DIMACS file: it either produces a
//! model or fails. Everything specific to one particular solver lives
//! behind [`SatOracle`], so re-targeting means swapping this single
//! collaborator.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::cnf::{DimacsInstance, VarId};
use crate::dfa::{Dfa, DfaBuildError, DfaBuilder};
use crate::encoding::{EncodingVar, ProblemEncoding};

/// Verdict of one oracle invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    /// Satisfiable, with the model as signed DIMACS literals.
    Sat(Vec<i32>),
    /// Proven unsatisfiable.
    Unsat,
}

/// Failures of the oracle or of the plumbing around it. All of them are
/// fatal to the current identification run.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The oracle did not finish within the configured limit.
    #[error("solver exceeded the timeout of {0:?}")]
    Timeout(Duration),
    /// Reading or writing the scratch files failed.
    #[error("solver io failure: {0}")]
    Io(#[from] std::io::Error),
    /// The oracle produced output this bridge does not understand.
    #[error("unparseable solver output: {0:?}")]
    Unparseable(String),
}

/// The narrow interface to a SAT solver: decide one DIMACS instance.
pub trait SatOracle {
    /// Decides the instance, returning a model for satisfiable inputs.
    fn solve(&self, instance: &DimacsInstance) -> Result<SatOutcome, SolverError>;
}

/// An external SAT solver invoked as a subprocess.
///
/// The instance is written to a scratch file (overwritten on every call,
/// missing parent directories are created) and the solver is started on
/// it. Output is expected in the SAT competition format: a status line
/// `s SATISFIABLE` or `s UNSATISFIABLE`, and for satisfiable instances
/// `v `-prefixed model lines of signed literals terminated by `0`.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    command: String,
    timeout: Duration,
    scratch: PathBuf,
}

impl ExternalSolver {
    /// Interval at which a running solver process is polled.
    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Creates a bridge to the given solver executable, with the scratch
    /// CNF stored at `scratch`.
    pub fn new(command: impl Into<String>, timeout: Duration, scratch: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            timeout,
            scratch: scratch.into(),
        }
    }

    fn parse_output(&self, output: &str) -> Result<SatOutcome, SolverError> {
        if output.lines().any(|l| l.trim() == "s UNSATISFIABLE") {
            return Ok(SatOutcome::Unsat);
        }
        if !output.lines().any(|l| l.trim() == "s SATISFIABLE") {
            let head: String = output.chars().take(200).collect();
            return Err(SolverError::Unparseable(head));
        }

        let mut model = Vec::new();
        for line in output.lines() {
            let Some(rest) = line.trim().strip_prefix('v') else {
                continue;
            };
            for token in rest.split_whitespace() {
                match token.parse::<i32>() {
                    Ok(0) => {}
                    Ok(literal) => model.push(literal),
                    Err(_) => {
                        return Err(SolverError::Unparseable(line.to_string()));
                    }
                }
            }
        }
        Ok(SatOutcome::Sat(model))
    }
}

impl SatOracle for ExternalSolver {
    fn solve(&self, instance: &DimacsInstance) -> Result<SatOutcome, SolverError> {
        instance.write_to(&self.scratch)?;
        debug!(
            "wrote {} variables, {} clauses to {}",
            instance.variables(),
            instance.clauses(),
            self.scratch.display()
        );

        let stdout_path = self.scratch.with_extension("out");
        let stdout_file = std::fs::File::create(&stdout_path)?;
        let started = Instant::now();
        let mut child = Command::new(&self.command)
            .arg(&self.scratch)
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::null())
            .spawn()?;

        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if started.elapsed() >= self.timeout {
                warn!("killing solver after {:?}", started.elapsed());
                child.kill()?;
                child.wait()?;
                return Err(SolverError::Timeout(self.timeout));
            }
            std::thread::sleep(Self::POLL_INTERVAL);
        }

        let output = std::fs::read_to_string(&stdout_path)?;
        let outcome = self.parse_output(&output)?;
        debug!(
            "solver finished in {:?}: {}",
            started.elapsed(),
            match &outcome {
                SatOutcome::Sat(_) => "satisfiable",
                SatOutcome::Unsat => "unsatisfiable",
            }
        );
        Ok(outcome)
    }
}

/// Decides the encoding with the given oracle.
///
/// On a satisfiable outcome the positive literals of the model are
/// translated back into encoding variables, their assignment slots are set
/// and their ids returned. `None` stands for unsatisfiable. A formula
/// containing an empty clause is a contradiction before any search; it is
/// reported as unsatisfiable without bothering the oracle.
pub fn solve<L, O>(
    encoding: &mut ProblemEncoding<'_, L>,
    oracle: &O,
) -> Result<Option<Vec<VarId>>, SolverError>
where
    L: Clone + Eq + std::hash::Hash + std::fmt::Display,
    O: SatOracle,
{
    if encoding.formula().has_empty_clause() {
        debug!("formula contains an empty clause, trivially unsatisfiable");
        return Ok(None);
    }

    let instance = DimacsInstance::new(encoding.formula());
    match oracle.solve(&instance)? {
        SatOutcome::Unsat => Ok(None),
        SatOutcome::Sat(model) => {
            let mut positive = Vec::new();
            for literal in model {
                if literal <= 0 {
                    continue;
                }
                let Some(var) = instance.variable(literal as u32) else {
                    // Solvers may number auxiliary variables past the
                    // instance; those carry no meaning here.
                    trace!("ignoring literal {literal} outside the instance");
                    continue;
                };
                encoding.assign(var, true);
                positive.push(var);
            }
            Ok(Some(positive))
        }
    }
}

/// Rebuilds the DFA described by the positively-assigned variables of a
/// model: accepting flags from `z`, transitions from `y` and the initial
/// state from the root's `x` slot. Plain color variables carry no DFA
/// structure of their own and are skipped.
pub fn reconstruct<L>(
    encoding: &ProblemEncoding<'_, L>,
    solution: &[VarId],
) -> Result<Dfa<L>, DfaBuildError>
where
    L: Clone + Eq + std::hash::Hash + std::fmt::Display,
{
    let mut builder = DfaBuilder::new();
    for &var in solution {
        match encoding.var(var).tag() {
            EncodingVar::Accepting { color } => builder.set_accepting(*color),
            EncodingVar::Transition { label, from, to } => {
                builder.add_arc(*from, label.clone(), *to)?
            }
            EncodingVar::InitialColor { color, .. } => builder.set_initial(*color),
            EncodingVar::Color { .. } => {}
        }
    }
    let dfa = builder.build()?;
    debug!("reconstructed DFA with {} states", dfa.size());
    Ok(dfa)
}
