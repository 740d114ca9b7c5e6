//! The outer identification loop.
//!
//! Starting from the clique lower bound, the loop encodes the coloring
//! problem for k colors, asks the oracle, and either reconstructs the DFA
//! from the model or moves on to k + 1. Starting at the clique size is
//! sound because the clique edges forbid any smaller coloring, and growing
//! k preserves satisfiability.

use std::fmt::Display;
use std::hash::Hash;

use thiserror::Error;
use tracing::{debug, info};

use crate::apta::Apta;
use crate::constraints::ConstraintsGraph;
use crate::dfa::{Dfa, DfaBuildError};
use crate::encoding::{EncodingError, ProblemEncoding};
use crate::solver::{self, SatOracle, SolverError};

/// Tunables of the identification loop.
#[derive(Debug, Clone)]
pub struct IdentifyOptions {
    /// Safety ceiling on the number of colors tried.
    pub k_max: usize,
    /// Whether to emit the redundant clause families. They enlarge the
    /// formula but prune the search, and they force a complete transition
    /// function onto the reconstructed DFA.
    pub redundant_clauses: bool,
}

impl Default for IdentifyOptions {
    fn default() -> Self {
        Self {
            k_max: 100,
            redundant_clauses: true,
        }
    }
}

/// Failure of an identification run.
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// The encoding rejected its inputs.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The oracle failed fatally (timeout or io).
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// A model could not be turned into a DFA.
    #[error("model reconstruction failed: {0}")]
    Reconstruction(#[from] DfaBuildError),
    /// All color counts up to the ceiling were unsatisfiable.
    #[error("no consistent DFA with fewer than {k_max} states")]
    KMaxExhausted {
        /// The ceiling that was reached.
        k_max: usize,
    },
}

/// Learns the smallest DFA consistent with the APTA, asking `oracle` for
/// one color count after the other.
pub fn identify_dfa<L, O>(
    apta: &Apta<L>,
    oracle: &O,
    options: &IdentifyOptions,
) -> Result<Dfa<L>, IdentifyError>
where
    L: Clone + Eq + Hash + Display,
    O: SatOracle,
{
    let cg = ConstraintsGraph::new(apta);
    let clique = cg.clique();
    info!(
        "identifying over {} states, {} conflicts, clique lower bound {}",
        cg.size(),
        cg.edge_count(),
        clique.len()
    );

    let start = clique.len().max(1);
    for colors in start..options.k_max {
        debug!("trying {colors} colors");
        let mut encoding = ProblemEncoding::new(apta, &cg, &clique, colors)?;
        encoding.generate_clauses();
        if options.redundant_clauses {
            encoding.generate_redundant_clauses();
        }

        match solver::solve(&mut encoding, oracle)? {
            Some(solution) => {
                info!("satisfiable with {colors} colors");
                return Ok(solver::reconstruct(&encoding, &solution)?);
            }
            None => continue,
        }
    }

    Err(IdentifyError::KMaxExhausted {
        k_max: options.k_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::DimacsInstance;
    use crate::solver::{SatOutcome, SolverError};

    /// Oracle that answers unsatisfiable no matter what.
    struct Pessimist;

    impl SatOracle for Pessimist {
        fn solve(&self, _: &DimacsInstance) -> Result<SatOutcome, SolverError> {
            Ok(SatOutcome::Unsat)
        }
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut apta = Apta::new();
        apta.accept(&['a']);
        apta.reject(&['b']);

        let options = IdentifyOptions {
            k_max: 5,
            ..Default::default()
        };
        let err = identify_dfa(&apta, &Pessimist, &options).unwrap_err();
        assert!(matches!(err, IdentifyError::KMaxExhausted { k_max: 5 }));
    }

    #[test]
    fn solver_failures_are_fatal() {
        struct Broken;
        impl SatOracle for Broken {
            fn solve(&self, _: &DimacsInstance) -> Result<SatOutcome, SolverError> {
                Err(SolverError::Timeout(std::time::Duration::from_secs(1)))
            }
        }

        let mut apta = Apta::new();
        apta.accept(&['a']);
        apta.reject(&['b']);

        let err = identify_dfa(&apta, &Broken, &IdentifyOptions::default()).unwrap_err();
        assert!(matches!(err, IdentifyError::Solver(SolverError::Timeout(_))));
    }
}
