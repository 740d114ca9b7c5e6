//! Exact identification of minimal deterministic finite automata from
//! labeled traces, by reduction to boolean satisfiability.
//!
//! The pipeline follows Heule and Verwer: the traces are folded into an
//! augmented prefix tree acceptor ([`apta`]), pairwise merge conflicts
//! between its states form a constraints graph whose clique bounds the DFA
//! size from below ([`constraints`]), the coloring of that graph with k
//! colors is encoded into CNF ([`encoding`], [`cnf`]) and handed to an
//! external SAT solver ([`solver`]); a satisfying model is folded back into
//! a DFA ([`dfa`]). The outer loop ([`identify`]) grows k until the first
//! satisfiable encoding.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use thiserror::Error;

/// The augmented prefix tree acceptor built from classified traces.
pub mod apta;
/// Propositional formulas and their DIMACS serialization.
pub mod cnf;
/// The graph of pairwise merge conflicts and its clique lower bound.
pub mod constraints;
/// Deterministic finite automata and the builder assembling them from a
/// model.
pub mod dfa;
/// Rendering of automata to graphviz DOT.
pub mod dot;
/// The labeled graph arena underlying all automata in this crate.
pub mod graph;
/// The outer loop growing the color count until satisfiability.
pub mod identify;
/// Defines some mathematical objects that are used such as bijections,
/// sets and mappings.
pub mod math;
/// Classified trace samples and the directory loader.
pub mod sample;
/// The bridge to the external SAT oracle and DFA reconstruction.
pub mod solver;

/// The CNF encoding of the coloring problem.
pub mod encoding;

/// Strict parsing fell off the automaton: the state had no outgoing
/// transition for the label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("impossible transition from state {state} on label {label:?}")]
pub struct ImpossibleTransition {
    /// The state the parse was stuck in.
    pub state: graph::StateId,
    /// Canonical form of the label that had no transition.
    pub label: String,
}

/// Anything that can classify a sequence of labels as accepted or
/// rejected. Implemented by the prefix tree and by learned DFAs, so that
/// both can be compared against held-out samples.
pub trait Acceptor<L> {
    /// Classifies the sequence. Under `strict`, a missing transition is an
    /// [`ImpossibleTransition`] error; otherwise it counts as rejection.
    fn parse_binary(&self, sequence: &[L], strict: bool) -> Result<bool, ImpossibleTransition>;
}

/// The prelude is supposed to make using this crate easier. Importing
/// everything via `use tracedfa::prelude::*;` should be enough for most
/// consumers.
pub mod prelude {
    pub use crate::apta::{Apta, Response};
    pub use crate::cnf::{Clause, DimacsInstance, Formula, VarId, VarPool};
    pub use crate::constraints::ConstraintsGraph;
    pub use crate::dfa::{Dfa, DfaBuildError, DfaBuilder};
    pub use crate::dot::Dottable;
    pub use crate::encoding::{EncodingError, EncodingVar, ProblemEncoding};
    pub use crate::graph::{LabeledGraph, StateId};
    pub use crate::identify::{identify_dfa, IdentifyError, IdentifyOptions};
    pub use crate::math;
    pub use crate::sample::{compare_on_traces, SampleError, SampleParseError, TraceSample};
    pub use crate::solver::{
        reconstruct, solve, ExternalSolver, SatOracle, SatOutcome, SolverError,
    };
    pub use crate::{Acceptor, ImpossibleTransition};
}
