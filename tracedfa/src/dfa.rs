//! Deterministic finite-state automata and the builder used to assemble
//! them from a SAT model.

use std::fmt::Display;
use std::hash::Hash;

use thiserror::Error;
use tracing::trace;

use crate::graph::{LabeledGraph, StateId};
use crate::math;
use crate::{Acceptor, ImpossibleTransition};

/// A deterministic finite-state automaton. Each state carries an accept
/// flag; exactly one state is designated as initial.
#[derive(Debug, Clone)]
pub struct Dfa<L> {
    graph: LabeledGraph<L, bool>,
    initial: StateId,
}

impl<L> Dfa<L>
where
    L: Clone + Eq + Hash,
{
    /// The state all parses start from.
    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.graph.size()
    }

    /// Whether the given state accepts.
    pub fn accepting(&self, state: StateId) -> bool {
        *self.graph.data(state)
    }

    /// Follows the transition with the given label.
    pub fn follow(&self, state: StateId, label: &L) -> Option<StateId> {
        self.graph.follow(state, label)
    }

    /// All transitions leaving `state` as (label, target) pairs.
    pub fn transitions_from(&self, state: StateId) -> impl Iterator<Item = (&L, StateId)> {
        self.graph.arcs_from(state)
    }

    /// Iterates all states reachable from the initial one, the initial
    /// state first.
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        // The builder roots the graph at the initial state, so the plain
        // pre-order traversal starts in the right place.
        self.graph.preorder()
    }
}

impl<L> Acceptor<L> for Dfa<L>
where
    L: Clone + Eq + Hash + Display,
{
    /// Runs the automaton on `sequence` and returns the accept flag of the
    /// state reached. A missing transition rejects, or is an
    /// [`ImpossibleTransition`] error when `strict` is set.
    fn parse_binary(&self, sequence: &[L], strict: bool) -> Result<bool, ImpossibleTransition> {
        let mut node = self.initial;
        for label in sequence {
            match self.follow(node, label) {
                Some(next) => node = next,
                None if strict => {
                    return Err(ImpossibleTransition {
                        state: node,
                        label: label.to_string(),
                    })
                }
                None => return Ok(false),
            }
        }
        Ok(self.accepting(node))
    }
}

/// The ways in which assembling a [`Dfa`] can go wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DfaBuildError {
    /// Two arcs with the same source and label but different targets were
    /// requested.
    #[error("conflicting transitions from state {from_state} on the same label: {existing} and {requested}")]
    ConflictingArc {
        /// External id of the source state.
        from_state: usize,
        /// Target the existing transition points to.
        existing: usize,
        /// Conflicting target of the rejected request.
        requested: usize,
    },
    /// No state was ever marked as initial.
    #[error("the automaton has no initial state")]
    MissingInitial,
}

/// Assembles a [`Dfa`] from states named by external integers.
///
/// Every id mentioned in any of the operations allocates a state on first
/// use, so states need not be declared up front. The arcs recorded here are
/// kept as external ids and only materialized by [`DfaBuilder::build`],
/// which roots the automaton at the initial state; states that end up
/// unreachable are still part of the result, states never mentioned are
/// not.
#[derive(Debug, Clone, Default)]
pub struct DfaBuilder<L> {
    accepting: math::Set<usize>,
    arcs: math::Map<(usize, L), usize>,
    mentioned: math::Set<usize>,
    initial: Option<usize>,
}

impl<L> DfaBuilder<L>
where
    L: Clone + Eq + Hash,
{
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            accepting: math::Set::default(),
            arcs: math::Map::default(),
            mentioned: math::Set::default(),
            initial: None,
        }
    }

    /// Ensures the state with the given id exists. Useful to pin an id
    /// order; all other operations touch their arguments implicitly.
    pub fn touch(&mut self, state: usize) {
        self.mentioned.insert(state);
    }

    /// Marks the given state as accepting.
    pub fn set_accepting(&mut self, state: usize) {
        self.touch(state);
        self.accepting.insert(state);
    }

    /// Designates the given state as the initial one. The designation is
    /// exclusive, a later call replaces an earlier one.
    pub fn set_initial(&mut self, state: usize) {
        self.touch(state);
        self.initial = Some(state);
    }

    /// Records a transition. Idempotent for an identical (source, label,
    /// target) triple; a second target for the same source and label is a
    /// [`DfaBuildError::ConflictingArc`].
    pub fn add_arc(&mut self, source: usize, label: L, target: usize) -> Result<(), DfaBuildError> {
        self.touch(source);
        self.touch(target);
        match self.arcs.get(&(source, label.clone())) {
            Some(&existing) if existing != target => Err(DfaBuildError::ConflictingArc {
                from_state: source,
                existing,
                requested: target,
            }),
            Some(_) => Ok(()),
            None => {
                self.arcs.insert((source, label), target);
                Ok(())
            }
        }
    }

    /// Finishes construction. Fails when no initial state was designated.
    pub fn build(self) -> Result<Dfa<L>, DfaBuildError> {
        let initial = self.initial.ok_or(DfaBuildError::MissingInitial)?;

        // The initial state becomes the root of the arena; the remaining
        // mentioned states follow in first-mention order.
        let mut graph = LabeledGraph::with_root(self.accepting.contains(&initial));
        let mut ids: math::Map<usize, StateId> = math::Map::default();
        ids.insert(initial, graph.root());
        for &state in self.mentioned.iter().filter(|&&s| s != initial) {
            let id = graph.add_node(self.accepting.contains(&state));
            ids.insert(state, id);
        }
        for ((source, label), target) in self.arcs {
            graph.add_arc(ids[&source], label, ids[&target]);
        }

        trace!("assembled automaton with {} states", graph.size());
        Ok(Dfa {
            graph,
            initial: 0,
        })
    }
}
