//! The Augmented Prefix Tree Acceptor.
//!
//! An APTA is a deterministic prefix tree over the labels of the input
//! traces. Every node carries a [`Response`]: the terminal node of an
//! accepted trace answers [`Response::Accept`], that of a rejected trace
//! [`Response::Reject`], and every other node [`Response::Unknown`].

use std::fmt::Display;
use std::hash::Hash;

use tracing::trace;

use crate::graph::{LabeledGraph, StateId};
use crate::{Acceptor, ImpossibleTransition};

/// Classification of a single APTA state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Response {
    /// The state is reached by a trace that must be accepted.
    Accept,
    /// The state is reached by a trace that must be rejected.
    Reject,
    /// Nothing is known about the state.
    #[default]
    Unknown,
}

#[derive(Debug, Clone)]
struct AptaState<L> {
    response: Response,
    /// Origin and label of the incoming arc; `None` only for the root.
    parent: Option<(StateId, L)>,
}

impl<L> Default for AptaState<L> {
    fn default() -> Self {
        Self {
            response: Response::Unknown,
            parent: None,
        }
    }
}

/// Augmented prefix tree acceptor over labels of type `L`.
///
/// The tree is grown with [`Apta::accept`] and [`Apta::reject`], which walk
/// as much of the given trace as already exists and sprout fresh children
/// for the remainder. Since growth only ever extends along existing arcs,
/// determinism holds at all times.
#[derive(Debug, Clone)]
pub struct Apta<L> {
    graph: LabeledGraph<L, AptaState<L>>,
}

impl<L> Default for Apta<L>
where
    L: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<L> Apta<L>
where
    L: Clone + Eq + Hash,
{
    /// Creates an APTA consisting of just the root, which answers
    /// [`Response::Unknown`].
    pub fn new() -> Self {
        Self {
            graph: LabeledGraph::with_root(AptaState::default()),
        }
    }

    /// The root of the tree. All traces are matched from here.
    pub fn root(&self) -> StateId {
        self.graph.root()
    }

    /// Total number of states.
    pub fn size(&self) -> usize {
        self.graph.size()
    }

    /// The response attached to the given state.
    pub fn response(&self, state: StateId) -> Response {
        self.graph.data(state).response
    }

    /// The parent of the given state together with the label on the
    /// incoming arc. `None` for the root.
    pub fn parent(&self, state: StateId) -> Option<(StateId, &L)> {
        self.graph
            .data(state)
            .parent
            .as_ref()
            .map(|(p, l)| (*p, l))
    }

    /// Follows the arc with the given label.
    pub fn follow(&self, state: StateId, label: &L) -> Option<StateId> {
        self.graph.follow(state, label)
    }

    /// Labels of the outgoing arcs of `state`.
    pub fn labels_from(&self, state: StateId) -> impl Iterator<Item = &L> {
        self.graph.labels_from(state)
    }

    /// Iterates all states, depth first in pre-order.
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.graph.preorder()
    }

    /// The set of distinct labels appearing on any arc of the tree, in
    /// first-encounter order.
    pub fn labels(&self) -> crate::math::Set<L> {
        let mut labels = crate::math::Set::default();
        for state in self.states() {
            for label in self.graph.labels_from(state) {
                if !labels.contains(label) {
                    labels.insert(label.clone());
                }
            }
        }
        labels
    }

    /// Creates a fresh child of `parent`, connected by `label`. The parent
    /// back-link of the child is set alongside the arc.
    fn sprout(&mut self, parent: StateId, label: L) -> StateId {
        let child = self.graph.add_node(AptaState::default());
        if let Some(old) = self.graph.add_arc(parent, label.clone(), child) {
            // Cannot happen while growing along missing arcs only, but the
            // back-link invariant must hold regardless.
            self.graph.data_mut(old).parent = None;
        }
        self.graph.data_mut(child).parent = Some((parent, label));
        child
    }

    /// Walks `sequence` from the root as far as the tree exists, extends it
    /// with the remainder and stamps the terminal state with `response`.
    /// Passing [`Response::Unknown`] leaves the tree untouched.
    fn add_sequence(&mut self, sequence: &[L], response: Response) {
        if response == Response::Unknown {
            return;
        }

        let mut node = self.root();
        let mut rest = sequence.iter();
        for label in rest.by_ref() {
            match self.graph.follow(node, label) {
                Some(next) => node = next,
                None => {
                    node = self.sprout(node, label.clone());
                    break;
                }
            }
        }
        for label in rest {
            node = self.sprout(node, label.clone());
        }

        trace!("terminal state {node} now responds {response:?}");
        self.graph.data_mut(node).response = response;
    }

    /// Extends the tree so that `sequence` is accepted.
    pub fn accept(&mut self, sequence: &[L]) {
        self.add_sequence(sequence, Response::Accept);
    }

    /// Extends the tree so that `sequence` is rejected.
    pub fn reject(&mut self, sequence: &[L]) {
        self.add_sequence(sequence, Response::Reject);
    }

    /// Parses `sequence` without modifying the tree. Falling off the tree
    /// yields [`Response::Unknown`].
    pub fn parse(&self, sequence: &[L]) -> Response {
        match self.graph.follow_path(sequence) {
            Some(node) => self.response(node),
            None => Response::Unknown,
        }
    }
}

impl<L> Acceptor<L> for Apta<L>
where
    L: Clone + Eq + Hash + Display,
{
    /// Parses with binary outcome: positive exactly for
    /// [`Response::Accept`]. When `strict` is set, a missing transition is
    /// an [`ImpossibleTransition`] error instead of a plain rejection.
    fn parse_binary(&self, sequence: &[L], strict: bool) -> Result<bool, ImpossibleTransition> {
        let mut node = self.root();
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
        Ok(self.response(node) == Response::Accept)
    }
}
