//! The graph of pairwise merge conflicts between APTA states.
//!
//! An edge between two states asserts that no consistent DFA may collapse
//! them into the same state, or in coloring terms: the two endpoints must
//! not share a color. Direct conflicts connect accepting with rejecting
//! states; indirect conflicts are found by probing whether a merge would
//! transitively force a direct conflict. A greedy clique over this graph
//! yields a lower bound on the size of any consistent DFA.

use std::hash::Hash;

use itertools::Itertools;
use tracing::{debug, trace};

use crate::apta::{Apta, Response};
use crate::graph::StateId;
use crate::math;

/// Undirected graph over the states of an APTA whose edges are merge
/// conflicts. Construction walks every unordered pair of states once; the
/// result borrows the APTA it was derived from, which later consumers use
/// to verify provenance.
#[derive(Debug)]
pub struct ConstraintsGraph<'a, L> {
    apta: &'a Apta<L>,
    responses: Vec<Response>,
    adjacency: Vec<math::Set<StateId>>,
    labels: math::Set<L>,
}

impl<'a, L> ConstraintsGraph<'a, L>
where
    L: Clone + Eq + Hash,
{
    /// Derives the conflict graph from the given APTA.
    pub fn new(apta: &'a Apta<L>) -> Self {
        let size = apta.size();
        let mut responses = vec![Response::Unknown; size];
        for state in apta.states() {
            responses[state as usize] = apta.response(state);
        }

        let mut graph = Self {
            apta,
            responses,
            adjacency: vec![math::Set::default(); size],
            labels: apta.labels(),
        };

        // Direct conflicts first: every accepting/rejecting pair.
        for (u, v) in graph.conflicting_pairs() {
            graph.add_edge(u, v);
        }
        let direct = graph.edge_count();
        debug!("added {direct} direct conflicts");

        // Indirect conflicts: any pair whose merge would force an
        // accepting state onto a rejecting one.
        for u in 0..size as StateId {
            for v in (u + 1)..size as StateId {
                if graph.has_edge(u, v) {
                    continue;
                }
                let mut merged: math::Map<StateId, Vec<StateId>> = math::Map::default();
                if !graph.mergeable(u, v, &mut merged) {
                    graph.add_edge(u, v);
                }
            }
        }
        debug!(
            "added {} indirect conflicts, {} edges total",
            graph.edge_count() - direct,
            graph.edge_count()
        );

        graph
    }

    fn conflicting_pairs(&self) -> Vec<(StateId, StateId)> {
        let accepting = self.accepting_states().collect_vec();
        let rejecting = self.rejecting_states().collect_vec();
        accepting
            .into_iter()
            .cartesian_product(rejecting)
            .collect()
    }

    /// Probes whether `u` and `v` can be fused without forcing a conflict.
    ///
    /// Merging two states entails merging, for every label both know, the
    /// respective successors. `merged` is the bookkeeping of one probe: it
    /// records which states the attempt has fused so far, so that a state
    /// adjacent to an earlier fusion partner of the other side fails the
    /// probe.
    fn mergeable(
        &self,
        u: StateId,
        v: StateId,
        merged: &mut math::Map<StateId, Vec<StateId>>,
    ) -> bool {
        if self.has_edge(u, v) {
            return false;
        }

        for label in self.apta.labels_from(u) {
            let Some(vc) = self.apta.follow(v, label) else {
                continue;
            };
            let uc = self
                .apta
                .follow(u, label)
                .expect("label originates from u's own arcs");
            if !self.mergeable(uc, vc, merged) {
                return false;
            }
        }

        for &peer in merged.get(&v).into_iter().flatten() {
            if self.has_edge(u, peer) {
                return false;
            }
        }
        for &peer in merged.get(&u).into_iter().flatten() {
            if self.has_edge(v, peer) {
                return false;
            }
        }
        merged.entry(u).or_default().push(v);
        merged.entry(v).or_default().push(u);
        true
    }

    fn add_edge(&mut self, u: StateId, v: StateId) {
        if u == v {
            return;
        }
        self.adjacency[u as usize].insert(v);
        self.adjacency[v as usize].insert(u);
    }

    /// Whether the two states conflict.
    pub fn has_edge(&self, u: StateId, v: StateId) -> bool {
        self.adjacency[u as usize].contains(&v)
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(math::Set::len).sum::<usize>() / 2
    }

    /// Number of states, identical to that of the source APTA.
    pub fn size(&self) -> usize {
        self.responses.len()
    }

    /// The response the given state inherited from the APTA.
    pub fn response(&self, state: StateId) -> Response {
        self.responses[state as usize]
    }

    /// Whether this graph was derived from exactly the given APTA (not
    /// merely an equal one).
    pub fn is_built_on(&self, apta: &Apta<L>) -> bool {
        std::ptr::eq(self.apta, apta)
    }

    /// The distinct arc labels of the source APTA.
    pub fn labels(&self) -> &math::Set<L> {
        &self.labels
    }

    /// Ids of all accepting states.
    pub fn accepting_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states_responding(Response::Accept)
    }

    /// Ids of all rejecting states.
    pub fn rejecting_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states_responding(Response::Reject)
    }

    fn states_responding(&self, response: Response) -> impl Iterator<Item = StateId> + '_ {
        self.responses
            .iter()
            .enumerate()
            .filter(move |(_, &r)| r == response)
            .map(|(id, _)| id as StateId)
    }

    /// Yields every conflict exactly once, as a pair ordered by id.
    pub fn constraints(&self) -> impl Iterator<Item = (StateId, StateId)> + '_ {
        self.adjacency.iter().enumerate().flat_map(|(u, peers)| {
            let u = u as StateId;
            peers.iter().filter(move |&&v| u < v).map(move |&v| (u, v))
        })
    }

    /// Degree of `state` counting only neighbors from `within`.
    fn degree_within(&self, state: StateId, within: &[StateId]) -> usize {
        within
            .iter()
            .filter(|&&other| self.has_edge(state, other))
            .count()
    }

    /// Greedy clique over one response class. Seeds with the node of
    /// maximum degree inside the class and repeatedly adds the neighbor of
    /// the seed that is adjacent to every member so far, preferring higher
    /// degree. Ties keep the last candidate seen, so between equal degrees
    /// the higher id wins.
    fn monochromatic_clique(&self, members: &[StateId]) -> math::Set<StateId> {
        let mut clique = math::Set::default();
        let Some(seed) = members
            .iter()
            .copied()
            .max_by_key(|&q| (self.degree_within(q, members), q))
        else {
            return clique;
        };
        clique.insert(seed);

        loop {
            let candidate = members
                .iter()
                .copied()
                .filter(|&q| {
                    self.has_edge(seed, q)
                        && !clique.contains(&q)
                        && clique.iter().all(|&m| self.has_edge(q, m))
                })
                .max_by_key(|&q| (self.degree_within(q, members), q));
            match candidate {
                Some(next) => {
                    clique.insert(next);
                }
                None => break,
            }
        }

        trace!("monochromatic clique of size {}", clique.len());
        clique
    }

    /// A clique of this graph, used as a lower bound on the chromatic
    /// number. The union of a greedy clique over the accepting states and
    /// one over the rejecting states is itself a clique, since every
    /// accepting/rejecting pair is connected by a direct conflict.
    pub fn clique(&self) -> math::Set<StateId> {
        let accepting = self.accepting_states().collect_vec();
        let rejecting = self.rejecting_states().collect_vec();

        let mut clique = self.monochromatic_clique(&accepting);
        clique.extend(self.monochromatic_clique(&rejecting));
        debug!("clique lower bound {}", clique.len());
        clique
    }
}
