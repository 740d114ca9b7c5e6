//! CNF encoding of the DFA identification problem.
//!
//! Identifying a k-state DFA consistent with an APTA is phrased as coloring
//! the APTA states with k colors, following Heule and Verwer. Three
//! families of variables describe a candidate solution: `x(v,i)` colors
//! state v with i, `y(a,i,j)` says that the DFA moves from color i to color
//! j on label a, and `z(i)` marks color i as accepting. The basic clause
//! set is sufficient for correctness; the redundant set prunes the search
//! and forces a complete transition function onto the model.

use std::fmt::Display;
use std::hash::Hash;

use thiserror::Error;
use tracing::debug;

use crate::apta::{Apta, Response};
use crate::cnf::{Clause, Formula, VarId, VarPool, Variable};
use crate::constraints::ConstraintsGraph;
use crate::graph::StateId;
use crate::math;

/// The semantic role of one encoding variable. Reconstruction of the DFA
/// from a model is a match on this tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingVar<L> {
    /// `x(v,i)`: APTA state `vertex` has color `color`.
    Color {
        /// The APTA state being colored.
        vertex: StateId,
        /// The color assigned to it.
        color: usize,
    },
    /// `x(v,i)` for the root: same boolean as [`EncodingVar::Color`], but
    /// its truth designates the initial DFA state.
    InitialColor {
        /// The root of the APTA.
        vertex: StateId,
        /// The color assigned to it.
        color: usize,
    },
    /// `y(a,i,j)`: from color `from`, the label moves the DFA to color
    /// `to`.
    Transition {
        /// The label of the transition.
        label: L,
        /// Source color.
        from: usize,
        /// Target color.
        to: usize,
    },
    /// `z(i)`: the color is an accepting DFA state.
    Accepting {
        /// The accepting color.
        color: usize,
    },
}

impl<L: Display> EncodingVar<L> {
    /// The unique name that identifies the variable in the pool.
    pub fn name(&self) -> String {
        match self {
            EncodingVar::Color { vertex, color } | EncodingVar::InitialColor { vertex, color } => {
                format!("x_{vertex},{color}")
            }
            EncodingVar::Transition { label, from, to } => format!("y_{label},{from},{to}"),
            EncodingVar::Accepting { color } => format!("z_{color}"),
        }
    }
}

/// The ways in which assembling an encoding can fail. Both are misuses of
/// the interface and surface immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The constraints graph passed in was derived from a different APTA.
    #[error("the constraints graph was not derived from the given APTA")]
    WrongCollaborator,
    /// Fewer colors than clique members were requested.
    #[error("{colors} colors cannot embed a clique of size {clique}")]
    NotEnoughColors {
        /// Requested number of colors.
        colors: usize,
        /// Size of the seed clique.
        clique: usize,
    },
}

/// The coloring encoding for one fixed number of colors.
///
/// Construction allocates all variables; [`ProblemEncoding::generate_clauses`]
/// emits the basic clause families and
/// [`ProblemEncoding::generate_redundant_clauses`] the optional ones.
#[derive(Debug)]
pub struct ProblemEncoding<'a, L> {
    apta: &'a Apta<L>,
    cg: &'a ConstraintsGraph<'a, L>,
    clique: math::Set<StateId>,
    colors: usize,

    pool: VarPool<EncodingVar<L>>,
    /// `x[v][i]`, indexed by state id and color.
    x: Vec<Vec<VarId>>,
    /// `y[label][i][j]`, keyed by label and indexed by source and target
    /// color.
    y: math::Map<L, Vec<Vec<VarId>>>,
    /// `z[i]`, indexed by color.
    z: Vec<VarId>,

    formula: Formula,
}

impl<'a, L> ProblemEncoding<'a, L>
where
    L: Clone + Eq + Hash + Display,
{
    /// Sets up the variables for coloring `apta` with `colors` colors. The
    /// constraints graph must have been derived from exactly this APTA and
    /// the clique must fit into the requested colors.
    pub fn new(
        apta: &'a Apta<L>,
        cg: &'a ConstraintsGraph<'a, L>,
        clique: &math::Set<StateId>,
        colors: usize,
    ) -> Result<Self, EncodingError> {
        if !cg.is_built_on(apta) {
            return Err(EncodingError::WrongCollaborator);
        }
        if colors < clique.len() {
            return Err(EncodingError::NotEnoughColors {
                colors,
                clique: clique.len(),
            });
        }

        let vertices = apta.size();
        let mut pool = VarPool::new();

        let root = apta.root();
        let x = (0..vertices as StateId)
            .map(|vertex| {
                (0..colors)
                    .map(|color| {
                        let tag = if vertex == root {
                            EncodingVar::InitialColor { vertex, color }
                        } else {
                            EncodingVar::Color { vertex, color }
                        };
                        pool.intern(tag.name(), tag)
                    })
                    .collect()
            })
            .collect();

        let mut y: math::Map<L, Vec<Vec<VarId>>> = math::Map::default();
        for label in cg.labels() {
            let grid = (0..colors)
                .map(|from| {
                    (0..colors)
                        .map(|to| {
                            let tag = EncodingVar::Transition {
                                label: label.clone(),
                                from,
                                to,
                            };
                            pool.intern(tag.name(), tag)
                        })
                        .collect()
                })
                .collect();
            y.insert(label.clone(), grid);
        }

        let z = (0..colors)
            .map(|color| {
                let tag = EncodingVar::Accepting { color };
                pool.intern(tag.name(), tag)
            })
            .collect();

        debug!(
            "allocated {} variables for {} states, {} labels, {} colors",
            pool.len(),
            vertices,
            cg.labels().len(),
            colors
        );

        Ok(Self {
            apta,
            cg,
            clique: clique.clone(),
            colors,
            pool,
            x,
            y,
            z,
            formula: Formula::new(),
        })
    }

    /// The number of colors this encoding targets.
    pub fn colors(&self) -> usize {
        self.colors
    }

    /// The formula produced so far.
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// The pool holding all encoding variables.
    pub fn pool(&self) -> &VarPool<EncodingVar<L>> {
        &self.pool
    }

    /// Stores a model value on one variable.
    pub fn assign(&mut self, var: VarId, value: bool) {
        self.pool.assign(var, value);
    }

    /// The variable behind an id.
    pub fn var(&self, id: VarId) -> &Variable<EncodingVar<L>> {
        self.pool.get(id)
    }

    /// Emits the clause families that are always required: clique seeding,
    /// at least one color per state, agreement of accepting and rejecting
    /// states with `z`, the parent relation, and determinism plus totality
    /// of `y`.
    pub fn generate_clauses(&mut self) {
        self.seed_clique();
        self.at_least_one_color();
        self.responses_agree_with_z();
        self.parent_relation_when_colored();
        self.transition_deterministic();
        self.transition_total();
        debug!("basic clause set has {} clauses", self.formula.len());
    }

    /// Emits the optional clause families: at most one color per state,
    /// transitions forcing the child color, and one explicit clause per
    /// conflict edge and color.
    pub fn generate_redundant_clauses(&mut self) {
        self.at_most_one_color();
        self.transition_forces_child();
        self.determinization_conflicts();
        debug!("with redundant clauses: {} clauses", self.formula.len());
    }

    /// Each clique member is pinned to its own color, and that color's
    /// acceptance follows the member's response.
    fn seed_clique(&mut self) {
        let members: Vec<StateId> = self.clique.iter().copied().collect();
        for (color, node) in members.into_iter().enumerate() {
            let mut c = Clause::new();
            c.add_positive(self.x[node as usize][color]);
            self.formula.add_clause(c);

            let mut c = Clause::new();
            match self.cg.response(node) {
                Response::Accept => c.add_positive(self.z[color]),
                Response::Reject => c.add_negated(self.z[color]),
                Response::Unknown => continue,
            }
            self.formula.add_clause(c);
        }
    }

    /// Every state gets at least one color.
    fn at_least_one_color(&mut self) {
        for v in 0..self.x.len() {
            let mut c = Clause::new();
            for i in 0..self.colors {
                c.add_positive(self.x[v][i]);
            }
            self.formula.add_clause(c);
        }
    }

    /// A color taken by an accepting state must be accepting, one taken by
    /// a rejecting state must not be.
    fn responses_agree_with_z(&mut self) {
        let accepting: Vec<StateId> = self.cg.accepting_states().collect();
        let rejecting: Vec<StateId> = self.cg.rejecting_states().collect();
        for i in 0..self.colors {
            for &u in &accepting {
                let mut c = Clause::new();
                c.add_negated(self.x[u as usize][i]);
                c.add_positive(self.z[i]);
                self.formula.add_clause(c);
            }
            for &w in &rejecting {
                let mut c = Clause::new();
                c.add_negated(self.x[w as usize][i]);
                c.add_negated(self.z[i]);
                self.formula.add_clause(c);
            }
        }
    }

    /// Coloring a state and its parent sets the corresponding transition.
    fn parent_relation_when_colored(&mut self) {
        let apta = self.apta;
        for v in apta.states() {
            let Some((p, label)) = apta.parent(v) else {
                continue;
            };
            for i in 0..self.colors {
                for j in 0..self.colors {
                    let mut c = Clause::new();
                    c.add_positive(self.y[label][i][j]);
                    c.add_negated(self.x[p as usize][i]);
                    c.add_negated(self.x[v as usize][j]);
                    self.formula.add_clause(c);
                }
            }
        }
    }

    /// From a fixed color, a label leads to at most one color.
    fn transition_deterministic(&mut self) {
        for grid in self.y.values() {
            for i in 0..self.colors {
                for h in 0..self.colors {
                    for j in (h + 1)..self.colors {
                        let mut c = Clause::new();
                        c.add_negated(grid[i][h]);
                        c.add_negated(grid[i][j]);
                        self.formula.add_clause(c);
                    }
                }
            }
        }
    }

    /// From every color, every label leads somewhere.
    fn transition_total(&mut self) {
        for grid in self.y.values() {
            for i in 0..self.colors {
                let mut c = Clause::new();
                for j in 0..self.colors {
                    c.add_positive(grid[i][j]);
                }
                self.formula.add_clause(c);
            }
        }
    }

    /// Every state gets at most one color.
    fn at_most_one_color(&mut self) {
        for v in 0..self.x.len() {
            for i in 0..self.colors {
                for j in (i + 1)..self.colors {
                    let mut c = Clause::new();
                    c.add_negated(self.x[v][i]);
                    c.add_negated(self.x[v][j]);
                    self.formula.add_clause(c);
                }
            }
        }
    }

    /// A set transition propagates the color onto the child state.
    fn transition_forces_child(&mut self) {
        let apta = self.apta;
        for v in apta.states() {
            let Some((p, label)) = apta.parent(v) else {
                continue;
            };
            for i in 0..self.colors {
                for j in 0..self.colors {
                    let mut c = Clause::new();
                    c.add_negated(self.y[label][i][j]);
                    c.add_negated(self.x[p as usize][i]);
                    c.add_positive(self.x[v as usize][j]);
                    self.formula.add_clause(c);
                }
            }
        }
    }

    /// Smuggles an empty clause into the formula, to exercise the trivial
    /// contradiction path of the solver bridge.
    #[cfg(test)]
    pub(crate) fn push_empty_clause_for_test(&mut self) {
        self.formula.add_clause(Clause::new());
    }

    /// Conflicting states never share a color, spelled out per edge.
    fn determinization_conflicts(&mut self) {
        let edges: Vec<(StateId, StateId)> = self.cg.constraints().collect();
        for (u, w) in edges {
            for i in 0..self.colors {
                let mut c = Clause::new();
                c.add_negated(self.x[u as usize][i]);
                c.add_negated(self.x[w as usize][i]);
                self.formula.add_clause(c);
            }
        }
    }
}
