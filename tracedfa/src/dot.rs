//! Rendering of automata into the graphviz DOT format, for more
//! information on the format see the
//! [graphviz documentation](https://graphviz.org/doc/info/lang.html).

use std::fmt::Display;
use std::hash::Hash;

use itertools::Itertools;

use crate::apta::{Apta, Response};
use crate::dfa::Dfa;

/// Types that can describe themselves as a DOT digraph. Accepting states
/// are drawn as double circles, everything else as plain circles.
pub trait Dottable {
    /// The name of the digraph.
    fn dot_name(&self) -> String;

    /// One line per state: identifier and attribute list.
    fn dot_states(&self) -> Vec<String>;

    /// One line per transition.
    fn dot_transitions(&self) -> Vec<String>;

    /// The complete DOT document.
    fn dot_representation(&self) -> String {
        let header = std::iter::once(format!("digraph \"{}\" {{", self.dot_name()));
        let body = self
            .dot_states()
            .into_iter()
            .chain(self.dot_transitions())
            .map(|line| format!("  {line}"));
        header
            .chain(body)
            .chain(std::iter::once("}".to_string()))
            .join("\n")
    }
}

impl<L> Dottable for Dfa<L>
where
    L: Clone + Eq + Hash + Display,
{
    fn dot_name(&self) -> String {
        "dfa".to_string()
    }

    fn dot_states(&self) -> Vec<String> {
        self.states()
            .map(|q| {
                let shape = if self.accepting(q) {
                    "doublecircle"
                } else {
                    "circle"
                };
                let marker = if q == self.initial() {
                    ", penwidth=2"
                } else {
                    ""
                };
                format!("q{q} [shape={shape}{marker}]")
            })
            .collect()
    }

    fn dot_transitions(&self) -> Vec<String> {
        self.states()
            .flat_map(|q| {
                self.transitions_from(q)
                    .map(move |(label, target)| format!("q{q} -> q{target} [label=\"{label}\"]"))
            })
            .collect()
    }
}

impl<L> Dottable for Apta<L>
where
    L: Clone + Eq + Hash + Display,
{
    fn dot_name(&self) -> String {
        "apta".to_string()
    }

    fn dot_states(&self) -> Vec<String> {
        self.states()
            .map(|q| {
                let shape = match self.response(q) {
                    Response::Accept => "doublecircle",
                    Response::Reject => "square",
                    Response::Unknown => "circle",
                };
                format!("q{q} [shape={shape}]")
            })
            .collect()
    }

    fn dot_transitions(&self) -> Vec<String> {
        self.states()
            .flat_map(|q| {
                self.labels_from(q)
                    .filter_map(move |label| self.follow(q, label).map(|t| (label, t)))
                    .map(move |(label, target)| format!("q{q} -> q{target} [label=\"{label}\"]"))
            })
            .collect()
    }
}
