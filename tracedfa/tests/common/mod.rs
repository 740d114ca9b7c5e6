//! Test doubles for the SAT oracle, so that the end-to-end scenarios run
//! without an external solver installed.

use std::cell::Cell;

use tracedfa::prelude::*;

/// A tiny DPLL procedure (unit propagation plus splitting) acting as the
/// oracle. It re-reads the rendered DIMACS text, which doubles as a
/// round-trip check of the serialization, and is plenty fast for the
/// instances the scenarios produce.
pub struct DpllOracle;

impl SatOracle for DpllOracle {
    fn solve(&self, instance: &DimacsInstance) -> Result<SatOutcome, SolverError> {
        let (num_vars, clauses) = parse_dimacs(instance.as_str());
        assert_eq!(num_vars, instance.variables());
        assert_eq!(clauses.len(), instance.clauses());

        let mut assignment: Vec<Option<bool>> = vec![None; num_vars + 1];
        if dpll(&clauses, &mut assignment) {
            let model = (1..=num_vars as i32)
                .map(|v| {
                    if assignment[v as usize].unwrap_or(false) {
                        v
                    } else {
                        -v
                    }
                })
                .collect();
            Ok(SatOutcome::Sat(model))
        } else {
            Ok(SatOutcome::Unsat)
        }
    }
}

fn parse_dimacs(text: &str) -> (usize, Vec<Vec<i32>>) {
    let mut num_vars = 0;
    let mut clauses = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("p cnf") {
            let mut parts = rest.split_whitespace();
            num_vars = parts.next().unwrap().parse().unwrap();
            continue;
        }
        let mut clause = Vec::new();
        for token in line.split_whitespace() {
            let literal: i32 = token.parse().unwrap();
            if literal == 0 {
                break;
            }
            clause.push(literal);
        }
        clauses.push(clause);
    }
    (num_vars, clauses)
}

fn literal_value(literal: i32, assignment: &[Option<bool>]) -> Option<bool> {
    assignment[literal.unsigned_abs() as usize].map(|v| v == (literal > 0))
}

fn dpll(clauses: &[Vec<i32>], assignment: &mut Vec<Option<bool>>) -> bool {
    // Unit propagation to fixpoint.
    let mut trail = Vec::new();
    loop {
        let mut propagated = false;
        for clause in clauses {
            let mut unassigned = None;
            let mut satisfied = false;
            let mut open = 0;
            for &literal in clause {
                match literal_value(literal, assignment) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => {}
                    None => {
                        open += 1;
                        unassigned = Some(literal);
                    }
                }
            }
            if satisfied {
                continue;
            }
            match (open, unassigned) {
                (0, _) => {
                    // Conflict: undo everything this call propagated.
                    for &var in &trail {
                        assignment[var] = None;
                    }
                    return false;
                }
                (1, Some(literal)) => {
                    assignment[literal.unsigned_abs() as usize] = Some(literal > 0);
                    trail.push(literal.unsigned_abs() as usize);
                    propagated = true;
                }
                _ => {}
            }
        }
        if !propagated {
            break;
        }
    }

    // Split on the first variable still open in any unsatisfied clause.
    let branch_var = clauses
        .iter()
        .filter(|clause| {
            !clause
                .iter()
                .any(|&l| literal_value(l, assignment) == Some(true))
        })
        .flat_map(|clause| clause.iter())
        .find(|&&l| literal_value(l, assignment).is_none())
        .map(|&l| l.unsigned_abs() as usize);

    let Some(var) = branch_var else {
        return true; // every clause is satisfied
    };
    for value in [true, false] {
        assignment[var] = Some(value);
        if dpll(clauses, assignment) {
            return true;
        }
        assignment[var] = None;
    }

    for var in trail {
        assignment[var] = None;
    }
    false
}

/// Wrapper counting how often the inner oracle is consulted.
pub struct Counting<'a, O> {
    inner: &'a O,
    calls: Cell<usize>,
}

impl<'a, O> Counting<'a, O> {
    pub fn new(inner: &'a O) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl<O: SatOracle> SatOracle for Counting<'_, O> {
    fn solve(&self, instance: &DimacsInstance) -> Result<SatOutcome, SolverError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.solve(instance)
    }
}
