//! End-to-end identification scenarios, run against the bundled DPLL
//! oracle so that no external solver is required.

mod common;

use common::{Counting, DpllOracle};
use tracedfa::prelude::*;

fn word(s: &str) -> Vec<String> {
    s.chars().map(|c| c.to_string()).collect()
}

fn toy_sample() -> TraceSample<String> {
    TraceSample::new([
        (word("ciao"), true),
        (word("ci"), true),
        (word("ca"), true),
        (word(""), true),
        (word("ciar"), false),
    ])
}

#[test]
fn learns_the_toy_grammar() {
    let sample = toy_sample();
    let apta = sample.to_apta();
    let dfa = identify_dfa(&apta, &DpllOracle, &IdentifyOptions::default()).unwrap();

    assert!(dfa.size() <= 5, "got {} states", dfa.size());
    // Strict parsing reproduces every training classification.
    assert_eq!(sample.consistency(&dfa).unwrap(), 1.0);
}

#[test]
fn unknown_labels_fall_off_the_learned_dfa() {
    let sample = toy_sample();
    let apta = sample.to_apta();
    let dfa = identify_dfa(&apta, &DpllOracle, &IdentifyOptions::default()).unwrap();

    // "ciax" leaves the alphabet on its last step.
    assert!(dfa.parse_binary(&word("ciax"), true).is_err());
    assert_eq!(dfa.parse_binary(&word("ciax"), false), Ok(false));
    // So does "qqq", immediately.
    let err = dfa.parse_binary(&word("qqq"), true).unwrap_err();
    assert_eq!(err.label, "q");
    assert_eq!(dfa.parse_binary(&word("qqq"), false), Ok(false));
}

#[test]
fn conflicting_terminals_force_two_states() {
    // "a" accepted but "aa" rejected: the two terminals conflict directly,
    // so one state can never do and two suffice.
    let mut apta: Apta<String> = Apta::new();
    apta.accept(&word("a"));
    apta.reject(&word("aa"));

    let cg = ConstraintsGraph::new(&apta);
    let a = apta.follow(apta.root(), &"a".to_string()).unwrap();
    let aa = apta.follow(a, &"a".to_string()).unwrap();
    assert!(cg.has_edge(a, aa));
    assert!(cg.clique().len() >= 2);

    let oracle = Counting::new(&DpllOracle);
    let dfa = identify_dfa(&apta, &oracle, &IdentifyOptions::default()).unwrap();
    assert_eq!(dfa.size(), 2);
    // The loop starts at the clique size, so k = 1 was never attempted.
    assert_eq!(oracle.calls(), 1);

    assert_eq!(dfa.parse_binary(&word("a"), true), Ok(true));
    assert_eq!(dfa.parse_binary(&word("aa"), true), Ok(false));
}

/// Sample whose constraints graph has a clique of size three and which is
/// realizable with exactly three states.
fn three_state_sample() -> TraceSample<String> {
    TraceSample::new([
        (word(""), true),
        (word("b"), true),
        (word("a"), false),
        (word("bb"), false),
    ])
}

#[test]
fn clique_lower_bound_is_tight() {
    let sample = three_state_sample();
    let apta = sample.to_apta();
    let cg = ConstraintsGraph::new(&apta);
    assert_eq!(cg.clique().len(), 3);

    let oracle = Counting::new(&DpllOracle);
    let dfa = identify_dfa(&apta, &oracle, &IdentifyOptions::default()).unwrap();

    // First attempt at k = 3 succeeds; k = 1 and k = 2 are never encoded.
    assert_eq!(oracle.calls(), 1);
    assert_eq!(dfa.size(), 3);
    assert_eq!(sample.consistency(&dfa).unwrap(), 1.0);
}

#[test]
fn the_loop_advances_past_unsatisfiable_color_counts() {
    use std::cell::Cell;

    /// Forces the first `n` queries to come back unsatisfiable, then
    /// defers to the real oracle.
    struct Stubborn {
        remaining: Cell<usize>,
    }

    impl SatOracle for Stubborn {
        fn solve(&self, instance: &DimacsInstance) -> Result<SatOutcome, SolverError> {
            if self.remaining.get() > 0 {
                self.remaining.set(self.remaining.get() - 1);
                return Ok(SatOutcome::Unsat);
            }
            DpllOracle.solve(instance)
        }
    }

    let apta = three_state_sample().to_apta();
    let stubborn = Stubborn {
        remaining: Cell::new(2),
    };
    let oracle = Counting::new(&stubborn);
    let dfa = identify_dfa(&apta, &oracle, &IdentifyOptions::default()).unwrap();

    // k = 3 and k = 4 were refused, the first genuine answer is at k = 5.
    assert_eq!(oracle.calls(), 3);
    assert_eq!(dfa.size(), 5);
    assert_eq!(three_state_sample().consistency(&dfa).unwrap(), 1.0);
}

#[test]
fn satisfiability_is_monotone_in_the_color_count() {
    let apta = three_state_sample().to_apta();
    let cg = ConstraintsGraph::new(&apta);
    let clique = cg.clique();

    for colors in clique.len()..clique.len() + 3 {
        let mut encoding = ProblemEncoding::new(&apta, &cg, &clique, colors).unwrap();
        encoding.generate_clauses();
        encoding.generate_redundant_clauses();
        let solution = tracedfa::solver::solve(&mut encoding, &DpllOracle).unwrap();
        assert!(
            solution.is_some(),
            "expected satisfiability with {colors} colors"
        );
    }
}

#[test]
fn minimal_encoding_learns_the_same_language() {
    let sample = three_state_sample();
    let apta = sample.to_apta();
    let options = IdentifyOptions {
        redundant_clauses: false,
        ..Default::default()
    };
    let dfa = identify_dfa(&apta, &DpllOracle, &options).unwrap();
    // The basic clause set alone is already sufficient for correctness.
    for (word, classification) in sample.entries() {
        assert_eq!(dfa.parse_binary(word, false), Ok(classification));
    }
}

#[test]
fn learned_dfa_generalizes_the_toy_grammar() {
    let sample = toy_sample();
    let apta = sample.to_apta();
    let dfa = identify_dfa(&apta, &DpllOracle, &IdentifyOptions::default()).unwrap();

    // Held-out traces: agreement is measured against a fresh sample.
    let held_out = TraceSample::new([(word("ciao"), true), (word("ciar"), false)]);
    assert_eq!(held_out.consistency(&dfa).unwrap(), 1.0);
}

#[test]
fn identification_from_a_trace_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("traces_OK.txt"), "a b\na b a b\n").unwrap();
    std::fs::write(dir.path().join("traces_no.txt"), "a\na b a\nb\n").unwrap();

    let sample = TraceSample::from_dir(dir.path()).unwrap();
    let apta = sample.to_apta();
    let dfa = identify_dfa(&apta, &DpllOracle, &IdentifyOptions::default()).unwrap();
    assert_eq!(sample.consistency(&dfa).unwrap(), 1.0);
}

#[cfg(unix)]
mod external {
    use std::time::Duration;

    use tracedfa::prelude::*;

    fn tiny_instance() -> DimacsInstance {
        let mut pool: VarPool<()> = VarPool::new();
        let a = pool.intern("a".into(), ());
        let mut clause = Clause::new();
        clause.add_positive(a);
        let mut formula = Formula::new();
        formula.add_clause(clause);
        DimacsInstance::new(&formula)
    }

    #[test]
    fn missing_binary_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let solver = ExternalSolver::new(
            "this-solver-does-not-exist",
            Duration::from_secs(5),
            dir.path().join("scratch.cnf"),
        );
        assert!(matches!(
            solver.solve(&tiny_instance()),
            Err(SolverError::Io(_))
        ));
    }

    #[test]
    fn unintelligible_output_is_unparseable() {
        let dir = tempfile::tempdir().unwrap();
        // `echo` prints the scratch path instead of a verdict.
        let solver = ExternalSolver::new(
            "echo",
            Duration::from_secs(5),
            dir.path().join("scratch.cnf"),
        );
        assert!(matches!(
            solver.solve(&tiny_instance()),
            Err(SolverError::Unparseable(_))
        ));
    }

    #[test]
    fn overrunning_solver_times_out() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-solver.sh");
        {
            let mut file = std::fs::File::create(&script).unwrap();
            file.write_all(b"#!/bin/sh\nsleep 10\n").unwrap();
        }
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let solver = ExternalSolver::new(
            script.to_string_lossy(),
            Duration::from_millis(200),
            dir.path().join("scratch.cnf"),
        );
        assert!(matches!(
            solver.solve(&tiny_instance()),
            Err(SolverError::Timeout(_))
        ));
    }

    #[test]
    fn competition_format_round_trips_through_a_fake_solver() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-solver.sh");
        {
            let mut file = std::fs::File::create(&script).unwrap();
            file.write_all(b"#!/bin/sh\necho 's SATISFIABLE'\necho 'v 1 0'\n")
                .unwrap();
        }
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let solver = ExternalSolver::new(
            script.to_string_lossy(),
            Duration::from_secs(5),
            dir.path().join("nested").join("scratch.cnf"),
        );
        assert_eq!(
            solver.solve(&tiny_instance()).unwrap(),
            SatOutcome::Sat(vec![1])
        );
    }
}
