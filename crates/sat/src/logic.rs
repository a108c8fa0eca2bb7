//! Thin boolean layer over the CDCL solver: fresh literals, Tseitin
//! and/or gates, assumption solving, and unsat-core extraction.

use hashbrown::HashMap;
use rustsat::solvers::{Solve, SolveIncremental, SolverResult};
use rustsat::types::{Lit, TernaryVal};
use rustsat_batsat::BasicSolver;

/// A growing CNF formula with gate helpers.
///
/// Gates are cached by operand pair, so re-encoding the conjunction of the
/// same two edge literals returns the same gate literal.
pub struct Formula {
    solver: BasicSolver,
    next_var: u32,
    true_lit: Lit,
    and_cache: HashMap<(Lit, Lit), Lit>,
    or_cache: HashMap<(Lit, Lit), Lit>,
}

impl Default for Formula {
    fn default() -> Self {
        Self::new()
    }
}

impl Formula {
    #[must_use]
    pub fn new() -> Self {
        let mut formula = Self {
            solver: BasicSolver::default(),
            next_var: 0,
            true_lit: Lit::positive(0),
            and_cache: HashMap::new(),
            or_cache: HashMap::new(),
        };
        formula.true_lit = formula.fresh();
        formula.add_clause([formula.true_lit]);
        formula
    }

    /// Allocates a fresh positive literal.
    pub fn fresh(&mut self) -> Lit {
        let var = self.next_var;
        self.next_var += 1;
        Lit::positive(var)
    }

    /// A literal constrained to be true.
    #[must_use]
    pub const fn true_lit(&self) -> Lit {
        self.true_lit
    }

    pub fn add_clause(&mut self, lits: impl IntoIterator<Item = Lit>) {
        self.solver
            .add_clause(lits.into_iter().collect())
            .expect("adding a clause cannot fail");
    }

    /// Gate literal equivalent to `a AND b`.
    pub fn and(&mut self, a: Lit, b: Lit) -> Lit {
        if a == b {
            return a;
        }
        if a == self.true_lit {
            return b;
        }
        if b == self.true_lit {
            return a;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&gate) = self.and_cache.get(&key) {
            return gate;
        }
        let gate = self.fresh();
        self.add_clause([!gate, a]);
        self.add_clause([!gate, b]);
        self.add_clause([gate, !a, !b]);
        self.and_cache.insert(key, gate);
        gate
    }

    /// Gate literal equivalent to `a OR b`.
    pub fn or(&mut self, a: Lit, b: Lit) -> Lit {
        if a == b {
            return a;
        }
        if a == self.true_lit || b == self.true_lit {
            return self.true_lit;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&gate) = self.or_cache.get(&key) {
            return gate;
        }
        let gate = self.fresh();
        self.add_clause([!gate, a, b]);
        self.add_clause([gate, !a]);
        self.add_clause([gate, !b]);
        self.or_cache.insert(key, gate);
        gate
    }

    /// Gate literal equivalent to the conjunction of all `lits`.
    /// The empty conjunction is the true literal.
    pub fn and_all(&mut self, lits: &[Lit]) -> Lit {
        match lits {
            [] => self.true_lit,
            [single] => *single,
            _ => {
                let gate = self.fresh();
                let mut long_clause = vec![gate];
                for &lit in lits {
                    self.add_clause([!gate, lit]);
                    long_clause.push(!lit);
                }
                self.add_clause(long_clause);
                gate
            }
        }
    }

    /// Solves under the given assumptions.
    pub fn solve_assumps(&mut self, assumps: &[Lit]) -> SolverResult {
        self.solver
            .solve_assumps(assumps)
            .expect("the solver runs without limits")
    }

    /// `true` iff `lit` is assigned true in the current model.
    /// Only meaningful after a `Sat` result.
    pub fn value(&self, lit: Lit) -> bool {
        matches!(
            self.solver
                .lit_val(lit)
                .expect("literal was allocated by this formula"),
            TernaryVal::True
        )
    }

    /// The failed assumptions of an `Unsat` result, negated: the solver's
    /// conflict clause restricted to assumption literals.
    pub fn core(&mut self) -> Vec<Lit> {
        self.solver.core().expect("the last result was unsat")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_literal_is_true() {
        let mut formula = Formula::new();
        let t = formula.true_lit();
        assert_eq!(formula.solve_assumps(&[]), SolverResult::Sat);
        assert!(formula.value(t));
    }

    #[test]
    fn and_gate_propagates_both_ways() {
        let mut formula = Formula::new();
        let a = formula.fresh();
        let b = formula.fresh();
        let g = formula.and(a, b);

        assert_eq!(formula.solve_assumps(&[g]), SolverResult::Sat);
        assert!(formula.value(a) && formula.value(b));

        assert_eq!(formula.solve_assumps(&[a, b, !g]), SolverResult::Unsat);
    }

    #[test]
    fn or_gate() {
        let mut formula = Formula::new();
        let a = formula.fresh();
        let b = formula.fresh();
        let g = formula.or(a, b);

        assert_eq!(formula.solve_assumps(&[g, !a]), SolverResult::Sat);
        assert!(formula.value(b));

        assert_eq!(formula.solve_assumps(&[!a, !b, g]), SolverResult::Unsat);
    }

    #[test]
    fn gates_are_cached() {
        let mut formula = Formula::new();
        let a = formula.fresh();
        let b = formula.fresh();
        assert_eq!(formula.and(a, b), formula.and(b, a));
        assert_eq!(formula.or(a, b), formula.or(b, a));
    }

    #[test]
    fn and_all_of_empty_is_true() {
        let mut formula = Formula::new();
        let g = formula.and_all(&[]);
        assert_eq!(g, formula.true_lit());
    }

    #[test]
    fn and_all_requires_every_conjunct() {
        let mut formula = Formula::new();
        let lits = [formula.fresh(), formula.fresh(), formula.fresh()];
        let g = formula.and_all(&lits);

        assert_eq!(formula.solve_assumps(&[g]), SolverResult::Sat);
        assert!(lits.iter().all(|&l| formula.value(l)));

        assert_eq!(
            formula.solve_assumps(&[lits[0], !lits[1], lits[2], g]),
            SolverResult::Unsat
        );
    }

    #[test]
    fn core_contains_negated_failed_assumptions() {
        let mut formula = Formula::new();
        let a = formula.fresh();
        let b = formula.fresh();
        formula.add_clause([!a, !b]);

        assert_eq!(formula.solve_assumps(&[a, b]), SolverResult::Unsat);
        let core = formula.core();
        assert!(!core.is_empty());
        for lit in core {
            assert!(!lit == a || !lit == b);
        }
    }
}
