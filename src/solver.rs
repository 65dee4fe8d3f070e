/*!
The backtracking search engine and its incremental clause bookkeeping.

A [`Solver`] is seeded clause-by-clause, solved exactly once, and then
inspected for its verdict, model, and search statistics.
*/

use std::fmt::Display;
use std::time::{Duration, Instant};

use typed_index_collections::TiVec;

use crate::literal::Literal;

use self::inner::{LitTable, Occurrences};

/// Index of a clause within the solver's clause array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClauseIdx(usize);

impl From<usize> for ClauseIdx {
    fn from(index: usize) -> Self {
        ClauseIdx(index)
    }
}

impl From<ClauseIdx> for usize {
    fn from(index: ClauseIdx) -> Self {
        index.0
    }
}

/// Internal modules whose implementation details are hidden from the solver.
mod inner {
    use std::ops::{Index, IndexMut};

    use crate::literal::Literal;

    use super::{ClauseIdx, LitState};

    /// Per-literal adjacency: the clauses each literal appears in.
    ///
    /// Membership is fixed once construction finishes; search only ever
    /// reads these rows.
    #[derive(Debug)]
    pub struct Occurrences {
        rows: Vec<Vec<ClauseIdx>>,
    }

    impl Occurrences {
        pub fn new(num_vars: usize) -> Self {
            Occurrences {
                rows: vec![Vec::new(); num_vars << 1],
            }
        }
    }

    impl Index<Literal> for Occurrences {
        type Output = Vec<ClauseIdx>;

        fn index(&self, literal: Literal) -> &Self::Output {
            &self.rows[literal.code()]
        }
    }

    impl IndexMut<Literal> for Occurrences {
        fn index_mut(&mut self, literal: Literal) -> &mut Self::Output {
            &mut self.rows[literal.code()]
        }
    }

    /// Dense per-literal state, indexed by literal code.
    #[derive(Debug)]
    pub struct LitTable {
        states: Vec<LitState>,
    }

    impl LitTable {
        pub fn new(num_vars: usize) -> Self {
            LitTable {
                states: vec![LitState::default(); num_vars << 1],
            }
        }
    }

    impl Index<Literal> for LitTable {
        type Output = LitState;

        fn index(&self, literal: Literal) -> &Self::Output {
            &self.states[literal.code()]
        }
    }

    impl IndexMut<Literal> for LitTable {
        fn index_mut(&mut self, literal: Literal) -> &mut Self::Output {
            &mut self.states[literal.code()]
        }
    }
}

/// Assignment state for a single literal.
#[derive(Clone, Debug, Default)]
pub struct LitState {
    /// Whether the owning variable currently has a value.
    fixed: bool,
    /// The value this literal takes under that assignment.
    assigned: bool,
    /// Scratch value for the branch heuristic.
    score: usize,
}

/// One clause and its aggregate assignment counters.
///
/// The counters classify the clause as satisfied, unit, or contradicted
/// without scanning the literal list.
#[derive(Clone, Debug, Default)]
struct ClauseState {
    /// Literals in this clause, free and assigned alike.
    lits: Vec<Literal>,
    /// Literals currently assigned true.
    n_assigned_true: usize,
    /// Literals currently assigned false.
    n_assigned_false: usize,
    /// Literals whose variable is unassigned.
    n_free_lits: usize,
}

/// What a false assignment did to a clause.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FalseTransition {
    /// The clause still has free literals or a satisfied one.
    Unresolved,
    /// Exactly one free literal remains and none are satisfied.
    Unit,
    /// Every literal is now assigned and none are satisfied.
    Contradicted,
}

impl ClauseState {
    /// Applies a true assignment to one of the free literals.
    /// Returns whether the clause just became satisfied.
    fn assign_true(&mut self) -> bool {
        debug_assert!(self.n_free_lits > 0);

        let newly_satisfied = self.n_assigned_true == 0;
        self.n_assigned_true += 1;
        self.n_free_lits -= 1;
        newly_satisfied
    }

    /// Applies a false assignment to one of the free literals. A clause can
    /// go from two free literals to one (unit) or from one to none
    /// (contradicted) on a single event, so both transitions are reported.
    fn assign_false(&mut self) -> FalseTransition {
        debug_assert!(self.n_free_lits > 0);

        let contradicted = self.n_assigned_true == 0 && self.n_free_lits == 1;
        self.n_assigned_false += 1;
        self.n_free_lits -= 1;

        if contradicted {
            FalseTransition::Contradicted
        } else if self.n_assigned_true == 0 && self.n_free_lits == 1 {
            FalseTransition::Unit
        } else {
            FalseTransition::Unresolved
        }
    }

    /// Reverses one true assignment.
    /// Returns whether the clause just stopped being satisfied.
    fn undo_true(&mut self) -> bool {
        debug_assert!(self.n_free_lits < self.lits.len());

        self.n_assigned_true -= 1;
        self.n_free_lits += 1;
        self.n_assigned_true == 0
    }

    /// Reverses one false assignment.
    /// Returns whether the clause just stopped being contradicted.
    fn undo_false(&mut self) -> bool {
        debug_assert!(self.n_free_lits < self.lits.len());

        self.n_assigned_false -= 1;
        self.n_free_lits += 1;
        self.n_assigned_true == 0 && self.n_free_lits == 1
    }
}

/// Verdict of a search over assignments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Solution {
    Unknown,
    Satisfiable,
    Unsatisfiable,
}

impl Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = match self {
            Solution::Unknown => "UNKNOWN",
            Solution::Satisfiable => "SATISFIABLE",
            Solution::Unsatisfiable => "UNSATISFIABLE",
        };
        write!(f, "{}", keyword)
    }
}

/// Totals accumulated over one search.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchStats {
    /// Assignments attempted by branching, both polarities counted.
    pub branches: u64,
    /// Assignments forced through unit clauses.
    pub propagations: u64,
    /// Wall-clock duration of the search.
    pub elapsed: Duration,
}

/// A CNF problem instance together with all search state.
#[derive(Debug)]
pub struct Solver {
    n_vars: usize,
    lits: LitTable,
    occurrences: Occurrences,
    clauses: TiVec<ClauseIdx, ClauseState>,
    /// Cache for the number of clauses with a true literal.
    n_sat_clauses: usize,
    /// Cache for the number of clauses with every literal false.
    n_unsat_clauses: usize,
    /// Literals forced by unit clauses, pending propagation.
    unit_stack: Vec<Literal>,
    /// Trail of literals assigned true at the current depth.
    assigned: Vec<Literal>,
    solution: Solution,
    stats: SearchStats,
}

impl Solver {
    /// Creates a solver for `n_vars` variables and `n_clauses` empty
    /// clauses. There must be at least one variable; there can be zero
    /// clauses.
    pub fn new(n_vars: usize, n_clauses: usize) -> Self {
        assert!(n_vars > 0);

        Solver {
            n_vars,
            lits: LitTable::new(n_vars),
            occurrences: Occurrences::new(n_vars),
            clauses: TiVec::from(vec![ClauseState::default(); n_clauses]),
            n_sat_clauses: 0,
            n_unsat_clauses: 0,
            unit_stack: Vec::with_capacity((n_vars << 1) + n_clauses),
            assigned: Vec::with_capacity(n_vars),
            solution: Solution::Unknown,
            stats: SearchStats::default(),
        }
    }

    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    pub fn n_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// The verdict of the last call to [`solve`](Solver::solve), or
    /// [`Solution::Unknown`] if search has not run yet.
    pub fn solution(&self) -> Solution {
        self.solution
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// The current model as signed integers in variable order: `+v` for a
    /// variable assigned true, `-v` for one assigned false. Variables left
    /// unassigned by an early satisfiability cutoff are omitted.
    pub fn assignment(&self) -> Vec<i32> {
        let mut model = Vec::with_capacity(self.n_vars);

        for code in 0..(self.n_vars << 1) {
            let lit = Literal::from_code(code);
            let lstate = &self.lits[lit];
            if lstate.fixed && lstate.assigned {
                model.push(lit.to_dimacs());
            }
        }

        model
    }

    /// Appends `lit` to the clause and records the occurrence. Repeated
    /// literals are ignored: a clause holds at most one copy of each
    /// literal, which `unit_of` relies on to keep the free-literal counter
    /// in step with its scan.
    pub fn add_literal_to_clause(&mut self, clause_index: ClauseIdx, lit: Literal) {
        assert!(lit.var_index() < self.n_vars);

        let cstate = &mut self.clauses[clause_index];
        if cstate.lits.contains(&lit) {
            return;
        }

        cstate.lits.push(lit);
        cstate.n_free_lits += 1;
        self.occurrences[lit].push(clause_index);
    }

    /// Marks clause construction as finished. A clause sealed without any
    /// literal can never be satisfied and is counted as contradicted from
    /// the start.
    pub fn seal_clause(&mut self, clause_index: ClauseIdx) {
        if self.clauses[clause_index].lits.is_empty() {
            self.n_unsat_clauses += 1;
        }
    }

    /// Runs the search, recording the verdict, wall-clock time, and search
    /// statistics. A solver is solved at most once; re-solving is not
    /// supported.
    pub fn solve(&mut self) -> Solution {
        debug!(
            "solving: {} variables, {} clauses",
            self.n_vars,
            self.clauses.len()
        );

        let start = Instant::now();
        let solution = self.search();
        self.stats.elapsed = start.elapsed();
        self.solution = solution;

        debug!(
            "{} in {:?} after {} branches and {} unit propagations",
            solution, self.stats.elapsed, self.stats.branches, self.stats.propagations
        );

        solution
    }

    /// Decides the current state: contradiction, all clauses satisfied, or
    /// branch on the best-scoring literal and recurse over both polarities.
    fn search(&mut self) -> Solution {
        if self.n_unsat_clauses > 0 {
            return Solution::Unsatisfiable;
        } else if self.n_sat_clauses == self.clauses.len() {
            return Solution::Satisfiable;
        }

        let branch = self.choose_branch();
        trace!("branching on {}", branch);

        let solution = self.try_branch(branch);
        if solution != Solution::Unsatisfiable {
            return solution;
        }

        self.try_branch(!branch)
    }

    /// Assigns `branch`, exhausts unit propagation, and recurses. On an
    /// unsatisfiable outcome the trail is rewound to its depth at entry;
    /// on a satisfiable one it is left in place as the model.
    fn try_branch(&mut self, branch: Literal) -> Solution {
        let prev_n_assigned = self.assigned.len();

        self.stats.branches += 1;
        self.assigned.push(branch);
        self.make_assignment(branch);

        let mut conflict = false;
        while let Some(unit) = self.unit_stack.pop() {
            if !self.lits[unit].fixed {
                self.stats.propagations += 1;
                self.assigned.push(unit);
                self.make_assignment(unit);
            } else if !self.lits[unit].assigned {
                // The negation of a forced literal is already assigned.
                conflict = true;
                self.unit_stack.clear();
                break;
            }
        }

        let solution = if conflict {
            Solution::Unsatisfiable
        } else {
            self.search()
        };

        if solution == Solution::Unsatisfiable {
            while self.assigned.len() > prev_n_assigned {
                let lit = self.assigned.pop().unwrap();
                self.undo_assignment(lit);
            }
        }

        solution
    }

    /// Fixes `lit` true and its negation false, then pushes the effect
    /// through every clause containing either polarity. Clauses that become
    /// unit have their forced literal pushed onto the unit stack.
    fn make_assignment(&mut self, lit: Literal) {
        debug_assert!(!self.lits[lit].fixed);
        debug_assert!(!self.lits[!lit].fixed);

        // `unit_of` consults the fixed flags while the counters below are
        // still in motion, so the flags go first.
        self.lits[lit].fixed = true;
        self.lits[lit].assigned = true;
        self.lits[!lit].fixed = true;
        self.lits[!lit].assigned = false;

        for &clause_index in &self.occurrences[lit] {
            if self.clauses[clause_index].assign_true() {
                self.n_sat_clauses += 1;
            }
        }

        for &clause_index in &self.occurrences[!lit] {
            match self.clauses[clause_index].assign_false() {
                FalseTransition::Contradicted => self.n_unsat_clauses += 1,
                FalseTransition::Unit => {
                    let unit = self.unit_of(clause_index);
                    self.unit_stack.push(unit);
                }
                FalseTransition::Unresolved => {}
            }
        }
    }

    /// Exact inverse of [`make_assignment`](Solver::make_assignment). The
    /// unit stack is not popped here; the search loop drains it separately.
    fn undo_assignment(&mut self, lit: Literal) {
        debug_assert!(self.lits[lit].fixed && self.lits[lit].assigned);
        debug_assert!(self.lits[!lit].fixed && !self.lits[!lit].assigned);

        for &clause_index in &self.occurrences[!lit] {
            if self.clauses[clause_index].undo_false() {
                self.n_unsat_clauses -= 1;
            }
        }

        for &clause_index in &self.occurrences[lit] {
            if self.clauses[clause_index].undo_true() {
                self.n_sat_clauses -= 1;
            }
        }

        self.lits[lit].fixed = false;
        self.lits[!lit].fixed = false;
    }

    /// Returns the single remaining free literal of a unit clause.
    fn unit_of(&self, clause_index: ClauseIdx) -> Literal {
        let cstate = &self.clauses[clause_index];
        debug_assert!(cstate.n_free_lits == 1 && cstate.n_assigned_true == 0);

        for &lit in &cstate.lits {
            if !self.lits[lit].fixed {
                return lit;
            }
        }

        unreachable!("unit clause with no free literal")
    }

    /// Recomputes branch scores for every free literal: the sum over its
    /// unsatisfied clauses of a weight favoring short clauses. Binary
    /// clauses weigh 4, ternary 2, anything longer 1.
    fn update_scores(&mut self) {
        for code in 0..(self.n_vars << 1) {
            self.lits[Literal::from_code(code)].score = 0;
        }

        for code in 0..(self.n_vars << 1) {
            let lit = Literal::from_code(code);
            if self.lits[lit].fixed {
                continue;
            }

            let mut score = 0;
            for &clause_index in &self.occurrences[lit] {
                let cstate = &self.clauses[clause_index];
                if cstate.n_assigned_true != 0 {
                    continue;
                }

                score += match cstate.n_free_lits {
                    2 => 4,
                    3 => 2,
                    _ => 1,
                };
            }
            self.lits[lit].score = score;
        }
    }

    /// Picks the branch literal: the unassigned variable maximizing
    /// `(a + 1) * (b + 1)` over its pair of scores, taking the
    /// higher-scoring polarity. The first variable to reach the maximum
    /// keeps it, and equal pair scores prefer the positive polarity.
    fn choose_branch(&mut self) -> Literal {
        debug_assert!(self.assigned.len() != self.n_vars);
        debug_assert!(self.n_sat_clauses != self.clauses.len());

        self.update_scores();

        let mut best_lit = Literal::from_code(0);
        let mut best_score = 0;

        for var_index in 0..self.n_vars {
            let positive = Literal::new(var_index, true);
            if self.lits[positive].fixed {
                continue;
            }

            let a = self.lits[positive].score;
            let b = self.lits[!positive].score;
            let score = (a + 1) * (b + 1);

            if score > best_score {
                best_score = score;
                best_lit = if a >= b { positive } else { !positive };
            }
        }

        best_lit
    }
}

#[cfg(test)]
impl Solver {
    /// Recomputes every aggregate counter from a full scan and asserts the
    /// incremental copies match.
    pub(crate) fn audit_counters(&self) {
        let mut n_sat = 0;
        let mut n_unsat = 0;

        for cstate in self.clauses.iter() {
            let n_true = cstate
                .lits
                .iter()
                .filter(|&&lit| self.lits[lit].fixed && self.lits[lit].assigned)
                .count();
            let n_false = cstate
                .lits
                .iter()
                .filter(|&&lit| self.lits[lit].fixed && !self.lits[lit].assigned)
                .count();
            let n_free = cstate.lits.len() - n_true - n_false;

            assert_eq!(cstate.n_assigned_true, n_true);
            assert_eq!(cstate.n_assigned_false, n_false);
            assert_eq!(cstate.n_free_lits, n_free);

            if n_true > 0 {
                n_sat += 1;
            }
            if n_true == 0 && n_free == 0 {
                n_unsat += 1;
            }
        }

        assert_eq!(self.n_sat_clauses, n_sat);
        assert_eq!(self.n_unsat_clauses, n_unsat);
    }

    /// Snapshot of all clause counters plus the two global caches, for
    /// before/after comparison around balanced assignment sequences.
    pub(crate) fn counter_snapshot(&self) -> (usize, usize, Vec<(usize, usize, usize)>) {
        let per_clause = self
            .clauses
            .iter()
            .map(|cstate| {
                (
                    cstate.n_assigned_true,
                    cstate.n_assigned_false,
                    cstate.n_free_lits,
                )
            })
            .collect();

        (self.n_sat_clauses, self.n_unsat_clauses, per_clause)
    }

    pub(crate) fn clause_len(&self, clause_index: ClauseIdx) -> usize {
        self.clauses[clause_index].lits.len()
    }

    /// Applies an assignment directly, outside the search loop.
    pub(crate) fn apply_assignment(&mut self, lit: Literal) {
        self.make_assignment(lit);
    }

    /// Reverses an assignment made with `apply_assignment`.
    pub(crate) fn revert_assignment(&mut self, lit: Literal) {
        self.undo_assignment(lit);
    }

    pub(crate) fn pending_units(&self) -> usize {
        self.unit_stack.len()
    }
}
