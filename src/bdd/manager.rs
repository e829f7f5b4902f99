//! Reduced ordered BDD with complemented edges.
//!
//! A [`BddRef`] packs a node index and a complement bit. There is a single
//! terminal (index 0, `TRUE`); `FALSE` is its complement. The unique table
//! only holds nodes whose high edge is regular, which keeps every function
//! to exactly one representation.
//!
//! Variables are identified by their level: level 0 is the top of the order.
//! Reordering is done by [`BddManager::transfer`] into a manager declared
//! with another order.

use std::collections::HashMap;

/// Reference to a BDD function: node index plus complement bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BddRef(u32);

impl BddRef {
    /// Constant true.
    pub const TRUE: BddRef = BddRef(0);
    /// Constant false.
    pub const FALSE: BddRef = BddRef(1);

    fn new(index: u32, complemented: bool) -> Self {
        Self((index << 1) | complemented as u32)
    }

    fn index(self) -> u32 {
        self.0 >> 1
    }

    /// Whether the edge is complemented.
    pub fn is_complemented(self) -> bool {
        self.0 & 1 == 1
    }

    /// The same node without the complement bit.
    pub fn regular(self) -> Self {
        Self(self.0 & !1)
    }

    /// Whether this is one of the two constants.
    pub fn is_constant(self) -> bool {
        self.index() == 0
    }
}

impl std::ops::Not for BddRef {
    type Output = BddRef;

    fn not(self) -> BddRef {
        BddRef(self.0 ^ 1)
    }
}

const TERMINAL_LEVEL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct BddNode {
    level: u32,
    high: BddRef,
    low: BddRef,
}

/// Owner of BDD nodes and variables.
#[derive(Debug, Clone)]
pub struct BddManager {
    nodes: Vec<BddNode>,
    unique: HashMap<(u32, BddRef, BddRef), u32>,
    ite_cache: HashMap<(BddRef, BddRef, BddRef), BddRef>,
    names: Vec<String>,
    levels: HashMap<String, u32>,
}

impl Default for BddManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BddManager {
    /// Empty manager holding only the terminal.
    pub fn new() -> Self {
        Self {
            nodes: vec![BddNode {
                level: TERMINAL_LEVEL,
                high: BddRef::TRUE,
                low: BddRef::TRUE,
            }],
            unique: HashMap::new(),
            ite_cache: HashMap::new(),
            names: Vec::new(),
            levels: HashMap::new(),
        }
    }

    /// Manager with variables declared in the given order.
    pub fn with_order<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut manager = Self::new();
        for name in order {
            manager.declare(name);
        }
        manager
    }

    /// Declare a variable at the bottom of the order.
    ///
    /// Returns its level. Declaring an existing name returns the existing level.
    pub fn declare(&mut self, name: impl Into<String>) -> u32 {
        let name = name.into();
        if let Some(&level) = self.levels.get(&name) {
            return level;
        }
        let level = self.names.len() as u32;
        self.levels.insert(name.clone(), level);
        self.names.push(name);
        level
    }

    /// Level of a declared variable.
    pub fn level_of(&self, name: &str) -> Option<u32> {
        self.levels.get(name).copied()
    }

    /// Variable names, top of the order first.
    pub fn var_names(&self) -> &[String] {
        &self.names
    }

    /// Number of declared variables.
    pub fn num_vars(&self) -> usize {
        self.names.len()
    }

    /// Total nodes allocated, terminal included.
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    /// Function of a single variable.
    pub fn var(&mut self, level: u32) -> BddRef {
        self.make(level, BddRef::TRUE, BddRef::FALSE)
    }

    fn make(&mut self, level: u32, high: BddRef, low: BddRef) -> BddRef {
        if high == low {
            return high;
        }
        // Keep high edges regular; push the complement to the result.
        if high.is_complemented() {
            return !self.make(level, !high, !low);
        }
        if let Some(&index) = self.unique.get(&(level, high, low)) {
            return BddRef::new(index, false);
        }
        let index = self.nodes.len() as u32;
        self.nodes.push(BddNode { level, high, low });
        self.unique.insert((level, high, low), index);
        BddRef::new(index, false)
    }

    fn level(&self, f: BddRef) -> u32 {
        self.nodes[f.index() as usize].level
    }

    /// Top level of `f`, `None` for constants.
    pub fn top_level(&self, f: BddRef) -> Option<u32> {
        (!f.is_constant()).then(|| self.level(f))
    }

    /// High and low cofactors of `f` with the complement bit applied.
    pub fn branches(&self, f: BddRef) -> (BddRef, BddRef) {
        let node = self.nodes[f.index() as usize];
        if f.is_complemented() {
            (!node.high, !node.low)
        } else {
            (node.high, node.low)
        }
    }

    fn cofactors(&self, f: BddRef, level: u32) -> (BddRef, BddRef) {
        if f.is_constant() || self.level(f) != level {
            (f, f)
        } else {
            self.branches(f)
        }
    }

    /// If-then-else: `(f & g) | (!f & h)`.
    pub fn ite(&mut self, f: BddRef, g: BddRef, h: BddRef) -> BddRef {
        if f == BddRef::TRUE {
            return g;
        }
        if f == BddRef::FALSE {
            return h;
        }
        if g == h {
            return g;
        }
        if g == BddRef::TRUE && h == BddRef::FALSE {
            return f;
        }
        if g == BddRef::FALSE && h == BddRef::TRUE {
            return !f;
        }
        if let Some(&r) = self.ite_cache.get(&(f, g, h)) {
            return r;
        }

        let top = [f, g, h]
            .into_iter()
            .filter(|r| !r.is_constant())
            .map(|r| self.level(r))
            .min()
            .unwrap_or(TERMINAL_LEVEL);

        let (f1, f0) = self.cofactors(f, top);
        let (g1, g0) = self.cofactors(g, top);
        let (h1, h0) = self.cofactors(h, top);
        let high = self.ite(f1, g1, h1);
        let low = self.ite(f0, g0, h0);
        let r = self.make(top, high, low);

        self.ite_cache.insert((f, g, h), r);
        r
    }

    /// Conjunction.
    pub fn and(&mut self, f: BddRef, g: BddRef) -> BddRef {
        self.ite(f, g, BddRef::FALSE)
    }

    /// Disjunction.
    pub fn or(&mut self, f: BddRef, g: BddRef) -> BddRef {
        self.ite(f, BddRef::TRUE, g)
    }

    /// Negation.
    pub fn not(&self, f: BddRef) -> BddRef {
        !f
    }

    /// Conjunction of many; `TRUE` when empty.
    pub fn and_all<I: IntoIterator<Item = BddRef>>(&mut self, fs: I) -> BddRef {
        fs.into_iter().fold(BddRef::TRUE, |acc, f| self.and(acc, f))
    }

    /// Disjunction of many; `FALSE` when empty.
    pub fn or_all<I: IntoIterator<Item = BddRef>>(&mut self, fs: I) -> BddRef {
        fs.into_iter().fold(BddRef::FALSE, |acc, f| self.or(acc, f))
    }

    /// Substitute `g` for the variable at `level` in `f`.
    pub fn compose(&mut self, f: BddRef, level: u32, g: BddRef) -> BddRef {
        let mut memo = HashMap::new();
        self.compose_rec(f, level, g, &mut memo)
    }

    fn compose_rec(&mut self, f: BddRef, level: u32, g: BddRef, memo: &mut HashMap<BddRef, BddRef>) -> BddRef {
        if f.is_constant() || self.level(f) > level {
            return f;
        }
        let regular = f.regular();
        let result = match memo.get(&regular) {
            Some(&r) => r,
            None => {
                let node = self.nodes[regular.index() as usize];
                let r = if node.level == level {
                    self.ite(g, node.high, node.low)
                } else {
                    let high = self.compose_rec(node.high, level, g, memo);
                    let low = self.compose_rec(node.low, level, g, memo);
                    let v = self.var(node.level);
                    self.ite(v, high, low)
                };
                memo.insert(regular, r);
                r
            }
        };
        if f.is_complemented() {
            !result
        } else {
            result
        }
    }

    /// Rebuild `f` inside `target`, matching variables by name.
    ///
    /// Returns `None` if `f` depends on a variable `target` does not declare.
    pub fn transfer(&self, f: BddRef, target: &mut BddManager) -> Option<BddRef> {
        let mut memo = HashMap::new();
        self.transfer_rec(f, target, &mut memo)
    }

    fn transfer_rec(
        &self,
        f: BddRef,
        target: &mut BddManager,
        memo: &mut HashMap<u32, BddRef>,
    ) -> Option<BddRef> {
        if f.is_constant() {
            return Some(f);
        }
        let index = f.index();
        let result = match memo.get(&index) {
            Some(&r) => r,
            None => {
                let node = self.nodes[index as usize];
                let high = self.transfer_rec(node.high, target, memo)?;
                let low = self.transfer_rec(node.low, target, memo)?;
                let level = target.level_of(&self.names[node.level as usize])?;
                let v = target.var(level);
                let r = target.ite(v, high, low);
                memo.insert(index, r);
                r
            }
        };
        Some(if f.is_complemented() { !result } else { result })
    }

    /// Number of distinct nodes reachable from `f`, terminal included.
    pub fn node_count(&self, f: BddRef) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![f.index()];
        while let Some(index) = stack.pop() {
            if !seen.insert(index) || index == 0 {
                continue;
            }
            let node = self.nodes[index as usize];
            stack.push(node.high.index());
            stack.push(node.low.index());
        }
        seen.len()
    }

    /// Levels `f` depends on, ascending.
    pub fn support(&self, f: BddRef) -> Vec<u32> {
        let mut seen = std::collections::HashSet::new();
        let mut levels = std::collections::BTreeSet::new();
        let mut stack = vec![f.index()];
        while let Some(index) = stack.pop() {
            if index == 0 || !seen.insert(index) {
                continue;
            }
            let node = self.nodes[index as usize];
            levels.insert(node.level);
            stack.push(node.high.index());
            stack.push(node.low.index());
        }
        levels.into_iter().collect()
    }

    /// Evaluate `f` under an assignment indexed by level.
    pub fn evaluate(&self, f: BddRef, assignment: &[bool]) -> bool {
        let mut current = f;
        while !current.is_constant() {
            let (high, low) = self.branches(current);
            current = if assignment.get(self.level(current) as usize).copied().unwrap_or(false) {
                high
            } else {
                low
            };
        }
        current == BddRef::TRUE
    }

    /// Probability that `f` is true, with `p[level]` the probability of each
    /// variable. Shannon expansion memoised on the regular node; a
    /// complemented reference yields `1 - r`.
    pub fn probability(&self, f: BddRef, p: &[f64]) -> f64 {
        let mut memo = HashMap::new();
        self.probability_rec(f, p, &mut memo)
    }

    fn probability_rec(&self, f: BddRef, p: &[f64], memo: &mut HashMap<u32, f64>) -> f64 {
        if f == BddRef::TRUE {
            return 1.0;
        }
        if f == BddRef::FALSE {
            return 0.0;
        }
        let index = f.index();
        let r = match memo.get(&index) {
            Some(&r) => r,
            None => {
                let node = self.nodes[index as usize];
                let px = p.get(node.level as usize).copied().unwrap_or(0.0);
                let r = px * self.probability_rec(node.high, p, memo)
                    + (1.0 - px) * self.probability_rec(node.low, p, memo);
                memo.insert(index, r);
                r
            }
        };
        if f.is_complemented() {
            1.0 - r
        } else {
            r
        }
    }
}
