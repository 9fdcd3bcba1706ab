use crate::{Expr, Symbol};
use std::collections::HashMap;

/// Named captures of a match attempt, keyed by symbol identity.
///
/// Bindings carry an undo journal: a frame records a mark before trying a
/// branch and rolls back to it on failure, so every exit path restores
/// exactly the bindings the frame introduced.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    map: HashMap<Symbol, Expr>,
    journal: Vec<Symbol>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`. A name already bound stays bound; the call
    /// then succeeds only when the new value agrees with the old one.
    pub(crate) fn bind(&mut self, name: Symbol, value: Expr) -> bool {
        match self.map.get(&name) {
            Some(bound) => *bound == value,
            None => {
                self.map.insert(name, value);
                self.journal.push(name);
                true
            }
        }
    }

    pub fn get(&self, name: &Symbol) -> Option<&Expr> {
        self.map.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Expr)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn mark(&self) -> usize {
        self.journal.len()
    }

    pub(crate) fn rollback_to(&mut self, mark: usize) {
        while self.journal.len() > mark {
            let name = self.journal.pop().unwrap();
            self.map.remove(&name);
        }
    }
}

impl PartialEq for Bindings {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl Eq for Bindings {}

/// The outcome of [`match_pattern`](crate::match_pattern): failure, or
/// success together with the captured bindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult(Option<Bindings>);

impl MatchResult {
    pub(crate) fn matched(bindings: Bindings) -> Self {
        Self(Some(bindings))
    }

    pub(crate) fn failed() -> Self {
        Self(None)
    }

    pub fn success(&self) -> bool {
        self.0.is_some()
    }

    pub fn binding(&self, name: &Symbol) -> Option<&Expr> {
        self.0.as_ref()?.get(name)
    }

    pub fn iter_bindings(&self) -> impl Iterator<Item = (&Symbol, &Expr)> {
        self.0.iter().flat_map(|bindings| bindings.iter())
    }

    pub fn bindings(&self) -> Option<&Bindings> {
        self.0.as_ref()
    }

    pub fn into_bindings(self) -> Option<Bindings> {
        self.0
    }
}
