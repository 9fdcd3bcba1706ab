use crate::builtins::{STANDARD_SYMBOLS, StandardSymbols, register_builtins};
use crate::specificity::compare_specificity;
use crate::{Attributes, Bindings, EvalContext, Expr, Symbol};
use std::collections::HashMap;
use thiserror::Error;

/// Error type a built-in rule may surface. Evaluation wraps it together with
/// the offending expression.
pub type RuleError = Box<dyn std::error::Error + Send + Sync>;

pub type BuiltinFn = fn(&Bindings, &Expr, &EvalContext) -> Result<Option<Expr>, RuleError>;

/// A rewrite rule attached to a symbol. Applying a rule either produces a
/// replacement expression or reports "unchanged"; non-applicability is
/// never an error.
#[derive(Clone, Debug)]
pub enum Rule {
    /// `lhs -> rhs`: match the pattern, substitute the captures into `rhs`.
    Rewrite { pattern: Expr, rhs: Expr },

    /// A native callback guarded by a pattern.
    Builtin { pattern: Expr, apply: BuiltinFn },
}

impl Rule {
    pub fn rewrite(pattern: Expr, rhs: Expr) -> Self {
        Self::Rewrite { pattern, rhs }
    }

    pub fn builtin(pattern: Expr, apply: BuiltinFn) -> Self {
        Self::Builtin { pattern, apply }
    }

    pub fn pattern(&self) -> &Expr {
        match self {
            Self::Rewrite { pattern, .. } => pattern,
            Self::Builtin { pattern, .. } => pattern,
        }
    }
}

/// Where a rule list sits relative to the expression being reduced.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum RuleKind {
    Own,
    Up,
    Down,
    Sub,
}

/// An ordered list of rules. Insertion order is evaluation order; callers
/// that want specificity ordering opt in explicitly.
#[derive(Clone, Debug, Default)]
pub struct RuleSet(Vec<Rule>);

impl RuleSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_rule(&self, pattern: &Expr) -> bool {
        self.0.iter().any(|rule| rule.pattern() == pattern)
    }

    pub fn push(&mut self, rule: Rule) {
        if !self.has_rule(rule.pattern()) {
            self.0.push(rule);
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.0.iter()
    }

    /// Reorders so that more specific patterns are tried first. Stable, so
    /// equally specific rules keep their insertion order.
    pub fn sort_by_specificity(&mut self) {
        self.0
            .sort_by(|a, b| compare_specificity(a.pattern(), b.pattern()));
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Everything the definitions database stores per symbol.
#[derive(Clone, Debug, Default)]
pub struct SymbolRecord {
    pub attributes: Attributes,

    /// How the symbol on its own evaluates.
    pub own_rules: RuleSet,

    /// How expressions carrying the symbol somewhere among their leaves
    /// evaluate.
    pub up_rules: RuleSet,

    /// How expressions with the symbol as their head evaluate.
    pub down_rules: RuleSet,

    /// How expressions whose head has the symbol as its own head evaluate,
    /// `f[...][...]` style.
    pub sub_rules: RuleSet,
}

impl SymbolRecord {
    pub fn rules(&self, kind: RuleKind) -> &RuleSet {
        match kind {
            RuleKind::Own => &self.own_rules,
            RuleKind::Up => &self.up_rules,
            RuleKind::Down => &self.down_rules,
            RuleKind::Sub => &self.sub_rules,
        }
    }

    pub fn rules_mut(&mut self, kind: RuleKind) -> &mut RuleSet {
        match kind {
            RuleKind::Own => &mut self.own_rules,
            RuleKind::Up => &mut self.up_rules,
            RuleKind::Down => &mut self.down_rules,
            RuleKind::Sub => &mut self.sub_rules,
        }
    }
}

#[derive(Debug, Error)]
pub enum DefinitionsError {
    #[error("symbol '{0}' would carry more than one hold attribute")]
    ConflictingHold(Symbol),

    #[error("symbol '{0}' is protected")]
    Protected(Symbol),

    #[error("attributes of symbol '{0}' are locked")]
    Locked(Symbol),
}

/// The symbol table: attributes and rule lists, keyed by interned symbol
/// identity. Evaluation only ever reads from it.
pub struct Definitions {
    records: HashMap<Symbol, SymbolRecord>,
}

impl Definitions {
    /// A definitions table with the kernel symbols registered but no
    /// built-in rules.
    pub fn new() -> Self {
        let mut definitions = Self {
            records: HashMap::new(),
        };

        let symbols = &*STANDARD_SYMBOLS;
        for symbol in [
            symbols.Sequence,
            symbols.Blank,
            symbols.BlankSequence,
            symbols.BlankNullSequence,
            symbols.Pattern,
            symbols.Alternatives,
            symbols.Repeated,
            symbols.List,
            symbols.Null,
            symbols.String,
            symbols.Integer,
            symbols.Real,
            symbols.Rational,
            symbols.Complex,
            symbols.Symbol,
        ] {
            definitions.record_mut(symbol).attributes = Attributes::PROTECTED;
        }

        definitions.record_mut(symbols.Hold).attributes =
            Attributes::HOLD_ALL | Attributes::PROTECTED;

        definitions
    }

    /// A definitions table with the built-in arithmetic rules registered on
    /// top of the kernel symbols.
    pub fn with_builtins() -> Self {
        let mut definitions = Self::new();
        register_builtins(&mut definitions);
        definitions
    }

    pub fn symbols(&self) -> &'static StandardSymbols {
        &STANDARD_SYMBOLS
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        let symbol = Symbol::new(name);
        self.records.entry(symbol).or_default();
        symbol
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        let symbol = Symbol::new(name);
        self.records.contains_key(&symbol).then_some(symbol)
    }

    pub fn attributes(&self, symbol: &Symbol) -> Attributes {
        self.records
            .get(symbol)
            .map(|record| record.attributes)
            .unwrap_or_default()
    }

    pub fn set_attributes(
        &mut self,
        symbol: &Symbol,
        attributes: Attributes,
    ) -> Result<(), DefinitionsError> {
        if attributes.has_conflicting_holds() {
            return Err(DefinitionsError::ConflictingHold(*symbol));
        }

        if self.attributes(symbol).contains(Attributes::LOCKED) {
            return Err(DefinitionsError::Locked(*symbol));
        }

        self.record_mut(*symbol).attributes = attributes;
        Ok(())
    }

    pub fn add_rule(
        &mut self,
        symbol: &Symbol,
        kind: RuleKind,
        rule: Rule,
    ) -> Result<(), DefinitionsError> {
        if self.attributes(symbol).contains(Attributes::PROTECTED) {
            return Err(DefinitionsError::Protected(*symbol));
        }

        self.record_mut(*symbol).rules_mut(kind).push(rule);
        Ok(())
    }

    pub fn rules(&self, symbol: &Symbol, kind: RuleKind) -> Option<&RuleSet> {
        let rules = self.records.get(symbol)?.rules(kind);
        (!rules.is_empty()).then_some(rules)
    }

    fn record_mut(&mut self, symbol: Symbol) -> &mut SymbolRecord {
        self.records.entry(symbol).or_default()
    }
}

impl Default for Definitions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn interned_symbols_are_found_again() {
        let mut definitions = Definitions::new();

        assert!(definitions.lookup("f").is_none());
        let f = definitions.intern("f");
        assert_eq!(definitions.lookup("f"), Some(f));
    }

    #[test]
    fn conflicting_hold_attributes_are_rejected() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");

        let result =
            definitions.set_attributes(&f, Attributes::HOLD_FIRST | Attributes::HOLD_REST);

        assert!(matches!(result, Err(DefinitionsError::ConflictingHold(_))));
        assert_eq!(definitions.attributes(&f), Attributes::empty());
    }

    #[test]
    fn protected_symbols_reject_new_rules() {
        let mut definitions = Definitions::new();
        let list = definitions.symbols().List;

        let rule = Rule::rewrite(parse!("List[x_]"), parse!("x"));
        let result = definitions.add_rule(&list, RuleKind::Down, rule);

        assert!(matches!(result, Err(DefinitionsError::Protected(_))));
    }

    #[test]
    fn rule_insertion_order_is_preserved() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");

        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[x_]"), parse!("x")))
            .unwrap();
        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[1]"), parse!("2")))
            .unwrap();

        let rules = definitions.rules(&f, RuleKind::Down).unwrap();
        let patterns: Vec<_> = rules.iter().map(|r| r.pattern().clone()).collect();

        assert_eq!(patterns, vec![parse!("f[x_]"), parse!("f[1]")]);
    }

    #[test]
    fn duplicate_patterns_are_not_stored_twice() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");

        for _ in 0..2 {
            definitions
                .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[x_]"), parse!("x")))
                .unwrap();
        }

        assert_eq!(definitions.rules(&f, RuleKind::Down).unwrap().len(), 1);
    }
}
