use crate::definitions::RuleError;
use crate::matching::match_pattern;
use crate::{
    Attributes, Bindings, Definitions, Expr, ExprKind, Normal, Rule, RuleKind, RuleSet, Symbol,
    TypeMask,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Ceiling on reduction steps per `evaluate` call unless the caller picks
/// another one. Hitting it is a diagnostic abort, not a result.
pub const DEFAULT_ITERATION_LIMIT: usize = 4096;

/// What to do with the up rules of an expression's leaves relative to the
/// down rules of its head. The relative priority when both match is left to
/// the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum UpRulePolicy {
    #[default]
    BeforeDownRules,
    AfterDownRules,
    Disabled,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("evaluation cancelled while reducing {expr}")]
    Cancelled { expr: Expr },

    #[error("iteration limit of {limit} reached while reducing {expr}")]
    IterationLimit { limit: usize, expr: Expr },

    #[error("rule failed on {expr}: {source}")]
    Rule {
        expr: Expr,
        #[source]
        source: RuleError,
    },
}

impl EvalError {
    /// The expression the error surfaced on.
    pub fn expr(&self) -> &Expr {
        match self {
            Self::Cancelled { expr } => expr,
            Self::IterationLimit { expr, .. } => expr,
            Self::Rule { expr, .. } => expr,
        }
    }
}

/// Everything one evaluation needs: the definitions to read rules from, the
/// iteration ceiling, an externally owned cancellation flag, and the up-rule
/// policy.
pub struct EvalContext<'d> {
    definitions: &'d Definitions,
    iteration_limit: usize,
    cancel: Option<Arc<AtomicBool>>,
    up_rule_policy: UpRulePolicy,
}

impl<'d> EvalContext<'d> {
    pub fn new(definitions: &'d Definitions) -> Self {
        Self {
            definitions,
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            cancel: None,
            up_rule_policy: UpRulePolicy::default(),
        }
    }

    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// The flag stays owned by the caller; setting it makes the evaluation
    /// abort with [`EvalError::Cancelled`] at the next step or rule-dispatch
    /// boundary.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_up_rule_policy(mut self, policy: UpRulePolicy) -> Self {
        self.up_rule_policy = policy;
        self
    }

    pub fn definitions(&self) -> &'d Definitions {
        self.definitions
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Reduces `expr` to a fixed point of one-step evaluation, returning the
/// original expression when no rule applies at all.
pub fn evaluate(expr: &Expr, ctx: &EvalContext) -> Result<Expr, EvalError> {
    let mut current = expr.clone();

    for _ in 0..ctx.iteration_limit {
        if ctx.cancelled() {
            return Err(EvalError::Cancelled { expr: current });
        }

        match evaluate_one(&current, ctx)? {
            None => return Ok(current),
            Some(next) => {
                if next == current {
                    return Ok(current);
                }
                log::trace!("step {} -> {}", current, next);
                current = next;
            }
        }
    }

    Err(EvalError::IterationLimit {
        limit: ctx.iteration_limit,
        expr: current,
    })
}

/// One step of reduction; `None` means `expr` is a fixed point of one step.
fn evaluate_one(expr: &Expr, ctx: &EvalContext) -> Result<Option<Expr>, EvalError> {
    match expr.kind() {
        ExprKind::Symbol(symbol) => match ctx.definitions.rules(symbol, RuleKind::Own) {
            Some(rules) => try_rule_set(rules, expr, ctx),
            None => Ok(None),
        },
        ExprKind::Normal(normal) => evaluate_normal(expr, normal, ctx),
        _ => Ok(None),
    }
}

fn evaluate_normal(
    expr: &Expr,
    normal: &Normal,
    ctx: &EvalContext,
) -> Result<Option<Expr>, EvalError> {
    // The head first, to its own fixed point.
    let head = evaluate(normal.head(), ctx)?;

    let attributes = match head.try_symbol() {
        Some(symbol) => ctx.definitions.attributes(symbol),
        None => Attributes::empty(),
    };

    // Then the leaves, left to right, within the range the hold attributes
    // leave open.
    let n = normal.len();
    let (begin, end) = if attributes.holds_all() {
        (0, 0)
    } else if attributes.contains(Attributes::HOLD_FIRST) {
        (n.min(1), n)
    } else if attributes.contains(Attributes::HOLD_REST) {
        (0, n.min(1))
    } else {
        (0, n)
    };

    let stepped = normal.try_apply(&head, begin, end, TypeMask::MAX, |leaf| {
        let evaluated = evaluate(leaf, ctx)?;
        Ok((evaluated != *leaf).then_some(evaluated))
    })?;

    if attributes.contains(Attributes::HOLD_ALL_COMPLETE) {
        return Ok(stepped);
    }

    let current = match &stepped {
        Some(changed) => changed.clone(),
        None => expr.clone(),
    };

    if let Some(canonical) = canonicalize(&current, attributes, ctx) {
        return Ok(Some(canonical));
    }

    if ctx.up_rule_policy == UpRulePolicy::BeforeDownRules {
        if let Some(result) = try_up_rules(&current, ctx)? {
            return Ok(Some(result));
        }
    }

    if let Some(result) = try_sub_rules(&current, ctx)? {
        return Ok(Some(result));
    }

    if let Some(result) = try_down_rules(&current, ctx)? {
        return Ok(Some(result));
    }

    if ctx.up_rule_policy == UpRulePolicy::AfterDownRules {
        if let Some(result) = try_up_rules(&current, ctx)? {
            return Ok(Some(result));
        }
    }

    Ok(stepped)
}

/// The structural canonicalisations driven by the head's attributes. Each is
/// idempotent; the first one that changes anything yields the reshaped
/// expression back to the reduction loop.
fn canonicalize(expr: &Expr, attributes: Attributes, ctx: &EvalContext) -> Option<Expr> {
    let normal = expr.try_normal()?;
    let symbols = ctx.definitions().symbols();

    // Sequence arguments splice into their parent. Detection is structural:
    // the type mask only reflects what leaves contain, not what they are.
    if !attributes.contains(Attributes::SEQUENCE_HOLD)
        && normal
            .leaves()
            .iter()
            .any(|leaf| leaf.is_normal_head(&symbols.Sequence))
    {
        let mut spliced = Vec::with_capacity(normal.len());
        for leaf in normal.leaves().iter() {
            match leaf.try_normal_head(&symbols.Sequence) {
                Some(sequence) => spliced.extend(sequence.leaves().iter()),
                None => spliced.push(leaf),
            }
        }
        return Some(Expr::normal(normal.head().clone(), spliced));
    }

    let head_symbol = *normal.try_head_symbol()?;

    // Flat: nested applications of the same head splice one level per pass.
    if attributes.contains(Attributes::FLAT)
        && normal
            .leaves()
            .iter()
            .any(|leaf| leaf.is_normal_head(&head_symbol))
    {
        let mut flattened = Vec::with_capacity(normal.len());
        for leaf in normal.leaves().iter() {
            match leaf.try_normal_head(&head_symbol) {
                Some(inner) => flattened.extend(inner.leaves().iter()),
                None => flattened.push(leaf),
            }
        }
        return Some(Expr::normal(normal.head().clone(), flattened));
    }

    // Listable: thread over list arguments of equal length.
    if attributes.contains(Attributes::LISTABLE) {
        if let Some(threaded) = thread_listable(normal, symbols.List) {
            return Some(threaded);
        }
    }

    // Orderless: sort the leaves into canonical order.
    if attributes.contains(Attributes::ORDERLESS) {
        let mut leaves = normal.leaves().to_vec();
        if !leaves.is_sorted() {
            leaves.sort();
            return Some(Expr::normal(normal.head().clone(), leaves));
        }
    }

    // OneIdentity: a single-argument application collapses to its argument.
    if attributes.contains(Attributes::ONE_IDENTITY) && normal.len() == 1 {
        return Some(normal.leaf(0));
    }

    None
}

fn thread_listable(normal: &Normal, list: Symbol) -> Option<Expr> {
    let mut length: Option<usize> = None;

    for leaf in normal.leaves().iter() {
        if let Some(inner) = leaf.try_normal_head(&list) {
            match length {
                None => length = Some(inner.len()),
                Some(l) if l != inner.len() => return None,
                Some(_) => {}
            }
        }
    }

    let length = length?;
    let mut threaded = Vec::with_capacity(length);

    for i in 0..length {
        let args = normal
            .leaves()
            .iter()
            .map(|leaf| {
                if let Some(inner) = leaf.try_normal_head(&list) {
                    inner.leaf(i)
                } else {
                    leaf
                }
            })
            .collect();
        threaded.push(Expr::normal(normal.head().clone(), args));
    }

    Some(Expr::normal(list, threaded))
}

/// Up rules: for each leaf, the rules its head symbol attached for
/// expressions it appears in.
fn try_up_rules(expr: &Expr, ctx: &EvalContext) -> Result<Option<Expr>, EvalError> {
    let Some(normal) = expr.try_normal() else {
        return Ok(None);
    };

    for i in 0..normal.len() {
        let leaf = normal.leaf(i);
        let Some(symbol) = leaf.name().copied() else {
            continue;
        };

        if let Some(rules) = ctx.definitions.rules(&symbol, RuleKind::Up) {
            if let Some(result) = try_rule_set(rules, expr, ctx)? {
                return Ok(Some(result));
            }
        }
    }

    Ok(None)
}

/// Sub rules: when the head is itself a normal expression `s[...]`, the
/// rules `s` attached for `s[...][...]` forms.
fn try_sub_rules(expr: &Expr, ctx: &EvalContext) -> Result<Option<Expr>, EvalError> {
    let Some(normal) = expr.try_normal() else {
        return Ok(None);
    };

    let Some(inner) = normal.head().try_normal() else {
        return Ok(None);
    };

    let Some(symbol) = inner.try_head_symbol() else {
        return Ok(None);
    };

    match ctx.definitions.rules(symbol, RuleKind::Sub) {
        Some(rules) => try_rule_set(rules, expr, ctx),
        None => Ok(None),
    }
}

/// Down rules: the rules the head symbol attached for expressions it heads.
fn try_down_rules(expr: &Expr, ctx: &EvalContext) -> Result<Option<Expr>, EvalError> {
    let Some(normal) = expr.try_normal() else {
        return Ok(None);
    };

    let Some(symbol) = normal.try_head_symbol() else {
        return Ok(None);
    };

    match ctx.definitions.rules(symbol, RuleKind::Down) {
        Some(rules) => try_rule_set(rules, expr, ctx),
        None => Ok(None),
    }
}

fn try_rule_set(
    rules: &RuleSet,
    expr: &Expr,
    ctx: &EvalContext,
) -> Result<Option<Expr>, EvalError> {
    if ctx.cancelled() {
        return Err(EvalError::Cancelled { expr: expr.clone() });
    }

    for rule in rules {
        if let Some(result) = apply_rule(rule, expr, ctx)? {
            log::debug!("rule {} fired on {}", rule.pattern(), expr);
            return Ok(Some(result));
        }
    }

    Ok(None)
}

/// Applies one rule: match, then substitute or call through. `None` means
/// the rule does not apply; rules never signal non-applicability by error.
pub fn apply_rule(rule: &Rule, expr: &Expr, ctx: &EvalContext) -> Result<Option<Expr>, EvalError> {
    let matched = match_pattern(rule.pattern(), expr, ctx.definitions());
    let Some(bindings) = matched.into_bindings() else {
        return Ok(None);
    };

    match rule {
        Rule::Rewrite { rhs, .. } => Ok(Some(replace_all(rhs, &bindings))),
        Rule::Builtin { apply, .. } => apply(&bindings, expr, ctx).map_err(|source| {
            EvalError::Rule {
                expr: expr.clone(),
                source,
            }
        }),
    }
}

/// Substitutes every bound symbol throughout `expr`. Bound names can sit
/// anywhere, including head position, so the walk descends into every
/// nested expression; only non-symbol atoms are shared untouched.
pub fn replace_all(expr: &Expr, bindings: &Bindings) -> Expr {
    match expr.kind() {
        ExprKind::Symbol(symbol) => bindings
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| expr.clone()),
        ExprKind::Normal(normal) => {
            let head = replace_all(normal.head(), bindings);

            let result: Result<_, std::convert::Infallible> =
                normal.try_apply(&head, 0, normal.len(), TypeMask::MAX, |leaf| {
                    if leaf.try_symbol().is_none() && leaf.try_normal().is_none() {
                        return Ok(None);
                    }
                    let replaced = replace_all(leaf, bindings);
                    Ok((replaced != *leaf).then_some(replaced))
                });

            result.unwrap().unwrap_or_else(|| expr.clone())
        }
        _ => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rule, parse};

    fn eval(definitions: &Definitions, input: &str) -> Expr {
        let ctx = EvalContext::new(definitions);
        evaluate(&parse!(input), &ctx).expect("evaluate")
    }

    #[test]
    fn atoms_are_fixed_points() {
        let definitions = Definitions::new();

        for input in ["42", "1.5", "\"abc\"", "x"] {
            let expr = parse!(input);
            assert_eq!(eval(&definitions, input), expr);
        }
    }

    #[test]
    fn applications_without_rules_are_fixed_points() {
        let definitions = Definitions::new();

        assert_eq!(eval(&definitions, "f[a, b]"), parse!("f[a, b]"));
    }

    #[test]
    fn down_rules_fire_in_insertion_order() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");

        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[1]"), parse!("one")))
            .unwrap();
        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[x_]"), parse!("g[x]")))
            .unwrap();

        assert_eq!(eval(&definitions, "f[1]"), parse!("one"));
        assert_eq!(eval(&definitions, "f[2]"), parse!("g[2]"));
    }

    #[test]
    fn rewriting_runs_to_a_fixed_point() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        let g = definitions.intern("g");

        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[x_]"), parse!("g[x]")))
            .unwrap();
        definitions
            .add_rule(&g, RuleKind::Down, Rule::rewrite(parse!("g[x_]"), parse!("x")))
            .unwrap();

        assert_eq!(eval(&definitions, "f[7]"), parse!("7"));
    }

    #[test]
    fn own_rules_reduce_lone_symbols() {
        let mut definitions = Definitions::new();
        let x = definitions.intern("x");

        definitions
            .add_rule(&x, RuleKind::Own, Rule::rewrite(parse!("x"), parse!("42")))
            .unwrap();

        assert_eq!(eval(&definitions, "x"), parse!("42"));
        assert_eq!(eval(&definitions, "f[x, x]"), parse!("f[42, 42]"));
    }

    #[test]
    fn sequence_leaves_splice() {
        let definitions = Definitions::new();

        assert_eq!(
            eval(&definitions, "f[a, Sequence[b, c], d]"),
            parse!("f[a, b, c, d]")
        );
        assert_eq!(eval(&definitions, "f[Sequence[]]"), parse!("f[]"));
    }

    #[test]
    fn sequence_hold_keeps_sequences() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        definitions
            .set_attributes(&f, Attributes::SEQUENCE_HOLD)
            .unwrap();

        assert_eq!(
            eval(&definitions, "f[Sequence[a, b]]"),
            parse!("f[Sequence[a, b]]")
        );
    }

    #[test]
    fn hold_attributes_shield_leaves() {
        let mut definitions = Definitions::new();
        let x = definitions.intern("x");
        definitions
            .add_rule(&x, RuleKind::Own, Rule::rewrite(parse!("x"), parse!("0")))
            .unwrap();

        for (attributes, expected) in [
            (Attributes::empty(), "f[0, 0, 0]"),
            (Attributes::HOLD_FIRST, "f[x, 0, 0]"),
            (Attributes::HOLD_REST, "f[0, x, x]"),
            (Attributes::HOLD_ALL, "f[x, x, x]"),
            (Attributes::HOLD_ALL_COMPLETE, "f[x, x, x]"),
        ] {
            let f = definitions.intern("f");
            definitions.set_attributes(&f, attributes).unwrap();

            assert_eq!(eval(&definitions, "f[x, x, x]"), parse!(expected));
        }
    }

    #[test]
    fn hold_all_complete_stops_canonicalisation() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        definitions
            .set_attributes(&f, Attributes::HOLD_ALL_COMPLETE)
            .unwrap();

        assert_eq!(
            eval(&definitions, "f[Sequence[a, b]]"),
            parse!("f[Sequence[a, b]]")
        );
    }

    #[test]
    fn orderless_sorts_leaves() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        definitions.set_attributes(&f, Attributes::ORDERLESS).unwrap();

        assert_eq!(eval(&definitions, "f[b, a]"), eval(&definitions, "f[a, b]"));
        assert_eq!(eval(&definitions, "f[c, 2, b, 1]"), parse!("f[1, 2, b, c]"));
    }

    #[test]
    fn flat_splices_same_head() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        definitions.set_attributes(&f, Attributes::FLAT).unwrap();

        assert_eq!(
            eval(&definitions, "f[a, f[b, f[c]], d]"),
            parse!("f[a, b, c, d]")
        );
    }

    #[test]
    fn one_identity_collapses_single_argument() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        definitions
            .set_attributes(&f, Attributes::ONE_IDENTITY)
            .unwrap();

        assert_eq!(eval(&definitions, "f[a]"), parse!("a"));
        assert_eq!(eval(&definitions, "f[a, b]"), parse!("f[a, b]"));
    }

    #[test]
    fn listable_threads_over_lists() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        definitions.set_attributes(&f, Attributes::LISTABLE).unwrap();

        assert_eq!(
            eval(&definitions, "f[List[1, 2], 10]"),
            parse!("List[f[1, 10], f[2, 10]]")
        );
        assert_eq!(
            eval(&definitions, "f[List[1, 2], List[3, 4, 5]]"),
            parse!("f[List[1, 2], List[3, 4, 5]]")
        );
    }

    #[test]
    fn up_rules_fire_from_leaves() {
        let mut definitions = Definitions::new();
        let u = definitions.intern("u");

        definitions
            .add_rule(&u, RuleKind::Up, Rule::rewrite(parse!("f[u, x_]"), parse!("x")))
            .unwrap();

        assert_eq!(eval(&definitions, "f[u, 9]"), parse!("9"));
        assert_eq!(eval(&definitions, "g[u, 9]"), parse!("g[u, 9]"));
    }

    #[test]
    fn up_rule_policy_decides_priority() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        let u = definitions.intern("u");

        definitions
            .add_rule(&u, RuleKind::Up, Rule::rewrite(parse!("f[u]"), parse!("up")))
            .unwrap();
        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[u]"), parse!("down")))
            .unwrap();

        let before = EvalContext::new(&definitions);
        assert_eq!(evaluate(&parse!("f[u]"), &before).unwrap(), parse!("up"));

        let after = EvalContext::new(&definitions)
            .with_up_rule_policy(UpRulePolicy::AfterDownRules);
        assert_eq!(evaluate(&parse!("f[u]"), &after).unwrap(), parse!("down"));

        let disabled =
            EvalContext::new(&definitions).with_up_rule_policy(UpRulePolicy::Disabled);
        assert_eq!(evaluate(&parse!("f[u]"), &disabled).unwrap(), parse!("down"));
    }

    #[test]
    fn sub_rules_fire_for_curried_heads() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");

        definitions
            .add_rule(
                &f,
                RuleKind::Sub,
                Rule::rewrite(parse!("f[x_][y_]"), parse!("pair[x, y]")),
            )
            .unwrap();

        assert_eq!(eval(&definitions, "f[1][2]"), parse!("pair[1, 2]"));
    }

    #[test]
    fn head_evaluates_before_dispatch() {
        let mut definitions = Definitions::new();
        let h = definitions.intern("h");
        let f = definitions.intern("f");

        definitions
            .add_rule(&h, RuleKind::Own, Rule::rewrite(parse!("h"), parse!("f")))
            .unwrap();
        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[x_]"), parse!("x")))
            .unwrap();

        assert_eq!(eval(&definitions, "h[5]"), parse!("5"));
    }

    #[test]
    fn diverging_rewrites_hit_the_iteration_limit() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");

        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[0]"), parse!("f[1]")))
            .unwrap();
        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[1]"), parse!("f[0]")))
            .unwrap();

        let ctx = EvalContext::new(&definitions).with_iteration_limit(16);
        let error = evaluate(&parse!("f[0]"), &ctx).unwrap_err();

        match error {
            EvalError::IterationLimit { limit, expr } => {
                assert_eq!(limit, 16);
                assert!(expr == parse!("f[0]") || expr == parse!("f[1]"));
            }
            other => panic!("expected an iteration limit error, got {other}"),
        }
    }

    #[test]
    fn cancellation_flag_aborts() {
        let definitions = Definitions::new();
        let flag = Arc::new(AtomicBool::new(true));

        let ctx = EvalContext::new(&definitions).with_cancel_flag(Arc::clone(&flag));
        let error = evaluate(&parse!("f[a]"), &ctx).unwrap_err();

        assert!(matches!(error, EvalError::Cancelled { .. }));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let mut definitions = Definitions::new();
        let f = definitions.intern("f");
        definitions
            .set_attributes(&f, Attributes::ORDERLESS | Attributes::FLAT)
            .unwrap();
        definitions
            .add_rule(&f, RuleKind::Down, Rule::rewrite(parse!("f[1, x_]"), parse!("f[x, x]")))
            .unwrap();

        for input in ["f[b, a]", "f[1, c]", "f[f[a], b]", "g[1, 2]"] {
            let once = eval(&definitions, input);
            let ctx = EvalContext::new(&definitions);
            let twice = evaluate(&once, &ctx).unwrap();
            assert_eq!(once, twice, "second pass changed {input}");
        }
    }

    #[test]
    fn substitution_shares_untouched_subtrees() {
        let mut bindings = Bindings::new();
        bindings.bind(Symbol::new("x"), parse!("9"));

        let rhs = parse!("g[List[1, 2, 3, 4], x]");
        let result = replace_all(&rhs, &bindings);

        assert_eq!(result, parse!("g[List[1, 2, 3, 4], 9]"));

        let rhs_list = rhs.try_normal().unwrap().leaf(0);
        let result_list = result.try_normal().unwrap().leaf(0);
        assert!(rhs_list.ptr_eq(&result_list));
    }
}
