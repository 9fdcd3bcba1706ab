use crate::matching::forms::{
    try_alternatives, try_blank, try_blank_null_sequence, try_blank_sequence, try_pattern,
    try_repeated,
};
use crate::matching::{Bindings, MatchResult};
use crate::{Definitions, Expr, Normal, Slice, Symbol};

/// Stands in for an unbounded maximum arity.
pub const MATCH_MAX: usize = usize::MAX;

/// The `(min, max)` number of consecutive sequence items a pattern can
/// consume. Plain literals and blanks take exactly one; sequence blanks are
/// unbounded; `Pattern` forwards to its inner pattern; `Alternatives` is the
/// component-wise envelope.
pub fn match_arity(pattern: &Expr) -> (usize, usize) {
    if let Some((_, subpattern)) = try_pattern(pattern) {
        return match_arity(&subpattern);
    }

    if try_blank(pattern).is_some() {
        return (1, 1);
    }

    if try_blank_sequence(pattern).is_some() {
        return (1, MATCH_MAX);
    }

    if try_blank_null_sequence(pattern).is_some() {
        return (0, MATCH_MAX);
    }

    if let Some(alternatives) = try_alternatives(pattern) {
        if alternatives.is_empty() {
            return (1, 1);
        }

        let mut min = MATCH_MAX;
        let mut max = 0;

        for alternative in alternatives.iter() {
            let (alt_min, alt_max) = match_arity(&alternative);
            min = min.min(alt_min);
            max = max.max(alt_max);
        }

        return (min, max);
    }

    if try_repeated(pattern).is_some() {
        return (1, MATCH_MAX);
    }

    (1, 1)
}

/// Matches `pattern` against `subject`, producing either failure or the set
/// of named captures. The first solution found wins; candidate consumption
/// sizes for sequence patterns are tried longest first.
pub fn match_pattern(pattern: &Expr, subject: &Expr, definitions: &Definitions) -> MatchResult {
    let matcher = Matcher { definitions };
    let mut bindings = Bindings::new();

    let subject_seq = Slice::from_exprs(vec![subject.clone()]);
    let matched = matcher.match_part(None, pattern, &Slice::empty(), &subject_seq, &mut bindings);

    log::trace!(
        "match {} against {}: {}",
        pattern,
        subject,
        if matched { "success" } else { "failure" }
    );

    if matched {
        MatchResult::matched(bindings)
    } else {
        MatchResult::failed()
    }
}

struct Matcher<'d> {
    definitions: &'d Definitions,
}

impl Matcher<'_> {
    /// Matches `pattern` at the front of `subject`, with `rest` holding the
    /// sibling patterns that must consume whatever is left. `variable` names
    /// the capture an enclosing `Pattern[x, ...]` asked for.
    fn match_part(
        &self,
        variable: Option<Symbol>,
        pattern: &Expr,
        rest: &Slice,
        subject: &Slice,
        bindings: &mut Bindings,
    ) -> bool {
        if let Some((name, subpattern)) = try_pattern(pattern) {
            return self.match_part(Some(name), &subpattern, rest, subject, bindings);
        }

        if let Some(head) = try_blank(pattern) {
            return self.match_blank(variable, head.as_ref(), rest, subject, bindings);
        }

        if let Some(head) = try_blank_sequence(pattern) {
            return self.match_sequence_blank(variable, 1, head.as_ref(), rest, subject, bindings);
        }

        if let Some(head) = try_blank_null_sequence(pattern) {
            return self.match_sequence_blank(variable, 0, head.as_ref(), rest, subject, bindings);
        }

        if let Some(alternatives) = try_alternatives(pattern) {
            for alternative in alternatives.iter() {
                let mark = bindings.mark();
                if self.match_part(variable, &alternative, rest, subject, bindings) {
                    return true;
                }
                bindings.rollback_to(mark);
            }
            return false;
        }

        if let Some(inner) = try_repeated(pattern) {
            return self.match_repeated(variable, &inner, rest, subject, bindings);
        }

        // A literal pattern consumes exactly one item.
        if subject.is_empty() {
            return false;
        }
        let item = subject.leaf(0);

        if *pattern == item {
            return self.match_fixed(variable, 1, rest, subject, bindings);
        }

        // Composite against composite: descend head first, then leaves.
        // Captures made below stay in the shared bindings on success.
        if let (Some(p), Some(g)) = (pattern.try_normal(), item.try_normal()) {
            let mark = bindings.mark();
            let head_seq = Slice::from_exprs(vec![g.head().clone()]);

            if self.match_part(None, p.head(), &Slice::empty(), &head_seq, bindings)
                && self.match_all(p.leaves(), g.leaves(), bindings)
                && self.match_fixed(variable, 1, rest, subject, bindings)
            {
                return true;
            }

            bindings.rollback_to(mark);
        }

        false
    }

    /// Matches a sequence of sibling patterns against a whole subject
    /// sequence.
    fn match_all(&self, patterns: &Slice, subject: &Slice, bindings: &mut Bindings) -> bool {
        if patterns.is_empty() {
            return subject.is_empty();
        }

        let first = patterns.leaf(0);
        self.match_part(
            None,
            &first,
            &patterns.slice(1, patterns.len()),
            subject,
            bindings,
        )
    }

    fn match_blank(
        &self,
        variable: Option<Symbol>,
        head: Option<&Expr>,
        rest: &Slice,
        subject: &Slice,
        bindings: &mut Bindings,
    ) -> bool {
        if subject.is_empty() {
            return false;
        }

        if let Some(h) = head {
            if subject.leaf(0).head() != *h {
                return false;
            }
        }

        self.match_fixed(variable, 1, rest, subject, bindings)
    }

    fn match_sequence_blank(
        &self,
        variable: Option<Symbol>,
        min: usize,
        head: Option<&Expr>,
        rest: &Slice,
        subject: &Slice,
        bindings: &mut Bindings,
    ) -> bool {
        let Some((k_min, k_max)) = self.sequence_bounds(min, head, rest, subject) else {
            return false;
        };

        for k in (k_min..=k_max).rev() {
            if self.match_fixed(variable, k, rest, subject, bindings) {
                return true;
            }
        }

        false
    }

    fn match_repeated(
        &self,
        variable: Option<Symbol>,
        inner: &Expr,
        rest: &Slice,
        subject: &Slice,
        bindings: &mut Bindings,
    ) -> bool {
        let Some((k_min, k_max)) = self.sequence_bounds(1, None, rest, subject) else {
            return false;
        };

        for k in (k_min..=k_max).rev() {
            let mark = bindings.mark();

            let each_matches = (0..k).all(|i| {
                self.match_part(
                    None,
                    inner,
                    &Slice::empty(),
                    &subject.slice(i, i + 1),
                    bindings,
                )
            });

            if each_matches && self.match_fixed(variable, k, rest, subject, bindings) {
                return true;
            }

            bindings.rollback_to(mark);
        }

        false
    }

    /// Feasible consumption bounds for a variable-arity pattern: the tail
    /// must still be able to satisfy the remaining patterns' combined
    /// minimum, and cannot be left with more than their combined maximum. A
    /// head constraint further clamps the maximum to the constrained prefix.
    fn sequence_bounds(
        &self,
        min: usize,
        head: Option<&Expr>,
        rest: &Slice,
        subject: &Slice,
    ) -> Option<(usize, usize)> {
        let n = subject.len();

        let mut rest_min = 0usize;
        let mut rest_max = 0usize;
        for sibling in rest.iter() {
            let (sibling_min, sibling_max) = match_arity(&sibling);
            rest_min += sibling_min;
            rest_max = rest_max.saturating_add(sibling_max);
        }

        if rest_min > n {
            return None;
        }

        let mut k_max = n - rest_min;
        let k_min = min.max(n.saturating_sub(rest_max));

        if let Some(h) = head {
            k_max = k_max.min(self.constrained_prefix(h, subject, k_max));
        }

        (k_min <= k_max).then_some((k_min, k_max))
    }

    fn constrained_prefix(&self, head: &Expr, subject: &Slice, limit: usize) -> usize {
        let mut n = 0;
        while n < limit && subject.leaf(n).head() == *head {
            n += 1;
        }
        n
    }

    /// Consumes exactly `k` items for the current pattern, binding them to
    /// `variable` if one is being captured, then hands the remainder to the
    /// sibling patterns. The binding is rolled back when the remainder
    /// cannot be matched.
    fn match_fixed(
        &self,
        variable: Option<Symbol>,
        k: usize,
        rest: &Slice,
        subject: &Slice,
        bindings: &mut Bindings,
    ) -> bool {
        let Some(name) = variable else {
            return self.consume(k, rest, subject, bindings);
        };

        let value = if k == 1 {
            subject.leaf(0)
        } else {
            Expr::from(Normal::from_slice(
                self.definitions.symbols().Sequence,
                subject.slice(0, k),
            ))
        };

        let mark = bindings.mark();

        if !bindings.bind(name, value) {
            return false;
        }

        if self.consume(k, rest, subject, bindings) {
            true
        } else {
            bindings.rollback_to(mark);
            false
        }
    }

    fn consume(&self, k: usize, rest: &Slice, subject: &Slice, bindings: &mut Bindings) -> bool {
        if rest.is_empty() {
            return subject.len() == k;
        }

        let next = rest.leaf(0);
        self.match_part(
            None,
            &next,
            &rest.slice(1, rest.len()),
            &subject.slice(k, subject.len()),
            bindings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    macro_rules! match_test {
        ($name:ident, $pattern:expr, $subject:expr, fails) => {
            #[test]
            fn $name() {
                let definitions = Definitions::new();
                let result =
                    match_pattern(&parse!($pattern), &parse!($subject), &definitions);

                assert!(!result.success(), "expected no match");
            }
        };

        ($name:ident, $pattern:expr, $subject:expr, { $($n:expr => $v:expr),* $(,)? }) => {
            #[test]
            fn $name() {
                let definitions = Definitions::new();
                let result =
                    match_pattern(&parse!($pattern), &parse!($subject), &definitions);

                assert!(result.success(), "expected a match");

                let expected: Vec<(Symbol, Expr)> =
                    vec![$((Symbol::new($n), parse!($v))),*];

                assert_eq!(result.iter_bindings().count(), expected.len());
                for (name, value) in &expected {
                    assert_eq!(result.binding(name), Some(value), "binding of {}", name);
                }
            }
        };
    }

    // Literals
    match_test!(matching_integers, "123", "123", {});
    match_test!(mismatched_integers, "123", "456", fails);
    match_test!(matching_strings, "\"abc\"", "\"abc\"", {});
    match_test!(mismatched_strings, "\"abc\"", "\"def\"", fails);
    match_test!(matching_reals, "2.5", "2.5", {});
    match_test!(mismatched_reals, "2.5", "3.5", fails);
    match_test!(matching_symbols, "abc", "abc", {});
    match_test!(mismatched_symbols, "abc", "def", fails);
    match_test!(string_does_not_match_same_spelling_symbol, "\"abc\"", "abc", fails);
    match_test!(exact_expression_match, "f[a, b, c]", "f[a, b, c]", {});
    match_test!(mismatched_expression_heads, "f[a, b, c]", "g[a, b, c]", fails);
    match_test!(mismatched_expression_lengths, "f[a, b]", "f[a, b, c]", fails);

    // Blank
    match_test!(blank_matches_integer, "_", "42", {});
    match_test!(blank_matches_string, "_", "\"abc\"", {});
    match_test!(blank_matches_symbol, "_", "abc", {});
    match_test!(blank_matches_expression, "_", "f[a, b, c]", {});
    match_test!(typed_blank_matches_matching_head, "Blank[Integer]", "42", {});
    match_test!(typed_blank_matches_big_integer, "Blank[Integer]", "123456789012345678901234567890", {});
    match_test!(typed_blank_rejects_other_head, "Blank[Integer]", "\"abc\"", fails);
    match_test!(typed_blank_matches_expression_head, "Blank[f]", "f[1]", {});

    // Named blank
    match_test!(named_blank_binds_integer, "x_", "42", { "x" => "42" });
    match_test!(named_blank_binds_expression, "x_", "f[a, b]", { "x" => "f[a, b]" });
    match_test!(
        named_typed_blank_binds,
        "Pattern[x, Blank[Integer]]",
        "42",
        { "x" => "42" }
    );

    // Blanks inside expressions
    match_test!(blank_in_first_element, "f[_, b, c]", "f[a, b, c]", {});
    match_test!(blank_in_middle_element, "f[a, _, c]", "f[a, b, c]", {});
    match_test!(blank_with_mismatch_elsewhere, "f[_, b]", "f[a, c]", fails);
    match_test!(named_blanks_bind_positionally, "f[x_, y_, c]", "f[a, b, c]", {
        "x" => "a",
        "y" => "b",
    });
    match_test!(repeated_name_must_agree, "f[x_, x_]", "f[1, 2]", fails);
    match_test!(repeated_name_binds_once, "f[x_, x_]", "f[1, 1]", { "x" => "1" });

    // Head patterns
    match_test!(blank_head_binds, "f_[a]", "g[a]", { "f" => "g" });
    match_test!(blank_head_with_leaf_capture, "f_[x_]", "g[7]", { "f" => "g", "x" => "7" });

    // Nested descent lifts captures
    match_test!(nested_capture_lifts, "f[g[x_], y_]", "f[g[1], 2]", {
        "x" => "1",
        "y" => "2",
    });
    match_test!(nested_consistency_checked, "f[g[x_], x_]", "f[g[1], 2]", fails);
    match_test!(nested_consistency_satisfied, "f[g[x_], x_]", "f[g[1], 1]", { "x" => "1" });

    // Blank sequences
    match_test!(blank_sequence_needs_one, "f[__]", "f[]", fails);
    match_test!(blank_sequence_matches_all, "f[__]", "f[a, b, c]", {});
    match_test!(blank_null_sequence_matches_empty, "f[___]", "f[]", {});
    match_test!(named_null_sequence_captures_empty, "g[xs___]", "g[]", {
        "xs" => "Sequence[]"
    });
    match_test!(named_sequence_captures_all, "g[xs__]", "g[1, 2, 3]", {
        "xs" => "Sequence[1, 2, 3]"
    });
    match_test!(single_item_sequence_binds_item, "g[xs__, y_]", "g[1, 2]", {
        "xs" => "1",
        "y" => "2",
    });
    match_test!(greedy_split_of_two_sequences, "f[xs__, ys__]", "f[a, b, c]", {
        "xs" => "Sequence[a, b]",
        "ys" => "c",
    });
    match_test!(trailing_blank_after_sequence, "g[__, t_]", "g[1, 2, 3]", {
        "t" => "3"
    });
    match_test!(sequence_respects_following_literal, "f[xs__, c]", "f[a, b, c]", {
        "xs" => "Sequence[a, b]"
    });
    match_test!(null_sequences_split_greedily, "f[xs___, ys___]", "f[a]", {
        "xs" => "a",
        "ys" => "Sequence[]",
    });

    // Head-constrained sequences
    match_test!(
        typed_sequence_takes_constrained_prefix,
        "f[BlankSequence[Integer], x_]",
        "f[1, 2, a]",
        { "x" => "a" }
    );
    match_test!(
        typed_sequence_rejects_mixed_prefix,
        "f[BlankSequence[Integer]]",
        "f[1, a, 2]",
        fails
    );
    match_test!(
        named_typed_null_sequence,
        "f[Pattern[xs, BlankNullSequence[Integer]], a]",
        "f[1, 2, a]",
        { "xs" => "Sequence[1, 2]" }
    );

    // Alternatives
    match_test!(alternatives_first_branch, "Alternatives[1, 2]", "1", {});
    match_test!(alternatives_later_branch, "Alternatives[1, 2]", "2", {});
    match_test!(alternatives_no_branch, "Alternatives[1, 2]", "3", fails);
    match_test!(
        alternatives_inside_expression,
        "f[Alternatives[a, b], x_]",
        "f[b, 9]",
        { "x" => "9" }
    );
    match_test!(
        alternatives_with_sequence_branch,
        "f[Alternatives[a, BlankSequence[Integer]]]",
        "f[1, 2, 3]",
        {}
    );

    // Repeated
    match_test!(repeated_matches_run, "f[Repeated[a]]", "f[a, a, a]", {});
    match_test!(repeated_needs_one, "f[Repeated[a]]", "f[]", fails);
    match_test!(repeated_rejects_interloper, "f[Repeated[a]]", "f[a, b]", fails);
    match_test!(repeated_with_trailing_pattern, "f[Repeated[a], x_]", "f[a, a, b]", {
        "x" => "b"
    });
    match_test!(repeated_inner_bindings_agree, "f[Repeated[x_]]", "f[a, a]", {
        "x" => "a"
    });
    match_test!(repeated_inner_bindings_disagree, "f[Repeated[x_]]", "f[a, b]", fails);

    // Sequence values are ordinary values to a blank
    match_test!(blank_swallows_sequence_value, "_", "Sequence[a, b]", {});
    match_test!(top_level_sequence_blank, "__", "42", {});

    #[test]
    fn failed_match_reports_no_bindings() {
        let definitions = Definitions::new();
        let result = match_pattern(
            &parse!("f[x_, x_]"),
            &parse!("f[1, 2]"),
            &definitions,
        );

        assert!(!result.success());
        assert_eq!(result.iter_bindings().count(), 0);
        assert_eq!(result.binding(&Symbol::new("x")), None);
    }

    #[test]
    fn arity_contract() {
        assert_eq!(match_arity(&parse!("42")), (1, 1));
        assert_eq!(match_arity(&parse!("f[a]")), (1, 1));
        assert_eq!(match_arity(&parse!("_")), (1, 1));
        assert_eq!(match_arity(&parse!("__")), (1, MATCH_MAX));
        assert_eq!(match_arity(&parse!("___")), (0, MATCH_MAX));
        assert_eq!(match_arity(&parse!("x__")), (1, MATCH_MAX));
        assert_eq!(match_arity(&parse!("Repeated[a]")), (1, MATCH_MAX));
        assert_eq!(
            match_arity(&parse!("Alternatives[_, __]")),
            (1, MATCH_MAX)
        );
        assert_eq!(
            match_arity(&parse!("Alternatives[___, _]")),
            (0, MATCH_MAX)
        );
    }
}
