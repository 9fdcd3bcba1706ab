use crate::matching::{try_blank, try_blank_null_sequence, try_blank_sequence, try_pattern};
use crate::{Expr, ExprKind};
use std::cmp::Ordering;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
enum SpecificityClass {
    Atom,                   // x
    Apply,                  // f[...]
    BlankTyped,             // Blank[h]
    Blank,                  // Blank[]
    BlankSequenceTyped,     // BlankSequence[h]
    BlankSequence,          // BlankSequence[]
    BlankNullSequenceTyped, // BlankNullSequence[h]
    BlankNullSequence,      // BlankNullSequence[]
}

impl SpecificityClass {
    fn for_expr(expr: &Expr) -> Self {
        // Pattern[x, p] classifies as p
        if let Some((_, subpattern)) = try_pattern(expr) {
            return Self::for_expr(&subpattern);
        }

        if let Some(constraint) = try_blank(expr) {
            return match constraint {
                Some(_) => SpecificityClass::BlankTyped,
                None => SpecificityClass::Blank,
            };
        }

        if let Some(constraint) = try_blank_sequence(expr) {
            return match constraint {
                Some(_) => SpecificityClass::BlankSequenceTyped,
                None => SpecificityClass::BlankSequence,
            };
        }

        if let Some(constraint) = try_blank_null_sequence(expr) {
            return match constraint {
                Some(_) => SpecificityClass::BlankNullSequenceTyped,
                None => SpecificityClass::BlankNullSequence,
            };
        }

        match expr.kind() {
            ExprKind::Normal(_) => SpecificityClass::Apply,
            _ => SpecificityClass::Atom,
        }
    }
}

/// Orders patterns from more to less specific. Rule lists stay in insertion
/// order by default; this comparator is the opt-in alternative.
pub fn compare_specificity(lhs: &Expr, rhs: &Expr) -> Ordering {
    // Compare top-level specificity class
    let c1 = SpecificityClass::for_expr(lhs);
    let c2 = SpecificityClass::for_expr(rhs);
    match c1.cmp(&c2) {
        Ordering::Equal => {}
        ord => return ord,
    }

    // Prefer fewer wildcards anywhere in the pattern
    let b1 = blank_count(lhs);
    let b2 = blank_count(rhs);
    match b1.cmp(&b2) {
        Ordering::Equal => {}
        ord => return ord,
    }

    // Prefer more structure (more nodes)
    let n1 = node_count(lhs);
    let n2 = node_count(rhs);
    match n2.cmp(&n1) {
        Ordering::Equal => {}
        ord => return ord,
    }

    // Prefer deeper patterns
    let d1 = depth(lhs);
    let d2 = depth(rhs);
    match d2.cmp(&d1) {
        Ordering::Equal => {}
        ord => return ord,
    }

    // Stable fallback
    Ordering::Equal
}

fn blank_count(expr: &Expr) -> usize {
    if let Some((_, subpattern)) = try_pattern(expr) {
        return blank_count(&subpattern);
    }

    if try_blank(expr).is_some()
        || try_blank_sequence(expr).is_some()
        || try_blank_null_sequence(expr).is_some()
    {
        return 1;
    }

    match expr.kind() {
        ExprKind::Normal(normal) => {
            blank_count(normal.head())
                + normal
                    .leaves()
                    .iter()
                    .map(|leaf| blank_count(&leaf))
                    .sum::<usize>()
        }
        _ => 0,
    }
}

fn depth(expr: &Expr) -> usize {
    match expr.kind() {
        ExprKind::Normal(normal) => {
            let leaves = normal
                .leaves()
                .iter()
                .map(|leaf| depth(&leaf))
                .max()
                .unwrap_or(0);
            1 + depth(normal.head()).max(leaves)
        }
        _ => 1,
    }
}

fn node_count(expr: &Expr) -> usize {
    match expr.kind() {
        ExprKind::Normal(normal) => {
            1 + node_count(normal.head())
                + normal
                    .leaves()
                    .iter()
                    .map(|leaf| node_count(&leaf))
                    .sum::<usize>()
        }
        _ => 1,
    }
}
