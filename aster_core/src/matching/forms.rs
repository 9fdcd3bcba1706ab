use crate::{Expr, Slice, Symbol, sym};

/// Matches an expression of the form `Sequence[...]`, yielding its leaves.
pub fn try_sequence(expr: &Expr) -> Option<&Slice> {
    expr.try_normal_head(&sym!(Sequence)).map(|n| n.leaves())
}

pub fn is_sequence(expr: &Expr) -> bool {
    expr.is_normal_head(&sym!(Sequence))
}

/// Matches an expression of any of the following forms:
///
/// - `Blank[]`
/// - `Blank[h]`
pub fn try_blank(expr: &Expr) -> Option<Option<Expr>> {
    let normal = expr.try_normal_head(&sym!(Blank))?;

    match normal.len() {
        0 => Some(None),
        1 => Some(Some(normal.leaf(0))),
        _ => None,
    }
}

/// Matches an expression of any of the following forms:
///
/// - `BlankSequence[]`
/// - `BlankSequence[h]`
pub fn try_blank_sequence(expr: &Expr) -> Option<Option<Expr>> {
    let normal = expr.try_normal_head(&sym!(BlankSequence))?;

    match normal.len() {
        0 => Some(None),
        1 => Some(Some(normal.leaf(0))),
        _ => None,
    }
}

/// Matches an expression of any of the following forms:
///
/// - `BlankNullSequence[]`
/// - `BlankNullSequence[h]`
pub fn try_blank_null_sequence(expr: &Expr) -> Option<Option<Expr>> {
    let normal = expr.try_normal_head(&sym!(BlankNullSequence))?;

    match normal.len() {
        0 => Some(None),
        1 => Some(Some(normal.leaf(0))),
        _ => None,
    }
}

/// Matches `Pattern[name, subpattern]`, yielding the capture name and the
/// inner pattern.
pub fn try_pattern(expr: &Expr) -> Option<(Symbol, Expr)> {
    let normal = expr.try_normal_head(&sym!(Pattern))?;

    if normal.len() != 2 {
        return None;
    }

    let name = *normal.leaf(0).try_symbol()?;
    Some((name, normal.leaf(1)))
}

/// Matches `Alternatives[p1, ..., pk]`, yielding the branch patterns.
pub fn try_alternatives(expr: &Expr) -> Option<Slice> {
    expr.try_normal_head(&sym!(Alternatives))
        .map(|n| n.leaves().clone())
}

/// Matches `Repeated[p]` (a repetition specification as a second leaf is
/// tolerated and ignored), yielding the repeated pattern.
pub fn try_repeated(expr: &Expr) -> Option<Expr> {
    let normal = expr.try_normal_head(&sym!(Repeated))?;

    match normal.len() {
        1 | 2 => Some(normal.leaf(0)),
        _ => None,
    }
}
