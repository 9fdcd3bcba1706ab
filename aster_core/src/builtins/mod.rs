mod symbols;

use crate::definitions::RuleError;
use crate::matching::try_sequence;
use crate::{
    Attributes, Bindings, Definitions, EvalContext, Expr, ExprKind, Rule, RuleKind, Slice, Symbol,
    parse, sym,
};
use rug::Integer;

pub use symbols::*;

/// Registers the built-in arithmetic rules. Everything here goes through the
/// public rule interface; the evaluator knows nothing about these symbols.
pub(crate) fn register_builtins(definitions: &mut Definitions) {
    register_plus_builtin(definitions);
    register_times_builtin(definitions);
    register_range_builtin(definitions);
}

/// The leaves a `exprs___` capture stands for.
fn sequence_elements(value: &Expr) -> Slice {
    match try_sequence(value) {
        Some(leaves) => leaves.clone(),
        None => Slice::from_exprs(vec![value.clone()]),
    }
}

/// Registers the `Plus` builtin symbol.
///
/// - `Attributes[Plus] = { Protected, Flat, Orderless, OneIdentity, Listable, NumericFunction }`
/// - `Plus[exprs___] := built-in`
pub(crate) fn register_plus_builtin(definitions: &mut Definitions) {
    definitions
        .add_rule(
            &sym!(Plus),
            RuleKind::Down,
            Rule::builtin(parse!("Plus[exprs___]"), plus_builtin),
        )
        .unwrap();

    definitions
        .set_attributes(
            &sym!(Plus),
            Attributes::PROTECTED
                | Attributes::FLAT
                | Attributes::ORDERLESS
                | Attributes::ONE_IDENTITY
                | Attributes::LISTABLE
                | Attributes::NUMERIC_FUNCTION,
        )
        .unwrap();
}

fn plus_builtin(
    bindings: &Bindings,
    _expr: &Expr,
    _ctx: &EvalContext,
) -> Result<Option<Expr>, RuleError> {
    let exprs = bindings
        .get(&Symbol::new("exprs"))
        .expect("exprs___ always binds");
    let elements = sequence_elements(exprs);

    // Packed integer leaves sum without lifting a single expression. The
    // accumulator is a big integer, so overflow never needs handling.
    if elements.is_packed() && elements.type_mask() == crate::Type::MachineInteger.mask() {
        let mut sum = Integer::new();
        for v in elements.primitives::<i64>() {
            sum += *v;
        }
        return Ok(Some(Expr::integer(sum)));
    }

    let mut int_sum = Integer::new();
    let mut real_sum = 0f64;
    let mut seen_real = false;
    let mut terms = Vec::with_capacity(elements.len());

    for leaf in elements.iter() {
        match leaf.kind() {
            ExprKind::MachineInteger(v) => int_sum += *v,
            ExprKind::BigInteger(v) => int_sum += v,
            ExprKind::MachineReal(v) => {
                real_sum += *v;
                seen_real = true;
            }
            _ => terms.push(leaf.clone()),
        }
    }

    let numeric = if seen_real {
        Some(Expr::from(real_sum + int_sum.to_f64()))
    } else if int_sum != 0 || terms.is_empty() {
        Some(Expr::integer(int_sum))
    } else {
        None
    };

    let mut new_elements = Vec::with_capacity(terms.len() + 1);
    new_elements.extend(numeric);
    new_elements.append(&mut terms);

    if new_elements.len() == 1 {
        return Ok(Some(new_elements.pop().unwrap()));
    }

    if new_elements == elements.to_vec() {
        Ok(None)
    } else {
        Ok(Some(Expr::normal(sym!(Plus), new_elements)))
    }
}

/// Registers the `Times` builtin symbol.
///
/// - `Attributes[Times] = { Protected, Flat, Orderless, OneIdentity, Listable, NumericFunction }`
/// - `Times[exprs___] := built-in`
pub(crate) fn register_times_builtin(definitions: &mut Definitions) {
    definitions
        .add_rule(
            &sym!(Times),
            RuleKind::Down,
            Rule::builtin(parse!("Times[exprs___]"), times_builtin),
        )
        .unwrap();

    definitions
        .set_attributes(
            &sym!(Times),
            Attributes::PROTECTED
                | Attributes::FLAT
                | Attributes::ORDERLESS
                | Attributes::ONE_IDENTITY
                | Attributes::LISTABLE
                | Attributes::NUMERIC_FUNCTION,
        )
        .unwrap();
}

fn times_builtin(
    bindings: &Bindings,
    _expr: &Expr,
    _ctx: &EvalContext,
) -> Result<Option<Expr>, RuleError> {
    let exprs = bindings
        .get(&Symbol::new("exprs"))
        .expect("exprs___ always binds");
    let elements = sequence_elements(exprs);

    let mut int_product = Integer::from(1);
    let mut real_product = 1f64;
    let mut seen_real = false;
    let mut factors = Vec::with_capacity(elements.len());

    for leaf in elements.iter() {
        match leaf.kind() {
            ExprKind::MachineInteger(v) => int_product *= *v,
            ExprKind::BigInteger(v) => int_product *= v,
            ExprKind::MachineReal(v) => {
                real_product *= *v;
                seen_real = true;
            }
            _ => factors.push(leaf.clone()),
        }
    }

    if !seen_real && int_product == 0 {
        return Ok(Some(Expr::from(0i64)));
    }

    let numeric = if seen_real {
        Some(Expr::from(real_product * int_product.to_f64()))
    } else if int_product != 1 || factors.is_empty() {
        Some(Expr::integer(int_product))
    } else {
        None
    };

    let mut new_elements = Vec::with_capacity(factors.len() + 1);
    new_elements.extend(numeric);
    new_elements.append(&mut factors);

    if new_elements.len() == 1 {
        return Ok(Some(new_elements.pop().unwrap()));
    }

    if new_elements == elements.to_vec() {
        Ok(None)
    } else {
        Ok(Some(Expr::normal(sym!(Times), new_elements)))
    }
}

/// Registers the `Range` builtin symbol.
///
/// - `Attributes[Range] = { Protected }`
/// - `Range[max_] := built-in`
/// - `Range[min_, max_] := built-in`
/// - `Range[min_, max_, step_] := built-in`
pub(crate) fn register_range_builtin(definitions: &mut Definitions) {
    definitions
        .add_rule(
            &sym!(Range),
            RuleKind::Down,
            Rule::builtin(parse!("Range[max_]"), |bindings, _, _| {
                let max = bindings.get(&Symbol::new("max")).unwrap();
                build_range(&Expr::from(1i64), max, &Expr::from(1i64))
            }),
        )
        .unwrap();

    definitions
        .add_rule(
            &sym!(Range),
            RuleKind::Down,
            Rule::builtin(parse!("Range[min_, max_]"), |bindings, _, _| {
                let min = bindings.get(&Symbol::new("min")).unwrap();
                let max = bindings.get(&Symbol::new("max")).unwrap();
                build_range(min, max, &Expr::from(1i64))
            }),
        )
        .unwrap();

    definitions
        .add_rule(
            &sym!(Range),
            RuleKind::Down,
            Rule::builtin(parse!("Range[min_, max_, step_]"), |bindings, _, _| {
                let min = bindings.get(&Symbol::new("min")).unwrap();
                let max = bindings.get(&Symbol::new("max")).unwrap();
                let step = bindings.get(&Symbol::new("step")).unwrap();
                build_range(min, max, step)
            }),
        )
        .unwrap();

    definitions
        .set_attributes(&sym!(Range), Attributes::PROTECTED)
        .unwrap();
}

/// Builds `List[min, min + step, ...]` up to `max`. Integer ranges of any
/// length come out of the generator constructor, so long ones land in packed
/// storage.
fn build_range(min: &Expr, max: &Expr, step: &Expr) -> Result<Option<Expr>, RuleError> {
    let (Some(min), Some(max), Some(step)) = (
        min.try_machine_integer(),
        max.try_machine_integer(),
        step.try_machine_integer(),
    ) else {
        return Ok(None);
    };

    if step == 0 {
        return Err("Range step must not be zero".into());
    }

    let count = if step > 0 && max >= min {
        (max - min) / step + 1
    } else if step < 0 && max <= min {
        (min - max) / -step + 1
    } else {
        0
    };

    let list = Expr::normal_with(sym!(List), count as usize, |leaves| {
        let mut v = min;
        for _ in 0..count {
            leaves.push(Expr::from(v));
            v = v.saturating_add(step);
        }
    });

    Ok(Some(list))
}
