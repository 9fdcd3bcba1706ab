use aster_core::{
    Definitions, EvalContext, Expr, evaluate, full_form, match_pattern, parse,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::process::ExitCode;

/// Smoke test for the expression kernel: build a few expressions, reduce
/// them, check the results, print what happened.
fn main() -> ExitCode {
    env_logger::init();

    let mut definitions = Definitions::with_builtins();

    // Plus[a, b] assembled by hand from interned symbols.
    let plus = definitions.lookup("Plus").expect("Plus is registered");
    let a = definitions.intern("a");
    let b = definitions.intern("b");
    let expr = Expr::normal(plus, vec![Expr::from(a), Expr::from(b)]);

    let ctx = EvalContext::new(&definitions);

    let result = match evaluate(&expr, &ctx) {
        Ok(result) => result,
        Err(error) => return report(error),
    };
    println!("{}", full_form(&result));

    if match_pattern(&expr, &expr, &definitions).success() {
        println!("matches!");
    }

    let mut hasher = DefaultHasher::new();
    expr.hash(&mut hasher);
    println!("hash = {}", hasher.finish());

    // A handful of reductions through the full pipeline.
    let checks = [
        ("Plus[a, b]", "Plus[a, b]"),
        ("Plus[b, a]", "Plus[a, b]"),
        ("Plus[1, 2, 3]", "6"),
        ("Plus[1, Plus[2, 3]]", "6"),
        ("Times[2, 3, 4]", "24"),
        ("Range[5]", "List[1, 2, 3, 4, 5]"),
        ("Plus[Range[3], Range[3]]", "List[2, 4, 6]"),
    ];

    for (input, expected) in checks {
        let parsed = match parse(input) {
            Ok(parsed) => parsed,
            Err(error) => {
                eprintln!("parse error in '{}': {}", input, error);
                return ExitCode::FAILURE;
            }
        };

        let result = match evaluate(&parsed, &ctx) {
            Ok(result) => result,
            Err(error) => return report(error),
        };

        let rendered = full_form(&result);
        if rendered != expected {
            eprintln!("{} evaluated to {}, expected {}", input, rendered, expected);
            return ExitCode::FAILURE;
        }

        println!("{} -> {}", input, rendered);
    }

    // And one match with a captured binding.
    let pattern = parse("Pattern[x, Blank[Integer]]").expect("pattern parses");
    let subject = Expr::from(42i64);
    let matched = match_pattern(&pattern, &subject, &definitions);
    let x = definitions.intern("x");

    match matched.binding(&x) {
        Some(value) if *value == subject => println!("x -> {}", full_form(value)),
        _ => {
            eprintln!("expected x to capture 42");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

fn report(error: aster_core::EvalError) -> ExitCode {
    eprintln!("{}", error);
    eprintln!("while reducing: {}", full_form(error.expr()));
    ExitCode::FAILURE
}
