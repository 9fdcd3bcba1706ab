use crate::{
    Definitions, EvalContext, Expr, ExprKind, Normal, OrdComplex, OrdFloat, Symbol, evaluate,
};
use rug::{Complex, Float, Integer};
use std::fmt;
use std::fmt::Write as _;
use thiserror::Error;

/// Working precision for big reals produced without an explicit precision.
pub const DEFAULT_REAL_PRECISION: u32 = 53;

/// Renders an expression in full form: `head[leaf, leaf, ...]` with atoms in
/// their canonical spelling. This is the stable textual protocol; [`parse`]
/// is its inverse.
pub fn full_form(expr: &Expr) -> String {
    expr.to_string()
}

pub(crate) fn write_escaped_string(f: &mut fmt::Formatter, s: &str) -> fmt::Result {
    f.write_char('"')?;

    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            other => f.write_char(other)?,
        }
    }

    f.write_char('"')
}

pub(crate) fn write_machine_real(f: &mut fmt::Formatter, value: f64) -> fmt::Result {
    // Debug formatting keeps the decimal point and prints the shortest
    // digits that round-trip.
    write!(f, "{:?}", value)
}

pub(crate) fn write_float_part(f: &mut fmt::Formatter, value: &Float) -> fmt::Result {
    write!(f, "{}`{}", value, value.prec())
}

pub(crate) fn write_big_real(f: &mut fmt::Formatter, value: &OrdFloat) -> fmt::Result {
    write_float_part(f, value.as_float())
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("malformed full form at byte {position}")]
pub struct ParseError {
    pub position: usize,
}

#[macro_export]
macro_rules! parse {
    ($s:expr) => {
        $crate::parse($s).unwrap()
    };
}

/// Parses the full-form protocol back into an expression.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut c = Cursor::new(input);
    c.eat_whitespace();

    let expr = parse_expr(&mut c)?;
    c.eat_whitespace();

    if c.peek().is_some() {
        return Err(c.error());
    }

    Ok(expr)
}

fn parse_expr(c: &mut Cursor) -> Result<Expr, ParseError> {
    let mut expr = parse_atom(c)?;

    loop {
        c.eat_whitespace();
        if c.peek() == Some('[') {
            expr = parse_application(c, expr)?;
        } else {
            break;
        }
    }

    Ok(expr)
}

fn parse_atom(c: &mut Cursor) -> Result<Expr, ParseError> {
    c.eat_whitespace();

    match c.peek() {
        Some('_') => parse_blank(c, None),
        Some(ch) if ch.is_ascii_digit() || ch == '-' => parse_number(c),
        Some('"') => parse_string(c),
        Some(ch) if is_symbol_start(ch) => parse_symbol_or_pattern(c),
        _ => Err(c.error()),
    }
}

fn parse_number(c: &mut Cursor) -> Result<Expr, ParseError> {
    let mut digits = String::new();
    let mut seen_dot = false;
    let mut seen_exponent = false;

    if c.peek() == Some('-') {
        digits.push('-');
        c.bump();
    }

    while let Some(ch) = c.peek() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            c.bump();
        } else if ch == '.' && !seen_dot && !seen_exponent {
            seen_dot = true;
            digits.push('.');
            c.bump();
        } else if (ch == 'e' || ch == 'E') && !seen_exponent && !digits.is_empty() {
            seen_exponent = true;
            digits.push(ch);
            c.bump();
            if matches!(c.peek(), Some('+' | '-')) {
                digits.push(c.bump().unwrap());
            }
        } else {
            break;
        }
    }

    // A backtick suffix carries the working precision of a big real.
    if c.peek() == Some('`') {
        c.bump();
        let precision = parse_precision(c)?;

        let incomplete = Float::parse(&digits).map_err(|_| c.error())?;
        return Ok(Expr::from(OrdFloat::new(Float::with_val(
            precision, incomplete,
        ))));
    }

    if seen_dot || seen_exponent {
        let value: f64 = digits.parse().map_err(|_| c.error())?;
        return Ok(Expr::from(value));
    }

    match digits.parse::<i64>() {
        Ok(value) => Ok(Expr::from(value)),
        Err(_) => {
            let incomplete = Integer::parse(&digits).map_err(|_| c.error())?;
            Ok(Expr::from(Integer::from(incomplete)))
        }
    }
}

fn parse_precision(c: &mut Cursor) -> Result<u32, ParseError> {
    let mut digits = String::new();

    while matches!(c.peek(), Some(ch) if ch.is_ascii_digit()) {
        digits.push(c.bump().unwrap());
    }

    digits.parse().map_err(|_| c.error())
}

fn parse_string(c: &mut Cursor) -> Result<Expr, ParseError> {
    if c.bump() != Some('"') {
        return Err(c.error());
    }

    let mut s = String::new();

    while let Some(ch) = c.bump() {
        match ch {
            '"' => {
                return Ok(Expr::from(s));
            }
            '\\' => match c.bump() {
                Some('"') => s.push('"'),
                Some('\\') => s.push('\\'),
                Some('n') => s.push('\n'),
                Some('t') => s.push('\t'),
                Some(other) => s.push(other),
                None => return Err(c.error()),
            },
            _ => s.push(ch),
        }
    }

    // unterminated string
    Err(c.error())
}

fn is_symbol_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '$'
}

fn parse_symbol_or_pattern(c: &mut Cursor) -> Result<Expr, ParseError> {
    let name = parse_symbol_name(c)?;

    if c.peek() == Some('_') {
        parse_blank(c, Some(name))
    } else {
        Ok(Expr::from(Symbol::new(&name)))
    }
}

fn parse_symbol_name(c: &mut Cursor) -> Result<String, ParseError> {
    let mut name = String::new();

    while let Some(ch) = c.peek() {
        if ch.is_ascii_alphanumeric() || ch == '$' {
            name.push(ch);
            c.bump();
        } else {
            break;
        }
    }

    if name.is_empty() { Err(c.error()) } else { Ok(name) }
}

fn parse_blank(c: &mut Cursor, name: Option<String>) -> Result<Expr, ParseError> {
    let mut count = 0;
    while c.peek() == Some('_') {
        c.bump();
        count += 1;
    }

    let blank_head = match count {
        1 => Symbol::new("Blank"),
        2 => Symbol::new("BlankSequence"),
        3 => Symbol::new("BlankNullSequence"),
        _ => return Err(c.error()),
    };

    let mut pattern = Expr::from(Normal::new(blank_head, vec![]));

    if let Some(name) = name {
        pattern = Expr::from(Normal::new(
            Symbol::new("Pattern"),
            vec![Expr::from(Symbol::new(&name)), pattern],
        ));
    }

    Ok(pattern)
}

fn parse_application(c: &mut Cursor, head: Expr) -> Result<Expr, ParseError> {
    if c.bump() != Some('[') {
        return Err(c.error());
    }

    let mut args = Vec::new();

    loop {
        c.eat_whitespace();

        if c.peek() == Some(']') {
            c.bump();
            break;
        }

        args.push(parse_expr(c)?);

        c.eat_whitespace();

        match c.peek() {
            Some(',') => {
                c.bump();
            }
            Some(']') => {
                c.bump();
                break;
            }
            _ => return Err(c.error()),
        }
    }

    Ok(fold_canonical_atom(head, args))
}

/// `Rational[n, d]` and `Complex[re, im]` are the canonical spellings of the
/// rational and complex atoms; fold them back so the protocol round-trips.
fn fold_canonical_atom(head: Expr, args: Vec<Expr>) -> Expr {
    if let Some(symbol) = head.try_symbol() {
        if symbol.name() == "Rational" && args.len() == 2 {
            if let (Some(numer), Some(denom)) = (as_integer(&args[0]), as_integer(&args[1])) {
                if denom != 0 {
                    return Expr::from(rug::Rational::from((numer, denom)));
                }
            }
        }

        if symbol.name() == "Complex" && args.len() == 2 {
            if let (Some(re), Some(im)) = (as_float(&args[0]), as_float(&args[1])) {
                let precision = (re.prec(), im.prec());
                return Expr::from(OrdComplex::new(Complex::with_val(precision, (re, im))));
            }
        }
    }

    Expr::normal(head, args)
}

fn as_integer(expr: &Expr) -> Option<Integer> {
    match expr.kind() {
        ExprKind::MachineInteger(v) => Some(Integer::from(*v)),
        ExprKind::BigInteger(v) => Some(v.clone()),
        _ => None,
    }
}

fn as_float(expr: &Expr) -> Option<Float> {
    match expr.kind() {
        ExprKind::MachineReal(v) => Some(Float::with_val(DEFAULT_REAL_PRECISION, *v)),
        ExprKind::BigReal(v) => Some(v.as_float().clone()),
        _ => None,
    }
}

#[derive(Clone)]
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
    }

    fn error(&self) -> ParseError {
        ParseError { position: self.pos }
    }
}

/// Evaluates `input` and asserts the result renders as `expected`.
pub fn assert_eval(definitions: &Definitions, input: &str, expected: &str) {
    let input_expr = parse(input).expect("parse input");
    let expected_expr = parse(expected).expect("parse expected");

    let ctx = EvalContext::new(definitions);
    let result = evaluate(&input_expr, &ctx).expect("evaluate");

    assert_eq!(
        result, expected_expr,
        "`{}` evaluated to `{}`, expected `{}`",
        input, result, expected
    );
}
