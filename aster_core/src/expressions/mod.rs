mod kind;
mod normal;
mod number;
mod symbol;

use crate::slice::LeafBuilder;
use rug::{Integer, Rational};
use std::cmp::Ordering;
use std::fmt;
use std::fmt::Formatter;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use kind::{ExprKind, Type, TypeMask, is_homogeneous};
pub(crate) use kind::{hash_machine_integer, hash_machine_real, hash_string};
pub use normal::Normal;
pub use number::{OrdComplex, OrdFloat};
pub use symbol::Symbol;

/// An expression node: an atomic value or a normal expression `f[a1, ..., an]`.
///
/// Internally an `Arc<ExprKind>`, so cloning is a reference-count bump and
/// equality can short-circuit on pointer identity. Expressions are immutable
/// once constructed; rewriting produces new expressions that share every
/// unchanged subtree.
#[derive(Clone)]
pub struct Expr(Arc<ExprKind>);

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self(Arc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        self.0.as_ref()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn type_of(&self) -> Type {
        self.0.type_of()
    }

    pub fn type_mask(&self) -> TypeMask {
        self.0.type_mask()
    }

    /// Builds a normal expression, picking the narrowest leaf storage.
    pub fn normal(head: impl Into<Expr>, leaves: Vec<Expr>) -> Self {
        Self::from(Normal::new(head, leaves))
    }

    /// By-generator constructor: `fill` pushes leaves into a storage sink so
    /// that small expressions are assembled in place without allocating.
    pub fn normal_with(
        head: impl Into<Expr>,
        size_hint: usize,
        fill: impl FnOnce(&mut LeafBuilder),
    ) -> Self {
        let mut builder = LeafBuilder::with_capacity(size_hint);
        fill(&mut builder);
        Self::from(Normal::from_slice(head, builder.finish()))
    }

    /// An integer atom, narrowed to the machine representation when it fits.
    pub fn integer(value: Integer) -> Self {
        match value.to_i64() {
            Some(v) => Self::from(v),
            None => Self::from(value),
        }
    }

    /// A rational atom; integral values collapse to integers.
    pub fn rational(value: Rational) -> Self {
        if *value.denom() == 1 {
            Self::integer(value.into_numer_denom().0)
        } else {
            Self::from(value)
        }
    }

    /// The symbol under which rules for this expression would be looked up:
    /// the symbol itself, or the symbol head of a normal expression.
    pub fn name(&self) -> Option<&Symbol> {
        match self.kind() {
            ExprKind::Symbol(symbol) => Some(symbol),
            ExprKind::Normal(normal) => normal.try_head_symbol(),
            _ => None,
        }
    }

    /// The head of this expression. Atoms yield their type symbol.
    pub fn head(&self) -> Expr {
        match self.kind() {
            ExprKind::Symbol(_) => Self::from(Symbol::new("Symbol")),
            ExprKind::MachineInteger(_) | ExprKind::BigInteger(_) => {
                Self::from(Symbol::new("Integer"))
            }
            ExprKind::MachineReal(_) | ExprKind::BigReal(_) => Self::from(Symbol::new("Real")),
            ExprKind::Rational(_) => Self::from(Symbol::new("Rational")),
            ExprKind::Complex(_) => Self::from(Symbol::new("Complex")),
            ExprKind::String(_) => Self::from(Symbol::new("String")),
            ExprKind::Normal(normal) => normal.head().clone(),
        }
    }

    pub fn is_normal_head(&self, head: &Symbol) -> bool {
        match self.kind() {
            ExprKind::Normal(normal) => normal.has_head(head),
            _ => false,
        }
    }

    pub fn try_string(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_machine_integer(&self) -> Option<i64> {
        match self.kind() {
            ExprKind::MachineInteger(v) => Some(*v),
            _ => None,
        }
    }

    pub fn try_symbol(&self) -> Option<&Symbol> {
        match self.kind() {
            ExprKind::Symbol(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_normal(&self) -> Option<&Normal> {
        match self.kind() {
            ExprKind::Normal(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_normal_head(&self, head: &Symbol) -> Option<&Normal> {
        match self.kind() {
            ExprKind::Normal(v) if v.has_head(head) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.0.hash(hasher);
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            Ordering::Equal
        } else {
            self.0.cmp(&other.0)
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<Integer> for Expr {
    fn from(value: Integer) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<OrdFloat> for Expr {
    fn from(value: OrdFloat) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<Rational> for Expr {
    fn from(value: Rational) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<OrdComplex> for Expr {
    fn from(value: OrdComplex) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<Symbol> for Expr {
    fn from(value: Symbol) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl From<Normal> for Expr {
    fn from(value: Normal) -> Self {
        Self::new(ExprKind::from(value))
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(expr: &Expr) -> u64 {
        let mut hasher = DefaultHasher::new();
        expr.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn atoms_report_their_type_symbol_as_head() {
        assert_eq!(Expr::from(42i64).head(), Expr::from(Symbol::new("Integer")));
        assert_eq!(
            Expr::from(Integer::from(i64::MAX) + 1).head(),
            Expr::from(Symbol::new("Integer"))
        );
        assert_eq!(Expr::from(1.5f64).head(), Expr::from(Symbol::new("Real")));
        assert_eq!(Expr::from("s").head(), Expr::from(Symbol::new("String")));
        assert_eq!(
            Expr::from(Symbol::new("x")).head(),
            Expr::from(Symbol::new("Symbol"))
        );

        let expr = Expr::normal(Symbol::new("f"), vec![Expr::from(1i64)]);
        assert_eq!(expr.head(), Expr::from(Symbol::new("f")));
    }

    #[test]
    fn integer_constructor_narrows_to_machine_size() {
        assert_eq!(Expr::integer(Integer::from(7)), Expr::from(7i64));
        assert!(matches!(
            Expr::integer(Integer::from(i64::MAX) + 1).kind(),
            ExprKind::BigInteger(_)
        ));
    }

    #[test]
    fn rational_constructor_collapses_integral_values() {
        assert_eq!(Expr::rational(Rational::from((4, 2))), Expr::from(2i64));
        assert!(matches!(
            Expr::rational(Rational::from((1, 3))).kind(),
            ExprKind::Rational(_)
        ));
    }

    #[test]
    fn canonical_order_puts_numbers_before_symbols_before_normals() {
        let mut exprs = vec![
            Expr::normal(Symbol::new("f"), vec![]),
            Expr::from(Symbol::new("a")),
            Expr::from("s"),
            Expr::from(2i64),
            Expr::from(1i64),
        ];
        exprs.sort();

        assert_eq!(exprs[0], Expr::from(1i64));
        assert_eq!(exprs[1], Expr::from(2i64));
        assert_eq!(exprs[2], Expr::from("s"));
        assert_eq!(exprs[3], Expr::from(Symbol::new("a")));
        assert_eq!(exprs[4], Expr::normal(Symbol::new("f"), vec![]));
    }

    #[test]
    fn generator_constructor_agrees_with_the_vector_constructor() {
        let head = Symbol::new("f");

        let by_vector = Expr::normal(head, (1..=5i64).map(Expr::from).collect());
        let by_generator = Expr::normal_with(head, 5, |leaves| {
            for v in 1..=5i64 {
                leaves.push(Expr::from(v));
            }
        });

        assert_eq!(by_vector, by_generator);
        assert_eq!(hash_of(&by_vector), hash_of(&by_generator));
        assert!(by_generator.try_normal().unwrap().leaves().is_packed());
    }

    #[test]
    fn equality_and_hash_ignore_the_slice_representation() {
        let packed = Expr::normal(Symbol::new("f"), (1..=4i64).map(Expr::from).collect());
        let unpacked = Expr::from(Normal::from_slice(
            Symbol::new("f"),
            packed.try_normal().unwrap().leaves().unpack(),
        ));

        assert_eq!(packed, unpacked);
        assert_eq!(hash_of(&packed), hash_of(&unpacked));
    }

    #[test]
    fn name_is_the_rule_lookup_symbol() {
        let f = Symbol::new("f");

        assert_eq!(Expr::from(f).name(), Some(&f));
        assert_eq!(Expr::normal(f, vec![]).name(), Some(&f));
        assert_eq!(Expr::from(1i64).name(), None);

        let curried = Expr::normal(Expr::normal(f, vec![]), vec![]);
        assert_eq!(curried.name(), None);
    }
}
