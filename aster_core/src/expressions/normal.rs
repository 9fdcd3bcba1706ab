use crate::{Expr, Slice, Symbol, TypeMask};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A normal expression of the form `f[a1, ..., an]`: a head plus a slice of
/// leaves.
#[derive(Clone, Debug)]
pub struct Normal {
    head: Expr,
    leaves: Slice,
}

impl Normal {
    pub fn new(head: impl Into<Expr>, leaves: Vec<Expr>) -> Self {
        Self {
            head: head.into(),
            leaves: Slice::from_exprs(leaves),
        }
    }

    pub fn from_slice(head: impl Into<Expr>, leaves: Slice) -> Self {
        Self {
            head: head.into(),
            leaves,
        }
    }

    pub fn head(&self) -> &Expr {
        &self.head
    }

    pub fn leaves(&self) -> &Slice {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaf(&self, i: usize) -> Expr {
        self.leaves.leaf(i)
    }

    pub fn has_head(&self, head: &Symbol) -> bool {
        match self.head.try_symbol() {
            Some(head_symbol) => head_symbol == head,
            None => false,
        }
    }

    pub fn try_head_symbol(&self) -> Option<&Symbol> {
        self.head.try_symbol()
    }

    /// Rewrites this expression with a (possibly new) head and with every
    /// leaf in `[begin, end)` whose type mask overlaps `mask` passed through
    /// `f`. Returns `None` when `f` changed nothing and `head` equals the
    /// current head, in which case no storage is allocated; otherwise the
    /// unchanged prefix is shared and the rest copied.
    pub fn try_apply<E>(
        &self,
        head: &Expr,
        begin: usize,
        end: usize,
        mask: TypeMask,
        f: impl FnMut(&Expr) -> Result<Option<Expr>, E>,
    ) -> Result<Option<Expr>, E> {
        let new_leaves = self.leaves.try_map_range(begin, end, mask, f)?;
        let head_changed = *head != self.head;

        Ok(match (head_changed, new_leaves) {
            (false, None) => None,
            (false, Some(leaves)) => Some(Expr::from(Normal::from_slice(self.head.clone(), leaves))),
            (true, None) => Some(Expr::from(Normal::from_slice(head.clone(), self.leaves.clone()))),
            (true, Some(leaves)) => Some(Expr::from(Normal::from_slice(head.clone(), leaves))),
        })
    }

    /// Infallible variant of [`Normal::try_apply`] keeping the current head.
    pub fn map_leaves(
        &self,
        begin: usize,
        end: usize,
        mask: TypeMask,
        mut f: impl FnMut(&Expr) -> Option<Expr>,
    ) -> Option<Expr> {
        let head = self.head.clone();
        let result: Result<_, std::convert::Infallible> =
            self.try_apply(&head, begin, end, mask, |leaf| Ok(f(leaf)));
        result.unwrap()
    }
}

impl PartialEq for Normal {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.leaves == other.leaves
    }
}

impl Eq for Normal {}

impl Hash for Normal {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.head.hash(hasher);
        self.leaves.hash(hasher);
    }
}

impl Ord for Normal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.head
            .cmp(&other.head)
            .then_with(|| self.len().cmp(&other.len()))
            .then_with(|| self.leaves.cmp(&other.leaves))
    }
}

impl PartialOrd for Normal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Normal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}[", self.head)?;

        for (idx, leaf) in self.leaves.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }

            write!(f, "{}", leaf)?;
        }

        write!(f, "]")
    }
}
