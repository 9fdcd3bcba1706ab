use std::fmt;
use ustr::Ustr;

/// An interned symbol name. Two `Symbol`s are equal exactly when they refer
/// to the same interned string, so equality and hashing are pointer-cheap.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(Ustr);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(Ustr::from(name))
    }

    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
