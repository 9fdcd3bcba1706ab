use crate::Symbol;
use once_cell::sync::Lazy;

/// Canonical symbols the kernel itself gives meaning to. Interning makes
/// each of these a pointer-equality handle, so the table exists to give the
/// rest of the crate one well-known spelling per symbol.
#[allow(non_snake_case)]
pub struct StandardSymbols {
    pub Sequence: Symbol,
    pub Blank: Symbol,
    pub BlankSequence: Symbol,
    pub BlankNullSequence: Symbol,
    pub Pattern: Symbol,
    pub Alternatives: Symbol,
    pub Repeated: Symbol,
    pub List: Symbol,
    pub Hold: Symbol,
    pub Null: Symbol,
    pub Plus: Symbol,
    pub Times: Symbol,
    pub Range: Symbol,
    pub String: Symbol,
    pub Integer: Symbol,
    pub Real: Symbol,
    pub Rational: Symbol,
    pub Complex: Symbol,
    pub Symbol: Symbol,
}

pub static STANDARD_SYMBOLS: Lazy<StandardSymbols> = Lazy::new(|| StandardSymbols {
    Sequence: Symbol::new("Sequence"),
    Blank: Symbol::new("Blank"),
    BlankSequence: Symbol::new("BlankSequence"),
    BlankNullSequence: Symbol::new("BlankNullSequence"),
    Pattern: Symbol::new("Pattern"),
    Alternatives: Symbol::new("Alternatives"),
    Repeated: Symbol::new("Repeated"),
    List: Symbol::new("List"),
    Hold: Symbol::new("Hold"),
    Null: Symbol::new("Null"),
    Plus: Symbol::new("Plus"),
    Times: Symbol::new("Times"),
    Range: Symbol::new("Range"),
    String: Symbol::new("String"),
    Integer: Symbol::new("Integer"),
    Real: Symbol::new("Real"),
    Rational: Symbol::new("Rational"),
    Complex: Symbol::new("Complex"),
    Symbol: Symbol::new("Symbol"),
});

#[macro_export]
macro_rules! sym {
    ($name:ident) => {
        $crate::STANDARD_SYMBOLS.$name
    };
}
