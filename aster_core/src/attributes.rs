use bitflags::bitflags;

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        const HOLD_FIRST        = 0b0001;
        const HOLD_REST         = 0b0010;
        const HOLD_ALL          = 0b0100;
        const HOLD_ALL_COMPLETE = 0b1000;

        const FLAT         = 0b0001_0000;
        const ORDERLESS    = 0b0010_0000;
        const ONE_IDENTITY = 0b0100_0000;
        const LISTABLE     = 0b1000_0000;

        const SEQUENCE_HOLD    = 0b0001_0000_0000;
        const NUMERIC_FUNCTION = 0b0010_0000_0000;
        const CONSTANT         = 0b0100_0000_0000;

        /// Rules of the symbol cannot be changed.
        const PROTECTED = 0b0001_0000_0000_0000;

        /// Attributes of the symbol cannot be changed.
        const LOCKED = 0b0010_0000_0000_0000;
    }
}

impl Attributes {
    pub const HOLD_MASK: Attributes = Attributes::HOLD_FIRST
        .union(Attributes::HOLD_REST)
        .union(Attributes::HOLD_ALL)
        .union(Attributes::HOLD_ALL_COMPLETE);

    /// At most one of the hold attributes may be set on a symbol.
    pub fn has_conflicting_holds(self) -> bool {
        (self & Self::HOLD_MASK).bits().count_ones() > 1
    }

    pub fn holds_all(self) -> bool {
        self.intersects(Self::HOLD_ALL | Self::HOLD_ALL_COMPLETE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_attributes_conflict_pairwise() {
        assert!(!Attributes::HOLD_ALL.has_conflicting_holds());
        assert!(!(Attributes::HOLD_FIRST | Attributes::ORDERLESS).has_conflicting_holds());
        assert!((Attributes::HOLD_FIRST | Attributes::HOLD_REST).has_conflicting_holds());
        assert!((Attributes::HOLD_ALL | Attributes::HOLD_ALL_COMPLETE).has_conflicting_holds());
    }
}
