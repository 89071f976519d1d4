//! Result of an [`InvQueue`] consistency check.
//!
//! [`InvQueue`]: crate::InvQueue

use std::{
    fmt,
    ops::{BitOr, BitOrAssign},
};

/// A set of broken invariants found by [`InvQueue::check_integrity`].
///
/// An empty set means the index and the sequence describe the same identifiers.
///
/// [`InvQueue::check_integrity`]: crate::InvQueue::check_integrity
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Violations(u8);

impl Violations {
    /// No invariant is violated.
    pub const NONE: Violations = Violations(0);
    /// The index holds a different number of entries than the sequence.
    pub const LENGTH: Violations = Violations(1);
    /// An identifier occurs more than once in the sequence.
    pub const DUPLICATE: Violations = Violations(2);
    /// An identifier in the sequence is missing from the index.
    pub const UNINDEXED: Violations = Violations(4);
    /// An identifier in the index is missing from the sequence.
    pub const MISSING: Violations = Violations(8);
    /// An index entry points at a node holding a different identifier.
    pub const STALE_HANDLE: Violations = Violations(16);
    /// The `prev`/`next` links or the head/tail pointers disagree.
    pub const LINKS: Violations = Violations(32);

    const NAMES: [(Violations, &'static str); 6] = [
        (Self::LENGTH, "LENGTH"),
        (Self::DUPLICATE, "DUPLICATE"),
        (Self::UNINDEXED, "UNINDEXED"),
        (Self::MISSING, "MISSING"),
        (Self::STALE_HANDLE, "STALE_HANDLE"),
        (Self::LINKS, "LINKS"),
    ];

    /// Returns `true` if no invariant is violated.
    pub const fn is_healthy(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if all violations in `other` are also in `self`.
    pub const fn contains(&self, other: Violations) -> bool {
        self.0 & other.0 == other.0
    }

    /// The raw bitmask, `0` when healthy.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }
}

impl BitOr for Violations {
    type Output = Violations;

    fn bitor(self, rhs: Self) -> Self::Output {
        Violations(self.0 | rhs.0)
    }
}

impl BitOrAssign for Violations {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Violations")
            .field(&format_args!("{self}"))
            .finish()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_healthy() {
            return f.write_str("NONE");
        }
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_healthy() {
        assert!(Violations::NONE.is_healthy());
        assert!(Violations::default().is_healthy());
        assert_eq!(Violations::NONE.bits(), 0);
        assert_eq!(Violations::NONE.to_string(), "NONE");
    }

    #[test]
    fn test_combine() {
        let mut v = Violations::NONE;
        v |= Violations::LENGTH;
        let v = v | Violations::MISSING;
        assert!(!v.is_healthy());
        assert!(v.contains(Violations::LENGTH));
        assert!(v.contains(Violations::MISSING));
        assert!(!v.contains(Violations::DUPLICATE));
        assert_eq!(v.bits(), 9);
        assert_eq!(v.to_string(), "LENGTH | MISSING");
        assert_eq!(format!("{v:?}"), "Violations(LENGTH | MISSING)");
    }
}
