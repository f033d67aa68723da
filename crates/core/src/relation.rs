//! The edge alphabet of the dependency graph and a dense bit-set over it.
//!
//! Every edge in a dependency graph carries a non-empty [`RelSet`] label.
//! Cycle searches spend most of their time asking "is this edge's label a
//! subset of the rels I am allowed to walk?", so the set is a single `u8`
//! and all operations are branch-free const fns.

use core::fmt::{self, Debug, Display, Formatter};

/// A single dependency relation between two transactions.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rel {
    /// Write-write: the source's write of some key precedes the target's.
    Ww,
    /// Write-read: the target read a value the source wrote.
    Wr,
    /// Read-write (anti-dependency): the target overwrote a value the
    /// source read.
    Rw,
    /// Same logical client, submission order.
    Process,
    /// Non-overlapping wall-clock intervals.
    Realtime,
}

impl Rel {
    /// All relations, in bit order.
    pub const ALL: [Self; 5] = [Self::Ww, Self::Wr, Self::Rw, Self::Process, Self::Realtime];

    const fn bit(self) -> u8 {
        1 << self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ww => "ww",
            Self::Wr => "wr",
            Self::Rw => "rw",
            Self::Process => "process",
            Self::Realtime => "realtime",
        }
    }
}

impl Display for Rel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`Rel`]s as a dense bit-set.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelSet(u8);

impl RelSet {
    pub const EMPTY: Self = Self(0);

    /// The full alphabet.
    pub const ALL: Self = Self::of(&Rel::ALL);

    /// Build a set from a slice of relations.
    #[must_use]
    pub const fn of(rels: &[Rel]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < rels.len() {
            bits |= rels[i].bit();
            i += 1;
        }
        Self(bits)
    }

    #[must_use]
    pub const fn single(rel: Rel) -> Self {
        Self(rel.bit())
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn with(self, rel: Rel) -> Self {
        Self(self.0 | rel.bit())
    }

    #[must_use]
    pub const fn contains(self, rel: Rel) -> bool {
        self.0 & rel.bit() != 0
    }

    /// `true` iff every relation in `self` is in `other`.
    #[must_use]
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// `true` iff every relation in `other` is in `self`.
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        other.is_subset(self)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the member relations in bit order.
    pub fn iter(self) -> impl Iterator<Item = Rel> {
        Rel::ALL.into_iter().filter(move |rel| self.contains(*rel))
    }
}

impl FromIterator<Rel> for RelSet {
    fn from_iter<I: IntoIterator<Item = Rel>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::EMPTY, |acc, rel| acc.with(rel))
    }
}

impl Debug for RelSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for RelSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, rel) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{rel}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset() {
        let ww = RelSet::single(Rel::Ww);
        let ww_wr = RelSet::of(&[Rel::Ww, Rel::Wr]);

        assert!(ww.is_subset(ww_wr));
        assert!(!ww_wr.is_subset(ww));
        assert!(ww_wr.contains_all(ww));
        assert!(RelSet::EMPTY.is_subset(ww));
        assert!(ww.is_subset(RelSet::ALL));
    }

    #[test]
    fn test_union_and_membership() {
        let a = RelSet::single(Rel::Rw);
        let b = RelSet::of(&[Rel::Process, Rel::Realtime]);
        let u = a.union(b);

        assert!(u.contains(Rel::Rw));
        assert!(u.contains(Rel::Process));
        assert!(u.contains(Rel::Realtime));
        assert!(!u.contains(Rel::Ww));
        assert_eq!(u.iter().count(), 3);
    }

    #[test]
    fn test_display() {
        let s = RelSet::of(&[Rel::Wr, Rel::Ww]);
        assert_eq!(format!("{s}"), "{ww,wr}");
        assert_eq!(format!("{}", RelSet::EMPTY), "{}");
    }

    #[test]
    fn test_from_iterator() {
        let s: RelSet = [Rel::Ww, Rel::Rw, Rel::Ww].into_iter().collect();
        assert_eq!(s, RelSet::of(&[Rel::Ww, Rel::Rw]));
    }
}
