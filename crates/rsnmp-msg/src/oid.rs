//! Object identifier type.

use std::fmt;
use std::str::FromStr;

use crate::error::{CodecError, OidRepr};

/// An object identifier: an ordered sequence of non-negative arcs.
///
/// The canonical textual form is dot-separated with a leading dot
/// (`.1.3.6.1.2.1`). Parsing accepts the form without the leading dot as
/// well. Ordering is lexicographic over the arcs, which matches the
/// MIB-tree ordering GetNext/GetBulk traversals rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Oid(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `self` is a strict descendant of `root`, i.e. its
    /// textual form is prefixed by `root.`.
    pub fn is_descendant_of(&self, root: &Oid) -> bool {
        self.0.len() > root.0.len() && self.0[..root.0.len()] == root.0[..]
    }

    /// Appends an arc, returning the extended OID.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Oid(arcs)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid(arcs.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Oid(arcs.to_vec())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arc in &self.0 {
            write!(f, ".{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix('.').unwrap_or(s);
        if body.is_empty() {
            return Err(CodecError::OidFromStr {
                input: s.to_string(),
                reason: OidRepr::Empty,
            });
        }
        let mut arcs = Vec::new();
        for part in body.split('.') {
            let arc = part.parse::<u32>().map_err(|_| CodecError::OidFromStr {
                input: s.to_string(),
                reason: OidRepr::BadArcText,
            })?;
            arcs.push(arc);
        }
        Ok(Oid(arcs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let oid: Oid = ".1.3.6.1.2.1".parse().unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1]);
        assert_eq!(oid.to_string(), ".1.3.6.1.2.1");

        // The leading dot is optional on input.
        let bare: Oid = "1.3.6.1".parse().unwrap();
        assert_eq!(bare.arcs(), &[1, 3, 6, 1]);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Oid::from_str("").is_err());
        assert!(Oid::from_str(".").is_err());
        assert!(Oid::from_str(".1.3.x").is_err());
        assert!(Oid::from_str(".1..3").is_err());
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a: Oid = ".1.3.6.1.2.1.1.1.0".parse().unwrap();
        let b: Oid = ".1.3.6.1.2.1.1.2.0".parse().unwrap();
        let c: Oid = ".1.3.6.1.2.1.1.2".parse().unwrap();
        assert!(a < b);
        assert!(c < b);
        assert!(a > c);
    }

    #[test]
    fn descendant_check() {
        let root: Oid = ".1.3.6.1.2.1.1".parse().unwrap();
        let leaf: Oid = ".1.3.6.1.2.1.1.5.0".parse().unwrap();
        let sibling: Oid = ".1.3.6.1.2.1.2".parse().unwrap();
        assert!(leaf.is_descendant_of(&root));
        assert!(!root.is_descendant_of(&root));
        assert!(!sibling.is_descendant_of(&root));
    }
}
