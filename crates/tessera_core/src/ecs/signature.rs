//! # Signatures
//!
//! A signature is a 64-bit component mask. Bit `i` is set when an entity owns
//! a component whose type identifier is `i`. Systems carry a signature too,
//! listing the components they require.

use std::fmt;
use std::ops::{BitAnd, BitOr};

use super::component::ComponentTypeId;

/// Fixed-width component bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Signature(u64);

impl Signature {
    /// Width of the mask in bits.
    pub const BITS: usize = u64::BITS as usize;

    /// Signature with no bits set.
    pub const EMPTY: Self = Self(0);

    /// Creates a signature from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns a copy with the bit for `id` set.
    #[inline]
    #[must_use]
    pub const fn with(self, id: ComponentTypeId) -> Self {
        Self(self.0 | (1 << id.index()))
    }

    /// Sets the bit for `id`.
    #[inline]
    pub fn set(&mut self, id: ComponentTypeId) {
        self.0 |= 1 << id.index();
    }

    /// Clears the bit for `id`.
    #[inline]
    pub fn clear(&mut self, id: ComponentTypeId) {
        self.0 &= !(1 << id.index());
    }

    /// Checks the bit for `id`.
    #[inline]
    #[must_use]
    pub const fn test(self, id: ComponentTypeId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Superset test used for system membership:
    /// `(self & required) == required`.
    #[inline]
    #[must_use]
    pub const fn matches(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Iterates over the set component type identifiers in ascending order.
    pub fn iter(self) -> impl Iterator<Item = ComponentTypeId> {
        let mut remaining = self.0;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            // trailing_zeros of a non-zero u64 is < 64
            #[allow(clippy::cast_possible_truncation)]
            let bit = remaining.trailing_zeros() as u8;
            remaining &= remaining - 1;
            Some(ComponentTypeId::new(bit))
        })
    }
}

impl BitAnd for Signature {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for Signature {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signature")?;
        f.debug_set().entries(self.iter().map(ComponentTypeId::index)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: u8) -> ComponentTypeId {
        ComponentTypeId::new(index)
    }

    #[test]
    fn test_set_clear_test() {
        let mut signature = Signature::EMPTY;
        assert!(signature.is_empty());

        signature.set(id(5));
        assert!(signature.test(id(5)));
        assert!(!signature.test(id(4)));

        signature.clear(id(5));
        assert!(signature.is_empty());
    }

    #[test]
    fn test_highest_bit() {
        let signature = Signature::EMPTY.with(id(63));
        assert!(signature.test(id(63)));
        assert_eq!(signature.bits(), 1 << 63);
    }

    #[test]
    fn test_matches_is_superset() {
        let required: Signature = [id(0), id(2)].into_iter().collect();
        let exact = required;
        let superset = required.with(id(9));
        let partial = Signature::EMPTY.with(id(0));

        assert!(exact.matches(required));
        assert!(superset.matches(required));
        assert!(!partial.matches(required));
        // Every signature satisfies an empty requirement.
        assert!(Signature::EMPTY.matches(Signature::EMPTY));
    }

    #[test]
    fn test_iter_ascending() {
        let signature: Signature = [id(40), id(1), id(7)].into_iter().collect();
        let bits: Vec<u8> = signature.iter().map(ComponentTypeId::index).collect();
        assert_eq!(bits, vec![1, 7, 40]);
        assert_eq!(signature.count(), 3);
    }

    #[test]
    fn test_from_bits_matches_set_bits() {
        let signature = Signature::from_bits(0b1010_0001);
        assert_eq!(signature, Signature::EMPTY.with(id(0)).with(id(5)).with(id(7)));
        assert_eq!(Signature::from_bits(signature.bits()), signature);
        assert!(Signature::from_bits(0).is_empty());
    }

    #[test]
    fn test_debug_lists_bits() {
        let signature = Signature::EMPTY.with(id(3)).with(id(0));
        assert_eq!(format!("{signature:?}"), "Signature{0, 3}");
    }
}
