use num_traits::{One, PrimInt};

/// Trait implemented by flag enums whose discriminant is the bit index.
///
/// The backing integer type is chosen via the associated `Storage`; the
/// replication mask uses `u8` since a body has fewer than eight dirty
/// categories.
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // Equivalent to: 1 << index
        // NOTE: Ensure your `bit_index()` is < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// A pure bitmask container over a primitive integer.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub fn new(bits: T) -> Self {
        Self { bits }
    }

    pub fn add<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits | tag.mask();
    }

    pub fn remove<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits & !tag.mask();
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, tag: U) -> bool {
        (self.bits & tag.mask()) != T::zero()
    }

    pub fn any(&self) -> bool {
        self.bits != T::zero()
    }

    pub fn clear(&mut self) {
        self.bits = T::zero();
    }
}

/// Per-body replication dirty categories.
///
/// The server tick compares the freshly read-back pose against the last
/// replicated one and raises the matching bits; a body with an empty mask is
/// skipped by the snapshot pass entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DirtyBit {
    Position,
    Rotation,
    Velocity,
    Forces,
    Flags,
}

impl FlagBitmask for DirtyBit {
    type Storage = u8;

    fn bit_index(&self) -> u8 {
        *self as u8
    }
}

/// The replication mask carried by each body binding.
pub type ReplicationMask = BitmaskFlags<u8>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mask_has_no_bits() {
        let mask = ReplicationMask::default();
        assert!(!mask.any());
        assert!(!mask.has(DirtyBit::Position));
    }

    #[test]
    fn add_remove_round_trip() {
        let mut mask = ReplicationMask::default();
        mask.add(DirtyBit::Position);
        mask.add(DirtyBit::Velocity);

        assert!(mask.any());
        assert!(mask.has(DirtyBit::Position));
        assert!(mask.has(DirtyBit::Velocity));
        assert!(!mask.has(DirtyBit::Rotation));

        mask.remove(DirtyBit::Position);
        assert!(!mask.has(DirtyBit::Position));
        assert!(mask.has(DirtyBit::Velocity));
    }

    #[test]
    fn clear_resets_all_bits() {
        let mut mask = ReplicationMask::default();
        mask.add(DirtyBit::Flags);
        mask.add(DirtyBit::Forces);
        mask.clear();
        assert!(!mask.any());
    }

    #[test]
    fn bit_indices_are_distinct() {
        let bits = [
            DirtyBit::Position,
            DirtyBit::Rotation,
            DirtyBit::Velocity,
            DirtyBit::Forces,
            DirtyBit::Flags,
        ];
        for (i, a) in bits.iter().enumerate() {
            for b in bits.iter().skip(i + 1) {
                assert_ne!(a.bit_index(), b.bit_index());
            }
        }
    }
}
