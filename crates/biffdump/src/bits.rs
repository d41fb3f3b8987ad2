//! Bit-field extraction over packed little-endian flag words.
//!
//! BIFF packs most record options into 16/32-bit words; every decoder in
//! this crate reads them through [`Bits`] so bit numbering (LSB = 0) is in
//! one place.

/// A packed word of up to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bits(pub u64);

impl Bits {
    /// Whether bit `index` (LSB = 0) is set. Out-of-range bits read as 0.
    #[inline]
    pub fn set_at(self, index: u32) -> bool {
        index < 64 && (self.0 >> index) & 1 == 1
    }

    /// The value of the contiguous bit range `lo..=hi`, shifted down to bit 0.
    ///
    /// `hi` is clamped to 63; an empty/inverted range reads as 0.
    #[inline]
    pub fn value_at(self, lo: u32, hi: u32) -> u64 {
        if lo > hi || lo >= 64 {
            return 0;
        }
        let hi = hi.min(63);
        let width = hi - lo + 1;
        let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
        (self.0 >> lo) & mask
    }
}

impl From<u8> for Bits {
    fn from(v: u8) -> Self {
        Bits(u64::from(v))
    }
}

impl From<u16> for Bits {
    fn from(v: u16) -> Self {
        Bits(u64::from(v))
    }
}

impl From<u32> for Bits {
    fn from(v: u32) -> Self {
        Bits(u64::from(v))
    }
}

/// Rotate `value` left by `n` within an arbitrary `width`-bit word.
///
/// Bits outside the width are masked off first; the XOR obfuscation verifier
/// rotates within 15 bits, which no primitive rotate covers.
#[inline]
pub fn rotate_left(value: u64, width: u32, n: u32) -> u64 {
    debug_assert!(width >= 1 && width <= 64);
    let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let value = value & mask;
    let n = n % width;
    if n == 0 {
        return value;
    }
    ((value << n) | (value >> (width - n))) & mask
}

/// Rotate `value` right by `n` within an arbitrary `width`-bit word.
#[inline]
pub fn rotate_right(value: u64, width: u32, n: u32) -> u64 {
    let n = n % width;
    if n == 0 {
        let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
        return value & mask;
    }
    rotate_left(value, width, width - n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_bit_reads() {
        let b = Bits(0b1010);
        assert!(!b.set_at(0));
        assert!(b.set_at(1));
        assert!(!b.set_at(2));
        assert!(b.set_at(3));
        assert!(!b.set_at(64));
        assert!(!b.set_at(200));
    }

    #[test]
    fn range_reads() {
        let b = Bits(0b1101_0110);
        assert_eq!(b.value_at(1, 2), 0b11);
        assert_eq!(b.value_at(4, 7), 0b1101);
        assert_eq!(b.value_at(0, 7), 0b1101_0110);
        assert_eq!(b.value_at(5, 3), 0); // inverted
        assert_eq!(Bits(u64::MAX).value_at(0, 63), u64::MAX);
    }

    #[test]
    fn rotations_in_odd_widths() {
        // 15-bit rotate used by the XOR password verifier.
        assert_eq!(rotate_left(0x4000, 15, 1), 0x0001);
        assert_eq!(rotate_right(0x0001, 15, 1), 0x4000);
        // 8-bit sanity against the primitive rotate.
        assert_eq!(rotate_left(0xB1, 8, 3), u64::from(0xB1u8.rotate_left(3)));
    }

    proptest! {
        #[test]
        fn single_bit_range_equals_set_at(word: u64, idx in 0u32..64) {
            let b = Bits(word);
            prop_assert_eq!(b.value_at(idx, idx), u64::from(b.set_at(idx)));
        }

        #[test]
        fn extraction_stays_in_range(word: u64, lo in 0u32..64, hi in 0u32..64) {
            let v = Bits(word).value_at(lo, hi);
            if lo <= hi {
                let width = hi - lo + 1;
                if width < 64 {
                    prop_assert!(v < (1u64 << width));
                }
            } else {
                prop_assert_eq!(v, 0);
            }
        }

        #[test]
        fn rotate_round_trips(value: u64, width in 1u32..=64, n in 0u32..200) {
            let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
            let v = value & mask;
            prop_assert_eq!(rotate_right(rotate_left(v, width, n), width, n), v);
        }
    }
}
