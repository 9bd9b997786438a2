//! Identifier arithmetic on the Chord ring.
//!
//! An [`Identifier`] is an integer in `[0, 2^m)`, obtained either by hashing
//! a byte string with SHA-256 or by wrapping a raw value directly (mostly
//! useful in tests). The two interval predicates [`in_exc`] and [`in_inc`]
//! are the only way the rest of the crate compares positions on the ring;
//! every higher layer is built on top of them.
//!
//! [`Identifier`]: struct.Identifier.html
//! [`in_exc`]: fn.in_exc.html
//! [`in_inc`]: fn.in_inc.html

use num_bigint::BigUint;
use num_traits::{One, Zero};
use ring::digest;
use std::fmt;
use std::ops::Add;

/// Bit width of the ring. 160 matches the original SHA-1-based
/// implementation this crate is modeled after; tests commonly shrink it to
/// make wraparound and collisions easy to provoke.
pub const DEFAULT_RING_BITS: u32 = 160;

/// An identifier on a `2^m` ring, carrying its own bit width so arithmetic
/// never silently mixes values from rings of different sizes.
#[derive(Clone, Eq, PartialEq)]
pub struct Identifier {
    value: BigUint,
    bits: u32,
}

impl Identifier {
    /// Wraps a raw value, reducing it modulo `2^bits`.
    pub fn new(value: BigUint, bits: u32) -> Self {
        let modulus = BigUint::one() << bits;
        Identifier {
            value: value % modulus,
            bits,
        }
    }

    /// Hashes `data` with SHA-256 and reduces the digest modulo `2^bits`.
    pub fn hash(data: impl AsRef<[u8]>, bits: u32) -> Self {
        let digest = digest::digest(&digest::SHA256, data.as_ref());
        let value = BigUint::from_bytes_be(digest.as_ref());
        Self::new(value, bits)
    }

    /// Adds `2^power` to this identifier, wrapping modulo `2^bits`.
    pub fn plus_power_of_two(&self, power: u32) -> Self {
        let offset = BigUint::one() << power;
        Self::new(self.value.clone() + offset, self.bits)
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.value
    }

    /// Parses an identifier previously rendered with `Display`, i.e. a
    /// plain decimal integer, as carried in RPC params on the wire.
    pub fn parse(s: &str, bits: u32) -> Option<Self> {
        BigUint::parse_bytes(s.as_bytes(), 10).map(|value| Self::new(value, bits))
    }
}

impl Add<&Identifier> for &Identifier {
    type Output = Identifier;

    fn add(self, rhs: &Identifier) -> Identifier {
        Identifier::new(&self.value + &rhs.value, self.bits)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Identifier({})", self.value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Anything that can be turned into an [`Identifier`] under a given ring
/// size: either an address/key string (hashed) or an identifier already
/// (passed through, after checking the bit width matches).
///
/// [`Identifier`]: struct.Identifier.html
pub trait Identify {
    fn identifier(&self, bits: u32) -> Identifier;
}

impl Identify for str {
    fn identifier(&self, bits: u32) -> Identifier {
        Identifier::hash(self.as_bytes(), bits)
    }
}

impl Identify for String {
    fn identifier(&self, bits: u32) -> Identifier {
        self.as_str().identifier(bits)
    }
}

impl Identify for Identifier {
    fn identifier(&self, bits: u32) -> Identifier {
        assert_eq!(self.bits, bits, "identifier from a differently sized ring");
        self.clone()
    }
}

/// x lies on the arc from `a` to `b`, exclusive of both endpoints.
///
/// If `a == b` the arc is the whole ring minus `a`, so every `x != a` is
/// considered inside.
pub fn in_exc(x: &Identifier, a: &Identifier, b: &Identifier) -> bool {
    if a.value == b.value {
        return x.value != a.value;
    }

    if a.value < b.value {
        a.value < x.value && x.value < b.value
    } else {
        x.value > a.value || x.value < b.value
    }
}

/// x lies on the arc from `a` to `b`, inclusive of `b`.
///
/// If `a == b` the arc is the whole ring, so every `x` is considered inside.
pub fn in_inc(x: &Identifier, a: &Identifier, b: &Identifier) -> bool {
    if a.value == b.value {
        return true;
    }

    if a.value < b.value {
        a.value < x.value && x.value <= b.value
    } else {
        x.value > a.value || x.value <= b.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64, bits: u32) -> Identifier {
        Identifier::new(BigUint::from(v), bits)
    }

    #[test]
    fn in_exc_no_wrap() {
        assert!(in_exc(&id(5, 8), &id(1, 8), &id(10, 8)));
        assert!(!in_exc(&id(1, 8), &id(1, 8), &id(10, 8)));
        assert!(!in_exc(&id(10, 8), &id(1, 8), &id(10, 8)));
    }

    #[test]
    fn in_inc_no_wrap() {
        assert!(in_inc(&id(10, 8), &id(1, 8), &id(10, 8)));
        assert!(!in_inc(&id(1, 8), &id(1, 8), &id(10, 8)));
    }

    #[test]
    fn wraparound_s6() {
        let a = id(250, 8);
        let b = id(10, 8);
        assert!(in_inc(&id(255, 8), &a, &b));
        assert!(in_inc(&id(9, 8), &a, &b));
        assert!(in_inc(&id(10, 8), &a, &b));
        assert!(!in_inc(&id(11, 8), &a, &b));
        assert!(!in_inc(&id(250, 8), &a, &b));
    }

    #[test]
    fn equal_endpoints() {
        let a = id(42, 8);
        for v in 0u64..=255 {
            let x = id(v, 8);
            if v == 42 {
                assert!(!in_exc(&x, &a, &a));
            } else {
                assert!(in_exc(&x, &a, &a));
            }
            assert!(in_inc(&x, &a, &a));
        }
    }

    #[test]
    fn in_inc_matches_in_exc_or_equal_b() {
        let a = id(200, 8);
        let b = id(20, 8);
        for v in 0u64..=255 {
            let x = id(v, 8);
            let expected = in_exc(&x, &a, &b) || x == b;
            assert_eq!(in_inc(&x, &a, &b), expected, "mismatch at {}", v);
        }
    }

    #[test]
    fn exactly_one_side_holds() {
        let a = id(30, 8);
        let b = id(170, 8);
        for v in 0u64..=255 {
            let x = id(v, 8);
            let sides = [in_exc(&x, &a, &b), in_exc(&x, &b, &a), x == a, x == b];
            assert_eq!(sides.iter().filter(|s| **s).count(), 1, "v={}", v);
        }
    }

    #[test]
    fn hash_is_deterministic_and_bounded() {
        let a = Identifier::hash("localhost:8080", 16);
        let b = Identifier::hash("localhost:8080", 16);
        assert_eq!(a, b);
        assert!(a.as_biguint() < &(BigUint::one() << 16));
    }
}
