//! Scheme parameters for the BGV instance behind the store.
//!
//! The ring dimension n doubles as the slot capacity: the plaintext modulus p
//! is a prime ≡ 1 (mod 2n), so R_p splits into n slots of one byte each. The
//! ciphertext modulus is a chain of ~60-bit primes q_i ≡ 1 (mod 2n·p), one per
//! multiplicative level a lookup consumes, plus the decryption prime.
//!
//! The presets are demonstration-sized lattices; they make no claim of a
//! concrete security level.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::math::{is_prime, prime_chain, DEFAULT_SIGMA};

/// Bumped whenever the meaning of a field or the chain derivation changes.
///
/// History:
/// - v1: initial BGV parameters (p = 257, 60-bit chain, 20-bit digits)
pub const PARAMS_VERSION: u16 = 1;

/// Default plaintext modulus: prime, > 255, and p - 1 = 2^8.
pub const DEFAULT_PLAINTEXT_MODULUS: u64 = 257;

/// Bit size of every chain prime.
pub const PRIME_BITS: u32 = 60;

/// Bit size of a key-switching digit.
pub const DEFAULT_DIGIT_BITS: u32 = 20;

/// Largest supported ring dimension.
pub const MAX_RING_DIM: usize = 4096;

/// Immutable description of one scheme instance.
///
/// Embedded in both key files; a ciphertext is only meaningful under the
/// exact parameters it was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeParameters {
    /// Must equal [`PARAMS_VERSION`].
    pub version: u16,

    /// Ring dimension n (power of two); also the number of slots.
    pub ring_dim: usize,

    /// Plaintext modulus p; slot values live in Z_p.
    pub plaintext_modulus: u64,

    /// Ciphertext modulus chain q_0, …, q_K.
    pub moduli: Vec<u64>,

    /// Standard deviation of the error distribution.
    pub sigma: f64,

    /// Key-switching digit size w, in bits.
    pub digit_bits: u32,
}

impl SchemeParameters {
    /// Parameters used by the command-line tools: 64 slots.
    pub fn standard() -> Self {
        Self::build(64, DEFAULT_PLAINTEXT_MODULUS)
    }

    /// Small instance for tests and demos: 16 slots.
    pub fn compact() -> Self {
        Self::build(16, DEFAULT_PLAINTEXT_MODULUS)
    }

    /// Derive a full parameter set for ring dimension `ring_dim` and
    /// plaintext modulus `plaintext_modulus`.
    pub fn new(ring_dim: usize, plaintext_modulus: u64) -> Result<Self, ConfigError> {
        check_ring(ring_dim, plaintext_modulus)?;
        let params = Self::build(ring_dim, plaintext_modulus);
        params.validate()?;
        Ok(params)
    }

    fn build(ring_dim: usize, plaintext_modulus: u64) -> Self {
        let depth = lookup_depth(ring_dim, plaintext_modulus);
        let step = 2 * ring_dim as u64 * plaintext_modulus;
        Self {
            version: PARAMS_VERSION,
            ring_dim,
            plaintext_modulus,
            moduli: prime_chain(PRIME_BITS, step, depth + 1),
            sigma: DEFAULT_SIGMA,
            digit_bits: DEFAULT_DIGIT_BITS,
        }
    }

    /// Number of byte slots per ciphertext.
    pub fn slot_count(&self) -> usize {
        self.ring_dim
    }

    /// Number of primes in the chain.
    pub fn level_count(&self) -> usize {
        self.moduli.len()
    }

    /// Level of a fresh ciphertext.
    pub fn max_level(&self) -> usize {
        self.moduli.len().saturating_sub(1)
    }

    /// Multiplicative depth of one equality lookup.
    pub fn lookup_depth(&self) -> usize {
        lookup_depth(self.ring_dim, self.plaintext_modulus)
    }

    /// Digits per prime in the key-switching gadget.
    pub fn gadget_len(&self) -> usize {
        let max_bits = self
            .moduli
            .iter()
            .map(|q| 64 - q.leading_zeros())
            .max()
            .unwrap_or(PRIME_BITS);
        max_bits.div_ceil(self.digit_bits.max(1)) as usize
    }

    /// Check every structural requirement of the scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::InvalidParameters(msg));

        if self.version != PARAMS_VERSION {
            return invalid(format!(
                "parameter version {} (expected {})",
                self.version, PARAMS_VERSION
            ));
        }
        check_ring(self.ring_dim, self.plaintext_modulus)?;

        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return invalid(format!("sigma must be positive, got {}", self.sigma));
        }
        if !(1..=30).contains(&self.digit_bits) {
            return invalid(format!("digit_bits must be in 1..=30, got {}", self.digit_bits));
        }

        let expected = self.lookup_depth() + 1;
        if self.moduli.len() != expected {
            return invalid(format!(
                "modulus chain has {} primes, a lookup needs {}",
                self.moduli.len(),
                expected
            ));
        }

        let step = 2 * self.ring_dim as u64 * self.plaintext_modulus;
        for (i, &q) in self.moduli.iter().enumerate() {
            if q >= 1 << PRIME_BITS || q % step != 1 || !is_prime(q) {
                return invalid(format!("chain prime {} ({}) is not a valid modulus", i, q));
            }
            if self.moduli[..i].contains(&q) {
                return invalid(format!("chain prime {} repeats", q));
            }
        }

        Ok(())
    }
}

impl Default for SchemeParameters {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_ring(ring_dim: usize, plaintext_modulus: u64) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::InvalidParameters(msg));

    if !ring_dim.is_power_of_two() || !(8..=MAX_RING_DIM).contains(&ring_dim) {
        return invalid(format!(
            "ring_dim must be a power of two in 8..={}, got {}",
            MAX_RING_DIM, ring_dim
        ));
    }
    if !(256..1 << 20).contains(&plaintext_modulus) || !is_prime(plaintext_modulus) {
        return invalid(format!(
            "plaintext modulus must be a prime in (255, 2^20), got {}",
            plaintext_modulus
        ));
    }
    if plaintext_modulus % (2 * ring_dim as u64) != 1 {
        return invalid(format!(
            "plaintext modulus {} is not ≡ 1 (mod {}), slots would not split",
            plaintext_modulus,
            2 * ring_dim
        ));
    }
    Ok(())
}

/// Levels consumed by `x^exp` under square-and-multiply, where a squaring
/// chain x^(2^i) sits at depth i.
pub fn power_depth(exp: u64) -> usize {
    let mut base_depth = 0;
    let mut result_depth: Option<usize> = None;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result_depth = Some(match result_depth {
                None => base_depth,
                Some(d) => d.max(base_depth) + 1,
            });
        }
        e >>= 1;
        if e > 0 {
            base_depth += 1;
        }
    }

    result_depth.unwrap_or(0)
}

/// Fermat power, then one rotate-and-multiply per power of two within a row,
/// the row swap, and the final multiply by the value ciphertext.
fn lookup_depth(ring_dim: usize, plaintext_modulus: u64) -> usize {
    let row_steps = (ring_dim / 2).trailing_zeros() as usize;
    power_depth(plaintext_modulus - 1) + row_steps + 1 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_valid() {
        assert!(SchemeParameters::standard().validate().is_ok());
        assert!(SchemeParameters::compact().validate().is_ok());
    }

    #[test]
    fn test_compact_shape() {
        let params = SchemeParameters::compact();
        assert_eq!(params.slot_count(), 16);
        assert_eq!(params.lookup_depth(), 8 + 3 + 2);
        assert_eq!(params.level_count(), 14);
        assert_eq!(params.max_level(), 13);
        assert_eq!(params.gadget_len(), 3);
    }

    #[test]
    fn test_power_depth() {
        assert_eq!(power_depth(1), 0);
        assert_eq!(power_depth(2), 1);
        assert_eq!(power_depth(3), 2);
        assert_eq!(power_depth(256), 8);
        assert_eq!(power_depth(130), 8);
    }

    #[test]
    fn test_new_rejects_bad_ring() {
        assert!(matches!(
            SchemeParameters::new(48, 257),
            Err(ConfigError::InvalidParameters(_))
        ));
        // 257 is not ≡ 1 (mod 512)
        assert!(SchemeParameters::new(256, 257).is_err());
        assert!(SchemeParameters::new(16, 256).is_err());
    }

    #[test]
    fn test_new_accepts_other_primes() {
        // 7681 ≡ 1 (mod 256)
        let params = SchemeParameters::new(128, 7681).unwrap();
        assert_eq!(params.slot_count(), 128);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_catches_tampering() {
        let mut params = SchemeParameters::compact();
        params.moduli.pop();
        assert!(params.validate().is_err());

        let mut params = SchemeParameters::compact();
        params.moduli[1] = params.moduli[0];
        assert!(params.validate().is_err());

        let mut params = SchemeParameters::compact();
        params.version = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_chain_is_deterministic() {
        assert_eq!(SchemeParameters::compact(), SchemeParameters::compact());
    }
}
