//! BGV key, plaintext and ciphertext types.
//!
//! Ciphertexts follow the `(a, b)` convention with b = -a·s + t·e + m, so that
//! `b + a·s` reduces to the message modulo t.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::ks::KeySwitchKey;
use crate::math::RnsPoly;

use super::context::BgvContext;

/// Plaintext polynomial with coefficients in Z_t.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plaintext {
    coeffs: Vec<u64>,
}

impl Plaintext {
    pub fn from_coeffs(coeffs: Vec<u64>) -> Self {
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[u64] {
        &self.coeffs
    }
}

/// Ternary secret key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey {
    /// Coefficients in {-1, 0, 1}.
    pub coeffs: Vec<i64>,
}

impl SecretKey {
    pub fn ring_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// The key lifted into the first `count` primes of the chain.
    pub fn to_rns(&self, ctx: &BgvContext, count: usize) -> RnsPoly {
        RnsPoly::from_signed(&self.coeffs, &ctx.moduli()[..count])
    }
}

/// Public encryption key: an encryption of zero at the top level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub a: RnsPoly,
    pub b: RnsPoly,
}

/// Keys needed to multiply and rotate without the secret key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationKey {
    /// Switches s² back to s after a tensor product.
    pub relin: KeySwitchKey,
    /// Switches τ_g(s) back to s, keyed by Galois element g.
    pub galois: BTreeMap<usize, KeySwitchKey>,
}

impl EvaluationKey {
    pub fn galois_key(&self, g: usize) -> Result<&KeySwitchKey, CryptoError> {
        self.galois.get(&g).ok_or(CryptoError::MissingGaloisKey(g))
    }
}

/// BGV ciphertext at some level of the modulus chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub a: RnsPoly,
    pub b: RnsPoly,
}

impl Ciphertext {
    pub fn from_parts(a: RnsPoly, b: RnsPoly) -> Self {
        debug_assert_eq!(a.residue_count(), b.residue_count());
        Self { a, b }
    }

    /// Index of the last prime this ciphertext is represented under.
    pub fn level(&self) -> usize {
        self.b.residue_count().saturating_sub(1)
    }

    pub fn ring_dim(&self) -> usize {
        self.b.dimension()
    }

    /// Reject ciphertexts that could not have come from `ctx`.
    ///
    /// Checks the component shapes and that every residue is reduced
    /// modulo its prime. Says nothing about whether the noise is small.
    pub fn validate(&self, ctx: &BgvContext) -> Result<(), CryptoError> {
        let corrupt = |msg: String| Err(CryptoError::CorruptCiphertext(msg));
        let n = ctx.ring_dim();
        let count = self.b.residue_count();

        if count == 0 || count > ctx.level_count() {
            return corrupt(format!("{} residues outside 1..={}", count, ctx.level_count()));
        }
        if self.a.residue_count() != count {
            return corrupt("component levels differ".to_string());
        }

        for poly in [&self.a, &self.b] {
            for (residue, &q) in poly.residues().iter().zip(ctx.moduli()) {
                if residue.len() != n {
                    return corrupt(format!("residue of length {} (ring dimension {})", residue.len(), n));
                }
                if residue.iter().any(|&c| c >= q) {
                    return corrupt("coefficient not reduced".to_string());
                }
            }
        }
        Ok(())
    }
}
