//! Slot encoding for R_p = Z_p[X]/(X^n + 1).
//!
//! For p ≡ 1 (mod 2n) the polynomial X^n + 1 splits into n linear factors
//! (X - ζ^e), e odd, with ζ a primitive 2n-th root of unity mod p. Slot j
//! holds m(ζ^(3^j)) for j < n/2 and slot n/2 + j holds m(ζ^(-3^j)), so the
//! Galois element 3^r rotates both halves left by r and 2n - 1 swaps them.

use crate::error::ConfigError;
use crate::math::ModQ;

use super::types::Plaintext;

/// Precomputed tables mapping slot vectors to plaintext polynomials.
#[derive(Debug, Clone)]
pub struct SlotEncoder {
    n: usize,
    t: u64,
    /// Exponent e_j (mod 2n) at which slot j evaluates.
    exponents: Vec<usize>,
    /// ζ^i mod t for i in 0..2n.
    zeta_powers: Vec<u64>,
    n_inv: u64,
}

impl SlotEncoder {
    pub fn new(n: usize, t: u64) -> Result<Self, ConfigError> {
        let two_n = 2 * n;
        let zeta = ModQ::root_of_unity(two_n as u64, t).ok_or_else(|| {
            ConfigError::InvalidParameters(format!("no {}-th root of unity modulo {}", two_n, t))
        })?;
        let n_inv = ModQ::inverse(n as u64 % t, t).ok_or_else(|| {
            ConfigError::InvalidParameters(format!("{} is not invertible modulo {}", n, t))
        })?;

        let half = n / 2;
        let mut exponents = Vec::with_capacity(n);
        let mut g = 1usize;
        for _ in 0..half {
            exponents.push(g);
            g = g * 3 % two_n;
        }
        for j in 0..half {
            exponents.push(two_n - exponents[j]);
        }

        let mut zeta_powers = Vec::with_capacity(two_n);
        let mut acc = 1u64;
        for _ in 0..two_n {
            zeta_powers.push(acc);
            acc = ModQ::mul(acc, zeta, t);
        }

        Ok(Self {
            n,
            t,
            exponents,
            zeta_powers,
            n_inv,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.n
    }

    /// Interpolate the polynomial whose slots hold `slots` (zero-padded).
    pub fn encode(&self, slots: &[u64]) -> Plaintext {
        let two_n = 2 * self.n;
        let coeffs = (0..self.n)
            .map(|k| {
                let sum = slots
                    .iter()
                    .take(self.n)
                    .zip(&self.exponents)
                    .fold(0u64, |acc, (&v, &e)| {
                        let idx = (two_n - (e * k) % two_n) % two_n;
                        ModQ::add(acc, ModQ::mul(v % self.t, self.zeta_powers[idx], self.t), self.t)
                    });
                ModQ::mul(sum, self.n_inv, self.t)
            })
            .collect();
        Plaintext::from_coeffs(coeffs)
    }

    /// Evaluate a plaintext polynomial at every slot point.
    pub fn decode(&self, pt: &Plaintext) -> Vec<u64> {
        let two_n = 2 * self.n;
        self.exponents
            .iter()
            .map(|&e| {
                pt.coeffs()
                    .iter()
                    .enumerate()
                    .fold(0u64, |acc, (k, &m)| {
                        let w = self.zeta_powers[(e * k) % two_n];
                        ModQ::add(acc, ModQ::mul(m, w, self.t), self.t)
                    })
            })
            .collect()
    }
}
