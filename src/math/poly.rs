//! Polynomials over R_Q = Z_Q[X]/(X^n + 1) in residue-number-system form.
//!
//! A polynomial at level ℓ stores one coefficient vector per prime
//! q_0 … q_ℓ of the modulus chain. All arithmetic is residue-wise; the
//! [`NttContext`] supplies the primes and the transforms. Operands of a binary
//! operation must carry the same number of residues.

use super::modular::ModQ;
use super::ntt::NttContext;
use super::sampling::GaussianSampler;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Polynomial in RNS representation, coefficient domain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnsPoly {
    /// `residues[i][k]` is coefficient k modulo the i-th prime.
    residues: Vec<Vec<u64>>,
}

impl RnsPoly {
    /// Zero polynomial with `count` residues.
    pub fn zero(dim: usize, count: usize) -> Self {
        Self {
            residues: vec![vec![0; dim]; count],
        }
    }

    /// Wrap already-reduced residue vectors.
    pub fn from_residues(residues: Vec<Vec<u64>>) -> Self {
        Self { residues }
    }

    /// Lift a small signed polynomial into every prime of `moduli`.
    pub fn from_signed(coeffs: &[i64], moduli: &[u64]) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| ModQ::from_signed(c, q)).collect())
            .collect();
        Self { residues }
    }

    /// Lift non-negative coefficients (each below every prime) into `moduli`.
    pub fn from_unsigned(coeffs: &[u64], moduli: &[u64]) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| c % q).collect())
            .collect();
        Self { residues }
    }

    /// Uniformly random polynomial modulo the product of `moduli`.
    pub fn random<R: Rng + ?Sized>(dim: usize, moduli: &[u64], rng: &mut R) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| (0..dim).map(|_| rng.gen_range(0..q)).collect())
            .collect();
        Self { residues }
    }

    /// Polynomial with discrete Gaussian coefficients, identical across residues.
    pub fn sample_gaussian(dim: usize, moduli: &[u64], sampler: &mut GaussianSampler) -> Self {
        Self::from_signed(&sampler.sample_vec(dim), moduli)
    }

    pub fn dimension(&self) -> usize {
        self.residues.first().map_or(0, Vec::len)
    }

    /// Number of primes this polynomial is represented under.
    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn residue(&self, idx: usize) -> &[u64] {
        &self.residues[idx]
    }

    pub fn residues(&self) -> &[Vec<u64>] {
        &self.residues
    }

    /// Drop residues beyond the first `count`.
    pub fn truncated(&self, count: usize) -> Self {
        Self {
            residues: self.residues[..count.min(self.residues.len())].to_vec(),
        }
    }

    /// Remove and return the last residue.
    pub fn pop_residue(&mut self) -> Option<Vec<u64>> {
        self.residues.pop()
    }

    pub fn add(&self, other: &Self, ctx: &NttContext) -> Self {
        self.zip_with(other, ctx, ModQ::add)
    }

    pub fn sub(&self, other: &Self, ctx: &NttContext) -> Self {
        self.zip_with(other, ctx, ModQ::sub)
    }

    pub fn negate(&self, ctx: &NttContext) -> Self {
        let residues = self
            .residues
            .iter()
            .zip(ctx.moduli())
            .map(|(r, &q)| r.iter().map(|&c| ModQ::negate(c, q)).collect())
            .collect();
        Self { residues }
    }

    /// Multiply by a small non-negative integer.
    pub fn scalar_mul(&self, scalar: u64, ctx: &NttContext) -> Self {
        let residues = self
            .residues
            .iter()
            .zip(ctx.moduli())
            .map(|(r, &q)| {
                let s = scalar % q;
                r.iter().map(|&c| ModQ::mul(c, s, q)).collect()
            })
            .collect();
        Self { residues }
    }

    /// Negacyclic product via the NTT, residue by residue.
    pub fn mul(&self, other: &Self, ctx: &NttContext) -> Self {
        debug_assert_eq!(self.residue_count(), other.residue_count());
        let residues = self
            .residues
            .iter()
            .zip(other.residues.iter())
            .enumerate()
            .map(|(idx, (a, b))| ctx.multiply_residue(a, b, idx))
            .collect();
        Self { residues }
    }

    /// Apply τ_g: p(X) ↦ p(X^g) mod (X^n + 1), for odd g.
    pub fn automorphism(&self, g: usize, ctx: &NttContext) -> Self {
        let n = self.dimension();
        let two_n = 2 * n;
        let residues = self
            .residues
            .iter()
            .zip(ctx.moduli())
            .map(|(r, &q)| {
                let mut out = vec![0u64; n];
                for (i, &c) in r.iter().enumerate() {
                    let idx = (g * i) % two_n;
                    if idx < n {
                        out[idx] = ModQ::add(out[idx], c, q);
                    } else {
                        out[idx - n] = ModQ::sub(out[idx - n], c, q);
                    }
                }
                out
            })
            .collect();
        Self { residues }
    }

    fn zip_with(&self, other: &Self, ctx: &NttContext, op: fn(u64, u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.residue_count(), other.residue_count());
        let residues = self
            .residues
            .iter()
            .zip(other.residues.iter())
            .zip(ctx.moduli())
            .map(|((a, b), &q)| a.iter().zip(b.iter()).map(|(&x, &y)| op(x, y, q)).collect())
            .collect();
        Self { residues }
    }
}

/// Apply τ_g to a signed integer polynomial (used for secret-key images).
pub fn automorphism_signed(coeffs: &[i64], g: usize) -> Vec<i64> {
    let n = coeffs.len();
    let mut out = vec![0i64; n];
    for (i, &c) in coeffs.iter().enumerate() {
        let idx = (g * i) % (2 * n);
        if idx < n {
            out[idx] += c;
        } else {
            out[idx - n] -= c;
        }
    }
    out
}
