//! Number-Theoretic Transform over an RNS modulus chain.
//!
//! Negacyclic Cooley-Tukey / Gentleman-Sande transforms for
//! R_q = Z_q[X]/(X^n + 1), one set of twiddle factors per prime of the chain.
//! Every prime must satisfy q ≡ 1 (mod 2n) so that a primitive 2n-th root of
//! unity ψ exists.
//!
//! Residues are transformed one prime at a time: a polynomial at level ℓ only
//! carries residues for the first ℓ + 1 primes, so the context is built once
//! for the full chain and indexed per residue.
//!
//! # Example
//!
//! ```
//! use cipherkv::math::ntt::NttContext;
//!
//! let q = 1152921504606830593;
//! let ctx = NttContext::with_moduli(16, &[q]);
//!
//! let mut a = vec![0u64; 16];
//! a[1] = 1;
//! let mut b = vec![0u64; 16];
//! b[15] = 1;
//!
//! let product = ctx.multiply_residue(&a, &b, 0);
//! assert_eq!(product[0], q - 1);
//! ```

use super::modular::ModQ;

/// Precomputed twiddle factors and Montgomery constants for each prime.
#[derive(Clone)]
pub struct NttContext {
    /// Ring dimension (power of two).
    n: usize,
    /// RNS primes, in chain order.
    moduli: Vec<u64>,
    q_inv_neg: Vec<u64>,
    r_squared: Vec<u64>,
    /// Forward twiddle factors ψ^brv(i), Montgomery form.
    psi_powers: Vec<Vec<u64>>,
    /// Inverse twiddle factors ψ^(-brv(i)), Montgomery form.
    psi_inv_powers: Vec<Vec<u64>>,
    /// n^(-1) mod q in Montgomery form.
    n_inv: Vec<u64>,
}

impl NttContext {
    /// Creates a context for every prime of `moduli`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a power of two or a prime is not ≡ 1 (mod 2n).
    /// Callers validate parameters before building a context.
    pub fn with_moduli(n: usize, moduli: &[u64]) -> Self {
        assert!(n.is_power_of_two(), "n must be a power of two");
        assert!(!moduli.is_empty(), "moduli must be non-empty");

        let mut q_inv_neg = Vec::with_capacity(moduli.len());
        let mut r_squared = Vec::with_capacity(moduli.len());
        let mut psi_powers = Vec::with_capacity(moduli.len());
        let mut psi_inv_powers = Vec::with_capacity(moduli.len());
        let mut n_inv = Vec::with_capacity(moduli.len());

        for &q in moduli {
            assert!(q % (2 * n as u64) == 1, "q must be ≡ 1 (mod 2n)");

            let q_inv = Self::compute_q_inv_neg(q);
            let r2 = Self::compute_r_squared(q);

            let psi = ModQ::root_of_unity(2 * n as u64, q)
                .expect("q ≡ 1 (mod 2n) guarantees a 2n-th root of unity");
            let psi_mont = Self::to_montgomery(psi, q, r2, q_inv);
            let psi_pow = Self::compute_twiddle_factors(n, psi_mont, q, q_inv, r2);

            let psi_inv = ModQ::pow(psi, q - 2, q);
            let psi_inv_mont = Self::to_montgomery(psi_inv, q, r2, q_inv);
            let psi_inv_pow = Self::compute_twiddle_factors(n, psi_inv_mont, q, q_inv, r2);

            let n_inv_val = ModQ::pow(n as u64, q - 2, q);

            q_inv_neg.push(q_inv);
            r_squared.push(r2);
            psi_powers.push(psi_pow);
            psi_inv_powers.push(psi_inv_pow);
            n_inv.push(Self::to_montgomery(n_inv_val, q, r2, q_inv));
        }

        Self {
            n,
            moduli: moduli.to_vec(),
            q_inv_neg,
            r_squared,
            psi_powers,
            psi_inv_powers,
            n_inv,
        }
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Forward NTT of one residue; output is in Montgomery form.
    pub fn forward_residue(&self, coeffs: &mut [u64], idx: usize) {
        assert_eq!(coeffs.len(), self.n, "residue length must match dimension");
        let (q, r2, q_inv) = (self.moduli[idx], self.r_squared[idx], self.q_inv_neg[idx]);
        for c in coeffs.iter_mut() {
            *c = Self::to_montgomery(*c, q, r2, q_inv);
        }
        self.forward_inplace_at(coeffs, idx);
    }

    /// Inverse NTT of one residue produced by [`Self::forward_residue`].
    pub fn inverse_residue(&self, coeffs: &mut [u64], idx: usize) {
        assert_eq!(coeffs.len(), self.n, "residue length must match dimension");
        self.inverse_inplace_at(coeffs, idx);
        for c in coeffs.iter_mut() {
            *c = self.montgomery_mul_at(*c, 1, idx);
        }
    }

    /// Pointwise product of two transformed residues.
    pub fn pointwise_mul_residue(&self, a: &[u64], b: &[u64], idx: usize) -> Vec<u64> {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| self.montgomery_mul_at(x, y, idx))
            .collect()
    }

    /// Negacyclic product of two coefficient-domain residues modulo prime `idx`.
    pub fn multiply_residue(&self, a: &[u64], b: &[u64], idx: usize) -> Vec<u64> {
        let mut a_ntt = a.to_vec();
        let mut b_ntt = b.to_vec();
        self.forward_residue(&mut a_ntt, idx);
        self.forward_residue(&mut b_ntt, idx);
        let mut product = self.pointwise_mul_residue(&a_ntt, &b_ntt, idx);
        self.inverse_residue(&mut product, idx);
        product
    }

    fn forward_inplace_at(&self, coeffs: &mut [u64], idx: usize) {
        let n = self.n;
        let q = self.moduli[idx];
        let psi_powers = &self.psi_powers[idx];

        let mut t = n;
        let mut m = 1;

        while m < n {
            t >>= 1;
            for i in 0..m {
                let j1 = 2 * i * t;
                let j2 = j1 + t;
                let w = psi_powers[m + i];

                for j in j1..j2 {
                    let u = coeffs[j];
                    let v = self.montgomery_mul_at(coeffs[j + t], w, idx);

                    coeffs[j] = if u + v >= q { u + v - q } else { u + v };
                    coeffs[j + t] = if u >= v { u - v } else { q - v + u };
                }
            }
            m <<= 1;
        }
    }

    fn inverse_inplace_at(&self, coeffs: &mut [u64], idx: usize) {
        let n = self.n;
        let q = self.moduli[idx];
        let psi_inv_powers = &self.psi_inv_powers[idx];

        let mut t = 1;
        let mut m = n;

        while m > 1 {
            m >>= 1;
            for i in 0..m {
                let j1 = i * 2 * t;
                let w = psi_inv_powers[m + i];

                for j in j1..(j1 + t) {
                    let u = coeffs[j];
                    let v = coeffs[j + t];

                    coeffs[j] = if u + v >= q { u + v - q } else { u + v };
                    let diff = if u >= v { u - v } else { q - v + u };
                    coeffs[j + t] = self.montgomery_mul_at(diff, w, idx);
                }
            }
            t <<= 1;
        }

        for c in coeffs.iter_mut() {
            *c = self.montgomery_mul_at(*c, self.n_inv[idx], idx);
        }
    }

    #[inline]
    fn montgomery_mul_at(&self, a: u64, b: u64, idx: usize) -> u64 {
        Self::montgomery_reduce(
            (a as u128) * (b as u128),
            self.moduli[idx],
            self.q_inv_neg[idx],
        )
    }

    #[inline]
    fn montgomery_reduce(ab: u128, q: u64, q_inv_neg: u64) -> u64 {
        let m = ((ab as u64).wrapping_mul(q_inv_neg)) as u128;
        let t = ((ab + m * (q as u128)) >> 64) as u64;
        if t >= q {
            t - q
        } else {
            t
        }
    }

    fn to_montgomery(a: u64, q: u64, r_squared: u64, q_inv_neg: u64) -> u64 {
        Self::montgomery_reduce((a as u128) * (r_squared as u128), q, q_inv_neg)
    }

    fn compute_q_inv_neg(q: u64) -> u64 {
        let mut y: u64 = 1;
        for i in 1..64 {
            let yi = y.wrapping_mul(q) & (1u64 << i);
            y |= yi;
        }
        y.wrapping_neg()
    }

    fn compute_r_squared(q: u64) -> u64 {
        let r_mod_q = (1u128 << 64) % (q as u128);
        ((r_mod_q * r_mod_q) % (q as u128)) as u64
    }

    /// Twiddle factors in bit-reversed order: factors[m] = ψ^brv(m).
    fn compute_twiddle_factors(
        n: usize,
        psi: u64,
        q: u64,
        q_inv_neg: u64,
        r_squared: u64,
    ) -> Vec<u64> {
        let mut factors = vec![0u64; n];
        let one = Self::to_montgomery(1, q, r_squared, q_inv_neg);
        factors[1 % n] = one;

        for m in 1..n {
            if m.is_power_of_two() {
                let exp = n / (2 * m);
                let mut pow = one;
                for _ in 0..exp {
                    pow = Self::montgomery_reduce((pow as u128) * (psi as u128), q, q_inv_neg);
                }
                factors[m] = pow;
            } else {
                // brv is additive over disjoint bits
                let prev_idx = m & (m - 1);
                let step_idx = m & m.wrapping_neg();
                factors[m] = Self::montgomery_reduce(
                    (factors[prev_idx] as u128) * (factors[step_idx] as u128),
                    q,
                    q_inv_neg,
                );
            }
        }

        factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: u64 = 1152921504606830593;
    const Q2: u64 = 1152921504606826433;

    fn naive_negacyclic(a: &[u64], b: &[u64], q: u64) -> Vec<u64> {
        let n = a.len();
        let mut out = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = ModQ::mul(a[i], b[j], q);
                let k = i + j;
                if k < n {
                    out[k] = ModQ::add(out[k], prod, q);
                } else {
                    out[k - n] = ModQ::sub(out[k - n], prod, q);
                }
            }
        }
        out
    }

    #[test]
    fn test_roundtrip_each_residue() {
        let n = 32;
        let ctx = NttContext::with_moduli(n, &[Q, Q2]);

        for idx in 0..2 {
            let original: Vec<u64> = (0..n as u64).map(|i| i * 7919 + 3).collect();
            let mut coeffs = original.clone();
            ctx.forward_residue(&mut coeffs, idx);
            ctx.inverse_residue(&mut coeffs, idx);
            assert_eq!(coeffs, original);
        }
    }

    #[test]
    fn test_negacyclic_wraparound() {
        let n = 16;
        let ctx = NttContext::with_moduli(n, &[Q]);

        let mut a = vec![0u64; n];
        let mut b = vec![0u64; n];
        a[1] = 1;
        b[n - 1] = 1;

        let result = ctx.multiply_residue(&a, &b, 0);
        assert_eq!(result[0], Q - 1);
        assert!(result[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_matches_schoolbook() {
        let n = 32;
        let ctx = NttContext::with_moduli(n, &[Q, Q2]);

        for (idx, &q) in [Q, Q2].iter().enumerate() {
            let a: Vec<u64> = (0..n as u64).map(|i| (i * i * 31 + 5) % q).collect();
            let b: Vec<u64> = (0..n as u64).map(|i| q - 1 - i).collect();
            assert_eq!(ctx.multiply_residue(&a, &b, idx), naive_negacyclic(&a, &b, q));
        }
    }
}
