//! Galois automorphisms and slot rotations.
//!
//! τ_g: X ↦ X^g for odd g. With the slot layout of [`super::encoding`], the
//! group (Z/2nZ)^* ≅ ⟨3⟩ × ⟨-1⟩ acts on slots as follows:
//! - g = 3^r rotates each half (row) of the slot vector left by r
//! - g = 2n - 1 swaps the two rows
//!
//! Only the elements 3^(2^i) and 2n - 1 carry keys; other rotations are
//! composed from them.

use crate::error::CryptoError;
use crate::ks::key_switch;
use crate::math::ModQ;

use super::context::BgvContext;
use super::types::{Ciphertext, EvaluationKey};

/// Galois elements the evaluation key carries keys for:
/// 3^(2^i) mod 2n for i < log2(n/2), then the row swap 2n - 1.
pub fn galois_elements(ring_dim: usize) -> Vec<usize> {
    let two_n = 2 * ring_dim as u64;
    let row_steps = (ring_dim / 2).trailing_zeros();
    let mut elements: Vec<usize> = (0..row_steps)
        .map(|i| ModQ::pow(3, 1 << i, two_n) as usize)
        .collect();
    elements.push(2 * ring_dim - 1);
    elements
}

/// Galois element for a left rotation of each row by `steps`.
pub fn rotation_element(ring_dim: usize, steps: usize) -> usize {
    let two_n = 2 * ring_dim as u64;
    ModQ::pow(3, (steps % (ring_dim / 2)) as u64, two_n) as usize
}

/// Apply τ_g and switch the result back to the secret key.
pub fn apply_galois(
    ctx: &BgvContext,
    ct: &Ciphertext,
    g: usize,
    keys: &EvaluationKey,
) -> Result<Ciphertext, CryptoError> {
    let key = keys.galois_key(g)?;
    let ntt = ctx.ntt();
    let permuted = Ciphertext::from_parts(ct.a.automorphism(g, ntt), ct.b.automorphism(g, ntt));
    key_switch(&permuted, key, ctx)
}

/// Rotate both rows left by `steps`, one keyed power-of-two step per set bit.
pub fn rotate_rows(
    ctx: &BgvContext,
    ct: &Ciphertext,
    steps: usize,
    keys: &EvaluationKey,
) -> Result<Ciphertext, CryptoError> {
    let n = ctx.ring_dim();
    let steps = steps % (n / 2);
    let mut out = ct.clone();

    for bit in 0..(n / 2).trailing_zeros() {
        if steps & (1 << bit) != 0 {
            out = apply_galois(ctx, &out, rotation_element(n, 1 << bit), keys)?;
        }
    }
    Ok(out)
}

/// Exchange the two rows of slots.
pub fn swap_rows(ctx: &BgvContext, ct: &Ciphertext, keys: &EvaluationKey) -> Result<Ciphertext, CryptoError> {
    apply_galois(ctx, ct, 2 * ctx.ring_dim() - 1, keys)
}
