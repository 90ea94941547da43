//! BGV encryption and decryption.

use rand::Rng;

use crate::error::CryptoError;
use crate::math::{sample_ternary, GaussianSampler, ModQ, RnsPoly};

use super::arith::mod_switch_to;
use super::context::BgvContext;
use super::types::{Ciphertext, Plaintext, PublicKey, SecretKey};

/// Encrypt under the public key at the top level:
/// a = pk.a·u + t·e₂, b = pk.b·u + t·e₁ + m, with u ternary.
pub fn encrypt<R: Rng + ?Sized>(
    ctx: &BgvContext,
    pk: &PublicKey,
    pt: &Plaintext,
    rng: &mut R,
    sampler: &mut GaussianSampler,
) -> Ciphertext {
    let n = ctx.ring_dim();
    let moduli = ctx.moduli();
    let ntt = ctx.ntt();
    let t = ctx.plaintext_modulus();

    let u = RnsPoly::from_signed(&sample_ternary(n, rng), moduli);
    let e1 = RnsPoly::sample_gaussian(n, moduli, sampler).scalar_mul(t, ntt);
    let e2 = RnsPoly::sample_gaussian(n, moduli, sampler).scalar_mul(t, ntt);
    let m = RnsPoly::from_unsigned(pt.coeffs(), moduli);

    let a = pk.a.mul(&u, ntt).add(&e2, ntt);
    let b = pk.b.mul(&u, ntt).add(&e1, ntt).add(&m, ntt);

    Ciphertext::from_parts(a, b)
}

/// Switch down to q_0, then reduce [b + a·s]_{q_0} modulo t.
pub fn decrypt(ctx: &BgvContext, sk: &SecretKey, ct: &Ciphertext) -> Result<Plaintext, CryptoError> {
    ct.validate(ctx)?;
    if sk.ring_dim() != ctx.ring_dim() {
        return Err(CryptoError::ParameterMismatch(format!(
            "secret key of dimension {} for ring dimension {}",
            sk.ring_dim(),
            ctx.ring_dim()
        )));
    }

    let base = mod_switch_to(ctx, ct, 0)?;
    let q0 = ctx.moduli()[0];
    let t = ctx.plaintext_modulus();

    let s = sk.to_rns(ctx, 1);
    let phase = base.b.add(&base.a.mul(&s, ctx.ntt()), ctx.ntt());

    let coeffs = phase
        .residue(0)
        .iter()
        .map(|&c| ModQ::from_signed(ModQ::to_signed(c, q0), t))
        .collect();

    Ok(Plaintext::from_coeffs(coeffs))
}

/// Bit length of the largest noise coefficient after switching to q_0.
///
/// Diagnostic only; requires the secret key.
pub fn noise_bits(ctx: &BgvContext, sk: &SecretKey, ct: &Ciphertext) -> Result<u32, CryptoError> {
    let base = mod_switch_to(ctx, ct, 0)?;
    let q0 = ctx.moduli()[0];
    let s = sk.to_rns(ctx, 1);
    let phase = base.b.add(&base.a.mul(&s, ctx.ntt()), ctx.ntt());

    let max = phase
        .residue(0)
        .iter()
        .map(|&c| ModQ::to_signed(c, q0).unsigned_abs())
        .max()
        .unwrap_or(0);
    Ok(64 - max.leading_zeros())
}
