//! Homomorphic arithmetic on BGV ciphertexts.
//!
//! Binary operations first bring both operands to the lower of their two
//! levels. Ciphertext multiplication tensors, relinearizes with the s² key,
//! and drops one prime, so every product sits one level below its inputs.

use crate::error::CryptoError;
use crate::ks::{switch_component, KeySwitchKey};
use crate::math::{ModQ, RnsPoly};

use super::context::BgvContext;
use super::types::{Ciphertext, Plaintext};

/// Drop the last prime q_ℓ, dividing by q_ℓ while keeping the message
/// unchanged modulo t.
///
/// Each component c is shifted by δ = t·x with x ≡ -c·t⁻¹ (mod q_ℓ) centered,
/// which makes c + δ divisible by q_ℓ. Because q_ℓ ≡ 1 (mod t) the quotient
/// still decrypts to the same plaintext.
pub fn mod_switch(ctx: &BgvContext, ct: &Ciphertext) -> Result<Ciphertext, CryptoError> {
    let level = ct.level();
    if level == 0 {
        return Err(CryptoError::LevelExhausted);
    }

    let q_last = ctx.moduli()[level];
    let t = ctx.plaintext_modulus();
    let t_inv = ctx.t_inv(level);

    let switch = |poly: &RnsPoly| -> RnsPoly {
        let mut poly = poly.clone();
        let last = poly.pop_residue().unwrap_or_default();
        let shift: Vec<i64> = last
            .iter()
            .map(|&c| ModQ::to_signed(ModQ::mul(ModQ::negate(c, q_last), t_inv, q_last), q_last))
            .collect();

        let residues = poly
            .residues()
            .iter()
            .enumerate()
            .map(|(i, residue)| {
                let qi = ctx.moduli()[i];
                let inv = ctx.q_inv(level, i);
                residue
                    .iter()
                    .zip(&shift)
                    .map(|(&c, &x)| {
                        let delta = ModQ::mul(ModQ::from_signed(x, qi), t % qi, qi);
                        ModQ::mul(ModQ::add(c, delta, qi), inv, qi)
                    })
                    .collect()
            })
            .collect();
        RnsPoly::from_residues(residues)
    };

    Ok(Ciphertext::from_parts(switch(&ct.a), switch(&ct.b)))
}

/// Switch down until the ciphertext sits at `level`.
pub fn mod_switch_to(ctx: &BgvContext, ct: &Ciphertext, level: usize) -> Result<Ciphertext, CryptoError> {
    if ct.level() < level {
        return Err(CryptoError::ParameterMismatch(format!(
            "cannot raise level {} to {}",
            ct.level(),
            level
        )));
    }
    let mut out = ct.clone();
    while out.level() > level {
        out = mod_switch(ctx, &out)?;
    }
    Ok(out)
}

fn align(
    ctx: &BgvContext,
    x: &Ciphertext,
    y: &Ciphertext,
) -> Result<(Ciphertext, Ciphertext), CryptoError> {
    let level = x.level().min(y.level());
    Ok((mod_switch_to(ctx, x, level)?, mod_switch_to(ctx, y, level)?))
}

pub fn add(ctx: &BgvContext, x: &Ciphertext, y: &Ciphertext) -> Result<Ciphertext, CryptoError> {
    let (x, y) = align(ctx, x, y)?;
    let ntt = ctx.ntt();
    Ok(Ciphertext::from_parts(x.a.add(&y.a, ntt), x.b.add(&y.b, ntt)))
}

pub fn sub(ctx: &BgvContext, x: &Ciphertext, y: &Ciphertext) -> Result<Ciphertext, CryptoError> {
    let (x, y) = align(ctx, x, y)?;
    let ntt = ctx.ntt();
    Ok(Ciphertext::from_parts(x.a.sub(&y.a, ntt), x.b.sub(&y.b, ntt)))
}

pub fn negate(ctx: &BgvContext, x: &Ciphertext) -> Ciphertext {
    let ntt = ctx.ntt();
    Ciphertext::from_parts(x.a.negate(ntt), x.b.negate(ntt))
}

/// Add a plaintext polynomial to every slot it encodes.
pub fn add_plain(ctx: &BgvContext, x: &Ciphertext, pt: &Plaintext) -> Ciphertext {
    let m = RnsPoly::from_unsigned(pt.coeffs(), &ctx.moduli()[..=x.level()]);
    Ciphertext::from_parts(x.a.clone(), x.b.add(&m, ctx.ntt()))
}

/// Add the constant `c` to every slot.
pub fn add_scalar(ctx: &BgvContext, x: &Ciphertext, c: u64) -> Ciphertext {
    let mut coeffs = vec![0u64; ctx.ring_dim()];
    coeffs[0] = c % ctx.plaintext_modulus();
    add_plain(ctx, x, &Plaintext::from_coeffs(coeffs))
}

/// Multiply every slot by the constant `c`.
pub fn mul_scalar(ctx: &BgvContext, x: &Ciphertext, c: u64) -> Ciphertext {
    let c = c % ctx.plaintext_modulus();
    let ntt = ctx.ntt();
    Ciphertext::from_parts(x.a.scalar_mul(c, ntt), x.b.scalar_mul(c, ntt))
}

/// Slot-wise product with a plaintext; consumes no level.
pub fn mul_plain(ctx: &BgvContext, x: &Ciphertext, pt: &Plaintext) -> Ciphertext {
    let ntt = ctx.ntt();
    let m = RnsPoly::from_unsigned(pt.coeffs(), &ctx.moduli()[..=x.level()]);
    Ciphertext::from_parts(x.a.mul(&m, ntt), x.b.mul(&m, ntt))
}

/// Slot-wise product of two ciphertexts.
///
/// (b₁ + a₁s)(b₂ + a₂s) = d₀ + d₁s + d₂s²; d₂ is switched back to s with the
/// relinearization key, then one prime is dropped.
pub fn multiply(
    ctx: &BgvContext,
    x: &Ciphertext,
    y: &Ciphertext,
    relin: &KeySwitchKey,
) -> Result<Ciphertext, CryptoError> {
    let (x, y) = align(ctx, x, y)?;
    if x.level() == 0 {
        return Err(CryptoError::LevelExhausted);
    }
    let ntt = ctx.ntt();

    let d0 = x.b.mul(&y.b, ntt);
    let d1 = x.b.mul(&y.a, ntt).add(&x.a.mul(&y.b, ntt), ntt);
    let d2 = x.a.mul(&y.a, ntt);

    let relinearized = switch_component(&d2, relin, ctx)?;
    let product = Ciphertext::from_parts(
        d1.add(&relinearized.a, ntt),
        d0.add(&relinearized.b, ntt),
    );

    mod_switch(ctx, &product)
}

/// `x^exp` by square-and-multiply.
pub fn power(
    ctx: &BgvContext,
    x: &Ciphertext,
    exp: u64,
    relin: &KeySwitchKey,
) -> Result<Ciphertext, CryptoError> {
    if exp == 0 {
        return Err(CryptoError::ParameterMismatch("exponent must be positive".to_string()));
    }

    let mut result: Option<Ciphertext> = None;
    let mut base = x.clone();
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = Some(match result {
                None => base.clone(),
                Some(r) => multiply(ctx, &r, &base, relin)?,
            });
        }
        e >>= 1;
        if e > 0 {
            base = multiply(ctx, &base, &base, relin)?;
        }
    }

    result.ok_or(CryptoError::LevelExhausted)
}
