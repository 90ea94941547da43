//! Secret, public and evaluation key generation.

use std::collections::BTreeMap;

use rand::Rng;

use crate::ks::generate_ks_key;
use crate::math::poly::automorphism_signed;
use crate::math::{sample_ternary, GaussianSampler, RnsPoly};

use super::context::BgvContext;
use super::galois::galois_elements;
use super::types::{EvaluationKey, PublicKey, SecretKey};

pub fn generate_secret_key<R: Rng + ?Sized>(ctx: &BgvContext, rng: &mut R) -> SecretKey {
    SecretKey {
        coeffs: sample_ternary(ctx.ring_dim(), rng),
    }
}

/// Public key (a, -a·s + t·e) at the top level.
pub fn generate_public_key<R: Rng + ?Sized>(
    ctx: &BgvContext,
    sk: &SecretKey,
    rng: &mut R,
    sampler: &mut GaussianSampler,
) -> PublicKey {
    let n = ctx.ring_dim();
    let moduli = ctx.moduli();
    let ntt = ctx.ntt();

    let s = sk.to_rns(ctx, moduli.len());
    let a = RnsPoly::random(n, moduli, rng);
    let error = RnsPoly::sample_gaussian(n, moduli, sampler).scalar_mul(ctx.plaintext_modulus(), ntt);
    let b = a.mul(&s, ntt).negate(ntt).add(&error, ntt);

    PublicKey { a, b }
}

/// Relinearization key plus one rotation key per element of
/// [`galois_elements`].
pub fn generate_evaluation_key<R: Rng + ?Sized>(
    ctx: &BgvContext,
    sk: &SecretKey,
    rng: &mut R,
    sampler: &mut GaussianSampler,
) -> EvaluationKey {
    let count = ctx.level_count();
    let s = sk.to_rns(ctx, count);
    let s_squared = s.mul(&s, ctx.ntt());
    let relin = generate_ks_key(ctx, &s_squared, sk, rng, sampler);

    let galois = galois_elements(ctx.ring_dim())
        .into_iter()
        .map(|g| {
            let image = RnsPoly::from_signed(&automorphism_signed(&sk.coeffs, g), ctx.moduli());
            (g, generate_ks_key(ctx, &image, sk, rng, sampler))
        })
        .collect::<BTreeMap<_, _>>();

    EvaluationKey { relin, galois }
}
