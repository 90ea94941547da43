//! Key-switching operation

use crate::bgv::{BgvContext, Ciphertext};
use crate::error::CryptoError;
use crate::math::{ModQ, RnsPoly};

use super::setup::KeySwitchKey;

/// Split every residue of `poly` into `gadget_len` base-2^w digits.
///
/// Digit (i, k) holds bits [w·k, w·(k+1)) of residue i, lifted into all
/// residues of `poly`, so that Σ digit_(i,k) · g_(i,k) = poly.
pub fn gadget_decompose(poly: &RnsPoly, digit_bits: u32, gadget_len: usize) -> Vec<RnsPoly> {
    let count = poly.residue_count();
    let mask = (1u64 << digit_bits) - 1;
    let mut digits = Vec::with_capacity(count * gadget_len);

    for residue in poly.residues() {
        for k in 0..gadget_len {
            let shift = digit_bits as usize * k;
            let digit: Vec<u64> = residue
                .iter()
                .map(|&c| if shift >= 64 { 0 } else { (c >> shift) & mask })
                .collect();
            digits.push(RnsPoly::from_residues(vec![digit; count]));
        }
    }

    digits
}

/// Switch a single component c, decryptable as c·s', into a pair
/// (a', b') with b' + a'·s ≈ c·s'.
///
/// Products are accumulated in the NTT domain and transformed back once
/// per residue.
pub fn switch_component(
    poly: &RnsPoly,
    key: &KeySwitchKey,
    ctx: &BgvContext,
) -> Result<Ciphertext, CryptoError> {
    let count = poly.residue_count();
    if key.level_count() < count {
        return Err(CryptoError::ParameterMismatch(format!(
            "key-switching key covers {} primes, ciphertext has {}",
            key.level_count(),
            count
        )));
    }

    let ntt = ctx.ntt();
    let moduli = ctx.moduli();
    let n = poly.dimension();
    let digits = gadget_decompose(poly, key.digit_bits, key.gadget_len);

    let mut acc_a = vec![vec![0u64; n]; count];
    let mut acc_b = vec![vec![0u64; n]; count];

    for (digit, row) in digits.iter().zip(&key.rows) {
        for idx in 0..count {
            let q = moduli[idx];

            let mut d = digit.residue(idx).to_vec();
            ntt.forward_residue(&mut d, idx);

            let mut ra = row.a.residue(idx).to_vec();
            let mut rb = row.b.residue(idx).to_vec();
            ntt.forward_residue(&mut ra, idx);
            ntt.forward_residue(&mut rb, idx);

            let pa = ntt.pointwise_mul_residue(&d, &ra, idx);
            let pb = ntt.pointwise_mul_residue(&d, &rb, idx);
            for (acc, v) in acc_a[idx].iter_mut().zip(pa) {
                *acc = ModQ::add(*acc, v, q);
            }
            for (acc, v) in acc_b[idx].iter_mut().zip(pb) {
                *acc = ModQ::add(*acc, v, q);
            }
        }
    }

    for idx in 0..count {
        ntt.inverse_residue(&mut acc_a[idx], idx);
        ntt.inverse_residue(&mut acc_b[idx], idx);
    }

    Ok(Ciphertext::from_parts(
        RnsPoly::from_residues(acc_a),
        RnsPoly::from_residues(acc_b),
    ))
}

/// Apply key-switching to the `a` component of a ciphertext.
///
/// Given (a, b) decrypting under s' and a key from s' to s, returns
/// (a', b + b') decrypting to the same message under s.
pub fn key_switch(
    ct: &Ciphertext,
    key: &KeySwitchKey,
    ctx: &BgvContext,
) -> Result<Ciphertext, CryptoError> {
    let switched = switch_component(&ct.a, key, ctx)?;
    let b = ct.b.add(&switched.b, ctx.ntt());
    Ok(Ciphertext::from_parts(switched.a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgv::{decrypt, encrypt, generate_secret_key, generate_public_key};
    use crate::ks::generate_ks_key;
    use crate::math::{sample_ternary, GaussianSampler};
    use crate::params::SchemeParameters;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_gadget_decompose_recomposes() {
        let moduli = [1152921504606830593u64, 1152921504606826433];
        let poly = RnsPoly::from_residues(vec![
            (0..16).map(|i| moduli[0] - 1 - i * 1_000_003).collect(),
            (0..16).map(|i| i * 987_654_321).collect(),
        ]);
        let digits = gadget_decompose(&poly, 20, 3);
        assert_eq!(digits.len(), 6);

        for (i, &q) in moduli.iter().enumerate() {
            for c in 0..16 {
                let recomposed = (0..3).fold(0u64, |acc, k| {
                    let d = digits[i * 3 + k].residue(i)[c];
                    ModQ::add(acc, ModQ::mul(d, 1 << (20 * k), q), q)
                });
                assert_eq!(recomposed, poly.residue(i)[c]);
            }
        }
    }

    #[test]
    fn test_key_switch_to_fresh_key_preserves_message() {
        let ctx = BgvContext::new(SchemeParameters::compact()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let mut sampler = GaussianSampler::with_seed(ctx.params().sigma, 5);

        let s_from = generate_secret_key(&ctx, &mut rng);
        let s_to = generate_secret_key(&ctx, &mut rng);
        let pk_from = generate_public_key(&ctx, &s_from, &mut rng, &mut sampler);

        let slots: Vec<u64> = (0..16).map(|i| i * 13 % 257).collect();
        let pt = ctx.encoder().encode(&slots);
        let ct = encrypt(&ctx, &pk_from, &pt, &mut rng, &mut sampler);

        let from = s_from.to_rns(&ctx, ctx.level_count());
        let key = generate_ks_key(&ctx, &from, &s_to, &mut rng, &mut sampler);
        let switched = key_switch(&ct, &key, &ctx).unwrap();

        let decrypted = decrypt(&ctx, &s_to, &switched).unwrap();
        assert_eq!(ctx.encoder().decode(&decrypted), slots);

        // unrelated ternary vector must not decrypt it
        let wrong = crate::bgv::SecretKey {
            coeffs: sample_ternary(16, &mut rng),
        };
        let garbage = decrypt(&ctx, &wrong, &switched).unwrap();
        assert_ne!(ctx.encoder().decode(&garbage), slots);
    }

    #[test]
    fn test_switch_rejects_short_key() {
        let ctx = BgvContext::new(SchemeParameters::compact()).unwrap();
        let key = KeySwitchKey {
            rows: Vec::new(),
            digit_bits: 20,
            gadget_len: 3,
        };
        let poly = RnsPoly::zero(ctx.ring_dim(), 2);
        assert!(matches!(
            switch_component(&poly, &key, &ctx),
            Err(CryptoError::ParameterMismatch(_))
        ));
    }
}
