//! Key-switching key generation

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bgv::{BgvContext, Ciphertext, SecretKey};
use crate::math::{GaussianSampler, ModQ, RnsPoly};

/// Key-switching key from a source key s' to the secret key s.
///
/// One row per gadget element g_(i,k), the RNS element holding 2^(w·k) in
/// prime i and zero in every other prime:
/// ```text
/// K[i·ℓ + k] = (a, -a·s + t·e + g_(i,k)·s')
/// ```
/// Rows are generated at the top level. A switch at level ℓ uses the rows of
/// primes 0..=ℓ truncated to ℓ + 1 residues, since g_(i,k) does not depend on
/// the primes above it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySwitchKey {
    /// Row-major over (prime i, digit k).
    pub rows: Vec<Ciphertext>,
    /// Digit size w in bits.
    pub digit_bits: u32,
    /// Digits per prime ℓ.
    pub gadget_len: usize,
}

impl KeySwitchKey {
    /// Number of primes the key covers.
    pub fn level_count(&self) -> usize {
        if self.gadget_len == 0 {
            0
        } else {
            self.rows.len() / self.gadget_len
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Generate a key that switches ciphertext components multiplied by `from`
/// into ones decryptable under `to`.
///
/// `from` must be given at the top level (one residue per chain prime).
pub fn generate_ks_key<R: Rng + ?Sized>(
    ctx: &BgvContext,
    from: &RnsPoly,
    to: &SecretKey,
    rng: &mut R,
    sampler: &mut GaussianSampler,
) -> KeySwitchKey {
    let n = ctx.ring_dim();
    let moduli = ctx.moduli();
    let ntt = ctx.ntt();
    let t = ctx.plaintext_modulus();
    let digit_bits = ctx.params().digit_bits;
    let gadget_len = ctx.params().gadget_len();

    debug_assert_eq!(from.residue_count(), moduli.len());

    let s = to.to_rns(ctx, moduli.len());
    let mut rows = Vec::with_capacity(moduli.len() * gadget_len);

    for (i, &qi) in moduli.iter().enumerate() {
        for k in 0..gadget_len {
            let a = RnsPoly::random(n, moduli, rng);
            let error = RnsPoly::sample_gaussian(n, moduli, sampler).scalar_mul(t, ntt);

            let power = ModQ::pow(2, digit_bits as u64 * k as u64, qi);
            let scaled: Vec<Vec<u64>> = (0..moduli.len())
                .map(|j| {
                    if j == i {
                        from.residue(j).iter().map(|&c| ModQ::mul(c, power, qi)).collect()
                    } else {
                        vec![0; n]
                    }
                })
                .collect();

            let b = a
                .mul(&s, ntt)
                .negate(ntt)
                .add(&error, ntt)
                .add(&RnsPoly::from_residues(scaled), ntt);

            rows.push(Ciphertext::from_parts(a, b));
        }
    }

    KeySwitchKey {
        rows,
        digit_bits,
        gadget_len,
    }
}
