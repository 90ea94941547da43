//! Leveled BGV over R = Z[X]/(X^n + 1) with slot batching.
//!
//! Plaintexts are vectors of n values in Z_p, one per slot; addition and
//! multiplication act slot-wise and Galois automorphisms permute slots.
//! Ciphertexts live at a level ℓ of the RNS modulus chain and lose one level
//! per ciphertext multiplication.
//!
//! # Example
//!
//! ```
//! use cipherkv::bgv::{self, BgvContext};
//! use cipherkv::math::GaussianSampler;
//! use cipherkv::params::SchemeParameters;
//! use rand::SeedableRng;
//!
//! let ctx = BgvContext::new(SchemeParameters::compact()).unwrap();
//! let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(1);
//! let mut sampler = GaussianSampler::with_seed(ctx.params().sigma, 1);
//!
//! let sk = bgv::generate_secret_key(&ctx, &mut rng);
//! let pk = bgv::generate_public_key(&ctx, &sk, &mut rng, &mut sampler);
//!
//! let pt = ctx.encoder().encode(&[7, 8, 9]);
//! let ct = bgv::encrypt(&ctx, &pk, &pt, &mut rng, &mut sampler);
//! let doubled = bgv::add(&ctx, &ct, &ct).unwrap();
//!
//! let slots = ctx.encoder().decode(&bgv::decrypt(&ctx, &sk, &doubled).unwrap());
//! assert_eq!(&slots[..3], &[14, 16, 18]);
//! ```

mod arith;
mod context;
mod enc;
mod encoding;
mod galois;
mod keygen;
mod types;

pub use arith::{
    add, add_plain, add_scalar, mod_switch, mod_switch_to, mul_plain, mul_scalar, multiply, negate,
    power, sub,
};
pub use context::BgvContext;
pub use enc::{decrypt, encrypt, noise_bits};
pub use encoding::SlotEncoder;
pub use galois::{apply_galois, galois_elements, rotate_rows, rotation_element, swap_rows};
pub use keygen::{generate_evaluation_key, generate_public_key, generate_secret_key};
pub use types::{Ciphertext, EvaluationKey, Plaintext, PublicKey, SecretKey};
