//! Mathematical primitives for the BGV layer.
//!
//! - **Modular arithmetic** over Z_q
//! - **Prime chains** of NTT-friendly primes ≡ 1 (mod 2n·t)
//! - **Number-Theoretic Transform (NTT)** per RNS residue
//! - **RNS polynomials** over R_Q = Z_Q[X]/(X^n + 1)
//! - **Sampling** of Gaussian errors and ternary secrets
//!
//! # Example
//!
//! ```
//! use cipherkv::math::{NttContext, RnsPoly};
//!
//! let moduli = [1152921504606830593u64];
//! let ctx = NttContext::with_moduli(16, &moduli);
//! let x = RnsPoly::from_signed(&[0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], &moduli);
//! let x2 = x.mul(&x, &ctx);
//! assert_eq!(x2.residue(0)[2], 1);
//! ```

pub mod modular;
pub mod ntt;
pub mod poly;
pub mod primes;
pub mod sampling;

pub use modular::ModQ;
pub use ntt::NttContext;
pub use poly::RnsPoly;
pub use primes::{is_prime, prime_chain};
pub use sampling::{sample_ternary, GaussianSampler, DEFAULT_SIGMA};
