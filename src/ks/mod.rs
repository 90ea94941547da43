//! Key-switching for BGV ciphertexts.
//!
//! Transforms a ciphertext component valid under a source key s' into one
//! valid under the secret key s. Used for relinearization (s' = s²) and for
//! slot rotations (s' = τ_g(s)).
//!
//! # Algorithm
//!
//! To switch (a, b) from s' to s:
//! 1. Decompose a with the RNS gadget: a = Σ_j D_j · g_j, digits D_j < 2^w
//! 2. Compute (a', b') = (0, b) + Σ_j D_j · K[j]
//!
//! The added noise is t · Σ D_j e_j, bounded by the digit size.

mod setup;
mod switch;

pub use setup::{generate_ks_key, KeySwitchKey};
pub use switch::{gadget_decompose, key_switch, switch_component};
