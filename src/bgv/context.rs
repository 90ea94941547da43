//! Precomputed state for one parameter set.

use crate::error::ConfigError;
use crate::math::{ModQ, NttContext};
use crate::params::SchemeParameters;

use super::encoding::SlotEncoder;

/// Everything derived from [`SchemeParameters`] that homomorphic operations
/// need: NTT tables for the whole chain, the slot encoder, and the constants
/// for modulus switching.
///
/// Built once per process and passed explicitly to every operation.
#[derive(Clone)]
pub struct BgvContext {
    params: SchemeParameters,
    ntt: NttContext,
    encoder: SlotEncoder,
    /// t^(-1) mod q_i.
    t_inv: Vec<u64>,
    /// q_inv[l][i] = q_l^(-1) mod q_i for i < l.
    q_inv: Vec<Vec<u64>>,
}

impl BgvContext {
    pub fn new(params: SchemeParameters) -> Result<Self, ConfigError> {
        params.validate()?;

        let moduli = &params.moduli;
        let t = params.plaintext_modulus;
        let not_invertible =
            |v: u64, q: u64| ConfigError::InvalidParameters(format!("{} not invertible mod {}", v, q));

        let t_inv = moduli
            .iter()
            .map(|&q| ModQ::inverse(t, q).ok_or_else(|| not_invertible(t, q)))
            .collect::<Result<Vec<_>, _>>()?;

        let q_inv = moduli
            .iter()
            .enumerate()
            .map(|(l, &ql)| {
                moduli[..l]
                    .iter()
                    .map(|&qi| ModQ::inverse(ql % qi, qi).ok_or_else(|| not_invertible(ql, qi)))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ntt = NttContext::with_moduli(params.ring_dim, moduli);
        let encoder = SlotEncoder::new(params.ring_dim, t)?;

        Ok(Self {
            params,
            ntt,
            encoder,
            t_inv,
            q_inv,
        })
    }

    pub fn params(&self) -> &SchemeParameters {
        &self.params
    }

    pub fn ntt(&self) -> &NttContext {
        &self.ntt
    }

    pub fn encoder(&self) -> &SlotEncoder {
        &self.encoder
    }

    pub fn moduli(&self) -> &[u64] {
        &self.params.moduli
    }

    pub fn ring_dim(&self) -> usize {
        self.params.ring_dim
    }

    pub fn plaintext_modulus(&self) -> u64 {
        self.params.plaintext_modulus
    }

    pub fn slot_count(&self) -> usize {
        self.params.slot_count()
    }

    pub fn level_count(&self) -> usize {
        self.params.level_count()
    }

    pub fn max_level(&self) -> usize {
        self.params.max_level()
    }

    pub(crate) fn t_inv(&self, idx: usize) -> u64 {
        self.t_inv[idx]
    }

    /// q_dropped^(-1) mod q_idx.
    pub(crate) fn q_inv(&self, dropped: usize, idx: usize) -> u64 {
        self.q_inv[dropped][idx]
    }
}

impl std::fmt::Debug for BgvContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BgvContext")
            .field("ring_dim", &self.params.ring_dim)
            .field("plaintext_modulus", &self.params.plaintext_modulus)
            .field("levels", &self.params.level_count())
            .finish()
    }
}
