//! Homomorphic equality search over encrypted records.
//!
//! For a query q and a record (k, v) the engine computes
//!
//! ```text
//! diff      = k - q                      slot j is 0 iff byte j matches
//! indicator = 1 - diff^(p-1)             1 where matched, 0 elsewhere
//! match     = ∏_j indicator[j]           broadcast to every slot
//! result    = Σ_records match · v
//! ```
//!
//! The product over slots uses log-step rotate-and-multiply: rotations by
//! 1, 2, ..., n/4 within each row, then one row swap.

use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::bgv::{self, BgvContext, Ciphertext, EvaluationKey};
use crate::error::CryptoError;

use super::EncryptedRecord;

/// Borrowed context and evaluation keys for one or more lookups.
pub struct EqualitySearchEngine<'a> {
    ctx: &'a BgvContext,
    keys: &'a EvaluationKey,
}

impl<'a> EqualitySearchEngine<'a> {
    pub fn new(ctx: &'a BgvContext, keys: &'a EvaluationKey) -> Self {
        Self { ctx, keys }
    }

    pub fn diff(&self, key: &Ciphertext, query: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        bgv::sub(self.ctx, key, query)
    }

    /// Per-slot equality with zero via Fermat's little theorem.
    pub fn indicator(&self, diff: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        let p = self.ctx.plaintext_modulus();
        let fermat = bgv::power(self.ctx, diff, p - 1, &self.keys.relin)?;
        Ok(bgv::add_scalar(self.ctx, &bgv::negate(self.ctx, &fermat), 1))
    }

    /// AND of all slots, replicated into every slot.
    pub fn full_match(&self, indicator: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        let row = self.ctx.slot_count() / 2;
        let mut acc = indicator.clone();

        let mut step = 1;
        while step < row {
            let rotated = bgv::rotate_rows(self.ctx, &acc, step, self.keys)?;
            acc = bgv::multiply(self.ctx, &acc, &rotated, &self.keys.relin)?;
            step <<= 1;
        }

        let swapped = bgv::swap_rows(self.ctx, &acc, self.keys)?;
        bgv::multiply(self.ctx, &acc, &swapped, &self.keys.relin)
    }

    /// `full_match · value`; zero unless the record matched.
    pub fn contribution(&self, full_match: &Ciphertext, value: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        bgv::multiply(self.ctx, full_match, value, &self.keys.relin)
    }

    /// Match one record against the query.
    pub fn evaluate(&self, record: &EncryptedRecord, query: &Ciphertext) -> Result<Ciphertext, CryptoError> {
        let diff = self.diff(record.key(), query)?;
        let indicator = self.indicator(&diff)?;
        let full_match = self.full_match(&indicator)?;
        self.contribution(&full_match, record.value())
    }

    /// Sum of all record contributions, or `None` when there are no records.
    ///
    /// Records are evaluated in parallel; the result sits at level 0.
    pub fn search(
        &self,
        records: &[EncryptedRecord],
        query: &Ciphertext,
    ) -> Result<Option<Ciphertext>, CryptoError> {
        let start = Instant::now();

        let aggregate = records
            .par_iter()
            .map(|record| self.evaluate(record, query))
            .try_reduce_with(|x, y| bgv::add(self.ctx, &x, &y))
            .transpose()?;

        debug!("Searched {} records in {:.2?}", records.len(), start.elapsed());
        Ok(aggregate)
    }
}
