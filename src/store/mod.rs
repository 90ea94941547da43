//! The server-side encrypted record arena.
//!
//! Records are appended in arrival order and never updated. Nothing in the
//! store can compare keys without running the equality search, so a repeated
//! key simply produces another record.

mod search;

pub use search::EqualitySearchEngine;

use std::sync::Arc;

use tracing::info;

use crate::bgv::{BgvContext, Ciphertext, EvaluationKey};
use crate::error::{ConfigError, CryptoError, Result};
use crate::keys::KeyPair;

/// One stored (key, value) ciphertext pair.
#[derive(Clone, Debug)]
pub struct EncryptedRecord {
    key: Ciphertext,
    value: Ciphertext,
}

impl EncryptedRecord {
    pub fn new(key: Ciphertext, value: Ciphertext) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &Ciphertext {
        &self.key
    }

    pub fn value(&self) -> &Ciphertext {
        &self.value
    }
}

#[derive(Debug)]
pub struct EncryptedStore {
    ctx: Arc<BgvContext>,
    evaluation_key: EvaluationKey,
    records: Vec<EncryptedRecord>,
}

impl EncryptedStore {
    pub fn new(ctx: Arc<BgvContext>, evaluation_key: EvaluationKey) -> Self {
        Self {
            ctx,
            evaluation_key,
            records: Vec::new(),
        }
    }

    /// Build a store from server key material.
    pub fn from_keys(keys: &KeyPair) -> Result<Self> {
        let evaluation_key = keys
            .evaluation_key()
            .cloned()
            .ok_or(ConfigError::MissingKeyMaterial("evaluation key"))?;
        let ctx = BgvContext::new(keys.params().clone())?;
        info!(
            "Store ready: ring dimension {}, {} levels",
            ctx.ring_dim(),
            ctx.level_count()
        );
        Ok(Self::new(Arc::new(ctx), evaluation_key))
    }

    pub fn context(&self) -> &Arc<BgvContext> {
        &self.ctx
    }

    /// Append a record. Both ciphertexts must be fresh encryptions under this
    /// store's parameters.
    pub fn put(&mut self, key: Ciphertext, value: Ciphertext) -> std::result::Result<(), CryptoError> {
        self.check_fresh(&key)?;
        self.check_fresh(&value)?;
        self.records.push(EncryptedRecord::new(key, value));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of records, duplicates included.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EncryptedRecord] {
        &self.records
    }

    /// Key ciphertexts in insertion order.
    pub fn key_ciphertexts(&self) -> impl Iterator<Item = &Ciphertext> + '_ {
        self.records.iter().map(EncryptedRecord::key)
    }

    /// Aggregate of every record's value weighted by its match with `query`.
    ///
    /// Returns `None` for an empty store.
    pub fn lookup(&self, query: &Ciphertext) -> std::result::Result<Option<Ciphertext>, CryptoError> {
        self.check_fresh(query)?;
        EqualitySearchEngine::new(&self.ctx, &self.evaluation_key).search(&self.records, query)
    }

    /// Reject ciphertexts that are malformed or below the top level. The
    /// search spends the whole modulus chain, so a lower-level record would
    /// exhaust it on every later lookup.
    pub fn check_fresh(&self, ct: &Ciphertext) -> std::result::Result<(), CryptoError> {
        ct.validate(&self.ctx)?;
        if ct.level() != self.ctx.max_level() {
            return Err(CryptoError::CorruptCiphertext(format!(
                "level {} is below the top level {}",
                ct.level(),
                self.ctx.max_level()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgv;
    use crate::codec::{CipherCodec, Lookup};
    use crate::keys::KeyGenerator;
    use crate::math::RnsPoly;
    use crate::params::SchemeParameters;

    fn setup(seed: u64) -> (CipherCodec, EncryptedStore) {
        let keys = KeyGenerator::with_seed(SchemeParameters::compact(), seed)
            .unwrap()
            .generate();
        let store = EncryptedStore::from_keys(&keys.without_secret()).unwrap();
        (CipherCodec::with_seed(&keys, seed).unwrap(), store)
    }

    fn put(codec: &mut CipherCodec, store: &mut EncryptedStore, key: &[u8], value: &[u8]) {
        let k = codec.encrypt_key(key).unwrap();
        let v = codec.encrypt_value(value).unwrap();
        store.put(k, v).unwrap();
    }

    #[test]
    fn test_put_count_clear() {
        let (mut codec, mut store) = setup(31);
        assert!(store.is_empty());
        put(&mut codec, &mut store, b"a", b"1");
        put(&mut codec, &mut store, b"a", b"2");
        put(&mut codec, &mut store, b"b", b"3");
        assert_eq!(store.count(), 3);

        let keys: Vec<Vec<u8>> = store
            .key_ciphertexts()
            .map(|ct| codec.decrypt_key(ct).unwrap())
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"a".to_vec(), b"b".to_vec()]);

        store.clear();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_lookup_distinct_and_duplicate() {
        let (mut codec, mut store) = setup(32);
        let query = codec.encrypt_key(b"x").unwrap();
        assert_eq!(store.lookup(&query), Ok(None));

        put(&mut codec, &mut store, b"x", b"one");
        put(&mut codec, &mut store, b"y", b"two");

        let result = store.lookup(&query).unwrap().unwrap();
        assert_eq!(result.level(), 0);
        assert_eq!(codec.decrypt_lookup(&result).unwrap(), Lookup::Found(b"one".to_vec()));

        let unseen = codec.encrypt_key(b"z").unwrap();
        let result = store.lookup(&unseen).unwrap().unwrap();
        assert_eq!(codec.decrypt_lookup(&result).unwrap(), Lookup::Missing);

        put(&mut codec, &mut store, b"x", b"uno");
        let result = store.lookup(&query).unwrap().unwrap();
        assert_eq!(codec.decrypt_lookup(&result).unwrap(), Lookup::Ambiguous);
    }

    #[test]
    fn test_rejects_foreign_ciphertexts() {
        let (_, mut store) = setup(33);
        let bogus = Ciphertext::from_parts(RnsPoly::zero(8, 1), RnsPoly::zero(8, 1));
        assert!(matches!(
            store.put(bogus.clone(), bogus.clone()),
            Err(CryptoError::CorruptCiphertext(_))
        ));
        assert!(matches!(store.lookup(&bogus), Err(CryptoError::CorruptCiphertext(_))));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_rejects_switched_down_ciphertexts() {
        let (mut codec, mut store) = setup(34);
        put(&mut codec, &mut store, b"a", b"1");

        let ctx = store.context().clone();
        let key = codec.encrypt_key(b"a").unwrap();
        let low_value = bgv::mod_switch_to(&ctx, &codec.encrypt_value(b"2").unwrap(), 0).unwrap();
        assert!(matches!(
            store.put(key, low_value),
            Err(CryptoError::CorruptCiphertext(_))
        ));
        assert_eq!(store.count(), 1);

        let low_query = bgv::mod_switch(&ctx, &codec.encrypt_key(b"a").unwrap()).unwrap();
        assert!(matches!(store.lookup(&low_query), Err(CryptoError::CorruptCiphertext(_))));

        // the rejected put left the store usable for every key
        let query = codec.encrypt_key(b"b").unwrap();
        let result = store.lookup(&query).unwrap().unwrap();
        assert_eq!(codec.decrypt_lookup(&result).unwrap(), Lookup::Missing);
        let query = codec.encrypt_key(b"a").unwrap();
        let result = store.lookup(&query).unwrap().unwrap();
        assert_eq!(codec.decrypt_lookup(&result).unwrap(), Lookup::Found(b"1".to_vec()));
    }
}
