//! Byte strings in and out of ciphertexts.
//!
//! A string occupies one slot per byte, zero-padded to the slot capacity.
//! Stored values carry a leading [`VALUE_MARKER`] so that a lookup which
//! summed several matching records can be told apart from a single match.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::bgv::{self, BgvContext, Ciphertext, PublicKey, SecretKey};
use crate::error::{CryptoError, Result};
use crate::keys::KeyPair;
use crate::math::GaussianSampler;

/// Prefix byte (`+`) placed in slot 0 of every stored value.
pub const VALUE_MARKER: u8 = 0x2B;

/// Slot values of one plaintext, each in `[0, p)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaintextVector {
    slots: Vec<u64>,
}

impl PlaintextVector {
    pub fn from_slots(slots: Vec<u64>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[u64] {
        &self.slots
    }

    pub fn is_zero(&self) -> bool {
        self.slots.iter().all(|&s| s == 0)
    }

    /// Bytes up to the first zero (or non-byte) slot.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.slots
            .iter()
            .map_while(|&s| u8::try_from(s).ok().filter(|&b| b != 0))
            .collect()
    }

    /// Read this vector as the decrypted result of a lookup.
    pub fn interpret_lookup(&self) -> Lookup {
        let Some(&first) = self.slots.first() else {
            return Lookup::Missing;
        };
        if self.is_zero() {
            return Lookup::Missing;
        }
        if first != u64::from(VALUE_MARKER) || self.slots.iter().any(|&s| s > u64::from(u8::MAX)) {
            return Lookup::Ambiguous;
        }
        Lookup::Found(PlaintextVector::from_slots(self.slots[1..].to_vec()).to_bytes())
    }
}

/// Decrypted outcome of a lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Exactly one record matched; the marker has been stripped.
    Found(Vec<u8>),
    /// No record matched (or the store was empty).
    Missing,
    /// Several records matched and their values were summed slot-wise.
    Ambiguous,
}

/// Prefix a value with [`VALUE_MARKER`].
pub fn tag(value: &[u8]) -> Vec<u8> {
    let mut tagged = Vec::with_capacity(value.len() + 1);
    tagged.push(VALUE_MARKER);
    tagged.extend_from_slice(value);
    tagged
}

/// Serialize a ciphertext for the wire.
pub fn ciphertext_to_bytes(ct: &Ciphertext) -> Result<Vec<u8>> {
    Ok(bincode::serialize(ct)?)
}

/// Parse wire bytes and check they form a ciphertext under `ctx`.
pub fn ciphertext_from_bytes(bytes: &[u8], ctx: &BgvContext) -> std::result::Result<Ciphertext, CryptoError> {
    let ct: Ciphertext =
        bincode::deserialize(bytes).map_err(|err| CryptoError::CorruptCiphertext(err.to_string()))?;
    ct.validate(ctx)?;
    Ok(ct)
}

/// Encoding plus encryption under one loaded key pair.
pub struct CipherCodec {
    ctx: Arc<BgvContext>,
    public_key: PublicKey,
    secret_key: Option<SecretKey>,
    rng: ChaCha20Rng,
    sampler: GaussianSampler,
}

impl CipherCodec {
    pub fn new(keys: &KeyPair) -> Result<Self> {
        Self::with_rng(keys, ChaCha20Rng::from_entropy())
    }

    /// Codec with reproducible encryption randomness.
    pub fn with_seed(keys: &KeyPair, seed: u64) -> Result<Self> {
        Self::with_rng(keys, ChaCha20Rng::seed_from_u64(seed))
    }

    fn with_rng(keys: &KeyPair, mut rng: ChaCha20Rng) -> Result<Self> {
        let ctx = BgvContext::new(keys.params().clone())?;
        let sampler = GaussianSampler::from_rng(ctx.params().sigma, &mut rng);
        Ok(Self {
            ctx: Arc::new(ctx),
            public_key: keys.public_key().clone(),
            secret_key: keys.secret_key().cloned(),
            rng,
            sampler,
        })
    }

    pub fn context(&self) -> &Arc<BgvContext> {
        &self.ctx
    }

    pub fn slot_count(&self) -> usize {
        self.ctx.slot_count()
    }

    pub fn can_decrypt(&self) -> bool {
        self.secret_key.is_some()
    }

    /// One byte per slot, zero-filled. Longer input is rejected, and so is a
    /// NUL byte, which [`decode`](Self::decode) would read as the end.
    pub fn encode(&self, text: &[u8]) -> std::result::Result<PlaintextVector, CryptoError> {
        let capacity = self.slot_count();
        if text.len() > capacity {
            return Err(CryptoError::TooLong {
                len: text.len(),
                capacity,
            });
        }
        if let Some(position) = text.iter().position(|&b| b == 0) {
            return Err(CryptoError::NulByte { position });
        }
        let mut slots = vec![0u64; capacity];
        for (slot, &byte) in slots.iter_mut().zip(text) {
            *slot = u64::from(byte);
        }
        Ok(PlaintextVector::from_slots(slots))
    }

    pub fn decode(&self, pv: &PlaintextVector) -> Vec<u8> {
        pv.to_bytes()
    }

    pub fn encrypt(&mut self, pv: &PlaintextVector) -> Ciphertext {
        let pt = self.ctx.encoder().encode(pv.slots());
        bgv::encrypt(&self.ctx, &self.public_key, &pt, &mut self.rng, &mut self.sampler)
    }

    pub fn decrypt(&self, ct: &Ciphertext) -> std::result::Result<PlaintextVector, CryptoError> {
        let sk = self.secret_key.as_ref().ok_or(CryptoError::NotAuthorized)?;
        let pt = bgv::decrypt(&self.ctx, sk, ct)?;
        Ok(PlaintextVector::from_slots(self.ctx.encoder().decode(&pt)))
    }

    /// Encode and encrypt a key (untagged).
    pub fn encrypt_key(&mut self, key: &[u8]) -> std::result::Result<Ciphertext, CryptoError> {
        let pv = self.encode(key)?;
        Ok(self.encrypt(&pv))
    }

    /// Tag, encode and encrypt a value.
    pub fn encrypt_value(&mut self, value: &[u8]) -> std::result::Result<Ciphertext, CryptoError> {
        let pv = self.encode(&tag(value))?;
        Ok(self.encrypt(&pv))
    }

    /// Decrypt a stored key back to its bytes.
    pub fn decrypt_key(&self, ct: &Ciphertext) -> std::result::Result<Vec<u8>, CryptoError> {
        Ok(self.decode(&self.decrypt(ct)?))
    }

    /// Decrypt an aggregate lookup result.
    pub fn decrypt_lookup(&self, ct: &Ciphertext) -> std::result::Result<Lookup, CryptoError> {
        Ok(self.decrypt(ct)?.interpret_lookup())
    }
}

impl std::fmt::Debug for CipherCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherCodec")
            .field("ctx", &self.ctx)
            .field("can_decrypt", &self.can_decrypt())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyGenerator;
    use crate::params::SchemeParameters;

    fn codec(seed: u64) -> CipherCodec {
        let keys = KeyGenerator::with_seed(SchemeParameters::compact(), seed)
            .unwrap()
            .generate();
        CipherCodec::with_seed(&keys, seed).unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let codec = codec(1);
        let pv = codec.encode(b"hello").unwrap();
        assert_eq!(pv.slots().len(), 16);
        assert_eq!(&pv.slots()[..6], &[104, 101, 108, 108, 111, 0]);
        assert_eq!(codec.decode(&pv), b"hello");

        let full = [b'x'; 16];
        assert_eq!(codec.decode(&codec.encode(&full).unwrap()), full);
        assert_eq!(codec.decode(&codec.encode(b"").unwrap()), b"");
    }

    #[test]
    fn test_too_long_is_rejected() {
        let codec = codec(2);
        assert_eq!(
            codec.encode(&[b'a'; 17]),
            Err(CryptoError::TooLong { len: 17, capacity: 16 })
        );
        // the marker takes one slot
        let mut codec = codec;
        assert!(codec.encrypt_value(&[b'a'; 16]).is_err());
        assert!(codec.encrypt_value(&[b'a'; 15]).is_ok());
    }

    #[test]
    fn test_nul_bytes_are_rejected() {
        let mut codec = codec(6);
        assert_eq!(codec.encode(b"a\0b"), Err(CryptoError::NulByte { position: 1 }));
        assert_eq!(codec.encode(b"ab\0"), Err(CryptoError::NulByte { position: 2 }));
        assert!(codec.encrypt_key(b"\0").is_err());
        // the marker shifts the reported position by one
        assert_eq!(
            codec.encrypt_value(b"x\0"),
            Err(CryptoError::NulByte { position: 2 })
        );

        // every byte except zero survives encode and decode
        let all: Vec<u8> = (1..=255).collect();
        for chunk in all.chunks(16) {
            assert_eq!(codec.decode(&codec.encode(chunk).unwrap()), chunk);
        }
    }

    #[test]
    fn test_encrypt_decrypt_bytes() {
        let mut codec = codec(3);
        let texts: [&[u8]; 4] = [b"world", b"", b"0123456789abcdef", &[1, 255, 128]];
        for text in texts {
            let ct = codec.encrypt_key(text).unwrap();
            assert_eq!(codec.decrypt_key(&ct).unwrap(), text);
        }
        let ct = codec.encrypt_value(b"v").unwrap();
        assert_eq!(codec.decrypt_lookup(&ct).unwrap(), Lookup::Found(b"v".to_vec()));
    }

    #[test]
    fn test_decrypt_without_secret_key() {
        let keys = KeyGenerator::with_seed(SchemeParameters::compact(), 4)
            .unwrap()
            .generate()
            .without_secret();
        let mut codec = CipherCodec::with_seed(&keys, 4).unwrap();
        assert!(!codec.can_decrypt());
        let ct = codec.encrypt_key(b"k").unwrap();
        assert_eq!(codec.decrypt(&ct), Err(CryptoError::NotAuthorized));
    }

    #[test]
    fn test_interpret_lookup() {
        let pv = |slots: &[u64]| {
            let mut v = slots.to_vec();
            v.resize(16, 0);
            PlaintextVector::from_slots(v)
        };
        assert_eq!(pv(&[]).interpret_lookup(), Lookup::Missing);
        assert_eq!(
            pv(&[0x2B, b'o' as u64, b'k' as u64]).interpret_lookup(),
            Lookup::Found(b"ok".to_vec())
        );
        assert_eq!(pv(&[0x2B]).interpret_lookup(), Lookup::Found(Vec::new()));
        // two matches: 2 * 0x2B mod 257
        assert_eq!(pv(&[86, 99, 101]).interpret_lookup(), Lookup::Ambiguous);
        assert_eq!(pv(&[0x2B, 300]).interpret_lookup(), Lookup::Ambiguous);
        assert_eq!(pv(&[0, 5]).interpret_lookup(), Lookup::Ambiguous);
    }

    #[test]
    fn test_ciphertext_wire_bytes() {
        let mut codec = codec(5);
        let ct = codec.encrypt_key(b"wire").unwrap();
        let bytes = ciphertext_to_bytes(&ct).unwrap();
        let parsed = ciphertext_from_bytes(&bytes, codec.context()).unwrap();
        assert_eq!(parsed, ct);

        assert!(matches!(
            ciphertext_from_bytes(&bytes[..bytes.len() / 2], codec.context()),
            Err(CryptoError::CorruptCiphertext(_))
        ));
        assert!(matches!(
            ciphertext_from_bytes(b"plaintext", codec.context()),
            Err(CryptoError::CorruptCiphertext(_))
        ));
    }
}
