//! End-to-end store tests
//!
//! Keygen → encrypt → Put → Lookup → decrypt, entirely in process.

use cipherkv::codec::{CipherCodec, Lookup, VALUE_MARKER};
use cipherkv::keys::{KeyGenerator, KeyPair};
use cipherkv::params::SchemeParameters;
use cipherkv::store::{EncryptedStore, EqualitySearchEngine};

fn compact_keys(seed: u64) -> KeyPair {
    KeyGenerator::with_seed(SchemeParameters::compact(), seed)
        .unwrap()
        .generate()
}

fn setup(seed: u64) -> (CipherCodec, EncryptedStore) {
    let keys = compact_keys(seed);
    let store = EncryptedStore::from_keys(&keys.without_secret()).unwrap();
    (CipherCodec::with_seed(&keys, seed).unwrap(), store)
}

fn put(codec: &mut CipherCodec, store: &mut EncryptedStore, key: &[u8], value: &[u8]) {
    let k = codec.encrypt_key(key).unwrap();
    let v = codec.encrypt_value(value).unwrap();
    store.put(k, v).unwrap();
}

fn get(codec: &mut CipherCodec, store: &EncryptedStore, key: &[u8]) -> Lookup {
    let query = codec.encrypt_key(key).unwrap();
    match store.lookup(&query).unwrap() {
        Some(result) => codec.decrypt_lookup(&result).unwrap(),
        None => Lookup::Missing,
    }
}

#[test]
fn test_e2e_encode_encrypt_roundtrip() {
    let keys = compact_keys(100);
    let mut codec = CipherCodec::with_seed(&keys, 100).unwrap();

    for len in 0..=codec.slot_count() {
        let text: Vec<u8> = (0..len).map(|i| ((i * 37 + 11) % 255 + 1) as u8).collect();
        let pv = codec.encode(&text).unwrap();
        assert_eq!(codec.decode(&pv), text);

        let ct = codec.encrypt(&pv);
        assert_eq!(codec.decode(&codec.decrypt(&ct).unwrap()), text, "length {}", len);
    }
}

#[test]
fn test_e2e_distinct_keys() {
    let (mut codec, mut store) = setup(101);
    put(&mut codec, &mut store, b"k1", b"v1");
    put(&mut codec, &mut store, b"k2", b"second value");

    assert_eq!(get(&mut codec, &store, b"k1"), Lookup::Found(b"v1".to_vec()));
    assert_eq!(get(&mut codec, &store, b"k2"), Lookup::Found(b"second value".to_vec()));
    assert_eq!(get(&mut codec, &store, b"k3"), Lookup::Missing);
    // prefix of a stored key is a different key
    assert_eq!(get(&mut codec, &store, b"k"), Lookup::Missing);
}

#[test]
fn test_e2e_unseen_key_decrypts_to_zero() {
    let (mut codec, mut store) = setup(102);
    put(&mut codec, &mut store, b"present", b"value");

    let query = codec.encrypt_key(b"absent").unwrap();
    let result = store.lookup(&query).unwrap().unwrap();
    assert!(codec.decrypt(&result).unwrap().is_zero());
}

#[test]
fn test_e2e_duplicate_key_is_ambiguous() {
    let (mut codec, mut store) = setup(103);
    put(&mut codec, &mut store, b"a", b"1");
    put(&mut codec, &mut store, b"a", b"2");

    let query = codec.encrypt_key(b"a").unwrap();
    let result = store.lookup(&query).unwrap().unwrap();
    let slots = codec.decrypt(&result).unwrap();

    let p = codec.context().plaintext_modulus();
    assert_eq!(slots.slots()[0], 2 * u64::from(VALUE_MARKER) % p);
    assert_ne!(slots.slots()[0], u64::from(VALUE_MARKER));
    assert_eq!(slots.interpret_lookup(), Lookup::Ambiguous);
}

#[test]
fn test_e2e_count_includes_duplicates() {
    let (mut codec, mut store) = setup(104);
    for (key, value) in [(b"x", b"1"), (b"y", b"2"), (b"x", b"3"), (b"x", b"4")] {
        put(&mut codec, &mut store, key, value);
    }
    assert_eq!(store.count(), 4);
    assert_eq!(store.key_ciphertexts().count(), 4);
}

#[test]
fn test_e2e_full_match_property() {
    let keys = compact_keys(105);
    let ek = keys.evaluation_key().unwrap().clone();
    let mut codec = CipherCodec::with_seed(&keys, 105).unwrap();
    let ctx = codec.context().clone();
    let engine = EqualitySearchEngine::new(&ctx, &ek);

    let words: [&[u8]; 3] = [b"alpha", b"alphb", b"0123456789abcdef"];
    for a in words {
        for b in words {
            let x = codec.encrypt_key(a).unwrap();
            let y = codec.encrypt_key(b).unwrap();
            let indicator = engine.indicator(&engine.diff(&x, &y).unwrap()).unwrap();
            let full = engine.full_match(&indicator).unwrap();

            let expected = if a == b { 1 } else { 0 };
            let slots = codec.decrypt(&full).unwrap();
            assert!(slots.slots().iter().all(|&s| s == expected));
        }
    }
}

#[test]
fn test_e2e_scenario_set_get_flush() {
    let (mut codec, mut store) = setup(106);
    put(&mut codec, &mut store, b"hello", b"world");
    assert_eq!(get(&mut codec, &store, b"hello"), Lookup::Found(b"world".to_vec()));

    store.clear();
    assert_eq!(get(&mut codec, &store, b"hello"), Lookup::Missing);
    assert_eq!(store.count(), 0);
}
