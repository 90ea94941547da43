//! cipherkv: an encrypted key-value store with homomorphic equality lookups
//!
//! The server stores only BGV ciphertexts of keys and values. A lookup
//! compares the query ciphertext with every stored key slot by slot, turns
//! the comparison into an all-ones/all-zeros match ciphertext, and returns
//! the sum of match × value over all records. Only the holder of the secret
//! key can read the result.
//!
//! Key components:
//! - `bgv`: leveled BGV with slot batching, rotations and modulus switching
//! - `store`: the record arena and the equality search engine
//! - `codec`: byte strings to slot vectors, with the value marker byte
//! - `server` / `client`: RESP framing over TCP

pub mod bgv;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod ks;
pub mod math;
pub mod params;
pub mod protocol;
pub mod server;
pub mod store;

pub use client::{Client, LocalTransport, Reply, TcpTransport, Transport};
pub use codec::{CipherCodec, Lookup, PlaintextVector, VALUE_MARKER};
pub use error::{ConfigError, CryptoError, KvError, ProtocolError, Result};
pub use keys::{KeyGenerator, KeyPair};
pub use params::SchemeParameters;
pub use server::{Dispatcher, Server};
pub use store::{EncryptedRecord, EncryptedStore, EqualitySearchEngine};
