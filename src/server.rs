//! Command dispatch and the TCP accept loop.
//!
//! The server handles one connection at a time: read one request, compute,
//! write the reply, close. Bad input becomes an error reply for that request.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::bgv::Ciphertext;
use crate::codec::{ciphertext_from_bytes, ciphertext_to_bytes};
use crate::config::ServerConfig;
use crate::error::{KvError, ProtocolError, Result};
use crate::keys::KeyPair;
use crate::protocol::{read_frame, write_frame, Frame};
use crate::store::EncryptedStore;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interprets request frames against one [`EncryptedStore`].
#[derive(Debug)]
pub struct Dispatcher {
    store: EncryptedStore,
}

impl Dispatcher {
    pub fn new(store: EncryptedStore) -> Self {
        Self { store }
    }

    pub fn from_keys(keys: &KeyPair) -> Result<Self> {
        Ok(Self::new(EncryptedStore::from_keys(keys)?))
    }

    pub fn store(&self) -> &EncryptedStore {
        &self.store
    }

    /// Execute one request. Never fails; errors become `-ERR` replies.
    pub fn dispatch(&mut self, request: Frame) -> Frame {
        let result = request
            .into_args()
            .map_err(KvError::from)
            .and_then(|args| self.execute(args));

        match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!("Rejected request: {}", err);
                Frame::err(err)
            }
        }
    }

    fn execute(&mut self, args: Vec<Vec<u8>>) -> Result<Frame> {
        let command = String::from_utf8_lossy(&args[0]).to_lowercase();
        let argc = args.len() - 1;
        let arity = |ok: bool| -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(ProtocolError::WrongArity(command.clone()).into())
            }
        };

        match command.as_str() {
            "set" => {
                arity(argc == 2)?;
                let key = self.ciphertext(&args[1])?;
                let value = self.ciphertext(&args[2])?;
                self.store.put(key, value)?;
                Ok(Frame::ok())
            }
            "mset" => {
                arity(argc >= 2 && argc % 2 == 0)?;
                let pairs = args[1..]
                    .chunks(2)
                    .map(|pair| -> Result<(Ciphertext, Ciphertext)> {
                        Ok((self.ciphertext(&pair[0])?, self.ciphertext(&pair[1])?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                for (key, value) in pairs {
                    self.store.put(key, value)?;
                }
                Ok(Frame::ok())
            }
            "get" => {
                arity(argc == 1)?;
                self.lookup(&args[1])
            }
            "mget" => {
                arity(argc >= 1)?;
                let replies = args[1..]
                    .iter()
                    .map(|key| self.lookup(key))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Frame::Array(replies))
            }
            "flushall" => {
                arity(argc == 0)?;
                self.store.clear();
                Ok(Frame::ok())
            }
            "dbsize" => {
                arity(argc == 0)?;
                Ok(Frame::Integer(self.store.count() as i64))
            }
            "keys" => {
                arity(argc == 1)?;
                if args[1] != b"*" {
                    return Err(ProtocolError::UnsupportedPattern.into());
                }
                let keys = self
                    .store
                    .key_ciphertexts()
                    .map(|ct| ciphertext_to_bytes(ct).map(Frame::Bulk))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Frame::Array(keys))
            }
            "info" => {
                arity(argc == 0)?;
                Ok(Frame::Bulk(self.info().into_bytes()))
            }
            _ => Err(ProtocolError::UnknownCommand(command.clone()).into()),
        }
    }

    fn ciphertext(&self, bytes: &[u8]) -> Result<Ciphertext> {
        let ct = ciphertext_from_bytes(bytes, self.store.context())?;
        self.store.check_fresh(&ct)?;
        Ok(ct)
    }

    fn lookup(&self, key: &[u8]) -> Result<Frame> {
        let query = self.ciphertext(key)?;
        match self.store.lookup(&query)? {
            Some(result) => Ok(Frame::Bulk(ciphertext_to_bytes(&result)?)),
            None => Ok(Frame::Null),
        }
    }

    fn info(&self) -> String {
        let params = self.store.context().params();
        format!(
            "# Server\r\ncipherkv_version:{}\r\n\r\n\
             # Keyspace\r\nrecords:{}\r\n\r\n\
             # Scheme\r\nring_dim:{}\r\nplaintext_modulus:{}\r\nslots:{}\r\nlevels:{}\r\n",
            VERSION,
            self.store.count(),
            params.ring_dim,
            params.plaintext_modulus,
            params.slot_count(),
            params.level_count(),
        )
    }
}

/// Sequential TCP server around a [`Dispatcher`].
///
/// Lookups are CPU-bound and run on the blocking pool, off the async workers.
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Mutex<Dispatcher>>,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig, dispatcher: Dispatcher) -> Result<Self> {
        let listener = TcpListener::bind(config.addr()).await?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until the task is dropped.
    pub async fn run(mut self) -> Result<()> {
        info!("Ready to accept connections on {}", self.local_addr()?);
        loop {
            self.serve_one().await;
        }
    }

    /// Accept one connection and serve its single request.
    pub async fn serve_one(&mut self) {
        match self.listener.accept().await {
            Ok((stream, peer)) => {
                if let Err(err) = self.handle(stream, peer).await {
                    warn!("Connection from {} dropped: {}", peer, err);
                }
            }
            Err(err) => warn!("Accept failed: {}", err),
        }
    }

    async fn handle(&mut self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let start = Instant::now();
        let io_timeout = self.config.io_timeout();
        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half);

        let request = timeout(
            io_timeout,
            read_frame(&mut reader, self.config.max_request_bytes),
        )
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "request read timed out"))?;

        let reply = match request {
            Ok(frame) => {
                let dispatcher = Arc::clone(&self.dispatcher);
                tokio::task::spawn_blocking(move || {
                    dispatcher
                        .lock()
                        .map(|mut dispatcher| dispatcher.dispatch(frame))
                        .map_err(|_| std::io::Error::other("dispatcher lock poisoned"))
                })
                .await
                .map_err(std::io::Error::other)??
            }
            Err(KvError::Protocol(err)) => {
                warn!("Bad request from {}: {}", peer, err);
                Frame::err(err)
            }
            Err(err) => return Err(err),
        };

        timeout(io_timeout, write_frame(&mut write_half, &reply))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "reply write timed out"))??;

        debug!("Served {} in {:.2?}", peer, start.elapsed());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgv;
    use crate::codec::{CipherCodec, Lookup};
    use crate::keys::KeyGenerator;
    use crate::params::SchemeParameters;

    fn setup(seed: u64) -> (CipherCodec, Dispatcher) {
        let keys = KeyGenerator::with_seed(SchemeParameters::compact(), seed)
            .unwrap()
            .generate();
        let dispatcher = Dispatcher::from_keys(&keys.without_secret()).unwrap();
        (CipherCodec::with_seed(&keys, seed).unwrap(), dispatcher)
    }

    fn key(codec: &mut CipherCodec, text: &[u8]) -> Vec<u8> {
        ciphertext_to_bytes(&codec.encrypt_key(text).unwrap()).unwrap()
    }

    fn value(codec: &mut CipherCodec, text: &[u8]) -> Vec<u8> {
        ciphertext_to_bytes(&codec.encrypt_value(text).unwrap()).unwrap()
    }

    fn error_text(frame: Frame) -> String {
        match frame {
            Frame::Error(text) => text,
            other => panic!("expected error reply, got {:?}", other),
        }
    }

    #[test]
    fn test_set_get_dbsize_flushall() {
        let (mut codec, mut dispatcher) = setup(41);
        let k = key(&mut codec, b"hello");
        let v = value(&mut codec, b"world");

        let request = Frame::request([b"SET".to_vec(), k.clone(), v]);
        assert_eq!(dispatcher.dispatch(request), Frame::ok());
        assert_eq!(dispatcher.dispatch(Frame::request(["dbsize"])), Frame::Integer(1));

        let Frame::Bulk(bytes) = dispatcher.dispatch(Frame::request([b"get".to_vec(), k.clone()])) else {
            panic!("expected bulk reply");
        };
        let result = ciphertext_from_bytes(&bytes, codec.context()).unwrap();
        assert_eq!(codec.decrypt_lookup(&result).unwrap(), Lookup::Found(b"world".to_vec()));

        assert_eq!(dispatcher.dispatch(Frame::request(["FLUSHALL"])), Frame::ok());
        assert_eq!(dispatcher.dispatch(Frame::request([b"GET".to_vec(), k])), Frame::Null);
        assert_eq!(dispatcher.dispatch(Frame::request(["DBSIZE"])), Frame::Integer(0));
    }

    #[test]
    fn test_mset_keys_mget_shapes() {
        let (mut codec, mut dispatcher) = setup(42);
        let request = Frame::request([
            b"MSET".to_vec(),
            key(&mut codec, b"a"),
            value(&mut codec, b"1"),
            key(&mut codec, b"b"),
            value(&mut codec, b"2"),
        ]);
        assert_eq!(dispatcher.dispatch(request), Frame::ok());

        let Frame::Array(keys) = dispatcher.dispatch(Frame::request(["KEYS", "*"])) else {
            panic!("expected array reply");
        };
        let names: Vec<Vec<u8>> = keys
            .into_iter()
            .map(|frame| match frame {
                Frame::Bulk(bytes) => {
                    let ct = ciphertext_from_bytes(&bytes, codec.context()).unwrap();
                    codec.decrypt_key(&ct).unwrap()
                }
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec()]);

        let request = Frame::request([b"MGET".to_vec(), key(&mut codec, b"a"), key(&mut codec, b"zz")]);
        let Frame::Array(replies) = dispatcher.dispatch(request) else {
            panic!("expected array reply");
        };
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|r| matches!(r, Frame::Bulk(_))));
    }

    #[test]
    fn test_error_replies() {
        let (mut codec, mut dispatcher) = setup(43);

        assert_eq!(
            error_text(dispatcher.dispatch(Frame::request(["set", "x"]))),
            "ERR wrong number of arguments for 'set' command"
        );
        assert_eq!(
            error_text(dispatcher.dispatch(Frame::request(["MSET", "a", "b", "c"]))),
            "ERR wrong number of arguments for 'mset' command"
        );
        assert_eq!(
            error_text(dispatcher.dispatch(Frame::request(["Frobnicate"]))),
            "ERR unknown command 'frobnicate'"
        );
        assert_eq!(
            error_text(dispatcher.dispatch(Frame::request(["KEYS", "user:*"]))),
            "ERR only '*' supported"
        );
        assert_eq!(
            error_text(dispatcher.dispatch(Frame::request(["INFO", "server"]))),
            "ERR wrong number of arguments for 'info' command"
        );
        assert!(error_text(dispatcher.dispatch(Frame::request(["GET", "not a ciphertext"])))
            .starts_with("ERR invalid ciphertext"));
        assert!(error_text(dispatcher.dispatch(Frame::Integer(5))).starts_with("ERR malformed frame"));

        // a failed MSET stores nothing
        let request = Frame::request([
            b"MSET".to_vec(),
            key(&mut codec, b"a"),
            value(&mut codec, b"1"),
            b"k".to_vec(),
            b"junk".to_vec(),
        ]);
        assert!(matches!(dispatcher.dispatch(request), Frame::Error(_)));
        assert_eq!(dispatcher.store().count(), 0);
    }

    #[test]
    fn test_switched_down_ciphertext_only_fails_its_request() {
        let (mut codec, mut dispatcher) = setup(45);
        let request = Frame::request([b"SET".to_vec(), key(&mut codec, b"a"), value(&mut codec, b"1")]);
        assert_eq!(dispatcher.dispatch(request), Frame::ok());

        let ctx = codec.context().clone();
        let low = bgv::mod_switch_to(&ctx, &codec.encrypt_value(b"2").unwrap(), 0).unwrap();
        let low = ciphertext_to_bytes(&low).unwrap();

        let request = Frame::request([b"SET".to_vec(), key(&mut codec, b"a"), low.clone()]);
        assert!(error_text(dispatcher.dispatch(request)).starts_with("ERR invalid ciphertext"));
        let request = Frame::request([
            b"MSET".to_vec(),
            key(&mut codec, b"c"),
            value(&mut codec, b"3"),
            key(&mut codec, b"d"),
            low,
        ]);
        assert!(error_text(dispatcher.dispatch(request)).starts_with("ERR invalid ciphertext"));
        assert_eq!(dispatcher.store().count(), 1);

        let Frame::Bulk(bytes) = dispatcher.dispatch(Frame::request([b"GET".to_vec(), key(&mut codec, b"b")])) else {
            panic!("expected bulk reply");
        };
        let result = ciphertext_from_bytes(&bytes, codec.context()).unwrap();
        assert_eq!(codec.decrypt_lookup(&result).unwrap(), Lookup::Missing);
    }

    #[test]
    fn test_info_sections() {
        let (_, mut dispatcher) = setup(44);
        let Frame::Bulk(bytes) = dispatcher.dispatch(Frame::request(["info"])) else {
            panic!("expected bulk reply");
        };
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("# Server\r\ncipherkv_version:"));
        assert!(text.contains("# Keyspace\r\nrecords:0\r\n"));
        assert!(text.contains("ring_dim:16\r\n"));
        assert!(text.contains("plaintext_modulus:257\r\n"));
    }
}
