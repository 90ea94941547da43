//! Client facade: encrypts arguments, talks to a server, decrypts replies.
//!
//! The client holds the secret key. Keys and values are encrypted before they
//! leave the process; only the command name and the `KEYS` wildcard are sent
//! in plaintext.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::codec::{ciphertext_from_bytes, ciphertext_to_bytes, CipherCodec, Lookup};
use crate::config::ClientConfig;
use crate::error::{KvError, ProtocolError, Result};
use crate::keys::KeyPair;
use crate::protocol::{read_frame, write_frame, Frame, DEFAULT_MAX_FRAME_BYTES};
use crate::server::Dispatcher;

/// Carries one request frame to a server and returns its reply.
pub trait Transport {
    fn round_trip(&mut self, request: &Frame) -> impl Future<Output = Result<Frame>> + Send;
}

/// One TCP connection per request.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    addr: String,
    max_reply_bytes: usize,
    io_timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            max_reply_bytes: DEFAULT_MAX_FRAME_BYTES,
            io_timeout: ClientConfig::default().io_timeout(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            addr: config.addr(),
            max_reply_bytes: config.max_reply_bytes,
            io_timeout: config.io_timeout(),
        }
    }

    async fn exchange(&self, request: &Frame) -> Result<Frame> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        let (read_half, mut write_half) = stream.split();
        write_frame(&mut write_half, request).await?;
        read_frame(BufReader::new(read_half), self.max_reply_bytes).await
    }
}

impl Transport for TcpTransport {
    async fn round_trip(&mut self, request: &Frame) -> Result<Frame> {
        timeout(self.io_timeout, self.exchange(request))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "server did not reply in time"))?
    }
}

/// In-process transport over a [`Dispatcher`], going through the wire encoding.
#[derive(Debug)]
pub struct LocalTransport {
    dispatcher: Dispatcher,
}

impl LocalTransport {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Transport for LocalTransport {
    async fn round_trip(&mut self, request: &Frame) -> Result<Frame> {
        let bytes = request.encode();
        let parsed = read_frame(&bytes[..], DEFAULT_MAX_FRAME_BYTES).await?;
        let reply = self.dispatcher.dispatch(parsed).encode();
        read_frame(&reply[..], DEFAULT_MAX_FRAME_BYTES).await
    }
}

/// A decoded server reply, as shown to a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Integer(i64),
    /// Plaintext bytes: `INFO` output or a decrypted key.
    Text(Vec<u8>),
    Lookup(Lookup),
    Nil,
    List(Vec<Reply>),
    Error(String),
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Integer(n) => write!(f, "{}", n),
            Reply::Text(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Reply::Lookup(Lookup::Found(bytes)) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Reply::Lookup(Lookup::Missing) | Reply::Nil => write!(f, "(nil)"),
            Reply::Lookup(Lookup::Ambiguous) => write!(f, "(set multiple times)"),
            Reply::List(items) if items.is_empty() => write!(f, "(empty list or set)"),
            Reply::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    match item {
                        Reply::Text(bytes) => write!(f, "{}) {:?}", i + 1, String::from_utf8_lossy(bytes))?,
                        other => write!(f, "{}) {}", i + 1, other)?,
                    }
                }
                Ok(())
            }
            Reply::Error(text) => write!(f, "(error) {}", text),
        }
    }
}

pub struct Client<T: Transport> {
    codec: CipherCodec,
    transport: T,
}

impl Client<TcpTransport> {
    /// Load the secret key named in `config` and target its server.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let keys = KeyPair::load_secret(&config.secret_key_path)?;
        Ok(Self::new(CipherCodec::new(&keys)?, TcpTransport::from_config(config)))
    }
}

impl<T: Transport> Client<T> {
    pub fn new(codec: CipherCodec, transport: T) -> Self {
        Self { codec, transport }
    }

    pub fn codec(&self) -> &CipherCodec {
        &self.codec
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let args = vec![b"SET".to_vec(), self.key_arg(key)?, self.value_arg(value)?];
        self.expect_ok(args).await
    }

    pub async fn mset(&mut self, pairs: &[(&[u8], &[u8])]) -> Result<()> {
        let mut args = vec![b"MSET".to_vec()];
        for (key, value) in pairs {
            args.push(self.key_arg(key)?);
            args.push(self.value_arg(value)?);
        }
        self.expect_ok(args).await
    }

    pub async fn get(&mut self, key: &[u8]) -> Result<Lookup> {
        let args = vec![b"GET".to_vec(), self.key_arg(key)?];
        let reply = self.call(args).await?;
        self.lookup_reply(reply)
    }

    pub async fn mget(&mut self, keys: &[&[u8]]) -> Result<Vec<Lookup>> {
        let mut args = vec![b"MGET".to_vec()];
        for key in keys {
            args.push(self.key_arg(key)?);
        }
        match self.call(args).await? {
            Frame::Array(items) => items.into_iter().map(|item| self.lookup_reply(item)).collect(),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn flushall(&mut self) -> Result<()> {
        self.expect_ok(vec![b"FLUSHALL".to_vec()]).await
    }

    /// Number of stored records, duplicates included.
    pub async fn dbsize(&mut self) -> Result<i64> {
        match self.call(vec![b"DBSIZE".to_vec()]).await? {
            Frame::Integer(n) => Ok(n),
            other => Err(unexpected(&other)),
        }
    }

    /// Every stored key, decrypted, in insertion order and not deduplicated.
    pub async fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        match self.call(vec![b"KEYS".to_vec(), b"*".to_vec()]).await? {
            Frame::Array(items) => items.into_iter().map(|item| self.key_reply(item)).collect(),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn info(&mut self) -> Result<String> {
        match self.call(vec![b"INFO".to_vec()]).await? {
            Frame::Bulk(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            other => Err(unexpected(&other)),
        }
    }

    /// Run a command given as plaintext arguments, the way the CLI does.
    ///
    /// Server errors come back as [`Reply::Error`]; local failures (bad
    /// arguments, I/O) are returned as `Err`.
    pub async fn execute(&mut self, args: &[Vec<u8>]) -> Result<Reply> {
        let Some(command) = args.first() else {
            return Err(ProtocolError::Malformed("no command given".to_string()).into());
        };
        let name = String::from_utf8_lossy(command).to_lowercase();

        let mut request = vec![command.clone()];
        for (i, arg) in args.iter().enumerate().skip(1) {
            let encrypted = match name.as_str() {
                "keys" if arg.as_slice() == b"*" => arg.clone(),
                "set" if i == 2 => self.value_arg(arg)?,
                "mset" if i % 2 == 0 => self.value_arg(arg)?,
                _ => self.key_arg(arg)?,
            };
            request.push(encrypted);
        }

        let start = std::time::Instant::now();
        let reply = self.transport.round_trip(&Frame::request(request)).await?;
        debug!("{} answered in {:.2?}", name, start.elapsed());

        self.decode_reply(&name, reply)
    }

    fn decode_reply(&self, command: &str, frame: Frame) -> Result<Reply> {
        Ok(match frame {
            Frame::Error(text) => Reply::Error(text),
            Frame::Simple(text) => Reply::Status(text),
            Frame::Integer(n) => Reply::Integer(n),
            Frame::Null => Reply::Nil,
            Frame::Bulk(bytes) if command == "info" => Reply::Text(bytes),
            frame @ Frame::Bulk(_) => Reply::Lookup(self.lookup_reply(frame)?),
            Frame::Array(items) if command == "keys" => Reply::List(
                items
                    .into_iter()
                    .map(|item| self.key_reply(item).map(Reply::Text))
                    .collect::<Result<_>>()?,
            ),
            Frame::Array(items) => Reply::List(
                items
                    .into_iter()
                    .map(|item| self.lookup_reply(item).map(Reply::Lookup))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    async fn call(&mut self, args: Vec<Vec<u8>>) -> Result<Frame> {
        match self.transport.round_trip(&Frame::request(args)).await? {
            Frame::Error(text) => Err(KvError::Remote(text)),
            reply => Ok(reply),
        }
    }

    async fn expect_ok(&mut self, args: Vec<Vec<u8>>) -> Result<()> {
        match self.call(args).await? {
            Frame::Simple(s) if s == "OK" => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    fn key_arg(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let ct = self.codec.encrypt_key(key)?;
        ciphertext_to_bytes(&ct)
    }

    fn value_arg(&mut self, value: &[u8]) -> Result<Vec<u8>> {
        let ct = self.codec.encrypt_value(value)?;
        ciphertext_to_bytes(&ct)
    }

    fn lookup_reply(&self, frame: Frame) -> Result<Lookup> {
        match frame {
            Frame::Null => Ok(Lookup::Missing),
            Frame::Bulk(bytes) => {
                let ct = ciphertext_from_bytes(&bytes, self.codec.context())?;
                Ok(self.codec.decrypt_lookup(&ct)?)
            }
            other => Err(unexpected(&other)),
        }
    }

    fn key_reply(&self, frame: Frame) -> Result<Vec<u8>> {
        match frame {
            Frame::Bulk(bytes) => {
                let ct = ciphertext_from_bytes(&bytes, self.codec.context())?;
                Ok(self.codec.decrypt_key(&ct)?)
            }
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(frame: &Frame) -> KvError {
    ProtocolError::Malformed(format!("unexpected {} reply", frame.kind())).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyGenerator;
    use crate::params::SchemeParameters;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<Vec<Vec<u8>>>,
    }

    impl Transport for RecordingTransport {
        async fn round_trip(&mut self, request: &Frame) -> Result<Frame> {
            self.sent.push(request.clone().into_args()?);
            Ok(Frame::Array(Vec::new()))
        }
    }

    fn recording_client(seed: u64) -> Client<RecordingTransport> {
        let keys = KeyGenerator::with_seed(SchemeParameters::compact(), seed)
            .unwrap()
            .generate();
        let codec = CipherCodec::with_seed(&keys, seed).unwrap();
        Client::new(codec, RecordingTransport::default())
    }

    #[test]
    fn test_reply_display() {
        assert_eq!(Reply::Status("OK".into()).to_string(), "OK");
        assert_eq!(Reply::Integer(3).to_string(), "3");
        assert_eq!(Reply::Lookup(Lookup::Found(b"world".to_vec())).to_string(), "\"world\"");
        assert_eq!(Reply::Lookup(Lookup::Missing).to_string(), "(nil)");
        assert_eq!(Reply::Nil.to_string(), "(nil)");
        assert_eq!(
            Reply::Lookup(Lookup::Ambiguous).to_string(),
            "(set multiple times)"
        );
        assert_eq!(Reply::List(Vec::new()).to_string(), "(empty list or set)");
        assert_eq!(
            Reply::List(vec![
                Reply::Text(b"a".to_vec()),
                Reply::Lookup(Lookup::Missing),
                Reply::Lookup(Lookup::Found(b"2".to_vec())),
            ])
            .to_string(),
            "1) \"a\"\n2) (nil)\n3) \"2\""
        );
        assert_eq!(
            Reply::Error("ERR unknown command 'x'".into()).to_string(),
            "(error) ERR unknown command 'x'"
        );
    }

    #[tokio::test]
    async fn test_keys_pattern_is_encrypted() {
        let mut client = recording_client(30);
        let args = vec![b"keys".to_vec(), b"user:alice-secret".to_vec()];
        client.execute(&args).await.unwrap();

        let sent = &client.transport().sent[0];
        assert_eq!(sent[0], b"keys");
        assert_ne!(sent[1], b"user:alice-secret");
        let ct = ciphertext_from_bytes(&sent[1], client.codec().context()).unwrap();
        assert_eq!(client.codec().decrypt_key(&ct).unwrap(), b"user:alice-secret");
    }

    #[tokio::test]
    async fn test_keys_wildcard_is_sent_as_is() {
        let mut client = recording_client(31);
        let reply = client
            .execute(&[b"KEYS".to_vec(), b"*".to_vec()])
            .await
            .unwrap();

        assert_eq!(reply, Reply::List(Vec::new()));
        assert_eq!(client.transport().sent[0], vec![b"KEYS".to_vec(), b"*".to_vec()]);
    }
}
