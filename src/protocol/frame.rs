use crate::error::ProtocolError;

/// One RESP value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    /// `$-1`, the null bulk string.
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    /// Request frame: an array of bulk strings.
    pub fn request<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        Frame::Array(args.into_iter().map(|a| Frame::Bulk(a.into())).collect())
    }

    /// Error reply with the conventional `ERR` prefix.
    pub fn err(message: impl std::fmt::Display) -> Self {
        Frame::Error(format!("ERR {}", message))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => line(out, b'+', s.as_bytes()),
            Frame::Error(s) => line(out, b'-', s.as_bytes()),
            Frame::Integer(n) => line(out, b':', n.to_string().as_bytes()),
            Frame::Bulk(bytes) => {
                line(out, b'$', bytes.len().to_string().as_bytes());
                out.extend_from_slice(bytes);
                out.extend_from_slice(b"\r\n");
            }
            Frame::Null => out.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                line(out, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.write_to(out);
                }
            }
        }
    }

    /// The arguments of a request frame.
    pub fn into_args(self) -> Result<Vec<Vec<u8>>, ProtocolError> {
        let Frame::Array(items) = self else {
            return Err(ProtocolError::Malformed("request must be an array".to_string()));
        };
        if items.is_empty() {
            return Err(ProtocolError::Malformed("empty request".to_string()));
        }
        items
            .into_iter()
            .map(|item| match item {
                Frame::Bulk(bytes) => Ok(bytes),
                other => Err(ProtocolError::Malformed(format!(
                    "request element must be a bulk string, got {}",
                    other.kind()
                ))),
            })
            .collect()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::Null => "null",
            Frame::Array(_) => "array",
        }
    }
}

fn line(out: &mut Vec<u8>, tag: u8, body: &[u8]) {
    out.push(tag);
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
}
