use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{KvError, ProtocolError, Result};

use super::frame::Frame;

/// Read one frame, consuming at most `limit` bytes.
///
/// Arrays may only contain scalar frames. Exceeding the limit is reported as
/// [`ProtocolError::TooLarge`].
pub async fn read_frame<R>(reader: R, limit: usize) -> Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = reader.take(limit as u64);
    match read_top(&mut reader).await {
        Err(KvError::Protocol(ProtocolError::Malformed(_))) if reader.limit() == 0 => {
            Err(ProtocolError::TooLarge { limit }.into())
        }
        other => other,
    }
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_top<R>(reader: &mut tokio::io::Take<R>) -> Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let (tag, body) = read_line(reader).await?;
    if tag != b'*' {
        return read_scalar(reader, tag, body).await;
    }

    let count = parse_int(&body)?;
    if count == -1 {
        return Ok(Frame::Null);
    }
    let count = usize::try_from(count)
        .map_err(|_| ProtocolError::Malformed(format!("negative array length {}", count)))?;
    if count as u64 > reader.limit() {
        return Err(ProtocolError::TooLarge {
            limit: reader.limit() as usize,
        }
        .into());
    }

    let mut items = Vec::new();
    for _ in 0..count {
        let (tag, body) = read_line(reader).await?;
        if tag == b'*' {
            return Err(ProtocolError::Malformed("nested arrays are not supported".to_string()).into());
        }
        items.push(read_scalar(reader, tag, body).await?);
    }
    Ok(Frame::Array(items))
}

async fn read_scalar<R>(reader: &mut tokio::io::Take<R>, tag: u8, body: Vec<u8>) -> Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    match tag {
        b'+' => Ok(Frame::Simple(utf8(body)?)),
        b'-' => Ok(Frame::Error(utf8(body)?)),
        b':' => Ok(Frame::Integer(parse_int(&body)?)),
        b'$' => {
            let len = parse_int(&body)?;
            if len == -1 {
                return Ok(Frame::Null);
            }
            let len = usize::try_from(len)
                .map_err(|_| ProtocolError::Malformed(format!("negative bulk length {}", len)))?;
            if len as u64 + 2 > reader.limit() {
                return Err(ProtocolError::TooLarge {
                    limit: reader.limit() as usize,
                }
                .into());
            }

            let mut data = vec![0u8; len + 2];
            reader.read_exact(&mut data).await.map_err(|_| eof())?;
            if !data.ends_with(b"\r\n") {
                return Err(ProtocolError::Malformed("bulk string not terminated".to_string()).into());
            }
            data.truncate(len);
            Ok(Frame::Bulk(data))
        }
        other => Err(ProtocolError::BadTag(other).into()),
    }
}

/// One `\r\n`-terminated line, split into tag byte and body.
async fn read_line<R>(reader: &mut tokio::io::Take<R>) -> Result<(u8, Vec<u8>)>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let read = reader.read_until(b'\n', &mut line).await?;
    if read == 0 || !line.ends_with(b"\r\n") {
        return Err(eof());
    }
    line.truncate(line.len() - 2);

    let Some((&tag, body)) = line.split_first() else {
        return Err(ProtocolError::Malformed("empty line".to_string()).into());
    };
    Ok((tag, body.to_vec()))
}

fn parse_int(body: &[u8]) -> Result<i64> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ProtocolError::Malformed(format!("invalid integer {:?}", String::from_utf8_lossy(body))).into()
        })
}

fn utf8(body: Vec<u8>) -> Result<String> {
    String::from_utf8(body).map_err(|_| ProtocolError::Malformed("line is not UTF-8".to_string()).into())
}

fn eof() -> KvError {
    ProtocolError::Malformed("unexpected end of stream".to_string()).into()
}
