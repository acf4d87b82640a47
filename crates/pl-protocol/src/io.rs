//! Newline-delimited JSON framing shared by the relay and nodes.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::{decode_message, encode_message, Message, ProtocolError};

/// Reads one [`Message`] per line from a byte stream.
pub struct MessageReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Wait for the next non-blank line.
    ///
    /// The outer `Result` is the connection: `Ok(None)` means the peer closed
    /// it.  The inner `Result` is the line itself, so one bad line can be
    /// logged and skipped without dropping the connection.
    pub async fn next(&mut self) -> std::io::Result<Option<Result<Message, ProtocolError>>> {
        loop {
            match self.lines.next_line().await? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(decode_message(&line))),
            }
        }
    }
}

/// Encode `msg` and write it followed by a newline.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Message,
) -> Result<(), ProtocolError> {
    let mut line = encode_message(msg)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
