//! Line framing for the assistant protocol.
//!
//! A request is one UTF-8 line terminated by `\n`. A response is whatever
//! the first read returns, capped at a fixed size. There is no length
//! prefix and no multi-frame reassembly.
//!
//! ```text
//! client -> peer: CHAT:Hello there\n
//! peer -> client: OK:CHAT\n
//! ```

use crate::command::Command;
use crate::config::ProtocolConfig;
use crate::{BridgeError, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write a command followed by the frame terminator, then flush.
pub async fn write_command<W: AsyncWrite + Unpin + ?Sized>(
    writer: &mut W,
    command: &Command,
) -> Result<()> {
    let mut frame = command.to_line().into_bytes();
    frame.push(ProtocolConfig::FRAME_TERMINATOR);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Perform the single bounded response read.
///
/// Returns `""` if the peer closed without answering.
pub async fn read_response<R: AsyncRead + Unpin + ?Sized>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<String> {
    let mut buf = vec![0u8; max_bytes];
    let n = reader.read(&mut buf).await?;
    buf.truncate(n);
    decode_response(buf, n == max_bytes)
}

/// Decode response bytes and trim trailing whitespace.
///
/// When `hit_cap` is set, a multi-byte character cut off at the end of the
/// buffer is dropped. Any other invalid or incomplete sequence is a decode
/// failure.
pub fn decode_response(bytes: Vec<u8>, hit_cap: bool) -> Result<String> {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let utf8_error = e.utf8_error();
            if utf8_error.error_len().is_some() || !hit_cap {
                return Err(BridgeError::ProtocolDecode {
                    message: format!(
                        "invalid UTF-8 at byte {}",
                        utf8_error.valid_up_to()
                    ),
                });
            }
            let mut bytes = e.into_bytes();
            bytes.truncate(utf8_error.valid_up_to());
            String::from_utf8(bytes).map_err(|e| BridgeError::ProtocolDecode {
                message: e.to_string(),
            })?
        }
    };
    Ok(text.trim_end().to_string())
}

/// Read one request line on the peer side.
///
/// Returns `None` on clean EOF. Lines longer than `max_bytes` are rejected.
pub async fn read_command_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(max_bytes as u64 + 1);
    let n = limited
        .read_until(ProtocolConfig::FRAME_TERMINATOR, &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.len() > max_bytes && buf.last() != Some(&ProtocolConfig::FRAME_TERMINATOR) {
        return Err(BridgeError::ProtocolDecode {
            message: format!("command line exceeds {} bytes", max_bytes),
        });
    }

    let line = String::from_utf8(buf).map_err(|e| BridgeError::ProtocolDecode {
        message: e.to_string(),
    })?;
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Write a single response line on the peer side.
pub async fn write_response<W: AsyncWrite + Unpin + ?Sized>(
    writer: &mut W,
    response: &str,
) -> Result<()> {
    let mut frame = response.replace(['\r', '\n'], " ").into_bytes();
    frame.push(ProtocolConfig::FRAME_TERMINATOR);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_command_is_byte_exact() {
        let mut buf = Vec::new();
        write_command(&mut buf, &Command::speak("Hi!")).await.unwrap();
        assert_eq!(buf, b"SPEAK:Hi!\n");
    }

    #[tokio::test]
    async fn test_read_response_caps_bytes() {
        let data = vec![b'a'; 4096];
        let mut cursor = std::io::Cursor::new(data);
        let response = read_response(&mut cursor, 1024).await.unwrap();
        assert_eq!(response.len(), 1024);
    }

    #[tokio::test]
    async fn test_read_response_empty_stream() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert_eq!(read_response(&mut cursor, 1024).await.unwrap(), "");
    }

    #[test]
    fn test_decode_trims_trailing_whitespace_only() {
        assert_eq!(decode_response(b"  PONG\r\n".to_vec(), false).unwrap(), "  PONG");
    }

    #[test]
    fn test_decode_drops_multibyte_tail_split_by_cap() {
        // "é" is 0xC3 0xA9; keep only the lead byte
        let bytes = vec![b'O', b'K', b':', 0xC3];
        assert_eq!(decode_response(bytes, true).unwrap(), "OK:");
    }

    #[test]
    fn test_decode_rejects_truncated_tail_on_short_read() {
        let bytes = vec![b'O', b'K', b':', 0xC3];
        assert!(matches!(
            decode_response(bytes, false),
            Err(BridgeError::ProtocolDecode { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_response_short_read_with_truncated_tail() {
        let mut cursor = std::io::Cursor::new(vec![b'O', b'K', b':', 0xC3]);
        assert!(matches!(
            read_response(&mut cursor, 1024).await,
            Err(BridgeError::ProtocolDecode { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_response_cap_splits_character() {
        let mut cursor = std::io::Cursor::new(vec![b'O', b'K', b':', 0xC3, 0xA9]);
        assert_eq!(read_response(&mut cursor, 4).await.unwrap(), "OK:");
    }

    #[test]
    fn test_decode_rejects_invalid_bytes() {
        let bytes = vec![b'O', 0xFF, b'K'];
        assert!(matches!(
            decode_response(bytes, false),
            Err(BridgeError::ProtocolDecode { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_command_line() {
        let mut cursor = std::io::Cursor::new(b"PING\nVERSION\r\n".to_vec());
        assert_eq!(
            read_command_line(&mut cursor, 64).await.unwrap().as_deref(),
            Some("PING")
        );
        assert_eq!(
            read_command_line(&mut cursor, 64).await.unwrap().as_deref(),
            Some("VERSION")
        );
        assert_eq!(read_command_line(&mut cursor, 64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_command_line_rejects_oversized() {
        let mut cursor = std::io::Cursor::new(vec![b'x'; 100]);
        assert!(read_command_line(&mut cursor, 16).await.is_err());
    }
}
