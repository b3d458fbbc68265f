//! Incremental reader for Content-Length framed messages.

use crate::lsp::codec;
use crate::lsp::error::{LspError, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::trace;

/// Maximum accepted body size to prevent memory exhaustion.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Maximum accepted size of the whole header block, terminator included.
pub const MAX_HEADER_SIZE: usize = 8 * 1024;

/// Read one framed message from `source`.
///
/// Returns `Ok(None)` when the source closes before the header block is
/// complete. A source that closes inside the body yields
/// [`LspError::Truncated`]. Short reads are retried until the header
/// terminator or the declared body length is reached.
pub async fn read_message<R>(source: &mut R) -> Result<Option<serde_json::Value>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let Some(header_lines) = read_header_block(source).await? else {
        return Ok(None);
    };

    let length = codec::content_length(&header_lines)?;
    if length > MAX_MESSAGE_SIZE {
        return Err(LspError::decode(
            format!("message too large: {length} bytes (max: {MAX_MESSAGE_SIZE})"),
            header_lines.concat(),
        ));
    }

    let body = read_body(source, length).await?;
    trace!(content_length = length, "read framed message");
    codec::decode(&body).map(Some)
}

async fn read_header_block<R>(source: &mut R) -> Result<Option<Vec<String>>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut header_lines: Vec<String> = Vec::new();
    let mut consumed = 0;

    loop {
        let mut line = Vec::new();
        let remaining = (MAX_HEADER_SIZE - consumed) as u64;
        (&mut *source)
            .take(remaining)
            .read_until(b'\n', &mut line)
            .await?;
        consumed += line.len();
        if !line.ends_with(b"\n") {
            if consumed >= MAX_HEADER_SIZE {
                let mut raw = header_lines.concat().into_bytes();
                raw.extend_from_slice(&line);
                return Err(LspError::decode(
                    format!("header block exceeds {MAX_HEADER_SIZE} bytes"),
                    raw,
                ));
            }
            if !line.is_empty() || !header_lines.is_empty() {
                trace!(
                    partial_bytes = line.len(),
                    "source closed inside header block"
                );
            }
            return Ok(None);
        }
        if line == b"\r\n" || line == b"\n" {
            return Ok(Some(header_lines));
        }

        let line = String::from_utf8(line)
            .map_err(|e| LspError::decode("header line is not valid UTF-8", e.into_bytes()))?;
        header_lines.push(line);
    }
}

async fn read_body<R>(source: &mut R, length: usize) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut body = vec![0u8; length];
    let mut received = 0;

    while received < length {
        let n = source.read(&mut body[received..]).await?;
        if n == 0 {
            body.truncate(received);
            return Err(LspError::Truncated {
                expected: length,
                received,
                raw: body,
            });
        }
        received += n;
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, AsyncWriteExt, BufReader};

    fn sample() -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": [{
                "name": "proc greet ✓",
                "kind": 12,
                "range": {"start": {"line": 3, "character": 2}, "end": {"line": 5, "character": 1}}
            }]
        })
    }

    /// Feed `bytes` through a pipe of `capacity` bytes, closing it afterwards.
    async fn read_through_pipe(
        bytes: Vec<u8>,
        capacity: usize,
    ) -> Result<Option<serde_json::Value>> {
        let (mut a, b) = duplex(capacity);
        let writer = tokio::spawn(async move {
            a.write_all(&bytes).await.unwrap();
            a.shutdown().await.unwrap();
        });

        let mut reader = BufReader::with_capacity(capacity, b);
        let result = read_message(&mut reader).await;
        writer.await.unwrap();
        result
    }

    #[tokio::test]
    async fn test_read_whole_message() {
        let framed = codec::encode(&sample()).unwrap();
        let message = read_through_pipe(framed, 4096).await.unwrap();
        assert_eq!(message, Some(sample()));
    }

    #[tokio::test]
    async fn test_read_fragmented_message() {
        let framed = codec::encode(&sample()).unwrap();
        for capacity in [1, 2, 3, 7, 16] {
            let message = read_through_pipe(framed.clone(), capacity).await.unwrap();
            assert_eq!(message, Some(sample()), "capacity {capacity}");
        }
    }

    #[tokio::test]
    async fn test_read_consecutive_messages_keeps_boundaries() {
        let first = json!({"jsonrpc": "2.0", "method": "window/logMessage", "params": {"message": "hi"}});
        let mut bytes = codec::encode(&first).unwrap();
        bytes.extend(codec::encode(&sample()).unwrap());

        let (mut a, b) = duplex(5);
        let writer = tokio::spawn(async move {
            a.write_all(&bytes).await.unwrap();
        });

        let mut reader = BufReader::new(b);
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(first));
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(sample()));
        writer.await.unwrap();
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_bare_newline_headers() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let mut bytes = format!(
            "Content-Type: application/vscode-jsonrpc\ncontent-length: {}\n\n",
            body.len()
        )
        .into_bytes();
        bytes.extend_from_slice(body);

        let message = read_through_pipe(bytes, 3).await.unwrap();
        assert_eq!(message, Some(json!({"jsonrpc": "2.0", "id": 1, "result": {}})));
    }

    #[tokio::test]
    async fn test_clean_close_is_end_of_stream() {
        assert_eq!(read_through_pipe(Vec::new(), 64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_inside_header_is_end_of_stream() {
        let bytes = b"Content-Length: 12\r\nContent-Ty".to_vec();
        assert_eq!(read_through_pipe(bytes, 64).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_inside_body_is_truncated() {
        let mut bytes = b"Content-Length: 50\r\n\r\n".to_vec();
        bytes.extend_from_slice(br#"{"jsonrpc""#);

        let err = read_through_pipe(bytes, 4).await.unwrap_err();
        assert!(err.is_truncated());
        match err {
            LspError::Truncated {
                expected,
                received,
                raw,
            } => {
                assert_eq!(expected, 50);
                assert_eq!(received, 10);
                assert_eq!(raw, br#"{"jsonrpc""#);
            }
            other => panic!("Expected Truncated error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_content_length_is_decode_error() {
        let bytes = b"Content-Type: application/json\r\n\r\n{}".to_vec();
        let err = read_through_pipe(bytes, 64).await.unwrap_err();
        assert!(err.is_decode(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let bytes = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_SIZE + 1).into_bytes();
        let err = read_through_pipe(bytes, 64).await.unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_oversized_header_block_is_decode_error() {
        let mut bytes = format!("X-Padding: {}\r\n", "a".repeat(MAX_HEADER_SIZE)).into_bytes();
        bytes.extend_from_slice(b"Content-Length: 2\r\n\r\n{}");

        let err = read_through_pipe(bytes, 2 * MAX_HEADER_SIZE + 64).await.unwrap_err();
        assert!(err.is_decode(), "got {err:?}");
        assert_eq!(err.raw().map(<[u8]>::len), Some(MAX_HEADER_SIZE));
    }

    #[tokio::test]
    async fn test_header_block_at_limit_is_accepted() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let length_line = format!("Content-Length: {}\r\n", body.len());
        // padding line fills the block up to exactly the limit
        let pad = MAX_HEADER_SIZE - length_line.len() - "X-Padding: \r\n".len() - 2;
        let mut bytes = format!("X-Padding: {}\r\n{length_line}\r\n", "a".repeat(pad)).into_bytes();
        bytes.extend_from_slice(body);

        let message = read_through_pipe(bytes, 2 * MAX_HEADER_SIZE).await.unwrap();
        assert_eq!(message, Some(json!({"jsonrpc": "2.0", "id": 1, "result": {}})));
    }

    #[tokio::test]
    async fn test_invalid_body_is_decode_error_with_raw_bytes() {
        let bytes = b"Content-Length: 5\r\n\r\nhello".to_vec();
        let err = read_through_pipe(bytes, 64).await.unwrap_err();
        assert!(err.is_decode());
        assert_eq!(err.raw(), Some(&b"hello"[..]));
    }
}
