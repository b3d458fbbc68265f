//! LSP transport abstraction (framed Content-Length messages).
use crate::lsp::codec;
use crate::lsp::error::Result;
use crate::lsp::reader;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

/// Message-level transport to a language server.
/// - `send` frames a JSON-RPC payload (Content-Length) and writes it.
/// - `read` returns the next decoded payload, or `None` once the server closed the stream.
#[async_trait]
pub trait LspTransport: Send {
    async fn send(&mut self, message: &serde_json::Value) -> Result<()>;
    async fn read(&mut self) -> Result<Option<serde_json::Value>>;
    async fn close(&mut self) -> Result<()>;

    /// Most recent diagnostic output of the server, if the transport captures any.
    ///
    /// Called after the stream ended; may briefly wait for pending output.
    async fn stderr_tail(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Framed connection over any byte source / byte sink pair.
///
/// Process pipes and sockets both plug in here; the bindings only differ in
/// how the two halves are obtained and released.
pub struct Connection<R, W> {
    reader: BufReader<R>,
    writer: W,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Connection {
            reader: BufReader::new(reader),
            writer,
        }
    }
}

#[async_trait]
impl<R, W> LspTransport for Connection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        let framed = codec::encode(message)?;
        trace!(frame_len = framed.len(), "writing framed message");
        self.writer.write_all(&framed).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<serde_json::Value>> {
        reader::read_message(&mut self.reader).await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
