// socket transport: the framed stream runs over a TCP client connection
use crate::lsp::error::{LspError, Result};
use crate::lsp::transport::{Connection, LspTransport};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

pub struct TcpTransport {
    connection: Connection<OwnedReadHalf, OwnedWriteHalf>,
    addr: String,
}

#[async_trait::async_trait]
impl LspTransport for TcpTransport {
    async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        self.connection.send(message).await
    }

    async fn read(&mut self) -> Result<Option<serde_json::Value>> {
        self.connection.read().await
    }

    async fn close(&mut self) -> Result<()> {
        debug!(addr = %self.addr, "closing connection");
        self.connection.close().await
    }
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| LspError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        debug!(addr, peer = ?stream.peer_addr().ok(), "connected to language server");
        Ok(Self::from_stream(stream, addr.to_string()))
    }

    fn from_stream(stream: TcpStream, addr: String) -> Self {
        let (reader, writer) = stream.into_split();
        TcpTransport {
            connection: Connection::new(reader, writer),
            addr,
        }
    }
}
