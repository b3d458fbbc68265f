use anyhow::{anyhow, Context};
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

use crate::cli::{Config, TransportConfig};
use crate::lsp::message_creator::{MessageCreator, TextDocument};
use crate::lsp::stdio_transport::StdioTransport;
use crate::lsp::tcp_transport::TcpTransport;
use crate::lsp::transport::LspTransport;
use crate::session::{Exchange, Outcome, Reporter, Session};

const ERROR_RULE: &str = "=============== ERROR ===============";

pub async fn run(config: Config) -> anyhow::Result<()> {
    let document = load_document(&config.document_path, &config.language_id).await?;
    let creator = MessageCreator::new(document);
    let script = creator
        .script()
        .context("failed to build message script")?;

    let mut transport = open_transport(&config.transport).await?;

    {
        let mut reporter = ConsoleReporter::new(io::stdout());
        Session::new(transport.as_mut(), &creator)
            .with_settle_delay(config.settle)
            .run(&script, &mut reporter)
            .await;
    }

    if let Err(e) = transport.close().await {
        warn!(error = %e, "failed to close transport");
    }
    Ok(())
}

async fn load_document(path: &Path, language_id: &str) -> anyhow::Result<TextDocument> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let absolute = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let uri = lsp_types::Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("cannot build a file URI for {}", absolute.display()))?;

    Ok(TextDocument {
        uri,
        language_id: language_id.to_string(),
        text,
    })
}

async fn open_transport(config: &TransportConfig) -> anyhow::Result<Box<dyn LspTransport>> {
    let transport: Box<dyn LspTransport> = match config {
        TransportConfig::Stdio { command, args } => Box::new(StdioTransport::spawn(command, args)?),
        TransportConfig::Tcp { addr } => Box::new(TcpTransport::connect(addr).await?),
    };
    Ok(transport)
}

/// Prints every exchange as it completes.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        ConsoleReporter { out }
    }

    fn write_exchange(&mut self, exchange: &Exchange) -> io::Result<()> {
        let label = format!("Response to {} (id={}):", exchange.method, exchange.id);
        match &exchange.outcome {
            Outcome::Response(reply) => {
                let pretty = serde_json::to_string_pretty(reply).map_err(io::Error::from)?;
                writeln!(self.out, "{label}")?;
                writeln!(self.out, "{pretty}")?;
            }
            Outcome::NoResponse { stderr_tail } => {
                writeln!(self.out, "{label} <no response>")?;
                if !stderr_tail.is_empty() {
                    writeln!(self.out, "Server error output:")?;
                    for line in stderr_tail {
                        writeln!(self.out, "{line}")?;
                    }
                }
            }
            Outcome::Failed(e) => {
                writeln!(self.out, "{ERROR_RULE}")?;
                writeln!(self.out, "{label}")?;
                if let Some(raw) = e.raw() {
                    writeln!(self.out, "{}", String::from_utf8_lossy(raw))?;
                }
                writeln!(self.out, "Error: {e}")?;
                writeln!(self.out, "{ERROR_RULE}")?;
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, exchange: &Exchange) {
        if let Err(e) = self.write_exchange(exchange) {
            warn!(error = %e, method = %exchange.method, "failed to print exchange");
        }
    }
}
