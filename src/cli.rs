use crate::logging::LogConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SERVER_COMMAND: [&str; 2] = ["tclsh", "tcl-lsp.tcl"];

#[derive(Debug, Clone, PartialEq)]
pub enum TransportConfig {
    Stdio { command: String, args: Vec<String> },
    Tcp { addr: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub document_path: PathBuf,
    pub language_id: String,
    pub settle: Duration,
    pub transport: TransportConfig,
    pub log: LogConfig,
}

#[derive(Parser, Debug)]
#[command(name = "lsp_probe")]
#[command(about = "Drive a scripted LSP session against a language server", long_about = None)]
pub struct Cli {
    /// Document opened on the server and queried for symbols
    #[arg(long, value_name = "PATH", default_value = "tcl-lsp.tcl")]
    file: PathBuf,
    #[arg(long, value_name = "ID", default_value = "tcl")]
    language_id: String,
    /// Pause after every message sent, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 200)]
    settle_ms: u64,
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
    #[arg(long)]
    log_json: bool,
    #[command(subcommand)]
    transport: TransportCommand,
}

#[derive(Subcommand, Debug)]
enum TransportCommand {
    /// Spawn the server and talk over its stdin/stdout
    Stdio {
        /// Server command line (defaults to `tclsh tcl-lsp.tcl`)
        #[arg(last = true, value_name = "SERVER_CMD")]
        command: Vec<String>,
    },
    /// Connect to a server listening on a TCP socket
    Tcp {
        #[arg(long, value_name = "HOST:PORT", default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

impl Cli {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn into_config(self) -> Config {
        let transport = match self.transport {
            TransportCommand::Stdio { command } => {
                let mut command = command.into_iter();
                match command.next() {
                    Some(exe) => TransportConfig::Stdio {
                        command: exe,
                        args: command.collect(),
                    },
                    None => TransportConfig::Stdio {
                        command: DEFAULT_SERVER_COMMAND[0].to_string(),
                        args: DEFAULT_SERVER_COMMAND[1..]
                            .iter()
                            .map(|s| s.to_string())
                            .collect(),
                    },
                }
            }
            TransportCommand::Tcp { addr } => TransportConfig::Tcp { addr },
        };

        Config {
            document_path: self.file,
            language_id: self.language_id,
            settle: Duration::from_millis(self.settle_ms),
            transport,
            log: LogConfig {
                level: self.log_level,
                json_format: self.log_json,
            },
        }
    }
}
