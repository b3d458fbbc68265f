//! LSP wire layer: framing codec, incremental reader, message model and the
//! transport bindings (child process pipes, TCP socket).

pub mod codec;
pub mod error;
pub mod message_creator;
pub mod reader;
pub mod stdio_transport;
pub mod tcp_transport;
pub mod transport;
pub mod types;
