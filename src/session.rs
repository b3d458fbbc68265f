//! Scripted session driver.
//!
//! Sends one scripted message at a time and waits for the reply to each
//! request before moving on. A `documentSymbol` reply with at least one symbol
//! triggers a `definition` request at the first symbol's start position.
//!
//! Only one request is ever pending, and whatever framed message arrives next
//! is taken as its reply. Servers that interleave their own notifications or
//! answer out of order will have those messages misattributed; mismatches are
//! logged but not filtered.

use crate::lsp::error::LspError;
use crate::lsp::message_creator::MessageCreator;
use crate::lsp::transport::LspTransport;
use crate::lsp::types::{Message, SendMessage};
use lsp_types::request::{DocumentSymbolRequest, Request as _};
use lsp_types::{NumberOrString, Position};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request currently waiting for its reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub id: i32,
    pub method: String,
}

#[derive(Debug)]
pub enum Outcome {
    Response(serde_json::Value),
    /// The stream ended before any reply arrived.
    NoResponse { stderr_tail: Vec<String> },
    Failed(LspError),
}

/// One request and what came back for it.
#[derive(Debug)]
pub struct Exchange {
    pub id: i32,
    pub method: String,
    pub outcome: Outcome,
}

pub trait Reporter {
    fn report(&mut self, exchange: &Exchange);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub answered: usize,
    pub no_response: usize,
    pub failed: usize,
}

impl SessionSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Response(_) => self.answered += 1,
            Outcome::NoResponse { .. } => self.no_response += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct Session<'a, T: LspTransport + ?Sized> {
    transport: &'a mut T,
    creator: &'a MessageCreator,
    settle: Duration,
    pending: Option<PendingRequest>,
}

impl<'a, T: LspTransport + ?Sized> Session<'a, T> {
    pub fn new(transport: &'a mut T, creator: &'a MessageCreator) -> Self {
        Session {
            transport,
            creator,
            settle: Duration::ZERO,
            pending: None,
        }
    }

    /// Pause after every send before reading the reply.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Walk `script` in order. Every step is attempted exactly once; a failed
    /// step is reported and the session moves on to the next one.
    pub async fn run(
        &mut self,
        script: &[SendMessage],
        reporter: &mut dyn Reporter,
    ) -> SessionSummary {
        let mut summary = SessionSummary::default();

        for message in script {
            let exchange = match message {
                SendMessage::Notification(notification) => {
                    if let Err(e) = self.send(message).await {
                        warn!(method = %notification.method, error = %e, "failed to send notification");
                    }
                    continue;
                }
                SendMessage::Request(request) => {
                    let outcome = self.call(message, request.id, &request.method).await;
                    Exchange {
                        id: request.id,
                        method: request.method.clone(),
                        outcome,
                    }
                }
            };

            summary.record(&exchange.outcome);
            reporter.report(&exchange);

            if exchange.method == DocumentSymbolRequest::METHOD {
                if let Outcome::Response(reply) = &exchange.outcome {
                    if let Some(position) = first_symbol_position(reply) {
                        let follow_up = self.follow_definition(position).await;
                        summary.record(&follow_up.outcome);
                        reporter.report(&follow_up);
                    }
                }
            }
        }

        info!(
            answered = summary.answered,
            no_response = summary.no_response,
            failed = summary.failed,
            "session finished"
        );
        summary
    }

    async fn follow_definition(&mut self, position: Position) -> Exchange {
        debug!(
            line = position.line,
            character = position.character,
            "requesting definition of first symbol"
        );
        match self.creator.definition(position) {
            Ok(request) => {
                let (id, method) = (request.id, request.method.clone());
                let outcome = self
                    .call(&SendMessage::Request(request), id, &method)
                    .await;
                Exchange { id, method, outcome }
            }
            Err(e) => Exchange {
                id: crate::lsp::message_creator::DEFINITION_ID,
                method: lsp_types::request::GotoDefinition::METHOD.to_string(),
                outcome: Outcome::Failed(e),
            },
        }
    }

    async fn call(&mut self, message: &SendMessage, id: i32, method: &str) -> Outcome {
        if let Err(e) = self.send(message).await {
            return Outcome::Failed(e);
        }

        self.pending = Some(PendingRequest {
            id,
            method: method.to_string(),
        });
        let outcome = match self.transport.read().await {
            Ok(Some(reply)) => {
                self.check_reply(&reply);
                Outcome::Response(reply)
            }
            Ok(None) => {
                warn!(id, method, "stream closed before reply");
                Outcome::NoResponse {
                    stderr_tail: self.transport.stderr_tail().await,
                }
            }
            Err(e) => {
                warn!(id, method, error = %e, "failed to read reply");
                Outcome::Failed(e)
            }
        };
        self.pending = None;
        outcome
    }

    async fn send(&mut self, message: &SendMessage) -> Result<(), LspError> {
        let payload = message.to_value()?;
        debug!(method = message.method(), id = ?message.id(), "sending message");
        self.transport.send(&payload).await?;
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(())
    }

    fn check_reply(&self, reply: &serde_json::Value) {
        let Some(pending) = &self.pending else {
            return;
        };
        match Message::from_value(reply) {
            Ok(message @ (Message::Response(_) | Message::Error(_))) => {
                if message.response_id() != Some(&NumberOrString::Number(pending.id)) {
                    warn!(
                        pending_id = pending.id,
                        reply_id = ?message.response_id(),
                        "reply id does not match pending request"
                    );
                }
                if let Message::Error(error) = message {
                    warn!(method = %pending.method, error = %error.error, "server returned an error");
                }
            }
            Ok(other) => {
                warn!(pending_id = pending.id, message = ?other, "received a non-response while awaiting reply");
            }
            Err(e) => {
                warn!(pending_id = pending.id, error = %e, "could not classify reply");
            }
        }
    }
}

/// Start position of the first symbol in a `documentSymbol` reply.
///
/// Reads `range.start` for hierarchical symbols and `location.range.start` for
/// flat ones. Missing coordinates default to zero.
pub fn first_symbol_position(reply: &serde_json::Value) -> Option<Position> {
    let first = reply.get("result")?.as_array()?.first()?;
    let range = first
        .get("range")
        .or_else(|| first.get("location").and_then(|location| location.get("range")));
    let start = range.and_then(|range| range.get("start"));

    let coordinate = |name: &str| {
        start
            .and_then(|start| start.get(name))
            .and_then(serde_json::Value::as_u64)
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0)
    };
    Some(Position::new(coordinate("line"), coordinate("character")))
}
