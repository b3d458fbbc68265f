use crate::lsp::error::{LspError, Result};
use lsp_types::NumberOrString;
use serde::{Deserialize, Serialize};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub jsonrpc: String,
    pub id: i32,
    pub method: String,
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(id: i32, method: impl Into<String>, params: serde_json::Value) -> Self {
        Request {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    pub jsonrpc: String,
    pub id: Option<NumberOrString>,
    #[serde(default)]
    pub result: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseError {
    pub jsonrpc: String,
    pub id: Option<NumberOrString>,
    pub error: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Notification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Request initiated by the server (carries both `method` and `id`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerRequest {
    pub jsonrpc: String,
    pub id: NumberOrString,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Incoming message, classified by which JSON-RPC fields it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Response(ResponseMessage),
    Error(ResponseError),
    Notification(Notification),
    Request(ServerRequest),
}

impl Message {
    pub fn from_value(json: &serde_json::Value) -> Result<Message> {
        let classify = |e: serde_json::Error| LspError::decode(e.to_string(), json.to_string());

        let message = if json.get("method").is_some() {
            if json.get("id").is_some() {
                Message::Request(serde_json::from_value(json.clone()).map_err(classify)?)
            } else {
                Message::Notification(serde_json::from_value(json.clone()).map_err(classify)?)
            }
        } else if json.get("error").is_some() {
            Message::Error(serde_json::from_value(json.clone()).map_err(classify)?)
        } else if json.get("id").is_some() {
            Message::Response(serde_json::from_value(json.clone()).map_err(classify)?)
        } else {
            return Err(LspError::decode(
                "message is neither a response nor a notification",
                json.to_string(),
            ));
        };
        Ok(message)
    }

    /// Id of a response or error response.
    pub fn response_id(&self) -> Option<&NumberOrString> {
        match self {
            Message::Response(response) => response.id.as_ref(),
            Message::Error(response) => response.id.as_ref(),
            Message::Notification(_) | Message::Request(_) => None,
        }
    }
}

/// Outgoing message: a request expects exactly one reply, a notification none.
#[derive(Debug, Clone, PartialEq)]
pub enum SendMessage {
    Request(Request),
    Notification(Notification),
}

impl SendMessage {
    pub fn id(&self) -> Option<i32> {
        match self {
            SendMessage::Request(request) => Some(request.id),
            SendMessage::Notification(_) => None,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            SendMessage::Request(request) => &request.method,
            SendMessage::Notification(notification) => &notification.method,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        match self {
            SendMessage::Request(request) => serde_json::to_value(request),
            SendMessage::Notification(notification) => serde_json::to_value(notification),
        }
        .map_err(LspError::Encoding)
    }
}
