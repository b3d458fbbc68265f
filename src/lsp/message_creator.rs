use crate::lsp::error::{LspError, Result};
use crate::lsp::types::{Notification, Request, SendMessage};
use lsp_types::notification::{DidOpenTextDocument, Exit, Notification as _};
use lsp_types::request::{DocumentSymbolRequest, GotoDefinition, Initialize, Request as _, Shutdown};
use lsp_types::{
    ClientCapabilities, DidOpenTextDocumentParams, DocumentSymbolClientCapabilities,
    DocumentSymbolParams, GotoDefinitionParams, InitializeParams, Position,
    TextDocumentClientCapabilities, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, Url,
};
use serde::Serialize;

pub const INITIALIZE_ID: i32 = 1;
pub const DOCUMENT_SYMBOL_ID: i32 = 2;
pub const DEFINITION_ID: i32 = 3;
pub const SHUTDOWN_ID: i32 = 4;

/// Document opened on the server and queried by the script.
#[derive(Debug, Clone)]
pub struct TextDocument {
    pub uri: Url,
    pub language_id: String,
    pub text: String,
}

impl TextDocument {
    pub fn identifier(&self) -> TextDocumentIdentifier {
        TextDocumentIdentifier::new(self.uri.clone())
    }
}

pub struct MessageFactory;

impl MessageFactory {
    pub fn create_request<T: Serialize>(id: i32, method: &str, params: T) -> Result<Request> {
        let params = serde_json::to_value(params).map_err(LspError::Encoding)?;
        Ok(Request::new(id, method, params))
    }

    pub fn create_notification<T: Serialize>(
        method: &str,
        params: Option<T>,
    ) -> Result<Notification> {
        let params = params
            .map(serde_json::to_value)
            .transpose()
            .map_err(LspError::Encoding)?;
        Ok(Notification::new(method, params))
    }
}

pub struct MessageCreator {
    document: TextDocument,
}

impl MessageCreator {
    pub fn new(document: TextDocument) -> MessageCreator {
        MessageCreator { document }
    }

    /// initialize → didOpen → documentSymbol → shutdown → exit
    pub fn script(&self) -> Result<Vec<SendMessage>> {
        Ok(vec![
            SendMessage::Request(self.initialize()?),
            SendMessage::Notification(self.did_open_notification()?),
            SendMessage::Request(self.document_symbol()?),
            SendMessage::Request(self.shutdown()?),
            SendMessage::Notification(self.exit_notification()?),
        ])
    }

    pub fn initialize(&self) -> Result<Request> {
        let initialize_params = InitializeParams {
            process_id: Some(std::process::id()),
            capabilities: ClientCapabilities {
                text_document: Some(TextDocumentClientCapabilities {
                    document_symbol: Some(DocumentSymbolClientCapabilities {
                        hierarchical_document_symbol_support: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        MessageFactory::create_request(INITIALIZE_ID, Initialize::METHOD, initialize_params)
    }

    pub fn did_open_notification(&self) -> Result<Notification> {
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem::new(
                self.document.uri.clone(),
                self.document.language_id.clone(),
                1,
                self.document.text.clone(),
            ),
        };
        MessageFactory::create_notification(DidOpenTextDocument::METHOD, Some(params))
    }

    pub fn document_symbol(&self) -> Result<Request> {
        let params = DocumentSymbolParams {
            text_document: self.document.identifier(),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        MessageFactory::create_request(DOCUMENT_SYMBOL_ID, DocumentSymbolRequest::METHOD, params)
    }

    pub fn definition(&self, position: Position) -> Result<Request> {
        let params = GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: self.document.identifier(),
                position,
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        MessageFactory::create_request(DEFINITION_ID, GotoDefinition::METHOD, params)
    }

    pub fn shutdown(&self) -> Result<Request> {
        MessageFactory::create_request(SHUTDOWN_ID, Shutdown::METHOD, serde_json::json!({}))
    }

    pub fn exit_notification(&self) -> Result<Notification> {
        MessageFactory::create_notification::<()>(Exit::METHOD, None)
    }
}
