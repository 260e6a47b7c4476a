use std::sync::Arc;

use tower_lsp::jsonrpc::{Error as RpcError, Result as RpcResult};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, warn};

use crate::diagnostics::ClientPublisher;
use crate::fs::Uri;
use crate::handle::FileView;
use crate::manager::{FileManager, ManagerError};
use crate::semantic;
use crate::workspace::LocalWorkspaceProvider;

pub const SERVER_NAME: &str = "buf-lsp";

pub struct Backend {
    #[allow(dead_code)]
    client: Client,
    manager: FileManager,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        let manager = FileManager::new(
            Arc::new(ClientPublisher(client.clone())),
            Arc::new(LocalWorkspaceProvider),
        );
        Backend { client, manager }
    }

    /// Query requests answer with empty results on lookup misses and
    /// fault only on real errors.
    async fn view(&self, uri: &Url) -> RpcResult<Option<FileView>> {
        match self.manager.get(&Uri::from_url(uri)).await {
            Ok(view) => Ok(Some(view)),
            Err(err) if err.is_not_exist() => Ok(None),
            Err(err) => Err(internal_error(err)),
        }
    }
}

fn internal_error(err: ManagerError) -> RpcError {
    let mut rpc = RpcError::internal_error();
    rpc.message = err.to_string().into();
    rpc
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> RpcResult<InitializeResult> {
        let folders: Vec<(String, Uri)> = params
            .workspace_folders
            .unwrap_or_default()
            .into_iter()
            .map(|folder| (folder.name, Uri::from_url(&folder.uri)))
            .collect();
        debug!(folders = folders.len(), "initialize");

        if let Err(err) = self.manager.init(&folders) {
            let mut rpc = RpcError::internal_error();
            rpc.message = format!("file manager init: {err}").into();
            return Err(rpc);
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        // whole files per change; proto files stay small
                        // enough that this keeps the logic simple
                        change: Some(TextDocumentSyncKind::FULL),
                        ..Default::default()
                    },
                )),
                definition_provider: Some(OneOf::Left(true)),
                document_formatting_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            work_done_progress_options: Default::default(),
                            legend: semantic::legend(),
                            range: None,
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                        },
                    ),
                ),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        debug!("initialized");
    }

    async fn shutdown(&self) -> RpcResult<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = Uri::from_url(&params.text_document.uri);
        let result = self
            .manager
            .open(
                &uri,
                params.text_document.text.into_bytes(),
                params.text_document.version,
            )
            .await;
        if let Err(err) = result {
            warn!(uri = %uri, error = %err, "file manager open");
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(change) = params.content_changes.into_iter().next() else {
            return;
        };
        let uri = Uri::from_url(&params.text_document.uri);
        let result = self
            .manager
            .change(&uri, change.text.into_bytes(), params.text_document.version)
            .await;
        if let Err(err) = result {
            warn!(uri = %uri, error = %err, "file manager change");
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.manager.close(&Uri::from_url(&params.text_document.uri));
    }

    async fn formatting(
        &self,
        params: DocumentFormattingParams,
    ) -> RpcResult<Option<Vec<TextEdit>>> {
        let Some(view) = self.view(&params.text_document.uri).await? else {
            return Ok(None);
        };
        match view.format() {
            Ok((new_text, range)) => Ok(Some(vec![TextEdit { range, new_text }])),
            Err(err) => {
                debug!(error = %err, "file handle format");
                Ok(None)
            }
        }
    }

    async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
        let position = params.text_document_position_params.position;
        let Some(view) = self
            .view(&params.text_document_position_params.text_document.uri)
            .await?
        else {
            return Ok(None);
        };

        // the lookup path is wired up; surfacing content is not
        if let Some((full_name, span)) = view.symbol_at(position) {
            debug!(full_name = %full_name, span = ?span.map(|s| s.span), "symbol at position");
        }
        debug!(nodes = ?view.nodes_at_names(position), "nodes at position");
        Ok(None)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> RpcResult<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params.position;
        let Some(view) = self
            .view(&params.text_document_position_params.text_document.uri)
            .await?
        else {
            return Ok(None);
        };

        let locations = self.manager.definition(&view, position);
        if locations.is_empty() {
            Ok(None)
        } else {
            Ok(Some(GotoDefinitionResponse::Array(locations)))
        }
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> RpcResult<Option<SemanticTokensResult>> {
        let Some(view) = self.view(&params.text_document.uri).await? else {
            return Ok(None);
        };
        let tokens = view.semantic_tokens();
        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data: semantic::lsp_data(&tokens),
        })))
    }
}

/// Serves the language server over stdio until the client disconnects.
pub async fn run_server() {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
