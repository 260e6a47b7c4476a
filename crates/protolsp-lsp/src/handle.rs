use std::sync::Arc;

use tower_lsp::lsp_types::{Position, Range};

use protolsp_parser::SymbolSpan;

use crate::cache::position::{nearest, nodes_at, type_names};
use crate::cache::ParsedFile;
use crate::fs::Handle;
use crate::semantic::{self, SemanticToken};

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("file not parsed")]
    NotParsed,
}

/// A file handle paired with its cache entry; this is what the request
/// handlers actually work with. Queries snapshot the AST out of the
/// entry, so a concurrent re-parse never shifts the ground mid-request.
pub struct FileView {
    handle: Arc<dyn Handle>,
    file: Arc<ParsedFile>,
    fresh: bool,
}

impl FileView {
    pub fn new(handle: Arc<dyn Handle>, file: Arc<ParsedFile>, fresh: bool) -> Self {
        FileView {
            handle,
            file,
            fresh,
        }
    }

    pub fn handle(&self) -> &Arc<dyn Handle> {
        &self.handle
    }

    pub fn file(&self) -> &Arc<ParsedFile> {
        &self.file
    }

    /// Whether the underlying entry actually re-parsed for this view.
    pub fn fresh(&self) -> bool {
        self.fresh
    }

    /// The canonically formatted text plus the whole-file range it
    /// replaces.
    pub fn format(&self) -> Result<(String, Range), ViewError> {
        let ast = self.file.ast().ok_or(ViewError::NotParsed)?;
        Ok((protolsp_fmt::format_file(&ast), self.file.range()))
    }

    pub fn semantic_tokens(&self) -> Vec<SemanticToken> {
        match self.file.ast() {
            Some(ast) => semantic::collect(&ast),
            None => Vec::new(),
        }
    }

    /// The import path under the cursor, when the nodes at `position`
    /// include an import declaration.
    pub fn import_at(&self, position: Position) -> Option<String> {
        let ast = self.file.ast()?;
        nodes_at(&ast, position).iter().find_map(|node| match node {
            protolsp_ast::Node::Import(import) => Some(import.name.value.clone()),
            _ => None,
        })
    }

    /// The identifier under the cursor qualified by the file's package,
    /// with its symbol span when the last compile knows it.
    pub fn symbol_at(&self, position: Position) -> Option<(String, Option<SymbolSpan>)> {
        let ast = self.file.ast()?;
        let node = nearest(&ast, position)?;
        let protolsp_ast::Node::Ident(ident) = node else {
            return None;
        };
        let package = self.file.package_name();
        let full_name = if package.is_empty() {
            ident.value.clone()
        } else {
            format!("{}.{}", package, ident.value)
        };
        let span = self.file.lookup_symbol(&full_name);
        Some((full_name, span))
    }

    /// Node kind names at a position, for logging.
    pub fn nodes_at_names(&self, position: Position) -> Vec<&'static str> {
        match self.file.ast() {
            Some(ast) => type_names(&nodes_at(&ast, position)),
            None => Vec::new(),
        }
    }
}
