use std::sync::{Arc, RwLock};

use tower_lsp::lsp_types::Range;
use tracing::debug;

use protolsp_ast::FileNode;
use protolsp_parser::{
    parse, result_from_ast, CompileError, Compiler, FileResult, Handler, LinkedFile, Reporter,
    Resolver, SymbolSpan, Symbols,
};

use crate::fs::{Handle, Uri};

use super::package::PackageName;
use super::position::lsp_range;
use super::CacheError;

/// A cache entry starts below any possible handle version, so the first
/// parse always fires.
pub const FILE_INIT_VERSION: i32 = -2;

/// One file's versioned parse state. The fields live behind a single
/// read/write lock: a parse commits them together, and readers during a
/// parse see the previous snapshot until the commit.
pub struct ParsedFile {
    uri: Uri,
    reporter: Arc<dyn Reporter>,
    state: RwLock<FileState>,
}

struct FileState {
    handle: Arc<dyn Handle>,
    content: Option<Arc<[u8]>>,
    version: i32,
    ast: Option<Arc<FileNode>>,
    result: Option<Arc<FileResult>>,
    package: PackageName,
    imports: Vec<Uri>,
    symbols: Option<Arc<Symbols>>,
    linked: Option<LinkedFile>,
}

impl ParsedFile {
    pub(super) fn new(uri: Uri, handle: Arc<dyn Handle>, reporter: Arc<dyn Reporter>) -> Self {
        ParsedFile {
            uri,
            reporter,
            state: RwLock::new(FileState {
                handle,
                content: None,
                version: FILE_INIT_VERSION,
                ast: None,
                result: None,
                package: PackageName::default(),
                imports: Vec::new(),
                symbols: None,
                linked: None,
            }),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> i32 {
        self.read().version
    }

    pub fn package_name(&self) -> PackageName {
        self.read().package.clone()
    }

    /// Import paths as declared, in source order.
    pub fn imports(&self) -> Vec<Uri> {
        self.read().imports.clone()
    }

    pub fn ast(&self) -> Option<Arc<FileNode>> {
        self.read().ast.clone()
    }

    pub fn content(&self) -> Option<Arc<[u8]>> {
        self.read().content.clone()
    }

    pub fn result(&self) -> Option<Arc<FileResult>> {
        self.read().result.clone()
    }

    pub fn linked(&self) -> Option<LinkedFile> {
        self.read().linked.clone()
    }

    /// The whole-file range, for full-document edits.
    pub fn range(&self) -> Range {
        match self.ast() {
            Some(ast) => lsp_range(ast.span),
            None => Range::default(),
        }
    }

    /// Source span of a fully-qualified name, out of the last compile's
    /// symbol table. Stale once any file sharing that table recompiles.
    pub fn lookup_symbol(&self, full_name: &str) -> Option<SymbolSpan> {
        self.read().symbols.as_ref()?.lookup(full_name)
    }

    /// Points the entry at a fresh handle. The committed version stays,
    /// so the re-parse predicate decides whether anything happens.
    pub(super) fn reset_with_handle(&self, handle: Arc<dyn Handle>) {
        let mut state = self.write();
        state.handle = handle;
    }

    /// Re-parses if the entry is dirty: no AST yet, or the committed
    /// version is behind the handle. Returns whether a parse ran.
    pub(super) fn parse(&self) -> Result<bool, CacheError> {
        let mut state = self.write();

        let handle_version = state.handle.version();
        let dirty = state.ast.is_none() || state.version < handle_version;
        if !dirty {
            return Ok(false);
        }

        let content = state.handle.content().map_err(CacheError::Content)?;
        let source = String::from_utf8_lossy(&content);
        let filename = self.uri.filename();

        let handler = Handler::new(&*self.reporter);
        let ast = parse(&filename, &source, &handler);
        let result = result_from_ast(&filename, &ast, true, &handler);

        debug!(
            uri = %self.uri,
            version = handle_version,
            package = %result.package,
            invalid = handler.errored(),
            "parsed file"
        );

        state.content = Some(content);
        state.version = handle_version;
        state.package = PackageName::new(result.package.clone());
        state.imports = result.imports.iter().map(|p| Uri::normalize(p)).collect();
        state.ast = Some(Arc::new(ast));
        state.result = Some(Arc::new(result));
        Ok(true)
    }

    /// Compiles this file and its import closure into a fresh symbol
    /// table shared by everything in that closure.
    pub(super) fn compile(&self, resolver: &dyn Resolver) -> Result<(), CompileError> {
        let mut state = self.write();

        let symbols = Arc::new(Symbols::new());
        let compiler = Compiler {
            resolver,
            reporter: &*self.reporter,
            symbols: &symbols,
        };
        let linked = compiler.compile(&self.uri.filename())?;

        state.symbols = Some(symbols);
        state.linked = linked.into_iter().next();
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, FileState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, FileState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
