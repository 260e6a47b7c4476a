use std::sync::Arc;

use tower_lsp::lsp_types::{Location, Position, Range, Url};
use tracing::{debug, warn};

use crate::cache::{CacheError, ParseCache};
use crate::diagnostics::{DiagnosticPublisher, DiagnosticSink};
use crate::fs::{Filesystem, FsError, FsResolver, Handle, Uri};
use crate::handle::FileView;
use crate::workspace::WorkspaceProvider;

/// Errors out of manager operations, named after the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("fs open overlay: {0}")]
    Open(#[source] FsError),

    #[error("fs stat file: {0}")]
    Stat(#[source] FsError),

    #[error("fs read file: {0}")]
    Read(#[source] FsError),

    #[error("parser parse file: {0}")]
    Parse(#[source] CacheError),
}

impl ManagerError {
    /// Lookup misses surface as empty results, not as request faults.
    pub fn is_not_exist(&self) -> bool {
        match self {
            ManagerError::Open(err) | ManagerError::Stat(err) | ManagerError::Read(err) => {
                err.is_not_exist()
            }
            ManagerError::Parse(_) => false,
        }
    }
}

/// Ties the filesystem facade, the parse cache and the diagnostic sink
/// together; every LSP request lands here.
pub struct FileManager {
    fs: Arc<Filesystem>,
    cache: ParseCache,
    sink: Arc<DiagnosticSink>,
}

impl FileManager {
    pub fn new(
        publisher: Arc<dyn DiagnosticPublisher>,
        provider: Arc<dyn WorkspaceProvider>,
    ) -> Self {
        let sink = Arc::new(DiagnosticSink::new(publisher));
        let fs = Arc::new(Filesystem::new(provider));
        let cache = ParseCache::new(sink.clone(), Arc::new(FsResolver::new(fs.clone())));
        FileManager { fs, cache, sink }
    }

    pub fn init(&self, folders: &[(String, Uri)]) -> Result<(), FsError> {
        self.fs.init(folders)
    }

    pub fn fs(&self) -> &Arc<Filesystem> {
        &self.fs
    }

    /// `didOpen`: places the overlay, then parses the file and its
    /// import closure.
    pub async fn open(
        &self,
        uri: &Uri,
        content: Vec<u8>,
        version: i32,
    ) -> Result<FileView, ManagerError> {
        debug!(uri = %uri, version, "open overlay");
        let content: Arc<[u8]> = Arc::from(content.into_boxed_slice());
        let overlay = self
            .fs
            .open(uri, content, version)
            .map_err(ManagerError::Open)?;
        let uri = overlay.uri().clone();
        self.read_file(&uri).await
    }

    /// `didChange`: swaps the overlay content in place and re-parses
    /// just this file.
    pub async fn change(
        &self,
        uri: &Uri,
        content: Vec<u8>,
        version: i32,
    ) -> Result<FileView, ManagerError> {
        debug!(uri = %uri, version, "change overlay");
        let content: Arc<[u8]> = Arc::from(content.into_boxed_slice());
        let overlay = self
            .fs
            .open(uri, content, version)
            .map_err(ManagerError::Open)?;

        let source = self.fs.source();
        let stat = source.stat(overlay.uri()).map_err(ManagerError::Stat)?;
        self.parse_and_notify(&stat.path, overlay as Arc<dyn Handle>)
            .await
    }

    /// `didClose`: drops the overlay; the next read falls through to
    /// module or disk content.
    pub fn close(&self, uri: &Uri) {
        debug!(uri = %uri, "close");
        self.fs.source().close(uri);
    }

    /// Reads and parses `uri`, then walks its declared imports
    /// depth-first, parsing every import that resolves under the
    /// facade. Only files that actually re-parsed have their imports
    /// walked: a file already at its handle version is a no-op, which
    /// is what terminates import cycles.
    pub async fn read_file(&self, uri: &Uri) -> Result<FileView, ManagerError> {
        debug!(uri = %uri, "read file");
        let root = self.parse_uri(uri).await?;

        let mut stack: Vec<Uri> = Vec::new();
        if root.fresh() {
            push_imports(&mut stack, root.file().imports());
        }
        while let Some(import) = stack.pop() {
            match self.parse_uri(&import).await {
                Ok(view) => {
                    if view.fresh() {
                        push_imports(&mut stack, view.file().imports());
                    }
                }
                Err(err) if err.is_not_exist() => {
                    debug!(uri = %import, "import does not resolve");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(root)
    }

    /// Fetches a view for a query request: read and parse, but no
    /// diagnostic reset, no publish, no import walk.
    pub async fn get(&self, uri: &Uri) -> Result<FileView, ManagerError> {
        let source = self.fs.source();
        let stat = source.stat(uri).map_err(ManagerError::Stat)?;
        let handle = source.read_file(uri).map_err(ManagerError::Read)?;
        let (file, fresh) = self
            .cache
            .parse(&Uri::normalize(&stat.path), handle.clone())
            .map_err(ManagerError::Parse)?;
        Ok(FileView::new(handle, file, fresh))
    }

    /// Import-based go-to-definition: when the position sits on an
    /// import, every location the facade can resolve the path to.
    pub fn definition(&self, view: &FileView, position: Position) -> Vec<Location> {
        let Some(import_path) = view.import_at(position) else {
            return Vec::new();
        };

        let locations: Vec<Location> = self
            .fs
            .location(&Uri::normalize(&import_path))
            .into_iter()
            .filter_map(|info| {
                Url::from_file_path(&info.local_path)
                    .ok()
                    .map(|uri| Location {
                        uri,
                        range: Range::default(),
                    })
            })
            .collect();
        debug!(import = %import_path, count = locations.len(), "import locations");
        locations
    }

    async fn parse_uri(&self, uri: &Uri) -> Result<FileView, ManagerError> {
        let source = self.fs.source();
        let stat = source.stat(uri).map_err(ManagerError::Stat)?;
        let handle = source.read_file(uri).map_err(ManagerError::Read)?;
        self.parse_and_notify(&stat.path, handle).await
    }

    async fn parse_and_notify(
        &self,
        path: &str,
        handle: Arc<dyn Handle>,
    ) -> Result<FileView, ManagerError> {
        use crate::cache::DiagnosticCollector;

        self.sink.reset(&*handle);

        let rel = Uri::normalize(path);
        let parsed = self.cache.parse(&rel, handle.clone());
        let (file, fresh) = match parsed {
            Ok(ok) => ok,
            Err(err) => {
                warn!(uri = %handle.uri(), error = %err, "parse fail");
                return Err(ManagerError::Parse(err));
            }
        };

        // a no-op parse commits nothing; what the client shows still
        // reflects the last committed parse, so only a fresh parse
        // publishes
        if fresh {
            self.sink.notify(&*handle).await;
        }
        Ok(FileView::new(handle, file, fresh))
    }
}

fn push_imports(stack: &mut Vec<Uri>, imports: Vec<Uri>) {
    // pushed in reverse so the pop order matches source order
    for import in imports.into_iter().rev() {
        stack.push(import);
    }
}
