//! The parsed-file cache: versioned AST and compile state per file,
//! re-parsed lazily as handle versions move past committed versions.

mod file;
mod package;
pub mod position;

pub use file::{ParsedFile, FILE_INIT_VERSION};
pub use package::{Package, PackageName};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Range};
use tracing::debug;

use protolsp_parser::{ErrorWithSpan, NoopReporter, ParseAborted, Reporter, Resolver};

use crate::fs::{FsError, Handle, Uri};

use position::lsp_position;

/// Tag carried by every diagnostic this server publishes.
pub const DIAGNOSTIC_SOURCE: &str = "buf-lsp";

/// Files on this path parse under a silent reporter; their errors never
/// reach the client.
pub const DESCRIPTOR_PATH: &str = "google/protobuf/descriptor.proto";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("file content: {0}")]
    Content(#[source] FsError),
}

/// Receives diagnostics as parses produce them. The diagnostic sink
/// implements this; a no-op implementation serves tests and silent
/// paths.
pub trait DiagnosticCollector: Send + Sync {
    fn reset(&self, handle: &dyn Handle);
    fn add_diagnostics(&self, handle: &dyn Handle, diagnostics: Vec<Diagnostic>);
}

pub struct NoopDiagnosticCollector;

impl DiagnosticCollector for NoopDiagnosticCollector {
    fn reset(&self, _: &dyn Handle) {}
    fn add_diagnostics(&self, _: &dyn Handle, _: Vec<Diagnostic>) {}
}

/// Routes reporter callbacks for one file into the collector, tagged
/// with the file's handle.
struct FileReporter {
    handle: Arc<dyn Handle>,
    collector: Arc<dyn DiagnosticCollector>,
}

impl FileReporter {
    fn diagnostic(err: &ErrorWithSpan, severity: DiagnosticSeverity) -> Diagnostic {
        Diagnostic {
            range: Range {
                start: lsp_position(err.span.start),
                end: lsp_position(err.span.end),
            },
            severity: Some(severity),
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: err.message.clone(),
            ..Default::default()
        }
    }
}

impl Reporter for FileReporter {
    fn error(&self, err: ErrorWithSpan) -> Result<(), ParseAborted> {
        debug!(uri = %self.handle.uri(), span = %err.span, message = %err.message, "report error");
        let diagnostic = Self::diagnostic(&err, DiagnosticSeverity::ERROR);
        self.collector.add_diagnostics(&*self.handle, vec![diagnostic]);
        Ok(())
    }

    fn warning(&self, warn: ErrorWithSpan) {
        debug!(uri = %self.handle.uri(), span = %warn.span, message = %warn.message, "report warning");
        let diagnostic = Self::diagnostic(&warn, DiagnosticSeverity::WARNING);
        self.collector.add_diagnostics(&*self.handle, vec![diagnostic]);
    }
}

struct CacheInner {
    files: HashMap<Uri, Arc<ParsedFile>>,
    packages: HashMap<PackageName, Arc<Package>>,
}

/// Owns every [`ParsedFile`] and the package registry. One mutex guards
/// the maps; each file serializes its own parses with its own lock, so
/// distinct files parse concurrently.
pub struct ParseCache {
    collector: Arc<dyn DiagnosticCollector>,
    resolver: Arc<dyn Resolver>,
    inner: Mutex<CacheInner>,
}

impl ParseCache {
    pub fn new(collector: Arc<dyn DiagnosticCollector>, resolver: Arc<dyn Resolver>) -> Self {
        ParseCache {
            collector,
            resolver,
            inner: Mutex::new(CacheInner {
                files: HashMap::new(),
                packages: HashMap::new(),
            }),
        }
    }

    /// Parses `uri` against `handle`: looks up or creates the entry,
    /// re-parses if dirty, compiles on a fresh parse, and re-registers
    /// the file under its (possibly new) package. Returns the entry and
    /// whether a parse actually ran.
    pub fn parse(
        &self,
        uri: &Uri,
        handle: Arc<dyn Handle>,
    ) -> Result<(Arc<ParsedFile>, bool), CacheError> {
        let file = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match inner.files.get(uri) {
                Some(existing) => {
                    let existing = existing.clone();
                    existing.reset_with_handle(handle);
                    Self::package_remove(&mut inner, &existing);
                    existing
                }
                None => {
                    let file = Arc::new(ParsedFile::new(
                        uri.clone(),
                        handle.clone(),
                        self.reporter_for(uri, handle.clone()),
                    ));
                    inner.files.insert(uri.clone(), file.clone());
                    file
                }
            }
        };

        let fresh = file.parse()?;

        if fresh {
            match file.compile(&*self.resolver) {
                Ok(()) => debug!(uri = %uri, "compile success"),
                Err(err) => debug!(uri = %uri, error = %err, "compile fail"),
            }
        }

        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Self::package_add(&mut inner, &file);
        }

        Ok((file, fresh))
    }

    pub fn get(&self, uri: &Uri) -> Option<Arc<ParsedFile>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.files.get(uri).cloned()
    }

    pub fn package(&self, name: &PackageName) -> Option<Arc<Package>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.packages.get(name).cloned()
    }

    fn reporter_for(&self, uri: &Uri, handle: Arc<dyn Handle>) -> Arc<dyn Reporter> {
        if uri.filename().contains(DESCRIPTOR_PATH) {
            Arc::new(NoopReporter)
        } else {
            Arc::new(FileReporter {
                handle,
                collector: self.collector.clone(),
            })
        }
    }

    fn package_remove(inner: &mut CacheInner, file: &Arc<ParsedFile>) {
        if let Some(package) = inner.packages.get(&file.package_name()) {
            package.remove_file(file);
        }
    }

    fn package_add(inner: &mut CacheInner, file: &Arc<ParsedFile>) {
        let name = file.package_name();
        let package = inner
            .packages
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Package::new(name)));
        package.add_file(file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use protolsp_parser::ResolveError;

    // ── test doubles ─────────────────────────────────────────────

    pub(crate) struct StaticHandle {
        pub uri: Uri,
        pub version: i32,
        pub content: StdMutex<Arc<[u8]>>,
    }

    impl StaticHandle {
        pub fn new(uri: &str, version: i32, content: &str) -> Arc<Self> {
            Arc::new(StaticHandle {
                uri: Uri::normalize(uri),
                version,
                content: StdMutex::new(Arc::from(content.as_bytes().to_vec().into_boxed_slice())),
            })
        }
    }

    impl Handle for StaticHandle {
        fn uri(&self) -> Uri {
            self.uri.clone()
        }

        fn version(&self) -> i32 {
            self.version
        }

        fn content(&self) -> Result<Arc<[u8]>, FsError> {
            Ok(self.content.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct RecordingCollector {
        diagnostics: StdMutex<Vec<Diagnostic>>,
        resets: StdMutex<usize>,
    }

    impl DiagnosticCollector for RecordingCollector {
        fn reset(&self, _: &dyn Handle) {
            *self.resets.lock().unwrap() += 1;
        }

        fn add_diagnostics(&self, _: &dyn Handle, mut diagnostics: Vec<Diagnostic>) {
            self.diagnostics.lock().unwrap().append(&mut diagnostics);
        }
    }

    struct EmptyResolver;

    impl Resolver for EmptyResolver {
        fn find_file(&self, path: &str) -> Result<Vec<u8>, ResolveError> {
            Err(ResolveError::NotFound(path.to_string()))
        }
    }

    fn cache_with_collector() -> (ParseCache, Arc<RecordingCollector>) {
        let collector = Arc::new(RecordingCollector::default());
        let cache = ParseCache::new(collector.clone(), Arc::new(EmptyResolver));
        (cache, collector)
    }

    // ── behavior ─────────────────────────────────────────────────

    #[test]
    fn first_parse_always_fires() {
        let (cache, _) = cache_with_collector();
        let uri = Uri::normalize("a.proto");
        // disk handles report -1, still newer than the initial -2
        let handle = StaticHandle::new("/w/a.proto", -1, "message A {}");
        let (file, fresh) = cache.parse(&uri, handle).unwrap();
        assert!(fresh);
        assert_eq!(file.version(), -1);
        assert!(file.ast().is_some());
    }

    #[test]
    fn same_version_is_a_noop() {
        let (cache, _) = cache_with_collector();
        let uri = Uri::normalize("a.proto");
        let handle = StaticHandle::new("/w/a.proto", 1, "message A {}");
        let (_, fresh) = cache.parse(&uri, handle.clone()).unwrap();
        assert!(fresh);
        let (_, fresh) = cache.parse(&uri, handle).unwrap();
        assert!(!fresh);
    }

    #[test]
    fn version_is_monotonic_and_dirty_entries_reparse() {
        let (cache, _) = cache_with_collector();
        let uri = Uri::normalize("a.proto");

        let (file, _) = cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 1, "message A {}"))
            .unwrap();
        assert_eq!(file.version(), 1);

        // an older handle does not roll the version back
        let (file, fresh) = cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 0, "message Old {}"))
            .unwrap();
        assert!(!fresh);
        assert_eq!(file.version(), 1);

        let (file, fresh) = cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 2, "message B {}"))
            .unwrap();
        assert!(fresh);
        assert_eq!(file.version(), 2);
    }

    #[test]
    fn one_entry_per_uri() {
        let (cache, _) = cache_with_collector();
        let uri = Uri::normalize("a.proto");
        let (first, _) = cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 1, "message A {}"))
            .unwrap();
        let (second, _) = cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 2, "message B {}"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn file_moves_between_packages() {
        let (cache, _) = cache_with_collector();
        let uri = Uri::normalize("a.proto");

        cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 1, "package one;"))
            .unwrap();
        assert_eq!(cache.package(&PackageName::new("one")).unwrap().len(), 1);

        cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 2, "package two;"))
            .unwrap();
        assert_eq!(cache.package(&PackageName::new("one")).unwrap().len(), 0);
        assert_eq!(cache.package(&PackageName::new("two")).unwrap().len(), 1);
    }

    #[test]
    fn imports_match_source_order() {
        let (cache, _) = cache_with_collector();
        let uri = Uri::normalize("a.proto");
        let (file, _) = cache
            .parse(
                &uri,
                StaticHandle::new(
                    "/w/a.proto",
                    1,
                    "import \"z.proto\";\nimport \"a.proto\";\nimport \"m.proto\";",
                ),
            )
            .unwrap();
        let imports: Vec<_> = file.imports().iter().map(|u| u.as_str().to_string()).collect();
        assert_eq!(imports, vec!["z.proto", "a.proto", "m.proto"]);
    }

    #[test]
    fn syntax_errors_become_diagnostics_not_failures() {
        let (cache, collector) = cache_with_collector();
        let uri = Uri::normalize("a.proto");
        let (file, fresh) = cache
            .parse(&uri, StaticHandle::new("/w/a.proto", 1, "syntax='proto2;"))
            .unwrap();
        assert!(fresh);
        assert!(file.ast().is_some(), "best-effort AST still commits");
        let diags = collector.diagnostics.lock().unwrap();
        assert!(!diags.is_empty());
        assert!(diags
            .iter()
            .all(|d| d.source.as_deref() == Some(DIAGNOSTIC_SOURCE)));
    }

    #[test]
    fn descriptor_files_stay_silent() {
        let (cache, collector) = cache_with_collector();
        let uri = Uri::normalize("google/protobuf/descriptor.proto");
        let handle = StaticHandle::new(
            "/m/google/protobuf/descriptor.proto",
            1,
            "message Broken {",
        );
        let (file, fresh) = cache.parse(&uri, handle).unwrap();
        assert!(fresh);
        assert!(file.ast().is_some());
        assert!(collector.diagnostics.lock().unwrap().is_empty());
    }

    #[test]
    fn lookup_symbol_serves_compiled_names() {
        struct SelfResolver;
        impl Resolver for SelfResolver {
            fn find_file(&self, path: &str) -> Result<Vec<u8>, ResolveError> {
                if path.ends_with("a.proto") {
                    Ok(b"package pkg;\nmessage A { string s = 1; }".to_vec())
                } else {
                    Err(ResolveError::NotFound(path.to_string()))
                }
            }
        }

        let collector = Arc::new(RecordingCollector::default());
        let cache = ParseCache::new(collector, Arc::new(SelfResolver));
        let uri = Uri::normalize("a.proto");
        let (file, _) = cache
            .parse(
                &uri,
                StaticHandle::new("/w/a.proto", 1, "package pkg;\nmessage A { string s = 1; }"),
            )
            .unwrap();

        assert!(file.lookup_symbol("pkg.A").is_some());
        assert!(file.lookup_symbol("pkg.A.s").is_some());
        assert!(file.lookup_symbol("pkg.Missing").is_none());
    }
}
