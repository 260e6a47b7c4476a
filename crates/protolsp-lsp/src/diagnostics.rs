use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tower_lsp::Client;
use tracing::{debug, warn};

use crate::cache::DiagnosticCollector;
use crate::fs::{Handle, Uri};

/// Where `publishDiagnostics` notifications go. The real implementation
/// wraps the tower-lsp client; tests record instead.
#[async_trait]
pub trait DiagnosticPublisher: Send + Sync {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>);
}

pub struct ClientPublisher(pub Client);

#[async_trait]
impl DiagnosticPublisher for ClientPublisher {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.0.publish_diagnostics(uri, diagnostics, None).await;
    }
}

type RangeKey = (u32, u32, u32, u32);

fn range_key(diagnostic: &Diagnostic) -> RangeKey {
    (
        diagnostic.range.start.line,
        diagnostic.range.start.character,
        diagnostic.range.end.line,
        diagnostic.range.end.character,
    )
}

/// Per-URI diagnostic buffer. Pushed sets replace each other wholesale
/// on the client, so each parse resets, refills, and notifies; within a
/// set, the inner map collapses diagnostics at identical ranges (last
/// write wins).
pub struct DiagnosticSink {
    publisher: Arc<dyn DiagnosticPublisher>,
    cache: Mutex<HashMap<Uri, HashMap<RangeKey, Diagnostic>>>,
}

impl DiagnosticSink {
    pub fn new(publisher: Arc<dyn DiagnosticPublisher>) -> Self {
        DiagnosticSink {
            publisher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes the current set for the handle's URI, possibly empty;
    /// an empty set clears the client's display.
    pub async fn notify(&self, handle: &dyn Handle) {
        let uri = handle.uri();
        let diagnostics: Vec<Diagnostic> = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache
                .get(&uri)
                .map(|set| set.values().cloned().collect())
                .unwrap_or_default()
        };

        debug!(uri = %uri, count = diagnostics.len(), "notify diagnostics");

        let Some(url) = uri.to_url() else {
            warn!(uri = %uri, "client publish diagnostics: URI is not a URL");
            return;
        };
        self.publisher.publish(url, diagnostics).await;
    }
}

impl DiagnosticCollector for DiagnosticSink {
    fn reset(&self, handle: &dyn Handle) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.remove(&handle.uri());
    }

    fn add_diagnostics(&self, handle: &dyn Handle, diagnostics: Vec<Diagnostic>) {
        debug!(uri = %handle.uri(), count = diagnostics.len(), "add diagnostics");
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let set = cache.entry(handle.uri()).or_default();
        for diagnostic in diagnostics {
            set.insert(range_key(&diagnostic), diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use tower_lsp::lsp_types::{Position, Range};

    use crate::fs::FsError;

    struct TestHandle(Uri);

    impl Handle for TestHandle {
        fn uri(&self) -> Uri {
            self.0.clone()
        }

        fn version(&self) -> i32 {
            1
        }

        fn content(&self) -> Result<Arc<[u8]>, FsError> {
            Ok(Arc::from(Vec::new().into_boxed_slice()))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: StdMutex<Vec<(Url, Vec<Diagnostic>)>>,
    }

    #[async_trait]
    impl DiagnosticPublisher for RecordingPublisher {
        async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
            self.published.lock().unwrap().push((uri, diagnostics));
        }
    }

    fn diagnostic(line: u32, message: &str) -> Diagnostic {
        Diagnostic {
            range: Range {
                start: Position { line, character: 0 },
                end: Position { line, character: 5 },
            },
            message: message.to_string(),
            ..Default::default()
        }
    }

    fn sink() -> (DiagnosticSink, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        (DiagnosticSink::new(publisher.clone()), publisher)
    }

    #[tokio::test]
    async fn reset_add_notify_replaces_the_set() {
        let (sink, publisher) = sink();
        let handle = TestHandle(Uri::normalize("/w/a.proto"));

        sink.reset(&handle);
        sink.add_diagnostics(&handle, vec![diagnostic(1, "first")]);
        sink.notify(&handle).await;

        sink.reset(&handle);
        sink.add_diagnostics(&handle, vec![diagnostic(2, "second")]);
        sink.notify(&handle).await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].1.len(), 1);
        assert_eq!(published[1].1[0].message, "second");
    }

    #[tokio::test]
    async fn empty_set_still_publishes() {
        let (sink, publisher) = sink();
        let handle = TestHandle(Uri::normalize("/w/a.proto"));

        sink.reset(&handle);
        sink.notify(&handle).await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert!(published[0].1.is_empty());
    }

    #[tokio::test]
    async fn identical_ranges_dedupe_last_write_wins() {
        let (sink, publisher) = sink();
        let handle = TestHandle(Uri::normalize("/w/a.proto"));

        sink.add_diagnostics(&handle, vec![diagnostic(3, "old"), diagnostic(3, "new")]);
        sink.notify(&handle).await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].1.len(), 1);
        assert_eq!(published[0].1[0].message, "new");
    }

    #[tokio::test]
    async fn uris_are_isolated() {
        let (sink, publisher) = sink();
        let a = TestHandle(Uri::normalize("/w/a.proto"));
        let b = TestHandle(Uri::normalize("/w/b.proto"));

        sink.add_diagnostics(&a, vec![diagnostic(1, "a")]);
        sink.add_diagnostics(&b, vec![diagnostic(1, "b")]);
        sink.reset(&a);
        sink.notify(&b).await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].1[0].message, "b");
    }
}
