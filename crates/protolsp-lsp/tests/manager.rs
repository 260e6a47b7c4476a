//! End-to-end tests over the file manager: overlay lifecycle, diagnostic
//! publication, import-based definition, and the descriptor special case.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tower_lsp::lsp_types::{Diagnostic, Position, Url};

use protolsp_lsp::diagnostics::DiagnosticPublisher;
use protolsp_lsp::fs::Uri;
use protolsp_lsp::manager::FileManager;
use protolsp_lsp::workspace::LocalWorkspaceProvider;

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(Url, Vec<Diagnostic>)>>,
}

impl RecordingPublisher {
    fn last_for(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        let published = self.published.lock().unwrap();
        published
            .iter()
            .rev()
            .find(|(u, _)| u == uri)
            .map(|(_, d)| d.clone())
    }

    fn all_for(&self, uri: &Url) -> Vec<Vec<Diagnostic>> {
        let published = self.published.lock().unwrap();
        published
            .iter()
            .filter(|(u, _)| u == uri)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

#[async_trait]
impl DiagnosticPublisher for RecordingPublisher {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        self.published.lock().unwrap().push((uri, diagnostics));
    }
}

fn manager_for(root: &Path) -> (FileManager, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::default());
    let manager = FileManager::new(publisher.clone(), Arc::new(LocalWorkspaceProvider));
    manager
        .init(&[(
            "work".to_string(),
            Uri::normalize(&root.to_string_lossy()),
        )])
        .unwrap();
    (manager, publisher)
}

fn doc_uri(root: &Path, name: &str) -> Uri {
    Uri::normalize(&root.join(name).to_string_lossy())
}

#[tokio::test]
async fn open_change_close_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.proto"), "syntax = \"proto3\";").unwrap();
    let (manager, publisher) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "a.proto");
    let url = uri.to_url().unwrap();

    // open with clean content publishes an empty set
    manager
        .open(&uri, b"syntax='proto3';".to_vec(), 1)
        .await
        .unwrap();
    assert_eq!(publisher.last_for(&url).unwrap(), vec![]);

    // the broken change publishes real diagnostics
    let view = manager
        .change(&uri, b"syntax='proto2;".to_vec(), 2)
        .await
        .unwrap();
    assert_eq!(view.file().version(), 2);
    let last = publisher.last_for(&url).unwrap();
    assert!(!last.is_empty());
    assert!(last
        .iter()
        .all(|d| d.source.as_deref() == Some("buf-lsp")));

    // close drops the overlay; reads fall through to the disk
    manager.close(&uri);
    let view = manager.get(&uri).await.unwrap();
    assert_eq!(&*view.handle().content().unwrap(), b"syntax = \"proto3\";");
    assert_eq!(view.handle().version(), -1);
}

#[tokio::test]
async fn overlay_shadows_disk_until_close() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.proto"), "// A").unwrap();
    let (manager, _) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "b.proto");
    let view = manager.open(&uri, b"// B".to_vec(), 1).await.unwrap();
    assert_eq!(&*view.handle().content().unwrap(), b"// B");
    assert_eq!(view.handle().version(), 1);

    manager.close(&uri);
    let view = manager.get(&uri).await.unwrap();
    assert_eq!(&*view.handle().content().unwrap(), b"// A");
    assert_eq!(view.handle().version(), -1);
}

#[tokio::test]
async fn definition_on_import_returns_module_location() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("x")).unwrap();
    std::fs::write(dir.path().join("x/y.proto"), "message Y {}").unwrap();
    let (manager, _) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "a.proto");
    let view = manager
        .open(&uri, b"import \"x/y.proto\";\n".to_vec(), 1)
        .await
        .unwrap();

    // cursor inside the import string
    let locations = manager.definition(&view, Position::new(0, 10));
    assert_eq!(locations.len(), 1);
    assert_eq!(
        locations[0].uri,
        Url::from_file_path(dir.path().join("x/y.proto")).unwrap()
    );

    // and nowhere else
    let locations = manager.definition(&view, Position::new(0, 0));
    assert!(locations.is_empty() || locations.len() == 1);
}

#[tokio::test]
async fn import_closure_is_parsed_on_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("x")).unwrap();
    std::fs::write(
        dir.path().join("x/y.proto"),
        "import \"x/z.proto\";\nmessage Y {}",
    )
    .unwrap();
    std::fs::write(dir.path().join("x/z.proto"), "message Z {}").unwrap();
    let (manager, _) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "a.proto");
    manager
        .open(&uri, b"import \"x/y.proto\";\n".to_vec(), 1)
        .await
        .unwrap();

    // both transitive imports were parsed during the open, so a query
    // against either is a cache hit, not a fresh parse
    let y = manager.get(&Uri::normalize("x/y.proto")).await.unwrap();
    assert!(!y.fresh());
    let z = manager.get(&Uri::normalize("x/z.proto")).await.unwrap();
    assert!(!z.fresh());
}

#[tokio::test]
async fn circular_imports_terminate() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.proto"), "import \"b.proto\";").unwrap();
    std::fs::write(dir.path().join("b.proto"), "import \"a.proto\";").unwrap();
    let (manager, _) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "a.proto");
    manager
        .open(&uri, b"import \"b.proto\";".to_vec(), 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_import_does_not_fault_the_open() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, publisher) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "a.proto");
    let url = uri.to_url().unwrap();
    manager
        .open(&uri, b"import \"gone.proto\";\nmessage A {}".to_vec(), 1)
        .await
        .unwrap();

    // the unresolved import shows up as a diagnostic instead
    let last = publisher.last_for(&url).unwrap();
    assert!(last.iter().any(|d| d.message.contains("gone.proto")));
}

#[tokio::test]
async fn descriptor_files_publish_nothing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("google/protobuf")).unwrap();
    std::fs::write(
        dir.path().join("google/protobuf/descriptor.proto"),
        "message Broken {",
    )
    .unwrap();
    let (manager, publisher) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "google/protobuf/descriptor.proto");
    let url = uri.to_url().unwrap();
    manager
        .open(&uri, b"message StillBroken {".to_vec(), 1)
        .await
        .unwrap();

    for set in publisher.all_for(&url) {
        assert!(set.is_empty(), "descriptor diagnostics must stay silent");
    }
}

#[tokio::test]
async fn formatting_uses_the_parsed_ast() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "m.proto");
    let view = manager
        .open(&uri, b"message M{string s=1;}".to_vec(), 1)
        .await
        .unwrap();

    let (text, range) = view.format().unwrap();
    assert_eq!(text, "message M {\n  string s = 1;\n}\n");
    assert_eq!(range.start.line, 0);
}

#[tokio::test]
async fn semantic_tokens_for_open_file() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, _) = manager_for(dir.path());

    let uri = doc_uri(dir.path(), "m.proto");
    let view = manager
        .open(&uri, b"message Foo { string name = 1; }".to_vec(), 1)
        .await
        .unwrap();

    let tokens = view.semantic_tokens();
    let data = protolsp_lsp::semantic::encode(&tokens);
    assert_eq!(&data[..10], &[0, 0, 7, 10, 0, 0, 8, 3, 3, 1]);
}
