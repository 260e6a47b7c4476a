use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use super::{FsError, Handle, ObjectInfo, Source, Uri};

#[derive(Debug)]
struct OverlayState {
    content: Arc<[u8]>,
    version: i32,
}

/// The editor-authoritative content of one open document. The object is
/// shared by identity: `didChange` swaps content and version in place,
/// so anything holding the handle observes fresh bytes behind the same
/// `Arc`.
#[derive(Debug)]
pub struct Overlay {
    uri: Uri,
    root: PathBuf,
    state: RwLock<OverlayState>,
}

impl Overlay {
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub(crate) fn change(&self, content: Arc<[u8]>, version: i32) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.content = content;
        state.version = version;
    }

    /// Path relative to the owning folder's root.
    pub fn path(&self) -> String {
        self.uri.to_relative(&self.root).as_str().to_string()
    }

    fn object_info(&self) -> ObjectInfo {
        ObjectInfo {
            path: self.path(),
            local_path: PathBuf::from(self.uri.filename()),
        }
    }
}

impl Handle for Overlay {
    fn uri(&self) -> Uri {
        self.uri.clone()
    }

    fn version(&self) -> i32 {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.version
    }

    fn content(&self) -> Result<Arc<[u8]>, FsError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.content.clone())
    }

    fn path(&self) -> Option<Uri> {
        Some(Uri::normalize(&self.path()))
    }
}

/// In-memory overlays shadowing a delegate source, scoped to one
/// workspace folder root.
pub struct OverlayFs {
    root: PathBuf,
    delegate: Source,
    overlays: Mutex<HashMap<Uri, Arc<Overlay>>>,
}

impl OverlayFs {
    pub fn new(root: impl Into<PathBuf>, delegate: Source) -> Self {
        OverlayFs {
            root: root.into(),
            delegate,
            overlays: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens or updates the overlay for `uri`. If an overlay already
    /// exists its content and version are replaced in place, preserving
    /// object identity. Document URIs outside the folder root are
    /// rejected so another folder can claim them.
    pub fn open(
        &self,
        uri: &Uri,
        content: Arc<[u8]>,
        version: i32,
    ) -> Result<Arc<Overlay>, FsError> {
        if uri.is_empty() {
            return Err(FsError::EmptyUri);
        }
        if uri.is_document() && !Path::new(&uri.filename()).starts_with(&self.root) {
            return Err(FsError::OutsideRoot {
                uri: uri.clone(),
                root: self.root.clone(),
            });
        }

        let uri = self.check_uri(uri);
        let mut overlays = self.overlays.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = overlays.get(&uri) {
            existing.change(content, version);
            debug!(uri = %uri, version, "overlay changed");
            return Ok(existing.clone());
        }

        let overlay = Arc::new(Overlay {
            uri: uri.clone(),
            root: self.root.clone(),
            state: RwLock::new(OverlayState { content, version }),
        });
        debug!(uri = %uri, version, "overlay opened");
        overlays.insert(uri, overlay.clone());
        Ok(overlay)
    }

    pub fn read_file(&self, uri: &Uri) -> Result<Arc<dyn Handle>, FsError> {
        let uri = self.check_uri(uri);
        {
            let overlays = self.overlays.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(overlay) = overlays.get(&uri) {
                return Ok(overlay.clone() as Arc<dyn Handle>);
            }
        }
        self.delegate.read_file(&uri)
    }

    /// Overlays only; the facade composes stat fallback out of the
    /// multi-source ordering.
    pub fn stat(&self, uri: &Uri) -> Result<ObjectInfo, FsError> {
        let uri = self.check_uri(uri);
        let overlays = self.overlays.lock().unwrap_or_else(|e| e.into_inner());
        match overlays.get(&uri) {
            Some(overlay) => Ok(overlay.object_info()),
            None => Err(FsError::NotExist(uri)),
        }
    }

    pub fn get(&self, uri: &Uri) -> Result<Arc<Overlay>, FsError> {
        if uri.is_empty() {
            return Err(FsError::EmptyUri);
        }
        let uri = self.check_uri(uri);
        let overlays = self.overlays.lock().unwrap_or_else(|e| e.into_inner());
        overlays.get(&uri).cloned().ok_or(FsError::NotExist(uri))
    }

    /// Removes the overlay for `uri`, if any. Never touches the
    /// delegate.
    pub fn close(&self, uri: &Uri) {
        let uri = self.check_uri(uri);
        let mut overlays = self.overlays.lock().unwrap_or_else(|e| e.into_inner());
        if overlays.remove(&uri).is_some() {
            debug!(uri = %uri, "overlay closed");
        }
    }

    /// Snapshot of the current overlays, in no particular order.
    pub fn overlays(&self) -> Vec<Arc<Overlay>> {
        let overlays = self.overlays.lock().unwrap_or_else(|e| e.into_inner());
        overlays.values().cloned().collect()
    }

    /// Relative URIs are anchored at this folder's root.
    fn check_uri(&self, uri: &Uri) -> Uri {
        if uri.is_document() {
            uri.clone()
        } else {
            Uri::normalize(&self.root.join(uri.as_str()).to_string_lossy())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DiskSource;

    fn overlay_fs(root: &Path) -> OverlayFs {
        OverlayFs::new(root, Source::Disk(Arc::new(DiskSource::new())))
    }

    fn bytes(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes().to_vec().into_boxed_slice())
    }

    #[test]
    fn overlay_shadows_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.proto");
        std::fs::write(&path, "A").unwrap();
        let uri = Uri::normalize(&path.to_string_lossy());

        let fs = overlay_fs(dir.path());
        assert_eq!(&*fs.read_file(&uri).unwrap().content().unwrap(), b"A");

        fs.open(&uri, bytes("B"), 1).unwrap();
        assert_eq!(&*fs.read_file(&uri).unwrap().content().unwrap(), b"B");

        fs.close(&uri);
        // falls through to the disk delegate again; the disk source
        // memoized "A" on the first read
        assert_eq!(&*fs.read_file(&uri).unwrap().content().unwrap(), b"A");
    }

    #[test]
    fn change_preserves_object_identity() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::normalize(&dir.path().join("a.proto").to_string_lossy());
        let fs = overlay_fs(dir.path());

        let first = fs.open(&uri, bytes("one"), 1).unwrap();
        let second = fs.open(&uri, bytes("two"), 2).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // the old handle sees the new content and version
        assert_eq!(first.version(), 2);
        assert_eq!(&*first.content().unwrap(), b"two");
    }

    #[test]
    fn rejects_foreign_and_empty_uris() {
        let dir = tempfile::tempdir().unwrap();
        let fs = overlay_fs(dir.path());

        let foreign = Uri::normalize("/elsewhere/a.proto");
        assert!(matches!(
            fs.open(&foreign, bytes(""), 1),
            Err(FsError::OutsideRoot { .. })
        ));
        assert!(matches!(
            fs.open(&Uri::normalize(""), bytes(""), 1),
            Err(FsError::EmptyUri)
        ));
    }

    #[test]
    fn relative_uri_is_anchored_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let fs = overlay_fs(dir.path());

        fs.open(&Uri::normalize("a.proto"), bytes("R"), 1).unwrap();
        let doc = Uri::normalize(&dir.path().join("a.proto").to_string_lossy());
        assert_eq!(&*fs.read_file(&doc).unwrap().content().unwrap(), b"R");

        let info = fs.stat(&doc).unwrap();
        assert_eq!(info.path, "a.proto");
    }

    #[test]
    fn stat_ignores_the_delegate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ondisk.proto");
        std::fs::write(&path, "X").unwrap();
        let uri = Uri::normalize(&path.to_string_lossy());

        let fs = overlay_fs(dir.path());
        assert!(fs.stat(&uri).unwrap_err().is_not_exist());
    }
}
