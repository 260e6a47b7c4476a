use std::sync::Arc;

use super::{FsError, Handle, ObjectInfo, Source, Uri};

/// An ordered composition of sources with first-hit semantics. Nested
/// multi-sources are flattened at construction, so the ordering of the
/// leaves is the whole story: overlays first means overlays win.
pub struct MultiSource {
    sources: Vec<Source>,
}

impl MultiSource {
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        let mut flat = Vec::new();
        for source in sources {
            match source {
                Source::Multi(multi) => flat.extend(multi.sources.iter().cloned()),
                other => flat.push(other),
            }
        }
        MultiSource { sources: flat }
    }

    pub fn into_source(self) -> Source {
        Source::Multi(Arc::new(self))
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn read_file(&self, uri: &Uri) -> Result<Arc<dyn Handle>, FsError> {
        for source in &self.sources {
            if let Ok(handle) = source.read_file(uri) {
                return Ok(handle);
            }
        }
        Err(FsError::NotExist(uri.clone()))
    }

    pub fn stat(&self, uri: &Uri) -> Result<ObjectInfo, FsError> {
        for source in &self.sources {
            if let Ok(info) = source.stat(uri) {
                return Ok(info);
            }
        }
        Err(FsError::NotExist(uri.clone()))
    }

    pub fn close(&self, uri: &Uri) {
        for source in &self.sources {
            source.close(uri);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{DiskSource, OverlayFs};

    fn bytes(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes().to_vec().into_boxed_slice())
    }

    #[test]
    fn first_hit_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.proto");
        std::fs::write(&path, "disk").unwrap();
        let uri = Uri::normalize(&path.to_string_lossy());

        let disk = Arc::new(DiskSource::new());
        let shadow = Arc::new(OverlayFs::new(
            dir.path(),
            Source::Disk(Arc::new(DiskSource::new())),
        ));
        shadow.open(&uri, bytes("overlay"), 1).unwrap();

        let multi = MultiSource::new([
            Source::Overlay(shadow.clone()),
            Source::Disk(disk.clone()),
        ]);
        assert_eq!(&*multi.read_file(&uri).unwrap().content().unwrap(), b"overlay");

        shadow.close(&uri);
        assert_eq!(&*multi.read_file(&uri).unwrap().content().unwrap(), b"disk");
    }

    #[test]
    fn nested_multis_flatten() {
        let inner = MultiSource::new([
            Source::Disk(Arc::new(DiskSource::new())),
            Source::Disk(Arc::new(DiskSource::new())),
        ]);
        let outer = MultiSource::new([
            inner.into_source(),
            Source::Disk(Arc::new(DiskSource::new())),
        ]);
        assert_eq!(outer.sources().len(), 3);
        assert!(outer
            .sources()
            .iter()
            .all(|s| matches!(s, Source::Disk(_))));
    }

    #[test]
    fn miss_everywhere_is_not_exist() {
        let multi = MultiSource::new([Source::Disk(Arc::new(DiskSource::new()))]);
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::normalize(&dir.path().join("gone.proto").to_string_lossy());
        assert!(multi.read_file(&uri).unwrap_err().is_not_exist());
        assert!(multi.stat(&uri).unwrap_err().is_not_exist());
    }
}
