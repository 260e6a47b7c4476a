use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::bucket::{root_bucket, Bucket};
use super::{FsError, Handle, InvalidUriReason, ObjectInfo, Uri};

struct DiskFile {
    uri: Uri,
    object_info: ObjectInfo,
    content: Result<Arc<[u8]>, FsError>,
}

impl Handle for DiskFile {
    fn uri(&self) -> Uri {
        self.uri.clone()
    }

    fn version(&self) -> i32 {
        -1
    }

    fn content(&self) -> Result<Arc<[u8]>, FsError> {
        self.content.clone()
    }

    fn path(&self) -> Option<Uri> {
        Some(Uri::normalize(&self.object_info.path))
    }
}

/// Read-through cache over the local disk, keyed by document URI.
/// Reads are memoized (errors included) until [`close`] evicts the
/// entry; the overlay layer above compensates for staleness while the
/// editor holds a file open.
///
/// [`close`]: DiskSource::close
pub struct DiskSource {
    bucket: &'static Bucket,
    files: Mutex<HashMap<Uri, Arc<DiskFile>>>,
}

impl Default for DiskSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskSource {
    pub fn new() -> Self {
        DiskSource {
            bucket: root_bucket(),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn read_file(&self, uri: &Uri) -> Result<Arc<dyn Handle>, FsError> {
        if !uri.is_document() {
            return Err(FsError::InvalidUri {
                uri: uri.clone(),
                reason: InvalidUriReason::OnlyAcceptDocumentUri,
            });
        }

        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = files.get(uri) {
            return Ok(file.clone() as Arc<dyn Handle>);
        }

        let path = PathBuf::from(uri.filename());
        let object_info = self
            .bucket
            .stat(&path)
            .map_err(|_| FsError::NotExist(uri.clone()))?;

        let content = self
            .bucket
            .read(&path)
            .map(|bytes| Arc::from(bytes.into_boxed_slice()))
            .map_err(|err| FsError::Read {
                uri: uri.clone(),
                message: err.to_string(),
            });

        debug!(uri = %uri, ok = content.is_ok(), "disk read");

        // read failures are memoized too; Close is the only way out
        let file = Arc::new(DiskFile {
            uri: uri.clone(),
            object_info,
            content,
        });
        files.insert(uri.clone(), file.clone());
        Ok(file)
    }

    pub fn stat(&self, uri: &Uri) -> Result<ObjectInfo, FsError> {
        if !uri.is_document() {
            return Err(FsError::InvalidUri {
                uri: uri.clone(),
                reason: InvalidUriReason::OnlyAcceptDocumentUri,
            });
        }

        {
            let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(file) = files.get(uri) {
                return Ok(file.object_info.clone());
            }
        }

        // a bare stat does not populate the cache
        self.bucket
            .stat(&PathBuf::from(uri.filename()))
            .map_err(|_| FsError::NotExist(uri.clone()))
    }

    pub fn close(&self, uri: &Uri) {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.remove(uri);
    }

    #[cfg(test)]
    fn cached_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> Uri {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        Uri::normalize(&path.to_string_lossy())
    }

    #[test]
    fn relative_uri_is_invalid() {
        let source = DiskSource::new();
        let err = source.read_file(&Uri::normalize("x/y.proto")).unwrap_err();
        assert!(matches!(
            err,
            FsError::InvalidUri {
                reason: InvalidUriReason::OnlyAcceptDocumentUri,
                ..
            }
        ));
    }

    #[test]
    fn read_returns_contents_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_file(dir.path(), "a.proto", "syntax = \"proto3\";");
        let source = DiskSource::new();

        let handle = source.read_file(&uri).unwrap();
        assert_eq!(handle.version(), -1);
        assert_eq!(&*handle.content().unwrap(), b"syntax = \"proto3\";");
    }

    #[test]
    fn reads_are_memoized_until_close() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_file(dir.path(), "a.proto", "old");
        let source = DiskSource::new();

        assert_eq!(&*source.read_file(&uri).unwrap().content().unwrap(), b"old");
        write_file(dir.path(), "a.proto", "new");
        // still the memoized copy
        assert_eq!(&*source.read_file(&uri).unwrap().content().unwrap(), b"old");

        source.close(&uri);
        assert_eq!(&*source.read_file(&uri).unwrap().content().unwrap(), b"new");
    }

    #[test]
    fn missing_file_is_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::normalize(&dir.path().join("gone.proto").to_string_lossy());
        let source = DiskSource::new();
        assert!(source.read_file(&uri).unwrap_err().is_not_exist());
        assert!(source.stat(&uri).unwrap_err().is_not_exist());
    }

    #[test]
    fn stat_does_not_populate_cache() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write_file(dir.path(), "a.proto", "x");
        let source = DiskSource::new();

        let info = source.stat(&uri).unwrap();
        assert!(info.local_path.ends_with("a.proto"));
        assert_eq!(source.cached_count(), 0);

        source.read_file(&uri).unwrap();
        assert_eq!(source.cached_count(), 1);
    }
}
