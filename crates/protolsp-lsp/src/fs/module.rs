use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::workspace::{FileInfo, FileType, Module};

use super::{FsError, Handle, ObjectInfo, Uri};

struct ModuleFile {
    uri: Uri,
    info: FileInfo,
    content: Result<Arc<[u8]>, FsError>,
}

impl ModuleFile {
    fn rel_uri(&self) -> Uri {
        Uri::normalize(&self.info.path)
    }

    fn object_info(&self) -> ObjectInfo {
        ObjectInfo {
            path: self.info.path.clone(),
            local_path: self.info.local_path.clone(),
        }
    }
}

impl Handle for ModuleFile {
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
        Some(self.rel_uri())
    }
}

#[derive(Default)]
struct ModuleCaches {
    by_uri: HashMap<Uri, Arc<ModuleFile>>,
    by_rel: HashMap<Uri, Arc<ModuleFile>>,
}

/// Read-through cache over one module's file set. Entries are reachable
/// both by document URI and by module-relative URI; only proto files
/// participate in resolution.
pub struct ModuleSource {
    module: Arc<dyn Module>,
    caches: Mutex<ModuleCaches>,
}

impl ModuleSource {
    pub fn new(module: Arc<dyn Module>) -> Self {
        ModuleSource {
            module,
            caches: Mutex::new(ModuleCaches::default()),
        }
    }

    fn try_local(&self, uri: &Uri) -> Option<Arc<ModuleFile>> {
        let caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        caches
            .by_uri
            .get(uri)
            .or_else(|| caches.by_rel.get(uri))
            .cloned()
    }

    pub fn read_file(&self, uri: &Uri) -> Result<Arc<dyn Handle>, FsError> {
        if let Some(file) = self.try_local(uri) {
            return Ok(file as Arc<dyn Handle>);
        }

        let info = self.internal_stat(uri)?;
        let content = self
            .module
            .get_file(&info.path)
            .map(|bytes| Arc::from(bytes.into_boxed_slice()))
            .map_err(|err| FsError::Read {
                uri: uri.clone(),
                message: err.to_string(),
            });

        debug!(uri = %uri, path = %info.path, ok = content.is_ok(), "module read");

        let file = Arc::new(ModuleFile {
            uri: Uri::normalize(&info.local_path.to_string_lossy()),
            info,
            content,
        });

        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        caches.by_uri.insert(file.uri.clone(), file.clone());
        caches.by_rel.insert(file.rel_uri(), file.clone());
        Ok(file)
    }

    pub fn stat(&self, uri: &Uri) -> Result<ObjectInfo, FsError> {
        if let Some(file) = self.try_local(uri) {
            return Ok(file.object_info());
        }
        let info = self.internal_stat(uri)?;
        Ok(ObjectInfo {
            path: info.path.clone(),
            local_path: info.local_path,
        })
    }

    pub fn close(&self, uri: &Uri) {
        if let Some(file) = self.try_local(uri) {
            let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
            caches.by_uri.remove(&file.uri);
            caches.by_rel.remove(&file.rel_uri());
        }
    }

    /// Resolves a URI against the module's walk: document URIs match on
    /// the local path, relative URIs on the module path, both
    /// case-insensitively. The last match of the walk wins.
    fn internal_stat(&self, uri: &Uri) -> Result<FileInfo, FsError> {
        let uri = Uri::normalize(uri.as_str());
        let is_doc = uri.is_document();
        let filename = uri.filename();

        let mut found: Option<FileInfo> = None;
        let walked = self.module.walk_file_infos(&mut |info| {
            if info.file_type != FileType::Proto {
                return;
            }
            let candidate = if is_doc {
                info.local_path.to_string_lossy().into_owned()
            } else {
                info.path.clone()
            };
            if candidate.eq_ignore_ascii_case(&filename) {
                found = Some(info.clone());
            }
        });
        if let Err(err) = walked {
            return Err(FsError::Read {
                uri: uri.clone(),
                message: format!("module walk: {err}"),
            });
        }

        found.ok_or(FsError::NotExist(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    struct FakeModule {
        files: Vec<(FileInfo, &'static str)>,
    }

    impl Module for FakeModule {
        fn walk_file_infos(&self, visit: &mut dyn FnMut(&FileInfo)) -> io::Result<()> {
            for (info, _) in &self.files {
                visit(info);
            }
            Ok(())
        }

        fn get_file(&self, path: &str) -> io::Result<Vec<u8>> {
            self.files
                .iter()
                .find(|(info, _)| info.path == path)
                .map(|(_, contents)| contents.as_bytes().to_vec())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }
    }

    fn module() -> Arc<dyn Module> {
        Arc::new(FakeModule {
            files: vec![
                (
                    FileInfo {
                        path: "x/y.proto".to_string(),
                        local_path: PathBuf::from("/mods/x/y.proto"),
                        file_type: FileType::Proto,
                    },
                    "message Y {}",
                ),
                (
                    FileInfo {
                        path: "README.md".to_string(),
                        local_path: PathBuf::from("/mods/README.md"),
                        file_type: FileType::Other,
                    },
                    "readme",
                ),
            ],
        })
    }

    #[test]
    fn resolves_by_relative_uri() {
        let source = ModuleSource::new(module());
        let handle = source.read_file(&Uri::normalize("x/y.proto")).unwrap();
        assert_eq!(&*handle.content().unwrap(), b"message Y {}");
        assert_eq!(handle.version(), -1);
        assert_eq!(handle.uri().as_str(), "file:///mods/x/y.proto");
    }

    #[test]
    fn resolves_by_document_uri_case_insensitively() {
        let source = ModuleSource::new(module());
        let handle = source
            .read_file(&Uri::normalize("/mods/X/Y.proto"))
            .unwrap();
        assert_eq!(&*handle.content().unwrap(), b"message Y {}");
    }

    #[test]
    fn non_proto_files_do_not_resolve() {
        let source = ModuleSource::new(module());
        assert!(source
            .read_file(&Uri::normalize("README.md"))
            .unwrap_err()
            .is_not_exist());
    }

    #[test]
    fn stat_matches_read_and_close_evicts() {
        let source = ModuleSource::new(module());
        let info = source.stat(&Uri::normalize("x/y.proto")).unwrap();
        assert_eq!(info.path, "x/y.proto");
        assert_eq!(info.local_path, PathBuf::from("/mods/x/y.proto"));

        // cached entry answers by either key after a read
        source.read_file(&Uri::normalize("x/y.proto")).unwrap();
        assert!(source.try_local(&Uri::normalize("/mods/x/y.proto")).is_some());

        source.close(&Uri::normalize("x/y.proto"));
        assert!(source.try_local(&Uri::normalize("x/y.proto")).is_none());
        assert!(source.try_local(&Uri::normalize("/mods/x/y.proto")).is_none());
    }
}
