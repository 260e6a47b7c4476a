use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::debug;

use protolsp_parser::{ResolveError, Resolver};

use crate::workspace::WorkspaceProvider;

use super::{
    DiskSource, FsError, ModuleSource, MultiSource, ObjectInfo, Overlay, OverlayFs, Source, Uri,
};

/// One workspace folder: its overlay layer over the disk, plus the
/// module sources the workspace provider found for it.
pub struct Folder {
    pub name: String,
    pub uri: Uri,
    overlay_fs: Arc<OverlayFs>,
    modules_source: Source,
}

impl Folder {
    /// The folder's effective source: overlays shadow modules shadow
    /// disk (the disk sits under the overlay layer as its delegate).
    pub fn source(&self) -> Source {
        MultiSource::new([
            Source::Overlay(self.overlay_fs.clone()),
            self.modules_source.clone(),
        ])
        .into_source()
    }

    pub fn overlay_fs(&self) -> &Arc<OverlayFs> {
        &self.overlay_fs
    }

    fn locations(&self, uri: &Uri, out: &mut Vec<ObjectInfo>) {
        source_locations(&Source::Overlay(self.overlay_fs.clone()), uri, out);
        source_locations(&self.modules_source, uri, out);
    }
}

/// Aggregates every folder's layered source behind one surface and
/// answers location queries for go-to-definition.
pub struct Filesystem {
    provider: Arc<dyn WorkspaceProvider>,
    folders: RwLock<Vec<Arc<Folder>>>,
}

impl Filesystem {
    pub fn new(provider: Arc<dyn WorkspaceProvider>) -> Self {
        Filesystem {
            provider,
            folders: RwLock::new(Vec::new()),
        }
    }

    /// Builds one [`Folder`] per workspace folder. `folders` pairs each
    /// folder name with its root URI.
    pub fn init(&self, folders: &[(String, Uri)]) -> Result<(), FsError> {
        let mut built = Vec::new();
        for (name, uri) in folders {
            let root = PathBuf::from(uri.filename());
            let workspace =
                self.provider
                    .workspace_for(&root)
                    .map_err(|err| FsError::Workspace {
                        folder: name.clone(),
                        message: err.to_string(),
                    })?;

            let modules: Vec<Source> = workspace
                .modules()
                .into_iter()
                .map(|module| Source::Module(Arc::new(ModuleSource::new(module))))
                .collect();
            debug!(folder = %name, root = %root.display(), modules = modules.len(), "folder ready");

            built.push(Arc::new(Folder {
                name: name.clone(),
                uri: uri.clone(),
                overlay_fs: Arc::new(OverlayFs::new(root, Source::Disk(Arc::new(DiskSource::new())))),
                modules_source: MultiSource::new(modules).into_source(),
            }));
        }

        let mut current = self.folders.write().unwrap_or_else(|e| e.into_inner());
        *current = built;
        Ok(())
    }

    pub fn folders(&self) -> Vec<Arc<Folder>> {
        let folders = self.folders.read().unwrap_or_else(|e| e.into_inner());
        folders.clone()
    }

    /// The flattened view over every folder's layered source.
    pub fn source(&self) -> Source {
        MultiSource::new(self.folders().iter().map(|f| f.source())).into_source()
    }

    /// Offers the overlay to each folder; the first whose root contains
    /// the document wins.
    pub fn open(
        &self,
        uri: &Uri,
        content: Arc<[u8]>,
        version: i32,
    ) -> Result<Arc<Overlay>, FsError> {
        for folder in self.folders() {
            match folder.overlay_fs.open(uri, content.clone(), version) {
                Ok(overlay) => {
                    debug!(folder = %folder.name, uri = %uri, version, "overlay accepted");
                    return Ok(overlay);
                }
                Err(err) => {
                    debug!(folder = %folder.name, uri = %uri, error = %err, "overlay rejected");
                }
            }
        }
        Err(FsError::NotExist(uri.clone()))
    }

    /// Every place `uri` resolves to across the folders' sources, in
    /// folder order.
    pub fn location(&self, uri: &Uri) -> Vec<ObjectInfo> {
        let mut out = Vec::new();
        for folder in self.folders() {
            folder.locations(uri, &mut out);
        }
        out
    }
}

/// Walks a source tree, collecting a location from every leaf that can
/// stat the URI.
fn source_locations(source: &Source, uri: &Uri, out: &mut Vec<ObjectInfo>) {
    match source {
        Source::Multi(multi) => {
            for inner in multi.sources() {
                source_locations(inner, uri, out);
            }
        }
        leaf => {
            if let Ok(info) = leaf.stat(uri) {
                out.push(info);
            }
        }
    }
}

/// Lets the compiler read import paths through the facade, so overlays
/// shadow disk and module content during compilation too.
pub struct FsResolver {
    fs: Arc<Filesystem>,
}

impl FsResolver {
    pub fn new(fs: Arc<Filesystem>) -> Self {
        FsResolver { fs }
    }
}

impl Resolver for FsResolver {
    fn find_file(&self, path: &str) -> Result<Vec<u8>, ResolveError> {
        let uri = Uri::normalize(path);
        let handle = self.fs.source().read_file(&uri).map_err(|err| {
            if err.is_not_exist() {
                ResolveError::NotFound(path.to_string())
            } else {
                ResolveError::Read {
                    path: path.to_string(),
                    message: err.to_string(),
                }
            }
        })?;
        let content = handle.content().map_err(|err| ResolveError::Read {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        Ok(content.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::LocalWorkspaceProvider;

    fn bytes(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes().to_vec().into_boxed_slice())
    }

    fn filesystem(roots: &[&std::path::Path]) -> Filesystem {
        let fs = Filesystem::new(Arc::new(LocalWorkspaceProvider));
        let folders: Vec<(String, Uri)> = roots
            .iter()
            .enumerate()
            .map(|(i, root)| {
                (
                    format!("folder{i}"),
                    Uri::normalize(&root.to_string_lossy()),
                )
            })
            .collect();
        fs.init(&folders).unwrap();
        fs
    }

    #[test]
    fn open_picks_the_owning_folder() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let fs = filesystem(&[a.path(), b.path()]);

        let uri = Uri::normalize(&b.path().join("x.proto").to_string_lossy());
        fs.open(&uri, bytes("X"), 1).unwrap();

        let folders = fs.folders();
        assert!(folders[0].overlay_fs().get(&uri).is_err());
        assert!(folders[1].overlay_fs().get(&uri).is_ok());

        // and the facade-wide source sees it
        assert_eq!(&*fs.source().read_file(&uri).unwrap().content().unwrap(), b"X");
    }

    #[test]
    fn open_with_no_matching_folder_is_not_exist() {
        let a = tempfile::tempdir().unwrap();
        let fs = filesystem(&[a.path()]);
        let foreign = Uri::normalize("/elsewhere/x.proto");
        assert!(fs.open(&foreign, bytes(""), 1).unwrap_err().is_not_exist());
    }

    #[test]
    fn location_finds_module_files() {
        let a = tempfile::tempdir().unwrap();
        std::fs::create_dir(a.path().join("x")).unwrap();
        std::fs::write(a.path().join("x/y.proto"), "message Y {}").unwrap();
        let fs = filesystem(&[a.path()]);

        let locations = fs.location(&Uri::normalize("x/y.proto"));
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].local_path, a.path().join("x/y.proto"));
    }

    #[test]
    fn resolver_reads_through_overlays() {
        let a = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join("m.proto"), "message Disk {}").unwrap();
        let fs = Arc::new(filesystem(&[a.path()]));

        let uri = Uri::normalize(&a.path().join("m.proto").to_string_lossy());
        fs.open(&uri, bytes("message Overlay {}"), 1).unwrap();

        let resolver = FsResolver::new(fs);
        let found = resolver.find_file("m.proto").unwrap();
        assert_eq!(found, b"message Overlay {}");
    }
}
