use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a module knows about one of its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Module-relative path, forward slashes.
    pub path: String,
    /// Absolute path on the local machine.
    pub local_path: PathBuf,
    pub file_type: FileType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Proto,
    Other,
}

/// One logical module of proto files. The language server only consumes
/// this surface; where the files actually come from is the workspace
/// provider's business.
pub trait Module: Send + Sync {
    fn walk_file_infos(&self, visit: &mut dyn FnMut(&FileInfo)) -> io::Result<()>;

    fn get_file(&self, path: &str) -> io::Result<Vec<u8>>;
}

pub trait Workspace: Send + Sync {
    fn modules(&self) -> Vec<Arc<dyn Module>>;
}

/// Resolves the workspace for a folder root.
pub trait WorkspaceProvider: Send + Sync {
    fn workspace_for(&self, root: &Path) -> io::Result<Arc<dyn Workspace>>;
}

// ── local directory workspace ────────────────────────────────────

/// Default provider: one module per folder, backed by the folder's own
/// directory tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalWorkspaceProvider;

impl WorkspaceProvider for LocalWorkspaceProvider {
    fn workspace_for(&self, root: &Path) -> io::Result<Arc<dyn Workspace>> {
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a directory: {}", root.display()),
            ));
        }
        Ok(Arc::new(LocalWorkspace {
            root: root.to_path_buf(),
        }))
    }
}

struct LocalWorkspace {
    root: PathBuf,
}

impl Workspace for LocalWorkspace {
    fn modules(&self) -> Vec<Arc<dyn Module>> {
        vec![Arc::new(LocalModule {
            root: self.root.clone(),
        })]
    }
}

struct LocalModule {
    root: PathBuf,
}

impl Module for LocalModule {
    fn walk_file_infos(&self, visit: &mut dyn FnMut(&FileInfo)) -> io::Result<()> {
        walk_dir(&self.root, &self.root, visit)
    }

    fn get_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(path))
    }
}

fn walk_dir(
    root: &Path,
    dir: &Path,
    visit: &mut dyn FnMut(&FileInfo),
) -> io::Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            walk_dir(root, &path, visit)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let file_type = match path.extension().and_then(|e| e.to_str()) {
                Some("proto") => FileType::Proto,
                _ => FileType::Other,
            };
            visit(&FileInfo {
                path: rel,
                local_path: path,
                file_type,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn local_module_walks_proto_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("x")).unwrap();
        for (name, contents) in [("a.proto", "A"), ("x/y.proto", "Y"), ("note.txt", "n")] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            f.write_all(contents.as_bytes()).unwrap();
        }

        let workspace = LocalWorkspaceProvider.workspace_for(dir.path()).unwrap();
        let modules = workspace.modules();
        assert_eq!(modules.len(), 1);

        let mut seen = Vec::new();
        modules[0]
            .walk_file_infos(&mut |info| seen.push((info.path.clone(), info.file_type)))
            .unwrap();
        assert!(seen.contains(&("a.proto".to_string(), FileType::Proto)));
        assert!(seen.contains(&("x/y.proto".to_string(), FileType::Proto)));
        assert!(seen.contains(&("note.txt".to_string(), FileType::Other)));

        assert_eq!(modules[0].get_file("x/y.proto").unwrap(), b"Y");
    }

    #[test]
    fn provider_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(LocalWorkspaceProvider.workspace_for(&missing).is_err());
    }
}
