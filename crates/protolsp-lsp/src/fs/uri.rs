use std::fmt;
use std::path::{Component, Path, PathBuf};

use tower_lsp::lsp_types::Url;

/// A normalized URI in one of two canonical forms: a *document URI*
/// (`file://` scheme over an absolute path) or a *relative URI* (a
/// module-relative path with no scheme). Equality and hashing work on
/// the normalized string, so either form is a stable map key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri(String);

impl Uri {
    /// Canonicalizes `s`: `file://` strings are re-encoded through the
    /// URL parser, absolute filesystem paths gain the file scheme, and
    /// anything else is kept as a relative URI. Idempotent.
    pub fn normalize(s: &str) -> Uri {
        if s.starts_with("file://") {
            if let Ok(url) = Url::parse(s) {
                if let Ok(path) = url.to_file_path() {
                    if let Ok(url) = Url::from_file_path(&path) {
                        return Uri(url.to_string());
                    }
                }
            }
            Uri(s.to_string())
        } else if Path::new(s).is_absolute() {
            match Url::from_file_path(s) {
                Ok(url) => Uri(url.to_string()),
                Err(_) => Uri(s.to_string()),
            }
        } else {
            Uri(s.to_string())
        }
    }

    pub fn from_url(url: &Url) -> Uri {
        Uri::normalize(url.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The local filesystem path for a document URI, or the raw string
    /// for a relative URI.
    pub fn filename(&self) -> String {
        if self.0.starts_with("file://") {
            if let Ok(url) = Url::parse(&self.0) {
                if let Ok(path) = url.to_file_path() {
                    return path.to_string_lossy().into_owned();
                }
            }
            self.0.trim_start_matches("file://").to_string()
        } else {
            self.0.clone()
        }
    }

    /// True for file-scheme URIs whose decoded path is absolute.
    pub fn is_document(&self) -> bool {
        self.0.starts_with("file://") && Path::new(&self.filename()).is_absolute()
    }

    /// Rebases a document URI onto `base`; relative URIs pass through.
    pub fn to_relative(&self, base: &Path) -> Uri {
        let filename = self.filename();
        let path = Path::new(&filename);
        if !path.is_absolute() {
            return Uri(filename);
        }
        match relative_path(base, path) {
            Some(rel) => Uri(slashed(&rel)),
            None => Uri(filename),
        }
    }

    pub fn to_url(&self) -> Option<Url> {
        Url::parse(&self.0).ok()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uri({})", self.0)
    }
}

/// `target` expressed relative to `base`, with `..` segments as needed.
/// `None` when the two share no common root (different prefixes).
pub fn relative_path(base: &Path, target: &Path) -> Option<PathBuf> {
    let base: Vec<Component<'_>> = base.components().collect();
    let target: Vec<Component<'_>> = target.components().collect();

    let mut common = 0;
    while common < base.len() && common < target.len() && base[common] == target[common] {
        common += 1;
    }
    if common == 0 && base.first() != target.first() {
        return None;
    }

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component);
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Some(rel)
}

fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
