use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::fs::Uri;

use super::file::ParsedFile;

/// A declared package name; the empty name is the unnamed package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    pub fn new(name: impl Into<String>) -> Self {
        PackageName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parts(&self) -> Vec<&str> {
        self.0.split('.').collect()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The files currently sharing one declared package name. Membership is
/// maintained by the parse cache as files re-parse into (and out of)
/// packages.
pub struct Package {
    name: PackageName,
    files: RwLock<HashMap<Uri, Arc<ParsedFile>>>,
}

impl Package {
    pub fn new(name: PackageName) -> Self {
        Package {
            name,
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &PackageName {
        &self.name
    }

    pub fn add_file(&self, file: &Arc<ParsedFile>) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.entry(file.uri().clone()).or_insert_with(|| file.clone());
    }

    pub fn remove_file(&self, file: &Arc<ParsedFile>) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.remove(file.uri());
    }

    pub fn files(&self) -> Vec<Arc<ParsedFile>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.values().cloned().collect()
    }

    /// Runs a visitor over the AST of every file in the package.
    pub fn walk<V: for<'a> protolsp_ast::Visitor<'a>>(&self, visitor: &mut V) {
        for file in self.files() {
            if let Some(ast) = file.ast() {
                protolsp_ast::walk(&ast, visitor);
            }
        }
    }

    pub fn len(&self) -> usize {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_parts() {
        let name = PackageName::new("foo.bar.v1");
        assert_eq!(name.parts(), vec!["foo", "bar", "v1"]);
        assert!(PackageName::default().is_empty());
    }
}
