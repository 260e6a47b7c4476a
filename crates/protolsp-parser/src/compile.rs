use std::collections::HashSet;

use tracing::debug;

use crate::parser::parse;
use crate::report::{Handler, Reporter};
use crate::symbols::{SymbolSpan, Symbols};
use crate::validate::result_from_ast;

/// Maps an import path to file contents. The language server backs this
/// with its virtual file system so overlays shadow disk content during
/// compilation too.
pub trait Resolver: Send + Sync {
    fn find_file(&self, path: &str) -> Result<Vec<u8>, ResolveError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("file not found: `{0}`")]
    NotFound(String),
    #[error("read `{path}`: {message}")]
    Read { path: String, message: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("resolve root `{path}`: {source}")]
    Root {
        path: String,
        source: ResolveError,
    },
    #[error("no files compiled")]
    Empty,
}

/// One file that went through a compilation.
#[derive(Debug, Clone)]
pub struct LinkedFile {
    pub path: String,
    pub package: String,
}

/// Compiles a root file and its transitive imports, filling `symbols`
/// with every declaration found along the way. All problems (syntax
/// errors, unresolvable imports, duplicate symbols) go through the
/// reporter; only an unreadable root fails the compile.
pub struct Compiler<'a> {
    pub resolver: &'a dyn Resolver,
    pub reporter: &'a dyn Reporter,
    pub symbols: &'a Symbols,
}

impl Compiler<'_> {
    pub fn compile(&self, root: &str) -> Result<Vec<LinkedFile>, CompileError> {
        let mut linked = Vec::new();
        let mut seen = HashSet::new();
        // (path, span of the import that requested it)
        let mut stack: Vec<(String, Option<protolsp_ast::SourceSpan>)> =
            vec![(root.to_string(), None)];

        while let Some((path, requested_at)) = stack.pop() {
            if !seen.insert(path.clone()) {
                continue;
            }

            let bytes = match self.resolver.find_file(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    if let Some(span) = requested_at {
                        let _ = self.reporter.error(crate::report::ErrorWithSpan::new(
                            path.as_str(),
                            err.to_string(),
                            span,
                        ));
                        continue;
                    }
                    return Err(CompileError::Root { path, source: err });
                }
            };

            let source = String::from_utf8_lossy(&bytes);
            let handler = Handler::new(self.reporter);
            let file = parse(&path, &source, &handler);
            let result = result_from_ast(&path, &file, true, &handler);

            for symbol in &result.symbols {
                let insert = self.symbols.insert(
                    symbol.full_name.clone(),
                    SymbolSpan {
                        file: path.clone(),
                        kind: symbol.kind,
                        span: symbol.span,
                    },
                );
                if let Err(existing) = insert {
                    if existing.file != path || existing.span != symbol.span {
                        let _ = self.reporter.error(crate::report::ErrorWithSpan::new(
                            path.as_str(),
                            format!(
                                "symbol `{}` already defined in `{}`",
                                symbol.full_name, existing.file
                            ),
                            symbol.span,
                        ));
                    }
                }
            }

            // imports pushed in reverse so they compile in source order
            for import in file.decls.iter().rev() {
                if let protolsp_ast::FileElement::Import(node) = import {
                    stack.push((node.name.value.clone(), Some(node.name.span)));
                }
            }

            debug!(
                path = %path,
                package = %result.package,
                symbols = self.symbols.len(),
                "compiled file"
            );
            linked.push(LinkedFile {
                path,
                package: result.package,
            });
        }

        if linked.is_empty() {
            return Err(CompileError::Empty);
        }
        Ok(linked)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::report::NoopReporter;
    use crate::symbols::SymbolKind;

    struct MapResolver(HashMap<&'static str, &'static str>);

    impl Resolver for MapResolver {
        fn find_file(&self, path: &str) -> Result<Vec<u8>, ResolveError> {
            self.0
                .get(path)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| ResolveError::NotFound(path.to_string()))
        }
    }

    fn resolver() -> MapResolver {
        let mut files = HashMap::new();
        files.insert(
            "a.proto",
            "syntax = \"proto3\";\npackage a;\nimport \"b.proto\";\nmessage A { b.B inner = 1; }",
        );
        files.insert(
            "b.proto",
            "syntax = \"proto3\";\npackage b;\nimport \"a.proto\";\nmessage B { string s = 1; }",
        );
        MapResolver(files)
    }

    #[test]
    fn compiles_import_closure() {
        let resolver = resolver();
        let reporter = NoopReporter;
        let symbols = Symbols::new();
        let compiler = Compiler {
            resolver: &resolver,
            reporter: &reporter,
            symbols: &symbols,
        };
        let linked = compiler.compile("a.proto").unwrap();
        assert_eq!(linked.len(), 2);
        assert_eq!(linked[0].path, "a.proto");
        assert_eq!(linked[0].package, "a");

        let sym = symbols.lookup("b.B").unwrap();
        assert_eq!(sym.file, "b.proto");
        assert_eq!(sym.kind, SymbolKind::Message);
        assert!(symbols.lookup("a.A").is_some());
    }

    #[test]
    fn circular_imports_terminate() {
        let resolver = resolver();
        let reporter = NoopReporter;
        let symbols = Symbols::new();
        let compiler = Compiler {
            resolver: &resolver,
            reporter: &reporter,
            symbols: &symbols,
        };
        // b imports a which imports b; each file compiles exactly once
        let linked = compiler.compile("b.proto").unwrap();
        assert_eq!(linked.len(), 2);
    }

    #[test]
    fn missing_import_is_tolerated() {
        let mut files = HashMap::new();
        files.insert("only.proto", "import \"gone.proto\";\nmessage M {}");
        let resolver = MapResolver(files);
        let reporter = NoopReporter;
        let symbols = Symbols::new();
        let compiler = Compiler {
            resolver: &resolver,
            reporter: &reporter,
            symbols: &symbols,
        };
        let linked = compiler.compile("only.proto").unwrap();
        assert_eq!(linked.len(), 1);
        assert!(symbols.lookup("M").is_some());
    }

    #[test]
    fn missing_root_fails() {
        let resolver = MapResolver(HashMap::new());
        let reporter = NoopReporter;
        let symbols = Symbols::new();
        let compiler = Compiler {
            resolver: &resolver,
            reporter: &reporter,
            symbols: &symbols,
        };
        assert!(matches!(
            compiler.compile("gone.proto"),
            Err(CompileError::Root { .. })
        ));
    }
}
