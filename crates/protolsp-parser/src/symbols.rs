use std::collections::HashMap;
use std::sync::Mutex;

use protolsp_ast::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Message,
    Enum,
    EnumValue,
    Field,
    Oneof,
    Group,
    Service,
    Method,
}

/// Where a fully-qualified name was declared.
#[derive(Debug, Clone)]
pub struct SymbolSpan {
    pub file: String,
    pub kind: SymbolKind,
    pub span: SourceSpan,
}

/// A table of fully-qualified names shared by every file of one
/// compilation. Lookups stay valid until the next compile that reuses
/// the table.
#[derive(Debug, Default)]
pub struct Symbols {
    inner: Mutex<HashMap<String, SymbolSpan>>,
}

impl Symbols {
    pub fn new() -> Self {
        Symbols::default()
    }

    /// Records a declaration. On a duplicate the table keeps the first
    /// entry and hands back a copy of it.
    pub fn insert(&self, full_name: String, symbol: SymbolSpan) -> Result<(), SymbolSpan> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.get(&full_name) {
            Some(existing) => Err(existing.clone()),
            None => {
                inner.insert(full_name, symbol);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, full_name: &str) -> Option<SymbolSpan> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(full_name).cloned()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
