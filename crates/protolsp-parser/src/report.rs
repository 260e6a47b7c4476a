use std::cell::Cell;
use std::fmt;

use protolsp_ast::SourceSpan;

/// A parse or validation problem anchored to a source span.
#[derive(Debug, Clone)]
pub struct ErrorWithSpan {
    pub filename: String,
    pub message: String,
    pub span: SourceSpan,
}

impl ErrorWithSpan {
    pub fn new(filename: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        ErrorWithSpan {
            filename: filename.into(),
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for ErrorWithSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.filename, self.span.start, self.message)
    }
}

/// Returned by a [`Reporter`] to stop the parse early.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("parse aborted by reporter")]
pub struct ParseAborted;

/// Receives errors and warnings as they are found. Returning `Err` from
/// `error` aborts the enclosing parse; the AST built so far is kept.
pub trait Reporter: Send + Sync {
    fn error(&self, err: ErrorWithSpan) -> Result<(), ParseAborted>;
    fn warning(&self, warn: ErrorWithSpan);
}

/// Swallows everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn error(&self, _: ErrorWithSpan) -> Result<(), ParseAborted> {
        Ok(())
    }

    fn warning(&self, _: ErrorWithSpan) {}
}

/// Wraps a [`Reporter`] for one parse, tracking whether anything was
/// reported and whether the reporter asked to abort.
pub struct Handler<'a> {
    reporter: &'a dyn Reporter,
    errored: Cell<bool>,
    aborted: Cell<bool>,
}

impl<'a> Handler<'a> {
    pub fn new(reporter: &'a dyn Reporter) -> Self {
        Handler {
            reporter,
            errored: Cell::new(false),
            aborted: Cell::new(false),
        }
    }

    pub fn error(&self, err: ErrorWithSpan) {
        if self.aborted.get() {
            return;
        }
        self.errored.set(true);
        if self.reporter.error(err).is_err() {
            self.aborted.set(true);
        }
    }

    pub fn warning(&self, warn: ErrorWithSpan) {
        if !self.aborted.get() {
            self.reporter.warning(warn);
        }
    }

    /// True once any error has been reported; the source is invalid but
    /// the AST is still usable.
    pub fn errored(&self) -> bool {
        self.errored.get()
    }

    pub fn aborted(&self) -> bool {
        self.aborted.get()
    }
}
