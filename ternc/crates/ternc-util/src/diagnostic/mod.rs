//! Diagnostic infrastructure.
//!
//! All user-facing failure in the middle end is a [`Diagnostic`] value; the
//! pipeline never unwinds. Phases report through a shared [`Handler`], the
//! driver batches what was collected, and the external CLI renders it.
//!
//! ```
//! use ternc_util::{DiagnosticBuilder, DiagnosticKind, Handler, Span};
//!
//! let handler = Handler::new();
//! DiagnosticBuilder::error(DiagnosticKind::UnsupportedConstruct, "`any` is not compilable")
//!     .span(Span::DUMMY)
//!     .help("give the value a concrete type")
//!     .emit(&handler);
//!
//! assert!(handler.has_errors());
//! ```

mod builder;
mod codes;

pub use builder::DiagnosticBuilder;
pub use codes::DiagnosticCode;

use crate::Span;
use std::cell::RefCell;
use std::fmt;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// An error that prevents compilation
    Error,
    /// A warning that doesn't prevent compilation
    Warning,
    /// Additional information about a diagnostic
    Note,
    /// A suggestion for fixing an issue
    Help,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
            Level::Help => write!(f, "help"),
        }
    }
}

/// What went wrong, independent of wording.
///
/// The kind is part of the middle end's output contract; messages are for
/// humans and may change freely, kinds may not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A syntactic or type form outside the compilable subset
    UnsupportedConstruct,
    /// An expression type cannot be assigned or passed where it is used
    TypeMismatch,
    /// A reference the scope table did not resolve
    UnknownSymbol,
    /// A type cycle with no `Weak` edge
    CycleError,
    /// Union variants share a would-be discriminant with duplicate or non-literal values
    DiscriminantAmbiguous,
    /// A type parameter could neither be inferred nor defaulted
    UnresolvedTypeParameter,
    /// A concrete generic argument violates an `extends` constraint
    ConstraintViolation,
    /// Generic instantiation depth limit exceeded
    RecursiveGenericDepth,
    /// A throwing function called outside `try`
    PropagationError,
    /// A compiler invariant was violated; a bug in the compiler, not the input
    InternalError,
}

impl DiagnosticKind {
    /// The stable code for this kind.
    pub fn code(self) -> DiagnosticCode {
        match self {
            DiagnosticKind::UnsupportedConstruct => DiagnosticCode::E_UNSUPPORTED_CONSTRUCT,
            DiagnosticKind::TypeMismatch => DiagnosticCode::E_TYPE_MISMATCH,
            DiagnosticKind::UnknownSymbol => DiagnosticCode::E_UNKNOWN_SYMBOL,
            DiagnosticKind::CycleError => DiagnosticCode::E_CYCLE,
            DiagnosticKind::DiscriminantAmbiguous => DiagnosticCode::E_DISCRIMINANT_AMBIGUOUS,
            DiagnosticKind::UnresolvedTypeParameter => DiagnosticCode::E_UNRESOLVED_TYPE_PARAM,
            DiagnosticKind::ConstraintViolation => DiagnosticCode::E_CONSTRAINT_VIOLATION,
            DiagnosticKind::RecursiveGenericDepth => DiagnosticCode::E_RECURSIVE_GENERIC_DEPTH,
            DiagnosticKind::PropagationError => DiagnosticCode::E_PROPAGATION,
            DiagnosticKind::InternalError => DiagnosticCode::E_INTERNAL,
        }
    }
}

/// A diagnostic record: severity, kind, location, and wording.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Diagnostic severity level
    pub level: Level,
    /// Machine-readable kind
    pub kind: DiagnosticKind,
    /// Main diagnostic message
    pub message: String,
    /// Source location
    pub span: Span,
    /// Stable diagnostic code
    pub code: DiagnosticCode,
    /// Additional notes for context
    pub notes: Vec<String>,
    /// Help suggestions for fixing the issue
    pub helps: Vec<String>,
}

impl Diagnostic {
    pub fn new(level: Level, kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            level,
            kind,
            message: message.into(),
            span,
            code: kind.code(),
            notes: Vec::new(),
            helps: Vec::new(),
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Error, kind, message, span)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Warning, kind, message, span)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.helps.push(help.into());
        self
    }
}

/// Handler for collecting diagnostics.
///
/// Phases hold a shared reference and push; interior mutability keeps the
/// reporting call sites free of `&mut` plumbing. Single-threaded by design,
/// like the middle end itself.
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
    /// Whether to panic on errors (for tests that expect clean input)
    panic_on_error: bool,
}

impl Handler {
    pub fn new() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: false,
        }
    }

    /// A handler that panics on the first error, for tests.
    pub fn new_panicking() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
            panic_on_error: true,
        }
    }

    /// Emit a diagnostic.
    pub fn emit(&self, diagnostic: Diagnostic) {
        if self.panic_on_error && diagnostic.level == Level::Error {
            panic!(
                "unexpected diagnostic [{}]: {}",
                diagnostic.code, diagnostic.message
            );
        }
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count()
    }

    /// True if any collected error has the given kind.
    pub fn has_error_kind(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error && d.kind == kind)
    }

    /// Snapshot of all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Drain the collected diagnostics, leaving the handler empty.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_display() {
        assert_eq!(format!("{}", Level::Error), "error");
        assert_eq!(format!("{}", Level::Warning), "warning");
        assert_eq!(format!("{}", Level::Note), "note");
        assert_eq!(format!("{}", Level::Help), "help");
    }

    #[test]
    fn test_diagnostic_carries_kind_and_code() {
        let diag = Diagnostic::error(DiagnosticKind::TypeMismatch, "mismatch", Span::DUMMY);
        assert_eq!(diag.level, Level::Error);
        assert_eq!(diag.kind, DiagnosticKind::TypeMismatch);
        assert_eq!(diag.code, DiagnosticCode::E_TYPE_MISMATCH);
    }

    #[test]
    fn test_diagnostic_notes_and_helps() {
        let diag = Diagnostic::error(DiagnosticKind::TypeMismatch, "mismatch", Span::DUMMY)
            .with_note("expected `Int32`")
            .with_note("found `Str`")
            .with_help("add an explicit conversion");
        assert_eq!(diag.notes.len(), 2);
        assert_eq!(diag.helps, vec!["add an explicit conversion"]);
    }

    #[test]
    fn test_handler_counts() {
        let handler = Handler::new();
        assert!(!handler.has_errors());

        handler.emit(Diagnostic::error(
            DiagnosticKind::UnsupportedConstruct,
            "bad",
            Span::DUMMY,
        ));
        handler.emit(Diagnostic::warning(
            DiagnosticKind::UnsupportedConstruct,
            "meh",
            Span::DUMMY,
        ));

        assert!(handler.has_errors());
        assert_eq!(handler.error_count(), 1);
        assert_eq!(handler.warning_count(), 1);
    }

    #[test]
    fn test_handler_has_error_kind() {
        let handler = Handler::new();
        handler.emit(Diagnostic::error(
            DiagnosticKind::CycleError,
            "cycle",
            Span::DUMMY,
        ));
        assert!(handler.has_error_kind(DiagnosticKind::CycleError));
        assert!(!handler.has_error_kind(DiagnosticKind::TypeMismatch));
    }

    #[test]
    fn test_handler_take_drains() {
        let handler = Handler::new();
        handler.emit(Diagnostic::error(
            DiagnosticKind::InternalError,
            "bug",
            Span::DUMMY,
        ));
        let taken = handler.take();
        assert_eq!(taken.len(), 1);
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_handler_panicking() {
        let handler = Handler::new_panicking();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler.emit(Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                "boom",
                Span::DUMMY,
            ));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_every_kind_has_distinct_code() {
        let kinds = [
            DiagnosticKind::UnsupportedConstruct,
            DiagnosticKind::TypeMismatch,
            DiagnosticKind::UnknownSymbol,
            DiagnosticKind::CycleError,
            DiagnosticKind::DiscriminantAmbiguous,
            DiagnosticKind::UnresolvedTypeParameter,
            DiagnosticKind::ConstraintViolation,
            DiagnosticKind::RecursiveGenericDepth,
            DiagnosticKind::PropagationError,
            DiagnosticKind::InternalError,
        ];
        for i in 0..kinds.len() {
            for j in (i + 1)..kinds.len() {
                assert_ne!(kinds[i].code(), kinds[j].code());
            }
        }
    }
}
