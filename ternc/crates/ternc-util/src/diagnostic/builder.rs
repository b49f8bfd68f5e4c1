//! Fluent construction of diagnostics.

use super::{Diagnostic, DiagnosticKind, Handler, Level};
use crate::Span;

/// Builder for assembling a [`Diagnostic`] before emission.
///
/// ```
/// use ternc_util::{DiagnosticBuilder, DiagnosticKind, Handler, Span};
///
/// let handler = Handler::new();
/// DiagnosticBuilder::error(DiagnosticKind::UnknownSymbol, "cannot find `frobnicate`")
///     .span(Span::DUMMY)
///     .note("no declaration in scope")
///     .emit(&handler);
/// ```
pub struct DiagnosticBuilder {
    diagnostic: Diagnostic,
}

impl DiagnosticBuilder {
    pub fn new(level: Level, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            diagnostic: Diagnostic::new(level, kind, message, Span::DUMMY),
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Level::Error, kind, message)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, kind, message)
    }

    pub fn span(mut self, span: Span) -> Self {
        self.diagnostic.span = span;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.diagnostic.notes.push(note.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic.helps.push(help.into());
        self
    }

    /// Finish without emitting.
    pub fn build(self) -> Diagnostic {
        self.diagnostic
    }

    /// Emit through a handler.
    pub fn emit(self, handler: &Handler) {
        handler.emit(self.diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_build() {
        let diag = DiagnosticBuilder::error(DiagnosticKind::TypeMismatch, "mismatch")
            .span(Span::new(3, 9, 1, 4))
            .note("expected `Bool`")
            .help("compare against a boolean")
            .build();

        assert_eq!(diag.level, Level::Error);
        assert_eq!(diag.kind, DiagnosticKind::TypeMismatch);
        assert_eq!(diag.span.start, 3);
        assert_eq!(diag.notes, vec!["expected `Bool`"]);
        assert_eq!(diag.helps, vec!["compare against a boolean"]);
    }

    #[test]
    fn test_builder_emit() {
        let handler = Handler::new();
        DiagnosticBuilder::warning(DiagnosticKind::UnsupportedConstruct, "odd but allowed")
            .emit(&handler);
        assert_eq!(handler.warning_count(), 1);
        assert!(!handler.has_errors());
    }
}
