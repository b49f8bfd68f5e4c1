//! ternc-drv - The middle-end driver.
//!
//! Wires the phases together:
//!
//! ```text
//! (AST, ScopeInfo, Imports) → validate → resolve types → desugar
//!                           → monomorphize → ownership → Program
//! ```
//!
//! The driver owns the compilation session (arena, source map, diagnostic
//! handler), processes files in import order, honors the validator's
//! per-declaration short-circuit, aborts after monomorphization errors
//! (they cascade), and hands out either a finished [`Program`] or the full
//! diagnostic batch. The CLI that formats diagnostics is an external
//! collaborator; nothing here prints.

use ternc_ast::{ImportGraph, Module, ScopeInfo};
use ternc_low::lower_modules;
use ternc_sem::Resolver;
use ternc_tir::{Context, Program};
use ternc_util::{Arena, Diagnostic, DiagnosticKind, Handler, SourceMap};

/// Per-compilation state with the lifetimes the phases expect: transient
/// data in the arena, retained Core IR in ordinary owned tables.
pub struct Session {
    pub arena: Arena,
    pub source_map: SourceMap,
    pub handler: Handler,
}

impl Session {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            source_map: SourceMap::new(),
            handler: Handler::new(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the full middle end. On any error the diagnostic batch comes back
/// instead of a program; no partial Core IR is ever emitted.
pub fn run_middle_end(
    session: &Session,
    modules: &[Module],
    scopes: &ScopeInfo,
    imports: &ImportGraph,
) -> Result<Program, Vec<Diagnostic>> {
    let handler = &session.handler;

    // Files are processed in dependency order; the external resolver has
    // already diagnosed import cycles.
    let files: Vec<_> = modules.iter().map(|m| m.file).collect();
    let order = imports.topo_order(&files);
    let mut ordered: Vec<&Module> = Vec::with_capacity(modules.len());
    for file in order {
        ordered.extend(modules.iter().filter(|m| m.file == file));
    }

    // Phase V: subset validation. Rejected declarations are skipped by the
    // later phases; everything else continues.
    let ordered_owned: Vec<Module> = ordered.iter().map(|m| (*m).clone()).collect();
    let outcome = ternc_val::validate_modules(&ordered_owned, scopes, handler);
    let skip = |id: ternc_ast::NodeId| outcome.is_rejected(id);

    // Phases T, D, M share the lowering context through the resolver.
    let mut ctx = Context::new();
    {
        let mut resolver = Resolver::new(&mut ctx, handler);
        for module in &ordered_owned {
            resolver.register_module(module, &skip);
        }
        lower_modules(&ordered_owned, &mut resolver, scopes, handler, &skip);
    }

    // Monomorphization errors cascade; stop before ownership runs on a
    // half-instantiated table.
    let mono_failed = [
        DiagnosticKind::UnresolvedTypeParameter,
        DiagnosticKind::ConstraintViolation,
        DiagnosticKind::RecursiveGenericDepth,
    ]
    .iter()
    .any(|&kind| handler.has_error_kind(kind));
    if mono_failed {
        return Err(handler.take());
    }

    // Phase O: ownership labels and placement.
    ternc_own::analyze(&mut ctx, handler);

    if handler.has_errors() {
        return Err(handler.take());
    }
    Ok(ctx.finish())
}

/// Convenience wrapper for embedders that want a single error value
/// instead of the diagnostic batch.
pub fn compile(
    session: &Session,
    modules: &[Module],
    scopes: &ScopeInfo,
    imports: &ImportGraph,
) -> anyhow::Result<Program> {
    run_middle_end(session, modules, scopes, imports).map_err(|diagnostics| {
        let first = diagnostics
            .first()
            .map(|d| format!("{}: {}", d.code, d.message))
            .unwrap_or_else(|| "unknown error".to_string());
        anyhow::anyhow!(
            "compilation failed with {} diagnostic(s); first: {}",
            diagnostics.len(),
            first
        )
    })
}

#[cfg(test)]
mod tests;
