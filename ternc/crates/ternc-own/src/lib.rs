//! ternc-own - Ownership and escape analysis.
//!
//! The final phase of the middle end. Annotates every function parameter
//! with an ownership mode (`Owned`, `Borrowed`, `BorrowedMut`), decides
//! stack or heap placement for every allocation site, flags heap
//! allocations that need a reference count, and promotes the captures of
//! escaping closures into heap capture boxes.
//!
//! Functions are analyzed in topological order of the call graph; mutually
//! recursive groups iterate jointly to a fixed point. All tables iterate in
//! insertion order, so the labels are a pure function of the Core IR.

mod callgraph;
mod escape;
mod modes;
mod refs;

pub use callgraph::CallGraph;

use ternc_tir::Context;
use ternc_util::Handler;

/// Run ownership analysis over every function in the context.
pub fn analyze(ctx: &mut Context, handler: &Handler) {
    let graph = callgraph::CallGraph::build(ctx);
    let order = graph.sccs();

    // Parameter modes first, callees before callers, recursive groups
    // jointly.
    for group in &order {
        modes::infer_group(ctx, group);
    }

    // Placement and capture boxing read the final modes.
    let names: Vec<_> = ctx.functions.keys().copied().collect();
    for name in names {
        escape::place_allocations(ctx, name);
    }
    escape::box_escaping_captures(ctx);

    escape::verify_placements(ctx, handler);
}
