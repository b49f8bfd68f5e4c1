//! Declaration-level type cycle detection.
//!
//! A named type may not reach itself unless every such path crosses a
//! `Weak<T>` edge. Arrays, options, and plain fields all count as owning
//! edges; only `Weak` breaks a cycle.

use indexmap::IndexMap;
use ternc_ast::{Item, Module, NodeId, TypeAnn, TypeAnnKind};
use ternc_util::{sym, DiagnosticBuilder, DiagnosticKind, FxHashSet, Handler, Span, Symbol};

struct TypeNode {
    id: NodeId,
    span: Span,
    /// Named types this declaration references, with weak-ness per edge
    edges: Vec<(Symbol, bool)>,
}

/// Returns the node ids of declarations on a cycle with no `Weak` edge.
pub(crate) fn check_type_cycles(modules: &[Module], handler: &Handler) -> Vec<NodeId> {
    let mut graph: IndexMap<Symbol, TypeNode> = IndexMap::new();

    for module in modules {
        for item in &module.items {
            let (name, id, span) = match item {
                Item::TypeAlias(t) => (t.name, t.id, t.span),
                Item::Interface(i) => (i.name, i.id, i.span),
                Item::Class(c) => (c.name, c.id, c.span),
                _ => continue,
            };
            let mut edges = Vec::new();
            for ann in collect_anns(item) {
                collect_edges(ann, false, &mut edges);
            }
            // First declaration wins; duplicates are the binder's problem.
            graph.entry(name).or_insert(TypeNode { id, span, edges });
        }
    }

    let mut rejected = Vec::new();
    let mut reported: FxHashSet<Symbol> = FxHashSet::default();

    for &name in graph.keys() {
        if reported.contains(&name) {
            continue;
        }
        let mut path = Vec::new();
        let mut visited = FxHashSet::default();
        if let Some(cycle) = find_strong_cycle(&graph, name, &mut path, &mut visited) {
            for member in &cycle {
                reported.insert(*member);
                if let Some(node) = graph.get(member) {
                    rejected.push(node.id);
                }
            }
            let display: Vec<&str> = cycle.iter().map(|s| s.as_str()).collect();
            DiagnosticBuilder::error(
                DiagnosticKind::CycleError,
                format!("type cycle with no `Weak` edge: {}", display.join(" -> ")),
            )
            .span(graph[&cycle[0]].span)
            .help("mark one edge of the cycle with `Weak<T>`")
            .emit(handler);
        }
    }
    rejected
}

fn collect_anns(item: &Item) -> Vec<&TypeAnn> {
    match item {
        Item::TypeAlias(t) => vec![&t.ty],
        Item::Interface(i) => i.fields.iter().map(|f| &f.ty).collect(),
        Item::Class(c) => c.fields.iter().filter_map(|f| f.ty.as_ref()).collect(),
        _ => Vec::new(),
    }
}

/// Record `(name, weak)` for every named reference in an annotation.
fn collect_edges(ann: &TypeAnn, in_weak: bool, edges: &mut Vec<(Symbol, bool)>) {
    match &ann.kind {
        TypeAnnKind::Named { name, args } => {
            if *name == *sym::WEAK {
                for arg in args {
                    collect_edges(arg, true, edges);
                }
            } else {
                edges.push((*name, in_weak));
                for arg in args {
                    collect_edges(arg, in_weak, edges);
                }
            }
        }
        TypeAnnKind::Union(variants) => {
            for v in variants {
                collect_edges(v, in_weak, edges);
            }
        }
        TypeAnnKind::Object(fields) => {
            for f in fields {
                collect_edges(&f.ty, in_weak, edges);
            }
        }
        TypeAnnKind::Array(e) => collect_edges(e, in_weak, edges),
        TypeAnnKind::Tuple(elements) => {
            for e in elements {
                collect_edges(e, in_weak, edges);
            }
        }
        TypeAnnKind::Fn { params, ret } => {
            for p in params {
                collect_edges(p, in_weak, edges);
            }
            collect_edges(ret, in_weak, edges);
        }
        _ => {}
    }
}

/// DFS for a cycle reachable from `start` using only strong (non-Weak)
/// edges. Returns the members of the first such cycle found.
fn find_strong_cycle(
    graph: &IndexMap<Symbol, TypeNode>,
    start: Symbol,
    path: &mut Vec<Symbol>,
    visited: &mut FxHashSet<Symbol>,
) -> Option<Vec<Symbol>> {
    if let Some(pos) = path.iter().position(|&n| n == start) {
        return Some(path[pos..].to_vec());
    }
    if !visited.insert(start) {
        return None;
    }
    let node = graph.get(&start)?;
    path.push(start);
    for &(target, weak) in &node.edges {
        if weak || !graph.contains_key(&target) {
            continue;
        }
        if let Some(cycle) = find_strong_cycle(graph, target, path, visited) {
            return Some(cycle);
        }
    }
    path.pop();
    None
}
