//! Call graph construction and strongly connected components.

use indexmap::{IndexMap, IndexSet};
use ternc_tir::{ir, Context, ExprKind};
use ternc_util::Symbol;

/// Who references whom, by mangled name. Closure creation counts as a call
/// edge: the closure body's labels must be ready when its creator is
/// analyzed.
pub struct CallGraph {
    edges: IndexMap<Symbol, IndexSet<Symbol>>,
}

impl CallGraph {
    pub fn build(ctx: &Context) -> Self {
        let mut edges: IndexMap<Symbol, IndexSet<Symbol>> = IndexMap::new();
        for (name, def) in &ctx.functions {
            let mut callees = IndexSet::new();
            ir::walk_exprs(&def.body.stmts, &mut |e| match &e.kind {
                ExprKind::Fn(target) | ExprKind::Closure { func: target, .. } => {
                    if ctx.functions.contains_key(target) {
                        callees.insert(*target);
                    }
                }
                _ => {}
            });
            edges.insert(*name, callees);
        }
        Self { edges }
    }

    pub fn callees(&self, name: Symbol) -> impl Iterator<Item = Symbol> + '_ {
        self.edges.get(&name).into_iter().flatten().copied()
    }

    /// Strongly connected components in reverse topological order: every
    /// group appears before the groups that call into it.
    ///
    /// Tarjan's algorithm over insertion-ordered tables, so the output is
    /// deterministic.
    pub fn sccs(&self) -> Vec<Vec<Symbol>> {
        let mut state = Tarjan {
            graph: self,
            index: IndexMap::new(),
            lowlink: IndexMap::new(),
            on_stack: IndexSet::new(),
            stack: Vec::new(),
            next_index: 0,
            output: Vec::new(),
        };
        for &name in self.edges.keys() {
            if !state.index.contains_key(&name) {
                state.visit(name);
            }
        }
        state.output
    }
}

struct Tarjan<'g> {
    graph: &'g CallGraph,
    index: IndexMap<Symbol, usize>,
    lowlink: IndexMap<Symbol, usize>,
    on_stack: IndexSet<Symbol>,
    stack: Vec<Symbol>,
    next_index: usize,
    output: Vec<Vec<Symbol>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, v: Symbol) {
        self.index.insert(v, self.next_index);
        self.lowlink.insert(v, self.next_index);
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v);

        let callees: Vec<Symbol> = self.graph.callees(v).collect();
        for w in callees {
            if !self.index.contains_key(&w) {
                self.visit(w);
                let low = self.lowlink[&w].min(self.lowlink[&v]);
                self.lowlink.insert(v, low);
            } else if self.on_stack.contains(&w) {
                let low = self.index[&w].min(self.lowlink[&v]);
                self.lowlink.insert(v, low);
            }
        }

        if self.lowlink[&v] == self.index[&v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack.swap_remove(&w);
                component.push(w);
                if w == v {
                    break;
                }
            }
            component.reverse();
            self.output.push(component);
        }
    }
}
