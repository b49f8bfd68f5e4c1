//! The resolved import graph.
//!
//! The external module resolver has already mapped every import path to a
//! file and reported any import cycles. The middle end only needs the edges
//! and a deterministic topological order to process files in.

use indexmap::IndexMap;
use ternc_util::{FileId, Symbol};

/// Per-file import edges: `(imported_symbol, source_file)` pairs.
#[derive(Default)]
pub struct ImportGraph {
    edges: IndexMap<FileId, Vec<(Symbol, FileId)>>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_import(&mut self, file: FileId, symbol: Symbol, from: FileId) {
        self.edges.entry(file).or_default().push((symbol, from));
    }

    pub fn imports_of(&self, file: FileId) -> &[(Symbol, FileId)] {
        self.edges.get(&file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dependency-first order over `files`.
    ///
    /// Kahn's algorithm, seeded in the given order so ties resolve
    /// deterministically. Files on an import cycle (already diagnosed by the
    /// external resolver) are appended in input order rather than dropped.
    pub fn topo_order(&self, files: &[FileId]) -> Vec<FileId> {
        let mut in_degree: IndexMap<FileId, usize> = files.iter().map(|&f| (f, 0)).collect();
        for &file in files {
            for &(_, from) in self.imports_of(file) {
                if from != file && in_degree.contains_key(&file) && in_degree.contains_key(&from) {
                    *in_degree.get_mut(&file).unwrap() += 1;
                }
            }
        }

        let mut queue: Vec<FileId> = files
            .iter()
            .copied()
            .filter(|f| in_degree[f] == 0)
            .collect();
        let mut order = Vec::with_capacity(files.len());
        let mut queued = 0;

        while queued < queue.len() {
            let file = queue[queued];
            queued += 1;
            order.push(file);
            // `file` is now placed; release everything that imports from it.
            for &other in files {
                if order.contains(&other) || queue.contains(&other) {
                    continue;
                }
                let unmet = self
                    .imports_of(other)
                    .iter()
                    .filter(|&&(_, from)| from != other && !order.contains(&from))
                    .count();
                if unmet == 0 {
                    queue.push(other);
                }
            }
        }

        // Remaining files sit on a cycle; keep input order.
        for &file in files {
            if !order.contains(&file) {
                order.push(file);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::intern(s)
    }

    #[test]
    fn test_imports_of_empty() {
        let graph = ImportGraph::new();
        assert!(graph.imports_of(FileId(0)).is_empty());
    }

    #[test]
    fn test_topo_order_linear() {
        // c imports from b, b imports from a
        let (a, b, c) = (FileId(0), FileId(1), FileId(2));
        let mut graph = ImportGraph::new();
        graph.add_import(b, sym("helper"), a);
        graph.add_import(c, sym("thing"), b);

        let order = graph.topo_order(&[c, b, a]);
        let pos = |f: FileId| order.iter().position(|&x| x == f).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn test_topo_order_no_edges_keeps_input_order() {
        let files = [FileId(2), FileId(0), FileId(1)];
        let graph = ImportGraph::new();
        assert_eq!(graph.topo_order(&files), files.to_vec());
    }

    #[test]
    fn test_topo_order_cycle_preserved() {
        // a and b import each other; both must still appear exactly once.
        let (a, b) = (FileId(0), FileId(1));
        let mut graph = ImportGraph::new();
        graph.add_import(a, sym("x"), b);
        graph.add_import(b, sym("y"), a);

        let order = graph.topo_order(&[a, b]);
        assert_eq!(order.len(), 2);
        assert!(order.contains(&a) && order.contains(&b));
    }
}
