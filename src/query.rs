use std::collections::BTreeSet;

use crate::{context::ReductionContext, core::ExprId, graph::ExprGraph};

impl ReductionContext {
    /// Every node reachable from the reduced form of each compiled root, following reduced
    /// parent links. Roots without a cache entry are skipped.
    pub fn build_all_reduced(&self, graph: &ExprGraph) -> BTreeSet<ExprId> {
        let mut reduced = BTreeSet::new();
        for root in self.registered_expressions() {
            if let Some(&r) = self.reduced_cache.get(&root) {
                graph.collect_ancestors(r, &mut reduced);
            }
        }
        reduced
    }

    /// Reduced roots in registration-key order, paired with their original node.
    pub fn reduced_roots(&self) -> Vec<(ExprId, ExprId)> {
        self.registered_expressions()
            .filter_map(|root| self.reduced_cache.get(&root).map(|&r| (root, r)))
            .collect()
    }
}
