use std::collections::{BTreeMap, HashSet};

use crate::{
    core::ExprId,
    error::{VfxError, VfxResult},
    expr::{ExprFlags, ExprKind},
    graph::ExprGraph,
};

/// Serialized expression graph. Nodes are listed parents-first and refer to each other by
/// string id.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphDoc {
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub roots: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeDoc {
    pub id: String,
    pub expr: ExprKind,
    #[serde(default)]
    pub parents: Vec<String>,
    /// Pinned on top of the computed flags.
    #[serde(default = "ExprFlags::empty")]
    pub flags: ExprFlags,
}

/// A graph built from a [`GraphDoc`], with the document ids resolved.
#[derive(Clone, Debug)]
pub struct BuiltGraph {
    pub graph: ExprGraph,
    pub ids: BTreeMap<String, ExprId>,
    pub roots: Vec<ExprId>,
}

impl BuiltGraph {
    /// Document name of an arena node, if it came from the document.
    pub fn name_of(&self, id: ExprId) -> Option<&str> {
        self.ids
            .iter()
            .find_map(|(name, &node)| (node == id).then_some(name.as_str()))
    }
}

impl GraphDoc {
    pub fn validate(&self) -> VfxResult<()> {
        if self.nodes.is_empty() {
            return Err(VfxError::validation("graph must contain at least one node"));
        }

        let mut seen = HashSet::<&str>::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(VfxError::validation("node id must be non-empty"));
            }
            for parent in &node.parents {
                if !seen.contains(parent.as_str()) {
                    return Err(VfxError::validation(format!(
                        "node '{}' references '{}' which is not declared before it",
                        node.id, parent
                    )));
                }
            }
            if !seen.insert(node.id.as_str()) {
                return Err(VfxError::validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        for root in &self.roots {
            if !seen.contains(root.as_str()) {
                return Err(VfxError::validation(format!(
                    "root '{root}' is not a node of the graph"
                )));
            }
        }
        Ok(())
    }

    /// Validates, then allocates every node in document order with full type checking.
    pub fn build(&self) -> VfxResult<BuiltGraph> {
        self.validate()?;

        let mut graph = ExprGraph::new();
        let mut ids = BTreeMap::new();
        for node in &self.nodes {
            let parents = node
                .parents
                .iter()
                .map(|p| resolve(&ids, p))
                .collect::<VfxResult<Vec<ExprId>>>()?;
            let id = graph
                .push_flagged(node.expr.clone(), &parents, node.flags)
                .map_err(|e| match e {
                    VfxError::Validation(msg) => {
                        VfxError::validation(format!("node '{}': {msg}", node.id))
                    }
                    other => other,
                })?;
            ids.insert(node.id.clone(), id);
        }

        let roots = self
            .roots
            .iter()
            .map(|r| resolve(&ids, r))
            .collect::<VfxResult<Vec<ExprId>>>()?;
        Ok(BuiltGraph { graph, ids, roots })
    }
}

fn resolve(ids: &BTreeMap<String, ExprId>, name: &str) -> VfxResult<ExprId> {
    ids.get(name)
        .copied()
        .ok_or_else(|| VfxError::validation(format!("unknown node '{name}'")))
}
