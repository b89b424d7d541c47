use crate::{
    context::{ReductionContext, ReductionOptions},
    core::{BufferUsage, ExprId, ValueType},
    error::VfxResult,
    expr::{ExprFlags, ExprKind},
    fingerprint::{GraphFingerprint, fingerprint_reduced},
    graph::ExprGraph,
    model::BuiltGraph,
};

/// Serializable summary of one compilation: reduced roots, every node they reach, and the
/// side tables collected while reducing.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReducedGraphReport {
    pub options: ReductionOptions,
    pub roots: Vec<RootReport>,
    pub nodes: Vec<NodeReport>,
    pub buffer_usage: Vec<BufferUsageReport>,
    pub inline_code: Vec<String>,
    pub fingerprint: GraphFingerprint,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RootReport {
    pub name: String,
    pub reduced: ExprId,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeReport {
    pub id: ExprId,
    pub value_type: ValueType,
    pub flags: ExprFlags,
    pub parents: Vec<ExprId>,
    pub expr: ExprKind,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BufferUsageReport {
    pub buffer: ExprId,
    pub usage: BufferUsage,
}

impl ReducedGraphReport {
    pub fn collect(built: &BuiltGraph, ctx: &ReductionContext) -> VfxResult<Self> {
        let graph: &ExprGraph = &built.graph;
        let name = |id: ExprId| {
            built
                .name_of(id)
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string())
        };

        let roots = ctx
            .reduced_roots()
            .into_iter()
            .map(|(root, reduced)| RootReport {
                name: name(root),
                reduced,
            })
            .collect();

        let mut nodes = Vec::new();
        for id in ctx.build_all_reduced(graph) {
            let node = graph.node(id)?;
            nodes.push(NodeReport {
                id,
                value_type: node.value_type(),
                flags: node.flags(),
                parents: node.parents().to_vec(),
                expr: node.kind().clone(),
            });
        }

        let buffer_usage = ctx
            .buffer_usage()
            .iter()
            .map(|(&buffer, &usage)| BufferUsageReport { buffer, usage })
            .collect();

        Ok(Self {
            options: ctx.options(),
            roots,
            nodes,
            buffer_usage,
            inline_code: ctx.inline_code_holders().map(name).collect(),
            fingerprint: fingerprint_reduced(graph, ctx)?,
        })
    }
}
