use std::{collections::BTreeSet, ops::Index};

use smallvec::SmallVec;

use crate::{
    core::{ExprId, Value, ValueMode, ValueType},
    error::{VfxError, VfxResult},
    expr::{BinaryOp, ExprFlags, ExprKind, UnaryOp},
};

pub type Parents = SmallVec<[ExprId; 4]>;

#[derive(Clone, Debug, PartialEq)]
pub struct ExprNode {
    kind: ExprKind,
    parents: Parents,
    value_type: ValueType,
    flags: ExprFlags,
    // Caller-pinned bits, carried over when the node is rebuilt.
    extra_flags: ExprFlags,
}

impl ExprNode {
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn parents(&self) -> &[ExprId] {
        &self.parents
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn flags(&self) -> ExprFlags {
        self.flags
    }

    pub fn extra_flags(&self) -> ExprFlags {
        self.extra_flags
    }

    pub fn is(&self, flags: ExprFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn is_any(&self, flags: ExprFlags) -> bool {
        self.flags.intersects(flags)
    }
}

/// Host-side call counters, per node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub evaluate: u32,
    pub reduce: u32,
}

/// Append-only node arena. Parents are always allocated before their children, so ascending
/// id order is a topological order of the graph.
#[derive(Clone, Debug, Default)]
pub struct ExprGraph {
    nodes: Vec<ExprNode>,
    calls: Vec<CallCounts>,
}

impl ExprGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node(&self, id: ExprId) -> VfxResult<&ExprNode> {
        self.get(id).ok_or(VfxError::UnknownExpression(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = ExprId> + '_ {
        (0..self.nodes.len()).map(|i| ExprId(i as u32))
    }

    pub fn call_counts(&self, id: ExprId) -> CallCounts {
        self.calls.get(id.index()).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> CallCounts {
        self.calls.iter().fold(CallCounts::default(), |acc, c| CallCounts {
            evaluate: acc.evaluate + c.evaluate,
            reduce: acc.reduce + c.reduce,
        })
    }

    pub(crate) fn calls_mut(&mut self, id: ExprId) -> &mut CallCounts {
        &mut self.calls[id.index()]
    }

    /// Adds a node after checking arity and operand types.
    pub fn push(&mut self, kind: ExprKind, parents: &[ExprId]) -> VfxResult<ExprId> {
        self.push_flagged(kind, parents, ExprFlags::empty())
    }

    /// Like [`ExprGraph::push`], pinning `extra` on top of the computed flags.
    pub fn push_flagged(
        &mut self,
        kind: ExprKind,
        parents: &[ExprId],
        extra: ExprFlags,
    ) -> VfxResult<ExprId> {
        let mut types = SmallVec::<[ValueType; 4]>::with_capacity(parents.len());
        for &p in parents {
            types.push(self.node(p)?.value_type);
        }
        let value_type = kind.check_parents(&types)?;
        Ok(self.alloc_typed(kind, parents, value_type, extra))
    }

    pub fn constant(&mut self, value: Value) -> ExprId {
        self.variable(value, ValueMode::Constant)
    }

    pub fn variable(&mut self, value: Value, mode: ValueMode) -> ExprId {
        let value_type = value.value_type();
        self.alloc_typed(
            ExprKind::Value { value, mode },
            &[],
            value_type,
            ExprFlags::empty(),
        )
    }

    pub fn binary(&mut self, func: BinaryOp, a: ExprId, b: ExprId) -> VfxResult<ExprId> {
        self.push(ExprKind::Binary { func }, &[a, b])
    }

    pub fn unary(&mut self, func: UnaryOp, a: ExprId) -> VfxResult<ExprId> {
        self.push(ExprKind::Unary { func }, &[a])
    }

    /// Unchecked allocation over parents that already went through reduction or patching.
    pub(crate) fn alloc(&mut self, kind: ExprKind, parents: &[ExprId]) -> ExprId {
        self.alloc_pinned(kind, parents, ExprFlags::empty())
    }

    pub(crate) fn alloc_pinned(
        &mut self,
        kind: ExprKind,
        parents: &[ExprId],
        extra: ExprFlags,
    ) -> ExprId {
        let first = parents.first().map(|p| self[*p].value_type);
        let value_type = kind.rebuilt_value_type(first);
        self.alloc_typed(kind, parents, value_type, extra)
    }

    fn alloc_typed(
        &mut self,
        kind: ExprKind,
        parents: &[ExprId],
        value_type: ValueType,
        extra: ExprFlags,
    ) -> ExprId {
        let mut flags = kind.base_flags() | extra;
        for &p in parents {
            flags |= self[p].flags & ExprFlags::PROPAGATED;
        }
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(ExprNode {
            kind,
            parents: parents.iter().copied().collect(),
            value_type,
            flags,
            extra_flags: extra,
        });
        self.calls.push(CallCounts::default());
        id
    }

    /// Inserts `start` and every node reachable through parent links into `out`.
    pub fn collect_ancestors(&self, start: ExprId, out: &mut BTreeSet<ExprId>) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !out.insert(id) {
                continue;
            }
            if let Some(node) = self.get(id) {
                stack.extend(node.parents.iter().rev().copied());
            }
        }
    }
}

impl Index<ExprId> for ExprGraph {
    type Output = ExprNode;

    fn index(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.index()]
    }
}
