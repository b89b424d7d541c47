use std::collections::{BTreeMap, BTreeSet, HashMap};

use smallvec::SmallVec;

use crate::{
    core::{BufferUsage, ExprId, LayoutElement},
    error::{VfxError, VfxResult},
    expr::ExprFlags,
    graph::ExprGraph,
    patch::PatchPolicy,
};

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct ReductionOptions: u8 {
        const REDUCTION                     = 1 << 0;
        const CPU_EVALUATION                = 1 << 1;
        const CONSTANT_FOLDING              = 1 << 2;
        const GPU_DATA_TRANSFORMATION       = 1 << 3;
        const PATCH_READ_TO_EVENT_ATTRIBUTE = 1 << 4;
    }
}

impl ReductionOptions {
    /// Any of these enables host folding at all.
    pub const FOLDING: Self = Self::REDUCTION
        .union(Self::CPU_EVALUATION)
        .union(Self::CONSTANT_FOLDING);

    pub const PATCHING: Self =
        Self::GPU_DATA_TRANSFORMATION.union(Self::PATCH_READ_TO_EVENT_ATTRIBUTE);

    pub fn validate(self) -> VfxResult<()> {
        if self.contains(Self::CPU_EVALUATION | Self::GPU_DATA_TRANSFORMATION) {
            return Err(VfxError::InvalidOptions(
                "CPU_EVALUATION and GPU_DATA_TRANSFORMATION are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}

// Recursion guard for long dependency chains.
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Reduction state for one compilation unit. Holds ids into an [`ExprGraph`] owned by the
/// caller; the graph is passed to every call that may allocate. Cached ids are only meaningful
/// for the graph they were compiled against: pair a context with a single graph, or call
/// [`ReductionContext::invalidate_all`] before switching.
#[derive(Clone, Debug)]
pub struct ReductionContext {
    options: ReductionOptions,
    event_attributes: Option<Vec<LayoutElement>>,
    end_expressions: BTreeSet<ExprId>,
    pub(crate) reduced_cache: HashMap<ExprId, ExprId>,
    pub(crate) buffer_usage: BTreeMap<ExprId, BufferUsage>,
    inline_code: BTreeSet<ExprId>,
}

impl ReductionContext {
    pub fn new(
        options: ReductionOptions,
        event_attributes: Option<Vec<LayoutElement>>,
    ) -> VfxResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            event_attributes,
            end_expressions: BTreeSet::new(),
            reduced_cache: HashMap::new(),
            buffer_usage: BTreeMap::new(),
            inline_code: BTreeSet::new(),
        })
    }

    pub fn options(&self) -> ReductionOptions {
        self.options
    }

    pub fn event_attributes(&self) -> Option<&[LayoutElement]> {
        self.event_attributes.as_deref()
    }

    fn has(&self, options: ReductionOptions) -> bool {
        self.options.contains(options)
    }

    fn has_any(&self, options: ReductionOptions) -> bool {
        self.options.intersects(options)
    }

    pub fn register_expression(&mut self, expr: ExprId) {
        if self.end_expressions.insert(expr) {
            tracing::debug!(%expr, "registered end expression");
        }
    }

    /// Drops `expr` from the roots and evicts its own cache entry. Its parents stay cached.
    pub fn unregister_expression(&mut self, expr: ExprId) {
        self.invalidate(expr);
        if self.end_expressions.remove(&expr) {
            tracing::debug!(%expr, "unregistered end expression");
        }
    }

    pub fn registered_expressions(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.end_expressions.iter().copied()
    }

    /// Compiles every registered root, then patches each root with no consumer.
    #[tracing::instrument(name = "compile_expression_context", skip(self, graph), fields(roots = self.end_expressions.len()))]
    pub fn compile_all(&mut self, graph: &mut ExprGraph) -> VfxResult<()> {
        let result = self.compile_roots(graph);
        if result.is_err() {
            self.invalidate_all();
        }
        result
    }

    fn compile_roots(&mut self, graph: &mut ExprGraph) -> VfxResult<()> {
        let need_to_patch = self.has_any(ReductionOptions::PATCHING);
        let policy = PatchPolicy {
            insert_gpu_transformation: need_to_patch
                && self.has(ReductionOptions::GPU_DATA_TRANSFORMATION),
            patch_read_attribute_for_spawn: need_to_patch
                && self.has(ReductionOptions::PATCH_READ_TO_EVENT_ATTRIBUTE),
        };

        let roots: Vec<ExprId> = self.end_expressions.iter().copied().collect();
        for root in roots {
            self.compile_node(graph, root)?;
            if need_to_patch {
                let reduced = self.reduced(root);
                let patched = self.patch_expression(graph, reduced, None, policy)?;
                self.reduced_cache.insert(root, patched);
            }
        }
        Ok(())
    }

    pub fn recompile(&mut self, graph: &mut ExprGraph) -> VfxResult<()> {
        self.invalidate_all();
        self.compile_all(graph)
    }

    /// Reduced form of `expr`, memoized for the current cache generation.
    pub fn compile(&mut self, graph: &mut ExprGraph, expr: ExprId) -> VfxResult<ExprId> {
        let result = self.compile_node(graph, expr);
        if result.is_err() {
            self.invalidate_all();
        }
        result
    }

    pub(crate) fn compile_node(&mut self, graph: &mut ExprGraph, expr: ExprId) -> VfxResult<ExprId> {
        if let Some(&reduced) = self.reduced_cache.get(&expr) {
            return Ok(reduced);
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.compile_uncached(graph, expr)
        })
    }

    fn compile_uncached(&mut self, graph: &mut ExprGraph, expr: ExprId) -> VfxResult<ExprId> {
        let gpu_transformation = self.has(ReductionOptions::GPU_DATA_TRANSFORMATION);
        let patch_read_attribute_for_spawn =
            self.has(ReductionOptions::PATCH_READ_TO_EVENT_ATTRIBUTE);

        let node = graph.node(expr)?;
        let original: SmallVec<[ExprId; 4]> = node.parents().iter().copied().collect();
        let device_only = node.is_any(ExprFlags::NOT_COMPILABLE_ON_CPU);

        let mut parents = SmallVec::<[ExprId; 4]>::with_capacity(original.len());
        for &parent in &original {
            let reduced = self.compile_node(graph, parent)?;
            let host_compilable = !graph
                .node(reduced)?
                .is_any(ExprFlags::NOT_COMPILABLE_ON_CPU);
            // Patch only where a host-compilable value feeds a device-only consumer.
            let policy = PatchPolicy {
                insert_gpu_transformation: gpu_transformation && device_only && host_compilable,
                patch_read_attribute_for_spawn,
            };
            parents.push(self.patch_expression(graph, reduced, Some(expr), policy)?);
        }

        let reduced = if self.should_evaluate(graph, expr, &parents)? {
            let folded = graph.evaluate(expr, &parents)?;
            tracing::trace!(%expr, %folded, "evaluated on host");
            folded
        } else if self.has_any(ReductionOptions::FOLDING) || parents != original {
            graph.reduce(expr, &parents)?
        } else {
            expr
        };

        if graph.node(expr)?.kind().inline_code().is_some() {
            self.inline_code.insert(expr);
        }
        self.reduced_cache.insert(expr, reduced);
        Ok(reduced)
    }

    fn should_evaluate(
        &self,
        graph: &ExprGraph,
        expr: ExprId,
        parents: &[ExprId],
    ) -> VfxResult<bool> {
        if !self.has_any(ReductionOptions::FOLDING) {
            return Ok(false);
        }

        let node = graph.node(expr)?;
        if node.is_any(ExprFlags::NOT_COMPILABLE_ON_CPU) {
            return Ok(false);
        }

        let cpu_evaluation = self.has(ReductionOptions::CPU_EVALUATION);
        if !cpu_evaluation && node.is_any(ExprFlags::INVALID_CONSTANT) {
            return Ok(false);
        }

        // An operation with no inputs has nothing to fold.
        if !node.is(ExprFlags::VALUE) && parents.is_empty() {
            return Ok(false);
        }

        let mut required = ExprFlags::VALUE;
        if !cpu_evaluation {
            required |= if self.has(ReductionOptions::CONSTANT_FOLDING) {
                ExprFlags::FOLDABLE
            } else {
                ExprFlags::CONSTANT
            };
        }
        let mask = required | ExprFlags::INVALID_ON_CPU;

        if node.is(ExprFlags::VALUE) && node.flags() & mask != required {
            return Ok(false);
        }

        for &p in parents {
            if graph.node(p)?.flags() & mask != required {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Full reset: cache, buffer usage table and inline code collection.
    pub fn invalidate_all(&mut self) {
        tracing::debug!(
            cached = self.reduced_cache.len(),
            "invalidating expression context"
        );
        self.inline_code.clear();
        self.reduced_cache.clear();
        self.buffer_usage.clear();
    }

    /// Evicts the cache entry of `expr` only; dependents are left to the caller.
    pub fn invalidate(&mut self, expr: ExprId) {
        self.reduced_cache.remove(&expr);
    }

    pub fn is_cached(&self, expr: ExprId) -> bool {
        self.reduced_cache.contains_key(&expr)
    }

    /// Reduced form of `expr`, or `expr` itself when it has not been compiled.
    pub fn reduced(&self, expr: ExprId) -> ExprId {
        self.reduced_cache.get(&expr).copied().unwrap_or(expr)
    }

    pub fn buffer_usage(&self) -> &BTreeMap<ExprId, BufferUsage> {
        &self.buffer_usage
    }

    /// Original nodes carrying inline device code seen by this compilation.
    pub fn inline_code_holders(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.inline_code.iter().copied()
    }
}
