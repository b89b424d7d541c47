#![forbid(unsafe_code)]

//! Expression graph reduction for visual-effects parameter graphs.
//!
//! An [`ExprGraph`] holds typed expression nodes; a [`ReductionContext`] compiles registered
//! root expressions into reduced forms under a [`ReductionOptions`] policy, folding what can
//! be computed on the host and rewriting resource inputs into the shapes device kernels
//! consume.

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod expr;
mod expr_eval;
pub mod fingerprint;
pub mod graph;
pub mod model;
mod patch;
mod query;
pub mod report;

pub use config::{CompileTarget, ReductionConfig};
pub use context::{ReductionContext, ReductionOptions};
pub use core::{
    Attribute, AttributeLocation, BufferUsage, ExprId, InlineCode, LayoutElement,
    SkinnedMeshFrame, Value, ValueMode, ValueType, VertexChannel,
};
pub use error::{ErrorClass, VfxError, VfxResult};
pub use expr::{BinaryOp, ExprFlags, ExprKind, Operation, UnaryOp};
pub use fingerprint::{GraphFingerprint, fingerprint_reduced};
pub use graph::{CallCounts, ExprGraph, ExprNode};
pub use model::{BuiltGraph, GraphDoc, NodeDoc};
pub use report::ReducedGraphReport;
