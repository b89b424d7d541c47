use std::collections::btree_map::Entry;

use crate::{
    context::ReductionContext,
    core::{AttributeLocation, ExprId, ValueType},
    error::{VfxError, VfxResult},
    expr::{ExprKind, Operation},
    graph::ExprGraph,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PatchPolicy {
    pub(crate) insert_gpu_transformation: bool,
    pub(crate) patch_read_attribute_for_spawn: bool,
}

// Parent slot of a vertex sampler holding its channel descriptor.
const CHANNEL_INFOS_SLOT: usize = 2;

impl ReductionContext {
    /// Rewrites `input` for the edge into `target` (`None` for a root). Order is fixed: device
    /// transformation, then buffer unwrap, then the spawn attribute read.
    pub(crate) fn patch_expression(
        &mut self,
        graph: &mut ExprGraph,
        input: ExprId,
        target: Option<ExprId>,
        policy: PatchPolicy,
    ) -> VfxResult<ExprId> {
        let mut input = input;
        if policy.insert_gpu_transformation {
            input = self.insert_gpu_transformation(graph, input, target)?;
        }
        input = self.unwrap_buffer_usage(graph, input)?;
        if policy.patch_read_attribute_for_spawn {
            input = self.patch_read_attribute(graph, input)?;
        }
        Ok(input)
    }

    fn insert_gpu_transformation(
        &mut self,
        graph: &mut ExprGraph,
        input: ExprId,
        target: Option<ExprId>,
    ) -> VfxResult<ExprId> {
        let value_type = graph.node(input)?.value_type();
        let patched = match value_type {
            ValueType::ColorGradient => graph.alloc(ExprKind::BakeGradient, &[input]),
            ValueType::Curve => graph.alloc(ExprKind::BakeCurve, &[input]),
            ValueType::Mesh | ValueType::SkinnedMeshRenderer => {
                // A declared but unused mesh has no consumer to dictate the buffer layout.
                let Some(target) = target else {
                    return Ok(input);
                };
                if value_type == ValueType::Mesh {
                    self.mesh_buffer(graph, input, target)?
                } else {
                    self.skinned_mesh_buffer(graph, input, target)?
                }
            }
            _ => return Ok(input),
        };
        tracing::trace!(%input, %patched, ?value_type, "inserted gpu transformation");
        Ok(patched)
    }

    fn mesh_buffer(
        &mut self,
        graph: &mut ExprGraph,
        mesh: ExprId,
        target: ExprId,
    ) -> VfxResult<ExprId> {
        match graph.node(target)?.kind().operation() {
            Operation::SampleMeshVertexFloat
            | Operation::SampleMeshVertexFloat2
            | Operation::SampleMeshVertexFloat3
            | Operation::SampleMeshVertexFloat4
            | Operation::SampleMeshVertexColor => {
                let infos = self.channel_infos(graph, target, "mesh")?;
                Ok(graph.alloc(ExprKind::VertexBufferFromMesh, &[mesh, infos]))
            }
            Operation::SampleMeshIndex => Ok(graph.alloc(ExprKind::IndexBufferFromMesh, &[mesh])),
            other => Err(VfxError::UnexpectedSampleTarget(other.to_string())),
        }
    }

    fn skinned_mesh_buffer(
        &mut self,
        graph: &mut ExprGraph,
        skinned_mesh: ExprId,
        target: ExprId,
    ) -> VfxResult<ExprId> {
        let kind = graph.node(target)?.kind();
        let Some(frame) = kind.skinned_mesh_frame() else {
            return Err(VfxError::MissingSkinnedMeshSampler(
                kind.operation().to_string(),
            ));
        };
        let infos = self.channel_infos(graph, target, "skinned mesh")?;
        Ok(graph.alloc(
            ExprKind::VertexBufferFromSkinnedMesh { frame },
            &[skinned_mesh, infos],
        ))
    }

    // Compiles the sampler's descriptor parent; it must still be a channel descriptor.
    fn channel_infos(
        &mut self,
        graph: &mut ExprGraph,
        sampler: ExprId,
        what: &'static str,
    ) -> VfxResult<ExprId> {
        let Some(&source) = graph.node(sampler)?.parents().get(CHANNEL_INFOS_SLOT) else {
            return Err(VfxError::UnexpectedChannelInfo {
                sampler: what,
                found: "<missing>".to_string(),
            });
        };
        let infos = self.compile_node(graph, source)?;
        match graph.node(infos)?.kind() {
            ExprKind::MeshChannelInfos => Ok(infos),
            other => Err(VfxError::UnexpectedChannelInfo {
                sampler: what,
                found: format!("{} ({infos})", other.operation()),
            }),
        }
    }

    /// Skips a usage marker and records the usage of the buffer underneath it.
    fn unwrap_buffer_usage(&mut self, graph: &ExprGraph, input: ExprId) -> VfxResult<ExprId> {
        let node = graph.node(input)?;
        if node.value_type() != ValueType::Buffer {
            return Ok(input);
        }
        let ExprKind::BufferWithUsage { usage } = *node.kind() else {
            return Ok(input);
        };
        let Some(&buffer) = node.parents().first() else {
            return Err(VfxError::validation(format!(
                "buffer usage marker {input} has no buffer"
            )));
        };

        match self.buffer_usage.entry(buffer) {
            Entry::Vacant(slot) => {
                slot.insert(usage);
            }
            Entry::Occupied(slot) => {
                let registered = *slot.get();
                if registered != usage {
                    return Err(VfxError::DivergingBufferUsage {
                        buffer,
                        registered,
                        requested: usage,
                    });
                }
            }
        }
        Ok(buffer)
    }

    /// Turns a read of the live attribute into a read of the spawn event payload.
    fn patch_read_attribute(&mut self, graph: &mut ExprGraph, input: ExprId) -> VfxResult<ExprId> {
        let ExprKind::ReadAttribute {
            attribute,
            location: AttributeLocation::Current,
        } = graph.node(input)?.kind()
        else {
            return Ok(input);
        };
        let attribute = attribute.clone();

        let layout = self
            .event_attributes()
            .ok_or(VfxError::MissingEventAttributeLayout)?;
        let Some(element) = layout.iter().find(|e| e.name == attribute.name) else {
            return Err(VfxError::UnknownEventAttribute(attribute.name));
        };
        let offset = element.offset;

        let patched = graph.alloc(ExprKind::ReadEventAttribute { attribute, offset }, &[]);
        tracing::trace!(%input, %patched, offset, "patched attribute read to event attribute");
        Ok(patched)
    }
}
