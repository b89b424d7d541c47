use std::fmt;

use crate::{
    core::{
        Attribute, AttributeLocation, BufferUsage, InlineCode, SkinnedMeshFrame, Value, ValueMode,
        ValueType, VertexChannel,
    },
    error::{VfxError, VfxResult},
};

bitflags::bitflags! {
    /// Static capability bits of a node. Computed once at allocation, never mutated by reduction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct ExprFlags: u16 {
        const VALUE                 = 1 << 0;
        const CONSTANT              = 1 << 1;
        const FOLDABLE              = 1 << 2;
        const INVALID_CONSTANT      = 1 << 3;
        const INVALID_ON_CPU        = 1 << 4;
        const NOT_COMPILABLE_ON_CPU = 1 << 5;
    }
}

impl ExprFlags {
    /// Bits a node inherits from any of its parents.
    pub const PROPAGATED: Self = Self::INVALID_ON_CPU.union(Self::NOT_COMPILABLE_ON_CPU);

    pub fn for_mode(mode: ValueMode) -> Self {
        match mode {
            ValueMode::Constant => Self::VALUE | Self::CONSTANT | Self::FOLDABLE,
            ValueMode::FoldableVariable => Self::VALUE | Self::FOLDABLE,
            ValueMode::Variable => Self::VALUE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Value,
    Add,
    Subtract,
    Multiply,
    Divide,
    Minimum,
    Maximum,
    Absolute,
    Sine,
    Cosine,
    SquareRoot,
    MeshChannelInfos,
    SampleMeshVertexFloat,
    SampleMeshVertexFloat2,
    SampleMeshVertexFloat3,
    SampleMeshVertexFloat4,
    SampleMeshVertexColor,
    SampleMeshIndex,
    SampleSkinnedMeshVertexFloat,
    SampleSkinnedMeshVertexFloat2,
    SampleSkinnedMeshVertexFloat3,
    SampleSkinnedMeshVertexFloat4,
    SampleSkinnedMeshVertexColor,
    SampleCurve,
    SampleGradient,
    SampleBuffer,
    BufferWithUsage,
    BakeCurve,
    BakeGradient,
    VertexBufferFromMesh,
    IndexBufferFromMesh,
    VertexBufferFromSkinnedMesh,
    ReadAttribute,
    ReadEventAttribute,
    InlineHlsl,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Minimum,
    Maximum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Absolute,
    Sine,
    Cosine,
    SquareRoot,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ExprKind {
    Value {
        value: Value,
        #[serde(default)]
        mode: ValueMode,
    },
    Binary {
        func: BinaryOp,
    },
    Unary {
        func: UnaryOp,
    },
    /// Packed format/dimension/stream descriptor of one mesh vertex channel.
    MeshChannelInfos,
    SampleMeshVertex {
        channel: VertexChannel,
    },
    SampleMeshIndex,
    SampleSkinnedMeshVertex {
        channel: VertexChannel,
        frame: SkinnedMeshFrame,
    },
    SampleCurve,
    SampleGradient,
    SampleBuffer,
    /// No-op marker binding a usage kind to the buffer it wraps.
    BufferWithUsage {
        usage: BufferUsage,
    },
    BakeCurve,
    BakeGradient,
    VertexBufferFromMesh,
    IndexBufferFromMesh,
    VertexBufferFromSkinnedMesh {
        frame: SkinnedMeshFrame,
    },
    ReadAttribute {
        attribute: Attribute,
        location: AttributeLocation,
    },
    ReadEventAttribute {
        attribute: Attribute,
        offset: u32,
    },
    InlineHlsl {
        code: InlineCode,
    },
}

impl ExprKind {
    pub fn constant(value: Value) -> Self {
        Self::Value {
            value,
            mode: ValueMode::Constant,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Value { .. } => Operation::Value,
            Self::Binary { func } => match func {
                BinaryOp::Add => Operation::Add,
                BinaryOp::Subtract => Operation::Subtract,
                BinaryOp::Multiply => Operation::Multiply,
                BinaryOp::Divide => Operation::Divide,
                BinaryOp::Minimum => Operation::Minimum,
                BinaryOp::Maximum => Operation::Maximum,
            },
            Self::Unary { func } => match func {
                UnaryOp::Absolute => Operation::Absolute,
                UnaryOp::Sine => Operation::Sine,
                UnaryOp::Cosine => Operation::Cosine,
                UnaryOp::SquareRoot => Operation::SquareRoot,
            },
            Self::MeshChannelInfos => Operation::MeshChannelInfos,
            Self::SampleMeshVertex { channel } => match channel {
                VertexChannel::Float => Operation::SampleMeshVertexFloat,
                VertexChannel::Float2 => Operation::SampleMeshVertexFloat2,
                VertexChannel::Float3 => Operation::SampleMeshVertexFloat3,
                VertexChannel::Float4 => Operation::SampleMeshVertexFloat4,
                VertexChannel::Color => Operation::SampleMeshVertexColor,
            },
            Self::SampleMeshIndex => Operation::SampleMeshIndex,
            Self::SampleSkinnedMeshVertex { channel, .. } => match channel {
                VertexChannel::Float => Operation::SampleSkinnedMeshVertexFloat,
                VertexChannel::Float2 => Operation::SampleSkinnedMeshVertexFloat2,
                VertexChannel::Float3 => Operation::SampleSkinnedMeshVertexFloat3,
                VertexChannel::Float4 => Operation::SampleSkinnedMeshVertexFloat4,
                VertexChannel::Color => Operation::SampleSkinnedMeshVertexColor,
            },
            Self::SampleCurve => Operation::SampleCurve,
            Self::SampleGradient => Operation::SampleGradient,
            Self::SampleBuffer => Operation::SampleBuffer,
            Self::BufferWithUsage { .. } => Operation::BufferWithUsage,
            Self::BakeCurve => Operation::BakeCurve,
            Self::BakeGradient => Operation::BakeGradient,
            Self::VertexBufferFromMesh => Operation::VertexBufferFromMesh,
            Self::IndexBufferFromMesh => Operation::IndexBufferFromMesh,
            Self::VertexBufferFromSkinnedMesh { .. } => Operation::VertexBufferFromSkinnedMesh,
            Self::ReadAttribute { .. } => Operation::ReadAttribute,
            Self::ReadEventAttribute { .. } => Operation::ReadEventAttribute,
            Self::InlineHlsl { .. } => Operation::InlineHlsl,
        }
    }

    /// Flags owned by the kind itself, before parent propagation.
    pub fn base_flags(&self) -> ExprFlags {
        match self {
            Self::Value { value, mode } => {
                let mut flags = ExprFlags::for_mode(*mode);
                if value.value_type().is_resource() {
                    flags |= ExprFlags::INVALID_CONSTANT;
                }
                flags
            }
            Self::Binary { .. } | Self::Unary { .. } | Self::MeshChannelInfos => {
                ExprFlags::empty()
            }
            Self::SampleMeshVertex { .. }
            | Self::SampleMeshIndex
            | Self::SampleSkinnedMeshVertex { .. }
            | Self::SampleCurve
            | Self::SampleGradient
            | Self::SampleBuffer
            | Self::InlineHlsl { .. } => ExprFlags::NOT_COMPILABLE_ON_CPU,
            Self::BufferWithUsage { .. }
            | Self::BakeCurve
            | Self::BakeGradient
            | Self::VertexBufferFromMesh
            | Self::IndexBufferFromMesh
            | Self::VertexBufferFromSkinnedMesh { .. } => ExprFlags::INVALID_CONSTANT,
            Self::ReadAttribute { .. } => ExprFlags::INVALID_ON_CPU,
            Self::ReadEventAttribute { .. } => ExprFlags::empty(),
        }
    }

    pub fn inline_code(&self) -> Option<&InlineCode> {
        match self {
            Self::InlineHlsl { code } => Some(code),
            _ => None,
        }
    }

    /// Frame of a skinned mesh sampler; `None` for every kind that does not sample one.
    pub fn skinned_mesh_frame(&self) -> Option<SkinnedMeshFrame> {
        match self {
            Self::SampleSkinnedMeshVertex { frame, .. } => Some(*frame),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn value_mode(&self) -> Option<ValueMode> {
        match self {
            Self::Value { mode, .. } => Some(*mode),
            _ => None,
        }
    }

    /// Checks arity and operand types for a freshly built node and returns its value type.
    pub fn check_parents(&self, parents: &[ValueType]) -> VfxResult<ValueType> {
        let op = self.operation();
        match self {
            Self::Value { value, .. } => {
                expect_arity(op, parents, 0)?;
                Ok(value.value_type())
            }
            Self::Binary { .. } => {
                expect_arity(op, parents, 2)?;
                let (a, b) = (parents[0], parents[1]);
                if !a.is_numeric() || a != b {
                    return Err(VfxError::validation(format!(
                        "{op} expects two numeric operands of the same type, got {a:?} and {b:?}"
                    )));
                }
                Ok(a)
            }
            Self::Unary { func } => {
                expect_arity(op, parents, 1)?;
                let a = parents[0];
                let ok = match func {
                    UnaryOp::Absolute => a.is_numeric(),
                    UnaryOp::Sine | UnaryOp::Cosine | UnaryOp::SquareRoot => a.is_float(),
                };
                if !ok {
                    return Err(VfxError::validation(format!(
                        "{op} does not accept {a:?}"
                    )));
                }
                Ok(a)
            }
            Self::MeshChannelInfos => {
                expect_types(
                    op,
                    parents,
                    &[&[ValueType::Mesh, ValueType::SkinnedMeshRenderer], &[ValueType::Uint]],
                )?;
                Ok(ValueType::Uint)
            }
            Self::SampleMeshVertex { channel } => {
                expect_types(
                    op,
                    parents,
                    &[&[ValueType::Mesh], &[ValueType::Uint], &[ValueType::Uint]],
                )?;
                Ok(channel.value_type())
            }
            Self::SampleMeshIndex => {
                expect_types(op, parents, &[&[ValueType::Mesh], &[ValueType::Uint]])?;
                Ok(ValueType::Uint)
            }
            Self::SampleSkinnedMeshVertex { channel, .. } => {
                expect_types(
                    op,
                    parents,
                    &[
                        &[ValueType::SkinnedMeshRenderer],
                        &[ValueType::Uint],
                        &[ValueType::Uint],
                    ],
                )?;
                Ok(channel.value_type())
            }
            Self::SampleCurve => {
                expect_types(op, parents, &[&[ValueType::Curve], &[ValueType::Float]])?;
                Ok(ValueType::Float)
            }
            Self::SampleGradient => {
                expect_types(
                    op,
                    parents,
                    &[&[ValueType::ColorGradient], &[ValueType::Float]],
                )?;
                Ok(ValueType::Float4)
            }
            Self::SampleBuffer => {
                expect_types(op, parents, &[&[ValueType::Buffer], &[ValueType::Uint]])?;
                Ok(ValueType::Float)
            }
            Self::BufferWithUsage { .. } => {
                expect_types(op, parents, &[&[ValueType::Buffer]])?;
                Ok(ValueType::Buffer)
            }
            Self::BakeCurve => {
                expect_types(op, parents, &[&[ValueType::Curve]])?;
                Ok(ValueType::Float4)
            }
            Self::BakeGradient => {
                expect_types(op, parents, &[&[ValueType::ColorGradient]])?;
                Ok(ValueType::Float3)
            }
            Self::VertexBufferFromMesh => {
                expect_types(op, parents, &[&[ValueType::Mesh], &[ValueType::Uint]])?;
                Ok(ValueType::Buffer)
            }
            Self::IndexBufferFromMesh => {
                expect_types(op, parents, &[&[ValueType::Mesh]])?;
                Ok(ValueType::Buffer)
            }
            Self::VertexBufferFromSkinnedMesh { .. } => {
                expect_types(
                    op,
                    parents,
                    &[&[ValueType::SkinnedMeshRenderer], &[ValueType::Uint]],
                )?;
                Ok(ValueType::Buffer)
            }
            Self::ReadAttribute { attribute, .. } | Self::ReadEventAttribute { attribute, .. } => {
                expect_arity(op, parents, 0)?;
                if attribute.name.trim().is_empty() {
                    return Err(VfxError::validation("attribute name must be non-empty"));
                }
                Ok(attribute.value_type)
            }
            Self::InlineHlsl { code } => {
                if code.function.trim().is_empty() {
                    return Err(VfxError::validation(
                        "inline hlsl function name must be non-empty",
                    ));
                }
                Ok(code.value_type)
            }
        }
    }

    /// Value type of a node rebuilt over already-reduced parents. Patched parents may have
    /// changed type (a mesh becomes a vertex buffer), so operands are not re-checked here.
    pub(crate) fn rebuilt_value_type(&self, first_parent: Option<ValueType>) -> ValueType {
        match self {
            Self::Value { value, .. } => value.value_type(),
            Self::Binary { .. } | Self::Unary { .. } => first_parent.unwrap_or(ValueType::Float),
            Self::MeshChannelInfos | Self::SampleMeshIndex => ValueType::Uint,
            Self::SampleMeshVertex { channel } | Self::SampleSkinnedMeshVertex { channel, .. } => {
                channel.value_type()
            }
            Self::SampleCurve | Self::SampleBuffer => ValueType::Float,
            Self::SampleGradient | Self::BakeCurve => ValueType::Float4,
            Self::BakeGradient => ValueType::Float3,
            Self::BufferWithUsage { .. }
            | Self::VertexBufferFromMesh
            | Self::IndexBufferFromMesh
            | Self::VertexBufferFromSkinnedMesh { .. } => ValueType::Buffer,
            Self::ReadAttribute { attribute, .. } | Self::ReadEventAttribute { attribute, .. } => {
                attribute.value_type
            }
            Self::InlineHlsl { code } => code.value_type,
        }
    }
}

fn expect_arity(op: Operation, parents: &[ValueType], n: usize) -> VfxResult<()> {
    if parents.len() != n {
        return Err(VfxError::validation(format!(
            "{op} expects {n} parent(s), got {}",
            parents.len()
        )));
    }
    Ok(())
}

fn expect_types(op: Operation, parents: &[ValueType], allowed: &[&[ValueType]]) -> VfxResult<()> {
    expect_arity(op, parents, allowed.len())?;
    for (i, (ty, ok)) in parents.iter().zip(allowed).enumerate() {
        if !ok.contains(ty) {
            return Err(VfxError::validation(format!(
                "{op} parent {i} must be one of {ok:?}, got {ty:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_literals_are_never_valid_constants() {
        let mesh = ExprKind::constant(Value::Mesh("m0".to_string()));
        assert!(mesh.base_flags().contains(ExprFlags::INVALID_CONSTANT));
        assert!(mesh.base_flags().contains(ExprFlags::VALUE));

        let f = ExprKind::constant(Value::Float(1.0));
        assert_eq!(
            f.base_flags(),
            ExprFlags::VALUE | ExprFlags::CONSTANT | ExprFlags::FOLDABLE
        );
    }

    #[test]
    fn variable_mode_drops_foldable() {
        let kind = ExprKind::Value {
            value: Value::Float(1.0),
            mode: ValueMode::Variable,
        };
        assert_eq!(kind.base_flags(), ExprFlags::VALUE);
    }

    #[test]
    fn sampling_operations_are_device_only() {
        let s = ExprKind::SampleMeshVertex {
            channel: VertexChannel::Float3,
        };
        assert!(s.base_flags().contains(ExprFlags::NOT_COMPILABLE_ON_CPU));
        assert_eq!(s.operation(), Operation::SampleMeshVertexFloat3);
    }

    #[test]
    fn binary_rejects_mixed_operands() {
        let add = ExprKind::Binary {
            func: BinaryOp::Add,
        };
        assert!(
            add.check_parents(&[ValueType::Float, ValueType::Float3])
                .is_err()
        );
        assert!(add.check_parents(&[ValueType::Float]).is_err());
        assert_eq!(
            add.check_parents(&[ValueType::Float2, ValueType::Float2])
                .unwrap(),
            ValueType::Float2
        );
    }

    #[test]
    fn only_skinned_samplers_expose_a_frame() {
        let skinned = ExprKind::SampleSkinnedMeshVertex {
            channel: VertexChannel::Float3,
            frame: SkinnedMeshFrame::Previous,
        };
        assert_eq!(
            skinned.skinned_mesh_frame(),
            Some(SkinnedMeshFrame::Previous)
        );
        assert_eq!(ExprKind::SampleMeshIndex.skinned_mesh_frame(), None);
    }

    #[test]
    fn kind_json_is_tagged_by_op() {
        let kind: ExprKind = serde_json::from_str(
            r#"{"op":"read_attribute","attribute":{"name":"position","value_type":"float3"},"location":"current"}"#,
        )
        .unwrap();
        assert_eq!(kind.operation(), Operation::ReadAttribute);

        let v: ExprKind = serde_json::from_str(r#"{"op":"value","value":{"float":2.0}}"#).unwrap();
        assert_eq!(v.value_mode(), Some(ValueMode::Constant));
    }

    #[test]
    fn flags_serialize_as_names() {
        let s = serde_json::to_string(&ExprFlags::NOT_COMPILABLE_ON_CPU).unwrap();
        assert_eq!(s, r#""NOT_COMPILABLE_ON_CPU""#);
    }
}
