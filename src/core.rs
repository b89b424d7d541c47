use std::fmt;

use crate::error::{VfxError, VfxResult};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Uint,
    Float,
    Float2,
    Float3,
    Float4,
    Curve,
    ColorGradient,
    Mesh,
    SkinnedMeshRenderer,
    Buffer,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Int | Self::Uint | Self::Float | Self::Float2 | Self::Float3 | Self::Float4
        )
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float | Self::Float2 | Self::Float3 | Self::Float4
        )
    }

    /// Resource handles are bound at runtime and never materialize as host constants.
    pub fn is_resource(self) -> bool {
        matches!(
            self,
            Self::Curve | Self::ColorGradient | Self::Mesh | Self::SkinnedMeshRenderer | Self::Buffer
        )
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
    Float2([f32; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Curve(String),
    ColorGradient(String),
    Mesh(String),
    SkinnedMeshRenderer(String),
    Buffer(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Uint(_) => ValueType::Uint,
            Self::Float(_) => ValueType::Float,
            Self::Float2(_) => ValueType::Float2,
            Self::Float3(_) => ValueType::Float3,
            Self::Float4(_) => ValueType::Float4,
            Self::Curve(_) => ValueType::Curve,
            Self::ColorGradient(_) => ValueType::ColorGradient,
            Self::Mesh(_) => ValueType::Mesh,
            Self::SkinnedMeshRenderer(_) => ValueType::SkinnedMeshRenderer,
            Self::Buffer(_) => ValueType::Buffer,
        }
    }

    /// True when every lane equals `scalar` (numeric values only).
    pub fn is_splat(&self, scalar: i32) -> bool {
        let s = scalar as f32;
        match self {
            Self::Int(v) => *v == scalar,
            Self::Uint(v) => i64::from(*v) == i64::from(scalar),
            Self::Float(v) => *v == s,
            Self::Float2(v) => v.iter().all(|x| *x == s),
            Self::Float3(v) => v.iter().all(|x| *x == s),
            Self::Float4(v) => v.iter().all(|x| *x == s),
            _ => false,
        }
    }
}

/// How a literal may be treated by folding. Ordered from strongest to weakest guarantee.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ValueMode {
    #[default]
    Constant,
    FoldableVariable,
    Variable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferUsage {
    Structured,
    ByteAddress,
    Append,
    Counter,
    Constant,
}

impl fmt::Display for BufferUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structured => "structured",
            Self::ByteAddress => "byte_address",
            Self::Append => "append",
            Self::Counter => "counter",
            Self::Constant => "constant",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value_type: ValueType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeLocation {
    /// Live per-particle value.
    Current,
    /// Snapshot taken from the source (spawn) data.
    Source,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinnedMeshFrame {
    Current,
    Previous,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexChannel {
    Float,
    Float2,
    Float3,
    Float4,
    Color,
}

impl VertexChannel {
    pub fn value_type(self) -> ValueType {
        match self {
            Self::Float => ValueType::Float,
            Self::Float2 => ValueType::Float2,
            Self::Float3 => ValueType::Float3,
            Self::Float4 | Self::Color => ValueType::Float4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct InlineCode {
    pub function: String,
    pub source: String,
    pub value_type: ValueType,
}

/// One entry of the global event attribute layout (attribute name -> storage offset).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LayoutElement {
    pub name: String,
    pub offset: u32,
}

impl LayoutElement {
    pub fn new(name: impl Into<String>, offset: u32) -> VfxResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VfxError::validation(
                "event attribute name must be non-empty",
            ));
        }
        Ok(Self { name, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splat_matches_every_lane() {
        assert!(Value::Float3([0.0, 0.0, 0.0]).is_splat(0));
        assert!(!Value::Float3([0.0, 1.0, 0.0]).is_splat(0));
        assert!(Value::Uint(1).is_splat(1));
        assert!(!Value::Mesh("m".to_string()).is_splat(0));
    }

    #[test]
    fn value_json_is_snake_case() {
        let v: Value = serde_json::from_str(r#"{"float3":[1.0,2.0,3.0]}"#).unwrap();
        assert_eq!(v, Value::Float3([1.0, 2.0, 3.0]));
        assert_eq!(v.value_type(), ValueType::Float3);

        let s = serde_json::to_string(&Value::ColorGradient("g0".to_string())).unwrap();
        assert_eq!(s, r#"{"color_gradient":"g0"}"#);
    }

    #[test]
    fn mode_order_runs_from_constant_to_variable() {
        assert!(ValueMode::Constant < ValueMode::FoldableVariable);
        assert!(ValueMode::FoldableVariable < ValueMode::Variable);
    }

    #[test]
    fn layout_element_rejects_blank_name() {
        assert!(LayoutElement::new(" ", 0).is_err());
        assert_eq!(LayoutElement::new("position", 4).unwrap().offset, 4);
    }
}
