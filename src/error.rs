use crate::core::{BufferUsage, ExprId};

pub type VfxResult<T> = Result<T, VfxError>;

/// Coarse grouping of [`VfxError`] so callers can tell bad policy from bad graph shape from
/// missing external data without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Structure,
    Consistency,
    Lookup,
    Validation,
    Evaluation,
    Serialization,
    Other,
}

#[derive(thiserror::Error, Debug)]
pub enum VfxError {
    #[error("invalid reduction options: {0}")]
    InvalidOptions(String),

    #[error("unexpected expression in {sampler} sampling: {found}")]
    UnexpectedChannelInfo { sampler: &'static str, found: String },

    #[error("unexpected source operation for gpu transformation: {0}")]
    UnexpectedSampleTarget(String),

    #[error("skinned mesh consumer '{0}' does not sample a skinned mesh")]
    MissingSkinnedMeshSampler(String),

    #[error("diverging usage for graphics buffer {buffer}: {registered}, {requested}")]
    DivergingBufferUsage {
        buffer: ExprId,
        registered: BufferUsage,
        requested: BufferUsage,
    },

    #[error("global event attribute layout is missing")]
    MissingEventAttributeLayout,

    #[error("unable to find '{0}' in global event attribute layout")]
    UnknownEventAttribute(String),

    #[error("unknown expression {0}")]
    UnknownExpression(ExprId),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VfxError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidOptions(_) => ErrorClass::Configuration,
            Self::UnexpectedChannelInfo { .. }
            | Self::UnexpectedSampleTarget(_)
            | Self::MissingSkinnedMeshSampler(_)
            | Self::UnknownExpression(_) => ErrorClass::Structure,
            Self::DivergingBufferUsage { .. } => ErrorClass::Consistency,
            Self::MissingEventAttributeLayout | Self::UnknownEventAttribute(_) => {
                ErrorClass::Lookup
            }
            Self::Validation(_) => ErrorClass::Validation,
            Self::Evaluation(_) => ErrorClass::Evaluation,
            Self::Serde(_) => ErrorClass::Serialization,
            Self::Other(_) => ErrorClass::Other,
        }
    }
}
