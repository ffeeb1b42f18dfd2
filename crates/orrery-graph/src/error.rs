use orrery_engine::gfx::GfxError;

use crate::Id;

/// Error category, matching how callers are expected to react.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// Bad mapping or field-type declaration; fix the caller.
    Configuration,
    /// A record references something that does not exist.
    Reference,
    /// A finite resource (picking ids, atlas space) ran out.
    ResourceExhaustion,
    /// Momentary GPU state; retry later.
    Transient,
    /// Any other graphics-context failure.
    Graphics,
}

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unknown point id {0}")]
    UnknownPoint(Id),

    #[error("no graph loaded")]
    NotLoaded,

    #[error("picking ids exhausted: requested {requested}, {available} free")]
    PickingExhausted { requested: u32, available: u32 },

    #[error("label atlas would exceed {max_size}x{max_size}")]
    AtlasOverflow { max_size: u32 },

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

impl GraphError {
    pub fn config<T: ToString>(msg: T) -> Self {
        GraphError::Configuration(msg.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::Configuration(_) => ErrorKind::Configuration,
            GraphError::UnknownPoint(_) | GraphError::NotLoaded => ErrorKind::Reference,
            GraphError::PickingExhausted { .. } | GraphError::AtlasOverflow { .. } => {
                ErrorKind::ResourceExhaustion
            }
            GraphError::Gfx(e) if e.is_transient() => ErrorKind::Transient,
            GraphError::Gfx(_) => ErrorKind::Graphics,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
