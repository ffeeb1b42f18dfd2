use super::types::Resource;

/// Errors raised across the graphics-context boundary.
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("unknown {0:?}")]
    UnknownResource(Resource),

    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },

    #[error("program `{label}` rejected: {reason}")]
    Program { label: String, reason: String },

    #[error("pixel ({x}, {y}) outside {width}x{height} target")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("no surface attached for screen drawing")]
    NoSurface,
}

impl GfxError {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { what, reason: reason.into() }
    }

    /// Errors that come from a momentary state (mid-resize readback, window
    /// without a surface) rather than a programming or device fault.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. } | Self::NoSurface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_state_errors_are_transient() {
        assert!(GfxError::OutOfBounds { x: 5, y: 0, width: 4, height: 4 }.is_transient());
        assert!(GfxError::NoSurface.is_transient());
        assert!(!GfxError::Readback("lost".into()).is_transient());
        assert!(!GfxError::invalid("texture", "zero size").is_transient());
    }
}
