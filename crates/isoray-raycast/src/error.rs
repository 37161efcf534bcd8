//! Error types for the ray caster.

use thiserror::Error;

/// Errors that can occur while setting up a render.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Invalid render settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Invalid transfer function table.
    #[error("invalid transfer function: {0}")]
    InvalidTransfer(String),

    /// Texture data does not match its declared size.
    #[error("texture is {width}x{height} but got {len} values")]
    TextureSize {
        /// Declared width.
        width: usize,
        /// Declared height.
        height: usize,
        /// Number of values supplied.
        len: usize,
    },

    /// A texture needs at least one texel in each direction.
    #[error("texture must be at least 1x1, got {width}x{height}")]
    EmptyTexture {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },
}

/// Result type for ray casting operations.
pub type Result<T> = std::result::Result<T, RenderError>;
