//! Error types.
//!
//! Errors fall into two groups. Fatal setup failures ([`GraphicsError`]) abort
//! the call that triggered them: engine construction, material compilation,
//! buffer creation. Everything a frame can trip over at runtime is either a
//! silent no-op or a [`RenderError`] that the frame loop logs before moving on
//! to the next frame.

use std::fmt;

use crate::scene::NodeId;

// ── GraphicsError ───────────────────────────────────────────────────────

/// Failures reported by a [`GraphicsDevice`](crate::render::GraphicsDevice).
#[derive(Debug)]
pub enum GraphicsError {
    /// A vertex or index buffer could not be created.
    BufferCreation(String),
    /// A shader program failed to compile or link.
    ProgramCreation { label: String, reason: String },
    /// A texture could not be created.
    TextureCreation(String),
    /// No suitable GPU adapter, or the device request was refused.
    DeviceRequest(String),
    /// The presentation surface could not be created or acquired.
    Surface(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::BufferCreation(e) => write!(f, "buffer creation failed: {e}"),
            GraphicsError::ProgramCreation { label, reason } => {
                write!(f, "shader program '{label}' failed to compile: {reason}")
            }
            GraphicsError::TextureCreation(e) => write!(f, "texture creation failed: {e}"),
            GraphicsError::DeviceRequest(e) => write!(f, "GPU device request failed: {e}"),
            GraphicsError::Surface(e) => write!(f, "surface error: {e}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

// ── SceneError ──────────────────────────────────────────────────────────

/// Rejected scene-graph mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The handle refers to a destroyed node (or one from another scene).
    StaleNode(NodeId),
    /// The node already has a parent; detach it first.
    AlreadyAttached(NodeId),
    /// Attaching would make a node its own ancestor.
    WouldCreateCycle { child: NodeId, parent: NodeId },
    /// The operation needs a different kind of node.
    WrongKind { node: NodeId, expected: &'static str },
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::StaleNode(id) => write!(f, "node {id} has been destroyed"),
            SceneError::AlreadyAttached(id) => write!(f, "node {id} already has a parent"),
            SceneError::WouldCreateCycle { child, parent } => {
                write!(f, "attaching {child} under {parent} would create a cycle")
            }
            SceneError::WrongKind { node, expected } => {
                write!(f, "node {node} is not a {expected} node")
            }
        }
    }
}

impl std::error::Error for SceneError {}

// ── RenderError ─────────────────────────────────────────────────────────

/// Errors surfaced by [`Renderer::render`](crate::render::Renderer::render).
#[derive(Debug)]
pub enum RenderError {
    Graphics(GraphicsError),
    /// A drawable needs more vertices or indices than the batch can hold,
    /// or the batch filled up under [`OverflowPolicy::Error`](crate::config::OverflowPolicy).
    BatchOverflow {
        vertices: usize,
        indices: usize,
        max_vertices: usize,
        max_indices: usize,
    },
}

impl RenderError {
    /// Fatal errors should stop the frame loop; the rest only cost one frame.
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::Graphics(GraphicsError::Surface(_)) => false,
            RenderError::Graphics(_) => true,
            RenderError::BatchOverflow { .. } => false,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Graphics(e) => write!(f, "{e}"),
            RenderError::BatchOverflow {
                vertices,
                indices,
                max_vertices,
                max_indices,
            } => write!(
                f,
                "batch overflow: need {vertices} vertices / {indices} indices, \
                 capacity is {max_vertices} / {max_indices}"
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Graphics(e) => Some(e),
            RenderError::BatchOverflow { .. } => None,
        }
    }
}

impl From<GraphicsError> for RenderError {
    fn from(e: GraphicsError) -> Self {
        RenderError::Graphics(e)
    }
}

// ── ConfigError ─────────────────────────────────────────────────────────

/// Failures while loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read config: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

// ── TextureError ────────────────────────────────────────────────────────

/// Failures while loading a texture from disk.
#[derive(Debug)]
pub enum TextureError {
    Decode { path: String, source: image::ImageError },
    Graphics(GraphicsError),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::Decode { path, source } => {
                write!(f, "failed to load texture '{path}': {source}")
            }
            TextureError::Graphics(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::Decode { source, .. } => Some(source),
            TextureError::Graphics(e) => Some(e),
        }
    }
}

impl From<GraphicsError> for TextureError {
    fn from(e: GraphicsError) -> Self {
        TextureError::Graphics(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_errors_are_not_fatal() {
        let e = RenderError::from(GraphicsError::Surface("outdated".into()));
        assert!(!e.is_fatal());
        let e = RenderError::from(GraphicsError::ProgramCreation {
            label: "sprite".into(),
            reason: "syntax".into(),
        });
        assert!(e.is_fatal());
    }

    #[test]
    fn display_mentions_capacity() {
        let e = RenderError::BatchOverflow {
            vertices: 8,
            indices: 12,
            max_vertices: 4,
            max_indices: 6,
        };
        assert!(e.to_string().contains("capacity is 4 / 6"));
    }

    #[test]
    fn texture_errors_expose_their_cause() {
        use std::error::Error;

        let e = TextureError::from(GraphicsError::Surface("lost".into()));
        let cause = e.source().unwrap();
        assert_eq!(cause.to_string(), "surface error: lost");
    }
}
