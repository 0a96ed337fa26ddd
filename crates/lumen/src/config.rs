//! Engine configuration.
//!
//! [`EngineConfig`] has usable defaults, so most programs never touch a file.
//! When one is wanted, it is plain JSON; every field is optional:
//!
//! ```json
//! {
//!   "title": "sprites",
//!   "view_size": { "width": 1280, "height": 720 },
//!   "designed_size": { "width": 1280, "height": 720 },
//!   "batch": { "max_vertices": 4096, "max_indices": 6144, "overflow": "error" },
//!   "hit_policy": "all_hits",
//!   "log_filter": "lumen=debug"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::math::{Color, Size};

/// What the batch renderer does when the next drawable would not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Flush the pending batch, rebind the same material and continue.
    #[default]
    Flush,
    /// Report [`RenderError::BatchOverflow`](crate::error::RenderError::BatchOverflow).
    Error,
}

/// How many nodes a pointer event may be dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitPolicy {
    /// Stop searching at the front-most hit.
    #[default]
    FirstHit,
    /// Dispatch to every hit node, front to back.
    AllHits,
}

/// Capacity and overflow behavior of the 2D batch buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_vertices: usize,
    pub max_indices: usize,
    pub overflow: OverflowPolicy,
}

impl BatchConfig {
    /// Capacity for `quads` quads (4 vertices, 6 indices each).
    pub fn for_quads(quads: usize) -> Self {
        Self {
            max_vertices: quads * 4,
            max_indices: quads * 6,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::for_quads(4096)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window title, used by the windowed runner.
    pub title: String,
    /// Backing surface size in physical pixels.
    pub view_size: Size,
    /// Resolution of the fixed 2D orthographic projection.
    pub designed_size: Size,
    pub clear_color: Color,
    pub batch: BatchConfig,
    pub hit_policy: HitPolicy,
    /// `env_logger` filter; falls back to `RUST_LOG`, then `info`.
    pub log_filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("lumen"),
            view_size: Size::new(1280, 720),
            designed_size: Size::new(1280, 720),
            clear_color: Color::BLACK,
            batch: BatchConfig::default(),
            hit_policy: HitPolicy::default(),
            log_filter: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        let config = Self::from_json_str(&text)?;
        log::info!("loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set both the backing size and the designed size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.view_size = Size::new(width, height);
        self.designed_size = Size::new(width, height);
        self
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn default_batch_is_4096_quads() {
        let batch = BatchConfig::default();
        assert_eq!(batch, BatchConfig::for_quads(4096));
        assert_eq!(batch.max_vertices, 16384);
        assert_eq!(batch.overflow, OverflowPolicy::Flush);

        let config = EngineConfig::default().with_size(800, 600);
        assert_eq!(config.batch, batch);
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config = EngineConfig::from_json_str(
            r#"{
                "designed_size": { "width": 800, "height": 600 },
                "batch": { "max_vertices": 8, "overflow": "error" },
                "hit_policy": "all_hits"
            }"#,
        )
        .unwrap();
        assert_eq!(config.designed_size, Size::new(800, 600));
        assert_eq!(config.batch.max_vertices, 8);
        assert_eq!(config.batch.max_indices, BatchConfig::default().max_indices);
        assert_eq!(config.batch.overflow, OverflowPolicy::Error);
        assert_eq!(config.hit_policy, HitPolicy::AllHits);
        assert_eq!(config.title, "lumen");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ \"title\": 3 }").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::load("/nonexistent/lumen.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
