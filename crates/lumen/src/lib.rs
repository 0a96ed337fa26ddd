//! # Lumen — Retained-Mode Rendering Core
//!
//! A scene graph with eagerly propagated world matrices, a batched 2D
//! renderer that flushes on material change, a material/effect system over
//! a pluggable graphics device, and pointer hit testing with bubbling.
//!
//! Start with `use lumen::prelude::*`, build an [`Engine`](engine::Engine)
//! (headless for tests and tools, or through [`window::run`] with the
//! default `windowed` feature) and populate its [`Scene`](scene::Scene).

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod logging;
pub mod math;
pub mod prelude;
pub mod render;
pub mod render2d;
pub mod scene;
pub mod time;

#[cfg(feature = "windowed")]
pub mod window;
