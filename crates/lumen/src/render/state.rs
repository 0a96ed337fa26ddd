//! Fixed-function pipeline state: culling, depth, blending.
//!
//! Each material pass carries one [`PipelineState`]. The default is the
//! opaque-3D setup: back-face culling, depth test and write on, blending off
//! (with `SrcAlpha / OneMinusSrcAlpha` ready for when it is switched on).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub compare: CompareFunction,
}

impl DepthState {
    pub const DISABLED: Self = Self {
        test: false,
        write: false,
        compare: CompareFunction::Always,
    };
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test: true,
            write: true,
            compare: CompareFunction::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendState {
    /// Straight alpha blending.
    pub const ALPHA: Self = Self {
        enabled: true,
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            ..Self::ALPHA
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PipelineState {
    pub cull: CullMode,
    pub depth: DepthState,
    pub blend: BlendState,
}

impl PipelineState {
    /// No culling, no depth, alpha blending: the setup for 2D quads.
    pub fn transparent_2d() -> Self {
        Self {
            cull: CullMode::None,
            depth: DepthState::DISABLED,
            blend: BlendState::ALPHA,
        }
    }

    pub fn with_cull(mut self, cull: CullMode) -> Self {
        self.cull = cull;
        self
    }

    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = blend;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_opaque_3d() {
        let state = PipelineState::default();
        assert_eq!(state.cull, CullMode::Back);
        assert!(state.depth.test && state.depth.write);
        assert!(!state.blend.enabled);
        assert_eq!(state.blend.src, BlendFactor::SrcAlpha);
        assert_eq!(state.blend.dst, BlendFactor::OneMinusSrcAlpha);
    }
}
