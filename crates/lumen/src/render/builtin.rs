//! Built-in materials.
//!
//! | Material            | Used for      | Properties                                   | State                         |
//! |---------------------|---------------|----------------------------------------------|-------------------------------|
//! | [`sprite`]          | 2D quads      | `u_tex`, `u_texTransform`                    | blend on, depth off, no cull  |
//! | [`solid_color`]     | 2D quads      | `u_color`                                    | blend on, depth off, no cull  |
//! | [`grid_background`] | 2D backdrop   | `u_resolution`                               | blend on, depth off, no cull  |
//! | [`unlit`]           | 3D meshes     | `u_tex`, `u_texTransform`                    | blend on, depth on, back cull |
//! | [`phong`]           | 3D meshes     | `u_gloss`, `u_diffuse`, `u_specular`         | opaque, depth on, back cull   |
//!
//! The renderer supplies `u_proj` (and for meshes `u_viewInv`, `u_world`,
//! `u_cameraPos`, `u_lightDir`) each draw.

use crate::math::{Color, Vec2, Vec3, Vec4};

use super::device::{ShaderSource, TextureId, UniformKind, VertexFormat};
use super::effect::Effect;
use super::geometry::{ATTR_NORMAL, ATTR_POSITION, ATTR_UV};
use super::material::Material;
use super::state::{BlendState, PipelineState};

pub const U_PROJ: &str = "u_proj";
pub const U_VIEW_INV: &str = "u_viewInv";
pub const U_WORLD: &str = "u_world";
pub const U_CAMERA_POS: &str = "u_cameraPos";
pub const U_LIGHT_DIR: &str = "u_lightDir";
pub const U_TEX: &str = "u_tex";
pub const U_TEX_TRANSFORM: &str = "u_texTransform";
pub const U_COLOR: &str = "u_color";
pub const U_RESOLUTION: &str = "u_resolution";
pub const U_GLOSS: &str = "u_gloss";
pub const U_DIFFUSE: &str = "u_diffuse";
pub const U_SPECULAR: &str = "u_specular";

/// Offset `(0, 0)`, scale `(1, 1)`: the whole texture.
pub const FULL_TEXTURE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

/// Direction the mesh light travels in.
pub const LIGHT_DIRECTION: Vec3 = Vec3::new(-1.0, -0.4, -1.0);

pub fn sprite(texture: TextureId) -> Material {
    let shader = ShaderSource::new("sprite", include_str!("shaders/sprite.wgsl"))
        .attribute(ATTR_POSITION, VertexFormat::Float32x3)
        .attribute(ATTR_UV, VertexFormat::Float32x2)
        .uniform(U_PROJ, UniformKind::Mat4)
        .uniform(U_TEX_TRANSFORM, UniformKind::Vec4)
        .uniform(U_TEX, UniformKind::Texture);
    Material::new("sprite", Effect::single(shader, PipelineState::transparent_2d()))
        .with_property(U_TEX, texture)
        .with_property(U_TEX_TRANSFORM, FULL_TEXTURE)
}

pub fn solid_color(color: Color) -> Material {
    let shader = ShaderSource::new("solid_color", include_str!("shaders/solid_color.wgsl"))
        .attribute(ATTR_POSITION, VertexFormat::Float32x3)
        .uniform(U_PROJ, UniformKind::Mat4)
        .uniform(U_COLOR, UniformKind::Vec4);
    Material::new(
        "solid_color",
        Effect::single(shader, PipelineState::transparent_2d()),
    )
    .with_property(U_COLOR, color)
}

/// Gradient-and-grid backdrop. `resolution` is the area the gradient spans,
/// usually the designed size.
pub fn grid_background(resolution: Vec2) -> Material {
    let shader = ShaderSource::new("grid_background", include_str!("shaders/grid_background.wgsl"))
        .attribute(ATTR_POSITION, VertexFormat::Float32x3)
        .uniform(U_PROJ, UniformKind::Mat4)
        .uniform(U_RESOLUTION, UniformKind::Vec2);
    Material::new(
        "grid_background",
        Effect::single(shader, PipelineState::transparent_2d()),
    )
    .with_property(U_RESOLUTION, resolution)
}

pub fn unlit(texture: TextureId) -> Material {
    let shader = ShaderSource::new("unlit", include_str!("shaders/unlit.wgsl"))
        .attribute(ATTR_POSITION, VertexFormat::Float32x3)
        .attribute(ATTR_UV, VertexFormat::Float32x2)
        .uniform(U_PROJ, UniformKind::Mat4)
        .uniform(U_VIEW_INV, UniformKind::Mat4)
        .uniform(U_WORLD, UniformKind::Mat4)
        .uniform(U_TEX_TRANSFORM, UniformKind::Vec4)
        .uniform(U_TEX, UniformKind::Texture);
    let state = PipelineState::default().with_blend(BlendState::ALPHA);
    Material::new("unlit", Effect::single(shader, state))
        .with_property(U_TEX, texture)
        .with_property(U_TEX_TRANSFORM, FULL_TEXTURE)
}

/// Blinn-Phong with one directional light. Gloss starts at 80.
pub fn phong(diffuse: Vec3, specular: Vec3) -> Material {
    let shader = ShaderSource::new("phong", include_str!("shaders/phong.wgsl"))
        .attribute(ATTR_POSITION, VertexFormat::Float32x3)
        .attribute(ATTR_NORMAL, VertexFormat::Float32x3)
        .uniform(U_PROJ, UniformKind::Mat4)
        .uniform(U_VIEW_INV, UniformKind::Mat4)
        .uniform(U_WORLD, UniformKind::Mat4)
        .uniform(U_CAMERA_POS, UniformKind::Vec3)
        .uniform(U_LIGHT_DIR, UniformKind::Vec3)
        .uniform(U_GLOSS, UniformKind::Float)
        .uniform(U_DIFFUSE, UniformKind::Vec3)
        .uniform(U_SPECULAR, UniformKind::Vec3);
    Material::new("phong", Effect::single(shader, PipelineState::default()))
        .with_property(U_GLOSS, 80.0)
        .with_property(U_DIFFUSE, diffuse)
        .with_property(U_SPECULAR, specular)
}

/// [`phong`] with mid-grey diffuse and white specular.
pub fn phong_default() -> Material {
    phong(Vec3::splat(0.5), Vec3::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::UniformValue;
    use crate::render::state::CullMode;

    #[test]
    fn sprite_defaults() {
        let material = sprite(TextureId(1));
        assert_eq!(material.property(U_TEX), Some(UniformValue::Texture(TextureId(1))));
        assert_eq!(material.property(U_TEX_TRANSFORM), Some(UniformValue::Vec4(FULL_TEXTURE)));
        let state = material.effect().passes()[0].state;
        assert!(state.blend.enabled && !state.depth.test);
        assert_eq!(state.cull, CullMode::None);
    }

    #[test]
    fn phong_defaults() {
        let material = phong_default();
        assert_eq!(material.property(U_GLOSS), Some(UniformValue::Float(80.0)));
        assert_eq!(material.property(U_DIFFUSE), Some(UniformValue::Vec3(Vec3::splat(0.5))));
        let state = material.effect().passes()[0].state;
        assert!(state.depth.test && !state.blend.enabled);
    }

    #[test]
    fn every_shader_declares_position() {
        let materials = [
            sprite(TextureId(0)),
            solid_color(Color::WHITE),
            grid_background(Vec2::ONE),
            unlit(TextureId(0)),
            phong_default(),
        ];
        for material in &materials {
            let shader = &material.effect().passes()[0].shader;
            assert_eq!(shader.attributes[0].name, ATTR_POSITION, "{}", material.name());
            assert!(shader.wgsl.contains("fn vs_main"));
        }
    }
}
