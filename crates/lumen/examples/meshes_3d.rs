//! 3D meshes — cameras, Phong and unlit materials.
//!
//! A spinning Phong-shaded cube orbited by a smaller unlit one, seen from a
//! perspective camera.
//!
//! Run with: `cargo run -p lumen --example meshes_3d`

use lumen::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::default()
        .with_title("lumen — meshes 3d")
        .with_size(1280, 720)
        .with_clear_color(Color::rgb(0.02, 0.02, 0.04));
    init_logging(&LoggingConfig::from_filter(config.log_filter.as_deref()));

    run(config, |engine| {
        let phong = engine.add_material(builtin::phong(Vec3::new(0.8, 0.3, 0.2), Vec3::ONE));
        let white = engine.renderer().white_texture();
        let unlit = engine.add_material(builtin::unlit(white));

        let scene = engine.scene_mut();
        let root = scene.root();
        let camera = Node::camera("camera", Camera::perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0))
            .with_transform(Transform::from_xyz(0.0, 1.5, 6.0));
        scene.spawn_child(root, camera).ok();

        let mut angle = 0.0;
        let cube = Node::new("cube").with_script(move |scene: &mut Scene, node: NodeId, dt: f32| {
            angle += dt * 0.8;
            let spin = Transform {
                rotation: Quat::from_rotation_y(angle) * Quat::from_rotation_x(0.4),
                ..Transform::default()
            };
            scene.set_transform(node, spin).ok();
        });
        let Ok(cube) = scene.spawn_child(root, cube) else {
            return;
        };
        scene.set_mesh(cube, Mesh::new(geometry::cube(2.0), phong)).ok();

        let Ok(moon) = scene.spawn_child(cube, Node::new("moon")) else {
            return;
        };
        scene.set_position(moon, Vec3::new(2.5, 0.0, 0.0)).ok();
        scene.set_mesh(moon, Mesh::new(geometry::cube(0.5), unlit)).ok();
    })?;
    Ok(())
}
