//! 2D sprites — batching and the transform hierarchy.
//!
//! A grid background, a row of coloured boxes that share two materials, and
//! a spinning "arm" whose children follow it. Pass an image path to draw it
//! as a sprite in the corner.
//!
//! Run with: `cargo run -p lumen --example sprites_2d [image.png]`

use lumen::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::default()
        .with_title("lumen — sprites 2d")
        .with_size(1280, 720)
        .with_clear_color(Color::rgb(0.05, 0.05, 0.08));
    init_logging(&LoggingConfig::from_filter(config.log_filter.as_deref()));
    let image = std::env::args().nth(1);

    run(config, move |engine| {
        let grid = engine.add_material(builtin::grid_background(Vec2::new(1280.0, 720.0)));
        let warm = engine.add_material(builtin::solid_color(Color::rgb(0.95, 0.55, 0.2)));
        let cool = engine.add_material(builtin::solid_color(Color::rgb(0.2, 0.6, 0.95)));

        let scene = engine.scene_mut();
        let root = scene.root();
        scene
            .spawn_child(
                root,
                Node::spatial2d("grid", Node2dOptions::sized(1280.0, 720.0).at(640.0, 360.0))
                    .with_render(RenderComponent2d::quad(grid)),
            )
            .ok();

        // Runs of the same material end up in one draw call each.
        for i in 0..12 {
            let material = if i < 6 { warm } else { cool };
            scene
                .spawn_child(
                    root,
                    Node::spatial2d(
                        format!("box-{i}"),
                        Node2dOptions::sized(60.0, 60.0).at(100.0 + i as f32 * 90.0, 620.0),
                    )
                    .with_render(RenderComponent2d::quad(material)),
                )
                .ok();
        }

        let mut angle = 0.0;
        let arm = Node::spatial2d("arm", Node2dOptions::sized(300.0, 20.0).at(640.0, 300.0))
            .with_render(RenderComponent2d::quad(warm))
            .with_script(move |scene: &mut Scene, node: NodeId, dt: f32| {
                angle += dt;
                scene.set_rotation(node, angle).ok();
            });
        let Ok(arm) = scene.spawn_child(root, arm) else {
            return;
        };
        for x in [-150.0, 150.0] {
            scene
                .spawn_child(
                    arm,
                    Node::spatial2d("tip", Node2dOptions::sized(40.0, 40.0).at(x, 0.0))
                        .with_render(RenderComponent2d::quad(cool)),
                )
                .ok();
        }

        if let Some(path) = &image {
            match engine.load_texture(path) {
                Ok(info) => {
                    let sprite = engine.add_material(builtin::sprite(info.id));
                    let options = Node2dOptions::sized(info.width as f32, info.height as f32)
                        .with_anchor(0.0, 0.0)
                        .at(20.0, 20.0);
                    let scene = engine.scene_mut();
                    let root = scene.root();
                    scene
                        .spawn_child(root, Node::spatial2d("image", options).with_render(RenderComponent2d::quad(sprite)))
                        .ok();
                }
                Err(e) => log::warn!("{e}"),
            }
        }
    })?;
    Ok(())
}
