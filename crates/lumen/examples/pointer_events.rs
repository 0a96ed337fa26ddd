//! Pointer events — hit testing, bubbling, and dragging.
//!
//! Three nested boxes. A press on the inner box bubbles to the middle one,
//! whose handler stops propagation, so the outer box never sees it. Drag the
//! outer box by its border to move all three; the event bus logs every press
//! regardless of hits.
//!
//! Run with: `cargo run -p lumen --example pointer_events`

use std::cell::Cell;
use std::rc::Rc;

use lumen::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::default()
        .with_title("lumen — pointer events")
        .with_size(960, 640)
        .with_clear_color(Color::rgb(0.08, 0.08, 0.1));
    init_logging(&LoggingConfig::from_filter(config.log_filter.as_deref()));

    run(config, |engine| {
        let outer_mat = engine.add_material(builtin::solid_color(Color::rgb(0.3, 0.3, 0.35)));
        let mid_mat = engine.add_material(builtin::solid_color(Color::rgb(0.2, 0.5, 0.8)));
        let inner_mat = engine.add_material(builtin::solid_color(Color::rgb(0.9, 0.4, 0.3)));

        let scene = engine.scene_mut();
        let root = scene.root();
        let spawn = |scene: &mut Scene, parent, name: &str, size: f32, x: f32, y: f32, material| {
            scene.spawn_child(
                parent,
                Node::spatial2d(name, Node2dOptions::sized(size, size).at(x, y))
                    .with_render(RenderComponent2d::quad(material)),
            )
        };
        let Ok(outer) = spawn(scene, root, "outer", 400.0, 480.0, 320.0, outer_mat) else {
            return;
        };
        let Ok(mid) = spawn(scene, outer, "mid", 220.0, 0.0, 0.0, mid_mat) else {
            return;
        };
        let Ok(inner) = spawn(scene, mid, "inner", 90.0, 0.0, 0.0, inner_mat) else {
            return;
        };

        engine.events_mut().bus_mut().on(EventKind::TouchStart, |e| {
            log::info!("press at ({:.0}, {:.0})", e.x(), e.y());
        });

        for (node, name) in [(outer, "outer"), (mid, "mid"), (inner, "inner")] {
            engine
                .on(node, EventKind::TouchStart, move |_, e| {
                    log::info!("{name} got touch_start (target {:?})", e.target);
                    if name == "mid" {
                        Propagation::Stop
                    } else {
                        Propagation::Continue
                    }
                })
                .ok();
        }

        // Drag the outer box, and everything inside it with it.
        let origin = Rc::new(Cell::new(Vec3::ZERO));
        let start = origin.clone();
        engine
            .on(outer, EventKind::TouchStart, move |scene, _| {
                if let Some(node) = scene.node(outer) {
                    start.set(node.position());
                }
                Propagation::Continue
            })
            .ok();
        engine
            .on(outer, EventKind::Touching, move |scene, e| {
                scene.set_position(outer, origin.get() + e.delta.extend(0.0)).ok();
                Propagation::Continue
            })
            .ok();
        engine
            .on(outer, EventKind::TouchEnd, |_, e| {
                log::info!("dragged by ({:.0}, {:.0})", e.delta.x, e.delta.y);
                Propagation::Continue
            })
            .ok();
    })?;
    Ok(())
}
