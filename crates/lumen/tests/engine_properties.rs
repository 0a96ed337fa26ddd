//! End-to-end checks against a headless engine: scene, renderer and events
//! working together through the public API.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use lumen::prelude::*;

const DT: Duration = Duration::from_millis(16);

fn engine(width: u32, height: u32) -> Engine<HeadlessDevice> {
    let mut engine = Engine::headless(EngineConfig::default().with_size(width, height)).unwrap();
    engine.run();
    engine
}

fn quad_node(name: &str, x: f32, y: f32, material: MaterialHandle) -> Node {
    Node::spatial2d(name, Node2dOptions::sized(10.0, 10.0).at(x, y))
        .with_render(RenderComponent2d::quad(material))
}

#[test]
fn draw_calls_follow_material_runs() {
    let mut engine = engine(800, 600);
    let a = engine.add_material(builtin::solid_color(Color::rgb(1.0, 0.0, 0.0)));
    let b = engine.add_material(builtin::solid_color(Color::rgb(0.0, 1.0, 0.0)));
    let root = engine.scene().root();
    for (i, material) in [a, b, a, b, a, b].into_iter().enumerate() {
        engine
            .scene_mut()
            .spawn_child(root, quad_node("q", 20.0 * i as f32, 50.0, material))
            .unwrap();
    }
    let stats = engine.frame(DT).unwrap().unwrap();
    assert_eq!(stats.draw_calls, 6);
    assert_eq!(stats.batches, 6);
}

#[test]
fn one_material_is_one_draw_of_six_k_indices() {
    const K: usize = 40;
    let mut engine = engine(800, 600);
    let a = engine.add_material(builtin::solid_color(Color::WHITE));
    let root = engine.scene().root();
    for i in 0..K {
        engine
            .scene_mut()
            .spawn_child(root, quad_node("q", i as f32, 0.0, a))
            .unwrap();
    }
    let stats = engine.frame(DT).unwrap().unwrap();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.indices, 6 * K);
    assert_eq!(engine.renderer().device().draws()[0].index_count, (6 * K) as u32);
}

#[test]
fn destroying_twice_frees_once() {
    let mut engine = engine(800, 600);
    let material = engine.add_material(builtin::phong_default());
    let root = engine.scene().root();
    let cube = engine.scene_mut().spawn_child(root, Node::new("cube")).unwrap();
    engine
        .scene_mut()
        .set_mesh(cube, Mesh::new(geometry::cube(1.0), material))
        .unwrap();
    engine
        .scene_mut()
        .spawn_child(root, Node::camera("cam", Camera::perspective(1.0, 1.0, 0.1, 10.0)))
        .unwrap();
    engine.frame(DT).unwrap();
    let live = engine.renderer().device().live_buffers();

    assert!(engine.destroy_node(cube));
    let after_first = engine.renderer().device().live_buffers();
    assert!(after_first < live);
    assert!(!engine.destroy_node(cube));
    assert_eq!(engine.renderer().device().live_buffers(), after_first);
    assert_eq!(engine.renderer().device().double_deletes(), 0);
}

#[test]
fn centered_box_hit_test() {
    let mut scene = Scene::new();
    let root = scene.root();
    let node = scene
        .spawn_child(root, Node::spatial2d("box", Node2dOptions::sized(100.0, 50.0)))
        .unwrap();
    assert!(scene.hit_test(node, Vec2::new(40.0, 20.0)));
    assert!(!scene.hit_test(node, Vec2::new(60.0, 0.0)));
}

#[test]
fn stop_propagation_spares_the_root() {
    let mut engine = engine(400, 400);
    let log: Rc<RefCell<Vec<&str>>> = Rc::default();
    let root = engine.scene().root();
    let scene = engine.scene_mut();
    let top = scene
        .spawn_child(root, Node::spatial2d("top", Node2dOptions::sized(300.0, 300.0).at(200.0, 200.0)))
        .unwrap();
    let mid = scene
        .spawn_child(top, Node::spatial2d("mid", Node2dOptions::sized(200.0, 200.0)))
        .unwrap();
    let leaf = scene
        .spawn_child(mid, Node::spatial2d("leaf", Node2dOptions::sized(100.0, 100.0)))
        .unwrap();

    for (node, name, result) in [
        (top, "top", Propagation::Continue),
        (mid, "mid", Propagation::Continue),
        (leaf, "leaf", Propagation::Stop),
    ] {
        let log = log.clone();
        engine
            .on(node, EventKind::TouchStart, move |_, _| {
                log.borrow_mut().push(name);
                result
            })
            .unwrap();
    }

    // Press the leaf: it stops, nothing else runs.
    engine.pointer_down(Vec2::new(200.0, 200.0));
    engine.pointer_up(Vec2::new(200.0, 200.0));
    assert_eq!(*log.borrow(), vec!["leaf"]);

    // Press mid outside the leaf: mid then top.
    log.borrow_mut().clear();
    engine.pointer_down(Vec2::new(130.0, 200.0));
    assert_eq!(*log.borrow(), vec!["mid", "top"]);
}

#[test]
fn scaled_display_maps_into_backing_pixels() {
    let mut engine = engine(800, 600);
    engine.set_view_metrics(ViewMetrics::new(Size::new(800, 600), Vec2::new(400.0, 300.0)));
    let seen = Rc::new(RefCell::new(None));
    let s = seen.clone();
    engine
        .events_mut()
        .bus_mut()
        .on(EventKind::TouchStart, move |e| *s.borrow_mut() = Some(e.position));
    engine.pointer_down(Vec2::new(200.0, 150.0));
    assert_eq!(*seen.borrow(), Some(Vec2::new(400.0, 300.0)));
}

#[test]
fn node_space_round_trip_under_nested_transforms() {
    let mut scene = Scene::new();
    let root = scene.root();
    let a = scene.spawn_child(root, Node::new("a")).unwrap();
    let b = scene.spawn_child(a, Node::new("b")).unwrap();
    scene
        .set_transform(
            a,
            Transform {
                translation: Vec3::new(3.0, -2.0, 1.0),
                rotation: Quat::from_rotation_y(0.6),
                scale: Vec3::splat(2.0),
            },
        )
        .unwrap();
    scene
        .set_transform(b, Transform::from_xyz(-7.0, 4.0, 0.5).with_rotation_z(1.2))
        .unwrap();

    for p in [Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0), Vec3::new(-40.0, 0.25, 9.0)] {
        let world = scene.convert_to_world_space(b, p).unwrap();
        let back = scene.convert_to_node_space(b, world).unwrap();
        assert!(back.abs_diff_eq(p, 1e-3), "{p} came back as {back}");
    }
}

#[test]
fn scripts_move_nodes_before_they_are_drawn() {
    let mut engine = engine(800, 600);
    let material = engine.add_material(builtin::solid_color(Color::WHITE));
    let root = engine.scene().root();
    let node = engine
        .scene_mut()
        .spawn_child(
            root,
            quad_node("mover", 0.0, 0.0, material).with_script(|scene: &mut Scene, id: NodeId, _dt: f32| {
                scene.translate(id, Vec3::new(100.0, 0.0, 0.0)).unwrap();
            }),
        )
        .unwrap();
    engine.frame(DT).unwrap();
    engine.frame(DT).unwrap();
    assert_eq!(engine.scene().node(node).unwrap().position().x, 200.0);
    assert_eq!(engine.time().frame_count(), 2);
}
