//! # Scripts — Per-Node Behaviour Hooks
//!
//! A [`Script`] is attached to a node and driven by the engine every frame:
//! `init` once before the first `update`, then `update(dt)` each frame, in
//! pre-order traversal of the scene. `on_destroy` runs when the node is
//! destroyed.
//!
//! Any `FnMut(&mut Scene, NodeId, f32)` closure is a script, so simple
//! behaviours need no type of their own:
//!
//! ```ignore
//! let spinner = Node::spatial2d("spinner", opts).with_script(
//!     |scene: &mut Scene, me: NodeId, dt: f32| {
//!         let angle = scene.node(me).unwrap().spatial().unwrap().rotation();
//!         let _ = scene.set_rotation(me, angle + dt);
//!     },
//! );
//! ```
//!
//! ## Borrowing
//!
//! Scripts receive `&mut Scene`, which owns the script itself. Before a
//! node's scripts run, they are taken out of the node and put back
//! afterwards, so the call never aliases its own storage. Scripts may move,
//! attach, or destroy nodes; scripts added to a node during its own update
//! are kept and start next frame.

use crate::error::SceneError;

use super::node::NodeId;
use super::Scene;

pub trait Script {
    /// Called once, before the first `update`.
    fn init(&mut self, _scene: &mut Scene, _node: NodeId) {}

    fn update(&mut self, scene: &mut Scene, node: NodeId, dt: f32);

    /// Called when the owning node is destroyed.
    fn on_destroy(&mut self, _node: NodeId) {}
}

impl<F: FnMut(&mut Scene, NodeId, f32)> Script for F {
    fn update(&mut self, scene: &mut Scene, node: NodeId, dt: f32) {
        (self)(scene, node, dt);
    }
}

pub(crate) struct ScriptSlot {
    pub script: Box<dyn Script>,
    initialized: bool,
}

impl ScriptSlot {
    pub fn new(script: Box<dyn Script>) -> Self {
        Self {
            script,
            initialized: false,
        }
    }
}

impl Scene {
    pub fn add_script(
        &mut self,
        id: NodeId,
        script: impl Script + 'static,
    ) -> Result<(), SceneError> {
        let node = self.node_mut(id).ok_or(SceneError::StaleNode(id))?;
        node.scripts.push(ScriptSlot::new(Box::new(script)));
        Ok(())
    }

    /// Run every script once, in pre-order. Inactive subtrees are skipped.
    /// Returns the number of script `update` calls made.
    pub fn run_scripts(&mut self, dt: f32) -> usize {
        let mut order = Vec::new();
        self.walk(self.root(), |n| n.active, |id, n| {
            if n.active && !n.scripts.is_empty() {
                order.push(id);
            }
        });

        let mut calls = 0;
        for id in order {
            // Extract, run, reinsert.
            let Some(mut slots) = self.node_mut(id).map(|n| std::mem::take(&mut n.scripts))
            else {
                continue;
            };
            for slot in &mut slots {
                if !self.contains(id) {
                    break;
                }
                if !slot.initialized {
                    slot.initialized = true;
                    slot.script.init(self, id);
                }
                slot.script.update(self, id, dt);
                calls += 1;
            }
            match self.node_mut(id) {
                Some(node) => {
                    let added = std::mem::replace(&mut node.scripts, slots);
                    node.scripts.extend(added);
                }
                // The node destroyed itself; its scripts never got on_destroy.
                None => {
                    for slot in &mut slots {
                        slot.script.on_destroy(id);
                    }
                }
            }
        }
        calls
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::math::Vec3;
    use crate::render::HeadlessDevice;
    use crate::scene::Node;

    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
        tag: &'static str,
    }

    impl Script for Recorder {
        fn init(&mut self, _scene: &mut Scene, _node: NodeId) {
            self.log.borrow_mut().push(format!("init {}", self.tag));
        }

        fn update(&mut self, _scene: &mut Scene, _node: NodeId, _dt: f32) {
            self.log.borrow_mut().push(format!("update {}", self.tag));
        }

        fn on_destroy(&mut self, _node: NodeId) {
            self.log.borrow_mut().push(format!("destroy {}", self.tag));
        }
    }

    #[test]
    fn scripts_run_in_pre_order_and_init_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let rec = |tag| Recorder {
            log: log.clone(),
            tag,
        };
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn_child(root, Node::new("a").with_script(rec("a"))).unwrap();
        scene.spawn_child(a, Node::new("a1").with_script(rec("a1"))).unwrap();
        scene.spawn_child(root, Node::new("b").with_script(rec("b"))).unwrap();

        assert_eq!(scene.run_scripts(0.016), 3);
        assert_eq!(scene.run_scripts(0.016), 3);
        assert_eq!(
            *log.borrow(),
            vec![
                "init a", "update a", "init a1", "update a1", "init b", "update b", "update a",
                "update a1", "update b",
            ]
        );
    }

    #[test]
    fn closure_scripts_can_move_their_node() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mover = scene
            .spawn_child(
                root,
                Node::new("mover").with_script(|scene: &mut Scene, me: NodeId, dt: f32| {
                    let _ = scene.translate(me, Vec3::new(10.0 * dt, 0.0, 0.0));
                }),
            )
            .unwrap();
        scene.run_scripts(0.5);
        scene.run_scripts(0.5);
        assert!(scene.node(mover).unwrap().position().abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn inactive_nodes_do_not_update() {
        let mut scene = Scene::new();
        let root = scene.root();
        let id = scene
            .spawn_child(
                root,
                Node::new("off")
                    .with_active(false)
                    .with_script(|_: &mut Scene, _: NodeId, _: f32| {}),
            )
            .unwrap();
        assert_eq!(scene.run_scripts(0.1), 0);
        assert!(scene.contains(id));
    }

    #[test]
    fn destroy_calls_on_destroy() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scene = Scene::new();
        let root = scene.root();
        let id = scene
            .spawn_child(
                root,
                Node::new("n").with_script(Recorder {
                    log: log.clone(),
                    tag: "n",
                }),
            )
            .unwrap();
        let mut device = HeadlessDevice::new();
        scene.destroy(id, &mut device);
        scene.destroy(id, &mut device);
        assert_eq!(*log.borrow(), vec!["destroy n"]);
    }
}
