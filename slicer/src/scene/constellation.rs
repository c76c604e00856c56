use tracing::warn;

use crate::{
    scene::{File, Node, ObjectId},
    transform::Placement,
};

/// A placed reference to an object or a constellation.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    pub target: ObjectId,
    pub placement: Placement,
}

/// A named group of instances. Constellations may contain each other, the
/// graph is walked by id so cycles are detected rather than followed.
#[derive(Clone, Debug, PartialEq)]
pub struct Constellation {
    pub id: ObjectId,
    pub name: Option<String>,
    pub instances: Vec<Instance>,
}

impl Instance {
    pub fn new(target: ObjectId, placement: Placement) -> Self {
        Self { target, placement }
    }
}

impl Constellation {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            name: None,
            instances: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn add_instance(&mut self, target: ObjectId, placement: Placement) {
        self.instances.push(Instance::new(target, placement));
    }

    /// Every object instance reachable from this constellation, with the
    /// placements along the way composed onto `base`. Without `recursive`
    /// nested constellations are skipped.
    pub fn flatten_instances(
        &self,
        file: &File,
        recursive: bool,
        base: &Placement,
    ) -> Vec<Instance> {
        let mut out = Vec::new();
        let mut stack = vec![self.id];
        self.flatten_into(file, recursive, base, &mut stack, &mut out);
        out
    }

    fn flatten_into(
        &self,
        file: &File,
        recursive: bool,
        base: &Placement,
        stack: &mut Vec<ObjectId>,
        out: &mut Vec<Instance>,
    ) {
        for instance in &self.instances {
            let placement = base * &instance.placement;
            match file.node(instance.target) {
                Some(Node::Object(_)) => out.push(Instance::new(instance.target, placement)),
                Some(Node::Constellation(child)) => {
                    if stack.contains(&child.id) {
                        warn!(
                            "Loop in constellation topology! Topology path: {}",
                            topology_path(stack, child.id)
                        );
                        continue;
                    }

                    if recursive {
                        stack.push(child.id);
                        child.flatten_into(file, recursive, &placement, stack, out);
                        stack.pop();
                    }
                }
                None => warn!(
                    "Constellation {} references unknown id {}",
                    self.id, instance.target
                ),
            }
        }
    }

    /// The distinct objects reachable from this constellation, in first
    /// seen order.
    pub fn objects(&self, file: &File, recursive: bool) -> Vec<ObjectId> {
        let mut out = Vec::new();
        for instance in self.flatten_instances(file, recursive, &Placement::identity()) {
            if !out.contains(&instance.target) {
                out.push(instance.target);
            }
        }
        out
    }

    /// True if any instance points directly at `id`.
    pub fn references(&self, id: ObjectId) -> bool {
        self.instances.iter().any(|x| x.target == id)
    }
}

fn topology_path(stack: &[ObjectId], repeated: ObjectId) -> String {
    let mut path = stack.iter().map(|x| x.to_string()).collect::<Vec<_>>();
    path.push(repeated.to_string());
    path.join(" -> ")
}
