//! The scene graph: objects, constellations of placed instances and the
//! print bed. All of them live in one id keyed arena owned by [`File`];
//! everything else refers to them by id.

use std::collections::BTreeMap;

use tracing::warn;

use crate::transform::Placement;

mod constellation;
mod object;
mod print_bed;
pub use constellation::{Constellation, Instance};
pub use object::{Object, Volume};

pub type ObjectId = i64;

/// Id of the print bed, the root constellation.
pub const PRINT_BED_ID: ObjectId = -1;

#[derive(Clone, Debug)]
pub enum Node {
    Object(Object),
    Constellation(Constellation),
}

#[derive(Clone, Debug)]
pub struct File {
    pub name: String,
    nodes: BTreeMap<ObjectId, Node>,
    print_bed: Constellation,
}

impl File {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: BTreeMap::new(),
            print_bed: Constellation::new(PRINT_BED_ID).with_name("print bed"),
        }
    }

    /// Registers an object. An id that is already taken is ignored with a
    /// warning and `false` is returned.
    pub fn add_object(&mut self, object: Object) -> bool {
        self.insert(object.id, Node::Object(object))
    }

    pub fn add_constellation(&mut self, constellation: Constellation) -> bool {
        self.insert(constellation.id, Node::Constellation(constellation))
    }

    fn insert(&mut self, id: ObjectId, node: Node) -> bool {
        if id == PRINT_BED_ID || self.nodes.contains_key(&id) {
            warn!("Ignoring duplicate id {id} in `{}`", self.name);
            return false;
        }

        self.nodes.insert(id, node);
        true
    }

    pub fn print_bed(&self) -> &Constellation {
        &self.print_bed
    }

    pub fn print_bed_mut(&mut self) -> &mut Constellation {
        &mut self.print_bed
    }

    pub fn node(&self, id: ObjectId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        match self.nodes.get(&id) {
            Some(Node::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        match self.nodes.get_mut(&id) {
            Some(Node::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn constellation(&self, id: ObjectId) -> Option<&Constellation> {
        match self.nodes.get(&id) {
            Some(Node::Constellation(constellation)) => Some(constellation),
            _ => None,
        }
    }

    pub fn constellation_mut(&mut self, id: ObjectId) -> Option<&mut Constellation> {
        match self.nodes.get_mut(&id) {
            Some(Node::Constellation(constellation)) => Some(constellation),
            _ => None,
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.nodes.values().filter_map(|node| match node {
            Node::Object(object) => Some(object),
            Node::Constellation(_) => None,
        })
    }

    pub fn constellations(&self) -> impl Iterator<Item = &Constellation> {
        self.nodes.values().filter_map(|node| match node {
            Node::Constellation(constellation) => Some(constellation),
            Node::Object(_) => None,
        })
    }

    /// One more than the largest id in use.
    pub fn next_id(&self) -> ObjectId {
        self.nodes
            .keys()
            .next_back()
            .map_or(0, |id| (id + 1).max(0))
    }

    /// Constellations no other constellation refers to. The print bed is
    /// not counted as a referrer.
    pub fn top_level_constellations(&self) -> Vec<ObjectId> {
        self.constellations()
            .filter(|x| !self.constellations().any(|other| other.references(x.id)))
            .map(|x| x.id)
            .collect()
    }

    /// The object moved by `placement`, creating and registering it if no
    /// copy with that placement exists yet. Identity placements return the
    /// object itself.
    pub fn derived_object(&mut self, source: ObjectId, placement: &Placement) -> Option<ObjectId> {
        if placement.is_identity() {
            return Some(source);
        }

        let Some(object) = self.object(source) else {
            warn!("Can not derive from unknown object {source}");
            return None;
        };

        let existing = object.derived.iter().copied().find(|id| {
            self.object(*id)
                .and_then(|x| x.derived_from.as_ref())
                .is_some_and(|from| (placement / &from.placement).is_identity())
        });
        if existing.is_some() {
            return existing;
        }

        let id = self.next_id();
        let derived = object.derive(id, placement);
        self.insert(id, Node::Object(derived));
        if let Some(object) = self.object_mut(source) {
            object.derived.push(id);
        }
        Some(id)
    }
}
