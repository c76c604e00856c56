use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::{
    layer::Layer,
    mesh::Mesh,
    path::Rates,
    scene::{Instance, ObjectId},
    transform::Placement,
};

/// A part of an object printed from its own faces, with its own layers.
#[derive(Clone, Debug)]
pub struct Volume {
    pub faces: Arc<[[u32; 3]]>,
    pub layers: Vec<Layer>,
}

#[derive(Clone, Debug)]
pub struct Object {
    pub id: ObjectId,
    pub name: Option<String>,
    mesh: Mesh,
    pub volumes: Vec<Volume>,
    /// The object and placement this one was built from.
    pub derived_from: Option<Instance>,
    pub(super) derived: Vec<ObjectId>,
    sliced: bool,
}

impl Object {
    /// An object with a single volume covering the whole mesh.
    pub fn new(id: ObjectId, mesh: Mesh) -> Self {
        let volume = Volume {
            faces: mesh.shared_faces(),
            layers: Vec::new(),
        };

        Self {
            id,
            name: None,
            mesh,
            volumes: vec![volume],
            derived_from: None,
            derived: Vec::new(),
            sliced: false,
        }
    }

    /// An object made of several volumes sharing the mesh's vertices.
    pub fn with_volumes(id: ObjectId, mesh: Mesh, volumes: Vec<Vec<[u32; 3]>>) -> Self {
        let mut object = Self::new(id, mesh);
        object.volumes = volumes
            .into_iter()
            .map(|faces| Volume {
                faces: faces.into(),
                layers: Vec::new(),
            })
            .collect();
        object
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// The object's vertices with only the faces of one volume.
    pub fn volume_mesh(&self, volume: usize) -> Result<Mesh> {
        let faces = self
            .volumes
            .get(volume)
            .with_context(|| format!("{} has no volume {volume}", self.label()))?;
        Ok(self.mesh.with_faces(faces.faces.clone()))
    }

    pub fn is_sliced(&self) -> bool {
        self.sliced
    }

    /// Replaces the layers of every volume, marking the object sliced.
    pub fn set_layers(&mut self, layers: Vec<Vec<Layer>>) {
        for (volume, layers) in self.volumes.iter_mut().zip(layers) {
            volume.layers = layers;
        }
        self.sliced = true;
    }

    pub fn derived_objects(&self) -> &[ObjectId] {
        &self.derived
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.volumes.iter().flat_map(|x| x.layers.iter())
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.volumes.iter_mut().flat_map(|x| x.layers.iter_mut())
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("object {} `{name}`", self.id),
            None => format!("object {}", self.id),
        }
    }

    pub fn distance_and_duration(&self, rates: &Rates) -> (f64, f64) {
        self.layers()
            .map(|x| x.distance_and_duration(rates))
            .fold((0.0, 0.0), |(d, t), (dx, tx)| (d + dx, t + tx))
    }

    /// The layers of every volume moved by a planar placement. `None` if
    /// any layer could not be placed.
    pub fn placed_layers(&self, placement: &Placement) -> Option<Vec<Vec<Layer>>> {
        self.volumes
            .iter()
            .map(|volume| {
                volume
                    .layers
                    .iter()
                    .map(|x| x.placed(placement))
                    .collect::<Option<Vec<_>>>()
            })
            .collect()
    }

    /// Builds a copy of this object moved by `placement`. Layers are carried
    /// over when the placement keeps them flat, otherwise the copy has to be
    /// sliced again.
    pub(super) fn derive(&self, id: ObjectId, placement: &Placement) -> Object {
        let mut derived = Object {
            id,
            name: self.name.clone(),
            mesh: self.mesh.placed(placement),
            volumes: self
                .volumes
                .iter()
                .map(|x| Volume {
                    faces: x.faces.clone(),
                    layers: Vec::new(),
                })
                .collect(),
            derived_from: Some(Instance::new(self.id, placement.clone())),
            derived: Vec::new(),
            sliced: false,
        };

        if self.sliced && placement.is_planar() {
            match self.placed_layers(placement) {
                Some(layers) => derived.set_layers(layers),
                None => warn!("Could not place the layers of {}, slicing again", self.label()),
            }
        }

        derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mesh::tests::cuboid, Pos};

    fn sliced_object() -> Object {
        let mut object = Object::new(1, cuboid(Pos::zeros(), Pos::new(2.0, 2.0, 1.0)));
        object.set_layers(vec![vec![Layer::new(0.2, 0), Layer::new(0.4, 1)]]);
        object
    }

    #[test]
    fn planar_copies_keep_layers() {
        let object = sliced_object();
        let copy = object.derive(2, &Placement::from_translation(Pos::new(0.0, 0.0, 0.4)));

        assert!(copy.is_sliced());
        let heights = copy.layers().map(|x| x.z).collect::<Vec<_>>();
        assert_eq!(heights, vec![0.6, 0.8]);
        assert_eq!(copy.derived_from.as_ref().map(|x| x.target), Some(1));
    }

    #[test]
    fn tilted_copies_need_slicing() {
        let object = sliced_object();
        let tilt = Placement::from_euler_degrees(Pos::zeros(), &Pos::new(90.0, 0.0, 0.0));
        let copy = object.derive(2, &tilt);

        assert!(!copy.is_sliced());
        assert_eq!(copy.layers().count(), 0);
        assert_eq!(copy.volumes.len(), 1);

        let (min, max) = copy.mesh().bounds();
        assert!((max.z - min.z - 2.0).abs() < 1e-9);
    }

    #[test]
    fn volumes_share_vertices() {
        let mesh = cuboid(Pos::zeros(), Pos::new(1.0, 1.0, 1.0));
        let faces = mesh.faces().to_vec();
        let (a, b) = faces.split_at(6);
        let object = Object::with_volumes(3, mesh, vec![a.to_vec(), b.to_vec()]).with_name("split");

        assert_eq!(object.volume_mesh(1).unwrap().face_count(), faces.len() - 6);
        assert_eq!(
            object.volume_mesh(0).unwrap().vertex_count(),
            object.mesh().vertex_count()
        );
        assert_eq!(object.label(), "object 3 `split`");
    }

    #[test]
    fn missing_volume_is_an_error() {
        let object = sliced_object();
        let err = object.volume_mesh(1).unwrap_err();
        assert_eq!(err.to_string(), "object 1 has no volume 1");
        assert!(object.volume_mesh(0).is_ok());
    }
}
