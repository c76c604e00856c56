use std::{
    collections::HashMap,
    io::{BufRead, Read, Seek},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use obj::{load_obj, Obj, Position};

use crate::{transform::Placement, Point, Pos};

/// A mesh made of vertices and triangular faces. Faces are wound counter
/// clockwise when seen from outside. Cloning is cheap, the buffers are
/// shared.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Arc<[Pos]>,
    faces: Arc<[[u32; 3]]>,
}

impl Mesh {
    /// Creates a new mesh from the given vertices and faces, moving it so
    /// the center of its base sits at the origin.
    pub fn new(mut vertices: Vec<Pos>, faces: Vec<[u32; 3]>) -> Self {
        center_vertices(&mut vertices);
        Self::new_uncentred(vertices, faces)
    }

    /// Creates a new mesh from the given vertices and faces. The vertices
    /// are not moved.
    pub fn new_uncentred(vertices: Vec<Pos>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices: vertices.into(),
            faces: faces.into(),
        }
    }

    /// A mesh over the same vertices using a subset of the faces.
    pub fn with_faces(&self, faces: Arc<[[u32; 3]]>) -> Self {
        Self {
            vertices: self.vertices.clone(),
            faces,
        }
    }

    pub fn vertices(&self) -> &[Pos] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn shared_faces(&self) -> Arc<[[u32; 3]]> {
        self.faces.clone()
    }

    pub fn normal(&self, index: usize) -> Pos {
        let (v, f) = (self.vertices(), self.faces()[index]);
        let edge1 = v[f[2] as usize] - v[f[1] as usize];
        let edge2 = v[f[0] as usize] - v[f[1] as usize];
        edge1.cross(&edge2).normalize()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Moves every vertex by the placement. Faces are shared with `self`.
    pub fn placed(&self, placement: &Placement) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| placement.apply(v)).collect(),
            faces: self.faces.clone(),
        }
    }

    /// Intersect the mesh with the horizontal plane at `height`. Each
    /// segment is directed so the outside of the mesh lies on its right,
    /// which makes the loops they form counter clockwise around solid
    /// material.
    pub fn intersect_plane(&self, height: f64) -> Vec<[Point; 2]> {
        let mut intersections = Vec::new();

        let vertices = self.vertices();
        for (idx, face) in self.faces().iter().enumerate() {
            let v0 = vertices[face[0] as usize];
            let v1 = vertices[face[1] as usize];
            let v2 = vertices[face[2] as usize];

            // Signed distance of each vertex above the plane. An edge whose
            // ends have different signs crosses it.
            let (a, b, c) = (v0.z - height, v1.z - height, v2.z - height);
            let (a_pos, b_pos, c_pos) = (a > 0.0, b > 0.0, c > 0.0);

            let mut out = [Point::zeros(); 2];
            let mut n = 0;

            let mut push_intersection = |a: f64, b: f64, v0: Pos, v1: Pos| {
                let t = a / (a - b);
                out[n] = (v0 + t * (v1 - v0)).xy();
                n += 1;
            };

            (a_pos ^ b_pos).then(|| push_intersection(a, b, v0, v1));
            (b_pos ^ c_pos).then(|| push_intersection(b, c, v1, v2));
            (c_pos ^ a_pos).then(|| push_intersection(c, a, v2, v0));

            if n == 2 {
                let normal = self.normal(idx);
                let direction = out[1] - out[0];
                let right = Point::new(direction.y, -direction.x);
                if right.dot(&normal.xy()) < 0.0 {
                    out.swap(0, 1);
                }
                intersections.push(out);
            }
        }

        intersections
    }

    pub fn is_manifold(&self) -> bool {
        let mut edges = HashMap::<_, u8>::new();

        for [a, b, c] in self.faces() {
            for (a, b) in [(a, b), (b, c), (c, a)] {
                *edges.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }

        edges.values().all(|count| *count == 2)
    }

    /// Get the minimum and maximum of each component of every vertex in the
    /// model. These points define the bounding box of the model.
    pub fn bounds(&self) -> (Pos, Pos) {
        vertex_bounds(self.vertices())
    }
}

/// Loads a mesh from a `.stl` or `.obj` file.
pub fn load_mesh<T: BufRead + Read + Seek>(mut reader: T, format: &str) -> Result<Mesh> {
    let (vertices, faces) = match format.to_ascii_lowercase().as_str() {
        "stl" => {
            let mesh = stl_io::read_stl(&mut reader).context("Failed to read STL")?;
            let vertices = mesh
                .vertices
                .iter()
                .map(|v| Pos::new(v[0] as f64, v[1] as f64, v[2] as f64))
                .collect::<Vec<_>>();
            let faces = mesh
                .faces
                .iter()
                .map(|f| f.vertices.map(|x| x as u32))
                .collect::<Vec<_>>();
            (vertices, faces)
        }
        "obj" => {
            let model: Obj<Position, u32> = load_obj(reader).context("Failed to read OBJ")?;
            let vertices = model
                .vertices
                .iter()
                .map(|v| Pos::new(v.position[0] as f64, v.position[1] as f64, v.position[2] as f64))
                .collect::<Vec<_>>();
            let faces = model
                .indices
                .chunks_exact(3)
                .map(|f| [f[0], f[1], f[2]])
                .collect::<Vec<_>>();
            (vertices, faces)
        }
        other => bail!("Unsupported mesh format `{other}`"),
    };

    Ok(Mesh::new(vertices, faces))
}

/// Get the minimum and maximum of each component of every vertex.
/// These points define the bounding box of the model.
fn vertex_bounds(vertices: &[Pos]) -> (Pos, Pos) {
    vertices.iter().fold(
        (Pos::repeat(f64::MAX), Pos::repeat(f64::MIN)),
        |(min, max), v| (min.inf(v), max.sup(v)),
    )
}

/// Moves the model to have its origin at the center of its base.
fn center_vertices(vertices: &mut [Pos]) {
    let (min, max) = vertex_bounds(vertices);

    let center = (min + max) / 2.0;
    let center = Pos::new(center.x, center.y, min.z);
    vertices.iter_mut().for_each(|v| *v -= center);
}
